//! # geoentry-server
//!
//! HTTP host library for the geoentry home proximity system.
//!
//! This library provides the API handlers, logging setup and the shared
//! application state that embeds the proximity engine.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

pub mod api;
pub mod logging;
pub mod state;
