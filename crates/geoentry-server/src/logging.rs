//! Logging initialization.
//!
//! Production writes JSON to daily rolling files and compact lines to stdout
//! for the service journal. Development writes pretty output to stdout with
//! span open/close events.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable read when `RUST_LOG` is unset.
pub const LOG_LEVEL_ENV: &str = "GEOENTRY_LOG_LEVEL";

const DEFAULT_LEVEL: &str = "info";
const LOG_FILE_PREFIX: &str = "geoentry";

// Non-blocking writers flush on drop; keep them for the process lifetime.
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();
static STDOUT_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence; otherwise [`LOG_LEVEL_ENV`] is used,
/// defaulting to `info`.
///
/// # Errors
///
/// Returns an error if the filter directive cannot be parsed.
pub fn init(is_production: bool) -> anyhow::Result<()> {
    let filter = env_filter()?;
    if is_production {
        init_production(filter, &log_directory());
    } else {
        init_development(filter);
    }
    Ok(())
}

fn env_filter() -> anyhow::Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    let level = std::env::var(LOG_LEVEL_ENV).unwrap_or_else(|_| DEFAULT_LEVEL.to_string());
    Ok(EnvFilter::try_new(level)?)
}

fn init_production(filter: EnvFilter, log_dir: &Path) {
    if let Err(e) = std::fs::create_dir_all(log_dir) {
        eprintln!("cannot create log directory {}: {e}", log_dir.display());
    }

    let appender = RollingFileAppender::new(Rotation::DAILY, log_dir, LOG_FILE_PREFIX);
    let (file_writer, file_guard) = tracing_appender::non_blocking(appender);
    let (stdout_writer, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());

    let file_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(file_writer)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    let stdout_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(stdout_writer)
        .with_target(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();

    let _ = FILE_GUARD.set(file_guard);
    let _ = STDOUT_GUARD.set(stdout_guard);
}

fn init_development(filter: EnvFilter) {
    let layer = tracing_subscriber::fmt::layer()
        .pretty()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE);

    tracing_subscriber::registry().with(filter).with(layer).init();
}

/// Directory for rolling log files.
#[must_use]
pub fn log_directory() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        PathBuf::from("/var/log/geoentry")
    }
    #[cfg(not(target_os = "linux"))]
    {
        directories::ProjectDirs::from("", "", "geoentry")
            .map_or_else(|| PathBuf::from("./logs"), |dirs| dirs.data_dir().join("logs"))
    }
}
