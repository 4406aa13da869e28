//! Logging and error tracking setup.
//!
//! Events go to three places:
//!
//! - stdout, in the default `tracing-subscriber` format
//! - `<LOG_DIR>/app.log`, one `[timestamp] LEVEL in module: message` line
//!   per event, appended through a non-blocking writer
//! - Sentry, when `SENTRY_DSN` is set (warnings and errors as events,
//!   info and debug as breadcrumbs)
//!
//! `RUST_LOG` overrides the default filter.

use std::fmt;
use std::path::PathBuf;

use chrono::Local;
use sentry::integrations::tracing as sentry_tracing;
use thiserror::Error;
use tracing::{Event, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter,
    fmt::{FmtContext, FormatEvent, FormatFields, format},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::{SubscriberInitExt, TryInitError},
};

use crate::config::AppConfig;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "roster_web=info,tower_http=info";

/// Log file inside `LOG_DIR`.
pub const LOG_FILE_NAME: &str = "app.log";

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("cannot create log directory {path}: {source}")]
    LogDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot open log file: {0}")]
    Appender(#[from] InitError),

    #[error("a global subscriber is already installed: {0}")]
    Subscriber(#[from] TryInitError),
}

/// Keeps the log writer and the Sentry client alive; drop on exit to flush.
#[must_use = "dropping the guard stops file logging"]
pub struct TelemetryGuard {
    _file: WorkerGuard,
    _sentry: Option<sentry::ClientInitGuard>,
}

/// Install the global subscriber and, if configured, Sentry.
///
/// # Errors
///
/// Returns `TelemetryError` if the log file cannot be opened or a subscriber
/// is already installed.
pub fn init(config: &AppConfig) -> Result<TelemetryGuard, TelemetryError> {
    // Sentry must be initialized before the tracing subscriber.
    let sentry = init_sentry(config);

    std::fs::create_dir_all(&config.log_dir).map_err(|source| TelemetryError::LogDir {
        path: config.log_dir.clone(),
        source,
    })?;
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(LOG_FILE_NAME)
        .build(&config.log_dir)?;
    let (file_writer, file_guard) = tracing_appender::non_blocking(appender);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .event_format(LineFormat)
                .with_writer(file_writer),
        )
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .try_init()?;

    if sentry.is_some() {
        tracing::info!(environment = %config.deployment, "Sentry initialized");
    }
    tracing::info!(path = %config.log_dir.join(LOG_FILE_NAME).display(), "File logging enabled");

    Ok(TelemetryGuard {
        _file: file_guard,
        _sentry: sentry,
    })
}

/// Initialize Sentry error tracking if a DSN is configured.
fn init_sentry(config: &AppConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    Some(sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: Some(config.deployment.as_str().into()),
            attach_stacktrace: true,
            ..Default::default()
        },
    )))
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

/// `[2025-06-01 12:00:00,123] INFO in roster_web::routes::users: message`
#[derive(Debug, Clone, Copy, Default)]
pub struct LineFormat;

impl<S, N> FormatEvent<S, N> for LineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();
        write!(
            writer,
            "[{}] {} in {}: ",
            Local::now().format("%Y-%m-%d %H:%M:%S,%3f"),
            metadata.level(),
            metadata.module_path().unwrap_or_else(|| metadata.target()),
        )?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use tracing_subscriber::fmt::MakeWriter;

    use super::*;

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Buffer {
        type Writer = Self;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn test_line_format() {
        let buffer = Buffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .event_format(LineFormat)
            .with_writer(buffer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(count = 3, "Deleted users");
        });

        let output = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        let line = output.trim_end();
        assert!(line.starts_with('['), "{line}");
        assert!(
            line.contains("] WARN in roster_web::telemetry::tests: Deleted users count=3"),
            "{line}"
        );
        assert_eq!(output.lines().count(), 1);
    }
}
