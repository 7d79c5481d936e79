//! Tracing subscriber initialization.
//!
//! Components never hold a logger; they emit through the `tracing` macros and spans, and the
//! process decides once, here, where those events go.

use sink_config::Environment;
use std::sync::Once;
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt};

/// Errors raised while installing the global subscriber.
#[derive(Debug, Error)]
pub enum TracingError {
    #[error("failed to determine runtime environment: {0}")]
    Environment(#[from] std::io::Error),

    #[error("failed to install tracing subscriber: {0}")]
    Init(#[from] TryInitError),
}

/// Flushes buffered log lines when dropped.
///
/// Must be held until the process exits, otherwise the last log lines may be lost.
#[must_use]
pub struct LogFlusher {
    _guard: WorkerGuard,
}

/// Installs the global subscriber for a service.
///
/// Filtering follows `RUST_LOG` and defaults to `info` for the service and the sink core.
/// Span close events are logged so every batch and record carries its duration. Output is
/// JSON in [`Environment::Prod`] and human readable otherwise.
pub fn init_tracing(app_name: &str) -> Result<LogFlusher, TracingError> {
    let environment = Environment::load()?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(app_name)));

    let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());
    let fmt_layer = fmt::layer()
        .with_writer(writer)
        .with_span_events(FmtSpan::CLOSE);
    let fmt_layer = if environment.structured_logs() {
        fmt_layer.json().with_current_span(true).boxed()
    } else {
        fmt_layer.boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(LogFlusher { _guard: guard })
}

/// Installs a subscriber writing to the test harness output, once per process.
///
/// Honors `RUST_LOG`; silent when it is not set.
pub fn init_test_tracing() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("off"));
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_test_writer())
            .try_init();
    });
}

/// Default filter directives: binary names use dashes while targets use underscores.
fn default_directives(app_name: &str) -> String {
    format!("{}=info,sink=info", app_name.replace('-', "_"))
}
