//! Logging and tracing utilities

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

/// Initialize tracing subscriber with default configuration
///
/// Honors `RUST_LOG` and falls back to `info`.
pub fn init_tracing() {
    init_tracing_with_default("info");
}

/// Initialize tracing subscriber with a custom fallback filter
///
/// `default_filter` is used only when `RUST_LOG` is unset or invalid. Calling
/// this more than once is harmless; later calls are ignored.
pub fn init_tracing_with_default(default_filter: &str) {
    init_tracing_with(default_filter, LogFormat::Text);
}

/// Initialize tracing with an explicit output format
///
/// Logs go to stderr so stdout stays clean for reports.
pub fn init_tracing_with(default_filter: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let registry = tracing_subscriber::registry().with(filter);

    let _ = match format {
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };
}
