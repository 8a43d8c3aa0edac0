//! Tracing subscriber setup.

use tracing_log::LogTracer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

use crate::config::LoggingConfig;
use crate::error::PdfdeckError;

/// Installs the global subscriber and routes `log` records into it.
///
/// `RUST_LOG` wins over the configured level when set. Call once per
/// process; a second call fails.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), PdfdeckError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => env_filter(&config.level)?,
    };

    let fmt_layer: Box<dyn Layer<Registry> + Send + Sync> = if config.json {
        fmt::layer().json().with_target(true).boxed()
    } else {
        fmt::layer().with_target(true).boxed()
    };

    let subscriber = tracing_subscriber::registry().with(fmt_layer).with(filter);

    LogTracer::init().map_err(|e| PdfdeckError::Telemetry(e.to_string()))?;
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| PdfdeckError::Telemetry(e.to_string()))
}

fn env_filter(directives: &str) -> Result<EnvFilter, PdfdeckError> {
    EnvFilter::try_new(directives).map_err(|e| {
        PdfdeckError::Telemetry(format!("invalid log filter '{}': {}", directives, e))
    })
}
