//! Logging setup for the Meridian Region Server.

use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingSettings;

/// Initializes the global tracing subscriber.
///
/// The `RUST_LOG` environment variable takes precedence over the configured
/// level, so operators can crank verbosity without touching the file.
///
/// # Arguments
///
/// * `config` - Logging settings from the configuration file
/// * `json_format` - Force JSON output regardless of the configuration
pub fn setup_logging(
    config: &LoggingSettings,
    json_format: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let log_level = config.level.as_str();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if json_format || config.json_format {
        // JSON formatting with thread info for structured logging
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_file(false)
                    .with_line_number(false)
                    .with_thread_ids(true)
                    .with_thread_names(true),
            )
            .init();
    } else {
        // Human-readable formatting with thread info for development
        registry
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_file(false)
                    .with_line_number(false)
                    .with_thread_ids(true)
                    .with_thread_names(true),
            )
            .init();
    }

    info!("🔧 Logging initialized with level: {}", log_level);
    Ok(())
}

/// Displays the startup banner through the logging pipeline.
pub fn display_banner() {
    let version = option_env!("CARGO_PKG_VERSION").unwrap_or("UNK");
    info!("╔══════════════════════════════════════════╗");
    info!("║        🌅 MERIDIAN REGION SERVER         ║");
    info!("║                 v{}                  ║", version);
    info!("║                                          ║");
    info!("║  Region Simulator Node for               ║");
    info!("║  Distributed Virtual Worlds              ║");
    info!("║                                          ║");
    info!("║  🗺️  Grid Registration & Neighbours       ║");
    info!("║  👤 Circuit Authentication               ║");
    info!("║  🚶 Inter-Region Agent Hand-offs         ║");
    info!("╚══════════════════════════════════════════╝");
}
