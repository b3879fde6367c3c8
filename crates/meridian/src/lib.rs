//! # Meridian Region Server Application
//!
//! The executable shell around the Meridian communications stack: command
//! line parsing, configuration, logging and the lifecycle of one region
//! node. The actual domain lives in `meridian_world` and `meridian_comms`;
//! this crate only wires them together and keeps them running.
//!
//! ## Quick Start
//!
//! ```bash
//! # Standalone sandbox on the default port
//! meridian
//!
//! # Join a grid, overriding the configured authority
//! meridian --backend grid --grid-server ws://grid.example.net:8001
//! ```

mod app;
mod cli;
mod config;
mod logging;
mod signals;

pub use app::Application;
pub use cli::CliArgs;
pub use config::{
    AppConfig, AuthoritySettings, CommsSettings, LoggingSettings, RegionSettings, ServerSettings,
};
pub use logging::{display_banner, setup_logging};
pub use signals::wait_for_shutdown_signal;

use tracing::error;

/// Application entry point called from `main`.
///
/// Parses arguments, initializes logging as early as possible and hands
/// control to [`Application`]. Failures before logging is up go to stderr;
/// anything later is logged and exits the process non-zero.
pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Read the configuration once just for the logging settings; the
    // application reloads and validates it properly afterwards.
    let mut early_config = AppConfig::load_from_file(&args.config_path)
        .await
        .unwrap_or_default();
    if let Some(level) = &args.log_level {
        early_config.logging.level = level.clone();
    }

    if let Err(e) = setup_logging(&early_config.logging, args.json_logs) {
        eprintln!("❌ Failed to setup logging: {e}");
        std::process::exit(1);
    }

    let app = match Application::new(args).await {
        Ok(app) => app,
        Err(e) => {
            error!("❌ Failed to start application: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = app.run().await {
        error!("❌ Application error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
