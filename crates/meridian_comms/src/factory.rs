//! Backend selection for the communications stack.
//!
//! A deployment picks its backend with a single configuration string:
//! `"standalone"` keeps the whole grid in-process, `"grid"` talks to a grid
//! authority over RPC. Region code receives the two service trait objects
//! and never learns which one it got.

use std::sync::Arc;

use meridian_world::types::GridCredentials;
use tracing::info;

use crate::error::CommsError;
use crate::interregion::RemoteInterRegionComms;
use crate::local::LocalGridServices;
use crate::remote::{RegionDirectory, RemoteGridServices};
use crate::router::InterRegionRouter;
use crate::traits::{GridServices, InterRegionComms};

/// Backend string for the in-process grid
pub const BACKEND_STANDALONE: &str = "standalone";
/// Backend string for a remote grid authority
pub const BACKEND_GRID: &str = "grid";

/// Settings the factory needs to assemble a stack
#[derive(Debug, Clone)]
pub struct CommsConfig {
    /// Backend selector, `"standalone"` or `"grid"`
    pub backend: String,
    /// Grid authority credentials, used only by the `"grid"` backend
    pub grid: GridCredentials,
}

/// The assembled communications services for one process
pub struct CommsStack {
    /// Grid registration and lookup
    pub grid_services: Arc<dyn GridServices>,
    /// Agent hand-off announcements to other regions
    pub inter_region: Arc<dyn InterRegionComms>,
}

impl std::fmt::Debug for CommsStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommsStack").finish_non_exhaustive()
    }
}

/// Builds the communications stack named by `config.backend`.
///
/// # Arguments
///
/// * `config` - Backend selector and grid credentials
/// * `router` - The process-wide event router hosted regions attach to
///
/// # Returns
///
/// The assembled stack, or a configuration error when the backend string is
/// unknown or the grid backend lacks an authority URI.
pub fn build_comms_stack(
    config: &CommsConfig,
    router: Arc<InterRegionRouter>,
) -> Result<CommsStack, CommsError> {
    match config.backend.as_str() {
        BACKEND_STANDALONE => {
            info!("🔧 Communications backend: standalone (in-process grid)");
            let local = Arc::new(LocalGridServices::new(router));
            Ok(CommsStack {
                grid_services: local.clone(),
                inter_region: local,
            })
        }
        BACKEND_GRID => {
            if config.grid.grid_server_uri.is_empty() {
                return Err(CommsError::Config(
                    "grid backend requires a grid_server_uri".to_string(),
                ));
            }
            info!(
                "🔧 Communications backend: grid (authority at {})",
                config.grid.grid_server_uri
            );
            let directory = Arc::new(RegionDirectory::new());
            let grid_services = Arc::new(RemoteGridServices::new(
                config.grid.clone(),
                directory.clone(),
                router,
            ));
            let inter_region = Arc::new(RemoteInterRegionComms::new(directory));
            Ok(CommsStack {
                grid_services,
                inter_region,
            })
        }
        other => Err(CommsError::Config(format!(
            "unknown comms backend: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials(uri: &str) -> GridCredentials {
        GridCredentials {
            grid_server_uri: uri.to_string(),
            send_key: "null".to_string(),
            recv_key: "null".to_string(),
        }
    }

    #[test]
    fn test_standalone_stack_builds() {
        let config = CommsConfig {
            backend: BACKEND_STANDALONE.to_string(),
            grid: credentials(""),
        };
        assert!(build_comms_stack(&config, Arc::new(InterRegionRouter::new())).is_ok());
    }

    #[test]
    fn test_grid_stack_requires_authority_uri() {
        let config = CommsConfig {
            backend: BACKEND_GRID.to_string(),
            grid: credentials(""),
        };
        let error = build_comms_stack(&config, Arc::new(InterRegionRouter::new())).unwrap_err();
        assert!(matches!(error, CommsError::Config(_)));

        let config = CommsConfig {
            backend: BACKEND_GRID.to_string(),
            grid: credentials("ws://127.0.0.1:8001"),
        };
        assert!(build_comms_stack(&config, Arc::new(InterRegionRouter::new())).is_ok());
    }

    #[test]
    fn test_unknown_backend_is_refused() {
        let config = CommsConfig {
            backend: "carrier_pigeon".to_string(),
            grid: credentials(""),
        };
        let error = build_comms_stack(&config, Arc::new(InterRegionRouter::new())).unwrap_err();
        assert!(error.to_string().contains("carrier_pigeon"));
    }
}
