//! Configuration management for the Meridian Region Server.
//!
//! Configuration lives in a TOML file. Every field has a default, so a
//! missing file is replaced with a freshly written default configuration
//! and a partial file only needs the keys it wants to change.

use meridian_comms::factory::{CommsConfig, BACKEND_GRID, BACKEND_STANDALONE};
use meridian_world::types::{GridCredentials, RegionDescriptor, RegionId};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use tracing::{info, warn};
use uuid::Uuid;

/// Port used when the configured bind address cannot be parsed
const FALLBACK_RPC_PORT: u16 = 9000;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// RPC endpoint settings
    #[serde(default)]
    pub server: ServerSettings,
    /// The region this node hosts
    #[serde(default)]
    pub region: RegionSettings,
    /// Communications backend selection and grid credentials
    #[serde(default)]
    pub comms: CommsSettings,
    /// Embedded grid authority settings
    #[serde(default)]
    pub authority: AuthoritySettings,
    /// Logging settings
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Settings for the inter-region RPC endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Address the RPC endpoint binds, e.g. `127.0.0.1:9000`
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

/// Identity and placement of the hosted region
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionSettings {
    /// Region name shown on maps and in logs
    #[serde(default = "default_region_name")]
    pub name: String,
    /// Grid cell X coordinate
    #[serde(default = "default_grid_coord")]
    pub grid_x: u32,
    /// Grid cell Y coordinate
    #[serde(default = "default_grid_coord")]
    pub grid_y: u32,
    /// Hostname or IP other processes use to reach this region
    #[serde(default = "default_external_host")]
    pub external_host: String,
    /// Fixed region UUID; leave empty to generate one per start
    #[serde(default)]
    pub region_id: String,
}

/// Communications backend selection and grid credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommsSettings {
    /// Backend selector: `standalone` or `grid`
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Grid authority RPC endpoint, used by the `grid` backend
    #[serde(default = "default_grid_server_uri")]
    pub grid_server_uri: String,
    /// Key presented to the grid authority on outgoing calls
    #[serde(default = "default_grid_key")]
    pub send_key: String,
    /// Key expected from simulators when this node hosts the authority
    #[serde(default = "default_grid_key")]
    pub recv_key: String,
}

/// Embedded grid authority settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthoritySettings {
    /// Serve the grid registry methods from this node
    #[serde(default)]
    pub enabled: bool,
    /// Seconds after which a silent region registration is evicted
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level: trace, debug, info, warn or error
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit logs in JSON format
    #[serde(default)]
    pub json_format: bool,
}

fn default_bind_address() -> String {
    "127.0.0.1:9000".to_string()
}

fn default_region_name() -> String {
    "Meridian Landing".to_string()
}

fn default_grid_coord() -> u32 {
    1000
}

fn default_external_host() -> String {
    "127.0.0.1".to_string()
}

fn default_backend() -> String {
    BACKEND_STANDALONE.to_string()
}

fn default_grid_server_uri() -> String {
    "ws://127.0.0.1:8001".to_string()
}

fn default_grid_key() -> String {
    "null".to_string()
}

fn default_stale_after_secs() -> u64 {
    300
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
        }
    }
}

impl Default for RegionSettings {
    fn default() -> Self {
        Self {
            name: default_region_name(),
            grid_x: default_grid_coord(),
            grid_y: default_grid_coord(),
            external_host: default_external_host(),
            region_id: String::new(),
        }
    }
}

impl Default for CommsSettings {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            grid_server_uri: default_grid_server_uri(),
            send_key: default_grid_key(),
            recv_key: default_grid_key(),
        }
    }
}

impl Default for AuthoritySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            stale_after_secs: default_stale_after_secs(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// When the file does not exist, a default configuration is written
    /// there so operators have something concrete to edit.
    pub async fn load_from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!(
                "📝 Created default configuration file at {}",
                path.display()
            );
            Ok(default_config)
        }
    }

    /// Checks the configuration for values the server cannot start with.
    pub fn validate(&self) -> Result<(), String> {
        if self.server.bind_address.parse::<SocketAddr>().is_err() {
            return Err(format!(
                "Invalid bind address: {}",
                self.server.bind_address
            ));
        }

        if self.region.name.trim().is_empty() {
            return Err("Region name cannot be empty".to_string());
        }
        if self.region.external_host.trim().is_empty() {
            return Err("Region external_host cannot be empty".to_string());
        }
        if self.region.grid_x > u32::from(u16::MAX) || self.region.grid_y > u32::from(u16::MAX) {
            return Err(format!(
                "Grid coordinates ({}, {}) are outside the map",
                self.region.grid_x, self.region.grid_y
            ));
        }
        if !self.region.region_id.is_empty() && Uuid::parse_str(&self.region.region_id).is_err() {
            return Err(format!("Invalid region_id: {}", self.region.region_id));
        }

        match self.comms.backend.as_str() {
            BACKEND_STANDALONE => {}
            BACKEND_GRID => {
                if self.comms.grid_server_uri.trim().is_empty() {
                    return Err("grid backend requires comms.grid_server_uri".to_string());
                }
            }
            other => {
                return Err(format!(
                    "Unknown comms backend: {other} (expected {BACKEND_STANDALONE} or {BACKEND_GRID})"
                ));
            }
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {} (valid: {})",
                self.logging.level,
                valid_levels.join(", ")
            ));
        }

        Ok(())
    }

    /// Settings for the communications stack factory
    pub fn to_comms_config(&self) -> CommsConfig {
        CommsConfig {
            backend: self.comms.backend.clone(),
            grid: GridCredentials {
                grid_server_uri: self.comms.grid_server_uri.clone(),
                send_key: self.comms.send_key.clone(),
                recv_key: self.comms.recv_key.clone(),
            },
        }
    }

    /// Descriptor of the hosted region, advertised to the grid.
    ///
    /// The advertised port is taken from the bind address; a configured
    /// region UUID is kept, otherwise a fresh one is generated for this
    /// process lifetime.
    pub fn region_descriptor(&self) -> RegionDescriptor {
        let port = match self.server.bind_address.parse::<SocketAddr>() {
            Ok(addr) => addr.port(),
            Err(_) => {
                warn!(
                    "Invalid bind address '{}', advertising port {}",
                    self.server.bind_address, FALLBACK_RPC_PORT
                );
                FALLBACK_RPC_PORT
            }
        };

        let region_id = self
            .region
            .region_id
            .parse::<RegionId>()
            .unwrap_or_default();

        RegionDescriptor::new(
            region_id,
            &self.region.name,
            self.region.grid_x,
            self.region.grid_y,
            &self.region.external_host,
            port,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.bind_address, "127.0.0.1:9000");
        assert_eq!(config.comms.backend, BACKEND_STANDALONE);
        assert!(!config.authority.enabled);
    }

    #[test]
    fn test_partial_file_fills_with_defaults() {
        let toml_content = r#"
            [region]
            name = "Harbor"
            grid_x = 997

            [comms]
            backend = "grid"
            grid_server_uri = "ws://grid.example.net:8001"
        "#;
        let config: AppConfig = toml::from_str(toml_content).unwrap();

        assert_eq!(config.region.name, "Harbor");
        assert_eq!(config.region.grid_x, 997);
        assert_eq!(config.region.grid_y, 1000, "unset keys take defaults");
        assert_eq!(config.comms.backend, BACKEND_GRID);
        assert_eq!(config.comms.send_key, "null");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_bind_address_fails_validation() {
        let mut config = AppConfig::default();
        config.server.bind_address = "not-an-address".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_grid_backend_requires_authority_uri() {
        let mut config = AppConfig::default();
        config.comms.backend = BACKEND_GRID.to_string();
        config.comms.grid_server_uri = "  ".to_string();
        assert!(config.validate().is_err());

        config.comms.grid_server_uri = "ws://127.0.0.1:8001".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_backend_fails_validation() {
        let mut config = AppConfig::default();
        config.comms.backend = "telepathy".to_string();
        let error = config.validate().unwrap_err();
        assert!(error.contains("telepathy"));
    }

    #[test]
    fn test_invalid_log_level_fails_validation() {
        let mut config = AppConfig::default();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_region_id_fails_validation() {
        let mut config = AppConfig::default();
        config.region.region_id = "not-a-uuid".to_string();
        assert!(config.validate().is_err());

        config.region.region_id = Uuid::new_v4().to_string();
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn test_load_from_existing_file() {
        let toml_content = r#"
            [server]
            bind_address = "0.0.0.0:9500"

            [region]
            name = "Loaded"
        "#;
        let file = NamedTempFile::new().unwrap();
        tokio::fs::write(file.path(), toml_content).await.unwrap();

        let config = AppConfig::load_from_file(file.path()).await.unwrap();
        assert_eq!(config.server.bind_address, "0.0.0.0:9500");
        assert_eq!(config.region.name, "Loaded");
    }

    #[tokio::test]
    async fn test_missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meridian.toml");
        assert!(!path.exists());

        let config = AppConfig::load_from_file(&path).await.unwrap();
        assert!(path.exists(), "default config file should be created");
        assert_eq!(config.region.name, default_region_name());

        // The written file parses back to the same configuration.
        let reloaded = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(reloaded.server.bind_address, config.server.bind_address);
    }

    #[tokio::test]
    async fn test_malformed_file_is_an_error() {
        let file = NamedTempFile::new().unwrap();
        tokio::fs::write(file.path(), "this is not [valid toml")
            .await
            .unwrap();
        assert!(AppConfig::load_from_file(file.path()).await.is_err());
    }

    #[test]
    fn test_region_descriptor_uses_bind_port() {
        let mut config = AppConfig::default();
        config.server.bind_address = "127.0.0.1:9731".to_string();
        config.region.name = "Portside".to_string();
        config.region.grid_x = 1200;
        config.region.grid_y = 900;

        let descriptor = config.region_descriptor();
        assert_eq!(descriptor.port, 9731);
        assert_eq!(descriptor.name, "Portside");
        assert_eq!(descriptor.grid_x(), 1200);
        assert_eq!(descriptor.grid_y(), 900);
        assert_eq!(descriptor.uri(), "ws://127.0.0.1:9731");
    }

    #[test]
    fn test_region_descriptor_keeps_configured_uuid() {
        let fixed = Uuid::new_v4();
        let mut config = AppConfig::default();
        config.region.region_id = fixed.to_string();

        assert_eq!(config.region_descriptor().region_id.0, fixed);

        // Without a configured UUID every call mints a new identity.
        config.region.region_id = String::new();
        let first = config.region_descriptor().region_id;
        let second = config.region_descriptor().region_id;
        assert_ne!(first, second);
    }

    #[test]
    fn test_to_comms_config_carries_credentials() {
        let mut config = AppConfig::default();
        config.comms.backend = BACKEND_GRID.to_string();
        config.comms.send_key = "outgoing".to_string();
        config.comms.recv_key = "incoming".to_string();

        let comms = config.to_comms_config();
        assert_eq!(comms.backend, BACKEND_GRID);
        assert_eq!(comms.grid.send_key, "outgoing");
        assert_eq!(comms.grid.recv_key, "incoming");
    }
}
