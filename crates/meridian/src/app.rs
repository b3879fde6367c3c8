//! Application lifecycle management.
//!
//! [`Application`] assembles one region node: configuration, the RPC
//! endpoint, the communications stack for the configured backend, the
//! circuit table and, optionally, an embedded grid authority. `new` builds
//! everything and `run` drives it until a shutdown signal arrives.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use meridian_comms::authority::GridAuthority;
use meridian_comms::factory::{build_comms_stack, CommsStack};
use meridian_comms::interregion::register_inter_region_handlers;
use meridian_comms::router::InterRegionRouter;
use meridian_comms::server::RpcServer;
use meridian_world::circuit::CircuitManager;
use meridian_world::events::RegionEventListener;
use meridian_world::types::RegionDescriptor;
use tracing::{error, info, warn};

use crate::cli::CliArgs;
use crate::config::AppConfig;
use crate::logging::display_banner;
use crate::signals::wait_for_shutdown_signal;

/// Interval between stale-registration sweeps of an embedded authority
const EVICTION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// One running region node
pub struct Application {
    /// Validated configuration
    config: AppConfig,
    /// Descriptor advertised for the hosted region
    region: RegionDescriptor,
    /// Router delivering inbound events to hosted regions
    router: Arc<InterRegionRouter>,
    /// Circuits the hosted region expects
    circuits: Arc<CircuitManager>,
    /// Grid and inter-region services for the configured backend
    stack: CommsStack,
    /// Inbound RPC endpoint
    rpc_server: Arc<RpcServer>,
    /// Embedded grid authority, when this node hosts one
    authority: Option<Arc<GridAuthority>>,
}

impl Application {
    /// Builds the application from parsed command line arguments.
    ///
    /// Loads and validates configuration, binds the RPC endpoint and
    /// assembles the communications stack. Nothing is served until
    /// [`run`](Application::run).
    pub async fn new(args: CliArgs) -> Result<Self, Box<dyn std::error::Error>> {
        info!(
            "🚀 Starting Meridian Region Server v{}",
            env!("CARGO_PKG_VERSION")
        );
        info!(
            "📁 Loading configuration from: {}",
            args.config_path.display()
        );

        let mut config = AppConfig::load_from_file(&args.config_path).await?;

        // Command line overrides take precedence over the file.
        if let Some(bind_address) = args.bind_address {
            info!("⚙️ Overriding bind address: {}", bind_address);
            config.server.bind_address = bind_address;
        }
        if let Some(backend) = args.backend {
            info!("⚙️ Overriding comms backend: {}", backend);
            config.comms.backend = backend;
        }
        if let Some(grid_server_uri) = args.grid_server_uri {
            info!("⚙️ Overriding grid authority: {}", grid_server_uri);
            config.comms.grid_server_uri = grid_server_uri;
        }
        if let Some(log_level) = args.log_level {
            config.logging.level = log_level;
        }

        config
            .validate()
            .map_err(|e| format!("Configuration validation failed: {e}"))?;

        display_banner();

        let region = config.region_descriptor();
        let router = Arc::new(InterRegionRouter::new());
        let circuits = Arc::new(CircuitManager::new());
        let stack = build_comms_stack(&config.to_comms_config(), router.clone())?;

        let bind_address: SocketAddr = config.server.bind_address.parse()?;
        let rpc_server = Arc::new(RpcServer::bind(bind_address).await?);
        register_inter_region_handlers(&rpc_server, router.clone());

        let authority = if config.authority.enabled {
            let authority = Arc::new(GridAuthority::new(&config.comms.recv_key));
            authority.register_grid_handlers(&rpc_server);
            info!("🗺️ Grid authority enabled on this node");
            Some(authority)
        } else {
            None
        };

        info!(
            "🌍 Hosting region '{}' at ({}, {}), reachable at {}",
            region.name,
            region.grid_x(),
            region.grid_y(),
            region.uri()
        );

        Ok(Self {
            config,
            region,
            router,
            circuits,
            stack,
            rpc_server,
            authority,
        })
    }

    /// Runs the node until a shutdown signal arrives.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        info!("=== Meridian Region Server ===");
        info!("RPC endpoint: {}", self.rpc_server.local_addr());
        info!("Comms backend: {}", self.config.comms.backend);

        // Serve inbound RPC on its own task.
        let server = self.rpc_server.clone();
        let server_handle = tokio::spawn(async move {
            if let Err(e) = server.serve().await {
                error!("💥 RPC endpoint failed: {}", e);
            }
        });

        // An embedded authority sweeps out registrations of regions that
        // stopped checking in.
        let eviction_handle = self.authority.as_ref().map(|authority| {
            let authority = authority.clone();
            let stale_after = self.config.authority.stale_after_secs;
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(EVICTION_SWEEP_INTERVAL);
                loop {
                    interval.tick().await;
                    authority.evict_stale(stale_after);
                }
            })
        });

        // Join the grid. A refused or unreachable grid is logged and the
        // node keeps serving with whatever connectivity it has.
        match self.stack.grid_services.register_region(&self.region).await {
            Some(listener) => {
                self.wire_region_events(&listener);
                info!("✅ Region '{}' registered with the grid", self.region.name);

                let neighbours = self
                    .stack
                    .grid_services
                    .request_neighbours(&self.region)
                    .await;
                for neighbour in neighbours
                    .iter()
                    .filter(|n| n.handle != self.region.handle)
                {
                    info!(
                        "🧭 Neighbour '{}' at ({}, {}), endpoint {}",
                        neighbour.name,
                        neighbour.grid_x(),
                        neighbour.grid_y(),
                        neighbour.uri()
                    );
                }
            }
            None => {
                error!("❌ Grid registration failed; running without grid connectivity");
            }
        }

        info!("🎮 Region node is ready");
        info!("Press Ctrl+C to initiate graceful shutdown");

        wait_for_shutdown_signal().await?;

        // Phase 1: stop accepting inter-region traffic.
        info!("🔄 Phase 1: Stopping RPC endpoint...");
        self.rpc_server.shutdown();
        match tokio::time::timeout(Duration::from_secs(8), server_handle).await {
            Ok(_) => info!("✅ RPC endpoint stopped"),
            Err(_) => warn!("⚠️ RPC endpoint did not stop in time, continuing shutdown"),
        }

        // Phase 2: stop background work.
        info!("🔄 Phase 2: Stopping background tasks...");
        if let Some(handle) = eviction_handle {
            handle.abort();
        }

        info!(
            "📊 Final stats: {} expected circuit(s), {} hosted region(s)",
            self.circuits.circuit_count(),
            self.router.region_count()
        );
        info!("✅ Meridian Region Server shutdown complete");
        Ok(())
    }

    /// Wires the hosted region's handlers onto its event listener.
    fn wire_region_events(&self, listener: &Arc<RegionEventListener>) {
        let circuits = self.circuits.clone();
        listener.on_expect_user(move |handle, circuit| {
            info!(
                "👤 Expecting {} {} on circuit {} (handle {})",
                circuit.first_name, circuit.last_name, circuit.circuit_code, handle
            );
            circuits.add_circuit(circuit.clone());
        });

        let circuits = self.circuits.clone();
        listener.on_avatar_crossing(move |_, agent_id, position| {
            info!(
                "🚶 Avatar {} crossing in at ({:.1}, {:.1}, {:.1})",
                agent_id, position.x, position.y, position.z
            );
            // The crossing promotes an announced child circuit to root.
            if let Some(circuit_code) = circuits.circuit_code_for_agent(agent_id) {
                circuits.update_child_status(circuit_code, false);
            }
        });

        listener.on_presence_update(move |presence| {
            info!(
                "🟢 {} {} is now {}",
                presence.first_name,
                presence.last_name,
                if presence.online { "online" } else { "offline" }
            );
        });
    }
}
