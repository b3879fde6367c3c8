//! # Meridian Communications
//!
//! Everything a Meridian process needs to talk to the rest of its world:
//! grid registration, neighbour resolution, inter-region agent hand-offs
//! and presence fan-out, all over a small JSON-over-WebSocket RPC protocol.
//!
//! ## Architecture
//!
//! Region code programs against two traits and a router:
//!
//! - [`GridServices`] - registering with the grid and looking up other
//!   regions
//! - [`InterRegionComms`] - announcing agents to neighbouring regions
//! - [`InterRegionRouter`] - delivering events to the regions hosted in
//!   this process
//!
//! The [`factory`] assembles concrete backends behind those traits from a
//! single configuration string: `"standalone"` keeps everything in-process,
//! `"grid"` talks to a [`GridAuthority`] over RPC. Inbound traffic arrives
//! on an [`RpcServer`]; [`register_inter_region_handlers`] mounts the
//! simulator-side methods on it.
//!
//! ## Failure Model
//!
//! Comms failures never escape this crate as errors. Every operation logs
//! what went wrong and hands its caller a neutral value: `None` for failed
//! registrations and lookups, an empty list for failed queries, `false` for
//! failed hand-offs. A simulator keeps running with whatever connectivity
//! it has.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use meridian_comms::factory::{build_comms_stack, CommsConfig, BACKEND_STANDALONE};
//! use meridian_comms::router::InterRegionRouter;
//! use meridian_world::types::{GridCredentials, RegionDescriptor, RegionId};
//!
//! # async fn example() {
//! let router = Arc::new(InterRegionRouter::new());
//! let config = CommsConfig {
//!     backend: BACKEND_STANDALONE.to_string(),
//!     grid: GridCredentials {
//!         grid_server_uri: String::new(),
//!         send_key: "null".to_string(),
//!         recv_key: "null".to_string(),
//!     },
//! };
//! let stack = build_comms_stack(&config, router).unwrap();
//!
//! let region = RegionDescriptor::new(
//!     RegionId::new(), "Sandbox", 1000, 1000, "127.0.0.1", 9000,
//! );
//! let listener = stack.grid_services.register_region(&region).await.unwrap();
//! listener.on_expect_user(|_, circuit| {
//!     println!("expect {} {}", circuit.first_name, circuit.last_name);
//! });
//! # }
//! ```

pub mod authority;
pub mod client;
pub mod error;
pub mod factory;
pub mod interregion;
pub mod local;
pub mod presence;
pub mod remote;
pub mod router;
pub mod server;
pub mod traits;
pub mod wire;


// Re-export the main public API
pub use authority::GridAuthority;
pub use client::{RpcClient, DEFAULT_CALL_TIMEOUT};
pub use error::CommsError;
pub use factory::{build_comms_stack, CommsConfig, CommsStack, BACKEND_GRID, BACKEND_STANDALONE};
pub use interregion::{register_inter_region_handlers, RemoteInterRegionComms};
pub use local::LocalGridServices;
pub use presence::PresenceNotifier;
pub use remote::{RegionDirectory, RemoteGridServices};
pub use router::InterRegionRouter;
pub use server::RpcServer;
pub use traits::{GridServices, InterRegionComms};
pub use wire::{WireRequest, WireResponse};
