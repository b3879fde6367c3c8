//! # Meridian World Core
//!
//! Core domain types and session plumbing shared by every Meridian region
//! process. This crate is deliberately transport-free: it knows nothing about
//! sockets or wire formats, only about regions, agents and the circuits that
//! connect them.
//!
//! ## Architecture
//!
//! The crate provides three building blocks:
//!
//! - **Types** ([`types`]) - region descriptors, agent identifiers, circuits
//!   and the small value types (positions, map blocks, presence records) that
//!   travel between regions
//! - **Circuit authentication** ([`circuit`]) - the per-simulator table of
//!   authorized circuits and the session checks performed when a viewer
//!   connects
//! - **Region events** ([`events`]) - the callback surface a region exposes so
//!   the communications tier can hand it incoming agents, crossings and
//!   presence updates
//!
//! ## Design Principles
//!
//! 1. **No transport knowledge**: everything here works the same whether
//!    events arrive from an in-process call or a remote push
//! 2. **Cheap to share**: the registries are lock-sharded and safe to clone
//!    behind `Arc` across tasks
//! 3. **Fail quiet**: lookups on unknown codes return neutral values instead
//!    of erroring, mirroring how simulators must shrug off stale traffic

pub mod circuit;
pub mod events;
pub mod types;
pub mod utils;

// Re-export the types callers use constantly so downstream crates can import
// from the crate root.
pub use circuit::CircuitManager;
pub use events::RegionEventListener;
pub use types::{
    AgentCircuit, AgentId, AgentPresence, AuthenticateResponse, GridCredentials, LoginSession,
    MapBlockDescriptor, RegionDescriptor, RegionHandle, RegionId, SessionId, Vector3,
};
pub use utils::current_timestamp;
