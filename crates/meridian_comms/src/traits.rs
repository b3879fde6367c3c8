//! Service traits the rest of the platform programs against.
//!
//! Region code never talks to a backend directly; it holds trait objects
//! built by the [`factory`](crate::factory) and stays oblivious to whether
//! calls stay in-process or cross the wire. Both traits share a failure
//! contract: comms problems are logged inside the implementation and
//! surface to the caller only as the operation's neutral value (`None`, an
//! empty list, `false`). None of these methods return errors, and none may
//! panic on a dead peer.

use std::sync::Arc;

use async_trait::async_trait;
use meridian_world::events::RegionEventListener;
use meridian_world::types::{
    AgentCircuit, AgentId, MapBlockDescriptor, RegionDescriptor, RegionHandle, Vector3,
};

/// Registration and lookup against the grid, however the grid is hosted.
#[async_trait]
pub trait GridServices: Send + Sync {
    /// Announces a region to the grid and returns the listener the region
    /// should wire its event handlers onto.
    ///
    /// `None` means the grid refused the registration or could not be
    /// reached; the caller keeps running but stays invisible to the grid.
    async fn register_region(&self, region: &RegionDescriptor) -> Option<Arc<RegionEventListener>>;

    /// Regions in the eight cells surrounding `region`.
    ///
    /// Backends differ on whether `region` itself appears in the result;
    /// callers must filter their own handle out. Unreachable grids yield an
    /// empty list.
    async fn request_neighbours(&self, region: &RegionDescriptor) -> Vec<RegionDescriptor>;

    /// Resolves a single region by handle, consulting caches before the
    /// grid. `None` when the region is unknown or the grid unreachable.
    async fn request_neighbour_info(&self, handle: RegionHandle) -> Option<RegionDescriptor>;

    /// Map tiles for every known region inside the inclusive coordinate box.
    async fn request_neighbour_map_blocks(
        &self,
        min_x: u32,
        min_y: u32,
        max_x: u32,
        max_y: u32,
    ) -> Vec<MapBlockDescriptor>;
}

/// Agent hand-off announcements between regions.
#[async_trait]
pub trait InterRegionComms: Send + Sync {
    /// Tells the region at `handle` to expect `circuit` as a child agent.
    ///
    /// `true` only when the destination region confirmed it handled the
    /// announcement.
    async fn inform_region_of_child_agent(
        &self,
        handle: RegionHandle,
        circuit: &AgentCircuit,
    ) -> bool;

    /// Tells the region at `handle` that an avatar is crossing into it at
    /// `position`.
    async fn expect_avatar_crossing(
        &self,
        handle: RegionHandle,
        agent_id: AgentId,
        position: Vector3,
    ) -> bool;
}
