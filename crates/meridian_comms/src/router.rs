//! In-process event routing between hosted regions.
//!
//! A process can host any number of regions; the [`InterRegionRouter`] maps
//! each hosted region's handle to its [`RegionEventListener`] and delivers
//! events to the right one. Inbound wire handlers and the standalone
//! backend both deliver through the router, so a region cannot tell whether
//! an event originated next door in the same process or on another host.

use std::sync::Arc;

use dashmap::DashMap;
use meridian_world::events::RegionEventListener;
use meridian_world::types::{AgentCircuit, AgentId, AgentPresence, RegionHandle, Vector3};
use tracing::debug;

/// Routes region events to the listeners of locally hosted regions.
///
/// Delivery reports `false` when no region is attached under the handle or
/// when the attached listener has no handler for the event. Either way the
/// event is gone; callers treat `false` as a failed hand-off.
pub struct InterRegionRouter {
    listeners: DashMap<RegionHandle, Arc<RegionEventListener>>,
}

impl InterRegionRouter {
    /// Creates a router with no regions attached
    pub fn new() -> Self {
        Self {
            listeners: DashMap::new(),
        }
    }

    /// Attaches a hosted region's listener under its handle, replacing any
    /// listener previously attached there.
    pub fn attach(&self, handle: RegionHandle, listener: Arc<RegionEventListener>) {
        if self.listeners.insert(handle, listener).is_some() {
            debug!("Replaced event listener for region handle {}", handle);
        }
    }

    /// Detaches the listener for a handle. Returns `false` when nothing was
    /// attached.
    pub fn detach(&self, handle: RegionHandle) -> bool {
        self.listeners.remove(&handle).is_some()
    }

    /// Whether a region is attached under the handle
    pub fn is_attached(&self, handle: RegionHandle) -> bool {
        self.listeners.contains_key(&handle)
    }

    /// Number of locally hosted regions
    pub fn region_count(&self) -> usize {
        self.listeners.len()
    }

    // Clone the listener out so the registry shard is not held while the
    // handler runs; a handler may attach or detach regions itself.
    fn listener_for(&self, handle: RegionHandle) -> Option<Arc<RegionEventListener>> {
        self.listeners
            .get(&handle)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Delivers a child agent announcement to the region at `handle`
    pub fn deliver_expect_user(&self, handle: RegionHandle, circuit: &AgentCircuit) -> bool {
        match self.listener_for(handle) {
            Some(listener) => listener.trigger_expect_user(handle, circuit),
            None => false,
        }
    }

    /// Delivers an avatar crossing to the region at `handle`
    pub fn deliver_avatar_crossing(
        &self,
        handle: RegionHandle,
        agent_id: AgentId,
        position: Vector3,
    ) -> bool {
        match self.listener_for(handle) {
            Some(listener) => listener.trigger_avatar_crossing(handle, agent_id, position),
            None => false,
        }
    }

    /// Delivers a presence update to the region at `handle`
    pub fn deliver_presence_update(&self, handle: RegionHandle, presence: &AgentPresence) -> bool {
        match self.listener_for(handle) {
            Some(listener) => listener.trigger_presence_update(presence),
            None => false,
        }
    }
}

impl Default for InterRegionRouter {
    fn default() -> Self {
        Self::new()
    }
}
