//! Standalone backend: the whole grid inside one process.
//!
//! In standalone mode there is no grid authority and no wire traffic.
//! [`LocalGridServices`] keeps the region registry in memory and satisfies
//! both service traits directly, delivering inter-region events through the
//! shared [`InterRegionRouter`]. Sandbox deployments and most tests run on
//! this backend; the trait surface guarantees region code behaves the same
//! when it later moves onto a real grid.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use meridian_world::events::RegionEventListener;
use meridian_world::types::{
    AgentCircuit, AgentId, LoginSession, MapBlockDescriptor, RegionDescriptor, RegionHandle,
    Vector3,
};
use tracing::{debug, info, warn};

use crate::router::InterRegionRouter;
use crate::traits::{GridServices, InterRegionComms};

/// Where freshly logged-in agents appear when the login service does not
/// say otherwise: region center at ground height.
pub const DEFAULT_LOGIN_POSITION: Vector3 = Vector3 {
    x: 128.0,
    y: 128.0,
    z: 70.0,
};

/// In-memory grid services for single-process deployments.
pub struct LocalGridServices {
    /// Registered regions by handle
    regions: DashMap<RegionHandle, RegionDescriptor>,
    /// Shared router carrying events to hosted regions
    router: Arc<InterRegionRouter>,
}

impl LocalGridServices {
    /// Creates an empty standalone grid delivering through `router`
    pub fn new(router: Arc<InterRegionRouter>) -> Self {
        Self {
            regions: DashMap::new(),
            router,
        }
    }

    /// Number of regions currently registered
    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    /// Hands a fresh login session to the region that should host it.
    ///
    /// The session is turned into a root-agent circuit at the default login
    /// position and delivered like any other incoming agent. Returns `false`
    /// when the region dropped the announcement or is not registered here.
    pub fn add_new_session(&self, handle: RegionHandle, login: &LoginSession) -> bool {
        if !self.regions.contains_key(&handle) {
            warn!(
                "Login for {} {} targets unknown region handle {}",
                login.first_name, login.last_name, handle
            );
            return false;
        }

        let circuit = AgentCircuit {
            agent_id: login.agent_id,
            session_id: login.session_id,
            secure_session_id: login.secure_session_id,
            circuit_code: login.circuit_code,
            first_name: login.first_name.clone(),
            last_name: login.last_name.clone(),
            start_position: DEFAULT_LOGIN_POSITION,
            base_folder: login.base_folder,
            inventory_folder: login.inventory_folder,
            child: false,
        };
        debug!(
            "Handing login session for {} {} to region at handle {}",
            login.first_name, login.last_name, handle
        );
        self.router.deliver_expect_user(handle, &circuit)
    }
}

#[async_trait]
impl GridServices for LocalGridServices {
    async fn register_region(&self, region: &RegionDescriptor) -> Option<Arc<RegionEventListener>> {
        let listener = Arc::new(RegionEventListener::new());

        if self
            .regions
            .insert(region.handle, region.clone())
            .is_some()
        {
            // Same handle showing up again means the region process bounced.
            warn!(
                "Region '{}' was already registered. Region went down and came back up, refreshing its record",
                region.name
            );
        } else {
            info!(
                "🌍 Region '{}' registered at ({}, {})",
                region.name,
                region.grid_x(),
                region.grid_y()
            );
        }

        self.router.attach(region.handle, listener.clone());
        Some(listener)
    }

    async fn request_neighbours(&self, region: &RegionDescriptor) -> Vec<RegionDescriptor> {
        self.regions
            .iter()
            .filter(|entry| entry.handle != region.handle)
            .filter(|entry| entry.handle.is_adjacent_to(region.handle))
            .map(|entry| entry.value().clone())
            .collect()
    }

    async fn request_neighbour_info(&self, handle: RegionHandle) -> Option<RegionDescriptor> {
        self.regions.get(&handle).map(|entry| entry.value().clone())
    }

    async fn request_neighbour_map_blocks(
        &self,
        min_x: u32,
        min_y: u32,
        max_x: u32,
        max_y: u32,
    ) -> Vec<MapBlockDescriptor> {
        self.regions
            .iter()
            .filter(|entry| {
                let x = entry.grid_x();
                let y = entry.grid_y();
                x >= min_x && x <= max_x && y >= min_y && y <= max_y
            })
            .map(|entry| MapBlockDescriptor::for_region(entry.value()))
            .collect()
    }
}

#[async_trait]
impl InterRegionComms for LocalGridServices {
    async fn inform_region_of_child_agent(
        &self,
        handle: RegionHandle,
        circuit: &AgentCircuit,
    ) -> bool {
        self.router.deliver_expect_user(handle, circuit)
    }

    async fn expect_avatar_crossing(
        &self,
        handle: RegionHandle,
        agent_id: AgentId,
        position: Vector3,
    ) -> bool {
        self.router.deliver_avatar_crossing(handle, agent_id, position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_world::types::{RegionId, SessionId};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use uuid::Uuid;

    fn descriptor(name: &str, x: u32, y: u32) -> RegionDescriptor {
        RegionDescriptor::new(RegionId::new(), name, x, y, "127.0.0.1", 9000)
    }

    fn sample_login() -> LoginSession {
        LoginSession {
            agent_id: AgentId::new(),
            session_id: SessionId::new(),
            secure_session_id: SessionId::new(),
            circuit_code: 6100,
            first_name: "Fresh".to_string(),
            last_name: "Login".to_string(),
            base_folder: Uuid::new_v4(),
            inventory_folder: Uuid::new_v4(),
        }
    }

    #[tokio::test]
    async fn test_neighbours_exclude_the_caller() {
        let grid = LocalGridServices::new(Arc::new(InterRegionRouter::new()));
        let center = descriptor("Center", 1000, 1000);

        grid.register_region(&center).await.unwrap();
        grid.register_region(&descriptor("East", 1001, 1000)).await.unwrap();
        grid.register_region(&descriptor("Northwest", 999, 1001)).await.unwrap();
        grid.register_region(&descriptor("Far", 1005, 1000)).await.unwrap();

        let neighbours = grid.request_neighbours(&center).await;
        let names: Vec<_> = neighbours.iter().map(|n| n.name.as_str()).collect();

        assert_eq!(neighbours.len(), 2);
        assert!(names.contains(&"East"));
        assert!(names.contains(&"Northwest"));
        assert!(!names.contains(&"Center"));
        assert!(!names.contains(&"Far"));
    }

    #[tokio::test]
    async fn test_reregistration_refreshes_descriptor_and_listener() {
        let router = Arc::new(InterRegionRouter::new());
        let grid = LocalGridServices::new(router.clone());

        let mut region = descriptor("Phoenix", 1000, 1000);
        let first_listener = grid.register_region(&region).await.unwrap();
        let stale_hits = Arc::new(AtomicUsize::new(0));
        let counter = stale_hits.clone();
        first_listener.on_expect_user(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        // The region restarts on a new port and registers again.
        region.port = 9001;
        let second_listener = grid.register_region(&region).await.unwrap();
        let fresh_hits = Arc::new(AtomicUsize::new(0));
        let counter = fresh_hits.clone();
        second_listener.on_expect_user(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(grid.region_count(), 1);
        let refreshed = grid.request_neighbour_info(region.handle).await.unwrap();
        assert_eq!(refreshed.port, 9001);

        // Only the fresh listener is wired to the router now.
        let login = sample_login();
        assert!(grid.add_new_session(region.handle, &login));
        assert_eq!(stale_hits.load(Ordering::SeqCst), 0);
        assert_eq!(fresh_hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_add_new_session_synthesizes_root_circuit() {
        let grid = LocalGridServices::new(Arc::new(InterRegionRouter::new()));
        let region = descriptor("Landing", 1000, 1000);
        let listener = grid.register_region(&region).await.unwrap();

        let received = Arc::new(Mutex::new(None));
        let sink = received.clone();
        listener.on_expect_user(move |_, circuit| {
            *sink.lock().unwrap() = Some(circuit.clone());
        });

        let login = sample_login();
        assert!(grid.add_new_session(region.handle, &login));

        let circuit = received.lock().unwrap().clone().unwrap();
        assert_eq!(circuit.agent_id, login.agent_id);
        assert_eq!(circuit.circuit_code, login.circuit_code);
        assert_eq!(circuit.start_position, DEFAULT_LOGIN_POSITION);
        assert!(!circuit.child);
    }

    #[tokio::test]
    async fn test_add_new_session_to_unknown_region_fails() {
        let grid = LocalGridServices::new(Arc::new(InterRegionRouter::new()));
        let login = sample_login();
        assert!(!grid.add_new_session(RegionHandle::from_grid_coords(1, 1), &login));
    }

    #[tokio::test]
    async fn test_map_blocks_cover_requested_box() {
        let grid = LocalGridServices::new(Arc::new(InterRegionRouter::new()));
        grid.register_region(&descriptor("Inside", 1000, 1000)).await.unwrap();
        grid.register_region(&descriptor("Edge", 1001, 1001)).await.unwrap();
        grid.register_region(&descriptor("Outside", 1002, 1000)).await.unwrap();

        let blocks = grid.request_neighbour_map_blocks(999, 999, 1001, 1001).await;
        let names: Vec<_> = blocks.iter().map(|b| b.name.as_str()).collect();

        assert_eq!(blocks.len(), 2);
        assert!(names.contains(&"Inside"));
        assert!(names.contains(&"Edge"));
        for block in &blocks {
            assert_eq!(block.access, MapBlockDescriptor::DEFAULT_ACCESS);
            assert_eq!(block.region_flags, MapBlockDescriptor::DEFAULT_REGION_FLAGS);
        }
    }

    #[tokio::test]
    async fn test_child_agent_announcement_stays_in_process() {
        let grid = LocalGridServices::new(Arc::new(InterRegionRouter::new()));
        let region = descriptor("Target", 1000, 1000);
        let listener = grid.register_region(&region).await.unwrap();

        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        listener.on_expect_user(move |_, circuit| {
            assert!(circuit.child);
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let circuit = AgentCircuit {
            agent_id: AgentId::new(),
            session_id: SessionId::new(),
            secure_session_id: SessionId::new(),
            circuit_code: 6200,
            first_name: "Child".to_string(),
            last_name: "Agent".to_string(),
            start_position: Vector3::zero(),
            base_folder: Uuid::new_v4(),
            inventory_folder: Uuid::new_v4(),
            child: true,
        };
        assert!(grid.inform_region_of_child_agent(region.handle, &circuit).await);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        // Unregistered destination drops the announcement.
        assert!(
            !grid
                .inform_region_of_child_agent(RegionHandle::from_grid_coords(5, 5), &circuit)
                .await
        );
    }

    #[tokio::test]
    async fn test_avatar_crossing_reaches_listener() {
        let grid = LocalGridServices::new(Arc::new(InterRegionRouter::new()));
        let region = descriptor("Crossing", 1000, 1000);
        let listener = grid.register_region(&region).await.unwrap();

        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        listener.on_avatar_crossing(move |_, _, position| {
            assert_eq!(position, Vector3::new(0.5, 128.0, 21.0));
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let delivered = grid
            .expect_avatar_crossing(region.handle, AgentId::new(), Vector3::new(0.5, 128.0, 21.0))
            .await;
        assert!(delivered);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
