//! Event surface a region exposes to the communications tier.
//!
//! When a region registers with its comms backend it receives a
//! [`RegionEventListener`]. The region wires its own handlers onto the
//! listener; the comms tier later fires those handlers as announcements
//! arrive from neighbouring simulators or the grid. Each event has a single
//! handler slot, so registering twice replaces the earlier handler.
//!
//! Triggers report whether anything was listening. A `false` from a trigger
//! means the event was dropped on the floor, which callers surface as a
//! failed delivery rather than an error.

use std::sync::{Arc, RwLock};

use crate::types::{AgentCircuit, AgentId, AgentPresence, RegionHandle, Vector3};

/// Handler invoked when a neighbour announces an incoming agent
pub type ExpectUserHandler = dyn Fn(RegionHandle, &AgentCircuit) + Send + Sync;
/// Handler invoked when an avatar starts crossing into the region
pub type AvatarCrossingHandler = dyn Fn(RegionHandle, AgentId, Vector3) + Send + Sync;
/// Handler invoked when another process pushes an agent's presence state
pub type PresenceUpdateHandler = dyn Fn(&AgentPresence) + Send + Sync;

/// Per-region callback registry handed out at registration time.
///
/// The listener is shared between the region (which registers handlers) and
/// the comms tier (which triggers them), so every slot sits behind its own
/// lock. Handlers run on whichever task triggered the event and should stay
/// short.
pub struct RegionEventListener {
    expect_user: RwLock<Option<Arc<ExpectUserHandler>>>,
    avatar_crossing: RwLock<Option<Arc<AvatarCrossingHandler>>>,
    presence_update: RwLock<Option<Arc<PresenceUpdateHandler>>>,
}

impl RegionEventListener {
    /// Creates a listener with every slot empty
    pub fn new() -> Self {
        Self {
            expect_user: RwLock::new(None),
            avatar_crossing: RwLock::new(None),
            presence_update: RwLock::new(None),
        }
    }

    /// Registers the handler for incoming agent announcements, replacing any
    /// previous handler.
    pub fn on_expect_user<F>(&self, handler: F)
    where
        F: Fn(RegionHandle, &AgentCircuit) + Send + Sync + 'static,
    {
        let mut slot = match self.expect_user.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *slot = Some(Arc::new(handler));
    }

    /// Registers the handler for avatar crossings, replacing any previous
    /// handler.
    pub fn on_avatar_crossing<F>(&self, handler: F)
    where
        F: Fn(RegionHandle, AgentId, Vector3) + Send + Sync + 'static,
    {
        let mut slot = match self.avatar_crossing.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *slot = Some(Arc::new(handler));
    }

    /// Registers the handler for presence pushes, replacing any previous
    /// handler.
    pub fn on_presence_update<F>(&self, handler: F)
    where
        F: Fn(&AgentPresence) + Send + Sync + 'static,
    {
        let mut slot = match self.presence_update.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *slot = Some(Arc::new(handler));
    }

    /// Fires the expect-user handler. Returns `false` when no handler is
    /// registered.
    pub fn trigger_expect_user(&self, handle: RegionHandle, circuit: &AgentCircuit) -> bool {
        // Clone the handler out of the slot so it runs without the lock held.
        let handler = {
            let slot = match self.expect_user.read() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            slot.clone()
        };
        match handler {
            Some(handler) => {
                handler(handle, circuit);
                true
            }
            None => false,
        }
    }

    /// Fires the avatar-crossing handler. Returns `false` when no handler is
    /// registered.
    pub fn trigger_avatar_crossing(
        &self,
        handle: RegionHandle,
        agent_id: AgentId,
        position: Vector3,
    ) -> bool {
        let handler = {
            let slot = match self.avatar_crossing.read() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            slot.clone()
        };
        match handler {
            Some(handler) => {
                handler(handle, agent_id, position);
                true
            }
            None => false,
        }
    }

    /// Fires the presence handler. Returns `false` when no handler is
    /// registered.
    pub fn trigger_presence_update(&self, presence: &AgentPresence) -> bool {
        let handler = {
            let slot = match self.presence_update.read() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            slot.clone()
        };
        match handler {
            Some(handler) => {
                handler(presence);
                true
            }
            None => false,
        }
    }
}

impl Default for RegionEventListener {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SessionId;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    fn sample_circuit() -> AgentCircuit {
        AgentCircuit {
            agent_id: AgentId::new(),
            session_id: SessionId::new(),
            secure_session_id: SessionId::new(),
            circuit_code: 4100,
            first_name: "Cross".to_string(),
            last_name: "Over".to_string(),
            start_position: Vector3::zero(),
            base_folder: Uuid::new_v4(),
            inventory_folder: Uuid::new_v4(),
            child: true,
        }
    }

    #[test]
    fn test_trigger_without_handler_reports_drop() {
        let listener = RegionEventListener::new();
        let handle = RegionHandle::from_grid_coords(1000, 1000);

        assert!(!listener.trigger_expect_user(handle, &sample_circuit()));
        assert!(!listener.trigger_avatar_crossing(handle, AgentId::new(), Vector3::zero()));
    }

    #[test]
    fn test_registered_handler_receives_event() {
        let listener = RegionEventListener::new();
        let handle = RegionHandle::from_grid_coords(1000, 1000);
        let circuit = sample_circuit();
        let seen = Arc::new(AtomicUsize::new(0));

        let seen_by_handler = seen.clone();
        let expected_agent = circuit.agent_id;
        listener.on_expect_user(move |event_handle, event_circuit| {
            assert_eq!(event_handle, handle);
            assert_eq!(event_circuit.agent_id, expected_agent);
            seen_by_handler.fetch_add(1, Ordering::SeqCst);
        });

        assert!(listener.trigger_expect_user(handle, &circuit));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_second_registration_replaces_first() {
        let listener = RegionEventListener::new();
        let first_hits = Arc::new(AtomicUsize::new(0));
        let second_hits = Arc::new(AtomicUsize::new(0));

        let counter = first_hits.clone();
        listener.on_presence_update(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let counter = second_hits.clone();
        listener.on_presence_update(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let presence = AgentPresence {
            agent_id: AgentId::new(),
            first_name: "Only".to_string(),
            last_name: "Once".to_string(),
            online: true,
            region_handle: RegionHandle::from_grid_coords(1000, 1000),
        };
        assert!(listener.trigger_presence_update(&presence));
        assert_eq!(first_hits.load(Ordering::SeqCst), 0);
        assert_eq!(second_hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_avatar_crossing_carries_position() {
        let listener = RegionEventListener::new();
        let handle = RegionHandle::from_grid_coords(999, 1000);
        let agent_id = AgentId::new();
        let crossing_point = Vector3::new(255.0, 120.0, 22.5);
        let seen = Arc::new(AtomicUsize::new(0));

        let counter = seen.clone();
        listener.on_avatar_crossing(move |event_handle, event_agent, position| {
            assert_eq!(event_handle, handle);
            assert_eq!(event_agent, agent_id);
            assert_eq!(position, crossing_point);
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(listener.trigger_avatar_crossing(handle, agent_id, crossing_point));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
