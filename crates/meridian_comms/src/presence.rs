//! Presence fan-out to the regions hosting an agent's friends.
//!
//! When an agent's online status changes, one [`PresenceNotifier`] push goes
//! out per interested party, addressed to the region currently hosting that
//! party. Presence is advisory: a push that cannot be delivered is logged
//! and forgotten, and the next status change supersedes it anyway. Because
//! a status change can fan out to many regions at once, presence calls get
//! a more generous deadline than regular grid calls.

use std::sync::Arc;
use std::time::Duration;

use meridian_world::types::{AgentPresence, RegionDescriptor};
use serde_json::json;
use tracing::{info, warn};

use crate::client::RpcClient;
use crate::wire::{methods, WireRequest};

/// Deadline for presence pushes
pub const PRESENCE_PUSH_TIMEOUT: Duration = Duration::from_millis(6000);

/// Best-effort sender of agent online-status updates.
pub struct PresenceNotifier {
    client: RpcClient,
}

impl PresenceNotifier {
    /// Creates a notifier with the presence push deadline
    pub fn new() -> Self {
        Self {
            client: RpcClient::with_timeout(PRESENCE_PUSH_TIMEOUT),
        }
    }

    /// Pushes `subject`'s status to the region hosting one interested agent.
    ///
    /// # Arguments
    ///
    /// * `subject` - The agent whose status changed
    /// * `target_region` - Descriptor of the region hosting the agent that
    ///   should hear about it
    pub async fn send_region_presence_update(
        &self,
        subject: &AgentPresence,
        target_region: &RegionDescriptor,
    ) {
        info!(
            "📣 Informing {} at {} that {} {} is {}",
            target_region.name,
            target_region.uri(),
            subject.first_name,
            subject.last_name,
            if subject.online { "online" } else { "offline" }
        );

        let request = WireRequest::new(
            methods::PRESENCE_UPDATE,
            json!({
                "target_region_handle": target_region.handle.0,
                "presence": subject,
            }),
        );

        match self.client.call(&target_region.uri(), &request).await {
            Ok(response) => {
                if let Some(message) = response.error_message() {
                    warn!(
                        "Region {} refused presence update: {}",
                        target_region.name, message
                    );
                }
            }
            Err(e) => {
                warn!(
                    "Presence update to {} at {} failed: {}",
                    target_region.name,
                    target_region.uri(),
                    e
                );
            }
        }
    }

    /// Fires a presence push on its own task so callers fanning out to many
    /// regions never wait on a slow one.
    pub fn spawn_region_presence_update(
        self: &Arc<Self>,
        subject: AgentPresence,
        target_region: RegionDescriptor,
    ) {
        let notifier = Arc::clone(self);
        tokio::spawn(async move {
            notifier
                .send_region_presence_update(&subject, &target_region)
                .await;
        });
    }
}

impl Default for PresenceNotifier {
    fn default() -> Self {
        Self::new()
    }
}
