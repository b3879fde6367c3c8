//! Inter-region announcements over the wire.
//!
//! The outbound half, [`RemoteInterRegionComms`], resolves the destination
//! region's address from the [`RegionDirectory`] and pushes the
//! announcement as an RPC. The inbound half,
//! [`register_inter_region_handlers`], mounts the matching methods on a
//! simulator's [`RpcServer`] and feeds received announcements into the
//! local [`InterRegionRouter`]. A destination confirms an announcement only
//! when a hosted region actually consumed it, so `success: false` from the
//! far side means the agent hand-off did not happen.

use std::sync::Arc;

use async_trait::async_trait;
use meridian_world::types::{AgentCircuit, AgentId, AgentPresence, RegionHandle, Vector3};
use serde_json::json;
use tracing::{debug, warn};

use crate::client::RpcClient;
use crate::remote::RegionDirectory;
use crate::router::InterRegionRouter;
use crate::server::RpcServer;
use crate::traits::InterRegionComms;
use crate::wire::{methods, WireRequest, WireResponse};

/// Wire-based sender for agent hand-off announcements.
pub struct RemoteInterRegionComms {
    client: RpcClient,
    directory: Arc<RegionDirectory>,
}

impl RemoteInterRegionComms {
    /// Creates a sender that resolves destinations through `directory`
    pub fn new(directory: Arc<RegionDirectory>) -> Self {
        Self {
            client: RpcClient::new(),
            directory,
        }
    }

    /// Sends one announcement to the region at `handle` and reads back the
    /// delivery flag.
    async fn push(&self, handle: RegionHandle, request: &WireRequest) -> bool {
        let Some(target) = self.directory.lookup(handle) else {
            warn!(
                "No known endpoint for region handle {}; dropping {} announcement",
                handle, request.method
            );
            return false;
        };

        match self.client.call(&target.uri(), request).await {
            Ok(response) => {
                if let Some(message) = response.error_message() {
                    warn!(
                        "Region '{}' refused {} announcement: {}",
                        target.name, request.method, message
                    );
                    return false;
                }
                response.success_flag()
            }
            Err(e) => {
                warn!(
                    "{} announcement to region '{}' at {} failed: {}",
                    request.method,
                    target.name,
                    target.uri(),
                    e
                );
                false
            }
        }
    }
}

#[async_trait]
impl InterRegionComms for RemoteInterRegionComms {
    async fn inform_region_of_child_agent(
        &self,
        handle: RegionHandle,
        circuit: &AgentCircuit,
    ) -> bool {
        let request = WireRequest::new(
            methods::EXPECT_USER,
            json!({ "region_handle": handle.0, "circuit": circuit }),
        );
        self.push(handle, &request).await
    }

    async fn expect_avatar_crossing(
        &self,
        handle: RegionHandle,
        agent_id: AgentId,
        position: Vector3,
    ) -> bool {
        let request = WireRequest::new(
            methods::EXPECT_AVATAR_CROSSING,
            json!({
                "region_handle": handle.0,
                "agent_id": agent_id,
                "position": position,
            }),
        );
        self.push(handle, &request).await
    }
}

/// Mounts the inter-region methods on a simulator's RPC endpoint.
///
/// Incoming announcements are parsed, delivered through `router` and
/// answered with the router's delivery flag. Malformed announcements are
/// refused in-band without touching any region.
pub fn register_inter_region_handlers(server: &RpcServer, router: Arc<InterRegionRouter>) {
    let expect_user_router = router.clone();
    server.register(methods::EXPECT_USER, move |request: WireRequest| {
        let router = expect_user_router.clone();
        async move {
            let Some(handle) = request.param_u64("region_handle") else {
                return WireResponse::error("expect_user: missing region_handle");
            };
            let circuit = match request.params.get("circuit").cloned() {
                Some(value) => match serde_json::from_value::<AgentCircuit>(value) {
                    Ok(circuit) => circuit,
                    Err(e) => {
                        return WireResponse::error(&format!("expect_user: malformed circuit: {e}"))
                    }
                },
                None => return WireResponse::error("expect_user: missing circuit"),
            };

            let handle = RegionHandle(handle);
            debug!(
                "expect_user for agent {} arriving at handle {}",
                circuit.agent_id, handle
            );
            WireResponse::delivered(router.deliver_expect_user(handle, &circuit))
        }
    });

    let crossing_router = router.clone();
    server.register(
        methods::EXPECT_AVATAR_CROSSING,
        move |request: WireRequest| {
            let router = crossing_router.clone();
            async move {
                let Some(handle) = request.param_u64("region_handle") else {
                    return WireResponse::error("expect_avatar_crossing: missing region_handle");
                };
                let Some(agent_id) = request
                    .param_str("agent_id")
                    .and_then(|s| s.parse::<AgentId>().ok())
                else {
                    return WireResponse::error("expect_avatar_crossing: missing agent_id");
                };
                let position = match request.params.get("position").cloned() {
                    Some(value) => match serde_json::from_value::<Vector3>(value) {
                        Ok(position) => position,
                        Err(e) => {
                            return WireResponse::error(&format!(
                                "expect_avatar_crossing: malformed position: {e}"
                            ))
                        }
                    },
                    None => return WireResponse::error("expect_avatar_crossing: missing position"),
                };

                let delivered =
                    router.deliver_avatar_crossing(RegionHandle(handle), agent_id, position);
                WireResponse::delivered(delivered)
            }
        },
    );

    server.register(methods::PRESENCE_UPDATE, move |request: WireRequest| {
        let router = router.clone();
        async move {
            let Some(handle) = request.param_u64("target_region_handle") else {
                return WireResponse::error("presence_update: missing target_region_handle");
            };
            let presence = match request.params.get("presence").cloned() {
                Some(value) => match serde_json::from_value::<AgentPresence>(value) {
                    Ok(presence) => presence,
                    Err(e) => {
                        return WireResponse::error(&format!(
                            "presence_update: malformed presence: {e}"
                        ))
                    }
                },
                None => return WireResponse::error("presence_update: missing presence"),
            };

            let delivered = router.deliver_presence_update(RegionHandle(handle), &presence);
            WireResponse::delivered(delivered)
        }
    });
}
