//! Minimal grid authority: the registry side of grid mode.
//!
//! One process on a grid runs the [`GridAuthority`]. It accepts
//! `simulator_login` registrations from simulators that present the shared
//! key, remembers where every region lives and answers `map_block` queries
//! over that registry. Registration is keyed by region handle and always
//! last-write-wins, so a simulator that crashed and restarted simply
//! refreshes its record; there is no dead state an operator has to clear.

use std::sync::Arc;

use dashmap::DashMap;
use meridian_world::types::{MapBlockDescriptor, RegionDescriptor, RegionHandle, RegionId};
use meridian_world::utils::current_timestamp;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::server::RpcServer;
use crate::wire::{methods, WireRequest, WireResponse};

/// Box queried when a map_block request names no coordinates
const DEFAULT_MAP_WINDOW: (u64, u64, u64, u64) = (980, 980, 1020, 1020);

/// One registered region and when it last checked in
struct RegisteredRegion {
    descriptor: RegionDescriptor,
    last_seen_at: u64,
}

/// Region registry and lookup service for a grid.
pub struct GridAuthority {
    /// Key simulators must present to register
    recv_key: String,
    /// Registered regions by handle
    regions: DashMap<RegionHandle, RegisteredRegion>,
}

impl GridAuthority {
    /// Creates an authority that accepts registrations bearing `recv_key`
    pub fn new(recv_key: &str) -> Self {
        Self {
            recv_key: recv_key.to_string(),
            regions: DashMap::new(),
        }
    }

    /// Number of regions currently registered
    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    /// Drops every region whose last registration is older than
    /// `max_age_secs`. Returns how many were dropped.
    ///
    /// Simulators re-register on restart rather than deregistering on the
    /// way down, so stale records are expected and cleaned up here.
    pub fn evict_stale(&self, max_age_secs: u64) -> usize {
        let now = current_timestamp();
        let before = self.regions.len();
        self.regions
            .retain(|_, region| now.saturating_sub(region.last_seen_at) <= max_age_secs);
        let evicted = before - self.regions.len();
        if evicted > 0 {
            info!("🧹 Evicted {} stale region registration(s)", evicted);
        }
        evicted
    }

    pub(crate) fn upsert(&self, descriptor: RegionDescriptor, last_seen_at: u64) {
        let handle = descriptor.handle;
        let replaced = self
            .regions
            .insert(
                handle,
                RegisteredRegion {
                    descriptor,
                    last_seen_at,
                },
            )
            .is_some();
        if replaced {
            info!("Region at handle {} refreshed its registration", handle);
        }
    }

    pub(crate) fn last_seen_at(&self, handle: RegionHandle) -> Option<u64> {
        self.regions.get(&handle).map(|region| region.last_seen_at)
    }

    pub(crate) fn handle_simulator_login(&self, request: &WireRequest) -> WireResponse {
        let Some(authkey) = request.param_str("authkey") else {
            return WireResponse::error("simulator_login: missing authkey");
        };
        if authkey != self.recv_key {
            warn!("Simulator presented a bad authkey, refusing registration");
            return WireResponse::error("sim_authkey_mismatch");
        }

        let Some(region_id) = request
            .param_str("uuid")
            .and_then(|s| Uuid::parse_str(s).ok())
        else {
            return WireResponse::error("simulator_login: missing uuid");
        };
        let Some(sim_ip) = request.param_str("sim_ip") else {
            return WireResponse::error("simulator_login: missing sim_ip");
        };
        let Some(sim_port) = request
            .param_u64("sim_port")
            .and_then(|p| u16::try_from(p).ok())
        else {
            return WireResponse::error("simulator_login: missing sim_port");
        };
        let Some(handle) = request.param_u64("region_handle") else {
            return WireResponse::error("simulator_login: missing region_handle");
        };
        let Some(region_name) = request.param_str("region_name") else {
            return WireResponse::error("simulator_login: missing region_name");
        };

        let handle = RegionHandle(handle);
        let descriptor = RegionDescriptor {
            region_id: RegionId(region_id),
            handle,
            name: region_name.to_string(),
            external_host: sim_ip.to_string(),
            port: sim_port,
            send_key: None,
            recv_key: None,
        };

        info!(
            "🌍 Simulator login from '{}' at {}:{} (handle {})",
            region_name, sim_ip, sim_port, handle
        );
        self.upsert(descriptor, current_timestamp());

        WireResponse::from_value(json!({ "region_handle": handle.0 }))
    }

    pub(crate) fn handle_map_block(&self, request: &WireRequest) -> WireResponse {
        let (default_xmin, default_ymin, default_xmax, default_ymax) = DEFAULT_MAP_WINDOW;
        let xmin = request.param_u64("xmin").unwrap_or(default_xmin);
        let ymin = request.param_u64("ymin").unwrap_or(default_ymin);
        let xmax = request.param_u64("xmax").unwrap_or(default_xmax);
        let ymax = request.param_u64("ymax").unwrap_or(default_ymax);

        let mut profiles = serde_json::Map::new();
        for entry in self.regions.iter() {
            let descriptor = &entry.descriptor;
            let x = u64::from(descriptor.grid_x());
            let y = u64::from(descriptor.grid_y());
            if x < xmin || x > xmax || y < ymin || y > ymax {
                continue;
            }

            let tile = MapBlockDescriptor::for_region(descriptor);
            profiles.insert(
                descriptor.handle.to_string(),
                json!({
                    "regionhandle": descriptor.handle.0,
                    "x": x,
                    "y": y,
                    "name": descriptor.name,
                    "sim_ip": descriptor.external_host,
                    "sim_port": descriptor.port,
                    "sim_uri": descriptor.uri(),
                    "uuid": descriptor.region_id.to_string(),
                    "access": tile.access,
                    "region-flags": tile.region_flags,
                    "water-height": tile.water_height,
                    "map-image-id": tile.map_image_id.to_string(),
                }),
            );
        }

        WireResponse::from_value(json!({ "sim-profiles": profiles }))
    }

    /// Mounts the grid methods on an RPC endpoint.
    pub fn register_grid_handlers(self: &Arc<Self>, server: &RpcServer) {
        let authority = Arc::clone(self);
        server.register(methods::SIMULATOR_LOGIN, move |request: WireRequest| {
            let authority = Arc::clone(&authority);
            async move { authority.handle_simulator_login(&request) }
        });

        let authority = Arc::clone(self);
        server.register(methods::MAP_BLOCK, move |request: WireRequest| {
            let authority = Arc::clone(&authority);
            async move { authority.handle_map_block(&request) }
        });
    }
}
