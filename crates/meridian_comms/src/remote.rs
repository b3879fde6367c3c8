//! Grid-backed implementation of [`GridServices`].
//!
//! In grid mode every lookup is an RPC against the grid authority. The
//! backend keeps a [`RegionDirectory`] of every descriptor it has seen so
//! that repeat lookups, and the inter-region senders that need a region's
//! address, can be answered without another round trip.
//!
//! All failure handling happens here: a dead or refusing grid authority is
//! logged once per operation and surfaces to the caller as `None` or an
//! empty list, never as an error or a panic.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use meridian_world::events::RegionEventListener;
use meridian_world::types::{
    GridCredentials, MapBlockDescriptor, RegionDescriptor, RegionHandle, RegionId,
};
use serde_json::{json, Value};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::client::RpcClient;
use crate::error::CommsError;
use crate::router::InterRegionRouter;
use crate::traits::GridServices;
use crate::wire::{methods, WireRequest, WireResponse};

/// Cache of every region descriptor this process has learned about.
///
/// Filled by registration and neighbour lookups; consulted by anything that
/// needs to turn a region handle into a dialable address.
pub struct RegionDirectory {
    entries: DashMap<RegionHandle, RegionDescriptor>,
}

impl RegionDirectory {
    /// Creates an empty directory
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Records a descriptor, replacing any previous entry for its handle
    pub fn insert(&self, descriptor: RegionDescriptor) {
        self.entries.insert(descriptor.handle, descriptor);
    }

    /// Descriptor for a handle, if this process has seen one
    pub fn lookup(&self, handle: RegionHandle) -> Option<RegionDescriptor> {
        self.entries.get(&handle).map(|entry| entry.value().clone())
    }

    /// Number of known regions
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the directory has seen no regions yet
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for RegionDirectory {
    fn default() -> Self {
        Self::new()
    }
}

/// Grid services backed by a remote grid authority.
pub struct RemoteGridServices {
    credentials: GridCredentials,
    client: RpcClient,
    directory: Arc<RegionDirectory>,
    router: Arc<InterRegionRouter>,
}

impl RemoteGridServices {
    /// Creates a backend that talks to the authority named in `credentials`
    pub fn new(
        credentials: GridCredentials,
        directory: Arc<RegionDirectory>,
        router: Arc<InterRegionRouter>,
    ) -> Self {
        Self {
            credentials,
            client: RpcClient::new(),
            directory,
            router,
        }
    }

    /// Sends one request to the grid authority, turning in-band `error`
    /// responses into [`CommsError::Remote`].
    async fn call_grid(&self, request: &WireRequest) -> Result<WireResponse, CommsError> {
        let response = self
            .client
            .call(&self.credentials.grid_server_uri, request)
            .await?;
        if let Some(message) = response.error_message() {
            return Err(CommsError::Remote(message.to_string()));
        }
        Ok(response)
    }

    /// Runs one map_block query and returns the raw profile objects.
    async fn map_block_query(
        &self,
        min_x: u32,
        min_y: u32,
        max_x: u32,
        max_y: u32,
    ) -> Option<WireResponse> {
        let request = WireRequest::new(
            methods::MAP_BLOCK,
            json!({ "xmin": min_x, "ymin": min_y, "xmax": max_x, "ymax": max_y }),
        );
        match self.call_grid(&request).await {
            Ok(response) => Some(response),
            Err(e) => {
                warn!(
                    "map_block query against {} failed: {}",
                    self.credentials.grid_server_uri, e
                );
                None
            }
        }
    }

    /// Extracts region descriptors from a map_block response, caching each
    /// one in the directory.
    fn collect_profiles(&self, response: &WireResponse) -> Vec<RegionDescriptor> {
        let mut regions = Vec::new();
        let Some(profiles) = response.0.get("sim-profiles").and_then(Value::as_object) else {
            warn!("map_block response carried no sim-profiles object");
            return regions;
        };

        for profile in profiles.values() {
            match parse_sim_profile(profile) {
                Some(descriptor) => {
                    self.directory.insert(descriptor.clone());
                    regions.push(descriptor);
                }
                None => warn!("Skipping malformed sim profile: {}", profile),
            }
        }
        regions
    }
}

#[async_trait]
impl GridServices for RemoteGridServices {
    async fn register_region(&self, region: &RegionDescriptor) -> Option<Arc<RegionEventListener>> {
        let request = WireRequest::new(
            methods::SIMULATOR_LOGIN,
            json!({
                "authkey": self.credentials.send_key,
                "uuid": region.region_id.to_string(),
                "sim_ip": region.external_host,
                "sim_port": region.port,
                "region_handle": region.handle.0,
                "region_name": region.name,
            }),
        );

        match self.call_grid(&request).await {
            Ok(_) => {
                info!(
                    "🌐 Region '{}' registered with grid authority at {}",
                    region.name, self.credentials.grid_server_uri
                );
                self.directory.insert(region.clone());
                let listener = Arc::new(RegionEventListener::new());
                self.router.attach(region.handle, listener.clone());
                Some(listener)
            }
            Err(e) => {
                error!("Unable to connect to grid: {}", e);
                None
            }
        }
    }

    async fn request_neighbours(&self, region: &RegionDescriptor) -> Vec<RegionDescriptor> {
        let x = region.grid_x();
        let y = region.grid_y();
        let response = match self
            .map_block_query(x.saturating_sub(1), y.saturating_sub(1), x + 1, y + 1)
            .await
        {
            Some(response) => response,
            None => return Vec::new(),
        };
        // The authority includes the caller itself; callers filter their
        // own handle out.
        self.collect_profiles(&response)
    }

    async fn request_neighbour_info(&self, handle: RegionHandle) -> Option<RegionDescriptor> {
        if let Some(known) = self.directory.lookup(handle) {
            return Some(known);
        }

        let x = handle.grid_x();
        let y = handle.grid_y();
        let response = self.map_block_query(x, y, x, y).await?;
        self.collect_profiles(&response)
            .into_iter()
            .find(|descriptor| descriptor.handle == handle)
    }

    async fn request_neighbour_map_blocks(
        &self,
        min_x: u32,
        min_y: u32,
        max_x: u32,
        max_y: u32,
    ) -> Vec<MapBlockDescriptor> {
        let response = match self.map_block_query(min_x, min_y, max_x, max_y).await {
            Some(response) => response,
            None => return Vec::new(),
        };

        let Some(profiles) = response.0.get("sim-profiles").and_then(Value::as_object) else {
            warn!("map_block response carried no sim-profiles object");
            return Vec::new();
        };
        profiles.values().filter_map(parse_map_block).collect()
    }
}

/// Parses one sim profile object into a region descriptor.
///
/// Profile fields follow the map_block wire shape: `regionhandle`, `name`,
/// `sim_ip`, `sim_port` and `uuid` are required; anything else is ignored.
fn parse_sim_profile(profile: &Value) -> Option<RegionDescriptor> {
    let handle = RegionHandle(profile.get("regionhandle")?.as_u64()?);
    let name = profile.get("name")?.as_str()?.to_string();
    let external_host = profile.get("sim_ip")?.as_str()?.to_string();
    let port = u16::try_from(profile.get("sim_port")?.as_u64()?).ok()?;
    let region_id = RegionId(Uuid::parse_str(profile.get("uuid")?.as_str()?).ok()?);

    Some(RegionDescriptor {
        region_id,
        handle,
        name,
        external_host,
        port,
        send_key: None,
        recv_key: None,
    })
}

/// Parses one sim profile object into a map tile.
fn parse_map_block(profile: &Value) -> Option<MapBlockDescriptor> {
    Some(MapBlockDescriptor {
        x: u16::try_from(profile.get("x")?.as_u64()?).ok()?,
        y: u16::try_from(profile.get("y")?.as_u64()?).ok()?,
        name: profile.get("name")?.as_str()?.to_string(),
        access: u8::try_from(profile.get("access")?.as_u64()?).ok()?,
        region_flags: u32::try_from(profile.get("region-flags")?.as_u64()?).ok()?,
        water_height: u8::try_from(profile.get("water-height")?.as_u64()?).ok()?,
        map_image_id: Uuid::parse_str(profile.get("map-image-id")?.as_str()?).ok()?,
    })
}
