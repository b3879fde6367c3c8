//! Core types for regions, agents and the data that moves between them.
//!
//! This module contains the fundamental data structures used throughout the
//! Meridian platform: strongly-typed identifiers, the region descriptor that
//! every registration and lookup revolves around, and the circuit/session
//! records exchanged when agents move between simulators.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Width and height of one region cell in meters.
///
/// Grid coordinates are multiplied by this constant to produce the packed
/// [`RegionHandle`] representation, so it must never change for a running
/// grid.
pub const REGION_SIZE: u64 = 256;

/// Unique identifier for an agent (a connected user's avatar).
///
/// # Examples
///
/// ```
/// use meridian_world::types::AgentId;
///
/// let agent_id = AgentId::new();
/// let from_string = AgentId::from_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentId(pub Uuid);

impl AgentId {
    /// Creates a new random agent ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an agent ID from a string representation
    pub fn from_str(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl std::str::FromStr for AgentId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Session token issued at login and presented again on every circuit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Creates a new random session ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a session ID from a string representation
    pub fn from_str(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl std::str::FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a region instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegionId(pub Uuid);

impl RegionId {
    /// Creates a new random region ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a region ID from a string representation
    pub fn from_str(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl std::str::FromStr for RegionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for RegionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RegionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Packed world location of a region, used as the routing key everywhere.
///
/// The handle encodes the region's grid coordinates in meters: the X meter
/// offset in the high 32 bits and the Y meter offset in the low 32 bits.
/// Handles are stable for the lifetime of a grid, which makes them the
/// natural map key for region registries and event routing.
///
/// # Examples
///
/// ```
/// use meridian_world::types::RegionHandle;
///
/// let handle = RegionHandle::from_grid_coords(1000, 1000);
/// assert_eq!(handle.grid_x(), 1000);
/// assert_eq!(handle.grid_y(), 1000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegionHandle(pub u64);

impl RegionHandle {
    /// Packs grid cell coordinates into a handle
    pub fn from_grid_coords(x: u32, y: u32) -> Self {
        Self(((x as u64 * REGION_SIZE) << 32) | (y as u64 * REGION_SIZE))
    }

    /// Grid cell X coordinate encoded in this handle
    pub fn grid_x(&self) -> u32 {
        ((self.0 >> 32) / REGION_SIZE) as u32
    }

    /// Grid cell Y coordinate encoded in this handle
    pub fn grid_y(&self) -> u32 {
        ((self.0 & 0xFFFF_FFFF) / REGION_SIZE) as u32
    }

    /// True when `other` occupies one of the eight surrounding grid cells
    /// (or the same cell).
    pub fn is_adjacent_to(&self, other: RegionHandle) -> bool {
        self.grid_x().abs_diff(other.grid_x()) <= 1 && self.grid_y().abs_diff(other.grid_y()) <= 1
    }
}

impl std::fmt::Display for RegionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 3D position within a region, in meters from the region's southwest corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    /// Creates a new position
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Origin position (0, 0, 0)
    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }
}

impl Default for Vector3 {
    fn default() -> Self {
        Self::zero()
    }
}

/// Everything another process needs to find and talk to a region.
///
/// Descriptors are what simulators send to the grid authority at
/// registration time and what neighbour lookups hand back. The
/// `external_host`/`port` pair is the address other processes dial, not
/// necessarily the address the region bound locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionDescriptor {
    /// Stable unique ID of the region instance
    pub region_id: RegionId,
    /// Packed grid location, the routing key for this region
    pub handle: RegionHandle,
    /// Human-readable region name shown on maps and in logs
    pub name: String,
    /// Hostname or IP other processes use to reach this region
    pub external_host: String,
    /// Port of the region's inter-region RPC endpoint
    pub port: u16,
    /// Key this region presents when calling out, if the grid uses keys
    #[serde(default)]
    pub send_key: Option<String>,
    /// Key this region expects on incoming calls, if the grid uses keys
    #[serde(default)]
    pub recv_key: Option<String>,
}

impl RegionDescriptor {
    /// Creates a descriptor for a region at the given grid cell
    pub fn new(
        region_id: RegionId,
        name: impl Into<String>,
        grid_x: u32,
        grid_y: u32,
        external_host: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            region_id,
            handle: RegionHandle::from_grid_coords(grid_x, grid_y),
            name: name.into(),
            external_host: external_host.into(),
            port,
            send_key: None,
            recv_key: None,
        }
    }

    /// Grid cell X coordinate of this region
    pub fn grid_x(&self) -> u32 {
        self.handle.grid_x()
    }

    /// Grid cell Y coordinate of this region
    pub fn grid_y(&self) -> u32 {
        self.handle.grid_y()
    }

    /// WebSocket URI of the region's inter-region RPC endpoint
    pub fn uri(&self) -> String {
        format!("ws://{}:{}", self.external_host, self.port)
    }
}

/// One tile of the world map, as reported to viewers and neighbour queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapBlockDescriptor {
    /// Grid cell X coordinate
    pub x: u16,
    /// Grid cell Y coordinate
    pub y: u16,
    /// Region name shown on the map
    pub name: String,
    /// Access rating of the region
    pub access: u8,
    /// Region feature flags
    pub region_flags: u32,
    /// Water level of the region in meters
    pub water_height: u8,
    /// Asset ID of the region's map tile image
    pub map_image_id: Uuid,
}

impl MapBlockDescriptor {
    /// Access rating reported for regions that have not set their own
    pub const DEFAULT_ACCESS: u8 = 13;
    /// Flag set reported for regions that have not set their own
    pub const DEFAULT_REGION_FLAGS: u32 = 72458694;
    /// Water level reported for regions that have not set their own
    pub const DEFAULT_WATER_HEIGHT: u8 = 20;

    /// Builds the map tile for a region, using placeholder map settings
    /// until regions report their own.
    pub fn for_region(region: &RegionDescriptor) -> Self {
        Self {
            x: region.grid_x() as u16,
            y: region.grid_y() as u16,
            name: region.name.clone(),
            access: Self::DEFAULT_ACCESS,
            region_flags: Self::DEFAULT_REGION_FLAGS,
            water_height: Self::DEFAULT_WATER_HEIGHT,
            map_image_id: Uuid::nil(),
        }
    }
}

/// Full record of an expected viewer connection.
///
/// A circuit is created ahead of the viewer's arrival, either by the login
/// service for a fresh session or by a neighbouring simulator announcing a
/// child agent. The viewer must later present the matching agent, session
/// and circuit code to be admitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentCircuit {
    /// Agent this circuit belongs to
    pub agent_id: AgentId,
    /// Session token the viewer must present
    pub session_id: SessionId,
    /// Secondary session token, never sent to other agents
    pub secure_session_id: SessionId,
    /// Per-connection code the viewer presents in every packet
    pub circuit_code: u32,
    /// Agent first name
    pub first_name: String,
    /// Agent last name
    pub last_name: String,
    /// Where the agent should appear in the region
    pub start_position: Vector3,
    /// Root folder of the agent's stored asset hierarchy
    pub base_folder: Uuid,
    /// Inventory folder shown to the viewer at login
    pub inventory_folder: Uuid,
    /// True while the agent is only a background presence in this region
    pub child: bool,
}

/// Login summary returned to the region when a circuit check succeeds.
///
/// This is the subset of circuit state the region needs to finish building
/// the avatar. It intentionally omits the start position, which the region
/// reads separately so crossings can update it without re-authenticating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginSession {
    pub agent_id: AgentId,
    pub session_id: SessionId,
    pub secure_session_id: SessionId,
    pub circuit_code: u32,
    pub first_name: String,
    pub last_name: String,
    pub base_folder: Uuid,
    pub inventory_folder: Uuid,
}

/// Outcome of a circuit authentication check.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticateResponse {
    /// Whether the presented credentials matched an expected circuit
    pub authorized: bool,
    /// Login details for the admitted session, present only when authorized
    pub login_info: Option<LoginSession>,
}

impl AuthenticateResponse {
    /// The single refusal value handed out for every failed check.
    ///
    /// Refusals carry no detail about what mismatched, so a caller probing
    /// circuit codes learns nothing from the shape of the response.
    pub fn denied() -> Self {
        Self {
            authorized: false,
            login_info: None,
        }
    }
}

/// Online-status record for an agent, pushed between processes so regions
/// can keep friend lists current.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentPresence {
    /// Agent this record describes
    pub agent_id: AgentId,
    /// Agent first name
    pub first_name: String,
    /// Agent last name
    pub last_name: String,
    /// Whether the agent is currently online
    pub online: bool,
    /// Handle of the region currently hosting the agent
    pub region_handle: RegionHandle,
}

/// Credentials a simulator uses to talk to its grid authority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridCredentials {
    /// URI of the grid authority's RPC endpoint
    pub grid_server_uri: String,
    /// Key presented to the grid authority on outgoing calls
    pub send_key: String,
    /// Key expected from the grid authority on incoming calls
    pub recv_key: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_handle_packs_grid_coords() {
        let handle = RegionHandle::from_grid_coords(1000, 1000);
        assert_eq!(handle.0, (256_000u64 << 32) | 256_000u64);
        assert_eq!(handle.grid_x(), 1000);
        assert_eq!(handle.grid_y(), 1000);
    }

    #[test]
    fn test_region_handle_roundtrip_is_lossless() {
        for (x, y) in [(0, 0), (1, 0), (0, 1), (997, 1003), (65_535, 65_535)] {
            let handle = RegionHandle::from_grid_coords(x, y);
            assert_eq!(handle.grid_x(), x);
            assert_eq!(handle.grid_y(), y);
        }
    }

    #[test]
    fn test_region_handle_adjacency() {
        let center = RegionHandle::from_grid_coords(1000, 1000);
        assert!(center.is_adjacent_to(RegionHandle::from_grid_coords(999, 1001)));
        assert!(center.is_adjacent_to(center));
        assert!(!center.is_adjacent_to(RegionHandle::from_grid_coords(1002, 1000)));
    }

    #[test]
    fn test_agent_id_display_and_parse() {
        let agent_id = AgentId::new();
        let parsed: AgentId = agent_id.to_string().parse().unwrap();
        assert_eq!(agent_id, parsed);
        assert!(AgentId::from_str("not-a-uuid").is_err());
    }

    #[test]
    fn test_region_descriptor_uri() {
        let region = RegionDescriptor::new(
            RegionId::new(),
            "Sandbox",
            1000,
            1000,
            "sim.example.net",
            9000,
        );
        assert_eq!(region.uri(), "ws://sim.example.net:9000");
        assert_eq!(region.grid_x(), 1000);
        assert_eq!(region.grid_y(), 1000);
    }

    #[test]
    fn test_map_block_defaults() {
        let region = RegionDescriptor::new(RegionId::new(), "Sandbox", 42, 7, "127.0.0.1", 9000);
        let block = MapBlockDescriptor::for_region(&region);
        assert_eq!(block.x, 42);
        assert_eq!(block.y, 7);
        assert_eq!(block.access, MapBlockDescriptor::DEFAULT_ACCESS);
        assert_eq!(block.region_flags, MapBlockDescriptor::DEFAULT_REGION_FLAGS);
        assert_eq!(block.map_image_id, Uuid::nil());
    }

    #[test]
    fn test_denied_response_is_opaque() {
        let denied = AuthenticateResponse::denied();
        assert!(!denied.authorized);
        assert!(denied.login_info.is_none());
    }
}
