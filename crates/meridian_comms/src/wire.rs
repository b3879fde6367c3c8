//! Wire format for inter-process RPC.
//!
//! Every call between Meridian processes is one JSON text frame carrying a
//! method name and a single parameter object, answered by one JSON object.
//! Failures are signalled in-band: a response containing an `error` key is
//! an application-level refusal, regardless of what else the object holds.
//!
//! Example request frame:
//!
//! ```json
//! {
//!   "method": "simulator_login",
//!   "params": {
//!     "authkey": "null",
//!     "uuid": "550e8400-e29b-41d4-a716-446655440000",
//!     "sim_ip": "127.0.0.1",
//!     "sim_port": 9000
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::CommsError;

/// Method names understood across the platform
pub mod methods {
    /// Simulator announces itself to the grid authority
    pub const SIMULATOR_LOGIN: &str = "simulator_login";
    /// Query the grid authority for regions inside a coordinate box
    pub const MAP_BLOCK: &str = "map_block";
    /// Push an agent's online status to the region hosting a friend
    pub const PRESENCE_UPDATE: &str = "presence_update";
    /// Announce a child agent to a neighbouring region
    pub const EXPECT_USER: &str = "expect_user";
    /// Announce an avatar crossing into a neighbouring region
    pub const EXPECT_AVATAR_CROSSING: &str = "expect_avatar_crossing";
}

/// One RPC request: a method name plus its single parameter object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireRequest {
    /// Name of the remote operation
    pub method: String,
    /// Single parameter object; field meanings are per-method
    pub params: Value,
}

impl WireRequest {
    /// Creates a request for `method` with the given parameter object
    pub fn new(method: &str, params: Value) -> Self {
        Self {
            method: method.to_string(),
            params,
        }
    }

    /// String field from the parameter object
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str)
    }

    /// Unsigned integer field from the parameter object
    pub fn param_u64(&self, key: &str) -> Option<u64> {
        self.params.get(key).and_then(Value::as_u64)
    }

    /// Serializes the request into a text frame
    pub fn to_frame(&self) -> Result<String, CommsError> {
        serde_json::to_string(self)
            .map_err(|e| CommsError::Protocol(format!("Failed to encode request: {e}")))
    }

    /// Parses a request from a received text frame
    pub fn from_frame(frame: &str) -> Result<Self, CommsError> {
        serde_json::from_str(frame)
            .map_err(|e| CommsError::Protocol(format!("Malformed request frame: {e}")))
    }
}

/// One RPC response: a bare JSON object.
///
/// The presence of an `error` key marks the response as a refusal; every
/// other shape is method-specific.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WireResponse(pub Value);

impl WireResponse {
    /// An empty success response
    pub fn ok() -> Self {
        Self(json!({}))
    }

    /// A response carrying only a delivery flag
    pub fn delivered(success: bool) -> Self {
        Self(json!({ "success": success }))
    }

    /// An application-level refusal
    pub fn error(message: &str) -> Self {
        Self(json!({ "error": message }))
    }

    /// Wraps an arbitrary response body
    pub fn from_value(value: Value) -> Self {
        Self(value)
    }

    /// The refusal message, if this response is one
    pub fn error_message(&self) -> Option<&str> {
        self.0.get("error").and_then(Value::as_str)
    }

    /// The delivery flag, `false` when absent
    pub fn success_flag(&self) -> bool {
        self.0
            .get("success")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Serializes the response into a text frame
    pub fn to_frame(&self) -> Result<String, CommsError> {
        serde_json::to_string(&self.0)
            .map_err(|e| CommsError::Protocol(format!("Failed to encode response: {e}")))
    }

    /// Parses a response from a received text frame
    pub fn from_frame(frame: &str) -> Result<Self, CommsError> {
        let value: Value = serde_json::from_str(frame)
            .map_err(|e| CommsError::Protocol(format!("Malformed response frame: {e}")))?;
        if !value.is_object() {
            return Err(CommsError::Protocol(format!(
                "Response frame is not an object: {frame}"
            )));
        }
        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_roundtrip() {
        let request = WireRequest::new(
            methods::MAP_BLOCK,
            json!({ "xmin": 999, "ymin": 999, "xmax": 1001, "ymax": 1001 }),
        );
        let frame = request.to_frame().unwrap();
        let parsed = WireRequest::from_frame(&frame).unwrap();

        assert_eq!(parsed.method, "map_block");
        assert_eq!(parsed.param_u64("xmin"), Some(999));
        assert_eq!(parsed.param_str("xmin"), None);
    }

    #[test]
    fn test_error_key_marks_refusal() {
        let refusal = WireResponse::error("sim_authkey_mismatch");
        assert_eq!(refusal.error_message(), Some("sim_authkey_mismatch"));

        let success = WireResponse::delivered(true);
        assert_eq!(success.error_message(), None);
        assert!(success.success_flag());

        // A response with neither key is still valid, just a non-delivery.
        assert!(!WireResponse::ok().success_flag());
    }

    #[test]
    fn test_non_object_response_is_protocol_error() {
        assert!(WireResponse::from_frame("[1, 2, 3]").is_err());
        assert!(WireResponse::from_frame("not json at all").is_err());
        assert!(WireResponse::from_frame("{}").is_ok());
    }

    #[test]
    fn test_malformed_request_frame() {
        assert!(WireRequest::from_frame("{\"no_method\": true}").is_err());
    }
}
