//! Outbound RPC client.
//!
//! One call is one short-lived WebSocket connection: dial, send the request
//! frame, wait for the single response frame, close. The whole exchange runs
//! under one deadline so a stalled peer costs a caller at most the
//! configured timeout, never an unbounded wait.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::trace;

use crate::error::CommsError;
use crate::wire::{WireRequest, WireResponse};

/// Deadline applied to grid and inter-region calls unless overridden
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_millis(3000);

/// Client for single-shot RPC exchanges with other Meridian processes
#[derive(Debug, Clone)]
pub struct RpcClient {
    timeout: Duration,
}

impl RpcClient {
    /// Creates a client with the default call deadline
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Creates a client with a custom call deadline
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Sends one request to `uri` and waits for its response.
    ///
    /// The deadline covers the full exchange, connection setup included.
    ///
    /// # Arguments
    ///
    /// * `uri` - WebSocket endpoint, e.g. `ws://127.0.0.1:8001`
    /// * `request` - The request to send
    ///
    /// # Returns
    ///
    /// The response object as sent by the peer. A response carrying an
    /// `error` key is returned as `Ok`; in-band refusals are for the caller
    /// to interpret.
    pub async fn call(&self, uri: &str, request: &WireRequest) -> Result<WireResponse, CommsError> {
        let deadline = self.timeout;
        match tokio::time::timeout(deadline, self.exchange(uri, request)).await {
            Ok(result) => result,
            Err(_) => Err(CommsError::Timeout(deadline)),
        }
    }

    async fn exchange(&self, uri: &str, request: &WireRequest) -> Result<WireResponse, CommsError> {
        let frame = request.to_frame()?;
        trace!("RPC {} -> {}", request.method, uri);

        let (mut ws_stream, _) = connect_async(uri)
            .await
            .map_err(|e| CommsError::Transport(format!("Failed to connect to {uri}: {e}")))?;

        ws_stream
            .send(Message::Text(frame.into()))
            .await
            .map_err(|e| CommsError::Transport(format!("Failed to send request: {e}")))?;

        let response = loop {
            match ws_stream.next().await {
                Some(Ok(Message::Text(text))) => break WireResponse::from_frame(&text)?,
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                Some(Ok(Message::Close(_))) | None => {
                    return Err(CommsError::Protocol(
                        "Connection closed before a response arrived".to_string(),
                    ));
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    return Err(CommsError::Transport(format!(
                        "Connection failed while awaiting response: {e}"
                    )));
                }
            }
        };

        let _ = ws_stream.close(None).await;
        Ok(response)
    }
}

impl Default for RpcClient {
    fn default() -> Self {
        Self::new()
    }
}
