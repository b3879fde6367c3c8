//! Inbound RPC server.
//!
//! Every Meridian process that can be called by another one runs an
//! [`RpcServer`]: simulators expose the inter-region methods on it, a grid
//! authority exposes the registration and map methods. Handlers are
//! registered per method name; a request for anything else is answered with
//! an in-band `error` response rather than a dropped connection, so callers
//! can tell "wrong method" apart from "dead host".

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;

use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use crate::error::CommsError;
use crate::wire::{WireRequest, WireResponse};

type HandlerFuture = Pin<Box<dyn Future<Output = WireResponse> + Send>>;

/// Boxed async handler for one RPC method
pub type MethodHandler = Arc<dyn Fn(WireRequest) -> HandlerFuture + Send + Sync>;

/// WebSocket RPC endpoint with a per-method handler registry.
///
/// The server is shared behind an `Arc`: one task runs [`serve`], while any
/// other holder may register methods or trigger shutdown.
///
/// [`serve`]: RpcServer::serve
pub struct RpcServer {
    /// Bound TCP listener accepting peer connections
    listener: TcpListener,
    /// Address the listener actually bound, with the resolved port
    local_addr: SocketAddr,
    /// Registered method handlers by method name
    methods: Arc<DashMap<String, MethodHandler>>,
    /// Broadcast channel used to stop the accept loop
    shutdown_sender: broadcast::Sender<()>,
}

impl RpcServer {
    /// Binds the RPC endpoint.
    ///
    /// Binding port 0 picks an ephemeral port; the resolved address is
    /// available through [`local_addr`](RpcServer::local_addr).
    pub async fn bind(addr: SocketAddr) -> Result<Self, CommsError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| CommsError::Transport(format!("Failed to bind {addr}: {e}")))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| CommsError::Transport(format!("Failed to read bound address: {e}")))?;
        let (shutdown_sender, _) = broadcast::channel(1);

        Ok(Self {
            listener,
            local_addr,
            methods: Arc::new(DashMap::new()),
            shutdown_sender,
        })
    }

    /// Address the server is listening on
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Registers the handler for a method, replacing any previous handler
    /// under the same name.
    pub fn register<F, Fut>(&self, method: &str, handler: F)
    where
        F: Fn(WireRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = WireResponse> + Send + 'static,
    {
        let wrapped: MethodHandler = Arc::new(move |request| Box::pin(handler(request)));
        self.methods.insert(method.to_string(), wrapped);
    }

    /// Accepts and serves connections until shutdown is requested.
    pub async fn serve(&self) -> Result<(), CommsError> {
        let mut shutdown_receiver = self.shutdown_sender.subscribe();
        info!("📡 RPC endpoint listening on {}", self.local_addr);

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer_addr)) => {
                            let methods = self.methods.clone();
                            tokio::spawn(async move {
                                if let Err(e) = handle_rpc_connection(stream, peer_addr, methods).await {
                                    debug!("RPC connection from {} ended: {}", peer_addr, e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("❌ Failed to accept RPC connection: {}", e);
                        }
                    }
                }
                _ = shutdown_receiver.recv() => {
                    info!("🛑 RPC endpoint on {} shutting down", self.local_addr);
                    break;
                }
            }
        }

        Ok(())
    }

    /// Stops the accept loop. Connections already being served finish their
    /// current exchange on their own tasks.
    pub fn shutdown(&self) {
        let _ = self.shutdown_sender.send(());
    }
}

/// Serves one peer connection: WebSocket handshake, then a request/response
/// exchange per text frame until the peer hangs up.
async fn handle_rpc_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    methods: Arc<DashMap<String, MethodHandler>>,
) -> Result<(), CommsError> {
    let mut ws_stream = accept_async(stream)
        .await
        .map_err(|e| CommsError::Transport(format!("WebSocket handshake failed: {e}")))?;
    debug!("RPC connection established with {}", peer_addr);

    while let Some(message) = ws_stream.next().await {
        match message {
            Ok(Message::Text(text)) => {
                let response = match WireRequest::from_frame(&text) {
                    Ok(request) => dispatch(&methods, request, peer_addr).await,
                    Err(e) => {
                        warn!("Unparseable request from {}: {}", peer_addr, e);
                        WireResponse::error("malformed request frame")
                    }
                };
                let frame = response.to_frame()?;
                ws_stream
                    .send(Message::Text(frame.into()))
                    .await
                    .map_err(|e| CommsError::Transport(format!("Failed to send response: {e}")))?;
            }
            Ok(Message::Ping(payload)) => {
                ws_stream
                    .send(Message::Pong(payload))
                    .await
                    .map_err(|e| CommsError::Transport(format!("Failed to send pong: {e}")))?;
            }
            Ok(Message::Close(_)) => {
                debug!("RPC connection with {} closed by peer", peer_addr);
                break;
            }
            Ok(_) => {}
            Err(e) => {
                return Err(CommsError::Transport(format!(
                    "Connection error from {peer_addr}: {e}"
                )));
            }
        }
    }

    Ok(())
}

/// Looks up and runs the handler for a request.
async fn dispatch(
    methods: &DashMap<String, MethodHandler>,
    request: WireRequest,
    peer_addr: SocketAddr,
) -> WireResponse {
    // Clone the handler out so the registry shard is not held across await.
    let handler = methods
        .get(request.method.as_str())
        .map(|entry| Arc::clone(entry.value()));

    match handler {
        Some(handler) => handler(request).await,
        None => {
            warn!("Unknown RPC method '{}' from {}", request.method, peer_addr);
            WireResponse::error(&format!("unknown method: {}", request.method))
        }
    }
}
