//! Loopback HTTP host for the agent bridge.
//!
//! The listener accepts connections on an OS-assigned loopback port and
//! hands each exchange to a freshly constructed protocol server: the rmcp
//! streamable-HTTP service runs in stateless mode, so its service factory
//! builds one [`FlowdeckMcpCore`] per call and the transport pair is
//! disposed on every exit path. Only `/mcp` is served; unknown paths get a
//! JSON 404 and unsupported methods a 405 from the protocol layer.

use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

use axum::http::StatusCode;
use axum::{Json, Router};
use rmcp::transport::streamable_http_server::{StreamableHttpServerConfig, StreamableHttpService, session::local::LocalSessionManager};
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::broker::CorrelationBroker;
use crate::cache::SnapshotCache;
use crate::config::BridgeConfig;
use crate::panel::PanelProxy;
use crate::server::core::{BridgeToolServices, FlowdeckMcpCore};
use flowdeck_engine::SchemaLoader;

/// Errors raised by the bridge lifecycle surface.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("agent bridge is already running on port {port}")]
    AlreadyRunning { port: u16 },

    #[error("invalid bridge bind address '{address}': {reason}")]
    InvalidBindAddress { address: String, reason: String },

    #[error("agent bridge must bind to a loopback address")]
    NonLoopbackBind,

    #[error("failed to bind agent bridge listener: {0}")]
    Bind(#[from] std::io::Error),

    #[error("agent bridge server task failed: {0}")]
    Shutdown(String),
}

/// Log entry emitted by the bridge for each tool call and lifecycle event.
#[derive(Debug, Clone)]
pub struct BridgeLogEntry {
    /// Human-readable summary for list display.
    pub message: String,
    /// Optional structured payload for detail inspection.
    pub payload: Option<Value>,
}

impl BridgeLogEntry {
    /// Create a new bridge log entry.
    pub fn new(message: String, payload: Option<Value>) -> Self {
        Self { message, payload }
    }
}

/// Host configuration for one bridge listener instance.
#[derive(Debug, Clone)]
pub struct BridgeHttpServer {
    bind_address: SocketAddr,
    log_sender: Option<UnboundedSender<BridgeLogEntry>>,
    services: Arc<BridgeToolServices>,
}

impl BridgeHttpServer {
    /// Create a listener bound to the provided address.
    pub fn new(bind_address: SocketAddr, services: Arc<BridgeToolServices>) -> Self {
        Self {
            bind_address,
            log_sender: None,
            services,
        }
    }

    /// Attach a log sender to stream tool-call events to the embedder.
    pub fn with_log_sender(mut self, log_sender: UnboundedSender<BridgeLogEntry>) -> Self {
        self.log_sender = Some(log_sender);
        self
    }

    /// Bind and start serving; bind failures surface synchronously.
    pub async fn start(self) -> Result<RunningBridgeServer, BridgeError> {
        let cancellation_token = CancellationToken::new();
        let session_manager = Arc::new(LocalSessionManager::default());

        let log_sender = self.log_sender.clone();
        let services = Arc::clone(&self.services);
        // Stateless mode: the factory runs once per inbound call, giving
        // each exchange its own protocol-server instance.
        let service: StreamableHttpService<FlowdeckMcpCore, LocalSessionManager> = StreamableHttpService::new(
            move || Ok(FlowdeckMcpCore::new(log_sender.clone(), Arc::clone(&services))),
            session_manager,
            StreamableHttpServerConfig {
                stateful_mode: false,
                sse_keep_alive: None,
                cancellation_token: cancellation_token.child_token(),
                ..Default::default()
            },
        );

        let router = Router::new().nest_service("/mcp", service).fallback(unknown_path);
        let listener = tokio::net::TcpListener::bind(self.bind_address).await?;
        let bound_address = listener.local_addr()?;

        let server_handle = tokio::spawn({
            let shutdown = cancellation_token.child_token();
            async move {
                let _ = axum::serve(listener, router)
                    .with_graceful_shutdown(async move {
                        shutdown.cancelled().await;
                    })
                    .await;
            }
        });

        Ok(RunningBridgeServer {
            bind_address: bound_address,
            cancellation_token,
            server_handle,
        })
    }
}

async fn unknown_path() -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": "unknown path; the agent bridge serves /mcp only" })),
    )
}

/// Runtime handle for a running bridge listener.
#[derive(Debug)]
pub struct RunningBridgeServer {
    bind_address: SocketAddr,
    cancellation_token: CancellationToken,
    server_handle: JoinHandle<()>,
}

impl RunningBridgeServer {
    /// The bound socket address.
    pub fn bound_address(&self) -> SocketAddr {
        self.bind_address
    }

    /// Stop accepting connections, wait for in-flight exchanges up to
    /// `grace_period`, then force-terminate whatever remains.
    pub async fn stop(self, grace_period: Duration) -> Result<(), BridgeError> {
        self.cancellation_token.cancel();
        let mut server_handle = self.server_handle;
        match tokio::time::timeout(grace_period, &mut server_handle).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(error)) => Err(BridgeError::Shutdown(error.to_string())),
            Err(_) => {
                warn!(grace_ms = grace_period.as_millis() as u64, "grace period elapsed; terminating in-flight bridge connections");
                server_handle.abort();
                let _ = server_handle.await;
                Ok(())
            }
        }
    }
}

/// Resolve a safe loopback bind address for the bridge listener.
pub fn resolve_bind_address(bind_address: Option<&str>) -> Result<SocketAddr, BridgeError> {
    let address = bind_address.unwrap_or("127.0.0.1:0");
    let parsed: SocketAddr = address.parse().map_err(|error: std::net::AddrParseError| BridgeError::InvalidBindAddress {
        address: address.to_string(),
        reason: error.to_string(),
    })?;
    if !is_loopback(parsed.ip()) {
        return Err(BridgeError::NonLoopbackBind);
    }
    Ok(parsed)
}

fn is_loopback(address: IpAddr) -> bool {
    match address {
        IpAddr::V4(ip) => ip.is_loopback(),
        IpAddr::V6(ip) => ip.is_loopback(),
    }
}

/// The agent bridge: broker, cache, panel proxy, and listener lifecycle
/// behind one explicitly constructed, explicitly owned service object.
///
/// The embedding application creates exactly one and passes it by reference
/// to whatever needs it; "one bridge per process" is a property of
/// construction, not of a global.
#[derive(Debug)]
pub struct AgentBridge {
    config: BridgeConfig,
    services: Arc<BridgeToolServices>,
    panel: Arc<PanelProxy>,
    schema: Arc<SchemaLoader>,
    log_sender: Option<UnboundedSender<BridgeLogEntry>>,
    running: tokio::sync::Mutex<Option<RunningBridgeServer>>,
    bound_port: AtomicU16,
}

impl AgentBridge {
    /// Construct a bridge from configuration; nothing is bound until
    /// [`AgentBridge::start`].
    pub fn new(config: BridgeConfig) -> Self {
        let broker = CorrelationBroker::new(config.call_timeout());
        let cache = Arc::new(SnapshotCache::new());
        let panel = Arc::new(PanelProxy::new(Arc::clone(&broker), Arc::clone(&cache)));
        let schema = Arc::new(SchemaLoader::new());
        let services = Arc::new(BridgeToolServices::new(broker, cache, Arc::clone(&panel), Arc::clone(&schema)));

        Self {
            config,
            services,
            panel,
            schema,
            log_sender: None,
            running: tokio::sync::Mutex::new(None),
            bound_port: AtomicU16::new(0),
        }
    }

    /// Attach a log sender before starting; tool-call events stream to it.
    pub fn with_log_sender(mut self, log_sender: UnboundedSender<BridgeLogEntry>) -> Self {
        self.log_sender = Some(log_sender);
        self
    }

    /// The panel proxy the embedding application attaches the editor to.
    pub fn panel(&self) -> Arc<PanelProxy> {
        Arc::clone(&self.panel)
    }

    /// Start the listener; returns the bound port.
    ///
    /// Fails when the bridge is already running (the first listener's port
    /// is left unchanged) or when the bind itself fails. `context_dir`
    /// points at the installation directory holding the schema
    /// documentation; `None` serves the bundled copy.
    pub async fn start(&self, context_dir: Option<&Path>) -> Result<u16, BridgeError> {
        let mut running = self.running.lock().await;
        if let Some(active) = running.as_ref() {
            return Err(BridgeError::AlreadyRunning {
                port: active.bound_address().port(),
            });
        }

        if let Some(directory) = context_dir {
            self.schema.set_base_dir(directory);
        }

        let bind_address = resolve_bind_address(self.config.bind_address.as_deref())?;
        let mut server = BridgeHttpServer::new(bind_address, Arc::clone(&self.services));
        if let Some(log_sender) = self.log_sender.clone() {
            server = server.with_log_sender(log_sender);
        }

        let started = server.start().await?;
        let port = started.bound_address().port();
        self.bound_port.store(port, Ordering::SeqCst);
        *running = Some(started);
        info!(port, "agent bridge started");
        Ok(port)
    }

    /// Stop the listener; a stopped bridge is a no-op.
    ///
    /// Pending broker calls are abandoned, not drained; their timers fire
    /// later against the broker and complete nothing.
    pub async fn stop(&self) -> Result<(), BridgeError> {
        let mut running = self.running.lock().await;
        let Some(server) = running.take() else {
            return Ok(());
        };
        self.bound_port.store(0, Ordering::SeqCst);
        server.stop(self.config.shutdown_grace()).await?;
        info!("agent bridge stopped");
        Ok(())
    }

    /// Whether the listener is currently bound.
    pub fn is_running(&self) -> bool {
        self.bound_port.load(Ordering::SeqCst) != 0
    }

    /// The bound port while running.
    pub fn port(&self) -> Option<u16> {
        match self.bound_port.load(Ordering::SeqCst) {
            0 => None,
            port => Some(port),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_ephemeral_loopback_port() {
        let address = resolve_bind_address(None).expect("default bind address");
        assert!(address.ip().is_loopback());
        assert_eq!(address.port(), 0);
    }

    #[test]
    fn rejects_non_loopback_addresses() {
        let error = resolve_bind_address(Some("0.0.0.0:0")).expect_err("expected loopback rejection");
        assert!(matches!(error, BridgeError::NonLoopbackBind));
    }

    #[test]
    fn rejects_unparseable_addresses() {
        let error = resolve_bind_address(Some("not-an-address")).expect_err("expected parse rejection");
        assert!(matches!(error, BridgeError::InvalidBindAddress { .. }));
    }
}
