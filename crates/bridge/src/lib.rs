//! Flowdeck agent bridge.
//!
//! A local-loopback MCP server through which external AI-agent processes
//! discover and manipulate the workflow currently open in the editor panel.
//! The bridge reconciles the stateless per-call protocol spoken by external
//! callers with the single optional panel actor that owns the authoritative
//! workflow state and communicates only through asynchronous messages.
//!
//! Component map:
//! - [`broker`]: matches asynchronous panel replies to pending tool calls.
//! - [`cache`]: last panel-reported workflow snapshot, the read fallback.
//! - [`panel`]: the attach/detach proxy for the editor panel actor.
//! - [`server`]: tool registry, per-call protocol-server host, lifecycle.

pub mod broker;
pub mod cache;
pub mod config;
pub mod panel;
pub mod server;

pub use broker::{CallOutcome, CorrelationBroker};
pub use cache::SnapshotCache;
pub use config::BridgeConfig;
pub use panel::{PanelEvent, PanelProxy, PanelRequest};
pub use server::{AgentBridge, BridgeError, BridgeLogEntry, BridgeToolServices, FlowdeckMcpCore};
