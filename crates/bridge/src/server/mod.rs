mod core;
mod envelopes;
mod http;

pub use self::core::{BridgeToolServices, FlowdeckMcpCore};
pub use self::http::{AgentBridge, BridgeError, BridgeHttpServer, BridgeLogEntry, RunningBridgeServer, resolve_bind_address};
