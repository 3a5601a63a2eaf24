use crate::broker::{CallOutcome, CorrelationBroker};
use crate::cache::SnapshotCache;
use crate::panel::{PanelProxy, PanelRequest};
use crate::server::envelopes;
use crate::server::http::BridgeLogEntry;
use flowdeck_engine::{SchemaLoader, parse_document, validate_document};
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Content, ErrorData, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo};
use rmcp::{ServerHandler, tool, tool_handler, tool_router};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

const NO_ACTIVE_WORKFLOW: &str = "No active workflow: open a workflow in the editor first";
const NO_PANEL_FOR_APPLY: &str = "No editor panel is attached to apply the workflow to";
const READ_TIMED_OUT_EMPTY_CACHE: &str = "Workflow read timed out and no cached snapshot is available";
const APPLY_TIMED_OUT: &str = "Workflow apply timed out waiting for the editor panel";

/// Parameters for `apply_workflow`.
#[derive(JsonSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct ApplyWorkflowRequest {
    /// The workflow document to apply, as a JSON string.
    #[schemars(description = "Workflow document as a JSON string. See read_schema_documentation for the expected shape.")]
    pub workflow: String,
}

/// Shared services behind the bridge tool handlers.
///
/// One instance lives for the life of the bridge; every per-call protocol
/// server borrows it through an [`Arc`].
#[derive(Debug)]
pub struct BridgeToolServices {
    broker: Arc<CorrelationBroker>,
    cache: Arc<SnapshotCache>,
    panel: Arc<PanelProxy>,
    schema: Arc<SchemaLoader>,
}

impl BridgeToolServices {
    /// Create services wired to the given broker, cache, panel, and schema
    /// loader.
    pub fn new(broker: Arc<CorrelationBroker>, cache: Arc<SnapshotCache>, panel: Arc<PanelProxy>, schema: Arc<SchemaLoader>) -> Self {
        Self {
            broker,
            cache,
            panel,
            schema,
        }
    }

    /// The schema loader backing `read_schema_documentation`.
    pub fn schema(&self) -> &SchemaLoader {
        &self.schema
    }

    /// Read the workflow currently open in the editor.
    ///
    /// The panel is asked first when attached; a silent panel degrades to
    /// the snapshot cache with `isStale:true`. With no panel attached the
    /// cache is consulted directly and no broker entry is created.
    pub async fn read_current_workflow(&self) -> Value {
        if !self.panel.is_attached() {
            return self.cached_or_missing(NO_ACTIVE_WORKFLOW);
        }

        let (correlation_id, receiver) = self.broker.begin_call();
        let request = PanelRequest::ReadWorkflow {
            correlation_id: correlation_id.clone(),
        };
        if !self.panel.send(request) {
            // The panel went away between the attachment check and the send.
            self.broker.abandon(&correlation_id);
            return self.cached_or_missing(NO_ACTIVE_WORKFLOW);
        }

        match receiver.await.unwrap_or(CallOutcome::TimedOut) {
            CallOutcome::Reply(document) => {
                // A read reply is also a state report; refresh the cache.
                self.cache.record(document.clone());
                envelopes::workflow_reply(document, false)
            }
            CallOutcome::Rejected(reason) => envelopes::domain_failure(reason),
            CallOutcome::TimedOut => self.cached_or_missing(READ_TIMED_OUT_EMPTY_CACHE),
        }
    }

    /// Validate a caller-supplied document and forward it to the panel.
    ///
    /// Unlike reads there is no cache fallback: applying a change with
    /// nobody to apply it to is an error, and an apply timeout is a hard
    /// failure rather than a degraded success.
    pub async fn apply_workflow(&self, raw_document: &str) -> Value {
        let document = match parse_document(raw_document) {
            Ok(document) => document,
            Err(error) => return envelopes::domain_failure(error.to_string()),
        };

        let report = validate_document(&document);
        if !report.valid {
            return envelopes::validation_failure(&report.violations);
        }

        if !self.panel.is_attached() {
            return envelopes::domain_failure(NO_PANEL_FOR_APPLY);
        }

        let document_value = serde_json::to_value(&document).unwrap_or(Value::Null);
        let (correlation_id, receiver) = self.broker.begin_call();
        let request = PanelRequest::ApplyWorkflow {
            correlation_id: correlation_id.clone(),
            document: document_value,
        };
        if !self.panel.send(request) {
            self.broker.abandon(&correlation_id);
            return envelopes::domain_failure(NO_PANEL_FOR_APPLY);
        }

        match receiver.await.unwrap_or(CallOutcome::TimedOut) {
            CallOutcome::Reply(_) => envelopes::applied(),
            CallOutcome::Rejected(reason) => envelopes::domain_failure(reason),
            CallOutcome::TimedOut => envelopes::domain_failure(APPLY_TIMED_OUT),
        }
    }

    fn cached_or_missing(&self, missing_message: &str) -> Value {
        match self.cache.latest() {
            Some(document) => envelopes::workflow_reply(document, true),
            None => envelopes::domain_failure(missing_message),
        }
    }
}

/// Per-call MCP tool handler for the agent bridge.
///
/// A fresh instance is constructed for every inbound connection by the
/// listener's service factory; only the shared services outlive the call.
#[derive(Clone)]
pub struct FlowdeckMcpCore {
    tool_router: ToolRouter<Self>,
    log_sender: Option<UnboundedSender<BridgeLogEntry>>,
    services: Arc<BridgeToolServices>,
}

#[tool_router]
impl FlowdeckMcpCore {
    /// Create a new bridge tool handler with shared service dependencies.
    pub fn new(log_sender: Option<UnboundedSender<BridgeLogEntry>>, services: Arc<BridgeToolServices>) -> Self {
        Self {
            tool_router: Self::tool_router(),
            log_sender,
            services,
        }
    }

    #[tool(
        annotations(read_only_hint = true),
        description = "Read the workflow currently open in the Flowdeck editor. Returns {success, isStale, workflow}; isStale=true means the value came from the bridge cache because no editor panel is attached or the panel did not answer in time."
    )]
    async fn read_current_workflow(&self) -> Result<CallToolResult, ErrorData> {
        let structured = self.services.read_current_workflow().await;
        let response = CallToolResult::structured(structured);
        self.emit_log("read_current_workflow", None, Some(serde_json::to_value(&response).unwrap_or(Value::Null)));
        Ok(response)
    }

    #[tool(
        annotations(read_only_hint = true),
        description = "Read the workflow document schema documentation. Call before authoring a document for apply_workflow."
    )]
    async fn read_schema_documentation(&self) -> Result<CallToolResult, ErrorData> {
        let response = match self.services.schema().load() {
            Ok(content) => CallToolResult::success(vec![Content::text(content.to_string())]),
            Err(error) => {
                let payload = envelopes::domain_failure(error.to_string());
                CallToolResult::error(vec![Content::text(payload.to_string())])
            }
        };
        self.emit_log(
            "read_schema_documentation",
            None,
            Some(serde_json::to_value(&response).unwrap_or(Value::Null)),
        );
        Ok(response)
    }

    #[tool(
        description = "Validate and apply a workflow document to the open editor panel. Input: workflow (JSON string). Returns {success:true} on confirmation, or {success:false, error, validationErrors?} on parse/validation/panel failures. Requires an attached editor panel."
    )]
    async fn apply_workflow(&self, param: Parameters<ApplyWorkflowRequest>) -> Result<CallToolResult, ErrorData> {
        let structured = self.services.apply_workflow(&param.0.workflow).await;
        let response = CallToolResult::structured(structured);
        self.emit_log(
            "apply_workflow",
            Some(serde_json::to_value(&param.0).unwrap_or(Value::Null)),
            Some(serde_json::to_value(&response).unwrap_or(Value::Null)),
        );
        Ok(response)
    }

    fn emit_log(&self, tool_name: &str, request: Option<Value>, response: Option<Value>) {
        let Some(sender) = self.log_sender.as_ref() else {
            return;
        };
        let payload = serde_json::json!({
            "request": request,
            "response": response,
        });
        let message = format!("bridge tool call: {tool_name}");
        let _ = sender.send(BridgeLogEntry::new(message, Some(payload)));
    }
}

#[tool_handler]
impl ServerHandler for FlowdeckMcpCore {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            protocol_version: ProtocolVersion::LATEST,
            server_info: Implementation {
                name: "Flowdeck".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: Some("Flowdeck Agent Bridge".to_string()),
                ..Default::default()
            },
            instructions: Some(
                "Bridge to the workflow open in the Flowdeck editor.\nFLOW:\n1) Call read_schema_documentation to learn the document shape.\n2) Call read_current_workflow to fetch the open workflow; isStale=true marks a cached value.\n3) Call apply_workflow with a full JSON document to replace the open workflow.\nNOTES:\n- Domain failures arrive as {success:false, error} payloads; retry is safe, every tool is idempotent.\n- apply_workflow requires the editor panel to be open; reads fall back to the last known snapshot."
                    .to_string(),
            ),
        }
    }
}
