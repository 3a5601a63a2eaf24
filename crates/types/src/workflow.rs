//! Workflow document schema shared by the editor panel and the agent bridge.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

static IDENTIFIER_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("identifier regex should compile"));

/// A workflow document as edited in the panel and exchanged with external
/// agents: a graph of agent steps connected by directed edges.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowDocument {
    /// Canonical workflow identifier (for example, `triage_inbox`).
    #[serde(default)]
    pub id: String,
    /// Optional human-readable name shown in the editor tab.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Optional descriptive copy surfaced in the workflow picker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Nodes of the graph in authoring order.
    #[serde(default)]
    pub nodes: Vec<WorkflowNode>,
    /// Directed edges connecting node identifiers.
    #[serde(default)]
    pub edges: Vec<WorkflowEdge>,
}

/// One step in the workflow graph.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowNode {
    /// Node identifier, unique within the document.
    #[serde(default)]
    pub id: String,
    /// Step kind (for example, `agent`, `prompt`, `tool`, `router`).
    #[serde(default)]
    pub kind: String,
    /// Optional display label; falls back to the identifier in the editor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Kind-specific configuration, opaque to the bridge.
    #[serde(default)]
    pub config: Map<String, Value>,
}

/// A directed edge between two nodes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowEdge {
    /// Source node identifier.
    #[serde(default)]
    pub from: String,
    /// Destination node identifier.
    #[serde(default)]
    pub to: String,
    /// Optional routing condition evaluated on the source step's output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

/// Outcome of validating a workflow document.
///
/// The validator is a pure function: it never performs I/O and reports every
/// violation it finds rather than stopping at the first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ValidationReport {
    /// True when no violations were found.
    pub valid: bool,
    /// Violations in document order; empty when `valid` is true.
    #[serde(default)]
    pub violations: Vec<ValidationViolation>,
}

impl ValidationReport {
    /// Build a report from collected violations.
    pub fn from_violations(violations: Vec<ValidationViolation>) -> Self {
        Self {
            valid: violations.is_empty(),
            violations,
        }
    }
}

/// One validation failure with enough context for an agent to repair it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationViolation {
    /// Human-readable description of the failure.
    pub message: String,
    /// Field path the violation applies to (for example, `nodes[2].id`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Stable machine-readable rule code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ValidationViolation {
    /// Create a violation with a field path and rule code.
    pub fn new(message: impl Into<String>, field: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            field: Some(field.into()),
            code: Some(code.into()),
        }
    }
}

/// Check an identifier against the charset shared by workflow and node ids.
pub fn is_valid_identifier(candidate: &str) -> bool {
    IDENTIFIER_REGEX.is_match(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_round_trips_through_json() {
        let document = WorkflowDocument {
            id: "triage_inbox".to_string(),
            name: Some("Triage inbox".to_string()),
            description: None,
            nodes: vec![WorkflowNode {
                id: "classify".to_string(),
                kind: "agent".to_string(),
                label: None,
                config: Map::new(),
            }],
            edges: Vec::new(),
        };

        let serialized = serde_json::to_string(&document).expect("serialize document");
        let parsed: WorkflowDocument = serde_json::from_str(&serialized).expect("parse document");
        assert_eq!(parsed, document);
    }

    #[test]
    fn missing_optional_fields_default() {
        let parsed: WorkflowDocument = serde_json::from_str(r#"{"id":"wf1"}"#).expect("parse minimal document");
        assert_eq!(parsed.id, "wf1");
        assert!(parsed.nodes.is_empty());
        assert!(parsed.edges.is_empty());
        assert!(parsed.name.is_none());
    }

    #[test]
    fn identifier_charset_is_enforced() {
        assert!(is_valid_identifier("triage_inbox-2"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("has spaces"));
        assert!(!is_valid_identifier("dot.separated"));
    }

    #[test]
    fn report_validity_tracks_violations() {
        let clean = ValidationReport::from_violations(Vec::new());
        assert!(clean.valid);

        let dirty = ValidationReport::from_violations(vec![ValidationViolation::new(
            "node id 'a' is duplicated",
            "nodes[1].id",
            "node_id_duplicate",
        )]);
        assert!(!dirty.valid);
        assert_eq!(dirty.violations.len(), 1);
    }
}
