//! Workflow document parsing and validation.
//!
//! Validation is a pure function over the parsed document. It reports every
//! violation it finds so an agent can repair a document in one pass instead
//! of replaying the apply call per error.

use anyhow::{Result, bail};
use flowdeck_types::{ValidationReport, ValidationViolation, WorkflowDocument, is_valid_identifier};
use std::collections::HashSet;

/// Parse a caller-supplied document string into a [`WorkflowDocument`].
///
/// The error message always leads with `Invalid JSON` so tool handlers can
/// surface it verbatim in the reply envelope.
pub fn parse_document(content: &str) -> Result<WorkflowDocument> {
    match serde_json::from_str::<WorkflowDocument>(content) {
        Ok(document) => Ok(document),
        Err(error) => bail!("Invalid JSON: {error}"),
    }
}

/// Validate a parsed workflow document against the schema rules.
pub fn validate_document(document: &WorkflowDocument) -> ValidationReport {
    let mut violations = Vec::new();

    if document.id.trim().is_empty() {
        violations.push(ValidationViolation::new(
            "workflow is missing the required 'id' field",
            "id",
            "workflow_id_missing",
        ));
    } else if !is_valid_identifier(document.id.trim()) {
        violations.push(ValidationViolation::new(
            format!("workflow id '{}' may only contain letters, numbers, underscores, or hyphens", document.id),
            "id",
            "workflow_id_invalid",
        ));
    }

    if document.nodes.is_empty() {
        violations.push(ValidationViolation::new(
            "workflow must declare at least one node",
            "nodes",
            "nodes_empty",
        ));
    }

    let mut seen_node_ids = HashSet::new();
    for (index, node) in document.nodes.iter().enumerate() {
        let field_prefix = format!("nodes[{index}]");
        if node.id.trim().is_empty() {
            violations.push(ValidationViolation::new(
                format!("node at position {index} is missing an 'id'"),
                format!("{field_prefix}.id"),
                "node_id_missing",
            ));
        } else if !is_valid_identifier(node.id.trim()) {
            violations.push(ValidationViolation::new(
                format!("node id '{}' may only contain letters, numbers, underscores, or hyphens", node.id),
                format!("{field_prefix}.id"),
                "node_id_invalid",
            ));
        } else if !seen_node_ids.insert(node.id.trim().to_string()) {
            violations.push(ValidationViolation::new(
                format!("node id '{}' is declared more than once", node.id),
                format!("{field_prefix}.id"),
                "node_id_duplicate",
            ));
        }

        if node.kind.trim().is_empty() {
            violations.push(ValidationViolation::new(
                format!("node '{}' is missing a 'kind'", display_node_id(node.id.trim(), index)),
                format!("{field_prefix}.kind"),
                "node_kind_missing",
            ));
        }
    }

    for (index, edge) in document.edges.iter().enumerate() {
        let field_prefix = format!("edges[{index}]");
        for (endpoint, value) in [("from", edge.from.trim()), ("to", edge.to.trim())] {
            if value.is_empty() {
                violations.push(ValidationViolation::new(
                    format!("edge at position {index} is missing its '{endpoint}' endpoint"),
                    format!("{field_prefix}.{endpoint}"),
                    "edge_endpoint_missing",
                ));
            } else if !seen_node_ids.contains(value) {
                violations.push(ValidationViolation::new(
                    format!("edge '{endpoint}' references unknown node '{value}'"),
                    format!("{field_prefix}.{endpoint}"),
                    "edge_endpoint_unknown",
                ));
            }
        }
    }

    ValidationReport::from_violations(violations)
}

fn display_node_id(id: &str, index: usize) -> String {
    if id.is_empty() { format!("#{index}") } else { id.to_string() }
}
