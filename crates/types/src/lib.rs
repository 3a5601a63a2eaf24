//! Shared type definitions for the Flowdeck workspace.
//!
//! The workflow document schema lives here so the editor panel, the agent
//! bridge, and the validation engine all agree on one serde model. The
//! bridge itself treats documents as opaque JSON values; only the engine
//! interprets the structures defined in [`workflow`].

pub mod workflow;

pub use workflow::{
    ValidationReport, ValidationViolation, WorkflowDocument, WorkflowEdge, WorkflowNode, is_valid_identifier,
};
