//! Workflow document collaborators consumed by the agent bridge.
//!
//! Two bounded services live here: parsing/validating caller-supplied
//! workflow documents, and serving the bundled schema documentation. Both
//! are synchronous; the bridge wraps them in tool-call envelopes.

pub mod document;
pub mod schema;

pub use document::{parse_document, validate_document};
pub use schema::SchemaLoader;
