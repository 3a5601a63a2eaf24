//! Structured reply envelopes for the bridge tools.
//!
//! Domain failures travel inside a successful tool-call reply so external
//! callers branch on `success` instead of parsing transport statuses.
//! Transport-level errors are reserved for faults in the bridge itself.

use flowdeck_types::ValidationViolation;
use serde_json::Value;

/// Successful workflow read: `isStale` marks a cache fallback.
pub fn workflow_reply(document: Value, is_stale: bool) -> Value {
    serde_json::json!({
        "success": true,
        "isStale": is_stale,
        "workflow": document,
    })
}

/// Successful apply confirmation.
pub fn applied() -> Value {
    serde_json::json!({ "success": true })
}

/// Domain failure with a caller-facing message.
pub fn domain_failure(error: impl Into<String>) -> Value {
    serde_json::json!({
        "success": false,
        "error": error.into(),
    })
}

/// Validation failure enumerating every violation found.
pub fn validation_failure(violations: &[ValidationViolation]) -> Value {
    serde_json::json!({
        "success": false,
        "error": "Validation failed",
        "validationErrors": violations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workflow_reply_carries_staleness_marker() {
        let fresh = workflow_reply(serde_json::json!({"id": "wf1"}), false);
        assert_eq!(fresh["success"], true);
        assert_eq!(fresh["isStale"], false);
        assert_eq!(fresh["workflow"]["id"], "wf1");

        let stale = workflow_reply(serde_json::json!({"id": "wf1"}), true);
        assert_eq!(stale["isStale"], true);
    }

    #[test]
    fn validation_failure_lists_violations() {
        let envelope = validation_failure(&[ValidationViolation::new("node id 'a' is duplicated", "nodes[1].id", "node_id_duplicate")]);
        assert_eq!(envelope["success"], false);
        assert_eq!(envelope["error"], "Validation failed");
        assert_eq!(envelope["validationErrors"][0]["field"], "nodes[1].id");
    }
}
