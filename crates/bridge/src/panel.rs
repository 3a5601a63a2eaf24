//! Proxy for the editor panel actor.
//!
//! The panel is a single optional collaborator reachable only through
//! asynchronous message passing: the bridge posts [`PanelRequest`]s into
//! the attached channel and the panel pushes [`PanelEvent`]s back. Sending
//! and awaiting are joined exclusively through the correlation broker; this
//! proxy never blocks.

use crate::broker::CorrelationBroker;
use crate::cache::SnapshotCache;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

/// Requests posted to the attached editor panel.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PanelRequest {
    /// Ask the panel to report the workflow it currently holds.
    ReadWorkflow {
        #[serde(rename = "correlationId")]
        correlation_id: String,
    },
    /// Ask the panel to replace its workflow with the supplied document.
    ApplyWorkflow {
        #[serde(rename = "correlationId")]
        correlation_id: String,
        document: Value,
    },
}

/// Messages pushed from the panel side into the bridge.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PanelEvent {
    /// The panel voluntarily reports its current state (on open, on edit,
    /// or in response to a read request that it also answers directly).
    Snapshot { document: Value },
    /// The panel answers a pending request.
    Reply {
        #[serde(rename = "correlationId")]
        correlation_id: String,
        result: Value,
    },
    /// The panel refuses a pending request.
    Failure {
        #[serde(rename = "correlationId")]
        correlation_id: String,
        reason: String,
    },
}

/// The single optional channel to the interactive panel.
#[derive(Debug)]
pub struct PanelProxy {
    attached: Mutex<Option<UnboundedSender<PanelRequest>>>,
    broker: Arc<CorrelationBroker>,
    cache: Arc<SnapshotCache>,
}

impl PanelProxy {
    /// Create a proxy forwarding replies into `broker` and snapshots into
    /// `cache`.
    pub fn new(broker: Arc<CorrelationBroker>, cache: Arc<SnapshotCache>) -> Self {
        Self {
            attached: Mutex::new(None),
            broker,
            cache,
        }
    }

    /// Attach the panel's request channel, replacing any previous panel.
    pub fn attach(&self, sender: UnboundedSender<PanelRequest>) {
        let mut attached = self.attached.lock().expect("attached panel lock");
        if attached.replace(sender).is_some() {
            debug!("replaced previously attached editor panel");
        }
    }

    /// Clear the attachment; called when the panel is disposed.
    pub fn detach(&self) {
        let mut attached = self.attached.lock().expect("attached panel lock");
        *attached = None;
    }

    /// Whether a panel is currently attached.
    pub fn is_attached(&self) -> bool {
        self.attached.lock().expect("attached panel lock").is_some()
    }

    /// Post a request to the attached panel.
    ///
    /// Returns false without blocking when no panel is attached. A channel
    /// found closed means the panel went away without detaching; the slot
    /// is cleared so subsequent calls short-circuit to the cache instead of
    /// burning a timeout each.
    pub fn send(&self, request: PanelRequest) -> bool {
        let mut attached = self.attached.lock().expect("attached panel lock");
        let Some(sender) = attached.as_ref() else {
            return false;
        };
        if sender.send(request).is_err() {
            debug!("editor panel channel closed; clearing attachment");
            *attached = None;
            return false;
        }
        true
    }

    /// Record a voluntary state report from the panel.
    pub fn report_snapshot(&self, document: Value) {
        self.cache.record(document);
    }

    /// Complete a pending call with the panel's answer.
    ///
    /// Returns false for stale deliveries (the call already timed out).
    pub fn deliver_reply(&self, correlation_id: &str, result: Value) -> bool {
        self.broker.resolve(correlation_id, result)
    }

    /// Complete a pending call with the panel's refusal.
    pub fn deliver_failure(&self, correlation_id: &str, reason: impl Into<String>) -> bool {
        self.broker.reject(correlation_id, reason)
    }

    /// Route one inbound panel message to the cache or the broker.
    pub fn handle_event(&self, event: PanelEvent) {
        match event {
            PanelEvent::Snapshot { document } => self.report_snapshot(document),
            PanelEvent::Reply { correlation_id, result } => {
                self.deliver_reply(&correlation_id, result);
            }
            PanelEvent::Failure { correlation_id, reason } => {
                self.deliver_failure(&correlation_id, reason);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::CallOutcome;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn test_proxy() -> (PanelProxy, Arc<CorrelationBroker>, Arc<SnapshotCache>) {
        let broker = CorrelationBroker::new(Duration::from_secs(5));
        let cache = Arc::new(SnapshotCache::new());
        let proxy = PanelProxy::new(Arc::clone(&broker), Arc::clone(&cache));
        (proxy, broker, cache)
    }

    #[tokio::test]
    async fn send_without_attachment_is_a_no_op() {
        let (proxy, _broker, _cache) = test_proxy();
        assert!(!proxy.is_attached());
        assert!(!proxy.send(PanelRequest::ReadWorkflow {
            correlation_id: "call-1".to_string(),
        }));
    }

    #[tokio::test]
    async fn attach_replaces_previous_panel() {
        let (proxy, _broker, _cache) = test_proxy();
        let (first_sender, mut first_receiver) = mpsc::unbounded_channel();
        let (second_sender, mut second_receiver) = mpsc::unbounded_channel();

        proxy.attach(first_sender);
        proxy.attach(second_sender);

        assert!(proxy.send(PanelRequest::ReadWorkflow {
            correlation_id: "call-1".to_string(),
        }));
        assert!(second_receiver.try_recv().is_ok());
        assert!(first_receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn closed_channel_clears_attachment() {
        let (proxy, _broker, _cache) = test_proxy();
        let (sender, receiver) = mpsc::unbounded_channel();
        proxy.attach(sender);
        drop(receiver);

        assert!(!proxy.send(PanelRequest::ReadWorkflow {
            correlation_id: "call-1".to_string(),
        }));
        assert!(!proxy.is_attached());
    }

    #[tokio::test]
    async fn snapshot_event_refreshes_cache_without_pending_call() {
        let (proxy, broker, cache) = test_proxy();
        proxy.handle_event(PanelEvent::Snapshot {
            document: serde_json::json!({"id": "wf1"}),
        });

        assert_eq!(cache.latest(), Some(serde_json::json!({"id": "wf1"})));
        assert_eq!(broker.pending_count(), 0);
    }

    #[tokio::test]
    async fn reply_event_completes_the_matching_call() {
        let (proxy, broker, _cache) = test_proxy();
        let (correlation_id, receiver) = broker.begin_call();

        proxy.handle_event(PanelEvent::Reply {
            correlation_id: correlation_id.clone(),
            result: serde_json::json!({"id": "wf1"}),
        });

        assert_eq!(
            receiver.await.expect("outcome delivered"),
            CallOutcome::Reply(serde_json::json!({"id": "wf1"}))
        );
    }

    #[tokio::test]
    async fn stale_reply_is_discarded() {
        let (proxy, _broker, _cache) = test_proxy();
        assert!(!proxy.deliver_reply("call-unknown", serde_json::json!({})));
    }

    #[test]
    fn panel_events_deserialize_from_wire_shapes() {
        let snapshot: PanelEvent = serde_json::from_str(r#"{"kind":"snapshot","document":{"id":"wf1"}}"#).expect("snapshot event");
        assert_eq!(
            snapshot,
            PanelEvent::Snapshot {
                document: serde_json::json!({"id": "wf1"})
            }
        );

        let reply: PanelEvent =
            serde_json::from_str(r#"{"kind":"reply","correlationId":"call-7","result":{"ok":true}}"#).expect("reply event");
        assert_eq!(
            reply,
            PanelEvent::Reply {
                correlation_id: "call-7".to_string(),
                result: serde_json::json!({"ok": true})
            }
        );
    }
}
