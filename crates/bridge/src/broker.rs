//! Correlation of asynchronous panel replies to pending bridge calls.
//!
//! Every request sent to the editor panel is registered here under a
//! process-unique correlation identifier together with a one-shot completion
//! sink and an armed deadline timer. The first of {panel reply, panel
//! rejection, timer} completes the entry and removes it; anything arriving
//! later under the same identifier is discarded as stale.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::debug;

/// Terminal outcome of one pending bridge call.
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome {
    /// The panel answered before the deadline.
    Reply(Value),
    /// The panel refused the request with a reason.
    Rejected(String),
    /// The deadline elapsed without an answer.
    TimedOut,
}

#[derive(Debug)]
struct PendingCall {
    sink: oneshot::Sender<CallOutcome>,
    deadline_timer: JoinHandle<()>,
    created_at: DateTime<Utc>,
}

/// Registry of in-flight panel calls keyed by correlation identifier.
///
/// Exclusively owns its entries; other components hold only the identifier.
/// Deadline timers keep a [`Weak`] handle back to the broker, so timers that
/// fire after the bridge is torn down are no-ops rather than crashes.
#[derive(Debug)]
pub struct CorrelationBroker {
    pending: Mutex<HashMap<String, PendingCall>>,
    sequence: AtomicU64,
    call_timeout: Duration,
}

impl CorrelationBroker {
    /// Create a broker whose calls time out after `call_timeout`.
    pub fn new(call_timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            pending: Mutex::new(HashMap::new()),
            sequence: AtomicU64::new(0),
            call_timeout,
        })
    }

    /// Register a new pending call and arm its deadline timer.
    ///
    /// Returns the freshly generated correlation identifier and the receiver
    /// the caller awaits. The identifier combines wall-clock milliseconds
    /// with a monotonic counter; a collision would silently misroute a panel
    /// reply to the wrong waiter, so uniqueness is an invariant, not a
    /// nicety.
    pub fn begin_call(self: &Arc<Self>) -> (String, oneshot::Receiver<CallOutcome>) {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let correlation_id = format!("call-{}-{}", Utc::now().timestamp_millis(), sequence);
        let (sink, receiver) = oneshot::channel();

        let deadline_timer = spawn_deadline_timer(Arc::downgrade(self), correlation_id.clone(), self.call_timeout);
        let entry = PendingCall {
            sink,
            deadline_timer,
            created_at: Utc::now(),
        };

        let mut pending = self.pending.lock().expect("pending call map lock");
        let previous = pending.insert(correlation_id.clone(), entry);
        debug_assert!(previous.is_none(), "correlation identifier collision");
        drop(pending);

        (correlation_id, receiver)
    }

    /// Complete a pending call with a panel reply.
    ///
    /// Returns false when the identifier is unknown, which means the call
    /// already completed (usually by timeout) and this reply is stale.
    pub fn resolve(&self, correlation_id: &str, value: Value) -> bool {
        self.complete(correlation_id, CallOutcome::Reply(value))
    }

    /// Complete a pending call with a panel rejection.
    pub fn reject(&self, correlation_id: &str, reason: impl Into<String>) -> bool {
        self.complete(correlation_id, CallOutcome::Rejected(reason.into()))
    }

    /// Drop a pending call without delivering any outcome.
    ///
    /// Used when the request could not be handed to the panel after the
    /// entry was registered; the waiter observes a closed channel.
    pub fn abandon(&self, correlation_id: &str) -> bool {
        let removed = {
            let mut pending = self.pending.lock().expect("pending call map lock");
            pending.remove(correlation_id)
        };
        match removed {
            Some(entry) => {
                entry.deadline_timer.abort();
                true
            }
            None => false,
        }
    }

    /// Number of calls currently awaiting completion.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().expect("pending call map lock").len()
    }

    /// The deadline applied to every call.
    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    fn complete(&self, correlation_id: &str, outcome: CallOutcome) -> bool {
        let removed = {
            let mut pending = self.pending.lock().expect("pending call map lock");
            pending.remove(correlation_id)
        };
        let Some(entry) = removed else {
            debug!(correlation_id, "discarding stale delivery for completed call");
            return false;
        };

        let waited_ms = Utc::now().signed_duration_since(entry.created_at).num_milliseconds();
        debug!(correlation_id, waited_ms, "completing pending call");
        entry.deadline_timer.abort();
        // The waiter may have gone away (listener shut down mid-call); a
        // closed sink is not an error.
        let _ = entry.sink.send(outcome);
        true
    }
}

fn spawn_deadline_timer(broker: Weak<CorrelationBroker>, correlation_id: String, timeout: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(timeout).await;
        if let Some(broker) = broker.upgrade() {
            if broker.complete(&correlation_id, CallOutcome::TimedOut) {
                debug!(correlation_id, "pending call timed out");
            }
        }
    })
}
