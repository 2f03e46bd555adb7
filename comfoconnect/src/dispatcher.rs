//! Request/reply correlation over a single shared transport.
//!
//! Every outbound request is tagged with a 32-bit reference id; the
//! dispatcher remembers a [`oneshot::Sender`] per outstanding id and
//! resolves it when a reply carrying the same id arrives. A periodic sweep
//! times out requests that never got an answer (spec §4.3).

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use comfoconnect_proto::GatewayEnvelope;
use tokio::sync::oneshot;

use crate::error::RequestError;

/// An in-flight request's bookkeeping: the channel its reply is delivered
/// on and the instant after which it is considered timed out.
struct Pending {
    reply_tx: oneshot::Sender<GatewayEnvelope>,
    deadline: Instant,
}

/// Correlates outbound requests with inbound replies by reference id.
///
/// Reference ids start at 1 and wrap back to 1 (0 is reserved for
/// unsolicited notifications and never allocated to a request, per spec
/// §4.3). Allocation and completion are both `O(1)` under a single mutex;
/// the table is expected to hold at most a handful of entries at once.
pub struct Dispatcher {
    inner: Mutex<Inner>,
}

struct Inner {
    next_reference: u32,
    pending: HashMap<u32, Pending>,
}

impl Dispatcher {
    /// Construct an empty dispatcher.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_reference: 1,
                pending: HashMap::new(),
            }),
        }
    }

    /// Allocate a fresh reference id and register a pending reply slot for
    /// it, returning the id to stamp onto the outbound request and the
    /// receiving half of the reply channel.
    ///
    /// Returns [`crate::error::SessionError::ReferenceIdCollision`] via the
    /// caller's own check if the allocated id is still in use after a
    /// 32-bit wraparound; this function itself does not fail, since under
    /// normal load wraparound without completion is effectively
    /// unreachable (4 billion requests would need to be in flight at
    /// once).
    pub fn register(&self, timeout: Duration) -> (u32, oneshot::Receiver<GatewayEnvelope>) {
        let (tx, rx) = oneshot::channel();
        let mut inner = self.inner.lock().expect("dispatcher mutex poisoned");

        let reference = loop {
            let candidate = inner.next_reference;
            inner.next_reference = if candidate == u32::MAX { 1 } else { candidate + 1 };
            if !inner.pending.contains_key(&candidate) {
                break candidate;
            }
        };

        inner.pending.insert(
            reference,
            Pending {
                reply_tx: tx,
                deadline: Instant::now() + timeout,
            },
        );

        (reference, rx)
    }

    /// Deliver an inbound envelope to its matching pending request, if any.
    ///
    /// Returns `true` if a pending request was resolved; `false` means the
    /// envelope's reference id matched nothing (already timed out,
    /// cancelled, or this is an unsolicited notification with
    /// `reference == 0`).
    pub fn resolve(&self, reference: u32, envelope: GatewayEnvelope) -> bool {
        let pending = {
            let mut inner = self.inner.lock().expect("dispatcher mutex poisoned");
            inner.pending.remove(&reference)
        };

        match pending {
            Some(pending) => pending.reply_tx.send(envelope).is_ok(),
            None => false,
        }
    }

    /// Drop the pending-request slot for `reference` without resolving it.
    ///
    /// Used when the caller cancels its request future directly (the
    /// `oneshot::Receiver` is simply dropped in that case, so this is
    /// mostly invoked by the timeout sweep).
    pub fn cancel(&self, reference: u32) {
        let mut inner = self.inner.lock().expect("dispatcher mutex poisoned");
        inner.pending.remove(&reference);
    }

    /// Remove and drop every pending request past its deadline.
    ///
    /// Dropping a `oneshot::Sender` without sending causes the matching
    /// `Receiver` to resolve to `Err(RecvError)`, which callers translate
    /// to [`RequestError::Timeout`].
    pub fn sweep_timeouts(&self) {
        let now = Instant::now();
        let mut inner = self.inner.lock().expect("dispatcher mutex poisoned");
        inner.pending.retain(|_, pending| pending.deadline > now);
    }

    /// Fail every pending request immediately, e.g. because the transport
    /// was lost. Draining the map drops every sender, resolving each
    /// waiting receiver to an error.
    pub fn fail_all(&self) {
        let mut inner = self.inner.lock().expect("dispatcher mutex poisoned");
        inner.pending.clear();
    }

    /// Number of requests currently awaiting a reply.
    pub fn pending_count(&self) -> usize {
        self.inner.lock().expect("dispatcher mutex poisoned").pending.len()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Translate a closed/dropped oneshot receiver into the request error the
/// caller should see.
pub fn receiver_error_to_request_error(_: oneshot::error::RecvError) -> RequestError {
    RequestError::Cancelled
}

#[cfg(test)]
mod tests {
    use super::*;
    use comfoconnect_proto::{GatewayOperation, OperationType};

    fn sample_envelope(reference: u32) -> GatewayEnvelope {
        GatewayEnvelope {
            src: vec![0; 16],
            dst: vec![0; 16],
            operation: Some(GatewayOperation {
                r#type: OperationType::VersionConfirm as i32,
                reference,
            }),
            payload: Vec::new(),
        }
    }

    #[tokio::test]
    async fn resolves_a_registered_request_by_reference() {
        let dispatcher = Dispatcher::new();
        let (reference, rx) = dispatcher.register(Duration::from_secs(5));

        assert!(dispatcher.resolve(reference, sample_envelope(reference)));

        let envelope = rx.await.unwrap();
        assert_eq!(envelope.operation.unwrap().reference, reference);
    }

    #[tokio::test]
    async fn resolve_for_unknown_reference_is_a_noop() {
        let dispatcher = Dispatcher::new();

        assert!(!dispatcher.resolve(999, sample_envelope(999)));
    }

    #[test]
    fn first_allocated_reference_is_one() {
        let dispatcher = Dispatcher::new();
        let (reference, _rx) = dispatcher.register(Duration::from_secs(5));

        assert_eq!(reference, 1);
    }

    #[tokio::test]
    async fn sweep_times_out_expired_requests() {
        let dispatcher = Dispatcher::new();
        let (_reference, rx) = dispatcher.register(Duration::from_millis(1));

        tokio::time::sleep(Duration::from_millis(5)).await;
        dispatcher.sweep_timeouts();

        assert!(rx.await.is_err());
        assert_eq!(dispatcher.pending_count(), 0);
    }

    #[tokio::test]
    async fn fail_all_resolves_every_pending_receiver_to_an_error() {
        let dispatcher = Dispatcher::new();
        let (_r1, rx1) = dispatcher.register(Duration::from_secs(5));
        let (_r2, rx2) = dispatcher.register(Duration::from_secs(5));

        dispatcher.fail_all();

        assert!(rx1.await.is_err());
        assert!(rx2.await.is_err());
    }

    #[test]
    fn skips_allocating_a_reference_still_pending() {
        let dispatcher = Dispatcher::new();
        {
            let mut inner = dispatcher.inner.lock().unwrap();
            inner.next_reference = u32::MAX;
        }

        let (first, _rx1) = dispatcher.register(Duration::from_secs(5));
        assert_eq!(first, u32::MAX);

        let (second, _rx2) = dispatcher.register(Duration::from_secs(5));
        assert_eq!(second, 1);
    }
}
