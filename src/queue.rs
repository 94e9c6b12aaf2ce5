use std::collections::BTreeMap;

use http::Method;

use crate::error::OrchestratorError;
use crate::transport::TransportHandle;
use crate::ReqflowResult;

/// Process-unique identifier minted per request attempt. Tokens are
/// monotonic and never reused, so a `BTreeMap` keyed by token iterates in
/// insertion order — which is the FIFO guarantee both queues rely on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestToken(u64);

impl RequestToken {
    pub(crate) const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

pub(crate) type CallFactory = Box<dyn FnOnce() -> Box<dyn TransportHandle> + Send>;

/// A queue-resident call is either already started (In-Flight) or a
/// deferred factory (Pending) invoked exactly once at promotion time.
pub(crate) enum QueueCall {
    Started(Box<dyn TransportHandle>),
    Deferred(CallFactory),
}

impl QueueCall {
    fn into_handle(self) -> Option<Box<dyn TransportHandle>> {
        match self {
            Self::Started(handle) => Some(handle),
            // A never-started call has nothing to abort; dropping the
            // factory drops its completion channel, which the awaiting
            // caller observes as an abort.
            Self::Deferred(_) => None,
        }
    }
}

/// Normalized admission-relevant subset of a request descriptor.
pub(crate) struct QueueEntry {
    pub(crate) url: String,
    pub(crate) method: Method,
    pub(crate) enable_cancel: bool,
    pub(crate) wait: bool,
    pub(crate) call: QueueCall,
}

impl QueueEntry {
    fn matches(&self, url: &str, method: &Method) -> bool {
        self.url == url && &self.method == method
    }
}

/// The two cooperating ordered maps: In-Flight (executing) and Pending
/// (deferred behind the ceiling or a wait barrier). A token lives in at
/// most one of them at any time.
#[derive(Default)]
pub(crate) struct QueueState {
    in_flight: BTreeMap<RequestToken, QueueEntry>,
    pending: BTreeMap<RequestToken, QueueEntry>,
}

impl QueueState {
    /// Admission control for an incoming `(url, method, throttle)`
    /// descriptor. Scans In-Flight then Pending, in that order.
    ///
    /// Any match while the incoming request has `throttle` set rejects it
    /// outright. Otherwise every matched entry with `enable_cancel` is
    /// removed; handles of already-started victims are returned so the
    /// caller can abort them outside the queue lock.
    pub(crate) fn admit(
        &mut self,
        url: &str,
        method: &Method,
        throttle: bool,
    ) -> ReqflowResult<Vec<Box<dyn TransportHandle>>> {
        let mut aborts = Vec::new();
        for queue in [&mut self.in_flight, &mut self.pending] {
            let matched: Vec<RequestToken> = queue
                .iter()
                .filter(|(_, entry)| entry.matches(url, method))
                .map(|(token, _)| *token)
                .collect();
            for token in matched {
                if throttle {
                    return Err(OrchestratorError::FastFail);
                }
                let cancellable = queue
                    .get(&token)
                    .is_some_and(|entry| entry.enable_cancel);
                if !cancellable {
                    continue;
                }
                if let Some(entry) = queue.remove(&token) {
                    aborts.extend(entry.call.into_handle());
                }
            }
        }
        Ok(aborts)
    }

    /// The wait barrier inspects only the single oldest In-Flight entry;
    /// a later wait entry among several in flight does not block
    /// promotion.
    pub(crate) fn barrier_active(&self) -> bool {
        self.in_flight
            .values()
            .next()
            .is_some_and(|entry| entry.wait)
    }

    pub(crate) fn accepts_in_flight(&self, ceiling: Option<usize>) -> bool {
        self.in_flight.len() < ceiling.unwrap_or(usize::MAX) && !self.barrier_active()
    }

    pub(crate) fn insert_in_flight(&mut self, token: RequestToken, entry: QueueEntry) {
        self.in_flight.insert(token, entry);
    }

    pub(crate) fn insert_pending(&mut self, token: RequestToken, entry: QueueEntry) {
        self.pending.insert(token, entry);
    }

    pub(crate) fn remove_in_flight(&mut self, token: RequestToken) -> Option<QueueEntry> {
        self.in_flight.remove(&token)
    }

    pub(crate) fn remove_everywhere(&mut self, token: RequestToken) {
        self.in_flight.remove(&token);
        self.pending.remove(&token);
    }

    /// Pops the oldest Pending entry for promotion into In-Flight.
    pub(crate) fn take_oldest_pending(&mut self) -> Option<(RequestToken, QueueEntry)> {
        let token = *self.pending.keys().next()?;
        let entry = self.pending.remove(&token)?;
        Some((token, entry))
    }

    /// Bulk reset: removes every entry without the `wait` flag from both
    /// queues, returning started handles for the caller to abort. Wait
    /// entries are never cancelled by a bulk clear.
    pub(crate) fn clear(&mut self) -> Vec<Box<dyn TransportHandle>> {
        let mut aborts = Vec::new();
        for queue in [&mut self.in_flight, &mut self.pending] {
            let removed: Vec<RequestToken> = queue
                .iter()
                .filter(|(_, entry)| !entry.wait)
                .map(|(token, _)| *token)
                .collect();
            for token in removed {
                if let Some(entry) = queue.remove(&token) {
                    aborts.extend(entry.call.into_handle());
                }
            }
        }
        aborts
    }

    pub(crate) fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    pub(crate) fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use http::Method;

    use super::{QueueCall, QueueEntry, QueueState, RequestToken};
    use crate::error::OrchestratorError;
    use crate::transport::TransportHandle;

    struct CountingHandle {
        aborts: Arc<AtomicUsize>,
    }

    impl TransportHandle for CountingHandle {
        fn abort(&self) {
            self.aborts.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn started_entry(url: &str, aborts: &Arc<AtomicUsize>) -> QueueEntry {
        QueueEntry {
            url: url.to_owned(),
            method: Method::GET,
            enable_cancel: true,
            wait: false,
            call: QueueCall::Started(Box::new(CountingHandle {
                aborts: Arc::clone(aborts),
            })),
        }
    }

    fn deferred_entry(url: &str, wait: bool) -> QueueEntry {
        QueueEntry {
            url: url.to_owned(),
            method: Method::GET,
            enable_cancel: true,
            wait,
            call: QueueCall::Deferred(Box::new(|| {
                Box::new(CountingHandle {
                    aborts: Arc::new(AtomicUsize::new(0)),
                })
            })),
        }
    }

    fn token(raw: u64) -> RequestToken {
        RequestToken::from_raw(raw)
    }

    #[test]
    fn throttle_rejects_on_any_match() {
        let aborts = Arc::new(AtomicUsize::new(0));
        let mut state = QueueState::default();
        state.insert_in_flight(token(1), started_entry("/x", &aborts));

        let error = state
            .admit("/x", &Method::GET, true)
            .expect_err("matching throttle request should fast-fail");
        assert!(matches!(error, OrchestratorError::FastFail));
        // The matched entry is left untouched.
        assert_eq!(state.in_flight_len(), 1);
        assert_eq!(aborts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn admit_cancels_matching_predecessors_in_both_queues() {
        let aborts = Arc::new(AtomicUsize::new(0));
        let mut state = QueueState::default();
        state.insert_in_flight(token(1), started_entry("/x", &aborts));
        state.insert_pending(token(2), deferred_entry("/x", false));
        state.insert_pending(token(3), deferred_entry("/y", false));

        let handles = state
            .admit("/x", &Method::GET, false)
            .expect("non-throttle request should be admitted");
        // Only the started match yields a handle; the deferred one is
        // simply dropped.
        assert_eq!(handles.len(), 1);
        assert_eq!(state.in_flight_len(), 0);
        assert_eq!(state.pending_len(), 1);
    }

    #[test]
    fn admit_skips_entries_that_disable_cancel() {
        let aborts = Arc::new(AtomicUsize::new(0));
        let mut state = QueueState::default();
        let mut protected = started_entry("/x", &aborts);
        protected.enable_cancel = false;
        state.insert_in_flight(token(1), protected);

        let handles = state
            .admit("/x", &Method::GET, false)
            .expect("request should be admitted alongside protected match");
        assert!(handles.is_empty());
        assert_eq!(state.in_flight_len(), 1);
    }

    #[test]
    fn method_is_part_of_identity() {
        let aborts = Arc::new(AtomicUsize::new(0));
        let mut state = QueueState::default();
        state.insert_in_flight(token(1), started_entry("/x", &aborts));

        let handles = state
            .admit("/x", &Method::POST, false)
            .expect("different method should not match");
        assert!(handles.is_empty());
        assert_eq!(state.in_flight_len(), 1);
    }

    #[test]
    fn barrier_inspects_only_oldest_in_flight_entry() {
        let aborts = Arc::new(AtomicUsize::new(0));
        let mut state = QueueState::default();
        state.insert_in_flight(token(1), started_entry("/a", &aborts));
        let mut waiter = started_entry("/b", &aborts);
        waiter.wait = true;
        state.insert_in_flight(token(2), waiter);

        // The wait entry is not the oldest, so no barrier applies.
        assert!(!state.barrier_active());

        state.remove_in_flight(token(1));
        assert!(state.barrier_active());
        assert!(!state.accepts_in_flight(None));
    }

    #[test]
    fn ceiling_bounds_in_flight_admission() {
        let aborts = Arc::new(AtomicUsize::new(0));
        let mut state = QueueState::default();
        assert!(state.accepts_in_flight(Some(1)));
        state.insert_in_flight(token(1), started_entry("/a", &aborts));
        assert!(!state.accepts_in_flight(Some(1)));
        assert!(state.accepts_in_flight(None));
    }

    #[test]
    fn promotion_takes_oldest_pending_entry() {
        let mut state = QueueState::default();
        state.insert_pending(token(5), deferred_entry("/b", false));
        state.insert_pending(token(9), deferred_entry("/c", false));

        let (first, entry) = state
            .take_oldest_pending()
            .expect("pending queue should yield its oldest entry");
        assert_eq!(first, token(5));
        assert_eq!(entry.url, "/b");
        let (second, _) = state
            .take_oldest_pending()
            .expect("second entry should follow in order");
        assert_eq!(second, token(9));
        assert!(state.take_oldest_pending().is_none());
    }

    #[test]
    fn clear_spares_wait_entries() {
        let aborts = Arc::new(AtomicUsize::new(0));
        let mut state = QueueState::default();
        let mut waiter = started_entry("/keep", &aborts);
        waiter.wait = true;
        state.insert_in_flight(token(1), waiter);
        state.insert_in_flight(token(2), started_entry("/drop", &aborts));
        state.insert_pending(token(3), deferred_entry("/drop2", false));
        state.insert_pending(token(4), deferred_entry("/keep2", true));

        let handles = state.clear();
        assert_eq!(handles.len(), 1);
        assert_eq!(state.in_flight_len(), 1);
        assert_eq!(state.pending_len(), 1);
    }
}
