//! Dedup ledger - "have I seen this event"
//!
//! Every transport ingestion point funnels through this ledger before any
//! side effect runs. The claim/commit split makes the check-then-mark
//! sequence atomic with respect to concurrent arrivals: a change-feed
//! notification and a same-device broadcast carrying the identical
//! `event_id` can race within milliseconds, and exactly one of them wins
//! the claim.
//!
//! A claim is only committed after all side effects complete; a crash in
//! between leaves the event unmarked and it is safely reprocessed (side
//! effects downstream are idempotent by design).

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

#[derive(Debug, Default)]
struct LedgerInner {
    /// event_id -> commit time (unix millis)
    processed: HashMap<String, i64>,
    /// Claimed but not yet committed
    in_flight: HashSet<String>,
}

/// Tracks which event identifiers have already been acted upon.
///
/// Entries are evicted after a bounded retention window (one business day by
/// default) - the active working set is small and short-lived, so unbounded
/// retention would only leak memory.
#[derive(Debug, Default)]
pub struct DedupLedger {
    inner: Mutex<LedgerInner>,
}

impl DedupLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically claim an event for processing.
    ///
    /// Returns `false` if the event was already committed or is currently
    /// being processed by another arrival path. A `true` return must be
    /// followed by [`commit`](Self::commit) or [`release`](Self::release).
    pub fn claim(&self, event_id: &str) -> bool {
        let mut inner = self.inner.lock();
        if inner.processed.contains_key(event_id) || inner.in_flight.contains(event_id) {
            return false;
        }
        inner.in_flight.insert(event_id.to_string());
        true
    }

    /// Mark a claimed event as fully processed
    pub fn commit(&self, event_id: &str, now: i64) {
        let mut inner = self.inner.lock();
        inner.in_flight.remove(event_id);
        inner.processed.insert(event_id.to_string(), now);
    }

    /// Drop a claim without marking processed, allowing reprocessing.
    ///
    /// Used when an event cannot be resolved yet (e.g. it references an
    /// order the local view has not learned about).
    pub fn release(&self, event_id: &str) {
        self.inner.lock().in_flight.remove(event_id);
    }

    /// Whether an event has been committed
    pub fn is_processed(&self, event_id: &str) -> bool {
        self.inner.lock().processed.contains_key(event_id)
    }

    /// Evict committed entries older than the retention window.
    ///
    /// Returns the number of evicted entries.
    pub fn prune(&self, now: i64, retention: Duration) -> usize {
        let cutoff = now - retention.as_millis() as i64;
        let mut inner = self.inner.lock();
        let before = inner.processed.len();
        inner.processed.retain(|_, seen_at| *seen_at >= cutoff);
        before - inner.processed.len()
    }

    /// Number of committed entries (diagnostics)
    pub fn len(&self) -> usize {
        self.inner.lock().processed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().processed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_claim_commit_cycle() {
        let ledger = DedupLedger::new();
        assert!(ledger.claim("e1"));
        // Second arrival of the same event while in flight
        assert!(!ledger.claim("e1"));

        ledger.commit("e1", 1_000);
        assert!(ledger.is_processed("e1"));
        assert!(!ledger.claim("e1"));
    }

    #[test]
    fn test_release_allows_reprocessing() {
        let ledger = DedupLedger::new();
        assert!(ledger.claim("e1"));
        ledger.release("e1");
        assert!(!ledger.is_processed("e1"));
        assert!(ledger.claim("e1"));
    }

    #[test]
    fn test_prune_evicts_old_entries() {
        let ledger = DedupLedger::new();
        ledger.claim("old");
        ledger.commit("old", 0);
        ledger.claim("recent");
        ledger.commit("recent", 90_000_000);

        let evicted = ledger.prune(100_000_000, Duration::from_secs(3600 * 10));
        assert_eq!(evicted, 1);
        assert!(!ledger.is_processed("old"));
        assert!(ledger.is_processed("recent"));
        // An evicted id can be claimed again (next business day semantics)
        assert!(ledger.claim("old"));
    }

    #[test]
    fn test_concurrent_claims_single_winner() {
        let ledger = Arc::new(DedupLedger::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let ledger = Arc::clone(&ledger);
            handles.push(std::thread::spawn(move || ledger.claim("racy")));
        }
        let wins: usize = handles
            .into_iter()
            .map(|h| h.join().unwrap() as usize)
            .sum();
        assert_eq!(wins, 1);
    }
}
