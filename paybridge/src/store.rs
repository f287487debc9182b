//! Concurrent transaction store.
//!
//! The store is the only shared mutable resource in the system. The raw map
//! is never exposed: status changes go through
//! [`TransactionStore::compare_and_set_status`], which is the concurrency
//! linchpin — at most one of the racing confirmation paths can win a
//! transition, and terminal records are immutable by construction.
//!
//! Backed by a [`DashMap`], so conflicting writes serialize per shard while
//! unrelated references proceed independently; there is no global lock.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::error::DuplicateReference;
use crate::transaction::{Reference, Transaction, TxStatus};

/// In-memory map of transactions keyed by reference.
///
/// All state is process-resident and lost on restart; durability is an
/// explicit non-goal of the bridge.
#[derive(Debug, Default)]
pub struct TransactionStore {
    txs: DashMap<Reference, Transaction>,
}

impl TransactionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a new transaction.
    ///
    /// # Errors
    ///
    /// Returns [`DuplicateReference`] without touching the existing record
    /// when the reference is already present.
    pub fn create(&self, tx: Transaction) -> Result<(), DuplicateReference> {
        match self.txs.entry(tx.reference.clone()) {
            Entry::Occupied(_) => Err(DuplicateReference {
                reference: tx.reference,
            }),
            Entry::Vacant(slot) => {
                slot.insert(tx);
                Ok(())
            }
        }
    }

    /// Returns a snapshot of the transaction, if present.
    #[must_use]
    pub fn get(&self, reference: &Reference) -> Option<Transaction> {
        self.txs.get(reference).map(|entry| entry.value().clone())
    }

    /// Atomically transitions `reference` from `expected` to `new`.
    ///
    /// Returns `true` iff the record exists, its status equals `expected`,
    /// and the mutation was applied. Any other situation — unknown
    /// reference, already-terminal record, lost race — returns `false`
    /// without mutating anything. A `true` result is the caller's single
    /// permission gate for transition side effects such as notifications.
    pub fn compare_and_set_status(
        &self,
        reference: &Reference,
        expected: TxStatus,
        new: TxStatus,
    ) -> bool {
        match self.txs.get_mut(reference) {
            Some(mut entry) if entry.status == expected => {
                entry.status = new;
                true
            }
            _ => false,
        }
    }

    /// Atomically admits one poll of the gateway for a pending record.
    ///
    /// Returns `true` and stamps the poll time iff the record exists, is
    /// still `Pending`, and has not been polled within `min_interval`.
    /// Concurrent status checks therefore admit at most one gateway lookup
    /// per interval.
    pub fn try_begin_poll(&self, reference: &Reference, min_interval: Duration) -> bool {
        match self.txs.get_mut(reference) {
            Some(mut entry) if entry.status == TxStatus::Pending => {
                let now = Instant::now();
                match entry.last_polled {
                    Some(last) if now.duration_since(last) < min_interval => false,
                    _ => {
                        entry.last_polled = Some(now);
                        true
                    }
                }
            }
            _ => false,
        }
    }

    /// Evicts records created more than `max_age` ago, bounding memory
    /// growth. Returns how many were removed.
    ///
    /// The count is taken inside the retain predicate; comparing map sizes
    /// around the sweep would misreport (or underflow) when inserts land
    /// concurrently.
    pub fn evict_older_than(&self, max_age: Duration) -> usize {
        let mut evicted = 0;
        self.txs.retain(|_, tx| {
            if tx.created_at.elapsed() <= max_age {
                true
            } else {
                evicted += 1;
                false
            }
        });
        evicted
    }

    /// Number of transactions currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.txs.len()
    }

    /// Whether the store holds no transactions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.txs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::test_support::pending_tx;

    #[test]
    fn test_create_then_get() {
        let store = TransactionStore::new();
        let tx = pending_tx("T1");
        store.create(tx).unwrap();

        let got = store.get(&Reference::from("T1")).unwrap();
        assert_eq!(got.status, TxStatus::Pending);
        assert_eq!(got.payer_name, "Ana");
    }

    #[test]
    fn test_create_duplicate_rejected() {
        let store = TransactionStore::new();
        store.create(pending_tx("T1")).unwrap();

        let err = store.create(pending_tx("T1")).unwrap_err();
        assert_eq!(err.reference, Reference::from("T1"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_get_unknown_reference() {
        let store = TransactionStore::new();
        assert!(store.get(&Reference::from("nope")).is_none());
    }

    #[test]
    fn test_cas_happy_path() {
        let store = TransactionStore::new();
        store.create(pending_tx("T1")).unwrap();
        let reference = Reference::from("T1");

        assert!(store.compare_and_set_status(&reference, TxStatus::Pending, TxStatus::Paid));
        assert_eq!(store.get(&reference).unwrap().status, TxStatus::Paid);
    }

    #[test]
    fn test_cas_terminal_record_is_immutable() {
        let store = TransactionStore::new();
        store.create(pending_tx("T1")).unwrap();
        let reference = Reference::from("T1");
        assert!(store.compare_and_set_status(&reference, TxStatus::Pending, TxStatus::Paid));

        // every further transition attempt is a no-op
        assert!(!store.compare_and_set_status(&reference, TxStatus::Pending, TxStatus::Failed));
        assert!(!store.compare_and_set_status(&reference, TxStatus::Paid, TxStatus::Pending));
        assert!(!store.compare_and_set_status(&reference, TxStatus::Paid, TxStatus::Failed));
        assert_eq!(store.get(&reference).unwrap().status, TxStatus::Paid);
    }

    #[test]
    fn test_cas_unknown_reference_returns_false() {
        let store = TransactionStore::new();
        assert!(!store.compare_and_set_status(
            &Reference::from("ghost"),
            TxStatus::Pending,
            TxStatus::Paid
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_cas_race_has_exactly_one_winner() {
        let store = Arc::new(TransactionStore::new());
        store.create(pending_tx("T1")).unwrap();
        let reference = Reference::from("T1");

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = Arc::clone(&store);
            let reference = reference.clone();
            handles.push(tokio::spawn(async move {
                store.compare_and_set_status(&reference, TxStatus::Pending, TxStatus::Paid)
            }));
        }

        let mut wins = 0;
        for handle in handles {
            if handle.await.unwrap() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);
        assert_eq!(store.get(&reference).unwrap().status, TxStatus::Paid);
    }

    #[test]
    fn test_try_begin_poll_admits_once_per_interval() {
        let store = TransactionStore::new();
        store.create(pending_tx("T1")).unwrap();
        let reference = Reference::from("T1");
        let interval = Duration::from_secs(60);

        assert!(store.try_begin_poll(&reference, interval));
        assert!(!store.try_begin_poll(&reference, interval));
    }

    #[test]
    fn test_try_begin_poll_readmits_after_interval() {
        let store = TransactionStore::new();
        store.create(pending_tx("T1")).unwrap();
        let reference = Reference::from("T1");

        assert!(store.try_begin_poll(&reference, Duration::ZERO));
        assert!(store.try_begin_poll(&reference, Duration::ZERO));
    }

    #[test]
    fn test_try_begin_poll_refuses_terminal_and_unknown() {
        let store = TransactionStore::new();
        store.create(pending_tx("T1")).unwrap();
        let reference = Reference::from("T1");
        store.compare_and_set_status(&reference, TxStatus::Pending, TxStatus::Failed);

        assert!(!store.try_begin_poll(&reference, Duration::ZERO));
        assert!(!store.try_begin_poll(&Reference::from("ghost"), Duration::ZERO));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_evict_count_stable_under_concurrent_inserts() {
        let store = Arc::new(TransactionStore::new());

        let writer = {
            let store = Arc::clone(&store);
            tokio::task::spawn_blocking(move || {
                for i in 0..20_000 {
                    store.create(pending_tx(&format!("T{i}"))).unwrap();
                }
            })
        };

        // fresh records are never stale, so every sweep must report zero
        // no matter how many inserts land mid-retain
        while !writer.is_finished() {
            assert_eq!(store.evict_older_than(Duration::from_secs(3600)), 0);
        }
        writer.await.unwrap();
        assert_eq!(store.len(), 20_000);
    }

    #[test]
    fn test_evict_older_than() {
        let store = TransactionStore::new();
        store.create(pending_tx("T1")).unwrap();
        store.create(pending_tx("T2")).unwrap();

        assert_eq!(store.evict_older_than(Duration::from_secs(3600)), 0);
        assert_eq!(store.len(), 2);

        assert_eq!(store.evict_older_than(Duration::ZERO), 2);
        assert!(store.is_empty());
    }
}
