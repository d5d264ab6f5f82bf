//! Duplicate-call detection.
//!
//! Clients retransmit a call when a reply is slow, reusing the same xid.
//! Re-executing a non-idempotent procedure (WRITE, REMOVE, RENAME) on a
//! retransmission would corrupt state the first execution already
//! changed, so calls are tracked by (xid, client address) and duplicates
//! are dropped without dispatch. Completed records age out after a
//! retention period; in-progress records never do.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

enum TransactionState {
    InProgress,
    Completed(SystemTime),
}

pub struct TransactionTracker {
    retention_period: Duration,
    transactions: Mutex<HashMap<(u32, String), TransactionState>>,
}

impl TransactionTracker {
    pub fn new(retention_period: Duration) -> TransactionTracker {
        TransactionTracker { retention_period, transactions: Mutex::new(HashMap::new()) }
    }

    /// Returns true when this (xid, client) pair has already been seen.
    /// A first sighting is recorded as in progress.
    pub fn is_retransmission(&self, xid: u32, client_addr: &str) -> bool {
        let key = (xid, client_addr.to_string());
        let mut transactions = self.transactions.lock().unwrap();
        expire(&mut transactions, self.retention_period);
        if let std::collections::hash_map::Entry::Vacant(entry) = transactions.entry(key) {
            entry.insert(TransactionState::InProgress);
            false
        } else {
            true
        }
    }

    /// Moves a call from in progress to completed, starting its
    /// retention clock.
    pub fn mark_processed(&self, xid: u32, client_addr: &str) {
        let key = (xid, client_addr.to_string());
        let mut transactions = self.transactions.lock().unwrap();
        if let Some(state) = transactions.get_mut(&key) {
            *state = TransactionState::Completed(SystemTime::now());
        }
    }
}

fn expire(transactions: &mut HashMap<(u32, String), TransactionState>, max_age: Duration) {
    let cutoff = SystemTime::now() - max_age;
    transactions.retain(|_, state| match state {
        TransactionState::InProgress => true,
        TransactionState::Completed(done_at) => *done_at >= cutoff,
    });
}
