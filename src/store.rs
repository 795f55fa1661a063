//! Storage collaborators consumed by the ledger service.
//!
//! The service only needs point reads and upserts of balances, plus appends
//! and per-user listings of history. The in-memory
//! implementations are safe for concurrent access across user ids but do not
//! serialize read-modify-write sequences on the same id; that is the job of
//! [`UserLockRegistry`](crate::lock::UserLockRegistry).

use crate::point::{PointHistory, TransactionType, UserPoint};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Current balance per user id.
pub trait BalanceStore: Send + Sync {
    /// Returns the stored balance, or a zero balance if the user has none.
    fn get(&self, user_id: i64) -> UserPoint;

    /// Creates or overwrites the balance with a fresh timestamp.
    fn upsert(&self, user_id: i64, point: i64) -> UserPoint;
}

/// Append-only log of balance-changing events.
pub trait HistoryStore: Send + Sync {
    /// Stores a new entry and returns it with its assigned id.
    fn append(
        &self,
        user_id: i64,
        amount: i64,
        kind: TransactionType,
        timestamp: DateTime<Utc>,
    ) -> PointHistory;

    /// Returns every entry for the user in insertion order.
    fn list_by_user(&self, user_id: i64) -> Vec<PointHistory>;
}

impl<S: BalanceStore + ?Sized> BalanceStore for Arc<S> {
    fn get(&self, user_id: i64) -> UserPoint {
        (**self).get(user_id)
    }

    fn upsert(&self, user_id: i64, point: i64) -> UserPoint {
        (**self).upsert(user_id, point)
    }
}

impl<S: HistoryStore + ?Sized> HistoryStore for Arc<S> {
    fn append(
        &self,
        user_id: i64,
        amount: i64,
        kind: TransactionType,
        timestamp: DateTime<Utc>,
    ) -> PointHistory {
        (**self).append(user_id, amount, kind, timestamp)
    }

    fn list_by_user(&self, user_id: i64) -> Vec<PointHistory> {
        (**self).list_by_user(user_id)
    }
}

fn simulate_latency(latency: Option<Duration>) {
    if let Some(delay) = latency {
        thread::sleep(delay);
    }
}

/// Balance table backed by a concurrent map.
#[derive(Debug, Default)]
pub struct InMemoryBalanceStore {
    points: DashMap<i64, UserPoint>,
    latency: Option<Duration>,
}

impl InMemoryBalanceStore {
    /// Creates an empty store with no simulated latency.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store that sleeps for `latency` on every access.
    ///
    /// Widens the window between read and write so that unsynchronized
    /// read-modify-write sequences reliably lose updates.
    pub fn with_latency(latency: Duration) -> Self {
        InMemoryBalanceStore {
            points: DashMap::new(),
            latency: Some(latency),
        }
    }

    /// Number of users with a stored balance.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl BalanceStore for InMemoryBalanceStore {
    fn get(&self, user_id: i64) -> UserPoint {
        simulate_latency(self.latency);
        self.points
            .get(&user_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_else(|| UserPoint::empty(user_id))
    }

    fn upsert(&self, user_id: i64, point: i64) -> UserPoint {
        simulate_latency(self.latency);
        let record = UserPoint {
            id: user_id,
            point,
            updated_at: Utc::now(),
        };
        self.points.insert(user_id, record.clone());
        record
    }
}

/// History table backed by a single append-only vector.
///
/// Ids are assigned under the write lock, so id order equals insertion order.
#[derive(Debug, Default)]
pub struct InMemoryHistoryStore {
    entries: RwLock<Vec<PointHistory>>,
    latency: Option<Duration>,
}

impl InMemoryHistoryStore {
    /// Creates an empty store with no simulated latency.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store that sleeps for `latency` on every access.
    pub fn with_latency(latency: Duration) -> Self {
        InMemoryHistoryStore {
            entries: RwLock::new(Vec::new()),
            latency: Some(latency),
        }
    }

    /// Total number of entries across all users.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl HistoryStore for InMemoryHistoryStore {
    fn append(
        &self,
        user_id: i64,
        amount: i64,
        kind: TransactionType,
        timestamp: DateTime<Utc>,
    ) -> PointHistory {
        simulate_latency(self.latency);
        let mut entries = self.entries.write();
        let entry = PointHistory {
            id: entries.len() as u64 + 1,
            user_id,
            amount,
            kind,
            timestamp,
        };
        entries.push(entry.clone());
        entry
    }

    fn list_by_user(&self, user_id: i64) -> Vec<PointHistory> {
        simulate_latency(self.latency);
        self.entries
            .read()
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .cloned()
            .collect()
    }
}
