//! Per-user mutual exclusion.

use dashmap::DashMap;
use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex};
use std::sync::Arc;

/// Hands out one mutex per user id, created on first use.
///
/// Entries are never removed: a guard may outlive any particular lookup, and
/// the number of distinct user ids is expected to stay small.
#[derive(Debug, Default)]
pub struct UserLockRegistry {
    locks: DashMap<i64, Arc<Mutex<()>>>,
}

/// Exclusive hold on one user's lock. Released on drop.
pub struct UserLockGuard {
    _guard: ArcMutexGuard<RawMutex, ()>,
}

impl UserLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until the caller holds the lock for `user_id`.
    ///
    /// Different user ids never contend. There is no timeout and no fairness
    /// guarantee among waiters.
    pub fn acquire(&self, user_id: i64) -> UserLockGuard {
        // The map's shard lock covers both the lookup and the insert, and is
        // released before blocking on the user mutex.
        let lock = Arc::clone(
            self.locks
                .entry(user_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        );

        UserLockGuard {
            _guard: lock.lock_arc(),
        }
    }

    /// Number of user ids that have ever been locked.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
