//! The point ledger service.
//!
//! Every charge and use runs its read, limit check and write while holding
//! the per-user lock for the target id, so the balance for one user always
//! evolves as if the mutations ran one at a time. Reads take no lock.

use crate::error::PointError;
use crate::lock::UserLockRegistry;
use crate::point::{PointHistory, TransactionType, UserPoint, MAX_POINT};
use crate::store::{BalanceStore, HistoryStore};
use chrono::Utc;

type PointResult<T> = std::result::Result<T, PointError>;

/// Orchestrates balance mutations against the two stores.
///
/// The service owns its [`UserLockRegistry`]; share one service across
/// threads (e.g. behind an `Arc`) rather than building one per request.
#[derive(Debug)]
pub struct PointService<B, H> {
    balances: B,
    histories: H,
    locks: UserLockRegistry,
}

impl<B: BalanceStore, H: HistoryStore> PointService<B, H> {
    /// Creates a service over the given stores with an empty lock registry.
    pub fn new(balances: B, histories: H) -> Self {
        PointService {
            balances,
            histories,
            locks: UserLockRegistry::new(),
        }
    }

    /// Returns the user's current balance, or a zero balance if none exists.
    pub fn get_balance(&self, id: i64) -> PointResult<UserPoint> {
        validate_user_id(id)?;
        Ok(self.balances.get(id))
    }

    /// Returns every history entry for the user, oldest first.
    pub fn get_history(&self, id: i64) -> PointResult<Vec<PointHistory>> {
        validate_user_id(id)?;
        Ok(self.histories.list_by_user(id))
    }

    /// Adds `amount` points to the user's balance.
    ///
    /// Fails with [`PointError::LimitExceeded`] if the new balance would be
    /// above `MAX_POINT`; nothing is written in that case.
    pub fn charge(&self, id: i64, amount: i64) -> PointResult<UserPoint> {
        validate_user_id(id)?;
        validate_amount(amount, "charge amount must be a positive integer")?;

        let _guard = self.locks.acquire(id);
        let current = self.balances.get(id);

        if current.would_exceed_max(amount) {
            return Err(PointError::LimitExceeded);
        }

        let updated = self.balances.upsert(id, current.point + amount);
        self.histories.append(id, amount, TransactionType::Charge, Utc::now());

        debug_assert!(updated.point <= MAX_POINT);
        Ok(updated)
    }

    /// Takes `amount` points from the user's balance.
    ///
    /// Fails with [`PointError::InsufficientBalance`] if the balance is
    /// smaller than `amount`; nothing is written in that case.
    pub fn use_points(&self, id: i64, amount: i64) -> PointResult<UserPoint> {
        validate_user_id(id)?;
        validate_amount(amount, "use amount must be a positive integer")?;

        let _guard = self.locks.acquire(id);
        let current = self.balances.get(id);

        if !current.can_cover(amount) {
            return Err(PointError::InsufficientBalance);
        }

        let updated = self.balances.upsert(id, current.point - amount);
        self.histories.append(id, amount, TransactionType::Use, Utc::now());

        debug_assert!(updated.point >= 0);
        Ok(updated)
    }

    /// Dispatches to [`charge`](Self::charge) or [`use_points`](Self::use_points).
    pub fn apply(&self, id: i64, kind: TransactionType, amount: i64) -> PointResult<UserPoint> {
        match kind {
            TransactionType::Charge => self.charge(id, amount),
            TransactionType::Use => self.use_points(id, amount),
        }
    }

    #[cfg(test)]
    fn balances(&self) -> &B {
        &self.balances
    }

    #[cfg(test)]
    fn histories(&self) -> &H {
        &self.histories
    }
}

fn validate_user_id(id: i64) -> PointResult<()> {
    if id <= 0 {
        return Err(PointError::InvalidArgument(
            "user id must be a positive integer".to_string(),
        ));
    }
    Ok(())
}

fn validate_amount(amount: i64, message: &str) -> PointResult<()> {
    if amount <= 0 {
        return Err(PointError::InvalidArgument(message.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryBalanceStore, InMemoryHistoryStore};

    fn service() -> PointService<InMemoryBalanceStore, InMemoryHistoryStore> {
        PointService::new(InMemoryBalanceStore::new(), InMemoryHistoryStore::new())
    }

    #[test]
    fn test_get_balance_rejects_non_positive_id() {
        let service = service();

        for id in [0, -1, i64::MIN] {
            assert_eq!(
                service.get_balance(id),
                Err(PointError::InvalidArgument(
                    "user id must be a positive integer".to_string()
                ))
            );
            assert!(service.get_history(id).is_err());
            assert!(service.charge(id, 100).is_err());
            assert!(service.use_points(id, 100).is_err());
        }

        assert!(service.balances().is_empty());
        assert!(service.histories().is_empty());
    }

    #[test]
    fn test_get_balance_for_new_user_is_zero() {
        let service = service();
        let user = service.get_balance(999).unwrap();

        assert_eq!(user.id, 999);
        assert_eq!(user.point, 0);
        assert!(service.get_history(999).unwrap().is_empty());
    }

    #[test]
    fn test_charge_rejects_non_positive_amount() {
        let service = service();

        for amount in [0, -1, -1_000] {
            assert_eq!(
                service.charge(1, amount),
                Err(PointError::InvalidArgument(
                    "charge amount must be a positive integer".to_string()
                ))
            );
        }

        assert!(service.balances().is_empty());
        assert!(service.histories().is_empty());
    }

    #[test]
    fn test_use_rejects_non_positive_amount() {
        let service = service();
        service.charge(1, 1_000).unwrap();

        assert_eq!(
            service.use_points(1, 0),
            Err(PointError::InvalidArgument(
                "use amount must be a positive integer".to_string()
            ))
        );
        assert_eq!(service.get_balance(1).unwrap().point, 1_000);
        assert_eq!(service.get_history(1).unwrap().len(), 1);
    }

    #[test]
    fn test_sequential_charges_accumulate() {
        let service = service();

        assert_eq!(service.charge(1, 3_000).unwrap().point, 3_000);
        assert_eq!(service.charge(1, 2_000).unwrap().point, 5_000);

        let history = service.get_history(1).unwrap();
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|h| h.kind == TransactionType::Charge));
        assert_eq!(history[0].amount, 3_000);
        assert_eq!(history[1].amount, 2_000);
    }

    #[test]
    fn test_charge_up_to_exact_max() {
        let service = service();

        assert_eq!(service.charge(1, MAX_POINT).unwrap().point, MAX_POINT);
        assert_eq!(service.charge(1, 1), Err(PointError::LimitExceeded));
        assert_eq!(service.get_balance(1).unwrap().point, MAX_POINT);
    }

    #[test]
    fn test_charge_over_max_on_fresh_user() {
        let service = service();

        assert_eq!(service.charge(1, 1_000_001), Err(PointError::LimitExceeded));
        assert_eq!(service.get_balance(1).unwrap().point, 0);
        assert!(service.get_history(1).unwrap().is_empty());
    }

    #[test]
    fn test_use_on_fresh_user_is_insufficient() {
        let service = service();

        assert_eq!(service.use_points(1, 1), Err(PointError::InsufficientBalance));
        assert_eq!(service.get_balance(1).unwrap().point, 0);
        assert!(service.get_history(1).unwrap().is_empty());
    }

    #[test]
    fn test_use_entire_balance() {
        let service = service();
        service.charge(1, 5_000).unwrap();

        assert_eq!(service.use_points(1, 5_000).unwrap().point, 0);

        let history = service.get_history(1).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].kind, TransactionType::Use);
        assert_eq!(history[1].amount, 5_000);
    }

    #[test]
    fn test_failed_mutation_releases_lock() {
        let service = service();

        assert!(service.use_points(1, 10).is_err());
        assert!(service.charge(1, MAX_POINT + 1).is_err());
        // Would deadlock if either failure path kept the guard.
        assert_eq!(service.charge(1, 10).unwrap().point, 10);
    }

    #[test]
    fn test_apply_dispatches_by_kind() {
        let service = service();

        service.apply(1, TransactionType::Charge, 800).unwrap();
        let user = service.apply(1, TransactionType::Use, 300).unwrap();

        assert_eq!(user.point, 500);
        let kinds: Vec<_> = service
            .get_history(1)
            .unwrap()
            .into_iter()
            .map(|h| h.kind)
            .collect();
        assert_eq!(kinds, vec![TransactionType::Charge, TransactionType::Use]);
    }

    #[test]
    fn test_users_are_independent() {
        let service = service();

        service.charge(1, 100).unwrap();
        service.charge(2, 200).unwrap();
        service.use_points(1, 50).unwrap();

        assert_eq!(service.get_balance(1).unwrap().point, 50);
        assert_eq!(service.get_balance(2).unwrap().point, 200);
        assert_eq!(service.get_history(2).unwrap().len(), 1);
    }
}
