//! Point balance and history models.
//!
//! Maintains the invariant: `0 <= point <= MAX_POINT` for every stored balance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The maximum balance a single user may hold.
pub const MAX_POINT: i64 = 1_000_000;

/// A user's current point balance.
///
/// # Invariants
///
/// - `0 <= point <= MAX_POINT` at all observable times
/// - A user with no prior activity has `point == 0`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPoint {
    /// User identifier. Always positive.
    pub id: i64,

    /// Current balance.
    pub point: i64,

    /// When the balance was last written (or read, for a default record).
    pub updated_at: DateTime<Utc>,
}

impl UserPoint {
    /// Creates the zero-balance record for a user with no stored balance.
    pub fn empty(id: i64) -> Self {
        UserPoint {
            id,
            point: 0,
            updated_at: Utc::now(),
        }
    }

    /// Returns `true` if adding `amount` would push the balance past `MAX_POINT`.
    pub fn would_exceed_max(&self, amount: i64) -> bool {
        self.point.saturating_add(amount) > MAX_POINT
    }

    /// Returns `true` if the balance covers `amount`.
    pub fn can_cover(&self, amount: i64) -> bool {
        self.point >= amount
    }
}

/// Whether a history entry increased or decreased a balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    /// Points added to the balance.
    Charge,

    /// Points taken from the balance.
    Use,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Charge => "CHARGE",
            TransactionType::Use => "USE",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = String;

    /// Parses `charge` or `use`, ignoring case and surrounding whitespace.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "charge" => Ok(TransactionType::Charge),
            "use" => Ok(TransactionType::Use),
            other => Err(format!("unknown transaction type '{}'", other)),
        }
    }
}

/// An immutable record of one balance-changing event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointHistory {
    /// Globally monotonic sequence number, assigned by the history store.
    pub id: u64,

    /// User whose balance changed.
    pub user_id: i64,

    /// Positive number of points charged or used.
    pub amount: i64,

    /// Direction of the change.
    #[serde(rename = "type")]
    pub kind: TransactionType,

    /// When the change happened.
    pub timestamp: DateTime<Utc>,
}

impl PointHistory {
    /// The signed effect of this entry on the balance.
    pub fn signed_amount(&self) -> i64 {
        match self.kind {
            TransactionType::Charge => self.amount,
            TransactionType::Use => -self.amount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_user_point_has_zero_balance() {
        let user = UserPoint::empty(7);
        assert_eq!(user.id, 7);
        assert_eq!(user.point, 0);
    }

    #[test]
    fn test_would_exceed_max_boundary() {
        let mut user = UserPoint::empty(1);
        user.point = 999_000;

        assert!(!user.would_exceed_max(1_000));
        assert!(user.would_exceed_max(1_001));
        assert!(user.would_exceed_max(i64::MAX));
    }

    #[test]
    fn test_can_cover() {
        let mut user = UserPoint::empty(1);
        user.point = 500;

        assert!(user.can_cover(500));
        assert!(!user.can_cover(501));
    }

    #[test]
    fn test_parse_transaction_type() {
        assert_eq!("charge".parse::<TransactionType>(), Ok(TransactionType::Charge));
        assert_eq!("  USE ".parse::<TransactionType>(), Ok(TransactionType::Use));
        assert!("refund".parse::<TransactionType>().is_err());
    }

    #[test]
    fn test_transaction_type_display() {
        assert_eq!(TransactionType::Charge.to_string(), "CHARGE");
        assert_eq!(TransactionType::Use.to_string(), "USE");
    }

    #[test]
    fn test_signed_amount() {
        let entry = PointHistory {
            id: 1,
            user_id: 1,
            amount: 300,
            kind: TransactionType::Use,
            timestamp: Utc::now(),
        };
        assert_eq!(entry.signed_amount(), -300);
    }
}
