//! # Point Ledger
//!
//! A per-user point balance ledger. Users are charged points or use them;
//! balances stay within `[0, MAX_POINT]` and every accepted change is
//! recorded as an immutable history entry.
//!
//! ## Design Principles
//!
//! - **Per-user serialization**: charge and use on the same user run under
//!   one lock, so concurrent requests never lose updates
//! - **Independent users**: requests for different users never contend
//! - **Narrow storage seams**: balances and history sit behind the
//!   `BalanceStore` and `HistoryStore` traits
//! - **Get-or-default reads**: an unknown user has a zero balance
//!
//! ## Example
//!
//! ```
//! use point_ledger::{InMemoryBalanceStore, InMemoryHistoryStore, PointError, PointService};
//!
//! let service = PointService::new(InMemoryBalanceStore::new(), InMemoryHistoryStore::new());
//! service.charge(1, 5_000).unwrap();
//! assert_eq!(service.use_points(1, 3_000).unwrap().point, 2_000);
//! assert_eq!(service.use_points(1, 3_000), Err(PointError::InsufficientBalance));
//! assert_eq!(service.get_history(1).unwrap().len(), 2);
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod lock;
pub mod point;
pub mod service;
pub mod store;

pub use config::ReplayConfig;
pub use engine::{PointRequest, ReplayEngine, ReplaySummary, RequestRecord};
pub use error::{EngineError, PointError, Result};
pub use lock::{UserLockGuard, UserLockRegistry};
pub use point::{PointHistory, TransactionType, UserPoint, MAX_POINT};
pub use service::PointService;
pub use store::{BalanceStore, HistoryStore, InMemoryBalanceStore, InMemoryHistoryStore};
