//! Replay engine: applies a CSV stream of point requests to a ledger.
//!
//! Requests are parsed up front, then applied either in file order on the
//! calling thread or spread across a pool of worker threads. In the latter
//! case requests for the same user race each other, and the ledger's
//! per-user locking decides the outcome.

use crate::error::{PointError, Result};
use crate::point::{PointHistory, TransactionType, UserPoint};
use crate::service::PointService;
use crate::store::{BalanceStore, HistoryStore, InMemoryBalanceStore, InMemoryHistoryStore};
use csv::{ReaderBuilder, Trim};
use log::{debug, warn};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

/// Raw request record as read from CSV.
#[derive(Debug, Deserialize)]
pub struct RequestRecord {
    /// Request type: charge or use
    #[serde(rename = "type")]
    pub kind: String,

    /// Target user id
    pub user: i64,

    /// Number of points
    pub amount: i64,
}

impl RequestRecord {
    /// Parses the raw record into a typed request.
    ///
    /// Returns `None` for an unknown request type. Non-positive ids and
    /// amounts are left for the ledger to reject.
    pub fn parse(&self, row: usize) -> Option<PointRequest> {
        let kind = self.kind.parse::<TransactionType>().ok()?;
        Some(PointRequest {
            row,
            user: self.user,
            kind,
            amount: self.amount,
        })
    }
}

/// A parsed request ready to be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointRequest {
    /// 1-indexed source row, counting the header
    pub row: usize,

    pub user: i64,

    pub kind: TransactionType,

    pub amount: i64,
}

/// Outcome counts for one replay run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Requests the ledger accepted.
    pub applied: usize,

    /// Requests the ledger rejected.
    pub rejected: usize,

    /// Rows that could not be parsed.
    pub skipped: usize,
}

impl ReplaySummary {
    fn merge(&mut self, other: ReplaySummary) {
        self.applied += other.applied;
        self.rejected += other.rejected;
        self.skipped += other.skipped;
    }
}

/// Drives a [`PointService`] from CSV input and renders its final state.
pub struct ReplayEngine<B, H> {
    service: Arc<PointService<B, H>>,

    /// Positive user ids seen in parsed rows, for output.
    users: BTreeSet<i64>,
}

impl ReplayEngine<InMemoryBalanceStore, InMemoryHistoryStore> {
    /// Creates an engine over fresh in-memory stores.
    pub fn in_memory() -> Self {
        ReplayEngine::new(Arc::new(PointService::new(
            InMemoryBalanceStore::new(),
            InMemoryHistoryStore::new(),
        )))
    }
}

impl<B, H> ReplayEngine<B, H>
where
    B: BalanceStore,
    H: HistoryStore,
{
    /// Creates an engine over an existing service.
    pub fn new(service: Arc<PointService<B, H>>) -> Self {
        ReplayEngine {
            service,
            users: BTreeSet::new(),
        }
    }

    /// The service requests are applied to.
    pub fn service(&self) -> &Arc<PointService<B, H>> {
        &self.service
    }

    /// Reads and applies every request in the CSV stream.
    ///
    /// With `workers == 1` requests run in file order. Invalid rows are
    /// logged at warn level and skipped; ledger rejections are logged at
    /// debug level and counted. A failure to read the input aborts the run
    /// before any request is applied.
    pub fn process_csv<R: Read>(&mut self, reader: R, workers: usize) -> Result<ReplaySummary> {
        let (requests, skipped) = self.read_requests(reader)?;

        let mut summary = if workers <= 1 || requests.len() <= 1 {
            self.apply_sequential(&requests)
        } else {
            self.apply_parallel(&requests, workers)
        };
        summary.skipped = skipped;

        Ok(summary)
    }

    fn read_requests<R: Read>(&mut self, reader: R) -> Result<(Vec<PointRequest>, usize)> {
        let mut csv_reader = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .from_reader(reader);
        csv_reader.headers()?;

        let mut requests = Vec::new();
        let mut skipped = 0;

        for (row_idx, result) in csv_reader.deserialize::<RequestRecord>().enumerate() {
            let row_num = row_idx + 2; // 1-indexed, accounting for header row

            match result {
                Ok(record) => match record.parse(row_num) {
                    Some(request) => {
                        if request.user > 0 {
                            self.users.insert(request.user);
                        }
                        requests.push(request);
                    }
                    None => {
                        warn!("Row {}: Unknown request type '{}'", row_num, record.kind);
                        skipped += 1;
                    }
                },
                Err(e) if e.is_io_error() => return Err(e.into()),
                Err(e) => {
                    warn!("Row {}: CSV parse error: {}", row_num, e);
                    skipped += 1;
                }
            }
        }

        Ok((requests, skipped))
    }

    fn apply_sequential(&self, requests: &[PointRequest]) -> ReplaySummary {
        let mut summary = ReplaySummary::default();
        for request in requests {
            record_outcome(&mut summary, request, apply(self.service.as_ref(), request));
        }
        summary
    }

    fn apply_parallel(&self, requests: &[PointRequest], workers: usize) -> ReplaySummary {
        let next = &AtomicUsize::new(0);
        let service = self.service.as_ref();
        let workers = workers.min(requests.len());

        thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    scope.spawn(move || {
                        let mut local = ReplaySummary::default();
                        loop {
                            let idx = next.fetch_add(1, Ordering::Relaxed);
                            let Some(request) = requests.get(idx) else {
                                break;
                            };
                            record_outcome(&mut local, request, apply(service, request));
                        }
                        local
                    })
                })
                .collect();

            let mut summary = ReplaySummary::default();
            for handle in handles {
                match handle.join() {
                    Ok(local) => summary.merge(local),
                    Err(_) => warn!("Replay worker panicked; its outcomes are not counted"),
                }
            }
            summary
        })
    }

    /// Writes final balances, and optionally the full history, as CSV.
    ///
    /// Balances are sorted by user id. History rows follow a blank line,
    /// sorted by history id, with timestamps in epoch milliseconds.
    pub fn write_output<W: Write>(&self, mut writer: W, include_history: bool) -> Result<()> {
        let balances = self.balances()?;
        {
            let mut csv_writer = csv::Writer::from_writer(&mut writer);
            csv_writer.write_record(["user", "point"])?;
            for balance in &balances {
                csv_writer.write_record([balance.id.to_string(), balance.point.to_string()])?;
            }
            csv_writer.flush()?;
        }

        if include_history {
            writeln!(writer)?;

            let mut csv_writer = csv::Writer::from_writer(&mut writer);
            csv_writer.write_record(["id", "user", "type", "amount", "timestamp"])?;
            for entry in self.history()? {
                csv_writer.write_record([
                    entry.id.to_string(),
                    entry.user_id.to_string(),
                    entry.kind.to_string(),
                    entry.amount.to_string(),
                    entry.timestamp.timestamp_millis().to_string(),
                ])?;
            }
            csv_writer.flush()?;
        }

        Ok(())
    }

    /// Current balances for every user seen, sorted by user id.
    pub fn balances(&self) -> Result<Vec<UserPoint>> {
        let mut balances = Vec::with_capacity(self.users.len());
        for &user in &self.users {
            balances.push(self.service.get_balance(user)?);
        }
        Ok(balances)
    }

    /// History of every user seen, sorted by history id.
    pub fn history(&self) -> Result<Vec<PointHistory>> {
        let mut entries = Vec::new();
        for &user in &self.users {
            entries.extend(self.service.get_history(user)?);
        }
        entries.sort_by_key(|entry| entry.id);
        Ok(entries)
    }
}

fn apply<B: BalanceStore, H: HistoryStore>(
    service: &PointService<B, H>,
    request: &PointRequest,
) -> std::result::Result<UserPoint, PointError> {
    service.apply(request.user, request.kind, request.amount)
}

fn record_outcome(
    summary: &mut ReplaySummary,
    request: &PointRequest,
    outcome: std::result::Result<UserPoint, PointError>,
) {
    match outcome {
        Ok(balance) => {
            debug!(
                "Row {}: {} {} for user {}, balance {}",
                request.row, request.kind, request.amount, request.user, balance.point
            );
            summary.applied += 1;
        }
        Err(e) => {
            debug!(
                "Row {}: {} {} for user {} rejected: {}",
                request.row, request.kind, request.amount, request.user, e
            );
            summary.rejected += 1;
        }
    }
}
