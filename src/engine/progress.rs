//! Run counters and derived telemetry.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Shared counters for one attempt, mutated concurrently by every in-flight
/// batch. All updates are atomic increments; a plain read-modify-write here
/// would lose counts under concurrency.
pub struct RunState {
    attempt: u32,
    max_attempts: u32,
    total_records: AtomicU64,
    deleted: AtomicU64,
    batches_started: AtomicU64,
    batches_completed: AtomicU64,
    batches_failed: AtomicU64,
    started_at: Instant,
}

impl RunState {
    pub fn new(attempt: u32, max_attempts: u32) -> Self {
        Self {
            attempt,
            max_attempts,
            total_records: AtomicU64::new(0),
            deleted: AtomicU64::new(0),
            batches_started: AtomicU64::new(0),
            batches_completed: AtomicU64::new(0),
            batches_failed: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    pub fn set_total(&self, total: u64) {
        self.total_records.store(total, Ordering::Relaxed);
    }

    /// Count one individually-succeeded record deletion.
    pub fn record_deleted(&self) {
        self.deleted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn batch_started(&self) {
        self.batches_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn batch_completed(&self) {
        self.batches_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn batch_failed(&self) {
        self.batches_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn deleted(&self) -> u64 {
        self.deleted.load(Ordering::Relaxed)
    }

    pub fn total_records(&self) -> u64 {
        self.total_records.load(Ordering::Relaxed)
    }

    /// Consistent view of the counters plus derived telemetry.
    pub fn snapshot(&self) -> ProgressSnapshot {
        let total = self.total_records.load(Ordering::Relaxed);
        let deleted = self.deleted.load(Ordering::Relaxed);
        let elapsed = self.started_at.elapsed();

        let percent = if total == 0 {
            0.0
        } else {
            deleted as f64 / total as f64 * 100.0
        };
        let rate = if elapsed.as_secs_f64() > 0.0 {
            deleted as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };

        // ETA is unknown until something has actually been deleted; deriving
        // one at 0% would divide by zero.
        let estimated_remaining = if percent > 0.0 && percent < 100.0 {
            Some(elapsed.mul_f64(100.0 / percent - 1.0))
        } else if percent >= 100.0 {
            Some(Duration::ZERO)
        } else {
            None
        };
        let estimated_completion = estimated_remaining
            .and_then(|d| chrono::Duration::from_std(d).ok())
            .map(|d| Utc::now() + d);

        ProgressSnapshot {
            attempt: self.attempt,
            max_attempts: self.max_attempts,
            total_records: total,
            deleted,
            remaining_records: total.saturating_sub(deleted),
            percent,
            elapsed,
            rate,
            estimated_remaining,
            estimated_completion,
            batches_started: self.batches_started.load(Ordering::Relaxed),
            batches_completed: self.batches_completed.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of an attempt, ready for a presentation layer.
#[derive(Debug, Clone)]
pub struct ProgressSnapshot {
    pub attempt: u32,
    pub max_attempts: u32,
    pub total_records: u64,
    pub deleted: u64,
    pub remaining_records: u64,
    pub percent: f64,
    pub elapsed: Duration,
    /// Instantaneous throughput in records per second
    pub rate: f64,
    /// `None` until any progress has been made
    pub estimated_remaining: Option<Duration>,
    /// `None` until any progress has been made
    pub estimated_completion: Option<DateTime<Utc>>,
    pub batches_started: u64,
    pub batches_completed: u64,
    pub batches_failed: u64,
}
