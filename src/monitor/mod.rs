//! Periodic progress feed.
//!
//! The engine only computes numbers; this task turns snapshots into
//! structured log lines on a fixed cadence. Any richer rendering sits on top
//! of the same snapshots.

use crate::engine::progress::RunState;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

pub struct ProgressReporter;

impl ProgressReporter {
    /// Emit a snapshot line every `interval` until `done` flips true, then a
    /// final line with the attempt's closing numbers.
    pub fn spawn(
        state: Arc<RunState>,
        interval: Duration,
        mut done: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick fires immediately; skip it so the opening line
            // is not an all-zero snapshot.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => emit(&state),
                    changed = done.changed() => {
                        if changed.is_err() || *done.borrow() {
                            emit(&state);
                            break;
                        }
                    }
                }
            }
        })
    }
}

fn emit(state: &RunState) {
    let snapshot = state.snapshot();
    match (snapshot.estimated_remaining, snapshot.estimated_completion) {
        (Some(remaining), Some(completion)) => info!(
            attempt = snapshot.attempt,
            of = snapshot.max_attempts,
            deleted = snapshot.deleted,
            total = snapshot.total_records,
            percent = format_args!("{:.2}", snapshot.percent),
            rate = format_args!("{:.0}/s", snapshot.rate),
            elapsed_secs = snapshot.elapsed.as_secs(),
            remaining_secs = remaining.as_secs(),
            eta = %completion.format("%H:%M:%S"),
            batches_started = snapshot.batches_started,
            batches_completed = snapshot.batches_completed,
            batches_failed = snapshot.batches_failed,
            "progress"
        ),
        _ => info!(
            attempt = snapshot.attempt,
            of = snapshot.max_attempts,
            deleted = snapshot.deleted,
            total = snapshot.total_records,
            percent = format_args!("{:.2}", snapshot.percent),
            elapsed_secs = snapshot.elapsed.as_secs(),
            eta = "unknown",
            batches_started = snapshot.batches_started,
            batches_completed = snapshot.batches_completed,
            batches_failed = snapshot.batches_failed,
            "progress"
        ),
    }
}
