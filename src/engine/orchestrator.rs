//! Whole-run orchestration: list, partition, dispatch, drain, repeat.

use crate::config::PurgeConfig;
use crate::engine::executor::BatchExecutor;
use crate::engine::gate::ConcurrencyGate;
use crate::engine::partition;
use crate::engine::pool::ConnectionPool;
use crate::engine::progress::RunState;
use crate::engine::lister;
use crate::error::Result;
use crate::monitor::ProgressReporter;
use crate::sink::{ErrorCategory, ErrorSink};
use crate::store::RecordStore;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Closing numbers of one attempt.
#[derive(Debug, Clone, Default)]
pub struct AttemptReport {
    pub attempt: u32,
    pub listed: u64,
    pub deleted: u64,
    pub batches_dispatched: u64,
    pub batches_completed: u64,
    pub batches_failed: u64,
    /// Listing failed; no batches were dispatched this attempt
    pub list_failed: bool,
}

/// Aggregate over all attempts of one run.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub attempts: Vec<AttemptReport>,
}

impl RunSummary {
    pub fn total_deleted(&self) -> u64 {
        self.attempts.iter().map(|a| a.deleted).sum()
    }

    pub fn total_failed_batches(&self) -> u64 {
        self.attempts.iter().map(|a| a.batches_failed).sum()
    }
}

/// Drives the attempt state machine (Listing, Dispatching, Draining, Done)
/// and the outer retry loop around it.
pub struct RunOrchestrator {
    pool: Arc<ConnectionPool>,
    sink: Arc<dyn ErrorSink>,
    gate: ConcurrencyGate,
    config: PurgeConfig,
    shutdown: watch::Receiver<bool>,
}

impl RunOrchestrator {
    pub fn new(
        store: Arc<dyn RecordStore>,
        sink: Arc<dyn ErrorSink>,
        config: PurgeConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let gate = ConcurrencyGate::new(config.concurrency);
        Self {
            pool: Arc::new(ConnectionPool::new(store)),
            sink,
            gate,
            config,
            shutdown,
        }
    }

    /// Run the configured number of attempts, unconditionally.
    ///
    /// Each attempt re-lists the collection and deletes whatever it finds, so
    /// a later attempt naturally operates on the remainder of an earlier one.
    /// The attempt count is a repeat count, not a retry-until-empty policy;
    /// an attempt that lists zero records still runs.
    pub async fn run(&self) -> Result<RunSummary> {
        let mut summary = RunSummary::default();

        for attempt in 1..=self.config.retries {
            if *self.shutdown.borrow() {
                warn!(attempt, "shutdown requested, skipping remaining attempts");
                break;
            }
            info!(attempt, of = self.config.retries, "starting attempt");
            let report = self.run_attempt(attempt).await;
            info!(
                attempt,
                listed = report.listed,
                deleted = report.deleted,
                batches_completed = report.batches_completed,
                batches_failed = report.batches_failed,
                "attempt finished"
            );
            summary.attempts.push(report);
        }

        Ok(summary)
    }

    async fn run_attempt(&self, attempt: u32) -> AttemptReport {
        let state = Arc::new(RunState::new(attempt, self.config.retries));
        let (done_tx, done_rx) = watch::channel(false);
        let reporter =
            ProgressReporter::spawn(state.clone(), self.config.progress_interval(), done_rx);

        // Listing: the full id set is materialized before any deletion. The
        // first configured credential does the listing.
        let lead = &self.config.credentials[0];
        let ids = match lister::list_all(
            &self.pool,
            lead,
            &self.config.collection,
            self.config.page_size,
        )
        .await
        {
            Ok(ids) => ids,
            Err(e) => {
                self.sink.record(ErrorCategory::List, &e.to_string());
                error!(attempt, error = %e, "listing failed, no batches dispatched");
                let _ = done_tx.send(true);
                let _ = reporter.await;
                return AttemptReport {
                    attempt,
                    list_failed: true,
                    ..AttemptReport::default()
                };
            }
        };
        state.set_total(ids.len() as u64);
        info!(attempt, records = ids.len(), "listing complete");

        // Dispatching: one shard per credential, shards sliced into batches,
        // every batch gated before it is spawned. Admission blocks here; batch
        // completion does not.
        let executor = Arc::new(BatchExecutor::new(
            self.config.collection.clone(),
            state.clone(),
            self.sink.clone(),
        ));
        let shards = partition::partition(&ids, self.config.credentials.len());
        let mut tasks: JoinSet<()> = JoinSet::new();

        'dispatch: for (credential, shard) in self.config.credentials.iter().zip(&shards) {
            for batch in partition::into_batches(shard, self.config.batch_size) {
                if *self.shutdown.borrow() {
                    warn!(attempt, "shutdown requested, in-flight batches will finish");
                    break 'dispatch;
                }
                let Ok(permit) = self.gate.acquire().await else {
                    break 'dispatch;
                };
                // A signal may have arrived while waiting on a full gate;
                // the permit drops on break and frees the slot.
                if *self.shutdown.borrow() {
                    warn!(attempt, "shutdown requested, in-flight batches will finish");
                    break 'dispatch;
                }
                state.batch_started();

                let pool = self.pool.clone();
                let executor = executor.clone();
                let state = state.clone();
                let sink = self.sink.clone();
                let credential = credential.clone();
                tasks.spawn(async move {
                    // Dropping the permit at task exit returns the gate slot
                    // on every path out of this block.
                    let _permit = permit;

                    let connection = match pool.get(&credential).await {
                        Ok(connection) => connection,
                        Err(e) => {
                            sink.record(
                                ErrorCategory::Connection,
                                &format!("client {}: {}", credential.client_id, e),
                            );
                            state.batch_failed();
                            return;
                        }
                    };

                    match executor.execute(&connection, &batch).await {
                        Ok(_) => state.batch_completed(),
                        Err(e) => {
                            sink.record(ErrorCategory::Batch, &e.to_string());
                            state.batch_failed();
                        }
                    }
                });
            }
        }

        // Draining: every dispatched batch reaches a terminal state before
        // the attempt concludes. A panicked batch task is recorded as failed
        // so started == completed + failed still holds.
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                state.batch_failed();
                self.sink
                    .record(ErrorCategory::Batch, &format!("batch task aborted: {e}"));
            }
        }

        let _ = done_tx.send(true);
        let _ = reporter.await;

        let snapshot = state.snapshot();
        AttemptReport {
            attempt,
            listed: snapshot.total_records,
            deleted: snapshot.deleted,
            batches_dispatched: snapshot.batches_started,
            batches_completed: snapshot.batches_completed,
            batches_failed: snapshot.batches_failed,
            list_failed: false,
        }
    }
}
