//! Executes one delete batch over one pooled connection.

use crate::engine::pool::PooledConnection;
use crate::engine::progress::RunState;
use crate::error::{PurgeError, Result};
use crate::sink::{ErrorCategory, ErrorSink};
use crate::store::RecordId;
use std::sync::Arc;
use tracing::debug;

/// Tally of one submitted batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub deleted: usize,
    pub faulted: usize,
}

/// Submits batches and classifies per-record results.
pub struct BatchExecutor {
    collection: String,
    state: Arc<RunState>,
    sink: Arc<dyn ErrorSink>,
}

impl BatchExecutor {
    pub fn new(collection: String, state: Arc<RunState>, sink: Arc<dyn ErrorSink>) -> Self {
        Self {
            collection,
            state,
            sink,
        }
    }

    /// Issue one best-effort multi-delete for `batch` and classify outcomes.
    ///
    /// Every individually-succeeded record increments the deleted counter by
    /// exactly one; faulted records go to the error sink and never fail the
    /// batch. The call errors only when the submission itself could not be
    /// made, in which case none of the batch's records are counted.
    pub async fn execute(
        &self,
        connection: &PooledConnection,
        batch: &[RecordId],
    ) -> Result<BatchOutcome> {
        let outcomes = {
            let mut connection = connection.lock().await;
            connection
                .delete_many(&self.collection, batch)
                .await
                .map_err(|e| PurgeError::Batch(e.to_string()))?
        };

        let mut tally = BatchOutcome::default();
        for outcome in &outcomes {
            match &outcome.fault {
                Some(message) => {
                    self.sink.record(
                        ErrorCategory::RecordFault,
                        &format!("record {}: {}", outcome.id, message),
                    );
                    tally.faulted += 1;
                }
                None => {
                    self.state.record_deleted();
                    tally.deleted += 1;
                }
            }
        }

        debug!(deleted = tally.deleted, faulted = tally.faulted, "batch processed");
        Ok(tally)
    }
}
