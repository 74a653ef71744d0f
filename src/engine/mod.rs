//! The concurrent bounded-batch execution engine.
//!
//! One run flows in a single direction: list every record id, split the set
//! into one shard per credential, slice shards into batches, execute each
//! batch behind the concurrency gate against the credential's pooled
//! connection, and aggregate progress. The orchestrator wraps that pipeline
//! and repeats it for the configured number of attempts.

pub mod executor;
pub mod gate;
pub mod lister;
pub mod orchestrator;
pub mod partition;
pub mod pool;
pub mod progress;

pub use executor::{BatchExecutor, BatchOutcome};
pub use gate::ConcurrencyGate;
pub use orchestrator::{AttemptReport, RunOrchestrator, RunSummary};
pub use pool::ConnectionPool;
pub use progress::{ProgressSnapshot, RunState};
