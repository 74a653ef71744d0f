//! bulkpurge - bulk-delete every record in a Dataverse collection.

use anyhow::Context;
use bulkpurge::config::PurgeConfig;
use bulkpurge::engine::RunOrchestrator;
use bulkpurge::sink::FileErrorSink;
use bulkpurge::store::{DataverseConfig, DataverseStore};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "bulkpurge",
    version,
    about = "Bulk-delete every record in a Dataverse collection across multiple credentials"
)]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "bulkpurge.yaml", env = "BULKPURGE_CONFIG")]
    config: PathBuf,

    /// Override the configured target collection
    #[arg(long)]
    collection: Option<String>,

    /// Override the configured batch size
    #[arg(long)]
    batch_size: Option<usize>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Display (not Debug) keeps the error chain readable
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = PurgeConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    if let Some(collection) = cli.collection {
        config.collection = collection;
    }
    if let Some(batch_size) = cli.batch_size {
        config.batch_size = batch_size;
    }
    config.validate().context("after CLI overrides")?;

    let store = Arc::new(
        DataverseStore::new(DataverseConfig {
            endpoint: config.endpoint.clone(),
            tenant_id: config.tenant_id.clone(),
            timeout: config.request_timeout(),
            authority: None,
            entity_set: config.entity_set.clone(),
            id_attribute: config.id_attribute.clone(),
        })
        .context("building store client")?,
    );
    let sink = Arc::new(
        FileErrorSink::create(&config.error_log)
            .with_context(|| format!("opening error log {}", config.error_log))?,
    );

    // Ctrl-C stops dispatching new batches; in-flight batches run to
    // completion before the process exits.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing in-flight batches");
            let _ = shutdown_tx.send(true);
        }
    });

    info!(
        collection = %config.collection,
        credentials = config.credentials.len(),
        batch_size = config.batch_size,
        concurrency = config.concurrency,
        attempts = config.retries,
        "starting purge"
    );

    let orchestrator = RunOrchestrator::new(store, sink, config, shutdown_rx);
    let summary = orchestrator.run().await?;

    for report in &summary.attempts {
        info!(
            attempt = report.attempt,
            listed = report.listed,
            deleted = report.deleted,
            batches_completed = report.batches_completed,
            batches_failed = report.batches_failed,
            list_failed = report.list_failed,
            "attempt summary"
        );
    }
    // Record faults and failed batches are operator-visible but not fatal;
    // a run that never got a record list has accomplished nothing.
    if !summary.attempts.is_empty() && summary.attempts.iter().all(|a| a.list_failed) {
        anyhow::bail!("every attempt failed to list the collection; see the error log");
    }

    info!(
        total_deleted = summary.total_deleted(),
        failed_batches = summary.total_failed_batches(),
        "run complete"
    );

    Ok(())
}
