use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{load_config, ConfigError};
use crate::ingest::{BatchSummarizer, IngestionService};
use crate::rollup::AggregationService;
use crate::storage::{AggregateResultStore, FileStore, FileStoreError, LocalFileStore, LogBatchStore};
use crate::stream::{PartialInsightConsumer, PartialInsightProducer, PartitionedQueue};
use crate::web::{run_server, AppState};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("storage error: {0}")]
    Storage(#[from] FileStoreError),

    #[error("metrics error: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("web server error: {0}")]
    WebServer(String),
}

pub async fn run(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = match config_path {
        Some(path) => path,
        None => {
            eprintln!("Error: config not found");
            eprintln!("Searched locations:");
            eprintln!("  ~/.config/logmill/config.yml");
            eprintln!("  /etc/logmill/config.yml");
            eprintln!("\nUse --config <path> to specify a config file, or run 'logmill config init' to generate one.");
            std::process::exit(1);
        }
    };

    run_pipeline(&config_path).await.map_err(|e| e.into())
}

async fn run_pipeline(config_path: &Path) -> Result<(), RunError> {
    let config = load_config(config_path)?;

    // The configured level seeds the filter; RUST_LOG overrides it.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("logmill={}", config.log.level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        config_path = %config_path.display(),
        port = config.server.port,
        window_size = %config.aggregation.window_size,
        root_dir = %config.file_storage.root_dir.display(),
        "Starting logmill"
    );

    let metrics_handle = crate::metrics::install_prometheus()?;

    let file_store: Arc<dyn FileStore> =
        Arc::new(LocalFileStore::new(&config.file_storage.root_dir)?);

    // Stream plumbing: the producer publishes into the queue, the consumer
    // owns the lane receivers.
    let (queue, receivers) = PartitionedQueue::with_defaults();
    let queue = Arc::new(queue);

    let aggregate_store = Arc::new(AggregateResultStore::new(Arc::clone(&file_store)));
    let aggregation_service = Arc::new(AggregationService::new(aggregate_store));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut consumer = PartialInsightConsumer::new(aggregation_service);
    consumer.start(receivers, shutdown_rx.clone());
    info!(
        partitions = queue.partition_count(),
        "Partial insight consumer started"
    );

    let ingestion = Arc::new(IngestionService::new(
        BatchSummarizer::new(config.aggregation.window_size),
        LogBatchStore::new(Arc::clone(&file_store)),
        PartialInsightProducer::new(Arc::clone(&queue)),
    ));

    let state = AppState {
        ingestion,
        metrics: metrics_handle,
    };
    let server_config = config.server.clone();
    let server_shutdown_rx = shutdown_rx.clone();
    let mut web_handle = tokio::spawn(async move {
        run_server(state, server_config, server_shutdown_rx)
            .await
            .map_err(|e| RunError::WebServer(e.to_string()))
    });

    info!("Pipeline started, press Ctrl+C to shutdown");

    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
        result = &mut web_handle => {
            match result {
                Ok(Ok(())) => info!("Web server exited"),
                Ok(Err(e)) => error!(error = %e, "Web server error, shutting down"),
                Err(e) => error!(error = %e, "Web server join error, shutting down"),
            }
            let _ = shutdown_tx.send(true);
        }
    }

    // Drain the HTTP server first so no new batches are admitted, then
    // close the queue and wait for the workers to finish.
    if !web_handle.is_finished() {
        match tokio::time::timeout(std::time::Duration::from_secs(5), &mut web_handle).await {
            Ok(Ok(Ok(()))) => info!("Web server stopped gracefully"),
            Ok(Ok(Err(e))) => error!(error = %e, "Web server error during shutdown"),
            Ok(Err(e)) => error!(error = %e, "Web server join error during shutdown"),
            Err(_) => warn!("Web server shutdown timed out after 5 seconds"),
        }
    }

    queue.close();
    match tokio::time::timeout(std::time::Duration::from_secs(10), consumer.stop()).await {
        Ok(()) => info!("Consumer workers stopped"),
        Err(_) => warn!("Consumer worker shutdown timed out after 10 seconds"),
    }

    info!("Pipeline shutdown complete");

    Ok(())
}
