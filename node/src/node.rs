//! Indexer wiring: storage, feed, validator, dispatcher and the RPC server.

use std::sync::Arc;

use bap_network::{SubscriptionFeed, WebSocketFeed};
use bap_protocol::{BitcoinSignedMessageValidator, EnvelopeValidator};
use bap_rpc::{IndexerControl, IndexerStatus, RpcServer, RpcState};
use bap_store::IndexStore;
use bap_store_lmdb::{check_data_dir, check_integrity, LmdbEnvironment};
use bap_types::BlockHeight;
use tracing::{error, info, warn};

use crate::checkpoint::Checkpoint;
use crate::dispatcher::{Dispatcher, DispatcherHandle};
use crate::ingest::IngestWorker;
use crate::staging::StagingDir;
use crate::{IndexerConfig, IndexerMetrics, NodeError, ShutdownController};

pub struct IndexerNode {
    config: IndexerConfig,
    store: Arc<dyn IndexStore>,
    feed: Arc<dyn SubscriptionFeed>,
    validator: Arc<dyn EnvelopeValidator>,
    metrics: Arc<IndexerMetrics>,
    shutdown: ShutdownController,
}

impl IndexerNode {
    /// Open the LMDB store under `data_dir` and connect to the configured
    /// WebSocket feed.
    pub fn open(config: IndexerConfig) -> Result<Self, NodeError> {
        config.validate()?;
        let path = config.lmdb_path();
        check_data_dir(&path).map_err(NodeError::Config)?;
        let env = LmdbEnvironment::open(&path, config.lmdb_map_size)?;
        let report = check_integrity(&env)?;
        if report.is_healthy() {
            info!(
                path = %path.display(),
                entries = report.total_entries,
                "LMDB store opened"
            );
        } else {
            warn!(errors = ?report.errors, "LMDB integrity check found problems");
        }
        let feed = WebSocketFeed::new(config.feed_endpoint.clone(), config.subscription_id.clone());
        Self::with_parts(
            config,
            Arc::new(env),
            Arc::new(feed),
            Arc::new(BitcoinSignedMessageValidator),
        )
    }

    /// Build a node from explicit collaborators.
    pub fn with_parts(
        config: IndexerConfig,
        store: Arc<dyn IndexStore>,
        feed: Arc<dyn SubscriptionFeed>,
        validator: Arc<dyn EnvelopeValidator>,
    ) -> Result<Self, NodeError> {
        let metrics = IndexerMetrics::new().map_err(|e| NodeError::Other(e.to_string()))?;
        Ok(Self {
            config,
            store,
            feed,
            validator,
            metrics: Arc::new(metrics),
            shutdown: ShutdownController::new(),
        })
    }

    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn IndexStore> {
        &self.store
    }

    pub fn metrics(&self) -> &Arc<IndexerMetrics> {
        &self.metrics
    }

    pub fn shutdown_handle(&self) -> ShutdownController {
        self.shutdown.clone()
    }

    pub fn dispatcher(&self) -> (Dispatcher, DispatcherHandle) {
        Dispatcher::new(
            &self.config,
            Arc::clone(&self.store),
            Arc::clone(&self.feed),
            Arc::clone(&self.validator),
            Arc::clone(&self.metrics),
        )
    }

    /// Ingest staging files a previous run left above the checkpoint, in
    /// height order, checkpointing after each. Returns the number replayed.
    pub async fn recover(&self) -> Result<usize, NodeError> {
        let checkpoint = Checkpoint::new(Arc::clone(&self.store), self.config.from_block);
        let staging = StagingDir::new(self.config.staging_path());
        let worker = IngestWorker::new(Arc::clone(&self.store), self.config.max_concurrent_inserts);

        let pending = staging.pending_above(checkpoint.stored()?)?;
        for (height, path) in &pending {
            let stats = worker.ingest_file(path).await?;
            checkpoint.save(*height)?;
            self.metrics.records_ingested.inc_by(stats.records as u64);
            self.metrics.checkpoint_height.set(i64::from(*height));
            info!(height, records = stats.records, "recovered staged block");
            if self.config.delete_after_ingest {
                if let Err(e) = staging.remove(*height) {
                    warn!(height, error = %e, "could not delete staging file");
                }
            }
        }
        Ok(pending.len())
    }

    /// Recover, then index until shutdown or a fatal error. The RPC server
    /// runs alongside when enabled.
    pub async fn run(&self) -> Result<(), NodeError> {
        let shutdown_rx = self.shutdown.subscribe();
        let recovered = self.recover().await?;
        if recovered > 0 {
            info!(blocks = recovered, "startup recovery complete");
        }

        let (dispatcher, handle) = self.dispatcher();
        let mut tasks = Vec::new();

        if self.config.enable_rpc {
            let control = Arc::new(NodeControl {
                handle,
                metrics: Arc::clone(&self.metrics),
            });
            let rpc_server = RpcServer::new(
                self.config.rpc_port,
                RpcState::new(Arc::clone(&self.store), control),
            );
            let mut shutdown_rx_rpc = self.shutdown.subscribe();

            tasks.push(tokio::spawn(async move {
                tokio::select! {
                    biased;
                    _ = shutdown_rx_rpc.recv() => {
                        info!("RPC server shutting down");
                    }
                    result = rpc_server.start() => {
                        match result {
                            Ok(()) => info!("RPC server exited"),
                            Err(e) => error!("RPC server error: {e}"),
                        }
                    }
                }
            }));
        }

        info!(
            from_block = self.config.from_block,
            mode = ?self.config.ingest_mode,
            "indexer started"
        );
        let result = dispatcher.run(shutdown_rx).await;
        if let Err(e) = &result {
            error!(error = %e, "dispatcher failed");
        }

        self.shutdown.shutdown();
        for task in tasks {
            let _ = task.await;
        }
        result
    }
}

/// Exposes a running dispatcher to the RPC server.
struct NodeControl {
    handle: DispatcherHandle,
    metrics: Arc<IndexerMetrics>,
}

impl IndexerControl for NodeControl {
    fn status(&self) -> IndexerStatus {
        let status = self.handle.status();
        IndexerStatus {
            state: status.state.as_str().to_string(),
            subscribed_from: status.subscribed_from,
            block_transactions: status.block_transactions,
            checkpoint: status.checkpoint,
        }
    }

    fn request_resync(&self, height: BlockHeight) -> Result<(), String> {
        self.handle
            .request_resync(height)
            .map_err(|e| e.to_string())
    }

    fn metrics_text(&self) -> String {
        self.metrics.encode()
    }
}
