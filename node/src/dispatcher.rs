//! Event dispatcher.
//!
//! The single consumer of feed events. Each subscription gets a fresh
//! bounded queue; the dispatcher drains it in delivery order, runs
//! extraction, validation and application for every transaction, and turns
//! `block-done` into a flush plus checkpoint. A resync command or a failed
//! block ends the current subscription and opens a new one at the chosen
//! height.

use std::sync::Arc;
use std::time::Instant;

use bap_ledger::StateApplier;
use bap_network::{FeedEvent, FeedTransaction, StatusKind, SubscriptionFeed};
use bap_protocol::{scan, EnvelopeValidator};
use bap_store::{FailedBlock, IndexStore, StagedRecord};
use bap_transactions::Transaction;
use bap_types::{BlockContext, BlockHeight, OperationPair, Timestamp};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, trace, warn};

use crate::checkpoint::Checkpoint;
use crate::config::{IndexerConfig, IngestMode};
use crate::ingest::{IngestError, IngestStats, IngestWorker};
use crate::retry::RetryTracker;
use crate::staging::{StagingDir, StagingOverlay};
use crate::{IndexerMetrics, NodeError};

const COMMAND_QUEUE: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatcherState {
    /// Subscribed, no `connected` status seen yet.
    Disconnected,
    Connected,
    /// Receiving transactions.
    Streaming,
    /// Restarting the subscription after a resync or a failed block.
    Recovering,
}

impl DispatcherState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connected => "connected",
            Self::Streaming => "streaming",
            Self::Recovering => "recovering",
        }
    }
}

/// Snapshot published after every event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DispatcherStatus {
    pub state: DispatcherState,
    pub subscribed_from: BlockHeight,
    /// Transactions seen for the block in progress.
    pub block_transactions: u64,
    pub checkpoint: Option<BlockHeight>,
}

#[derive(Debug)]
enum Command {
    Resync { height: BlockHeight },
}

/// Control and observation side of a running dispatcher.
#[derive(Clone)]
pub struct DispatcherHandle {
    commands: mpsc::Sender<Command>,
    status: watch::Receiver<DispatcherStatus>,
}

impl DispatcherHandle {
    /// Cancel the current subscription and restart it at `height`.
    pub fn request_resync(&self, height: BlockHeight) -> Result<(), NodeError> {
        self.commands
            .try_send(Command::Resync { height })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => {
                    NodeError::Other("a resync is already pending".into())
                }
                mpsc::error::TrySendError::Closed(_) => {
                    NodeError::Other("dispatcher is not running".into())
                }
            })
    }

    pub fn status(&self) -> DispatcherStatus {
        self.status.borrow().clone()
    }

    /// Wait until the published status satisfies `f`.
    pub async fn wait_for(&mut self, f: impl FnMut(&DispatcherStatus) -> bool) -> DispatcherStatus {
        let waited = self.status.wait_for(f).await.map(|s| s.clone());
        match waited {
            Ok(status) => status,
            Err(_) => self.status(),
        }
    }
}

/// How a subscription session ended.
#[derive(Debug, PartialEq, Eq)]
enum Next {
    Resubscribe(BlockHeight),
    Stop,
}

pub struct Dispatcher {
    store: Arc<dyn IndexStore>,
    feed: Arc<dyn SubscriptionFeed>,
    validator: Arc<dyn EnvelopeValidator>,
    metrics: Arc<IndexerMetrics>,
    applier: StateApplier,
    checkpoint: Checkpoint,
    worker: IngestWorker,
    staging: StagingDir,
    retries: RetryTracker,

    ingest_mode: IngestMode,
    index_mempool: bool,
    delete_after_ingest: bool,
    block_sync_retries: u32,
    queue_capacity: usize,

    commands: mpsc::Receiver<Command>,
    status: watch::Sender<DispatcherStatus>,

    block_transactions: u64,
    current_block: Option<BlockHeight>,
    overlay: Option<StagingOverlay<dyn IndexStore>>,
}

impl Dispatcher {
    pub fn new(
        config: &IndexerConfig,
        store: Arc<dyn IndexStore>,
        feed: Arc<dyn SubscriptionFeed>,
        validator: Arc<dyn EnvelopeValidator>,
        metrics: Arc<IndexerMetrics>,
    ) -> (Self, DispatcherHandle) {
        let (command_tx, commands) = mpsc::channel(COMMAND_QUEUE);
        let (status, status_rx) = watch::channel(DispatcherStatus {
            state: DispatcherState::Disconnected,
            subscribed_from: config.from_block,
            block_transactions: 0,
            checkpoint: None,
        });

        let dispatcher = Self {
            checkpoint: Checkpoint::new(Arc::clone(&store), config.from_block),
            worker: IngestWorker::new(Arc::clone(&store), config.max_concurrent_inserts),
            staging: StagingDir::new(config.staging_path()),
            applier: StateApplier::new(config.applier_config()),
            retries: RetryTracker::new(),
            store,
            feed,
            validator,
            metrics,
            ingest_mode: config.ingest_mode,
            index_mempool: config.index_mempool,
            delete_after_ingest: config.delete_after_ingest,
            block_sync_retries: config.block_sync_retries,
            queue_capacity: config.event_queue_capacity.max(1),
            commands,
            status,
            block_transactions: 0,
            current_block: None,
            overlay: None,
        };
        let handle = DispatcherHandle {
            commands: command_tx,
            status: status_rx,
        };
        (dispatcher, handle)
    }

    /// Consume the feed until shutdown, the feed ends, or a fatal error.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> Result<(), NodeError> {
        let stored = self.checkpoint.stored()?;
        if let Some(height) = stored {
            self.metrics.checkpoint_height.set(i64::from(height));
        }
        self.status.send_modify(|s| s.checkpoint = stored);

        let mut from = self.checkpoint.resume_height()?;
        loop {
            let (sink, mut events) = mpsc::channel(self.queue_capacity);
            let subscription = self.feed.subscribe(from, sink)?;
            self.begin_session(from);
            info!(from, "subscribed to feed");

            let next = self.stream(&mut events, &mut shutdown).await;
            // A feed task blocked on a full queue sees the send fail.
            drop(events);
            subscription.unsubscribe().await;

            match next? {
                Next::Resubscribe(height) => from = height,
                Next::Stop => {
                    info!("dispatcher stopped");
                    return Ok(());
                }
            }
        }
    }

    fn begin_session(&mut self, from: BlockHeight) {
        self.reset_block();
        self.metrics.queue_depth.set(0);
        self.status.send_modify(|s| {
            s.state = DispatcherState::Disconnected;
            s.subscribed_from = from;
            s.block_transactions = 0;
        });
    }

    fn reset_block(&mut self) {
        self.block_transactions = 0;
        self.current_block = None;
        self.overlay = None;
    }

    fn set_state(&self, state: DispatcherState) {
        let block_transactions = self.block_transactions;
        self.status.send_if_modified(|s| {
            let changed = s.state != state || s.block_transactions != block_transactions;
            s.state = state;
            s.block_transactions = block_transactions;
            changed
        });
    }

    async fn stream(
        &mut self,
        events: &mut mpsc::Receiver<FeedEvent>,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Result<Next, NodeError> {
        loop {
            let event = tokio::select! {
                biased;
                _ = shutdown.recv() => return Ok(Next::Stop),
                Some(Command::Resync { height }) = self.commands.recv() => {
                    info!(height, "resync requested");
                    self.set_state(DispatcherState::Recovering);
                    return Ok(Next::Resubscribe(height));
                }
                event = events.recv() => event,
            };
            self.metrics.queue_depth.set(events.len() as i64);

            let Some(event) = event else {
                info!("feed subscription ended");
                return Ok(Next::Stop);
            };
            if let Some(next) = self.handle_event(event).await? {
                return Ok(next);
            }
        }
    }

    async fn handle_event(&mut self, event: FeedEvent) -> Result<Option<Next>, NodeError> {
        trace!(event = event.label(), "feed event");
        match event {
            FeedEvent::Transaction(tx) => {
                self.on_transaction(tx)?;
                Ok(None)
            }
            FeedEvent::Mempool(tx) => {
                self.on_mempool(tx)?;
                Ok(None)
            }
            FeedEvent::Status { kind, height } => self.on_status(kind, height).await,
            FeedEvent::Error(message) => {
                warn!(%message, "feed reported an error");
                Ok(None)
            }
        }
    }

    fn on_transaction(&mut self, tx: FeedTransaction) -> Result<(), NodeError> {
        self.metrics.transactions.inc();
        if let Some(current) = self.current_block {
            if current != tx.height && self.block_transactions > 0 {
                warn!(current, next = tx.height, "block changed without block-done");
            }
        }
        self.current_block = Some(tx.height);
        self.block_transactions += 1;
        self.set_state(DispatcherState::Streaming);

        let ctx = tx.context();
        let Some(pairs) = self.validated_pairs(&tx) else {
            return Ok(());
        };
        for pair in &pairs {
            let outcome = match self.ingest_mode {
                IngestMode::Direct => self.applier.apply(self.store.as_ref(), pair, &ctx)?,
                IngestMode::Staged => {
                    let overlay = self
                        .overlay
                        .get_or_insert_with(|| StagingOverlay::new(Arc::clone(&self.store)));
                    self.applier.apply(&*overlay, pair, &ctx)?
                }
            };
            self.metrics
                .operations
                .with_label_values(&[outcome.label()])
                .inc();
        }
        Ok(())
    }

    fn on_mempool(&mut self, tx: FeedTransaction) -> Result<(), NodeError> {
        self.metrics.transactions.inc();
        if !self.index_mempool {
            trace!(txid = %tx.id, "mempool transaction ignored");
            return Ok(());
        }
        let ctx = BlockContext::mempool(tx.id);
        let Some(pairs) = self.validated_pairs(&tx) else {
            return Ok(());
        };
        for pair in &pairs {
            // An open staged block holds its own copy of every document it
            // touched, and its flush would overwrite a direct write.
            let outcome = match &self.overlay {
                Some(overlay) => self.applier.apply(overlay, pair, &ctx)?,
                None => self.applier.apply(self.store.as_ref(), pair, &ctx)?,
            };
            self.metrics
                .operations
                .with_label_values(&[outcome.label()])
                .inc();
        }
        Ok(())
    }

    /// Decode, extract and validate. `None` when the transaction does not
    /// decode.
    fn validated_pairs(&self, tx: &FeedTransaction) -> Option<Vec<OperationPair>> {
        let decoded = match Transaction::decode(&tx.raw) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!(txid = %tx.id, error = %e, "skipping undecodable transaction");
                return None;
            }
        };
        let extraction = scan(&decoded);
        if !extraction.skipped.is_empty() {
            debug!(txid = %tx.id, skipped = ?extraction.skipped, "undecodable tapes");
        }
        self.metrics
            .pairs_extracted
            .inc_by(extraction.pairs.len() as u64);

        let pairs = extraction
            .pairs
            .into_iter()
            .filter(|pair| match self.validator.validate(&pair.envelope) {
                Ok(true) => true,
                Ok(false) => {
                    debug!(txid = %tx.id, signer = %pair.signer(), "signature does not verify");
                    self.metrics.pairs_rejected.inc();
                    false
                }
                Err(e) => {
                    debug!(txid = %tx.id, error = %e, "envelope not checkable");
                    self.metrics.pairs_rejected.inc();
                    false
                }
            })
            .collect();
        Some(pairs)
    }

    async fn on_status(
        &mut self,
        kind: StatusKind,
        height: BlockHeight,
    ) -> Result<Option<Next>, NodeError> {
        match kind {
            StatusKind::Connected => {
                info!(height, "feed connected");
                self.reset_block();
                self.set_state(DispatcherState::Connected);
                Ok(None)
            }
            StatusKind::Disconnected => {
                let interrupted = self.current_block.filter(|_| self.block_transactions > 0);
                self.reset_block();
                self.set_state(DispatcherState::Disconnected);
                match interrupted {
                    Some(block) => {
                        warn!(block, "feed disconnected mid-block");
                        self.block_failed(block, "disconnected mid-block".into())
                    }
                    None => {
                        info!(height, "feed disconnected");
                        Ok(None)
                    }
                }
            }
            StatusKind::BlockDone => {
                let count = self.block_transactions;
                debug!(height, transactions = count, "block done");
                let next = if count > 0 {
                    self.complete_block(height).await?
                } else {
                    None
                };
                self.reset_block();
                self.set_state(DispatcherState::Streaming);
                Ok(next)
            }
            StatusKind::Waiting => {
                debug!(height, "caught up with the chain tip");
                Ok(None)
            }
            StatusKind::Reorg => {
                warn!(height, "feed reported a reorg");
                Ok(None)
            }
            StatusKind::Unknown => {
                debug!(height, "unknown feed status");
                Ok(None)
            }
        }
    }

    /// Flush the block (staged mode), then checkpoint it. Retryable flush
    /// failures count against the block's budget.
    async fn complete_block(&mut self, height: BlockHeight) -> Result<Option<Next>, NodeError> {
        let started = Instant::now();

        if self.ingest_mode == IngestMode::Staged {
            let records = self
                .overlay
                .take()
                .map(StagingOverlay::into_records)
                .unwrap_or_default();
            match stage_and_ingest(&self.staging, &self.worker, height, records).await {
                Ok(stats) => self.metrics.records_ingested.inc_by(stats.records as u64),
                Err(e) if e.is_retryable() => return self.block_failed(height, e.to_string()),
                Err(e) => return Err(e.into()),
            }
        }

        self.checkpoint.save(height)?;
        self.retries.clear(height);
        self.metrics.checkpoint_height.set(i64::from(height));
        self.metrics.blocks_completed.inc();
        self.metrics
            .block_flush_time_ms
            .observe(started.elapsed().as_secs_f64() * 1000.0);
        self.status.send_modify(|s| s.checkpoint = Some(height));
        info!(height, transactions = self.block_transactions, "block checkpointed");

        if self.ingest_mode == IngestMode::Staged && self.delete_after_ingest {
            if let Err(e) = self.staging.remove(height) {
                warn!(height, error = %e, "could not delete staging file");
            }
        }
        Ok(None)
    }

    /// Count a failure for `height`. Within budget the block is requested
    /// again; past it the block is recorded as failed and skipped.
    fn block_failed(
        &mut self,
        height: BlockHeight,
        reason: String,
    ) -> Result<Option<Next>, NodeError> {
        self.set_state(DispatcherState::Recovering);
        let attempts = self.retries.record_failure(height);
        if attempts <= self.block_sync_retries {
            warn!(height, attempts, %reason, "block failed, retrying");
            return Ok(Some(Next::Resubscribe(height)));
        }

        warn!(height, attempts, %reason, "retry budget exhausted, skipping block");
        self.store.record_failed_block(&FailedBlock {
            height,
            attempts,
            reason,
            recorded_at: Timestamp::now(),
        })?;
        self.metrics.blocks_failed.inc();
        self.retries.clear(height);
        Ok(Some(Next::Resubscribe(height.saturating_add(1))))
    }
}

/// Write the block's staging file and replay it through the worker.
async fn stage_and_ingest(
    staging: &StagingDir,
    worker: &IngestWorker,
    height: BlockHeight,
    records: Vec<StagedRecord>,
) -> Result<IngestStats, IngestError> {
    let staging = staging.clone();
    let path = tokio::task::spawn_blocking(move || staging.write(height, &records))
        .await
        .map_err(|e| IngestError::Task(e.to_string()))??;
    worker.ingest_file(&path).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use bap_nullables::fixtures::{id_tape, mined, transaction};
    use bap_nullables::{NullFeed, NullStore, NullValidator, TestKey};
    use bap_store::{FailedBlockStore, ProgressStore};

    fn config() -> IndexerConfig {
        IndexerConfig {
            subscription_id: "test".into(),
            from_block: 100,
            block_sync_retries: 1,
            ..Default::default()
        }
    }

    fn dispatcher(store: &Arc<NullStore>, feed: &NullFeed) -> (Dispatcher, DispatcherHandle) {
        Dispatcher::new(
            &config(),
            store.clone(),
            Arc::new(feed.clone()),
            Arc::new(NullValidator::accept_all()),
            Arc::new(IndexerMetrics::new().unwrap()),
        )
    }

    fn block_tx(height: BlockHeight, nonce: u32) -> FeedEvent {
        let key = TestKey::new(1);
        let tx = transaction(vec![key.sign(id_tape("alice", key.address()))], nonce);
        FeedEvent::Transaction(mined(&tx, height))
    }

    #[tokio::test]
    async fn empty_blocks_do_not_checkpoint() {
        let store = Arc::new(NullStore::new());
        let feed = NullFeed::new();
        feed.push_session(vec![
            FeedEvent::status(StatusKind::Connected, 100),
            FeedEvent::status(StatusKind::BlockDone, 100),
        ]);
        let (dispatcher, _handle) = dispatcher(&store, &feed);
        let (_stop, shutdown) = broadcast::channel(1);
        dispatcher.run(shutdown).await.unwrap();
        assert_eq!(store.load_progress().unwrap(), None);
    }

    #[tokio::test]
    async fn disconnect_mid_block_retries_then_skips() {
        let store = Arc::new(NullStore::new());
        let feed = NullFeed::new();
        for _ in 0..2 {
            feed.push_session(vec![
                block_tx(100, 0),
                FeedEvent::status(StatusKind::Disconnected, 100),
            ]);
        }
        feed.push_session(vec![]);
        let (dispatcher, _handle) = dispatcher(&store, &feed);
        let (_stop, shutdown) = broadcast::channel(1);
        dispatcher.run(shutdown).await.unwrap();

        assert_eq!(feed.subscriptions(), vec![100, 100, 101]);
        let failed = store.failed_blocks().unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].height, 100);
        assert_eq!(failed[0].attempts, 2);
        assert_eq!(store.load_progress().unwrap(), None);
    }

    #[tokio::test]
    async fn shutdown_stops_an_idle_dispatcher() {
        let store = Arc::new(NullStore::new());
        let feed = NullFeed::new();
        let (dispatcher, handle) = dispatcher(&store, &feed);
        let (tx, rx) = broadcast::channel(1);
        let task = tokio::spawn(dispatcher.run(rx));
        tx.send(()).unwrap();
        task.await.unwrap().unwrap();
        assert!(handle.request_resync(5).is_err());
    }

    #[test]
    fn state_labels() {
        assert_eq!(DispatcherState::Recovering.as_str(), "recovering");
        assert_eq!(
            serde_json::to_value(DispatcherState::Streaming).unwrap(),
            "streaming"
        );
    }
}
