//! Prometheus metrics for the indexer.
//!
//! [`IndexerMetrics`] owns a dedicated [`Registry`] that the RPC `/metrics`
//! endpoint encodes into the Prometheus text exposition format.

use prometheus::{
    register_histogram_with_registry, register_int_counter_vec_with_registry,
    register_int_counter_with_registry, register_int_gauge_with_registry, Encoder, Histogram,
    HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

pub struct IndexerMetrics {
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Transactions received from the feed (mined and mempool).
    pub transactions: IntCounter,
    /// Operation pairs produced by extraction.
    pub pairs_extracted: IntCounter,
    /// Pairs dropped because their envelope did not validate.
    pub pairs_rejected: IntCounter,
    /// Applied pairs by outcome label.
    pub operations: IntCounterVec,
    /// Blocks flushed and checkpointed.
    pub blocks_completed: IntCounter,
    /// Blocks given up on after the retry budget.
    pub blocks_failed: IntCounter,
    /// Staged records persisted by the ingest worker.
    pub records_ingested: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    pub checkpoint_height: IntGauge,
    /// Events waiting in the feed → dispatcher queue.
    pub queue_depth: IntGauge,

    // ── Histograms ──────────────────────────────────────────────────────
    /// Time from block-done to checkpoint, in milliseconds.
    pub block_flush_time_ms: Histogram,
}

impl IndexerMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let transactions = register_int_counter_with_registry!(
            Opts::new("bap_transactions_total", "Transactions received from the feed"),
            registry
        )?;
        let pairs_extracted = register_int_counter_with_registry!(
            Opts::new(
                "bap_pairs_extracted_total",
                "Operation/envelope pairs produced by extraction"
            ),
            registry
        )?;
        let pairs_rejected = register_int_counter_with_registry!(
            Opts::new(
                "bap_pairs_rejected_total",
                "Pairs dropped by envelope validation"
            ),
            registry
        )?;
        let operations = register_int_counter_vec_with_registry!(
            Opts::new("bap_operations_total", "Applied operations by outcome"),
            &["outcome"],
            registry
        )?;
        let blocks_completed = register_int_counter_with_registry!(
            Opts::new("bap_blocks_completed_total", "Blocks flushed and checkpointed"),
            registry
        )?;
        let blocks_failed = register_int_counter_with_registry!(
            Opts::new(
                "bap_blocks_failed_total",
                "Blocks skipped after exhausting the retry budget"
            ),
            registry
        )?;
        let records_ingested = register_int_counter_with_registry!(
            Opts::new(
                "bap_records_ingested_total",
                "Staged records persisted by the ingest worker"
            ),
            registry
        )?;

        let checkpoint_height = register_int_gauge_with_registry!(
            Opts::new("bap_checkpoint_height", "Last fully ingested block height"),
            registry
        )?;
        let queue_depth = register_int_gauge_with_registry!(
            Opts::new("bap_event_queue_depth", "Feed events waiting for the dispatcher"),
            registry
        )?;

        // 0.5 ms → ~8 s.
        let block_flush_time_ms = register_histogram_with_registry!(
            HistogramOpts::new(
                "bap_block_flush_time_ms",
                "Block flush and checkpoint time in milliseconds"
            )
            .buckets(prometheus::exponential_buckets(0.5, 2.0, 15)?),
            registry
        )?;

        Ok(Self {
            registry,
            transactions,
            pairs_extracted,
            pairs_rejected,
            operations,
            blocks_completed,
            blocks_failed,
            records_ingested,
            checkpoint_height,
            queue_depth,
            block_flush_time_ms,
        })
    }

    /// Text exposition of every registered metric.
    pub fn encode(&self) -> String {
        let mut buf = Vec::new();
        if let Err(e) = TextEncoder::new().encode(&self.registry.gather(), &mut buf) {
            tracing::warn!(error = %e, "failed to encode metrics");
        }
        String::from_utf8_lossy(&buf).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_registered_metrics() {
        let metrics = IndexerMetrics::new().unwrap();
        metrics.transactions.inc();
        metrics.operations.with_label_values(&["identity_created"]).inc();
        metrics.checkpoint_height.set(574_300);

        let text = metrics.encode();
        assert!(text.contains("bap_transactions_total 1"));
        assert!(text.contains(r#"bap_operations_total{outcome="identity_created"} 1"#));
        assert!(text.contains("bap_checkpoint_height 574300"));
    }

    #[test]
    fn registries_are_independent() {
        let a = IndexerMetrics::new().unwrap();
        let b = IndexerMetrics::new().unwrap();
        a.blocks_completed.inc();
        assert_eq!(b.blocks_completed.get(), 0);
    }
}
