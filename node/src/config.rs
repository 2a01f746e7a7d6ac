//! Indexer configuration with TOML file support.

use std::path::{Path, PathBuf};

use bap_ledger::{ApplierConfig, OrphanPolicy};
use bap_types::BlockHeight;
use serde::{Deserialize, Serialize};

use crate::{LogFormat, NodeError};

/// First block carrying BAP transactions.
pub const BAP_START_HEIGHT: BlockHeight = 574_287;

/// How applied documents reach the persistent store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestMode {
    /// Apply every operation straight to the store.
    #[default]
    Direct,
    /// Apply into a per-block overlay, write it to a staging file at
    /// block-done and replay the file through the ingest worker.
    Staged,
}

/// Configuration for the indexer.
///
/// Can be loaded from a TOML file via [`IndexerConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// Root directory for the LMDB environment and staging files.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// WebSocket base URL of the subscription feed.
    #[serde(default = "default_feed_endpoint")]
    pub feed_endpoint: String,

    /// Feed-side subscription filtering BAP transactions.
    #[serde(default)]
    pub subscription_id: String,

    /// Lowest height ever requested; the stored checkpoint wins when higher.
    #[serde(default = "default_from_block")]
    pub from_block: BlockHeight,

    /// Consecutive failures allowed per block before it is skipped.
    #[serde(default = "default_block_sync_retries")]
    pub block_sync_retries: u32,

    /// Remove a block's staging file once it has been ingested.
    #[serde(default = "default_true")]
    pub delete_after_ingest: bool,

    #[serde(default)]
    pub ingest_mode: IngestMode,

    /// Where staged blocks are written. Defaults to `<data_dir>/staging`.
    #[serde(default)]
    pub staging_dir: Option<PathBuf>,

    /// Permit pool size of the ingest worker.
    #[serde(default = "default_max_concurrent_inserts")]
    pub max_concurrent_inserts: usize,

    /// Bound of the feed → dispatcher queue.
    #[serde(default = "default_event_queue_capacity")]
    pub event_queue_capacity: usize,

    /// Apply unconfirmed transactions (height 0, time 0).
    #[serde(default)]
    pub index_mempool: bool,

    #[serde(default)]
    pub orphan_revoke: OrphanPolicy,

    #[serde(default = "default_lmdb_map_size")]
    pub lmdb_map_size: usize,

    /// Whether to serve the operator HTTP API.
    #[serde(default = "default_true")]
    pub enable_rpc: bool,

    #[serde(default = "default_rpc_port")]
    pub rpc_port: u16,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_data_dir() -> PathBuf {
    PathBuf::from("./bap_data")
}

fn default_feed_endpoint() -> String {
    "wss://junglebus.gorillapool.io".to_string()
}

fn default_from_block() -> BlockHeight {
    BAP_START_HEIGHT
}

fn default_block_sync_retries() -> u32 {
    5
}

fn default_true() -> bool {
    true
}

fn default_max_concurrent_inserts() -> usize {
    32
}

fn default_event_queue_capacity() -> usize {
    10_000
}

fn default_lmdb_map_size() -> usize {
    bap_store_lmdb::DEFAULT_MAP_SIZE
}

fn default_rpc_port() -> u16 {
    8080
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl IndexerConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<Self, NodeError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| NodeError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, NodeError> {
        toml::to_string_pretty(self).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Reject settings the indexer cannot start with.
    pub fn validate(&self) -> Result<(), NodeError> {
        if self.subscription_id.trim().is_empty() {
            return Err(NodeError::Config("subscription_id is required".into()));
        }
        if self.max_concurrent_inserts == 0 {
            return Err(NodeError::Config(
                "max_concurrent_inserts must be at least 1".into(),
            ));
        }
        if self.event_queue_capacity == 0 {
            return Err(NodeError::Config(
                "event_queue_capacity must be at least 1".into(),
            ));
        }
        self.log_format()?;
        Ok(())
    }

    pub fn log_format(&self) -> Result<LogFormat, NodeError> {
        self.log_format.parse().map_err(NodeError::Config)
    }

    pub fn lmdb_path(&self) -> PathBuf {
        self.data_dir.join("index")
    }

    pub fn staging_path(&self) -> PathBuf {
        self.staging_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("staging"))
    }

    pub fn applier_config(&self) -> ApplierConfig {
        ApplierConfig {
            orphan_revoke: self.orphan_revoke,
        }
    }
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            feed_endpoint: default_feed_endpoint(),
            subscription_id: String::new(),
            from_block: default_from_block(),
            block_sync_retries: default_block_sync_retries(),
            delete_after_ingest: default_true(),
            ingest_mode: IngestMode::default(),
            staging_dir: None,
            max_concurrent_inserts: default_max_concurrent_inserts(),
            event_queue_capacity: default_event_queue_capacity(),
            index_mempool: false,
            orphan_revoke: OrphanPolicy::default(),
            lmdb_map_size: default_lmdb_map_size(),
            enable_rpc: default_true(),
            rpc_port: default_rpc_port(),
            log_format: default_log_format(),
            log_level: default_log_level(),
        }
    }
}
