//! BAP indexer node.
//!
//! The node is the central coordinator that:
//! - Subscribes to the transaction feed from the checkpoint onward
//! - Extracts and validates BAP/AIP operation pairs
//! - Applies them to the identity/attestation/profile store
//! - Stages and bulk-ingests blocks when configured to
//! - Checkpoints every completed block and recovers after a crash

pub mod checkpoint;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod metrics;
pub mod node;
pub mod retry;
pub mod shutdown;
pub mod staging;

pub use checkpoint::Checkpoint;
pub use config::{IndexerConfig, IngestMode, BAP_START_HEIGHT};
pub use dispatcher::{Dispatcher, DispatcherHandle, DispatcherState, DispatcherStatus};
pub use error::NodeError;
pub use ingest::{read_records, IngestError, IngestStats, IngestWorker};
pub use logging::{init_logging, LogFormat};
pub use metrics::IndexerMetrics;
pub use node::IndexerNode;
pub use retry::RetryTracker;
pub use shutdown::ShutdownController;
pub use staging::{StagingDir, StagingOverlay};
