//! Operator HTTP API for the BAP indexer.
//!
//! Provides endpoints for:
//! - Indexer status and Prometheus metrics
//! - Manual resync from a block height
//! - Identity, attestation and profile lookups by natural key
//!
//! Responses share the `{status, message?, result?}` envelope of
//! [`ApiResponse`].

pub mod error;
pub mod handlers;
pub mod pagination;
pub mod server;
pub mod state;

pub use error::RpcError;
pub use handlers::ApiResponse;
pub use server::{router, RpcServer};
pub use state::{IndexerControl, IndexerStatus, RpcState};
