//! LMDB storage backend for the BAP indexer.
//!
//! Implements all storage traits from `bap-store` using the `heed` LMDB
//! bindings. Each logical store maps to one or more LMDB databases within a
//! single environment.

pub mod attestation;
pub mod environment;
pub mod error;
pub mod identity;
pub mod integrity;
mod keys;
pub mod meta;
pub mod migration;
pub mod profile;

pub use environment::{LmdbEnvironment, DEFAULT_MAP_SIZE};
pub use error::LmdbError;
pub use integrity::{check_data_dir, check_integrity, IntegrityReport};
