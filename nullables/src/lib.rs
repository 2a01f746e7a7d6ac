//! Nullable infrastructure for deterministic testing.
//!
//! Inspired by the "A-frame architecture" pattern from RsNano.
//! External dependencies (storage, the transaction feed, signature checks)
//! sit behind traits. This crate provides test-friendly implementations that:
//! - Return deterministic values
//! - Can be controlled programmatically
//! - Never touch the filesystem or network
//!
//! [`fixtures`] builds real, correctly signed BAP transactions.

pub mod feed;
pub mod fixtures;
pub mod store;
pub mod validator;

pub use feed::NullFeed;
pub use fixtures::TestKey;
pub use store::{NullStore, StoreSnapshot};
pub use validator::NullValidator;
