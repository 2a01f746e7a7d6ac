//! The BAP state machine.
//!
//! [`StateApplier`] takes validated (operation, envelope) pairs with their
//! block context and turns them into identity, attestation and profile
//! documents. It is generic over [`bap_store::DocumentStore`] so the same
//! rules run against the persistent store, the per-block staging overlay and
//! the in-memory test store.

pub mod applier;
pub mod config;
pub mod error;
pub mod outcome;

pub use applier::StateApplier;
pub use config::{ApplierConfig, OrphanPolicy};
pub use error::LedgerError;
pub use outcome::ApplyOutcome;
