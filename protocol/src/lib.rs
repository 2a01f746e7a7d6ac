//! Bitcoin Attestation Protocol decoding.
//!
//! - [`bap`] decodes BAP tapes into operations
//! - [`aip`] decodes AIP signature envelopes and rebuilds the signed message
//! - [`extract`] pairs each operation with the envelope that follows it
//! - [`validator`] checks envelope signatures

pub mod aip;
pub mod bap;
pub mod error;
pub mod extract;
pub mod prefix;
pub mod validator;

pub use aip::{decode_aip, signed_message};
pub use bap::decode_bap;
pub use error::ProtocolError;
pub use extract::{extract, scan, Extraction, Skipped};
pub use prefix::{AIP_PREFIX, BAP_PREFIX, BITCOIN_ECDSA};
pub use validator::{BitcoinSignedMessageValidator, EnvelopeValidator};
