//! On-chain protocol prefixes. Each is itself a Bitcoin address.

pub const BAP_PREFIX: &str = "1BAPSuaPnfGnSBM3GLV9yhxUdYe4vGbdMT";
pub const AIP_PREFIX: &str = "15PciHG22SNLQJXMoSUaWVi7WSqc7hCfva";

/// The only AIP algorithm the indexer verifies.
pub const BITCOIN_ECDSA: &str = "BITCOIN_ECDSA";

/// Marker that opens every AIP signed message, standing in for `OP_RETURN`.
pub const OP_RETURN_MARKER: &[u8] = b"j";
