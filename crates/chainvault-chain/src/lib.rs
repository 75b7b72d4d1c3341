//! chainvault-chain: the per-owner append-only record log
//!
//! ```text
//! seq 0 (genesis) ◀── seq 1 ◀── seq 2 ◀── ... ◀── latest
//!                      ▲
//!                      └── branch "share/<file>/<bob>": 1 ◀── 2
//! ```
//!
//! Each record carries the digest of its predecessor and its own digest over
//! a canonical JSON form. The latest record feeds per-file key derivation.

pub mod chain;
pub mod document;
pub mod record;

pub use chain::{Branch, ChainViolation, HashChain, SkippedRecord, ViolationKind};
pub use record::{derive_file_key, now_secs, ChainRecord, RecordPayload};

/// `previous_digest` of the genesis record
pub const GENESIS_PREVIOUS_DIGEST: &str = "0";

/// `file_reference` of the genesis record
pub const GENESIS_FILE_REFERENCE: &str = "genesis";
