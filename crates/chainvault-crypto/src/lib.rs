//! chainvault-crypto: per-file key derivation, file encryption, and key escrow
//!
//! Pipeline for one upload:
//! ```text
//! file bytes ──SHA-256──┐
//!                       XOR ──▶ file key ──AES-256-GCM──▶ FileBundle (blob store)
//! latest chain record ──SHA-256──┘        │
//!                                         └─X25519 escrow──▶ KeyBundle (chain record)
//! ```
//!
//! The file key is never stored in the clear. Each recipient (the owner, and
//! anyone the file is shared with) gets its own `KeyBundle`, wrapped under a
//! key agreed between a one-shot ephemeral X25519 secret and the recipient's
//! static public key.

pub mod cipher;
pub mod derive;
pub mod escrow;
pub mod keys;

pub use cipher::{decrypt, encrypt, SealedBox};
pub use derive::{derive_key, digest, digest_hex, xor_digests};
pub use escrow::{escrow, escrow_with_payload, open_payload, unescrow, KeyBundle};
pub use keys::{public_key_from_hex, Identity, SymmetricKey};
pub use x25519_dalek::{PublicKey, StaticSecret};

/// Size of a symmetric key in bytes (AES-256)
pub const KEY_SIZE: usize = 32;

/// Size of an AES-GCM nonce (96-bit)
pub const NONCE_SIZE: usize = 12;

/// Size of a GCM authentication tag
pub const TAG_SIZE: usize = 16;

/// Size of a SHA-256 digest
pub const DIGEST_SIZE: usize = 32;
