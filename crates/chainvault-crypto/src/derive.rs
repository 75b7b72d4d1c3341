//! Dynamic per-file key derivation
//!
//! `key = SHA-256(file bytes) XOR SHA-256(reference material)`
//!
//! The reference material is the canonical form of the owner's latest chain
//! record. Because every upload appends a record, uploading identical bytes
//! twice derives two different keys without any separate nonce store.

use chainvault_core::{VaultError, VaultResult};
use sha2::{Digest, Sha256};

use crate::keys::SymmetricKey;
use crate::{DIGEST_SIZE, KEY_SIZE};

/// SHA-256 of `data`.
pub fn digest(data: &[u8]) -> [u8; DIGEST_SIZE] {
    Sha256::digest(data).into()
}

/// SHA-256 of `data` as lowercase hex (64 chars).
pub fn digest_hex(data: &[u8]) -> String {
    hex::encode(digest(data))
}

/// Byte-wise XOR of two digests. Both must be exactly `KEY_SIZE` bytes.
pub fn xor_digests(left: &[u8], right: &[u8]) -> VaultResult<[u8; KEY_SIZE]> {
    if left.len() != right.len() || left.len() != KEY_SIZE {
        return Err(VaultError::LengthMismatch {
            left: left.len(),
            right: right.len(),
        });
    }
    let mut out = [0u8; KEY_SIZE];
    for (o, (a, b)) in out.iter_mut().zip(left.iter().zip(right)) {
        *o = a ^ b;
    }
    Ok(out)
}

/// Derive the symmetric key for `file_bytes` bound to `reference_material`.
pub fn derive_key(file_bytes: &[u8], reference_material: &[u8]) -> VaultResult<SymmetricKey> {
    let file_digest = digest(file_bytes);
    let reference_digest = digest(reference_material);
    let key = xor_digests(&file_digest, &reference_digest)?;
    tracing::trace!(file_len = file_bytes.len(), "derived file key");
    Ok(SymmetricKey::from_bytes(key))
}
