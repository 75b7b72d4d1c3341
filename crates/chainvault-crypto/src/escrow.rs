//! Hybrid key escrow: wrap a symmetric key for one recipient
//!
//! ```text
//! ephemeral secret e, recipient public R
//! shared   = X25519(e, R)
//! wrapping = SHA-256(shared)
//! bundle   = { e·G, AES-GCM(wrapping, file key), AES-GCM(file key, payload) }
//! ```
//!
//! Only the holder of R's secret recomputes `shared`, so only they can
//! unwrap the file key. Every escrow uses a fresh ephemeral key.

use chainvault_core::{VaultError, VaultResult};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use x25519_dalek::{EphemeralSecret, PublicKey, SharedSecret, StaticSecret};

use crate::cipher::{self, b64, SealedBox};
use crate::derive::digest;
use crate::keys::SymmetricKey;
use crate::KEY_SIZE;

/// Everything a recipient needs to recover an escrowed key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyBundle {
    /// Sender's ephemeral X25519 public key
    #[serde(with = "b64")]
    pub ephemeral_public_key: Vec<u8>,
    /// The symmetric key sealed under the wrapping key
    pub wrapped_key: SealedBox,
    /// Caller payload sealed under the escrowed symmetric key
    pub payload: SealedBox,
}

/// Escrow `key` for `recipient` with an empty payload.
pub fn escrow(key: &SymmetricKey, recipient: &PublicKey) -> VaultResult<KeyBundle> {
    escrow_with_payload(key, recipient, &[])
}

/// Escrow `key` for `recipient` and seal `payload` under `key`.
pub fn escrow_with_payload(
    key: &SymmetricKey,
    recipient: &PublicKey,
    payload: &[u8],
) -> VaultResult<KeyBundle> {
    let ephemeral = EphemeralSecret::random_from_rng(OsRng);
    let ephemeral_public = PublicKey::from(&ephemeral);
    let shared = ephemeral.diffie_hellman(recipient);
    if !shared.was_contributory() {
        return Err(VaultError::InvalidInput(
            "recipient public key is a low-order point".into(),
        ));
    }

    let wrapping = wrapping_key(&shared);
    let wrapped_key = cipher::encrypt(key.as_bytes(), wrapping.as_bytes())?;
    let payload = cipher::encrypt(payload, key.as_bytes())?;

    Ok(KeyBundle {
        ephemeral_public_key: ephemeral_public.as_bytes().to_vec(),
        wrapped_key,
        payload,
    })
}

/// Recover the escrowed key with the recipient's secret.
///
/// Fails with `Authentication` for the wrong secret or any tampering,
/// including a payload box that no longer opens under the recovered key.
pub fn unescrow(bundle: &KeyBundle, secret: &StaticSecret) -> VaultResult<SymmetricKey> {
    let ephemeral: [u8; KEY_SIZE] = bundle
        .ephemeral_public_key
        .as_slice()
        .try_into()
        .map_err(|_| {
            VaultError::Authentication(format!(
                "ephemeral public key is {} bytes",
                bundle.ephemeral_public_key.len()
            ))
        })?;

    let shared = secret.diffie_hellman(&PublicKey::from(ephemeral));
    if !shared.was_contributory() {
        return Err(VaultError::Authentication(
            "ephemeral public key is a low-order point".into(),
        ));
    }

    let wrapping = wrapping_key(&shared);
    let mut raw = cipher::decrypt(&bundle.wrapped_key, wrapping.as_bytes())?;
    let key = SymmetricKey::from_slice(&raw)
        .map_err(|_| VaultError::Authentication("unwrapped key has wrong length".into()));
    zeroize::Zeroize::zeroize(&mut raw);
    let key = key?;

    open_payload(bundle, &key)?;
    Ok(key)
}

/// Open the payload box of a bundle with an already recovered key.
pub fn open_payload(bundle: &KeyBundle, key: &SymmetricKey) -> VaultResult<Vec<u8>> {
    cipher::decrypt(&bundle.payload, key.as_bytes())
}

fn wrapping_key(shared: &SharedSecret) -> SymmetricKey {
    SymmetricKey::from_bytes(digest(shared.as_bytes()))
}
