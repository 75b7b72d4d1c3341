//! Key types: per-file symmetric keys and X25519 identity key pairs

use chainvault_core::{VaultError, VaultResult};
use rand::rngs::OsRng;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroize;

use crate::KEY_SIZE;

/// A 256-bit symmetric key. Zeroized on drop.
#[derive(Clone)]
pub struct SymmetricKey {
    bytes: [u8; KEY_SIZE],
}

impl SymmetricKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Build a key from an arbitrary slice, rejecting anything but 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> VaultResult<Self> {
        if bytes.len() != KEY_SIZE {
            return Err(VaultError::InvalidKeyLength {
                expected: KEY_SIZE,
                actual: bytes.len(),
            });
        }
        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(bytes);
        Ok(Self { bytes: key })
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for SymmetricKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymmetricKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// An X25519 key pair bound to one owner identity.
///
/// The secret half is zeroized on drop by `x25519-dalek`.
#[derive(Clone)]
pub struct Identity {
    owner_id: String,
    secret: StaticSecret,
    public: PublicKey,
}

impl Identity {
    /// Generate a fresh key pair from the OS RNG.
    pub fn generate(owner_id: &str) -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret);
        Self {
            owner_id: owner_id.to_string(),
            secret,
            public,
        }
    }

    pub fn from_secret_bytes(owner_id: &str, bytes: [u8; KEY_SIZE]) -> Self {
        let secret = StaticSecret::from(bytes);
        let public = PublicKey::from(&secret);
        Self {
            owner_id: owner_id.to_string(),
            secret,
            public,
        }
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    pub fn secret(&self) -> &StaticSecret {
        &self.secret
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public.as_bytes())
    }

    /// Raw secret bytes, for persisting the key pair
    pub fn secret_bytes(&self) -> [u8; KEY_SIZE] {
        self.secret.to_bytes()
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("owner_id", &self.owner_id)
            .field("public", &self.public_key_hex())
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Parse a hex-encoded X25519 public key.
pub fn public_key_from_hex(s: &str) -> VaultResult<PublicKey> {
    let bytes = hex::decode(s)
        .map_err(|e| VaultError::InvalidInput(format!("public key is not hex: {e}")))?;
    let arr: [u8; KEY_SIZE] = bytes.as_slice().try_into().map_err(|_| {
        VaultError::InvalidKeyLength {
            expected: KEY_SIZE,
            actual: bytes.len(),
        }
    })?;
    Ok(PublicKey::from(arr))
}
