//! Identity key pairs, one per owner, generated on first use

use chainvault_chain::now_secs;
use chainvault_core::{VaultError, VaultResult};
use chainvault_crypto::{Identity, PublicKey, KEY_SIZE};
use opendal::Operator;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::{is_not_found, key_path, storage_error};

/// Persisted form of an identity key pair
#[derive(Clone, Serialize, Deserialize)]
pub struct KeyPairDocument {
    pub owner_id: String,
    /// X25519 public key, hex
    pub public_key: String,
    /// X25519 secret key, hex
    pub secret_key: String,
    pub created_at: u64,
}

impl KeyPairDocument {
    pub fn from_identity(identity: &Identity) -> Self {
        let mut secret = identity.secret_bytes();
        let doc = Self {
            owner_id: identity.owner_id().to_string(),
            public_key: identity.public_key_hex(),
            secret_key: hex::encode(secret),
            created_at: now_secs(),
        };
        secret.zeroize();
        doc
    }

    /// Rebuild the identity, checking the stored public key matches the secret.
    pub fn to_identity(&self) -> VaultResult<Identity> {
        let mut raw = hex::decode(&self.secret_key).map_err(|e| {
            VaultError::Storage(format!("key pair {}: bad secret: {e}", self.owner_id))
        })?;
        let secret: Result<[u8; KEY_SIZE], _> = raw.as_slice().try_into();
        raw.zeroize();
        let mut secret = secret.map_err(|_| VaultError::InvalidKeyLength {
            expected: KEY_SIZE,
            actual: self.secret_key.len() / 2,
        })?;
        let identity = Identity::from_secret_bytes(&self.owner_id, secret);
        secret.zeroize();

        if identity.public_key_hex() != self.public_key {
            return Err(VaultError::Storage(format!(
                "key pair {}: public key does not match secret",
                self.owner_id
            )));
        }
        Ok(identity)
    }
}

impl Drop for KeyPairDocument {
    fn drop(&mut self) {
        self.secret_key.zeroize();
    }
}

impl std::fmt::Debug for KeyPairDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPairDocument")
            .field("owner_id", &self.owner_id)
            .field("public_key", &self.public_key)
            .field("secret_key", &"[REDACTED]")
            .finish()
    }
}

#[derive(Clone)]
pub struct KeyStore {
    op: Operator,
}

impl KeyStore {
    pub fn new(op: Operator) -> Self {
        Self { op }
    }

    /// Load an identity, `None` if the owner never registered.
    pub async fn get(&self, owner_id: &str) -> VaultResult<Option<Identity>> {
        let path = key_path(owner_id);
        let buf = match self.op.read(&path).await {
            Ok(buf) => buf,
            Err(e) if is_not_found(&e) => return Ok(None),
            Err(e) => return Err(storage_error(format!("reading key pair {path}"), e)),
        };
        let doc: KeyPairDocument = serde_json::from_slice(&buf.to_vec())?;
        if doc.owner_id != owner_id {
            return Err(VaultError::OwnerMismatch {
                expected: owner_id.to_string(),
                found: doc.owner_id.clone(),
            });
        }
        doc.to_identity().map(Some)
    }

    /// Load an identity or fail with `KeyPairNotFound`.
    pub async fn require(&self, owner_id: &str) -> VaultResult<Identity> {
        self.get(owner_id)
            .await?
            .ok_or_else(|| VaultError::KeyPairNotFound(owner_id.to_string()))
    }

    /// Load an identity, generating and persisting one if absent.
    ///
    /// Returns the identity and whether it was created by this call.
    pub async fn get_or_create(&self, owner_id: &str) -> VaultResult<(Identity, bool)> {
        if let Some(identity) = self.get(owner_id).await? {
            return Ok((identity, false));
        }
        let identity = Identity::generate(owner_id);
        let path = key_path(owner_id);
        let bytes = serde_json::to_vec_pretty(&KeyPairDocument::from_identity(&identity))?;
        self.op
            .write(&path, bytes)
            .await
            .map_err(|e| storage_error(format!("writing key pair {path}"), e))?;
        tracing::info!(
            owner = owner_id,
            public_key = %identity.public_key_hex(),
            "generated key pair"
        );
        Ok((identity, true))
    }

    pub async fn public_key(&self, owner_id: &str) -> VaultResult<PublicKey> {
        Ok(*self.require(owner_id).await?.public_key())
    }
}
