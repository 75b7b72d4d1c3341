//! One chain document per owner, persisted by whole-file overwrite

use chainvault_chain::HashChain;
use chainvault_core::config::IntegrityPolicy;
use chainvault_core::VaultResult;
use opendal::Operator;

use crate::{chain_path, is_not_found, storage_error};

#[derive(Clone)]
pub struct ChainStore {
    op: Operator,
    policy: IntegrityPolicy,
}

impl ChainStore {
    pub fn new(op: Operator, policy: IntegrityPolicy) -> Self {
        Self { op, policy }
    }

    pub fn policy(&self) -> IntegrityPolicy {
        self.policy
    }

    /// Load an owner's chain, `None` if it was never saved.
    pub async fn load(&self, owner_id: &str) -> VaultResult<Option<HashChain>> {
        self.load_with_policy(owner_id, self.policy).await
    }

    /// Load under an explicit policy, e.g. `Warn` to inspect a damaged chain.
    pub async fn load_with_policy(
        &self,
        owner_id: &str,
        policy: IntegrityPolicy,
    ) -> VaultResult<Option<HashChain>> {
        let path = chain_path(owner_id);
        let buf = match self.op.read(&path).await {
            Ok(buf) => buf,
            Err(e) if is_not_found(&e) => return Ok(None),
            Err(e) => return Err(storage_error(format!("reading chain {path}"), e)),
        };
        let chain = HashChain::from_json(&buf.to_vec(), owner_id, policy)?;
        Ok(Some(chain))
    }

    /// Load an owner's chain, or start one with a genesis record.
    ///
    /// A fresh chain is not persisted until the caller saves it.
    pub async fn load_or_init(
        &self,
        owner_id: &str,
        genesis_marker: &str,
    ) -> VaultResult<HashChain> {
        let mut chain = match self.load(owner_id).await? {
            Some(chain) => chain,
            None => HashChain::new(owner_id),
        };
        if chain.is_empty() {
            chain.create_genesis(genesis_marker)?;
            tracing::info!(owner = owner_id, "initialized chain");
        }
        Ok(chain)
    }

    /// Overwrite the stored document with the full chain.
    pub async fn save(&self, chain: &HashChain) -> VaultResult<()> {
        let path = chain_path(chain.owner_id());
        let bytes = chain.to_json()?;
        self.op
            .write(&path, bytes)
            .await
            .map_err(|e| storage_error(format!("writing chain {path}"), e))?;
        tracing::debug!(owner = chain.owner_id(), records = chain.len(), "saved chain");
        Ok(())
    }

    pub async fn exists(&self, owner_id: &str) -> VaultResult<bool> {
        let path = chain_path(owner_id);
        self.op
            .exists(&path)
            .await
            .map_err(|e| storage_error(format!("checking chain {path}"), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_operator;
    use chainvault_core::VaultError;

    #[tokio::test]
    async fn test_missing_chain_is_none() {
        let store = ChainStore::new(memory_operator().unwrap(), IntegrityPolicy::Warn);
        assert!(store.load("alice").await.unwrap().is_none());
        assert!(!store.exists("alice").await.unwrap());
    }

    #[tokio::test]
    async fn test_init_save_load() {
        let store = ChainStore::new(memory_operator().unwrap(), IntegrityPolicy::Strict);
        let chain = store.load_or_init("alice", "m").await.unwrap();
        assert_eq!(chain.len(), 1);
        assert!(!store.exists("alice").await.unwrap());

        store.save(&chain).await.unwrap();
        let loaded = store.load("alice").await.unwrap().unwrap();
        assert_eq!(loaded, chain);

        let again = store.load_or_init("alice", "m").await.unwrap();
        assert_eq!(again.latest().unwrap().digest, chain.latest().unwrap().digest);
    }

    #[tokio::test]
    async fn test_strict_policy_surfaces_tampering() {
        let op = memory_operator().unwrap();
        let store = ChainStore::new(op.clone(), IntegrityPolicy::Strict);
        let chain = store.load_or_init("alice", "m").await.unwrap();
        store.save(&chain).await.unwrap();

        let raw = op.read("chains/alice.json").await.unwrap().to_vec();
        let tampered = String::from_utf8(raw).unwrap().replace("\"m\"", "\"n\"");
        op.write("chains/alice.json", tampered.into_bytes()).await.unwrap();

        let err = store.load("alice").await.unwrap_err();
        assert!(matches!(err, VaultError::IntegrityViolation { sequence: 0, .. }));

        let lenient = ChainStore::new(op, IntegrityPolicy::Warn);
        let loaded = lenient.load("alice").await.unwrap().unwrap();
        assert!(!loaded.validate());
    }
}
