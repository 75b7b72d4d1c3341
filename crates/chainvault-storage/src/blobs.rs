//! Encrypted file blobs, stored once per file id
//!
//! Chains hold only the file id. Every owner and recipient record for a file
//! points at the same blob.

use chainvault_core::{VaultError, VaultResult};
use chainvault_crypto::SealedBox;
use opendal::Operator;
use serde::{Deserialize, Serialize};

use crate::{blob_path, is_not_found, storage_error};

/// Encrypted file contents plus the original filename
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileBundle {
    #[serde(flatten)]
    pub sealed: SealedBox,
    pub original_name: String,
}

/// Blob store keyed by file id
#[derive(Clone)]
pub struct BlobStore {
    op: Operator,
}

impl BlobStore {
    pub fn new(op: Operator) -> Self {
        Self { op }
    }

    pub async fn put(&self, file_id: &str, bundle: &FileBundle) -> VaultResult<()> {
        validate_file_id(file_id)?;
        let path = blob_path(file_id);
        let bytes = serde_json::to_vec(bundle)?;
        let size = bytes.len();
        self.op
            .write(&path, bytes)
            .await
            .map_err(|e| storage_error(format!("writing blob {path}"), e))?;
        tracing::debug!(file_id, size, "stored blob");
        Ok(())
    }

    /// Fails with `FileNotFound` if no blob exists for `file_id`.
    pub async fn get(&self, file_id: &str) -> VaultResult<FileBundle> {
        validate_file_id(file_id)?;
        let path = blob_path(file_id);
        let buf = self.op.read(&path).await.map_err(|e| {
            if is_not_found(&e) {
                VaultError::FileNotFound(file_id.to_string())
            } else {
                storage_error(format!("reading blob {path}"), e)
            }
        })?;
        Ok(serde_json::from_slice(&buf.to_vec())?)
    }

    pub async fn exists(&self, file_id: &str) -> VaultResult<bool> {
        validate_file_id(file_id)?;
        let path = blob_path(file_id);
        self.op
            .exists(&path)
            .await
            .map_err(|e| storage_error(format!("checking blob {path}"), e))
    }

    /// Remove a blob. Missing blobs are not an error.
    pub async fn delete(&self, file_id: &str) -> VaultResult<()> {
        validate_file_id(file_id)?;
        let path = blob_path(file_id);
        self.op
            .delete(&path)
            .await
            .map_err(|e| storage_error(format!("deleting blob {path}"), e))
    }
}

/// File ids are UUID strings: ASCII alphanumerics and `-` only.
pub fn validate_file_id(file_id: &str) -> VaultResult<()> {
    if file_id.is_empty()
        || file_id.len() > 64
        || !file_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    {
        return Err(VaultError::InvalidInput(format!("invalid file id: {file_id:?}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_operator;

    fn bundle(name: &str) -> FileBundle {
        FileBundle {
            sealed: chainvault_crypto::encrypt(b"contents", &[3u8; 32]).unwrap(),
            original_name: name.into(),
        }
    }

    #[tokio::test]
    async fn test_put_get() {
        let store = BlobStore::new(memory_operator().unwrap());
        let b = bundle("report.pdf");
        store.put("f-1", &b).await.unwrap();
        assert!(store.exists("f-1").await.unwrap());
        assert_eq!(store.get("f-1").await.unwrap(), b);
    }

    #[tokio::test]
    async fn test_missing_blob_is_file_not_found() {
        let store = BlobStore::new(memory_operator().unwrap());
        assert!(!store.exists("nope").await.unwrap());
        let err = store.get("nope").await.unwrap_err();
        assert!(matches!(err, VaultError::FileNotFound(id) if id == "nope"));
    }

    #[tokio::test]
    async fn test_delete() {
        let store = BlobStore::new(memory_operator().unwrap());
        store.put("f-2", &bundle("a")).await.unwrap();
        store.delete("f-2").await.unwrap();
        assert!(!store.exists("f-2").await.unwrap());
        store.delete("f-2").await.unwrap();
    }

    #[test]
    fn test_bundle_json_is_flat() {
        let json = serde_json::to_value(bundle("x.txt")).unwrap();
        assert!(json["ciphertext"].is_string());
        assert!(json["nonce"].is_string());
        assert!(json["tag"].is_string());
        assert_eq!(json["original_name"], "x.txt");
    }

    #[test]
    fn test_file_id_validation() {
        assert!(validate_file_id("3f1c2a9e-1b2c-4d5e-8f90-0a1b2c3d4e5f").is_ok());
        for bad in ["", "../x", "a/b", "a.json", "a b"] {
            assert!(validate_file_id(bad).is_err(), "{bad:?}");
        }
    }
}
