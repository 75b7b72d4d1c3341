//! OpenDAL Operator factory for chainvault storage backends

use chainvault_core::config::{StorageBackend, StorageConfig};
use chainvault_core::{VaultError, VaultResult};
use opendal::Operator;

/// Build an operator for the configured backend, with request logging.
///
/// The fs backend creates `root` if it does not exist and stages writes in
/// `<root>/.tmp` so a crash mid-write never leaves a half-written document.
pub fn build_operator(cfg: &StorageConfig) -> VaultResult<Operator> {
    let op = match cfg.backend {
        StorageBackend::Fs => {
            let root = cfg.expanded_root();
            std::fs::create_dir_all(&root)?;
            let root_str = root.to_string_lossy().into_owned();
            let tmp_str = root.join(".tmp").to_string_lossy().into_owned();

            // opendal 0.55: builders use the consuming pattern
            let builder = opendal::services::Fs::default()
                .root(&root_str)
                .atomic_write_dir(&tmp_str);
            tracing::debug!(root = %root_str, "building fs operator");
            Operator::new(builder)
                .map_err(|e| VaultError::Storage(format!("creating fs operator: {e}")))?
                .layer(opendal::layers::LoggingLayer::default())
                .finish()
        }
        StorageBackend::Memory => memory_operator()?,
    };
    Ok(op)
}

/// A process-local operator. Contents are lost when it is dropped.
pub fn memory_operator() -> VaultResult<Operator> {
    let op = Operator::new(opendal::services::Memory::default())
        .map_err(|e| VaultError::Storage(format!("creating memory operator: {e}")))?
        .layer(opendal::layers::LoggingLayer::default())
        .finish();
    Ok(op)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_memory_operator() {
        let cfg = StorageConfig {
            backend: StorageBackend::Memory,
            ..Default::default()
        };
        assert!(build_operator(&cfg).is_ok());
    }

    #[test]
    fn test_build_fs_operator_creates_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("vault");
        let cfg = StorageConfig {
            backend: StorageBackend::Fs,
            root: root.clone(),
        };
        assert!(build_operator(&cfg).is_ok());
        assert!(root.is_dir());
    }

    #[tokio::test]
    async fn test_fs_operator_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = StorageConfig {
            backend: StorageBackend::Fs,
            root: dir.path().to_path_buf(),
        };
        let op = build_operator(&cfg).unwrap();
        op.write("chains/alice.json", b"{}".to_vec()).await.unwrap();
        assert!(dir.path().join("chains/alice.json").is_file());
        assert_eq!(op.read("chains/alice.json").await.unwrap().to_vec(), b"{}");
    }
}
