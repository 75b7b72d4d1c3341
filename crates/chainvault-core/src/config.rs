use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{VaultError, VaultResult};

/// Top-level vault configuration (loaded from chainvault.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    pub storage: StorageConfig,
    pub chain: ChainConfig,
    pub vault: VaultSettings,
}

impl VaultConfig {
    /// Load configuration from a TOML file.
    ///
    /// A missing file is not an error: defaults are used and a warning is logged.
    pub fn load(path: &Path) -> VaultResult<Self> {
        if !path.exists() {
            tracing::warn!("config file not found: {}  (using defaults)", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| VaultError::Config(format!("reading config {}: {e}", path.display())))?;
        Self::from_toml(&content)
            .map_err(|e| VaultError::Config(format!("parsing config {}: {e}", path.display())))
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Local directory tree under `root`
    Fs,
    /// Process-local, lost on exit (tests and dry runs)
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Root directory for chains, blobs and keys (fs backend only)
    pub root: PathBuf,
}

impl StorageConfig {
    /// `root` with a leading `~/` expanded against $HOME
    pub fn expanded_root(&self) -> PathBuf {
        expand_tilde(&self.root)
    }
}

/// What to do when a stored record digest does not match its recomputed value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrityPolicy {
    /// Keep the stored digest, log a warning, and let `validate_chain` report it
    Warn,
    /// Refuse to load the chain
    Strict,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    pub integrity_policy: IntegrityPolicy,
    /// Payload marker stored in every genesis record
    pub genesis_marker: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultSettings {
    /// Maximum plaintext size accepted by upload, in bytes (default: 100 MiB)
    pub max_file_size: u64,
    /// Skip appending when the recipient already holds the shared file
    pub idempotent_share: bool,
    /// Generate a key pair for a share recipient that has none
    pub auto_register_recipient: bool,
}

/// Default genesis payload marker
pub const DEFAULT_GENESIS_MARKER: &str = "chainvault/genesis/v1";

/// Default upload limit (100 MiB)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Fs,
            root: PathBuf::from("~/.local/share/chainvault"),
        }
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            integrity_policy: IntegrityPolicy::Warn,
            genesis_marker: DEFAULT_GENESIS_MARKER.into(),
        }
    }
}

impl Default for VaultSettings {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            idempotent_share: true,
            auto_register_recipient: false,
        }
    }
}

fn expand_tilde(path: &Path) -> PathBuf {
    if let Some(rest) = path.to_str().and_then(|s| s.strip_prefix("~/")) {
        let home = std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"));
        return home.join(rest);
    }
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
[storage]
backend = "memory"
root = "/var/lib/chainvault"

[chain]
integrity_policy = "strict"
genesis_marker = "test-genesis"

[vault]
max_file_size = 1024
idempotent_share = false
auto_register_recipient = true
"#;
        let config = VaultConfig::from_toml(toml_str).unwrap();

        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.storage.root, PathBuf::from("/var/lib/chainvault"));
        assert_eq!(config.chain.integrity_policy, IntegrityPolicy::Strict);
        assert_eq!(config.chain.genesis_marker, "test-genesis");
        assert_eq!(config.vault.max_file_size, 1024);
        assert!(!config.vault.idempotent_share);
        assert!(config.vault.auto_register_recipient);
    }

    #[test]
    fn test_parse_defaults() {
        let config = VaultConfig::from_toml("").unwrap();

        assert_eq!(config.storage.backend, StorageBackend::Fs);
        assert_eq!(config.chain.integrity_policy, IntegrityPolicy::Warn);
        assert_eq!(config.chain.genesis_marker, DEFAULT_GENESIS_MARKER);
        assert_eq!(config.vault.max_file_size, DEFAULT_MAX_FILE_SIZE);
        assert!(config.vault.idempotent_share);
        assert!(!config.vault.auto_register_recipient);
    }

    #[test]
    fn test_parse_partial_config() {
        let toml_str = r#"
[vault]
max_file_size = 10
"#;
        let config = VaultConfig::from_toml(toml_str).unwrap();

        assert_eq!(config.vault.max_file_size, 10);
        assert!(config.vault.idempotent_share);
        assert_eq!(config.chain.integrity_policy, IntegrityPolicy::Warn);
    }

    #[test]
    fn test_unknown_policy_rejected() {
        let toml_str = r#"
[chain]
integrity_policy = "ignore"
"#;
        assert!(VaultConfig::from_toml(toml_str).is_err());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = VaultConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.vault.max_file_size, DEFAULT_MAX_FILE_SIZE);
    }

    #[test]
    fn test_load_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[vault\nmax_file_size = ").unwrap();
        let err = VaultConfig::load(&path).unwrap_err();
        assert!(matches!(err, VaultError::Config(_)));
    }

    #[test]
    fn test_expand_tilde() {
        let cfg = StorageConfig::default();
        assert!(!cfg.expanded_root().to_str().unwrap().starts_with("~/"));
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = VaultConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed = VaultConfig::from_toml(&toml_str).unwrap();

        assert_eq!(config.storage.root, parsed.storage.root);
        assert_eq!(config.chain.genesis_marker, parsed.chain.genesis_marker);
        assert_eq!(config.vault.max_file_size, parsed.vault.max_file_size);
    }
}
