use serde::{Deserialize, Serialize};

use crate::error::{VaultError, VaultResult};

/// Maximum length of an owner identifier
pub const MAX_OWNER_ID_LEN: usize = 128;

/// Check that an owner id is safe to use as a storage path component.
///
/// Allowed: 1-128 chars of `[A-Za-z0-9_.@-]`, not starting with `.`.
pub fn validate_owner_id(owner_id: &str) -> VaultResult<()> {
    if owner_id.is_empty() || owner_id.len() > MAX_OWNER_ID_LEN {
        return Err(VaultError::InvalidInput(format!(
            "owner id must be 1-{MAX_OWNER_ID_LEN} characters"
        )));
    }
    if owner_id.starts_with('.') {
        return Err(VaultError::InvalidInput(format!(
            "owner id may not start with '.': {owner_id}"
        )));
    }
    let ok = owner_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '@' | '-'));
    if !ok {
        return Err(VaultError::InvalidInput(format!(
            "owner id contains unsupported characters: {owner_id}"
        )));
    }
    Ok(())
}

/// Result of a successful upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub file_id: String,
    /// Sequence number of the record appended to the owner's chain
    pub sequence: u64,
    pub original_name: String,
    pub size: u64,
}

/// Decrypted file returned by download
#[derive(Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    pub bytes: Vec<u8>,
    pub original_name: String,
}

impl std::fmt::Debug for DownloadedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadedFile")
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .field("original_name", &self.original_name)
            .finish()
    }
}

/// Result of sharing a file with another identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareReceipt {
    pub recipient: String,
    /// Sequence number of the recipient's record for the file
    pub sequence: u64,
    /// false when the recipient already held the file and nothing was appended
    pub created: bool,
}

/// One row of `list_files`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub file_id: String,
    /// Original filename, `None` when the encrypted blob could not be read
    pub filename: Option<String>,
    pub sequence: u64,
    /// Unix timestamp of the chain record
    pub created_at: u64,
    pub is_shared: bool,
    pub shared_from: Option<String>,
    /// Whether the encrypted blob was located
    pub available: bool,
}

/// Outcome of `validate_chain`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainValidation {
    pub valid: bool,
    /// First sequence number that failed verification
    pub first_invalid: Option<u64>,
    /// Main-chain length including genesis
    pub length: usize,
}
