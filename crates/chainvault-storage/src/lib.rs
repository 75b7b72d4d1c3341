//! chainvault-storage: OpenDAL persistence for the vault
//!
//! Layout under the operator root:
//! ```text
//! chains/<owner>.json   one chain document per identity (whole-file overwrite)
//! blobs/<file_id>.json  one encrypted FileBundle per upload, shared by every chain that references it
//! keys/<owner>.json     one X25519 key pair per identity
//! ```

pub mod blobs;
pub mod chains;
pub mod keys;
pub mod operator;

pub use blobs::{BlobStore, FileBundle};
pub use chains::ChainStore;
pub use keys::{KeyPairDocument, KeyStore};
pub use operator::{build_operator, memory_operator};

use chainvault_core::VaultError;

pub(crate) fn chain_path(owner_id: &str) -> String {
    format!("chains/{owner_id}.json")
}

pub(crate) fn blob_path(file_id: &str) -> String {
    format!("blobs/{file_id}.json")
}

pub(crate) fn key_path(owner_id: &str) -> String {
    format!("keys/{owner_id}.json")
}

pub(crate) fn is_not_found(e: &opendal::Error) -> bool {
    e.kind() == opendal::ErrorKind::NotFound
}

pub(crate) fn storage_error(context: String, e: opendal::Error) -> VaultError {
    VaultError::Storage(format!("{context}: {e}"))
}
