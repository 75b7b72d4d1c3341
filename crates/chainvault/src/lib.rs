//! chainvault: a file vault whose per-file keys come from a hash chain
//!
//! Each identity owns an append-only chain. Uploading a file derives its key
//! from the file bytes and the chain's latest record, encrypts the file into
//! a shared blob store, and appends a record holding the key escrowed to the
//! owner's X25519 public key. Sharing escrows the same key to a recipient
//! and appends a record to the recipient's chain.
//!
//! ```no_run
//! # async fn demo() -> chainvault::VaultResult<()> {
//! use chainvault::{VaultConfig, VaultService};
//!
//! let vault = VaultService::from_config(VaultConfig::default())?;
//! vault.register("bob").await?;
//! let receipt = vault.upload_file("alice", b"abc", "notes.txt").await?;
//! vault.share_file("alice", "bob", &receipt.file_id).await?;
//! let file = vault.download_file("bob", &receipt.file_id).await?;
//! assert_eq!(file.bytes, b"abc");
//! # Ok(())
//! # }
//! ```

mod locks;
pub mod service;

pub use chainvault_core::config::VaultConfig;
pub use chainvault_core::types::{
    ChainValidation, DownloadedFile, FileEntry, ShareReceipt, UploadReceipt,
};
pub use chainvault_core::{VaultError, VaultResult};
pub use service::VaultService;
