//! VaultService: upload, download, share, list, validate
//!
//! Upload:
//! ```text
//! latest = chain.latest()
//! key    = SHA-256(bytes) XOR SHA-256(canonical(latest))
//! blob   = AES-GCM(key, bytes)            → blobs/<file_id>.json
//! bundle = escrow(key, owner public key)  → chain.append(Owned)
//! save chain                              → chains/<owner>.json
//! ```
//!
//! Share re-escrows the same key for the recipient and appends a `Shared`
//! record to the recipient's chain. The blob is never copied.

use chainvault_chain::{derive_file_key, ChainRecord, HashChain, RecordPayload};
use chainvault_core::config::{IntegrityPolicy, VaultConfig};
use chainvault_core::types::{
    validate_owner_id, ChainValidation, DownloadedFile, FileEntry, ShareReceipt, UploadReceipt,
};
use chainvault_core::{VaultError, VaultResult};
use chainvault_crypto::{
    decrypt, encrypt, escrow_with_payload, open_payload, unescrow, Identity, SymmetricKey,
};
use chainvault_storage::{build_operator, BlobStore, ChainStore, FileBundle, KeyStore};
use opendal::Operator;
use tracing::{debug, info, warn};

use crate::locks::OwnerLocks;

/// Longest accepted original filename, in bytes
pub const MAX_FILENAME_LEN: usize = 255;

pub struct VaultService {
    config: VaultConfig,
    blobs: BlobStore,
    chains: ChainStore,
    keys: KeyStore,
    locks: OwnerLocks,
}

impl VaultService {
    pub fn new(config: VaultConfig, op: Operator) -> Self {
        Self {
            blobs: BlobStore::new(op.clone()),
            chains: ChainStore::new(op.clone(), config.chain.integrity_policy),
            keys: KeyStore::new(op),
            locks: OwnerLocks::default(),
            config,
        }
    }

    /// Build the storage operator described by `config.storage`.
    pub fn from_config(config: VaultConfig) -> VaultResult<Self> {
        let op = build_operator(&config.storage)?;
        Ok(Self::new(config, op))
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// Create the owner's key pair and genesis chain if absent.
    pub async fn register(&self, owner_id: &str) -> VaultResult<()> {
        validate_owner_id(owner_id)?;
        let _guard = self.locks.lock(owner_id).await;

        let (_, created_key) = self.keys.get_or_create(owner_id).await?;
        let mut chain = self
            .chains
            .load(owner_id)
            .await?
            .unwrap_or_else(|| HashChain::new(owner_id));
        let created_chain = chain.is_empty();
        if created_chain {
            chain.create_genesis(&self.config.chain.genesis_marker)?;
            self.chains.save(&chain).await?;
        }

        info!(owner = owner_id, created_key, created_chain, "registered identity");
        Ok(())
    }

    /// Hex-encoded X25519 public key of a registered identity.
    pub async fn public_key_hex(&self, owner_id: &str) -> VaultResult<String> {
        validate_owner_id(owner_id)?;
        Ok(self.keys.require(owner_id).await?.public_key_hex())
    }

    /// The owner's chain as currently stored.
    pub async fn load_chain(&self, owner_id: &str) -> VaultResult<HashChain> {
        validate_owner_id(owner_id)?;
        self.require_chain(owner_id).await
    }

    pub async fn upload_file(
        &self,
        owner_id: &str,
        bytes: &[u8],
        filename: &str,
    ) -> VaultResult<UploadReceipt> {
        validate_owner_id(owner_id)?;
        let original_name = clean_filename(filename)?;
        let size = bytes.len() as u64;
        let max = self.config.vault.max_file_size;
        if size > max {
            return Err(VaultError::FileTooLarge { size, max });
        }

        let _guard = self.locks.lock(owner_id).await;
        let (identity, _) = self.keys.get_or_create(owner_id).await?;
        let mut chain = self
            .chains
            .load_or_init(owner_id, &self.config.chain.genesis_marker)
            .await?;

        let key = derive_file_key(bytes, chain.latest()?)?;
        let sealed = encrypt(bytes, key.as_bytes())?;
        let file_id = uuid::Uuid::new_v4().to_string();
        let bundle = FileBundle {
            sealed,
            original_name: original_name.clone(),
        };
        self.blobs.put(&file_id, &bundle).await?;
        debug!(owner = owner_id, file_id = %file_id, "stored encrypted blob");

        let appended = async {
            let bundle = escrow_with_payload(&key, identity.public_key(), file_id.as_bytes())?;
            let record = chain.append(RecordPayload::Owned { bundle }, &file_id)?;
            self.chains.save(&chain).await?;
            Ok::<_, VaultError>(record)
        }
        .await;
        let record = match appended {
            Ok(record) => record,
            Err(e) => {
                self.discard_blob(&file_id).await;
                return Err(e);
            }
        };

        info!(
            owner = owner_id,
            file_id = %file_id,
            sequence = record.sequence_number,
            size,
            "uploaded file"
        );
        Ok(UploadReceipt {
            file_id,
            sequence: record.sequence_number,
            original_name,
            size,
        })
    }

    pub async fn download_file(
        &self,
        owner_id: &str,
        file_id: &str,
    ) -> VaultResult<DownloadedFile> {
        validate_owner_id(owner_id)?;
        let chain = self.require_chain(owner_id).await?;
        let record = chain
            .find_by_file_reference(file_id)
            .ok_or_else(|| VaultError::FileNotFound(file_id.to_string()))?;

        let identity = self.keys.require(owner_id).await?;
        let key = recover_key(&identity, record)?;
        let file = self.blobs.get(file_id).await?;
        let bytes = decrypt(&file.sealed, key.as_bytes())?;

        info!(
            owner = owner_id,
            file_id,
            sequence = record.sequence_number,
            size = bytes.len(),
            "downloaded file"
        );
        Ok(DownloadedFile {
            bytes,
            original_name: file.original_name,
        })
    }

    /// Escrow the file key for `recipient_id` and record the share on both chains.
    ///
    /// With `idempotent_share`, a recipient that already holds a record for the
    /// file gets no new record and the existing sequence is returned.
    pub async fn share_file(
        &self,
        owner_id: &str,
        recipient_id: &str,
        file_id: &str,
    ) -> VaultResult<ShareReceipt> {
        validate_owner_id(owner_id)?;
        validate_owner_id(recipient_id)?;
        if owner_id == recipient_id {
            return Err(VaultError::InvalidInput(format!(
                "{owner_id} cannot share a file with itself"
            )));
        }
        let _guards = self.locks.lock_pair(owner_id, recipient_id).await;

        let mut owner_chain = self.require_chain(owner_id).await?;
        let record = owner_chain
            .find_by_file_reference(file_id)
            .cloned()
            .ok_or_else(|| VaultError::FileNotFound(file_id.to_string()))?;
        if !self.blobs.exists(file_id).await? {
            return Err(VaultError::FileNotFound(file_id.to_string()));
        }
        let identity = self.keys.require(owner_id).await?;
        let key = recover_key(&identity, &record)?;

        let recipient = match self.keys.get(recipient_id).await? {
            Some(recipient) => recipient,
            None if self.config.vault.auto_register_recipient => {
                self.keys.get_or_create(recipient_id).await?.0
            }
            None => return Err(VaultError::RecipientKeyMissing(recipient_id.to_string())),
        };

        let mut recipient_chain = self
            .chains
            .load_or_init(recipient_id, &self.config.chain.genesis_marker)
            .await?;
        let existing = if self.config.vault.idempotent_share {
            recipient_chain
                .find_by_file_reference(file_id)
                .map(|r| r.sequence_number)
        } else {
            None
        };

        let (sequence, created) = match existing {
            Some(sequence) => {
                debug!(
                    recipient = recipient_id,
                    file_id,
                    sequence,
                    "recipient already holds file"
                );
                (sequence, false)
            }
            None => {
                let bundle =
                    escrow_with_payload(&key, recipient.public_key(), file_id.as_bytes())?;
                let payload = RecordPayload::Shared {
                    bundle,
                    shared_from: owner_id.to_string(),
                    original_owner: record.original_owner().unwrap_or(owner_id).to_string(),
                };
                let appended = recipient_chain.append(payload, file_id)?;
                self.chains.save(&recipient_chain).await?;
                (appended.sequence_number, true)
            }
        };

        let branch_id = share_branch_id(file_id, recipient_id);
        let has_grant = owner_chain
            .branch(&branch_id)
            .is_some_and(|b| !b.records.is_empty());
        if created || !has_grant {
            owner_chain.add_branch(
                &branch_id,
                record.sequence_number,
                RecordPayload::ShareGrant {
                    recipient: recipient_id.to_string(),
                    recipient_sequence: sequence,
                },
                file_id,
            )?;
            self.chains.save(&owner_chain).await?;
        }

        info!(
            owner = owner_id,
            recipient = recipient_id,
            file_id,
            sequence,
            created,
            "shared file"
        );
        Ok(ShareReceipt {
            recipient: recipient_id.to_string(),
            sequence,
            created,
        })
    }

    /// Recipients the owner has shared `file_id` with, sorted.
    pub async fn shares_of(&self, owner_id: &str, file_id: &str) -> VaultResult<Vec<String>> {
        validate_owner_id(owner_id)?;
        let chain = self.require_chain(owner_id).await?;
        let prefix = share_branch_id(file_id, "");
        let mut recipients: Vec<String> = chain
            .branches()
            .iter()
            .filter(|(id, _)| id.starts_with(&prefix))
            .flat_map(|(_, branch)| branch.records.iter())
            .filter_map(|r| match &r.payload {
                RecordPayload::ShareGrant { recipient, .. } => Some(recipient.clone()),
                _ => None,
            })
            .collect();
        recipients.sort();
        recipients.dedup();
        Ok(recipients)
    }

    /// Every non-genesis record, with the filename from its blob when readable.
    ///
    /// An owner with no chain has no files. A missing or unreadable blob
    /// yields an entry with `available = false`.
    pub async fn list_files(&self, owner_id: &str) -> VaultResult<Vec<FileEntry>> {
        self.list_files_filtered(owner_id, true).await
    }

    /// `list_files`, leaving out files received from others unless
    /// `include_shared` is set.
    pub async fn list_files_filtered(
        &self,
        owner_id: &str,
        include_shared: bool,
    ) -> VaultResult<Vec<FileEntry>> {
        validate_owner_id(owner_id)?;
        let Some(chain) = self.chains.load(owner_id).await? else {
            return Ok(Vec::new());
        };

        let mut entries = Vec::new();
        let listed = chain
            .records()
            .iter()
            .filter(|r| !r.is_genesis() && (include_shared || !r.is_shared()));
        for record in listed {
            let (filename, available) = match self.blobs.get(&record.file_reference).await {
                Ok(bundle) => (Some(bundle.original_name), true),
                Err(e) => {
                    warn!(
                        owner = owner_id,
                        file_id = %record.file_reference,
                        "blob unavailable: {e}"
                    );
                    (None, false)
                }
            };
            entries.push(FileEntry {
                file_id: record.file_reference.clone(),
                filename,
                sequence: record.sequence_number,
                created_at: record.created_at,
                is_shared: record.is_shared(),
                shared_from: record.shared_from().map(str::to_string),
                available,
            });
        }

        debug!(owner = owner_id, files = entries.len(), "listed files");
        Ok(entries)
    }

    /// Recheck digests and linkage of the owner's main chain.
    ///
    /// The chain is loaded under the warn policy so damage is reported here
    /// rather than failing the load.
    pub async fn validate_chain(&self, owner_id: &str) -> VaultResult<ChainValidation> {
        validate_owner_id(owner_id)?;
        let chain = self
            .chains
            .load_with_policy(owner_id, IntegrityPolicy::Warn)
            .await?
            .ok_or_else(|| VaultError::ChainNotFound(owner_id.to_string()))?;

        let first_invalid = match chain.verify() {
            Ok(()) => {
                info!(owner = owner_id, length = chain.len(), "chain valid");
                None
            }
            Err(violation) => {
                warn!(
                    owner = owner_id,
                    sequence = violation.sequence,
                    kind = %violation.kind,
                    "chain failed validation"
                );
                Some(violation.sequence)
            }
        };
        Ok(ChainValidation {
            valid: first_invalid.is_none(),
            first_invalid,
            length: chain.len(),
        })
    }

    async fn require_chain(&self, owner_id: &str) -> VaultResult<HashChain> {
        self.chains
            .load(owner_id)
            .await?
            .ok_or_else(|| VaultError::ChainNotFound(owner_id.to_string()))
    }

    async fn discard_blob(&self, file_id: &str) {
        if let Err(e) = self.blobs.delete(file_id).await {
            warn!(file_id, "orphaned blob left behind: {e}");
        }
    }
}

/// Unwrap a record's key bundle and check it is bound to the record's file.
fn recover_key(identity: &Identity, record: &ChainRecord) -> VaultResult<SymmetricKey> {
    let bundle = record
        .key_bundle()
        .ok_or_else(|| VaultError::FileNotFound(record.file_reference.clone()))?;
    let key = unescrow(bundle, identity.secret())?;
    if open_payload(bundle, &key)? != record.file_reference.as_bytes() {
        return Err(VaultError::Authentication(format!(
            "key bundle at sequence {} is bound to another file",
            record.sequence_number
        )));
    }
    Ok(key)
}

fn share_branch_id(file_id: &str, recipient_id: &str) -> String {
    format!("share/{file_id}/{recipient_id}")
}

/// Keep only the final path component of a client-supplied filename.
fn clean_filename(filename: &str) -> VaultResult<String> {
    let name = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    if name.is_empty() || name == "." || name == ".." {
        return Err(VaultError::InvalidInput(format!(
            "invalid filename: {filename:?}"
        )));
    }
    if name.len() > MAX_FILENAME_LEN {
        return Err(VaultError::InvalidInput(format!(
            "filename longer than {MAX_FILENAME_LEN} bytes"
        )));
    }
    Ok(name.to_string())
}
