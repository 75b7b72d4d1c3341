//! HashChain: one owner's append-only record log plus named side branches

use std::collections::BTreeMap;

use chainvault_core::{VaultError, VaultResult};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::record::{check_main_payload, now_secs, ChainRecord, RecordPayload};
use crate::{GENESIS_FILE_REFERENCE, GENESIS_PREVIOUS_DIGEST};

/// Why a record failed verification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ViolationKind {
    #[error("stored digest does not match record contents")]
    DigestMismatch,
    #[error("previous digest does not match predecessor")]
    BrokenLink,
    #[error("sequence number out of order")]
    SequenceGap,
    #[error("malformed genesis record")]
    BadGenesis,
    #[error("branch or parent record missing")]
    MissingParent,
    #[error("record belongs to another owner")]
    ForeignOwner,
}

/// First failing position found by `verify`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{kind} at sequence {sequence}")]
pub struct ChainViolation {
    pub sequence: u64,
    pub kind: ViolationKind,
}

/// A side sequence rooted at a main-chain record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub parent_sequence: u64,
    pub records: Vec<ChainRecord>,
}

/// Position of a stored record that could not be parsed on load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRecord {
    /// `None` for the main chain
    pub branch: Option<String>,
    /// Index in the stored record list
    pub index: u64,
}

/// Append-only, hash-linked record log for exactly one owner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashChain {
    owner_id: String,
    records: Vec<ChainRecord>,
    branches: BTreeMap<String, Branch>,
    skipped: Vec<SkippedRecord>,
}

impl HashChain {
    /// An uninitialized chain. Call `create_genesis` before appending.
    pub fn new(owner_id: &str) -> Self {
        Self {
            owner_id: owner_id.to_string(),
            records: Vec::new(),
            branches: BTreeMap::new(),
            skipped: Vec::new(),
        }
    }

    pub(crate) fn from_parts(
        owner_id: String,
        records: Vec<ChainRecord>,
        branches: BTreeMap<String, Branch>,
        skipped: Vec<SkippedRecord>,
    ) -> Self {
        Self {
            owner_id,
            records,
            branches,
            skipped,
        }
    }

    /// Create sequence 0 with `previous_digest = "0"`.
    pub fn create_genesis(&mut self, marker: &str) -> VaultResult<ChainRecord> {
        if !self.records.is_empty() {
            return Err(VaultError::GenesisExists(self.owner_id.clone()));
        }
        let record = ChainRecord::seal(
            0,
            now_secs(),
            RecordPayload::Genesis {
                marker: marker.to_string(),
            },
            GENESIS_PREVIOUS_DIGEST.to_string(),
            GENESIS_FILE_REFERENCE.to_string(),
            self.owner_id.clone(),
        )?;
        tracing::debug!(owner = %self.owner_id, digest = %record.digest, "created genesis");
        self.records.push(record.clone());
        Ok(record)
    }

    /// Append a record after the current latest one.
    ///
    /// The caller persists the chain afterwards.
    pub fn append(
        &mut self,
        payload: RecordPayload,
        file_reference: &str,
    ) -> VaultResult<ChainRecord> {
        check_main_payload(&payload)?;
        if file_reference.is_empty() {
            return Err(VaultError::InvalidInput("empty file reference".into()));
        }
        let latest = self.latest()?;
        let record = ChainRecord::seal(
            latest.sequence_number + 1,
            now_secs(),
            payload,
            latest.digest.clone(),
            file_reference.to_string(),
            self.owner_id.clone(),
        )?;
        tracing::debug!(
            owner = %self.owner_id,
            sequence = record.sequence_number,
            kind = record.payload.kind(),
            "appended record"
        );
        self.records.push(record.clone());
        Ok(record)
    }

    pub fn latest(&self) -> VaultResult<&ChainRecord> {
        self.records.last().ok_or(VaultError::EmptyChain)
    }

    pub fn find_by_sequence(&self, sequence: u64) -> Option<&ChainRecord> {
        self.records.iter().find(|r| r.sequence_number == sequence)
    }

    pub fn find_by_file_reference(&self, file_reference: &str) -> Option<&ChainRecord> {
        self.records
            .iter()
            .find(|r| !r.is_genesis() && r.file_reference == file_reference)
    }

    /// Check genesis shape, sequence order, linkage, ownership and digests.
    ///
    /// An uninitialized chain verifies trivially.
    pub fn verify(&self) -> Result<(), ChainViolation> {
        for (i, record) in self.records.iter().enumerate() {
            let sequence = i as u64;
            let fail = |kind| Err(ChainViolation { sequence, kind });

            if i == 0 {
                if record.sequence_number != 0
                    || record.previous_digest != GENESIS_PREVIOUS_DIGEST
                    || record.file_reference != GENESIS_FILE_REFERENCE
                    || !record.is_genesis()
                {
                    return fail(ViolationKind::BadGenesis);
                }
            } else {
                if record.sequence_number != sequence {
                    return fail(ViolationKind::SequenceGap);
                }
                if record.is_genesis() {
                    return fail(ViolationKind::BadGenesis);
                }
                if record.previous_digest != self.records[i - 1].digest {
                    return fail(ViolationKind::BrokenLink);
                }
            }
            if record.owner_id != self.owner_id {
                return fail(ViolationKind::ForeignOwner);
            }
            if !record.digest_matches() {
                return fail(ViolationKind::DigestMismatch);
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> bool {
        self.verify().is_ok()
    }

    /// Append to branch `branch_id`, creating it rooted at `parent_sequence`.
    ///
    /// The first branch record links to the parent's digest. Branch sequence
    /// numbers start at 1.
    pub fn add_branch(
        &mut self,
        branch_id: &str,
        parent_sequence: u64,
        payload: RecordPayload,
        file_reference: &str,
    ) -> VaultResult<ChainRecord> {
        if matches!(payload, RecordPayload::Genesis { .. }) {
            return Err(VaultError::InvalidInput(
                "genesis payload cannot be added to a branch".into(),
            ));
        }
        let parent_digest = self
            .find_by_sequence(parent_sequence)
            .map(|r| r.digest.clone())
            .ok_or_else(|| {
                VaultError::RecordNotFound(format!(
                    "{} sequence {parent_sequence}",
                    self.owner_id
                ))
            })?;

        let owner_id = self.owner_id.clone();
        let branch = self
            .branches
            .entry(branch_id.to_string())
            .or_insert_with(|| Branch {
                parent_sequence,
                records: Vec::new(),
            });
        if branch.parent_sequence != parent_sequence {
            return Err(VaultError::InvalidInput(format!(
                "branch {branch_id} is rooted at sequence {}, not {parent_sequence}",
                branch.parent_sequence
            )));
        }

        let (sequence, previous) = match branch.records.last() {
            Some(last) => (last.sequence_number + 1, last.digest.clone()),
            None => (1, parent_digest),
        };
        let record = ChainRecord::seal(
            sequence,
            now_secs(),
            payload,
            previous,
            file_reference.to_string(),
            owner_id,
        )?;
        branch.records.push(record.clone());
        tracing::debug!(owner = %self.owner_id, branch = branch_id, sequence, "extended branch");
        Ok(record)
    }

    /// Verify one branch against its parent record.
    pub fn verify_branch(&self, branch_id: &str) -> Result<(), ChainViolation> {
        let missing = ChainViolation {
            sequence: 0,
            kind: ViolationKind::MissingParent,
        };
        let branch = self.branches.get(branch_id).ok_or(missing)?;
        let parent = self
            .find_by_sequence(branch.parent_sequence)
            .ok_or(missing)?;

        let mut previous = &parent.digest;
        for (i, record) in branch.records.iter().enumerate() {
            let sequence = i as u64 + 1;
            let kind = if record.sequence_number != sequence {
                Some(ViolationKind::SequenceGap)
            } else if &record.previous_digest != previous {
                Some(ViolationKind::BrokenLink)
            } else if record.owner_id != self.owner_id {
                Some(ViolationKind::ForeignOwner)
            } else if !record.digest_matches() {
                Some(ViolationKind::DigestMismatch)
            } else {
                None
            };
            if let Some(kind) = kind {
                return Err(ChainViolation { sequence, kind });
            }
            previous = &record.digest;
        }
        Ok(())
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn records(&self) -> &[ChainRecord] {
        &self.records
    }

    /// Main-chain length including genesis
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn branches(&self) -> &BTreeMap<String, Branch> {
        &self.branches
    }

    pub fn branch(&self, branch_id: &str) -> Option<&Branch> {
        self.branches.get(branch_id)
    }

    /// Stored records left out on load because they could not be parsed.
    ///
    /// A chain with skipped records refuses to serialize, so the stored
    /// document is never overwritten with fewer records than it holds.
    pub fn skipped(&self) -> &[SkippedRecord] {
        &self.skipped
    }

    #[cfg(test)]
    pub(crate) fn records_mut(&mut self) -> &mut Vec<ChainRecord> {
        &mut self.records
    }
}
