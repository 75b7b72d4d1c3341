//! Chain document: the persisted JSON form of a `HashChain`
//!
//! ```json
//! { "owner_id": "alice",
//!   "records": [ { "sequence_number": 0, ... }, ... ],
//!   "branches": { "share/<file>/<bob>": { "parent_sequence": 1, "records": [...] } } }
//! ```
//!
//! Loading re-checks every stored digest under an `IntegrityPolicy`.

use std::collections::BTreeMap;

use chainvault_core::config::IntegrityPolicy;
use chainvault_core::{VaultError, VaultResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::chain::{Branch, HashChain, SkippedRecord};
use crate::record::ChainRecord;

#[derive(Serialize)]
struct ChainDocumentRef<'a> {
    owner_id: &'a str,
    records: &'a [ChainRecord],
    branches: &'a BTreeMap<String, Branch>,
}

#[derive(Deserialize)]
struct RawChainDocument {
    owner_id: String,
    #[serde(default)]
    records: Vec<Value>,
    #[serde(default)]
    branches: BTreeMap<String, RawBranch>,
}

#[derive(Deserialize)]
struct RawBranch {
    parent_sequence: u64,
    #[serde(default)]
    records: Vec<Value>,
}

impl HashChain {
    /// Serialize the whole chain, branches included.
    ///
    /// Fails with `IntegrityViolation` if records were skipped on load, since
    /// writing the result would drop them from the stored document.
    pub fn to_json(&self) -> VaultResult<Vec<u8>> {
        if let Some(first) = self.skipped().first() {
            return Err(VaultError::IntegrityViolation {
                owner: self.owner_id().to_string(),
                sequence: first.index,
                reason: format!(
                    "{} stored record(s) could not be parsed; refusing to overwrite the chain",
                    self.skipped().len()
                ),
            });
        }
        let doc = ChainDocumentRef {
            owner_id: self.owner_id(),
            records: self.records(),
            branches: self.branches(),
        };
        Ok(serde_json::to_vec_pretty(&doc)?)
    }

    /// Parse a chain document for `expected_owner`.
    ///
    /// Under `Warn`, a record whose digest does not recompute is kept with its
    /// stored digest and unparsable records are skipped, each with a warning.
    /// Skipped records are listed in `skipped()` and block `to_json`.
    /// Under `Strict`, either case fails with `IntegrityViolation`, as does any
    /// linkage failure found by `verify`.
    pub fn from_json(
        data: &[u8],
        expected_owner: &str,
        policy: IntegrityPolicy,
    ) -> VaultResult<Self> {
        let raw: RawChainDocument = serde_json::from_slice(data)?;
        if raw.owner_id != expected_owner {
            return Err(VaultError::OwnerMismatch {
                expected: expected_owner.to_string(),
                found: raw.owner_id,
            });
        }

        let loader = Loader {
            owner: expected_owner,
            policy,
        };
        let mut skipped = Vec::new();
        let records = loader.load_records(raw.records, None, &mut skipped)?;

        let mut branches = BTreeMap::new();
        for (branch_id, raw_branch) in raw.branches {
            let records =
                loader.load_records(raw_branch.records, Some(branch_id.as_str()), &mut skipped)?;
            branches.insert(
                branch_id,
                Branch {
                    parent_sequence: raw_branch.parent_sequence,
                    records,
                },
            );
        }

        let chain = HashChain::from_parts(expected_owner.to_string(), records, branches, skipped);

        if let Err(violation) = chain.verify() {
            loader.report(violation.sequence, &violation.kind.to_string(), None)?;
        }
        for branch_id in chain.branches().keys() {
            if let Err(violation) = chain.verify_branch(branch_id) {
                loader.report(
                    violation.sequence,
                    &violation.kind.to_string(),
                    Some(branch_id.as_str()),
                )?;
            }
        }

        tracing::debug!(
            owner = expected_owner,
            records = chain.len(),
            branches = chain.branches().len(),
            "loaded chain"
        );
        Ok(chain)
    }
}

struct Loader<'a> {
    owner: &'a str,
    policy: IntegrityPolicy,
}

impl Loader<'_> {
    fn load_records(
        &self,
        values: Vec<Value>,
        branch: Option<&str>,
        skipped: &mut Vec<SkippedRecord>,
    ) -> VaultResult<Vec<ChainRecord>> {
        let mut records = Vec::with_capacity(values.len());
        for (index, value) in values.into_iter().enumerate() {
            let index = index as u64;
            let record: ChainRecord = match serde_json::from_value(value) {
                Ok(record) => record,
                Err(e) => {
                    self.report(index, &format!("unparsable record: {e}"), branch)?;
                    skipped.push(SkippedRecord {
                        branch: branch.map(str::to_string),
                        index,
                    });
                    continue;
                }
            };
            if !record.digest_matches() {
                self.report(
                    record.sequence_number,
                    "stored digest does not match record contents; keeping stored digest",
                    branch,
                )?;
            }
            records.push(record);
        }
        Ok(records)
    }

    /// Warn and continue, or fail, depending on policy.
    fn report(&self, sequence: u64, reason: &str, branch: Option<&str>) -> VaultResult<()> {
        match self.policy {
            IntegrityPolicy::Warn => {
                tracing::warn!(
                    owner = self.owner,
                    sequence,
                    branch = branch.unwrap_or("main"),
                    "chain integrity: {reason}"
                );
                Ok(())
            }
            IntegrityPolicy::Strict => Err(VaultError::IntegrityViolation {
                owner: self.owner.to_string(),
                sequence,
                reason: match branch {
                    Some(b) => format!("branch {b}: {reason}"),
                    None => reason.to_string(),
                },
            }),
        }
    }
}
