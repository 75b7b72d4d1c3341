//! Chain records and their canonical digest form
//!
//! The digest covers every field except `digest` itself, serialized as
//! compact JSON with object keys sorted at every level:
//!
//! ```text
//! {"created_at":..,"file_reference":..,"owner_id":..,"payload":{"kind":..},
//!  "previous_digest":..,"sequence_number":..}
//! ```

use std::time::{SystemTime, UNIX_EPOCH};

use chainvault_core::{VaultError, VaultResult};
use chainvault_crypto::{derive_key, digest_hex, KeyBundle, SymmetricKey};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What a record carries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordPayload {
    /// Sequence 0 only
    Genesis { marker: String },
    /// A file uploaded by the chain owner
    Owned { bundle: KeyBundle },
    /// A file received from another identity
    Shared {
        bundle: KeyBundle,
        shared_from: String,
        original_owner: String,
    },
    /// Provenance of an outgoing share. Stored in branches only.
    ShareGrant {
        recipient: String,
        recipient_sequence: u64,
    },
}

impl RecordPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            RecordPayload::Genesis { .. } => "genesis",
            RecordPayload::Owned { .. } => "owned",
            RecordPayload::Shared { .. } => "shared",
            RecordPayload::ShareGrant { .. } => "share_grant",
        }
    }

    pub fn key_bundle(&self) -> Option<&KeyBundle> {
        match self {
            RecordPayload::Owned { bundle } | RecordPayload::Shared { bundle, .. } => Some(bundle),
            _ => None,
        }
    }
}

/// One immutable entry of a hash chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainRecord {
    pub sequence_number: u64,
    /// Unix seconds, informational
    pub created_at: u64,
    pub payload: RecordPayload,
    pub previous_digest: String,
    /// Lowercase hex SHA-256 of the canonical form
    pub digest: String,
    pub file_reference: String,
    pub owner_id: String,
}

impl ChainRecord {
    /// Build a record and compute its digest.
    pub fn seal(
        sequence_number: u64,
        created_at: u64,
        payload: RecordPayload,
        previous_digest: String,
        file_reference: String,
        owner_id: String,
    ) -> VaultResult<Self> {
        let mut record = Self {
            sequence_number,
            created_at,
            payload,
            previous_digest,
            digest: String::new(),
            file_reference,
            owner_id,
        };
        record.digest = record.compute_digest()?;
        Ok(record)
    }

    /// Canonical bytes hashed into `digest` (all fields but `digest`).
    pub fn canonical_bytes(&self) -> VaultResult<Vec<u8>> {
        let mut value = serde_json::to_value(self)?;
        if let Value::Object(map) = &mut value {
            map.remove("digest");
        }
        Ok(canonical_json(&value).into_bytes())
    }

    /// Canonical form of the whole record, stored digest included.
    ///
    /// This is the reference material for key derivation, so a record
    /// loaded with a trusted-but-wrong digest derives from what is stored.
    pub fn reference_material(&self) -> VaultResult<Vec<u8>> {
        let value = serde_json::to_value(self)?;
        Ok(canonical_json(&value).into_bytes())
    }

    pub fn compute_digest(&self) -> VaultResult<String> {
        Ok(digest_hex(&self.canonical_bytes()?))
    }

    /// Whether the stored digest matches a fresh computation.
    pub fn digest_matches(&self) -> bool {
        self.compute_digest()
            .map(|d| d == self.digest)
            .unwrap_or(false)
    }

    pub fn is_genesis(&self) -> bool {
        matches!(self.payload, RecordPayload::Genesis { .. })
    }

    pub fn is_shared(&self) -> bool {
        matches!(self.payload, RecordPayload::Shared { .. })
    }

    pub fn shared_from(&self) -> Option<&str> {
        match &self.payload {
            RecordPayload::Shared { shared_from, .. } => Some(shared_from),
            _ => None,
        }
    }

    /// Identity that first uploaded the referenced file.
    pub fn original_owner(&self) -> Option<&str> {
        match &self.payload {
            RecordPayload::Owned { .. } => Some(&self.owner_id),
            RecordPayload::Shared { original_owner, .. } => Some(original_owner),
            _ => None,
        }
    }

    pub fn key_bundle(&self) -> Option<&KeyBundle> {
        self.payload.key_bundle()
    }
}

/// Derive the symmetric key for `file_bytes` from the given reference record.
pub fn derive_file_key(file_bytes: &[u8], reference: &ChainRecord) -> VaultResult<SymmetricKey> {
    derive_key(file_bytes, &reference.reference_material()?)
}

/// Current Unix time in seconds.
pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Compact JSON with object keys sorted at every level, independent of
/// how `serde_json::Map` orders its entries.
fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Reject payloads that may not appear on the main chain after genesis.
pub(crate) fn check_main_payload(payload: &RecordPayload) -> VaultResult<()> {
    match payload {
        RecordPayload::Owned { .. } | RecordPayload::Shared { .. } => Ok(()),
        other => Err(VaultError::InvalidInput(format!(
            "{} payload cannot be appended to the main chain",
            other.kind()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn genesis() -> ChainRecord {
        ChainRecord::seal(
            0,
            1_700_000_000,
            RecordPayload::Genesis {
                marker: "test".into(),
            },
            "0".into(),
            "genesis".into(),
            "alice".into(),
        )
        .unwrap()
    }

    #[test]
    fn test_canonical_form_is_sorted_and_compact() {
        let record = genesis();
        let canonical = String::from_utf8(record.canonical_bytes().unwrap()).unwrap();
        assert_eq!(
            canonical,
            r#"{"created_at":1700000000,"file_reference":"genesis","owner_id":"alice","payload":{"kind":"genesis","marker":"test"},"previous_digest":"0","sequence_number":0}"#
        );
    }

    #[test]
    fn test_digest_is_hex_sha256_of_canonical() {
        let record = genesis();
        assert_eq!(record.digest.len(), 64);
        assert_eq!(
            record.digest,
            digest_hex(&record.canonical_bytes().unwrap())
        );
        assert!(record.digest_matches());
    }

    #[test]
    fn test_canonical_ignores_map_order() {
        let a: Value = serde_json::from_str(r#"{"b":1,"a":{"y":2,"x":[{"d":1,"c":2}]}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"a":{"x":[{"c":2,"d":1}],"y":2},"b":1}"#).unwrap();
        assert_eq!(canonical_json(&a), canonical_json(&b));
        assert_eq!(canonical_json(&a), r#"{"a":{"x":[{"c":2,"d":1}],"y":2},"b":1}"#);
    }

    #[test]
    fn test_every_field_changes_digest() {
        let base = genesis();
        let mut variants = vec![base.clone(); 6];
        variants[0].sequence_number = 1;
        variants[1].created_at += 1;
        variants[2].payload = RecordPayload::Genesis {
            marker: "other".into(),
        };
        variants[3].previous_digest = "1".into();
        variants[4].file_reference = "f".into();
        variants[5].owner_id = "bob".into();
        for v in variants {
            assert_ne!(v.compute_digest().unwrap(), base.digest);
            assert!(!v.digest_matches());
        }
    }

    #[test]
    fn test_reference_material_includes_digest() {
        let mut record = genesis();
        let before = record.reference_material().unwrap();
        record.digest = "f".repeat(64);
        assert_ne!(record.reference_material().unwrap(), before);
        assert_eq!(
            record.canonical_bytes().unwrap(),
            genesis().canonical_bytes().unwrap()
        );
    }

    #[test]
    fn test_derive_file_key_from_genesis() {
        let record = genesis();
        let a = derive_file_key(b"abc", &record).unwrap();
        let b = derive_file_key(b"abc", &record).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_payload_json_is_tagged() {
        let json = serde_json::to_value(RecordPayload::ShareGrant {
            recipient: "bob".into(),
            recipient_sequence: 4,
        })
        .unwrap();
        assert_eq!(json["kind"], "share_grant");
        assert_eq!(json["recipient_sequence"], 4);
    }

    #[test]
    fn test_variant_accessors() {
        let record = genesis();
        assert!(record.is_genesis());
        assert!(!record.is_shared());
        assert!(record.shared_from().is_none());
        assert!(record.key_bundle().is_none());
        assert!(record.original_owner().is_none());
    }

    #[test]
    fn test_main_payload_check() {
        assert!(check_main_payload(&RecordPayload::Genesis { marker: "m".into() }).is_err());
        assert!(check_main_payload(&RecordPayload::ShareGrant {
            recipient: "bob".into(),
            recipient_sequence: 1
        })
        .is_err());
    }
}
