//! AES-256-GCM authenticated encryption with a detached tag
//!
//! A sealed box keeps the three parts separate:
//! ```text
//! ciphertext: same length as plaintext (no padding)
//! nonce:      12 bytes, fresh from the RNG for every call
//! tag:        16 bytes, GCM authentication tag
//! ```

use aes_gcm::{
    aead::{AeadInPlace, KeyInit},
    Aes256Gcm, Nonce, Tag,
};
use chainvault_core::{VaultError, VaultResult};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::{KEY_SIZE, NONCE_SIZE, TAG_SIZE};

/// Output of `encrypt`: ciphertext, nonce and tag, base64 in JSON
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedBox {
    #[serde(with = "b64")]
    pub ciphertext: Vec<u8>,
    #[serde(with = "b64")]
    pub nonce: Vec<u8>,
    #[serde(with = "b64")]
    pub tag: Vec<u8>,
}

/// Encrypt `plaintext` under a 32-byte key with a random nonce.
pub fn encrypt(plaintext: &[u8], key: &[u8]) -> VaultResult<SealedBox> {
    let cipher = new_cipher(key)?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);

    let mut buffer = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(Nonce::from_slice(&nonce_bytes), b"", &mut buffer)
        .map_err(|e| anyhow::anyhow!("AES-GCM encryption failed: {e}"))?;

    Ok(SealedBox {
        ciphertext: buffer,
        nonce: nonce_bytes.to_vec(),
        tag: tag.to_vec(),
    })
}

/// Decrypt a sealed box. Any tag mismatch is a hard `Authentication` failure.
pub fn decrypt(sealed: &SealedBox, key: &[u8]) -> VaultResult<Vec<u8>> {
    let cipher = new_cipher(key)?;

    if sealed.nonce.len() != NONCE_SIZE || sealed.tag.len() != TAG_SIZE {
        return Err(VaultError::Authentication(format!(
            "malformed sealed box: nonce {} bytes, tag {} bytes",
            sealed.nonce.len(),
            sealed.tag.len()
        )));
    }

    let mut buffer = sealed.ciphertext.clone();
    cipher
        .decrypt_in_place_detached(
            Nonce::from_slice(&sealed.nonce),
            b"",
            &mut buffer,
            Tag::from_slice(&sealed.tag),
        )
        .map_err(|_| {
            VaultError::Authentication("wrong key or tampered ciphertext".into())
        })?;

    Ok(buffer)
}

fn new_cipher(key: &[u8]) -> VaultResult<Aes256Gcm> {
    if key.len() != KEY_SIZE {
        return Err(VaultError::InvalidKeyLength {
            expected: KEY_SIZE,
            actual: key.len(),
        });
    }
    Aes256Gcm::new_from_slice(key).map_err(|_| VaultError::InvalidKeyLength {
        expected: KEY_SIZE,
        actual: key.len(),
    })
}

/// serde helper: `Vec<u8>` as standard base64
pub(crate) mod b64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const KEY: [u8; KEY_SIZE] = [0x42; KEY_SIZE];

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let sealed = encrypt(b"hello, vault", &KEY).unwrap();
        assert_eq!(decrypt(&sealed, &KEY).unwrap(), b"hello, vault");
    }

    #[test]
    fn test_encrypt_decrypt_empty() {
        let sealed = encrypt(b"", &KEY).unwrap();
        assert!(sealed.ciphertext.is_empty());
        assert_eq!(sealed.tag.len(), TAG_SIZE);
        assert_eq!(decrypt(&sealed, &KEY).unwrap(), b"");
    }

    #[test]
    fn test_no_padding() {
        let sealed = encrypt(&[0u8; 1000], &KEY).unwrap();
        assert_eq!(sealed.ciphertext.len(), 1000);
        assert_eq!(sealed.nonce.len(), NONCE_SIZE);
    }

    #[test]
    fn test_fresh_nonce_per_call() {
        let a = encrypt(b"same", &KEY).unwrap();
        let b = encrypt(b"same", &KEY).unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn test_rejects_wrong_key_length() {
        let err = encrypt(b"data", &[0u8; 16]).unwrap_err();
        assert!(matches!(
            err,
            VaultError::InvalidKeyLength { expected: 32, actual: 16 }
        ));

        let sealed = encrypt(b"data", &KEY).unwrap();
        let err = decrypt(&sealed, &[0u8; 31]).unwrap_err();
        assert!(matches!(err, VaultError::InvalidKeyLength { actual: 31, .. }));
    }

    #[test]
    fn test_decrypt_wrong_key() {
        let sealed = encrypt(b"secret data", &KEY).unwrap();
        let err = decrypt(&sealed, &[0x43; KEY_SIZE]).unwrap_err();
        assert!(matches!(err, VaultError::Authentication(_)));
    }

    #[test]
    fn test_malformed_nonce_is_authentication_failure() {
        let mut sealed = encrypt(b"secret data", &KEY).unwrap();
        sealed.nonce.pop();
        assert!(matches!(
            decrypt(&sealed, &KEY),
            Err(VaultError::Authentication(_))
        ));
    }

    #[test]
    fn test_sealed_box_json_is_base64() {
        let sealed = encrypt(b"abc", &KEY).unwrap();
        let json = serde_json::to_value(&sealed).unwrap();
        assert!(json["nonce"].is_string());
        let back: SealedBox = serde_json::from_value(json).unwrap();
        assert_eq!(back, sealed);
    }

    proptest! {
        #[test]
        fn prop_roundtrip(data in proptest::collection::vec(any::<u8>(), 0..2048), key in any::<[u8; 32]>()) {
            let sealed = encrypt(&data, &key).unwrap();
            prop_assert_eq!(decrypt(&sealed, &key).unwrap(), data);
        }

        #[test]
        fn prop_any_bit_flip_fails(
            data in proptest::collection::vec(any::<u8>(), 1..256),
            part in 0usize..3,
            pos in any::<usize>(),
            bit in 0u8..8,
        ) {
            let mut sealed = encrypt(&data, &KEY).unwrap();
            let target = match part {
                0 => &mut sealed.ciphertext,
                1 => &mut sealed.nonce,
                _ => &mut sealed.tag,
            };
            let idx = pos % target.len();
            target[idx] ^= 1 << bit;

            let result = decrypt(&sealed, &KEY);
            prop_assert!(matches!(result, Err(VaultError::Authentication(_))));
        }
    }
}
