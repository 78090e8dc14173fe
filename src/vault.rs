//! Vault codec: authenticated encryption of an env block.
//!
//! On-disk record (UTF-8 JSON, byte fields lowercase hex):
//!
//! ```text
//! { version, salt[32], iv[16], authTag[16], encrypted, hmac[32], metadata }
//! ```
//!
//! The key is PBKDF2-derived from the passphrase (fresh salt per encrypt).
//! The ciphertext is AES-256-GCM with a 16-byte IV; the 16-byte tag is
//! stored separately. An HMAC-SHA-256 over the ciphertext, keyed by the
//! derived key, is verified in constant time before the AEAD primitive runs,
//! so non-adversarial corruption fails with a distinct error kind.

use aes_gcm::aead::generic_array::typenum::U16;
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::aes::Aes256;
use aes_gcm::AesGcm;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use std::fs;
use std::path::Path;

use crate::envfile;
use crate::error::VaultError;
use crate::kdf;

/// AES-256-GCM parameterized for the vault's 16-byte IV.
type VaultCipher = AesGcm<Aes256, U16>;

pub const VAULT_VERSION: u32 = 1;
pub const IV_BYTES: usize = 16;
pub const TAG_BYTES: usize = 16;
pub const HMAC_BYTES: usize = 32;

/// Conventional vault file name.
pub const VAULT_FILE: &str = ".nevr-env.vault";

// ---------------------------------------------------------------------------
// On-disk record
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultMetadata {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    /// Count of variable lines in the plaintext. Informational only; does
    /// not participate in integrity.
    pub variables: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultFile {
    pub version: u32,
    #[serde(with = "hex_bytes")]
    pub salt: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub iv: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub auth_tag: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub encrypted: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub hmac: Vec<u8>,
    pub metadata: VaultMetadata,
}

/// Hex-encoded byte fields, lowercase on disk.
mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

/// Encrypt a plaintext block under a passphrase.
///
/// `prior` carries the metadata of the vault being replaced: `createdAt`
/// and `createdBy` are preserved, `updatedAt` is refreshed, and the
/// variable count is recomputed from the new plaintext.
pub fn encrypt(
    plaintext: &[u8],
    passphrase: &str,
    prior: Option<&VaultMetadata>,
) -> Result<VaultFile, VaultError> {
    let salt = kdf::salt()?;
    let key = kdf::derive_key(passphrase, &salt);

    let mut iv = [0u8; IV_BYTES];
    getrandom::getrandom(&mut iv).map_err(|e| VaultError::Io(e.to_string()))?;

    let cipher = VaultCipher::new(GenericArray::from_slice(key.as_ref()));
    let mut encrypted = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(GenericArray::from_slice(&iv), b"", &mut encrypted)
        .map_err(|_| VaultError::Io("aead seal failure".into()))?;

    let hmac = ciphertext_hmac(key.as_ref(), &encrypted);

    let now = Utc::now();
    let variables = std::str::from_utf8(plaintext)
        .map(envfile::count_variables)
        .unwrap_or(0);
    let metadata = match prior {
        Some(prev) => VaultMetadata {
            created_at: prev.created_at,
            updated_at: now,
            created_by: prev.created_by.clone(),
            variables,
        },
        None => VaultMetadata {
            created_at: now,
            updated_at: now,
            created_by: None,
            variables,
        },
    };

    Ok(VaultFile {
        version: VAULT_VERSION,
        salt: salt.to_vec(),
        iv: iv.to_vec(),
        auth_tag: tag.to_vec(),
        encrypted,
        hmac: hmac.to_vec(),
        metadata,
    })
}

/// Decrypt a vault record. Check order: version gate, HMAC envelope
/// (constant time), then AEAD open.
pub fn decrypt(vault: &VaultFile, passphrase: &str) -> Result<Zeroizing<Vec<u8>>, VaultError> {
    if vault.version != VAULT_VERSION {
        return Err(VaultError::VersionMismatch {
            found: vault.version,
            expected: VAULT_VERSION,
        });
    }

    let key = kdf::derive_key(passphrase, &vault.salt);

    let expected = ciphertext_hmac(key.as_ref(), &vault.encrypted);
    if !bool::from(expected.ct_eq(vault.hmac.as_slice())) {
        return Err(VaultError::IntegrityFailed);
    }

    if vault.iv.len() != IV_BYTES || vault.auth_tag.len() != TAG_BYTES {
        return Err(VaultError::DecryptFailed);
    }

    let cipher = VaultCipher::new(GenericArray::from_slice(key.as_ref()));
    let mut plaintext = Zeroizing::new(vault.encrypted.clone());
    cipher
        .decrypt_in_place_detached(
            GenericArray::from_slice(&vault.iv),
            b"",
            plaintext.as_mut_slice(),
            GenericArray::from_slice(&vault.auth_tag),
        )
        .map_err(|_| VaultError::DecryptFailed)?;

    Ok(plaintext)
}

/// HMAC-SHA-256 over the ciphertext, keyed by the derived key.
fn ciphertext_hmac(key: &[u8], ciphertext: &[u8]) -> [u8; HMAC_BYTES] {
    let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(key).expect("hmac accepts any key length");
    mac.update(ciphertext);
    mac.finalize().into_bytes().into()
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

/// Read and parse a vault file.
pub fn load(path: &Path) -> Result<VaultFile, VaultError> {
    let data = fs::read_to_string(path).map_err(|e| VaultError::from_io(e, path))?;
    serde_json::from_str(&data).map_err(|e| VaultError::Serialize(e.to_string()))
}

/// Write a vault file atomically: temp sibling, then rename.
pub fn store(path: &Path, vault: &VaultFile) -> Result<(), VaultError> {
    let json = serde_json::to_string_pretty(vault)
        .map_err(|e| VaultError::Serialize(e.to_string()))?;
    let tmp = path.with_extension("vault.tmp");
    fs::write(&tmp, json.as_bytes()).map_err(|e| VaultError::from_io(e, &tmp))?;
    fs::rename(&tmp, path).map_err(|e| VaultError::from_io(e, path))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
