//! KDF: PBKDF2-HMAC-SHA-512, 600,000 iterations, 32-byte output.
//!
//! Deliberately expensive (~100-500 ms on commodity hardware). Callers that
//! need a responsive UI should run derivation on a worker thread; the
//! contract here stays synchronous.

use pbkdf2::pbkdf2_hmac;
use sha2::Sha512;
use zeroize::Zeroizing;

use crate::error::VaultError;

pub const PBKDF2_ITERATIONS: u32 = 600_000;
pub const SALT_BYTES: usize = 32;
pub const DERIVED_KEY_BYTES: usize = 32;

/// Derive the vault key from a passphrase and per-encryption salt.
pub fn derive_key(passphrase: &str, salt: &[u8]) -> Zeroizing<[u8; DERIVED_KEY_BYTES]> {
    let mut out = Zeroizing::new([0u8; DERIVED_KEY_BYTES]);
    pbkdf2_hmac::<Sha512>(passphrase.as_bytes(), salt, PBKDF2_ITERATIONS, out.as_mut());
    out
}

/// Generate a random 32-byte salt. Used during encryption only.
pub fn salt() -> Result<[u8; SALT_BYTES], VaultError> {
    let mut s = [0u8; SALT_BYTES];
    getrandom::getrandom(&mut s).map_err(|e| VaultError::Io(e.to_string()))?;
    Ok(s)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
