//! Encryption-key envelope: `nevr_<base64url>` strings.
//!
//! The format is a transport convention, not a cryptographic binding. The
//! whole string is the passphrase fed to the KDF; nothing about the key's
//! entropy is encoded beyond its length.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand_core::{OsRng, RngCore};

/// Prefix carried by every generated key.
pub const KEY_PREFIX: &str = "nevr_";

/// Raw entropy per generated key. 32 bytes encode to a 43-char body.
pub const KEY_BYTES: usize = 32;

/// Minimum body length accepted by [`validate_key_format`].
const MIN_BODY_CHARS: usize = 32;

/// Generate a fresh key: 32 CSPRNG bytes, base64url without padding.
pub fn generate_key() -> String {
    let mut bytes = [0u8; KEY_BYTES];
    OsRng.fill_bytes(&mut bytes);
    format!("{}{}", KEY_PREFIX, URL_SAFE_NO_PAD.encode(bytes))
}

/// Check a string against the `nevr_[A-Za-z0-9_-]{32,}` envelope.
pub fn validate_key_format(key: &str) -> bool {
    let Some(body) = key.strip_prefix(KEY_PREFIX) else {
        return false;
    };
    body.len() >= MIN_BODY_CHARS
        && body
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
