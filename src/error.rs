//! Error types for every component.

use std::fmt;
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// Vault codec
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum VaultError {
    /// The vault file declares a format version this build does not read.
    VersionMismatch { found: u32, expected: u32 },
    /// The AEAD layer rejected the ciphertext (wrong key or tampered tag/IV).
    DecryptFailed,
    /// The HMAC envelope over the ciphertext did not verify. Checked before
    /// the AEAD primitive runs, so corruption (e.g. a git merge conflict)
    /// fails fast with a non-cryptographic error kind.
    IntegrityFailed,
    /// The passphrase does not match the `nevr_` key envelope.
    InvalidKey,
    FileNotFound(PathBuf),
    PermissionDenied(PathBuf),
    Io(String),
    Serialize(String),
}

impl fmt::Display for VaultError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VersionMismatch { found, expected } => {
                write!(f, "vault version {} not supported (expected {})", found, expected)
            }
            Self::DecryptFailed => write!(f, "decryption failed: wrong key or corrupted vault"),
            Self::IntegrityFailed => write!(f, "integrity check failed: wrong key or corrupted vault"),
            Self::InvalidKey => write!(f, "invalid encryption key format"),
            Self::FileNotFound(p) => write!(f, "file not found: {}", p.display()),
            Self::PermissionDenied(p) => write!(f, "permission denied: {}", p.display()),
            Self::Io(msg) => write!(f, "i/o error: {}", msg),
            Self::Serialize(msg) => write!(f, "serialization error: {}", msg),
        }
    }
}

impl std::error::Error for VaultError {}

impl VaultError {
    /// Map an I/O error against `path` into the taxonomy.
    pub fn from_io(err: std::io::Error, path: &std::path::Path) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::FileNotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io(err.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Audit chain
// ---------------------------------------------------------------------------

/// Append failures surface as I/O errors; verification never raises.
#[derive(Debug)]
pub enum AuditError {
    Io(String),
    Serialize(String),
}

impl fmt::Display for AuditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "audit i/o error: {}", msg),
            Self::Serialize(msg) => write!(f, "audit serialization error: {}", msg),
        }
    }
}

impl std::error::Error for AuditError {}

// ---------------------------------------------------------------------------
// Secret scanner
// ---------------------------------------------------------------------------

/// Only the initial directory access propagates; per-file problems are
/// absorbed and the file is skipped.
#[derive(Debug)]
pub enum ScanError {
    RootAccess { path: PathBuf, message: String },
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RootAccess { path, message } => {
                write!(f, "cannot scan {}: {}", path.display(), message)
            }
        }
    }
}

impl std::error::Error for ScanError {}

// ---------------------------------------------------------------------------
// Migration engine
// ---------------------------------------------------------------------------

/// File-level migration failures. Per-rule faults are collected in the
/// outcome record instead.
#[derive(Debug)]
pub enum MigrateError {
    FileNotFound(PathBuf),
    Io(String),
    /// A backup path without the backup infix cannot be mapped back to its
    /// original target.
    UnrecognizedBackupName(PathBuf),
}

impl fmt::Display for MigrateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FileNotFound(p) => write!(f, "file not found: {}", p.display()),
            Self::Io(msg) => write!(f, "i/o error: {}", msg),
            Self::UnrecognizedBackupName(p) => {
                write!(f, "cannot infer rollback target from {}", p.display())
            }
        }
    }
}

impl std::error::Error for MigrateError {}

// ---------------------------------------------------------------------------
// Rotation tracking
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum RotationError {
    Io(String),
    Malformed(String),
}

impl fmt::Display for RotationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "rotation file i/o error: {}", msg),
            Self::Malformed(msg) => write!(f, "rotation file malformed: {}", msg),
        }
    }
}

impl std::error::Error for RotationError {}
