//! # nevr-env
//!
//! Encrypted, auditable environment management for teams.
//!
//! The vault encrypts a block of `KEY=value` lines under a passphrase-derived
//! key so the result is safe to commit; every vault operation lands in a
//! tamper-evident, hash-linked audit log; and the scanner sweeps source trees
//! for credentials that should have been in the vault in the first place.
//! Migrations and schema diffs keep the variable set evolvable.
//!
//! ## Quick Start
//!
//! ```no_run
//! use nevr_env::key;
//! use nevr_env::store::VaultStore;
//! use std::path::Path;
//!
//! let passphrase = key::generate_key();
//! let store = VaultStore::open_dir(Path::new("."));
//!
//! store.push(Path::new(".env"), &passphrase).unwrap();
//! store.pull(Path::new(".env"), &passphrase).unwrap();
//!
//! let verification = store.audit().verify();
//! assert!(verification.valid);
//! ```
//!
//! ## Guarantees
//!
//! - **Tamper evidence**: the HMAC envelope rejects corrupted ciphertext
//!   before the AEAD primitive runs; the audit chain detects any edit,
//!   insertion, or deletion of log entries.
//! - **No value leakage**: the audit log holds key names and content
//!   fingerprints only, never plaintext values.
//! - **Determinism**: scans, diffs, and migration previews report in a
//!   stable, caller-observable order.

pub mod audit;
pub mod cli;
pub mod envfile;
pub mod error;
pub mod kdf;
pub mod key;
pub mod migrate;
pub mod patterns;
pub mod rotation;
pub mod scanner;
pub mod schema_diff;
pub mod store;
pub mod vault;

// Re-export main types for convenience
pub use audit::{
    Actor, ActorType, AuditAction, AuditContext, AuditEntry, AuditLog, AuditQuery, AuditSummary,
    ChainVerification, ExportFormat, Target, TargetType,
};
pub use envfile::EnvMap;
pub use error::{AuditError, MigrateError, RotationError, ScanError, VaultError};
pub use key::{generate_key, validate_key_format};
pub use migrate::{
    ApplyOptions, ChangeKind, ChangeRecord, MigrationOutcome, MigrationPlan, MigrationRule,
    RuleAction,
};
pub use patterns::{SecretPattern, Severity};
pub use rotation::{RotationFile, RotationRecord, RotationStatus};
pub use scanner::{ScanMatch, ScanOptions, ScanResult, ScanSummary};
pub use schema_diff::{
    diff, render_migration_guide, DiffOptions, SchemaDiff, SchemaMap, SchemaNode, TypeDescriptor,
};
pub use store::{SyncOutcome, VaultDiff, VaultStore};
pub use vault::{VaultFile, VaultMetadata, VAULT_VERSION};
