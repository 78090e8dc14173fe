//! Vault store: the push / pull / diff / sync flows.
//!
//! Ties the codec, the env text codec, and the audit chain together. Every
//! operation records one audit entry with inferred actor and context; an
//! audit write failure is logged and never blocks the vault operation.

use sha2::{Digest, Sha256};

use std::fs;
use std::path::{Path, PathBuf};

use crate::audit::{AuditAction, AuditLog, Target, AUDIT_FILE};
use crate::envfile::{self, EnvMap};
use crate::error::VaultError;
use crate::key;
use crate::vault::{self, VaultFile, VAULT_FILE};

pub struct VaultStore {
    vault_path: PathBuf,
    audit: AuditLog,
}

/// Key-name-level difference between the vault and the local env file.
/// Names only; values never leave the decrypted buffers.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VaultDiff {
    /// Present locally, absent in the vault.
    pub added: Vec<String>,
    /// Present in the vault, absent locally.
    pub removed: Vec<String>,
    /// Present on both sides with different values.
    pub changed: Vec<String>,
}

impl VaultDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

#[derive(Clone, Debug, Default)]
pub struct SyncOutcome {
    /// Keys the local file gained from the vault.
    pub pulled: Vec<String>,
    /// Keys the vault gained from the local file.
    pub pushed: Vec<String>,
}

impl VaultStore {
    pub fn new(vault_path: impl Into<PathBuf>, audit_path: impl Into<PathBuf>) -> Self {
        Self { vault_path: vault_path.into(), audit: AuditLog::new(audit_path) }
    }

    /// Store rooted at a directory, using the conventional file names.
    pub fn open_dir(dir: &Path) -> Self {
        Self::new(dir.join(VAULT_FILE), dir.join(AUDIT_FILE))
    }

    pub fn vault_path(&self) -> &Path {
        &self.vault_path
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// Encrypt the env file into the vault. A fresh vault is stamped with
    /// the inferred actor as creator; re-pushes preserve creation metadata.
    pub fn push(&self, env_path: &Path, passphrase: &str) -> Result<VaultFile, VaultError> {
        if !key::validate_key_format(passphrase) {
            return Err(VaultError::InvalidKey);
        }
        let plaintext =
            fs::read_to_string(env_path).map_err(|e| VaultError::from_io(e, env_path))?;

        let prior = match vault::load(&self.vault_path) {
            Ok(existing) => Some(existing),
            Err(VaultError::FileNotFound(_)) => None,
            Err(other) => return Err(other),
        };

        let mut new_vault =
            vault::encrypt(plaintext.as_bytes(), passphrase, prior.as_ref().map(|v| &v.metadata))?;
        if prior.is_none() {
            new_vault.metadata.created_by = Some(crate::audit::infer_actor().name);
        }
        vault::store(&self.vault_path, &new_vault)?;

        let names: Vec<String> = envfile::parse(&plaintext).keys().cloned().collect();
        self.record(
            AuditAction::VaultPush,
            Target::vault().with_keys(names).with_state_hashes(
                prior.as_ref().map(|v| sha256_hex(&v.encrypted)),
                Some(sha256_hex(&new_vault.encrypted)),
            ),
        );

        tracing::info!(
            vault = %self.vault_path.display(),
            variables = new_vault.metadata.variables,
            "vault pushed"
        );
        Ok(new_vault)
    }

    /// Decrypt the vault over the local env file.
    pub fn pull(&self, env_path: &Path, passphrase: &str) -> Result<EnvMap, VaultError> {
        if !key::validate_key_format(passphrase) {
            return Err(VaultError::InvalidKey);
        }
        let vault_file = vault::load(&self.vault_path)?;
        let plaintext = vault::decrypt(&vault_file, passphrase)?;

        let tmp = env_path.with_extension("env.tmp");
        fs::write(&tmp, plaintext.as_slice()).map_err(|e| VaultError::from_io(e, &tmp))?;
        fs::rename(&tmp, env_path).map_err(|e| VaultError::from_io(e, env_path))?;

        let mapping = envfile::parse(std::str::from_utf8(&plaintext).unwrap_or(""));
        let names: Vec<String> = mapping.keys().cloned().collect();
        self.record(AuditAction::VaultPull, Target::vault().with_keys(names));

        tracing::info!(env = %env_path.display(), "vault pulled");
        Ok(mapping)
    }

    /// Compare the vault contents to the local env file, by key name. A
    /// missing local file compares as empty.
    pub fn diff(&self, env_path: &Path, passphrase: &str) -> Result<VaultDiff, VaultError> {
        if !key::validate_key_format(passphrase) {
            return Err(VaultError::InvalidKey);
        }
        let vault_file = vault::load(&self.vault_path)?;
        let plaintext = vault::decrypt(&vault_file, passphrase)?;
        let vault_map = envfile::parse(std::str::from_utf8(&plaintext).unwrap_or(""));

        let local_map = match fs::read_to_string(env_path) {
            Ok(text) => envfile::parse(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => EnvMap::new(),
            Err(e) => return Err(VaultError::from_io(e, env_path)),
        };

        let mut diff = VaultDiff::default();
        for key in local_map.keys() {
            if !vault_map.contains_key(key) {
                diff.added.push(key.clone());
            }
        }
        for (key, value) in &vault_map {
            match local_map.get(key) {
                None => diff.removed.push(key.clone()),
                Some(local_value) if local_value != value => diff.changed.push(key.clone()),
                Some(_) => {}
            }
        }

        let mut touched: Vec<String> = diff
            .added
            .iter()
            .chain(&diff.removed)
            .chain(&diff.changed)
            .cloned()
            .collect();
        touched.sort();
        self.record(AuditAction::VaultDiff, Target::vault().with_keys(touched));

        Ok(diff)
    }

    /// Union-merge the vault and the local file. The local value wins on
    /// conflict; both sides end up identical.
    pub fn sync(&self, env_path: &Path, passphrase: &str) -> Result<SyncOutcome, VaultError> {
        if !key::validate_key_format(passphrase) {
            return Err(VaultError::InvalidKey);
        }
        let vault_file = vault::load(&self.vault_path)?;
        let plaintext = vault::decrypt(&vault_file, passphrase)?;
        let vault_map = envfile::parse(std::str::from_utf8(&plaintext).unwrap_or(""));

        let local_map = match fs::read_to_string(env_path) {
            Ok(text) => envfile::parse(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => EnvMap::new(),
            Err(e) => return Err(VaultError::from_io(e, env_path)),
        };

        let mut merged = vault_map.clone();
        for (k, v) in &local_map {
            merged.insert(k.clone(), v.clone());
        }

        let outcome = SyncOutcome {
            pulled: vault_map.keys().filter(|k| !local_map.contains_key(*k)).cloned().collect(),
            pushed: local_map.keys().filter(|k| !vault_map.contains_key(*k)).cloned().collect(),
        };

        let serialized = envfile::serialize(&merged);
        let tmp = env_path.with_extension("env.tmp");
        fs::write(&tmp, serialized.as_bytes()).map_err(|e| VaultError::from_io(e, &tmp))?;
        fs::rename(&tmp, env_path).map_err(|e| VaultError::from_io(e, env_path))?;

        let new_vault =
            vault::encrypt(serialized.as_bytes(), passphrase, Some(&vault_file.metadata))?;
        vault::store(&self.vault_path, &new_vault)?;

        let names: Vec<String> = merged.keys().cloned().collect();
        self.record(
            AuditAction::VaultSync,
            Target::vault().with_keys(names).with_state_hashes(
                Some(sha256_hex(&vault_file.encrypted)),
                Some(sha256_hex(&new_vault.encrypted)),
            ),
        );

        tracing::info!(
            pulled = outcome.pulled.len(),
            pushed = outcome.pushed.len(),
            "vault synced"
        );
        Ok(outcome)
    }

    fn record(&self, action: AuditAction, target: Target) {
        if let Err(err) = self.audit.record(action, target) {
            tracing::warn!(error = %err, action = %action, "audit append failed");
        }
    }
}

/// Content fingerprint used to reference vault state without disclosing it.
fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
