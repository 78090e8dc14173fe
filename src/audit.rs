//! Audit chain: append-only, hash-linked log of vault operations.
//!
//! Storage is newline-delimited JSON, one entry per line. Each entry's
//! `hash` is SHA-256 over its canonical JSON form (stable field order,
//! `hash` excluded, `previousHash` omitted entirely for the first entry),
//! and each entry's `previousHash` must equal the prior entry's `hash`.
//! Verifiers replay the log offline; no passphrase is needed.
//!
//! The log never stores secret values. `target.secretKeys` holds key names
//! only; before/after hashes are content fingerprints, not content.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::AuditError;

/// Conventional audit log file name.
pub const AUDIT_FILE: &str = ".nevr-env.audit.log";

// ---------------------------------------------------------------------------
// Entry vocabulary
// ---------------------------------------------------------------------------

/// What happened. Closed set; unknown tags are rejected on load.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AuditAction {
    #[serde(rename = "vault.push")]
    VaultPush,
    #[serde(rename = "vault.pull")]
    VaultPull,
    #[serde(rename = "vault.sync")]
    VaultSync,
    #[serde(rename = "vault.diff")]
    VaultDiff,
    #[serde(rename = "secret.add")]
    SecretAdd,
    #[serde(rename = "secret.update")]
    SecretUpdate,
    #[serde(rename = "secret.remove")]
    SecretRemove,
    #[serde(rename = "secret.rotate")]
    SecretRotate,
    #[serde(rename = "key.generate")]
    KeyGenerate,
    #[serde(rename = "key.rotate")]
    KeyRotate,
    #[serde(rename = "access.granted")]
    AccessGranted,
    #[serde(rename = "access.denied")]
    AccessDenied,
    #[serde(rename = "config.change")]
    ConfigChange,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VaultPush => "vault.push",
            Self::VaultPull => "vault.pull",
            Self::VaultSync => "vault.sync",
            Self::VaultDiff => "vault.diff",
            Self::SecretAdd => "secret.add",
            Self::SecretUpdate => "secret.update",
            Self::SecretRemove => "secret.remove",
            Self::SecretRotate => "secret.rotate",
            Self::KeyGenerate => "key.generate",
            Self::KeyRotate => "key.rotate",
            Self::AccessGranted => "access.granted",
            Self::AccessDenied => "access.denied",
            Self::ConfigChange => "config.change",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who or what triggered the operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorType {
    User,
    Service,
    Ci,
    Unknown,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ActorType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    Vault,
    Secret,
    Key,
    Config,
}

/// What the operation touched. Key *names* only, never values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    #[serde(rename = "type")]
    pub kind: TargetType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_keys: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_hash: Option<String>,
}

impl Target {
    pub fn vault() -> Self {
        Self { kind: TargetType::Vault, secret_keys: Some(Vec::new()), before_hash: None, after_hash: None }
    }

    pub fn secret(keys: Vec<String>) -> Self {
        Self { kind: TargetType::Secret, secret_keys: Some(keys), before_hash: None, after_hash: None }
    }

    pub fn key() -> Self {
        Self { kind: TargetType::Key, secret_keys: None, before_hash: None, after_hash: None }
    }

    pub fn with_keys(mut self, keys: Vec<String>) -> Self {
        self.secret_keys = Some(keys);
        self
    }

    pub fn with_state_hashes(mut self, before: Option<String>, after: Option<String>) -> Self {
        self.before_hash = before;
        self.after_hash = after;
        self
    }
}

/// Where the operation ran. Every field is looked up, never fabricated.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ci_run_id: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

// ---------------------------------------------------------------------------
// Entry and hashing
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub action: AuditAction,
    pub actor: Actor,
    pub target: Target,
    pub context: AuditContext,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_hash: Option<String>,
    pub hash: String,
}

/// Canonical form: the entry minus `hash`, fields in declaration order,
/// `previousHash` omitted when absent.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CanonicalEntry<'a> {
    id: &'a str,
    timestamp: &'a DateTime<Utc>,
    action: &'a AuditAction,
    actor: &'a Actor,
    target: &'a Target,
    context: &'a AuditContext,
    #[serde(skip_serializing_if = "Option::is_none")]
    previous_hash: Option<&'a String>,
}

/// SHA-256 over the canonical JSON encoding of an entry.
pub fn entry_hash(entry: &AuditEntry) -> String {
    let canonical = CanonicalEntry {
        id: &entry.id,
        timestamp: &entry.timestamp,
        action: &entry.action,
        actor: &entry.actor,
        target: &entry.target,
        context: &entry.context,
        previous_hash: entry.previous_hash.as_ref(),
    };
    // Serialization of these field types cannot fail.
    let json = serde_json::to_string(&canonical).expect("canonical entry serializes");
    hex::encode(Sha256::digest(json.as_bytes()))
}

fn new_entry_id(timestamp: DateTime<Utc>) -> String {
    let mut suffix = [0u8; 4];
    // Zero suffix on RNG failure keeps ids sortable; uniqueness comes from
    // the millisecond prefix in that case.
    let _ = getrandom::getrandom(&mut suffix);
    format!("{:013}-{}", timestamp.timestamp_millis(), hex::encode(suffix))
}

// ---------------------------------------------------------------------------
// Actor and context inference
// ---------------------------------------------------------------------------

/// CI marker variable paired with that platform's actor variable.
const CI_MARKERS: &[(&str, &str)] = &[
    ("GITHUB_ACTIONS", "GITHUB_ACTOR"),
    ("GITLAB_CI", "GITLAB_USER_LOGIN"),
    ("CIRCLECI", "CIRCLE_USERNAME"),
    ("BUILDKITE", "BUILDKITE_BUILD_CREATOR"),
    ("CI", "CI_ACTOR"),
];

const USER_VARS: &[&str] = &["USER", "USERNAME", "LOGNAME"];
const HOST_VARS: &[&str] = &["HOSTNAME", "COMPUTERNAME"];

const ENVIRONMENT_VARS: &[&str] = &["NEVR_ENVIRONMENT", "NODE_ENV", "APP_ENV", "ENVIRONMENT"];
const BRANCH_VARS: &[&str] = &["GITHUB_REF_NAME", "CI_COMMIT_BRANCH", "CIRCLE_BRANCH", "BUILDKITE_BRANCH", "GIT_BRANCH"];
const COMMIT_VARS: &[&str] = &["GITHUB_SHA", "CI_COMMIT_SHA", "CIRCLE_SHA1", "BUILDKITE_COMMIT", "GIT_COMMIT"];
const CI_RUN_VARS: &[&str] = &["GITHUB_RUN_ID", "CI_PIPELINE_ID", "CIRCLE_BUILD_NUM", "BUILDKITE_BUILD_NUMBER"];

fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Infer the acting identity from the process environment.
pub fn infer_actor() -> Actor {
    infer_actor_from(env_lookup)
}

fn infer_actor_from(get: impl Fn(&str) -> Option<String>) -> Actor {
    let machine = HOST_VARS.iter().find_map(|v| get(v));

    for (marker, actor_var) in CI_MARKERS {
        if get(marker).is_some() {
            let name = get(actor_var).unwrap_or_else(|| "ci".to_string());
            return Actor { name, kind: ActorType::Ci, email: None, machine, ip: None };
        }
    }

    match USER_VARS.iter().find_map(|v| get(v)) {
        Some(name) => Actor { name, kind: ActorType::User, email: None, machine, ip: None },
        None => Actor {
            name: "unknown".to_string(),
            kind: ActorType::Unknown,
            email: None,
            machine,
            ip: None,
        },
    }
}

/// Infer environment/branch/commit/run-id from platform-conventional
/// indicators. Absent indicators are omitted, never fabricated.
pub fn infer_context() -> AuditContext {
    infer_context_from(env_lookup)
}

fn infer_context_from(get: impl Fn(&str) -> Option<String>) -> AuditContext {
    AuditContext {
        environment: ENVIRONMENT_VARS.iter().find_map(|v| get(v)),
        branch: BRANCH_VARS.iter().find_map(|v| get(v)),
        commit: COMMIT_VARS.iter().find_map(|v| get(v)),
        ci_run_id: CI_RUN_VARS.iter().find_map(|v| get(v)),
        metadata: BTreeMap::new(),
    }
}

// ---------------------------------------------------------------------------
// Verification result
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChainErrorKind {
    /// Stored hash does not match the recomputed content hash.
    HashMismatch,
    /// Stored previousHash does not match the prior entry's hash.
    BrokenLink,
}

#[derive(Clone, Debug)]
pub struct ChainError {
    pub index: usize,
    pub kind: ChainErrorKind,
    pub message: String,
}

#[derive(Clone, Debug)]
pub struct ChainVerification {
    pub valid: bool,
    pub entries: usize,
    pub errors: Vec<ChainError>,
}

// ---------------------------------------------------------------------------
// Queries, summaries, export
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct AuditQuery {
    /// Match any of these actions; empty means all.
    pub actions: Vec<AuditAction>,
    /// Case-insensitive substring of the actor name.
    pub actor_contains: Option<String>,
    /// Entries whose target key list contains this key name.
    pub secret_key: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    /// Keep only the last N surviving entries.
    pub limit: Option<usize>,
}

impl AuditQuery {
    fn matches(&self, entry: &AuditEntry) -> bool {
        if !self.actions.is_empty() && !self.actions.contains(&entry.action) {
            return false;
        }
        if let Some(needle) = &self.actor_contains {
            if !entry.actor.name.to_lowercase().contains(&needle.to_lowercase()) {
                return false;
            }
        }
        if let Some(key) = &self.secret_key {
            let held = entry
                .target
                .secret_keys
                .as_ref()
                .is_some_and(|keys| keys.iter().any(|k| k == key));
            if !held {
                return false;
            }
        }
        if let Some(from) = self.from {
            if entry.timestamp < from {
                return false;
            }
        }
        if let Some(until) = self.until {
            if entry.timestamp > until {
                return false;
            }
        }
        true
    }
}

#[derive(Clone, Debug, Default)]
pub struct AuditSummary {
    pub entries: usize,
    pub by_action: BTreeMap<String, usize>,
    pub by_actor: BTreeMap<String, usize>,
    /// Union of every key name the log has touched.
    pub secret_keys: BTreeSet<String>,
    pub first: Option<DateTime<Utc>>,
    pub last: Option<DateTime<Utc>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
    Text,
}

// ---------------------------------------------------------------------------
// The log
// ---------------------------------------------------------------------------

/// Handle to an on-disk audit log. Single writer per process assumed;
/// concurrent writers are outside the contract.
pub struct AuditLog {
    path: PathBuf,
}

/// A not-yet-chained entry. Actor and context default to inference when
/// left unset.
pub struct EntryDraft {
    pub action: AuditAction,
    pub target: Target,
    pub actor: Option<Actor>,
    pub context: Option<AuditContext>,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load every entry. A missing or malformed file yields an empty log:
    /// the log is informational and commit-able, and a corrupted line must
    /// never block an unrelated vault operation.
    pub fn load(&self) -> Vec<AuditEntry> {
        let Ok(data) = fs::read_to_string(&self.path) else {
            return Vec::new();
        };
        let mut entries = Vec::new();
        for line in data.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<AuditEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(err) => {
                    tracing::warn!(error = %err, "malformed audit line; treating log as reset");
                    return Vec::new();
                }
            }
        }
        entries
    }

    /// Append an entry for `action` with inferred actor and context.
    pub fn record(&self, action: AuditAction, target: Target) -> Result<AuditEntry, AuditError> {
        self.append(EntryDraft { action, target, actor: None, context: None })
    }

    /// Chain and append a draft: link to the current last entry, stamp the
    /// content hash, write one line.
    pub fn append(&self, draft: EntryDraft) -> Result<AuditEntry, AuditError> {
        let previous_hash = self.load().last().map(|e| e.hash.clone());

        let timestamp = Utc::now();
        let mut entry = AuditEntry {
            id: new_entry_id(timestamp),
            timestamp,
            action: draft.action,
            actor: draft.actor.unwrap_or_else(infer_actor),
            target: draft.target,
            context: draft.context.unwrap_or_else(infer_context),
            previous_hash,
            hash: String::new(),
        };
        entry.hash = entry_hash(&entry);

        let line = serde_json::to_string(&entry).map_err(|e| AuditError::Serialize(e.to_string()))?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| AuditError::Io(e.to_string()))?;
        writeln!(file, "{}", line).map_err(|e| AuditError::Io(e.to_string()))?;

        tracing::debug!(action = %entry.action, id = %entry.id, "audit entry appended");
        Ok(entry)
    }

    /// Recompute every hash and link offline. O(n); needs no passphrase.
    ///
    /// The link check compares each stored `previousHash` to the
    /// *recomputed* hash of the prior entry, so editing an entry breaks
    /// both its own hash and the next entry's link.
    pub fn verify(&self) -> ChainVerification {
        let entries = self.load();
        let mut errors = Vec::new();
        let mut prior_recomputed: Option<String> = None;

        for (index, entry) in entries.iter().enumerate() {
            let recomputed = entry_hash(entry);
            if recomputed != entry.hash {
                errors.push(ChainError {
                    index,
                    kind: ChainErrorKind::HashMismatch,
                    message: format!("entry {} content hash mismatch", index),
                });
            }
            // The first entry's previousHash is not checked: a rotated tail
            // legitimately starts with a link into its archive.
            if index > 0 && entry.previous_hash != prior_recomputed {
                errors.push(ChainError {
                    index,
                    kind: ChainErrorKind::BrokenLink,
                    message: format!("entry {} does not link to entry {}", index, index - 1),
                });
            }
            prior_recomputed = Some(recomputed);
        }

        ChainVerification { valid: errors.is_empty(), entries: entries.len(), errors }
    }

    pub fn query(&self, query: &AuditQuery) -> Vec<AuditEntry> {
        let mut hits: Vec<AuditEntry> =
            self.load().into_iter().filter(|e| query.matches(e)).collect();
        if let Some(limit) = query.limit {
            if hits.len() > limit {
                hits.drain(..hits.len() - limit);
            }
        }
        hits
    }

    pub fn summary(&self) -> AuditSummary {
        let entries = self.load();
        let mut summary = AuditSummary { entries: entries.len(), ..Default::default() };
        for entry in &entries {
            *summary.by_action.entry(entry.action.as_str().to_string()).or_default() += 1;
            *summary.by_actor.entry(entry.actor.name.clone()).or_default() += 1;
            if let Some(keys) = &entry.target.secret_keys {
                summary.secret_keys.extend(keys.iter().cloned());
            }
        }
        summary.first = entries.first().map(|e| e.timestamp);
        summary.last = entries.last().map(|e| e.timestamp);
        summary
    }

    /// Split the log: the head moves to `archive`, the main file keeps the
    /// last `keep` lines. Lines move verbatim, so the tail remains a valid
    /// chain on its own; no re-linking across the split is attempted.
    /// Returns the number of archived entries.
    pub fn rotate(&self, keep: usize, archive: &Path) -> Result<usize, AuditError> {
        let data = fs::read_to_string(&self.path).map_err(|e| AuditError::Io(e.to_string()))?;
        let lines: Vec<&str> = data.lines().filter(|l| !l.trim().is_empty()).collect();
        if lines.len() <= keep {
            return Ok(0);
        }

        let split = lines.len() - keep;
        let mut head: String = lines[..split].join("\n");
        head.push('\n');
        let mut tail: String = lines[split..].join("\n");
        tail.push('\n');

        fs::write(archive, head).map_err(|e| AuditError::Io(e.to_string()))?;
        let tmp = self.path.with_extension("log.tmp");
        fs::write(&tmp, tail).map_err(|e| AuditError::Io(e.to_string()))?;
        fs::rename(&tmp, &self.path).map_err(|e| AuditError::Io(e.to_string()))?;

        tracing::info!(archived = split, kept = keep, "audit log rotated");
        Ok(split)
    }

    /// Render the whole log in the given format. Best-effort and
    /// human-oriented; the NDJSON file remains the source of truth.
    pub fn export(&self, format: ExportFormat) -> String {
        let entries = self.load();
        match format {
            ExportFormat::Json => {
                serde_json::to_string_pretty(&entries).unwrap_or_else(|_| "[]".to_string())
            }
            ExportFormat::Csv => export_csv(&entries),
            ExportFormat::Text => export_text(&entries),
        }
    }
}

const CSV_HEADER: &str = "id,timestamp,action,actorName,actorType,targetType,secretKeys,previousHash,hash";

fn export_csv(entries: &[AuditEntry]) -> String {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');
    for e in entries {
        let keys = e
            .target
            .secret_keys
            .as_deref()
            .map(|k| k.join(";"))
            .unwrap_or_default();
        let fields = [
            e.id.clone(),
            e.timestamp.to_rfc3339(),
            e.action.as_str().to_string(),
            e.actor.name.clone(),
            format!("{:?}", e.actor.kind).to_lowercase(),
            format!("{:?}", e.target.kind).to_lowercase(),
            keys,
            e.previous_hash.clone().unwrap_or_default(),
            e.hash.clone(),
        ];
        let row: Vec<String> = fields.iter().map(|f| csv_escape(f)).collect();
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}

/// RFC 4180: quote fields containing separators, double embedded quotes.
fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn export_text(entries: &[AuditEntry]) -> String {
    let mut out = String::new();
    for e in entries {
        let keys = e
            .target
            .secret_keys
            .as_deref()
            .map(|k| k.join(", "))
            .unwrap_or_default();
        out.push_str(&format!(
            "{} {} by {} ({:?}) target={:?} keys=[{}]\n",
            e.timestamp.format("%Y-%m-%dT%H:%M:%SZ"),
            e.action,
            e.actor.name,
            e.actor.kind,
            e.target.kind,
            keys,
        ));
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn ci_actor_wins_over_user() {
        let actor = infer_actor_from(lookup(&[
            ("GITHUB_ACTIONS", "true"),
            ("GITHUB_ACTOR", "octocat"),
            ("USER", "alice"),
            ("HOSTNAME", "runner-1"),
        ]));
        assert_eq!(actor.kind, ActorType::Ci);
        assert_eq!(actor.name, "octocat");
        assert_eq!(actor.machine.as_deref(), Some("runner-1"));
    }

    #[test]
    fn falls_back_to_os_user() {
        let actor = infer_actor_from(lookup(&[("USER", "alice")]));
        assert_eq!(actor.kind, ActorType::User);
        assert_eq!(actor.name, "alice");
    }

    #[test]
    fn unknown_actor_when_nothing_set() {
        let actor = infer_actor_from(lookup(&[]));
        assert_eq!(actor.kind, ActorType::Unknown);
        assert_eq!(actor.name, "unknown");
    }

    #[test]
    fn context_indicators_in_order() {
        let ctx = infer_context_from(lookup(&[
            ("GITHUB_REF_NAME", "main"),
            ("GITHUB_SHA", "abc123"),
            ("GITHUB_RUN_ID", "42"),
            ("NODE_ENV", "production"),
        ]));
        assert_eq!(ctx.environment.as_deref(), Some("production"));
        assert_eq!(ctx.branch.as_deref(), Some("main"));
        assert_eq!(ctx.commit.as_deref(), Some("abc123"));
        assert_eq!(ctx.ci_run_id.as_deref(), Some("42"));
    }

    #[test]
    fn nothing_is_fabricated() {
        let ctx = infer_context_from(lookup(&[]));
        assert_eq!(ctx, AuditContext::default());
    }

    #[test]
    fn first_entry_canonical_form_omits_previous_hash() {
        let entry = AuditEntry {
            id: "0000000000001-deadbeef".into(),
            timestamp: Utc::now(),
            action: AuditAction::VaultPush,
            actor: Actor {
                name: "alice".into(),
                kind: ActorType::User,
                email: None,
                machine: None,
                ip: None,
            },
            target: Target::vault(),
            context: AuditContext::default(),
            previous_hash: None,
            hash: String::new(),
        };
        let line = serde_json::to_string(&entry).unwrap();
        assert!(!line.contains("previousHash"));
        assert!(line.contains("\"action\":\"vault.push\""));
    }

    #[test]
    fn entry_hash_is_stable_and_excludes_hash_field() {
        let mut entry = AuditEntry {
            id: "0000000000001-deadbeef".into(),
            timestamp: Utc::now(),
            action: AuditAction::SecretRotate,
            actor: Actor {
                name: "ci".into(),
                kind: ActorType::Ci,
                email: None,
                machine: None,
                ip: None,
            },
            target: Target::secret(vec!["API_KEY".into()]),
            context: AuditContext::default(),
            previous_hash: Some("aa".into()),
            hash: String::new(),
        };
        let h1 = entry_hash(&entry);
        entry.hash = h1.clone();
        // Stamping the hash does not change the canonical form.
        assert_eq!(entry_hash(&entry), h1);
    }

    #[test]
    fn unknown_action_tag_rejected() {
        let err = serde_json::from_str::<AuditAction>("\"vault.explode\"");
        assert!(err.is_err());
    }

    #[test]
    fn entry_ids_sort_by_time() {
        let early = new_entry_id(Utc::now());
        std::thread::sleep(std::time::Duration::from_millis(2));
        let late = new_entry_id(Utc::now());
        assert!(early < late);
    }
}
