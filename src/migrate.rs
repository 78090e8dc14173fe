//! Migration engine: declarative rewrites of an env mapping.
//!
//! Rules run in plan order against the live mapping, so later rules observe
//! the effects of earlier ones; the engine never reorders. Rules whose
//! input keys are absent are skipped, as are rules whose condition
//! evaluates false. Faults from user-supplied functions are collected per
//! rule; they fail the outcome without aborting the run.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;

use std::fs;
use std::path::{Path, PathBuf};

use crate::envfile::{self, EnvMap};
use crate::error::MigrateError;
use crate::schema_diff::{SchemaDiff, SchemaMap};

/// Infix between the target file name and the timestamp in backup names.
pub const BACKUP_INFIX: &str = ".backup-";

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// Value rewrite: old value and full mapping in, new value out.
pub type TransformFn = Box<dyn Fn(&str, &EnvMap) -> Result<String, String>>;
/// One value fans out into several pairs.
pub type SplitFn = Box<dyn Fn(&str, &EnvMap) -> Result<IndexMap<String, String>, String>>;
/// Several values collapse into one; the closure sees the full mapping.
pub type MergeFn = Box<dyn Fn(&EnvMap) -> Result<String, String>>;
/// Predicate deciding whether a rule applies at all.
pub type ConditionFn = Box<dyn Fn(&EnvMap) -> bool>;
/// Lazily produced default for an added key.
pub type ProducerFn = Box<dyn Fn() -> String>;

pub enum DefaultValue {
    Value(String),
    Producer(ProducerFn),
}

impl DefaultValue {
    fn resolve(&self) -> String {
        match self {
            Self::Value(v) => v.clone(),
            Self::Producer(f) => f(),
        }
    }
}

/// The rule variants. The tag selects which payload fields are meaningful.
pub enum RuleAction {
    Rename { from: String, to: String },
    Transform { key: String, apply: TransformFn },
    Split { from: String, to: Vec<String>, apply: SplitFn },
    Merge { from: Vec<String>, to: String, apply: MergeFn },
    Delete { key: String },
    Add { key: String, default: DefaultValue },
}

impl RuleAction {
    pub fn kind(&self) -> ChangeKind {
        match self {
            Self::Rename { .. } => ChangeKind::Rename,
            Self::Transform { .. } => ChangeKind::Transform,
            Self::Split { .. } => ChangeKind::Split,
            Self::Merge { .. } => ChangeKind::Merge,
            Self::Delete { .. } => ChangeKind::Delete,
            Self::Add { .. } => ChangeKind::Add,
        }
    }
}

pub struct MigrationRule {
    pub id: String,
    pub description: String,
    pub breaking: bool,
    /// When present and false for the current mapping, the rule is skipped
    /// without being recorded as an error.
    pub condition: Option<ConditionFn>,
    pub action: RuleAction,
}

impl MigrationRule {
    pub fn new(id: impl Into<String>, description: impl Into<String>, action: RuleAction) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            breaking: false,
            condition: None,
            action,
        }
    }

    pub fn breaking(mut self) -> Self {
        self.breaking = true;
        self
    }

    pub fn when(mut self, condition: ConditionFn) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn rename(id: impl Into<String>, from: impl Into<String>, to: impl Into<String>) -> Self {
        let (from, to) = (from.into(), to.into());
        let description = format!("Rename {} to {}", from, to);
        Self::new(id, description, RuleAction::Rename { from, to })
    }

    pub fn delete(id: impl Into<String>, key: impl Into<String>) -> Self {
        let key = key.into();
        let description = format!("Delete {}", key);
        Self::new(id, description, RuleAction::Delete { key })
    }

    pub fn add(id: impl Into<String>, key: impl Into<String>, default: impl Into<String>) -> Self {
        let key = key.into();
        let description = format!("Add {}", key);
        Self::new(id, description, RuleAction::Add { key, default: DefaultValue::Value(default.into()) })
    }
}

pub struct MigrationPlan {
    pub id: String,
    pub from_version: String,
    pub to_version: String,
    pub created_at: DateTime<Utc>,
    pub rules: Vec<MigrationRule>,
}

impl MigrationPlan {
    pub fn new(
        id: impl Into<String>,
        from_version: impl Into<String>,
        to_version: impl Into<String>,
        rules: Vec<MigrationRule>,
    ) -> Self {
        Self {
            id: id.into(),
            from_version: from_version.into(),
            to_version: to_version.into(),
            created_at: Utc::now(),
            rules,
        }
    }

    /// True when any rule is flagged breaking.
    pub fn has_breaking_changes(&self) -> bool {
        self.rules.iter().any(|r| r.breaking)
    }

    /// On-disk description of the plan. Rules carrying closures serialize
    /// by id and kind only; functions do not cross process boundaries.
    pub fn manifest(&self) -> PlanManifest {
        PlanManifest {
            id: self.id.clone(),
            from_version: self.from_version.clone(),
            to_version: self.to_version.clone(),
            created_at: self.created_at,
            has_breaking_changes: self.has_breaking_changes(),
            rules: self
                .rules
                .iter()
                .map(|r| RuleManifest {
                    id: r.id.clone(),
                    kind: r.action.kind(),
                    description: r.description.clone(),
                    breaking: r.breaking,
                })
                .collect(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanManifest {
    pub id: String,
    pub from_version: String,
    pub to_version: String,
    pub created_at: DateTime<Utc>,
    pub has_breaking_changes: bool,
    pub rules: Vec<RuleManifest>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleManifest {
    pub id: String,
    pub kind: ChangeKind,
    pub description: String,
    pub breaking: bool,
}

// ---------------------------------------------------------------------------
// Outcome records
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Rename,
    Transform,
    Split,
    Merge,
    Delete,
    Add,
}

/// What one applied rule did, as before/after pair dicts.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRecord {
    pub rule_id: String,
    pub kind: ChangeKind,
    pub before: IndexMap<String, String>,
    pub after: IndexMap<String, String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleFault {
    pub rule_id: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationOutcome {
    pub success: bool,
    pub applied: usize,
    pub skipped: usize,
    pub changes: Vec<ChangeRecord>,
    pub errors: Vec<RuleFault>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_path: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// Run a plan against a mapping in place.
pub fn run(plan: &MigrationPlan, mapping: &mut EnvMap) -> MigrationOutcome {
    let mut outcome = MigrationOutcome {
        success: true,
        applied: 0,
        skipped: 0,
        changes: Vec::new(),
        errors: Vec::new(),
        backup_path: None,
    };

    for rule in &plan.rules {
        if let Some(condition) = &rule.condition {
            if !condition(mapping) {
                outcome.skipped += 1;
                continue;
            }
        }
        match apply_rule(rule, mapping) {
            RuleResult::Applied(change) => {
                outcome.applied += 1;
                outcome.changes.push(change);
            }
            RuleResult::Skipped => outcome.skipped += 1,
            RuleResult::Fault(message) => {
                outcome.success = false;
                outcome.errors.push(RuleFault { rule_id: rule.id.clone(), message });
            }
        }
    }

    outcome
}

/// Evaluate a plan against a copy of the mapping. The input is untouched;
/// the outcome matches what [`run`] would report.
pub fn preview(plan: &MigrationPlan, mapping: &EnvMap) -> MigrationOutcome {
    let mut copy = mapping.clone();
    run(plan, &mut copy)
}

enum RuleResult {
    Applied(ChangeRecord),
    Skipped,
    Fault(String),
}

fn apply_rule(rule: &MigrationRule, mapping: &mut EnvMap) -> RuleResult {
    let record = |before: IndexMap<String, String>, after: IndexMap<String, String>| {
        ChangeRecord { rule_id: rule.id.clone(), kind: rule.action.kind(), before, after }
    };

    match &rule.action {
        RuleAction::Rename { from, to } => {
            let Some(value) = mapping.shift_remove(from) else {
                return RuleResult::Skipped;
            };
            mapping.insert(to.clone(), value.clone());
            RuleResult::Applied(record(
                IndexMap::from([(from.clone(), value.clone())]),
                IndexMap::from([(to.clone(), value)]),
            ))
        }
        RuleAction::Transform { key, apply } => {
            let Some(old) = mapping.get(key).cloned() else {
                return RuleResult::Skipped;
            };
            match apply(&old, mapping) {
                Ok(new) => {
                    mapping.insert(key.clone(), new.clone());
                    RuleResult::Applied(record(
                        IndexMap::from([(key.clone(), old)]),
                        IndexMap::from([(key.clone(), new)]),
                    ))
                }
                Err(message) => RuleResult::Fault(message),
            }
        }
        RuleAction::Split { from, to: _, apply } => {
            let Some(value) = mapping.get(from).cloned() else {
                return RuleResult::Skipped;
            };
            match apply(&value, mapping) {
                Ok(parts) => {
                    for (k, v) in &parts {
                        mapping.insert(k.clone(), v.clone());
                    }
                    mapping.shift_remove(from);
                    RuleResult::Applied(record(IndexMap::from([(from.clone(), value)]), parts))
                }
                Err(message) => RuleResult::Fault(message),
            }
        }
        RuleAction::Merge { from, to, apply } => {
            if !from.iter().all(|k| mapping.contains_key(k)) {
                return RuleResult::Skipped;
            }
            let before: IndexMap<String, String> = from
                .iter()
                .filter_map(|k| mapping.get(k).map(|v| (k.clone(), v.clone())))
                .collect();
            match apply(mapping) {
                Ok(merged) => {
                    mapping.insert(to.clone(), merged.clone());
                    for k in from {
                        mapping.shift_remove(k);
                    }
                    RuleResult::Applied(record(before, IndexMap::from([(to.clone(), merged)])))
                }
                Err(message) => RuleResult::Fault(message),
            }
        }
        RuleAction::Delete { key } => {
            let Some(value) = mapping.shift_remove(key) else {
                return RuleResult::Skipped;
            };
            RuleResult::Applied(record(IndexMap::from([(key.clone(), value)]), IndexMap::new()))
        }
        RuleAction::Add { key, default } => {
            if mapping.contains_key(key) {
                return RuleResult::Skipped;
            }
            let value = default.resolve();
            mapping.insert(key.clone(), value.clone());
            RuleResult::Applied(record(IndexMap::new(), IndexMap::from([(key.clone(), value)])))
        }
    }
}

// ---------------------------------------------------------------------------
// File application and rollback
// ---------------------------------------------------------------------------

pub struct ApplyOptions {
    /// Write a timestamped sibling backup before rewriting. Default true.
    pub backup: bool,
    /// Behave as preview: report, touch nothing. Default false.
    pub dry_run: bool,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self { backup: true, dry_run: false }
    }
}

/// Apply a plan to an env file on disk.
pub fn apply_file(
    plan: &MigrationPlan,
    path: &Path,
    options: &ApplyOptions,
) -> Result<MigrationOutcome, MigrateError> {
    let text = fs::read_to_string(path).map_err(|e| map_io(e, path))?;
    let mut mapping = envfile::parse(&text);

    if options.dry_run {
        return Ok(preview(plan, &mapping));
    }

    let mut outcome = run(plan, &mut mapping);

    if options.backup {
        let backup = backup_path(path, Utc::now());
        fs::copy(path, &backup).map_err(|e| MigrateError::Io(e.to_string()))?;
        outcome.backup_path = Some(backup);
    }

    let serialized = envfile::serialize(&mapping);
    let tmp = path.with_extension("env.tmp");
    fs::write(&tmp, serialized.as_bytes()).map_err(|e| MigrateError::Io(e.to_string()))?;
    fs::rename(&tmp, path).map_err(|e| MigrateError::Io(e.to_string()))?;

    tracing::info!(
        plan = %plan.id,
        applied = outcome.applied,
        skipped = outcome.skipped,
        "migration applied"
    );
    Ok(outcome)
}

/// Copy a backup over its target. The target is inferred by stripping the
/// backup suffix unless given explicitly. No attempt is made to verify the
/// backup corresponds to any particular plan.
pub fn rollback(backup: &Path, target: Option<&Path>) -> Result<PathBuf, MigrateError> {
    let target = match target {
        Some(t) => t.to_path_buf(),
        None => infer_rollback_target(backup)?,
    };
    if !backup.exists() {
        return Err(MigrateError::FileNotFound(backup.to_path_buf()));
    }
    fs::copy(backup, &target).map_err(|e| MigrateError::Io(e.to_string()))?;
    tracing::info!(target = %target.display(), "migration rolled back");
    Ok(target)
}

fn backup_path(path: &Path, at: DateTime<Utc>) -> PathBuf {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("env");
    let stamp = at.format("%Y%m%dT%H%M%S%3fZ");
    path.with_file_name(format!("{}{}{}", name, BACKUP_INFIX, stamp))
}

fn infer_rollback_target(backup: &Path) -> Result<PathBuf, MigrateError> {
    let name = backup
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| MigrateError::UnrecognizedBackupName(backup.to_path_buf()))?;
    let Some(idx) = name.rfind(BACKUP_INFIX) else {
        return Err(MigrateError::UnrecognizedBackupName(backup.to_path_buf()));
    };
    Ok(backup.with_file_name(&name[..idx]))
}

fn map_io(err: std::io::Error, path: &Path) -> MigrateError {
    if err.kind() == std::io::ErrorKind::NotFound {
        MigrateError::FileNotFound(path.to_path_buf())
    } else {
        MigrateError::Io(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Plan derivation from a schema diff
// ---------------------------------------------------------------------------

/// Build a plan out of a schema diff: renames first, then deletions for
/// removed keys (breaking), then additions for new keys (non-breaking).
/// `defaults` supplies values for additions; absent keys default to empty.
pub fn plan_from_diff(
    id: impl Into<String>,
    from_version: impl Into<String>,
    to_version: impl Into<String>,
    diff: &SchemaDiff,
    defaults: &IndexMap<String, String>,
) -> MigrationPlan {
    let mut rules = Vec::new();

    for rename in &diff.renamed {
        rules.push(MigrationRule::rename(
            format!("rename-{}", rename.from.to_lowercase()),
            rename.from.clone(),
            rename.to.clone(),
        ));
    }
    for removed in &diff.removed {
        rules.push(
            MigrationRule::delete(format!("delete-{}", removed.key.to_lowercase()), removed.key.clone())
                .breaking(),
        );
    }
    for added in &diff.added {
        let default = defaults.get(&added.key).cloned().unwrap_or_default();
        rules.push(MigrationRule::add(
            format!("add-{}", added.key.to_lowercase()),
            added.key.clone(),
            default,
        ));
    }

    MigrationPlan::new(id, from_version, to_version, rules)
}

/// Build a plan directly from two schemas with an explicit rename map.
/// Rename entries apply only when the source key exists on the old side
/// and the target on the new side; remaining old-only keys become breaking
/// deletions, remaining new-only keys become additions.
pub fn plan_from_schemas(
    id: impl Into<String>,
    from_version: impl Into<String>,
    to_version: impl Into<String>,
    old: &SchemaMap,
    new: &SchemaMap,
    renames: Option<&IndexMap<String, String>>,
    defaults: &IndexMap<String, String>,
) -> MigrationPlan {
    let mut rules = Vec::new();
    let mut renamed_from: Vec<&str> = Vec::new();
    let mut renamed_to: Vec<&str> = Vec::new();

    if let Some(map) = renames {
        for (from, to) in map {
            if old.contains_key(from) && new.contains_key(to) {
                rules.push(MigrationRule::rename(
                    format!("rename-{}", from.to_lowercase()),
                    from.clone(),
                    to.clone(),
                ));
                renamed_from.push(from.as_str());
                renamed_to.push(to.as_str());
            }
        }
    }

    for key in old.keys() {
        if !new.contains_key(key) && !renamed_from.contains(&key.as_str()) {
            rules.push(
                MigrationRule::delete(format!("delete-{}", key.to_lowercase()), key.clone())
                    .breaking(),
            );
        }
    }
    for key in new.keys() {
        if !old.contains_key(key) && !renamed_to.contains(&key.as_str()) {
            let default = defaults.get(key).cloned().unwrap_or_default();
            rules.push(MigrationRule::add(format!("add-{}", key.to_lowercase()), key.clone(), default));
        }
    }

    MigrationPlan::new(id, from_version, to_version, rules)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
