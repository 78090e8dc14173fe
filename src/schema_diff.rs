//! Schema diff: structural comparison of two keyed schemas.
//!
//! Each side is a mapping from variable name to a schema node. Nodes are
//! reduced to flat type descriptors (wrapper layers unwrapped, flags merged
//! upward), then compared key by key. Changes are classified breaking or
//! non-breaking; near-identical removed/added name pairs are folded into
//! renames by Levenshtein similarity.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use std::fmt;

// ---------------------------------------------------------------------------
// Schema nodes and type descriptors
// ---------------------------------------------------------------------------

/// A validation schema node. Wrapper variants nest; base variants terminate.
#[derive(Clone, Debug, PartialEq)]
pub enum SchemaNode {
    String { format: Option<ValueFormat> },
    Number { min: Option<f64>, max: Option<f64>, integer: bool },
    Boolean,
    Enum { values: Vec<String> },
    Literal { value: String },
    Unknown,
    /// The wrapped value may be absent.
    Optional(Box<SchemaNode>),
    /// The wrapped value has a default.
    WithDefault(Box<SchemaNode>),
}

impl SchemaNode {
    pub fn string() -> Self {
        Self::String { format: None }
    }

    pub fn string_with(format: ValueFormat) -> Self {
        Self::String { format: Some(format) }
    }

    pub fn number() -> Self {
        Self::Number { min: None, max: None, integer: false }
    }

    pub fn integer() -> Self {
        Self::Number { min: None, max: None, integer: true }
    }

    pub fn number_range(min: Option<f64>, max: Option<f64>) -> Self {
        Self::Number { min, max, integer: false }
    }

    pub fn enumeration(values: &[&str]) -> Self {
        Self::Enum { values: values.iter().map(|v| v.to_string()).collect() }
    }

    pub fn optional(self) -> Self {
        Self::Optional(Box::new(self))
    }

    pub fn with_default(self) -> Self {
        Self::WithDefault(Box::new(self))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaseType {
    String,
    Number,
    Boolean,
    Enum,
    Literal,
    Unknown,
}

impl fmt::Display for BaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => write!(f, "string"),
            Self::Number => write!(f, "number"),
            Self::Boolean => write!(f, "boolean"),
            Self::Enum => write!(f, "enum"),
            Self::Literal => write!(f, "literal"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueFormat {
    Url,
    Email,
    Uuid,
    Integer,
}

impl fmt::Display for ValueFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url => write!(f, "url"),
            Self::Email => write!(f, "email"),
            Self::Uuid => write!(f, "uuid"),
            Self::Integer => write!(f, "integer"),
        }
    }
}

/// Flat structural record extracted from a schema node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeDescriptor {
    #[serde(rename = "type")]
    pub base: BaseType,
    pub optional: bool,
    pub has_default: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<ValueFormat>,
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base)?;
        let mut notes = Vec::new();
        if let Some(fmt_kind) = self.format {
            notes.push(fmt_kind.to_string());
        }
        if let Some(values) = &self.enum_values {
            notes.push(values.join("|"));
        }
        if let Some(min) = self.min {
            notes.push(format!("min={}", min));
        }
        if let Some(max) = self.max {
            notes.push(format!("max={}", max));
        }
        if !notes.is_empty() {
            write!(f, "({})", notes.join(", "))?;
        }
        if self.optional {
            write!(f, "?")?;
        }
        if self.has_default {
            write!(f, " [default]")?;
        }
        Ok(())
    }
}

/// Named schema: variable name to node, in declaration order.
pub type SchemaMap = IndexMap<String, SchemaNode>;

/// Unwrap wrapper layers until a base type, merging the optional/default
/// flags upward: an optional-of-default is optional with a default.
pub fn type_info(node: &SchemaNode) -> TypeDescriptor {
    let mut optional = false;
    let mut has_default = false;
    let mut current = node;
    loop {
        match current {
            SchemaNode::Optional(inner) => {
                optional = true;
                current = inner;
            }
            SchemaNode::WithDefault(inner) => {
                has_default = true;
                current = inner;
            }
            _ => break,
        }
    }

    let mut descriptor = TypeDescriptor {
        base: BaseType::Unknown,
        optional,
        has_default,
        enum_values: None,
        min: None,
        max: None,
        format: None,
    };
    match current {
        SchemaNode::String { format } => {
            descriptor.base = BaseType::String;
            descriptor.format = *format;
        }
        SchemaNode::Number { min, max, integer } => {
            descriptor.base = BaseType::Number;
            descriptor.min = *min;
            descriptor.max = *max;
            if *integer {
                descriptor.format = Some(ValueFormat::Integer);
            }
        }
        SchemaNode::Boolean => descriptor.base = BaseType::Boolean,
        SchemaNode::Enum { values } => {
            descriptor.base = BaseType::Enum;
            descriptor.enum_values = Some(values.clone());
        }
        SchemaNode::Literal { value } => {
            descriptor.base = BaseType::Literal;
            descriptor.enum_values = Some(vec![value.clone()]);
        }
        SchemaNode::Unknown => descriptor.base = BaseType::Unknown,
        SchemaNode::Optional(_) | SchemaNode::WithDefault(_) => unreachable!("unwrapped above"),
    }
    descriptor
}

// ---------------------------------------------------------------------------
// Diff result
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize)]
pub struct AddedField {
    pub key: String,
    pub descriptor: TypeDescriptor,
    pub breaking: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct RemovedField {
    pub key: String,
    pub descriptor: TypeDescriptor,
    pub breaking: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct FieldChange {
    pub key: String,
    pub old: TypeDescriptor,
    pub new: TypeDescriptor,
    pub breaking: bool,
    pub reason: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct RenamedField {
    pub from: String,
    pub to: String,
    pub confidence: f64,
}

#[derive(Clone, Debug, Serialize)]
pub struct SchemaDiff {
    pub added: Vec<AddedField>,
    pub removed: Vec<RemovedField>,
    pub changed: Vec<FieldChange>,
    pub renamed: Vec<RenamedField>,
    pub is_breaking: bool,
}

pub struct DiffOptions {
    pub detect_renames: bool,
    pub rename_threshold: f64,
    /// Treat a new required-without-default variable as breaking.
    pub new_required_is_breaking: bool,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self { detect_renames: true, rename_threshold: 0.7, new_required_is_breaking: true }
    }
}

// ---------------------------------------------------------------------------
// Diff
// ---------------------------------------------------------------------------

/// Compare two schemas. Pure; cannot fail on well-formed inputs.
pub fn diff(old: &SchemaMap, new: &SchemaMap, options: &DiffOptions) -> SchemaDiff {
    let old_info: IndexMap<&str, TypeDescriptor> =
        old.iter().map(|(k, node)| (k.as_str(), type_info(node))).collect();
    let new_info: IndexMap<&str, TypeDescriptor> =
        new.iter().map(|(k, node)| (k.as_str(), type_info(node))).collect();

    let mut changed = Vec::new();
    for (key, old_desc) in &old_info {
        let Some(new_desc) = new_info.get(key) else { continue };
        if let Some(change) = classify_change(key, old_desc, new_desc) {
            changed.push(change);
        }
    }

    let mut removed: Vec<RemovedField> = old_info
        .iter()
        .filter(|(k, _)| !new_info.contains_key(*k))
        .map(|(k, desc)| RemovedField {
            key: k.to_string(),
            breaking: !desc.optional,
            descriptor: desc.clone(),
        })
        .collect();

    let mut added: Vec<AddedField> = new_info
        .iter()
        .filter(|(k, _)| !old_info.contains_key(*k))
        .map(|(k, desc)| AddedField {
            key: k.to_string(),
            breaking: options.new_required_is_breaking && !desc.optional && !desc.has_default,
            descriptor: desc.clone(),
        })
        .collect();

    let renamed = if options.detect_renames {
        detect_renames(&mut removed, &mut added, options.rename_threshold)
    } else {
        Vec::new()
    };

    let is_breaking = !renamed.is_empty()
        || removed.iter().any(|r| r.breaking)
        || added.iter().any(|a| a.breaking)
        || changed.iter().any(|c| c.breaking);

    SchemaDiff { added, removed, changed, renamed, is_breaking }
}

/// Classify the delta for a key present on both sides. Returns `None` when
/// the descriptors are identical.
fn classify_change(key: &str, old: &TypeDescriptor, new: &TypeDescriptor) -> Option<FieldChange> {
    if old == new {
        return None;
    }

    let (breaking, reason) = if old.optional && !new.optional && !new.has_default {
        (true, "Variable became required".to_string())
    } else if old.base != new.base {
        (true, format!("Type changed from {} to {}", old.base, new.base))
    } else if let Some(missing) = narrowed_enum(old, new) {
        (true, format!("Enum narrowed: removed {}", missing.join(", ")))
    } else if tightened_min(old, new) {
        (true, format!("Minimum tightened from {} to {}", fmt_bound(old.min), fmt_bound(new.min)))
    } else if tightened_max(old, new) {
        (true, format!("Maximum tightened from {} to {}", fmt_bound(old.max), fmt_bound(new.max)))
    } else {
        (false, "Constraints changed".to_string())
    };

    Some(FieldChange { key: key.to_string(), old: old.clone(), new: new.clone(), breaking, reason })
}

fn narrowed_enum(old: &TypeDescriptor, new: &TypeDescriptor) -> Option<Vec<String>> {
    let old_values = old.enum_values.as_ref()?;
    let new_values = new.enum_values.as_ref()?;
    let missing: Vec<String> =
        old_values.iter().filter(|v| !new_values.contains(v)).cloned().collect();
    (!missing.is_empty()).then_some(missing)
}

fn tightened_min(old: &TypeDescriptor, new: &TypeDescriptor) -> bool {
    matches!((old.min, new.min), (Some(o), Some(n)) if n > o)
}

fn tightened_max(old: &TypeDescriptor, new: &TypeDescriptor) -> bool {
    matches!((old.max, new.max), (Some(o), Some(n)) if n < o)
}

fn fmt_bound(bound: Option<f64>) -> String {
    bound.map(|b| b.to_string()).unwrap_or_else(|| "none".to_string())
}

/// Greedy pairwise rename detection over (removed, added), in list order.
/// Each added key matches at most one removed key; matched pairs leave
/// their lists.
fn detect_renames(
    removed: &mut Vec<RemovedField>,
    added: &mut Vec<AddedField>,
    threshold: f64,
) -> Vec<RenamedField> {
    let mut renamed = Vec::new();
    let mut removed_idx = 0;
    while removed_idx < removed.len() {
        let from = removed[removed_idx].key.clone();
        let hit = added
            .iter()
            .position(|candidate| name_similarity(&from, &candidate.key) >= threshold);
        match hit {
            Some(added_idx) => {
                let to = added.remove(added_idx).key;
                let confidence = name_similarity(&from, &to);
                removed.remove(removed_idx);
                renamed.push(RenamedField { from, to, confidence });
            }
            None => removed_idx += 1,
        }
    }
    renamed
}

/// Similarity between two lowercased variable names. Normalized Levenshtein,
/// boosted for abbreviation-style pairs where the shorter name is an
/// in-order subsequence of the longer one (DB_URL vs DATABASE_URL), which
/// plain edit distance scores too low.
fn name_similarity(a: &str, b: &str) -> f64 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    let lev = strsim::normalized_levenshtein(&a, &b);
    let (short, long) = if a.len() <= b.len() { (&a, &b) } else { (&b, &a) };
    if short.len() >= 2 && is_subsequence(short, long) {
        let containment = 0.7 + 0.3 * (short.len() as f64 / long.len() as f64);
        lev.max(containment)
    } else {
        lev
    }
}

fn is_subsequence(needle: &str, haystack: &str) -> bool {
    let mut chars = haystack.chars();
    needle.chars().all(|n| chars.any(|h| h == n))
}

// ---------------------------------------------------------------------------
// Migration guide rendering
// ---------------------------------------------------------------------------

/// Render a deterministic, diffable migration guide.
pub fn render_migration_guide(diff: &SchemaDiff) -> String {
    let mut out = String::from("# Migration guide\n\n");
    out.push_str(if diff.is_breaking {
        "This change is BREAKING.\n\n"
    } else {
        "This change is non-breaking.\n\n"
    });

    out.push_str("## Renamed\n\n");
    if diff.renamed.is_empty() {
        out.push_str("(none)\n\n");
    } else {
        for r in &diff.renamed {
            out.push_str(&format!("- {} -> {} (confidence {:.2})\n", r.from, r.to, r.confidence));
        }
        out.push('\n');
    }

    out.push_str("## Added\n\n");
    if diff.added.is_empty() {
        out.push_str("(none)\n\n");
    } else {
        for a in &diff.added {
            out.push_str(&format!(
                "- {}: {}{}\n",
                a.key,
                a.descriptor,
                if a.breaking { " (breaking: required without default)" } else { "" }
            ));
        }
        out.push('\n');
    }

    out.push_str("## Removed\n\n");
    if diff.removed.is_empty() {
        out.push_str("(none)\n\n");
    } else {
        for r in &diff.removed {
            out.push_str(&format!(
                "- {}: {}{}\n",
                r.key,
                r.descriptor,
                if r.breaking { " (breaking: was required)" } else { "" }
            ));
        }
        out.push('\n');
    }

    out.push_str("## Changed\n\n");
    if diff.changed.is_empty() {
        out.push_str("(none)\n");
    } else {
        out.push_str("| Variable | Before | After | Impact |\n");
        out.push_str("|---|---|---|---|\n");
        for c in &diff.changed {
            out.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                c.key,
                c.old,
                c.new,
                if c.breaking { format!("breaking: {}", c.reason) } else { c.reason.clone() }
            ));
        }
    }

    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn schema(pairs: Vec<(&str, SchemaNode)>) -> SchemaMap {
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn unwraps_wrapper_layers_and_merges_flags() {
        let node = SchemaNode::string_with(ValueFormat::Url).with_default().optional();
        let info = type_info(&node);
        assert_eq!(info.base, BaseType::String);
        assert!(info.optional);
        assert!(info.has_default);
        assert_eq!(info.format, Some(ValueFormat::Url));
    }

    #[test]
    fn integer_flag_becomes_format() {
        let info = type_info(&SchemaNode::integer());
        assert_eq!(info.base, BaseType::Number);
        assert_eq!(info.format, Some(ValueFormat::Integer));
    }

    #[test]
    fn became_required_is_breaking() {
        let old = schema(vec![("A", SchemaNode::string().optional())]);
        let new = schema(vec![("A", SchemaNode::string())]);
        let d = diff(&old, &new, &DiffOptions::default());
        assert!(d.is_breaking);
        assert_eq!(d.changed[0].reason, "Variable became required");
    }

    #[test]
    fn became_required_with_default_is_not() {
        let old = schema(vec![("A", SchemaNode::string().optional())]);
        let new = schema(vec![("A", SchemaNode::string().with_default())]);
        let d = diff(&old, &new, &DiffOptions::default());
        assert!(!d.is_breaking);
        assert!(!d.changed[0].breaking);
    }

    #[test]
    fn type_change_is_breaking() {
        let old = schema(vec![("PORT", SchemaNode::string())]);
        let new = schema(vec![("PORT", SchemaNode::number())]);
        let d = diff(&old, &new, &DiffOptions::default());
        assert!(d.is_breaking);
        assert!(d.changed[0].reason.contains("string"));
        assert!(d.changed[0].reason.contains("number"));
    }

    #[test]
    fn enum_narrowing_is_breaking_widening_is_not() {
        let old = schema(vec![("MODE", SchemaNode::enumeration(&["a", "b", "c"]))]);
        let narrowed = schema(vec![("MODE", SchemaNode::enumeration(&["a", "b"]))]);
        let widened = schema(vec![("MODE", SchemaNode::enumeration(&["a", "b", "c", "d"]))]);

        let d = diff(&old, &narrowed, &DiffOptions::default());
        assert!(d.is_breaking);
        assert!(d.changed[0].reason.contains('c'));

        let d = diff(&old, &widened, &DiffOptions::default());
        assert!(!d.is_breaking);
    }

    #[test]
    fn min_max_tightening() {
        let old = schema(vec![("N", SchemaNode::number_range(Some(1.0), Some(10.0)))]);
        let tighter_min = schema(vec![("N", SchemaNode::number_range(Some(2.0), Some(10.0)))]);
        let looser_max = schema(vec![("N", SchemaNode::number_range(Some(1.0), Some(20.0)))]);

        assert!(diff(&old, &tighter_min, &DiffOptions::default()).is_breaking);
        assert!(!diff(&old, &looser_max, &DiffOptions::default()).is_breaking);
    }

    #[test]
    fn removed_required_breaking_removed_optional_not() {
        let old = schema(vec![
            ("REQ", SchemaNode::string()),
            ("OPT", SchemaNode::string().optional()),
        ]);
        let new = schema(vec![]);
        let d = diff(&old, &new, &DiffOptions::default());
        assert_eq!(d.removed.len(), 2);
        assert!(d.removed.iter().find(|r| r.key == "REQ").unwrap().breaking);
        assert!(!d.removed.iter().find(|r| r.key == "OPT").unwrap().breaking);
    }

    #[test]
    fn added_optional_is_not_breaking() {
        let old = schema(vec![]);
        let new = schema(vec![("NEW", SchemaNode::string().optional())]);
        assert!(!diff(&old, &new, &DiffOptions::default()).is_breaking);
    }

    #[test]
    fn added_required_heuristic_can_be_disabled() {
        let old = schema(vec![]);
        let new = schema(vec![("NEW", SchemaNode::string())]);
        assert!(diff(&old, &new, &DiffOptions::default()).is_breaking);

        let opts = DiffOptions { new_required_is_breaking: false, ..Default::default() };
        assert!(!diff(&old, &new, &opts).is_breaking);
    }

    #[test]
    fn rename_detection_folds_pairs() {
        let old = schema(vec![("DB_URL", SchemaNode::string_with(ValueFormat::Url))]);
        let new = schema(vec![("DATABASE_URL", SchemaNode::string_with(ValueFormat::Url))]);
        let d = diff(&old, &new, &DiffOptions::default());
        assert!(d.added.is_empty());
        assert!(d.removed.is_empty());
        assert_eq!(d.renamed.len(), 1);
        assert_eq!(d.renamed[0].from, "DB_URL");
        assert_eq!(d.renamed[0].to, "DATABASE_URL");
        assert!(d.renamed[0].confidence >= 0.7);
        assert!(d.is_breaking);
    }

    #[test]
    fn unrelated_names_do_not_pair() {
        let old = schema(vec![("DB_URL", SchemaNode::string())]);
        let new = schema(vec![("SMTP_HOST", SchemaNode::string())]);
        let d = diff(&old, &new, &DiffOptions::default());
        assert!(d.renamed.is_empty());
        assert_eq!(d.removed.len(), 1);
        assert_eq!(d.added.len(), 1);
    }

    #[test]
    fn guide_renders_all_sections() {
        let old = schema(vec![
            ("DB_URL", SchemaNode::string_with(ValueFormat::Url)),
            ("TIMEOUT", SchemaNode::number_range(Some(1.0), Some(10.0))),
            ("GONE", SchemaNode::string()),
        ]);
        let new = schema(vec![
            ("DATABASE_URL", SchemaNode::string_with(ValueFormat::Url)),
            ("TIMEOUT", SchemaNode::number_range(Some(2.0), Some(10.0))),
            ("FRESH", SchemaNode::string().optional()),
        ]);
        let d = diff(&old, &new, &DiffOptions::default());
        let guide = render_migration_guide(&d);
        assert!(guide.contains("## Renamed"));
        assert!(guide.contains("DB_URL -> DATABASE_URL"));
        assert!(guide.contains("## Changed"));
        assert!(guide.contains("| TIMEOUT |"));
        assert!(guide.contains("## Added"));
        assert!(guide.contains("## Removed"));
        // Deterministic between runs.
        assert_eq!(guide, render_migration_guide(&d));
    }
}
