//! Rotation tracking: when each secret was last replaced, and how stale
//! it is allowed to get.
//!
//! Orthogonal to vault operations. The tracking file records dates and age
//! budgets per key name; it never holds values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fs;
use std::path::Path;

use crate::error::RotationError;

pub const ROTATION_VERSION: u32 = 1;

/// Conventional tracking file name.
pub const ROTATION_FILE: &str = ".nevr-env.rotation.json";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RotationRecord {
    pub key: String,
    pub last_rotated: DateTime<Utc>,
    pub max_age_days: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotated_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RotationFile {
    pub version: u32,
    pub updated_at: DateTime<Utc>,
    pub records: Vec<RotationRecord>,
}

impl Default for RotationFile {
    fn default() -> Self {
        Self { version: ROTATION_VERSION, updated_at: Utc::now(), records: Vec::new() }
    }
}

/// Freshness classification against the record's age budget.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationStatus {
    /// Age within half the budget.
    Fresh,
    /// Age between half the budget and the budget.
    Warning,
    /// Age beyond the budget.
    Expired,
    /// No record for the key.
    Unknown,
}

impl std::fmt::Display for RotationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fresh => write!(f, "fresh"),
            Self::Warning => write!(f, "warning"),
            Self::Expired => write!(f, "expired"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RotationReportEntry {
    pub key: String,
    pub status: RotationStatus,
    pub age_days: f64,
    pub max_age_days: u32,
}

impl RotationFile {
    /// Load the tracking file; a missing file is an empty tracker.
    pub fn load(path: &Path) -> Result<Self, RotationError> {
        let data = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(RotationError::Io(e.to_string())),
        };
        serde_json::from_str(&data).map_err(|e| RotationError::Malformed(e.to_string()))
    }

    /// Write atomically: temp sibling, then rename.
    pub fn store(&self, path: &Path) -> Result<(), RotationError> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| RotationError::Malformed(e.to_string()))?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json.as_bytes()).map_err(|e| RotationError::Io(e.to_string()))?;
        fs::rename(&tmp, path).map_err(|e| RotationError::Io(e.to_string()))?;
        Ok(())
    }

    pub fn record(&self, key: &str) -> Option<&RotationRecord> {
        self.records.iter().find(|r| r.key == key)
    }

    /// Upsert a record: refresh the rotation date, keep or set the budget,
    /// and stamp the file's updatedAt.
    pub fn mark_rotated(&mut self, key: &str, max_age_days: u32, rotated_by: Option<String>) {
        let now = Utc::now();
        self.updated_at = now;
        match self.records.iter_mut().find(|r| r.key == key) {
            Some(record) => {
                record.last_rotated = now;
                record.max_age_days = max_age_days;
                record.rotated_by = rotated_by;
            }
            None => self.records.push(RotationRecord {
                key: key.to_string(),
                last_rotated: now,
                max_age_days,
                rotated_by,
                notes: None,
            }),
        }
    }

    pub fn status_of(&self, key: &str, now: DateTime<Utc>) -> RotationStatus {
        match self.record(key) {
            Some(record) => classify(record, now),
            None => RotationStatus::Unknown,
        }
    }

    /// Per-record status at `now`, in file order.
    pub fn report(&self, now: DateTime<Utc>) -> Vec<RotationReportEntry> {
        self.records
            .iter()
            .map(|record| RotationReportEntry {
                key: record.key.clone(),
                status: classify(record, now),
                age_days: age_days(record, now),
                max_age_days: record.max_age_days,
            })
            .collect()
    }
}

fn age_days(record: &RotationRecord, now: DateTime<Utc>) -> f64 {
    (now - record.last_rotated).num_seconds() as f64 / 86_400.0
}

fn classify(record: &RotationRecord, now: DateTime<Utc>) -> RotationStatus {
    let age = age_days(record, now);
    let budget = record.max_age_days as f64;
    if age <= budget * 0.5 {
        RotationStatus::Fresh
    } else if age <= budget {
        RotationStatus::Warning
    } else {
        RotationStatus::Expired
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
