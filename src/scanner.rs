//! Secret scanner: filtered tree walk with multi-pattern line matching.
//!
//! Traversal skips excluded directories, applies an extension allowlist and
//! a size cap, and absorbs per-file I/O problems (the file is skipped).
//! Matches are redacted before storage by default and reported in a stable
//! order: file, then line, then column.

use serde::Serialize;
use walkdir::WalkDir;

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ScanError;
use crate::patterns::{default_patterns, SecretPattern, Severity};

/// Files larger than this are skipped.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 1024 * 1024;

/// Directory/file name fragments skipped during traversal: VCS, build,
/// install, dependency, lock, and minified artifacts.
pub const DEFAULT_EXCLUSIONS: &[&str] = &[
    ".git",
    ".svn",
    ".hg",
    "node_modules",
    "vendor",
    "target",
    "dist",
    "build",
    "coverage",
    ".cache",
    ".next",
    ".venv",
    "__pycache__",
    ".min.",
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "Cargo.lock",
    "Gemfile.lock",
    "poetry.lock",
];

/// Extensions eligible for scanning. Files named `.env*` are always
/// eligible regardless of extension.
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    "js", "jsx", "ts", "tsx", "mjs", "cjs", "py", "rb", "go", "rs", "java", "kt", "php", "sh",
    "bash", "zsh", "yml", "yaml", "json", "toml", "ini", "cfg", "conf", "env", "txt", "md", "xml",
    "properties", "tf", "tfvars",
];

/// Shell snippet for a git pre-commit hook that runs the scanner and blocks
/// the commit on findings. An artifact, not logic.
pub const PRE_COMMIT_HOOK: &str = "#!/bin/sh\n\
# nevr-env pre-commit hook: refuse to commit leaked secrets.\n\
nevr-env scan .\n\
if [ $? -ne 0 ]; then\n\
  echo \"nevr-env: secrets detected; commit aborted\" >&2\n\
  exit 1\n\
fi\n";

// ---------------------------------------------------------------------------
// Options and results
// ---------------------------------------------------------------------------

pub struct ScanOptions {
    /// Redact matched substrings before storing them. Default true.
    pub redact: bool,
    /// Caller exclusions, unioned with [`DEFAULT_EXCLUSIONS`].
    pub exclude: Vec<String>,
    /// Caller patterns, unioned with the built-in table.
    pub extra_patterns: Vec<SecretPattern>,
    pub max_file_size: u64,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            redact: true,
            exclude: Vec::new(),
            extra_patterns: Vec::new(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

/// Pattern metadata carried by a match.
#[derive(Clone, Debug, Serialize)]
pub struct PatternInfo {
    pub name: String,
    pub severity: Severity,
    pub description: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct ScanMatch {
    pub file: PathBuf,
    /// 1-based line number.
    pub line: usize,
    /// 1-based byte column of the match start.
    pub column: usize,
    pub pattern: PatternInfo,
    /// The matched substring, redacted unless redaction is off.
    pub matched: String,
    /// The whole line, with every match redacted unless redaction is off.
    pub line_content: String,
}

#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct ScanSummary {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl ScanSummary {
    fn bump(&mut self, severity: Severity) {
        match severity {
            Severity::Critical => self.critical += 1,
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ScanResult {
    pub has_secrets: bool,
    pub files_scanned: usize,
    pub matches: Vec<ScanMatch>,
    pub summary: ScanSummary,
}

// ---------------------------------------------------------------------------
// Scanning
// ---------------------------------------------------------------------------

/// Scan a directory tree. Per-file I/O errors are absorbed silently; an
/// inaccessible root propagates.
pub fn scan_directory(root: &Path, options: &ScanOptions) -> Result<ScanResult, ScanError> {
    fs::metadata(root).map_err(|e| ScanError::RootAccess {
        path: root.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut patterns = default_patterns();
    patterns.extend(options.extra_patterns.iter().cloned());

    let exclusions: Vec<&str> = DEFAULT_EXCLUSIONS
        .iter()
        .copied()
        .chain(options.exclude.iter().map(String::as_str))
        .collect();

    let mut matches = Vec::new();
    let mut files_scanned = 0usize;

    // Exclusions apply to paths below the root, never to the root itself.
    let walker = WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| {
            match entry.path().strip_prefix(root) {
                Ok(rel) if rel.as_os_str().is_empty() => true,
                Ok(rel) => !is_excluded(rel, &exclusions),
                Err(_) => !is_excluded(entry.path(), &exclusions),
            }
        });
    for entry in walker {
        let Ok(entry) = entry else { continue };
        if !entry.file_type().is_file() {
            continue;
        }
        if !eligible_file(entry.path()) {
            continue;
        }
        match entry.metadata() {
            Ok(meta) if meta.len() <= options.max_file_size => {}
            _ => continue,
        }
        let Ok(text) = fs::read_to_string(entry.path()) else {
            continue;
        };
        files_scanned += 1;
        scan_text(entry.path(), &text, &patterns, options.redact, &mut matches);
    }

    matches.sort_by(|a, b| {
        (&a.file, a.line, a.column).cmp(&(&b.file, b.line, b.column))
    });

    let mut summary = ScanSummary::default();
    for m in &matches {
        summary.bump(m.pattern.severity);
    }

    tracing::debug!(files = files_scanned, matches = matches.len(), "scan complete");
    Ok(ScanResult { has_secrets: !matches.is_empty(), files_scanned, matches, summary })
}

/// Match every pattern against every line of one file's content.
fn scan_text(
    file: &Path,
    text: &str,
    patterns: &[SecretPattern],
    redact_matches: bool,
    out: &mut Vec<ScanMatch>,
) {
    for (line_idx, line) in text.lines().enumerate() {
        for pattern in patterns {
            for found in pattern.regex.find_iter(line) {
                let raw = found.as_str();
                let (matched, line_content) = if redact_matches {
                    (redact(raw), line.replace(raw, &redact(raw)))
                } else {
                    (raw.to_string(), line.to_string())
                };
                out.push(ScanMatch {
                    file: file.to_path_buf(),
                    line: line_idx + 1,
                    column: found.start() + 1,
                    pattern: PatternInfo {
                        name: pattern.name.clone(),
                        severity: pattern.severity,
                        description: pattern.description.clone(),
                    },
                    matched,
                    line_content,
                });
            }
        }
    }
}

/// Redact a matched substring: keep the first and last four characters when
/// it is longer than eight bytes, blank it entirely otherwise.
pub fn redact(secret: &str) -> String {
    if secret.len() > 8 {
        let head: String = secret.chars().take(4).collect();
        let tail_start = secret.char_indices().rev().nth(3).map(|(i, _)| i).unwrap_or(0);
        format!("{}...{}", head, &secret[tail_start..])
    } else {
        "***".to_string()
    }
}

fn is_excluded(path: &Path, exclusions: &[&str]) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let full = path.to_string_lossy();
    exclusions
        .iter()
        .any(|excl| name.contains(excl) || full.contains(excl))
}

fn eligible_file(path: &Path) -> bool {
    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        if name.starts_with(".env") {
            return true;
        }
    }
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| DEFAULT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_long_matches() {
        assert_eq!(redact("sk_test_abcdefghijklmnopqrstuvwx"), "sk_t...uvwx");
        assert_eq!(redact("123456789"), "1234...6789");
    }

    #[test]
    fn blanks_short_matches() {
        assert_eq!(redact("12345678"), "***");
        assert_eq!(redact("x"), "***");
    }

    #[test]
    fn exclusion_matches_name_and_path() {
        let excl = DEFAULT_EXCLUSIONS.to_vec();
        assert!(is_excluded(Path::new("repo/node_modules"), &excl));
        assert!(is_excluded(Path::new("repo/node_modules/pkg/index.js"), &excl));
        assert!(is_excluded(Path::new("repo/app.min.js"), &excl));
        assert!(!is_excluded(Path::new("repo/src/app.js"), &excl));
    }

    #[test]
    fn env_files_always_eligible() {
        assert!(eligible_file(Path::new(".env")));
        assert!(eligible_file(Path::new(".env.production")));
        assert!(eligible_file(Path::new("config.yaml")));
        assert!(!eligible_file(Path::new("binary.bin")));
        assert!(!eligible_file(Path::new("archive.tar.gz")));
    }

    #[test]
    fn columns_are_one_based_byte_offsets() {
        let patterns = default_patterns();
        let mut out = Vec::new();
        scan_text(
            Path::new("x.js"),
            "const k = \"sk_test_abcdefghijklmnopqrstuvwx\"\n",
            &patterns,
            false,
            &mut out,
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].line, 1);
        assert_eq!(out[0].column, 12);
        assert_eq!(out[0].matched, "sk_test_abcdefghijklmnopqrstuvwx");
    }

    #[test]
    fn line_content_redacts_every_occurrence() {
        let patterns = default_patterns();
        let mut out = Vec::new();
        let line = "a=\"sk_test_abcdefghijklmnopqrstuvwx\" b=\"sk_test_abcdefghijklmnopqrstuvwx\"\n";
        scan_text(Path::new("x.js"), line, &patterns, true, &mut out);
        assert_eq!(out.len(), 2);
        for m in &out {
            assert!(!m.line_content.contains("abcdefghijklmnop"));
            assert_eq!(m.matched, "sk_t...uvwx");
        }
    }
}
