//! Env text codec: `KEY=value` lines with comments and quoting.
//!
//! Parsing produces an insertion-ordered mapping; comments and blank lines
//! are recognized but do not participate in it. Serialization emits only
//! `KEY=VALUE` lines, quoting where the value would otherwise be ambiguous.

use indexmap::IndexMap;

/// Ordered key→value mapping of an env block.
pub type EnvMap = IndexMap<String, String>;

/// Parse an env block. Later occurrences of a key overwrite earlier ones.
pub fn parse(text: &str) -> EnvMap {
    let mut map = EnvMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some(eq) = line.find('=') else { continue };
        let key = line[..eq].trim();
        if key.is_empty() {
            continue;
        }
        let value = unquote(line[eq + 1..].trim());
        map.insert(key.to_string(), value);
    }
    map
}

/// Serialize a mapping back to env text, one `KEY=VALUE` line per pair in
/// insertion order, with a trailing newline when non-empty.
pub fn serialize(map: &EnvMap) -> String {
    let mut out = String::new();
    for (key, value) in map {
        out.push_str(key);
        out.push('=');
        if needs_quoting(value) {
            out.push('"');
            out.push_str(&value.replace('"', "\\\""));
            out.push('"');
        } else {
            out.push_str(value);
        }
        out.push('\n');
    }
    out
}

/// Count the lines that would contribute a variable: non-empty, non-comment,
/// and containing `=`. Used for vault metadata only.
pub fn count_variables(text: &str) -> usize {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#') && l.contains('='))
        .count()
}

/// Strip a matching pair of surrounding `"` or `'` quotes. Only the `\"`
/// escape inside double quotes is recognized.
fn unquote(value: &str) -> String {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        if bytes[0] == b'"' && bytes[bytes.len() - 1] == b'"' {
            return value[1..value.len() - 1].replace("\\\"", "\"");
        }
        if bytes[0] == b'\'' && bytes[bytes.len() - 1] == b'\'' {
            return value[1..value.len() - 1].to_string();
        }
    }
    value.to_string()
}

fn needs_quoting(value: &str) -> bool {
    value
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '#' | '"' | '\'' | '='))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
