//! Parsers for the `key=value` shell-style output emitted by GIS modules.

use indexmap::IndexMap;

/// Parses one `key=value` pair per line. Blank lines are skipped and lines
/// without a separator are ignored, matching how module output is consumed.
pub fn parse_key_val(text: &str) -> IndexMap<String, String> {
    text.lines().filter_map(split_pair).collect()
}

/// Parses whitespace separated `key=value` words, as printed on a single line
/// by `r.proj -g`.
pub fn parse_key_val_words(text: &str) -> IndexMap<String, String> {
    text.split_whitespace().filter_map(split_pair).collect()
}

fn split_pair(raw: &str) -> Option<(String, String)> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let (key, value) = raw.split_once('=')?;
    Some((key.trim().to_string(), value.trim().to_string()))
}
