//! Minimal front-matter codec.
//!
//! A front-matter block is the first occurrence of `---` fences at the very
//! start of a file. Interior lines are `key: value` pairs; values are
//! trimmed and surrounding matched quotes stripped. Keys keep their parse
//! order, so rewriting one key leaves every other line where it was.

use std::fmt::Write as _;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::Result;

/// The only key the sync engine gives meaning to.
pub const ID_KEY: &str = "id_outline";

fn fence_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\A---\n(.*?)\n---\n").expect("valid regex"))
}

/// Ordered key/value header mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrontMatter {
    entries: Vec<(String, String)>,
}

impl FrontMatter {
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value.as_str())
    }

    /// Replace the value in place when the key exists, else append it.
    pub fn set(&mut self, key: &str, value: &str) {
        if let Some(entry) = self.entries.iter_mut().find(|(existing, _)| existing == key) {
            entry.1 = value.to_string();
        } else {
            self.entries.push((key.to_string(), value.to_string()));
        }
    }

    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.get(ID_KEY)
    }

    pub fn set_id(&mut self, value: &str) {
        self.set(ID_KEY, value);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }
}

/// A parsed file: header mapping plus body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    pub front_matter: FrontMatter,
    pub body: String,
    pub had_front_matter: bool,
}

impl Document {
    #[must_use]
    pub fn new(front_matter: FrontMatter, body: impl Into<String>) -> Self {
        Self {
            front_matter,
            body: body.into(),
            had_front_matter: true,
        }
    }
}

/// Parse file content into header and body.
///
/// A file without a fenced block yields an empty mapping and a body equal
/// to the full content.
#[must_use]
pub fn parse(content: &str) -> Document {
    let Some(captures) = fence_regex().captures(content) else {
        return Document {
            front_matter: FrontMatter::default(),
            body: content.to_string(),
            had_front_matter: false,
        };
    };

    let mut front_matter = FrontMatter::default();
    for line in captures.get(1).map_or("", |m| m.as_str()).lines() {
        if line.trim().is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        front_matter
            .entries
            .push((key.trim().to_string(), strip_quotes(value.trim()).to_string()));
    }

    let rest = &content[captures.get(0).map_or(0, |m| m.end())..];
    // The serializer puts one blank line between fence and body; undo it.
    let body = rest.strip_prefix('\n').unwrap_or(rest).to_string();

    Document {
        front_matter,
        body,
        had_front_matter: true,
    }
}

/// Serialize header and body back into file content.
///
/// Always emits a fenced block, a blank line, then the body. Simple string
/// scalars are written unquoted; anything else is JSON-encoded.
#[must_use]
pub fn serialize(document: &Document) -> String {
    let mut output = String::new();
    output.push_str("---\n");
    for (key, value) in document.front_matter.iter() {
        if is_plain_scalar(value) {
            let _ = writeln!(output, "{key}: {value}");
        } else {
            let _ = writeln!(output, "{key}: {}", serde_json::Value::from(value));
        }
    }
    output.push_str("---\n\n");
    output.push_str(&document.body);
    output
}

/// Rewrite only the `id_outline` key of a file, preserving every other
/// header line and the body bytes.
pub fn rewrite_id_in_file(path: &Path, id: &str) -> Result<()> {
    let content = std::fs::read_to_string(path)?;
    let mut document = parse(&content);
    document.front_matter.set_id(id);
    std::fs::write(path, serialize(&document))?;
    Ok(())
}

fn strip_quotes(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if first == last && (first == b'"' || first == b'\'') {
            return &value[1..value.len() - 1];
        }
    }
    value
}

fn is_plain_scalar(value: &str) -> bool {
    !value.is_empty()
        && !value.contains('\n')
        && !value.contains(':')
        && !value.contains('#')
        && !value.starts_with(['"', '\'', '[', '{', '&', '*', '>', '|', '!', '%'])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_without_fence_yields_full_body() {
        let document = parse("just a body\nwith two lines\n");
        assert!(!document.had_front_matter);
        assert!(document.front_matter.is_empty());
        assert_eq!(document.body, "just a body\nwith two lines\n");
    }

    #[test]
    fn parse_extracts_keys_and_body() {
        let document = parse("---\nid_outline: abc123\ntitle: \"Quoted\"\n---\n\nbody text\n");
        assert!(document.had_front_matter);
        assert_eq!(document.front_matter.id(), Some("abc123"));
        assert_eq!(document.front_matter.get("title"), Some("Quoted"));
        assert_eq!(document.body, "body text\n");
    }

    #[test]
    fn parse_skips_blank_and_keyless_lines() {
        let document = parse("---\n\nnot a pair\nid_outline: x\n---\nbody");
        assert_eq!(document.front_matter.iter().count(), 1);
        assert_eq!(document.front_matter.id(), Some("x"));
    }

    #[test]
    fn parse_requires_fence_at_start() {
        let document = parse("intro\n---\nid_outline: x\n---\nbody");
        assert!(!document.had_front_matter);
    }

    #[test]
    fn serialize_emits_fence_blank_line_and_body() {
        let mut front_matter = FrontMatter::default();
        front_matter.set_id("abc123");
        let rendered = serialize(&Document::new(front_matter, "body\n"));
        assert_eq!(rendered, "---\nid_outline: abc123\n---\n\nbody\n");
    }

    #[test]
    fn serialize_json_encodes_awkward_scalars() {
        let mut front_matter = FrontMatter::default();
        front_matter.set("note", "contains: colon");
        let rendered = serialize(&Document::new(front_matter, ""));
        assert!(rendered.contains("note: \"contains: colon\""));
    }

    #[test]
    fn round_trip_preserves_unknown_keys_and_body() {
        let original = "---\nid_outline: old\nauthor: someone\ncustom_flag: yes\n---\n\n# Title\n\nbody line\n";
        let mut document = parse(original);
        document.front_matter.set_id("new-id");
        let rendered = serialize(&document);
        assert_eq!(
            rendered,
            "---\nid_outline: new-id\nauthor: someone\ncustom_flag: yes\n---\n\n# Title\n\nbody line\n"
        );
    }

    #[test]
    fn set_appends_missing_key_in_order() {
        let mut document = parse("---\nauthor: someone\n---\n\nbody");
        document.front_matter.set_id("fresh");
        let rendered = serialize(&document);
        assert_eq!(rendered, "---\nauthor: someone\nid_outline: fresh\n---\n\nbody");
    }
}
