//! Body normalization applied when remote text is written to disk.

use std::sync::OnceLock;

use regex::Regex;

/// Collapse runs of three or more newlines to a blank line, drop stray
/// trailing backslashes at line ends, and trim the edges.
#[must_use]
pub fn clean_text(text: &str) -> String {
    static TRAILING_BACKSLASHES: OnceLock<Regex> = OnceLock::new();
    static BLANK_RUNS: OnceLock<Regex> = OnceLock::new();

    let backslashes =
        TRAILING_BACKSLASHES.get_or_init(|| Regex::new(r"\\+\n").expect("valid regex"));
    let blanks = BLANK_RUNS.get_or_init(|| Regex::new(r"\n{3,}").expect("valid regex"));

    let cleaned = backslashes.replace_all(text, "\n");
    let cleaned = blanks.replace_all(&cleaned, "\n\n");
    cleaned.trim().to_string()
}
