//! String helpers for filenames and word counts.

use once_cell::sync::Lazy;
use regex::Regex;

static SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s:]+").unwrap());
static DISALLOWED_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9\-]").unwrap());
static DUPLICATE_HYPHENS: Lazy<Regex> = Lazy::new(|| Regex::new(r"-+").unwrap());

/// Turn a scripture reference into a filename-safe slug.
///
/// Lowercases, maps whitespace and colons to hyphens, drops anything that
/// is not `[a-z0-9-]`, collapses hyphen runs and trims them from the ends.
pub fn sanitize_filename(reference: &str) -> String {
    let lowered = reference.to_lowercase();
    let hyphenated = SEPARATORS.replace_all(&lowered, "-");
    let cleaned = DISALLOWED_CHARS.replace_all(&hyphenated, "");
    let collapsed = DUPLICATE_HYPHENS.replace_all(&cleaned, "-");
    collapsed.trim_matches('-').to_string()
}

/// Whitespace-delimited word count.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Truncate to `max_chars` characters, appending "..." when cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}...", cut)
}
