//! Bible Gateway passage pages.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::node::Element;
use scraper::{ElementRef, Html, Selector};

use crate::utilities::errors::FetchError;

static PASSAGE_CONTAINER: Lazy<Selector> = Lazy::new(|| Selector::parse("div.passage-text").unwrap());
static NEWLINE_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n+").unwrap());
static SPACE_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r" +").unwrap());

/// Markup that is not part of the passage itself.
fn is_apparatus(el: &Element) -> bool {
    let has = |class: &str| el.classes().any(|c| c == class);
    match el.name() {
        "span" => has("chapternum") || has("versenum"),
        "sup" => has("footnote") || has("crossreference"),
        _ => false,
    }
}

fn collect_text(el: ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child_el) = ElementRef::wrap(child) {
            if !is_apparatus(child_el.value()) {
                collect_text(child_el, out);
            }
        }
    }
}

/// Pull clean passage text from the first `div.passage-text`.
///
/// Chapter and verse numbers, footnote markers and cross-reference markers
/// are dropped; newline and space runs are collapsed.
pub fn extract_passage_text(html: &str, reference: &str) -> Result<String, FetchError> {
    let document = Html::parse_document(html);
    let container = document
        .select(&PASSAGE_CONTAINER)
        .next()
        .ok_or_else(|| FetchError::new(format!("Could not find passage text for {}", reference)))?;

    let mut raw = String::new();
    collect_text(container, &mut raw);

    let text = NEWLINE_RUNS.replace_all(&raw, "\n");
    let text = SPACE_RUNS.replace_all(&text, " ");
    Ok(text.trim().to_string())
}
