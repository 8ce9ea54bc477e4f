//! Vanderbilt Revised Common Lectionary daily readings page.
//!
//! Each day is a section whose `id` is the date as `MMDDYYYY`. Readings are
//! Bible Gateway links, usually preceded by a label such as "Psalm" or
//! "Gospel".

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

use crate::utilities::errors::FetchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadingType {
    Ot,
    Psalm,
    Epistle,
    #[default]
    Gospel,
}

impl ReadingType {
    pub const ALL: [ReadingType; 4] = [Self::Ot, Self::Psalm, Self::Epistle, Self::Gospel];

    /// Lowercase labels that identify this reading in preceding text.
    pub fn labels(&self) -> &'static [&'static str] {
        match self {
            Self::Ot => &["old testament", "first reading"],
            Self::Psalm => &["psalm"],
            Self::Epistle => &["epistle", "second reading", "new testament"],
            Self::Gospel => &["gospel"],
        }
    }

    /// Conventional position among the day's links.
    pub fn position(&self) -> usize {
        match self {
            Self::Ot => 0,
            Self::Psalm => 1,
            Self::Epistle => 2,
            Self::Gospel => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ot => "ot",
            Self::Psalm => "psalm",
            Self::Epistle => "epistle",
            Self::Gospel => "gospel",
        }
    }
}

impl FromStr for ReadingType {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                FetchError::new(format!(
                    "Unknown reading type '{}'. Choose from: ot, psalm, epistle, gospel",
                    s
                ))
            })
    }
}

impl fmt::Display for ReadingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scripture link inside the day's section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RclLink {
    /// Link text, used as the reference.
    pub reference: String,
    /// Nearest non-blank text before the link within the section, lowercased.
    pub preceding_text: String,
}

/// Section id for `date`.
pub fn section_id(date: NaiveDate) -> String {
    date.format("%m%d%Y").to_string()
}

/// All scripture links in the section for `date`.
pub fn day_links(html: &str, date: NaiveDate) -> Result<Vec<RclLink>, FetchError> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(&format!("[id=\"{}\"]", section_id(date)))
        .map_err(|e| FetchError::new(format!("bad section selector: {:?}", e)))?;

    let section = document.select(&selector).next().ok_or_else(|| {
        FetchError::new(format!(
            "No readings found for {}. RCL daily readings may not be available for all dates.",
            date.format("%B %d, %Y")
        ))
    })?;

    let mut links = Vec::new();
    let mut last_text = String::new();
    let mut inside_link: Option<ElementRef<'_>> = None;

    for node in section.descendants() {
        if let Some(text) = node.value().as_text() {
            let in_current_link = inside_link
                .map(|a| node.ancestors().any(|anc| anc.id() == a.id()))
                .unwrap_or(false);
            let trimmed = text.trim();
            if !in_current_link && !trimmed.is_empty() {
                last_text = trimmed.to_lowercase();
            }
        } else if let Some(el) = ElementRef::wrap(node) {
            let is_scripture = el.value().name() == "a"
                && el
                    .value()
                    .attr("href")
                    .is_some_and(|h| h.contains("biblegateway.com"));
            if is_scripture {
                links.push(RclLink {
                    reference: el.text().collect::<String>().trim().to_string(),
                    preceding_text: last_text.clone(),
                });
                inside_link = Some(el);
            }
        }
    }

    if links.is_empty() {
        return Err(FetchError::new("Could not find scripture readings for today"));
    }
    Ok(links)
}

/// Pick the link for `reading_type`: label match first, then position,
/// then the last link.
pub fn choose_reading(links: &[RclLink], reading_type: ReadingType) -> Option<&RclLink> {
    links
        .iter()
        .find(|link| {
            reading_type
                .labels()
                .iter()
                .any(|label| link.preceding_text.contains(label))
        })
        .or_else(|| links.get(reading_type.position()))
        .or_else(|| links.last())
}

/// The reference for `reading_type` on `date`.
pub fn parse_rcl_page(
    html: &str,
    date: NaiveDate,
    reading_type: ReadingType,
) -> Result<String, FetchError> {
    let links = day_links(html, date)?;
    choose_reading(&links, reading_type)
        .map(|link| link.reference.clone())
        .ok_or_else(|| FetchError::new("Could not find scripture readings for today"))
}
