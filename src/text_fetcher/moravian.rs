//! Moravian daily texts page.
//!
//! The page lists a rotating week of readings. Today's paragraph reads like
//! `Tuesday, October 20 — Psalm 5; Genesis 6:1-7:10; Matthew 3`. The
//! watchword and doctrinal text are Bible Gateway links further down.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;

use crate::utilities::errors::FetchError;

static PARAGRAPHS: Lazy<Selector> = Lazy::new(|| Selector::parse("p").unwrap());
static LINKS: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());
static SEARCH_PARAM: Lazy<Regex> = Lazy::new(|| Regex::new(r"search=([^&]+)").unwrap());
static HAS_DIGIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d").unwrap());

const SECTION_RULE_WIDTH: usize = 80;

/// References found on the page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MoravianRefs {
    pub daily_readings: Vec<String>,
    pub watchword: Option<String>,
    pub daily_text: Option<String>,
}

impl MoravianRefs {
    /// Every reference with its label, in presentation order.
    pub fn labelled(&self) -> Vec<(PassageLabel, String)> {
        let mut out: Vec<(PassageLabel, String)> = self
            .daily_readings
            .iter()
            .map(|r| (PassageLabel::DailyReading, r.clone()))
            .collect();
        if let Some(r) = &self.watchword {
            out.push((PassageLabel::Watchword, r.clone()));
        }
        if let Some(r) = &self.daily_text {
            out.push((PassageLabel::DailyText, r.clone()));
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PassageLabel {
    DailyReading,
    Watchword,
    DailyText,
}

impl PassageLabel {
    pub fn header(&self) -> &'static str {
        match self {
            Self::DailyReading => "DAILY READING",
            Self::Watchword => "WATCHWORD",
            Self::DailyText => "DAILY TEXT",
        }
    }
}

impl fmt::Display for PassageLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header())
    }
}

/// Outcome of fetching one passage of the day.
#[derive(Debug, Clone)]
pub struct PassageOutcome {
    pub label: PassageLabel,
    pub reference: String,
    pub result: Result<String, FetchError>,
}

/// The assembled daily text.
#[derive(Debug, Clone)]
pub struct MoravianText {
    /// Summary such as `Psalm 5 | Watchword: Isaiah 40:31 | Daily Text: John 1:5`.
    pub reference: String,
    /// Labelled passages separated by horizontal rules.
    pub text: String,
    pub outcomes: Vec<PassageOutcome>,
}

impl MoravianText {
    /// Combine per-passage outcomes. Fails only when none succeeded.
    pub fn assemble(outcomes: Vec<PassageOutcome>) -> Result<Self, FetchError> {
        let sections: Vec<String> = outcomes
            .iter()
            .filter_map(|o| {
                o.result
                    .as_ref()
                    .ok()
                    .map(|text| format!("{} — {}:\n{}", o.label.header(), o.reference, text))
            })
            .collect();

        if sections.is_empty() {
            let detail = if outcomes.is_empty() {
                "no references found on the page".to_string()
            } else {
                format!("all {} passage fetches failed", outcomes.len())
            };
            return Err(FetchError::new(format!(
                "Could not find any Moravian Daily Text readings ({})",
                detail
            )));
        }

        let separator = format!("\n\n{}\n\n", "=".repeat(SECTION_RULE_WIDTH));
        let text = sections.join(&separator);

        let reference = outcomes
            .iter()
            .map(|o| match o.label {
                PassageLabel::DailyReading => o.reference.clone(),
                PassageLabel::Watchword => format!("Watchword: {}", o.reference),
                PassageLabel::DailyText => format!("Daily Text: {}", o.reference),
            })
            .collect::<Vec<_>>()
            .join(" | ");

        Ok(Self {
            reference,
            text,
            outcomes,
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = &PassageOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }

    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }
}

/// Decode the `search=` parameter of a Bible Gateway link.
pub fn reference_from_href(href: &str) -> Option<String> {
    let raw = SEARCH_PARAM.captures(href)?.get(1)?.as_str();
    Some(
        raw.replace("%20", " ")
            .replace('+', " ")
            .replace("%3A", ":")
            .replace("%3a", ":"),
    )
}

fn is_passage_link(el: &ElementRef<'_>) -> bool {
    el.value()
        .attr("href")
        .is_some_and(|h| h.contains("biblegateway.com/passage"))
}

fn element_text(el: &ElementRef<'_>) -> String {
    el.text().collect()
}

/// Find today's references on the daily texts page.
pub fn parse_moravian_page(html: &str, day_name: &str) -> MoravianRefs {
    let document = Html::parse_document(html);
    let mut refs = MoravianRefs::default();

    for p in document.select(&PARAGRAPHS) {
        let text = element_text(&p);

        if text.contains(day_name) && text.contains('—') {
            if let Some(listing) = text.split('—').nth(1) {
                refs.daily_readings.extend(
                    listing
                        .split(';')
                        .map(str::trim)
                        .filter(|r| !r.is_empty() && HAS_DIGIT.is_match(r))
                        .map(str::to_string),
                );
            }
        }

        if !text.contains("Watchword") && refs.watchword.is_none() {
            refs.watchword = p
                .select(&LINKS)
                .find(is_passage_link)
                .and_then(|a| a.value().attr("href").and_then(reference_from_href));
        }
    }

    let links: Vec<ElementRef<'_>> = document.select(&LINKS).filter(is_passage_link).collect();
    if links.len() >= 2 {
        if refs.watchword.is_none() {
            refs.watchword = links[0].value().attr("href").and_then(reference_from_href);
        }
        refs.daily_text = links[1].value().attr("href").and_then(reference_from_href);
    }

    refs
}
