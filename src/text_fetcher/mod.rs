//! Scripture retrieval from public web pages.
//!
//! Three page shapes are scraped: Bible Gateway passage lookups, the
//! Moravian daily texts page, and the Vanderbilt RCL daily readings page.
//! HTML extraction lives in pure functions ([`passage`], [`moravian`],
//! [`rcl`]) so it can be exercised on fixtures; [`TextFetcher`] wires them
//! to a [`PageSource`].

pub mod moravian;
pub mod passage;
pub mod rcl;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::utilities::errors::FetchError;

pub use moravian::{MoravianText, PassageLabel, PassageOutcome};
pub use rcl::ReadingType;

pub const BIBLE_GATEWAY_URL: &str = "https://www.biblegateway.com/passage/";
pub const MORAVIAN_URL: &str = "https://www.moravian.org/daily_texts/";
pub const RCL_URL: &str = "https://lectionary.library.vanderbilt.edu/daily-readings/";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const CLIENT_IDENTIFIER: &str =
    "Mozilla/5.0 (compatible; lectionary-engines/0.3; +https://github.com/lectionary-engines)";

static REFERENCE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[1-3]?\s?[A-Za-z]+\s+\d+(:\d+(-\d+)?)?$").unwrap());

// ---------------------------------------------------------------------------
// Translations
// ---------------------------------------------------------------------------

/// Supported Bible translations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Translation {
    #[default]
    #[serde(rename = "NRSVue")]
    NRSVue,
    #[serde(rename = "NIV")]
    NIV,
    #[serde(rename = "CEB")]
    CEB,
    #[serde(rename = "NLT")]
    NLT,
    #[serde(rename = "MSG")]
    MSG,
}

impl Translation {
    pub const ALL: [Translation; 5] = [Self::NRSVue, Self::NIV, Self::CEB, Self::NLT, Self::MSG];

    pub fn name(&self) -> &'static str {
        match self {
            Self::NRSVue => "NRSVue",
            Self::NIV => "NIV",
            Self::CEB => "CEB",
            Self::NLT => "NLT",
            Self::MSG => "MSG",
        }
    }

    /// Bible Gateway `version=` code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NRSVue => "NRSVUE",
            other => other.name(),
        }
    }

    pub fn full_name(&self) -> &'static str {
        match self {
            Self::NRSVue => "New Revised Standard Version Updated Edition",
            Self::NIV => "New International Version",
            Self::CEB => "Common English Bible",
            Self::NLT => "New Living Translation",
            Self::MSG => "The Message",
        }
    }
}

impl FromStr for Translation {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                FetchError::new(format!(
                    "Translation '{}' not supported. Choose from: NRSVue, NIV, CEB, NLT, MSG",
                    s
                ))
            })
    }
}

impl fmt::Display for Translation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// PageSource
// ---------------------------------------------------------------------------

/// Something that can return the HTML body at a URL.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// GET `url`. When `identify` is set, a descriptive client header is sent.
    async fn get(&self, url: &str, identify: bool) -> Result<String, FetchError>;
}

/// [`PageSource`] over a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpPageSource {
    client: reqwest::Client,
}

impl HttpPageSource {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for HttpPageSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    async fn get(&self, url: &str, identify: bool) -> Result<String, FetchError> {
        let mut request = self.client.get(url);
        if identify {
            request = request.header(reqwest::header::USER_AGENT, CLIENT_IDENTIFIER);
        }
        let response = request
            .send()
            .await
            .map_err(|e| FetchError::new(format!("request to {} failed: {}", url, e)))?;
        let response = response
            .error_for_status()
            .map_err(|e| FetchError::new(format!("{} returned an error: {}", url, e)))?;
        response
            .text()
            .await
            .map_err(|e| FetchError::new(format!("could not read body from {}: {}", url, e)))
    }
}

// ---------------------------------------------------------------------------
// TextFetcher
// ---------------------------------------------------------------------------

/// Turns references, or requests for today's reading, into passage text.
#[derive(Clone)]
pub struct TextFetcher {
    source: Arc<dyn PageSource>,
    default_translation: Translation,
}

impl TextFetcher {
    pub fn new(default_translation: Translation) -> Self {
        Self::with_source(Arc::new(HttpPageSource::new()), default_translation)
    }

    pub fn with_source(source: Arc<dyn PageSource>, default_translation: Translation) -> Self {
        Self {
            source,
            default_translation,
        }
    }

    pub fn default_translation(&self) -> Translation {
        self.default_translation
    }

    /// Same page source, different default translation.
    pub fn with_translation(&self, translation: Translation) -> Self {
        Self {
            source: Arc::clone(&self.source),
            default_translation: translation,
        }
    }

    /// Bible Gateway lookup URL for `reference`.
    pub fn passage_url(reference: &str, translation: Translation) -> String {
        match reqwest::Url::parse_with_params(
            BIBLE_GATEWAY_URL,
            &[("search", reference), ("version", translation.code())],
        ) {
            Ok(url) => url.to_string(),
            Err(_) => format!(
                "{}?search={}&version={}",
                BIBLE_GATEWAY_URL,
                reference,
                translation.code()
            ),
        }
    }

    /// Fetch clean passage text for `reference`.
    pub async fn fetch(
        &self,
        reference: &str,
        translation: Option<Translation>,
    ) -> Result<String, FetchError> {
        let translation = translation.unwrap_or(self.default_translation);
        let url = Self::passage_url(reference, translation);
        log::debug!("Fetching {} ({})", reference, translation);
        let html = self.source.get(&url, false).await?;
        passage::extract_passage_text(&html, reference)
    }

    /// Permissive shape check for a reference. Advisory only.
    pub fn validate_reference(reference: &str) -> bool {
        REFERENCE_PATTERN.is_match(reference)
    }

    /// Today's Moravian daily text: daily readings, watchword and doctrinal text.
    pub async fn fetch_moravian(&self) -> Result<MoravianText, FetchError> {
        let day_name = Local::now().format("%A").to_string();
        self.fetch_moravian_for(&day_name).await
    }

    /// Moravian readings for the weekday named `day_name` (e.g. "Tuesday").
    pub async fn fetch_moravian_for(&self, day_name: &str) -> Result<MoravianText, FetchError> {
        let html = self
            .source
            .get(MORAVIAN_URL, true)
            .await
            .map_err(|e| FetchError::new(format!("Failed to fetch Moravian Daily Text: {}", e.message)))?;
        let refs = moravian::parse_moravian_page(&html, day_name);

        // Passages are fetched in page order.
        let mut outcomes = Vec::new();
        for (label, reference) in refs.labelled() {
            let result = self.fetch(&reference, None).await;
            if let Err(e) = &result {
                log::warn!("Skipping {} {}: {}", label, reference, e);
            }
            outcomes.push(PassageOutcome {
                label,
                reference,
                result,
            });
        }

        MoravianText::assemble(outcomes)
    }

    /// Today's RCL reading of the given type.
    ///
    /// Returns `(reference, text)`.
    pub async fn fetch_rcl(&self, reading_type: ReadingType) -> Result<(String, String), FetchError> {
        self.fetch_rcl_on(Local::now().date_naive(), reading_type)
            .await
    }

    pub async fn fetch_rcl_on(
        &self,
        date: NaiveDate,
        reading_type: ReadingType,
    ) -> Result<(String, String), FetchError> {
        let in_context =
            |e: FetchError| FetchError::new(format!("Failed to fetch RCL reading: {}", e.message));
        let html = self.source.get(RCL_URL, true).await.map_err(in_context)?;
        let reference = rcl::parse_rcl_page(&html, date, reading_type).map_err(in_context)?;
        let text = self.fetch(&reference, None).await?;
        Ok((reference, text))
    }

    pub fn list_translations() -> Vec<(Translation, &'static str)> {
        Translation::ALL.iter().map(|t| (*t, t.code())).collect()
    }
}

impl fmt::Debug for TextFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextFetcher")
            .field("default_translation", &self.default_translation)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
