//! Environment-driven configuration.
//!
//! Values come from process environment variables, optionally seeded from
//! a `.env` file via `dotenvy`. Both the CLI and the server share [`Config`];
//! the server layers [`WebConfig`] on top.

use std::path::{Path, PathBuf};

use serde::Serialize;

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_VALIDATION_MODEL: &str = "claude-3-5-haiku-20241022";

/// Settings shared by the CLI and the web server.
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    #[serde(skip_serializing)]
    pub anthropic_api_key: String,
    #[serde(skip_serializing)]
    pub esv_api_key: Option<String>,
    #[serde(skip_serializing)]
    pub bible_api_key: Option<String>,

    pub default_translation: String,
    pub default_engine: String,
    pub output_directory: PathBuf,

    pub model: String,
    pub validation_model: String,
    pub enable_prompt_caching: bool,
    pub enable_validation: bool,

    // Reserved for lexicon/morphology/cross-reference integrations.
    pub enable_lexicons: bool,
    pub enable_morphology: bool,
    pub enable_cross_references: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl Config {
    /// Load from the environment, reading `.env` first if present.
    pub fn load() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an explicit `.env` file, then the environment.
    pub fn load_from(env_file: &Path) -> Self {
        if let Err(e) = dotenvy::from_path(env_file) {
            log::warn!("Could not read {}: {}", env_file.display(), e);
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        Self {
            anthropic_api_key: get("ANTHROPIC_API_KEY", ""),
            esv_api_key: lookup("ESV_API_KEY"),
            bible_api_key: lookup("BIBLE_API_KEY"),
            default_translation: get("DEFAULT_TRANSLATION", "NRSVue"),
            default_engine: get("DEFAULT_ENGINE", "threshold"),
            output_directory: PathBuf::from(get("OUTPUT_DIRECTORY", "outputs")),
            model: get("CLAUDE_MODEL", DEFAULT_MODEL),
            validation_model: get("VALIDATION_MODEL", DEFAULT_VALIDATION_MODEL),
            enable_prompt_caching: parse_flag(lookup("ENABLE_PROMPT_CACHING"), true),
            enable_validation: parse_flag(lookup("ENABLE_VALIDATION"), false),
            enable_lexicons: parse_flag(lookup("ENABLE_LEXICONS"), false),
            enable_morphology: parse_flag(lookup("ENABLE_MORPHOLOGY"), false),
            enable_cross_references: parse_flag(lookup("ENABLE_CROSS_REFERENCES"), false),
        }
    }

    pub fn validate_api_key(&self) -> bool {
        !self.anthropic_api_key.trim().is_empty()
    }

    pub fn output_path(&self, filename: &str) -> PathBuf {
        self.output_directory.join(filename)
    }
}

/// Server settings layered over [`Config`].
#[derive(Debug, Clone, Serialize)]
pub struct WebConfig {
    #[serde(flatten)]
    pub base: Config,
    pub database_url: String,
    pub enable_file_sync: bool,
    pub web_host: String,
    pub web_port: u16,
    pub studies_per_page: u32,
}

impl WebConfig {
    pub fn load() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let base = Config::from_lookup(&lookup);
        Self {
            base,
            database_url: lookup("DATABASE_URL")
                .unwrap_or_else(|| "sqlite:///./lectionary.db".to_string()),
            enable_file_sync: parse_flag(lookup("ENABLE_FILE_SYNC"), true),
            web_host: lookup("WEB_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            web_port: parse_number("WEB_PORT", lookup("WEB_PORT"), 8000),
            studies_per_page: parse_number("STUDIES_PER_PAGE", lookup("STUDIES_PER_PAGE"), 20),
        }
    }

    /// Filesystem path of the SQLite database named by `database_url`.
    ///
    /// Accepts `sqlite:///path`, `sqlite://path` or a bare path.
    pub fn database_path(&self) -> PathBuf {
        let url = self.database_url.as_str();
        let path = url
            .strip_prefix("sqlite:///")
            .or_else(|| url.strip_prefix("sqlite://"))
            .unwrap_or(url);
        PathBuf::from(path)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.web_host, self.web_port)
    }
}

fn parse_flag(value: Option<String>, default: bool) -> bool {
    match value {
        Some(v) => v.trim().eq_ignore_ascii_case("true"),
        None => default,
    }
}

fn parse_number<T>(key: &str, value: Option<String>, default: T) -> T
where
    T: std::str::FromStr + Copy + std::fmt::Display,
{
    match value {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            log::warn!("Ignoring malformed {}={:?}, using {}", key, raw, default);
            default
        }),
        None => default,
    }
}
