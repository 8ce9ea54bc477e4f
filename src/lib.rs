//! # Lectionary Engines
//!
//! Biblical study generation: scripture is scraped from Bible Gateway, the
//! Moravian Daily Texts or the Revised Common Lectionary, wrapped in one of
//! three interpretive protocols (Threshold, Palimpsest, Collision) and sent
//! to the Anthropic Messages API. Studies can be reviewed by a second model
//! call and stored as markdown files or in SQLite.
//!
//! The [`cli`] module backs the `lectionary` binary; [`server`] backs
//! `lectionary-server`. Both go through
//! [`services::StudyGeneratorService`].

pub mod cli;
pub mod config;
pub mod engines;
pub mod llms;
pub mod preferences;
pub mod protocol_builder;
pub mod protocols;
pub mod server;
pub mod services;
pub mod storage;
pub mod text_fetcher;
pub mod utilities;
pub mod validation;

pub use config::{Config, WebConfig};
pub use engines::{Engine, EngineKind, GenerationOptions, StudyResult};
pub use llms::ClaudeClient;
pub use preferences::StudyPreferences;
pub use services::{StudyGeneratorService, StudyRequest, TextSource};
pub use storage::StudyStore;
pub use text_fetcher::{TextFetcher, Translation};
pub use validation::ValidationResult;

/// Library version.
pub const VERSION: &str = "0.3.0";
