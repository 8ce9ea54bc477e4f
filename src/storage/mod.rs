//! Study persistence: markdown files for the CLI, SQLite for the server.

pub mod db;
pub mod files;

pub use db::{NewStudy, ProfileChanges, ProfileDraft, StoredStudy, StudyPage, StudyQuery, StudyStore, UserProfile};
pub use files::{list_studies, read_study, save_study, SavedStudy};
