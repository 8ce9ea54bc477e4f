//! SQLite store for generated studies and preference profiles.
//!
//! Every operation opens its own connection; async callers go through
//! [`StudyStore::run`], which moves the work onto the blocking pool.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::engines::StudyResult;
use crate::preferences::StudyPreferences;
use crate::utilities::errors::StorageError;
use crate::validation::ValidationResult;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const PROFILE_NAME_MAX: usize = 100;

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// A study about to be inserted.
#[derive(Debug, Clone, Default)]
pub struct NewStudy {
    pub engine: String,
    pub reference: String,
    pub content: String,
    pub word_count: i64,
    pub source: Option<String>,
    pub translation: Option<String>,
    pub biblical_text: Option<String>,
    pub profile_name: Option<String>,
    pub custom_preferences: Option<Value>,
    pub validation: Option<ValidationResult>,
    pub file_path: Option<String>,
}

impl NewStudy {
    pub fn from_result(study: &StudyResult, biblical_text: Option<String>) -> Self {
        Self {
            engine: study.engine.to_string(),
            reference: study.reference.clone(),
            content: study.content.clone(),
            word_count: study.metadata.word_count as i64,
            source: study.metadata.source.clone(),
            translation: study.metadata.translation.clone(),
            biblical_text,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredStudy {
    pub id: i64,
    pub engine: String,
    pub reference: String,
    pub content: String,
    pub word_count: Option<i64>,
    pub source: Option<String>,
    pub translation: Option<String>,
    pub biblical_text: Option<String>,
    pub profile_name: Option<String>,
    pub custom_preferences: Option<Value>,
    pub validation_score: Option<i64>,
    pub validation_recommendation: Option<String>,
    /// Typed review, deserialized from the stored JSON column.
    pub validation: Option<ValidationResult>,
    pub created_at: String,
    pub updated_at: Option<String>,
    pub file_path: Option<String>,
    pub file_synced: bool,
}

const STUDY_COLUMNS: &str = "id, engine, reference, content, word_count, source, translation, \
     biblical_text, profile_name, custom_preferences, validation_score, \
     validation_recommendation, validation_data, created_at, updated_at, file_path, file_synced";

fn study_from_row(row: &Row<'_>) -> rusqlite::Result<StoredStudy> {
    let custom: Option<String> = row.get(9)?;
    let validation: Option<String> = row.get(12)?;
    Ok(StoredStudy {
        id: row.get(0)?,
        engine: row.get(1)?,
        reference: row.get(2)?,
        content: row.get(3)?,
        word_count: row.get(4)?,
        source: row.get(5)?,
        translation: row.get(6)?,
        biblical_text: row.get(7)?,
        profile_name: row.get(8)?,
        custom_preferences: custom.and_then(|s| serde_json::from_str(&s).ok()),
        validation_score: row.get(10)?,
        validation_recommendation: row.get(11)?,
        validation: validation.and_then(|s| serde_json::from_str(&s).ok()),
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
        file_path: row.get(15)?,
        file_synced: row.get(16)?,
    })
}

/// Filter and window for listing studies.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StudyQuery {
    #[serde(default)]
    pub skip: u32,
    #[serde(default)]
    pub limit: Option<u32>,
    pub engine: Option<String>,
    pub source: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudyPage {
    pub total: i64,
    pub skip: u32,
    pub limit: u32,
    pub studies: Vec<StoredStudy>,
}

/// A named preference bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    #[serde(flatten)]
    pub preferences: StudyPreferences,
    pub is_default: bool,
    pub created_at: String,
    pub updated_at: Option<String>,
}

const PROFILE_COLUMNS: &str = "id, name, description, study_length, tone_level, language_complexity, \
     focus_areas, cultural_artifacts_level, is_default, created_at, updated_at";

fn profile_from_row(row: &Row<'_>) -> rusqlite::Result<UserProfile> {
    let study_length: String = row.get(3)?;
    let language: String = row.get(5)?;
    Ok(UserProfile {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        preferences: StudyPreferences {
            study_length: study_length.parse().unwrap_or_default(),
            tone_level: row.get(4)?,
            language_complexity: language.parse().unwrap_or_default(),
            focus_areas: row.get(6)?,
            cultural_artifacts_level: row.get(7)?,
        },
        is_default: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

/// Fields for a new profile.
#[derive(Debug, Clone, Default)]
pub struct ProfileDraft {
    pub name: String,
    pub description: Option<String>,
    pub preferences: StudyPreferences,
    pub is_default: bool,
}

/// Partial update. Absent fields are left alone.
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub name: Option<String>,
    /// `Some(None)` clears the description.
    pub description: Option<Option<String>>,
    /// Preference keys to overlay on the stored values.
    pub preferences: Value,
    pub is_default: Option<bool>,
}

impl ProfileChanges {
    pub fn from_value(value: &Value) -> Self {
        Self {
            name: value.get("name").and_then(Value::as_str).map(str::to_string),
            description: value
                .get("description")
                .map(|d| d.as_str().map(str::to_string)),
            preferences: value.clone(),
            is_default: value.get("is_default").and_then(Value::as_bool),
        }
    }
}

struct SeedProfile {
    name: &'static str,
    description: &'static str,
    study_length: &'static str,
    tone_level: i32,
    language_complexity: &'static str,
    focus_areas: Option<&'static str>,
    is_default: bool,
}

const SEED_PROFILES: [SeedProfile; 5] = [
    SeedProfile {
        name: "Default",
        description: "Balanced study with moderate depth",
        study_length: "medium",
        tone_level: 5,
        language_complexity: "standard",
        focus_areas: None,
        is_default: true,
    },
    SeedProfile {
        name: "Seminary Student",
        description: "Academic depth with technical language",
        study_length: "long",
        tone_level: 2,
        language_complexity: "advanced",
        focus_areas: Some("exegesis, historical context, theological implications"),
        is_default: false,
    },
    SeedProfile {
        name: "Daily Devotional",
        description: "Brief, personal, application-focused",
        study_length: "short",
        tone_level: 7,
        language_complexity: "accessible",
        focus_areas: Some("personal growth, spiritual formation, daily application"),
        is_default: false,
    },
    SeedProfile {
        name: "Small Group Leader",
        description: "Balanced depth with discussion prompts",
        study_length: "medium",
        tone_level: 6,
        language_complexity: "standard",
        focus_areas: Some("group discussion, practical application, community"),
        is_default: false,
    },
    SeedProfile {
        name: "Scholar",
        description: "Maximum depth, technical analysis",
        study_length: "long",
        tone_level: 0,
        language_complexity: "advanced",
        focus_areas: Some("textual criticism, intertextuality, theological development"),
        is_default: false,
    },
];

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn checked_name(name: &str) -> Result<String, StorageError> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > PROFILE_NAME_MAX {
        return Err(StorageError::Invalid {
            message: format!("Profile name must be 1-{} characters", PROFILE_NAME_MAX),
        });
    }
    Ok(name.to_string())
}

// ---------------------------------------------------------------------------
// StudyStore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct StudyStore {
    db_path: PathBuf,
}

impl StudyStore {
    /// Open (creating if needed) and migrate the database at `db_path`.
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let store = Self { db_path };
        store.migrate()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> Result<Connection, StorageError> {
        let conn = Connection::open(&self.db_path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(conn)
    }

    /// Run `work` on the blocking pool.
    pub async fn run<T, F>(&self, work: F) -> Result<T, StorageError>
    where
        F: FnOnce(&StudyStore) -> Result<T, StorageError> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || work(&store))
            .await
            .map_err(|e| StorageError::Task {
                message: e.to_string(),
            })?
    }

    // -- Migrations ---------------------------------------------------------

    /// Bring the schema up to date. Safe to run repeatedly.
    pub fn migrate(&self) -> Result<(), StorageError> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;

        tx.execute_batch(
            "CREATE TABLE IF NOT EXISTS studies (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                engine TEXT NOT NULL,
                reference TEXT NOT NULL,
                content TEXT NOT NULL,
                word_count INTEGER,
                source TEXT,
                translation TEXT,
                biblical_text TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT,
                file_path TEXT,
                file_synced INTEGER NOT NULL DEFAULT 0,
                reference_normalized TEXT
            );
            CREATE TABLE IF NOT EXISTS user_profiles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                description TEXT,
                study_length TEXT NOT NULL DEFAULT 'medium',
                tone_level INTEGER NOT NULL DEFAULT 5,
                language_complexity TEXT NOT NULL DEFAULT 'standard',
                focus_areas TEXT,
                is_default INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT
            );",
        )?;

        for (table, column, decl) in [
            ("studies", "profile_name", "TEXT"),
            ("studies", "custom_preferences", "TEXT"),
            ("studies", "validation_score", "INTEGER"),
            ("studies", "validation_recommendation", "TEXT"),
            ("studies", "validation_data", "TEXT"),
            ("user_profiles", "cultural_artifacts_level", "INTEGER NOT NULL DEFAULT 0"),
        ] {
            if !has_column(&tx, table, column)? {
                tx.execute_batch(&format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, decl))?;
                log::info!("Added column {}.{}", table, column);
            }
        }

        // Older databases may carry several defaults; keep the oldest.
        tx.execute(
            "UPDATE user_profiles SET is_default = 0
             WHERE is_default = 1
               AND id <> (SELECT MIN(id) FROM user_profiles WHERE is_default = 1)",
            [],
        )?;

        tx.execute_batch(
            "CREATE INDEX IF NOT EXISTS idx_engine ON studies(engine);
             CREATE INDEX IF NOT EXISTS idx_reference ON studies(reference);
             CREATE INDEX IF NOT EXISTS idx_created ON studies(created_at);
             CREATE INDEX IF NOT EXISTS idx_source ON studies(source);
             CREATE INDEX IF NOT EXISTS idx_profile_name ON user_profiles(name);
             CREATE UNIQUE INDEX IF NOT EXISTS idx_single_default
                 ON user_profiles(is_default) WHERE is_default = 1;",
        )?;

        for seed in &SEED_PROFILES {
            let stamp = now();
            tx.execute(
                "INSERT OR IGNORE INTO user_profiles
                 (name, description, study_length, tone_level, language_complexity,
                  focus_areas, cultural_artifacts_level, is_default, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0,
                         CASE WHEN ?7 AND NOT EXISTS
                             (SELECT 1 FROM user_profiles WHERE is_default = 1)
                         THEN 1 ELSE 0 END,
                         ?8, ?8)",
                params![
                    seed.name,
                    seed.description,
                    seed.study_length,
                    seed.tone_level,
                    seed.language_complexity,
                    seed.focus_areas,
                    seed.is_default,
                    stamp
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    // -- Studies ------------------------------------------------------------

    pub fn insert_study(&self, study: &NewStudy) -> Result<StoredStudy, StorageError> {
        let conn = self.connect()?;
        let stamp = now();
        let custom = study
            .custom_preferences
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let validation = study
            .validation
            .as_ref()
            .map(|v| serde_json::to_string(&v.to_storage_value()))
            .transpose()?;

        conn.execute(
            "INSERT INTO studies
             (engine, reference, content, word_count, source, translation, biblical_text,
              profile_name, custom_preferences, validation_score, validation_recommendation,
              validation_data, created_at, updated_at, file_path, file_synced, reference_normalized)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13, ?14, ?15, ?16)",
            params![
                study.engine,
                study.reference,
                study.content,
                study.word_count,
                study.source,
                study.translation,
                study.biblical_text,
                study.profile_name,
                custom,
                study.validation.as_ref().map(|v| v.overall_score),
                study.validation.as_ref().map(|v| v.recommendation.as_str()),
                validation,
                stamp,
                study.file_path,
                study.file_path.is_some(),
                study.reference.trim().to_lowercase(),
            ],
        )?;
        let id = conn.last_insert_rowid();
        self.get_study_on(&conn, id)
    }

    fn get_study_on(&self, conn: &Connection, id: i64) -> Result<StoredStudy, StorageError> {
        conn.query_row(
            &format!("SELECT {} FROM studies WHERE id = ?1", STUDY_COLUMNS),
            params![id],
            study_from_row,
        )
        .optional()?
        .ok_or_else(|| StorageError::not_found("Study", id))
    }

    pub fn get_study(&self, id: i64) -> Result<StoredStudy, StorageError> {
        let conn = self.connect()?;
        self.get_study_on(&conn, id)
    }

    /// Newest first, filtered by engine and/or source.
    pub fn list_studies(&self, query: &StudyQuery, default_limit: u32) -> Result<StudyPage, StorageError> {
        let conn = self.connect()?;
        let limit = query.limit.unwrap_or(default_limit);
        let filter = "(?1 IS NULL OR engine = ?1) AND (?2 IS NULL OR source = ?2)";

        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM studies WHERE {}", filter),
            params![query.engine, query.source],
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM studies WHERE {} ORDER BY created_at DESC, id DESC LIMIT ?3 OFFSET ?4",
            STUDY_COLUMNS, filter
        ))?;
        let studies = stmt
            .query_map(
                params![query.engine, query.source, limit, query.skip],
                study_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(StudyPage {
            total,
            skip: query.skip,
            limit,
            studies,
        })
    }

    pub fn recent_studies(&self, limit: u32) -> Result<Vec<StoredStudy>, StorageError> {
        Ok(self.list_studies(&StudyQuery::default(), limit)?.studies)
    }

    /// Record that the study has been written to `file_path`.
    pub fn mark_file_synced(&self, id: i64, file_path: &str) -> Result<(), StorageError> {
        let conn = self.connect()?;
        let changed = conn.execute(
            "UPDATE studies SET file_path = ?1, file_synced = 1, updated_at = ?2 WHERE id = ?3",
            params![file_path, now(), id],
        )?;
        if changed == 0 {
            return Err(StorageError::not_found("Study", id));
        }
        Ok(())
    }

    // -- Profiles -----------------------------------------------------------

    /// Default profile first, then by name.
    pub fn list_profiles(&self) -> Result<Vec<UserProfile>, StorageError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM user_profiles ORDER BY is_default DESC, name ASC",
            PROFILE_COLUMNS
        ))?;
        let profiles = stmt
            .query_map([], profile_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(profiles)
    }

    fn get_profile_on(&self, conn: &Connection, id: i64) -> Result<UserProfile, StorageError> {
        conn.query_row(
            &format!("SELECT {} FROM user_profiles WHERE id = ?1", PROFILE_COLUMNS),
            params![id],
            profile_from_row,
        )
        .optional()?
        .ok_or_else(|| StorageError::not_found("Profile", id))
    }

    pub fn get_profile(&self, id: i64) -> Result<UserProfile, StorageError> {
        let conn = self.connect()?;
        self.get_profile_on(&conn, id)
    }

    pub fn get_profile_by_name(&self, name: &str) -> Result<UserProfile, StorageError> {
        let conn = self.connect()?;
        conn.query_row(
            &format!("SELECT {} FROM user_profiles WHERE name = ?1", PROFILE_COLUMNS),
            params![name],
            profile_from_row,
        )
        .optional()?
        .ok_or_else(|| StorageError::not_found("Profile", name))
    }

    pub fn get_default_profile(&self) -> Result<UserProfile, StorageError> {
        let conn = self.connect()?;
        conn.query_row(
            &format!("SELECT {} FROM user_profiles WHERE is_default = 1", PROFILE_COLUMNS),
            [],
            profile_from_row,
        )
        .optional()?
        .ok_or_else(|| StorageError::not_found("Profile", "default"))
    }

    pub fn create_profile(&self, draft: &ProfileDraft) -> Result<UserProfile, StorageError> {
        let name = checked_name(&draft.name)?;
        draft.preferences.validate()?;
        let prefs = &draft.preferences;

        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if draft.is_default {
            tx.execute("UPDATE user_profiles SET is_default = 0 WHERE is_default = 1", [])?;
        }
        let stamp = now();
        let inserted = tx.execute(
            "INSERT INTO user_profiles
             (name, description, study_length, tone_level, language_complexity,
              focus_areas, cultural_artifacts_level, is_default, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
            params![
                name,
                draft.description,
                prefs.study_length.as_str(),
                prefs.tone_level,
                prefs.language_complexity.as_str(),
                prefs.focus(),
                prefs.cultural_artifacts_level,
                draft.is_default,
                stamp
            ],
        );
        match inserted {
            Err(e) if is_constraint_violation(&e) => {
                return Err(StorageError::Conflict {
                    message: format!("Profile '{}' already exists", name),
                })
            }
            other => {
                other?;
            }
        }
        let id = tx.last_insert_rowid();
        let profile = self.get_profile_on(&tx, id)?;
        tx.commit()?;
        Ok(profile)
    }

    pub fn update_profile(&self, id: i64, changes: &ProfileChanges) -> Result<UserProfile, StorageError> {
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let current = self.get_profile_on(&tx, id)?;

        let name = match &changes.name {
            Some(n) => checked_name(n)?,
            None => current.name.clone(),
        };
        let description = match &changes.description {
            Some(d) => d.clone(),
            None => current.description.clone(),
        };
        let prefs = StudyPreferences::overlay(current.preferences.clone(), &changes.preferences)?;
        let is_default = changes.is_default.unwrap_or(current.is_default);

        if is_default && !current.is_default {
            tx.execute(
                "UPDATE user_profiles SET is_default = 0 WHERE is_default = 1 AND id <> ?1",
                params![id],
            )?;
        }
        let updated = tx.execute(
            "UPDATE user_profiles
             SET name = ?1, description = ?2, study_length = ?3, tone_level = ?4,
                 language_complexity = ?5, focus_areas = ?6, cultural_artifacts_level = ?7,
                 is_default = ?8, updated_at = ?9
             WHERE id = ?10",
            params![
                name,
                description,
                prefs.study_length.as_str(),
                prefs.tone_level,
                prefs.language_complexity.as_str(),
                prefs.focus(),
                prefs.cultural_artifacts_level,
                is_default,
                now(),
                id
            ],
        );
        match updated {
            Err(e) if is_constraint_violation(&e) => {
                return Err(StorageError::Conflict {
                    message: format!("Profile '{}' already exists", name),
                })
            }
            other => {
                other?;
            }
        }
        let profile = self.get_profile_on(&tx, id)?;
        tx.commit()?;
        Ok(profile)
    }

    /// Delete a non-default profile. Returns the deleted profile's name.
    pub fn delete_profile(&self, id: i64) -> Result<String, StorageError> {
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let profile = self.get_profile_on(&tx, id)?;
        if profile.is_default {
            return Err(StorageError::Conflict {
                message: "Cannot delete the default profile. Set another profile as default first."
                    .to_string(),
            });
        }
        tx.execute("DELETE FROM user_profiles WHERE id = ?1", params![id])?;
        tx.commit()?;
        Ok(profile.name)
    }

    /// Make `id` the only default profile, atomically.
    pub fn set_default_profile(&self, id: i64) -> Result<UserProfile, StorageError> {
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        self.get_profile_on(&tx, id)?;
        tx.execute(
            "UPDATE user_profiles SET is_default = 0, updated_at = ?1 WHERE is_default = 1 AND id <> ?2",
            params![now(), id],
        )?;
        tx.execute(
            "UPDATE user_profiles SET is_default = 1, updated_at = ?1 WHERE id = ?2",
            params![now(), id],
        )?;
        let profile = self.get_profile_on(&tx, id)?;
        tx.commit()?;
        log::info!("Default profile is now '{}'", profile.name);
        Ok(profile)
    }
}

fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool, StorageError> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names.iter().any(|n| n == column))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preferences::StudyLength;
    use serde_json::json;
    use tempfile::TempDir;

    fn store() -> (TempDir, StudyStore) {
        let dir = TempDir::new().unwrap();
        let store = StudyStore::open(dir.path().join("lectionary.db")).unwrap();
        (dir, store)
    }

    fn new_study(engine: &str, source: &str, reference: &str) -> NewStudy {
        NewStudy {
            engine: engine.into(),
            reference: reference.into(),
            content: "# Study".into(),
            word_count: 2,
            source: Some(source.into()),
            translation: Some("NRSVue".into()),
            ..Default::default()
        }
    }

    fn default_count(store: &StudyStore) -> usize {
        store
            .list_profiles()
            .unwrap()
            .iter()
            .filter(|p| p.is_default)
            .count()
    }

    #[test]
    fn test_migrate_is_idempotent_and_seeds_profiles() {
        let (_dir, store) = store();
        store.migrate().unwrap();
        store.migrate().unwrap();

        let profiles = store.list_profiles().unwrap();
        assert_eq!(profiles.len(), 5);
        assert_eq!(profiles[0].name, "Default");
        assert!(profiles[0].is_default);
        assert_eq!(default_count(&store), 1);

        let scholar = store.get_profile_by_name("Scholar").unwrap();
        assert_eq!(scholar.preferences.tone_level, 0);
        assert_eq!(scholar.preferences.study_length, StudyLength::Long);
    }

    #[test]
    fn test_migrate_adds_columns_to_legacy_schema() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("legacy.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE studies (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                engine TEXT NOT NULL, reference TEXT NOT NULL, content TEXT NOT NULL,
                word_count INTEGER, source TEXT, translation TEXT, biblical_text TEXT,
                created_at TEXT NOT NULL, updated_at TEXT, file_path TEXT,
                file_synced INTEGER NOT NULL DEFAULT 0, reference_normalized TEXT);",
        )
        .unwrap();
        drop(conn);

        let store = StudyStore::open(&path).unwrap();
        let conn = Connection::open(&path).unwrap();
        for column in ["profile_name", "custom_preferences", "validation_data"] {
            assert!(has_column(&conn, "studies", column).unwrap(), "{}", column);
        }
        assert!(store.insert_study(&new_study("threshold", "paste", "Ruth 1")).is_ok());
    }

    #[test]
    fn test_insert_and_get_study_with_validation() {
        let (_dir, store) = store();
        let mut study = new_study("collision", "run", "Mark 5:1-5");
        study.profile_name = Some("Scholar".into());
        study.custom_preferences = Some(json!({"tone_level": 1}));
        study.validation = Some(ValidationResult::from_json(
            r#"{"overall_score": 82, "recommendation": "approve", "summary": "Solid"}"#,
        ));

        let stored = store.insert_study(&study).unwrap();
        let fetched = store.get_study(stored.id).unwrap();

        assert_eq!(fetched.reference, "Mark 5:1-5");
        assert_eq!(fetched.validation_score, Some(82));
        assert_eq!(fetched.validation_recommendation.as_deref(), Some("approve"));
        let validation = fetched.validation.unwrap();
        assert_eq!(validation.summary, "Solid");
        assert!(validation.raw_response.is_none());
        assert_eq!(fetched.custom_preferences, Some(json!({"tone_level": 1})));
        assert!(!fetched.file_synced);
    }

    #[test]
    fn test_get_missing_study() {
        let (_dir, store) = store();
        assert!(matches!(store.get_study(99), Err(StorageError::NotFound { .. })));
    }

    #[test]
    fn test_list_filters_and_paginates() {
        let (_dir, store) = store();
        for i in 0..5 {
            store
                .insert_study(&new_study("threshold", "paste", &format!("Psalm {}", i + 1)))
                .unwrap();
        }
        store.insert_study(&new_study("palimpsest", "rcl", "Mark 10")).unwrap();

        let page = store
            .list_studies(
                &StudyQuery {
                    skip: 1,
                    limit: Some(2),
                    engine: Some("threshold".into()),
                    source: None,
                },
                20,
            )
            .unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.studies.len(), 2);
        assert_eq!(page.studies[0].reference, "Psalm 4");

        let rcl = store
            .list_studies(
                &StudyQuery {
                    source: Some("rcl".into()),
                    ..Default::default()
                },
                20,
            )
            .unwrap();
        assert_eq!(rcl.total, 1);
        assert_eq!(rcl.limit, 20);

        assert_eq!(store.recent_studies(3).unwrap()[0].reference, "Mark 10");
    }

    #[test]
    fn test_mark_file_synced() {
        let (_dir, store) = store();
        let stored = store.insert_study(&new_study("threshold", "paste", "Ruth 1")).unwrap();
        store.mark_file_synced(stored.id, "outputs/threshold_ruth-1.md").unwrap();
        let fetched = store.get_study(stored.id).unwrap();
        assert!(fetched.file_synced);
        assert_eq!(fetched.file_path.as_deref(), Some("outputs/threshold_ruth-1.md"));
        assert!(store.mark_file_synced(404, "x").is_err());
    }

    #[test]
    fn test_create_profile_conflict_and_validation() {
        let (_dir, store) = store();
        let draft = ProfileDraft {
            name: "Youth Group".into(),
            preferences: StudyPreferences {
                tone_level: 7,
                cultural_artifacts_level: 6,
                ..Default::default()
            },
            ..Default::default()
        };
        let created = store.create_profile(&draft).unwrap();
        assert_eq!(created.preferences.cultural_artifacts_level, 6);
        assert!(!created.is_default);

        assert!(matches!(store.create_profile(&draft), Err(StorageError::Conflict { .. })));

        let bad = ProfileDraft {
            name: "Bad".into(),
            preferences: StudyPreferences {
                tone_level: 12,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(store.create_profile(&bad), Err(StorageError::Preferences(_))));
        let blank = ProfileDraft {
            name: "  ".into(),
            ..Default::default()
        };
        assert!(matches!(store.create_profile(&blank), Err(StorageError::Invalid { .. })));
    }

    #[test]
    fn test_create_default_profile_replaces_default() {
        let (_dir, store) = store();
        let created = store
            .create_profile(&ProfileDraft {
                name: "Mine".into(),
                is_default: true,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(store.get_default_profile().unwrap().id, created.id);
        assert_eq!(default_count(&store), 1);
    }

    #[test]
    fn test_update_profile_overlays_fields() {
        let (_dir, store) = store();
        let scholar = store.get_profile_by_name("Scholar").unwrap();
        let changes = ProfileChanges::from_value(&json!({
            "name": "Senior Scholar",
            "tone_level": 1,
            "description": null
        }));
        let updated = store.update_profile(scholar.id, &changes).unwrap();
        assert_eq!(updated.name, "Senior Scholar");
        assert_eq!(updated.preferences.tone_level, 1);
        assert_eq!(updated.preferences.study_length, StudyLength::Long);
        assert_eq!(updated.description, None);

        let clash = ProfileChanges::from_value(&json!({"name": "Default"}));
        assert!(matches!(
            store.update_profile(scholar.id, &clash),
            Err(StorageError::Conflict { .. })
        ));
        let bad = ProfileChanges::from_value(&json!({"study_length": "huge"}));
        assert!(matches!(
            store.update_profile(scholar.id, &bad),
            Err(StorageError::Preferences(_))
        ));
    }

    #[test]
    fn test_delete_profile_rules() {
        let (_dir, store) = store();
        let default = store.get_default_profile().unwrap();
        assert!(matches!(store.delete_profile(default.id), Err(StorageError::Conflict { .. })));

        let scholar = store.get_profile_by_name("Scholar").unwrap();
        assert_eq!(store.delete_profile(scholar.id).unwrap(), "Scholar");
        assert!(matches!(store.get_profile(scholar.id), Err(StorageError::NotFound { .. })));
    }

    #[test]
    fn test_set_default_keeps_single_default() {
        let (_dir, store) = store();
        let scholar = store.get_profile_by_name("Scholar").unwrap();
        store.set_default_profile(scholar.id).unwrap();
        assert_eq!(store.get_default_profile().unwrap().name, "Scholar");
        assert_eq!(default_count(&store), 1);
        assert!(store.set_default_profile(999).is_err());
        assert_eq!(default_count(&store), 1);
    }

    #[test]
    fn test_partial_index_rejects_second_default() {
        let (_dir, store) = store();
        let conn = Connection::open(store.path()).unwrap();
        let err = conn
            .execute("UPDATE user_profiles SET is_default = 1 WHERE name = 'Scholar'", [])
            .unwrap_err();
        assert!(is_constraint_violation(&err));
    }

    #[tokio::test]
    async fn test_concurrent_set_default() {
        let (_dir, store) = store();
        let ids: Vec<i64> = store.list_profiles().unwrap().iter().map(|p| p.id).collect();
        let tasks: Vec<_> = ids
            .iter()
            .map(|id| {
                let id = *id;
                store.run(move |s| s.set_default_profile(id))
            })
            .collect();
        for result in futures::future::join_all(tasks).await {
            result.unwrap();
        }
        assert_eq!(default_count(&store), 1);
    }
}
