//! Markdown study files with JSON sidecars.
//!
//! Layout under the output directory:
//!
//! ```text
//! threshold_john-3-16-21_20261019.md
//! .metadata/threshold_john-3-16-21_20261019.json
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::engines::StudyResult;
use crate::utilities::errors::StorageError;
use crate::utilities::string_utils::sanitize_filename;

const METADATA_DIR: &str = ".metadata";

/// Sidecar record for a saved study.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedStudy {
    pub engine: String,
    pub reference: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub word_count: usize,
    #[serde(default)]
    pub constraints: Value,
    pub filepath: String,
}

/// File stem for a study saved today.
pub fn study_stem(engine: &str, reference: &str) -> String {
    format!(
        "{}_{}_{}",
        engine,
        sanitize_filename(reference),
        Local::now().format("%Y%m%d")
    )
}

// A JSON string is also a valid double-quoted YAML scalar.
fn frontmatter(study: &StudyResult) -> Result<String, StorageError> {
    Ok(format!(
        "---\nengine: {}\nreference: {}\ndate: {}\nword_count: {}\n---\n\n",
        study.engine,
        serde_json::to_string(&study.reference)?,
        Local::now().format("%Y-%m-%d"),
        study.metadata.word_count
    ))
}

/// Write `study` as markdown plus a metadata sidecar. Returns the markdown path.
///
/// A study of the same engine and reference saved on the same day
/// replaces the earlier file.
pub fn save_study(study: &StudyResult, output_dir: &Path) -> Result<PathBuf, StorageError> {
    let metadata_dir = output_dir.join(METADATA_DIR);
    fs::create_dir_all(&metadata_dir)?;

    let stem = study_stem(study.engine.as_str(), &study.reference);
    let filepath = output_dir.join(format!("{}.md", stem));

    let mut body = frontmatter(study)?;
    body.push_str(&study.content);
    fs::write(&filepath, body)?;

    let sidecar = SavedStudy {
        engine: study.engine.to_string(),
        reference: study.reference.clone(),
        timestamp: study.metadata.timestamp.clone(),
        word_count: study.metadata.word_count,
        constraints: serde_json::to_value(&study.metadata.constraints)?,
        filepath: filepath.to_string_lossy().into_owned(),
    };
    fs::write(
        metadata_dir.join(format!("{}.json", stem)),
        serde_json::to_string_pretty(&sidecar)?,
    )?;

    log::info!("Saved study to {}", filepath.display());
    Ok(filepath)
}

/// All saved studies, most recent first. Unreadable sidecars are skipped.
pub fn list_studies(output_dir: &Path) -> Result<Vec<SavedStudy>, StorageError> {
    let metadata_dir = output_dir.join(METADATA_DIR);
    if !metadata_dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut studies = Vec::new();
    for entry in fs::read_dir(&metadata_dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let parsed = fs::read_to_string(&path)
            .map_err(StorageError::from)
            .and_then(|raw| serde_json::from_str::<SavedStudy>(&raw).map_err(StorageError::from));
        match parsed {
            Ok(study) => studies.push(study),
            Err(e) => log::warn!("Skipping {}: {}", path.display(), e),
        }
    }

    studies.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    Ok(studies)
}

pub fn read_study(path: &Path) -> Result<String, StorageError> {
    Ok(fs::read_to_string(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::{EngineKind, StudyMetadata};
    use crate::protocols::threshold;
    use tempfile::TempDir;

    fn study(reference: &str, timestamp: &str) -> StudyResult {
        StudyResult {
            engine: EngineKind::Threshold,
            reference: reference.to_string(),
            content: "# Study\n\nBody text here.".to_string(),
            metadata: StudyMetadata {
                word_count: 4,
                timestamp: timestamp.to_string(),
                constraints: threshold::output_constraints(),
                layers: None,
                steps: None,
                collision_vectors: None,
                preferences: None,
                source: None,
                translation: None,
            },
        }
    }

    #[test]
    fn test_save_writes_markdown_and_sidecar() {
        let dir = TempDir::new().unwrap();
        let path = save_study(&study("John 3:16-21", "2026-10-19T08:00:00+00:00"), dir.path()).unwrap();

        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("threshold_john-3-16-21_"));
        assert!(name.ends_with(".md"));

        let body = read_study(&path).unwrap();
        assert!(body.starts_with("---\nengine: threshold\nreference: \"John 3:16-21\"\ndate: "));
        assert!(body.contains("word_count: 4\n---\n\n# Study"));

        let listed = list_studies(dir.path()).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].reference, "John 3:16-21");
        assert_eq!(listed[0].filepath, path.to_string_lossy());
        assert_eq!(listed[0].constraints["min_words"], 2500);
    }

    #[test]
    fn test_frontmatter_quotes_joined_reference() {
        let dir = TempDir::new().unwrap();
        let path = save_study(
            &study("Psalm 1:1 | John 3:16", "2026-10-19T08:00:00+00:00"),
            dir.path(),
        )
        .unwrap();
        let body = read_study(&path).unwrap();
        assert!(body.contains("\nreference: \"Psalm 1:1 | John 3:16\"\n"));
        assert_eq!(list_studies(dir.path()).unwrap()[0].reference, "Psalm 1:1 | John 3:16");
    }

    #[test]
    fn test_list_is_newest_first_and_skips_garbage() {
        let dir = TempDir::new().unwrap();
        save_study(&study("Ruth 1", "2026-10-01T08:00:00+00:00"), dir.path()).unwrap();
        save_study(&study("Mark 5", "2026-10-19T08:00:00+00:00"), dir.path()).unwrap();
        fs::write(dir.path().join(METADATA_DIR).join("broken.json"), "{").unwrap();

        let listed = list_studies(dir.path()).unwrap();
        let refs: Vec<&str> = listed.iter().map(|s| s.reference.as_str()).collect();
        assert_eq!(refs, vec!["Mark 5", "Ruth 1"]);
    }

    #[test]
    fn test_list_empty_directory() {
        let dir = TempDir::new().unwrap();
        assert!(list_studies(&dir.path().join("missing")).unwrap().is_empty());
    }

    #[test]
    fn test_read_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(read_study(&dir.path().join("nope.md")), Err(StorageError::Io(_))));
    }
}
