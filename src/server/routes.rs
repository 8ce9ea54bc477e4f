//! Axum route handlers for the lectionary web API.
//!
//! # Routes
//!
//! - `GET  /health`: Returns `{"status": "ok", "version": "0.3.0"}`
//! - `POST /api/generate`: Generate, validate and store a study
//! - `GET  /api/studies`: Paginated study list (`skip`, `limit`, `engine`, `source`)
//! - `GET  /api/studies/:id`: One study, including its validation
//! - `GET  /api/engines`: Engine names and descriptions
//! - `GET  /api/translations`: Supported translations
//! - `GET  /api/collision-vectors`: Collision option lists (`category` optional)
//!
//! Profile routes live in [`super::profiles`].

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::WebConfig;
use crate::engines::{CollisionEngine, EngineKind, GenerationOptions};
use crate::preferences::StudyPreferences;
use crate::protocols::collision::VectorCategory;
use crate::services::{StudyGeneratorService, StudyRequest, TextSource};
use crate::storage::{save_study, NewStudy, StoredStudy, StudyPage, StudyQuery, StudyStore};
use crate::text_fetcher::{ReadingType, Translation};
use crate::utilities::errors::{StorageError, StudyError};

use super::profiles;

/// Shared application state for the HTTP server.
#[derive(Clone)]
pub struct AppState {
    /// Fetcher, engines and model client.
    pub generator: Arc<StudyGeneratorService>,
    /// SQLite study and profile store.
    pub store: StudyStore,
    pub config: Arc<WebConfig>,
}

impl AppState {
    pub fn new(generator: StudyGeneratorService, store: StudyStore, config: WebConfig) -> Self {
        Self {
            generator: Arc::new(generator),
            store,
            config: Arc::new(config),
        }
    }

    /// Open the configured database and wire the production generator.
    pub fn from_config(config: WebConfig) -> Result<Self, StorageError> {
        let store = StudyStore::open(config.database_path())?;
        let generator = StudyGeneratorService::from_config(&config.base);
        Ok(Self::new(generator, store, config))
    }
}

/// Build the axum router with all routes.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/generate", post(generate_handler))
        .route("/api/studies", get(list_studies_handler))
        .route("/api/studies/:id", get(get_study_handler))
        .route("/api/engines", get(engines_handler))
        .route("/api/translations", get(translations_handler))
        .route("/api/collision-vectors", get(collision_vectors_handler))
        .merge(profiles::routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

pub(crate) type ApiError = (StatusCode, Json<Value>);

pub(crate) fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({ "error": message.into() })))
}

/// Bad input is 400; upstream scraping and model failures are 502.
pub(crate) fn study_error(error: StudyError) -> ApiError {
    let status = match &error {
        StudyError::InvalidRequest { .. }
        | StudyError::Preferences(_)
        | StudyError::UnknownEngine { .. } => StatusCode::BAD_REQUEST,
        StudyError::Fetch(_) | StudyError::Generation(_) => StatusCode::BAD_GATEWAY,
    };
    if status == StatusCode::BAD_GATEWAY {
        tracing::warn!("Study generation failed: {}", error);
    }
    api_error(status, error.to_string())
}

pub(crate) fn storage_error(error: StorageError) -> ApiError {
    let status = match &error {
        StorageError::NotFound { .. } => StatusCode::NOT_FOUND,
        StorageError::Invalid { .. } | StorageError::Preferences(_) | StorageError::Conflict { .. } => {
            StatusCode::BAD_REQUEST
        }
        StorageError::Io(_)
        | StorageError::Json(_)
        | StorageError::Sqlite(_)
        | StorageError::Task { .. } => {
            tracing::error!("Storage failure: {}", error);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    api_error(status, error.to_string())
}

fn bad_request(message: impl Into<String>) -> ApiError {
    api_error(StatusCode::BAD_REQUEST, message)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /health: liveness probe.
async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": crate::VERSION,
        "service": "lectionary-engines",
    }))
}

/// Body of `POST /api/generate`.
#[derive(Debug, Default, Deserialize)]
pub struct GenerateRequest {
    pub engine: String,
    /// `paste` (default), `run`, `moravian` or `rcl`.
    #[serde(default)]
    pub source: Option<String>,
    pub reference: Option<String>,
    pub text: Option<String>,
    pub translation: Option<String>,
    /// RCL reading: `ot`, `psalm`, `epistle` or `gospel` (default).
    pub rcl_reading: Option<String>,
    /// Name of a stored profile to start from.
    pub profile: Option<String>,
    /// Preference keys overriding the profile for this study only.
    pub preferences: Option<Value>,
    pub collision_vector: Option<String>,
    /// Force the review pass on or off; defaults to the server setting.
    pub validate: Option<bool>,
    /// Skip the markdown copy when false, even with file sync enabled.
    pub save_file: Option<bool>,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// POST /api/generate: produce and persist one study.
///
/// 1. Parses engine, source, translation and reading
/// 2. Resolves preferences from the named profile plus per-study overrides
/// 3. Fetches text as needed and runs the engine
/// 4. Optionally validates, then stores the row and (optionally) a markdown file
async fn generate_handler(
    State(state): State<AppState>,
    Json(body): Json<GenerateRequest>,
) -> Result<Json<StoredStudy>, ApiError> {
    let engine: EngineKind = body.engine.parse().map_err(study_error)?;
    let source = match non_blank(&body.source) {
        Some(s) => s.parse::<TextSource>().map_err(study_error)?,
        None => TextSource::default(),
    };
    let translation = match non_blank(&body.translation) {
        Some(t) => Some(t.parse::<Translation>().map_err(|e| bad_request(e.message))?),
        None => None,
    };
    let reading = match non_blank(&body.rcl_reading) {
        Some(r) => r.parse::<ReadingType>().map_err(|e| bad_request(e.message))?,
        None => ReadingType::default(),
    };

    let profile_name = non_blank(&body.profile).map(str::to_string);
    let base = match &profile_name {
        Some(name) => {
            let name = name.clone();
            let profile = state
                .store
                .run(move |store| store.get_profile_by_name(&name))
                .await
                .map_err(storage_error)?;
            Some(profile.preferences)
        }
        None => None,
    };
    let preferences = match (base, &body.preferences) {
        (None, None) => None,
        (base, Some(overrides)) => Some(
            StudyPreferences::overlay(base.unwrap_or_default(), overrides)
                .map_err(|e| study_error(e.into()))?,
        ),
        (Some(base), None) => Some(base),
    };

    let request = StudyRequest {
        engine,
        source,
        reference: body.reference.clone(),
        text: body.text.clone(),
        translation,
        reading,
        options: GenerationOptions {
            preferences,
            collision_vector: non_blank(&body.collision_vector).map(str::to_string),
            custom_vectors: None,
        },
    };

    tracing::info!("Generating {} study from {}", engine, source);
    let generated = state
        .generator
        .generate_study(&request)
        .await
        .map_err(study_error)?;

    let generator = &state.generator;
    let study = &generated.study;
    let validation = match body.validate {
        Some(true) => Some(
            generator
                .run_validation(&generated.biblical_text, &study.reference, &study.content)
                .await,
        ),
        None if generator.validation_enabled() => Some(
            generator
                .validate(&generated.biblical_text, &study.reference, &study.content)
                .await,
        ),
        _ => None,
    };

    let mut row = NewStudy::from_result(study, Some(generated.biblical_text.clone()));
    row.profile_name = profile_name;
    row.custom_preferences = body.preferences.clone();
    row.validation = validation;

    let sync_dir = (state.config.enable_file_sync && body.save_file.unwrap_or(true))
        .then(|| state.config.base.output_directory.clone());
    let result = generated.study;

    let stored = state
        .store
        .run(move |store| {
            let stored = store.insert_study(&row)?;
            let Some(dir) = sync_dir else {
                return Ok(stored);
            };
            match save_study(&result, &dir) {
                Ok(path) => {
                    store.mark_file_synced(stored.id, &path.display().to_string())?;
                    store.get_study(stored.id)
                }
                Err(e) => {
                    tracing::warn!("Study {} not written to {}: {}", stored.id, dir.display(), e);
                    Ok(stored)
                }
            }
        })
        .await
        .map_err(storage_error)?;

    tracing::info!("Stored study {} ({} words)", stored.id, stored.word_count.unwrap_or(0));
    Ok(Json(stored))
}

/// GET /api/studies: newest first.
async fn list_studies_handler(
    State(state): State<AppState>,
    Query(query): Query<StudyQuery>,
) -> Result<Json<StudyPage>, ApiError> {
    let per_page = state.config.studies_per_page;
    let page = state
        .store
        .run(move |store| store.list_studies(&query, per_page))
        .await
        .map_err(storage_error)?;
    Ok(Json(page))
}

/// GET /api/studies/:id
async fn get_study_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<StoredStudy>, ApiError> {
    let study = state
        .store
        .run(move |store| store.get_study(id))
        .await
        .map_err(storage_error)?;
    Ok(Json(study))
}

async fn engines_handler(State(state): State<AppState>) -> impl IntoResponse {
    let engines: Vec<Value> = state
        .generator
        .list_engines()
        .into_iter()
        .map(|kind| json!({ "name": kind.as_str(), "description": kind.description() }))
        .collect();
    Json(json!({ "engines": engines }))
}

async fn translations_handler(State(state): State<AppState>) -> impl IntoResponse {
    let translations: Vec<Value> = state
        .generator
        .list_translations()
        .into_iter()
        .map(|(t, code)| json!({ "name": t.name(), "code": code, "full_name": t.full_name() }))
        .collect();
    Json(json!({
        "translations": translations,
        "default": state.generator.default_translation().name(),
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct VectorQuery {
    pub category: Option<String>,
}

/// GET /api/collision-vectors: `{category: [options]}`.
async fn collision_vectors_handler(
    Query(query): Query<VectorQuery>,
) -> Result<Json<Value>, ApiError> {
    let category = match non_blank(&query.category) {
        Some(c) => Some(c.parse::<VectorCategory>().map_err(bad_request)?),
        None => None,
    };
    let lists: Map<String, Value> = CollisionEngine::list_collision_vectors(category)
        .into_iter()
        .map(|(c, options)| (c.as_str().to_string(), json!(options)))
        .collect();
    Ok(Json(Value::Object(lists)))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::engines::tests::FIFTY_WORDS;
    use crate::services::study_generator::tests::service_with;
    use crate::text_fetcher::tests::{passage_html, StubPages};
    use axum::body::Body;
    use axum::http::Request;
    use tempfile::TempDir;
    use tower::ServiceExt;

    pub(crate) fn test_state(reply: &str, pages: StubPages) -> (AppState, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = StudyStore::open(dir.path().join("test.db")).unwrap();
        let mut config = WebConfig::from_lookup(|_| None);
        config.base.output_directory = dir.path().join("outputs");
        let state = AppState::new(service_with(reply, pages, false), store, config);
        (state, dir)
    }

    pub(crate) async fn send(
        state: &AppState,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let app = app_router(state.clone());
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(b) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(serde_json::to_string(&b).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), 1 << 20)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (state, _dir) = test_state("x", StubPages::default());
        let (status, json) = send(&state, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["version"], crate::VERSION);
        assert_eq!(json["service"], "lectionary-engines");
    }

    #[tokio::test]
    async fn test_generate_paste_stores_and_syncs_file() {
        let (state, dir) = test_state(FIFTY_WORDS, StubPages::default());
        let (status, json) = send(
            &state,
            "POST",
            "/api/generate",
            Some(json!({
                "engine": "threshold",
                "reference": "John 3:16",
                "text": "For God so loved the world",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["engine"], "threshold");
        assert_eq!(json["source"], "paste");
        assert_eq!(json["word_count"], 50);
        assert_eq!(json["file_synced"], true);
        assert!(json["validation"].is_null());

        let path = json["file_path"].as_str().unwrap();
        assert!(path.starts_with(dir.path().join("outputs").to_str().unwrap()));
        assert!(std::path::Path::new(path).exists());
    }

    #[tokio::test]
    async fn test_generate_without_file_sync() {
        let (state, _dir) = test_state(FIFTY_WORDS, StubPages::default());
        let (status, json) = send(
            &state,
            "POST",
            "/api/generate",
            Some(json!({
                "engine": "palimpsest",
                "reference": "Ruth 1",
                "text": "Where you go",
                "save_file": false,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["file_synced"], false);
        assert!(json["file_path"].is_null());
    }

    #[tokio::test]
    async fn test_generate_rejects_bad_input() {
        let (state, _dir) = test_state(FIFTY_WORDS, StubPages::default());

        let (status, json) = send(
            &state,
            "POST",
            "/api/generate",
            Some(json!({"engine": "midrash", "reference": "John 1:1", "text": "x"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("midrash"));

        let (status, _) = send(
            &state,
            "POST",
            "/api/generate",
            Some(json!({"engine": "threshold", "text": "x"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &state,
            "POST",
            "/api/generate",
            Some(json!({"engine": "threshold", "source": "run", "reference": "John 1:1", "translation": "KJV"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, json) = send(
            &state,
            "POST",
            "/api/generate",
            Some(json!({
                "engine": "threshold",
                "reference": "John 1:1",
                "text": "x",
                "preferences": {"tone_level": 12},
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("tone_level"));
    }

    #[tokio::test]
    async fn test_generate_fetch_failure_is_bad_gateway() {
        let (state, _dir) = test_state(FIFTY_WORDS, StubPages::default());
        let (status, json) = send(
            &state,
            "POST",
            "/api/generate",
            Some(json!({"engine": "threshold", "source": "run", "reference": "John 1:1"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(json["error"].as_str().unwrap().contains("Could not fetch text"));
    }

    #[tokio::test]
    async fn test_generate_paste_without_text_fetches_passage() {
        let pages = StubPages::default().with("John", &passage_html("In the beginning was the Word"));
        let (state, _dir) = test_state(FIFTY_WORDS, pages);
        let (status, json) = send(
            &state,
            "POST",
            "/api/generate",
            Some(json!({"engine": "threshold", "reference": "John 1:1"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["source"], "paste");
        assert_eq!(json["biblical_text"], "In the beginning was the Word");
    }

    #[tokio::test]
    async fn test_generate_run_with_profile_and_overrides() {
        let pages = StubPages::default().with("version=CEB", &passage_html("In the beginning"));
        let (state, _dir) = test_state(FIFTY_WORDS, pages);
        let (status, json) = send(
            &state,
            "POST",
            "/api/generate",
            Some(json!({
                "engine": "collision",
                "source": "run",
                "reference": "Genesis 1:1",
                "translation": "CEB",
                "profile": "Scholar",
                "preferences": {"study_length": "short"},
                "save_file": false,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["biblical_text"], "In the beginning");
        assert_eq!(json["translation"], "CEB");
        assert_eq!(json["profile_name"], "Scholar");
        assert_eq!(json["custom_preferences"]["study_length"], "short");
    }

    #[tokio::test]
    async fn test_generate_unknown_profile_is_not_found() {
        let (state, _dir) = test_state(FIFTY_WORDS, StubPages::default());
        let (status, _) = send(
            &state,
            "POST",
            "/api/generate",
            Some(json!({"engine": "threshold", "reference": "John 1:1", "text": "x", "profile": "Nobody"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_generate_with_validation_stores_review() {
        let (state, _dir) = test_state(FIFTY_WORDS, StubPages::default());
        let (status, json) = send(
            &state,
            "POST",
            "/api/generate",
            Some(json!({
                "engine": "threshold",
                "reference": "John 1:1",
                "text": "In the beginning was the Word",
                "validate": true,
                "save_file": false,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        // The echo reply is not JSON, so the review is recorded as failed.
        assert_eq!(json["validation_score"], 0);
        assert_eq!(json["validation_recommendation"], "review");
        assert!(json["validation"]["summary"].as_str().unwrap().contains("Invalid JSON"));

        let id = json["id"].as_i64().unwrap();
        let (status, fetched) = send(&state, "GET", &format!("/api/studies/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["validation"]["recommendation"], "review");
    }

    #[tokio::test]
    async fn test_list_and_get_studies() {
        let (state, _dir) = test_state(FIFTY_WORDS, StubPages::default());
        for engine in ["threshold", "palimpsest", "threshold"] {
            let (status, _) = send(
                &state,
                "POST",
                "/api/generate",
                Some(json!({"engine": engine, "reference": "Mark 5:1-5", "text": "x", "save_file": false})),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }

        let (status, page) = send(&state, "GET", "/api/studies?engine=threshold&limit=1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["total"], 2);
        assert_eq!(page["limit"], 1);
        assert_eq!(page["studies"].as_array().unwrap().len(), 1);
        assert_eq!(page["studies"][0]["id"], 3);

        let (status, page) = send(&state, "GET", "/api/studies", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["limit"], 20);
        assert_eq!(page["total"], 3);

        let (status, json) = send(&state, "GET", "/api/studies/999", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(json["error"].as_str().unwrap().contains("999"));
    }

    #[tokio::test]
    async fn test_catalog_endpoints() {
        let (state, _dir) = test_state("x", StubPages::default());

        let (_, engines) = send(&state, "GET", "/api/engines", None).await;
        assert_eq!(engines["engines"].as_array().unwrap().len(), 3);
        assert_eq!(engines["engines"][0]["name"], "threshold");

        let (_, translations) = send(&state, "GET", "/api/translations", None).await;
        assert_eq!(translations["translations"].as_array().unwrap().len(), 5);
        assert_eq!(translations["default"], "NRSVue");

        let (status, all) = send(&state, "GET", "/api/collision-vectors", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(all.as_object().unwrap().len(), 5);

        let (status, one) = send(&state, "GET", "/api/collision-vectors?category=personal", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(one["personal"].as_array().unwrap().len() > 1);
        assert!(one.get("scientific").is_none());

        let (status, _) = send(&state, "GET", "/api/collision-vectors?category=culinary", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
