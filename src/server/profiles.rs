//! Profile management routes.
//!
//! - `GET    /api/profiles`
//! - `POST   /api/profiles`
//! - `GET    /api/profiles/default`
//! - `GET    /api/profiles/:id`
//! - `PUT    /api/profiles/:id`
//! - `DELETE /api/profiles/:id`
//! - `POST   /api/profiles/:id/default`

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

use crate::preferences::StudyPreferences;
use crate::storage::{ProfileChanges, ProfileDraft, UserProfile};
use crate::utilities::errors::StorageError;

use super::routes::{storage_error, ApiError, AppState};

pub(crate) fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/profiles", get(list_profiles).post(create_profile))
        .route("/api/profiles/default", get(get_default_profile))
        .route(
            "/api/profiles/:id",
            get(get_profile).put(update_profile).delete(delete_profile),
        )
        .route("/api/profiles/:id/default", post(set_default_profile))
}

async fn list_profiles(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let profiles = state
        .store
        .run(|store| store.list_profiles())
        .await
        .map_err(storage_error)?;
    Ok(Json(json!({
        "total": profiles.len(),
        "profiles": profiles,
    })))
}

async fn get_default_profile(State(state): State<AppState>) -> Result<Json<UserProfile>, ApiError> {
    let profile = state
        .store
        .run(|store| store.get_default_profile())
        .await
        .map_err(storage_error)?;
    Ok(Json(profile))
}

async fn get_profile(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<UserProfile>, ApiError> {
    let profile = state
        .store
        .run(move |store| store.get_profile(id))
        .await
        .map_err(storage_error)?;
    Ok(Json(profile))
}

/// Missing preference keys take their defaults; `name` is required.
fn draft_from_body(body: &Value) -> Result<ProfileDraft, StorageError> {
    let name = body
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| StorageError::Invalid {
            message: "Profile name is required".to_string(),
        })?;
    Ok(ProfileDraft {
        name: name.to_string(),
        description: body
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string),
        preferences: StudyPreferences::from_value(body)?,
        is_default: body.get("is_default").and_then(Value::as_bool).unwrap_or(false),
    })
}

async fn create_profile(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<UserProfile>, ApiError> {
    let draft = draft_from_body(&body).map_err(storage_error)?;
    let profile = state
        .store
        .run(move |store| store.create_profile(&draft))
        .await
        .map_err(storage_error)?;
    tracing::info!("Created profile '{}' ({})", profile.name, profile.id);
    Ok(Json(profile))
}

async fn update_profile(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Result<Json<UserProfile>, ApiError> {
    let changes = ProfileChanges::from_value(&body);
    let profile = state
        .store
        .run(move |store| store.update_profile(id, &changes))
        .await
        .map_err(storage_error)?;
    Ok(Json(profile))
}

async fn delete_profile(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let name = state
        .store
        .run(move |store| store.delete_profile(id))
        .await
        .map_err(storage_error)?;
    Ok(Json(json!({
        "success": true,
        "message": format!("Profile '{}' deleted successfully", name),
    })))
}

async fn set_default_profile(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<UserProfile>, ApiError> {
    let profile = state
        .store
        .run(move |store| store.set_default_profile(id))
        .await
        .map_err(storage_error)?;
    Ok(Json(profile))
}

#[cfg(test)]
mod tests {
    use super::super::routes::tests::{send, test_state};
    use crate::text_fetcher::tests::StubPages;
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_seeded_profiles_default_first() {
        let (state, _dir) = test_state("x", StubPages::default());
        let (status, json) = send(&state, "GET", "/api/profiles", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["total"], 5);
        assert_eq!(json["profiles"][0]["name"], "Default");
        assert_eq!(json["profiles"][0]["is_default"], true);
        assert_eq!(json["profiles"][1]["name"], "Daily Devotional");

        let (status, default) = send(&state, "GET", "/api/profiles/default", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(default["name"], "Default");
    }

    #[tokio::test]
    async fn test_create_get_update_delete() {
        let (state, _dir) = test_state("x", StubPages::default());
        let (status, created) = send(
            &state,
            "POST",
            "/api/profiles",
            Some(json!({
                "name": "Youth Group",
                "description": "Teens, Wednesday nights",
                "study_length": "short",
                "tone_level": 7,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(created["study_length"], "short");
        assert_eq!(created["language_complexity"], "standard");
        assert_eq!(created["is_default"], false);
        let id = created["id"].as_i64().unwrap();

        let (status, fetched) = send(&state, "GET", &format!("/api/profiles/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["description"], "Teens, Wednesday nights");

        let (status, updated) = send(
            &state,
            "PUT",
            &format!("/api/profiles/{}", id),
            Some(json!({"tone_level": 2, "focus_areas": "parables"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["tone_level"], 2);
        assert_eq!(updated["study_length"], "short");
        assert_eq!(updated["focus_areas"], "parables");

        let (status, deleted) = send(&state, "DELETE", &format!("/api/profiles/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(deleted["message"], "Profile 'Youth Group' deleted successfully");

        let (status, _) = send(&state, "GET", &format!("/api/profiles/{}", id), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_profile_input_errors() {
        let (state, _dir) = test_state("x", StubPages::default());

        let (status, json) = send(&state, "POST", "/api/profiles", Some(json!({"name": "Scholar"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("already exists"));

        let (status, _) = send(&state, "POST", "/api/profiles", Some(json!({"tone_level": 3}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, json) = send(
            &state,
            "POST",
            "/api/profiles",
            Some(json!({"name": "Loud", "language_complexity": "baroque"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("baroque"));

        let (status, _) = send(&state, "PUT", "/api/profiles/999", Some(json!({"tone_level": 1}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_default_cannot_be_deleted_until_moved() {
        let (state, _dir) = test_state("x", StubPages::default());
        let (_, default) = send(&state, "GET", "/api/profiles/default", None).await;
        let default_id = default["id"].as_i64().unwrap();

        let (status, json) = send(&state, "DELETE", &format!("/api/profiles/{}", default_id), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("Cannot delete the default profile"));

        let (_, list) = send(&state, "GET", "/api/profiles", None).await;
        let scholar = list["profiles"]
            .as_array()
            .unwrap()
            .iter()
            .find(|p| p["name"] == "Scholar")
            .unwrap()["id"]
            .as_i64()
            .unwrap();

        let (status, promoted) = send(&state, "POST", &format!("/api/profiles/{}/default", scholar), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(promoted["is_default"], true);

        let (_, default) = send(&state, "GET", "/api/profiles/default", None).await;
        assert_eq!(default["name"], "Scholar");

        let (status, _) = send(&state, "DELETE", &format!("/api/profiles/{}", default_id), None).await;
        assert_eq!(status, StatusCode::OK);
    }
}
