//! HTTP JSON API over the study generator and the SQLite store.
//!
//! # Endpoints
//!
//! - `GET  /health`: Liveness probe
//! - `POST /api/generate`: Generate and store a study
//! - `/api/studies`, `/api/profiles`: Browse studies, manage profiles
//! - `/api/engines`, `/api/translations`, `/api/collision-vectors`: Catalogs

pub mod profiles;
pub mod routes;

pub use routes::{app_router, AppState, GenerateRequest};
