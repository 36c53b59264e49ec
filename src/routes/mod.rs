pub mod auth;
pub mod photos;
pub mod sessions;
pub mod users;

use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::state::AppState;

/// Full application router, shared by `main` and the integration tests.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .merge(auth::router())
        .merge(users::router())
        .merge(sessions::router())
        .merge(photos::router())
}

async fn root() -> Json<Value> {
    Json(json!({ "message": "QR Photo Upload API" }))
}
