//! Bulk ZIP download over the HTTP surface: status codes, partial results,
//! archive contents, and response headers.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::{json, Value};
use std::io::Cursor;
use std::io::Read;
use tempfile::TempDir;
use tower::util::ServiceExt;

use shutterlink::config::Config;
use shutterlink::db;
use shutterlink::routes;
use shutterlink::state::AppState;

fn test_app() -> (TempDir, Router) {
    let tmp = TempDir::new().unwrap();
    let pool = db::create_pool(&tmp.path().join("test.db")).unwrap();
    db::run_migrations(&pool).unwrap();
    db::bootstrap_superadmin(&pool).unwrap();

    let state = AppState {
        db: pool,
        config: Config::default(),
    };
    (tmp, routes::router().with_state(state))
}

async fn json_request(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Value,
) -> Response {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(t) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", t));
    }
    app.clone()
        .oneshot(builder.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}

async fn login(app: &Router) -> String {
    let response = json_request(
        app,
        "POST",
        "/auth/login",
        None,
        json!({ "username": "superadmin", "password": "changeme123" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await["access_token"]
        .as_str()
        .unwrap()
        .to_string()
}

async fn create_session(app: &Router, token: &str, name: &str) -> String {
    let response = json_request(app, "POST", "/sessions", Some(token), json!({ "name": name })).await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await["id"].as_str().unwrap().to_string()
}

async fn upload(app: &Router, session_id: &str, filename: &str, content_type: &str) -> String {
    let response = json_request(
        app,
        "POST",
        "/photos",
        None,
        json!({
            "session_id": session_id,
            "filename": filename,
            "content_type": content_type,
            "image_data": "aGVsbG8gd29ybGQ=",
            "file_size": 11
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await["id"].as_str().unwrap().to_string()
}

async fn download(app: &Router, token: &str, ids: Value) -> Response {
    json_request(app, "POST", "/photos/bulk-download", Some(token), ids).await
}

#[tokio::test]
async fn empty_id_list_is_bad_request() {
    let (_tmp, app) = test_app();
    let token = login(&app).await;

    let response = download(&app, &token, json!([])).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn only_unknown_ids_is_not_found() {
    let (_tmp, app) = test_app();
    let token = login(&app).await;

    let response = download(&app, &token, json!(["ghost-1", "ghost-2"])).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn bulk_download_requires_auth() {
    let (_tmp, app) = test_app();
    let response = json_request(&app, "POST", "/photos/bulk-download", None, json!(["x"])).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn mixed_ids_produce_partial_archive() {
    let (_tmp, app) = test_app();
    let token = login(&app).await;
    let session_id = create_session(&app, &token, "Birthday Bash").await;
    let photo_id = upload(&app, &session_id, "cake.png", "image/png").await;

    // Scenario D: one valid id plus one unknown id still succeeds, with
    // exactly one archive entry.
    let response = download(&app, &token, json!([photo_id, "ghost"])).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/zip"
    );
    let disposition = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert_eq!(
        disposition,
        "attachment; filename=\"Birthday_Bash_photos.zip\""
    );

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
    assert_eq!(archive.len(), 1);

    let mut entry = archive.by_index(0).unwrap();
    assert!(entry.name().starts_with("cake_"));
    assert!(entry.name().ends_with(".png"));

    let mut contents = Vec::new();
    entry.read_to_end(&mut contents).unwrap();
    assert_eq!(contents, b"hello world");
}

#[tokio::test]
async fn archive_entries_get_derived_extensions() {
    let (_tmp, app) = test_app();
    let token = login(&app).await;
    let session_id = create_session(&app, &token, "Extensions").await;

    let named = upload(&app, &session_id, "has-ext.jpeg", "image/jpeg").await;
    let bare = upload(&app, &session_id, "bare", "image/gif").await;
    let unknown = upload(&app, &session_id, "mystery", "application/octet-stream").await;

    let response = download(&app, &token, json!([named, bare, unknown])).await;
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
    assert_eq!(archive.len(), 3);

    let names: Vec<String> = (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect();
    assert!(names.iter().any(|n| n.starts_with("has-ext_") && n.ends_with(".jpeg")));
    assert!(names.iter().any(|n| n.starts_with("bare_") && n.ends_with(".gif")));
    // No recognized extension and an unhelpful content-type: default jpg.
    assert!(names.iter().any(|n| n.starts_with("mystery_") && n.ends_with(".jpg")));
}

#[tokio::test]
async fn inaccessible_photos_are_dropped_silently() {
    let (_tmp, app) = test_app();
    let admin = login(&app).await;
    let mine = create_session(&app, &admin, "Mine").await;
    let theirs = create_session(&app, &admin, "Theirs").await;

    let visible = upload(&app, &mine, "visible.png", "image/png").await;
    let hidden = upload(&app, &theirs, "hidden.png", "image/png").await;

    let response = json_request(
        &app,
        "POST",
        "/users",
        Some(&admin),
        json!({
            "username": "scoped",
            "password": "pw123456",
            "allowed_sessions": [mine]
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = json_request(
        &app,
        "POST",
        "/auth/login",
        None,
        json!({ "username": "scoped", "password": "pw123456" }),
    )
    .await;
    let token = body_json(response).await["access_token"]
        .as_str()
        .unwrap()
        .to_string();

    // The inaccessible photo is filtered, not an error.
    let response = download(&app, &token, json!([visible, hidden])).await;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
    assert_eq!(archive.len(), 1);

    // Nothing accessible at all: 404.
    let response = download(&app, &token, json!([hidden])).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn photos_survive_session_deactivation() {
    let (_tmp, app) = test_app();
    let token = login(&app).await;
    let session_id = create_session(&app, &token, "Closed Event").await;
    let photo_id = upload(&app, &session_id, "kept.png", "image/png").await;

    let response = json_request(
        &app,
        "DELETE",
        &format!("/sessions/{}", session_id),
        Some(&token),
        Value::Null,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    // No cascade: the photo still exports after its session is deactivated.
    let response = download(&app, &token, json!([photo_id])).await;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
    assert_eq!(archive.len(), 1);
}
