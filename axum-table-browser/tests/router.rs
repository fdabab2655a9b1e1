mod common;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use axum_table_browser::TableBrowserLayer;
use common::{init_logging, RecordingBackend, RecordingConnector};
use serde_json::{json, Value};
use tower::ServiceExt;

const BASE: &str = "/console";

fn console(backend: &RecordingBackend) -> Router {
    init_logging();
    TableBrowserLayer::new(BASE, RecordingConnector::new(backend.clone())).into_router()
}

async fn post_form(app: &Router, uri: &str, body: &str) -> StatusCode {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();

    let location = response.headers().get(header::LOCATION).cloned();
    assert_eq!(location.unwrap().to_str().unwrap(), BASE);
    response.status()
}

async fn get_body(app: &Router, uri: &str) -> (StatusCode, String) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

async fn state(app: &Router) -> Value {
    let (status, body) = get_body(app, "/console/api/state").await;
    assert_eq!(status, StatusCode::OK);
    serde_json::from_str(&body).unwrap()
}

async fn connected_to_users(backend: &RecordingBackend) -> Router {
    let app = console(backend);
    post_form(
        &app,
        "/console/connect",
        "endpoint_url=https%3A%2F%2Fp.supabase.co&api_key=secret",
    )
    .await;
    post_form(&app, "/console/tables/select", "table=users").await;
    app
}

#[tokio::test]
async fn test_connect_redirects_to_console() {
    let backend = RecordingBackend::new().with_table("users", 3);
    let app = console(&backend);

    let status = post_form(
        &app,
        "/console/connect",
        "endpoint_url=https%3A%2F%2Fp.supabase.co&api_key=secret",
    )
    .await;
    assert_eq!(status, StatusCode::SEE_OTHER);

    let state = state(&app).await;
    assert_eq!(state["connected"], json!(true));
    assert_eq!(state["endpointUrl"], json!("https://p.supabase.co"));
    assert_eq!(state["tables"], json!(["users"]));
    assert!(!state.to_string().contains("secret"));
}

#[tokio::test]
async fn test_failed_connect_still_redirects() {
    let backend = RecordingBackend::new();
    let app = console(&backend);

    let status = post_form(&app, "/console/connect", "endpoint_url=&api_key=").await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(state(&app).await["connected"], json!(false));
}

#[tokio::test]
async fn test_select_and_page() {
    let backend = RecordingBackend::new().with_table("users", 25);
    let app = connected_to_users(&backend).await;

    let state_after_select = state(&app).await;
    assert_eq!(state_after_select["selectedTable"], json!("users"));
    assert_eq!(state_after_select["page"]["totalCount"], json!(25));
    assert_eq!(
        state_after_select["pagination"],
        json!({"state": "hasPages", "pageCount": 3})
    );

    post_form(&app, "/console/rows/page", "page=3").await;
    assert_eq!(state(&app).await["rows"].as_array().unwrap().len(), 5);

    let fetches = backend.fetch_count();
    post_form(&app, "/console/rows/page", "page=4").await;
    post_form(&app, "/console/rows/page", "page=next").await;
    assert_eq!(backend.fetch_count(), fetches);
    assert_eq!(state(&app).await["page"]["currentPage"], json!(3));

    post_form(&app, "/console/rows/per-page", "rows_per_page=25").await;
    let state_after_resize = state(&app).await;
    assert_eq!(state_after_resize["page"]["currentPage"], json!(1));
    assert_eq!(state_after_resize["rows"].as_array().unwrap().len(), 25);
}

#[tokio::test]
async fn test_grid_save_insert_delete() {
    let backend = RecordingBackend::new().with_table("users", 3);
    let app = connected_to_users(&backend).await;
    let tag = state(&app).await["fetchTag"].as_u64().unwrap();

    post_form(
        &app,
        "/console/rows/save",
        &format!("tag={}&cell.0.name=Ada&cell.1.name=user+2&new.name=ignored", tag),
    )
    .await;
    let calls = backend.calls();
    assert_eq!(calls.updates.len(), 3);
    assert!(calls.inserts.is_empty());
    assert_eq!(backend.row("users", 1).unwrap()["name"], json!("Ada"));
    assert_eq!(
        state(&app).await["message"],
        json!("Changes saved successfully!")
    );

    post_form(&app, "/console/rows/insert", "tag=0&new.name=Grace&new.age=").await;
    let inserts = backend.calls().inserts;
    assert_eq!(inserts.len(), 1);
    assert_eq!(Value::Object(inserts[0].clone()), json!({"name": "Grace"}));

    let tag = state(&app).await["fetchTag"].as_u64().unwrap();
    post_form(&app, "/console/rows/delete", &format!("tag={}&row=1", tag)).await;
    assert_eq!(backend.calls().deletes, vec![json!(2)]);
    assert_eq!(backend.ids("users"), vec![json!(1), json!(3), json!(4)]);
}

#[tokio::test]
async fn test_stale_grid_form_is_ignored() {
    let backend = RecordingBackend::new().with_table("users", 25);
    let app = connected_to_users(&backend).await;
    let stale = state(&app).await["fetchTag"].as_u64().unwrap();
    post_form(&app, "/console/rows/page", "page=2").await;

    post_form(&app, "/console/rows/save", &format!("tag={}&cell.0.name=Ada", stale)).await;
    post_form(&app, "/console/rows/delete", &format!("tag={}&row=0", stale)).await;

    let calls = backend.calls();
    assert!(calls.updates.is_empty());
    assert!(calls.deletes.is_empty());
}

#[tokio::test]
async fn test_console_page_renders_grid() {
    let backend = RecordingBackend::new().with_table("users", 3);
    let app = connected_to_users(&backend).await;

    let (status, html) = get_body(&app, BASE).await;
    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("user 3"));
    assert!(html.contains("Save Changes"));
    assert!(!html.contains("secret"));

    let (status, css) = get_body(&app, "/console/assets/browser.css").await;
    assert_eq!(status, StatusCode::OK);
    assert!(!css.is_empty());

    let (status, _) = get_body(&app, "/console/assets/missing.js").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_console_mounted_at_root() {
    init_logging();
    let backend = RecordingBackend::new().with_table("users", 3);
    let app = TableBrowserLayer::new("/", RecordingConnector::new(backend)).into_router();

    let request = Request::builder()
        .method(Method::POST)
        .uri("/connect")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("endpoint_url=https%3A%2F%2Fp.supabase.co&api_key=secret"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/");

    let request = Request::builder().uri("/").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
