mod common;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

use clothing_crawler_lib::api::{AppState, create_router};
use clothing_crawler_lib::application::ScrapeService;
use clothing_crawler_lib::crawling::{AdapterRegistry, CrawlOrchestrator, OrchestratorConfig};
use clothing_crawler_lib::domain::SiteName;
use clothing_crawler_lib::infrastructure::{AccessGuard, SiteOverride};
use common::{FakeLauncher, temp_store};
use tempfile::TempDir;

async fn test_app() -> (TempDir, Router) {
    let (dir, repository, _pool) = temp_store().await;

    let mut config = OrchestratorConfig::default();
    for site in SiteName::ALL {
        config.site_overrides.insert(site, SiteOverride { start_urls: Some(Vec::new()), ..SiteOverride::default() });
    }
    let orchestrator = CrawlOrchestrator::new(
        config,
        AdapterRegistry::with_builtin().unwrap(),
        repository.clone(),
        Arc::new(FakeLauncher::default()),
        AccessGuard::default(),
    );

    let state = AppState { repository, scraper: ScrapeService::new(Arc::new(orchestrator)) };
    (dir, create_router(state))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.expect("handler should respond");
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, value)
}

fn product(link: &str) -> Value {
    json!({
        "name": "Chemise en lin",
        "description": null,
        "price": 35.99,
        "sizes": ["M", "L"],
        "colors": null,
        "image_urls": ["https://cdn.shop.test/1.jpg"],
        "product_link": link
    })
}

#[tokio::test]
async fn health_reports_ok() {
    let (_dir, app) = test_app().await;
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("ok"));
}

#[tokio::test]
async fn create_then_read_back() {
    let (_dir, app) = test_app().await;

    let (status, created) = send(&app, "POST", "/products", Some(product("https://shop.test/p/1"))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["price"], json!(35.99));
    assert_eq!(created["colors"], json!([]));
    assert!(created["scraped_at"].is_string());

    let id = created["id"].as_i64().unwrap();
    let (status, fetched) = send(&app, "GET", &format!("/products/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);
}

#[tokio::test]
async fn duplicate_link_is_a_conflict() {
    let (_dir, app) = test_app().await;
    send(&app, "POST", "/products", Some(product("https://shop.test/p/1"))).await;

    let (status, body) = send(&app, "POST", "/products", Some(product("https://shop.test/p/1"))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], json!("conflict"));
}

#[tokio::test]
async fn malformed_bodies_are_rejected() {
    let (_dir, app) = test_app().await;

    let (status, body) = send(&app, "POST", "/products", Some(json!({ "product_link": "https://shop.test/p/1" }))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], json!("validation_error"));
    assert!(body["message"].as_str().unwrap().contains("name"));

    let (status, body) =
        send(&app, "POST", "/products", Some(json!({ "name": "Tee", "price": "cheap", "product_link": "x" }))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], json!("validation_error"));

    let (status, body) =
        send(&app, "POST", "/products", Some(json!({ "name": "  ", "product_link": "https://shop.test/p/1" }))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], json!("validation_error"));
}

#[tokio::test]
async fn unparseable_requests_get_the_error_envelope() {
    let (_dir, app) = test_app().await;

    let request = Request::builder()
        .method("POST")
        .uri("/products")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{ not json"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"], json!("bad_request"));

    let (status, body) = send(&app, "GET", "/products/abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("bad_request"));

    let (status, body) = send(&app, "GET", "/products?limit=many", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("bad_request"));
}

#[tokio::test]
async fn missing_ids_are_404() {
    let (_dir, app) = test_app().await;

    let (status, body) = send(&app, "GET", "/products/999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], json!("not_found"));

    let (status, _) = send(&app, "PUT", "/products/999", Some(json!({ "name": "x" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "DELETE", "/products/999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn update_touches_only_supplied_fields() {
    let (_dir, app) = test_app().await;
    let (_, created) = send(&app, "POST", "/products", Some(product("https://shop.test/p/1"))).await;
    let id = created["id"].as_i64().unwrap();

    let (status, updated) = send(&app, "PUT", &format!("/products/{id}"), Some(json!({ "price": 29.99 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["price"], json!(29.99));
    assert_eq!(updated["name"], created["name"]);
    assert_eq!(updated["sizes"], created["sizes"]);
}

#[tokio::test]
async fn list_paginates_and_delete_all_empties() {
    let (_dir, app) = test_app().await;
    for i in 0..5 {
        send(&app, "POST", "/products", Some(product(&format!("https://shop.test/p/{i}")))).await;
    }

    let (status, page) = send(&app, "GET", "/products?skip=1&limit=2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page.as_array().unwrap().len(), 2);

    let (_, all) = send(&app, "GET", "/products", None).await;
    assert_eq!(all.as_array().unwrap().len(), 5);

    let first_id = all[0]["id"].as_i64().unwrap();
    let (status, _) = send(&app, "DELETE", &format!("/products/{first_id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&app, "DELETE", "/products", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], json!(4));

    let (_, all) = send(&app, "GET", "/products", None).await;
    assert_eq!(all, json!([]));
}

#[tokio::test]
async fn scrape_trigger_acknowledges_known_sites_only() {
    let (_dir, app) = test_app().await;

    let (status, ack) = send(&app, "POST", "/scrape/hm", None).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(ack["site"], json!("hm"));
    assert!(ack["request_id"].is_string());

    let (status, body) = send(&app, "POST", "/scrape/zara", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], json!("unknown_site"));
}
