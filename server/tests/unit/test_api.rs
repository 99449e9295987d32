//! Router tests

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use pare_server::errors::ProviderError;
use pare_server::server::serve::router;
use pare_server::server::state::ServerState;
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::common::{bundle_bytes, deploy_config, Harness, API_KEY};

const BOUNDARY: &str = "pare-test-boundary";

fn app(h: &Harness) -> Router {
    let state = ServerState::new(
        h.settings.auth.clone(),
        h.state.orchestrator.clone(),
        h.state.functions.clone(),
    );
    router(Arc::new(state), 10 * 1024 * 1024)
}

fn multipart_body(json_data: &str, bundle: &[u8]) -> Vec<u8> {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"json_data\"\r\n\r\n{json_data}\r\n\
         --{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"bundle.zip\"\r\n\
         Content-Type: application/zip\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(bundle);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn deploy_request(api_key: Option<&str>, json_data: &str, bundle: &[u8]) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/v0.1/deploy/")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
    if let Some(key) = api_key {
        builder = builder.header("X-Pare-API-Key", key);
    }
    builder
        .body(Body::from(multipart_body(json_data, bundle)))
        .unwrap()
}

fn request(method: &str, uri: &str, version: Option<&str>, body: Body) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("X-Pare-API-Key", API_KEY);
    if let Some(version) = version {
        builder = builder.header("X-Pare-Atomic-Deployment", version);
    }
    builder.body(body).unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn deploy(h: &Harness, git_hash: &str, names: &[&str]) -> (StatusCode, Value) {
    let manifest = serde_json::to_string(&deploy_config(git_hash, names)).unwrap();
    send(
        app(h),
        deploy_request(Some(API_KEY), &manifest, &bundle_bytes().await),
    )
    .await
}

#[tokio::test]
async fn test_healthcheck_needs_no_key() {
    let h = Harness::new();
    let request = Request::builder()
        .uri("/healthcheck")
        .body(Body::empty())
        .unwrap();

    let (status, body) = send(app(&h), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "ok": true }));
}

#[tokio::test]
async fn test_missing_or_unknown_key_is_unauthorized() {
    let h = Harness::new();
    let manifest = serde_json::to_string(&deploy_config("abc1234", &["api"])).unwrap();
    let bundle = bundle_bytes().await;

    let (status, body) = send(app(&h), deploy_request(None, &manifest, &bundle)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "Unauthenticated");

    let (status, _) = send(app(&h), deploy_request(Some("nope"), &manifest, &bundle)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(h.runner.calls().is_empty());
}

#[tokio::test]
async fn test_blocked_user_is_forbidden() {
    let h = Harness::new();
    h.store.block(h.user.id).unwrap();

    let (status, _) = send(app(&h), request("GET", "/v0.1/services/", None, Body::empty())).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_deploy_success() {
    let h = Harness::new();

    let (status, body) = deploy(&h, "abc1234", &["api", "users"]).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "succeeded": ["api", "users"], "failed": [] }));
}

#[tokio::test]
async fn test_deploy_partial_failure_is_server_error_with_both_lists() {
    let h = Harness::new();
    h.runner.fail_when("alice_users", 1, "build failed");

    let (status, body) = deploy(&h, "abc1234", &["api", "users"]).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "succeeded": ["api"], "failed": ["users"] }));
}

#[tokio::test]
async fn test_malformed_manifest_is_unprocessable() {
    let h = Harness::new();
    let bundle = bundle_bytes().await;

    let (status, _) = send(app(&h), deploy_request(Some(API_KEY), "{not json", &bundle)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let mut manifest = serde_json::to_value(deploy_config("abc1234", &["api"])).unwrap();
    manifest["region"] = json!("eu-west-1");
    let (status, _) = send(
        app(&h),
        deploy_request(Some(API_KEY), &manifest.to_string(), &bundle),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let manifest = serde_json::to_string(&deploy_config("abc1234", &["api", "api"])).unwrap();
    let (status, body) = send(app(&h), deploy_request(Some(API_KEY), &manifest, &bundle)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["detail"].as_str().unwrap().contains("api"));

    assert!(h.runner.calls().is_empty());
}

#[tokio::test]
async fn test_invalid_bundle_is_bad_request() {
    let h = Harness::new();
    let manifest = serde_json::to_string(&deploy_config("abc1234", &["api"])).unwrap();

    let (status, _) = send(
        app(&h),
        deploy_request(Some(API_KEY), &manifest, b"definitely not a zip"),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_quota_exceeded_is_forbidden() {
    let mut settings = crate::common::test_settings();
    settings.orchestrator.max_deployments_per_user = 0;
    let h = Harness::with_settings(settings);

    let (status, _) = deploy(&h, "abc1234", &["api"]).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_list_and_get_services() {
    let h = Harness::new();
    deploy(&h, "aaaaaaa", &["api"]).await;
    deploy(&h, "bbbbbbb", &["api", "users"]).await;

    let (status, body) = send(app(&h), request("GET", "/v0.1/services/", None, Body::empty())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 3);
    assert_eq!(body[0]["deployment"]["git_hash"], "bbbbbbb");

    let (status, body) = send(
        app(&h),
        request("GET", "/v0.1/services/api/", Some("latest"), Body::empty()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "api");
    assert_eq!(body["deployment"]["git_hash"], "bbbbbbb");

    let (status, body) = send(
        app(&h),
        request("GET", "/v0.1/services/api/", Some("aaaaaaa"), Body::empty()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deployment"]["git_hash"], "aaaaaaa");

    let (status, body) = send(
        app(&h),
        request("GET", "/v0.1/services/API/", Some("AAAAAAA"), Body::empty()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "api");

    let (status, _) = send(
        app(&h),
        request("GET", "/v0.1/services/users/", Some("aaaaaaa"), Body::empty()),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_missing_atomic_deployment_header_is_bad_request() {
    let h = Harness::new();
    deploy(&h, "abc1234", &["api"]).await;

    let (status, body) = send(
        app(&h),
        request("GET", "/v0.1/services/api/", None, Body::empty()),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"]
        .as_str()
        .unwrap()
        .contains("X-Pare-Atomic-Deployment"));
}

#[tokio::test]
async fn test_delete_service() {
    let h = Harness::new();
    deploy(&h, "abc1234", &["api", "users"]).await;

    let (status, body) = send(
        app(&h),
        request("DELETE", "/v0.1/services/delete/api/", Some("abc1234"), Body::empty()),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "name": "api", "git_hash": "abc1234" }));
    assert!(h.functions.function("alice_api_abc1234").is_none());
    assert_eq!(h.store.services().len(), 1);
    // the deployment row stays
    assert_eq!(h.store.deployments().len(), 1);

    let (status, _) = send(
        app(&h),
        request("DELETE", "/v0.1/services/delete/api/", Some("abc1234"), Body::empty()),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_maps_provider_errors() {
    let h = Harness::new();
    deploy(&h, "abc1234", &["api", "users"]).await;
    h.functions.fail_delete(
        "alice_api_abc1234",
        ProviderError::Conflict("update in progress".to_string()),
    );
    h.functions.fail_delete(
        "alice_users_abc1234",
        ProviderError::NotFound("gone".to_string()),
    );

    let (status, _) = send(
        app(&h),
        request("DELETE", "/v0.1/services/delete/api/", Some("latest"), Body::empty()),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        app(&h),
        request("DELETE", "/v0.1/services/delete/users/", Some("latest"), Body::empty()),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // rows stay when the function could not be deleted
    assert_eq!(h.store.services().len(), 2);
}

#[tokio::test]
async fn test_invoke_service() {
    let h = Harness::new();
    deploy(&h, "abc1234", &["api"]).await;

    let (status, body) = send(
        app(&h),
        request(
            "POST",
            "/v0.1/services/invoke/api/",
            Some("latest"),
            Body::from(r#"{"name":"pare"}"#),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["statusCode"], 200);
    assert_eq!(body["body"], r#"{"name":"pare"}"#);
}
