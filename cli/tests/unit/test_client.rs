//! API client against a fake deploy API

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use api_models::{DeployConfig, DeployResult, ServiceConfig};
use axum::extract::{Multipart, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use pare_cli::client::ApiClient;
use pare_cli::errors::CliError;
use pare_cli::settings::CliSettings;
use serde_json::{json, Value};

const KEY: &str = "test-key";

#[derive(Debug, Default)]
struct Seen {
    api_keys: Vec<String>,
    versions: Vec<String>,
    fields: Vec<(String, usize)>,
    manifest: Option<DeployConfig>,
}

type Shared = Arc<Mutex<Seen>>;

fn record(seen: &Shared, headers: &HeaderMap) {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let mut seen = seen.lock().unwrap();
    if let Some(key) = header("X-Pare-API-Key") {
        seen.api_keys.push(key);
    }
    if let Some(version) = header("X-Pare-Atomic-Deployment") {
        seen.versions.push(version);
    }
}

async fn deploy(
    State(seen): State<Shared>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> impl IntoResponse {
    record(&seen, &headers);
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.unwrap();
        if name == "json_data" {
            seen.lock().unwrap().manifest = Some(serde_json::from_slice(&bytes).unwrap());
        }
        seen.lock().unwrap().fields.push((name, bytes.len()));
    }
    let result = DeployResult {
        succeeded: vec!["api".to_string()],
        failed: vec!["users".to_string()],
    };
    (StatusCode::INTERNAL_SERVER_ERROR, Json(result))
}

async fn list(State(seen): State<Shared>, headers: HeaderMap) -> impl IntoResponse {
    record(&seen, &headers);
    Json(json!([{
        "name": "api",
        "deployment": {"git_hash": "abc1234", "created_at": "2024-05-01T12:30:00Z"},
        "created_at": "2024-05-01T12:30:00Z"
    }]))
}

async fn remove(
    State(seen): State<Shared>,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> impl IntoResponse {
    record(&seen, &headers);
    if name == "missing" {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"detail": "Service not found for deploy version"})),
        );
    }
    (StatusCode::OK, Json(json!({"name": name, "git_hash": "abc1234"})))
}

async fn invoke(
    State(seen): State<Shared>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> impl IntoResponse {
    record(&seen, &headers);
    Json(json!({"statusCode": 200, "body": payload.to_string()}))
}

async fn fake_api() -> (ApiClient, Shared) {
    let seen = Shared::default();
    let app = Router::new()
        .route("/v0.1/deploy/", post(deploy))
        .route("/v0.1/services/", get(list))
        .route("/v0.1/services/delete/{name}/", delete(remove))
        .route("/v0.1/services/invoke/{name}/", post(invoke))
        .with_state(seen.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

    let settings = CliSettings {
        api_url: format!("http://{}/", addr),
        api_key: Some(KEY.to_string().into()),
        ..Default::default()
    };
    (ApiClient::new(&settings).unwrap(), seen)
}

fn config() -> DeployConfig {
    DeployConfig {
        git_hash: "abc1234".to_string(),
        python_version: "3.12".to_string(),
        environment_variables: BTreeMap::from([("STAGE".to_string(), "dev".to_string())]),
        services: vec![
            ServiceConfig {
                name: "api".to_string(),
                path: "app.api:handler".to_string(),
                requirements: vec![],
            },
            ServiceConfig {
                name: "users".to_string(),
                path: "app.users:handler".to_string(),
                requirements: vec!["requests".to_string()],
            },
        ],
    }
}

#[tokio::test]
async fn test_partial_deploy_is_reported_not_raised() {
    let (client, seen) = fake_api().await;

    let result = client.deploy(&config(), b"PK-bundle".to_vec()).await.unwrap();

    assert_eq!(result.succeeded, vec!["api"]);
    assert_eq!(result.failed, vec!["users"]);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.api_keys, vec![KEY]);
    assert!(seen.fields.contains(&("file".to_string(), 9)));
    assert_eq!(seen.manifest.as_ref(), Some(&config()));
}

#[tokio::test]
async fn test_list_services() {
    let (client, seen) = fake_api().await;

    let services = client.list_services().await.unwrap();

    assert_eq!(services.len(), 1);
    assert_eq!(services[0].deployment.git_hash, "abc1234");
    assert_eq!(seen.lock().unwrap().api_keys, vec![KEY]);
    assert!(seen.lock().unwrap().versions.is_empty());
}

#[tokio::test]
async fn test_delete_sends_deployment_version() {
    let (client, seen) = fake_api().await;

    let deleted = client.delete_service("api", "abc1234").await.unwrap();
    assert_eq!(deleted.name, "api");

    let err = client.delete_service("missing", "abc1234").await.unwrap_err();
    assert!(matches!(
        err,
        CliError::Api { status: 404, ref detail } if detail == "Service not found for deploy version"
    ));

    assert_eq!(seen.lock().unwrap().versions, vec!["abc1234", "abc1234"]);
}

#[tokio::test]
async fn test_invoke() {
    let (client, seen) = fake_api().await;

    let response = client
        .invoke("api", "latest", &json!({"name": "pare"}))
        .await
        .unwrap();

    assert_eq!(response["statusCode"], 200);
    assert_eq!(response["body"], r#"{"name":"pare"}"#);
    assert_eq!(seen.lock().unwrap().versions, vec!["latest"]);
}
