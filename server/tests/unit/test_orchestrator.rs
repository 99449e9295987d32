//! Orchestrator tests against in-memory providers

use std::time::{Duration, Instant};

use api_models::ConfigError;
use pare_server::errors::{DeployError, ProviderError};
use pare_server::function::memory::FunctionCall;
use pare_server::function::FunctionCode;
use pare_server::models::User;
use pare_server::storage::settings::PackageType;

use crate::common::{bundle_bytes, deploy_config, test_settings, Harness};

const ARN_PREFIX: &str = "arn:aws:lambda:us-east-1:123456789012:function:";

#[tokio::test]
async fn test_all_services_succeed() {
    let h = Harness::new();
    let config = deploy_config("abc1234def", &["api", "users", "billing"]);

    let result = h
        .orchestrator()
        .deploy(&h.user, config, bundle_bytes().await)
        .await
        .unwrap();

    assert_eq!(result.succeeded, vec!["api", "users", "billing"]);
    assert!(result.failed.is_empty());

    let deployments = h.store.deployments();
    assert_eq!(deployments.len(), 1);
    assert_eq!(deployments[0].git_hash, "abc1234");
    let services = h.store.services();
    assert_eq!(services.len(), 3);
    assert!(services.iter().all(|s| s.deployment_id == deployments[0].id));

    assert_eq!(
        h.functions.function_names(),
        vec!["alice_api_abc1234", "alice_billing_abc1234", "alice_users_abc1234"]
    );
    let api = h.functions.function("alice_api_abc1234").unwrap();
    assert_eq!(
        api.code,
        FunctionCode::Image {
            uri: "123456789012.dkr.ecr.us-east-1.amazonaws.com/alice_api:abc1234-3.12".to_string()
        }
    );
    assert_eq!(api.environment.get("STAGE").map(String::as_str), Some("test"));
    assert_eq!(api.role_arn, "arn:aws:iam::123456789012:role/pare");

    assert_eq!(
        h.registry.repositories(),
        vec!["alice_api", "alice_billing", "alice_users"]
    );
    assert_eq!(h.runner.calls().len(), 3);
}

#[tokio::test]
async fn test_duplicate_service_name_makes_no_external_calls() {
    let h = Harness::new();
    let config = deploy_config("abc1234", &["api", "users", "API"]);

    let err = h
        .orchestrator()
        .deploy(&h.user, config, bundle_bytes().await)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DeployError::Config(ConfigError::DuplicateService(ref name)) if name == "api"
    ));
    assert!(h.runner.calls().is_empty());
    assert!(h.functions.calls().is_empty());
    assert!(h.registry.repositories().is_empty());
    assert!(h.store.deployments().is_empty());
}

#[tokio::test]
async fn test_same_git_hash_reuses_deployment() {
    let h = Harness::new();

    for _ in 0..2 {
        let result = h
            .orchestrator()
            .deploy(&h.user, deploy_config("abc1234", &["api", "users"]), bundle_bytes().await)
            .await
            .unwrap();
        assert!(result.is_success());
    }

    assert_eq!(h.store.deployments().len(), 1);
    assert_eq!(h.store.services().len(), 2);

    // second round updates the existing functions
    let updates = h
        .functions
        .calls()
        .into_iter()
        .filter(|c| matches!(c, FunctionCall::UpdateCode(_)))
        .count();
    assert_eq!(updates, 2);
}

#[tokio::test]
async fn test_one_failed_build_does_not_block_siblings() {
    let h = Harness::new();
    h.runner.fail_when("alice_billing", 1, "pip: no matching distribution");
    let config = deploy_config("abc1234", &["api", "billing", "users"]);

    let result = h
        .orchestrator()
        .deploy(&h.user, config, bundle_bytes().await)
        .await
        .unwrap();

    assert_eq!(result.succeeded, vec!["api", "users"]);
    assert_eq!(result.failed, vec!["billing"]);
    assert_eq!(h.store.services().len(), 2);
    assert!(h.functions.function("alice_billing_abc1234").is_none());
}

#[tokio::test]
async fn test_results_follow_request_order() {
    let h = Harness::new();
    h.runner.delay_when("alice_first", Duration::from_millis(200));
    h.runner.fail_when("alice_second", 1, "boom");
    let config = deploy_config("abc1234", &["first", "second", "third", "fourth"]);

    let result = h
        .orchestrator()
        .deploy(&h.user, config, bundle_bytes().await)
        .await
        .unwrap();

    assert_eq!(result.succeeded, vec!["first", "third", "fourth"]);
    assert_eq!(result.failed, vec!["second"]);
}

#[tokio::test]
async fn test_concurrency_is_bounded() {
    let mut settings = test_settings();
    settings.orchestrator.max_concurrent_pipelines = 1;
    let h = Harness::with_settings(settings);
    h.runner.delay_when("alice_", Duration::from_millis(50));

    let started = Instant::now();
    let result = h
        .orchestrator()
        .deploy(&h.user, deploy_config("abc1234", &["a", "b", "c"]), bundle_bytes().await)
        .await
        .unwrap();

    assert!(result.is_success());
    assert!(started.elapsed() >= Duration::from_millis(150));
}

#[tokio::test]
async fn test_failed_service_write_is_reported_as_failed() {
    let h = Harness::new();
    h.store.fail_service_writes("users");
    let config = deploy_config("abc1234", &["api", "users"]);

    let result = h
        .orchestrator()
        .deploy(&h.user, config, bundle_bytes().await)
        .await
        .unwrap();

    assert_eq!(result.succeeded, vec!["api"]);
    assert_eq!(result.failed, vec!["users"]);
    // the function is live even though no row was written
    assert!(h.functions.function("alice_users_abc1234").is_some());
    let names: Vec<String> = h.store.services().into_iter().map(|s| s.name).collect();
    assert_eq!(names, vec!["api"]);
}

#[tokio::test]
async fn test_all_failed_creates_no_deployment() {
    let h = Harness::new();
    h.runner.fail_when("alice_", 2, "daemon not running");

    let result = h
        .orchestrator()
        .deploy(&h.user, deploy_config("abc1234", &["api", "users"]), bundle_bytes().await)
        .await
        .unwrap();

    assert!(result.succeeded.is_empty());
    assert_eq!(result.failed, vec!["api", "users"]);
    assert!(h.store.deployments().is_empty());
}

#[tokio::test]
async fn test_update_conflicts_exhaust_retries() {
    let h = Harness::new();
    h.orchestrator()
        .deploy(&h.user, deploy_config("abc1234", &["api", "users"]), bundle_bytes().await)
        .await
        .unwrap();

    // three attempts are allowed, so three conflicts exhaust them
    h.functions.inject_update_conflicts("alice_api_abc1234", 3);
    let result = h
        .orchestrator()
        .deploy(&h.user, deploy_config("abc1234", &["api", "users"]), bundle_bytes().await)
        .await
        .unwrap();
    assert_eq!(result.succeeded, vec!["users"]);
    assert_eq!(result.failed, vec!["api"]);

    // fewer conflicts than attempts are absorbed
    h.functions.inject_update_conflicts("alice_api_abc1234", 2);
    let result = h
        .orchestrator()
        .deploy(&h.user, deploy_config("abc1234", &["api"]), bundle_bytes().await)
        .await
        .unwrap();
    assert!(result.is_success());
}

#[tokio::test]
async fn test_registry_failure_fails_pipeline() {
    let h = Harness::new();
    h.registry.fail_create(
        "alice_api",
        ProviderError::other("AccessDeniedException", "not allowed"),
    );

    let result = h
        .orchestrator()
        .deploy(&h.user, deploy_config("abc1234", &["api", "users"]), bundle_bytes().await)
        .await
        .unwrap();

    assert_eq!(result.failed, vec!["api"]);
    // nothing was pushed for the failed service
    assert!(h
        .runner
        .calls()
        .iter()
        .all(|c| !c.display().contains("alice_api:")));
}

#[tokio::test]
async fn test_repository_policy_is_scoped_to_service_functions() {
    let h = Harness::new();
    h.orchestrator()
        .deploy(&h.user, deploy_config("abc1234", &["api", "api-v2"]), bundle_bytes().await)
        .await
        .unwrap();

    let policy = h.registry.policy("alice_api").unwrap();
    assert!(policy.permits(&format!("{ARN_PREFIX}alice_api_abc1234")));
    assert!(policy.permits(&format!("{ARN_PREFIX}alice_api_fff0000")));
    assert!(!policy.permits(&format!("{ARN_PREFIX}alice_api-v2_abc1234")));
    assert!(!policy.permits(&format!("{ARN_PREFIX}bob_api_abc1234")));
    assert!(!policy.permits("arn:aws:lambda:us-east-1:999999999999:function:alice_api_abc1234"));
}

#[tokio::test]
async fn test_quota_counts_distinct_deployments() {
    let mut settings = test_settings();
    settings.orchestrator.max_deployments_per_user = 1;
    let h = Harness::with_settings(settings);

    h.orchestrator()
        .deploy(&h.user, deploy_config("aaaaaaa", &["api"]), bundle_bytes().await)
        .await
        .unwrap();

    let err = h
        .orchestrator()
        .deploy(&h.user, deploy_config("bbbbbbb", &["api"]), bundle_bytes().await)
        .await
        .unwrap_err();
    assert!(matches!(err, DeployError::QuotaExceeded { limit: 1 }));

    // redeploying an existing version is not a new deployment
    let result = h
        .orchestrator()
        .deploy(&h.user, deploy_config("aaaaaaa", &["api"]), bundle_bytes().await)
        .await
        .unwrap();
    assert!(result.is_success());
}

#[tokio::test]
async fn test_blocked_user_is_rejected() {
    let h = Harness::new();
    let blocked = User {
        is_blocked: true,
        ..h.user.clone()
    };

    let err = h
        .orchestrator()
        .deploy(&blocked, deploy_config("abc1234", &["api"]), bundle_bytes().await)
        .await
        .unwrap_err();

    assert!(matches!(err, DeployError::Blocked(_)));
    assert!(h.runner.calls().is_empty());
}

#[tokio::test]
async fn test_usernames_differing_in_case_cannot_share_functions() {
    let h = Harness::new();
    assert!(h.store.create_user("Alice", "other-key").is_err());

    h.orchestrator()
        .deploy(&h.user, deploy_config("abc1234", &["api"]), bundle_bytes().await)
        .await
        .unwrap();
    let before = h.functions.function("alice_api_abc1234").unwrap();

    // a mixed-case row that bypassed the store's checks
    let impostor = User {
        id: h.user.id + 100,
        username: "Alice".to_string(),
        ..h.user.clone()
    };
    let err = h
        .orchestrator()
        .deploy(&impostor, deploy_config("abc1234", &["api"]), bundle_bytes().await)
        .await
        .unwrap_err();

    assert!(matches!(err, DeployError::Config(ConfigError::InvalidUsername(_))));
    assert_eq!(h.functions.function("alice_api_abc1234").unwrap(), before);
    assert_eq!(h.functions.function_names(), vec!["alice_api_abc1234"]);
    assert_eq!(h.runner.calls().len(), 1);
}

#[tokio::test]
async fn test_service_names_and_hashes_are_stored_lowercase() {
    let h = Harness::new();

    let result = h
        .orchestrator()
        .deploy(&h.user, deploy_config("ABC1234DEF", &["Api"]), bundle_bytes().await)
        .await
        .unwrap();

    assert_eq!(result.succeeded, vec!["api"]);
    assert_eq!(h.store.deployments()[0].git_hash, "abc1234");
    assert_eq!(h.store.services()[0].name, "api");
    assert_eq!(h.functions.function_names(), vec!["alice_api_abc1234"]);
    assert_eq!(h.registry.repositories(), vec!["alice_api"]);
}

#[tokio::test]
async fn test_invalid_archive_is_rejected() {
    let h = Harness::new();

    let err = h
        .orchestrator()
        .deploy(&h.user, deploy_config("abc1234", &["api"]), b"not a zip".to_vec())
        .await
        .unwrap_err();

    assert!(matches!(err, DeployError::InvalidArchive(_)));
    assert!(h.functions.calls().is_empty());
}

#[tokio::test]
async fn test_malformed_target_path_is_rejected_up_front() {
    let h = Harness::new();
    let mut config = deploy_config("abc1234", &["api"]);
    config.services[0].path = "app.api.handler".to_string();

    let err = h
        .orchestrator()
        .deploy(&h.user, config, bundle_bytes().await)
        .await
        .unwrap_err();

    // caught by request validation before any pipeline starts
    assert!(matches!(err, DeployError::Config(ConfigError::InvalidTargetPath(_))));
    assert!(h.runner.calls().is_empty());
}

#[tokio::test]
async fn test_pipeline_timeout() {
    let mut settings = test_settings();
    settings.orchestrator.pipeline_timeout_secs = 1;
    let h = Harness::with_settings(settings);
    h.runner.delay_when("alice_slow", Duration::from_secs(5));

    let started = Instant::now();
    let result = h
        .orchestrator()
        .deploy(&h.user, deploy_config("abc1234", &["slow", "fast"]), bundle_bytes().await)
        .await
        .unwrap();

    assert_eq!(result.succeeded, vec!["fast"]);
    assert_eq!(result.failed, vec!["slow"]);
    assert!(started.elapsed() < Duration::from_secs(4));
    assert!(h.functions.function("alice_slow_abc1234").is_none());
}

#[tokio::test]
async fn test_zip_packages_skip_the_registry() {
    let mut settings = test_settings();
    settings.build.package_type = PackageType::Zip;
    let h = Harness::with_settings(settings);

    let result = h
        .orchestrator()
        .deploy(&h.user, deploy_config("abc1234", &["api"]), bundle_bytes().await)
        .await
        .unwrap();

    assert!(result.is_success());
    assert!(h.registry.repositories().is_empty());
    match h.functions.function("alice_api_abc1234").unwrap().code {
        FunctionCode::Zip {
            runtime, handler, ..
        } => {
            assert_eq!(runtime, "python3.12");
            assert_eq!(handler, "lambda_function.lambda_handler");
        }
        other => panic!("expected zip code, got {:?}", other),
    }
    let calls = h.runner.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].program, "pip");
}

#[tokio::test]
async fn test_zip_redeploy_moves_to_the_new_runtime() {
    let mut settings = test_settings();
    settings.build.package_type = PackageType::Zip;
    let h = Harness::with_settings(settings);
    h.orchestrator()
        .deploy(&h.user, deploy_config("abc1234", &["api"]), bundle_bytes().await)
        .await
        .unwrap();

    let mut config = deploy_config("abc1234", &["api"]);
    config.python_version = "3.13".to_string();
    let result = h
        .orchestrator()
        .deploy(&h.user, config, bundle_bytes().await)
        .await
        .unwrap();

    assert!(result.is_success());
    let stored = h.functions.function("alice_api_abc1234").unwrap();
    assert_eq!(stored.revision, 2);
    match stored.code {
        FunctionCode::Zip { runtime, .. } => assert_eq!(runtime, "python3.13"),
        other => panic!("expected zip code, got {:?}", other),
    }
    assert_eq!(h.store.services().len(), 1);
}
