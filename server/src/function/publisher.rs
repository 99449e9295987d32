//! Create-or-update of a function
//!
//! A function is either ABSENT or PRESENT. ABSENT functions are created
//! with the code, role and environment in one call. PRESENT functions get
//! their code updated and then their configuration, each retried while the
//! provider reports a conflicting in-flight update.

use std::collections::BTreeMap;
use std::sync::Arc;

use api_models::ConfigError;
use tracing::{debug, error, info};

use crate::errors::{ProviderError, PublishError};
use crate::function::retry::{retry_on_conflict, RetryPolicy, SleepFn};
use crate::function::runtime::is_supported_runtime;
use crate::function::{
    FunctionCode, FunctionConfiguration, FunctionInfo, FunctionProvider, FunctionSpec,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishAction {
    Created,
    Updated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    pub action: PublishAction,
    pub function: FunctionInfo,
}

pub struct FunctionPublisher {
    provider: Arc<dyn FunctionProvider>,
    role_arn: String,
    retry: RetryPolicy,
    sleep_fn: SleepFn,
}

impl FunctionPublisher {
    pub fn new(
        provider: Arc<dyn FunctionProvider>,
        role_arn: impl Into<String>,
        retry: RetryPolicy,
        sleep_fn: SleepFn,
    ) -> Self {
        Self {
            provider,
            role_arn: role_arn.into(),
            retry,
            sleep_fn,
        }
    }

    pub async fn publish(
        &self,
        name: &str,
        code: FunctionCode,
        environment: &BTreeMap<String, String>,
    ) -> Result<PublishOutcome, PublishError> {
        if let FunctionCode::Zip { runtime, .. } = &code {
            if !is_supported_runtime(runtime) {
                return Err(ConfigError::UnsupportedPythonVersion(runtime.clone()).into());
            }
        }

        match self.provider.get_function(name).await {
            Ok(_) => self.update(name, &code, environment).await,
            Err(ProviderError::NotFound(_)) => self.create(name, code, environment).await,
            Err(e) => {
                error!(function = name, code = e.code(), error = %e, "failed to look up function");
                Err(e.into())
            }
        }
    }

    async fn create(
        &self,
        name: &str,
        code: FunctionCode,
        environment: &BTreeMap<String, String>,
    ) -> Result<PublishOutcome, PublishError> {
        let spec = FunctionSpec {
            name: name.to_string(),
            code,
            role_arn: self.role_arn.clone(),
            environment: environment.clone(),
        };
        let function = self.provider.create_function(&spec).await.inspect_err(|e| {
            error!(function = name, code = e.code(), error = %e, "failed to create function");
        })?;
        info!(function = name, kind = spec.code.kind(), "created function");

        Ok(PublishOutcome {
            action: PublishAction::Created,
            function,
        })
    }

    async fn update(
        &self,
        name: &str,
        code: &FunctionCode,
        environment: &BTreeMap<String, String>,
    ) -> Result<PublishOutcome, PublishError> {
        let provider = &self.provider;
        let configuration = FunctionConfiguration::for_code(code, environment);
        let configuration = &configuration;

        retry_on_conflict(&self.retry, &self.sleep_fn, "update_function_code", move || {
            provider.update_function_code(name, code)
        })
        .await?;
        debug!(function = name, "function code updated");

        let function = retry_on_conflict(
            &self.retry,
            &self.sleep_fn,
            "update_function_configuration",
            move || provider.update_function_configuration(name, configuration),
        )
        .await?;
        info!(function = name, kind = code.kind(), "updated function");

        Ok(PublishOutcome {
            action: PublishAction::Updated,
            function,
        })
    }
}
