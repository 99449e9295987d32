//! AWS Lambda function provider

use std::collections::BTreeMap;

use async_trait::async_trait;
use aws_sdk_lambda::error::ProvideErrorMetadata;
use aws_sdk_lambda::primitives::Blob;
use aws_sdk_lambda::types::{
    Environment, FunctionCode as LambdaCode, InvocationType, PackageType, Runtime,
};
use aws_sdk_lambda::Client;

use crate::errors::ProviderError;
use crate::function::{
    FunctionCode, FunctionConfiguration, FunctionInfo, FunctionProvider, FunctionSpec,
};

pub struct LambdaFunctions {
    client: Client,
}

impl LambdaFunctions {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

fn provider_error<E: ProvideErrorMetadata>(err: &E) -> ProviderError {
    ProviderError::from_code(err.code(), err.message())
}

fn environment(variables: &BTreeMap<String, String>) -> Environment {
    Environment::builder()
        .set_variables(Some(variables.clone().into_iter().collect()))
        .build()
}

fn info<T: std::fmt::Debug>(name: &str, arn: Option<&str>, output: &T) -> FunctionInfo {
    FunctionInfo {
        name: name.to_string(),
        arn: arn.map(str::to_string),
        detail: format!("{:?}", output),
    }
}

#[async_trait]
impl FunctionProvider for LambdaFunctions {
    async fn get_function(&self, name: &str) -> Result<FunctionInfo, ProviderError> {
        let output = self
            .client
            .get_function()
            .function_name(name)
            .send()
            .await
            .map_err(|e| provider_error(&e))?;
        let arn = output.configuration().and_then(|c| c.function_arn());
        Ok(info(name, arn, &output))
    }

    async fn create_function(&self, spec: &FunctionSpec) -> Result<FunctionInfo, ProviderError> {
        let request = self
            .client
            .create_function()
            .function_name(&spec.name)
            .role(&spec.role_arn)
            .environment(environment(&spec.environment));

        let request = match &spec.code {
            FunctionCode::Image { uri } => request
                .package_type(PackageType::Image)
                .code(LambdaCode::builder().image_uri(uri).build()),
            FunctionCode::Zip {
                bytes,
                runtime,
                handler,
            } => request
                .package_type(PackageType::Zip)
                .runtime(Runtime::from(runtime.as_str()))
                .handler(handler)
                .code(LambdaCode::builder().zip_file(Blob::new(bytes.clone())).build()),
        };

        let output = request.send().await.map_err(|e| provider_error(&e))?;
        Ok(info(&spec.name, output.function_arn(), &output))
    }

    async fn update_function_code(
        &self,
        name: &str,
        code: &FunctionCode,
    ) -> Result<FunctionInfo, ProviderError> {
        let request = self.client.update_function_code().function_name(name);
        let request = match code {
            FunctionCode::Image { uri } => request.image_uri(uri),
            FunctionCode::Zip { bytes, .. } => request.zip_file(Blob::new(bytes.clone())),
        };

        let output = request.send().await.map_err(|e| provider_error(&e))?;
        Ok(info(name, output.function_arn(), &output))
    }

    async fn update_function_configuration(
        &self,
        name: &str,
        configuration: &FunctionConfiguration,
    ) -> Result<FunctionInfo, ProviderError> {
        let output = self
            .client
            .update_function_configuration()
            .function_name(name)
            .environment(environment(&configuration.environment))
            .set_runtime(configuration.runtime.as_deref().map(Runtime::from))
            .set_handler(configuration.handler.clone())
            .send()
            .await
            .map_err(|e| provider_error(&e))?;
        Ok(info(name, output.function_arn(), &output))
    }

    async fn delete_function(&self, name: &str) -> Result<(), ProviderError> {
        self.client
            .delete_function()
            .function_name(name)
            .send()
            .await
            .map_err(|e| provider_error(&e))?;
        Ok(())
    }

    async fn invoke(&self, name: &str, payload: &[u8]) -> Result<Vec<u8>, ProviderError> {
        let output = self
            .client
            .invoke()
            .function_name(name)
            .invocation_type(InvocationType::RequestResponse)
            .payload(Blob::new(payload))
            .send()
            .await
            .map_err(|e| provider_error(&e))?;

        if let Some(function_error) = output.function_error() {
            return Err(ProviderError::other("FunctionError", function_error));
        }
        Ok(output
            .payload()
            .map(|blob| blob.as_ref().to_vec())
            .unwrap_or_default())
    }
}
