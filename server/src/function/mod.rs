//! Serverless function publishing

pub mod memory;
pub mod publisher;
pub mod retry;
pub mod runtime;

#[cfg(feature = "aws")]
pub mod aws;

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::errors::ProviderError;

/// Deployable function code
#[derive(Clone, PartialEq, Eq)]
pub enum FunctionCode {
    /// Published container image
    Image { uri: String },
    /// Inline zip package
    Zip {
        bytes: Vec<u8>,
        runtime: String,
        handler: String,
    },
}

impl FunctionCode {
    pub fn kind(&self) -> &'static str {
        match self {
            FunctionCode::Image { .. } => "image",
            FunctionCode::Zip { .. } => "zip",
        }
    }
}

impl std::fmt::Debug for FunctionCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FunctionCode::Image { uri } => f.debug_struct("Image").field("uri", uri).finish(),
            FunctionCode::Zip {
                bytes,
                runtime,
                handler,
            } => f
                .debug_struct("Zip")
                .field("bytes", &bytes.len())
                .field("runtime", runtime)
                .field("handler", handler)
                .finish(),
        }
    }
}

/// Everything needed to create a function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSpec {
    pub name: String,
    pub code: FunctionCode,
    pub role_arn: String,
    pub environment: BTreeMap<String, String>,
}

/// Configuration applied after a code update.
///
/// A code update only replaces the package. Zip functions also need their
/// runtime and handler rewritten, or a redeploy for another python version
/// keeps running on the old runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionConfiguration {
    pub environment: BTreeMap<String, String>,
    pub runtime: Option<String>,
    pub handler: Option<String>,
}

impl FunctionConfiguration {
    pub fn for_code(code: &FunctionCode, environment: &BTreeMap<String, String>) -> Self {
        let (runtime, handler) = match code {
            FunctionCode::Image { .. } => (None, None),
            FunctionCode::Zip {
                runtime, handler, ..
            } => (Some(runtime.clone()), Some(handler.clone())),
        };
        Self {
            environment: environment.clone(),
            runtime,
            handler,
        }
    }
}

/// Provider view of a function, kept for diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionInfo {
    pub name: String,
    pub arn: Option<String>,
    /// Raw provider response
    pub detail: String,
}

#[async_trait]
pub trait FunctionProvider: Send + Sync {
    async fn get_function(&self, name: &str) -> Result<FunctionInfo, ProviderError>;

    async fn create_function(&self, spec: &FunctionSpec) -> Result<FunctionInfo, ProviderError>;

    async fn update_function_code(
        &self,
        name: &str,
        code: &FunctionCode,
    ) -> Result<FunctionInfo, ProviderError>;

    async fn update_function_configuration(
        &self,
        name: &str,
        configuration: &FunctionConfiguration,
    ) -> Result<FunctionInfo, ProviderError>;

    async fn delete_function(&self, name: &str) -> Result<(), ProviderError>;

    /// Synchronous invocation, returning the response payload
    async fn invoke(&self, name: &str, payload: &[u8]) -> Result<Vec<u8>, ProviderError>;
}
