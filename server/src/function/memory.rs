//! In-memory function provider with fault injection

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::errors::ProviderError;
use crate::function::{
    FunctionCode, FunctionConfiguration, FunctionInfo, FunctionProvider, FunctionSpec,
};

/// Provider calls, in order, for assertions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FunctionCall {
    Get(String),
    Create(String),
    UpdateCode(String),
    UpdateConfiguration(String),
    Delete(String),
    Invoke(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFunction {
    pub code: FunctionCode,
    pub role_arn: String,
    pub environment: BTreeMap<String, String>,
    /// Bumped on every code update
    pub revision: u32,
}

#[derive(Debug, Default)]
struct Faults {
    /// Remaining conflicts to raise, per function, for code and configuration updates
    update_conflicts: HashMap<String, u32>,
    create_failures: HashMap<String, ProviderError>,
    delete_failures: HashMap<String, ProviderError>,
}

#[derive(Debug, Default)]
pub struct MemoryFunctions {
    functions: RwLock<BTreeMap<String, StoredFunction>>,
    faults: RwLock<Faults>,
    calls: RwLock<Vec<FunctionCall>>,
}

fn poisoned() -> ProviderError {
    ProviderError::other("Internal", "lock poisoned")
}

impl MemoryFunctions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise `count` update conflicts for `name` before updates succeed
    pub fn inject_update_conflicts(&self, name: &str, count: u32) {
        if let Ok(mut faults) = self.faults.write() {
            faults.update_conflicts.insert(name.to_string(), count);
        }
    }

    pub fn fail_create(&self, name: &str, error: ProviderError) {
        if let Ok(mut faults) = self.faults.write() {
            faults.create_failures.insert(name.to_string(), error);
        }
    }

    pub fn fail_delete(&self, name: &str, error: ProviderError) {
        if let Ok(mut faults) = self.faults.write() {
            faults.delete_failures.insert(name.to_string(), error);
        }
    }

    pub fn function(&self, name: &str) -> Option<StoredFunction> {
        self.functions.read().ok()?.get(name).cloned()
    }

    pub fn function_names(&self) -> Vec<String> {
        self.functions
            .read()
            .map(|f| f.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<FunctionCall> {
        self.calls.read().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, call: FunctionCall) -> Result<(), ProviderError> {
        self.calls.write().map_err(|_| poisoned())?.push(call);
        Ok(())
    }

    fn take_conflict(&self, name: &str) -> Result<(), ProviderError> {
        let mut faults = self.faults.write().map_err(|_| poisoned())?;
        match faults.update_conflicts.get_mut(name) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Err(ProviderError::Conflict(format!(
                    "An update is in progress for resource: {}",
                    name
                )))
            }
            _ => Ok(()),
        }
    }

    fn info(name: &str, function: &StoredFunction) -> FunctionInfo {
        FunctionInfo {
            name: name.to_string(),
            arn: Some(format!("memory:function:{}", name)),
            detail: format!("{:?}", function),
        }
    }
}

#[async_trait]
impl FunctionProvider for MemoryFunctions {
    async fn get_function(&self, name: &str) -> Result<FunctionInfo, ProviderError> {
        self.record(FunctionCall::Get(name.to_string()))?;
        let functions = self.functions.read().map_err(|_| poisoned())?;
        functions
            .get(name)
            .map(|f| Self::info(name, f))
            .ok_or_else(|| ProviderError::NotFound(format!("Function not found: {}", name)))
    }

    async fn create_function(&self, spec: &FunctionSpec) -> Result<FunctionInfo, ProviderError> {
        self.record(FunctionCall::Create(spec.name.clone()))?;
        if let Some(err) = self
            .faults
            .read()
            .map_err(|_| poisoned())?
            .create_failures
            .get(&spec.name)
        {
            return Err(err.clone());
        }

        let mut functions = self.functions.write().map_err(|_| poisoned())?;
        if functions.contains_key(&spec.name) {
            return Err(ProviderError::Conflict(format!(
                "Function already exist: {}",
                spec.name
            )));
        }
        let function = StoredFunction {
            code: spec.code.clone(),
            role_arn: spec.role_arn.clone(),
            environment: spec.environment.clone(),
            revision: 1,
        };
        let info = Self::info(&spec.name, &function);
        functions.insert(spec.name.clone(), function);
        Ok(info)
    }

    async fn update_function_code(
        &self,
        name: &str,
        code: &FunctionCode,
    ) -> Result<FunctionInfo, ProviderError> {
        self.record(FunctionCall::UpdateCode(name.to_string()))?;
        self.take_conflict(name)?;

        let mut functions = self.functions.write().map_err(|_| poisoned())?;
        let function = functions
            .get_mut(name)
            .ok_or_else(|| ProviderError::NotFound(format!("Function not found: {}", name)))?;
        // like the real provider, a zip code update keeps runtime and handler
        match (&mut function.code, code) {
            (FunctionCode::Zip { bytes, .. }, FunctionCode::Zip { bytes: new, .. }) => {
                *bytes = new.clone();
            }
            (stored, code) => *stored = code.clone(),
        }
        function.revision += 1;
        Ok(Self::info(name, function))
    }

    async fn update_function_configuration(
        &self,
        name: &str,
        configuration: &FunctionConfiguration,
    ) -> Result<FunctionInfo, ProviderError> {
        self.record(FunctionCall::UpdateConfiguration(name.to_string()))?;
        self.take_conflict(name)?;

        let mut functions = self.functions.write().map_err(|_| poisoned())?;
        let function = functions
            .get_mut(name)
            .ok_or_else(|| ProviderError::NotFound(format!("Function not found: {}", name)))?;
        function.environment = configuration.environment.clone();
        if let FunctionCode::Zip {
            runtime, handler, ..
        } = &mut function.code
        {
            if let Some(new) = &configuration.runtime {
                *runtime = new.clone();
            }
            if let Some(new) = &configuration.handler {
                *handler = new.clone();
            }
        }
        Ok(Self::info(name, function))
    }

    async fn delete_function(&self, name: &str) -> Result<(), ProviderError> {
        self.record(FunctionCall::Delete(name.to_string()))?;
        if let Some(err) = self
            .faults
            .read()
            .map_err(|_| poisoned())?
            .delete_failures
            .get(name)
        {
            return Err(err.clone());
        }

        let mut functions = self.functions.write().map_err(|_| poisoned())?;
        functions
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| ProviderError::NotFound(format!("Function not found: {}", name)))
    }

    async fn invoke(&self, name: &str, payload: &[u8]) -> Result<Vec<u8>, ProviderError> {
        self.record(FunctionCall::Invoke(name.to_string()))?;
        let functions = self.functions.read().map_err(|_| poisoned())?;
        if !functions.contains_key(name) {
            return Err(ProviderError::NotFound(format!("Function not found: {}", name)));
        }
        let body = String::from_utf8_lossy(payload).into_owned();
        let response = serde_json::json!({ "statusCode": 200, "body": body });
        Ok(response.to_string().into_bytes())
    }
}
