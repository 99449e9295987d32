//! Adapter shim generation
//!
//! The shim imports the user's target symbol and exposes it as the
//! function entrypoint. Import or start-up failures are turned into a
//! handler that answers with a 500 instead of crashing the cold start.

use std::path::Path;

use api_models::{validate, ConfigError};

use crate::errors::BuildError;
use crate::filesys::file::File;

const ADAPTER_TEMPLATE: &str = include_str!("../../templates/lambda_function.py.tmpl");

/// File name of the generated shim
pub const ADAPTER_FILE_NAME: &str = "lambda_function.py";

/// Handler reference for the generated shim
pub const ADAPTER_HANDLER: &str = "lambda_function.lambda_handler";

/// Render the shim for a `module:symbol` target
pub fn render_adapter(target_path: &str) -> Result<String, ConfigError> {
    let (module, symbol) = validate::target_path(target_path)?;
    Ok(ADAPTER_TEMPLATE
        .replace("{{module}}", module)
        .replace("{{symbol}}", symbol))
}

/// Render the shim and write it into `dir`.
/// Nothing is written when the target path is malformed.
pub async fn write_adapter(target_path: &str, dir: &Path) -> Result<File, BuildError> {
    let source = render_adapter(target_path)?;
    let file = File::new(dir.join(ADAPTER_FILE_NAME));
    file.write_string(&source).await?;
    Ok(file)
}
