//! `pare invoke`

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;

use crate::client::ApiClient;
use crate::settings::CliSettings;

#[derive(Args, Debug)]
pub struct InvokeArgs {
    /// Service to invoke
    #[arg(value_name = "SERVICE")]
    pub name: String,

    /// JSON payload, or @file.json
    #[arg(short, long, value_name = "JSON")]
    pub data: Option<String>,

    /// Deployment to invoke: a git hash or "latest"
    #[arg(short, long, value_name = "HASH", default_value = "latest")]
    pub git_hash: String,
}

/// Payload from `--data`. No data means an empty object.
pub async fn parse_payload(data: Option<&str>) -> Result<serde_json::Value> {
    let Some(data) = data else {
        return Ok(serde_json::json!({}));
    };
    let text = match data.strip_prefix('@') {
        Some(path) => tokio::fs::read_to_string(Path::new(path))
            .await
            .with_context(|| format!("Failed to read payload file: {}", path))?,
        None => data.to_string(),
    };
    serde_json::from_str(&text).context("Payload is not valid JSON")
}

pub async fn execute(args: InvokeArgs, settings: &CliSettings) -> Result<()> {
    let payload = parse_payload(args.data.as_deref()).await?;
    let client = ApiClient::new(settings)?;
    let response = client.invoke(&args.name, &args.git_hash, &payload).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
