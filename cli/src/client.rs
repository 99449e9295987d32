//! Deploy API client

use std::time::Duration;

use api_models::services::DeletedService;
use api_models::{DeployConfig, DeployResult, ServiceSchema, API_VERSION};
use reqwest::multipart::{Form, Part};
use reqwest::{header::HeaderValue, Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, error};

use crate::bundle::BUNDLE_FILE_NAME;
use crate::errors::CliError;
use crate::settings::CliSettings;

/// Builds run server-side, so deploys get a generous timeout
const DEPLOY_TIMEOUT: Duration = Duration::from_secs(15 * 60);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct ApiClient {
    client: Client,
    base_url: String,
    api_key: HeaderValue,
    api_key_header: String,
    atomic_deployment_header: String,
}

impl ApiClient {
    pub fn new(settings: &CliSettings) -> Result<Self, CliError> {
        let mut api_key =
            HeaderValue::from_str(settings.require_api_key()?).map_err(|_| CliError::InvalidApiKey)?;
        api_key.set_sensitive(true);
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            client,
            base_url: settings.api_url.trim_end_matches('/').to_string(),
            api_key,
            api_key_header: settings.api_key_header.clone(),
            atomic_deployment_header: settings.atomic_deployment_header.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}{}", self.base_url, API_VERSION, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.header(self.api_key_header.as_str(), self.api_key.clone())
    }

    fn versioned(&self, request: RequestBuilder, git_hash: &str) -> RequestBuilder {
        request.header(self.atomic_deployment_header.as_str(), git_hash)
    }

    /// Upload a bundle and its manifest.
    ///
    /// A partially failed deployment comes back as `Ok` with failures listed,
    /// since the server reports it with the same body under a 500.
    pub async fn deploy(
        &self,
        config: &DeployConfig,
        bundle: Vec<u8>,
    ) -> Result<DeployResult, CliError> {
        let url = self.url("/deploy/");
        debug!("POST {}", url);

        let file = Part::bytes(bundle)
            .file_name(BUNDLE_FILE_NAME)
            .mime_str("application/zip")?;
        let form = Form::new()
            .part("file", file)
            .text("json_data", serde_json::to_string(config)?);

        let request = self
            .client
            .post(&url)
            .timeout(DEPLOY_TIMEOUT)
            .multipart(form);
        let response = self.authorized(request).send().await?;

        match response.status() {
            StatusCode::OK => Ok(response.json().await?),
            StatusCode::INTERNAL_SERVER_ERROR => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                serde_json::from_str::<DeployResult>(&body)
                    .map_err(|_| api_error(status, &body))
            }
            _ => Err(error_for(response).await),
        }
    }

    pub async fn list_services(&self) -> Result<Vec<ServiceSchema>, CliError> {
        let url = self.url("/services/");
        debug!("GET {}", url);
        let response = self.authorized(self.client.get(&url)).send().await?;
        json_or_error(response).await
    }

    pub async fn get_service(&self, name: &str, git_hash: &str) -> Result<ServiceSchema, CliError> {
        let url = self.url(&format!("/services/{}/", name));
        debug!("GET {}", url);
        let request = self.versioned(self.client.get(&url), git_hash);
        let response = self.authorized(request).send().await?;
        json_or_error(response).await
    }

    pub async fn delete_service(
        &self,
        name: &str,
        git_hash: &str,
    ) -> Result<DeletedService, CliError> {
        let url = self.url(&format!("/services/delete/{}/", name));
        debug!("DELETE {}", url);
        let request = self.versioned(self.client.delete(&url), git_hash);
        let response = self.authorized(request).send().await?;
        json_or_error(response).await
    }

    pub async fn invoke(
        &self,
        name: &str,
        git_hash: &str,
        payload: &serde_json::Value,
    ) -> Result<serde_json::Value, CliError> {
        let url = self.url(&format!("/services/invoke/{}/", name));
        debug!("POST {}", url);
        let request = self.versioned(self.client.post(&url), git_hash).json(payload);
        let response = self.authorized(request).send().await?;
        json_or_error(response).await
    }
}

async fn json_or_error<T: DeserializeOwned>(response: Response) -> Result<T, CliError> {
    if !response.status().is_success() {
        return Err(error_for(response).await);
    }
    Ok(response.json().await?)
}

async fn error_for(response: Response) -> CliError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    api_error(status, &body)
}

/// Prefer the server's `detail` message over the raw body
fn api_error(status: StatusCode, body: &str) -> CliError {
    let detail = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| value.get("detail").and_then(|d| d.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.to_string());
    error!("HTTP request failed: {} - {}", status, detail);
    CliError::Api {
        status: status.as_u16(),
        detail,
    }
}
