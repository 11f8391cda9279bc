use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::types::{validate_variants, GeneratedVariant, GenerationRequest, GenerationResponse};
use super::TemplateEngine;
use crate::config::GeneratorConfig;
use crate::error::{AppError, GenerationError};

/// Remote template engine reached over HTTP with a bearer credential.
pub struct HttpTemplateEngine {
    client: Client,
    endpoint: Url,
    api_key: String,
}

impl HttpTemplateEngine {
    pub fn new(endpoint: &str, api_key: String, timeout: Duration) -> Result<Self, AppError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| AppError::ConfigError(format!("Invalid generator url {}: {}", endpoint, e)))?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::InternalError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, endpoint, api_key })
    }

    pub fn from_config(config: &GeneratorConfig) -> Result<Self, AppError> {
        Self::new(&config.url, config.api_key.clone(), Duration::from_secs(config.timeout_secs))
    }
}

#[async_trait]
impl TemplateEngine for HttpTemplateEngine {
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<GeneratedVariant>, GenerationError> {
        debug!(platform = %request.platform, "Requesting content from remote generator");

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Content generator returned an error status");
            return Err(GenerationError::Status(status.as_u16()));
        }

        let body: GenerationResponse = response.json().await?;
        validate_variants(body.content)
    }
}
