#![doc = "Ollama HTTP client: the concrete `InferenceClient` used by the binary."]
//
//! # Ollama client
//!
//! Talks to a locally running Ollama server over its REST API:
//!
//! - `GET  {base}/api/tags`     → installed models
//! - `POST {base}/api/generate` → one non-streaming completion
//!
//! Transport failures and timeouts map to `AnalyzerError::ServiceUnavailable`,
//! non-success statuses and undecodable bodies to `AnalyzerError::ServiceError`.
//! Nothing is retried.

use async_trait::async_trait;
use dmarc_analyzer_core::contract::InferenceClient;
use dmarc_analyzer_core::AnalyzerError;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const LIST_MODELS_TIMEOUT: Duration = Duration::from_secs(10);

pub struct OllamaClient {
    http: Client,
    base_url: String,
    request_timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaClient {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, AnalyzerError> {
        let http = Client::builder()
            .build()
            .map_err(|e| AnalyzerError::ServiceUnavailable(format!("could not build HTTP client: {e}")))?;
        let base_url = base_url.trim_end_matches('/').to_string();
        tracing::info!(%base_url, timeout_secs = request_timeout.as_secs(), "Initialised Ollama client");
        Ok(Self {
            http,
            base_url,
            request_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }
}

fn transport_error(url: &str, e: reqwest::Error) -> AnalyzerError {
    tracing::error!(error = ?e, %url, "Request to Ollama failed");
    if e.is_timeout() {
        AnalyzerError::ServiceUnavailable(format!("request to {url} timed out"))
    } else {
        AnalyzerError::ServiceUnavailable(format!("cannot reach Ollama at {url}: {e}"))
    }
}

async fn check_status(url: &str, resp: Response) -> Result<Response, AnalyzerError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    tracing::error!(status = status.as_u16(), %url, body = %body, "Ollama returned an error status");
    Err(AnalyzerError::ServiceError {
        status: status.as_u16(),
        message: if body.is_empty() {
            status.canonical_reason().unwrap_or("unknown error").to_string()
        } else {
            body
        },
    })
}

fn decode_error(url: &str, e: reqwest::Error) -> AnalyzerError {
    // The request timeout also covers reading the body.
    if e.is_timeout() {
        return transport_error(url, e);
    }
    tracing::error!(error = ?e, %url, "Could not decode Ollama response");
    AnalyzerError::ServiceError {
        status: 200,
        message: format!("invalid response body: {e}"),
    }
}

#[async_trait]
impl InferenceClient for OllamaClient {
    async fn list_models(&self) -> Result<Vec<String>, AnalyzerError> {
        let url = self.url("/api/tags");
        tracing::debug!(%url, "Listing installed models");
        let resp = self
            .http
            .get(&url)
            .timeout(LIST_MODELS_TIMEOUT)
            .send()
            .await
            .map_err(|e| transport_error(&url, e))?;
        let tags: TagsResponse = check_status(&url, resp)
            .await?
            .json()
            .await
            .map_err(|e| decode_error(&url, e))?;

        let mut names: Vec<String> = tags.models.into_iter().map(|m| m.name).collect();
        names.sort();
        names.dedup();
        tracing::info!(count = names.len(), "Fetched installed models");
        Ok(names)
    }

    async fn generate(&self, model: &str, prompt: &str) -> Result<String, AnalyzerError> {
        let url = self.url("/api/generate");
        tracing::info!(%url, model, prompt_len = prompt.len(), "Sending analysis request");
        let resp = self
            .http
            .post(&url)
            .timeout(self.request_timeout)
            .json(&GenerateRequest {
                model,
                prompt,
                stream: false,
            })
            .send()
            .await
            .map_err(|e| transport_error(&url, e))?;
        let body: GenerateResponse = check_status(&url, resp)
            .await?
            .json()
            .await
            .map_err(|e| decode_error(&url, e))?;
        tracing::debug!(response_len = body.response.len(), "Received analysis response");
        Ok(body.response)
    }
}
