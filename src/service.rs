//! Blocking HTTP clients for the LLM and embedding services.
//!
//! Both speak the common chat-completions / embeddings JSON shapes. Calls get one bounded retry
//! for transient failures; anything else surfaces as a [`ServiceError`] for the comparator to
//! turn into a non-matching outcome.

use std::env;
use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::compare::{LlmClient, UnconfiguredLlm};
use crate::config::ServiceSettings;
use crate::error::ServiceError;
use crate::semantic::{DEFAULT_EMBEDDING_DIM, EmbeddingProvider, LocalHashEmbedder};

pub const MAX_RETRIES: u32 = 1;
pub const RETRY_BACKOFF_MS: u64 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            backoff: Duration::from_millis(RETRY_BACKOFF_MS),
        }
    }
}

impl RetryPolicy {
    pub fn no_backoff() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            backoff: Duration::ZERO,
        }
    }
}

/// Runs `call`, retrying transient failures up to `policy.max_retries` times.
pub fn with_retry<T>(
    policy: &RetryPolicy,
    operation: &str,
    mut call: impl FnMut() -> Result<T, ServiceError>,
) -> Result<T, ServiceError> {
    let mut retries = 0;
    loop {
        match call() {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && retries < policy.max_retries => {
                retries += 1;
                warn!(operation, retries, error = %err, "transient failure, retrying");
                sleep(policy.backoff * retries);
            }
            Err(err) => return Err(err),
        }
    }
}

pub struct HttpLlmClient {
    client: Client,
    endpoint: String,
    model: Option<String>,
    api_key: Option<String>,
}

impl HttpLlmClient {
    pub fn new(settings: &ServiceSettings, endpoint: &str) -> Result<Self, ServiceError> {
        Ok(Self {
            client: build_client(settings)?,
            endpoint: endpoint.to_string(),
            model: settings.model.clone(),
            api_key: api_key(settings),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl LlmClient for HttpLlmClient {
    fn complete(&self, prompt: &str) -> Result<String, ServiceError> {
        let body = json!({
            "model": self.model,
            "temperature": 0,
            "messages": [{"role": "user", "content": prompt}],
        });

        debug!(endpoint = %self.endpoint, "sending LLM comparison request");
        let response: ChatResponse =
            post_json(&self.client, &self.endpoint, self.api_key.as_deref(), &body)?;
        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                ServiceError::MalformedResponse("response has no message content".to_string())
            })
    }
}

pub struct HttpEmbeddingClient {
    client: Client,
    endpoint: String,
    model: Option<String>,
    api_key: Option<String>,
}

impl HttpEmbeddingClient {
    pub fn new(settings: &ServiceSettings, endpoint: &str) -> Result<Self, ServiceError> {
        Ok(Self {
            client: build_client(settings)?,
            endpoint: endpoint.to_string(),
            model: settings.model.clone(),
            api_key: api_key(settings),
        })
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingRow {
    embedding: Vec<f32>,
}

impl EmbeddingProvider for HttpEmbeddingClient {
    fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
        let body = json!({"model": self.model, "input": text});
        let response: EmbeddingResponse =
            post_json(&self.client, &self.endpoint, self.api_key.as_deref(), &body)?;
        response
            .data
            .into_iter()
            .next()
            .map(|row| row.embedding)
            .filter(|embedding| !embedding.is_empty())
            .ok_or_else(|| {
                ServiceError::MalformedResponse("response has no embedding".to_string())
            })
    }

    fn name(&self) -> &str {
        &self.endpoint
    }
}

/// Falls back to [`UnconfiguredLlm`] when no endpoint is set.
pub fn llm_client_from_settings(
    settings: &ServiceSettings,
) -> Result<Arc<dyn LlmClient>, ServiceError> {
    match settings.endpoint.as_deref() {
        Some(endpoint) if !endpoint.trim().is_empty() => {
            Ok(Arc::new(HttpLlmClient::new(settings, endpoint.trim())?))
        }
        _ => Ok(Arc::new(UnconfiguredLlm)),
    }
}

/// Falls back to the local hash embedder when no endpoint is set.
pub fn embedding_provider_from_settings(
    settings: &ServiceSettings,
) -> Result<Arc<dyn EmbeddingProvider>, ServiceError> {
    match settings.endpoint.as_deref() {
        Some(endpoint) if !endpoint.trim().is_empty() => {
            Ok(Arc::new(HttpEmbeddingClient::new(settings, endpoint.trim())?))
        }
        _ => Ok(Arc::new(LocalHashEmbedder::new(
            settings.dimensions.unwrap_or(DEFAULT_EMBEDDING_DIM),
        ))),
    }
}

fn build_client(settings: &ServiceSettings) -> Result<Client, ServiceError> {
    Client::builder()
        .timeout(Duration::from_millis(settings.timeout_ms))
        .build()
        .map_err(|err| ServiceError::Unavailable(format!("failed to build http client: {err}")))
}

fn api_key(settings: &ServiceSettings) -> Option<String> {
    settings
        .api_key_env
        .as_deref()
        .and_then(|name| env::var(name).ok())
        .filter(|value| !value.trim().is_empty())
}

fn post_json<T: for<'de> Deserialize<'de>>(
    client: &Client,
    endpoint: &str,
    api_key: Option<&str>,
    body: &serde_json::Value,
) -> Result<T, ServiceError> {
    let mut request = client.post(endpoint).json(body);
    if let Some(key) = api_key {
        request = request.bearer_auth(key);
    }

    let response = request.send().map_err(classify_transport_error)?;
    let status = response.status();
    if !status.is_success() {
        return Err(classify_status(status));
    }

    response
        .json::<T>()
        .map_err(|err| ServiceError::MalformedResponse(err.to_string()))
}

fn classify_transport_error(err: reqwest::Error) -> ServiceError {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        ServiceError::Transient(err.to_string())
    } else {
        ServiceError::Rejected(err.to_string())
    }
}

fn classify_status(status: StatusCode) -> ServiceError {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        ServiceError::Transient(format!("http status {status}"))
    } else {
        ServiceError::Rejected(format!("http status {status}"))
    }
}
