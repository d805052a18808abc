use anyhow::Context;
use reqwest::{Client, Request, Response};
use std::time::Duration;

use crate::error::ApiError;
use crate::models::ollama::{GenerateRequest, GenerateResponse, ModelTag, TagsResponse};

/// HTTP client for the Ollama API with retry logic
pub struct OllamaHttpClient {
    /// Shared HTTP client with connection pooling
    client: Client,

    /// Ollama base URL without trailing slash
    base_url: String,

    /// Maximum number of retries
    max_retries: u32,

    /// Base delay for exponential backoff (milliseconds)
    base_delay_ms: u64,
}

impl OllamaHttpClient {
    /// Create a new HTTP client
    pub fn new(
        base_url: &str,
        max_connections: usize,
        connect_timeout: u64,
        request_timeout: u64,
        max_retries: u32,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .pool_max_idle_per_host(max_connections)
            .connect_timeout(Duration::from_secs(connect_timeout))
            .timeout(Duration::from_secs(request_timeout))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_retries,
            base_delay_ms: 500,
        })
    }

    /// Override the backoff base delay
    pub fn with_base_delay(mut self, base_delay_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET /api/tags - models pulled on the Ollama server
    pub async fn list_models(&self) -> Result<Vec<ModelTag>, ApiError> {
        let req = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .build()
            .map_err(|e| ApiError::Internal(anyhow::anyhow!("Failed to build request: {}", e)))?;

        let response = self.request_with_retry(req).await?;
        let tags: TagsResponse = response.json().await.map_err(|e| ApiError::OllamaError {
            status: 502,
            message: format!("Invalid /api/tags response: {}", e),
        })?;

        Ok(tags.models)
    }

    /// Whether Ollama answers /api/tags at all. Never retries.
    pub async fn is_reachable(&self) -> bool {
        let req = match self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .build()
        {
            Ok(req) => req,
            Err(_) => return false,
        };
        self.request_no_retry(req).await.is_ok()
    }

    /// POST /api/generate (non-streaming), returning the model's answer text
    pub async fn generate(&self, request: &GenerateRequest) -> Result<String, ApiError> {
        let req = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(request)
            .build()
            .map_err(|e| ApiError::Internal(anyhow::anyhow!("Failed to build request: {}", e)))?;

        let response = match self.request_with_retry(req).await {
            Ok(response) => response,
            // Ollama answers 404 for models that were never pulled
            Err(ApiError::OllamaError { status: 404, .. }) => {
                return Err(ApiError::ModelUnavailable(request.model.clone()));
            }
            Err(e) => return Err(e),
        };

        let body: GenerateResponse = response.json().await.map_err(|e| ApiError::OllamaError {
            status: 502,
            message: format!("Invalid /api/generate response: {}", e),
        })?;

        tracing::debug!(
            model = %body.model,
            eval_count = ?body.eval_count,
            done_reason = ?body.done_reason,
            "Generation finished"
        );

        Ok(body.response)
    }

    /// Execute a request with retry logic
    /// Retries 429, 5xx and transport errors with exponential backoff
    pub async fn request_with_retry(&self, request: Request) -> Result<Response, ApiError> {
        self.execute(request, self.max_retries).await
    }

    /// Execute a request without retries (health probes)
    pub async fn request_no_retry(&self, request: Request) -> Result<Response, ApiError> {
        self.execute(request, 0).await
    }

    async fn execute(&self, request: Request, max_retries: u32) -> Result<Response, ApiError> {
        let mut attempt = 0;

        let method = request.method().clone();
        let url = request.url().clone();
        tracing::debug!(method = %method, url = %url, "Sending HTTP request");

        loop {
            let req = request.try_clone().ok_or_else(|| {
                ApiError::Internal(anyhow::anyhow!("Request body is not cloneable"))
            })?;

            match self.client.execute(req).await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        tracing::debug!(status = %status, "Request successful");
                        return Ok(response);
                    }

                    let retryable = status.as_u16() == 429 || status.is_server_error();
                    if retryable && attempt < max_retries {
                        let delay = self.calculate_backoff_delay(attempt);
                        tracing::warn!(
                            "Received {}, retrying after {}ms (attempt {}/{})",
                            status,
                            delay,
                            attempt + 1,
                            max_retries
                        );
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                        attempt += 1;
                        continue;
                    }

                    let error_text = response.text().await.unwrap_or_default();
                    tracing::error!(
                        status = status.as_u16(),
                        url = %url,
                        response_body = %error_text,
                        attempt = attempt + 1,
                        "Ollama request failed with error response"
                    );
                    return Err(ApiError::OllamaError {
                        status: status.as_u16(),
                        message: error_message(&error_text),
                    });
                }

                Err(e) => {
                    let error_kind = if e.is_timeout() {
                        "timeout"
                    } else if e.is_connect() {
                        "connection_failed"
                    } else if e.is_request() {
                        "request_error"
                    } else if e.is_body() {
                        "body_error"
                    } else {
                        "unknown"
                    };

                    if attempt < max_retries {
                        let delay = self.calculate_backoff_delay(attempt);
                        tracing::warn!(
                            error_kind = error_kind,
                            error = %e,
                            url = %url,
                            "Request failed, retrying after {}ms (attempt {}/{})",
                            delay,
                            attempt + 1,
                            max_retries
                        );
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                        attempt += 1;
                        continue;
                    }

                    tracing::error!(
                        error_kind = error_kind,
                        error = %e,
                        url = %url,
                        total_attempts = attempt + 1,
                        "Ollama request failed after all retries"
                    );

                    return Err(ApiError::OllamaUnreachable(format!(
                        "Could not reach Ollama at {} ({}). Is `ollama serve` running?",
                        self.base_url, error_kind
                    )));
                }
            }
        }
    }

    /// Calculate exponential backoff delay: base * 2^attempt plus up to 10% jitter
    fn calculate_backoff_delay(&self, attempt: u32) -> u64 {
        let delay = self.base_delay_ms * 2_u64.pow(attempt);
        let jitter = (delay as f64 * 0.1 * jitter_fraction()) as u64;
        delay + jitter
    }
}

/// Pseudo-random fraction in [0, 1) from the clock's sub-second nanos
fn jitter_fraction() -> f64 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    (nanos % 1000) as f64 / 1000.0
}

/// Ollama reports errors as {"error": "..."}; fall back to the raw body
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}
