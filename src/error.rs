// Error handling module
// Defines error types and HTTP response conversion

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// API errors that can occur during request processing
#[derive(Error, Debug)]
pub enum ApiError {
    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthError(String),

    /// Request validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Ollama is up but the requested model has not been pulled
    #[error("Model not available: {0}")]
    ModelUnavailable(String),

    /// Ollama could not be reached at all
    #[error("Ollama unreachable: {0}")]
    OllamaUnreachable(String),

    /// Error response from Ollama
    #[error("Ollama error: {status} - {message}")]
    OllamaError { status: u16, message: String },

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    /// Short machine-readable error type
    pub fn error_type(&self) -> &'static str {
        match self {
            ApiError::AuthError(_) => "auth_error",
            ApiError::ValidationError(_) => "validation_error",
            ApiError::ModelUnavailable(_) => "model_unavailable",
            ApiError::OllamaUnreachable(_) => "ollama_unreachable",
            ApiError::OllamaError { .. } => "ollama_error",
            ApiError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let error_type = self.error_type();
        let (status, message) = match self {
            ApiError::AuthError(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::ModelUnavailable(model) => (
                StatusCode::SERVICE_UNAVAILABLE,
                format!("Model {} not found. Run: ollama pull {}", model, model),
            ),
            ApiError::OllamaUnreachable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::OllamaError { status, message } => {
                let status_code =
                    StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                (status_code, message)
            }
            ApiError::Internal(err) => {
                tracing::error!("Internal error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "message": message,
                "type": error_type,
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ApiError::AuthError("Invalid token".to_string());
        assert_eq!(err.to_string(), "Authentication failed: Invalid token");

        let err = ApiError::ModelUnavailable("deepseek-r1:1.5b".to_string());
        assert_eq!(err.to_string(), "Model not available: deepseek-r1:1.5b");

        let err = ApiError::OllamaError {
            status: 500,
            message: "model crashed".to_string(),
        };
        assert_eq!(err.to_string(), "Ollama error: 500 - model crashed");
    }

    #[test]
    fn test_error_types() {
        assert_eq!(
            ApiError::ValidationError(String::new()).error_type(),
            "validation_error"
        );
        assert_eq!(
            ApiError::OllamaUnreachable(String::new()).error_type(),
            "ollama_unreachable"
        );
        assert_eq!(
            ApiError::Internal(anyhow::anyhow!("boom")).error_type(),
            "internal_error"
        );
    }

    #[tokio::test]
    async fn test_error_response_conversion() {
        let response = ApiError::AuthError("Invalid token".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = ApiError::ValidationError("empty text".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = ApiError::ModelUnavailable("llama3".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let response = ApiError::OllamaUnreachable("refused".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_model_unavailable_body_suggests_pull() {
        let response = ApiError::ModelUnavailable("llama3".to_string()).into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["type"], "model_unavailable");
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("ollama pull llama3"));
    }

    #[tokio::test]
    async fn test_ollama_error_passes_status_through() {
        let err = ApiError::OllamaError {
            status: 404,
            message: "not found".to_string(),
        };
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);

        // Out of range status codes fall back to 500
        let err = ApiError::OllamaError {
            status: 1000,
            message: "weird".to_string(),
        };
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_internal_error_hides_details() {
        let response = ApiError::Internal(anyhow::anyhow!("secret detail")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["message"], "Internal server error");
    }
}
