// Authentication, CORS, and request tracing middleware

use axum::{body::Body, extract::State, http::Request, middleware::Next, response::Response};
use tower_http::{
    classify::{ServerErrorsAsFailures, SharedClassifier},
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::error::ApiError;
use crate::routes::AppState;

/// Authentication middleware
///
/// Only enforced when an API key is configured. Accepts
/// "Authorization: Bearer {API_KEY}" or the bare key in x-api-key.
pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let expected = match state.config.api_key.as_deref() {
        Some(key) => key,
        None => return Ok(next.run(request).await),
    };

    let bearer_ok = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| token == expected);

    let api_key_ok = request
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|key| key == expected);

    if bearer_ok || api_key_ok {
        return Ok(next.run(request).await);
    }

    let request_id = uuid::Uuid::new_v4().to_string()[..8].to_string();
    tracing::warn!(
        "[{}] Access attempt with invalid or missing API key: {} {}",
        request_id,
        request.method(),
        request.uri().path()
    );
    Err(ApiError::AuthError("Invalid or missing API Key".to_string()))
}

/// Create CORS middleware layer
///
/// The reading frontend is served from a different origin, so all origins,
/// methods and headers are allowed.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Per-request tracing spans
pub fn trace_layer() -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>> {
    TraceLayer::new_for_http()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::{
        http::{Request, StatusCode},
        routing::get,
        Router,
    };
    use tower::util::ServiceExt;

    fn create_test_state(api_key: Option<&str>) -> AppState {
        let mut config = Config::for_testing("http://127.0.0.1:11434");
        config.api_key = api_key.map(str::to_string);
        AppState::new(config).unwrap()
    }

    async fn test_handler() -> &'static str {
        "OK"
    }

    fn create_test_app(state: AppState) -> Router {
        Router::new()
            .route("/test", get(test_handler))
            .layer(axum::middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            ))
            .with_state(state)
    }

    async fn status_for(app: Router, header: Option<(&str, &str)>) -> StatusCode {
        let mut builder = Request::builder().uri("/test");
        if let Some((name, value)) = header {
            builder = builder.header(name, value);
        }
        let response = app
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        response.status()
    }

    #[tokio::test]
    async fn test_open_when_no_key_configured() {
        let app = create_test_app(create_test_state(None));
        assert_eq!(status_for(app, None).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_valid_bearer_token() {
        let app = create_test_app(create_test_state(Some("secret")));
        let status = status_for(app, Some(("authorization", "Bearer secret"))).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_valid_x_api_key() {
        let app = create_test_app(create_test_state(Some("secret")));
        let status = status_for(app, Some(("x-api-key", "secret"))).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_invalid_or_missing_key() {
        let state = create_test_state(Some("secret"));

        let app = create_test_app(state.clone());
        let status = status_for(app, Some(("authorization", "Bearer wrong"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let app = create_test_app(state.clone());
        let status = status_for(app, Some(("authorization", "secret"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let app = create_test_app(state);
        assert_eq!(status_for(app, None).await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_cors_layer_handles_preflight() {
        let app = Router::new()
            .route("/test", get(test_handler))
            .layer(cors_layer());

        let request = Request::builder()
            .method("OPTIONS")
            .uri("/test")
            .header("origin", "http://localhost:3000")
            .header("access-control-request-method", "POST")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "*"
        );
        assert!(response
            .headers()
            .contains_key("access-control-allow-methods"));
    }
}
