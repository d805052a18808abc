use axum::{
    extract::{Query, State},
    middleware::{self as axum_middleware},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::cache::ModelCatalog;
use crate::config::Config;
use crate::emotion::{ChapterAnalysis, EmotionAnalysis, EmotionAnalyzer};
use crate::environment::{EnvironmentAnalysis, EnvironmentClassifier};
use crate::error::ApiError;
use crate::http_client::OllamaHttpClient;
use crate::middleware;
use crate::models::api::{
    BatchClassifyRequest, BatchClassifyResponse, ChapterRequest, ChunkParams, ClassifyRequest,
    ConfiguredModel, DocumentChunksResponse, EmotionRequest, ModelInfo, ModelList,
    StatusResponse,
};
use crate::reading;

/// Application version from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Upper bound on passages per batch request
const MAX_BATCH_SIZE: usize = 100;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub http_client: Arc<OllamaHttpClient>,
    pub catalog: ModelCatalog,
    pub environment: EnvironmentClassifier,
    pub emotions: EmotionAnalyzer,
}

impl AppState {
    /// Wire the Ollama client, model catalog and analyzers from configuration
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let http_client = Arc::new(OllamaHttpClient::new(
            &config.ollama_url,
            config.http_max_connections,
            config.http_connect_timeout,
            config.http_request_timeout,
            config.http_max_retries,
        )?);
        let catalog = ModelCatalog::new(config.model_cache_ttl);
        let environment = EnvironmentClassifier::new(http_client.clone(), catalog.clone(), &config);
        let emotions = EmotionAnalyzer::new(http_client.clone(), catalog.clone(), &config);

        Ok(Self {
            config: Arc::new(config),
            http_client,
            catalog,
            environment,
            emotions,
        })
    }
}

/// Build the application with all routes and middleware
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(health_routes())
        .merge(api_routes(state))
        .layer(middleware::cors_layer())
        .layer(middleware::trace_layer())
}

/// Health check routes (no authentication required)
pub fn health_routes() -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
}

/// Analysis API routes (API key required when configured)
pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/v1/status", get(status_handler))
        .route("/v1/models", get(get_models_handler))
        .route("/v1/environment", post(classify_handler))
        .route("/v1/environment/batch", post(classify_batch_handler))
        .route("/v1/emotions", post(emotions_handler))
        .route("/v1/emotions/chapter", post(chapter_handler))
        .route("/v1/documents/chunks", post(document_chunks_handler))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ))
        .with_state(state)
}

/// GET / - Simple health check
async fn root_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "message": "Trilha Sonora is running",
        "version": VERSION
    }))
}

/// GET /health - Detailed health check
///
/// Does not call Ollama; see /v1/status for upstream checks.
async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "version": VERSION
    }))
}

/// GET /v1/status - Ollama reachability and model availability
async fn status_handler(State(state): State<AppState>) -> Json<StatusResponse> {
    let reachable = state.http_client.is_reachable().await;

    if reachable {
        match state.http_client.list_models().await {
            Ok(models) => state.catalog.update(models),
            Err(e) => tracing::warn!("Failed to refresh model catalog: {}", e),
        }
    }

    let mut models = vec![ConfiguredModel {
        name: state.environment.model().to_string(),
        role: "environment",
        available: reachable && state.catalog.contains(state.environment.model()),
    }];
    models.push(ConfiguredModel {
        name: state.emotions.model().to_string(),
        role: "emotion",
        available: reachable && state.catalog.contains(state.emotions.model()),
    });

    Json(StatusResponse {
        ollama_url: state.http_client.base_url().to_string(),
        ollama_reachable: reachable,
        models,
        integrations: state.config.integrations.status(),
    })
}

/// GET /v1/models - Models pulled on the Ollama server
async fn get_models_handler(State(state): State<AppState>) -> Result<Json<ModelList>, ApiError> {
    tracing::info!("Request to /v1/models");

    state.catalog.refresh_if_stale(&state.http_client).await?;

    let models = state
        .catalog
        .all()
        .into_iter()
        .map(|tag| ModelInfo {
            id: tag.name,
            object: "model".to_string(),
            size: tag.size,
            modified_at: tag.modified_at,
        })
        .collect();

    Ok(Json(ModelList::new(models)))
}

/// POST /v1/environment - Classify the environment described by a passage
async fn classify_handler(
    State(state): State<AppState>,
    Json(request): Json<ClassifyRequest>,
) -> Result<Json<EnvironmentAnalysis>, ApiError> {
    tracing::info!("Request to /v1/environment: chars={}", request.text.chars().count());

    let analysis = state.environment.analyze(&request.text).await?;
    Ok(Json(analysis))
}

/// POST /v1/environment/batch - Classify several passages
async fn classify_batch_handler(
    State(state): State<AppState>,
    Json(request): Json<BatchClassifyRequest>,
) -> Result<Json<BatchClassifyResponse>, ApiError> {
    tracing::info!("Request to /v1/environment/batch: texts={}", request.texts.len());

    if request.texts.is_empty() {
        return Err(ApiError::ValidationError("texts cannot be empty".to_string()));
    }
    if request.texts.len() > MAX_BATCH_SIZE {
        return Err(ApiError::ValidationError(format!(
            "at most {} texts per batch",
            MAX_BATCH_SIZE
        )));
    }

    let results = state.environment.analyze_batch(&request.texts).await;
    Ok(Json(BatchClassifyResponse { results }))
}

/// POST /v1/emotions - Emotions and soundtrack profile of a passage
async fn emotions_handler(
    State(state): State<AppState>,
    Json(request): Json<EmotionRequest>,
) -> Result<Json<EmotionAnalysis>, ApiError> {
    tracing::info!("Request to /v1/emotions: chars={}", request.text.chars().count());

    let analysis = state.emotions.analyze(&request.text).await?;
    Ok(Json(analysis))
}

/// POST /v1/emotions/chapter - Aggregate emotions and recommend a track for a chapter
async fn chapter_handler(
    State(state): State<AppState>,
    Json(request): Json<ChapterRequest>,
) -> Result<Json<ChapterAnalysis>, ApiError> {
    tracing::info!(
        "Request to /v1/emotions/chapter: chars={}, chunks={:?}",
        request.text.chars().count(),
        request.chunks.as_ref().map(Vec::len)
    );

    let analysis = state
        .emotions
        .analyze_chapter(&request.text, request.chunks)
        .await?;
    Ok(Json(analysis))
}

/// POST /v1/documents/chunks - Split extracted book text into page chunks
///
/// The body is the document's extracted text, pages separated by form feeds.
async fn document_chunks_handler(
    State(state): State<AppState>,
    Query(params): Query<ChunkParams>,
    body: String,
) -> Result<Json<DocumentChunksResponse>, ApiError> {
    let pages_per_chunk = params.pages_per_chunk.unwrap_or(state.config.pages_per_chunk);
    if pages_per_chunk == 0 {
        return Err(ApiError::ValidationError(
            "pages_per_chunk must be greater than zero".to_string(),
        ));
    }

    let pages = reading::split_pages(&body);
    let chunks = reading::chunk_pages(&pages, pages_per_chunk);

    let response = match chunks.first() {
        Some(first) => {
            let tokens = reading::tokenize_words(first);
            tracing::debug!("First chunk: {} tokens", tokens.len());
            DocumentChunksResponse {
                total_chunks: chunks.len(),
                sample_chunk: first.clone(),
                token_count: tokens.len(),
                sample_tokens: tokens,
            }
        }
        None => DocumentChunksResponse {
            total_chunks: 0,
            sample_chunk: reading::EMPTY_DOCUMENT.to_string(),
            sample_tokens: Vec::new(),
            token_count: 0,
        },
    };

    tracing::info!(
        "Document split: pages={}, chunks={}",
        pages.len(),
        response.total_chunks
    );

    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::util::ServiceExt;

    fn create_test_state() -> AppState {
        // Nothing listens on port 9; handlers that reach Ollama fail fast
        AppState::new(Config::for_testing("http://127.0.0.1:9")).unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_root_handler() {
        let Json(body) = root_handler().await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["version"], VERSION);
    }

    #[tokio::test]
    async fn test_health_handler() {
        let Json(body) = health_handler().await;
        assert_eq!(body["status"], "healthy");
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_status_when_ollama_down() {
        let Json(status) = status_handler(State(create_test_state())).await;
        assert!(!status.ollama_reachable);
        assert_eq!(status.models.len(), 2);
        assert!(status.models.iter().all(|m| !m.available));
        assert!(!status.integrations.spotify);
    }

    #[tokio::test]
    async fn test_classify_empty_text() {
        let app = build_app(create_test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/environment")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"text": "   "}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"]["type"], "validation_error");
    }

    #[tokio::test]
    async fn test_classify_with_ollama_down() {
        let app = build_app(create_test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/environment")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"text": "O jardim florido."}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = json_body(response).await;
        assert_eq!(body["error"]["type"], "ollama_unreachable");
    }

    #[tokio::test]
    async fn test_batch_rejects_empty_list() {
        let app = build_app(create_test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/environment/batch")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"texts": []}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_document_chunks() {
        let app = build_app(create_test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/documents/chunks?pages_per_chunk=2")
                    .header("content-type", "text/plain")
                    .body(Body::from("Capítulo um.\x0cO jardim, enfim!\x0cFim."))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["total_chunks"], 2);
        assert_eq!(body["sample_chunk"], "Capítulo um. O jardim, enfim!");
        assert_eq!(
            body["sample_tokens"],
            json!(["Capítulo", "um", "O", "jardim", "enfim"])
        );
        assert_eq!(body["token_count"], 5);
    }

    #[tokio::test]
    async fn test_document_chunks_empty_document() {
        let app = build_app(create_test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/documents/chunks")
                    .body(Body::from("  "))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["total_chunks"], 0);
        assert_eq!(body["sample_chunk"], "Nenhum texto encontrado");
        assert_eq!(body["sample_tokens"], json!([]));
    }

    #[tokio::test]
    async fn test_document_chunks_rejects_zero_pages() {
        let app = build_app(create_test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/documents/chunks?pages_per_chunk=0")
                    .body(Body::from("texto"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
