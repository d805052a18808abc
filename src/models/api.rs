use serde::{Deserialize, Serialize};

use crate::config::IntegrationStatus;
use crate::environment::EnvironmentAnalysis;

// ==================================================================================================
// Environment classification
// ==================================================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyRequest {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchClassifyRequest {
    pub texts: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchClassifyResponse {
    pub results: Vec<EnvironmentAnalysis>,
}

// ==================================================================================================
// Emotion analysis
// ==================================================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmotionRequest {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterRequest {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunks: Option<Vec<String>>,
}

// ==================================================================================================
// Documents
// ==================================================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkParams {
    pub pages_per_chunk: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunksResponse {
    pub total_chunks: usize,
    pub sample_chunk: String,
    pub sample_tokens: Vec<String>,
    pub token_count: usize,
}

// ==================================================================================================
// Models and status
// ==================================================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub object: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelList {
    pub object: String,
    pub data: Vec<ModelInfo>,
}

impl ModelList {
    pub fn new(models: Vec<ModelInfo>) -> Self {
        Self {
            object: "list".to_string(),
            data: models,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub ollama_url: String,
    pub ollama_reachable: bool,
    pub models: Vec<ConfiguredModel>,
    pub integrations: IntegrationStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfiguredModel {
    pub name: String,
    pub role: &'static str,
    pub available: bool,
}
