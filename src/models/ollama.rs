use serde::{Deserialize, Serialize};

use crate::config::GenerationOptions;

// ==================================================================================================
// Models for /api/generate
// ==================================================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
    pub options: GenerateOptions,
}

impl GenerateRequest {
    /// Build a non-streaming generate request
    pub fn new(model: &str, prompt: String, options: &GenerationOptions) -> Self {
        Self {
            model: model.to_string(),
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: options.temperature,
                top_p: options.top_p,
                num_predict: options.num_predict,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerateOptions {
    pub temperature: f64,
    pub top_p: f64,
    pub num_predict: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eval_count: Option<u64>,
}

// ==================================================================================================
// Models for /api/tags
// ==================================================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TagsResponse {
    #[serde(default)]
    pub models: Vec<ModelTag>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelTag {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}
