// Environment classification of passages via the local model server

pub mod category;
pub mod heuristic;
pub mod parser;
pub mod prompt;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::cache::ModelCatalog;
use crate::config::{Config, GenerationOptions};
use crate::error::ApiError;
use crate::http_client::OllamaHttpClient;
use crate::models::ollama::GenerateRequest;
use crate::reasoning::split_reasoning;

pub use category::EnvironmentCategory;

/// How a classification was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMethod {
    /// Parsed from the model's JSON verdict
    Model,
    /// Keyword fallback after an unparseable answer
    Heuristic,
    /// The analysis failed; see `error`
    Error,
}

/// Result of classifying one passage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentAnalysis {
    pub text: String,
    pub describes_environment: bool,
    /// `None` only when the analysis failed
    pub environment_type: Option<EnvironmentCategory>,
    pub confidence: f64,
    pub elements: Vec<String>,
    pub method: AnalysisMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EnvironmentAnalysis {
    /// Result entry for a passage whose analysis failed
    pub fn failed(text: &str, error: &ApiError) -> Self {
        Self {
            text: text.to_string(),
            describes_environment: false,
            environment_type: None,
            confidence: 0.0,
            elements: Vec::new(),
            method: AnalysisMethod::Error,
            raw_response: None,
            reasoning: None,
            error: Some(error.to_string()),
        }
    }
}

/// Turn a model answer into an analysis.
///
/// A parseable verdict is used as-is, anything else falls back to the
/// keyword heuristic. Verdicts below `min_confidence` are reported as
/// "no environment" with their confidence and elements kept.
pub fn interpret_answer(text: &str, answer: &str, min_confidence: f64) -> EnvironmentAnalysis {
    let split = split_reasoning(answer);

    let (category, confidence, elements, method) = match parser::parse_verdict(&split.content) {
        Some(verdict) => (
            verdict.category,
            verdict.confidence,
            verdict.elements,
            AnalysisMethod::Model,
        ),
        None => {
            tracing::debug!("Model answer has no usable verdict, using keyword heuristic");
            let verdict = heuristic::classify_by_keywords(text, answer);
            (
                verdict.category,
                verdict.confidence,
                verdict.elements,
                AnalysisMethod::Heuristic,
            )
        }
    };

    let describes_environment =
        category != EnvironmentCategory::NoEnvironment && confidence >= min_confidence;

    EnvironmentAnalysis {
        text: text.to_string(),
        describes_environment,
        environment_type: Some(if describes_environment {
            category
        } else {
            EnvironmentCategory::NoEnvironment
        }),
        confidence,
        elements,
        method,
        raw_response: Some(answer.to_string()),
        reasoning: split.reasoning,
        error: None,
    }
}

/// Classifies passages into environment categories
#[derive(Clone)]
pub struct EnvironmentClassifier {
    client: Arc<OllamaHttpClient>,
    catalog: ModelCatalog,
    model: String,
    options: GenerationOptions,
    min_confidence: f64,
    max_concurrent: usize,
}

impl EnvironmentClassifier {
    pub fn new(client: Arc<OllamaHttpClient>, catalog: ModelCatalog, config: &Config) -> Self {
        Self {
            client,
            catalog,
            model: config.ollama_model.clone(),
            options: config.generation.clone(),
            min_confidence: config.min_confidence,
            max_concurrent: config.max_concurrent_requests.max(1),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Classify one passage
    pub async fn analyze(&self, text: &str) -> Result<EnvironmentAnalysis, ApiError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ApiError::ValidationError("text cannot be empty".to_string()));
        }

        self.catalog.ensure_model(&self.client, &self.model).await?;

        let request = GenerateRequest::new(&self.model, prompt::build_prompt(text), &self.options);
        let answer = self.client.generate(&request).await?;

        let analysis = interpret_answer(text, &answer, self.min_confidence);
        tracing::info!(
            method = ?analysis.method,
            environment = ?analysis.environment_type,
            confidence = analysis.confidence,
            "Environment classified"
        );

        Ok(analysis)
    }

    /// Classify many passages, keeping input order.
    ///
    /// Failures are reported per passage instead of failing the batch.
    pub async fn analyze_batch(&self, texts: &[String]) -> Vec<EnvironmentAnalysis> {
        stream::iter(texts.to_vec())
            .map(|text: String| async move {
                match self.analyze(&text).await {
                    Ok(analysis) => analysis,
                    Err(e) => {
                        tracing::warn!(error = %e, "Batch item failed");
                        EnvironmentAnalysis::failed(&text, &e)
                    }
                }
            })
            .buffered(self.max_concurrent)
            .collect()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpret_model_verdict() {
        let analysis = interpret_answer(
            "O jardim estava repleto de flores.",
            r#"<think>Flores indicam jardim.</think>{"categoria": "jardim", "confianca": 0.9, "elementos": ["flores"]}"#,
            0.3,
        );
        assert!(analysis.describes_environment);
        assert_eq!(analysis.environment_type, Some(EnvironmentCategory::Garden));
        assert_eq!(analysis.confidence, 0.9);
        assert_eq!(analysis.elements, vec!["flores"]);
        assert_eq!(analysis.method, AnalysisMethod::Model);
        assert_eq!(analysis.reasoning.as_deref(), Some("Flores indicam jardim."));
    }

    #[test]
    fn test_interpret_low_confidence_is_no_environment() {
        let analysis = interpret_answer(
            "Ele abriu a porta.",
            r#"{"categoria": "domestico", "confianca": 0.2, "elementos": ["porta"]}"#,
            0.3,
        );
        assert!(!analysis.describes_environment);
        assert_eq!(
            analysis.environment_type,
            Some(EnvironmentCategory::NoEnvironment)
        );
        assert_eq!(analysis.confidence, 0.2);
        assert_eq!(analysis.elements, vec!["porta"]);
        assert_eq!(analysis.method, AnalysisMethod::Model);
    }

    #[test]
    fn test_interpret_explicit_no_environment() {
        let analysis = interpret_answer(
            "O relatório foi entregue ontem.",
            r#"{"categoria": "não descreve ambiente", "confianca": 0.95}"#,
            0.3,
        );
        assert!(!analysis.describes_environment);
        assert_eq!(
            analysis.environment_type,
            Some(EnvironmentCategory::NoEnvironment)
        );
    }

    #[test]
    fn test_interpret_malformed_falls_back_to_heuristic() {
        let analysis = interpret_answer(
            "A fazenda tinha um grande celeiro e campos de milho na plantação.",
            "Acho que é um lugar no interior.",
            0.3,
        );
        assert_eq!(analysis.method, AnalysisMethod::Heuristic);
        assert!(analysis.describes_environment);
        assert_eq!(analysis.environment_type, Some(EnvironmentCategory::Rural));
        assert_eq!(analysis.elements, vec!["fazenda", "campo", "plantação"]);
    }

    #[test]
    fn test_interpret_weak_heuristic_is_no_environment() {
        let analysis = interpret_answer("Ela voltou para casa.", "sem JSON", 0.3);
        assert_eq!(analysis.method, AnalysisMethod::Heuristic);
        assert!(!analysis.describes_environment);
        assert_eq!(
            analysis.environment_type,
            Some(EnvironmentCategory::NoEnvironment)
        );
        assert!((analysis.confidence - 0.15).abs() < 1e-9);
    }

    #[test]
    fn test_interpret_unclosed_reasoning_uses_heuristic() {
        let analysis = interpret_answer(
            "A cidade acordava, a rua cheia e a avenida congestionada.",
            "<think>A passagem fala de uma cidade",
            0.3,
        );
        assert_eq!(analysis.method, AnalysisMethod::Heuristic);
        assert_eq!(analysis.environment_type, Some(EnvironmentCategory::Urban));
    }

    #[test]
    fn test_failed_entry() {
        let err = ApiError::OllamaUnreachable("connection refused".to_string());
        let analysis = EnvironmentAnalysis::failed("texto", &err);
        assert_eq!(analysis.method, AnalysisMethod::Error);
        assert_eq!(analysis.environment_type, None);
        assert!(analysis.error.unwrap().contains("connection refused"));
    }

    #[test]
    fn test_analysis_serialization() {
        let analysis = interpret_answer("texto", r#"{"categoria": "urbano"}"#, 0.3);
        let json = serde_json::to_value(&analysis).unwrap();
        assert_eq!(json["environment_type"], "urbano");
        assert_eq!(json["method"], "model");
        assert_eq!(json["confidence"], 0.5);
        assert!(json.get("error").is_none());
    }
}
