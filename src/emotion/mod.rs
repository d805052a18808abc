// Emotion analysis and soundtrack recommendation

pub mod profile;

use futures::stream::{self, StreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::cache::ModelCatalog;
use crate::config::{Config, GenerationOptions};
use crate::error::ApiError;
use crate::http_client::OllamaHttpClient;
use crate::models::ollama::GenerateRequest;
use crate::reading::chunk_words;
use crate::reasoning::split_reasoning;

pub use profile::{profile_for, SoundtrackProfile};

static JSON_OBJECT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").unwrap());

/// Chunks with fewer trimmed characters are not analyzed
const MIN_CHUNK_CHARS: usize = 10;

/// Label reported when nothing clears the threshold
const FALLBACK_EMOTION: &str = "neutral";
const FALLBACK_CONFIDENCE: f64 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub struct EmotionScore {
    pub label: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectedEmotion {
    pub score: f64,
    pub profile: SoundtrackProfile,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DominantEmotion {
    pub emotion: String,
    pub confidence: f64,
    pub track: &'static str,
    pub energy: f64,
    pub valence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmotionAnalysis {
    pub text: String,
    pub emotions: BTreeMap<String, DetectedEmotion>,
    pub dominant: DominantEmotion,
    pub total_emotions: usize,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedEmotion {
    pub mean_score: f64,
    pub frequency: usize,
    pub max_score: f64,
    pub profile: SoundtrackProfile,
}

impl AggregatedEmotion {
    /// Weight of this emotion in the chapter: mean score times frequency
    pub fn weight(&self) -> f64 {
        self.mean_score * self.frequency as f64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkAnalysis {
    pub chunk_id: usize,
    pub analysis: EmotionAnalysis,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChapterDominant {
    pub emotion: String,
    pub mean_score: f64,
    pub frequency: usize,
    pub track: &'static str,
    pub energy: f64,
    pub valence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChapterSummary {
    pub total_chunks: usize,
    pub analyzed_chunks: usize,
    pub dominant: ChapterDominant,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackRecommendation {
    pub track: &'static str,
    pub energy: f64,
    pub valence: f64,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChapterAnalysis {
    pub summary: ChapterSummary,
    pub emotions: BTreeMap<String, AggregatedEmotion>,
    pub chunks: Vec<ChunkAnalysis>,
    pub recommendation: TrackRecommendation,
}

/// Build the scoring prompt for a passage
pub fn build_prompt(text: &str) -> String {
    let labels: Vec<&str> = profile::labels().collect();
    format!(
        "Avalie as emoções expressas neste texto (qualquer idioma).\n\n\
         TEXTO: \"{}\"\n\n\
         Dê uma pontuação de 0 a 1 para cada emoção presente, usando apenas estes rótulos:\n\
         {}\n\n\
         RESPOSTA (apenas JSON):\n\
         {{\"emocoes\": {{\"rotulo\": 0.8, \"outro_rotulo\": 0.1}}}}",
        text.replace('"', "'"),
        labels.join(", ")
    )
}

/// Extract label scores from a model answer.
///
/// Reads the `emocoes` object, or the top-level object when the model
/// skipped the wrapper. Malformed answers yield no scores.
pub fn parse_scores(answer: &str) -> Vec<EmotionScore> {
    let split = split_reasoning(answer);
    let json: Value = match JSON_OBJECT
        .find(&split.content)
        .and_then(|m| serde_json::from_str(m.as_str()).ok())
    {
        Some(json) => json,
        None => return Vec::new(),
    };

    let object = match json.get("emocoes").and_then(|v| v.as_object()) {
        Some(inner) => inner,
        None => match json.as_object() {
            Some(outer) => outer,
            None => return Vec::new(),
        },
    };

    let mut scores: Vec<EmotionScore> = object
        .iter()
        .filter_map(|(label, value)| {
            let score = match value {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().replace(',', ".").parse().ok(),
                _ => None,
            }?;
            if !score.is_finite() {
                return None;
            }
            Some(EmotionScore {
                label: label.trim().to_lowercase(),
                score: score.clamp(0.0, 1.0),
            })
        })
        .collect();
    scores.sort_by(|a, b| a.label.cmp(&b.label));
    scores
}

/// Keep scores at or above `threshold` and pick the dominant emotion.
///
/// Without any emotion above the threshold the dominant emotion is
/// `neutral` at 0.5.
pub fn analyze_scores(
    text: &str,
    scores: &[EmotionScore],
    threshold: f64,
    model: &str,
) -> EmotionAnalysis {
    let mut emotions: BTreeMap<String, DetectedEmotion> = BTreeMap::new();
    for s in scores.iter().filter(|s| s.score >= threshold) {
        let entry = emotions.entry(s.label.clone()).or_insert(DetectedEmotion {
            score: s.score,
            profile: profile_for(&s.label),
        });
        entry.score = entry.score.max(s.score);
    }

    let mut dominant: Option<(&String, &DetectedEmotion)> = None;
    for (label, detected) in &emotions {
        if dominant.map_or(true, |(_, best)| detected.score > best.score) {
            dominant = Some((label, detected));
        }
    }

    let dominant = match dominant {
        Some((label, detected)) => DominantEmotion {
            emotion: label.clone(),
            confidence: detected.score,
            track: detected.profile.track,
            energy: detected.profile.energy,
            valence: detected.profile.valence,
        },
        None => neutral_dominant(),
    };

    EmotionAnalysis {
        text: text.to_string(),
        total_emotions: emotions.len(),
        emotions,
        dominant,
        model: model.to_string(),
        error: None,
    }
}

fn neutral_dominant() -> DominantEmotion {
    let p = profile_for(FALLBACK_EMOTION);
    DominantEmotion {
        emotion: FALLBACK_EMOTION.to_string(),
        confidence: FALLBACK_CONFIDENCE,
        track: p.track,
        energy: p.energy,
        valence: p.valence,
    }
}

/// Aggregate per-chunk analyses into a chapter analysis.
///
/// Returns `None` when no chunk detected any emotion.
pub fn aggregate_chapter(total_chunks: usize, chunks: Vec<ChunkAnalysis>) -> Option<ChapterAnalysis> {
    let mut scores: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for chunk in &chunks {
        for (label, detected) in &chunk.analysis.emotions {
            scores.entry(label.clone()).or_default().push(detected.score);
        }
    }

    let emotions: BTreeMap<String, AggregatedEmotion> = scores
        .into_iter()
        .map(|(label, values)| {
            let mean_score = values.iter().sum::<f64>() / values.len() as f64;
            let max_score = values.iter().copied().fold(f64::MIN, f64::max);
            let aggregated = AggregatedEmotion {
                mean_score,
                frequency: values.len(),
                max_score,
                profile: profile_for(&label),
            };
            (label, aggregated)
        })
        .collect();

    let mut dominant: Option<(&String, &AggregatedEmotion)> = None;
    for (label, aggregated) in &emotions {
        if dominant.map_or(true, |(_, best)| aggregated.weight() > best.weight()) {
            dominant = Some((label, aggregated));
        }
    }
    let (label, aggregated) = dominant?;

    let summary = ChapterSummary {
        total_chunks,
        analyzed_chunks: chunks.len(),
        dominant: ChapterDominant {
            emotion: label.clone(),
            mean_score: aggregated.mean_score,
            frequency: aggregated.frequency,
            track: aggregated.profile.track,
            energy: aggregated.profile.energy,
            valence: aggregated.profile.valence,
        },
    };
    let recommendation = recommend_track(&emotions);

    Some(ChapterAnalysis {
        summary,
        emotions,
        chunks,
        recommendation,
    })
}

/// Recommend a track from the weighted energy and valence of a chapter
pub fn recommend_track(emotions: &BTreeMap<String, AggregatedEmotion>) -> TrackRecommendation {
    let mut energy_total = 0.0;
    let mut valence_total = 0.0;
    let mut weight_total = 0.0;

    for aggregated in emotions.values() {
        let weight = aggregated.weight();
        energy_total += aggregated.profile.energy * weight;
        valence_total += aggregated.profile.valence * weight;
        weight_total += weight;
    }

    let (energy, valence) = if weight_total > 0.0 {
        (energy_total / weight_total, valence_total / weight_total)
    } else {
        (0.5, 0.5)
    };

    let track = match (energy, valence) {
        (e, v) if e > 0.7 && v > 0.7 => "alegre",
        (e, v) if e > 0.7 && v < 0.3 => "intensa",
        (e, v) if e < 0.3 && v < 0.3 => "melancólica",
        (e, v) if e < 0.3 && v > 0.7 => "calma",
        (_, v) if v > 0.6 => "otimista",
        (_, v) if v < 0.4 => "sombria",
        _ => "ambiente",
    };

    TrackRecommendation {
        track,
        energy: round2(energy),
        valence: round2(valence),
        description: format!(
            "Trilha {} com energia {:.1} e valência {:.1}",
            track, energy, valence
        ),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Scores passages with the emotion model and builds soundtrack recommendations
#[derive(Clone)]
pub struct EmotionAnalyzer {
    client: Arc<OllamaHttpClient>,
    catalog: ModelCatalog,
    model: String,
    options: GenerationOptions,
    threshold: f64,
    words_per_chunk: usize,
    max_concurrent: usize,
}

impl EmotionAnalyzer {
    pub fn new(client: Arc<OllamaHttpClient>, catalog: ModelCatalog, config: &Config) -> Self {
        Self {
            client,
            catalog,
            model: config.emotion_model.clone(),
            options: config.generation.clone(),
            threshold: config.emotion_threshold,
            words_per_chunk: config.words_per_chunk,
            max_concurrent: config.max_concurrent_requests.max(1),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Raw label scores for a passage
    pub async fn score(&self, text: &str) -> Result<Vec<EmotionScore>, ApiError> {
        self.catalog.ensure_model(&self.client, &self.model).await?;

        let request = GenerateRequest::new(&self.model, build_prompt(text), &self.options);
        let answer = self.client.generate(&request).await?;

        let scores = parse_scores(&answer);
        if scores.is_empty() {
            tracing::warn!("Emotion model answer had no usable scores");
        }
        Ok(scores)
    }

    /// Emotions of one passage
    pub async fn analyze(&self, text: &str) -> Result<EmotionAnalysis, ApiError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ApiError::ValidationError("text cannot be empty".to_string()));
        }

        let scores = self.score(text).await?;
        let analysis = analyze_scores(text, &scores, self.threshold, &self.model);
        tracing::info!(
            dominant = %analysis.dominant.emotion,
            track = analysis.dominant.track,
            emotions = analysis.total_emotions,
            "Emotions analyzed"
        );
        Ok(analysis)
    }

    /// Analyze a whole chapter, split into word chunks unless `chunks` is given
    pub async fn analyze_chapter(
        &self,
        text: &str,
        chunks: Option<Vec<String>>,
    ) -> Result<ChapterAnalysis, ApiError> {
        let chunks = match chunks {
            Some(chunks) if !chunks.is_empty() => chunks,
            _ => chunk_words(text, self.words_per_chunk),
        };
        let total_chunks = chunks.len();

        let results: Vec<(ChunkAnalysis, Option<ApiError>)> =
            stream::iter(chunks.into_iter().enumerate())
                .filter(|(_, chunk)| {
                    let keep = chunk.trim().chars().count() >= MIN_CHUNK_CHARS;
                    async move { keep }
                })
                .map(|(chunk_id, chunk)| async move {
                    match self.analyze(&chunk).await {
                        Ok(analysis) => (ChunkAnalysis { chunk_id, analysis }, None),
                        Err(e) => {
                            tracing::warn!(chunk_id, error = %e, "Chunk emotion analysis failed");
                            let analysis = EmotionAnalysis {
                                text: chunk.trim().to_string(),
                                emotions: BTreeMap::new(),
                                dominant: neutral_dominant(),
                                total_emotions: 0,
                                model: self.model.clone(),
                                error: Some(e.to_string()),
                            };
                            (ChunkAnalysis { chunk_id, analysis }, Some(e))
                        }
                    }
                })
                .buffered(self.max_concurrent)
                .collect()
                .await;

        // Every chunk failed upstream: report the outage, not an empty chapter
        let all_failed = !results.is_empty() && results.iter().all(|(_, e)| e.is_some());
        let mut first_error = None;
        let analyzed: Vec<ChunkAnalysis> = results
            .into_iter()
            .map(|(chunk, error)| {
                if first_error.is_none() {
                    first_error = error;
                }
                chunk
            })
            .collect();
        if all_failed {
            if let Some(e) = first_error {
                return Err(e);
            }
        }

        tracing::info!(
            total_chunks,
            analyzed_chunks = analyzed.len(),
            "Chapter chunks analyzed"
        );

        aggregate_chapter(total_chunks, analyzed).ok_or_else(|| {
            ApiError::ValidationError("no emotions detected in chapter".to_string())
        })
    }
}
