// Keyword heuristic used when the model answer cannot be parsed

use super::category::EnvironmentCategory;

/// Score for a keyword found in the passage
const TEXT_HIT: f64 = 1.0;
/// Score for a keyword found only in the model answer
const ANSWER_HIT: f64 = 0.5;
/// Confidence per score point
const CONFIDENCE_PER_POINT: f64 = 0.15;
/// Heuristic confidence never exceeds this
const MAX_CONFIDENCE: f64 = 0.9;

#[derive(Debug, Clone, PartialEq)]
pub struct HeuristicVerdict {
    pub category: EnvironmentCategory,
    pub score: f64,
    pub confidence: f64,
    /// Keywords of the winning category present in the passage
    pub elements: Vec<String>,
}

/// Score every category by keyword hits in the passage and in the answer.
///
/// The strictly highest score wins, so ties keep the earlier category and a
/// passage with no hits stays `NoEnvironment` with zero confidence.
pub fn classify_by_keywords(text: &str, answer: &str) -> HeuristicVerdict {
    let text_lower = text.to_lowercase();
    let answer_lower = answer.to_lowercase();

    let mut best = HeuristicVerdict {
        category: EnvironmentCategory::NoEnvironment,
        score: 0.0,
        confidence: 0.0,
        elements: Vec::new(),
    };

    for category in EnvironmentCategory::ALL {
        let keywords = category.keywords();
        let text_score: f64 = keywords
            .iter()
            .filter(|k| text_lower.contains(*k))
            .map(|_| TEXT_HIT)
            .sum();
        let answer_score: f64 = keywords
            .iter()
            .filter(|k| answer_lower.contains(*k))
            .map(|_| ANSWER_HIT)
            .sum();
        let score = text_score + answer_score;

        if score > best.score {
            best = HeuristicVerdict {
                category,
                score,
                confidence: 0.0,
                elements: keywords
                    .iter()
                    .filter(|k| text_lower.contains(*k))
                    .map(|k| k.to_string())
                    .collect(),
            };
        }
    }

    best.confidence = (best.score * CONFIDENCE_PER_POINT).min(MAX_CONFIDENCE);
    best
}
