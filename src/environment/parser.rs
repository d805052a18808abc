// Parsing of the model's JSON verdict

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::category::EnvironmentCategory;

/// Outermost `{...}` span of an answer
static JSON_OBJECT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").unwrap());

/// Confidence assumed when the model omits `confianca`
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// A well-formed verdict extracted from the model answer
#[derive(Debug, Clone, PartialEq)]
pub struct ModelVerdict {
    pub category: EnvironmentCategory,
    pub confidence: f64,
    pub elements: Vec<String>,
}

/// Extract the verdict from an answer (reasoning already stripped).
///
/// Returns `None` for answers without a JSON object, with invalid JSON or
/// with a category outside the fixed list.
pub fn parse_verdict(answer: &str) -> Option<ModelVerdict> {
    let span = JSON_OBJECT.find(answer)?;
    let json: Value = serde_json::from_str(span.as_str()).ok()?;

    let label = json.get("categoria")?.as_str()?;
    let category = EnvironmentCategory::from_label(label)?;

    Some(ModelVerdict {
        category,
        confidence: parse_confidence(json.get("confianca")),
        elements: parse_elements(json.get("elementos")),
    })
}

/// Number or numeric string (decimal comma allowed), clamped to [0, 1]
fn parse_confidence(value: Option<&Value>) -> f64 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().replace(',', ".").parse::<f64>().ok(),
        _ => None,
    };

    match parsed {
        Some(c) if c.is_finite() => c.clamp(0.0, 1.0),
        _ => DEFAULT_CONFIDENCE,
    }
}

fn parse_elements(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}
