// Emotion label -> soundtrack profile mapping

use serde::Serialize;

/// Soundtrack mood with its energy and valence (both in [0, 1])
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SoundtrackProfile {
    pub track: &'static str,
    pub energy: f64,
    pub valence: f64,
}

const fn profile(track: &'static str, energy: f64, valence: f64) -> SoundtrackProfile {
    SoundtrackProfile {
        track,
        energy,
        valence,
    }
}

/// Profile for labels outside the table
pub const DEFAULT_PROFILE: SoundtrackProfile = profile("ambiente", 0.5, 0.5);

/// Known labels: five sentiment levels followed by the GoEmotions set
static PROFILES: &[(&str, SoundtrackProfile)] = &[
    ("very positive", profile("alegre", 0.9, 0.9)),
    ("positive", profile("otimista", 0.7, 0.7)),
    ("neutral", profile("ambiente", 0.5, 0.5)),
    ("negative", profile("melancólica", 0.3, 0.3)),
    ("very negative", profile("sombria", 0.1, 0.1)),
    ("joy", profile("alegre", 0.8, 0.8)),
    ("love", profile("romântica", 0.6, 0.9)),
    ("sadness", profile("melancólica", 0.2, 0.2)),
    ("anger", profile("intensa", 0.9, 0.1)),
    ("fear", profile("suspense", 0.7, 0.2)),
    ("surprise", profile("dramática", 0.8, 0.6)),
    ("disgust", profile("sombria", 0.4, 0.1)),
    ("excitement", profile("energética", 0.9, 0.8)),
    ("admiration", profile("inspiradora", 0.6, 0.8)),
    ("curiosity", profile("misteriosa", 0.7, 0.6)),
    ("confusion", profile("incerta", 0.4, 0.4)),
    ("nervousness", profile("tensa", 0.6, 0.3)),
    ("pride", profile("épica", 0.8, 0.8)),
    ("embarrassment", profile("suave", 0.3, 0.4)),
    ("disappointment", profile("triste", 0.2, 0.2)),
    ("relief", profile("calma", 0.4, 0.7)),
    ("gratitude", profile("harmoniosa", 0.5, 0.8)),
    ("grief", profile("lamentosa", 0.2, 0.1)),
    ("desire", profile("sedutora", 0.7, 0.7)),
    ("optimism", profile("esperançosa", 0.7, 0.8)),
    ("annoyance", profile("irritante", 0.6, 0.2)),
    ("remorse", profile("arrependida", 0.3, 0.2)),
    ("disapproval", profile("desaprovadora", 0.5, 0.3)),
    ("amusement", profile("divertida", 0.8, 0.8)),
    ("caring", profile("carinhosa", 0.5, 0.8)),
];

/// Soundtrack profile for an emotion label (case-insensitive)
pub fn profile_for(label: &str) -> SoundtrackProfile {
    let label = label.trim().to_lowercase();
    PROFILES
        .iter()
        .find(|(name, _)| *name == label)
        .map(|(_, p)| *p)
        .unwrap_or(DEFAULT_PROFILE)
}

/// Every label the model is asked to score
pub fn labels() -> impl Iterator<Item = &'static str> {
    PROFILES.iter().map(|(name, _)| *name)
}
