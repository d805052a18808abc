use serde::{Deserialize, Serialize};

/// Environment categories a passage can be classified into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnvironmentCategory {
    #[serde(rename = "nao_ambiente")]
    NoEnvironment,
    #[serde(rename = "jardim")]
    Garden,
    #[serde(rename = "domestico")]
    Domestic,
    #[serde(rename = "natural")]
    Natural,
    #[serde(rename = "urbano")]
    Urban,
    #[serde(rename = "trabalho")]
    Workplace,
    #[serde(rename = "rural")]
    Rural,
    #[serde(rename = "aquatico")]
    Aquatic,
}

impl EnvironmentCategory {
    /// All categories in prompt order (the prompt numbers them from 1)
    pub const ALL: [EnvironmentCategory; 8] = [
        EnvironmentCategory::NoEnvironment,
        EnvironmentCategory::Garden,
        EnvironmentCategory::Domestic,
        EnvironmentCategory::Natural,
        EnvironmentCategory::Urban,
        EnvironmentCategory::Workplace,
        EnvironmentCategory::Rural,
        EnvironmentCategory::Aquatic,
    ];

    pub fn key(self) -> &'static str {
        match self {
            EnvironmentCategory::NoEnvironment => "nao_ambiente",
            EnvironmentCategory::Garden => "jardim",
            EnvironmentCategory::Domestic => "domestico",
            EnvironmentCategory::Natural => "natural",
            EnvironmentCategory::Urban => "urbano",
            EnvironmentCategory::Workplace => "trabalho",
            EnvironmentCategory::Rural => "rural",
            EnvironmentCategory::Aquatic => "aquatico",
        }
    }

    /// Label the model is asked to answer with
    pub fn description(self) -> &'static str {
        match self {
            EnvironmentCategory::NoEnvironment => "não descreve ambiente",
            EnvironmentCategory::Garden => "jardim ou área verde",
            EnvironmentCategory::Domestic => "ambiente interno doméstico",
            EnvironmentCategory::Natural => "paisagem natural",
            EnvironmentCategory::Urban => "ambiente urbano",
            EnvironmentCategory::Workplace => "ambiente de trabalho",
            EnvironmentCategory::Rural => "ambiente rural",
            EnvironmentCategory::Aquatic => "ambiente aquático",
        }
    }

    /// Examples listed next to the description in the prompt
    pub fn hint(self) -> &'static str {
        match self {
            EnvironmentCategory::NoEnvironment => "texto não menciona cenário/local",
            EnvironmentCategory::Garden => "jardins, parques, plantas",
            EnvironmentCategory::Domestic => "casa, sala, cozinha, quarto",
            EnvironmentCategory::Natural => "floresta, montanha, campo, natureza",
            EnvironmentCategory::Urban => "cidade, rua, prédios, construções",
            EnvironmentCategory::Workplace => "escritório, fábrica, loja",
            EnvironmentCategory::Rural => "fazenda, sítio, agricultura",
            EnvironmentCategory::Aquatic => "rio, lago, mar, piscina",
        }
    }

    /// Keywords for the heuristic fallback (matched as lowercase substrings)
    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            EnvironmentCategory::NoEnvironment => &[],
            EnvironmentCategory::Garden => &[
                "jardim", "flores", "árvores", "plantas", "verde", "parque", "gramado", "canteiro",
            ],
            EnvironmentCategory::Domestic => &[
                "casa", "sala", "cozinha", "quarto", "sofá", "mesa", "cama", "banheiro",
            ],
            EnvironmentCategory::Natural => &[
                "floresta", "montanha", "rio", "natureza", "selvagem", "mato", "campo aberto",
            ],
            EnvironmentCategory::Urban => &[
                "cidade", "rua", "prédio", "urbano", "construção", "avenida", "calçada",
            ],
            EnvironmentCategory::Workplace => &[
                "escritório", "trabalho", "empresa", "fábrica", "loja", "hospital",
            ],
            EnvironmentCategory::Rural => &[
                "fazenda", "campo", "rural", "agricultura", "plantação", "sítio",
            ],
            EnvironmentCategory::Aquatic => &[
                "água", "mar", "lago", "rio", "piscina", "praia", "córrego",
            ],
        }
    }

    /// Resolve a label produced by the model.
    ///
    /// Accepts the category key, its description, or its number in the
    /// prompt list, ignoring case, accents and `_`/`-` separators.
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized = normalize_label(label);
        if normalized.is_empty() {
            return None;
        }

        let digits: String = normalized.chars().take_while(|c| c.is_ascii_digit()).collect();
        if !digits.is_empty() {
            let rest = normalized[digits.len()..].trim_start_matches(&['.', ')', ' '][..]);
            if rest.is_empty() {
                return digits
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| n.checked_sub(1))
                    .and_then(|i| Self::ALL.get(i).copied());
            }
            return Self::from_label(rest);
        }

        Self::ALL.into_iter().find(|category| {
            normalized == normalize_label(category.key())
                || normalized == normalize_label(category.description())
        })
    }
}

impl std::fmt::Display for EnvironmentCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Lowercase, strip Portuguese accents, unify separators and whitespace
fn normalize_label(label: &str) -> String {
    let folded: String = label
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            '_' | '-' => ' ',
            other => other,
        })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}
