use super::category::EnvironmentCategory;

/// Build the classification prompt for a passage
pub fn build_prompt(text: &str) -> String {
    let mut prompt = String::with_capacity(text.len() + 1024);

    prompt.push_str("Analise este texto e determine se descreve o ambiente de um local:\n\n");
    prompt.push_str(&format!("TEXTO: \"{}\"\n\n", text.replace('"', "'")));
    prompt.push_str("TAREFA: Classifique em uma destas categorias:\n");

    for (i, category) in EnvironmentCategory::ALL.iter().enumerate() {
        prompt.push_str(&format!(
            "{}. {} - {}\n",
            i + 1,
            category.description(),
            category.hint()
        ));
    }

    prompt.push_str("\nRESPOSTA (apenas JSON):\n");
    prompt.push_str(
        r#"{"categoria": "nome_da_categoria", "confianca": 0.9, "elementos": ["elemento1", "elemento2"]}"#,
    );

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_contains_text_and_every_category() {
        let prompt = build_prompt("O jardim estava repleto de flores.");

        assert!(prompt.contains("TEXTO: \"O jardim estava repleto de flores.\""));
        assert!(prompt.contains("1. não descreve ambiente - texto não menciona cenário/local"));
        assert!(prompt.contains("8. ambiente aquático - rio, lago, mar, piscina"));
        for category in EnvironmentCategory::ALL {
            assert!(prompt.contains(category.description()));
        }
        assert!(prompt.ends_with(r#""elementos": ["elemento1", "elemento2"]}"#));
    }

    #[test]
    fn test_prompt_neutralizes_double_quotes() {
        let prompt = build_prompt("Ele disse \"olá\" na sala.");
        assert!(prompt.contains("TEXTO: \"Ele disse 'olá' na sala.\""));
    }
}
