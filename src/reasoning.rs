// Reasoning block splitter
//
// Reasoning models such as DeepSeek-R1 answer with a leading
// <think>...</think> block before the actual answer. Only a block at the
// start of the answer is treated as reasoning; tags appearing later are
// regular content.

/// Opening tags recognized at the start of an answer
const OPEN_TAGS: [&str; 4] = ["<thinking>", "<think>", "<reasoning>", "<thought>"];

/// An answer split into its reasoning block and the remaining content
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReasoningSplit {
    pub reasoning: Option<String>,
    pub content: String,
}

/// Split a leading reasoning block from a model answer.
///
/// An unclosed block (generation cut off by `num_predict`) is all reasoning
/// and leaves empty content.
pub fn split_reasoning(answer: &str) -> ReasoningSplit {
    let trimmed = answer.trim_start();

    let open_tag = match OPEN_TAGS.iter().find(|tag| trimmed.starts_with(*tag)) {
        Some(tag) => *tag,
        None => {
            return ReasoningSplit {
                reasoning: None,
                content: answer.trim().to_string(),
            }
        }
    };

    let close_tag = format!("</{}", &open_tag[1..]);
    let after_open = &trimmed[open_tag.len()..];

    match after_open.find(&close_tag) {
        Some(idx) => ReasoningSplit {
            reasoning: Some(after_open[..idx].trim().to_string()),
            content: after_open[idx + close_tag.len()..].trim().to_string(),
        },
        None => ReasoningSplit {
            reasoning: Some(after_open.trim().to_string()),
            content: String::new(),
        },
    }
}
