// Book text ingestion: pages, chunks and word tokens

use once_cell::sync::Lazy;
use regex::Regex;

/// Page separator emitted by PDF text extractors (pdftotext, mutool)
pub const PAGE_BREAK: char = '\x0c';

/// Placeholder chunk reported for documents without text
pub const EMPTY_DOCUMENT: &str = "Nenhum texto encontrado";

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+").unwrap());

/// Split extracted text into pages.
///
/// A trailing page break does not produce an extra empty page, and a
/// document that is only whitespace has no pages.
pub fn split_pages(text: &str) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let mut pages: Vec<String> = text.split(PAGE_BREAK).map(str::to_string).collect();
    if pages.len() > 1 && pages.last().is_some_and(|p| p.trim().is_empty()) {
        pages.pop();
    }
    pages
}

/// Group pages into chunks of `pages_per_chunk`, joined by a space
pub fn chunk_pages(pages: &[String], pages_per_chunk: usize) -> Vec<String> {
    pages
        .chunks(pages_per_chunk.max(1))
        .map(|group| group.join(" "))
        .collect()
}

/// Word tokens (Unicode letters, digits and underscore), punctuation dropped
pub fn tokenize_words(text: &str) -> Vec<String> {
    WORD.find_iter(text).map(|m| m.as_str().to_string()).collect()
}

/// Group whitespace-separated words into chunks of `words_per_chunk`
pub fn chunk_words(text: &str, words_per_chunk: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    words
        .chunks(words_per_chunk.max(1))
        .map(|group| group.join(" "))
        .collect()
}
