// Data models for the Ollama wire format and the public API

pub mod api;
pub mod ollama;
