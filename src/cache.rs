// Model catalog cache: which models the Ollama server has pulled

use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::ApiError;
use crate::http_client::OllamaHttpClient;
use crate::models::ollama::ModelTag;

/// Thread-safe TTL cache of the models reported by /api/tags
pub struct ModelCatalog {
    /// Model tags indexed by name
    models: Arc<DashMap<String, ModelTag>>,

    /// Last refresh timestamp (unix seconds)
    last_update: Arc<DashMap<(), u64>>,

    /// Cache TTL in seconds
    cache_ttl: u64,
}

impl ModelCatalog {
    /// Create a new, empty catalog
    pub fn new(cache_ttl: u64) -> Self {
        Self {
            models: Arc::new(DashMap::new()),
            last_update: Arc::new(DashMap::new()),
            cache_ttl,
        }
    }

    /// Replace the catalog contents.
    ///
    /// New tags are inserted before removed ones are dropped, so a model
    /// present before and after the refresh never disappears in between.
    pub fn update(&self, models: Vec<ModelTag>) {
        tracing::debug!("Updating model catalog. Found {} models.", models.len());

        let names: HashSet<String> = models.iter().map(|m| m.name.clone()).collect();
        for model in models {
            self.models.insert(model.name.clone(), model);
        }
        self.models.retain(|name, _| names.contains(name));
        self.last_update.insert((), now_secs());
    }

    /// Check if a model name is in the catalog.
    ///
    /// Ollama lists untagged pulls as `name:latest`, so a bare name also
    /// matches its `:latest` tag.
    pub fn contains(&self, model: &str) -> bool {
        if self.models.contains_key(model) {
            return true;
        }
        !model.contains(':') && self.models.contains_key(&format!("{}:latest", model))
    }

    /// Check if the catalog is older than its TTL (or was never filled)
    pub fn is_stale(&self) -> bool {
        match self.last_update.get(&()) {
            Some(entry) => now_secs().saturating_sub(*entry.value()) >= self.cache_ttl,
            None => true,
        }
    }

    /// All models, sorted by name
    pub fn all(&self) -> Vec<ModelTag> {
        let mut models: Vec<ModelTag> = self.models.iter().map(|e| e.value().clone()).collect();
        models.sort_by(|a, b| a.name.cmp(&b.name));
        models
    }

    /// Refresh from Ollama when stale
    pub async fn refresh_if_stale(&self, client: &OllamaHttpClient) -> Result<(), ApiError> {
        if self.is_stale() {
            let models = client.list_models().await?;
            self.update(models);
        }
        Ok(())
    }

    /// Fail with `ModelUnavailable` unless Ollama has `model` pulled.
    ///
    /// A miss on a fresh catalog forces one refresh, so a model pulled after
    /// the last refresh is picked up without waiting for the TTL.
    pub async fn ensure_model(&self, client: &OllamaHttpClient, model: &str) -> Result<(), ApiError> {
        let was_stale = self.is_stale();
        self.refresh_if_stale(client).await?;
        if self.contains(model) {
            return Ok(());
        }

        if !was_stale {
            self.update(client.list_models().await?);
            if self.contains(model) {
                return Ok(());
            }
        }

        tracing::warn!(model = %model, "Model not found on Ollama server");
        Err(ApiError::ModelUnavailable(model.to_string()))
    }
}

impl Clone for ModelCatalog {
    fn clone(&self) -> Self {
        Self {
            models: Arc::clone(&self.models),
            last_update: Arc::clone(&self.last_update),
            cache_ttl: self.cache_ttl,
        }
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(name: &str) -> ModelTag {
        ModelTag {
            name: name.to_string(),
            modified_at: None,
            size: None,
            digest: None,
        }
    }

    #[test]
    fn test_catalog_basic() {
        let catalog = ModelCatalog::new(3600);

        assert!(catalog.all().is_empty());
        assert!(catalog.is_stale());

        catalog.update(vec![tag("deepseek-r1:1.5b"), tag("llama3:latest")]);

        assert!(!catalog.is_stale());
        assert!(catalog.contains("deepseek-r1:1.5b"));
        assert!(catalog.contains("llama3"));
        assert!(catalog.contains("llama3:latest"));
        assert!(!catalog.contains("deepseek-r1"));
        assert!(!catalog.contains("mistral"));
    }

    #[test]
    fn test_all_is_sorted() {
        let catalog = ModelCatalog::new(3600);
        catalog.update(vec![tag("qwen2:7b"), tag("deepseek-r1:1.5b"), tag("llama3:latest")]);

        let names: Vec<_> = catalog.all().into_iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["deepseek-r1:1.5b", "llama3:latest", "qwen2:7b"]);
    }

    #[test]
    fn test_update_drops_removed_models() {
        let catalog = ModelCatalog::new(3600);
        catalog.update(vec![tag("llama3:latest"), tag("qwen2:7b")]);
        catalog.update(vec![tag("qwen2:7b"), tag("deepseek-r1:1.5b")]);

        let names: Vec<_> = catalog.all().into_iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["deepseek-r1:1.5b", "qwen2:7b"]);
    }

    #[test]
    fn test_update_keeps_surviving_models_visible() {
        let catalog = ModelCatalog::new(3600);
        catalog.update(vec![tag("deepseek-r1:1.5b")]);

        let writer = {
            let catalog = catalog.clone();
            std::thread::spawn(move || {
                for i in 0..2000 {
                    catalog.update(vec![tag("deepseek-r1:1.5b"), tag(&format!("extra:{}", i))]);
                }
            })
        };

        for _ in 0..20000 {
            assert!(catalog.contains("deepseek-r1:1.5b"));
        }
        writer.join().unwrap();
        assert!(catalog.contains("deepseek-r1:1.5b"));
    }

    #[test]
    fn test_zero_ttl_is_always_stale() {
        let catalog = ModelCatalog::new(0);
        catalog.update(vec![tag("llama3:latest")]);
        assert!(catalog.is_stale());
    }

    #[test]
    fn test_clones_share_state() {
        let catalog = ModelCatalog::new(3600);
        let clone = catalog.clone();
        catalog.update(vec![tag("llama3:latest")]);
        assert!(clone.contains("llama3"));
    }

    #[tokio::test]
    async fn test_ensure_model_refreshes_on_miss() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/tags")
            .with_status(200)
            .with_body(r#"{"models":[{"name":"deepseek-r1:1.5b"}]}"#)
            .expect(1)
            .create_async()
            .await;

        let client = OllamaHttpClient::new(&server.url(), 4, 5, 10, 0).unwrap();
        let catalog = ModelCatalog::new(3600);
        catalog.update(vec![tag("llama3:latest")]);

        catalog.ensure_model(&client, "deepseek-r1:1.5b").await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_ensure_model_missing() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/tags")
            .with_status(200)
            .with_body(r#"{"models":[{"name":"llama3:latest"}]}"#)
            .create_async()
            .await;

        let client = OllamaHttpClient::new(&server.url(), 4, 5, 10, 0).unwrap();
        let catalog = ModelCatalog::new(3600);

        let err = catalog
            .ensure_model(&client, "deepseek-r1:1.5b")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::ModelUnavailable(_)));
    }
}
