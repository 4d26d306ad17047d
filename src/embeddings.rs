//! Embedding generation for knowledge-base indexing and semantic search.
//!
//! The provider is an optional external collaborator: when no endpoint is
//! configured, semantic features fail with a distinct error while the rest
//! of the system (including lexical search) keeps working.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::config::AppConfig;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding provider is not configured")]
    Unavailable,
    #[error("embedding request failed: {0}")]
    Request(String),
    #[error("embedding response was malformed: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait EmbeddingProvider: Send + Sync + 'static {
    async fn embed(&self, text: &str) -> Result<Vec<f64>, EmbeddingError>;

    fn is_enabled(&self) -> bool {
        true
    }
}

/// Talks to an OpenAI-compatible `/embeddings` endpoint.
pub struct HttpEmbeddingProvider {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
}

impl HttpEmbeddingProvider {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            api_key,
            model: model.into(),
        }
    }
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f64>,
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f64>, EmbeddingError> {
        let mut request = self.client.post(&self.endpoint).json(&json!({
            "model": self.model,
            "input": text,
        }));

        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|err| EmbeddingError::Request(err.to_string()))?;

        if !response.status().is_success() {
            return Err(EmbeddingError::Request(format!(
                "provider returned {}",
                response.status()
            )));
        }

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|err| EmbeddingError::Malformed(err.to_string()))?;

        body.data
            .into_iter()
            .next()
            .map(|datum| datum.embedding)
            .ok_or_else(|| EmbeddingError::Malformed("empty data array".to_string()))
    }
}

/// Stand-in when no endpoint is configured; every call reports
/// `EmbeddingError::Unavailable`.
pub struct DisabledEmbeddings;

#[async_trait]
impl EmbeddingProvider for DisabledEmbeddings {
    async fn embed(&self, _text: &str) -> Result<Vec<f64>, EmbeddingError> {
        Err(EmbeddingError::Unavailable)
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

pub fn provider_from_config(config: &AppConfig) -> Arc<dyn EmbeddingProvider> {
    match &config.embeddings_endpoint {
        Some(endpoint) => Arc::new(HttpEmbeddingProvider::new(
            endpoint.clone(),
            config.embeddings_api_key.clone(),
            config.embeddings_model.clone(),
        )),
        None => {
            tracing::warn!("EMBEDDINGS_ENDPOINT not set; semantic search is disabled");
            Arc::new(DisabledEmbeddings)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_provider_reports_unavailable() {
        let provider = DisabledEmbeddings;
        assert!(!provider.is_enabled());
        assert!(matches!(
            provider.embed("anything").await,
            Err(EmbeddingError::Unavailable)
        ));
    }
}
