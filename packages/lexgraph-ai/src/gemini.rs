//! REST backend for the Gemini embedding API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::EmbeddingConfig;
use crate::error::{AiError, Result};
use crate::provider::EmbeddingBackend;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Provider-side batch limit for `batchEmbedContents`.
const MAX_BATCH: usize = 100;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedRequest<'a> {
    model: &'a str,
    content: Content<'a>,
    task_type: &'a str,
    output_dimensionality: usize,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct BatchRequest<'a> {
    requests: Vec<EmbedRequest<'a>>,
}

#[derive(Debug, Deserialize)]
struct BatchResponse {
    embeddings: Vec<EmbeddingValues>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

pub struct GeminiBackend {
    client: reqwest::Client,
    api_key: String,
    config: EmbeddingConfig,
}

impl GeminiBackend {
    pub fn new(api_key: impl Into<String>, config: EmbeddingConfig) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(AiError::MissingApiKey);
        }
        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            config,
        })
    }
}

#[async_trait]
impl EmbeddingBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    fn max_batch_size(&self) -> usize {
        MAX_BATCH
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let body = BatchRequest {
            requests: texts
                .iter()
                .map(|text| EmbedRequest {
                    model: &self.config.model,
                    content: Content {
                        parts: vec![Part { text }],
                    },
                    task_type: &self.config.task_type,
                    output_dimensionality: self.config.dimensions,
                })
                .collect(),
        };

        let url = format!(
            "{API_BASE}/{}:batchEmbedContents?key={}",
            self.config.model, self.api_key
        );
        let response = self.client.post(&url).json(&body).send().await?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(AiError::RateLimited(response.text().await.unwrap_or_default()));
        }
        if !status.is_success() {
            return Err(AiError::Provider {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let parsed: BatchResponse = response
            .json()
            .await
            .map_err(|e| AiError::MalformedResponse(e.to_string()))?;
        if parsed.embeddings.len() != texts.len() {
            return Err(AiError::MalformedResponse(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                parsed.embeddings.len()
            )));
        }

        let mut vectors = Vec::with_capacity(parsed.embeddings.len());
        for embedding in parsed.embeddings {
            if embedding.values.len() != self.config.dimensions {
                return Err(AiError::Dimension {
                    expected: self.config.dimensions,
                    got: embedding.values.len(),
                });
            }
            vectors.push(embedding.values);
        }
        Ok(vectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_api_key_is_rejected() {
        assert!(matches!(
            GeminiBackend::new("", EmbeddingConfig::default()),
            Err(AiError::MissingApiKey)
        ));
    }

    #[test]
    fn test_request_serialization_shape() {
        let request = BatchRequest {
            requests: vec![EmbedRequest {
                model: "models/gemini-embedding-001",
                content: Content {
                    parts: vec![Part { text: "hola" }],
                },
                task_type: "RETRIEVAL_DOCUMENT",
                output_dimensionality: 768,
            }],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["requests"][0]["taskType"], "RETRIEVAL_DOCUMENT");
        assert_eq!(json["requests"][0]["outputDimensionality"], 768);
        assert_eq!(json["requests"][0]["content"]["parts"][0]["text"], "hola");
    }
}
