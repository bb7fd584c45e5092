use serde::{Deserialize, Serialize};

/// Embedding model parameters, fixed at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub model: String,
    pub dimensions: usize,
    pub similarity: String,
    pub task_type: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: "models/gemini-embedding-001".to_string(),
            dimensions: 768,
            similarity: "cosine".to_string(),
            task_type: "RETRIEVAL_DOCUMENT".to_string(),
        }
    }
}
