//! Raw-document retrieval from the national API, the EU public endpoint,
//! or a local archive directory. Read-only; no caching at this layer.

use serde_json::Value;
use std::path::PathBuf;
use tracing::{debug, info};

use lexgraph_core::Source;

use crate::error::{IngestionError, Result};

const BOE_API_BASE: &str = "https://www.boe.es/datosabiertos/api/legislacion-consolidada/id";
const EURLEX_BASE: &str = "https://eur-lex.europa.eu/legal-content";

/// Raw content of one document, as fetched.
#[derive(Debug, Clone)]
pub enum RawDocument {
    /// Consolidated national document: parsed dict-like payload.
    Boe { id: String, payload: Value },
    /// EU document: HTML or a local text surrogate.
    EurLex {
        celex: String,
        content: String,
        language: String,
    },
}

impl RawDocument {
    pub fn document_id(&self) -> &str {
        match self {
            RawDocument::Boe { id, .. } => id,
            RawDocument::EurLex { celex, .. } => celex,
        }
    }
}

pub struct DocumentRetriever {
    client: reqwest::Client,
    /// Local archive consulted before any network call: `{id}.json` for
    /// national documents, `{id}.html` / `{id}.txt` for EU documents.
    archive_dir: Option<PathBuf>,
    language: String,
}

impl DocumentRetriever {
    pub fn new(archive_dir: Option<PathBuf>) -> Self {
        Self {
            client: reqwest::Client::new(),
            archive_dir,
            language: "ES".to_string(),
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into().to_uppercase();
        self
    }

    /// Fetch the raw content and metadata of one document.
    pub async fn fetch(&self, document_id: &str) -> Result<RawDocument> {
        if let Some(raw) = self.fetch_from_archive(document_id)? {
            info!(document_id, "document served from local archive");
            return Ok(raw);
        }

        match Source::from_document_id(document_id) {
            Source::Boe => self.fetch_boe(document_id).await,
            Source::EurLex => self.fetch_eurlex(document_id).await,
        }
    }

    fn fetch_from_archive(&self, document_id: &str) -> Result<Option<RawDocument>> {
        let Some(dir) = &self.archive_dir else {
            return Ok(None);
        };

        let json_path = dir.join(format!("{document_id}.json"));
        if json_path.exists() {
            let text = std::fs::read_to_string(&json_path)?;
            let payload: Value = serde_json::from_str(&text)
                .map_err(|e| IngestionError::Parse(format!("{}: {e}", json_path.display())))?;
            return Ok(Some(RawDocument::Boe {
                id: document_id.to_string(),
                payload,
            }));
        }

        for extension in ["html", "txt"] {
            let path = dir.join(format!("{document_id}.{extension}"));
            if path.exists() {
                let content = std::fs::read_to_string(&path)?;
                return Ok(Some(RawDocument::EurLex {
                    celex: document_id.to_string(),
                    content,
                    language: self.language.clone(),
                }));
            }
        }

        Ok(None)
    }

    async fn fetch_boe(&self, document_id: &str) -> Result<RawDocument> {
        let url = format!("{BOE_API_BASE}/{document_id}");
        debug!(url, "fetching national document");
        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| IngestionError::SourceUnavailable(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Err(IngestionError::DocumentNotFound(document_id.to_string()));
        }
        if status.is_server_error() {
            return Err(IngestionError::SourceUnavailable(format!(
                "{document_id}: status {status}"
            )));
        }
        if !status.is_success() {
            return Err(IngestionError::Parse(format!(
                "{document_id}: unexpected status {status}"
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| IngestionError::Parse(format!("{document_id}: {e}")))?;
        Ok(RawDocument::Boe {
            id: document_id.to_string(),
            payload,
        })
    }

    async fn fetch_eurlex(&self, celex: &str) -> Result<RawDocument> {
        let url = format!(
            "{EURLEX_BASE}/{}/TXT/HTML/?uri=CELEX:{celex}",
            self.language
        );
        debug!(url, "fetching EU document");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| IngestionError::SourceUnavailable(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Err(IngestionError::DocumentNotFound(celex.to_string()));
        }
        if status.is_server_error() {
            return Err(IngestionError::SourceUnavailable(format!(
                "{celex}: status {status}"
            )));
        }
        if !status.is_success() {
            return Err(IngestionError::Parse(format!(
                "{celex}: unexpected status {status}"
            )));
        }

        let content = response
            .text()
            .await
            .map_err(|e| IngestionError::SourceUnavailable(e.to_string()))?;
        info!(celex, bytes = content.len(), "EU document retrieved");
        Ok(RawDocument::EurLex {
            celex: celex.to_string(),
            content,
            language: self.language.clone(),
        })
    }
}
