//! Document-level models: metadata, analysis and the assembled `Normativa`.

use serde::{Deserialize, Serialize};

use super::node::DocumentTree;

/// Origin of a document. Both sources share the unified `Normativa` label in
/// the graph; this tag differentiates them via the `source` property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Source {
    Boe,
    EurLex,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Boe => "BOE",
            Source::EurLex => "EUR-Lex",
        }
    }

    /// Infer the source family from a document identifier.
    pub fn from_document_id(id: &str) -> Self {
        if id.starts_with("BOE-") {
            Source::Boe
        } else {
            Source::EurLex
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Flat metadata record for one document. All date fields use the `YYYYMMDD`
/// wire format, so lexicographic order is chronological order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    pub id: String,
    pub source: Source,
    pub titulo: Option<String>,
    pub ambito: Option<String>,
    pub departamento: Option<String>,
    pub rango: Option<String>,
    pub fecha_disposicion: Option<String>,
    pub fecha_publicacion: Option<String>,
    pub fecha_vigencia: Option<String>,
    pub fecha_actualizacion: Option<String>,
    pub diario: Option<String>,
    pub diario_numero: Option<String>,
    pub vigencia_agotada: Option<String>,
    pub estatus_derogacion: Option<String>,
    pub estatus_anulacion: Option<String>,
    pub estado_consolidacion: Option<String>,
    pub url_eli: Option<String>,
    pub url_html_consolidada: Option<String>,
}

impl Metadata {
    pub fn new(id: impl Into<String>, source: Source) -> Self {
        Self {
            id: id.into(),
            source,
            titulo: None,
            ambito: None,
            departamento: None,
            rango: None,
            fecha_disposicion: None,
            fecha_publicacion: None,
            fecha_vigencia: None,
            fecha_actualizacion: None,
            diario: None,
            diario_numero: None,
            vigencia_agotada: None,
            estatus_derogacion: None,
            estatus_anulacion: None,
            estado_consolidacion: None,
            url_eli: None,
            url_html_consolidada: None,
        }
    }
}

/// A prior/posterior cross-reference listed in the document's analysis block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Referencia {
    pub id_norma: Option<String>,
    pub relacion: Option<String>,
    pub texto: Option<String>,
}

/// Classification analysis: subject matters and listed references.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Analysis {
    pub materias: Vec<String>,
    pub referencias_anteriores: Vec<Referencia>,
    pub referencias_posteriores: Vec<Referencia>,
}

/// One legal instrument with its metadata, analysis and content tree.
#[derive(Debug, Clone)]
pub struct Normativa {
    pub id: String,
    pub metadata: Metadata,
    pub analysis: Analysis,
    pub tree: DocumentTree,
}

impl Normativa {
    pub fn new(metadata: Metadata, analysis: Analysis, tree: DocumentTree) -> Self {
        Self {
            id: metadata.id.clone(),
            metadata,
            analysis,
            tree,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_from_document_id() {
        assert_eq!(Source::from_document_id("BOE-A-1995-25444"), Source::Boe);
        assert_eq!(Source::from_document_id("32024R1689"), Source::EurLex);
    }

    #[test]
    fn test_source_labels() {
        assert_eq!(Source::Boe.as_str(), "BOE");
        assert_eq!(Source::EurLex.as_str(), "EUR-Lex");
    }
}
