//! Conversion of raw document payloads into a typed `Normativa` tree plus
//! the per-document change events.

pub mod eu;

use serde_json::Value;
use tracing::{debug, warn};

use lexgraph_core::domain::version::{Element, ElementType, Version};
use lexgraph_core::services::compound_blocks;
use lexgraph_core::utils::table_text;
use lexgraph_core::utils::tree_display;
use lexgraph_core::{Analysis, ChangeEvent, Metadata, Normativa, Referencia, Source, TreeBuilder};

use crate::error::{IngestionError, Result};
use crate::retriever::RawDocument;

/// Block types that never contribute content (signatures, notes, covers).
const PROHIBITED_BLOCK_TYPES: &[&str] = &[
    "nota_inicial",
    "nota_final",
    "nota",
    "firma",
    "indice",
    "portada",
];

/// Block types that carry parseable content.
const KNOWN_BLOCK_TYPES: &[&str] = &[
    "precepto",
    "preambulo",
    "parte_dispositiva",
    "parte_final",
    "disposicion",
    "anexo",
    "encabezado",
];

#[derive(Debug, Default, Clone)]
pub struct DataProcessor;

impl DataProcessor {
    pub fn new() -> Self {
        Self
    }

    /// Turn one raw document into its content tree and change events.
    pub fn process(&self, raw: &RawDocument) -> Result<(Normativa, Vec<ChangeEvent>)> {
        match raw {
            RawDocument::Boe { id, payload } => self.process_boe(id, payload),
            RawDocument::EurLex { celex, content, .. } => eu::process(celex, content),
        }
    }

    fn process_boe(&self, id: &str, payload: &Value) -> Result<(Normativa, Vec<ChangeEvent>)> {
        let data = payload
            .get("data")
            .ok_or_else(|| IngestionError::Parse(format!("{id}: payload without data")))?;

        let metadata = parse_metadata(id, data.get("metadatos"));
        let analysis = parse_analysis(data.get("analisis"));

        let mut content = data.get("texto").cloned().unwrap_or(Value::Null);
        if content.is_object() {
            compound_blocks::distribute_compound_blocks(&mut content);
        }

        let mut builder = TreeBuilder::new(metadata.id.clone());
        if let Some(blocks) = content.get("bloque").and_then(Value::as_array) {
            for block in blocks {
                let tipo = block
                    .get("@tipo")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_lowercase();
                if PROHIBITED_BLOCK_TYPES.contains(&tipo.as_str()) {
                    continue;
                }
                if !KNOWN_BLOCK_TYPES.contains(&tipo.as_str()) {
                    warn!(block_type = %tipo, document_id = id, "skipping unknown block type");
                    continue;
                }

                let versions = parse_versions(block);
                builder.parse_versions(&versions);
            }
        }

        let (tree, change_log) = builder.finish();
        change_log.log_summary();
        debug!(document_id = id, "parsed tree:\n{}", tree_display::render_tree(&tree));

        let normativa = Normativa::new(metadata, analysis, tree);
        Ok((normativa, change_log.into_events()))
    }
}

fn get_str(value: Option<&Value>, key: &str) -> Option<String> {
    value?
        .get(key)?
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn parse_metadata(document_id: &str, metadatos: Option<&Value>) -> Metadata {
    let id = get_str(metadatos, "identificador").unwrap_or_else(|| document_id.to_string());
    let mut metadata = Metadata::new(id, Source::Boe);
    metadata.titulo = get_str(metadatos, "titulo");
    metadata.ambito = get_str(metadatos, "ambito");
    metadata.departamento = get_str(metadatos, "departamento");
    metadata.rango = get_str(metadatos, "rango");
    metadata.fecha_disposicion = get_str(metadatos, "fecha_disposicion");
    metadata.fecha_publicacion = get_str(metadatos, "fecha_publicacion");
    metadata.fecha_vigencia = get_str(metadatos, "fecha_vigencia");
    metadata.fecha_actualizacion = get_str(metadatos, "fecha_actualizacion");
    metadata.diario = get_str(metadatos, "diario");
    metadata.diario_numero = get_str(metadatos, "diario_numero");
    metadata.vigencia_agotada = get_str(metadatos, "vigencia_agotada");
    metadata.estatus_derogacion = get_str(metadatos, "estatus_derogacion");
    metadata.estatus_anulacion = get_str(metadatos, "estatus_anulacion");
    metadata.estado_consolidacion = get_str(metadatos, "estado_consolidacion");
    metadata.url_eli = get_str(metadatos, "url_eli");
    metadata.url_html_consolidada = get_str(metadatos, "url_html_consolidada");
    metadata
}

fn parse_analysis(analisis: Option<&Value>) -> Analysis {
    let mut analysis = Analysis::default();
    let Some(analisis) = analisis else {
        return analysis;
    };

    if let Some(materias) = analisis.get("materias").and_then(Value::as_array) {
        for materia in materias {
            match materia.as_str().map(str::trim) {
                Some(name) if !name.is_empty() => analysis.materias.push(name.to_string()),
                _ => warn!("skipping empty materia entry"),
            }
        }
    }

    let referencias = analisis.get("referencias");
    analysis.referencias_anteriores = parse_referencias(referencias, "anteriores");
    analysis.referencias_posteriores = parse_referencias(referencias, "posteriores");
    analysis
}

fn parse_referencias(referencias: Option<&Value>, key: &str) -> Vec<Referencia> {
    referencias
        .and_then(|r| r.get(key))
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .map(|entry| Referencia {
                    id_norma: get_str(Some(entry), "id_norma"),
                    relacion: get_str(Some(entry), "relacion"),
                    texto: get_str(Some(entry), "texto"),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Versions of one block: `version` may be a single object or a list; each
/// version's non-attribute keys become elements in payload order, with
/// tables flattened to text.
fn parse_versions(block: &Value) -> Vec<Version> {
    let raw_versions: Vec<&Value> = match block.get("version") {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(single @ Value::Object(_)) => vec![single],
        _ => Vec::new(),
    };

    raw_versions
        .into_iter()
        .map(|version| {
            let mut elements = Vec::new();
            if let Some(map) = version.as_object() {
                for (key, value) in map {
                    if key.starts_with('@') {
                        continue;
                    }
                    let items: Vec<&Value> = match value {
                        Value::Array(list) => list.iter().collect(),
                        other => vec![other],
                    };
                    for item in items {
                        let content = table_text::stringify_element_content(item);
                        elements.push(Element::new(ElementType::from_key(key), content));
                    }
                }
            }
            Version::new(
                get_str(Some(version), "@id_norma"),
                get_str(Some(version), "@fecha_publicacion"),
                get_str(Some(version), "@fecha_vigencia"),
                elements,
            )
        })
        .collect()
}
