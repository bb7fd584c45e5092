//! Input-side version model: a dated snapshot of one block's text.

use serde::{Deserialize, Serialize};

/// Kind of a raw content element inside a version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementType {
    Parrafo,
    Tabla,
    Blockquote,
    Imagen,
    Otro,
}

impl ElementType {
    /// Map a raw payload key (`"p"`, `"table"`, ...) to an element kind.
    pub fn from_key(key: &str) -> Self {
        match key {
            "p" => ElementType::Parrafo,
            "table" | "tabla" => ElementType::Tabla,
            "blockquote" => ElementType::Blockquote,
            "img" | "imagen" => ElementType::Imagen,
            _ => ElementType::Otro,
        }
    }
}

/// One content element: type plus already-flattened text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Element {
    pub element_type: ElementType,
    pub content: String,
}

impl Element {
    pub fn new(element_type: ElementType, content: impl Into<String>) -> Self {
        Self {
            element_type,
            content: content.into(),
        }
    }
}

/// A dated snapshot of a block's text. Multiple versions of the same article
/// form a temporal chain once folded into the tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Version {
    pub id_norma: Option<String>,
    pub fecha_publicacion: Option<String>,
    pub fecha_vigencia: Option<String>,
    pub elements: Vec<Element>,
}

impl Version {
    pub fn new(
        id_norma: Option<String>,
        fecha_publicacion: Option<String>,
        fecha_vigencia: Option<String>,
        elements: Vec<Element>,
    ) -> Self {
        Self {
            id_norma,
            fecha_publicacion,
            fecha_vigencia,
            elements,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_type_from_key() {
        assert_eq!(ElementType::from_key("p"), ElementType::Parrafo);
        assert_eq!(ElementType::from_key("table"), ElementType::Tabla);
        assert_eq!(ElementType::from_key("blockquote"), ElementType::Blockquote);
        assert_eq!(ElementType::from_key("whatever"), ElementType::Otro);
    }
}
