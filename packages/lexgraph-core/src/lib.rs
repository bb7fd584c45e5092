//! Core domain models and parsing services for legal-document ingestion.
//!
//! This crate is pure CPU work: it turns raw document payloads into typed
//! content trees, diffs article versions, and extracts legal citations.
//! It performs no I/O; persistence and orchestration live in the sibling
//! crates.

pub mod domain;
pub mod errors;
pub mod services;
pub mod utils;

pub use domain::change::{ChangeEvent, ChangeKind, ChangeLog};
pub use domain::document::{Analysis, Metadata, Normativa, Referencia, Source};
pub use domain::node::{ArticleData, DocumentTree, Node, NodeContent, NodeId, NodeType};
pub use domain::version::{Element, ElementType, Version};
pub use errors::{CoreError, Result};
pub use services::reference_extractor::{
    ExtractedReference, ExtractionResult, ReferenceExtractor, ReferenceType,
};
pub use services::tree_builder::TreeBuilder;
pub use utils::spanish_numbers::{normalize_article_number, spanish_words_to_number};
