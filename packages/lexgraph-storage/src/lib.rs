//! Graph persistence for legal-document trees.
//!
//! The [`GraphStore`] port trait abstracts the property-graph database;
//! [`infrastructure::neo4j::Neo4jGraphStore`] talks Bolt, and
//! [`infrastructure::memory::MemoryGraphStore`] backs the test suite.
//! [`repository::NormativaRepository`] walks a typed tree once and commits
//! it as two batched merges.

pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod repository;

pub use domain::{
    ArticleRow, EdgeRecord, GraphStore, NodeRecord, SearchHit, VectorIndexSpec,
};
pub use error::{Result, StorageError};
pub use infrastructure::memory::MemoryGraphStore;
pub use infrastructure::neo4j::Neo4jGraphStore;
pub use repository::{NormativaRepository, SaveStats};
