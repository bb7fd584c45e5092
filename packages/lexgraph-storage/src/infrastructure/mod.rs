pub mod memory;
pub mod neo4j;
