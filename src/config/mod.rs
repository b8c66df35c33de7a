// config module — rule document types, discovery/loading, migration, export

pub mod loader;
pub mod types;
