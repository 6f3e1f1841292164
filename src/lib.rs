pub mod config;
pub mod error;
pub mod db;
pub mod ingest;
pub mod graph;
pub mod llm;
pub mod prompts;
pub mod extract;
pub mod narrative;
pub mod pipeline;

pub use config::Config;
pub use error::{PapergraphError, Result};
pub use graph::{
    consolidate, CanonicalGraph, Entity, EntityType, GraphStore, PartialGraph, Relation,
    RelationType,
};
pub use pipeline::{GraphOutcome, PaperAnalysis, Pipeline, PipelineSettings, StoreStatus};
