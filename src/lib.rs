pub mod aggregate;
pub mod checkpoint;
pub mod config;
pub mod context;
pub mod embedding;
pub mod errors;
pub mod pairs;
pub mod pipeline;
pub mod relative;
pub mod run;
pub mod similarity;
pub mod vocab;
pub mod word2vec;

pub use config::files_handling;
pub use config::{Config, Params};
pub use embedding::{EmbeddingLookup, KeyedVectors};
pub use errors::{Error, Result};
pub use pipeline::{initialize, PipelineContext, RunSummary};
pub use run::Run;
pub use similarity::Similarity;
