pub mod ingestion;
pub mod knn;
pub mod pipeline;
pub mod recommendations;
pub mod training;
pub mod transformation;
pub mod validation;

pub use pipeline::{PipelineReport, TrainingPipeline};
pub use recommendations::Recommender;
