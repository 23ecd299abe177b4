use std::sync::Arc;

use serde::Serialize;

use crate::{
    config::{Config, TrainingConfig},
    error::{AppError, AppResult},
    services::{
        ingestion::{ingestor_for, DatasetSource, IngestionReport},
        training::{ModelTrainer, TrainingReport},
        transformation::{DataTransformation, TransformationReport},
        validation::{DataValidation, ValidationReport},
    },
};

/// Per-stage summaries of a completed training run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub ingestion: IngestionReport,
    pub validation: ValidationReport,
    pub transformation: TransformationReport,
    pub training: TrainingReport,
}

/// Runs ingestion, cleaning, transformation and model training in order.
/// A failing stage stops the run; later stages never see partial output.
pub struct TrainingPipeline {
    config: Config,
    source: Arc<dyn DatasetSource>,
}

impl TrainingPipeline {
    pub fn new(config: Config, source: Arc<dyn DatasetSource>) -> Self {
        Self { config, source }
    }

    pub async fn start_training_pipeline(&self) -> AppResult<PipelineReport> {
        let training_config = self.config.training_config()?;

        let ingestor = ingestor_for(self.config.ingestion_config(), self.source.clone())?;
        let ingestion = ingestor.ingest().await.map_err(|e| {
            tracing::error!(stage = "ingestion", ingestor = ingestor.name(), error = %e, "Pipeline stage failed");
            e
        })?;

        let config = self.config.clone();
        let (validation, transformation, training) =
            tokio::task::spawn_blocking(move || run_offline_stages(&config, training_config))
                .await
                .map_err(|e| AppError::Internal(e.to_string()))??;

        Ok(PipelineReport {
            ingestion,
            validation,
            transformation,
            training,
        })
    }
}

fn run_offline_stages(
    config: &Config,
    training_config: TrainingConfig,
) -> AppResult<(ValidationReport, TransformationReport, TrainingReport)> {
    let validation = DataValidation::new(config.validation_config())
        .start_data_validation()
        .map_err(|e| stage_failed("validation", e))?;

    let transformation = DataTransformation::new(config.transformation_config(), config.artifact_store())
        .initiate_data_transformation()
        .map_err(|e| stage_failed("transformation", e))?;

    let training = ModelTrainer::new(training_config, config.artifact_store())
        .initiate_model_trainer()
        .map_err(|e| stage_failed("training", e))?;

    Ok((validation, transformation, training))
}

fn stage_failed(stage: &'static str, error: AppError) -> AppError {
    tracing::error!(stage = stage, error = %error, "Pipeline stage failed");
    error
}
