use serde::Serialize;
use uuid::Uuid;

use crate::{
    config::TrainingConfig,
    error::AppResult,
    models::PivotMatrix,
    services::knn::{DistanceMetric, NeighborModel},
    store::{ArtifactKind, ArtifactStore},
};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TrainingReport {
    pub pivot_version: Uuid,
    pub metric: DistanceMetric,
    pub n_neighbors: usize,
    pub books: usize,
}

/// Fits the nearest-neighbor model on the persisted matrix
pub struct ModelTrainer {
    config: TrainingConfig,
    store: ArtifactStore,
}

impl ModelTrainer {
    pub fn new(config: TrainingConfig, store: ArtifactStore) -> Self {
        Self { config, store }
    }

    pub fn initiate_model_trainer(&self) -> AppResult<TrainingReport> {
        tracing::info!("{0} Model training started {0}", "=".repeat(20));

        let pivot: PivotMatrix = self.store.load(ArtifactKind::BookPivot)?;
        let model = NeighborModel::fit(&pivot, self.config.metric, self.config.n_neighbors)?;
        self.store.save(ArtifactKind::TrainedModel, &model)?;

        let report = TrainingReport {
            pivot_version: model.pivot_version(),
            metric: model.metric(),
            n_neighbors: model.n_neighbors(),
            books: model.n_rows(),
        };

        tracing::info!(
            pivot_version = %report.pivot_version,
            metric = %report.metric,
            n_neighbors = report.n_neighbors,
            books = report.books,
            "{0} Model training completed {0}",
            "=".repeat(20)
        );

        Ok(report)
    }
}
