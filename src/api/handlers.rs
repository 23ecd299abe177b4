use axum::{
    extract::{Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    middleware::RequestId,
    models::Recommendation,
    services::{knn::DistanceMetric, PipelineReport, Recommender, TrainingPipeline},
};

use super::AppState;

// Request/Response types

#[derive(Debug, Deserialize)]
pub struct RecommendationQuery {
    pub title: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecommendationResponse {
    /// The selected book
    pub book: Recommendation,
    /// Similar books, nearest first
    pub similar: Vec<Recommendation>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BooksResponse {
    pub books: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ModelInfoResponse {
    pub pivot_version: Uuid,
    pub books: usize,
    pub users: usize,
    pub metric: DistanceMetric,
    pub n_neighbors: usize,
    pub fitted_at: DateTime<Utc>,
}

impl From<&Recommender> for ModelInfoResponse {
    fn from(recommender: &Recommender) -> Self {
        let (books, users) = recommender.pivot().shape();
        let model = recommender.model();
        Self {
            pivot_version: recommender.pivot().version,
            books,
            users,
            metric: model.metric(),
            n_neighbors: model.n_neighbors(),
            fitted_at: model.fitted_at(),
        }
    }
}

// Handlers

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let model_loaded = state.recommender().await.is_ok();
    (
        StatusCode::OK,
        Json(json!({ "status": "healthy", "model_loaded": model_loaded })),
    )
}

/// Titles that can be passed to the recommendations endpoint
pub async fn list_books(State(state): State<AppState>) -> AppResult<Json<BooksResponse>> {
    let recommender = state.recommender().await?;
    Ok(Json(BooksResponse {
        books: recommender.book_titles().to_vec(),
    }))
}

/// Describes the loaded model
pub async fn model_info(State(state): State<AppState>) -> AppResult<Json<ModelInfoResponse>> {
    let recommender = state.recommender().await?;
    Ok(Json(ModelInfoResponse::from(recommender.as_ref())))
}

/// Books similar to the selected title
pub async fn recommend(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Query(query): Query<RecommendationQuery>,
) -> AppResult<Json<RecommendationResponse>> {
    let title = query.title.trim();
    if title.is_empty() {
        return Err(AppError::InvalidInput("title must not be empty".to_string()));
    }

    let recommender = state.recommender().await?;
    let mut results = recommender.recommend(title)?.into_iter();
    let book = results
        .next()
        .ok_or_else(|| AppError::Internal("Model returned no neighbors".to_string()))?;
    let similar: Vec<Recommendation> = results.collect();

    tracing::info!(
        request_id = %request_id,
        title = %title,
        similar = similar.len(),
        "Recommendations served"
    );

    Ok(Json(RecommendationResponse { book, similar }))
}

/// Runs the full training pipeline and swaps in the new model
///
/// The run happens on its own task holding the training slot, so a client
/// that disconnects does not free the slot while stages are still writing.
pub async fn train(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
) -> AppResult<Json<PipelineReport>> {
    let slot = state.begin_training()?;

    tracing::info!(request_id = %request_id, "Training pipeline started");

    let run = tokio::spawn(async move {
        let report = run_training(&state).await;
        drop(slot);
        report
    });
    let report = run
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    tracing::info!(
        request_id = %request_id,
        books = report.transformation.books,
        "Training completed"
    );

    Ok(Json(report))
}

async fn run_training(state: &AppState) -> AppResult<PipelineReport> {
    let pipeline = TrainingPipeline::new(state.config.as_ref().clone(), state.source.clone());
    let report = pipeline.start_training_pipeline().await?;

    let store = state.config.artifact_store();
    let recommender = tokio::task::spawn_blocking(move || Recommender::load(&store))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;
    state.set_recommender(recommender).await;

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    use tempfile::TempDir;
    use tokio::sync::Notify;

    use crate::{config::Config, services::ingestion::DatasetSource};

    /// Holds every download until released, then fails it
    struct GatedSource {
        release: Arc<Notify>,
    }

    #[async_trait::async_trait]
    impl DatasetSource for GatedSource {
        async fn download(&self, _dataset: &str, _destination: &Path) -> AppResult<()> {
            self.release.notified().await;
            Err(AppError::ExternalApi("download aborted".to_string()))
        }

        fn name(&self) -> &'static str {
            "gated"
        }
    }

    #[tokio::test]
    async fn test_dropped_train_request_keeps_slot_until_run_ends() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().to_string_lossy().into_owned();
        let config = Config::from_pairs([("ARTIFACTS_DIR", root)]).unwrap();
        let release = Arc::new(Notify::new());
        let state = AppState::new(
            config,
            Arc::new(GatedSource {
                release: release.clone(),
            }),
        );

        // The client goes away while the download is still pending
        let request = train(State(state.clone()), Extension(RequestId::new()));
        let cancelled = tokio::time::timeout(Duration::from_millis(50), request).await;
        assert!(cancelled.is_err());

        assert!(matches!(
            state.begin_training(),
            Err(AppError::TrainingInProgress)
        ));

        release.notify_one();

        let mut freed = false;
        for _ in 0..100 {
            if state.begin_training().is_ok() {
                freed = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(freed);
    }
}
