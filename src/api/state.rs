use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::{
    config::Config,
    error::{AppError, AppResult},
    services::{
        ingestion::{DatasetSource, KaggleSource},
        Recommender,
    },
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub source: Arc<dyn DatasetSource>,
    pub inner: Arc<RwLock<AppStateInner>>,
    training: Arc<Mutex<()>>,
}

/// Inner state swapped after each training run
#[derive(Default)]
pub struct AppStateInner {
    pub recommender: Option<Arc<Recommender>>,
}

impl AppState {
    /// Creates state with no recommender loaded
    pub fn new(config: Config, source: Arc<dyn DatasetSource>) -> Self {
        Self::with_recommender(config, source, None)
    }

    pub fn with_recommender(
        config: Config,
        source: Arc<dyn DatasetSource>,
        recommender: Option<Recommender>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            source,
            inner: Arc::new(RwLock::new(AppStateInner {
                recommender: recommender.map(Arc::new),
            })),
            training: Arc::new(Mutex::new(())),
        }
    }

    /// Creates state backed by Kaggle and loads whatever artifacts a previous
    /// training run left on disk
    pub fn from_config(config: Config) -> Self {
        let source = Arc::new(KaggleSource::new(
            config.kaggle_api_url.clone(),
            config.kaggle_username.clone(),
            config.kaggle_key.clone(),
        ));

        let recommender = match Recommender::load(&config.artifact_store()) {
            Ok(recommender) => Some(recommender),
            Err(e) => {
                tracing::warn!(error = %e, "No usable model on disk; train before requesting recommendations");
                None
            }
        };

        Self::with_recommender(config, source, recommender)
    }

    /// Uses `recommender` for subsequent requests
    pub async fn set_recommender(&self, recommender: Recommender) {
        let mut inner = self.inner.write().await;
        inner.recommender = Some(Arc::new(recommender));
    }

    /// The currently loaded recommender
    pub async fn recommender(&self) -> AppResult<Arc<Recommender>> {
        let inner = self.inner.read().await;
        inner.recommender.clone().ok_or_else(|| {
            AppError::ModelUnavailable("No trained model loaded; run training first".to_string())
        })
    }

    /// Claims the single training slot, failing if a run is already active.
    /// The slot stays taken until the returned guard is dropped.
    pub fn begin_training(&self) -> AppResult<OwnedMutexGuard<()>> {
        self.training
            .clone()
            .try_lock_owned()
            .map_err(|_| AppError::TrainingInProgress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> AppState {
        let config = Config::from_pairs([("ARTIFACTS_DIR", "/nonexistent/books")]).unwrap();
        AppState::from_config(config)
    }

    #[tokio::test]
    async fn test_missing_artifacts_leave_state_untrained() {
        let state = state();
        assert!(matches!(
            state.recommender().await,
            Err(AppError::ModelUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_only_one_training_run_at_a_time() {
        let state = state();

        let guard = state.begin_training().unwrap();
        assert!(matches!(
            state.begin_training(),
            Err(AppError::TrainingInProgress)
        ));

        drop(guard);
        assert!(state.begin_training().is_ok());
    }
}
