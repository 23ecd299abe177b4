use std::path::{Path, PathBuf};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Application-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Artifact serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("External API error: {0}")]
    ExternalApi(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("No data found: {0}")]
    NoData(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Artifact mismatch: {0}")]
    ArtifactMismatch(String),

    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("A training run is already in progress")]
    TrainingInProgress,

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Wraps an I/O error with the path it happened on
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        AppError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

/// Attaches the offending path to `std::io::Result`s
pub trait IoContext<T> {
    fn at_path(self, path: impl AsRef<Path>) -> AppResult<T>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn at_path(self, path: impl AsRef<Path>) -> AppResult<T> {
        self.map_err(|e| AppError::io(path, e))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::TrainingInProgress => (StatusCode::CONFLICT, self.to_string()),
            AppError::ModelUnavailable(_) | AppError::ArtifactMismatch(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, self.to_string())
            }
            AppError::Schema(_) | AppError::NoData(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, self.to_string())
            }
            AppError::ExternalApi(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::HttpClient(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
            AppError::Config(_)
            | AppError::Io { .. }
            | AppError::Csv(_)
            | AppError::Archive(_)
            | AppError::Serialization(_)
            | AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_context_keeps_path() {
        let result: std::io::Result<()> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "missing",
        ));
        let err = result.at_path("artifacts/model.bin").unwrap_err();
        assert!(err.to_string().contains("artifacts/model.bin"));
    }

    #[test]
    fn test_status_mapping() {
        let not_found = AppError::NotFound("Dune".to_string()).into_response();
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let busy = AppError::TrainingInProgress.into_response();
        assert_eq!(busy.status(), StatusCode::CONFLICT);

        let unavailable = AppError::ModelUnavailable("not trained".to_string()).into_response();
        assert_eq!(unavailable.status(), StatusCode::SERVICE_UNAVAILABLE);

        let schema = AppError::Schema("missing column".to_string()).into_response();
        assert_eq!(schema.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
