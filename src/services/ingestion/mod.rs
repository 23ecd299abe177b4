//! Dataset ingestion
//!
//! An ingestor turns a dataset source into tabular files on disk. Zip archives
//! are the only supported source format; the remote download behind them is a
//! separate `DatasetSource` so the extraction path can run against a cached
//! archive or a test double.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::{
    config::IngestionConfig,
    error::{AppError, AppResult},
};

pub mod archive;
pub mod kaggle;

pub use archive::ZipIngestor;
pub use kaggle::{DatasetSource, KaggleSource};

/// Outcome of one ingestion run
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct IngestionReport {
    pub archive_path: PathBuf,
    /// False when a cached archive was reused
    pub downloaded: bool,
    pub tabular_files: Vec<PathBuf>,
}

/// Produces extracted tables from a source
#[async_trait::async_trait]
pub trait DataIngestor: Send + Sync {
    async fn ingest(&self) -> AppResult<IngestionReport>;

    /// Ingestor name for logging and debugging
    fn name(&self) -> &'static str;
}

/// Picks the ingestor for the configured archive by its file extension
pub fn ingestor_for(
    config: IngestionConfig,
    source: Arc<dyn DatasetSource>,
) -> AppResult<Box<dyn DataIngestor>> {
    if has_extension(&config.archive_path, "zip") {
        return Ok(Box::new(ZipIngestor::new(config, source)));
    }

    Err(AppError::Config(format!(
        "Unsupported dataset archive type: {}",
        config.archive_path.display()
    )))
}

pub(crate) fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension))
}
