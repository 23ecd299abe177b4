use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::{
    config::IngestionConfig,
    error::{AppError, AppResult, IoContext},
};

use super::{has_extension, DataIngestor, DatasetSource, IngestionReport};

/// Ingests the dataset from a zip archive, downloading it first when no
/// cached copy exists at the configured path
pub struct ZipIngestor {
    config: IngestionConfig,
    source: Arc<dyn DatasetSource>,
}

impl ZipIngestor {
    pub fn new(config: IngestionConfig, source: Arc<dyn DatasetSource>) -> Self {
        Self { config, source }
    }

    /// Makes sure the archive is on disk. Returns whether it had to be downloaded.
    async fn fetch_archive(&self) -> AppResult<bool> {
        let archive_path = &self.config.archive_path;

        if archive_path.is_file() {
            tracing::info!(
                archive = %archive_path.display(),
                "Archive already exists, skipping download"
            );
            return Ok(false);
        }

        tokio::fs::create_dir_all(&self.config.raw_data_dir)
            .await
            .at_path(&self.config.raw_data_dir)?;

        tracing::info!(
            source = self.source.name(),
            dataset = %self.config.dataset_name,
            "Fetching dataset archive"
        );
        if let Err(e) = self
            .source
            .download(&self.config.dataset_name, archive_path)
            .await
        {
            // A partial file here would be taken for a cached archive next run
            if archive_path.exists() {
                tokio::fs::remove_file(archive_path)
                    .await
                    .at_path(archive_path)?;
            }
            return Err(e);
        }

        if !archive_path.is_file() {
            return Err(AppError::ExternalApi(format!(
                "Download finished but no archive found at {}",
                archive_path.display()
            )));
        }

        Ok(true)
    }
}

#[async_trait::async_trait]
impl DataIngestor for ZipIngestor {
    async fn ingest(&self) -> AppResult<IngestionReport> {
        tracing::info!("{0} Data ingestion started {0}", "=".repeat(20));

        let downloaded = self.fetch_archive().await?;

        let archive_path = self.config.archive_path.clone();
        let ingested_dir = self.config.ingested_dir.clone();
        let max_files = self.config.max_tabular_files;
        let tabular_files = tokio::task::spawn_blocking(move || {
            extract_archive(&archive_path, &ingested_dir, max_files)
        })
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

        tracing::info!(
            files = tabular_files.len(),
            dir = %self.config.ingested_dir.display(),
            "{0} Data ingestion completed {0}",
            "=".repeat(20)
        );

        Ok(IngestionReport {
            archive_path: self.config.archive_path.clone(),
            downloaded,
            tabular_files,
        })
    }

    fn name(&self) -> &'static str {
        "zip"
    }
}

/// Replaces `ingested_dir` with the archive's contents and returns the
/// extracted CSV files, sorted by path
pub fn extract_archive(
    archive_path: &Path,
    ingested_dir: &Path,
    max_tabular_files: usize,
) -> AppResult<Vec<PathBuf>> {
    if ingested_dir.exists() {
        fs::remove_dir_all(ingested_dir).at_path(ingested_dir)?;
    }
    fs::create_dir_all(ingested_dir).at_path(ingested_dir)?;

    let file = File::open(archive_path).at_path(archive_path)?;
    let mut archive = zip::ZipArchive::new(BufReader::new(file))?;
    archive.extract(ingested_dir)?;

    tracing::info!(
        archive = %archive_path.display(),
        members = archive.len(),
        dir = %ingested_dir.display(),
        "Extracted archive"
    );

    let mut tabular_files = Vec::new();
    for entry in fs::read_dir(ingested_dir).at_path(ingested_dir)? {
        let path = entry.at_path(ingested_dir)?.path();
        if path.is_file() && has_extension(&path, "csv") {
            tabular_files.push(path);
        }
    }
    tabular_files.sort();

    if tabular_files.is_empty() {
        return Err(AppError::NoData(format!(
            "No .csv file found in the data extracted from {}",
            archive_path.display()
        )));
    }

    if tabular_files.len() > max_tabular_files {
        return Err(AppError::Schema(format!(
            "Expected at most {} .csv files in {}, found {}",
            max_tabular_files,
            archive_path.display(),
            tabular_files.len()
        )));
    }

    Ok(tabular_files)
}
