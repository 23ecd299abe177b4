use std::path::{Path, PathBuf};

use reqwest::Client as HttpClient;

use crate::error::{AppError, AppResult, IoContext};

/// Remote origin of the dataset archive
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait DatasetSource: Send + Sync {
    /// Downloads `dataset` and writes the archive to `destination`
    async fn download(&self, dataset: &str, destination: &Path) -> AppResult<()>;

    /// Source name for logging and debugging
    fn name(&self) -> &'static str;
}

/// Kaggle dataset download API
///
/// Authenticates with HTTP basic auth using the account name and API key
/// (`KAGGLE_USERNAME` / `KAGGLE_KEY`). Credentials are only checked when a
/// download is actually needed.
#[derive(Clone)]
pub struct KaggleSource {
    http_client: HttpClient,
    api_url: String,
    username: Option<String>,
    key: Option<String>,
}

impl KaggleSource {
    pub fn new(api_url: String, username: Option<String>, key: Option<String>) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_url,
            username,
            key,
        }
    }

    fn credentials(&self) -> AppResult<(&str, &str)> {
        match (self.username.as_deref(), self.key.as_deref()) {
            (Some(username), Some(key)) if !username.is_empty() && !key.is_empty() => {
                Ok((username, key))
            }
            _ => Err(AppError::Config(
                "Kaggle credentials not found in environment variables (KAGGLE_USERNAME, KAGGLE_KEY)"
                    .to_string(),
            )),
        }
    }

    fn download_url(&self, dataset: &str) -> String {
        format!(
            "{}/datasets/download/{}",
            self.api_url.trim_end_matches('/'),
            dataset
        )
    }
}

#[async_trait::async_trait]
impl DatasetSource for KaggleSource {
    async fn download(&self, dataset: &str, destination: &Path) -> AppResult<()> {
        let (username, key) = self.credentials()?;
        let url = self.download_url(dataset);

        tracing::info!(dataset = %dataset, destination = %destination.display(), "Downloading dataset");

        let response = self
            .http_client
            .get(&url)
            .basic_auth(username, Some(key))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(
                dataset = %dataset,
                status = %status,
                body = %body,
                "Kaggle download failed"
            );
            return Err(AppError::ExternalApi(format!(
                "Kaggle API returned status {}: {}",
                status, body
            )));
        }

        let bytes = response.bytes().await?;

        persist_download(destination, &bytes).await?;

        tracing::info!(
            dataset = %dataset,
            bytes = bytes.len(),
            "Dataset archive downloaded"
        );

        Ok(())
    }

    fn name(&self) -> &'static str {
        "kaggle"
    }
}

/// Writes the archive beside `destination` and renames it into place, so an
/// interrupted write never leaves a truncated archive that looks cached
async fn persist_download(destination: &Path, bytes: &[u8]) -> AppResult<()> {
    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent).await.at_path(parent)?;
    }

    let partial = partial_path(destination);
    if let Err(e) = tokio::fs::write(&partial, bytes).await {
        let _ = tokio::fs::remove_file(&partial).await;
        return Err(AppError::io(&partial, e));
    }
    tokio::fs::rename(&partial, destination)
        .await
        .at_path(destination)?;

    Ok(())
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}
