use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::services::knn::DistanceMetric;
use crate::store::ArtifactStore;

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Kaggle account name used for dataset downloads
    #[serde(default)]
    pub kaggle_username: Option<String>,

    /// Kaggle API key used for dataset downloads
    #[serde(default)]
    pub kaggle_key: Option<String>,

    /// Kaggle dataset slug (`owner/dataset`)
    #[serde(default = "default_kaggle_dataset_name")]
    pub kaggle_dataset_name: String,

    /// Kaggle API base URL
    #[serde(default = "default_kaggle_api_url")]
    pub kaggle_api_url: String,

    /// Root directory for every pipeline artifact
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: PathBuf,

    #[serde(default = "default_dataset_dir")]
    pub dataset_dir: String,

    #[serde(default = "default_raw_data_dir")]
    pub raw_data_dir: String,

    #[serde(default = "default_ingested_dir")]
    pub ingested_dir: String,

    #[serde(default = "default_archive_name")]
    pub archive_name: String,

    /// Upper bound on tabular files an extracted archive may contain
    #[serde(default = "default_max_tabular_files")]
    pub max_tabular_files: usize,

    #[serde(default = "default_clean_data_dir")]
    pub clean_data_dir: String,

    #[serde(default = "default_serialized_objects_dir")]
    pub serialized_objects_dir: String,

    #[serde(default = "default_books_csv_file")]
    pub books_csv_file: String,

    #[serde(default = "default_ratings_csv_file")]
    pub ratings_csv_file: String,

    /// Users with fewer ratings than this are dropped during cleaning
    #[serde(default = "default_min_user_ratings")]
    pub min_user_ratings: usize,

    /// Books with fewer ratings than this are dropped during cleaning
    #[serde(default = "default_min_book_ratings")]
    pub min_book_ratings: usize,

    #[serde(default = "default_trained_model_dir")]
    pub trained_model_dir: String,

    #[serde(default = "default_trained_model_name")]
    pub trained_model_name: String,

    /// Neighbors returned per query, the query book included
    #[serde(default = "default_n_neighbors")]
    pub n_neighbors: usize,

    /// `cosine` or `euclidean`
    #[serde(default = "default_distance_metric")]
    pub distance_metric: String,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_kaggle_dataset_name() -> String {
    "arashnic/book-recommendation-dataset".to_string()
}

fn default_kaggle_api_url() -> String {
    "https://www.kaggle.com/api/v1".to_string()
}

fn default_artifacts_dir() -> PathBuf {
    PathBuf::from("artifacts")
}

fn default_dataset_dir() -> String {
    "dataset".to_string()
}

fn default_raw_data_dir() -> String {
    "raw_data".to_string()
}

fn default_ingested_dir() -> String {
    "ingested_data".to_string()
}

fn default_archive_name() -> String {
    "bookrecommendation.zip".to_string()
}

fn default_max_tabular_files() -> usize {
    3
}

fn default_clean_data_dir() -> String {
    "clean_data".to_string()
}

fn default_serialized_objects_dir() -> String {
    "serialized_objects".to_string()
}

fn default_books_csv_file() -> String {
    "Books.csv".to_string()
}

fn default_ratings_csv_file() -> String {
    "Ratings.csv".to_string()
}

fn default_min_user_ratings() -> usize {
    200
}

fn default_min_book_ratings() -> usize {
    50
}

fn default_trained_model_dir() -> String {
    "trained_model".to_string()
}

fn default_trained_model_name() -> String {
    "model.bin".to_string()
}

fn default_n_neighbors() -> usize {
    6
}

fn default_distance_metric() -> String {
    "cosine".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

/// Paths and limits for the ingestion stage
#[derive(Debug, Clone, PartialEq)]
pub struct IngestionConfig {
    pub dataset_name: String,
    pub raw_data_dir: PathBuf,
    pub ingested_dir: PathBuf,
    pub archive_path: PathBuf,
    pub max_tabular_files: usize,
}

/// Inputs, outputs and thresholds for the cleaning stage
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationConfig {
    pub books_csv_file: PathBuf,
    pub ratings_csv_file: PathBuf,
    pub clean_data_dir: PathBuf,
    pub clean_data_file: PathBuf,
    pub min_user_ratings: usize,
    pub min_book_ratings: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransformationConfig {
    pub clean_data_file: PathBuf,
    /// Fewest books the matrix may hold; the model needs one row per neighbor
    pub min_books: usize,
}

/// Fixed hyperparameters of the nearest-neighbor model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingConfig {
    pub n_neighbors: usize,
    pub metric: DistanceMetric,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        envy::from_env::<Config>().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
    }

    /// Load configuration from explicit key/value pairs (upper-case keys, as in the environment)
    pub fn from_pairs<I, K, V>(pairs: I) -> AppResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        envy::from_iter::<_, Config>(pairs.into_iter().map(|(k, v)| (k.into(), v.into())))
            .map_err(|e| AppError::Config(format!("Failed to load config: {}", e)))
    }

    fn dataset_root(&self) -> PathBuf {
        self.artifacts_dir.join(&self.dataset_dir)
    }

    fn clean_data_file(&self) -> PathBuf {
        self.artifacts_dir
            .join(&self.clean_data_dir)
            .join("clean_data.csv")
    }

    fn serialized_objects_path(&self) -> PathBuf {
        self.artifacts_dir.join(&self.serialized_objects_dir)
    }

    fn trained_model_path(&self) -> PathBuf {
        self.artifacts_dir
            .join(&self.trained_model_dir)
            .join(&self.trained_model_name)
    }

    pub fn ingestion_config(&self) -> IngestionConfig {
        let raw_data_dir = self.dataset_root().join(&self.raw_data_dir);
        IngestionConfig {
            dataset_name: self.kaggle_dataset_name.clone(),
            archive_path: raw_data_dir.join(&self.archive_name),
            raw_data_dir,
            ingested_dir: self.dataset_root().join(&self.ingested_dir),
            max_tabular_files: self.max_tabular_files,
        }
    }

    pub fn validation_config(&self) -> ValidationConfig {
        let ingested_dir = self.dataset_root().join(&self.ingested_dir);
        ValidationConfig {
            books_csv_file: ingested_dir.join(&self.books_csv_file),
            ratings_csv_file: ingested_dir.join(&self.ratings_csv_file),
            clean_data_dir: self.artifacts_dir.join(&self.clean_data_dir),
            clean_data_file: self.clean_data_file(),
            min_user_ratings: self.min_user_ratings,
            min_book_ratings: self.min_book_ratings,
        }
    }

    pub fn transformation_config(&self) -> TransformationConfig {
        TransformationConfig {
            clean_data_file: self.clean_data_file(),
            min_books: self.n_neighbors,
        }
    }

    pub fn training_config(&self) -> AppResult<TrainingConfig> {
        if self.n_neighbors == 0 {
            return Err(AppError::Config(
                "N_NEIGHBORS must be at least 1".to_string(),
            ));
        }

        Ok(TrainingConfig {
            n_neighbors: self.n_neighbors,
            metric: self.distance_metric.parse()?,
        })
    }

    /// Store for the matrix, row index and model artifacts
    pub fn artifact_store(&self) -> ArtifactStore {
        ArtifactStore::new(self.serialized_objects_path(), self.trained_model_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ArtifactKind;

    #[test]
    fn test_defaults() {
        let config = Config::from_pairs(Vec::<(String, String)>::new()).unwrap();
        assert_eq!(config.kaggle_username, None);
        assert_eq!(config.min_user_ratings, 200);
        assert_eq!(config.min_book_ratings, 50);
        assert_eq!(config.n_neighbors, 6);
        assert_eq!(config.port, 3000);
    }

    #[test]
    fn test_stage_paths_resolve_under_artifacts_dir() {
        let config = Config::from_pairs([("ARTIFACTS_DIR", "/tmp/books")]).unwrap();

        let ingestion = config.ingestion_config();
        assert_eq!(
            ingestion.archive_path,
            PathBuf::from("/tmp/books/dataset/raw_data/bookrecommendation.zip")
        );
        assert_eq!(
            ingestion.ingested_dir,
            PathBuf::from("/tmp/books/dataset/ingested_data")
        );

        let validation = config.validation_config();
        assert_eq!(
            validation.ratings_csv_file,
            PathBuf::from("/tmp/books/dataset/ingested_data/Ratings.csv")
        );
        assert_eq!(
            validation.clean_data_file,
            config.transformation_config().clean_data_file
        );

        let store = config.artifact_store();
        assert_eq!(
            store.path(ArtifactKind::TrainedModel),
            PathBuf::from("/tmp/books/trained_model/model.bin")
        );
        assert_eq!(
            store.path(ArtifactKind::BookPivot),
            PathBuf::from("/tmp/books/serialized_objects/book_pivot.bin")
        );
        assert_eq!(
            config.training_config().unwrap().metric,
            DistanceMetric::Cosine
        );
    }

    #[test]
    fn test_overrides_and_credentials() {
        let config = Config::from_pairs([
            ("KAGGLE_USERNAME", "reader"),
            ("KAGGLE_KEY", "secret"),
            ("MIN_BOOK_RATINGS", "10"),
            ("DISTANCE_METRIC", "euclidean"),
        ])
        .unwrap();

        assert_eq!(config.kaggle_username.as_deref(), Some("reader"));
        assert_eq!(config.min_book_ratings, 10);
        assert_eq!(
            config.training_config().unwrap().metric,
            DistanceMetric::Euclidean
        );
    }

    #[test]
    fn test_invalid_metric_is_config_error() {
        let config = Config::from_pairs([("DISTANCE_METRIC", "manhattan")]).unwrap();
        assert!(matches!(
            config.training_config(),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_invalid_number_is_config_error() {
        let result = Config::from_pairs([("PORT", "not-a-port")]);
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
