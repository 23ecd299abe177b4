use std::fmt::Display;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{AppError, AppResult, IoContext};

/// Serialized pipeline outputs read back at serving time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    BookPivot,
    BookIndex,
    TrainedModel,
}

impl Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactKind::BookPivot => write!(f, "book pivot"),
            ArtifactKind::BookIndex => write!(f, "book index"),
            ArtifactKind::TrainedModel => write!(f, "trained model"),
        }
    }
}

/// Reads and writes bincode artifacts under the configured directories
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    serialized_objects_dir: PathBuf,
    trained_model_path: PathBuf,
}

impl ArtifactStore {
    pub fn new(serialized_objects_dir: impl Into<PathBuf>, trained_model_path: impl Into<PathBuf>) -> Self {
        Self {
            serialized_objects_dir: serialized_objects_dir.into(),
            trained_model_path: trained_model_path.into(),
        }
    }

    pub fn path(&self, kind: ArtifactKind) -> PathBuf {
        match kind {
            ArtifactKind::BookPivot => self.serialized_objects_dir.join("book_pivot.bin"),
            ArtifactKind::BookIndex => self.serialized_objects_dir.join("book_names.bin"),
            ArtifactKind::TrainedModel => self.trained_model_path.clone(),
        }
    }

    pub fn exists(&self, kind: ArtifactKind) -> bool {
        self.path(kind).is_file()
    }

    /// Persists `value`, replacing any previous artifact of the same kind.
    ///
    /// The artifact is written beside its final path and renamed into place,
    /// so readers never observe a half-written file.
    pub fn save<T: Serialize>(&self, kind: ArtifactKind, value: &T) -> AppResult<PathBuf> {
        let path = self.path(kind);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).at_path(parent)?;
        }

        let staging = staging_path(&path);
        {
            let file = File::create(&staging).at_path(&staging)?;
            let mut writer = BufWriter::new(file);
            bincode::serialize_into(&mut writer, value)?;
            writer.flush().at_path(&staging)?;
        }
        fs::rename(&staging, &path).at_path(&path)?;

        tracing::info!(artifact = %kind, path = %path.display(), "Saved artifact");

        Ok(path)
    }

    /// Loads an artifact, failing with `ModelUnavailable` when it was never written
    pub fn load<T: DeserializeOwned>(&self, kind: ArtifactKind) -> AppResult<T> {
        let path = self.path(kind);
        let file = File::open(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::ModelUnavailable(format!(
                    "No {} at {}; run training first",
                    kind,
                    path.display()
                ))
            } else {
                AppError::io(&path, e)
            }
        })?;

        let value = bincode::deserialize_from(BufReader::new(file))?;
        tracing::debug!(artifact = %kind, path = %path.display(), "Loaded artifact");

        Ok(value)
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_artifact_kind_display() {
        assert_eq!(format!("{}", ArtifactKind::BookPivot), "book pivot");
        assert_eq!(format!("{}", ArtifactKind::TrainedModel), "trained model");
    }

    #[test]
    fn test_paths() {
        let store = ArtifactStore::new("objects", "models/model.bin");
        assert_eq!(store.path(ArtifactKind::BookIndex), PathBuf::from("objects/book_names.bin"));
        assert_eq!(store.path(ArtifactKind::TrainedModel), PathBuf::from("models/model.bin"));
    }

    #[test]
    fn test_save_then_load_creates_directories() {
        let temp_dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(
            temp_dir.path().join("objects"),
            temp_dir.path().join("models").join("model.bin"),
        );

        let titles = vec!["Dune".to_string(), "Emma".to_string()];
        store.save(ArtifactKind::BookIndex, &titles).unwrap();

        assert!(store.exists(ArtifactKind::BookIndex));
        assert!(!staging_path(&store.path(ArtifactKind::BookIndex)).exists());

        let loaded: Vec<String> = store.load(ArtifactKind::BookIndex).unwrap();
        assert_eq!(loaded, titles);
    }

    #[test]
    fn test_load_missing_artifact_is_model_unavailable() {
        let temp_dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(temp_dir.path(), temp_dir.path().join("model.bin"));

        let result: AppResult<Vec<String>> = store.load(ArtifactKind::TrainedModel);
        assert!(matches!(result, Err(AppError::ModelUnavailable(_))));
    }

    #[test]
    fn test_load_corrupt_artifact_is_serialization_error() {
        let temp_dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(temp_dir.path(), temp_dir.path().join("model.bin"));
        fs::write(store.path(ArtifactKind::TrainedModel), b"\x01").unwrap();

        let result: AppResult<Vec<String>> = store.load(ArtifactKind::TrainedModel);
        assert!(matches!(result, Err(AppError::Serialization(_))));
    }
}
