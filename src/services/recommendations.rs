use crate::{
    error::{AppError, AppResult},
    models::{BookIndex, PivotMatrix, Recommendation},
    services::knn::NeighborModel,
    store::{ArtifactKind, ArtifactStore},
};

/// Serves similar-book lookups from the persisted artifacts
///
/// Construction checks that the matrix, its row index and the model all come
/// from the same transformation run, so a model fit on a differently filtered
/// matrix is refused instead of silently returning the wrong titles.
#[derive(Debug)]
pub struct Recommender {
    pivot: PivotMatrix,
    index: BookIndex,
    model: NeighborModel,
}

impl Recommender {
    pub fn new(pivot: PivotMatrix, index: BookIndex, model: NeighborModel) -> AppResult<Self> {
        if index.pivot_version != pivot.version || index.titles != pivot.titles {
            return Err(AppError::ArtifactMismatch(format!(
                "Book index was built for matrix {}, loaded matrix is {}",
                index.pivot_version, pivot.version
            )));
        }

        if index.image_urls.len() != index.titles.len() {
            return Err(AppError::ArtifactMismatch(format!(
                "Book index holds {} titles but {} cover entries",
                index.titles.len(),
                index.image_urls.len()
            )));
        }

        if model.pivot_version() != pivot.version || model.n_rows() != pivot.rows.len() {
            return Err(AppError::ArtifactMismatch(format!(
                "Model was fit on matrix {} ({} rows), loaded matrix is {} ({} rows); retrain the model",
                model.pivot_version(),
                model.n_rows(),
                pivot.version,
                pivot.rows.len()
            )));
        }

        Ok(Self {
            pivot,
            index,
            model,
        })
    }

    /// Loads matrix, row index and model from `store`
    pub fn load(store: &ArtifactStore) -> AppResult<Self> {
        let pivot: PivotMatrix = store.load(ArtifactKind::BookPivot)?;
        let index: BookIndex = store.load(ArtifactKind::BookIndex)?;
        let model: NeighborModel = store.load(ArtifactKind::TrainedModel)?;

        let recommender = Self::new(pivot, index, model)?;
        tracing::info!(
            books = recommender.index.len(),
            metric = %recommender.model.metric(),
            fitted_at = %recommender.model.fitted_at(),
            "Recommender loaded"
        );

        Ok(recommender)
    }

    /// Titles available for selection, in row order
    pub fn book_titles(&self) -> &[String] {
        &self.index.titles
    }

    pub fn neighbors_per_query(&self) -> usize {
        self.model.n_neighbors()
    }

    pub fn pivot(&self) -> &PivotMatrix {
        &self.pivot
    }

    pub fn model(&self) -> &NeighborModel {
        &self.model
    }

    /// Recommends with the model's configured neighbor count
    pub fn recommend(&self, title: &str) -> AppResult<Vec<Recommendation>> {
        self.recommend_n(title, self.model.n_neighbors())
    }

    /// Returns the `k` books closest to `title`, which itself comes first
    pub fn recommend_n(&self, title: &str, k: usize) -> AppResult<Vec<Recommendation>> {
        let row = self
            .index
            .position(title)
            .ok_or_else(|| AppError::NotFound(format!("Book not found: {}", title)))?;

        let neighbors = self.model.kneighbors_of_row(row, k)?;

        neighbors
            .into_iter()
            .map(|neighbor| {
                let title = self.index.title(neighbor.row).ok_or_else(|| {
                    AppError::Internal(format!("Row {} missing from book index", neighbor.row))
                })?;
                Ok(Recommendation {
                    title: title.to_string(),
                    image_url: self.index.image_url(neighbor.row).map(str::to_string),
                    distance: neighbor.distance,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CleanedRating;
    use crate::services::knn::DistanceMetric;
    use crate::services::transformation::build_pivot;
    use tempfile::TempDir;

    fn rating(user: &str, title: &str, value: f32) -> CleanedRating {
        CleanedRating {
            user_id: user.to_string(),
            isbn: format!("isbn-{}", title),
            rating: value,
            title: title.to_string(),
            author: "Author".to_string(),
            image_url: format!("http://covers/{}.jpg", title),
        }
    }

    /// Three books by four users; "A" and "B" have identical rating vectors
    fn scenario() -> Vec<CleanedRating> {
        vec![
            rating("u1", "A", 5.0),
            rating("u2", "A", 3.0),
            rating("u1", "B", 5.0),
            rating("u2", "B", 3.0),
            rating("u3", "C", 4.0),
            rating("u4", "C", 2.0),
            rating("u1", "C", 1.0),
        ]
    }

    fn recommender(k: usize) -> Recommender {
        let (pivot, index) = build_pivot(&scenario());
        let model = NeighborModel::fit(&pivot, DistanceMetric::Cosine, k).unwrap();
        Recommender::new(pivot, index, model).unwrap()
    }

    fn titles(recommendations: &[Recommendation]) -> Vec<&str> {
        recommendations.iter().map(|r| r.title.as_str()).collect()
    }

    #[test]
    fn test_identical_books_recommend_each_other() {
        let recommender = recommender(2);

        let result = recommender.recommend("A").unwrap();
        assert_eq!(titles(&result), vec!["A", "B"]);
        assert_eq!(result[0].distance, 0.0);
        assert!(result[1].distance < 1e-6);
        assert_eq!(result[1].image_url.as_deref(), Some("http://covers/B.jpg"));
    }

    #[test]
    fn test_every_title_recommends_itself_first() {
        let recommender = recommender(3);

        for title in recommender.book_titles() {
            let result = recommender.recommend(title).unwrap();
            assert_eq!(result.len(), 3);
            assert_eq!(&result[0].title, title);
        }
    }

    #[test]
    fn test_unknown_title_is_not_found() {
        let recommender = recommender(2);

        assert!(matches!(
            recommender.recommend("Z"),
            Err(AppError::NotFound(_))
        ));
        // Lookups are exact
        assert!(matches!(
            recommender.recommend("a"),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_model_from_other_matrix_is_rejected() {
        let (pivot, index) = build_pivot(&scenario());
        let (other_pivot, _) = build_pivot(&scenario());
        let stale_model = NeighborModel::fit(&other_pivot, DistanceMetric::Cosine, 2).unwrap();

        let result = Recommender::new(pivot, index, stale_model);
        assert!(matches!(result, Err(AppError::ArtifactMismatch(_))));
    }

    #[test]
    fn test_index_from_other_matrix_is_rejected() {
        let (pivot, _) = build_pivot(&scenario());
        let (_, other_index) = build_pivot(&scenario());
        let model = NeighborModel::fit(&pivot, DistanceMetric::Cosine, 2).unwrap();

        let result = Recommender::new(pivot, other_index, model);
        assert!(matches!(result, Err(AppError::ArtifactMismatch(_))));
    }

    #[test]
    fn test_load_from_store() {
        let temp_dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(temp_dir.path(), temp_dir.path().join("model.bin"));

        let (pivot, index) = build_pivot(&scenario());
        let model = NeighborModel::fit(&pivot, DistanceMetric::Cosine, 3).unwrap();
        store.save(ArtifactKind::BookPivot, &pivot).unwrap();
        store.save(ArtifactKind::BookIndex, &index).unwrap();
        store.save(ArtifactKind::TrainedModel, &model).unwrap();

        let recommender = Recommender::load(&store).unwrap();
        assert_eq!(recommender.book_titles(), &["A", "B", "C"]);
        assert_eq!(recommender.neighbors_per_query(), 3);
        assert_eq!(recommender.pivot().shape(), (3, 4));
    }

    #[test]
    fn test_load_before_training_is_unavailable() {
        let temp_dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(temp_dir.path(), temp_dir.path().join("model.bin"));

        assert!(matches!(
            Recommender::load(&store),
            Err(AppError::ModelUnavailable(_))
        ));
    }
}
