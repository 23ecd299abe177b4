use std::fmt::Display;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{PivotMatrix, SparseVector},
};

/// Distance used to rank neighbors
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// `1 - cos(a, b)`; rows with no ratings sit at distance 1 from everything
    #[default]
    Cosine,
    Euclidean,
}

impl FromStr for DistanceMetric {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cosine" => Ok(DistanceMetric::Cosine),
            "euclidean" => Ok(DistanceMetric::Euclidean),
            other => Err(AppError::Config(format!(
                "Unsupported distance metric: {}",
                other
            ))),
        }
    }
}

impl Display for DistanceMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DistanceMetric::Cosine => write!(f, "cosine"),
            DistanceMetric::Euclidean => write!(f, "euclidean"),
        }
    }
}

/// A neighbor found by the model: a matrix row and its distance from the query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub row: usize,
    pub distance: f32,
}

/// Brute-force nearest-neighbor index over the rows of a pivoted matrix.
///
/// Fitting keeps a copy of every row together with its norm, so queries only
/// need sparse dot products. The index remembers the version of the matrix it
/// was fit on; row positions it returns are only meaningful against that
/// matrix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeighborModel {
    metric: DistanceMetric,
    n_neighbors: usize,
    pivot_version: Uuid,
    fitted_at: DateTime<Utc>,
    rows: Vec<SparseVector>,
    squared_norms: Vec<f64>,
}

impl NeighborModel {
    /// Fits the index on every row of `pivot`.
    ///
    /// # Errors
    ///
    /// Returns error if the matrix is empty or holds fewer rows than
    /// `n_neighbors`.
    pub fn fit(pivot: &PivotMatrix, metric: DistanceMetric, n_neighbors: usize) -> AppResult<Self> {
        let n_rows = pivot.rows.len();

        if n_rows == 0 {
            return Err(AppError::NoData(
                "Cannot fit a model on an empty matrix".to_string(),
            ));
        }

        if n_neighbors == 0 {
            return Err(AppError::InvalidInput(
                "n_neighbors must be at least 1".to_string(),
            ));
        }

        if n_neighbors > n_rows {
            return Err(AppError::InvalidInput(format!(
                "n_neighbors ({}) cannot exceed the number of books ({})",
                n_neighbors, n_rows
            )));
        }

        let squared_norms = pivot.rows.iter().map(SparseVector::squared_norm).collect();

        Ok(Self {
            metric,
            n_neighbors,
            pivot_version: pivot.version,
            fitted_at: Utc::now(),
            rows: pivot.rows.clone(),
            squared_norms,
        })
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    pub fn n_neighbors(&self) -> usize {
        self.n_neighbors
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn pivot_version(&self) -> Uuid {
        self.pivot_version
    }

    pub fn fitted_at(&self) -> DateTime<Utc> {
        self.fitted_at
    }

    /// Finds the `k` rows closest to row `row` of the fitted matrix.
    ///
    /// The row itself always comes first at distance 0, even when other rows
    /// are identical to it.
    pub fn kneighbors_of_row(&self, row: usize, k: usize) -> AppResult<Vec<Neighbor>> {
        self.check_k(k)?;

        let query = self.rows.get(row).ok_or_else(|| {
            AppError::NotFound(format!("Row {} is outside the fitted matrix", row))
        })?;
        let query_norm = self.squared_norms[row];

        let mut scored: Vec<Neighbor> = (0..self.rows.len())
            .map(|candidate| {
                let distance = if candidate == row {
                    0.0
                } else {
                    self.distance(query, query_norm, candidate) as f32
                };
                Neighbor {
                    row: candidate,
                    distance,
                }
            })
            .collect();

        scored.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| (a.row != row).cmp(&(b.row != row)))
                .then_with(|| a.row.cmp(&b.row))
        });
        scored.truncate(k);

        Ok(scored)
    }

    fn check_k(&self, k: usize) -> AppResult<()> {
        if k == 0 || k > self.rows.len() {
            return Err(AppError::InvalidInput(format!(
                "Requested {} neighbors but the model holds {} books",
                k,
                self.rows.len()
            )));
        }
        Ok(())
    }

    fn distance(&self, query: &SparseVector, query_norm: f64, row: usize) -> f64 {
        let dot = query.dot(&self.rows[row]);
        let row_norm = self.squared_norms[row];

        match self.metric {
            DistanceMetric::Cosine => {
                if query_norm == 0.0 || row_norm == 0.0 {
                    return 1.0;
                }
                let similarity = dot / (query_norm.sqrt() * row_norm.sqrt());
                (1.0 - similarity).max(0.0)
            }
            DistanceMetric::Euclidean => (query_norm + row_norm - 2.0 * dot).max(0.0).sqrt(),
        }
    }
}
