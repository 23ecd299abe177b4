use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    config::TransformationConfig,
    error::{AppError, AppResult},
    models::{BookIndex, CleanedRating, PivotMatrix, SparseVector},
    services::validation::read_cleaned,
    store::{ArtifactKind, ArtifactStore},
};

/// Shape of the persisted matrix
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TransformationReport {
    pub pivot_version: Uuid,
    pub books: usize,
    pub users: usize,
    pub non_zero_cells: usize,
}

/// Pivots the cleaned table and persists the matrix and its row index
pub struct DataTransformation {
    config: TransformationConfig,
    store: ArtifactStore,
}

impl DataTransformation {
    pub fn new(config: TransformationConfig, store: ArtifactStore) -> Self {
        Self { config, store }
    }

    pub fn initiate_data_transformation(&self) -> AppResult<TransformationReport> {
        tracing::info!("{0} Data transformation started {0}", "=".repeat(20));

        let rows = read_cleaned(&self.config.clean_data_file)?;
        if rows.is_empty() {
            return Err(AppError::NoData(format!(
                "Cleaned table {} has no rows; lower the rating thresholds",
                self.config.clean_data_file.display()
            )));
        }

        let (pivot, index) = build_pivot(&rows);

        // Checked before saving so a run the model cannot be fit on leaves the
        // previous matrix, index and model in place as a set
        if pivot.rows.len() < self.config.min_books {
            return Err(AppError::InvalidInput(format!(
                "n_neighbors ({}) cannot exceed the number of books ({})",
                self.config.min_books,
                pivot.rows.len()
            )));
        }

        self.store.save(ArtifactKind::BookPivot, &pivot)?;
        self.store.save(ArtifactKind::BookIndex, &index)?;

        let (books, users) = pivot.shape();
        let report = TransformationReport {
            pivot_version: pivot.version,
            books,
            users,
            non_zero_cells: pivot.nnz(),
        };

        tracing::info!(
            pivot_version = %report.pivot_version,
            books = report.books,
            users = report.users,
            non_zero_cells = report.non_zero_cells,
            "{0} Data transformation completed {0}",
            "=".repeat(20)
        );

        Ok(report)
    }
}

/// Pivots cleaned rows into a title × user matrix and its row index.
///
/// Titles and user ids are sorted. A cell holds the rating the user gave the
/// title (the mean if the pair repeats) and stays empty otherwise. The cover
/// URL recorded for a title comes from its first row in `rows`.
pub fn build_pivot(rows: &[CleanedRating]) -> (PivotMatrix, BookIndex) {
    let titles: BTreeSet<&str> = rows.iter().map(|r| r.title.as_str()).collect();
    let users: BTreeSet<&str> = rows.iter().map(|r| r.user_id.as_str()).collect();

    let title_positions: HashMap<&str, usize> =
        titles.iter().enumerate().map(|(i, t)| (*t, i)).collect();
    let user_positions: HashMap<&str, u32> = users
        .iter()
        .enumerate()
        .map(|(j, u)| (*u, j as u32))
        .collect();

    // (row, column) -> (sum, count); BTreeMap keeps each row's columns ordered
    let mut cells: BTreeMap<(usize, u32), (f64, u32)> = BTreeMap::new();
    let mut image_urls: Vec<Option<String>> = vec![None; titles.len()];
    let mut has_cover = vec![false; titles.len()];

    for row in rows {
        let i = title_positions[row.title.as_str()];
        let j = user_positions[row.user_id.as_str()];

        let cell = cells.entry((i, j)).or_insert((0.0, 0));
        cell.0 += row.rating as f64;
        cell.1 += 1;

        if !has_cover[i] {
            has_cover[i] = true;
            if !row.image_url.is_empty() {
                image_urls[i] = Some(row.image_url.clone());
            }
        }
    }

    let mut pairs: Vec<Vec<(u32, f32)>> = vec![Vec::new(); titles.len()];
    for ((i, j), (sum, count)) in cells {
        pairs[i].push((j, (sum / count as f64) as f32));
    }

    let version = Uuid::new_v4();
    let titles: Vec<String> = titles.into_iter().map(str::to_string).collect();

    let pivot = PivotMatrix {
        version,
        created_at: Utc::now(),
        titles: titles.clone(),
        users: users.into_iter().map(str::to_string).collect(),
        rows: pairs.into_iter().map(SparseVector::from_pairs).collect(),
    };

    let index = BookIndex {
        pivot_version: version,
        titles,
        image_urls,
    };

    (pivot, index)
}
