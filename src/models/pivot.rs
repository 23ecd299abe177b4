use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sparse row of the pivoted matrix: column positions in ascending order with
/// their non-zero values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    indices: Vec<u32>,
    values: Vec<f32>,
}

impl SparseVector {
    /// Builds a vector from `(column, value)` pairs in any order.
    ///
    /// Zero values are dropped since absent cells already read as 0.
    /// Pairs must not repeat a column.
    pub fn from_pairs(mut pairs: Vec<(u32, f32)>) -> Self {
        pairs.retain(|(_, value)| *value != 0.0);
        pairs.sort_by_key(|(column, _)| *column);

        let (indices, values) = pairs.into_iter().unzip();
        Self { indices, values }
    }

    #[cfg(test)]
    pub fn from_dense(values: &[f32]) -> Self {
        let pairs = values
            .iter()
            .enumerate()
            .map(|(column, value)| (column as u32, *value))
            .collect();
        Self::from_pairs(pairs)
    }

    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    #[cfg(test)]
    pub fn get(&self, column: u32) -> f32 {
        match self.indices.binary_search(&column) {
            Ok(pos) => self.values[pos],
            Err(_) => 0.0,
        }
    }

    pub fn dot(&self, other: &SparseVector) -> f64 {
        let (mut i, mut j) = (0, 0);
        let mut sum = 0.0;

        while i < self.indices.len() && j < other.indices.len() {
            match self.indices[i].cmp(&other.indices[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    sum += self.values[i] as f64 * other.values[j] as f64;
                    i += 1;
                    j += 1;
                }
            }
        }

        sum
    }

    pub fn squared_norm(&self) -> f64 {
        self.values.iter().map(|v| (*v as f64) * (*v as f64)).sum()
    }
}

/// Book-by-user rating matrix
///
/// Row `i` holds the ratings for `titles[i]`; column `j` belongs to `users[j]`.
/// Both axes are sorted. `version` identifies this exact matrix so that the
/// row index and the fitted model can prove they were built from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotMatrix {
    pub version: Uuid,
    pub created_at: DateTime<Utc>,
    pub titles: Vec<String>,
    pub users: Vec<String>,
    pub rows: Vec<SparseVector>,
}

impl PivotMatrix {
    /// (rows, columns)
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.users.len())
    }

    #[cfg(test)]
    pub fn row(&self, position: usize) -> Option<&SparseVector> {
        self.rows.get(position)
    }

    pub fn nnz(&self) -> usize {
        self.rows.iter().map(SparseVector::nnz).sum()
    }
}

/// Row-position → title lookup persisted next to the pivoted matrix
///
/// Titles are kept in the matrix's sorted row order, which lets lookups by
/// title use binary search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookIndex {
    pub pivot_version: Uuid,
    pub titles: Vec<String>,
    /// Cover image per row, taken from the first cleaned row with that title
    pub image_urls: Vec<Option<String>>,
}

impl BookIndex {
    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }

    /// Exact-match row position of a title
    pub fn position(&self, title: &str) -> Option<usize> {
        self.titles
            .binary_search_by(|candidate| candidate.as_str().cmp(title))
            .ok()
    }

    pub fn title(&self, row: usize) -> Option<&str> {
        self.titles.get(row).map(String::as_str)
    }

    pub fn image_url(&self, row: usize) -> Option<&str> {
        self.image_urls.get(row).and_then(|url| url.as_deref())
    }
}
