use serde::{Deserialize, Serialize};

pub mod pivot;
pub mod recommendation;

pub use pivot::{BookIndex, PivotMatrix, SparseVector};
pub use recommendation::Recommendation;

// ============================================================================
// Raw Dataset Records
// ============================================================================

/// One row of the raw ratings table
#[derive(Debug, Clone, PartialEq)]
pub struct RatingRecord {
    pub user_id: String,
    pub isbn: String,
    pub rating: f32,
}

/// One row of the raw book metadata table
#[derive(Debug, Clone, PartialEq)]
pub struct BookRecord {
    pub isbn: String,
    pub title: String,
    pub author: String,
    pub image_url: String,
}

// ============================================================================
// Cleaned Dataset
// ============================================================================

/// A rating joined with the metadata of the rated book
///
/// Rows of the cleaned table always carry a non-empty title and a rating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanedRating {
    pub user_id: String,
    pub isbn: String,
    pub rating: f32,
    pub title: String,
    pub author: String,
    pub image_url: String,
}

impl CleanedRating {
    pub fn join(rating: &RatingRecord, book: &BookRecord) -> Self {
        Self {
            user_id: rating.user_id.clone(),
            isbn: rating.isbn.clone(),
            rating: rating.rating,
            title: book.title.clone(),
            author: book.author.clone(),
            image_url: book.image_url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_copies_metadata() {
        let rating = RatingRecord {
            user_id: "276725".to_string(),
            isbn: "034545104X".to_string(),
            rating: 7.0,
        };
        let book = BookRecord {
            isbn: "034545104X".to_string(),
            title: "Flesh Tones: A Novel".to_string(),
            author: "M. J. Rose".to_string(),
            image_url: "http://images.amazon.com/images/P/034545104X.01.LZZZZZZZ.jpg".to_string(),
        };

        let cleaned = CleanedRating::join(&rating, &book);
        assert_eq!(cleaned.user_id, "276725");
        assert_eq!(cleaned.title, "Flesh Tones: A Novel");
        assert_eq!(cleaned.rating, 7.0);
        assert_eq!(cleaned.image_url, book.image_url);
    }
}
