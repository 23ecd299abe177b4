use serde::{Deserialize, Serialize};

/// A recommended book with its cover image
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recommendation {
    /// Book title as it appears in the row index
    pub title: String,
    /// Cover image URL, when the cleaned data had one
    pub image_url: Option<String>,
    /// Distance from the query book under the model's metric
    pub distance: f32,
}
