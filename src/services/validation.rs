use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::{
    config::ValidationConfig,
    error::{AppError, AppResult, IoContext},
    models::{BookRecord, CleanedRating, RatingRecord},
};

// Accepted header names per column: the raw Book-Crossing names first, then snake_case.
const ISBN_COLUMNS: &[&str] = &["ISBN", "isbn"];
const TITLE_COLUMNS: &[&str] = &["Book-Title", "title"];
const AUTHOR_COLUMNS: &[&str] = &["Book-Author", "author"];
const IMAGE_URL_COLUMNS: &[&str] = &["Image-URL-L", "image_url"];
const USER_ID_COLUMNS: &[&str] = &["User-ID", "user_id"];
const RATING_COLUMNS: &[&str] = &["Book-Rating", "rating"];

/// Rating-count thresholds applied while cleaning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleaningThresholds {
    pub min_user_ratings: usize,
    pub min_book_ratings: usize,
}

/// Row counts of one cleaning run
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ValidationReport {
    pub raw_books: usize,
    pub raw_ratings: usize,
    pub active_users: usize,
    pub retained_books: usize,
    pub cleaned_rows: usize,
}

/// Loads the raw tables, filters them and writes the cleaned table
pub struct DataValidation {
    config: ValidationConfig,
}

impl DataValidation {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    pub fn start_data_validation(&self) -> AppResult<ValidationReport> {
        tracing::info!("{0} Data validation started {0}", "=".repeat(20));

        let books = load_books(&self.config.books_csv_file)?;
        let ratings = load_ratings(&self.config.ratings_csv_file)?;

        let thresholds = CleaningThresholds {
            min_user_ratings: self.config.min_user_ratings,
            min_book_ratings: self.config.min_book_ratings,
        };
        let (cleaned, active_users) = clean(&books, &ratings, thresholds);

        let retained_books = cleaned
            .iter()
            .map(|row| row.title.as_str())
            .collect::<HashSet<_>>()
            .len();

        if self.config.clean_data_dir.exists() {
            fs::remove_dir_all(&self.config.clean_data_dir).at_path(&self.config.clean_data_dir)?;
        }
        fs::create_dir_all(&self.config.clean_data_dir).at_path(&self.config.clean_data_dir)?;
        write_cleaned(&self.config.clean_data_file, &cleaned)?;

        let report = ValidationReport {
            raw_books: books.len(),
            raw_ratings: ratings.len(),
            active_users,
            retained_books,
            cleaned_rows: cleaned.len(),
        };

        tracing::info!(
            raw_ratings = report.raw_ratings,
            active_users = report.active_users,
            retained_books = report.retained_books,
            cleaned_rows = report.cleaned_rows,
            path = %self.config.clean_data_file.display(),
            "{0} Data validation completed {0}",
            "=".repeat(20)
        );

        Ok(report)
    }
}

/// Filters and joins the raw tables.
///
/// Users are kept when they rated at least `min_user_ratings` books in the raw
/// table. Their ratings are joined to book metadata on ISBN, duplicate
/// (user, title) pairs collapse to the first occurrence, and finally titles
/// with fewer than `min_book_ratings` remaining rows are dropped. Input order
/// is preserved. Returns the cleaned rows and the number of active users.
pub fn clean(
    books: &[BookRecord],
    ratings: &[RatingRecord],
    thresholds: CleaningThresholds,
) -> (Vec<CleanedRating>, usize) {
    let mut ratings_per_user: HashMap<&str, usize> = HashMap::new();
    for rating in ratings {
        *ratings_per_user.entry(rating.user_id.as_str()).or_default() += 1;
    }
    let active_users: HashSet<&str> = ratings_per_user
        .into_iter()
        .filter(|(_, count)| *count >= thresholds.min_user_ratings)
        .map(|(user, _)| user)
        .collect();

    let mut books_by_isbn: HashMap<&str, &BookRecord> = HashMap::new();
    for book in books.iter().filter(|b| !b.title.trim().is_empty()) {
        books_by_isbn.entry(book.isbn.as_str()).or_insert(book);
    }

    let mut seen: HashSet<(&str, &str)> = HashSet::new();
    let mut joined: Vec<(&RatingRecord, &BookRecord)> = Vec::new();
    for rating in ratings {
        if !active_users.contains(rating.user_id.as_str()) {
            continue;
        }
        let Some(&book) = books_by_isbn.get(rating.isbn.as_str()) else {
            continue;
        };
        if seen.insert((rating.user_id.as_str(), book.title.as_str())) {
            joined.push((rating, book));
        }
    }

    let mut rows_per_title: HashMap<&str, usize> = HashMap::new();
    for (_, book) in &joined {
        *rows_per_title.entry(book.title.as_str()).or_default() += 1;
    }

    let cleaned = joined
        .into_iter()
        .filter(|(_, book)| rows_per_title[book.title.as_str()] >= thresholds.min_book_ratings)
        .map(|(rating, book)| CleanedRating::join(rating, book))
        .collect();

    (cleaned, active_users.len())
}

/// Reads the raw book metadata table
pub fn load_books(path: &Path) -> AppResult<Vec<BookRecord>> {
    let mut reader = open_table(path)?;
    let headers = reader.byte_headers()?.clone();

    let isbn = column(&headers, ISBN_COLUMNS, path)?;
    let title = column(&headers, TITLE_COLUMNS, path)?;
    let author = column(&headers, AUTHOR_COLUMNS, path)?;
    let image_url = column(&headers, IMAGE_URL_COLUMNS, path)?;

    let mut books = Vec::new();
    for result in reader.byte_records() {
        let record = result?;
        books.push(BookRecord {
            isbn: field(&record, isbn),
            title: field(&record, title),
            author: field(&record, author),
            image_url: field(&record, image_url),
        });
    }

    tracing::info!(path = %path.display(), rows = books.len(), "Loaded books");

    Ok(books)
}

/// Reads the raw ratings table
pub fn load_ratings(path: &Path) -> AppResult<Vec<RatingRecord>> {
    let mut reader = open_table(path)?;
    let headers = reader.byte_headers()?.clone();

    let user_id = column(&headers, USER_ID_COLUMNS, path)?;
    let isbn = column(&headers, ISBN_COLUMNS, path)?;
    let rating = column(&headers, RATING_COLUMNS, path)?;

    let mut ratings = Vec::new();
    for (i, result) in reader.byte_records().enumerate() {
        let record = result?;
        let raw = field(&record, rating);
        let value = match raw.trim().parse::<f32>() {
            Ok(value) if value.is_finite() => value,
            Ok(_) => return Err(invalid_rating(path, i, &raw, "not a finite number")),
            Err(e) => return Err(invalid_rating(path, i, &raw, &e.to_string())),
        };

        ratings.push(RatingRecord {
            user_id: field(&record, user_id),
            isbn: field(&record, isbn),
            rating: value,
        });
    }

    tracing::info!(path = %path.display(), rows = ratings.len(), "Loaded ratings");

    Ok(ratings)
}

fn invalid_rating(path: &Path, index: usize, raw: &str, reason: &str) -> AppError {
    AppError::Schema(format!(
        "{}: record {} (line {}) has invalid rating {:?}: {}",
        path.display(),
        index + 1,
        index + 2,
        raw,
        reason
    ))
}

/// Writes the cleaned table, replacing any previous file
pub fn write_cleaned(path: &Path, rows: &[CleanedRating]) -> AppResult<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush().at_path(path)?;
    Ok(())
}

/// Reads a table written by `write_cleaned`
pub fn read_cleaned(path: &Path) -> AppResult<Vec<CleanedRating>> {
    let mut reader = csv::Reader::from_path(path)?;
    let rows = reader
        .deserialize()
        .collect::<Result<Vec<CleanedRating>, _>>()?;
    Ok(rows)
}

fn open_table(path: &Path) -> AppResult<csv::Reader<fs::File>> {
    let file = fs::File::open(path).at_path(path)?;
    Ok(csv::ReaderBuilder::new().flexible(true).from_reader(file))
}

fn column(headers: &csv::ByteRecord, names: &[&str], path: &Path) -> AppResult<usize> {
    headers
        .iter()
        .position(|h| {
            let header = String::from_utf8_lossy(h);
            names.iter().any(|name| header.trim() == *name)
        })
        .ok_or_else(|| {
            AppError::Schema(format!(
                "{} is missing the {} column",
                path.display(),
                names[0]
            ))
        })
}

// Book-Crossing files are not consistently UTF-8, so fields are decoded lossily.
fn field(record: &csv::ByteRecord, index: usize) -> String {
    record
        .get(index)
        .map(|value| String::from_utf8_lossy(value).trim().to_string())
        .unwrap_or_default()
}
