#![allow(dead_code)]

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use book_recommender::{
    config::Config,
    error::{AppError, AppResult},
    services::ingestion::DatasetSource,
};

pub const BOOKS_CSV: &str = "\
ISBN,Book-Title,Book-Author,Year-Of-Publication,Publisher,Image-URL-S,Image-URL-M,Image-URL-L
1,A,Author One,2001,Pub,http://s/1.jpg,http://m/1.jpg,http://covers/A.jpg
2,B,Author Two,2002,Pub,http://s/2.jpg,http://m/2.jpg,http://covers/B.jpg
3,C,Author Three,2003,Pub,http://s/3.jpg,http://m/3.jpg,http://covers/C.jpg
4,D,Author Four,2004,Pub,http://s/4.jpg,http://m/4.jpg,http://covers/D.jpg
";

/// "A" and "B" share identical ratings. "D" is rated once and "u5" only rates
/// once, so both fall below a threshold of 2.
pub const RATINGS_CSV: &str = "\
User-ID,ISBN,Book-Rating
u1,1,5
u1,2,5
u1,3,1
u2,1,3
u2,2,3
u3,3,4
u3,4,2
u4,3,2
u4,9999,7
u5,1,10
";

pub const USERS_CSV: &str = "\
User-ID,Location,Age
u1,\"nyc, usa\",30
";

/// Dataset source that fails the test if asked to download
#[derive(Default)]
pub struct OfflineSource {
    pub calls: AtomicUsize,
}

#[async_trait::async_trait]
impl DatasetSource for OfflineSource {
    async fn download(&self, dataset: &str, _destination: &Path) -> AppResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(AppError::ExternalApi(format!(
            "Offline source cannot download {}",
            dataset
        )))
    }

    fn name(&self) -> &'static str {
        "offline"
    }
}

pub fn write_archive(path: &Path, members: &[(&str, &str)]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let file = File::create(path).unwrap();
    let mut writer = zip::ZipWriter::new(file);
    let options =
        zip::write::SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    for (name, contents) in members {
        writer.start_file(*name, options).unwrap();
        writer.write_all(contents.as_bytes()).unwrap();
    }
    writer.finish().unwrap();
}

pub fn dataset_members() -> Vec<(&'static str, &'static str)> {
    vec![
        ("Books.csv", BOOKS_CSV),
        ("Ratings.csv", RATINGS_CSV),
        ("Users.csv", USERS_CSV),
    ]
}

/// Config rooted at `root` with thresholds small enough for the fixture
pub fn test_config(root: &Path, extra: &[(&str, &str)]) -> Config {
    let mut pairs = vec![
        ("ARTIFACTS_DIR".to_string(), root.to_string_lossy().into_owned()),
        ("MIN_USER_RATINGS".to_string(), "2".to_string()),
        ("MIN_BOOK_RATINGS".to_string(), "2".to_string()),
        ("N_NEIGHBORS".to_string(), "2".to_string()),
    ];
    for (key, value) in extra {
        pairs.retain(|(k, _)| k != key);
        pairs.push((key.to_string(), value.to_string()));
    }
    Config::from_pairs(pairs).unwrap()
}

/// Places the fixture archive where ingestion expects a cached download
pub fn seed_archive(config: &Config) {
    write_archive(&config.ingestion_config().archive_path, &dataset_members());
}
