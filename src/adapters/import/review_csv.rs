//! Review CSV reader.
//!
//! Expected columns (header row required, comma-delimited, order free):
//! `product_id`, `rating`, `text`, and optionally `review_id`, `product_name`.
//! Scraped ratings often carry a unit ("5점", "4.0", "5 stars"); the leading digit is
//! used. Multi-digit values ("10") belong to another scale and are rejected. Rows without a usable rating or text are skipped and counted.

use crate::domain::{DomainError, Review};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct ReviewRow {
    product_id: i64,
    #[serde(default)]
    review_id: Option<i64>,
    #[serde(default)]
    product_name: Option<String>,
    rating: String,
    #[serde(alias = "review_text")]
    text: String,
}

/// Parsed contents of one export file.
#[derive(Debug, Default, PartialEq)]
pub struct ImportBatch {
    /// Product id to display name. Name is empty when the file had none.
    pub products: BTreeMap<i64, String>,
    /// Reviews in file order. `id` is 0 when the file had no review id.
    pub reviews: Vec<Review>,
    pub skipped: usize,
}

/// Star rating from scraped text, or `None` unless a single 1-5 digit leads the value.
pub fn parse_rating(raw: &str) -> Option<u8> {
    let trimmed = raw.trim();
    let digits = trimmed.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits != 1 {
        return None;
    }
    let rating = trimmed.chars().next()?.to_digit(10)? as u8;
    (1..=5).contains(&rating).then_some(rating)
}

/// Parse reviews from any CSV reader.
pub fn parse_reviews<R: std::io::Read>(reader: R) -> Result<ImportBatch, DomainError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut batch = ImportBatch::default();
    for (line, row) in rdr.deserialize::<ReviewRow>().enumerate() {
        let row = match row {
            Ok(row) => row,
            Err(e) if e.is_io_error() => return Err(DomainError::Import(e.to_string())),
            Err(e) => {
                debug!(line = line + 2, error = %e, "skipping unreadable row");
                batch.skipped += 1;
                continue;
            }
        };

        let name = batch.products.entry(row.product_id).or_default();
        if let Some(product_name) = row.product_name.filter(|n| !n.is_empty()) {
            *name = product_name;
        }

        let Some(rating) = parse_rating(&row.rating) else {
            debug!(line = line + 2, rating = %row.rating, "skipping row without 1-5 rating");
            batch.skipped += 1;
            continue;
        };
        if row.text.is_empty() {
            batch.skipped += 1;
            continue;
        }
        batch.reviews.push(Review {
            id: row.review_id.unwrap_or(0),
            product_id: row.product_id,
            text: row.text,
            rating,
        });
    }
    Ok(batch)
}

/// Read a review export file. Parsing runs on the blocking pool.
pub async fn read_reviews_csv(path: &Path) -> Result<ImportBatch, DomainError> {
    let path = path.to_path_buf();
    let shown = path.display().to_string();
    let batch = tokio::task::spawn_blocking(move || {
        let file = std::fs::File::open(&path)
            .map_err(|e| DomainError::Import(format!("{}: {}", path.display(), e)))?;
        parse_reviews(file)
    })
    .await
    .map_err(|e| DomainError::Import(e.to_string()))??;

    info!(
        path = %shown,
        products = batch.products.len(),
        reviews = batch.reviews.len(),
        skipped = batch.skipped,
        "review export parsed"
    );
    Ok(batch)
}
