//! Scrape data import. Reads review exports into domain records.

pub mod review_csv;

pub use review_csv::{ImportBatch, parse_rating, read_reviews_csv};
