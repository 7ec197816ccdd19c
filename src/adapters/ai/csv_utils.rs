//! CSV utilities for AI classification. Uses the `csv` crate for safe serialization.
//!
//! Converts domain reviews to CSV format suitable for LLM context input.

use crate::domain::Review;

/// Header row of the review context.
pub const REVIEW_CSV_HEADER: [&str; 3] = ["Review", "Rating", "Text"];

/// Convert reviews to a CSV string for LLM context.
///
/// Format: `Review;Rating;Text` (semicolon-delimited for LLM token efficiency). The
/// `Review` column carries the review id the service must cite as evidence.
pub fn reviews_to_csv(reviews: &[Review]) -> Result<String, csv::Error> {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(b';')
        .has_headers(true)
        .from_writer(Vec::new());

    wtr.write_record(REVIEW_CSV_HEADER)?;

    for review in reviews {
        // Newlines would split a row for the reader; the csv crate handles quoting.
        let clean_text = review.text.replace(['\n', '\r'], " ");
        let clean_text = clean_text.trim();
        wtr.write_record([
            review.id.to_string().as_str(),
            review.rating.to_string().as_str(),
            clean_text,
        ])?;
    }

    wtr.flush()?;
    let bytes = wtr
        .into_inner()
        .map_err(|e| csv::Error::from(std::io::Error::other(e.to_string())))?;

    String::from_utf8(bytes).map_err(|e| {
        csv::Error::from(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            e.to_string(),
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review(id: i64, rating: u8, text: &str) -> Review {
        Review {
            id,
            product_id: 1,
            text: text.to_string(),
            rating,
        }
    }

    #[test]
    fn test_reviews_to_csv_basic() {
        let csv = reviews_to_csv(&[review(17, 5, "Great skin feel")]).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("Review;Rating;Text"));
        assert_eq!(lines.next(), Some("17;5;Great skin feel"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_reviews_to_csv_special_chars() {
        let csv = reviews_to_csv(&[review(2, 1, "Burned; \"badly\"\nnever again")]).unwrap();
        // Header + 1 data row; the delimiter and quotes are escaped, newlines flattened.
        assert_eq!(csv.lines().count(), 2);
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b';')
            .from_reader(csv.as_bytes());
        let record = rdr.records().next().unwrap().unwrap();
        assert_eq!(&record[0], "2");
        assert_eq!(&record[2], "Burned; \"badly\" never again");
    }

    #[test]
    fn test_reviews_to_csv_empty() {
        let csv = reviews_to_csv(&[]).unwrap();
        assert_eq!(csv.trim_end(), "Review;Rating;Text");
    }
}
