//! Import of scraped data: review CSV exports and product-detail JSON documents.

use crate::adapters::import::read_reviews_csv;
use crate::domain::DomainError;
use crate::domain::marketing::extract_claims_from_text;
use crate::ports::ImportSink;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Result of a single import.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportStats {
    pub products: usize,
    pub reviews_read: usize,
    /// Reviews actually stored; already-known review ids are not counted.
    pub reviews_inserted: usize,
    pub rows_skipped: usize,
}

/// Import service. Moves parsed files into the store via `ImportSink`.
pub struct ImportService {
    sink: Arc<dyn ImportSink>,
}

impl ImportService {
    pub fn new(sink: Arc<dyn ImportSink>) -> Self {
        Self { sink }
    }

    /// Import a review CSV export. Re-importing the same file is a no-op for reviews
    /// that carry an id.
    pub async fn import_reviews(&self, path: &Path) -> Result<ImportStats, DomainError> {
        let batch = read_reviews_csv(path).await?;
        if batch.reviews.is_empty() {
            warn!(path = %path.display(), skipped = batch.skipped, "no usable reviews in file");
        }

        for (product_id, name) in &batch.products {
            self.sink.upsert_product(*product_id, name, None).await?;
        }
        let inserted = self.sink.save_reviews(&batch.reviews).await?;

        let stats = ImportStats {
            products: batch.products.len(),
            reviews_read: batch.reviews.len(),
            reviews_inserted: inserted,
            rows_skipped: batch.skipped,
        };
        info!(
            path = %path.display(),
            products = stats.products,
            reviews_read = stats.reviews_read,
            reviews_inserted = stats.reviews_inserted,
            rows_skipped = stats.rows_skipped,
            "reviews imported"
        );
        Ok(stats)
    }

    /// Attach a product-detail JSON document to a product and store the claims it
    /// yields, replacing earlier ones. Returns the claim count.
    ///
    /// # Errors
    /// `Import` when the file cannot be read, `InvalidInput` when it is not a JSON object.
    pub async fn import_product_detail(
        &self,
        product_id: i64,
        name: &str,
        path: &Path,
    ) -> Result<usize, DomainError> {
        let document = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| DomainError::Import(format!("{}: {}", path.display(), e)))?;
        let claims = extract_claims_from_text(product_id, &document)?;
        if claims.is_empty() {
            warn!(product_id, path = %path.display(), "product detail yields no claims");
        }

        self.sink
            .upsert_product(product_id, name, Some(&document))
            .await?;
        self.sink.replace_claims(product_id, &claims).await?;
        info!(product_id, claims = claims.len(), "product detail imported");
        Ok(claims.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MarketingClaim, Review};
    use std::io::Write;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        products: Mutex<Vec<(i64, String, Option<String>)>>,
        reviews: Mutex<Vec<Review>>,
        claims: Mutex<Vec<MarketingClaim>>,
    }

    #[async_trait::async_trait]
    impl ImportSink for RecordingSink {
        async fn upsert_product(
            &self,
            product_id: i64,
            name: &str,
            detail_document: Option<&str>,
        ) -> Result<(), DomainError> {
            self.products.lock().await.push((
                product_id,
                name.to_string(),
                detail_document.map(str::to_string),
            ));
            Ok(())
        }

        async fn save_reviews(&self, reviews: &[Review]) -> Result<usize, DomainError> {
            let mut stored = self.reviews.lock().await;
            let before = stored.len();
            for r in reviews {
                if !stored.iter().any(|s| s.id == r.id) {
                    stored.push(r.clone());
                }
            }
            Ok(stored.len() - before)
        }

        async fn replace_claims(
            &self,
            product_id: i64,
            claims: &[MarketingClaim],
        ) -> Result<(), DomainError> {
            let mut stored = self.claims.lock().await;
            stored.retain(|c| c.product_id != product_id);
            stored.extend_from_slice(claims);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_import_reviews_is_idempotent() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "product_id,review_id,product_name,rating,text\n1,1,Cream,5,great skin\n1,2,,1,irritated my skin\n1,3,,x,bad row\n"
        )
        .unwrap();

        let sink = Arc::new(RecordingSink::default());
        let svc = ImportService::new(Arc::clone(&sink) as Arc<dyn ImportSink>);

        let first = svc.import_reviews(file.path()).await.unwrap();
        assert_eq!(first.products, 1);
        assert_eq!(first.reviews_read, 2);
        assert_eq!(first.reviews_inserted, 2);
        assert_eq!(first.rows_skipped, 1);

        let second = svc.import_reviews(file.path()).await.unwrap();
        assert_eq!(second.reviews_inserted, 0);
        assert_eq!(sink.products.lock().await[0].1, "Cream");
    }

    #[tokio::test]
    async fn test_import_product_detail() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"product_summary": "Soothing cream", "safety_claims": ["Suitable for all skin types"]}}"#
        )
        .unwrap();

        let sink = Arc::new(RecordingSink::default());
        let svc = ImportService::new(Arc::clone(&sink) as Arc<dyn ImportSink>);
        let claims = svc.import_product_detail(7, "Cream", file.path()).await.unwrap();
        assert_eq!(claims, 2);
        let products = sink.products.lock().await;
        assert_eq!(products[0].0, 7);
        assert!(products[0].2.as_deref().unwrap_or("").contains("Soothing cream"));
        let stored = sink.claims.lock().await;
        assert_eq!(stored.len(), 2);
        assert!(stored.iter().any(|c| c.text == "Suitable for all skin types"));
    }

    #[tokio::test]
    async fn test_import_product_detail_rejects_non_object() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[1, 2, 3]").unwrap();
        let svc = ImportService::new(Arc::new(RecordingSink::default()));
        let err = svc.import_product_detail(7, "Cream", file.path()).await.unwrap_err();
        assert!(matches!(err, DomainError::InvalidInput(_)));
    }
}
