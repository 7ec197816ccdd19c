//! Outbound ports. Application calls into infrastructure.
//!
//! Implemented by adapters.

use crate::domain::{
    ContradictionReport, DomainError, MarketingClaim, Product, ProductAnalysis, Review,
    SentimentGroup,
};

/// One chunk, rendered for the text-understanding service.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationRequest {
    pub product_id: i64,
    pub group: SentimentGroup,
    /// Unit label of the chunk, e.g. `positive_5#0`.
    pub unit: String,
    pub review_count: usize,
    /// `Review;Rating;Text` CSV with header row.
    pub context_csv: String,
}

/// Source of scraped reviews.
#[async_trait::async_trait]
pub trait ReviewSource: Send + Sync {
    /// All reviews of a product, in scrape order. Empty when the product is unknown.
    async fn fetch_reviews(&self, product_id: i64) -> Result<Vec<Review>, DomainError>;

    /// Products that have reviews or claims, ordered by id.
    async fn list_products(&self) -> Result<Vec<Product>, DomainError>;
}

/// Source of extracted marketing claims.
#[async_trait::async_trait]
pub trait ClaimSource: Send + Sync {
    async fn fetch_marketing_claims(
        &self,
        product_id: i64,
    ) -> Result<Vec<MarketingClaim>, DomainError>;
}

/// Text-understanding service.
///
/// Both calls return the raw response text; parsing and recovery happen in the core.
/// Errors must be classified: `Transient`/`RateLimited` for retryable failures,
/// `Ai` for permanent ones.
#[async_trait::async_trait]
pub trait AiPort: Send + Sync {
    /// Ask for advantages, disadvantages and a summary of one chunk of reviews.
    async fn classify(&self, request: &ClassificationRequest) -> Result<String, DomainError>;

    /// Ask whether the aggregated review evidence supports, is neutral to, or conflicts
    /// with a marketing claim.
    async fn compare(&self, claim: &MarketingClaim, evidence: &str) -> Result<String, DomainError>;
}

/// Write-once store of analysis results, keyed by product id and timestamp.
#[async_trait::async_trait]
pub trait AnalysisSink: Send + Sync {
    async fn save_analysis(&self, analysis: &ProductAnalysis) -> Result<(), DomainError>;

    async fn save_contradiction_report(
        &self,
        report: &ContradictionReport,
    ) -> Result<(), DomainError>;

    /// Most recent analysis of the product, if any run was persisted.
    async fn latest_analysis(&self, product_id: i64)
    -> Result<Option<ProductAnalysis>, DomainError>;

    /// Most recent contradiction report of the product, if any.
    async fn latest_contradiction_report(
        &self,
        product_id: i64,
    ) -> Result<Option<ContradictionReport>, DomainError>;
}

/// Destination of imported scrape data.
#[async_trait::async_trait]
pub trait ImportSink: Send + Sync {
    /// Insert or rename a product. `detail_document` replaces the stored product-detail
    /// JSON when given.
    async fn upsert_product(
        &self,
        product_id: i64,
        name: &str,
        detail_document: Option<&str>,
    ) -> Result<(), DomainError>;

    /// Store reviews, skipping ids that already exist. Returns the number inserted.
    async fn save_reviews(&self, reviews: &[Review]) -> Result<usize, DomainError>;

    /// Replace the product's stored claim list. Claim ids are assigned by the store.
    async fn replace_claims(
        &self,
        product_id: i64,
        claims: &[MarketingClaim],
    ) -> Result<(), DomainError>;
}
