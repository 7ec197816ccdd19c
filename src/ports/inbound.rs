//! Inbound ports. UI (adapter) calls into the application.

use crate::domain::{ContradictionReport, DomainError, ProductAnalysis};

/// Analysis use cases exposed to entry points.
///
/// Both calls are safe to re-run: a new run supersedes a prior run's record, it never
/// merges with it.
#[async_trait::async_trait]
pub trait AnalysisPort: Send + Sync {
    /// Group, chunk, classify and score a product's reviews, then persist the result.
    async fn analyze_reviews(&self, product_id: i64) -> Result<ProductAnalysis, DomainError>;

    /// Compare the product's marketing claims against its latest review analysis.
    /// Runs `analyze_reviews` first when no analysis was persisted yet.
    async fn analyze_contradictions(
        &self,
        product_id: i64,
    ) -> Result<ContradictionReport, DomainError>;
}

/// Input port: UI/CLI session loop.
#[async_trait::async_trait]
pub trait InputPort: Send + Sync {
    /// Run until the user quits or the session is cancelled.
    async fn run(&self) -> Result<(), DomainError>;
}
