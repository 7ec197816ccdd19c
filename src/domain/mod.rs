//! Core domain layer. No external I/O dependencies.
//!
//! Entities and business rules live here. Dependencies flow inward.

pub mod aggregation;
pub mod chunking;
pub mod entities;
pub mod errors;
pub mod grouping;
pub mod marketing;
pub mod recovery;
pub mod scoring;
pub mod trust;

pub use aggregation::AnalysisAccumulator;
pub use chunking::{Chunk, ChunkPolicy, chunk_reviews};
pub use entities::{
    AnalysisWarning, ClaimCategory, ClaimVerdict, ClassificationOutcome, ClassificationResult,
    Contradiction, ContradictionReport, Grade, GroupSummary, Insight, MarketingClaim,
    ParseOutcome, Product, ProductAnalysis, Review, SentimentGroup, Severity, Stance, TrustLevel,
    UnitFailure, WarningScope,
};
pub use errors::DomainError;
pub use grouping::{GroupedReviews, group_for_rating, group_reviews};
pub use recovery::ResponseNormalizer;
