//! Application use cases. Orchestrate domain logic via ports.

pub mod analysis_service;
pub mod classification;
pub mod contradiction_service;
pub mod import_service;
pub mod report;
pub mod retry;
pub mod review_analysis;

pub use analysis_service::{AnalysisService, AnalysisSettings, Evaluation};
pub use classification::ClassificationClient;
pub use contradiction_service::{ContradictionService, evidence_digest};
pub use import_service::{ImportService, ImportStats};
pub use retry::RetryPolicy;
pub use review_analysis::ReviewAnalysisService;
