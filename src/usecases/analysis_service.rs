//! Analysis service. Orchestrates review analysis, claim comparison and reporting.
//!
//! Coordinates between review/claim sources (data), the AI client (classification),
//! the analysis sink (persistence) and the filesystem (reports).

use crate::domain::{
    AnalysisWarning, ChunkPolicy, ContradictionReport, DomainError, ProductAnalysis,
};
use crate::ports::{AiPort, AnalysisPort, AnalysisSink, ClaimSource, ReviewSource};
use crate::usecases::classification::ClassificationClient;
use crate::usecases::contradiction_service::ContradictionService;
use crate::usecases::report::write_report;
use crate::usecases::retry::RetryPolicy;
use crate::usecases::review_analysis::ReviewAnalysisService;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Tuning knobs shared by both pipelines.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisSettings {
    pub chunk_policy: ChunkPolicy,
    pub retry: RetryPolicy,
    /// Upper bound on in-flight AI calls per run.
    pub max_concurrency: usize,
    /// Scores below this are never trusted.
    pub score_floor: f64,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            chunk_policy: ChunkPolicy::default(),
            retry: RetryPolicy::default(),
            max_concurrency: 4,
            score_floor: 40.0,
        }
    }
}

/// Result of a full evaluation: fresh analysis, claim verdicts and the written report.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub analysis: ProductAnalysis,
    pub report: ContradictionReport,
    pub report_path: PathBuf,
}

/// Service for review analysis and contradiction detection.
///
/// Orchestrates the flow:
/// 1. Fetch and classify reviews, aggregate and score them
/// 2. Persist the analysis (unless the run was cancelled)
/// 3. Compare marketing claims with the aggregated evidence
/// 4. Persist the verdicts and generate a Markdown report
pub struct AnalysisService {
    reviews: ReviewAnalysisService,
    contradictions: ContradictionService,
    sink: Arc<dyn AnalysisSink>,
    reports_dir: PathBuf,
    shutdown: CancellationToken,
}

impl AnalysisService {
    /// Create a new analysis service.
    ///
    /// # Arguments
    /// * `reviews` - Source of scraped reviews
    /// * `claims` - Source of marketing claims
    /// * `ai` - AI port implementation (OpenAI, Mock, etc.)
    /// * `sink` - Write-once store for analysis results
    /// * `settings` - Chunking, retry and concurrency settings
    /// * `reports_dir` - Directory to save generated reports
    pub fn new(
        reviews: Arc<dyn ReviewSource>,
        claims: Arc<dyn ClaimSource>,
        ai: Arc<dyn AiPort>,
        sink: Arc<dyn AnalysisSink>,
        settings: AnalysisSettings,
        reports_dir: PathBuf,
    ) -> Self {
        let client = Arc::new(ClassificationClient::new(ai, settings.retry));
        Self {
            reviews: ReviewAnalysisService::new(
                reviews,
                Arc::clone(&client),
                settings.chunk_policy,
                settings.max_concurrency,
                settings.score_floor,
            ),
            contradictions: ContradictionService::new(
                claims,
                client,
                settings.max_concurrency,
                settings.score_floor,
            ),
            sink,
            reports_dir,
            shutdown: CancellationToken::new(),
        }
    }

    /// Root token. Cancelling it stops every in-flight and future run.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run a fresh review analysis. Cancelled runs are returned but not persisted.
    pub async fn run_review_analysis(&self, product_id: i64) -> Result<ProductAnalysis, DomainError> {
        let cancel = self.shutdown.child_token();
        let analysis = self.reviews.analyze(product_id, &cancel).await?;
        if analysis.was_cancelled() {
            warn!(product_id, run_id = %analysis.run_id, "analysis cancelled, not persisted");
        } else {
            self.sink.save_analysis(&analysis).await?;
        }
        Ok(analysis)
    }

    /// Compare claims against `analysis`. Cancelled runs are returned but not persisted.
    pub async fn run_contradiction_analysis(
        &self,
        analysis: &ProductAnalysis,
    ) -> Result<ContradictionReport, DomainError> {
        let cancel = self.shutdown.child_token();
        let report = self.contradictions.analyze(analysis, &cancel).await?;
        let cancelled = report
            .warnings
            .iter()
            .any(|w| matches!(w, AnalysisWarning::Cancelled { .. }));
        if cancelled || analysis.was_cancelled() {
            warn!(product_id = analysis.product_id, "contradiction run cancelled, not persisted");
        } else {
            self.sink.save_contradiction_report(&report).await?;
        }
        Ok(report)
    }

    /// Fresh analysis, claim comparison and Markdown report in one go.
    pub async fn evaluate(&self, product_id: i64) -> Result<Evaluation, DomainError> {
        let analysis = self.run_review_analysis(product_id).await?;
        let report = self.run_contradiction_analysis(&analysis).await?;
        let report_path = write_report(&self.reports_dir, &analysis, Some(&report)).await?;
        info!(
            product_id,
            trust = %report.trust_level,
            path = %report_path.display(),
            "evaluation complete"
        );
        Ok(Evaluation {
            analysis,
            report,
            report_path,
        })
    }

    /// Write a report from the latest persisted results without calling the AI.
    ///
    /// Verdicts are included only when they were computed against that same analysis.
    pub async fn export_latest_report(&self, product_id: i64) -> Result<PathBuf, DomainError> {
        let analysis = self.sink.latest_analysis(product_id).await?.ok_or_else(|| {
            DomainError::InvalidInput(format!("no analysis stored for product {}", product_id))
        })?;
        let verdicts = self
            .sink
            .latest_contradiction_report(product_id)
            .await?
            .filter(|r| r.analysis_run_id == analysis.run_id);
        if verdicts.is_none() {
            info!(product_id, "no verdicts for the latest analysis, exporting scores only");
        }
        write_report(&self.reports_dir, &analysis, verdicts.as_ref()).await
    }
}

#[async_trait::async_trait]
impl AnalysisPort for AnalysisService {
    async fn analyze_reviews(&self, product_id: i64) -> Result<ProductAnalysis, DomainError> {
        self.run_review_analysis(product_id).await
    }

    async fn analyze_contradictions(
        &self,
        product_id: i64,
    ) -> Result<ContradictionReport, DomainError> {
        let analysis = match self.sink.latest_analysis(product_id).await? {
            Some(analysis) => {
                info!(product_id, run_id = %analysis.run_id, "using latest persisted analysis");
                analysis
            }
            None => {
                info!(product_id, "no persisted analysis, analyzing reviews first");
                self.run_review_analysis(product_id).await?
            }
        };
        self.run_contradiction_analysis(&analysis).await
    }
}
