//! Contradiction analysis. Compares each marketing claim with a product's review evidence.
//!
//! Claims are compared concurrently; a failed comparison is recorded and never aborts
//! the others.

use crate::domain::scoring::grade_for;
use crate::domain::trust::{assess_opposition, final_trust, penalty_for, severity_for_share};
use crate::domain::{
    AnalysisWarning, ClaimVerdict, Contradiction, ContradictionReport, DomainError,
    MarketingClaim, ProductAnalysis, Severity, Stance, UnitFailure, WarningScope,
};
use crate::ports::ClaimSource;
use crate::usecases::classification::{ClassificationClient, claim_unit};
use chrono::Utc;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Insights quoted per side and group in the evidence digest.
const DIGEST_POINTS_PER_SIDE: usize = 25;

/// Render a product analysis as the plain-text evidence sent with every claim.
///
/// One `### <group> | <label> | N reviews, M classified` block per group, followed by
/// `Advantages:` / `Disadvantages:` bullet lists and the group summary.
pub fn evidence_digest(analysis: &ProductAnalysis) -> String {
    let mut out = String::new();
    for group in &analysis.groups {
        let _ = writeln!(
            out,
            "### {} | {} | {} reviews, {} classified",
            group.group.as_str(),
            group.group.label(),
            group.review_count,
            group.contributing_reviews
        );
        for (title, items) in [
            ("Advantages:", &group.advantages),
            ("Disadvantages:", &group.disadvantages),
        ] {
            if items.is_empty() {
                continue;
            }
            out.push_str(title);
            out.push('\n');
            for insight in items.iter().take(DIGEST_POINTS_PER_SIDE) {
                let _ = writeln!(
                    out,
                    "- {} (evidence: {} review(s))",
                    insight.point,
                    insight.evidence.len()
                );
            }
        }
        if !group.summary.is_empty() {
            let _ = writeln!(out, "Summary: {}", group.summary);
        }
    }
    out
}

/// One-paragraph verdict built from a finished report.
fn overall_assessment(report: &ContradictionReport) -> String {
    if report.claims_total == 0 {
        return format!(
            "No marketing claims to verify. Trust level {} is based on the review score {:.1} ({}).",
            report.trust_level, report.final_score, report.final_grade
        );
    }

    let count = |s: Severity| report.contradictions.iter().filter(|c| c.severity == s).count();
    let mut text = format!(
        "Trust level {}. {} of {} claim(s) contradicted by reviews",
        report.trust_level,
        report.contradictions.len(),
        report.claims_total
    );
    if !report.contradictions.is_empty() {
        let _ = write!(
            text,
            " ({} high, {} medium, {} low severity)",
            count(Severity::High),
            count(Severity::Medium),
            count(Severity::Low)
        );
    }
    let _ = write!(text, ", {} supported.", report.consistency_points.len());
    if report.claims_failed > 0 {
        let _ = write!(
            text,
            " {} comparison(s) could not be completed.",
            report.claims_failed
        );
    }
    for warning in &report.warnings {
        if let AnalysisWarning::PartialAnalysis {
            scope: WarningScope::Chunks,
            failed,
            total,
        } = warning
        {
            let _ = write!(
                text,
                " Review evidence is incomplete: {} of {} chunk(s) could not be classified.",
                failed, total
            );
        }
    }
    let _ = write!(
        text,
        " Final score {:.1} ({}) after a {:.1} point penalty.",
        report.final_score, report.final_grade, report.penalty
    );
    text
}

/// Runs contradiction analysis against an existing review analysis.
pub struct ContradictionService {
    claims: Arc<dyn ClaimSource>,
    client: Arc<ClassificationClient>,
    max_concurrency: usize,
    score_floor: f64,
}

impl ContradictionService {
    pub fn new(
        claims: Arc<dyn ClaimSource>,
        client: Arc<ClassificationClient>,
        max_concurrency: usize,
        score_floor: f64,
    ) -> Self {
        Self {
            claims,
            client,
            max_concurrency: max_concurrency.max(1),
            score_floor,
        }
    }

    /// Compare every claim of the analyzed product with its review evidence.
    ///
    /// # Errors
    /// - `AnalysisFailed` when claims exist and every comparison failed.
    /// - `Cancelled` when cancelled before any comparison completed.
    pub async fn analyze(
        &self,
        analysis: &ProductAnalysis,
        cancel: &CancellationToken,
    ) -> Result<ContradictionReport, DomainError> {
        let product_id = analysis.product_id;
        let claims = self.claims.fetch_marketing_claims(product_id).await?;
        info!(product_id, claims = claims.len(), "comparing marketing claims");

        let outcomes = self.compare_all(analysis, &claims, cancel).await;

        let claims_total = claims.len();
        let mut contradictions = Vec::new();
        let mut consistency_points = Vec::new();
        let mut failures = Vec::new();
        let mut cancelled = 0usize;

        for (claim, outcome) in outcomes {
            match outcome {
                Ok(verdict) => match verdict.stance {
                    Stance::Conflicts => {
                        contradictions.push(Self::contradiction(analysis, claim, verdict));
                    }
                    Stance::Supports => consistency_points.push(claim.text),
                    Stance::Neutral => {}
                },
                Err(e) => {
                    if e == DomainError::Cancelled {
                        cancelled += 1;
                    }
                    failures.push(UnitFailure {
                        unit: claim_unit(&claim),
                        kind: e.kind().to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }

        let claims_failed = failures.len();
        if claims_total > 0 && claims_failed == claims_total {
            if cancelled > 0 {
                return Err(DomainError::Cancelled);
            }
            return Err(DomainError::AnalysisFailed(format!(
                "all {} claim comparison(s) failed for product {}",
                claims_total, product_id
            )));
        }

        // Chunk failures upstream mean the evidence may be missing a whole group.
        let mut warnings: Vec<AnalysisWarning> = analysis
            .warnings
            .iter()
            .filter(|w| {
                matches!(
                    w,
                    AnalysisWarning::PartialAnalysis {
                        scope: WarningScope::Chunks,
                        ..
                    }
                )
            })
            .cloned()
            .collect();
        let evidence_partial = analysis.chunks_failed() > 0 || !warnings.is_empty();
        if evidence_partial {
            warn!(
                product_id,
                chunks_failed = analysis.chunks_failed(),
                chunks_total = analysis.chunks_total(),
                "review evidence is partial, trust capped at medium"
            );
        }
        if claims_failed > 0 {
            warnings.push(AnalysisWarning::PartialAnalysis {
                scope: WarningScope::Claims,
                failed: claims_failed,
                total: claims_total,
            });
        }
        if cancelled > 0 {
            warnings.push(AnalysisWarning::Cancelled {
                unfinished: cancelled,
            });
        }

        contradictions.sort_by(|a, b| b.severity.cmp(&a.severity).then(a.claim.id.cmp(&b.claim.id)));
        failures.sort_by(|a, b| a.unit.cmp(&b.unit));

        let penalty = penalty_for(&contradictions);
        let final_score = (analysis.weighted_score - penalty).max(0.0);
        let final_grade = grade_for(final_score);
        let trust_level = final_trust(
            &contradictions,
            analysis.weighted_score,
            self.score_floor,
            claims_failed,
            claims_total,
            evidence_partial,
        );
        info!(
            product_id,
            contradictions = contradictions.len(),
            supported = consistency_points.len(),
            claims_failed,
            trust = %trust_level,
            final_score,
            "contradiction analysis complete"
        );

        let mut report = ContradictionReport {
            run_id: Uuid::new_v4(),
            product_id,
            analysis_run_id: analysis.run_id,
            analyzed_at: Utc::now(),
            trust_level,
            contradictions,
            consistency_points,
            claims_total,
            claims_failed,
            penalty,
            final_score,
            final_grade,
            overall_assessment: String::new(),
            failures,
            warnings,
        };
        report.overall_assessment = overall_assessment(&report);
        Ok(report)
    }

    fn contradiction(
        analysis: &ProductAnalysis,
        claim: MarketingClaim,
        verdict: ClaimVerdict,
    ) -> Contradiction {
        let (group, share) = assess_opposition(analysis, &verdict);
        let conflicting_evidence = if !verdict.evidence.is_empty() {
            verdict.evidence
        } else if !verdict.conflicting_points.is_empty() {
            verdict.conflicting_points.join("; ")
        } else {
            analysis
                .group(group)
                .map(|g| g.summary.clone())
                .unwrap_or_default()
        };
        let category = verdict
            .category
            .unwrap_or_else(|| claim.category.as_str().to_string());
        Contradiction {
            claim,
            conflicting_evidence,
            group,
            category,
            severity: severity_for_share(share),
            opposing_share: share,
            reasoning: verdict.reasoning,
        }
    }

    /// Compare claims concurrently. Returns one outcome per claim, in completion order.
    async fn compare_all(
        &self,
        analysis: &ProductAnalysis,
        claims: &[MarketingClaim],
        cancel: &CancellationToken,
    ) -> Vec<(MarketingClaim, Result<ClaimVerdict, DomainError>)> {
        if claims.is_empty() {
            return Vec::new();
        }

        let evidence: Arc<str> = Arc::from(evidence_digest(analysis));
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks = JoinSet::new();
        let mut spawned: HashMap<tokio::task::Id, MarketingClaim> = HashMap::new();

        for claim in claims {
            let client = Arc::clone(&self.client);
            let evidence = Arc::clone(&evidence);
            let sem = Arc::clone(&semaphore);
            let cancel = cancel.clone();
            let claim_owned = claim.clone();

            let handle = tasks.spawn(async move {
                let claim = claim_owned;
                let outcome = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(DomainError::Cancelled),
                    permit = sem.acquire_owned() => match permit {
                        Ok(_permit) => client.compare_claim(&claim, &evidence, &cancel).await,
                        Err(_) => Err(DomainError::Cancelled),
                    },
                };
                if let Err(e) = &outcome {
                    warn!(unit = %claim_unit(&claim), error = %e, "claim comparison failed");
                }
                (claim, outcome)
            });
            spawned.insert(handle.id(), claim.clone());
        }

        let mut outcomes = Vec::with_capacity(claims.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    error!(error = %e, "claim task aborted");
                    if let Some(claim) = spawned.remove(&e.id()) {
                        let failure = DomainError::AnalysisFailed(format!("claim task aborted: {}", e));
                        outcomes.push((claim, Err(failure)));
                    }
                }
            }
        }
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ClaimCategory, Grade, GroupSummary, Insight, SentimentGroup, TrustLevel};
    use crate::ports::{AiPort, ClassificationRequest};
    use crate::usecases::retry::RetryPolicy;
    use std::time::Duration;

    struct StaticClaims(Vec<MarketingClaim>);

    #[async_trait::async_trait]
    impl ClaimSource for StaticClaims {
        async fn fetch_marketing_claims(&self, _product_id: i64) -> Result<Vec<MarketingClaim>, DomainError> {
            Ok(self.0.clone())
        }
    }

    /// Verdict keyed by claim text; unknown claims get a permanent error.
    struct VerdictAi(Vec<(&'static str, &'static str)>);

    #[async_trait::async_trait]
    impl AiPort for VerdictAi {
        async fn classify(&self, _request: &ClassificationRequest) -> Result<String, DomainError> {
            Err(DomainError::Ai("not used".into()))
        }

        async fn compare(&self, claim: &MarketingClaim, _evidence: &str) -> Result<String, DomainError> {
            self.0
                .iter()
                .find(|(text, _)| *text == claim.text)
                .map(|(_, raw)| raw.to_string())
                .ok_or_else(|| DomainError::Ai("no script".into()))
        }
    }

    fn claim(id: i64, text: &str) -> MarketingClaim {
        MarketingClaim {
            id,
            product_id: 1,
            category: ClaimCategory::Safety,
            text: text.to_string(),
        }
    }

    fn analysis(score: f64) -> ProductAnalysis {
        let group = |g: SentimentGroup, dis: Vec<Insight>, contributing: usize| GroupSummary {
            group: g,
            review_count: contributing,
            contributing_reviews: contributing,
            chunks_total: 1,
            chunks_failed: 0,
            advantages: Vec::new(),
            disadvantages: dis,
            summary: format!("{} summary", g),
            rating_counts: [0; 5],
        };
        ProductAnalysis {
            run_id: Uuid::new_v4(),
            product_id: 1,
            analyzed_at: Utc::now(),
            groups: vec![
                group(SentimentGroup::Positive5, Vec::new(), 6),
                group(SentimentGroup::Neutral43, Vec::new(), 0),
                group(
                    SentimentGroup::Negative21,
                    vec![
                        Insight::new("irritated my skin").with_evidence([1, 2]),
                        Insight::new("too oily").with_evidence([3]),
                    ],
                    10,
                ),
            ],
            weighted_score: score,
            grade: grade_for(score),
            trust_level: TrustLevel::High,
            failures: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn service(claims: Vec<MarketingClaim>, ai: VerdictAi) -> ContradictionService {
        let client = ClassificationClient::new(Arc::new(ai), RetryPolicy::new(1, Duration::from_secs(5)));
        ContradictionService::new(Arc::new(StaticClaims(claims)), Arc::new(client), 4, 40.0)
    }

    #[test]
    fn test_digest_format() {
        let digest = evidence_digest(&analysis(80.0));
        assert!(digest.contains("### negative_2_1 | Negative reviews (2-1 stars) | 10 reviews, 10 classified\n"));
        assert!(digest.contains("Disadvantages:\n- irritated my skin (evidence: 2 review(s))\n"));
        assert!(!digest.contains("Advantages:"));
        assert!(digest.contains("Summary: positive_5 summary"));
    }

    #[tokio::test]
    async fn test_conflict_severity_and_trust() {
        let ai = VerdictAi(vec![
            (
                "Gentle on sensitive skin",
                r#"{"stance": "conflicts", "group": "negative_2_1", "conflicting_points": ["irritated my skin"], "category": "safety"}"#,
            ),
            ("Hydrating", r#"{"stance": "supports"}"#),
            ("Made in Korea", r#"{"stance": "neutral"}"#),
        ]);
        let svc = service(
            vec![claim(1, "Gentle on sensitive skin"), claim(2, "Hydrating"), claim(3, "Made in Korea")],
            ai,
        );
        let report = svc.analyze(&analysis(80.0), &CancellationToken::new()).await.unwrap();

        // Two of ten negative reviews back the point: share 0.2 is medium.
        assert_eq!(report.contradictions.len(), 1);
        let c = &report.contradictions[0];
        assert_eq!(c.group, SentimentGroup::Negative21);
        assert_eq!(c.severity, Severity::Medium);
        assert!((c.opposing_share - 0.2).abs() < 1e-9);
        assert_eq!(c.conflicting_evidence, "irritated my skin");
        assert_eq!(report.consistency_points, vec!["Hydrating".to_string()]);
        assert_eq!(report.trust_level, TrustLevel::Medium);
        assert_eq!(report.penalty, 8.0);
        assert_eq!(report.final_score, 72.0);
        assert_eq!(report.final_grade, Grade::BPlus);
        assert!(report.warnings.is_empty());
        assert!(report.overall_assessment.contains("1 of 3 claim(s)"));
    }

    #[tokio::test]
    async fn test_failed_claim_is_recorded_and_folded() {
        let ai = VerdictAi(vec![("Hydrating", r#"{"stance": "supports"}"#)]);
        let svc = service(vec![claim(1, "Hydrating"), claim(2, "Unscripted")], ai);
        let report = svc.analyze(&analysis(90.0), &CancellationToken::new()).await.unwrap();

        assert_eq!(report.claims_failed, 1);
        assert_eq!(report.failures[0].unit, "claim:2");
        assert!(report.warnings.contains(&AnalysisWarning::PartialAnalysis {
            scope: WarningScope::Claims,
            failed: 1,
            total: 2,
        }));
        // Half of the comparisons failed: capped at medium.
        assert_eq!(report.trust_level, TrustLevel::Medium);
    }

    #[tokio::test]
    async fn test_failed_chunks_cap_report_trust() {
        let mut partial = analysis(90.0);
        let negative = partial
            .groups
            .iter_mut()
            .find(|g| g.group == SentimentGroup::Negative21)
            .unwrap();
        negative.chunks_failed = 1;
        negative.contributing_reviews = 0;
        negative.disadvantages.clear();
        let chunk_warning = AnalysisWarning::PartialAnalysis {
            scope: WarningScope::Chunks,
            failed: 1,
            total: 3,
        };
        partial.warnings.push(chunk_warning.clone());

        let ai = VerdictAi(vec![("Suitable for all skin types", r#"{"stance": "neutral"}"#)]);
        let svc = service(vec![claim(1, "Suitable for all skin types")], ai);
        let report = svc.analyze(&partial, &CancellationToken::new()).await.unwrap();

        assert!(report.contradictions.is_empty());
        assert_eq!(report.trust_level, TrustLevel::Medium);
        assert_eq!(report.warnings, vec![chunk_warning]);
        assert!(report.overall_assessment.contains("1 of 3 chunk(s)"));
    }

    #[tokio::test]
    async fn test_all_claims_failing_is_analysis_failed() {
        let svc = service(vec![claim(1, "A"), claim(2, "B")], VerdictAi(vec![]));
        let err = svc.analyze(&analysis(90.0), &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, DomainError::AnalysisFailed(_)));
    }

    #[tokio::test]
    async fn test_no_claims_uses_score_only() {
        let svc = service(Vec::new(), VerdictAi(vec![]));
        let high = svc.analyze(&analysis(75.0), &CancellationToken::new()).await.unwrap();
        assert_eq!(high.trust_level, TrustLevel::High);
        assert_eq!(high.claims_total, 0);
        assert_eq!(high.final_score, 75.0);

        let low = svc.analyze(&analysis(30.0), &CancellationToken::new()).await.unwrap();
        assert_eq!(low.trust_level, TrustLevel::Low);
    }
}
