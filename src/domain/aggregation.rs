//! Aggregation of per-chunk classification results into a `ProductAnalysis`.
//!
//! `AnalysisAccumulator` is the only owner of a run's in-progress state. Every merge is a
//! set union or a sum, so chunk results may arrive in any order.

use crate::domain::scoring::{grade_for, weighted_score};
use crate::domain::trust::provisional_trust;
use crate::domain::{
    AnalysisWarning, Chunk, ClassificationResult, DomainError, GroupSummary, Insight,
    ProductAnalysis, SentimentGroup, UnitFailure, WarningScope,
};
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// How many insights per side are quoted in a generated group summary.
const SUMMARY_TOP_INSIGHTS: usize = 3;

/// Canonical form used to de-duplicate insight points: lowercase, single spaces,
/// no trailing punctuation.
pub fn normalize_point(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
        .trim_end_matches(['.', '!', '?', ',', ';', ':', '…'])
        .trim()
        .to_string()
}

#[derive(Debug, Default)]
struct GroupState {
    review_count: usize,
    chunks_total: usize,
    chunks_failed: usize,
    contributing_reviews: usize,
    rating_counts: [usize; 5],
    advantages: BTreeMap<String, Insight>,
    disadvantages: BTreeMap<String, Insight>,
    summaries: BTreeSet<String>,
}

impl GroupState {
    fn merge_insights(target: &mut BTreeMap<String, Insight>, incoming: Vec<Insight>) {
        for mut insight in incoming {
            insight.point = insight.point.split_whitespace().collect::<Vec<_>>().join(" ");
            let key = normalize_point(&insight.point);
            if key.is_empty() {
                continue;
            }
            match target.get_mut(&key) {
                Some(existing) => {
                    existing.evidence.extend(insight.evidence);
                    // Pick deterministic representatives so merge order never matters.
                    if insight.point < existing.point {
                        existing.point = insight.point;
                    }
                    if (insight.details.len(), &insight.details)
                        > (existing.details.len(), &existing.details)
                    {
                        existing.details = insight.details;
                    }
                }
                None => {
                    target.insert(key, insight);
                }
            }
        }
    }

    fn ranked(map: &BTreeMap<String, Insight>) -> Vec<Insight> {
        let mut items: Vec<(&String, &Insight)> = map.iter().collect();
        items.sort_by(|(ka, a), (kb, b)| {
            b.evidence
                .len()
                .cmp(&a.evidence.len())
                .then_with(|| ka.cmp(kb))
        });
        items.into_iter().map(|(_, i)| i.clone()).collect()
    }

    fn into_summary(self, group: SentimentGroup) -> GroupSummary {
        let advantages = Self::ranked(&self.advantages);
        let disadvantages = Self::ranked(&self.disadvantages);
        let summary = combined_summary(
            self.review_count,
            self.contributing_reviews,
            &self.summaries,
            &advantages,
            &disadvantages,
        );
        GroupSummary {
            group,
            review_count: self.review_count,
            contributing_reviews: self.contributing_reviews,
            chunks_total: self.chunks_total,
            chunks_failed: self.chunks_failed,
            advantages,
            disadvantages,
            summary,
            rating_counts: self.rating_counts,
        }
    }
}

fn combined_summary(
    review_count: usize,
    contributing: usize,
    chunk_summaries: &BTreeSet<String>,
    advantages: &[Insight],
    disadvantages: &[Insight],
) -> String {
    if review_count == 0 {
        return "No reviews in this group.".to_string();
    }
    if contributing == 0 {
        return format!(
            "Classification failed for all {} review(s) in this group.",
            review_count
        );
    }

    let mut parts = vec![format!(
        "{} of {} review(s) classified.",
        contributing, review_count
    )];
    parts.extend(chunk_summaries.iter().cloned());

    let top = |items: &[Insight]| {
        items
            .iter()
            .take(SUMMARY_TOP_INSIGHTS)
            .map(|i| i.point.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    };
    if !advantages.is_empty() {
        parts.push(format!("Top advantages: {}.", top(advantages)));
    }
    if !disadvantages.is_empty() {
        parts.push(format!("Top disadvantages: {}.", top(disadvantages)));
    }
    parts.join(" ")
}

/// Accumulates chunk outcomes for one product run.
#[derive(Debug)]
pub struct AnalysisAccumulator {
    product_id: i64,
    groups: BTreeMap<SentimentGroup, GroupState>,
    failures: Vec<UnitFailure>,
    cancelled_units: usize,
}

impl AnalysisAccumulator {
    pub fn new(product_id: i64) -> Self {
        let groups = SentimentGroup::ALL
            .into_iter()
            .map(|g| (g, GroupState::default()))
            .collect();
        Self {
            product_id,
            groups,
            failures: Vec::new(),
            cancelled_units: 0,
        }
    }

    /// Declare a group's size and how many chunks it was split into.
    pub fn register_group(&mut self, group: SentimentGroup, review_count: usize, chunks: usize) {
        let state = self.state_mut(group);
        state.review_count += review_count;
        state.chunks_total += chunks;
    }

    /// Merge one successfully classified chunk.
    pub fn merge(&mut self, chunk: &Chunk, result: ClassificationResult) {
        let state = self.state_mut(chunk.group);
        state.contributing_reviews += chunk.len();
        for review in &chunk.reviews {
            if (1..=5).contains(&review.rating) {
                state.rating_counts[(review.rating - 1) as usize] += 1;
            }
        }
        GroupState::merge_insights(&mut state.advantages, result.advantages);
        GroupState::merge_insights(&mut state.disadvantages, result.disadvantages);
        let summary = result.summary.trim();
        if !summary.is_empty() {
            state.summaries.insert(summary.to_string());
        }
    }

    /// Record a chunk that produced no usable result.
    pub fn record_failure(&mut self, chunk: &Chunk, error: &DomainError) {
        if matches!(error, DomainError::Cancelled) {
            self.cancelled_units += 1;
        }
        self.state_mut(chunk.group).chunks_failed += 1;
        self.failures.push(UnitFailure {
            unit: chunk.label(),
            kind: error.kind().to_string(),
            message: error.to_string(),
        });
    }

    pub fn failures(&self) -> &[UnitFailure] {
        &self.failures
    }

    fn state_mut(&mut self, group: SentimentGroup) -> &mut GroupState {
        self.groups.entry(group).or_default()
    }

    /// Build the final analysis.
    ///
    /// # Errors
    /// - `AnalysisFailed` when the product has no reviews or every non-empty group failed.
    /// - `Cancelled` when the run was cancelled before any chunk was merged.
    pub fn finish(mut self, score_floor: f64) -> Result<ProductAnalysis, DomainError> {
        let groups: Vec<GroupSummary> = SentimentGroup::ALL
            .into_iter()
            .map(|g| self.groups.remove(&g).unwrap_or_default().into_summary(g))
            .collect();

        let total_reviews: usize = groups.iter().map(|g| g.review_count).sum();
        if total_reviews == 0 {
            return Err(DomainError::AnalysisFailed(format!(
                "product {} has no reviews",
                self.product_id
            )));
        }

        let score = match weighted_score(&groups) {
            Some(score) => score,
            None if self.cancelled_units > 0 => return Err(DomainError::Cancelled),
            None => {
                return Err(DomainError::AnalysisFailed(format!(
                    "all {} chunk(s) failed classification for product {}",
                    self.failures.len(),
                    self.product_id
                )));
            }
        };

        let chunks_total: usize = groups.iter().map(|g| g.chunks_total).sum();
        let chunks_failed: usize = groups.iter().map(|g| g.chunks_failed).sum();
        let mut warnings = Vec::new();
        if chunks_failed > 0 {
            warnings.push(AnalysisWarning::PartialAnalysis {
                scope: WarningScope::Chunks,
                failed: chunks_failed,
                total: chunks_total,
            });
        }
        if self.cancelled_units > 0 {
            warnings.push(AnalysisWarning::Cancelled {
                unfinished: self.cancelled_units,
            });
        }

        self.failures.sort_by(|a, b| a.unit.cmp(&b.unit));

        Ok(ProductAnalysis {
            run_id: Uuid::new_v4(),
            product_id: self.product_id,
            analyzed_at: Utc::now(),
            weighted_score: score,
            grade: grade_for(score),
            trust_level: provisional_trust(score, score_floor, !warnings.is_empty()),
            groups,
            failures: self.failures,
            warnings,
        })
    }
}
