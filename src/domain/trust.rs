//! Severity and trust-level rules.

use crate::domain::aggregation::normalize_point;
use crate::domain::scoring::{MAX_PENALTY, PENALTY_HIGH, PENALTY_LOW, PENALTY_MEDIUM};
use crate::domain::{
    ClaimVerdict, Contradiction, GroupSummary, ProductAnalysis, SentimentGroup, Severity,
    TrustLevel,
};
use std::collections::BTreeSet;

/// Opposing share at or above which a contradiction is high severity.
pub const HIGH_SEVERITY_SHARE: f64 = 0.5;
/// Opposing share at or above which a contradiction is medium severity.
pub const MEDIUM_SEVERITY_SHARE: f64 = 0.2;
/// Share of failed claim comparisons at which the verdict is capped at medium.
pub const DEGRADED_CONFIDENCE_SHARE: f64 = 0.5;

pub fn severity_for_share(share: f64) -> Severity {
    if share >= HIGH_SEVERITY_SHARE {
        Severity::High
    } else if share >= MEDIUM_SEVERITY_SHARE {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Trust level of a review analysis before any claim is compared.
pub fn provisional_trust(score: f64, floor: f64, partial: bool) -> TrustLevel {
    if score < floor {
        TrustLevel::Low
    } else if partial {
        TrustLevel::Medium
    } else {
        TrustLevel::High
    }
}

/// Final verdict: any high-severity contradiction or a score under the floor is low,
/// any medium-severity one is medium, otherwise high. Capped at medium when too many
/// claim comparisons failed or when the review evidence itself is partial.
pub fn final_trust(
    contradictions: &[Contradiction],
    score: f64,
    floor: f64,
    claims_failed: usize,
    claims_total: usize,
    evidence_partial: bool,
) -> TrustLevel {
    let worst = contradictions.iter().map(|c| c.severity).max();
    let level = if score < floor || worst == Some(Severity::High) {
        TrustLevel::Low
    } else if worst == Some(Severity::Medium) {
        TrustLevel::Medium
    } else {
        TrustLevel::High
    };

    let degraded = claims_total > 0
        && claims_failed as f64 / claims_total as f64 >= DEGRADED_CONFIDENCE_SHARE;
    if degraded || evidence_partial {
        level.min(TrustLevel::Medium)
    } else {
        level
    }
}

/// Total deduction on the 100-point scale, capped at `MAX_PENALTY`.
pub fn penalty_for(contradictions: &[Contradiction]) -> f64 {
    let total: f64 = contradictions
        .iter()
        .map(|c| match c.severity {
            Severity::High => PENALTY_HIGH,
            Severity::Medium => PENALTY_MEDIUM,
            Severity::Low => PENALTY_LOW,
        })
        .sum();
    total.min(MAX_PENALTY)
}

fn tokens(text: &str) -> Vec<String> {
    normalize_point(text)
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Equal token sequences, or the shorter one appears as a contiguous run of whole tokens
/// in the longer one.
fn points_match(a: &[String], b: &[String]) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    long.windows(short.len()).any(|w| w == short)
}

/// Share of the group's contributing reviews that back the named points, or `None` when
/// no named point matches a disadvantage with evidence. Advantages never count.
pub fn opposing_share_in(group: &GroupSummary, points: &[String]) -> Option<f64> {
    if group.contributing_reviews == 0 {
        return None;
    }
    let wanted: Vec<Vec<String>> = points.iter().map(|p| tokens(p)).collect();
    let ids: BTreeSet<i64> = group
        .disadvantages
        .iter()
        .filter(|insight| {
            let key = tokens(&insight.point);
            wanted.iter().any(|w| points_match(w, &key))
        })
        .flat_map(|insight| insight.evidence.iter().copied())
        .collect();
    if ids.is_empty() {
        return None;
    }
    Some((ids.len() as f64 / group.contributing_reviews as f64).min(1.0))
}

/// Group and opposing share for a conflicting verdict.
///
/// Uses the verdict's group when given; otherwise the group whose evidence backs the
/// named points most strongly. Falls back to the service's own estimate, then to 0.
pub fn assess_opposition(analysis: &ProductAnalysis, verdict: &ClaimVerdict) -> (SentimentGroup, f64) {
    let measured = match verdict.group.and_then(|g| analysis.group(g)) {
        Some(group) => opposing_share_in(group, &verdict.conflicting_points).map(|s| (group.group, s)),
        None => analysis
            .groups
            .iter()
            .filter_map(|g| opposing_share_in(g, &verdict.conflicting_points).map(|s| (g.group, s)))
            .max_by(|a, b| a.1.total_cmp(&b.1)),
    };

    measured.unwrap_or_else(|| {
        let group = verdict.group.unwrap_or(SentimentGroup::Negative21);
        let share = verdict.opposing_share.unwrap_or(0.0).clamp(0.0, 1.0);
        (group, share)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ClaimCategory, Insight, MarketingClaim, Stance};

    fn contradiction(severity: Severity) -> Contradiction {
        Contradiction {
            claim: MarketingClaim {
                id: 1,
                product_id: 1,
                category: ClaimCategory::Efficacy,
                text: "claim".into(),
            },
            conflicting_evidence: "evidence".into(),
            group: SentimentGroup::Negative21,
            category: "efficacy".into(),
            severity,
            opposing_share: 0.0,
            reasoning: String::new(),
        }
    }

    fn negative_group() -> GroupSummary {
        GroupSummary {
            group: SentimentGroup::Negative21,
            review_count: 4,
            contributing_reviews: 4,
            chunks_total: 1,
            chunks_failed: 0,
            advantages: vec![],
            disadvantages: vec![
                Insight::new("Irritated my skin").with_evidence([1, 2]),
                Insight::new("Too oily").with_evidence([3]),
            ],
            summary: String::new(),
            rating_counts: [4, 0, 0, 0, 0],
        }
    }

    #[test]
    fn test_severity_thresholds() {
        assert_eq!(severity_for_share(1.0), Severity::High);
        assert_eq!(severity_for_share(0.5), Severity::High);
        assert_eq!(severity_for_share(0.2), Severity::Medium);
        assert_eq!(severity_for_share(0.19), Severity::Low);
    }

    #[test]
    fn test_final_trust_rules() {
        assert_eq!(final_trust(&[], 80.0, 40.0, 0, 3, false), TrustLevel::High);
        assert_eq!(
            final_trust(&[contradiction(Severity::Low)], 80.0, 40.0, 0, 3, false),
            TrustLevel::High
        );
        assert_eq!(
            final_trust(&[contradiction(Severity::Medium)], 80.0, 40.0, 0, 3, false),
            TrustLevel::Medium
        );
        assert_eq!(
            final_trust(&[contradiction(Severity::High)], 80.0, 40.0, 0, 3, false),
            TrustLevel::Low
        );
        assert_eq!(final_trust(&[], 39.0, 40.0, 0, 3, false), TrustLevel::Low);
    }

    #[test]
    fn test_failed_claims_cap_trust() {
        assert_eq!(final_trust(&[], 90.0, 40.0, 2, 4, false), TrustLevel::Medium);
        assert_eq!(final_trust(&[], 90.0, 40.0, 1, 4, false), TrustLevel::High);
    }

    #[test]
    fn test_partial_evidence_caps_trust() {
        assert_eq!(final_trust(&[], 90.0, 40.0, 0, 2, true), TrustLevel::Medium);
        assert_eq!(final_trust(&[], 90.0, 40.0, 0, 0, true), TrustLevel::Medium);
        assert_eq!(
            final_trust(&[contradiction(Severity::High)], 90.0, 40.0, 0, 2, true),
            TrustLevel::Low
        );
    }

    #[test]
    fn test_penalty_is_capped() {
        let many: Vec<Contradiction> = (0..5).map(|_| contradiction(Severity::High)).collect();
        assert_eq!(penalty_for(&many), MAX_PENALTY);
        assert_eq!(
            penalty_for(&[contradiction(Severity::Medium), contradiction(Severity::Low)]),
            12.0
        );
    }

    #[test]
    fn test_opposing_share_matches_points() {
        let group = negative_group();
        let share = opposing_share_in(&group, &["irritated my skin".to_string()]).unwrap();
        assert!((share - 0.5).abs() < 1e-9);
        assert_eq!(opposing_share_in(&group, &["smells nice".to_string()]), None);
    }

    #[test]
    fn test_opposing_share_ignores_praise_and_partial_words() {
        let group = GroupSummary {
            group: SentimentGroup::Neutral43,
            review_count: 10,
            contributing_reviews: 10,
            chunks_total: 1,
            chunks_failed: 0,
            advantages: vec![Insight::new("Not oily at all").with_evidence([1, 2, 3, 4, 5])],
            disadvantages: vec![
                Insight::new("A bit oily").with_evidence([6]),
                Insight::new("Sticky finish").with_evidence([7]),
            ],
            summary: String::new(),
            rating_counts: [0, 0, 5, 5, 0],
        };
        let share = opposing_share_in(&group, &["oily".to_string()]).unwrap();
        assert!((share - 0.1).abs() < 1e-9);
        // "stick" is not a whole token of "sticky finish".
        assert_eq!(opposing_share_in(&group, &["stick".to_string()]), None);
        let share = opposing_share_in(&group, &["a bit oily!".to_string()]).unwrap();
        assert!((share - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_assess_opposition_falls_back_to_estimate() {
        let analysis = ProductAnalysis {
            run_id: uuid::Uuid::nil(),
            product_id: 1,
            analyzed_at: chrono::Utc::now(),
            groups: vec![negative_group()],
            weighted_score: 20.0,
            grade: crate::domain::Grade::D,
            trust_level: TrustLevel::Low,
            failures: vec![],
            warnings: vec![],
        };
        let verdict = ClaimVerdict {
            stance: Stance::Conflicts,
            group: None,
            conflicting_points: vec!["unrelated".into()],
            evidence: String::new(),
            category: None,
            opposing_share: Some(0.3),
            reasoning: String::new(),
        };
        let (group, share) = assess_opposition(&analysis, &verdict);
        assert_eq!(group, SentimentGroup::Negative21);
        assert!((share - 0.3).abs() < 1e-9);
    }
}
