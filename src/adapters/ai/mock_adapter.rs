//! Mock AI adapter for running without API calls.
//!
//! Produces deterministic, keyword-driven responses in the same JSON shapes the real
//! service is asked for, so the whole pipeline can run offline.

use crate::domain::{DomainError, MarketingClaim, SentimentGroup};
use crate::ports::{AiPort, ClassificationRequest};
use serde_json::json;
use std::time::Duration;
use tracing::info;

/// Complaint keywords. A review clause containing one becomes a disadvantage.
const NEGATIVE_TERMS: &[&str] = &[
    "irritat", "oily", "greasy", "sticky", "breakout", "broke out", "burn", "rash", "itch",
    "redness", "dry", "smell", "no effect", "didn't work", "no difference", "expensive",
];

/// Praise keywords. A review clause containing one becomes an advantage.
const POSITIVE_TERMS: &[&str] = &[
    "great", "love", "good", "moistur", "hydrat", "gentle", "soft", "calm", "smooth", "absorb",
    "fresh", "effective", "recommend",
];

/// Claim themes: (claim keywords, review keywords that oppose the claim).
const CLAIM_THEMES: &[(&[&str], &[&str])] = &[
    (
        &["skin type", "sensitive", "gentle", "irritat", "hypoallergenic", "safe", "mild"],
        &["irritat", "rash", "itch", "burn", "redness", "breakout", "broke out"],
    ),
    (&["moistur", "hydrat"], &["dry"]),
    (&["non-greasy", "lightweight", "absorb", "light texture"], &["oily", "greasy", "sticky"]),
    (
        &["effect", "whitening", "wrinkle", "brighten", "improve"],
        &["no effect", "didn't work", "no difference"],
    ),
    (&["fragrance", "scent"], &["smell"]),
];

/// Mock AI adapter.
///
/// Simulates network latency with a configurable delay.
pub struct MockAiAdapter {
    /// Simulated network delay in milliseconds.
    delay_ms: u64,
}

impl MockAiAdapter {
    /// Create a new mock adapter with default delay (100ms).
    pub fn new() -> Self {
        Self { delay_ms: 100 }
    }

    /// Create a mock adapter with custom delay.
    pub fn with_delay(delay_ms: u64) -> Self {
        Self { delay_ms }
    }

    fn clauses(text: &str) -> impl Iterator<Item = &str> {
        text.split([',', '.', ';', '!', '?'])
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }

    /// Classification JSON for a `Review;Rating;Text` CSV chunk.
    fn classify_csv(csv_text: &str) -> serde_json::Value {
        let mut advantages: Vec<(String, Vec<i64>)> = Vec::new();
        let mut disadvantages: Vec<(String, Vec<i64>)> = Vec::new();
        let add = |list: &mut Vec<(String, Vec<i64>)>, point: &str, id: i64| {
            let point = point.to_lowercase();
            match list.iter_mut().find(|(p, _)| *p == point) {
                Some((_, ids)) => ids.push(id),
                None => list.push((point, vec![id])),
            }
        };

        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b';')
            .flexible(true)
            .from_reader(csv_text.as_bytes());
        let mut count = 0usize;
        for record in rdr.records().flatten() {
            let (Some(id), Some(rating), Some(text)) = (record.get(0), record.get(1), record.get(2))
            else {
                continue;
            };
            let (Ok(id), Ok(rating)) = (id.trim().parse::<i64>(), rating.trim().parse::<u8>()) else {
                continue;
            };
            count += 1;

            let mut matched = false;
            for clause in Self::clauses(text) {
                let lower = clause.to_lowercase();
                if NEGATIVE_TERMS.iter().any(|t| lower.contains(t)) {
                    add(&mut disadvantages, clause, id);
                    matched = true;
                } else if POSITIVE_TERMS.iter().any(|t| lower.contains(t)) {
                    add(&mut advantages, clause, id);
                    matched = true;
                }
            }
            if !matched {
                match rating {
                    4..=5 => add(&mut advantages, text.trim(), id),
                    1..=2 => add(&mut disadvantages, text.trim(), id),
                    _ => {}
                }
            }
        }

        let to_json = |list: Vec<(String, Vec<i64>)>| {
            list.into_iter()
                .map(|(point, ids)| {
                    json!({
                        "point": point,
                        "evidence": ids,
                        "details": format!("mentioned in {} review(s)", ids.len()),
                    })
                })
                .collect::<Vec<_>>()
        };
        let summary = format!(
            "[MOCK] {} review(s): {} advantage(s), {} disadvantage(s).",
            count,
            advantages.len(),
            disadvantages.len()
        );
        json!({
            "advantages": to_json(advantages),
            "disadvantages": to_json(disadvantages),
            "summary": summary,
        })
    }

    /// Verdict JSON for one claim against the evidence digest.
    ///
    /// The digest lists each group under a `### <group> | ...` header with `Advantages:`
    /// and `Disadvantages:` sections of `- point (evidence: ...)` bullets.
    fn compare_digest(claim: &MarketingClaim, evidence: &str) -> serde_json::Value {
        let claim_text = claim.text.to_lowercase();
        let themes: Vec<&(&[&str], &[&str])> = CLAIM_THEMES
            .iter()
            .filter(|(keys, _)| keys.iter().any(|k| claim_text.contains(k)))
            .collect();

        let mut group: Option<SentimentGroup> = None;
        let mut in_disadvantages = false;
        let mut conflicts: Vec<(SentimentGroup, String)> = Vec::new();
        let mut supports: Vec<String> = Vec::new();

        for line in evidence.lines() {
            let line = line.trim();
            if let Some(header) = line.strip_prefix("### ") {
                group = header.split('|').next().and_then(SentimentGroup::parse);
                in_disadvantages = false;
                continue;
            }
            match line {
                "Advantages:" => in_disadvantages = false,
                "Disadvantages:" => in_disadvantages = true,
                _ => {}
            }
            let (Some(g), Some(bullet)) = (group, line.strip_prefix("- ")) else {
                continue;
            };
            let point = bullet
                .rfind(" (evidence:")
                .map(|i| &bullet[..i])
                .unwrap_or(bullet)
                .trim();
            let lower = point.to_lowercase();

            for (keys, opposing) in &themes {
                if in_disadvantages && opposing.iter().any(|o| lower.contains(o)) {
                    conflicts.push((g, point.to_string()));
                } else if !in_disadvantages && keys.iter().any(|k| lower.contains(k)) {
                    supports.push(point.to_string());
                }
            }
        }

        if let Some((g, _)) = conflicts.first() {
            let g = *g;
            let points: Vec<String> = conflicts
                .iter()
                .filter(|(cg, _)| *cg == g)
                .map(|(_, p)| p.clone())
                .collect();
            json!({
                "stance": "conflicts",
                "group": g.as_str(),
                "conflicting_points": points,
                "evidence": points.join("; "),
                "category": claim.category.as_str(),
                "reasoning": format!("[MOCK] Reviews report \"{}\" against the claim.", points[0]),
            })
        } else if !supports.is_empty() {
            json!({
                "stance": "supports",
                "conflicting_points": [],
                "evidence": supports.join("; "),
                "category": claim.category.as_str(),
                "reasoning": "[MOCK] Reviews confirm the claim.",
            })
        } else {
            json!({
                "stance": "neutral",
                "conflicting_points": [],
                "evidence": "",
                "reasoning": "[MOCK] Reviews do not address the claim.",
            })
        }
    }
}

impl Default for MockAiAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl AiPort for MockAiAdapter {
    async fn classify(&self, request: &ClassificationRequest) -> Result<String, DomainError> {
        info!(
            product_id = request.product_id,
            unit = %request.unit,
            csv_len = request.context_csv.len(),
            "[MOCK] Simulating AI classification"
        );

        // Simulate network delay
        tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;

        Ok(Self::classify_csv(&request.context_csv).to_string())
    }

    async fn compare(&self, claim: &MarketingClaim, evidence: &str) -> Result<String, DomainError> {
        info!(
            product_id = claim.product_id,
            claim_id = claim.id,
            evidence_len = evidence.len(),
            "[MOCK] Simulating AI claim comparison"
        );

        tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;

        Ok(Self::compare_digest(claim, evidence).to_string())
    }
}
