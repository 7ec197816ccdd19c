//! AI classification client. Turns chunks and claims into typed results.
//!
//! Owns the retry policy and the response normalizer; the `AiPort` only moves text.

use crate::adapters::ai::reviews_to_csv;
use crate::domain::recovery::ResponseNormalizer;
use crate::domain::{
    Chunk, ClaimVerdict, ClassificationOutcome, ClassificationResult, DomainError, Insight,
    MarketingClaim, ParseOutcome, SentimentGroup, Stance,
};
use crate::ports::{AiPort, ClassificationRequest};
use crate::usecases::retry::RetryPolicy;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Review reference as the service writes it: `3`, `"3"`, `"review 3"`, `"[Review 3]"`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EvidenceRef {
    Id(i64),
    Text(String),
}

impl EvidenceRef {
    fn id(&self) -> Option<i64> {
        match self {
            Self::Id(id) => Some(*id),
            Self::Text(s) => {
                let digits: String = s
                    .chars()
                    .skip_while(|c| !c.is_ascii_digit())
                    .take_while(|c| c.is_ascii_digit())
                    .collect();
                digits.parse().ok()
            }
        }
    }
}

/// Insight as either a bare string or a `{point, evidence, details}` object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireInsight {
    Text(String),
    Full {
        #[serde(alias = "text", alias = "title")]
        point: String,
        #[serde(default)]
        evidence: Vec<EvidenceRef>,
        #[serde(default)]
        details: String,
    },
}

#[derive(Debug, Deserialize)]
struct WireClassification {
    advantages: Vec<WireInsight>,
    disadvantages: Vec<WireInsight>,
    #[serde(default)]
    summary: String,
}

#[derive(Debug, Deserialize)]
struct WireVerdict {
    stance: String,
    #[serde(default)]
    group: Option<String>,
    #[serde(default)]
    conflicting_points: Vec<String>,
    #[serde(default)]
    evidence: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    opposing_share: Option<f64>,
    #[serde(default)]
    reasoning: String,
}

fn parse_stance(s: &str) -> Option<Stance> {
    match s.trim().to_lowercase().as_str() {
        "supports" | "support" | "supported" | "consistent" => Some(Stance::Supports),
        "neutral" | "unclear" | "mixed" => Some(Stance::Neutral),
        "conflicts" | "conflict" | "contradicts" | "contradiction" => Some(Stance::Conflicts),
        _ => None,
    }
}

/// Convert wire insights, keeping only evidence ids that belong to `chunk`.
fn to_insights(items: Vec<WireInsight>, chunk: &Chunk) -> Vec<Insight> {
    items
        .into_iter()
        .filter_map(|item| {
            let (point, evidence, details) = match item {
                WireInsight::Text(point) => (point, Vec::new(), String::new()),
                WireInsight::Full {
                    point,
                    evidence,
                    details,
                } => (point, evidence, details),
            };
            let point = point.trim().to_string();
            if point.is_empty() {
                return None;
            }
            let ids: BTreeSet<i64> = evidence
                .iter()
                .filter_map(EvidenceRef::id)
                .filter(|id| chunk.contains_review(*id))
                .collect();
            Some(Insight::new(point).with_evidence(ids).with_details(details.trim()))
        })
        .collect()
}

/// Map a normalized chunk response into a `ClassificationOutcome`.
pub fn classification_outcome(raw: &str, chunk: &Chunk, normalizer: &ResponseNormalizer) -> ClassificationOutcome {
    match normalizer.normalize::<WireClassification>(raw) {
        ParseOutcome::Parsed(wire) => ParseOutcome::Parsed(ClassificationResult {
            group: chunk.group,
            advantages: to_insights(wire.advantages, chunk),
            disadvantages: to_insights(wire.disadvantages, chunk),
            summary: wire.summary.trim().to_string(),
        }),
        ParseOutcome::Unparseable(raw) => ParseOutcome::Unparseable(raw),
    }
}

/// Map a normalized comparison response into a verdict. Unknown stances are unparseable.
pub fn verdict_outcome(raw: &str, normalizer: &ResponseNormalizer) -> ParseOutcome<ClaimVerdict> {
    let wire = match normalizer.normalize::<WireVerdict>(raw) {
        ParseOutcome::Parsed(wire) => wire,
        ParseOutcome::Unparseable(raw) => return ParseOutcome::Unparseable(raw),
    };
    let Some(stance) = parse_stance(&wire.stance) else {
        return ParseOutcome::Unparseable(raw.to_string());
    };
    ParseOutcome::Parsed(ClaimVerdict {
        stance,
        group: wire.group.as_deref().and_then(SentimentGroup::parse),
        conflicting_points: wire
            .conflicting_points
            .into_iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect(),
        evidence: wire.evidence.trim().to_string(),
        category: wire.category.map(|c| c.trim().to_lowercase()).filter(|c| !c.is_empty()),
        opposing_share: wire.opposing_share.filter(|s| s.is_finite()),
        reasoning: wire.reasoning.trim().to_string(),
    })
}

/// Unit label of a claim in logs and failure records.
pub fn claim_unit(claim: &MarketingClaim) -> String {
    format!("claim:{}", claim.id)
}

/// Sends chunks and claims to the AI port with retry, then normalizes the answers.
pub struct ClassificationClient {
    ai: Arc<dyn AiPort>,
    retry: RetryPolicy,
    normalizer: ResponseNormalizer,
}

impl ClassificationClient {
    pub fn new(ai: Arc<dyn AiPort>, retry: RetryPolicy) -> Self {
        let normalizer = ResponseNormalizer::default();
        debug!(
            strategies = ?normalizer.strategy_names(),
            max_attempts = retry.max_attempts,
            "classification client ready"
        );
        Self {
            ai,
            retry,
            normalizer,
        }
    }

    /// Classify one chunk.
    ///
    /// # Errors
    /// - `ClassificationUnavailable` after retries are exhausted.
    /// - `MalformedResponse` when no recovery strategy yields the expected shape.
    /// - `Ai` for permanent service errors, `Cancelled` on cancellation.
    pub async fn classify_chunk(
        &self,
        product_id: i64,
        chunk: &Chunk,
        cancel: &CancellationToken,
    ) -> Result<ClassificationResult, DomainError> {
        let unit = chunk.label();
        let context_csv = reviews_to_csv(&chunk.reviews)
            .map_err(|e| DomainError::InvalidInput(format!("Failed to generate CSV: {}", e)))?;
        let request = ClassificationRequest {
            product_id,
            group: chunk.group,
            unit: unit.clone(),
            review_count: chunk.len(),
            context_csv,
        };

        let raw = self
            .retry
            .run(&unit, cancel, || self.ai.classify(&request))
            .await?;

        match classification_outcome(&raw, chunk, &self.normalizer) {
            ParseOutcome::Parsed(result) => {
                debug!(
                    unit = %unit,
                    advantages = result.advantages.len(),
                    disadvantages = result.disadvantages.len(),
                    "chunk classified"
                );
                Ok(result)
            }
            ParseOutcome::Unparseable(raw) => {
                warn!(unit = %unit, raw = %raw.chars().take(200).collect::<String>(), "unparseable classification");
                Err(DomainError::MalformedResponse { unit, raw })
            }
        }
    }

    /// Compare one claim against the evidence digest.
    ///
    /// # Errors
    /// Same as `classify_chunk`, scoped to the claim.
    pub async fn compare_claim(
        &self,
        claim: &MarketingClaim,
        evidence: &str,
        cancel: &CancellationToken,
    ) -> Result<ClaimVerdict, DomainError> {
        let unit = claim_unit(claim);
        let raw = self
            .retry
            .run(&unit, cancel, || self.ai.compare(claim, evidence))
            .await?;

        match verdict_outcome(&raw, &self.normalizer) {
            ParseOutcome::Parsed(verdict) => Ok(verdict),
            ParseOutcome::Unparseable(raw) => {
                warn!(unit = %unit, raw = %raw.chars().take(200).collect::<String>(), "unparseable verdict");
                Err(DomainError::MalformedResponse { unit, raw })
            }
        }
    }
}
