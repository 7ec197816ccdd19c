//! Domain entities. Pure data structures for the core business.
//!
//! No HTTP/SQL types here; adapters map into these.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

/// A single customer review as scraped. Immutable input to grouping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: i64,
    pub product_id: i64,
    pub text: String,
    /// Star rating, expected in 1..=5. Validated by the grouper.
    pub rating: u8,
}

/// Catalog entry as listed for selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub review_count: usize,
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {} ({} reviews)", self.id, self.name, self.review_count)
    }
}

/// Rating bucket a review is classified under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SentimentGroup {
    #[serde(rename = "positive_5")]
    Positive5,
    #[serde(rename = "neutral_4_3")]
    Neutral43,
    #[serde(rename = "negative_2_1")]
    Negative21,
}

impl SentimentGroup {
    pub const ALL: [SentimentGroup; 3] = [Self::Positive5, Self::Neutral43, Self::Negative21];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive5 => "positive_5",
            Self::Neutral43 => "neutral_4_3",
            Self::Negative21 => "negative_2_1",
        }
    }

    /// Human-readable label used in prompts and reports.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Positive5 => "Positive reviews (5 stars)",
            Self::Neutral43 => "Neutral reviews (4-3 stars)",
            Self::Negative21 => "Negative reviews (2-1 stars)",
        }
    }

    /// Parses the wire name. Accepts the canonical names only.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "positive_5" => Some(Self::Positive5),
            "neutral_4_3" => Some(Self::Neutral43),
            "negative_2_1" => Some(Self::Negative21),
            _ => None,
        }
    }
}

impl fmt::Display for SentimentGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One advantage or disadvantage extracted from reviews.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insight {
    pub point: String,
    /// Ids of the reviews that mention this point.
    #[serde(default)]
    pub evidence: BTreeSet<i64>,
    #[serde(default)]
    pub details: String,
}

impl Insight {
    pub fn new(point: impl Into<String>) -> Self {
        Self {
            point: point.into(),
            evidence: BTreeSet::new(),
            details: String::new(),
        }
    }

    pub fn with_evidence(mut self, ids: impl IntoIterator<Item = i64>) -> Self {
        self.evidence.extend(ids);
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = details.into();
        self
    }
}

/// Structured output for one classified chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub group: SentimentGroup,
    pub advantages: Vec<Insight>,
    pub disadvantages: Vec<Insight>,
    pub summary: String,
}

/// Result of normalizing loosely-typed service output.
///
/// Callers must handle both arms; there is no implicit fallback to an empty value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome<T> {
    Parsed(T),
    Unparseable(String),
}

impl<T> ParseOutcome<T> {
    pub fn is_parsed(&self) -> bool {
        matches!(self, Self::Parsed(_))
    }
}

pub type ClassificationOutcome = ParseOutcome<ClassificationResult>;

/// A chunk or claim that did not produce usable evidence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitFailure {
    /// Unit label, e.g. `negative_2_1#3` for a chunk or `claim:17` for a claim.
    pub unit: String,
    /// `DomainError::kind()` of the failure.
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarningScope {
    Chunks,
    Claims,
}

/// Non-fatal signal of degraded confidence, attached to a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnalysisWarning {
    /// Some chunks or claims failed; the result is built from the rest.
    PartialAnalysis {
        scope: WarningScope,
        failed: usize,
        total: usize,
    },
    /// The run was cancelled; `unfinished` units never completed.
    Cancelled { unfinished: usize },
}

/// Letter grade for a 0–100 score. See `scoring::GRADE_TABLE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "A+")]
    APlus,
    #[serde(rename = "A")]
    A,
    #[serde(rename = "B+")]
    BPlus,
    #[serde(rename = "B")]
    B,
    #[serde(rename = "C+")]
    CPlus,
    #[serde(rename = "C")]
    C,
    #[serde(rename = "D")]
    D,
}

impl Grade {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::APlus => "A+",
            Self::A => "A",
            Self::BPlus => "B+",
            Self::B => "B",
            Self::CPlus => "C+",
            Self::C => "C",
            Self::D => "D",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "A+" => Some(Self::APlus),
            "A" => Some(Self::A),
            "B+" => Some(Self::BPlus),
            "B" => Some(Self::B),
            "C+" => Some(Self::CPlus),
            "C" => Some(Self::C),
            "D" => Some(Self::D),
            _ => None,
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final verdict on claim-vs-evidence alignment. Ordered `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustLevel {
    Low,
    Medium,
    High,
}

impl TrustLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for TrustLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contradiction severity. Ordered `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        })
    }
}

/// Merged evidence for one sentiment group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub group: SentimentGroup,
    /// Reviews in the group, classified or not.
    pub review_count: usize,
    /// Reviews that belong to successfully classified chunks.
    pub contributing_reviews: usize,
    pub chunks_total: usize,
    pub chunks_failed: usize,
    pub advantages: Vec<Insight>,
    pub disadvantages: Vec<Insight>,
    pub summary: String,
    /// Contributing reviews per star rating, index 0 = 1 star.
    pub rating_counts: [usize; 5],
}

impl GroupSummary {
    /// True when the group had reviews but none of its chunks were classified.
    pub fn is_failed(&self) -> bool {
        self.review_count > 0 && self.contributing_reviews == 0
    }
}

/// Output of one review-analysis run. Written once; newer runs supersede it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductAnalysis {
    pub run_id: Uuid,
    pub product_id: i64,
    pub analyzed_at: DateTime<Utc>,
    /// One entry per sentiment group, in `SentimentGroup::ALL` order.
    pub groups: Vec<GroupSummary>,
    /// 0–100.
    pub weighted_score: f64,
    pub grade: Grade,
    pub trust_level: TrustLevel,
    pub failures: Vec<UnitFailure>,
    pub warnings: Vec<AnalysisWarning>,
}

impl ProductAnalysis {
    pub fn group(&self, group: SentimentGroup) -> Option<&GroupSummary> {
        self.groups.iter().find(|g| g.group == group)
    }

    pub fn total_reviews(&self) -> usize {
        self.groups.iter().map(|g| g.review_count).sum()
    }

    pub fn chunks_total(&self) -> usize {
        self.groups.iter().map(|g| g.chunks_total).sum()
    }

    pub fn chunks_failed(&self) -> usize {
        self.groups.iter().map(|g| g.chunks_failed).sum()
    }

    pub fn is_partial(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn was_cancelled(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| matches!(w, AnalysisWarning::Cancelled { .. }))
    }
}

/// Kind of marketing statement extracted from product detail content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimCategory {
    Ingredient,
    Efficacy,
    Usage,
    Safety,
    Certification,
    General,
}

impl ClaimCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ingredient => "ingredient",
            Self::Efficacy => "efficacy",
            Self::Usage => "usage",
            Self::Safety => "safety",
            Self::Certification => "certification",
            Self::General => "general",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "ingredient" => Self::Ingredient,
            "efficacy" => Self::Efficacy,
            "usage" => Self::Usage,
            "safety" => Self::Safety,
            "certification" => Self::Certification,
            _ => Self::General,
        }
    }
}

/// Structured fact from the product's marketing material. Never mutated by the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketingClaim {
    pub id: i64,
    pub product_id: i64,
    pub category: ClaimCategory,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stance {
    Supports,
    Neutral,
    Conflicts,
}

/// Parsed judgement of one claim against the aggregated evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimVerdict {
    pub stance: Stance,
    /// Group whose evidence the verdict relies on.
    pub group: Option<SentimentGroup>,
    /// Insight points (as written in the evidence) that oppose the claim.
    pub conflicting_points: Vec<String>,
    pub evidence: String,
    pub category: Option<String>,
    /// Service-side estimate of the opposing share, used only as a fallback.
    pub opposing_share: Option<f64>,
    pub reasoning: String,
}

/// A detected conflict between a marketing claim and review evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contradiction {
    pub claim: MarketingClaim,
    /// Review excerpt or group summary opposing the claim.
    pub conflicting_evidence: String,
    pub group: SentimentGroup,
    pub category: String,
    pub severity: Severity,
    /// Share (0..=1) of the group's reviews expressing the opposing sentiment.
    pub opposing_share: f64,
    pub reasoning: String,
}

/// Output of one contradiction-analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContradictionReport {
    pub run_id: Uuid,
    pub product_id: i64,
    pub analysis_run_id: Uuid,
    pub analyzed_at: DateTime<Utc>,
    pub trust_level: TrustLevel,
    pub contradictions: Vec<Contradiction>,
    /// Claims the reviews support.
    pub consistency_points: Vec<String>,
    pub claims_total: usize,
    pub claims_failed: usize,
    /// Points deducted from the weighted score for contradictions.
    pub penalty: f64,
    pub final_score: f64,
    pub final_grade: Grade,
    /// One-paragraph verdict for the report.
    pub overall_assessment: String,
    pub failures: Vec<UnitFailure>,
    pub warnings: Vec<AnalysisWarning>,
}
