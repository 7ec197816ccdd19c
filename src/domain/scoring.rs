//! Weighted score and grade lookup.
//!
//! Each contributing review adds `rating * w(rating)` to the numerator and `w(rating)` to
//! the denominator; the resulting 1–5 average is rescaled to 0–100. Ratings 1 and 2 carry
//! double weight.

use crate::domain::{GroupSummary, Grade};

/// Impact weight per star rating, index 0 = 1 star.
pub const RATING_WEIGHTS: [f64; 5] = [2.0, 2.0, 0.6, 0.8, 1.0];

/// Inclusive lower bounds, checked top-down. Anything below the last bound is `D`.
pub const GRADE_TABLE: [(f64, Grade); 6] = [
    (90.0, Grade::APlus),
    (80.0, Grade::A),
    (70.0, Grade::BPlus),
    (60.0, Grade::B),
    (50.0, Grade::CPlus),
    (40.0, Grade::C),
];

/// Contradiction penalties on the 100-point scale, with a total cap.
pub const PENALTY_HIGH: f64 = 16.0;
pub const PENALTY_MEDIUM: f64 = 8.0;
pub const PENALTY_LOW: f64 = 4.0;
pub const MAX_PENALTY: f64 = 50.0;

/// Grade for a 0–100 score.
pub fn grade_for(score: f64) -> Grade {
    GRADE_TABLE
        .iter()
        .find(|(bound, _)| score >= *bound)
        .map(|(_, grade)| *grade)
        .unwrap_or(Grade::D)
}

/// Running weighted sums. Addition is commutative so partial sums can merge in any order.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WeightedSums {
    pub weighted_ratings: f64,
    pub weights: f64,
}

impl WeightedSums {
    pub fn from_rating_counts(counts: &[usize; 5]) -> Self {
        let mut sums = Self::default();
        for (i, &count) in counts.iter().enumerate() {
            let rating = (i + 1) as f64;
            let w = RATING_WEIGHTS[i] * count as f64;
            sums.weighted_ratings += rating * w;
            sums.weights += w;
        }
        sums
    }

    pub fn add(self, other: Self) -> Self {
        Self {
            weighted_ratings: self.weighted_ratings + other.weighted_ratings,
            weights: self.weights + other.weights,
        }
    }

    /// Weighted average on the 1–5 scale, or `None` with no contributing reviews.
    pub fn average(&self) -> Option<f64> {
        (self.weights > 0.0).then(|| self.weighted_ratings / self.weights)
    }
}

/// Weighted 0–100 score across groups. Failed groups have no contributing reviews and
/// therefore add zero weight. Returns `None` when nothing contributed.
pub fn weighted_score(groups: &[GroupSummary]) -> Option<f64> {
    groups
        .iter()
        .map(|g| WeightedSums::from_rating_counts(&g.rating_counts))
        .fold(WeightedSums::default(), WeightedSums::add)
        .average()
        .map(to_100_scale)
}

pub fn to_100_scale(score_5: f64) -> f64 {
    (score_5 / 5.0) * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SentimentGroup;

    fn group(group: SentimentGroup, rating_counts: [usize; 5]) -> GroupSummary {
        let n = rating_counts.iter().sum();
        GroupSummary {
            group,
            review_count: n,
            contributing_reviews: n,
            chunks_total: 1,
            chunks_failed: 0,
            advantages: vec![],
            disadvantages: vec![],
            summary: String::new(),
            rating_counts,
        }
    }

    #[test]
    fn test_grade_examples() {
        assert_eq!(grade_for(85.0), Grade::A);
        assert_eq!(grade_for(55.0), Grade::CPlus);
        assert_eq!(grade_for(100.0), Grade::APlus);
        assert_eq!(grade_for(0.0), Grade::D);
    }

    #[test]
    fn test_grade_boundaries_are_inclusive() {
        assert_eq!(grade_for(90.0), Grade::APlus);
        assert_eq!(grade_for(89.999), Grade::A);
        assert_eq!(grade_for(70.0), Grade::BPlus);
        assert_eq!(grade_for(40.0), Grade::C);
        assert_eq!(grade_for(39.999), Grade::D);
    }

    #[test]
    fn test_all_five_star_scores_100() {
        let groups = [group(SentimentGroup::Positive5, [0, 0, 0, 0, 10])];
        assert!((weighted_score(&groups).unwrap() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_one_each_distribution() {
        let groups = [
            group(SentimentGroup::Positive5, [0, 0, 0, 0, 1]),
            group(SentimentGroup::Neutral43, [0, 0, 0, 1, 0]),
            group(SentimentGroup::Negative21, [1, 0, 0, 0, 0]),
        ];
        // (5*1.0 + 4*0.8 + 1*2.0) / (1.0 + 0.8 + 2.0) = 10.2 / 3.8
        let expected = 10.2 / 3.8 / 5.0 * 100.0;
        assert!((weighted_score(&groups).unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_negative_reviews_pull_harder() {
        let plain_mean = (5.0 * 3.0 + 1.0) / 4.0 / 5.0 * 100.0;
        let groups = [
            group(SentimentGroup::Positive5, [0, 0, 0, 0, 3]),
            group(SentimentGroup::Negative21, [1, 0, 0, 0, 0]),
        ];
        assert!(weighted_score(&groups).unwrap() < plain_mean);
    }

    #[test]
    fn test_no_contribution_has_no_score() {
        let mut failed = group(SentimentGroup::Negative21, [0, 0, 0, 0, 0]);
        failed.review_count = 4;
        assert_eq!(weighted_score(&[failed]), None);
        assert_eq!(weighted_score(&[]), None);
    }
}
