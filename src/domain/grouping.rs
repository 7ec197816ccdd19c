//! Sentiment grouping. Maps a star rating to its fixed bucket.

use crate::domain::{DomainError, Review, SentimentGroup};

/// Bucket for a rating: 5 → positive, 4/3 → neutral, 2/1 → negative.
pub fn group_for_rating(rating: u8) -> Result<SentimentGroup, DomainError> {
    match rating {
        5 => Ok(SentimentGroup::Positive5),
        3 | 4 => Ok(SentimentGroup::Neutral43),
        1 | 2 => Ok(SentimentGroup::Negative21),
        other => Err(DomainError::InvalidInput(format!(
            "rating {} is outside 1..=5",
            other
        ))),
    }
}

/// Reviews partitioned by sentiment group. Input order is kept within each group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupedReviews {
    pub positive: Vec<Review>,
    pub neutral: Vec<Review>,
    pub negative: Vec<Review>,
}

impl GroupedReviews {
    pub fn get(&self, group: SentimentGroup) -> &[Review] {
        match group {
            SentimentGroup::Positive5 => &self.positive,
            SentimentGroup::Neutral43 => &self.neutral,
            SentimentGroup::Negative21 => &self.negative,
        }
    }

    fn get_mut(&mut self, group: SentimentGroup) -> &mut Vec<Review> {
        match group {
            SentimentGroup::Positive5 => &mut self.positive,
            SentimentGroup::Neutral43 => &mut self.neutral,
            SentimentGroup::Negative21 => &mut self.negative,
        }
    }

    pub fn total(&self) -> usize {
        self.positive.len() + self.neutral.len() + self.negative.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SentimentGroup, &[Review])> {
        SentimentGroup::ALL.into_iter().map(move |g| (g, self.get(g)))
    }
}

/// Partition reviews into groups. Fails on the first out-of-range rating.
pub fn group_reviews(reviews: &[Review]) -> Result<GroupedReviews, DomainError> {
    let mut grouped = GroupedReviews::default();
    for review in reviews {
        let group = group_for_rating(review.rating).map_err(|_| {
            DomainError::InvalidInput(format!(
                "review {} has rating {} outside 1..=5",
                review.id, review.rating
            ))
        })?;
        grouped.get_mut(group).push(review.clone());
    }
    Ok(grouped)
}
