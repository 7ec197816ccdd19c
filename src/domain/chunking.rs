//! Review chunking. Splits a group's reviews into bounded batches for one LLM request each.
//!
//! Chunks are contiguous, non-overlapping and preserve input order. Every review lands
//! in exactly one chunk.

use crate::domain::{DomainError, Review, SentimentGroup};
use serde::{Deserialize, Serialize};

/// Default number of reviews per chunk for large groups.
pub const DEFAULT_BATCH_SIZE: usize = 80;

/// Groups with at most this many reviews are sent as a single chunk.
pub const DEFAULT_SINGLE_CHUNK_THRESHOLD: usize = 100;

/// A contiguous batch of one group's reviews.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub group: SentimentGroup,
    /// Position of the chunk within its group, starting at 0.
    pub index: usize,
    pub reviews: Vec<Review>,
}

impl Chunk {
    /// Unit label used in logs and failure records, e.g. `neutral_4_3#2`.
    pub fn label(&self) -> String {
        format!("{}#{}", self.group, self.index)
    }

    pub fn len(&self) -> usize {
        self.reviews.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reviews.is_empty()
    }

    pub fn contains_review(&self, id: i64) -> bool {
        self.reviews.iter().any(|r| r.id == id)
    }
}

/// Decides the per-chunk review limit for a group of a given size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkPolicy {
    /// Groups at or below this size go out as one chunk.
    pub single_chunk_threshold: usize,
    pub batch_size: usize,
    /// Optional character budget per chunk (review text only).
    pub max_chars: Option<usize>,
}

impl Default for ChunkPolicy {
    fn default() -> Self {
        Self {
            single_chunk_threshold: DEFAULT_SINGLE_CHUNK_THRESHOLD,
            batch_size: DEFAULT_BATCH_SIZE,
            max_chars: None,
        }
    }
}

impl ChunkPolicy {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.batch_size == 0 {
            return Err(DomainError::InvalidInput(
                "chunk batch size must be greater than 0".into(),
            ));
        }
        if self.max_chars == Some(0) {
            return Err(DomainError::InvalidInput(
                "chunk character budget must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Review limit for a group of `group_size` reviews.
    pub fn limit_for(&self, group_size: usize) -> usize {
        if group_size <= self.single_chunk_threshold {
            group_size.max(1)
        } else {
            self.batch_size
        }
    }

    /// Chunk one group according to this policy.
    pub fn chunk<'a>(
        &self,
        group: SentimentGroup,
        reviews: &'a [Review],
    ) -> Result<Chunks<'a>, DomainError> {
        self.validate()?;
        let chunks = chunk_reviews(group, reviews, self.limit_for(reviews.len()))?;
        Ok(match self.max_chars {
            Some(budget) => chunks.with_char_budget(budget),
            None => chunks,
        })
    }
}

/// Lazy chunk sequence over a borrowed review slice.
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    group: SentimentGroup,
    reviews: &'a [Review],
    limit: usize,
    max_chars: Option<usize>,
    pos: usize,
    index: usize,
}

impl<'a> Chunks<'a> {
    /// Additionally close a chunk before its review text would exceed `budget` characters.
    /// A single review larger than the budget still forms its own chunk.
    pub fn with_char_budget(mut self, budget: usize) -> Self {
        self.max_chars = Some(budget);
        self
    }
}

impl Iterator for Chunks<'_> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.pos >= self.reviews.len() {
            return None;
        }

        let start = self.pos;
        let mut end = start;
        let mut chars = 0usize;
        while end < self.reviews.len() && end - start < self.limit {
            let len = self.reviews[end].text.chars().count();
            if let Some(budget) = self.max_chars {
                if end > start && chars + len > budget {
                    break;
                }
            }
            chars += len;
            end += 1;
        }

        self.pos = end;
        let chunk = Chunk {
            group: self.group,
            index: self.index,
            reviews: self.reviews[start..end].to_vec(),
        };
        self.index += 1;
        Some(chunk)
    }
}

/// Split `reviews` into chunks of at most `limit` reviews.
///
/// # Errors
/// `InvalidInput` when `limit` is 0.
pub fn chunk_reviews(
    group: SentimentGroup,
    reviews: &[Review],
    limit: usize,
) -> Result<Chunks<'_>, DomainError> {
    if limit == 0 {
        return Err(DomainError::InvalidInput(
            "chunk limit must be greater than 0".into(),
        ));
    }
    Ok(Chunks {
        group,
        reviews,
        limit,
        max_chars: None,
        pos: 0,
        index: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reviews(n: usize) -> Vec<Review> {
        (0..n)
            .map(|i| Review {
                id: i as i64,
                product_id: 7,
                text: format!("review text {}", i),
                rating: 5,
            })
            .collect()
    }

    #[test]
    fn test_chunk_reviews_preserves_every_review_in_order() {
        for (n, limit) in [(0usize, 3usize), (1, 80), (79, 80), (80, 80), (81, 80), (250, 80), (10, 3)] {
            let input = reviews(n);
            let chunks: Vec<Chunk> = chunk_reviews(SentimentGroup::Positive5, &input, limit)
                .unwrap()
                .collect();

            assert_eq!(chunks.len(), n.div_ceil(limit), "n={} limit={}", n, limit);
            assert!(chunks.iter().all(|c| c.len() <= limit && !c.is_empty()));

            let flattened: Vec<Review> = chunks.into_iter().flat_map(|c| c.reviews).collect();
            assert_eq!(flattened, input);
        }
    }

    #[test]
    fn test_chunk_indices_are_sequential() {
        let input = reviews(10);
        let indices: Vec<usize> = chunk_reviews(SentimentGroup::Neutral43, &input, 4)
            .unwrap()
            .map(|c| c.index)
            .collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_small_group_yields_single_chunk() {
        let input = reviews(5);
        let chunks: Vec<Chunk> = chunk_reviews(SentimentGroup::Negative21, &input, 80)
            .unwrap()
            .collect();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].label(), "negative_2_1#0");
    }

    #[test]
    fn test_zero_limit_is_invalid() {
        let input = reviews(3);
        assert!(matches!(
            chunk_reviews(SentimentGroup::Positive5, &input, 0),
            Err(DomainError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_char_budget_splits_early() {
        let input: Vec<Review> = (0..6)
            .map(|i| Review {
                id: i,
                product_id: 1,
                text: "x".repeat(40),
                rating: 1,
            })
            .collect();
        let chunks: Vec<Chunk> = chunk_reviews(SentimentGroup::Negative21, &input, 80)
            .unwrap()
            .with_char_budget(100)
            .collect();
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.len() == 2));
    }

    #[test]
    fn test_oversized_review_forms_own_chunk() {
        let mut input = reviews(2);
        input[0].text = "y".repeat(500);
        let chunks: Vec<Chunk> = chunk_reviews(SentimentGroup::Positive5, &input, 80)
            .unwrap()
            .with_char_budget(100)
            .collect();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].reviews[0].id, 0);
    }

    #[test]
    fn test_policy_threshold() {
        let policy = ChunkPolicy::default();
        assert_eq!(policy.limit_for(100), 100);
        assert_eq!(policy.limit_for(101), 80);
        assert_eq!(policy.limit_for(0), 1);

        let input = reviews(250);
        let chunks: Vec<Chunk> = policy
            .chunk(SentimentGroup::Positive5, &input)
            .unwrap()
            .collect();
        assert_eq!(chunks.len(), 4);
    }

    #[test]
    fn test_policy_rejects_zero_batch() {
        let policy = ChunkPolicy {
            batch_size: 0,
            ..ChunkPolicy::default()
        };
        let input = reviews(3);
        assert!(policy.chunk(SentimentGroup::Positive5, &input).is_err());
    }
}
