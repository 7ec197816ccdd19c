//! Review analysis pipeline: fetch -> group -> chunk -> classify (concurrently) -> aggregate.
//!
//! Chunk failures are recorded in the accumulator and never abort sibling chunks.

use crate::domain::{
    AnalysisAccumulator, Chunk, ChunkPolicy, DomainError, ProductAnalysis, group_reviews,
};
use crate::ports::ReviewSource;
use crate::usecases::classification::ClassificationClient;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Runs one product's review analysis. Holds no per-run state.
pub struct ReviewAnalysisService {
    reviews: Arc<dyn ReviewSource>,
    client: Arc<ClassificationClient>,
    chunk_policy: ChunkPolicy,
    max_concurrency: usize,
    score_floor: f64,
}

impl ReviewAnalysisService {
    pub fn new(
        reviews: Arc<dyn ReviewSource>,
        client: Arc<ClassificationClient>,
        chunk_policy: ChunkPolicy,
        max_concurrency: usize,
        score_floor: f64,
    ) -> Self {
        Self {
            reviews,
            client,
            chunk_policy,
            max_concurrency: max_concurrency.max(1),
            score_floor,
        }
    }

    /// Analyze all reviews of a product.
    ///
    /// # Errors
    /// - `AnalysisFailed` when the product has no reviews or no chunk was classified.
    /// - `InvalidInput` for a rating outside 1..=5 or a bad chunk policy.
    /// - `Cancelled` when cancelled before any chunk was merged.
    pub async fn analyze(
        &self,
        product_id: i64,
        cancel: &CancellationToken,
    ) -> Result<ProductAnalysis, DomainError> {
        let reviews = self.reviews.fetch_reviews(product_id).await?;
        if reviews.is_empty() {
            return Err(DomainError::AnalysisFailed(format!(
                "product {} has no reviews",
                product_id
            )));
        }

        let grouped = group_reviews(&reviews)?;
        let mut accumulator = AnalysisAccumulator::new(product_id);
        let mut chunks: Vec<Chunk> = Vec::new();
        for (group, items) in grouped.iter() {
            let group_chunks: Vec<Chunk> = self.chunk_policy.chunk(group, items)?.collect();
            accumulator.register_group(group, items.len(), group_chunks.len());
            info!(
                product_id,
                group = %group,
                reviews = items.len(),
                chunks = group_chunks.len(),
                "group prepared"
            );
            chunks.extend(group_chunks);
        }

        info!(
            product_id,
            reviews = reviews.len(),
            chunks = chunks.len(),
            max_concurrency = self.max_concurrency,
            "classifying chunks"
        );

        let accumulator = Arc::new(Mutex::new(accumulator));
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks = JoinSet::new();
        let mut spawned: HashMap<tokio::task::Id, Chunk> = HashMap::new();

        for chunk in chunks {
            let client = Arc::clone(&self.client);
            let acc = Arc::clone(&accumulator);
            let sem = Arc::clone(&semaphore);
            let cancel = cancel.clone();
            let task_chunk = chunk.clone();

            let handle = tasks.spawn(async move {
                let chunk = task_chunk;
                let outcome = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(DomainError::Cancelled),
                    permit = sem.acquire_owned() => match permit {
                        Ok(_permit) => client.classify_chunk(product_id, &chunk, &cancel).await,
                        Err(_) => Err(DomainError::Cancelled),
                    },
                };

                let mut acc = acc.lock().await;
                match outcome {
                    Ok(result) => acc.merge(&chunk, result),
                    Err(e) => {
                        warn!(product_id, unit = %chunk.label(), error = %e, "chunk failed");
                        acc.record_failure(&chunk, &e);
                    }
                }
            });
            spawned.insert(handle.id(), chunk);
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(product_id, error = %e, "chunk task aborted");
                if let Some(chunk) = spawned.get(&e.id()) {
                    let failure = DomainError::AnalysisFailed(format!("chunk task aborted: {}", e));
                    accumulator.lock().await.record_failure(chunk, &failure);
                }
            }
        }

        let accumulator = Arc::try_unwrap(accumulator)
            .map_err(|_| DomainError::AnalysisFailed("chunk tasks still hold the accumulator".into()))?
            .into_inner();
        let analysis = accumulator.finish(self.score_floor)?;

        info!(
            product_id,
            run_id = %analysis.run_id,
            score = analysis.weighted_score,
            grade = %analysis.grade,
            trust = %analysis.trust_level,
            chunks_failed = analysis.chunks_failed(),
            chunks_total = analysis.chunks_total(),
            "review analysis complete"
        );
        Ok(analysis)
    }
}
