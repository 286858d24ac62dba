use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::catalog::CatalogSnapshot;
use crate::domain::product::ScoredProduct;
use crate::embedding::Embedder;
use crate::ranking::{order_and_truncate, Ranker, RankingStrategy};

pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.35;

/// Cosine similarity; zero when either vector has zero norm or lengths differ.
pub fn cosine_similarity(left: &[f32], right: &[f32]) -> f32 {
    if left.len() != right.len() || left.is_empty() {
        return 0.0;
    }

    let dot = left.iter().zip(right).map(|(a, b)| a * b).sum::<f32>();
    let left_norm = left.iter().map(|value| value * value).sum::<f32>().sqrt();
    let right_norm = right.iter().map(|value| value * value).sum::<f32>().sqrt();

    if left_norm == 0.0 || right_norm == 0.0 {
        return 0.0;
    }
    dot / (left_norm * right_norm)
}

/// Embedding similarity against vectors precomputed at catalog load.
pub struct SemanticRanker {
    embedder: Arc<dyn Embedder>,
    threshold: f32,
}

impl SemanticRanker {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder, threshold: DEFAULT_SIMILARITY_THRESHOLD }
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }
}

#[async_trait]
impl Ranker for SemanticRanker {
    fn strategy(&self) -> RankingStrategy {
        RankingStrategy::Semantic
    }

    async fn rank(
        &self,
        query: &str,
        catalog: &CatalogSnapshot,
        top_k: usize,
    ) -> Vec<ScoredProduct> {
        if catalog.is_empty() {
            return Vec::new();
        }
        let Some(embeddings) = catalog.embeddings.as_ref() else {
            warn!(
                event_name = "ranking.semantic.missing_embeddings",
                catalog_version = catalog.version,
                "catalog snapshot carries no embeddings; semantic ranking skipped"
            );
            return Vec::new();
        };

        let query_vector = match self.embedder.embed(query).await {
            Ok(vector) => vector,
            Err(error) => {
                warn!(
                    event_name = "ranking.semantic.query_embedding_failed",
                    error = %error,
                    "query embedding failed; treating as no relevant products"
                );
                return Vec::new();
            }
        };

        let scored = catalog
            .products
            .iter()
            .zip(embeddings)
            .filter_map(|(product, vector)| {
                let similarity = cosine_similarity(&query_vector, vector);
                (similarity > self.threshold)
                    .then(|| ScoredProduct { product: product.clone(), score: similarity })
            })
            .collect::<Vec<_>>();

        order_and_truncate(scored, top_k)
    }
}
