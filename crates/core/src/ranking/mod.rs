//! Relevance ranking of catalog products against a free-text query.
//!
//! Both strategies share one contract: results are ordered by descending
//! score, ties keep catalog order, non-matching products are excluded rather
//! than ranked low, and at most `top_k` entries are returned.

pub mod lexical;
pub mod semantic;

use std::cmp::Ordering;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::catalog::CatalogSnapshot;
use crate::domain::product::ScoredProduct;

pub use lexical::LexicalRanker;
pub use semantic::{cosine_similarity, SemanticRanker, DEFAULT_SIMILARITY_THRESHOLD};

pub const DEFAULT_TOP_K: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingStrategy {
    Lexical,
    Semantic,
}

impl std::str::FromStr for RankingStrategy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "lexical" => Ok(Self::Lexical),
            "semantic" => Ok(Self::Semantic),
            other => {
                Err(format!("unsupported ranking strategy `{other}` (expected lexical|semantic)"))
            }
        }
    }
}

#[async_trait]
pub trait Ranker: Send + Sync {
    fn strategy(&self) -> RankingStrategy;

    /// Never fails: an unavailable scoring source yields an empty result.
    async fn rank(&self, query: &str, catalog: &CatalogSnapshot, top_k: usize)
        -> Vec<ScoredProduct>;
}

/// Stable descending sort followed by truncation.
fn order_and_truncate(mut scored: Vec<ScoredProduct>, top_k: usize) -> Vec<ScoredProduct> {
    scored.sort_by(|left, right| right.score.partial_cmp(&left.score).unwrap_or(Ordering::Equal));
    scored.truncate(top_k);
    scored
}
