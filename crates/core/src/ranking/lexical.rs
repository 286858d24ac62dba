use async_trait::async_trait;

use crate::catalog::CatalogSnapshot;
use crate::domain::product::{Product, ScoredProduct};
use crate::ranking::{order_and_truncate, Ranker, RankingStrategy};
use crate::text::{normalize, query_tokens};

pub const NAME_WEIGHT: u32 = 10;
pub const CATEGORY_WEIGHT: u32 = 5;
pub const DESCRIPTION_WEIGHT: u32 = 2;

/// Weighted keyword overlap between the query and product fields.
#[derive(Clone, Copy, Debug, Default)]
pub struct LexicalRanker;

impl LexicalRanker {
    pub fn new() -> Self {
        Self
    }

    pub fn score(tokens: &[String], product: &Product) -> u32 {
        let name = normalize(&product.name);
        let category = product.category.as_deref().map(normalize).unwrap_or_default();
        let description = normalize(&product.description);

        tokens
            .iter()
            .map(|token| {
                let mut score = 0;
                if name.contains(token.as_str()) {
                    score += NAME_WEIGHT;
                }
                if category.contains(token.as_str()) {
                    score += CATEGORY_WEIGHT;
                }
                if description.contains(token.as_str()) {
                    score += DESCRIPTION_WEIGHT;
                }
                score
            })
            .sum()
    }

    pub fn rank_products(&self, query: &str, products: &[Product], top_k: usize) -> Vec<ScoredProduct> {
        let tokens = query_tokens(query);
        if tokens.is_empty() {
            return Vec::new();
        }

        let scored = products
            .iter()
            .filter_map(|product| {
                let score = Self::score(&tokens, product);
                (score > 0).then(|| ScoredProduct { product: product.clone(), score: score as f32 })
            })
            .collect::<Vec<_>>();

        order_and_truncate(scored, top_k)
    }
}

#[async_trait]
impl Ranker for LexicalRanker {
    fn strategy(&self) -> RankingStrategy {
        RankingStrategy::Lexical
    }

    async fn rank(
        &self,
        query: &str,
        catalog: &CatalogSnapshot,
        top_k: usize,
    ) -> Vec<ScoredProduct> {
        self.rank_products(query, &catalog.products, top_k)
    }
}
