use async_trait::async_trait;

use crate::errors::FetchError;

/// Turns text into a fixed-length vector.
///
/// Called once per product while a catalog snapshot is built and once per
/// query by the semantic ranker. Implementations may be slow and may fail.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, FetchError>;
}
