use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::catalog::feed::CatalogFeed;
use crate::domain::product::Product;
use crate::embedding::Embedder;
use crate::errors::FetchError;

/// Immutable view of the catalog published by one successful refresh.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CatalogSnapshot {
    /// Zero before the first successful load, then incremented on every publish.
    pub version: u64,
    pub loaded_at: Option<DateTime<Utc>>,
    pub products: Vec<Product>,
    /// One vector per product, index-aligned with `products`. Present only when
    /// the store was built with an embedder.
    pub embeddings: Option<Vec<Vec<f32>>>,
}

impl CatalogSnapshot {
    pub fn new(products: Vec<Product>) -> Self {
        Self { version: 0, loaded_at: None, products, embeddings: None }
    }

    pub fn with_embeddings(mut self, embeddings: Vec<Vec<f32>>) -> Self {
        self.embeddings = Some(embeddings);
        self
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

pub type Snapshot = Arc<CatalogSnapshot>;

/// Holds the last good catalog snapshot and replaces it wholesale on refresh.
pub struct CatalogStore {
    feed: Box<dyn CatalogFeed>,
    embedder: Option<Arc<dyn Embedder>>,
    current: RwLock<Snapshot>,
    refresh_gate: Mutex<()>,
}

impl CatalogStore {
    pub fn new(feed: Box<dyn CatalogFeed>) -> Self {
        Self {
            feed,
            embedder: None,
            current: RwLock::new(Arc::new(CatalogSnapshot::default())),
            refresh_gate: Mutex::new(()),
        }
    }

    /// Precompute product embeddings on every refresh (semantic ranking).
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Last good snapshot; empty before the first successful load.
    pub fn current(&self) -> Snapshot {
        match self.current.read() {
            Ok(current) => Arc::clone(&current),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Fetches the feed and publishes a new snapshot.
    ///
    /// On any failure the previous snapshot stays in place and the error is returned.
    pub async fn refresh(&self) -> Result<Snapshot, FetchError> {
        let _gate = self.refresh_gate.lock().await;
        let source = self.feed.describe();

        match self.build_snapshot().await {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                self.publish(Arc::clone(&snapshot));
                info!(
                    event_name = "catalog.refresh.succeeded",
                    source = %source,
                    version = snapshot.version,
                    products = snapshot.len(),
                    embedded = snapshot.embeddings.is_some(),
                    "catalog snapshot published"
                );
                Ok(snapshot)
            }
            Err(error) => {
                let kept = self.current();
                warn!(
                    event_name = "catalog.refresh.failed",
                    source = %source,
                    error_kind = error.kind(),
                    error = %error,
                    kept_version = kept.version,
                    kept_products = kept.len(),
                    "catalog refresh failed; keeping previous snapshot"
                );
                Err(error)
            }
        }
    }

    async fn build_snapshot(&self) -> Result<CatalogSnapshot, FetchError> {
        let products = self.feed.fetch().await?;
        if products.is_empty() {
            return Err(FetchError::Empty);
        }

        let embeddings = match &self.embedder {
            Some(embedder) => {
                let mut vectors = Vec::with_capacity(products.len());
                for product in &products {
                    vectors.push(embedder.embed(&product.embedding_text()).await?);
                }
                Some(vectors)
            }
            None => None,
        };

        Ok(CatalogSnapshot {
            version: self.current().version + 1,
            loaded_at: Some(Utc::now()),
            products,
            embeddings,
        })
    }

    fn publish(&self, snapshot: Snapshot) {
        match self.current.write() {
            Ok(mut current) => *current = snapshot,
            Err(poisoned) => *poisoned.into_inner() = snapshot,
        }
    }
}
