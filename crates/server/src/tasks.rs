use std::sync::Arc;
use std::time::{Duration, Instant};

use tendero_agent::conversation::ConversationStore;
use tendero_core::catalog::CatalogStore;
use tokio::task::JoinHandle;
use tracing::debug;

pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Loads the catalog once, then again every `interval` when one is configured.
/// Refresh failures are logged by the store and leave the last snapshot in place.
pub fn spawn_catalog_refresh(
    catalog: Arc<CatalogStore>,
    interval: Option<Duration>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let _ = catalog.refresh().await;

        let Some(period) = interval else {
            return;
        };
        let mut ticker = tokio::time::interval(period);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let _ = catalog.refresh().await;
        }
    })
}

pub fn spawn_conversation_sweep(
    conversations: Arc<ConversationStore>,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let evicted = conversations.sweep_idle_at(Instant::now()).await;
            debug!(event_name = "conversation.sweep.completed", evicted, "idle sweep finished");
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tendero_core::catalog::{CatalogStore, StaticCatalogFeed};
    use tendero_core::domain::product::Product;

    use super::spawn_catalog_refresh;

    #[tokio::test]
    async fn startup_refresh_runs_once_without_interval() {
        let catalog = Arc::new(CatalogStore::new(Box::new(StaticCatalogFeed::new(vec![Product {
            name: "Broca 3/8".to_owned(),
            description: String::new(),
            category: None,
            price: None,
            url: String::new(),
        }]))));

        spawn_catalog_refresh(Arc::clone(&catalog), None).await.expect("task completes");

        assert_eq!(catalog.current().version, 1);
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(catalog.current().version, 1);
    }
}
