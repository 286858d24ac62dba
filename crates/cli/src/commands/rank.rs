use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tendero_agent::llm::OpenAiCompatibleEmbedder;
use tendero_core::catalog::{feed_for_source, CatalogStore};
use tendero_core::config::{AppConfig, ConfigOverrides, LoadOptions};
use tendero_core::ranking::{LexicalRanker, Ranker, RankingStrategy, SemanticRanker};

use super::{CommandResult, EXIT_CATALOG_FETCH, EXIT_CONFIG, EXIT_RUNTIME};

const COMMAND: &str = "rank";

#[derive(Debug, Serialize)]
struct RankOutcome {
    command: &'static str,
    status: &'static str,
    query: String,
    strategy: RankingStrategy,
    catalog_version: u64,
    results: Vec<RankedEntry>,
}

#[derive(Debug, Serialize)]
struct RankedEntry {
    name: String,
    url: String,
    category: Option<String>,
    score: f32,
}

/// Fetches the configured catalog once and prints what the ranker would hand
/// to the model for `query`.
pub fn run(query: &str, top_k: Option<usize>) -> CommandResult {
    let config = match AppConfig::load(LoadOptions {
        overrides: ConfigOverrides { top_k, ..ConfigOverrides::default() },
        ..LoadOptions::default()
    }) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "config_validation",
                format!("config validation failed: {error}"),
                EXIT_CONFIG,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                EXIT_RUNTIME,
            );
        }
    };

    runtime.block_on(rank(&config, query))
}

async fn rank(config: &AppConfig, query: &str) -> CommandResult {
    let mut catalog = CatalogStore::new(feed_for_source(
        &config.catalog.source,
        config.catalog.delimiter_byte(),
        Duration::from_secs(config.catalog.timeout_secs),
    ));

    let ranker: Arc<dyn Ranker> = match semantic_embedder(config) {
        Some(embedder) => {
            catalog = catalog.with_embedder(embedder.clone());
            Arc::new(
                SemanticRanker::new(embedder).with_threshold(config.ranking.similarity_threshold),
            )
        }
        None => Arc::new(LexicalRanker::new()),
    };

    let snapshot = match catalog.refresh().await {
        Ok(snapshot) => snapshot,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "catalog_fetch",
                format!("catalog fetch from {} failed: {error}", config.catalog.source),
                EXIT_CATALOG_FETCH,
            );
        }
    };

    let results = ranker
        .rank(query, &snapshot, config.ranking.top_k)
        .await
        .into_iter()
        .map(|scored| RankedEntry {
            name: scored.product.name,
            url: scored.product.url,
            category: scored.product.category,
            score: scored.score,
        })
        .collect();

    let outcome = RankOutcome {
        command: COMMAND,
        status: "ok",
        query: query.to_owned(),
        strategy: ranker.strategy(),
        catalog_version: snapshot.version,
        results,
    };
    CommandResult::report(&outcome)
}

fn semantic_embedder(config: &AppConfig) -> Option<Arc<OpenAiCompatibleEmbedder>> {
    if config.ranking.strategy != RankingStrategy::Semantic {
        return None;
    }
    let base_url = config.embedding.base_url.clone()?;
    Some(Arc::new(OpenAiCompatibleEmbedder::new(
        base_url,
        config.embedding.api_key.clone(),
        config.embedding.model.clone(),
        Duration::from_secs(config.embedding.timeout_secs),
    )))
}
