use std::sync::Arc;
use std::time::{Duration, Instant};

use tendero_agent::context::StoreProfile;
use tendero_agent::conversation::{ConversationLimits, ConversationStore};
use tendero_agent::llm::{OpenAiCompatibleChatModel, OpenAiCompatibleEmbedder};
use tendero_agent::runtime::AgentRuntime;
use tendero_core::catalog::{feed_for_source, CatalogStore};
use tendero_core::config::{AppConfig, ConfigError};
use tendero_core::embedding::Embedder;
use tendero_core::flows::{FlowEngine, IntentClassifier, StorefrontFlow};
use tendero_core::outbound::MessageSender;
use tendero_core::ranking::{LexicalRanker, Ranker, RankingStrategy, SemanticRanker};
use tendero_whatsapp::{CloudApiSender, DiagnosticSender};
use thiserror::Error;
use tracing::{info, warn};

use crate::routes::AppState;

pub struct Application {
    pub config: AppConfig,
    pub state: AppState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("reply guardrail patterns failed to compile: {0}")]
    Guardrail(#[from] regex::Error),
}

/// Wires the runtime from an already loaded configuration. The catalog starts
/// empty; the first refresh runs on the background task so the HTTP surface is
/// available immediately.
pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        ranking_strategy = ?config.ranking.strategy,
        catalog_source = %config.catalog.source,
        "starting application bootstrap"
    );
    report_missing_credentials(&config);

    let embedder = embedder_for(&config);
    let mut catalog = CatalogStore::new(feed_for_source(
        &config.catalog.source,
        config.catalog.delimiter_byte(),
        Duration::from_secs(config.catalog.timeout_secs),
    ));
    if let Some(embedder) = &embedder {
        catalog = catalog.with_embedder(Arc::clone(embedder));
    }
    let catalog = Arc::new(catalog);

    let ranker: Arc<dyn Ranker> = match embedder {
        Some(embedder) => Arc::new(
            SemanticRanker::new(embedder).with_threshold(config.ranking.similarity_threshold),
        ),
        None => Arc::new(LexicalRanker::new()),
    };

    let chat_model = OpenAiCompatibleChatModel::new(
        config.llm.base_url.clone(),
        config.llm.api_key.clone(),
        config.llm.model.clone(),
        Duration::from_secs(config.llm.timeout_secs),
    )
    .with_temperature(config.llm.temperature);

    let sender: Arc<dyn MessageSender> = Arc::new(DiagnosticSender::new(
        Arc::new(CloudApiSender::from_config(&config.whatsapp)),
        config.whatsapp.human_agent_number.clone(),
    ));

    let conversations = Arc::new(ConversationStore::new(ConversationLimits {
        history_limit: config.conversation.history_limit,
        idle_ttl: Duration::from_secs(config.conversation.idle_ttl_secs),
        max_users: config.conversation.max_users,
    }));

    let runtime = AgentRuntime::new(
        Arc::clone(&catalog),
        ranker,
        Arc::new(chat_model),
        sender,
        StoreProfile::from_config(&config),
    )?
    .with_flow(FlowEngine::new(StorefrontFlow, IntentClassifier::new(config.phrases.clone())))
    .with_conversations(conversations)
    .with_human_agent_number(config.whatsapp.human_agent_number.clone())
    .with_top_k(config.ranking.top_k);

    let state = AppState {
        runtime: Arc::new(runtime),
        catalog,
        verify_token: config.whatsapp.verify_token.clone(),
        admin_token: config.admin.token.clone(),
        started_at: Instant::now(),
    };

    info!(
        event_name = "system.bootstrap.completed",
        correlation_id = "bootstrap",
        "application wired"
    );
    Ok(Application { config, state })
}

fn embedder_for(config: &AppConfig) -> Option<Arc<dyn Embedder>> {
    if config.ranking.strategy != RankingStrategy::Semantic {
        return None;
    }
    // Validation guarantees a base URL for the semantic strategy.
    let base_url = config.embedding.base_url.clone()?;
    Some(Arc::new(OpenAiCompatibleEmbedder::new(
        base_url,
        config.embedding.api_key.clone(),
        config.embedding.model.clone(),
        Duration::from_secs(config.embedding.timeout_secs),
    )))
}

/// Absent credentials are not startup failures; the operations that need them
/// are skipped at use time. Say so once, loudly, at startup.
fn report_missing_credentials(config: &AppConfig) {
    let missing = [
        ("whatsapp.access_token", config.whatsapp.access_token.is_none()),
        ("whatsapp.phone_number_id", config.whatsapp.phone_number_id.is_none()),
        ("whatsapp.human_agent_number", config.whatsapp.human_agent_number.is_none()),
        ("llm.api_key", config.llm.api_key.is_none()),
    ];
    for (what, absent) in missing {
        if absent {
            warn!(
                event_name = "system.bootstrap.credential_missing",
                correlation_id = "bootstrap",
                missing = what,
                "credential not configured; dependent operations will be skipped"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use tendero_core::config::{AppConfig, ConfigOverrides, LoadOptions};
    use tendero_core::ranking::RankingStrategy;

    use crate::bootstrap::{bootstrap_with_config, Application, BootstrapError};

    fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
        bootstrap_with_config(AppConfig::load(options)?)
    }

    #[tokio::test]
    async fn bootstrap_succeeds_without_credentials_and_starts_with_empty_catalog() {
        let app = bootstrap(LoadOptions {
            config_path: Some("/nonexistent/tendero.toml".into()),
            overrides: ConfigOverrides {
                catalog_source: Some("/nonexistent/catalog.csv".to_owned()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .expect("missing credentials are not bootstrap failures");

        assert_eq!(app.state.catalog.current().version, 0);
        assert!(app.state.catalog.current().is_empty());
        assert!(app.state.admin_token.is_none());
    }

    #[test]
    fn semantic_strategy_without_embedding_endpoint_fails_fast() {
        let result = bootstrap(LoadOptions {
            config_path: Some("/nonexistent/tendero.toml".into()),
            overrides: ConfigOverrides {
                ranking_strategy: Some(RankingStrategy::Semantic),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        });

        let message = result.err().expect("validation error").to_string();
        assert!(message.contains("embedding"));
    }
}
