pub mod catalog;
pub mod config;
pub mod domain;
pub mod embedding;
pub mod errors;
pub mod flows;
pub mod outbound;
pub mod ranking;
pub mod text;

pub use catalog::{CatalogFeed, CatalogSnapshot, CatalogStore, Snapshot};
pub use domain::conversation::{ConversationEntry, Role};
pub use domain::message::{InboundMessage, MessageBody};
pub use domain::product::{Product, ProductKey, ScoredProduct};
pub use embedding::Embedder;
pub use errors::{ConfigurationMissing, DispatchError, FetchError, GenerationError};
pub use flows::{FlowAction, FlowEngine, Intent, IntentClassifier, Phase, TransitionOutcome};
pub use outbound::{MessageSender, OutboundMessage};
pub use ranking::{LexicalRanker, Ranker, RankingStrategy, SemanticRanker};
