//! Dialogue runtime for the storefront assistant.
//!
//! A turn flows through:
//! 1. **Session** (`conversation`) - per-user phase and bounded history, serialized per user
//! 2. **Routing** - deterministic intent classification from `tendero-core` flows
//! 3. **Retrieval and prompting** (`context`) - ranked catalog entries turned into model input
//! 4. **Generation** (`llm`) - one call to an OpenAI-compatible chat endpoint
//! 5. **Guardrails** (`guardrails`) - price and link checks on the generated reply
//! 6. **Dispatch** (`runtime`) - canned replies, agent notices and answers sent out
//!
//! The model only phrases answers about retrieved products. Routing, menu
//! handling and handoffs never reach it.

pub mod context;
pub mod conversation;
pub mod guardrails;
pub mod llm;
pub mod replies;
pub mod runtime;

pub use context::{ContextAssembler, StoreProfile};
pub use conversation::{ConversationLimits, ConversationStore};
pub use llm::{ChatMessage, ChatModel, ChatRole, OpenAiCompatibleChatModel, OpenAiCompatibleEmbedder};
pub use runtime::{AgentRuntime, Audience, DispatchStatus, GenerationResult, TurnOutcome, TurnReport};
