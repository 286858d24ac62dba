pub mod engine;
pub mod rules;
pub mod states;

pub use engine::{FlowDefinition, FlowEngine, StorefrontFlow};
pub use rules::{IntentClassifier, IntentPhrases, IntentRule, DEFAULT_RULES};
pub use states::{
    AgentNotice, CannedReply, FlowAction, Intent, MenuOption, Phase, TransitionOutcome,
};
