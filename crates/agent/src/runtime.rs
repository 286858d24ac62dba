use std::sync::Arc;

use chrono::Utc;
use tendero_core::catalog::CatalogStore;
use tendero_core::domain::conversation::ConversationEntry;
use tendero_core::domain::message::InboundMessage;
use tendero_core::errors::GenerationError;
use tendero_core::flows::{
    AgentNotice, FlowAction, FlowEngine, Intent, Phase, StorefrontFlow,
};
use tendero_core::outbound::{MessageSender, OutboundMessage};
use tendero_core::ranking::{Ranker, DEFAULT_TOP_K};
use tracing::{error, info, warn};

use crate::context::{ContextAssembler, StoreProfile};
use crate::conversation::{ConversationSession, ConversationStore};
use crate::guardrails::{GuardrailFinding, ReplyGuardrail};
use crate::llm::ChatModel;
use crate::replies::{ReplyTemplates, APOLOGY};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Audience {
    User,
    HumanAgent,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchStatus {
    Delivered,
    Failed,
    /// Not attempted because the recipient is not configured.
    Skipped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DispatchRecord {
    pub audience: Audience,
    pub status: DispatchStatus,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GenerationResult {
    Replied { findings: Vec<GuardrailFinding> },
    /// The model returned no content; the fixed apology was sent instead.
    Apology,
    /// The call failed; nothing was appended or sent.
    Failed { reason: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnReport {
    pub intent: Intent,
    pub from: Phase,
    pub to: Phase,
    pub dispatched: Vec<DispatchRecord>,
    pub generation: Option<GenerationResult>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The platform redelivered a message that was already handled.
    Duplicate,
    Completed(TurnReport),
}

/// Processes one inbound message end to end: classify, update phase, run the
/// product-query branch when needed and dispatch every resulting message.
///
/// No error escapes a turn. Failures are logged and reflected in the
/// returned [`TurnReport`].
pub struct AgentRuntime {
    flow: FlowEngine<StorefrontFlow>,
    conversations: Arc<ConversationStore>,
    catalog: Arc<CatalogStore>,
    ranker: Arc<dyn Ranker>,
    chat_model: Arc<dyn ChatModel>,
    sender: Arc<dyn MessageSender>,
    assembler: ContextAssembler,
    guardrail: ReplyGuardrail,
    templates: ReplyTemplates,
    human_agent_number: Option<String>,
    top_k: usize,
}

impl AgentRuntime {
    pub fn new(
        catalog: Arc<CatalogStore>,
        ranker: Arc<dyn Ranker>,
        chat_model: Arc<dyn ChatModel>,
        sender: Arc<dyn MessageSender>,
        profile: StoreProfile,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            flow: FlowEngine::default(),
            conversations: Arc::new(ConversationStore::default()),
            catalog,
            ranker,
            chat_model,
            sender,
            guardrail: ReplyGuardrail::new(&profile)?,
            assembler: ContextAssembler::new(profile.clone()),
            templates: ReplyTemplates::new(profile),
            human_agent_number: None,
            top_k: DEFAULT_TOP_K,
        })
    }

    pub fn with_flow(mut self, flow: FlowEngine<StorefrontFlow>) -> Self {
        self.flow = flow;
        self
    }

    pub fn with_conversations(mut self, conversations: Arc<ConversationStore>) -> Self {
        self.conversations = conversations;
        self
    }

    pub fn with_human_agent_number(mut self, number: Option<String>) -> Self {
        self.human_agent_number = number.filter(|number| !number.trim().is_empty());
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    pub fn conversations(&self) -> &Arc<ConversationStore> {
        &self.conversations
    }

    pub fn catalog(&self) -> &Arc<CatalogStore> {
        &self.catalog
    }

    pub async fn handle_message(&self, message: InboundMessage) -> TurnOutcome {
        let mut session = self.conversations.session(&message.sender).await;
        if !session.remember_message(&message.message_id) {
            info!(
                event_name = "ingress.message.duplicate",
                correlation_id = %message.message_id,
                user_id = %message.sender,
                "redelivered message ignored"
            );
            return TurnOutcome::Duplicate;
        }

        let from = session.phase();
        let transition = self.flow.apply(from, &message.body);
        info!(
            event_name = "router.intent_classified",
            correlation_id = %message.message_id,
            user_id = %message.sender,
            message_kind = message.body.kind(),
            intent = transition.intent.label(),
            from = ?transition.from,
            to = ?transition.to,
            "inbound message classified"
        );

        let mut report = TurnReport {
            intent: transition.intent,
            from,
            to: transition.to,
            dispatched: Vec::new(),
            generation: None,
        };

        for action in &transition.actions {
            match action {
                FlowAction::Reply(reply) => {
                    let text = self.templates.canned(*reply);
                    report.dispatched.push(self.send_to_user(&message, text).await);
                }
                FlowAction::NotifyAgent(notice) => {
                    report.dispatched.push(self.notify_agent(*notice, &message).await);
                }
                FlowAction::AnswerProductQuery => {
                    let generation =
                        self.answer_product_query(&mut session, &message, &mut report).await;
                    report.generation = Some(generation);
                }
            }
        }

        session.set_phase(transition.to);
        TurnOutcome::Completed(report)
    }

    async fn answer_product_query(
        &self,
        session: &mut ConversationSession,
        message: &InboundMessage,
        report: &mut TurnReport,
    ) -> GenerationResult {
        let query = message.body.text().unwrap_or_default();
        let snapshot = self.catalog.current();
        let results = self.ranker.rank(query, &snapshot, self.top_k).await;
        info!(
            event_name = "ranking.completed",
            correlation_id = %message.message_id,
            user_id = %message.sender,
            strategy = ?self.ranker.strategy(),
            catalog_version = snapshot.version,
            results = results.len(),
            "catalog ranked for product query"
        );

        let context_block = self.assembler.context_block(&results);
        let model_input = self.assembler.build_messages(session.history(), &context_block, query);

        let generated = match self.chat_model.complete(&model_input).await {
            Ok(generated) => generated,
            Err(generation_error) => {
                log_generation_failure(message, &generation_error);
                return GenerationResult::Failed { reason: generation_error.to_string() };
            }
        };

        let (reply, result) = match generated {
            None => {
                warn!(
                    event_name = "generation.empty",
                    correlation_id = %message.message_id,
                    user_id = %message.sender,
                    "model returned no content; sending apology"
                );
                (APOLOGY.to_owned(), GenerationResult::Apology)
            }
            Some(text) => {
                let allowed_urls =
                    results.iter().map(|entry| entry.product.url.as_str()).collect::<Vec<_>>();
                let checked = self.guardrail.apply(&text, &allowed_urls);
                if !checked.is_clean() {
                    let reasons = checked
                        .findings
                        .iter()
                        .map(GuardrailFinding::reason_code)
                        .collect::<Vec<_>>()
                        .join(",");
                    warn!(
                        event_name = "guardrail.reply_rewritten",
                        correlation_id = %message.message_id,
                        user_id = %message.sender,
                        reasons = %reasons,
                        "generated reply rewritten before dispatch"
                    );
                }
                (checked.text, GenerationResult::Replied { findings: checked.findings })
            }
        };

        session.append_turn(ConversationEntry::user(query), ConversationEntry::assistant(&reply));
        report.dispatched.push(self.send_to_user(message, reply).await);
        result
    }

    async fn send_to_user(&self, message: &InboundMessage, text: String) -> DispatchRecord {
        let outbound = OutboundMessage::new(&message.sender, text)
            .from_business_number(message.business_number_id.clone());
        let status = self.dispatch(message, &outbound).await;
        DispatchRecord { audience: Audience::User, status }
    }

    async fn notify_agent(&self, notice: AgentNotice, message: &InboundMessage) -> DispatchRecord {
        let Some(agent_number) = self.human_agent_number.as_deref() else {
            error!(
                event_name = "dispatch.agent_number_missing",
                correlation_id = %message.message_id,
                user_id = %message.sender,
                notice = ?notice,
                "human agent number is not configured; agent notification skipped"
            );
            return DispatchRecord { audience: Audience::HumanAgent, status: DispatchStatus::Skipped };
        };

        let text = self.templates.agent_notice(notice, message, Utc::now());
        let outbound = OutboundMessage::new(agent_number, text)
            .from_business_number(message.business_number_id.clone());
        let status = self.dispatch(message, &outbound).await;
        DispatchRecord { audience: Audience::HumanAgent, status }
    }

    async fn dispatch(&self, message: &InboundMessage, outbound: &OutboundMessage) -> DispatchStatus {
        match self.sender.send(outbound).await {
            Ok(()) => DispatchStatus::Delivered,
            Err(dispatch_error) => {
                warn!(
                    event_name = "dispatch.send_failed",
                    correlation_id = %message.message_id,
                    user_id = %message.sender,
                    recipient = %outbound.recipient,
                    error = %dispatch_error,
                    "outbound message was not delivered"
                );
                DispatchStatus::Failed
            }
        }
    }
}

fn log_generation_failure(message: &InboundMessage, generation_error: &GenerationError) {
    match generation_error {
        GenerationError::ConfigurationMissing(missing) => error!(
            event_name = "generation.configuration_missing",
            correlation_id = %message.message_id,
            user_id = %message.sender,
            missing = missing.what,
            "generation skipped; no reply sent"
        ),
        other => warn!(
            event_name = "generation.failed",
            correlation_id = %message.message_id,
            user_id = %message.sender,
            error = %other,
            "generation failed; no reply sent and history left untouched"
        ),
    }
}
