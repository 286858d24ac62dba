use crate::domain::message::MessageBody;
use crate::flows::rules::IntentClassifier;
use crate::flows::states::{
    AgentNotice, CannedReply, FlowAction, Intent, MenuOption, Phase, TransitionOutcome,
};

pub trait FlowDefinition {
    fn initial_phase(&self) -> Phase;
    fn transition(&self, current: Phase, intent: Intent) -> TransitionOutcome;
}

/// Menu-driven storefront dialogue: greeting and menu keywords always reset
/// to the menu, free text falls through to the product-query branch.
#[derive(Clone, Debug, Default)]
pub struct StorefrontFlow;

impl FlowDefinition for StorefrontFlow {
    fn initial_phase(&self) -> Phase {
        Phase::New
    }

    fn transition(&self, current: Phase, intent: Intent) -> TransitionOutcome {
        transition_storefront(current, intent)
    }
}

pub struct FlowEngine<F> {
    flow: F,
    classifier: IntentClassifier,
}

impl<F> FlowEngine<F>
where
    F: FlowDefinition,
{
    pub fn new(flow: F, classifier: IntentClassifier) -> Self {
        Self { flow, classifier }
    }

    pub fn initial_phase(&self) -> Phase {
        self.flow.initial_phase()
    }

    pub fn classifier(&self) -> &IntentClassifier {
        &self.classifier
    }

    pub fn classify(&self, body: &MessageBody, phase: Phase) -> Intent {
        self.classifier.classify(body, phase)
    }

    /// Classifies `body` in `current` and returns the resulting transition.
    /// Pure: no side effects are performed here.
    pub fn apply(&self, current: Phase, body: &MessageBody) -> TransitionOutcome {
        let intent = self.classify(body, current);
        self.flow.transition(current, intent)
    }
}

impl Default for FlowEngine<StorefrontFlow> {
    fn default() -> Self {
        Self::new(StorefrontFlow, IntentClassifier::default())
    }
}

fn transition_storefront(current: Phase, intent: Intent) -> TransitionOutcome {
    use AgentNotice::{HumanHandoff, PaymentReceipt, ShippingInquiry};
    use CannedReply::{
        HumanTransfer, Menu, PaymentInstructions, ProductQueryPrompt, ReceiptConfirmation,
        ReceiptRequest, ShippingHandoff,
    };
    use FlowAction::{AnswerProductQuery, NotifyAgent, Reply};

    let (to, actions) = match intent {
        Intent::Unsupported => (current, Vec::new()),
        Intent::ImageReceipt => {
            (current, vec![NotifyAgent(PaymentReceipt), Reply(ReceiptConfirmation)])
        }
        Intent::HumanHandoff => (current, vec![Reply(HumanTransfer), NotifyAgent(HumanHandoff)]),
        Intent::Payment => (current, vec![Reply(ReceiptRequest)]),
        Intent::MenuEntry => (Phase::Menu, vec![Reply(Menu)]),
        Intent::MenuSelection(MenuOption::ProductAdvisor) => {
            (Phase::AwaitingProductQuery, vec![Reply(ProductQueryPrompt)])
        }
        Intent::MenuSelection(MenuOption::Payments) => (current, vec![Reply(PaymentInstructions)]),
        Intent::MenuSelection(MenuOption::Shipping) => {
            (current, vec![NotifyAgent(ShippingInquiry), Reply(ShippingHandoff)])
        }
        Intent::ProductQuery => (current, vec![AnswerProductQuery]),
    };

    TransitionOutcome { from: current, to, intent, actions }
}

#[cfg(test)]
mod tests {
    use crate::domain::message::MessageBody;
    use crate::flows::engine::{FlowDefinition, FlowEngine, StorefrontFlow};
    use crate::flows::states::{
        AgentNotice, CannedReply, FlowAction, Intent, MenuOption, Phase,
    };

    fn text(body: &str) -> MessageBody {
        MessageBody::Text(body.to_owned())
    }

    #[test]
    fn first_message_opens_the_menu() {
        let engine = FlowEngine::default();
        let outcome = engine.apply(engine.initial_phase(), &text("necesito un taladro"));

        assert_eq!(outcome.from, Phase::New);
        assert_eq!(outcome.to, Phase::Menu);
        assert_eq!(outcome.actions, vec![FlowAction::Reply(CannedReply::Menu)]);
    }

    #[test]
    fn advisor_option_then_query_reaches_the_product_branch() {
        let engine = FlowEngine::default();

        let selected = engine.apply(Phase::Menu, &text("1"));
        assert_eq!(selected.to, Phase::AwaitingProductQuery);
        assert_eq!(selected.actions, vec![FlowAction::Reply(CannedReply::ProductQueryPrompt)]);

        let query = engine.apply(selected.to, &text("necesito un respirador"));
        assert_eq!(query.intent, Intent::ProductQuery);
        assert_eq!(query.to, Phase::AwaitingProductQuery);
        assert_eq!(query.actions, vec![FlowAction::AnswerProductQuery]);
    }

    #[test]
    fn image_notifies_agent_before_confirming_and_keeps_phase() {
        let engine = FlowEngine::default();
        let body = MessageBody::Image { media_id: None, caption: None };

        let outcome = engine.apply(Phase::AwaitingProductQuery, &body);

        assert_eq!(outcome.to, Phase::AwaitingProductQuery);
        assert_eq!(
            outcome.actions,
            vec![
                FlowAction::NotifyAgent(AgentNotice::PaymentReceipt),
                FlowAction::Reply(CannedReply::ReceiptConfirmation),
            ]
        );
    }

    #[test]
    fn handoff_sends_transfer_then_notification() {
        let outcome = FlowEngine::default().apply(Phase::Menu, &text("hablar con alguien"));

        assert_eq!(outcome.to, Phase::Menu);
        assert_eq!(
            outcome.actions,
            vec![
                FlowAction::Reply(CannedReply::HumanTransfer),
                FlowAction::NotifyAgent(AgentNotice::HumanHandoff),
            ]
        );
    }

    #[test]
    fn shipping_option_escalates_without_phase_change() {
        let outcome = StorefrontFlow.transition(
            Phase::Menu,
            Intent::MenuSelection(MenuOption::Shipping),
        );

        assert_eq!(outcome.to, Phase::Menu);
        assert!(outcome.actions.contains(&FlowAction::NotifyAgent(AgentNotice::ShippingInquiry)));
    }

    #[test]
    fn unsupported_messages_only_acknowledge() {
        let body = MessageBody::Other { kind: "audio".to_owned() };
        let outcome = FlowEngine::default().apply(Phase::Menu, &body);

        assert_eq!(outcome.intent, Intent::Unsupported);
        assert!(outcome.actions.is_empty());
        assert_eq!(outcome.to, Phase::Menu);
    }

    #[test]
    fn replay_is_deterministic_for_same_message_sequence() {
        let engine = FlowEngine::default();
        let messages = [text("hola"), text("2"), text("menu"), text("1"), text("lija 120")];

        let run = |engine: &FlowEngine<StorefrontFlow>| {
            let mut phase = engine.initial_phase();
            let mut trace = Vec::new();
            for message in &messages {
                let outcome = engine.apply(phase, message);
                trace.push((outcome.intent, outcome.actions));
                phase = outcome.to;
            }
            (phase, trace)
        };

        let first = run(&engine);
        let second = run(&engine);

        assert_eq!(first, second);
        assert_eq!(first.0, Phase::AwaitingProductQuery);
    }
}
