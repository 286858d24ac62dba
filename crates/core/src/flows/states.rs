use serde::{Deserialize, Serialize};

/// Dialogue phase tracked per user.
///
/// Waiting for a payment receipt is not stored as its own phase: images are
/// treated as receipts in every phase.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    New,
    Menu,
    AwaitingProductQuery,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MenuOption {
    ProductAdvisor,
    Payments,
    Shipping,
}

impl MenuOption {
    pub fn number(&self) -> u8 {
        match self {
            Self::ProductAdvisor => 1,
            Self::Payments => 2,
            Self::Shipping => 3,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Unsupported,
    ImageReceipt,
    HumanHandoff,
    Payment,
    MenuEntry,
    MenuSelection(MenuOption),
    ProductQuery,
}

impl Intent {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Unsupported => "unsupported",
            Self::ImageReceipt => "image_receipt",
            Self::HumanHandoff => "human_handoff",
            Self::Payment => "payment",
            Self::MenuEntry => "menu_navigation",
            Self::MenuSelection(MenuOption::ProductAdvisor) => "menu_selection.product_advisor",
            Self::MenuSelection(MenuOption::Payments) => "menu_selection.payments",
            Self::MenuSelection(MenuOption::Shipping) => "menu_selection.shipping",
            Self::ProductQuery => "product_query",
        }
    }
}

/// Fixed user-facing replies the router can emit without the language model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CannedReply {
    ReceiptConfirmation,
    HumanTransfer,
    ReceiptRequest,
    Menu,
    ProductQueryPrompt,
    PaymentInstructions,
    ShippingHandoff,
}

/// Notifications addressed to the human-agent channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentNotice {
    PaymentReceipt,
    HumanHandoff,
    ShippingInquiry,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowAction {
    Reply(CannedReply),
    NotifyAgent(AgentNotice),
    AnswerProductQuery,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: Phase,
    pub to: Phase,
    pub intent: Intent,
    /// Side effects, in dispatch order. Empty means acknowledge only.
    pub actions: Vec<FlowAction>,
}
