use serde::{Deserialize, Serialize};

use crate::domain::message::MessageBody;
use crate::flows::states::{Intent, MenuOption, Phase};
use crate::text::{normalize, starts_with_word};

/// Phrase lists consulted by the intent rules. Matching is done on
/// case-folded, accent-stripped text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentPhrases {
    pub human_handoff: Vec<String>,
    pub payment: Vec<String>,
    pub greeting: Vec<String>,
    pub menu_request: Vec<String>,
    pub product_advisor: Vec<String>,
    pub payments_option: Vec<String>,
    pub shipping_option: Vec<String>,
}

impl Default for IntentPhrases {
    fn default() -> Self {
        let owned = |phrases: &[&str]| -> Vec<String> {
            phrases.iter().map(|phrase| normalize(phrase)).collect()
        };
        Self {
            human_handoff: owned(&[
                "hablar con humano",
                "hablar con persona",
                "hablar con alguien",
                "atencion humana",
                "atencion personal",
                "atender humano",
                "transferir",
                "conectar con",
                "hablar con vendedor",
                "vendedor humano",
                "persona real",
                "asesor humano",
                "quiero hablar",
                "necesito hablar",
                "conversar con",
            ]),
            payment: owned(&[
                "quiero pagar",
                "como pago",
                "como pagar",
                "pagar",
                "pago",
                "comprobante",
                "consignar",
                "consignacion",
                "transferencia",
            ]),
            greeting: owned(&["hola", "buenos dias", "buenas", "buenos", "que tal", "saludos"]),
            menu_request: owned(&["menu", "opciones", "volver al inicio"]),
            product_advisor: owned(&["asesor de productos", "asesor"]),
            payments_option: owned(&["medios de pago"]),
            shipping_option: owned(&["envio", "envios", "domicilio"]),
        }
    }
}

impl IntentPhrases {
    /// Re-normalizes phrases loaded from configuration.
    pub fn normalized(self) -> Self {
        let fold = |phrases: Vec<String>| -> Vec<String> {
            phrases
                .into_iter()
                .map(|phrase| normalize(phrase.trim()))
                .filter(|phrase| !phrase.is_empty())
                .collect()
        };
        Self {
            human_handoff: fold(self.human_handoff),
            payment: fold(self.payment),
            greeting: fold(self.greeting),
            menu_request: fold(self.menu_request),
            product_advisor: fold(self.product_advisor),
            payments_option: fold(self.payments_option),
            shipping_option: fold(self.shipping_option),
        }
    }
}

/// One entry of the prioritized rule list. Rules are evaluated in order and
/// the first match decides the intent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntentRule {
    UnsupportedMessage,
    ImageReceipt,
    HumanHandoff,
    PaymentIntent,
    MenuEntry,
    MenuSelection(MenuOption),
    ProductQuery,
}

pub const DEFAULT_RULES: &[IntentRule] = &[
    IntentRule::UnsupportedMessage,
    IntentRule::ImageReceipt,
    IntentRule::HumanHandoff,
    IntentRule::PaymentIntent,
    IntentRule::MenuEntry,
    IntentRule::MenuSelection(MenuOption::ProductAdvisor),
    IntentRule::MenuSelection(MenuOption::Payments),
    IntentRule::MenuSelection(MenuOption::Shipping),
    IntentRule::ProductQuery,
];

impl IntentRule {
    pub fn intent(&self) -> Intent {
        match self {
            Self::UnsupportedMessage => Intent::Unsupported,
            Self::ImageReceipt => Intent::ImageReceipt,
            Self::HumanHandoff => Intent::HumanHandoff,
            Self::PaymentIntent => Intent::Payment,
            Self::MenuEntry => Intent::MenuEntry,
            Self::MenuSelection(option) => Intent::MenuSelection(*option),
            Self::ProductQuery => Intent::ProductQuery,
        }
    }

    /// `text` is the normalized body for text messages and `None` otherwise.
    fn matches(
        &self,
        body: &MessageBody,
        text: Option<&str>,
        phase: Phase,
        phrases: &IntentPhrases,
    ) -> bool {
        match self {
            Self::UnsupportedMessage => matches!(body, MessageBody::Other { .. }),
            Self::ImageReceipt => matches!(body, MessageBody::Image { .. }),
            Self::HumanHandoff => {
                text.is_some_and(|text| contains_any(text, &phrases.human_handoff))
            }
            Self::PaymentIntent => text.is_some_and(|text| contains_any(text, &phrases.payment)),
            Self::MenuEntry => text.is_some_and(|text| {
                phase == Phase::New
                    || phrases.greeting.iter().any(|greeting| starts_with_word(text, greeting))
                    || contains_any(text, &phrases.menu_request)
            }),
            Self::MenuSelection(option) => {
                phase == Phase::Menu
                    && text.is_some_and(|text| selects_option(text, *option, phrases))
            }
            Self::ProductQuery => text.is_some(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct IntentClassifier {
    rules: Vec<IntentRule>,
    phrases: IntentPhrases,
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new(IntentPhrases::default())
    }
}

impl IntentClassifier {
    pub fn new(phrases: IntentPhrases) -> Self {
        Self { rules: DEFAULT_RULES.to_vec(), phrases }
    }

    pub fn rules(&self) -> &[IntentRule] {
        &self.rules
    }

    /// First matching rule wins. Media other than images and empty text
    /// classify as `Unsupported`.
    pub fn classify(&self, body: &MessageBody, phase: Phase) -> Intent {
        let normalized = body.text().map(|text| normalize(text.trim()));
        if normalized.as_deref() == Some("") {
            return Intent::Unsupported;
        }

        self.rules
            .iter()
            .find(|rule| rule.matches(body, normalized.as_deref(), phase, &self.phrases))
            .map(IntentRule::intent)
            .unwrap_or(Intent::Unsupported)
    }
}

fn contains_any(text: &str, phrases: &[String]) -> bool {
    phrases.iter().any(|phrase| text.contains(phrase.as_str()))
}

fn selects_option(text: &str, option: MenuOption, phrases: &IntentPhrases) -> bool {
    let digit = char::from(b'0' + option.number());
    let mut chars = text.chars();
    let numbered =
        chars.next() == Some(digit) && chars.next().map_or(true, |next| !next.is_ascii_digit());

    let keywords = match option {
        MenuOption::ProductAdvisor => &phrases.product_advisor,
        MenuOption::Payments => &phrases.payments_option,
        MenuOption::Shipping => &phrases.shipping_option,
    };
    numbered || contains_any(text, keywords)
}

#[cfg(test)]
mod tests {
    use super::{IntentClassifier, IntentPhrases, IntentRule, DEFAULT_RULES};
    use crate::domain::message::MessageBody;
    use crate::flows::states::{Intent, MenuOption, Phase};

    fn text(body: &str) -> MessageBody {
        MessageBody::Text(body.to_owned())
    }

    #[test]
    fn rule_order_is_fixed() {
        assert_eq!(DEFAULT_RULES.first(), Some(&IntentRule::UnsupportedMessage));
        assert_eq!(DEFAULT_RULES.last(), Some(&IntentRule::ProductQuery));
        assert_eq!(IntentClassifier::default().rules().len(), 9);
    }

    #[test]
    fn non_text_non_image_is_unsupported() {
        let classifier = IntentClassifier::default();
        let body = MessageBody::Other { kind: "sticker".to_owned() };
        assert_eq!(classifier.classify(&body, Phase::Menu), Intent::Unsupported);
        assert_eq!(classifier.classify(&text("   "), Phase::Menu), Intent::Unsupported);
    }

    #[test]
    fn image_is_a_receipt_in_every_phase() {
        let classifier = IntentClassifier::default();
        let body = MessageBody::Image { media_id: Some("m-1".to_owned()), caption: None };
        for phase in [Phase::New, Phase::Menu, Phase::AwaitingProductQuery] {
            assert_eq!(classifier.classify(&body, phase), Intent::ImageReceipt);
        }
    }

    #[test]
    fn handoff_beats_greeting_and_new_phase() {
        let classifier = IntentClassifier::default();
        assert_eq!(
            classifier.classify(&text("Hola, quiero HABLAR CON ALGUIEN"), Phase::New),
            Intent::HumanHandoff
        );
        assert_eq!(
            classifier.classify(&text("Atención humana por favor"), Phase::Menu),
            Intent::HumanHandoff
        );
    }

    #[test]
    fn payment_beats_menu_entry() {
        let classifier = IntentClassifier::default();
        assert_eq!(classifier.classify(&text("hola, cómo pago?"), Phase::New), Intent::Payment);
    }

    #[test]
    fn new_phase_greeting_and_menu_request_enter_menu() {
        let classifier = IntentClassifier::default();
        assert_eq!(classifier.classify(&text("taladro"), Phase::New), Intent::MenuEntry);
        assert_eq!(
            classifier.classify(&text("Buenas tardes"), Phase::AwaitingProductQuery),
            Intent::MenuEntry
        );
        assert_eq!(
            classifier.classify(&text("muéstrame el menú"), Phase::AwaitingProductQuery),
            Intent::MenuEntry
        );
        assert_eq!(
            classifier.classify(&text("holanda"), Phase::AwaitingProductQuery),
            Intent::ProductQuery
        );
        assert_eq!(
            classifier.classify(&text("Volver al inicio"), Phase::AwaitingProductQuery),
            Intent::MenuEntry
        );
    }

    #[test]
    fn product_names_containing_inicio_stay_product_queries() {
        let classifier = IntentClassifier::default();
        let query = text("cinta para tubería de inicio");
        assert_eq!(classifier.classify(&query, Phase::AwaitingProductQuery), Intent::ProductQuery);
    }

    #[test]
    fn menu_selections_only_apply_in_menu_phase() {
        let classifier = IntentClassifier::default();
        assert_eq!(
            classifier.classify(&text("1"), Phase::Menu),
            Intent::MenuSelection(MenuOption::ProductAdvisor)
        );
        assert_eq!(
            classifier.classify(&text("2."), Phase::Menu),
            Intent::MenuSelection(MenuOption::Payments)
        );
        assert_eq!(
            classifier.classify(&text("3) envíos"), Phase::Menu),
            Intent::MenuSelection(MenuOption::Shipping)
        );
        assert_eq!(classifier.classify(&text("12 brocas"), Phase::Menu), Intent::ProductQuery);
        assert_eq!(
            classifier.classify(&text("1"), Phase::AwaitingProductQuery),
            Intent::ProductQuery
        );
    }

    #[test]
    fn free_text_outside_intercepts_is_a_product_query() {
        let classifier = IntentClassifier::default();
        assert_eq!(
            classifier.classify(&text("necesito un respirador"), Phase::AwaitingProductQuery),
            Intent::ProductQuery
        );
        assert_eq!(
            classifier.classify(&text("necesito un respirador"), Phase::Menu),
            Intent::ProductQuery
        );
    }

    #[test]
    fn configured_phrases_are_normalized() {
        let phrases = IntentPhrases {
            human_handoff: vec!["  Hablar con MARÍA ".to_owned()],
            ..IntentPhrases::default()
        }
        .normalized();
        let classifier = IntentClassifier::new(phrases);

        assert_eq!(
            classifier.classify(&text("quiero hablar con maria"), Phase::Menu),
            Intent::HumanHandoff
        );
    }
}
