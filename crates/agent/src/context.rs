use tendero_core::config::AppConfig;
use tendero_core::domain::conversation::{ConversationEntry, Role};
use tendero_core::domain::product::ScoredProduct;

use crate::llm::ChatMessage;

/// Storefront identity and policy shared by the prompt and the canned replies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreProfile {
    pub store_name: String,
    pub assistant_name: String,
    /// Catalog fallback link; the only URL allowed besides retrieved products.
    pub storefront_url: String,
    pub contact_number: Option<String>,
    pub disclose_prices: bool,
}

impl StoreProfile {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            store_name: config.policy.store_name.clone(),
            assistant_name: config.policy.assistant_name.clone(),
            storefront_url: config.catalog.storefront_url.clone(),
            contact_number: config.policy.contact_number.clone(),
            disclose_prices: config.policy.disclose_prices,
        }
    }
}

impl Default for StoreProfile {
    fn default() -> Self {
        Self {
            store_name: "ASOFERRU Urabá".to_owned(),
            assistant_name: "Dayana".to_owned(),
            storefront_url: "https://asoferru.mitiendanube.com".to_owned(),
            contact_number: None,
            disclose_prices: false,
        }
    }
}

/// Builds the model input for the product-query branch.
#[derive(Clone, Debug, Default)]
pub struct ContextAssembler {
    profile: StoreProfile,
}

impl ContextAssembler {
    pub fn new(profile: StoreProfile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> &StoreProfile {
        &self.profile
    }

    /// Used verbatim as the context block when nothing was retrieved.
    pub fn fallback_sentence(&self) -> String {
        format!(
            "No se encontraron productos que coincidan con la consulta del cliente. \
             Indícale que puede revisar el catálogo completo en {} y ofrécele hablar con \
             un asesor humano escribiendo \"hablar con humano\".",
            self.profile.storefront_url
        )
    }

    pub fn context_block(&self, results: &[ScoredProduct]) -> String {
        if results.is_empty() {
            return self.fallback_sentence();
        }

        let entries =
            results.iter().map(|entry| self.render_product(entry)).collect::<Vec<_>>().join("\n\n");
        format!(
            "He encontrado estos productos que coinciden con la consulta del cliente:\n\n{entries}"
        )
    }

    fn render_product(&self, entry: &ScoredProduct) -> String {
        let product = &entry.product;
        let mut lines = vec![format!("Nombre: {}", product.name)];
        if !product.description.is_empty() {
            lines.push(format!("Descripción: {}", product.description));
        }
        if self.profile.disclose_prices {
            if let Some(price) = &product.price {
                lines.push(format!("Precio: {price}"));
            }
        }
        let link = if product.url.is_empty() {
            self.profile.storefront_url.as_str()
        } else {
            product.url.as_str()
        };
        lines.push(format!("Enlace para ver y comprar: {link}"));
        lines.join("\n")
    }

    pub fn system_prompt(&self) -> String {
        let profile = &self.profile;
        let price_rule = if profile.disclose_prices {
            "- Si el contexto incluye el precio de un producto, puedes mencionarlo tal como aparece. \
             Nunca inventes ni calcules precios."
                .to_owned()
        } else {
            "- NUNCA menciones el precio directamente. En su lugar, di 'Puedes ver el precio y más \
             detalles en el enlace del producto' y proporciona el enlace."
                .to_owned()
        };
        let escalation = match &profile.contact_number {
            Some(number) => format!(
                "- Si el cliente necesita atención personalizada, sugiérele que escriba \"hablar con \
                 humano\" o que contacte al vendedor al número {number}."
            ),
            None => "- Si el cliente necesita atención personalizada, sugiérele que escriba \
                     \"hablar con humano\"."
                .to_owned(),
        };

        [
            format!(
                "Eres {}, una vendedora cordial y enérgica de {}. Tu objetivo es asistir a los \
                 clientes, responder sus preguntas sobre productos y concretar ventas con \
                 entusiasmo y amabilidad.",
                profile.assistant_name, profile.store_name
            ),
            String::new(),
            "IMPORTANTE:".to_owned(),
            price_rule,
            "- SOLO puedes mencionar productos que se encuentren en el contexto de productos. \
             No inventes productos."
                .to_owned(),
            "- No inventes promociones, descuentos ni condiciones de venta.".to_owned(),
            format!(
                "- Si el cliente pregunta por un producto que no está en el contexto, dile que no \
                 lo tienes y remítelo a nuestra página web: {}",
                profile.storefront_url
            ),
            "- Cuando menciones un producto, comparte únicamente el enlace que aparece en el \
             contexto."
                .to_owned(),
            escalation,
            "- Mantén un tono profesional pero amigable.".to_owned(),
        ]
        .join("\n")
    }

    /// Model input: instructions, bounded history, context block, then the
    /// current user message.
    pub fn build_messages(
        &self,
        history: &[ConversationEntry],
        context_block: &str,
        user_message: &str,
    ) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(history.len() + 3);
        messages.push(ChatMessage::system(self.system_prompt()));
        messages.extend(history.iter().map(|entry| match entry.role {
            Role::User => ChatMessage::user(entry.content.clone()),
            Role::Assistant => ChatMessage::assistant(entry.content.clone()),
        }));
        messages.push(ChatMessage::system(format!(
            "Contexto de productos para esta consulta:\n{context_block}"
        )));
        messages.push(ChatMessage::user(user_message));
        messages
    }
}
