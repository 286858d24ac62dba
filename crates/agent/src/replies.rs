use chrono::{DateTime, Utc};
use tendero_core::domain::message::{InboundMessage, MessageBody};
use tendero_core::flows::{AgentNotice, CannedReply};

use crate::context::StoreProfile;

/// Sent when the model answers with no content.
pub const APOLOGY: &str = "Lo siento, no pude generar una respuesta.";

/// Fixed texts for the branches that never call the language model.
#[derive(Clone, Debug, Default)]
pub struct ReplyTemplates {
    profile: StoreProfile,
}

impl ReplyTemplates {
    pub fn new(profile: StoreProfile) -> Self {
        Self { profile }
    }

    pub fn canned(&self, reply: CannedReply) -> String {
        let StoreProfile { store_name, assistant_name, storefront_url, .. } = &self.profile;
        match reply {
            CannedReply::ReceiptConfirmation => format!(
                "¡Gracias! Recibimos tu comprobante de pago. Un asesor de {store_name} lo \
                 verificará y te confirmará en breve. ✅"
            ),
            CannedReply::HumanTransfer => format!(
                "¡Por supuesto! Te voy a conectar con nuestro asesor humano. En un momento te \
                 contactará directamente.\n\nMientras tanto, puedes seguir explorando nuestros \
                 productos en: {storefront_url}\n\n¡Gracias por contactar {store_name}! 🛠️"
            ),
            CannedReply::ReceiptRequest => "Para procesar tu pago, por favor envíanos una foto \
                 del comprobante por este chat. 📎"
                .to_owned(),
            CannedReply::Menu => format!(
                "¡Hola! Soy {assistant_name}, de {store_name}. 🛠️\n\n¿En qué te puedo ayudar \
                 hoy? Responde con el número de la opción:\n\n1. Asesor de productos\n\
                 2. Medios de pago\n3. Envíos y domicilios\n\nEn cualquier momento puedes \
                 escribir \"hablar con humano\" para hablar con un asesor."
            ),
            CannedReply::ProductQueryPrompt => "¡Perfecto! Cuéntame qué producto estás buscando \
                 y te ayudo a encontrarlo. 🔎"
                .to_owned(),
            CannedReply::PaymentInstructions => format!(
                "Puedes pagar directamente en nuestra tienda en línea: {storefront_url}\n\n\
                 Si realizas una transferencia o consignación, envíanos la foto del comprobante \
                 por este chat para confirmarlo."
            ),
            CannedReply::ShippingHandoff => "Un asesor te contactará en breve para coordinar el \
                 envío o domicilio de tu pedido. 🚚"
                .to_owned(),
        }
    }

    /// Notification for the human-agent channel. Always carries the sender
    /// identity, the raw inbound message and the time it was handled.
    pub fn agent_notice(
        &self,
        notice: AgentNotice,
        message: &InboundMessage,
        at: DateTime<Utc>,
    ) -> String {
        let sender = &message.sender;
        let raw = raw_message(&message.body);
        let at = at.format("%Y-%m-%d %H:%M:%S UTC");
        match notice {
            AgentNotice::PaymentReceipt => format!(
                "🧾 NUEVO COMPROBANTE DE PAGO\n\nCliente: {sender}\nMensaje: \"{raw}\"\n\n\
                 El cliente {sender} envió una imagen de comprobante. Por favor, verifícalo \
                 en el chat.\n\nRecibido: {at}"
            ),
            AgentNotice::HumanHandoff => format!(
                "🔔 NUEVA SOLICITUD DE ATENCIÓN HUMANA\n\nCliente: {sender}\nMensaje: \"{raw}\"\n\n\
                 El cliente {sender} solicita hablar con un asesor humano. Por favor, contáctalo \
                 directamente.\n\nChat iniciado: {at}"
            ),
            AgentNotice::ShippingInquiry => format!(
                "🚚 CONSULTA DE ENVÍO\n\nCliente: {sender}\nMensaje: \"{raw}\"\n\n\
                 El cliente {sender} pregunta por envíos o domicilios. Por favor, contáctalo \
                 para coordinar.\n\nRecibido: {at}"
            ),
        }
    }
}

fn raw_message(body: &MessageBody) -> String {
    match body {
        MessageBody::Text(text) => text.clone(),
        MessageBody::Image { caption: Some(caption), .. } => format!("[imagen] {caption}"),
        MessageBody::Image { caption: None, .. } => "[imagen]".to_owned(),
        MessageBody::Other { kind } => format!("[{kind}]"),
    }
}
