use regex::{Captures, Regex};

use crate::context::StoreProfile;

pub const PRICE_REPLACEMENT: &str = "el precio publicado en el enlace del producto";

/// Amounts with a currency marker, an amount in thousands ("120 mil") or a
/// thousand-grouped number, optionally led by a price word. A price word
/// followed by any bare number also counts. The lead word is kept.
const PRICE_PATTERN: &str = concat!(
    r"(?i)(?P<lead>\b(?:precios?|cuestan?|valen?|valor)\b\s*:?\s*(?:de\s+)?)?",
    r"(?:\$\s?\d(?:[\d.,]*\d)?(?:\s?mil\b)?(?:\s?(?:cop|pesos?)\b)?",
    r"|\b(?:cop|pesos?)\s?\$?\s?\d(?:[\d.,]*\d)?",
    r"|\b\d(?:[\d.,]*\d)?\s?mil\b(?:\s?(?:cop|pesos?)\b)?",
    r"|\b\d(?:[\d.,]*\d)?\s?(?:cop|pesos?)\b",
    r"|\b\d{1,3}(?:[.,]\d{3})+\b)",
    r"|(?P<bare_lead>\b(?:precios?|cuestan?|valen?|valor)\b\s*:?\s*(?:de\s+)?)\d(?:[\d.,]*\d)?",
);
const URL_PATTERN: &str = r#"https?://[^\s<>()\[\]"']+"#;
const URL_TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?'];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardrailFinding {
    PriceRedacted { count: usize },
    UrlReplaced { url: String },
}

impl GuardrailFinding {
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::PriceRedacted { .. } => "price_disclosure_disallowed",
            Self::UrlReplaced { .. } => "url_not_in_context",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuardrailOutcome {
    pub text: String,
    pub findings: Vec<GuardrailFinding>,
}

impl GuardrailOutcome {
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }
}

/// String-level checks applied to a generated reply before dispatch.
///
/// Price-like spans are replaced when prices may not be disclosed, and any
/// URL that is neither the storefront link nor a retrieved product link is
/// rewritten to the storefront link.
#[derive(Clone, Debug)]
pub struct ReplyGuardrail {
    disclose_prices: bool,
    storefront_url: String,
    price_pattern: Regex,
    url_pattern: Regex,
}

impl ReplyGuardrail {
    pub fn new(profile: &StoreProfile) -> Result<Self, regex::Error> {
        Ok(Self {
            disclose_prices: profile.disclose_prices,
            storefront_url: profile.storefront_url.clone(),
            price_pattern: Regex::new(PRICE_PATTERN)?,
            url_pattern: Regex::new(URL_PATTERN)?,
        })
    }

    pub fn apply(&self, reply: &str, allowed_urls: &[&str]) -> GuardrailOutcome {
        let mut findings = Vec::new();

        let mut replaced_urls = Vec::new();
        let text = self
            .url_pattern
            .replace_all(reply, |captures: &Captures<'_>| {
                let raw = &captures[0];
                let url = raw.trim_end_matches(URL_TRAILING_PUNCTUATION);
                let trailing = &raw[url.len()..];
                if self.is_allowed(url, allowed_urls) {
                    raw.to_owned()
                } else {
                    replaced_urls.push(url.to_owned());
                    format!("{}{trailing}", self.storefront_url)
                }
            })
            .into_owned();
        findings.extend(replaced_urls.into_iter().map(|url| GuardrailFinding::UrlReplaced { url }));

        let text = if self.disclose_prices { text } else { self.redact_prices(text, &mut findings) };

        GuardrailOutcome { text, findings }
    }

    /// Replaces price spans outside of URLs; links surviving the URL check
    /// may legitimately contain digit groups.
    fn redact_prices(&self, text: String, findings: &mut Vec<GuardrailFinding>) -> String {
        let url_spans =
            self.url_pattern.find_iter(&text).map(|found| found.range()).collect::<Vec<_>>();

        let mut count = 0;
        let redacted = self
            .price_pattern
            .replace_all(&text, |captures: &Captures<'_>| {
                let whole = &captures[0];
                let start = captures.get(0).map_or(0, |found| found.start());
                if url_spans.iter().any(|span| span.contains(&start)) {
                    return whole.to_owned();
                }
                count += 1;
                let lead = captures
                    .name("lead")
                    .or_else(|| captures.name("bare_lead"))
                    .map_or("", |lead| lead.as_str());
                format!("{lead}{PRICE_REPLACEMENT}")
            })
            .into_owned();

        if count > 0 {
            findings.push(GuardrailFinding::PriceRedacted { count });
        }
        redacted
    }

    fn is_allowed(&self, url: &str, allowed_urls: &[&str]) -> bool {
        let url = url.trim_end_matches('/');
        url == self.storefront_url.trim_end_matches('/')
            || allowed_urls.iter().any(|allowed| url == allowed.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::{GuardrailFinding, ReplyGuardrail, PRICE_REPLACEMENT};
    use crate::context::StoreProfile;

    fn guardrail(disclose_prices: bool) -> ReplyGuardrail {
        ReplyGuardrail::new(&StoreProfile { disclose_prices, ..StoreProfile::default() })
            .expect("patterns compile")
    }

    #[test]
    fn clean_reply_passes_unchanged() {
        let reply = "Tenemos el Respirador AIR S950: https://asoferru.mitiendanube.com/productos/r950/";
        let outcome =
            guardrail(false).apply(reply, &["https://asoferru.mitiendanube.com/productos/r950"]);

        assert!(outcome.is_clean());
        assert_eq!(outcome.text, reply);
    }

    #[test]
    fn unknown_urls_are_rewritten_to_the_storefront() {
        let reply = "Míralo en https://otra-tienda.example/x. También en https://asoferru.mitiendanube.com.";
        let outcome = guardrail(false).apply(reply, &[]);

        assert_eq!(
            outcome.text,
            "Míralo en https://asoferru.mitiendanube.com. También en https://asoferru.mitiendanube.com."
        );
        assert_eq!(
            outcome.findings,
            vec![GuardrailFinding::UrlReplaced { url: "https://otra-tienda.example/x".to_owned() }]
        );
    }

    #[test]
    fn prices_are_redacted_when_disclosure_is_off() {
        let outcome = guardrail(false).apply("Cuesta $120.000 o 95.000 pesos.", &[]);

        assert!(!outcome.text.contains("120.000"));
        assert!(!outcome.text.contains("95.000"));
        assert!(outcome.text.contains(PRICE_REPLACEMENT));
        assert_eq!(outcome.findings, vec![GuardrailFinding::PriceRedacted { count: 2 }]);
        assert_eq!(outcome.findings[0].reason_code(), "price_disclosure_disallowed");
    }

    #[test]
    fn unmarked_price_forms_are_redacted() {
        let cases = [
            ("El respirador cuesta 120.000", "El respirador cuesta "),
            ("Vale 120 mil pesos", "Vale "),
            ("Precio: 45,900", "Precio: "),
            ("Lo tenemos en 1.250.000 para entrega inmediata", "Lo tenemos en "),
            ("Cuestan 35 cada uno", "Cuestan "),
        ];

        for (reply, kept_prefix) in cases {
            let outcome = guardrail(false).apply(reply, &[]);
            assert!(
                outcome.text.starts_with(&format!("{kept_prefix}{PRICE_REPLACEMENT}")),
                "`{reply}` became `{}`",
                outcome.text
            );
            assert_eq!(outcome.findings, vec![GuardrailFinding::PriceRedacted { count: 1 }]);
        }
    }

    #[test]
    fn digit_groups_inside_allowed_links_are_left_alone() {
        let url = "https://asoferru.mitiendanube.com/productos/cable-1.500.000";
        let reply = format!("Aquí está: {url}");
        let outcome = guardrail(false).apply(&reply, &[url]);

        assert!(outcome.is_clean());
        assert_eq!(outcome.text, reply);
    }

    #[test]
    fn prices_are_kept_when_disclosure_is_on() {
        let outcome = guardrail(true).apply("Cuesta $120.000", &[]);
        assert!(outcome.is_clean());
        assert_eq!(outcome.text, "Cuesta $120.000");
    }

    #[test]
    fn plain_numbers_are_not_treated_as_prices() {
        let outcome = guardrail(false).apply("Tenemos brocas de 3 y 5 mm, lija grano 120.", &[]);
        assert!(outcome.is_clean());
    }
}
