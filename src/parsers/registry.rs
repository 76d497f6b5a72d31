//! Parser registry.

use super::{
    AlipayParser, ConfidenceWeights, GenericWalletParser, NotificationParser, ParseOutcome,
    PaymentGuess, WechatParser,
};
use crate::Result;
use crate::models::RawNotificationEvent;
use tracing::instrument;

/// Routes events to the parser that claims their source app.
///
/// Dedicated parsers are tried in registration order; the fallback parser, if
/// any, handles every source none of them claims.
///
/// # Example
///
/// ```rust
/// use notiledger::ParserRegistry;
///
/// let registry = ParserRegistry::with_default_parsers();
/// assert_eq!(registry.parser_for("com.tencent.mm").map(|p| p.name()), Some("wechat"));
/// assert_eq!(registry.parser_for("wallet.app").map(|p| p.name()), Some("generic"));
///
/// let strict = ParserRegistry::new();
/// assert!(strict.parser_for("wallet.app").is_none());
/// ```
pub struct ParserRegistry {
    parsers: Vec<Box<dyn NotificationParser>>,
    fallback: Option<Box<dyn NotificationParser>>,
}

impl ParserRegistry {
    /// Creates an empty registry with no fallback.
    #[must_use]
    pub fn new() -> Self {
        Self {
            parsers: Vec::new(),
            fallback: None,
        }
    }

    /// Alipay and `WeChat` parsers with the generic wallet parser as fallback.
    #[must_use]
    pub fn with_default_parsers() -> Self {
        Self::new()
            .register(AlipayParser)
            .register(WechatParser)
            .with_fallback(GenericWalletParser)
    }

    /// Adds a dedicated parser.
    #[must_use]
    pub fn register(mut self, parser: impl NotificationParser + 'static) -> Self {
        self.parsers.push(Box::new(parser));
        self
    }

    /// Sets the parser used for unclaimed sources.
    #[must_use]
    pub fn with_fallback(mut self, parser: impl NotificationParser + 'static) -> Self {
        self.fallback = Some(Box::new(parser));
        self
    }

    /// Parser responsible for `source_app`, if any.
    #[must_use]
    pub fn parser_for(&self, source_app: &str) -> Option<&dyn NotificationParser> {
        self.parsers
            .iter()
            .find(|p| p.claims(source_app))
            .or(self.fallback.as_ref())
            .map(|parser| parser.as_ref())
    }

    /// Cheap reading of amount, direction and merchant.
    #[must_use]
    pub fn guess(&self, event: &RawNotificationEvent) -> Option<PaymentGuess> {
        self.parser_for(event.source_app())?.guess(event)
    }

    /// Parses an event with the owning parser.
    #[instrument(
        skip(self, event, weights),
        fields(
            operation = "parse",
            source = %event.source_app(),
            text_length = event.combined_text().len()
        )
    )]
    pub fn parse(
        &self,
        event: &RawNotificationEvent,
        weights: &ConfidenceWeights,
    ) -> Result<ParseOutcome> {
        let Some(parser) = self.parser_for(event.source_app()) else {
            metrics::counter!(
                "notiledger_parse_total",
                "parser" => "none",
                "outcome" => "unsupported"
            )
            .increment(1);
            return Ok(ParseOutcome::Unsupported(event.source_app().to_string()));
        };

        let outcome = parser.parse(event, weights)?;
        tracing::debug!(parser = parser.name(), outcome = outcome.as_str(), "Parsed event");
        metrics::counter!(
            "notiledger_parse_total",
            "parser" => parser.name(),
            "outcome" => outcome.as_str()
        )
        .increment(1);
        Ok(outcome)
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::with_default_parsers()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PaymentDirection, PaymentSourceType};

    #[test]
    fn test_routes_by_source() {
        let registry = ParserRegistry::with_default_parsers();
        assert_eq!(
            registry
                .parser_for("com.eg.android.AlipayGphone")
                .map(NotificationParser::name),
            Some("alipay")
        );
        assert_eq!(
            registry.parser_for("bank.app").map(NotificationParser::name),
            Some("generic")
        );
    }

    #[test]
    fn test_unsupported_without_fallback() {
        let registry = ParserRegistry::new().register(AlipayParser);
        let event = RawNotificationEvent::new("wallet.app", 0).with_body("paid to X 1.00");
        let outcome = registry
            .parse(&event, &ConfidenceWeights::default())
            .unwrap();
        assert_eq!(outcome, ParseOutcome::Unsupported("wallet.app".to_string()));
        assert!(registry.guess(&event).is_none());
    }

    #[test]
    fn test_parse_uses_owner() {
        let registry = ParserRegistry::default();
        let event = RawNotificationEvent::new("com.tencent.mm", 0)
            .with_title("微信支付")
            .with_body("微信支付收款12.00元");
        let ParseOutcome::Parsed(candidate) = registry
            .parse(&event, &ConfidenceWeights::default())
            .unwrap()
        else {
            panic!("expected candidate");
        };
        assert_eq!(candidate.source_type, PaymentSourceType::Wechat);
        assert_eq!(candidate.direction, PaymentDirection::Income);
        assert_eq!(candidate.parser, "wechat");
    }

    #[test]
    fn test_guess_without_amount_is_none() {
        let registry = ParserRegistry::default();
        let event = RawNotificationEvent::new("wallet.app", 0).with_body("hello");
        assert!(registry.guess(&event).is_none());
    }
}
