//! Alipay wallet notifications.

// Static regex patterns are compile-time verified and cannot fail at runtime.
#![allow(clippy::expect_used)]

use super::{DirectionTable, NotificationParser};
use crate::models::PaymentSourceType;
use regex::Regex;
use std::sync::LazyLock;

/// Alipay package name.
pub const ALIPAY_PACKAGE: &str = "com.eg.android.AlipayGphone";

static DIRECTIONS: DirectionTable = DirectionTable {
    refund: &["退款", "已退回", "已撤销", "撤销"],
    income: &["到账", "收钱码", "收款", "余额宝收益", "收到"],
    transfer: &["转账给", "转账到", "已转账"],
    expense: &[
        "向【",
        "付款",
        "支付成功",
        "扫码支付",
        "刷脸支付",
        "自动扣款",
        "扣款",
        "消费",
        "支出",
    ],
};

static MERCHANT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"【([^】]+)】",
        r"你向(.+?)付款",
        r"向(.+?)付款",
        r"转账给([^\d¥￥,，。\s]+)",
        r"收到(.+?)(?:的)?付款",
        r"在(.+?)(?:消费|支付)",
    ]
    .into_iter()
    .map(|p| Regex::new(p).expect("static regex: alipay merchant pattern"))
    .collect()
});

const METHODS: &[(&str, &str)] = &[
    ("余额宝", "余额宝"),
    ("花呗", "花呗"),
    ("借呗", "借呗"),
    ("网商银行", "网商银行"),
    ("信用卡", "信用卡"),
    ("储蓄卡", "储蓄卡"),
    ("余额", "支付宝余额"),
];

const EXCLUSIONS: &[&str] = &[
    "快递",
    "账单已生成",
    "月账单",
    "还款提醒",
    "待还款",
    "验证码",
    "登录提醒",
];

/// Parser for Alipay payment, transfer, income and refund notifications.
///
/// # Example
///
/// ```rust
/// use notiledger::parsers::{AlipayParser, ConfidenceWeights, NotificationParser, ParseOutcome};
/// use notiledger::{PaymentDirection, RawNotificationEvent};
///
/// let event = RawNotificationEvent::new("com.eg.android.AlipayGphone", 0)
///     .with_title("支付宝")
///     .with_body("向【星巴克咖啡】付款28.50元");
/// let ParseOutcome::Parsed(candidate) =
///     AlipayParser.parse(&event, &ConfidenceWeights::default()).unwrap()
/// else {
///     panic!("expected a candidate");
/// };
/// assert_eq!(candidate.amount_cents, 2850);
/// assert_eq!(candidate.direction, PaymentDirection::Expense);
/// assert_eq!(candidate.raw_merchant.as_deref(), Some("星巴克咖啡"));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct AlipayParser;

impl NotificationParser for AlipayParser {
    fn name(&self) -> &'static str {
        "alipay"
    }

    fn source_type(&self) -> PaymentSourceType {
        PaymentSourceType::Alipay
    }

    fn claims(&self, source_app: &str) -> bool {
        source_app == ALIPAY_PACKAGE
    }

    fn directions(&self) -> &DirectionTable {
        &DIRECTIONS
    }

    fn merchant_patterns(&self) -> &[Regex] {
        &MERCHANT_PATTERNS
    }

    fn method_table(&self) -> &[(&'static str, &'static str)] {
        METHODS
    }

    fn exclusions(&self) -> &[&'static str] {
        EXCLUSIONS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PaymentCandidate, PaymentDirection, RawNotificationEvent};
    use crate::parsers::{ConfidenceWeights, ParseOutcome};
    use test_case::test_case;

    fn parse(body: &str) -> ParseOutcome {
        let event = RawNotificationEvent::new(ALIPAY_PACKAGE, 1_700_000_000_000)
            .with_title("支付宝")
            .with_body(body);
        AlipayParser
            .parse(&event, &ConfidenceWeights::default())
            .unwrap()
    }

    fn parsed(body: &str) -> PaymentCandidate {
        match parse(body) {
            ParseOutcome::Parsed(candidate) => candidate,
            other => panic!("expected candidate for {body}, got {other:?}"),
        }
    }

    #[test_case("向【星巴克咖啡】付款28.50元", 2850, PaymentDirection::Expense, Some("星巴克咖啡") ; "scan payment")]
    #[test_case("向【苹果专营店】付款￥1,234.56元", 123_456, PaymentDirection::Expense, Some("苹果专营店") ; "large payment")]
    #[test_case("收款到账98.00元", 9800, PaymentDirection::Income, None ; "income")]
    #[test_case("转账给张三100.00元", 10_000, PaymentDirection::Transfer, Some("张三") ; "transfer")]
    #[test_case("退款28.50元已退回至余额宝", 2850, PaymentDirection::Refund, None ; "refund")]
    fn test_parse_scenarios(
        body: &str,
        amount: i64,
        direction: PaymentDirection,
        merchant: Option<&str>,
    ) {
        let candidate = parsed(body);
        assert_eq!(candidate.source_type, PaymentSourceType::Alipay);
        assert_eq!(candidate.source_app, ALIPAY_PACKAGE);
        assert_eq!(candidate.amount_cents, amount);
        assert_eq!(candidate.direction, direction);
        if merchant.is_some() {
            assert_eq!(candidate.raw_merchant.as_deref(), merchant);
        }
        assert!((0.0..=1.0).contains(&candidate.confidence));
    }

    #[test]
    fn test_normalized_merchant_drops_store_suffix() {
        let candidate = parsed("向【苹果专营店】付款￥1,234.56元");
        assert_eq!(candidate.normalized_merchant.as_deref(), Some("苹果"));
    }

    #[test]
    fn test_payment_method_and_confidence() {
        let candidate = parsed("你使用花呗向【全家便利店】付款15.00元");
        assert_eq!(candidate.payment_method.as_deref(), Some("花呗"));
        assert!((candidate.confidence - 1.0).abs() < f64::EPSILON);

        let candidate = parsed("退款28.50元已退回至余额宝");
        assert_eq!(candidate.payment_method.as_deref(), Some("余额宝"));
    }

    #[test]
    fn test_card_suffix_method() {
        let candidate = parsed("储蓄卡尾号6789向【美团】付款32.00元");
        assert_eq!(candidate.payment_method.as_deref(), Some("储蓄卡尾号6789"));
        assert_eq!(candidate.amount_cents, 3200);
    }

    #[test]
    fn test_non_payment_is_skipped() {
        assert!(matches!(parse("您的月账单已生成，共消费300.00元"), ParseOutcome::Skipped(_)));
    }

    #[test]
    fn test_missing_amount_fails() {
        assert!(matches!(parse("付款成功"), ParseOutcome::Failed(_)));
    }

    #[test]
    fn test_claims_only_alipay() {
        assert!(AlipayParser.claims(ALIPAY_PACKAGE));
        assert!(!AlipayParser.claims("com.tencent.mm"));
    }

    #[test]
    fn test_guess_matches_parse() {
        let event = RawNotificationEvent::new(ALIPAY_PACKAGE, 0).with_body("向【星巴克咖啡】付款28.50元");
        let guess = AlipayParser.guess(&event).unwrap();
        let candidate = parsed("向【星巴克咖啡】付款28.50元");
        assert_eq!(guess.amount_cents, candidate.amount_cents);
        assert_eq!(guess.direction, Some(candidate.direction));
        assert_eq!(guess.merchant.as_deref(), candidate.identity_merchant());
    }
}
