//! Intake policy.
//!
//! Cheap, pure checks that reject non-payment or unwanted notifications
//! before any parsing or store access. Matching is case-insensitive substring
//! matching over the event's combined title and body.
//!
//! Checks, first match wins:
//! 1. Shopping-app source blacklist (exact app id)
//! 2. Order/shipping keywords, unless a strong payment keyword is present
//! 3. Group summaries, unless from an allow-listed messenger announcing money
//! 4. Source disabled by the user
//! 5. The source's custom keyword blacklist

use crate::config::SourceRule;
use crate::models::{RawNotificationEvent, SkipReason};
use crate::parsers::first_keyword;

/// Shopping apps whose notifications are order updates, never payments.
pub const BLACKLISTED_SOURCES: &[&str] = &[
    "com.taobao.taobao",
    "com.tmall.wireless",
    "com.jingdong.app.mall",
    "com.suning.mobile.ebuy",
    "com.xunmeng.pinduoduo",
    "com.amazon.mShop.android.shopping",
    "com.dangdang.buy2",
];

/// Vocabulary of order confirmations and shipping updates.
pub const ORDER_KEYWORDS: &[&str] = &[
    "订单",
    "下单",
    "已下单",
    "商品",
    "订单确认",
    "购物",
    "发货",
    "物流",
    "包裹",
    "配送",
    "签收",
    "order",
    "shipped",
    "delivery",
    "package",
    "parcel",
    "tracking",
];

/// Keywords that confirm money actually moved.
pub const STRONG_PAYMENT_KEYWORDS: &[&str] = &[
    "支付",
    "付款",
    "扣款",
    "支付成功",
    "已支付",
    "收款",
    "已收款",
    "到账",
    "入账",
    "paid",
    "payment received",
    "payment successful",
    "settled",
    "charged",
    "debited",
    "credited",
];

/// Messengers whose group summaries may announce a payment.
pub const GROUP_SUMMARY_SOURCES: &[&str] = &["com.tencent.mm"];

/// Keywords that make an allow-listed group summary worth evaluating.
pub const GROUP_MONEY_KEYWORDS: &[&str] = &[
    "红包",
    "转账",
    "收款",
    "已收款",
    "received money",
    "red packet",
    "transfer received",
];

/// Keyword tables used by the filter.
#[derive(Debug, Clone, Copy)]
pub struct PolicyTables {
    /// Exact source ids always rejected.
    pub blacklisted_sources: &'static [&'static str],
    /// Order vocabulary.
    pub order_keywords: &'static [&'static str],
    /// Payment vocabulary overriding order matches.
    pub strong_payment_keywords: &'static [&'static str],
    /// Sources allowed to send group summaries.
    pub group_summary_sources: &'static [&'static str],
    /// Money keywords required in allowed group summaries.
    pub group_money_keywords: &'static [&'static str],
}

impl Default for PolicyTables {
    fn default() -> Self {
        Self {
            blacklisted_sources: BLACKLISTED_SOURCES,
            order_keywords: ORDER_KEYWORDS,
            strong_payment_keywords: STRONG_PAYMENT_KEYWORDS,
            group_summary_sources: GROUP_SUMMARY_SOURCES,
            group_money_keywords: GROUP_MONEY_KEYWORDS,
        }
    }
}

/// The intake policy filter.
///
/// # Example
///
/// ```rust
/// use notiledger::{PolicyFilter, RawNotificationEvent};
///
/// let filter = PolicyFilter::default();
/// let order = RawNotificationEvent::new("shop.app", 0).with_body("Your order has shipped");
/// assert!(filter.check(&order, None).is_some());
///
/// let paid = RawNotificationEvent::new("shop.app", 0).with_body("Order 42 paid: ¥30.00");
/// assert!(filter.check(&paid, None).is_none());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyFilter {
    tables: PolicyTables,
}

impl PolicyFilter {
    /// Creates a filter over custom tables.
    #[must_use]
    pub const fn new(tables: PolicyTables) -> Self {
        Self { tables }
    }

    /// Runs all five checks in order.
    #[must_use]
    pub fn check(
        &self,
        event: &RawNotificationEvent,
        rule: Option<&SourceRule>,
    ) -> Option<SkipReason> {
        self.check_static(event)
            .or_else(|| Self::check_source(event, rule))
    }

    /// Checks 1 to 3: source blacklist, order keywords, group summaries.
    #[must_use]
    pub fn check_static(&self, event: &RawNotificationEvent) -> Option<SkipReason> {
        let source = event.source_app();
        if self.tables.blacklisted_sources.contains(&source) {
            return Some(SkipReason::BlacklistedSource {
                source: source.to_string(),
            });
        }

        let text = event.searchable_text();

        if let Some(keyword) = first_keyword(&text, self.tables.order_keywords) {
            if first_keyword(&text, self.tables.strong_payment_keywords).is_none() {
                return Some(SkipReason::OrderKeyword {
                    keyword: keyword.to_string(),
                });
            }
        }

        if event.is_group_summary() {
            let allowed = self.tables.group_summary_sources.contains(&source)
                && first_keyword(&text, self.tables.group_money_keywords).is_some();
            if !allowed {
                return Some(SkipReason::GroupSummary);
            }
        }

        None
    }

    /// Checks 4 and 5: per-source mode and custom blacklist.
    #[must_use]
    pub fn check_source(
        event: &RawNotificationEvent,
        rule: Option<&SourceRule>,
    ) -> Option<SkipReason> {
        let rule = rule?;
        if !rule.is_enabled() {
            return Some(SkipReason::SourceDisabled {
                source: event.source_app().to_string(),
            });
        }
        rule.blacklist_hit(&event.combined_text())
            .map(|keyword| SkipReason::CustomBlacklist {
                keyword: keyword.to_string(),
            })
    }
}
