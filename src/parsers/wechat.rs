//! `WeChat` Pay notifications.

// Static regex patterns are compile-time verified and cannot fail at runtime.
#![allow(clippy::expect_used)]

use super::{DirectionTable, NotificationParser};
use crate::models::PaymentSourceType;
use regex::Regex;
use std::sync::LazyLock;

/// `WeChat` package name.
pub const WECHAT_PACKAGE: &str = "com.tencent.mm";

static DIRECTIONS: DirectionTable = DirectionTable {
    refund: &["退款", "已退回", "退还"],
    income: &["收款", "已收款", "到账", "向你转账", "收到红包", "领取了你的红包"],
    transfer: &["转账给", "已转账", "发出红包", "发红包"],
    expense: &["已支付", "支付成功", "付款", "扣费", "消费"],
};

static MERCHANT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"【([^】]+)】",
        r"(?:商户|商家|收款方)[:：]\s*([^\s,，。]+)",
        r"向(.+?)(?:付款|支付)",
        r"转账给([^\d¥￥,，。\s]+)",
        r"([^\s:：,，]+?)向你转账",
    ]
    .into_iter()
    .map(|p| Regex::new(p).expect("static regex: wechat merchant pattern"))
    .collect()
});

const METHODS: &[(&str, &str)] = &[
    ("零钱通", "零钱通"),
    ("零钱", "零钱"),
    ("信用卡", "信用卡"),
    ("储蓄卡", "储蓄卡"),
];

const EXCLUSIONS: &[&str] = &["验证码", "登录", "[图片]", "[语音]", "[视频]"];

/// Parser for `WeChat` Pay payments, collections and transfers.
#[derive(Debug, Clone, Copy, Default)]
pub struct WechatParser;

impl NotificationParser for WechatParser {
    fn name(&self) -> &'static str {
        "wechat"
    }

    fn source_type(&self) -> PaymentSourceType {
        PaymentSourceType::Wechat
    }

    fn claims(&self, source_app: &str) -> bool {
        source_app == WECHAT_PACKAGE
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
