//! Order placement and lifecycle.

use crate::error::WechatError;
use crate::types::{ParamValue, Params, PayResponse};

use super::WechatPay;

/// How the payer completes the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TradeType {
    Jsapi,
    #[default]
    Native,
    App,
    Mweb,
}

impl TradeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeType::Jsapi => "JSAPI",
            TradeType::Native => "NATIVE",
            TradeType::App => "APP",
            TradeType::Mweb => "MWEB",
        }
    }
}

/// Identifies an existing order. The provider's transaction id takes
/// precedence when both are known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderRef {
    TransactionId(String),
    OutTradeNo(String),
}

impl OrderRef {
    pub(crate) fn apply(&self, params: &mut Params) {
        match self {
            OrderRef::TransactionId(id) => params.insert("transaction_id", id),
            OrderRef::OutTradeNo(no) => params.insert("out_trade_no", no),
        };
    }
}

/// Unified order request.
///
/// # Example
///
/// ```rust
/// use wechat_sdk::pay::{CreateOrder, TradeType};
///
/// let order = CreateOrder::new("Tencent-Game", "20150806125346", 888, "123.12.12.123", "https://example.com/notify")
///     .trade_type(TradeType::Jsapi)
///     .param("openid", "oUpF8uMuAJO_M2pxb1Q9zNjWeS6o");
/// assert_eq!(order.trade_type_value(), TradeType::Jsapi);
/// ```
#[derive(Debug, Clone)]
pub struct CreateOrder {
    body: String,
    out_trade_no: String,
    total_fee: i64,
    spbill_create_ip: String,
    notify_url: String,
    trade_type: TradeType,
    extra: Params,
}

impl CreateOrder {
    /// `total_fee` is in fen.
    pub fn new(
        body: impl Into<String>,
        out_trade_no: impl Into<String>,
        total_fee: i64,
        spbill_create_ip: impl Into<String>,
        notify_url: impl Into<String>,
    ) -> Self {
        Self {
            body: body.into(),
            out_trade_no: out_trade_no.into(),
            total_fee,
            spbill_create_ip: spbill_create_ip.into(),
            notify_url: notify_url.into(),
            trade_type: TradeType::default(),
            extra: Params::new(),
        }
    }

    pub fn trade_type(mut self, trade_type: TradeType) -> Self {
        self.trade_type = trade_type;
        self
    }

    pub fn trade_type_value(&self) -> TradeType {
        self.trade_type
    }

    /// Optional business field such as `openid`, `attach`, `time_expire`.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.extra.insert(key, value);
        self
    }

    fn into_params(self, appid: &str) -> Params {
        let mut params = Params::new()
            .with("appid", appid)
            .with("body", self.body)
            .with("out_trade_no", self.out_trade_no)
            .with("total_fee", self.total_fee)
            .with("spbill_create_ip", self.spbill_create_ip)
            .with("notify_url", self.notify_url)
            .with("trade_type", self.trade_type.as_str());
        params.extend(self.extra);
        params
    }
}

pub struct OrderApi<'a> {
    pay: &'a WechatPay,
}

impl<'a> OrderApi<'a> {
    pub fn new(pay: &'a WechatPay) -> Self {
        Self { pay }
    }

    /// Unified order (`pay/unifiedorder`).
    pub async fn create(&self, order: CreateOrder) -> Result<PayResponse, WechatError> {
        let params = order.into_params(self.pay.appid());
        log::info!("creating order {:?}", params.get("out_trade_no"));
        self.pay.request("pay/unifiedorder", params).await
    }

    /// `pay/orderquery`
    pub async fn query(&self, order: &OrderRef) -> Result<PayResponse, WechatError> {
        let mut params = Params::new().with("appid", self.pay.appid());
        order.apply(&mut params);
        self.pay.request("pay/orderquery", params).await
    }

    /// `pay/closeorder`
    pub async fn close(&self, out_trade_no: &str) -> Result<PayResponse, WechatError> {
        let params = Params::new()
            .with("appid", self.pay.appid())
            .with("out_trade_no", out_trade_no);
        self.pay.request("pay/closeorder", params).await
    }

    /// Reverses a micropay order (`secapi/pay/reverse`). Requires the
    /// merchant certificate on the HTTP client.
    pub async fn reverse(&self, order: &OrderRef) -> Result<PayResponse, WechatError> {
        let mut params = Params::new().with("appid", self.pay.appid());
        order.apply(&mut params);
        self.pay.request("secapi/pay/reverse", params).await
    }
}
