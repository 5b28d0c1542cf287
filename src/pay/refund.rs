//! Refunds.

use crate::error::WechatError;
use crate::types::{Params, PayResponse};

use super::order::OrderRef;
use super::WechatPay;

const DEFAULT_FEE_TYPE: &str = "CNY";
const DEFAULT_REFUND_ACCOUNT: &str = "REFUND_SOURCE_UNSETTLED_FUNDS";

/// A refund application. Amounts are in fen.
#[derive(Debug, Clone)]
pub struct RefundApply {
    order: OrderRef,
    out_refund_no: String,
    total_fee: i64,
    refund_fee: i64,
    fee_type: String,
    op_user_id: Option<String>,
    device_info: Option<String>,
    refund_account: String,
    notify_url: Option<String>,
}

impl RefundApply {
    pub fn new(
        order: OrderRef,
        out_refund_no: impl Into<String>,
        total_fee: i64,
        refund_fee: i64,
    ) -> Self {
        Self {
            order,
            out_refund_no: out_refund_no.into(),
            total_fee,
            refund_fee,
            fee_type: DEFAULT_FEE_TYPE.to_string(),
            op_user_id: None,
            device_info: None,
            refund_account: DEFAULT_REFUND_ACCOUNT.to_string(),
            notify_url: None,
        }
    }

    pub fn fee_type(mut self, fee_type: impl Into<String>) -> Self {
        self.fee_type = fee_type.into();
        self
    }

    /// Defaults to the merchant id.
    pub fn op_user_id(mut self, op_user_id: impl Into<String>) -> Self {
        self.op_user_id = Some(op_user_id.into());
        self
    }

    pub fn device_info(mut self, device_info: impl Into<String>) -> Self {
        self.device_info = Some(device_info.into());
        self
    }

    pub fn refund_account(mut self, account: impl Into<String>) -> Self {
        self.refund_account = account.into();
        self
    }

    pub fn notify_url(mut self, url: impl Into<String>) -> Self {
        self.notify_url = Some(url.into());
        self
    }

    fn into_params(self, appid: &str, mch_id: &str) -> Params {
        let mut params = Params::new()
            .with("appid", appid)
            .with("out_refund_no", self.out_refund_no)
            .with("total_fee", self.total_fee)
            .with("refund_fee", self.refund_fee)
            .with("refund_fee_type", self.fee_type)
            .with("op_user_id", self.op_user_id.unwrap_or_else(|| mch_id.to_string()))
            .with("refund_account", self.refund_account);
        params
            .insert_opt("device_info", self.device_info)
            .insert_opt("notify_url", self.notify_url);
        self.order.apply(&mut params);
        params
    }
}

/// Identifies the refund(s) to query, most specific first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefundRef {
    RefundId(String),
    OutRefundNo(String),
    TransactionId(String),
    OutTradeNo(String),
}

impl RefundRef {
    fn apply(&self, params: &mut Params) {
        match self {
            RefundRef::RefundId(id) => params.insert("refund_id", id),
            RefundRef::OutRefundNo(no) => params.insert("out_refund_no", no),
            RefundRef::TransactionId(id) => params.insert("transaction_id", id),
            RefundRef::OutTradeNo(no) => params.insert("out_trade_no", no),
        };
    }
}

pub struct RefundApi<'a> {
    pay: &'a WechatPay,
}

impl<'a> RefundApi<'a> {
    pub fn new(pay: &'a WechatPay) -> Self {
        Self { pay }
    }

    /// `secapi/pay/refund`. Requires the merchant certificate on the HTTP
    /// client.
    pub async fn apply(&self, refund: RefundApply) -> Result<PayResponse, WechatError> {
        let params = refund.into_params(self.pay.appid(), self.pay.mch_id());
        self.pay.request("secapi/pay/refund", params).await
    }

    /// `pay/refundquery`
    pub async fn query(&self, refund: &RefundRef) -> Result<PayResponse, WechatError> {
        let mut params = Params::new().with("appid", self.pay.appid());
        refund.apply(&mut params);
        self.pay.request("pay/refundquery", params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refund_defaults() {
        let params = RefundApply::new(OrderRef::OutTradeNo("no-1".into()), "r-1", 100, 50)
            .into_params("wx1234567890abcdef", "10000100");

        assert_eq!(params.get("op_user_id").unwrap().to_string(), "10000100");
        assert_eq!(params.get("refund_fee_type").unwrap().to_string(), "CNY");
        assert_eq!(
            params.get("refund_account").unwrap().to_string(),
            "REFUND_SOURCE_UNSETTLED_FUNDS"
        );
        assert_eq!(params.get("out_trade_no").unwrap().to_string(), "no-1");
        assert!(!params.contains_key("notify_url"));
    }
}
