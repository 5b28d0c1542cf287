//! Short URLs and statement downloads.

use crate::error::WechatError;
use crate::types::{Params, PayResponse};
use crate::xml;

use super::WechatPay;

/// Which orders a statement lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BillType {
    #[default]
    All,
    Success,
    Refund,
    Revoked,
}

impl BillType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillType::All => "ALL",
            BillType::Success => "SUCCESS",
            BillType::Refund => "REFUND",
            BillType::Revoked => "REVOKED",
        }
    }
}

pub struct ToolsApi<'a> {
    pay: &'a WechatPay,
}

impl<'a> ToolsApi<'a> {
    pub fn new(pay: &'a WechatPay) -> Self {
        Self { pay }
    }

    /// Shortens a `weixin://wxpay/bizpayurl` link (`tools/shorturl`).
    pub async fn short_url(&self, long_url: &str) -> Result<PayResponse, WechatError> {
        let params = Params::new()
            .with("appid", self.pay.appid())
            .with("long_url", long_url);
        self.pay.request("tools/shorturl", params).await
    }

    /// Downloads the statement for `bill_date` (`yyyyMMdd`).
    ///
    /// On success the provider answers with the plain-text statement
    /// itself; failures come back as an XML envelope.
    ///
    /// # Errors
    /// `WechatError::Pay` when the provider reports a failure, plus the
    /// usual transport errors.
    pub async fn download_bill(
        &self,
        bill_date: &str,
        bill_type: BillType,
        device_info: Option<&str>,
    ) -> Result<String, WechatError> {
        let mut params = Params::new()
            .with("appid", self.pay.appid())
            .with("bill_date", bill_date)
            .with("bill_type", bill_type.as_str());
        params.insert_opt("device_info", device_info);

        let body = self.pay.request_raw("pay/downloadbill", params).await?;
        let text = String::from_utf8_lossy(&body).into_owned();

        if text.trim_start().starts_with("<xml>") {
            let response = PayResponse::new(xml::decode(&body));
            if !response.is_success() {
                let error = response.to_error();
                log::error!("bill download for {bill_date} failed: {error}");
                return Err(error);
            }
        }

        Ok(text)
    }
}
