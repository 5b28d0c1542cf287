//! Cash red packets (`mmpaymkttransfers/`).
//!
//! Sending requires the merchant certificate on the HTTP client.

use crate::error::WechatError;
use crate::types::{Params, PayResponse};

use super::WechatPay;

/// A normal red packet to one user. `total_amount` is in fen.
#[derive(Debug, Clone)]
pub struct Redpack {
    pub mch_billno: String,
    pub re_openid: String,
    pub total_amount: i64,
    pub send_name: String,
    pub act_name: String,
    pub wishing: String,
    pub remark: String,
    pub client_ip: String,
    pub total_num: i64,
    /// `scene_id`, `risk_info`, `consume_mch_id`, ...
    pub extra: Params,
}

impl Redpack {
    fn into_params(self, appid: &str) -> Params {
        let mut params = Params::new()
            .with("wxappid", appid)
            .with("mch_billno", self.mch_billno)
            .with("re_openid", self.re_openid)
            .with("total_amount", self.total_amount)
            .with("send_name", self.send_name)
            .with("act_name", self.act_name)
            .with("wishing", self.wishing)
            .with("remark", self.remark)
            .with("client_ip", self.client_ip)
            .with("total_num", self.total_num);
        params.extend(self.extra);
        params
    }
}

/// A fission red packet split among `total_num` users.
#[derive(Debug, Clone)]
pub struct GroupRedpack {
    pub mch_billno: String,
    pub re_openid: String,
    pub total_amount: i64,
    pub total_num: i64,
    pub send_name: String,
    pub act_name: String,
    pub wishing: String,
    pub remark: String,
    /// Defaults to `ALL_RAND` when `None`.
    pub amt_type: Option<String>,
    pub scene_id: Option<String>,
    pub risk_info: Option<String>,
    pub consume_mch_id: Option<String>,
}

impl GroupRedpack {
    fn into_params(self, appid: &str) -> Params {
        let mut params = Params::new()
            .with("wxappid", appid)
            .with("mch_billno", self.mch_billno)
            .with("re_openid", self.re_openid)
            .with("total_amount", self.total_amount)
            .with("total_num", self.total_num)
            .with("send_name", self.send_name)
            .with("act_name", self.act_name)
            .with("wishing", self.wishing)
            .with("remark", self.remark)
            .with("amt_type", self.amt_type.unwrap_or_else(|| "ALL_RAND".to_string()));
        params
            .insert_opt("scene_id", self.scene_id)
            .insert_opt("risk_info", self.risk_info)
            .insert_opt("consume_mch_id", self.consume_mch_id);
        params
    }
}

pub struct RedpackApi<'a> {
    pay: &'a WechatPay,
}

impl<'a> RedpackApi<'a> {
    pub fn new(pay: &'a WechatPay) -> Self {
        Self { pay }
    }

    pub async fn send(&self, redpack: Redpack) -> Result<PayResponse, WechatError> {
        let params = redpack.into_params(self.pay.appid());
        self.pay.request("mmpaymkttransfers/sendredpack", params).await
    }

    pub async fn send_group(&self, redpack: GroupRedpack) -> Result<PayResponse, WechatError> {
        let params = redpack.into_params(self.pay.appid());
        self.pay
            .request("mmpaymkttransfers/sendgroupredpack", params)
            .await
    }

    /// Looks up a sent red packet by merchant bill number.
    pub async fn query(&self, mch_billno: &str) -> Result<PayResponse, WechatError> {
        let params = Params::new()
            .with("appid", self.pay.appid())
            .with("mch_billno", mch_billno)
            .with("bill_type", "MCHT");
        self.pay.request("mmpaymkttransfers/gethbinfo", params).await
    }
}
