//! Parameters for invoking payment from a web page (`WeixinJSBridge` or
//! the JS-SDK `chooseWXPay`).

use std::collections::BTreeMap;

use crate::crypto::calculate_signature;
use crate::error::WechatError;
use crate::types::Params;
use crate::utils::unix_timestamp;

use super::{nonce_str, WechatPay};

const PAY_SIGN: &str = "paySign";

pub struct JsapiApi<'a> {
    pay: &'a WechatPay,
}

impl<'a> JsapiApi<'a> {
    pub fn new(pay: &'a WechatPay) -> Self {
        Self { pay }
    }

    /// The `paySign` for `prepay_id`. A missing timestamp or nonce is
    /// generated.
    pub async fn signature(
        &self,
        prepay_id: &str,
        timestamp: Option<&str>,
        nonce: Option<&str>,
    ) -> Result<String, WechatError> {
        let params = self.base_params(prepay_id, timestamp, nonce);
        let key = self.pay.signing_key().await?;
        Ok(calculate_signature(&params, &key))
    }

    /// The full parameter object handed to the page, `paySign` included.
    ///
    /// The bridge expects `timeStamp`; the JS-SDK (`jssdk == true`)
    /// expects `timestamp`.
    pub async fn params(
        &self,
        prepay_id: &str,
        timestamp: Option<&str>,
        nonce: Option<&str>,
        jssdk: bool,
    ) -> Result<BTreeMap<String, String>, WechatError> {
        let params = self.base_params(prepay_id, timestamp, nonce);
        let key = self.pay.signing_key().await?;
        let sign = calculate_signature(&params, &key);

        let mut out: BTreeMap<String, String> = params
            .iter()
            .map(|(k, v)| (k.clone(), v.to_string()))
            .collect();
        out.insert(PAY_SIGN.to_string(), sign);
        if jssdk {
            if let Some(ts) = out.remove("timeStamp") {
                out.insert("timestamp".to_string(), ts);
            }
        }
        Ok(out)
    }

    fn base_params(&self, prepay_id: &str, timestamp: Option<&str>, nonce: Option<&str>) -> Params {
        let timestamp = timestamp.map_or_else(unix_timestamp, str::to_string);
        let nonce = nonce.map_or_else(nonce_str, str::to_string);
        Params::new()
            .with("appId", self.pay.appid())
            .with("timeStamp", timestamp)
            .with("nonceStr", nonce)
            .with("signType", "MD5")
            .with("package", format!("prepay_id={prepay_id}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::WechatClient;
    use crate::pay::PayConfig;
    use crate::types::{AppId, AppSecret, MchId};

    fn pay() -> WechatPay {
        let client = WechatClient::builder()
            .appid(AppId::new("wx1234567890abcdef").unwrap())
            .secret(AppSecret::new("secret1234567890ab").unwrap())
            .build()
            .unwrap();
        let config = PayConfig::new(MchId::new("10000100").unwrap(), "apikey").unwrap();
        WechatPay::new(client, config).unwrap()
    }

    #[tokio::test]
    async fn test_params_sign_with_bridge_keys() {
        let pay = pay();
        let params = pay
            .jsapi()
            .params("wx2017", Some("1414561699"), Some("5K8264ILTKCH16CQ2502SI8ZNMTM67VS"), false)
            .await
            .unwrap();

        assert_eq!(params["timeStamp"], "1414561699");
        assert_eq!(params["package"], "prepay_id=wx2017");
        assert_eq!(params["signType"], "MD5");
        assert_eq!(
            params["paySign"],
            pay.jsapi()
                .signature("wx2017", Some("1414561699"), Some("5K8264ILTKCH16CQ2502SI8ZNMTM67VS"))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_params_jssdk_lowercases_timestamp() {
        let params = pay()
            .jsapi()
            .params("wx2017", Some("1414561699"), None, true)
            .await
            .unwrap();

        assert_eq!(params["timestamp"], "1414561699");
        assert!(!params.contains_key("timeStamp"));
        assert_eq!(params["nonceStr"].len(), 32);
    }
}
