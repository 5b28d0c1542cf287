use std::sync::Arc;

use serde_json::json;
use wechat_sdk::api::WechatContext;
use wechat_sdk::error::{HttpError, WechatError};
use wechat_sdk::token::TokenManager;
use wechat_sdk::types::{AccessToken, AppId, AppSecret};
use wechat_sdk::{ApiRequest, Wechat, WechatClient};
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn appid() -> AppId {
    AppId::new("wx1234567890abcdef").unwrap()
}

fn secret() -> AppSecret {
    AppSecret::new("secret1234567890ab").unwrap()
}

async fn mount_token(server: &MockServer, token: &str, times: u64) {
    Mock::given(method("GET"))
        .and(path("/cgi-bin/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": token,
            "expires_in": 7200
        })))
        .expect(times)
        .mount(server)
        .await;
}

fn wechat(server: &MockServer) -> Wechat {
    Wechat::builder()
        .appid(appid())
        .secret(secret())
        .base_url(server.uri())
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_expired_token_is_refreshed_and_call_retried_once() {
    let server = MockServer::start().await;
    mount_token(&server, "T2", 1).await;

    Mock::given(method("POST"))
        .and(path("/cgi-bin/message/custom/send"))
        .and(query_param("access_token", "T1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errcode": 40001,
            "errmsg": "invalid credential"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/cgi-bin/message/custom/send"))
        .and(query_param("access_token", "T2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errcode": 0,
            "errmsg": "ok"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let wechat = wechat(&server);
    wechat.set_access_token(AccessToken::new("T1").unwrap()).await;

    let envelope = wechat.message().send_text("o1", "hi", None).await.unwrap();

    assert!(envelope.is_success());
    assert_eq!(wechat.get_access_token().await.unwrap(), "T2");
}

#[tokio::test]
async fn test_second_rejection_is_returned_without_another_retry() {
    let server = MockServer::start().await;
    mount_token(&server, "T2", 1).await;

    Mock::given(method("GET"))
        .and(path("/cgi-bin/user/get"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errcode": 42001,
            "errmsg": "access_token expired"
        })))
        .expect(2)
        .mount(&server)
        .await;

    let wechat = wechat(&server);
    wechat.set_access_token(AccessToken::new("T1").unwrap()).await;

    let envelope = wechat.user().get_followers(None).await.unwrap();

    assert_eq!(envelope.errcode(), 42001);
    assert!(envelope.is_credential_expired());
}

#[tokio::test]
async fn test_auto_retry_disabled_returns_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cgi-bin/user/get"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errcode": 40014,
            "errmsg": "invalid access_token"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let wechat = Wechat::builder()
        .appid(appid())
        .secret(secret())
        .base_url(server.uri())
        .auto_retry(false)
        .build()
        .unwrap();
    wechat.set_access_token(AccessToken::new("T1").unwrap()).await;

    let envelope = wechat.user().get_followers(None).await.unwrap();
    assert_eq!(envelope.errcode(), 40014);
}

#[tokio::test]
async fn test_rate_limit_is_returned_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/cgi-bin/message/template/send"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errcode": 45009,
            "errmsg": "reach max api daily quota limit"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let wechat = wechat(&server);
    wechat.set_access_token(AccessToken::new("T1").unwrap()).await;

    let message = wechat_sdk::api::TemplateMessage {
        touser: "o1".into(),
        template_id: "tpl".into(),
        data: json!({"first": {"value": "hello"}}),
        url: None,
        mini_program: None,
    };
    let envelope = wechat.message().send_template(&message).await.unwrap();

    assert!(envelope.is_rate_limited());
}

#[tokio::test]
async fn test_base_resp_is_hoisted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cgi-bin/getcallbackip"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "base_resp": {"ret": 0, "errcode": 48001, "errmsg": "api unauthorized"}
        })))
        .mount(&server)
        .await;

    let wechat = wechat(&server);
    wechat.set_access_token(AccessToken::new("T1").unwrap()).await;

    let envelope = wechat.request(&ApiRequest::get("getcallbackip")).await.unwrap();
    assert_eq!(envelope.errcode(), 48001);
    assert_eq!(envelope.errmsg(), "api unauthorized");

    let err = wechat.misc().get_wechat_ips().await.unwrap_err();
    assert!(matches!(err, WechatError::Api { code: 48001, .. }));
}

#[tokio::test]
async fn test_string_errcode_is_coerced() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cgi-bin/user/info"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errcode": "40003",
            "errmsg": "invalid openid"
        })))
        .mount(&server)
        .await;

    let wechat = wechat(&server);
    wechat.set_access_token(AccessToken::new("T1").unwrap()).await;

    let envelope = wechat.user().get("bad", "zh_CN").await.unwrap();
    assert_eq!(envelope.errcode(), 40003);
}

#[tokio::test]
async fn test_missing_errcode_is_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cgi-bin/user/info"))
        .and(query_param("openid", "o1"))
        .and(query_param("lang", "en"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "subscribe": 1,
            "openid": "o1",
            "nickname": "Band"
        })))
        .mount(&server)
        .await;

    let wechat = wechat(&server);
    wechat.set_access_token(AccessToken::new("T1").unwrap()).await;

    let envelope = wechat.user().get("o1", "en").await.unwrap();
    assert!(envelope.is_success());
    assert_eq!(envelope.get("nickname").unwrap(), "Band");
}

#[tokio::test]
async fn test_http_failure_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/cgi-bin/shorturl"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&server)
        .await;

    let wechat = wechat(&server);
    wechat.set_access_token(AccessToken::new("T1").unwrap()).await;

    let err = wechat.misc().short_url("https://example.com").await.unwrap_err();
    match err {
        WechatError::Http(HttpError::Status { status, body }) => {
            assert_eq!(status, 500);
            assert!(body.contains("upstream exploded"));
        }
        other => panic!("expected HTTP status error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_invalid_json_is_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cgi-bin/user/get"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&server)
        .await;

    let wechat = wechat(&server);
    wechat.set_access_token(AccessToken::new("T1").unwrap()).await;

    let err = wechat.user().get_followers(None).await.unwrap_err();
    assert!(matches!(err, WechatError::Http(HttpError::Decode(_))));
}

#[tokio::test]
async fn test_caller_access_token_is_replaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/cgi-bin/shorturl"))
        .and(query_param("access_token", "REAL"))
        .and(body_json(json!({"action": "long2short", "long_url": "https://example.com"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errcode": 0,
            "errmsg": "ok",
            "short_url": "https://w.url.cn/s/abc"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let wechat = wechat(&server);
    wechat.set_access_token(AccessToken::new("REAL").unwrap()).await;

    let request = ApiRequest::post("shorturl")
        .query("access_token", "FORGED")
        .json(json!({"action": "long2short", "long_url": "https://example.com"}));
    let envelope = wechat.request(&request).await.unwrap();

    assert_eq!(envelope.get("short_url").unwrap(), "https://w.url.cn/s/abc");
}

#[tokio::test]
async fn test_absolute_endpoint_is_used_verbatim() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/datacube/getusersummary"))
        .and(query_param("access_token", "T1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"list": []})))
        .expect(1)
        .mount(&server)
        .await;

    let wechat = wechat(&server);
    wechat.set_access_token(AccessToken::new("T1").unwrap()).await;

    let url = format!("{}/datacube/getusersummary", server.uri());
    let envelope = wechat.request(&ApiRequest::get(url)).await.unwrap();
    assert!(envelope.is_success());
}

#[tokio::test]
async fn test_processor_sees_final_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cgi-bin/getcallbackip"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ip_list": ["101.226.103.0/25", "101.226.62.77"]
        })))
        .mount(&server)
        .await;

    let wechat = wechat(&server);
    wechat.set_access_token(AccessToken::new("T1").unwrap()).await;

    let ips = wechat.misc().get_wechat_ips().await.unwrap();
    assert_eq!(ips, vec!["101.226.103.0/25", "101.226.62.77"]);

    let count = wechat
        .context()
        .request_with(&ApiRequest::get("getcallbackip"), |envelope| {
            Ok(envelope
                .get("ip_list")
                .and_then(|v| v.as_array())
                .map_or(0, Vec::len))
        })
        .await
        .unwrap();
    assert_eq!(count, 2);
}

#[tokio::test]
async fn test_token_failure_aborts_call() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cgi-bin/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errcode": 40125,
            "errmsg": "invalid appsecret"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cgi-bin/user/get"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let client = WechatClient::builder()
        .appid(appid())
        .secret(secret())
        .base_url(server.uri())
        .build()
        .unwrap();
    let token_manager = TokenManager::new(client.clone()).with_notifier(Arc::new(|_: &str, _: &str| {}));
    let context = WechatContext::new(Arc::new(client), Arc::new(token_manager));

    let err = context.request(&ApiRequest::get("user/get")).await.unwrap_err();
    assert!(matches!(err, WechatError::Credential { code: 40125, .. }));
}
