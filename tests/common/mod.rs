//! 集成测试共用的模拟服务与加解密实现

#![allow(dead_code)]

use std::collections::HashMap;
use std::time::Duration;

use axum::extract::{Multipart, Query};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::prelude::*;
use serde_json::{Map, Value, json};
use tokio::net::TcpListener;

use bizhttp::Cipher;

pub const APP_KEY: &str = "3fccc522c79b4bd0848e6a86fec365a7";
pub const APP_ID: &str = "3130042001040";
pub const MER_NO: &str = "130042001040";
pub const DEVICE_ID: &str = "hbjh_h5";

const PREFIX: &str = "ENC";

/// 确定性的加解密实现：`ENC` + base64(key:json)，签名为 blake3(json + key)
pub struct MockCipher;

impl Cipher for MockCipher {
    fn encrypt(&self, plain: &Value, key: &str) -> String {
        let raw = format!("{}:{}", key, plain);
        format!("{}{}", PREFIX, BASE64_URL_SAFE_NO_PAD.encode(raw))
    }

    fn decrypt(&self, cipher: &str, key: &str) -> Option<Value> {
        let raw = BASE64_URL_SAFE_NO_PAD.decode(cipher.strip_prefix(PREFIX)?).ok()?;
        let raw = String::from_utf8(raw).ok()?;
        let (k, json) = raw.split_once(':')?;
        if k != key {
            return None;
        }
        serde_json::from_str(json).ok()
    }

    fn create_sign(&self, data: &Value, key: &str) -> String {
        blake3::hash(format!("{}{}", data, key).as_bytes())
            .to_hex()
            .to_string()
    }

    fn is_encrypted_data(&self, value: &str) -> bool {
        value
            .strip_prefix(PREFIX)
            .is_some_and(|rest| !rest.is_empty() && BASE64_URL_SAFE_NO_PAD.decode(rest).is_ok())
    }
}

/// 在随机端口上启动模拟服务，返回根地址
pub async fn spawn_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app()).await.unwrap();
    });
    format!("http://{}", addr)
}

/// 一个当前没有服务监听的地址
pub async fn closed_address() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

pub fn app() -> Router {
    Router::new()
        .route("/number/200", get(|| async { StatusCode::OK }).post(|| async { Json(json!({})) }))
        .route(
            "/number/404",
            get(|| async { StatusCode::NOT_FOUND }).post(|| async { StatusCode::NOT_FOUND }),
        )
        .route("/number/500", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }))
        .route("/number/success", post(|| async { reply(json!(123), "SUCCESS", "") }))
        .route("/json/success", post(|| async { reply(json!({ "foo": "bar" }), "SUCCESS", "") }))
        .route("/json/fail", post(|| async { reply(Value::Null, "FAIL", "参数校验未通过") }))
        .route("/json/fail/ERR001", post(|| async { reply(Value::Null, "ERR001", "") }))
        .route(
            "/json/fail/INVALID_TOKEN",
            post(|| async { reply(Value::Null, "INVALID_TOKEN", "登录信息已失效") }),
        )
        .route("/slow", post(slow))
        .route("/echo", get(echo_query).post(echo_body))
        .route("/encrypt/v1/success/json", post(encrypt_v1))
        .route("/encrypt/v2/success/json/params", post(encrypt_v2))
        .route("/encrypt/v2/success/real", post(encrypt_v2_real))
        .route("/file/upload/sign/success", post(upload_signed))
}

fn reply(body: Value, code: &str, des: &str) -> Json<Value> {
    Json(json!({ "body": body, "returnCode": code, "returnDes": des }))
}

fn headers_json(headers: &HeaderMap) -> Value {
    let map: Map<String, Value> = headers
        .iter()
        .map(|(k, v)| (k.to_string(), json!(v.to_str().unwrap_or_default())))
        .collect();
    Value::Object(map)
}

async fn slow() -> Json<Value> {
    tokio::time::sleep(Duration::from_millis(500)).await;
    reply(Value::Null, "SUCCESS", "")
}

async fn echo_query(headers: HeaderMap, Query(query): Query<HashMap<String, String>>) -> Json<Value> {
    reply(json!({ "query": query, "headers": headers_json(&headers) }), "SUCCESS", "")
}

async fn echo_body(headers: HeaderMap, Json(received): Json<Value>) -> Json<Value> {
    reply(json!({ "received": received, "headers": headers_json(&headers) }), "SUCCESS", "")
}

/// v1：请求体是带引号的密文，结果放在响应头里
async fn encrypt_v1(headers: HeaderMap, raw: String) -> (StatusCode, HeaderMap, String) {
    let text = raw.replace('"', "");
    let decrypted = MockCipher.decrypt(&text, APP_KEY);

    let mut out = HeaderMap::new();
    out.insert("content-type", HeaderValue::from_static("application/json"));
    let fail = |out: &mut HeaderMap, des: &str| {
        let des = percent_encode(des);
        out.insert(HeaderName::from_static("returncode"), HeaderValue::from_static("FAIL"));
        out.insert(HeaderName::from_static("returndes"), HeaderValue::from_str(&des).unwrap());
    };

    let Some(plain) = decrypted.filter(|d| d.get("id").is_some()) else {
        fail(&mut out, "解密失败");
        return (StatusCode::OK, out, String::new());
    };

    if let Some(sign) = headers.get("sign") {
        if sign.to_str().unwrap() != MockCipher.create_sign(&plain, APP_KEY) {
            fail(&mut out, "验签失败");
            return (StatusCode::OK, out, String::new());
        }
    }

    out.insert(HeaderName::from_static("returncode"), HeaderValue::from_static("SUCCESS"));
    out.insert(HeaderName::from_static("returndes"), HeaderValue::from_static(""));
    let ed = MockCipher.encrypt(&json!({ "foo": "bar", "id": plain["id"] }), APP_KEY);
    (StatusCode::OK, out, format!("\"{}\"", ed))
}

/// 校验 v2 信封签名，未签名时返回 `true`
fn verify_v2_sign(envelope: &Value) -> bool {
    if envelope["signMethod"] == "NONE" {
        return envelope.get("sign").is_none();
    }
    let mut unsigned = envelope.as_object().cloned().unwrap_or_default();
    let Some(sign) = unsigned.remove("sign") else {
        return false;
    };
    sign == MockCipher.create_sign(&Value::Object(unsigned), APP_KEY)
}

fn open_v2(envelope: &Value) -> Result<Value, Json<Value>> {
    let decrypted = envelope["body"]
        .as_str()
        .and_then(|b| MockCipher.decrypt(b, APP_KEY));
    let Some(plain) = decrypted else {
        return Err(reply(Value::Null, "FAIL", "解密失败"));
    };
    if !verify_v2_sign(envelope) {
        return Err(reply(Value::Null, "FAIL", "验签失败"));
    }
    if plain.get("id").is_none() {
        return Err(reply(Value::Null, "FAIL", "参数错误"));
    }
    Ok(plain)
}

async fn encrypt_v2(Json(envelope): Json<Value>) -> Json<Value> {
    let plain = match open_v2(&envelope) {
        Ok(plain) => plain,
        Err(resp) => return resp,
    };
    Json(json!({
        "appId": envelope["appId"],
        "merNo": envelope["merNo"],
        "deviceId": envelope["deviceId"],
        "encodeMethod": envelope["encodeMethod"],
        "body": MockCipher.encrypt(&json!({ "foo": "bar", "id": plain["id"] }), APP_KEY),
        "returnCode": "SUCCESS",
        "returnDes": "",
    }))
}

async fn encrypt_v2_real(headers: HeaderMap, Json(envelope): Json<Value>) -> Json<Value> {
    let plain = match open_v2(&envelope) {
        Ok(plain) => plain,
        Err(resp) => return resp,
    };
    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    Json(json!({
        "appId": envelope["appId"],
        "body": MockCipher.encrypt(&json!({ "body": plain, "foo": "bar", "token": token }), APP_KEY),
        "returnCode": "SUCCESS",
        "returnDes": "",
    }))
}

/// 上传：签名可能在 `signbody` 或 `x-sign` 头里
async fn upload_signed(headers: HeaderMap, mut multipart: Multipart) -> Json<Value> {
    let header = |k: &str| headers.get(k).and_then(|v| v.to_str().ok()).unwrap_or_default().to_string();
    let identity = json!({
        "appId": header("appid"),
        "msgId": header("msgid"),
        "random": header("random"),
    });
    let received = headers.get("signbody").or_else(|| headers.get("x-sign"));
    let expected = MockCipher.create_sign(&identity, APP_KEY);
    if received.and_then(|v| v.to_str().ok()) != Some(expected.as_str()) {
        return reply(Value::Null, "FAIL", "验签失败");
    }

    let mut fields = Map::new();
    let mut file = Value::Null;
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        match field.file_name().map(str::to_owned) {
            Some(file_name) => {
                let mime = field.content_type().unwrap_or_default().to_string();
                let bytes = field.bytes().await.unwrap();
                file = json!({ "field": name, "fileName": file_name, "mime": mime, "size": bytes.len() });
            }
            None => {
                fields.insert(name, json!(field.text().await.unwrap()));
            }
        }
    }

    reply(
        json!({
            "file": file,
            "fields": fields,
            "authorization": header("authorization"),
            "encodeMethod": header("encodemethod"),
            "signMethod": header("signmethod"),
        }),
        "SUCCESS",
        "",
    )
}

fn percent_encode(s: &str) -> String {
    percent_encoding::utf8_percent_encode(s, percent_encoding::NON_ALPHANUMERIC).to_string()
}
