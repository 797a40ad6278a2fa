use chrono::Local;
use percent_encoding::percent_decode_str;
use rand::Rng;
use reqwest::header::HeaderValue;
use serde_json::{Map, Value};

/// 拼接根地址与请求路径，绝对地址原样返回
pub fn join_url(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    if base.is_empty() {
        return path.to_string();
    }
    if path.is_empty() {
        return base.to_string();
    }

    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// 将查询参数编码后追加到 URL
pub fn append_query(url: &str, params: &Map<String, Value>) -> Result<String, serde_urlencoded::ser::Error> {
    let pairs: Vec<(&str, String)> = params
        .iter()
        .filter_map(|(k, v)| value_to_plain_string(v).map(|v| (k.as_str(), v)))
        .collect();
    if pairs.is_empty() {
        return Ok(url.to_string());
    }

    let query = serde_urlencoded::to_string(&pairs)?;
    let sep = if url.contains('?') { '&' } else { '?' };
    Ok(format!("{}{}{}", url, sep, query))
}

/// JSON 值转为头部/查询参数使用的文本，`null` 返回 `None`
pub fn value_to_plain_string(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// 读取响应头文本并做 URL 解码
///
/// 服务端无法在响应头里直接写入中文，会先 `encodeURIComponent`。
pub fn header_to_string(value: &HeaderValue) -> Option<String> {
    let raw = String::from_utf8_lossy(value.as_bytes());
    let decoded = percent_decode_str(&raw)
        .decode_utf8()
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string());
    Some(decoded)
}

/// 凭据是否有效
pub fn is_valid_token(token: &str) -> bool {
    let t = token.trim();
    if t.is_empty() || t == "undefined" || t == "null" {
        return false;
    }
    !t.contains("object ")
}

/// 生成指定长度的数字字符串
pub fn random_number(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect()
}

/// 生成 21 位消息编号：本地时间到毫秒 + 4 位随机数
pub fn gen_message_id() -> String {
    format!(
        "{}{}",
        Local::now().format("%Y%m%d%H%M%S%3f"),
        random_number(4)
    )
}
