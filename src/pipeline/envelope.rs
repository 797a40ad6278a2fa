//! 报文信封策略 (Envelope Strategies)
//!
//! v1 与 v2 的加密 (`seal`) 与解密 (`open`) 成对放在一起，便于核对往返对称性。
//!
//! - v1：整个业务报文加密为一个密文字符串，签名（对明文）写在请求头。
//! - v2：只加密 `body` 字段，公共参数保持明文；`encodeMethod`/`signMethod`/`sign`
//!   写在信封顶层，签名覆盖加密后的信封。

use serde_json::{Map, Value};
use thiserror::Error;

use crate::core::config::EncryptVersion;
use crate::core::error::{HttpError, Result};
use crate::core::model::BODY_KEY;
use crate::interfaces::cipher::{Cipher, SIGN_METHOD_NONE};

pub const ENCODE_METHOD_KEY: &str = "encodeMethod";
pub const SIGN_METHOD_KEY: &str = "signMethod";
/// 签名字段（v1 为请求头，v2 为信封顶层字段）
pub const SIGN_KEY: &str = "sign";

/// 加密后的报文
#[derive(Debug, Clone)]
pub struct Sealed {
    pub data: Value,
    /// 需要写入请求头的字段
    pub headers: Vec<(&'static str, String)>,
}

/// 解密失败原因，均为可恢复错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OpenError {
    #[error("response data is not ciphertext")]
    NotEncrypted,
    #[error("response body field is missing or not ciphertext")]
    BodyNotEncrypted,
    #[error("cipher failed to decrypt the data")]
    DecryptFailed,
}

/// 合并公共参数与业务数据时，业务数据的嵌套字段（`None` 为平铺）
pub fn nest_key(version: EncryptVersion) -> Option<&'static str> {
    match version {
        EncryptVersion::V1 => None,
        EncryptVersion::V2 => Some(BODY_KEY),
    }
}

/// 加密请求报文
pub fn seal(
    version: EncryptVersion,
    data: Value,
    key: &str,
    use_sign: bool,
    cipher: &dyn Cipher,
) -> Result<Sealed> {
    match version {
        EncryptVersion::V1 => Ok(seal_v1(data, key, use_sign, cipher)),
        EncryptVersion::V2 => seal_v2(data, key, use_sign, cipher),
    }
}

/// 还原响应报文，失败时 `data` 保持原样
pub fn open(
    version: EncryptVersion,
    data: &mut Value,
    key: &str,
    cipher: &dyn Cipher,
) -> std::result::Result<(), OpenError> {
    match version {
        EncryptVersion::V1 => open_v1(data, key, cipher),
        EncryptVersion::V2 => open_v2(data, key, cipher),
    }
}

fn seal_v1(data: Value, key: &str, use_sign: bool, cipher: &dyn Cipher) -> Sealed {
    let mut headers = Vec::new();
    if use_sign {
        headers.push((SIGN_KEY, cipher.create_sign(&data, key)));
        headers.push((ENCODE_METHOD_KEY, cipher.encode_method().to_string()));
        headers.push((SIGN_METHOD_KEY, cipher.sign_method().to_string()));
    }
    Sealed {
        data: Value::String(cipher.encrypt(&data, key)),
        headers,
    }
}

/// v1 密文的传输归一化
///
/// JSON 编码会把密文字符串包在引号里，解密前去掉所有引号字符。
pub fn normalize_v1_ciphertext(raw: &str) -> String {
    raw.replace('"', "")
}

fn open_v1(data: &mut Value, key: &str, cipher: &dyn Cipher) -> std::result::Result<(), OpenError> {
    let Value::String(raw) = &*data else {
        return Err(OpenError::NotEncrypted);
    };
    let text = normalize_v1_ciphertext(raw);
    if !cipher.is_encrypted_data(&text) {
        return Err(OpenError::NotEncrypted);
    }
    let plain = cipher.decrypt(&text, key).ok_or(OpenError::DecryptFailed)?;
    *data = plain;
    Ok(())
}

fn seal_v2(data: Value, key: &str, use_sign: bool, cipher: &dyn Cipher) -> Result<Sealed> {
    let mut envelope: Map<String, Value> = match data {
        Value::Object(map) => map,
        _ => return Err(HttpError::config("encryptVersion 2 requires an object envelope")),
    };

    let body = match envelope.get(BODY_KEY) {
        Some(body) if !body.is_null() => body,
        _ => {
            return Err(HttpError::config(
                "encryptVersion 2 requires a `body` field to encrypt",
            ));
        }
    };

    let encrypted = cipher.encrypt(body, key);
    envelope.insert(BODY_KEY.into(), Value::String(encrypted));
    envelope.insert(ENCODE_METHOD_KEY.into(), cipher.encode_method().into());

    if use_sign {
        envelope.insert(SIGN_METHOD_KEY.into(), cipher.sign_method().into());
        let sign = cipher.create_sign(&Value::Object(envelope.clone()), key);
        envelope.insert(SIGN_KEY.into(), Value::String(sign));
    } else {
        envelope.insert(SIGN_METHOD_KEY.into(), SIGN_METHOD_NONE.into());
    }

    Ok(Sealed {
        data: Value::Object(envelope),
        headers: Vec::new(),
    })
}

fn open_v2(data: &mut Value, key: &str, cipher: &dyn Cipher) -> std::result::Result<(), OpenError> {
    let Some(body) = data.get_mut(BODY_KEY) else {
        return Err(OpenError::BodyNotEncrypted);
    };
    let Value::String(text) = &*body else {
        return Err(OpenError::BodyNotEncrypted);
    };
    if !cipher.is_encrypted_data(text) {
        return Err(OpenError::BodyNotEncrypted);
    }
    let plain = cipher.decrypt(text, key).ok_or(OpenError::DecryptFailed)?;
    *body = plain;
    Ok(())
}
