//! 单元测试用的确定性加解密实现

use base64::prelude::*;
use serde_json::Value;

use crate::interfaces::cipher::Cipher;

const PREFIX: &str = "ENC";

/// 以 `ENC` + base64(key:json) 模拟密文，签名为 blake3(json + key)
pub struct TestCipher;

impl Cipher for TestCipher {
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
