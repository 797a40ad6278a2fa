//! 加解密能力接口
//!
//! 对称加密与签名算法由外部实现注入，本库只关心报文如何被加密、签名与还原。

use serde_json::Value;

/// `signMethod` 在未签名时的取值
pub const SIGN_METHOD_NONE: &str = "NONE";

/// `encodeMethod` 在报文未加密时的取值
pub const ENCODE_METHOD_NONE: &str = "NONE";

/// 加解密与签名能力
///
/// 所有方法都应当是无状态的纯函数。
pub trait Cipher: Send + Sync {
    /// 加密任意 JSON 值，返回密文字符串
    fn encrypt(&self, plain: &Value, key: &str) -> String;

    /// 解密密文，失败时返回 `None`
    fn decrypt(&self, cipher: &str, key: &str) -> Option<Value>;

    /// 对数据生成签名
    fn create_sign(&self, data: &Value, key: &str) -> String;

    /// 判断字符串是否具有密文的形态
    fn is_encrypted_data(&self, value: &str) -> bool;

    /// 写入 `encodeMethod` 的算法标识
    fn encode_method(&self) -> &str {
        "AES"
    }

    /// 写入 `signMethod` 的算法标识
    fn sign_method(&self) -> &str {
        "MD5"
    }
}
