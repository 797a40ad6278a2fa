//! 配置管理系统 (Configuration Management)
//!
//! `ClientSettings` 是可序列化的部分，支持从 `config.toml` 与 `BIZHTTP_*` 环境变量加载；
//! `ClientConfig` 在其上附加钩子与加解密能力，创建客户端后不再修改。
//! 单次调用的覆盖项 (`CallOptions`) 通过 [`ClientConfig::merged`] 派生出新的副本。

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use bon::Builder;
use config::{Config, Environment, File};
use reqwest::header::HeaderMap;
use serde::{Deserialize, Deserializer};

use crate::core::error::{HttpError, Result};
use crate::core::model::BODY_KEY;
use crate::interfaces::cipher::Cipher;
use crate::interfaces::hooks::{AuthorizationSource, FailHook, Hooks};

/// 加密协议版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EncryptVersion {
    /// 整个请求体加密为一个密文字符串
    V1,
    /// 仅加密 `body` 字段，公共参数保留在外层
    #[default]
    V2,
}

impl FromStr for EncryptVersion {
    type Err = HttpError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "1" | "v1" | "V1" => Ok(Self::V1),
            "2" | "v2" | "V2" => Ok(Self::V2),
            other => Err(HttpError::config(format!(
                "invalid encryptVersion: {:?}, expected 1 or 2",
                other
            ))),
        }
    }
}

impl fmt::Display for EncryptVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncryptVersion::V1 => write!(f, "1"),
            EncryptVersion::V2 => write!(f, "2"),
        }
    }
}

impl<'de> Deserialize<'de> for EncryptVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Num(i64),
            Text(String),
        }

        let raw = match Raw::deserialize(deserializer)? {
            Raw::Num(n) => n.to_string(),
            Raw::Text(s) => s,
        };
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// 非加密时业务数据的包装方式
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NestBizData {
    /// 嵌套在 `body` 下
    #[default]
    Default,
    /// 与公共参数平铺合并
    Flat,
    /// 嵌套在自定义字段下
    CustomKey(String),
}

impl NestBizData {
    /// 业务数据的嵌套字段，`None` 表示平铺
    pub fn key(&self) -> Option<&str> {
        match self {
            NestBizData::Default => Some(BODY_KEY),
            NestBizData::Flat => None,
            NestBizData::CustomKey(k) => Some(k.as_str()),
        }
    }
}

impl From<bool> for NestBizData {
    fn from(nest: bool) -> Self {
        if nest { Self::Default } else { Self::Flat }
    }
}

impl From<&str> for NestBizData {
    fn from(key: &str) -> Self {
        if key.is_empty() {
            Self::Default
        } else {
            Self::CustomKey(key.to_string())
        }
    }
}

impl<'de> Deserialize<'de> for NestBizData {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Flag(bool),
            Key(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Flag(b) => b.into(),
            Raw::Key(k) => k.as_str().into(),
        })
    }
}

/// 可序列化的客户端配置
#[derive(Debug, Clone, Default, Deserialize, Builder)]
pub struct ClientSettings {
    /// 接口根地址
    #[serde(default)]
    #[builder(into, default)]
    pub base_address: String,

    /// 是否加密请求体
    #[serde(default)]
    #[builder(default)]
    pub use_encrypt: bool,

    /// 是否签名
    #[serde(default)]
    #[builder(default)]
    pub use_sign: bool,

    #[serde(default)]
    #[builder(default)]
    pub encrypt_version: EncryptVersion,

    /// 渠道秘钥，加密/签名时必填
    #[builder(into)]
    pub app_key: Option<String>,

    #[serde(default)]
    #[builder(default)]
    pub nest_biz_data: NestBizData,

    /// 不注册业务失败校验
    #[serde(default)]
    #[builder(default)]
    pub no_fail: bool,

    /// 不注册业务状态码转换
    #[serde(default)]
    #[builder(default)]
    pub no_status_transform: bool,

    /// 单次请求超时（毫秒）
    pub timeout_ms: Option<u64>,

    /// 实例级默认请求头
    #[serde(default)]
    #[builder(default)]
    pub headers: HashMap<String, String>,
}

impl ClientSettings {
    /// 加载配置：可选的 TOML 文件，再叠加 `BIZHTTP_*` 环境变量
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let builder = Config::builder();

        let builder = if path.exists() {
            builder.add_source(File::from(path))
        } else {
            builder
        };

        let settings = builder
            .add_source(Environment::with_prefix("BIZHTTP").try_parsing(true))
            .build()
            .map_err(HttpError::Settings)?;
        settings.try_deserialize().map_err(HttpError::Settings)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// 有效的 appKey（空字符串视为未配置）
    pub fn app_key(&self) -> Option<&str> {
        self.app_key.as_deref().filter(|k| !k.is_empty())
    }
}

/// 渠道信息，供基础客户端与上传客户端生成公共参数
#[derive(Debug, Clone, Default, Deserialize, Builder)]
#[serde(rename_all = "camelCase")]
pub struct AppProfile {
    /// 渠道编号
    #[builder(into)]
    pub app_id: String,
    /// 商户编号
    #[serde(default)]
    #[builder(into, default)]
    pub mer_no: String,
    /// 设备编号
    #[serde(default)]
    #[builder(into, default)]
    pub device_id: String,
    /// 是否加密
    #[serde(default)]
    #[builder(default)]
    pub encrypt: bool,
    /// 渠道秘钥
    #[builder(into)]
    pub app_key: Option<String>,
    /// 登录凭据来源
    #[serde(skip)]
    pub authorization: Option<AuthorizationSource>,
}

impl AppProfile {
    pub fn validate(&self) -> Result<()> {
        if self.app_id.trim().is_empty() {
            return Err(HttpError::config("appConfig.appId is required"));
        }
        Ok(())
    }
}

/// 客户端配置
#[derive(Clone, Default, Builder)]
pub struct ClientConfig {
    #[builder(default)]
    pub settings: ClientSettings,
    #[builder(default)]
    pub hooks: Hooks,
    /// 加解密与签名能力，开启加密或签名时必须提供
    pub cipher: Option<Arc<dyn Cipher>>,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("settings", &self.settings)
            .field("hooks", &self.hooks)
            .field("cipher", &self.cipher.is_some())
            .finish()
    }
}

impl ClientConfig {
    pub fn new(settings: ClientSettings) -> Self {
        Self {
            settings,
            ..Default::default()
        }
    }

    pub fn with_hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_cipher(mut self, cipher: Arc<dyn Cipher>) -> Self {
        self.cipher = Some(cipher);
        self
    }

    pub fn base_address(&self) -> &str {
        &self.settings.base_address
    }

    /// 校验加密相关配置
    pub fn validate(&self) -> Result<()> {
        let s = &self.settings;
        let base = s.base_address.trim();
        if base.is_empty() {
            return Err(HttpError::config("baseAddress is required"));
        }
        if let Err(e) = reqwest::Url::parse(base) {
            return Err(HttpError::config(format!("invalid baseAddress {}: {}", base, e)));
        }
        if s.use_encrypt || s.use_sign {
            if s.app_key().is_none() {
                return Err(HttpError::config("appKey is required when encryption or signing is enabled"));
            }
            if self.cipher.is_none() {
                return Err(HttpError::config("cipher is required when encryption or signing is enabled"));
            }
        }
        Ok(())
    }

    /// 取得 appKey 与加解密能力，缺失即为配置错误
    pub fn crypto(&self) -> Result<(&str, &dyn Cipher)> {
        let key = self
            .settings
            .app_key()
            .ok_or_else(|| HttpError::config("appKey is required when encryption is enabled"))?;
        let cipher = self
            .cipher
            .as_deref()
            .ok_or_else(|| HttpError::config("cipher is required when encryption is enabled"))?;
        Ok((key, cipher))
    }

    /// 与单次调用的覆盖项合并，返回新副本，自身不变
    pub fn merged(&self, overrides: &CallOptions) -> ClientConfig {
        let mut config = self.clone();
        let s = &mut config.settings;
        if let Some(base) = &overrides.base_address {
            s.base_address = base.clone();
        }
        if let Some(v) = overrides.use_encrypt {
            s.use_encrypt = v;
        }
        if let Some(v) = overrides.use_sign {
            s.use_sign = v;
        }
        if let Some(v) = overrides.encrypt_version {
            s.encrypt_version = v;
        }
        if let Some(v) = &overrides.nest_biz_data {
            s.nest_biz_data = v.clone();
        }
        if let Some(v) = overrides.no_fail {
            s.no_fail = v;
        }
        if let Some(v) = overrides.no_status_transform {
            s.no_status_transform = v;
        }
        if let Some(timeout) = overrides.timeout {
            s.timeout_ms = Some(timeout.as_millis() as u64);
        }
        if let Some(hook) = &overrides.on_fail {
            config.hooks.on_fail = Some(hook.clone());
        }
        config
    }
}

/// 单次调用的覆盖项
///
/// 只对当前调用生效；它可以关闭工厂已注册的变换，但不能追加工厂未注册的变换。
#[derive(Clone, Default, Builder)]
pub struct CallOptions {
    #[builder(into)]
    pub base_address: Option<String>,
    pub use_encrypt: Option<bool>,
    pub use_sign: Option<bool>,
    pub encrypt_version: Option<EncryptVersion>,
    pub nest_biz_data: Option<NestBizData>,
    pub no_fail: Option<bool>,
    pub no_status_transform: Option<bool>,
    pub timeout: Option<Duration>,
    /// 追加到本次请求的请求头
    #[builder(default)]
    pub headers: HeaderMap,
    pub on_fail: Option<FailHook>,
}

impl fmt::Debug for CallOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallOptions")
            .field("base_address", &self.base_address)
            .field("use_encrypt", &self.use_encrypt)
            .field("use_sign", &self.use_sign)
            .field("encrypt_version", &self.encrypt_version)
            .field("nest_biz_data", &self.nest_biz_data)
            .field("no_fail", &self.no_fail)
            .field("no_status_transform", &self.no_status_transform)
            .field("timeout", &self.timeout)
            .field("headers", &self.headers)
            .field("on_fail", &self.on_fail.is_some())
            .finish()
    }
}
