//! 请求/响应数据模型 (Request & Response Model)
//!
//! `OutgoingRequest` 在请求变换链中被逐步改写，`ApiResponse` 在响应变换链中被补充派生字段。
//! 两者都只存活于单次调用之内。

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::{Map, Value};

use crate::core::config::ClientConfig;
use crate::core::error::{HttpError, Problem, Result};
use crate::utils::{header_to_string, value_to_plain_string};

/// 业务成功状态码
pub const RETURN_CODE_SUCCESS: &str = "SUCCESS";
/// 业务失败状态码（服务端通用约定）
pub const RETURN_CODE_FAIL: &str = "FAIL";
/// Token 失效状态码
pub const RETURN_CODE_INVALID_TOKEN: &str = "INVALID_TOKEN";

/// 业务状态码字段
pub const RETURN_CODE_KEY: &str = "returnCode";
/// 业务描述字段
pub const RETURN_DES_KEY: &str = "returnDes";
/// v2 报文中承载业务数据的字段
pub const BODY_KEY: &str = "body";
/// 表单请求中公共参数的旁路字段
pub const PARAMS_FIELD: &str = "params";

/// 请求体
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    /// 调用方未提供请求体
    #[default]
    Empty,
    Json(Value),
    /// multipart/form-data
    Form(FormData),
}

impl RequestBody {
    /// 转换为 JSON 值，`Empty` 视为空对象，表单返回 `None`
    pub fn into_json(self) -> Option<Value> {
        match self {
            RequestBody::Empty => Some(Value::Object(Map::new())),
            RequestBody::Json(v) => Some(v),
            RequestBody::Form(_) => None,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            RequestBody::Json(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_form(&self) -> bool {
        matches!(self, RequestBody::Form(_))
    }
}

impl From<Value> for RequestBody {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => RequestBody::Empty,
            v => RequestBody::Json(v),
        }
    }
}

impl From<FormData> for RequestBody {
    fn from(form: FormData) -> Self {
        RequestBody::Form(form)
    }
}

/// 表单字段
#[derive(Debug, Clone)]
pub enum FormPart {
    Text(String),
    File {
        bytes: Bytes,
        file_name: String,
        mime: String,
    },
}

/// 可检视的 multipart 表单
///
/// `reqwest::multipart::Form` 构建后无法再读取字段，变换链需要判断 `params` 是否已存在，
/// 所以表单在发送前一直以该结构保存。
#[derive(Debug, Clone, Default)]
pub struct FormData {
    parts: Vec<(String, FormPart)>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.append_text(name, value);
        self
    }

    pub fn file(
        mut self,
        name: impl Into<String>,
        bytes: impl Into<Bytes>,
        file_name: impl Into<String>,
        mime: impl Into<String>,
    ) -> Self {
        self.parts.push((
            name.into(),
            FormPart::File {
                bytes: bytes.into(),
                file_name: file_name.into(),
                mime: mime.into(),
            },
        ));
        self
    }

    pub fn append_text(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.parts.push((name.into(), FormPart::Text(value.into())));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.parts.iter().any(|(k, _)| k == name)
    }

    /// 读取文本字段（若有同名字段，取最后一个）
    pub fn get_text(&self, name: &str) -> Option<&str> {
        self.parts.iter().rev().find_map(|(k, part)| match part {
            FormPart::Text(v) if k == name => Some(v.as_str()),
            _ => None,
        })
    }

    pub fn parts(&self) -> &[(String, FormPart)] {
        &self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// 转换为 reqwest 的 multipart 表单
    pub fn into_multipart(self) -> Result<reqwest::multipart::Form> {
        let mut form = reqwest::multipart::Form::new();
        for (name, part) in self.parts {
            form = match part {
                FormPart::Text(v) => form.text(name, v),
                FormPart::File {
                    bytes,
                    file_name,
                    mime,
                } => {
                    let part = reqwest::multipart::Part::bytes(bytes.to_vec())
                        .file_name(file_name)
                        .mime_str(&mime)
                        .map_err(HttpError::Network)?;
                    form.part(name, part)
                }
            };
        }
        Ok(form)
    }
}

/// 发出前的请求
///
/// 请求变换按注册顺序依次改写 `data` 与 `headers`。
#[derive(Debug, Clone)]
pub struct OutgoingRequest {
    pub method: Method,
    pub url: String,
    pub data: RequestBody,
    /// 查询参数（GET/HEAD/DELETE 的调用方数据落在这里）
    pub params: Map<String, Value>,
    pub headers: HeaderMap,
    pub timeout: Option<Duration>,
    /// 本次调用生效的配置（实例配置与单次覆盖合并后的副本）
    pub config: Arc<ClientConfig>,
}

impl OutgoingRequest {
    pub fn new(method: Method, url: impl Into<String>, config: Arc<ClientConfig>) -> Self {
        Self {
            method,
            url: url.into(),
            data: RequestBody::Empty,
            params: Map::new(),
            headers: HeaderMap::new(),
            timeout: None,
            config,
        }
    }

    /// 该方法是否携带请求体
    pub fn has_body(&self) -> bool {
        !matches!(self.method, Method::GET | Method::HEAD | Method::DELETE)
    }

    /// 写入（覆盖）一个请求头
    pub fn set_header(&mut self, key: &str, value: &str) -> Result<()> {
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|e| HttpError::Header(format!("{}: {}", key, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| HttpError::Header(format!("{}: {}", key, e)))?;
        self.headers.insert(name, value);
        Ok(())
    }

    /// 批量写入请求头，非字符串值按 JSON 文本写入，`null` 跳过
    pub fn assign_headers(&mut self, headers: Map<String, Value>) -> Result<()> {
        for (k, v) in headers {
            if let Some(v) = value_to_plain_string(&v) {
                self.set_header(&k, &v)?;
            }
        }
        Ok(())
    }
}

/// 归一化后的响应
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// HTTP 状态码为 2xx
    pub ok: bool,
    /// 网络失败时为 `None`
    pub status: Option<u16>,
    pub problem: Option<Problem>,
    /// 底层错误描述，仅在传输失败时存在
    pub original_error: Option<String>,
    /// 原始（或解密后的）响应体
    pub data: Option<Value>,
    pub headers: HeaderMap,
    pub duration: Duration,
    /// 产生本响应的调用配置
    pub config: Arc<ClientConfig>,

    /// 业务是否成功
    pub success: bool,
    /// 业务状态码
    pub code: Option<String>,
    /// 业务描述
    pub msg: Option<String>,
    /// Token 校验结果，失效时失败钩子不再触发
    pub invalid_token: bool,
}

impl ApiResponse {
    pub fn new(config: Arc<ClientConfig>) -> Self {
        Self {
            ok: false,
            status: None,
            problem: None,
            original_error: None,
            data: None,
            headers: HeaderMap::new(),
            duration: Duration::ZERO,
            config,
            success: false,
            code: None,
            msg: None,
            invalid_token: false,
        }
    }

    /// 传输层失败的响应
    pub fn failed(
        problem: Problem,
        error: impl Into<String>,
        config: Arc<ClientConfig>,
        duration: Duration,
    ) -> Self {
        Self {
            problem: Some(problem),
            original_error: Some(error.into()),
            duration,
            ..Self::new(config)
        }
    }

    /// 读取响应头（大小写不敏感，值做 URL 解码）
    pub fn header(&self, key: &str) -> Option<String> {
        self.headers.get(key).and_then(header_to_string)
    }

    /// 读取响应体顶层字段的字符串值
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.as_ref()?.get(key)?.as_str()
    }

    /// 业务状态码，响应头优先于响应体
    pub fn business_code(&self) -> Option<String> {
        self.header(RETURN_CODE_KEY)
            .or_else(|| self.data_str(RETURN_CODE_KEY).map(str::to_owned))
    }

    /// 业务描述，响应头优先于响应体
    pub fn business_message(&self) -> Option<String> {
        self.header(RETURN_DES_KEY)
            .or_else(|| self.data_str(RETURN_DES_KEY).map(str::to_owned))
    }

    /// v2 报文中的业务数据
    pub fn body(&self) -> Option<&Value> {
        self.data.as_ref()?.get(BODY_KEY)
    }
}
