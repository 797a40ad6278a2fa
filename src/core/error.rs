//! 错误处理体系 (Error Handling System)
//!
//! 只有请求链路上的配置错误会以 `Err` 形式抛给调用方，且一定发生在网络 I/O 之前。
//! 传输失败、业务失败、Token 失效均通过 [`ApiResponse`](crate::core::model::ApiResponse)
//! 的派生字段与钩子上报。

use reqwest::StatusCode;
use strum::{AsRefStr, Display};
use thiserror::Error;

/// 传输层问题分类 (Transport Problem)
///
/// 序列化后的取值与后端约定一致，例如 `SERVER_ERROR`，会直接作为 `onFail` 的提示语。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Problem {
    /// 4xx
    ClientError,
    /// 5xx
    ServerError,
    /// 请求超时
    TimeoutError,
    /// 无法建立连接
    ConnectionError,
    /// 其他网络层错误
    NetworkError,
    /// 中间件等无法归类的错误
    UnknownError,
}

impl Problem {
    /// 根据 HTTP 状态码归类，2xx/3xx 返回 `None`
    pub fn from_status(status: StatusCode) -> Option<Self> {
        if status.is_client_error() {
            Some(Self::ClientError)
        } else if status.is_server_error() {
            Some(Self::ServerError)
        } else {
            None
        }
    }

    /// 根据底层传输错误归类
    pub fn from_transport(err: &reqwest_middleware::Error) -> Self {
        match err {
            reqwest_middleware::Error::Reqwest(e) if e.is_timeout() => Self::TimeoutError,
            reqwest_middleware::Error::Reqwest(e) if e.is_connect() => Self::ConnectionError,
            reqwest_middleware::Error::Reqwest(_) => Self::NetworkError,
            reqwest_middleware::Error::Middleware(_) => Self::UnknownError,
        }
    }
}

/// 全局错误定义
#[derive(Error, Debug)]
pub enum HttpError {
    /// 配置错误：缺少 appKey、加密版本非法、v2 缺少 body 等
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Middleware error: {0}")]
    Middleware(#[from] reqwest_middleware::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid header: {0}")]
    Header(String),

    #[error("Upload error: {0}")]
    Upload(String),
}

/// 全局 Result 别名
pub type Result<T> = std::result::Result<T, HttpError>;

impl HttpError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// 是否属于配置类错误
    pub fn is_config(&self) -> bool {
        matches!(self, HttpError::Config(_) | HttpError::Settings(_))
    }
}
