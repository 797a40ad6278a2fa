//! 业务钩子 (Business Hooks)
//!
//! 所有钩子都是可选的；未配置即视为不存在，调用处先判断再调用。

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::{self, BoxFuture};
use serde_json::{Map, Value};

use crate::core::model::{ApiResponse, OutgoingRequest};
use crate::utils::is_valid_token;

/// 判定响应是否为 Token 失效
pub type InvalidTokenPredicate = Arc<dyn Fn(&Value, &ApiResponse) -> bool + Send + Sync>;
/// Token 失效回调
pub type InvalidTokenHook = Arc<dyn Fn(&ApiResponse) + Send + Sync>;
/// 失败回调，参数为提示语与响应
pub type FailHook = Arc<dyn Fn(&str, &ApiResponse) + Send + Sync>;

type SyncParams = Arc<dyn Fn(&OutgoingRequest) -> Map<String, Value> + Send + Sync>;
type AsyncParams = Arc<dyn Fn(&OutgoingRequest) -> BoxFuture<'static, Map<String, Value>> + Send + Sync>;

/// 公共参数/公共请求头的来源
///
/// 可以是固定的对象、同步函数或异步函数。
#[derive(Clone)]
pub enum ParamSource {
    Static(Map<String, Value>),
    Sync(SyncParams),
    Async(AsyncParams),
}

impl ParamSource {
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&OutgoingRequest) -> Map<String, Value> + Send + Sync + 'static,
    {
        Self::Sync(Arc::new(f))
    }

    pub fn from_async<F, Fut>(f: F) -> Self
    where
        F: Fn(&OutgoingRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Map<String, Value>> + Send + 'static,
    {
        Self::Async(Arc::new(move |req: &OutgoingRequest| f(req).boxed()))
    }

    /// 由 JSON 对象构造，非对象值视为空
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::Static(map),
            _ => Self::Static(Map::new()),
        }
    }

    pub async fn resolve(&self, req: &OutgoingRequest) -> Map<String, Value> {
        self.resolve_boxed(req).await
    }

    /// 立即读取请求所需的内容，返回不借用请求的 future，便于组合多个来源
    pub fn resolve_boxed(&self, req: &OutgoingRequest) -> BoxFuture<'static, Map<String, Value>> {
        match self {
            ParamSource::Static(map) => future::ready(map.clone()).boxed(),
            ParamSource::Sync(f) => future::ready(f(req)).boxed(),
            ParamSource::Async(f) => f(req),
        }
    }
}

impl fmt::Debug for ParamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamSource::Static(map) => f.debug_tuple("Static").field(map).finish(),
            ParamSource::Sync(_) => write!(f, "Sync(..)"),
            ParamSource::Async(_) => write!(f, "Async(..)"),
        }
    }
}

type SyncToken = Arc<dyn Fn() -> Option<String> + Send + Sync>;
type AsyncToken = Arc<dyn Fn() -> BoxFuture<'static, Option<String>> + Send + Sync>;

/// 登录凭据来源：字面量、同步函数或异步函数
#[derive(Clone)]
pub enum AuthorizationSource {
    Literal(String),
    Sync(SyncToken),
    Async(AsyncToken),
}

impl AuthorizationSource {
    pub fn literal(token: impl Into<String>) -> Self {
        Self::Literal(token.into())
    }

    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn() -> Option<String> + Send + Sync + 'static,
    {
        Self::Sync(Arc::new(f))
    }

    pub fn from_async<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<String>> + Send + 'static,
    {
        Self::Async(Arc::new(move || f().boxed()))
    }

    /// 解析凭据，无效值（空串、"undefined"、"null" 等）视为不存在
    pub async fn resolve(&self) -> Option<String> {
        let token = match self {
            AuthorizationSource::Literal(t) => Some(t.clone()),
            AuthorizationSource::Sync(f) => f(),
            AuthorizationSource::Async(f) => f().await,
        };
        token.filter(|t| is_valid_token(t))
    }
}

impl fmt::Debug for AuthorizationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthorizationSource::Literal(_) => write!(f, "Literal(***)"),
            AuthorizationSource::Sync(_) => write!(f, "Sync(..)"),
            AuthorizationSource::Async(_) => write!(f, "Async(..)"),
        }
    }
}

/// 钩子集合
#[derive(Clone, Default)]
pub struct Hooks {
    pub is_invalid_token: Option<InvalidTokenPredicate>,
    pub on_invalid_token: Option<InvalidTokenHook>,
    pub on_fail: Option<FailHook>,
    pub common_params: Option<ParamSource>,
    pub common_headers: Option<ParamSource>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_is_invalid_token<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value, &ApiResponse) -> bool + Send + Sync + 'static,
    {
        self.is_invalid_token = Some(Arc::new(f));
        self
    }

    pub fn with_on_invalid_token<F>(mut self, f: F) -> Self
    where
        F: Fn(&ApiResponse) + Send + Sync + 'static,
    {
        self.on_invalid_token = Some(Arc::new(f));
        self
    }

    pub fn with_on_fail<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &ApiResponse) + Send + Sync + 'static,
    {
        self.on_fail = Some(Arc::new(f));
        self
    }

    pub fn with_common_params(mut self, source: ParamSource) -> Self {
        self.common_params = Some(source);
        self
    }

    pub fn with_common_headers(mut self, source: ParamSource) -> Self {
        self.common_headers = Some(source);
        self
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("is_invalid_token", &self.is_invalid_token.is_some())
            .field("on_invalid_token", &self.on_invalid_token.is_some())
            .field("on_fail", &self.on_fail.is_some())
            .field("common_params", &self.common_params)
            .field("common_headers", &self.common_headers)
            .finish()
    }
}
