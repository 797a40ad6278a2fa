//! 客户端工厂 (Client Factories)
//!
//! 变换在创建时按固定顺序一次性注册，之后的调用只能通过 [`CallOptions`] 关闭其中一部分。

use std::sync::Arc;

use reqwest::Method;
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::core::config::{AppProfile, CallOptions, ClientConfig};
use crate::core::error::{HttpError, Result};
use crate::core::model::{ApiResponse, OutgoingRequest, RequestBody};
use crate::interfaces::hooks::{AuthorizationSource, ParamSource};
use crate::interfaces::transform::{RequestTransform, ResponseTransform};
use crate::network::service::HttpService;
use crate::network::session::Session;
use crate::pipeline::request::{CommonHeadersTransform, CommonParamsTransform, EncryptTransform};
use crate::pipeline::response::{DecryptTransform, FailTransform, StatusTransform, TokenCheckTransform};

pub const AUTHORIZATION_HEADER: &str = "Authorization";

/// 业务 HTTP 客户端
///
/// 克隆代价很低，克隆体共享变换链与实例请求头。
#[derive(Clone)]
pub struct HttpClient {
    service: Arc<HttpService>,
    config: Arc<ClientConfig>,
    session: Arc<Session>,
}

/// 按配置创建客户端
///
/// 注册顺序：
/// - 请求：公共参数（总是）→ 公共请求头（配置了解析器时）→ 加密（开启加密时）
/// - 响应：解密（开启加密时）→ Token 校验（总是）→ 失败校验（除非 `no_fail`）→ 状态码转换（除非 `no_status_transform`）
pub fn create_client(config: ClientConfig) -> Result<HttpClient> {
    config.validate()?;
    let s = &config.settings;

    let mut service = HttpService::new()?;
    service.add_request_transform(CommonParamsTransform);
    if config.hooks.common_headers.is_some() {
        service.add_request_transform(CommonHeadersTransform);
    }
    if s.use_encrypt {
        service.add_request_transform(EncryptTransform);
        service.add_response_transform(DecryptTransform);
    }
    service.add_response_transform(TokenCheckTransform);
    if !s.no_fail {
        service.add_response_transform(FailTransform);
    }
    if !s.no_status_transform {
        service.add_response_transform(StatusTransform);
    }

    let session = Arc::new(Session::new());
    session.set_headers(s.headers.iter().map(|(k, v)| (k.as_str(), v.as_str())))?;

    debug!(
        "client created: base={}, encrypt={}, version={}, request transforms={}, response transforms={}",
        s.base_address,
        s.use_encrypt,
        s.encrypt_version,
        service.request_transforms().len(),
        service.response_transforms().len()
    );

    Ok(HttpClient {
        service: Arc::new(service),
        config: Arc::new(config),
        session,
    })
}

/// 按渠道信息创建基础客户端
///
/// 渠道的 `appId`/`merNo`/`deviceId` 作为公共参数（配置中已有公共参数解析器时以配置为准），
/// 登录凭据每次调用解析一次写入 `Authorization`，是否加密跟随渠道。
pub fn create_base_client(app: AppProfile, mut config: ClientConfig) -> Result<HttpClient> {
    app.validate()?;

    config.settings.use_encrypt = app.encrypt;
    if let Some(key) = app.app_key.as_deref().filter(|k| !k.is_empty()) {
        config.settings.app_key = Some(key.to_string());
    }

    if config.hooks.common_params.is_none() {
        let mut params = Map::new();
        for (k, v) in [("appId", &app.app_id), ("merNo", &app.mer_no), ("deviceId", &app.device_id)] {
            if !v.is_empty() {
                params.insert(k.to_string(), json!(v));
            }
        }
        config.hooks.common_params = Some(ParamSource::Static(params));
    }

    if let Some(auth) = app.authorization {
        let base = config.hooks.common_headers.take();
        config.hooks.common_headers = Some(with_authorization(base, auth, Map::new));
    }

    create_client(config)
}

/// 在已有请求头来源之上叠加 `Authorization`，`extra` 生成每次调用的附加字段
pub(crate) fn with_authorization<F>(base: Option<ParamSource>, auth: AuthorizationSource, extra: F) -> ParamSource
where
    F: Fn() -> Map<String, Value> + Send + Sync + 'static,
{
    ParamSource::from_async(move |req: &OutgoingRequest| {
        let base = base.as_ref().map(|source| source.resolve_boxed(req));
        let auth = auth.clone();
        let mut headers = extra();
        async move {
            if let Some(base) = base {
                headers.extend(base.await);
            }
            if let Some(token) = auth.resolve().await {
                headers.insert(AUTHORIZATION_HEADER.to_string(), Value::String(token));
            }
            headers
        }
    })
}

impl HttpClient {
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn base_address(&self) -> &str {
        self.config.base_address()
    }

    /// 设置实例请求头，对之后的所有请求生效
    pub fn set_header(&self, key: &str, value: &str) -> Result<()> {
        self.session.set_header(key, value)
    }

    pub fn set_headers<'a, I>(&self, headers: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        self.session.set_headers(headers)
    }

    pub fn headers(&self) -> reqwest::header::HeaderMap {
        self.session.headers()
    }

    pub fn request_transforms(&self) -> &[Arc<dyn RequestTransform>] {
        self.service.request_transforms()
    }

    pub fn response_transforms(&self) -> &[Arc<dyn ResponseTransform>] {
        self.service.response_transforms()
    }

    /// 发起请求
    ///
    /// GET/HEAD/DELETE 的 `data` 作为查询参数，必须是对象或空。
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        data: impl Into<RequestBody>,
        options: CallOptions,
    ) -> Result<ApiResponse> {
        let mut config = self.config.merged(&options);
        // 未注册加密变换的实例，单次调用无法开启加密
        if !self.config.settings.use_encrypt {
            config.settings.use_encrypt = false;
        }

        let mut req = OutgoingRequest::new(method, url, Arc::new(config));
        req.headers = options.headers;
        req.timeout = options.timeout;

        let data = data.into();
        if req.has_body() {
            req.data = data;
        } else {
            req.params = into_query(data)?;
        }

        self.service.execute(req, self.session.clone()).await
    }

    pub async fn get(&self, url: &str, params: Value, options: CallOptions) -> Result<ApiResponse> {
        self.request(Method::GET, url, params, options).await
    }

    pub async fn delete(&self, url: &str, params: Value, options: CallOptions) -> Result<ApiResponse> {
        self.request(Method::DELETE, url, params, options).await
    }

    pub async fn head(&self, url: &str, params: Value, options: CallOptions) -> Result<ApiResponse> {
        self.request(Method::HEAD, url, params, options).await
    }

    pub async fn post(&self, url: &str, data: impl Into<RequestBody>, options: CallOptions) -> Result<ApiResponse> {
        self.request(Method::POST, url, data, options).await
    }

    pub async fn put(&self, url: &str, data: impl Into<RequestBody>, options: CallOptions) -> Result<ApiResponse> {
        self.request(Method::PUT, url, data, options).await
    }

    pub async fn patch(&self, url: &str, data: impl Into<RequestBody>, options: CallOptions) -> Result<ApiResponse> {
        self.request(Method::PATCH, url, data, options).await
    }
}

fn into_query(data: RequestBody) -> Result<Map<String, Value>> {
    match data {
        RequestBody::Empty => Ok(Map::new()),
        RequestBody::Json(Value::Object(map)) => Ok(map),
        RequestBody::Json(_) => Err(HttpError::config("query params must be an object")),
        RequestBody::Form(_) => Err(HttpError::config("form data requires a method with a body")),
    }
}
