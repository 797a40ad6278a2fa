use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use serde_json::Value;
use tracing::debug;

use crate::core::error::{HttpError, Problem, Result};
use crate::core::model::{ApiResponse, OutgoingRequest, RequestBody};
use crate::interfaces::transform::{RequestTransform, ResponseTransform};
use crate::network::middleware::{SessionMiddleware, TraceMiddleware};
use crate::network::session::Session;
use crate::utils::{append_query, join_url};

/// 传输层与变换链的持有者
///
/// 请求变换与响应变换按注册顺序保存，每次调用都完整地跑一遍。
pub struct HttpService {
    /// 用于构建请求（json/multipart 由原生 client 提供）
    raw: reqwest::Client,
    client: ClientWithMiddleware,
    request_transforms: Vec<Arc<dyn RequestTransform>>,
    response_transforms: Vec<Arc<dyn ResponseTransform>>,
}

impl HttpService {
    pub fn new() -> Result<Self> {
        let raw = reqwest::Client::builder()
            .pool_max_idle_per_host(32)
            .tcp_nodelay(true)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(HttpError::Network)?;

        let client = ClientBuilder::new(raw.clone())
            .with(SessionMiddleware)
            .with(TraceMiddleware)
            .build();

        Ok(Self {
            raw,
            client,
            request_transforms: Vec::new(),
            response_transforms: Vec::new(),
        })
    }

    pub fn add_request_transform(&mut self, transform: impl RequestTransform + 'static) {
        self.request_transforms.push(Arc::new(transform));
    }

    pub fn add_response_transform(&mut self, transform: impl ResponseTransform + 'static) {
        self.response_transforms.push(Arc::new(transform));
    }

    pub fn request_transforms(&self) -> &[Arc<dyn RequestTransform>] {
        &self.request_transforms
    }

    pub fn response_transforms(&self) -> &[Arc<dyn ResponseTransform>] {
        &self.response_transforms
    }

    /// 核心执行逻辑：请求变换 → 发送 → 响应变换
    ///
    /// 只有请求变换产生的配置错误会返回 `Err`，传输失败体现在响应的 `ok`/`problem` 上。
    pub async fn execute(&self, mut req: OutgoingRequest, session: Arc<Session>) -> Result<ApiResponse> {
        for transform in &self.request_transforms {
            transform.apply(&mut req).await?;
            debug!("request transform `{}` applied: {}", transform.name(), req.url);
        }

        let mut resp = self.send(req, session).await?;

        for transform in &self.response_transforms {
            transform.apply(&mut resp);
        }
        Ok(resp)
    }

    async fn send(&self, req: OutgoingRequest, session: Arc<Session>) -> Result<ApiResponse> {
        let config = req.config.clone();
        let url = join_url(config.base_address(), &req.url);
        let url = append_query(&url, &req.params)
            .map_err(|e| HttpError::config(format!("invalid query params: {}", e)))?;

        let mut builder = self.raw.request(req.method, &url).headers(req.headers);
        builder = match req.data {
            RequestBody::Empty => builder,
            RequestBody::Json(v) => builder.json(&v),
            RequestBody::Form(form) => builder.multipart(form.into_multipart()?),
        };
        if let Some(timeout) = req.timeout.or(config.settings.timeout()) {
            builder = builder.timeout(timeout);
        }
        let request = builder
            .build()
            .map_err(|e| HttpError::config(format!("invalid request url {}: {}", url, e)))?;

        let mut extensions = http::Extensions::new();
        extensions.insert(session);

        let start = Instant::now();
        let resp = match self.client.execute_with_extensions(request, &mut extensions).await {
            Ok(resp) => resp,
            Err(e) => {
                return Ok(ApiResponse::failed(
                    Problem::from_transport(&e),
                    e.to_string(),
                    config,
                    start.elapsed(),
                ));
            }
        };

        let status = resp.status();
        let headers = resp.headers().clone();
        let body = match resp.bytes().await {
            Ok(body) => body,
            Err(e) => {
                let err = reqwest_middleware::Error::Reqwest(e);
                let mut failed =
                    ApiResponse::failed(Problem::from_transport(&err), err.to_string(), config, start.elapsed());
                failed.status = Some(status.as_u16());
                failed.headers = headers;
                return Ok(failed);
            }
        };

        let mut out = ApiResponse::new(config);
        out.ok = status.is_success();
        out.status = Some(status.as_u16());
        out.problem = Problem::from_status(status);
        out.headers = headers;
        out.data = parse_body(&body);
        out.duration = start.elapsed();
        Ok(out)
    }
}

/// 解析响应体：空或 `null` 视为无数据，非 JSON 文本原样保留为字符串
fn parse_body(body: &Bytes) -> Option<Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Null) => None,
        Ok(v) => Some(v),
        Err(_) => Some(Value::String(String::from_utf8_lossy(body).into_owned())),
    }
}
