use std::sync::Arc;
use std::time::Instant;

use reqwest::{Request, Response};
use reqwest_middleware::{Middleware, Next, Result};
use tracing::{debug, warn};

use crate::network::session::Session;

/// 会话注入中间件
/// 负责在每次请求前，将 Session 中的默认请求头补到请求上（请求自带的同名头优先）
pub struct SessionMiddleware;

#[async_trait::async_trait]
impl Middleware for SessionMiddleware {
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut http::Extensions,
        next: Next<'_>,
    ) -> Result<Response> {
        if let Some(session) = extensions.get::<Arc<Session>>() {
            let defaults = session.headers();
            let headers = req.headers_mut();
            for (k, v) in defaults.iter() {
                if !headers.contains_key(k) {
                    headers.insert(k.clone(), v.clone());
                }
            }
        }
        next.run(req, extensions).await
    }
}

/// 请求日志中间件
/// 记录方法、地址、状态码与耗时
pub struct TraceMiddleware;

#[async_trait::async_trait]
impl Middleware for TraceMiddleware {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut http::Extensions,
        next: Next<'_>,
    ) -> Result<Response> {
        let method = req.method().clone();
        let url = req.url().clone();
        let start = Instant::now();

        let result = next.run(req, extensions).await;
        let elapsed = start.elapsed();
        match &result {
            Ok(resp) => debug!(
                "{} {} -> {} ({} ms)",
                method,
                url,
                resp.status(),
                elapsed.as_millis()
            ),
            Err(e) => warn!("{} {} 失败 ({} ms): {}", method, url, elapsed.as_millis(), e),
        }
        result
    }
}
