use async_trait::async_trait;

use crate::core::error::Result;
use crate::core::model::{ApiResponse, OutgoingRequest};

/// 请求变换
///
/// 按注册顺序串行执行，每一步都可能是异步的（例如等待公共参数解析）。
/// 返回的错误只会是配置错误，且发生在网络 I/O 之前。
#[async_trait]
pub trait RequestTransform: Send + Sync {
    /// 变换名称 (用于调试/日志)
    fn name(&self) -> &str;

    async fn apply(&self, req: &mut OutgoingRequest) -> Result<()>;
}

/// 响应变换
///
/// 同步执行，不允许失败：异常情况只记录日志或通过钩子上报。
pub trait ResponseTransform: Send + Sync {
    /// 变换名称 (用于调试/日志)
    fn name(&self) -> &str;

    fn apply(&self, resp: &mut ApiResponse);
}
