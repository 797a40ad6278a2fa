//! 响应变换链 (Response Transform Chain)
//!
//! 注册顺序固定：解密 → Token 校验 → 失败校验 → 状态码转换。
//! 后面的变换依赖前面变换产出的字段，任何一步都不会向调用方抛错。

use serde_json::Value;
use tracing::{debug, error, warn};

use crate::core::error::Problem;
use crate::core::model::{ApiResponse, RETURN_CODE_INVALID_TOKEN, RETURN_CODE_SUCCESS};
use crate::interfaces::transform::ResponseTransform;
use crate::pipeline::envelope;

/// 请求成功但无业务数据时的提示语
pub const MSG_NO_DATA: &str = "接口异常，请重试";
/// 业务失败且未返回描述时的提示语
pub const MSG_FAILED: &str = "处理失败，请重试";

/// 开发构建下提示缺失的钩子
fn warn_missing_hook(hook: &str) {
    if cfg!(debug_assertions) {
        warn!("config.{} hook not configured", hook);
    }
}

/// 响应解密
///
/// 读取响应上携带的调用配置判断是否需要解密，解密失败只记录日志。
pub struct DecryptTransform;

impl ResponseTransform for DecryptTransform {
    fn name(&self) -> &str {
        "decrypt"
    }

    fn apply(&self, resp: &mut ApiResponse) {
        let config = resp.config.clone();
        let s = &config.settings;
        if !resp.ok || !s.use_encrypt {
            return;
        }

        let (key, cipher) = match config.crypto() {
            Ok(pair) => pair,
            Err(e) => {
                error!("响应解密配置无效，保留原始数据: {}", e);
                return;
            }
        };

        let Some(data) = resp.data.as_mut() else {
            debug!("响应无数据，跳过解密");
            return;
        };

        match envelope::open(s.encrypt_version, data, key, cipher) {
            Ok(()) => debug!("响应已解密 (v{})", s.encrypt_version),
            Err(e) => warn!("响应解密失败 (v{}): {}", s.encrypt_version, e),
        }
    }
}

/// Token 失效校验
///
/// 总是注册。判定为失效后标记响应，后续的失败校验不再触发。
pub struct TokenCheckTransform;

impl ResponseTransform for TokenCheckTransform {
    fn name(&self) -> &str {
        "token-check"
    }

    fn apply(&self, resp: &mut ApiResponse) {
        if !resp.ok {
            return;
        }

        let config = resp.config.clone();
        let hooks = &config.hooks;
        let invalid = match &hooks.is_invalid_token {
            Some(predicate) => {
                let view: &ApiResponse = resp;
                predicate(view.data.as_ref().unwrap_or(&Value::Null), view)
            }
            None => resp.business_code().as_deref() == Some(RETURN_CODE_INVALID_TOKEN),
        };

        if !invalid {
            return;
        }

        resp.invalid_token = true;
        warn!("token invalid");
        match &hooks.on_invalid_token {
            Some(hook) => hook(resp),
            None => warn_missing_hook("onInvalidToken"),
        }
    }
}

/// 失败校验
///
/// 传输失败、无业务数据、业务状态码非成功三种情况触发 `onFail`。
pub struct FailTransform;

impl FailTransform {
    fn failure_message(resp: &ApiResponse) -> Option<String> {
        if !resp.ok {
            let problem = resp.problem.unwrap_or(Problem::UnknownError);
            return Some(problem.to_string());
        }
        if resp.data.is_none() {
            return Some(MSG_NO_DATA.to_string());
        }
        if resp.business_code().as_deref() != Some(RETURN_CODE_SUCCESS) {
            let msg = resp
                .business_message()
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| MSG_FAILED.to_string());
            return Some(msg);
        }
        None
    }
}

impl ResponseTransform for FailTransform {
    fn name(&self) -> &str {
        "fail"
    }

    fn apply(&self, resp: &mut ApiResponse) {
        let config = resp.config.clone();
        if config.settings.no_fail {
            return;
        }
        if resp.invalid_token {
            debug!("token 已失效，跳过失败回调");
            return;
        }

        let Some(msg) = Self::failure_message(resp) else {
            return;
        };

        match &config.hooks.on_fail {
            Some(hook) => hook(&msg, resp),
            None => warn_missing_hook("onFail"),
        }
    }
}

/// 业务状态码转换
///
/// 派生 `success`/`code`/`msg`，响应头中的值优先。
pub struct StatusTransform;

impl ResponseTransform for StatusTransform {
    fn name(&self) -> &str {
        "status"
    }

    fn apply(&self, resp: &mut ApiResponse) {
        if resp.config.settings.no_status_transform {
            return;
        }
        resp.code = resp.business_code();
        resp.msg = resp.business_message();
        resp.success = resp.code.as_deref() == Some(RETURN_CODE_SUCCESS);
    }
}
