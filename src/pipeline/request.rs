//! 请求变换链 (Request Transform Chain)
//!
//! 注册顺序固定：公共参数 → 公共请求头 → 加密/签名。
//! 加密必须看到完整组装后的明文，所以永远排在最后。

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::core::error::{HttpError, Result};
use crate::core::model::{BODY_KEY, OutgoingRequest, PARAMS_FIELD, RequestBody};
use crate::interfaces::transform::RequestTransform;
use crate::pipeline::envelope;

/// 合并公共参数与业务数据
///
/// `nest_key` 为 `None` 时平铺合并，同名字段以业务数据为准；
/// 否则业务数据整体放在 `nest_key` 下，公共参数位于顶层。
pub fn merge_common_params(common: Map<String, Value>, biz: Value, nest_key: Option<&str>) -> Value {
    match (nest_key, biz) {
        (None, Value::Object(fields)) => {
            let mut merged = common;
            merged.extend(fields);
            Value::Object(merged)
        }
        (None, biz) if common.is_empty() => biz,
        (None, biz) => {
            warn!("业务数据不是对象，无法平铺合并公共参数，改为嵌套在 `{}` 下", BODY_KEY);
            let mut merged = common;
            merged.insert(BODY_KEY.into(), biz);
            Value::Object(merged)
        }
        (Some(key), biz) => {
            let mut merged = common;
            merged.insert(key.to_string(), biz);
            Value::Object(merged)
        }
    }
}

/// 公共参数注入
///
/// 总是注册。未配置解析器时仍会按嵌套规则包装业务数据。
pub struct CommonParamsTransform;

#[async_trait]
impl RequestTransform for CommonParamsTransform {
    fn name(&self) -> &str {
        "common-params"
    }

    async fn apply(&self, req: &mut OutgoingRequest) -> Result<()> {
        let config = req.config.clone();
        let source = config.hooks.common_params.as_ref();
        let common = match source {
            Some(source) => source.resolve(req).await,
            None => Map::new(),
        };

        // 无请求体的方法：公共参数平铺进查询参数
        if !req.has_body() {
            for (k, v) in common {
                req.params.entry(k).or_insert(v);
            }
            return Ok(());
        }

        match std::mem::take(&mut req.data) {
            RequestBody::Form(mut form) => {
                if source.is_some() {
                    if form.contains(PARAMS_FIELD) {
                        warn!("表单中已存在 `{}` 字段，公共参数将追加同名字段", PARAMS_FIELD);
                    }
                    form.append_text(PARAMS_FIELD, serde_json::to_string(&common)?);
                }
                req.data = RequestBody::Form(form);
            }
            other => {
                let s = &config.settings;
                let nest_key = if s.use_encrypt {
                    envelope::nest_key(s.encrypt_version)
                } else {
                    s.nest_biz_data.key()
                };
                let biz = other.into_json().unwrap_or_else(|| Value::Object(Map::new()));
                req.data = RequestBody::Json(merge_common_params(common, biz, nest_key));
            }
        }
        Ok(())
    }
}

/// 公共请求头注入
///
/// 仅在配置了请求头解析器时注册，同名请求头直接覆盖。
pub struct CommonHeadersTransform;

#[async_trait]
impl RequestTransform for CommonHeadersTransform {
    fn name(&self) -> &str {
        "common-headers"
    }

    async fn apply(&self, req: &mut OutgoingRequest) -> Result<()> {
        let config = req.config.clone();
        let Some(source) = config.hooks.common_headers.as_ref() else {
            return Ok(());
        };
        let headers = source.resolve(req).await;
        req.assign_headers(headers)
    }
}

/// 加密与签名
///
/// 仅在开启加密时注册；单次调用关闭加密时跳过。
pub struct EncryptTransform;

#[async_trait]
impl RequestTransform for EncryptTransform {
    fn name(&self) -> &str {
        "encrypt"
    }

    async fn apply(&self, req: &mut OutgoingRequest) -> Result<()> {
        let config = req.config.clone();
        let s = &config.settings;
        if !s.use_encrypt {
            return Ok(());
        }

        let (key, cipher) = config.crypto()?;

        if !req.has_body() {
            debug!("{} {} 无请求体，跳过加密", req.method, req.url);
            return Ok(());
        }

        let data = match std::mem::take(&mut req.data) {
            RequestBody::Json(v) => v,
            RequestBody::Empty => Value::Object(Map::new()),
            // 表单不支持加密，也不能以明文发出
            RequestBody::Form(_) => {
                return Err(HttpError::config(
                    "form bodies cannot be encrypted; use the upload client or disable use_encrypt for this call",
                ));
            }
        };

        let sealed = envelope::seal(s.encrypt_version, data, key, s.use_sign, cipher)?;
        req.data = RequestBody::Json(sealed.data);
        for (name, value) in sealed.headers {
            req.set_header(name, &value)?;
        }
        debug!("请求已加密 (v{}): {}", s.encrypt_version, req.url);
        Ok(())
    }
}
