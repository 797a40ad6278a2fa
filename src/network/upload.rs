//! 文件上传客户端 (Upload Client)
//!
//! 上传走 multipart，不做报文加密；身份信息 `{appId, msgId, random}` 的签名放在请求头里。

use base64::prelude::*;
use bon::Builder;
use bytes::Bytes;
use serde_json::{Map, Value, json};

use crate::core::config::{AppProfile, CallOptions, ClientConfig};
use crate::core::error::{HttpError, Result};
use crate::core::model::{ApiResponse, FormData};
use crate::interfaces::cipher::ENCODE_METHOD_NONE;
use crate::interfaces::hooks::AuthorizationSource;
use crate::network::client::{HttpClient, create_client, with_authorization};
use crate::pipeline::envelope::{ENCODE_METHOD_KEY, SIGN_METHOD_KEY};
use crate::utils::{gen_message_id, random_number};

/// 上传客户端的选项
#[derive(Debug, Clone, Builder)]
pub struct UploadOptions {
    /// 签名写入的请求头
    #[builder(into, default = "signBody".to_string())]
    pub sign_key: String,
    /// 文件在表单中的字段名
    #[builder(into, default = "file".to_string())]
    pub file_key: String,
    /// 登录凭据，未设置时使用渠道信息中的凭据
    pub authorization: Option<AuthorizationSource>,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// 待上传的文件
#[derive(Debug, Clone)]
pub enum UploadFile {
    Bytes {
        bytes: Bytes,
        file_name: String,
        mime: Option<String>,
    },
    /// base64 文本，允许带 `data:<mime>;base64,` 前缀
    Base64 {
        data: String,
        mime: String,
        file_name: Option<String>,
    },
}

impl UploadFile {
    /// 解码为 (内容, 文件名, MIME)
    fn into_parts(self) -> Result<(Bytes, String, String)> {
        match self {
            UploadFile::Bytes {
                bytes,
                file_name,
                mime,
            } => {
                let mime = mime.unwrap_or_else(|| {
                    mime_guess::from_path(&file_name)
                        .first_or_octet_stream()
                        .to_string()
                });
                Ok((bytes, file_name, mime))
            }
            UploadFile::Base64 {
                data,
                mime,
                file_name,
            } => {
                let raw = match data.split_once(";base64,") {
                    Some((prefix, rest)) if prefix.starts_with("data:") => rest,
                    _ => data.as_str(),
                };
                let bytes = BASE64_STANDARD
                    .decode(raw.trim())
                    .map_err(|e| HttpError::Upload(format!("invalid base64 file: {}", e)))?;
                let file_name = file_name.unwrap_or_else(|| default_file_name(&mime));
                Ok((Bytes::from(bytes), file_name, mime))
            }
        }
    }
}

fn default_file_name(mime: &str) -> String {
    let ext = mime_guess::get_mime_extensions_str(mime)
        .and_then(|exts| exts.first())
        .copied()
        .unwrap_or("bin");
    format!("file.{}", ext)
}

/// 一次上传的内容：文件与附加文本字段
#[derive(Debug, Clone)]
pub struct UploadData {
    pub file: UploadFile,
    pub fields: Vec<(String, String)>,
}

impl From<UploadFile> for UploadData {
    fn from(file: UploadFile) -> Self {
        Self {
            file,
            fields: Vec::new(),
        }
    }
}

/// 上传客户端
#[derive(Clone)]
pub struct UploadClient {
    client: HttpClient,
    options: UploadOptions,
}

/// 创建上传客户端
///
/// 无论配置如何都关闭报文加密与报文签名；签名所需的 appKey 与加解密能力必须提供。
pub fn create_upload_client(app: AppProfile, options: UploadOptions, mut config: ClientConfig) -> Result<UploadClient> {
    app.validate()?;

    let s = &mut config.settings;
    s.use_encrypt = false;
    s.use_sign = false;
    if let Some(key) = app.app_key.as_deref().filter(|k| !k.is_empty()) {
        s.app_key = Some(key.to_string());
    }

    let key = s
        .app_key()
        .ok_or_else(|| HttpError::config("appKey is required for upload signing"))?
        .to_string();
    let cipher = config
        .cipher
        .clone()
        .ok_or_else(|| HttpError::config("cipher is required for upload signing"))?;

    let auth = options
        .authorization
        .clone()
        .or_else(|| app.authorization.clone())
        .unwrap_or_else(|| AuthorizationSource::from_fn(|| None));

    let app_id = app.app_id.clone();
    let sign_key = options.sign_key.clone();
    let identity = move || {
        let msg_id = gen_message_id();
        let random = random_number(6);
        let sign = cipher.create_sign(
            &json!({ "appId": app_id, "msgId": msg_id, "random": random }),
            &key,
        );

        let mut headers = Map::new();
        headers.insert("appId".into(), json!(app_id));
        headers.insert("msgId".into(), json!(msg_id));
        headers.insert("random".into(), json!(random));
        headers.insert(ENCODE_METHOD_KEY.into(), json!(ENCODE_METHOD_NONE));
        headers.insert(SIGN_METHOD_KEY.into(), json!(cipher.sign_method()));
        headers.insert(sign_key.clone(), Value::String(sign));
        headers
    };

    let base = config.hooks.common_headers.take();
    config.hooks.common_headers = Some(with_authorization(base, auth, identity));

    Ok(UploadClient {
        client: create_client(config)?,
        options,
    })
}

impl UploadClient {
    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    pub fn options(&self) -> &UploadOptions {
        &self.options
    }

    /// 上传文件，组装 multipart 后交给 `post`
    pub async fn upload(&self, url: &str, data: impl Into<UploadData>, options: CallOptions) -> Result<ApiResponse> {
        let data = data.into();
        let (bytes, file_name, mime) = data.file.into_parts()?;

        let mut form = FormData::new().file(self.options.file_key.as_str(), bytes, file_name, mime);
        for (k, v) in data.fields {
            form.append_text(k, v);
        }
        self.client.post(url, form, options).await
    }
}
