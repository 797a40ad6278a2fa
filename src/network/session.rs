use parking_lot::RwLock;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::core::error::{HttpError, Result};

/// 实例级默认请求头
///
/// 由 `setHeader`/`setHeaders` 写入，客户端创建后仍可修改，对之后发出的请求生效。
#[derive(Debug, Default)]
pub struct Session {
    headers: RwLock<HeaderMap>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_header(&self, key: &str, value: &str) -> Result<()> {
        let (name, value) = parse_header(key, value)?;
        self.headers.write().insert(name, value);
        Ok(())
    }

    /// 批量写入，任意一项非法时整体不生效
    pub fn set_headers<'a, I>(&self, headers: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let parsed = headers
            .into_iter()
            .map(|(k, v)| parse_header(k, v))
            .collect::<Result<Vec<_>>>()?;
        let mut guard = self.headers.write();
        for (name, value) in parsed {
            guard.insert(name, value);
        }
        Ok(())
    }

    /// 当前默认请求头的快照
    pub fn headers(&self) -> HeaderMap {
        self.headers.read().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.read().is_empty()
    }

    pub fn clear(&self) {
        self.headers.write().clear();
    }
}

fn parse_header(key: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let name = HeaderName::from_bytes(key.as_bytes())
        .map_err(|e| HttpError::Header(format!("{}: {}", key, e)))?;
    let value =
        HeaderValue::from_str(value).map_err(|e| HttpError::Header(format!("{}: {}", key, e)))?;
    Ok((name, value))
}
