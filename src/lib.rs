//! 业务 HTTP 客户端 (Business HTTP Client)
//!
//! 在 reqwest 之上提供有序的请求/响应变换链：公共参数与公共请求头注入、
//! v1/v2 报文加密与签名、响应解密、Token 失效与业务失败回调、业务状态码归一化。

pub mod core;
pub mod interfaces;
pub mod network;
pub mod pipeline;
pub mod utils;

#[cfg(test)]
mod testing;

pub use crate::core::config::{AppProfile, CallOptions, ClientConfig, ClientSettings, EncryptVersion, NestBizData};
pub use crate::core::error::{HttpError, Problem, Result};
pub use crate::core::model::{ApiResponse, FormData, OutgoingRequest, RequestBody};
pub use crate::interfaces::{AuthorizationSource, Cipher, Hooks, ParamSource, RequestTransform, ResponseTransform};
pub use crate::network::{
    HttpClient, UploadClient, UploadData, UploadFile, UploadOptions, create_base_client, create_client,
    create_upload_client,
};
