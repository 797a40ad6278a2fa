//! 请求/响应变换链

pub mod envelope;
pub mod request;
pub mod response;

pub use request::{CommonHeadersTransform, CommonParamsTransform, EncryptTransform};
pub use response::{DecryptTransform, FailTransform, StatusTransform, TokenCheckTransform};
