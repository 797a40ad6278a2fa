pub mod cipher;
pub mod hooks;
pub mod transform;

pub use cipher::Cipher;
pub use hooks::{AuthorizationSource, Hooks, ParamSource};
pub use transform::{RequestTransform, ResponseTransform};
