pub mod client;
pub mod middleware;
pub mod service;
pub mod session;
pub mod upload;

pub use client::{HttpClient, create_base_client, create_client};
pub use upload::{UploadClient, UploadData, UploadFile, UploadOptions, create_upload_client};
