//! Confluence module providing the API abstraction, the HTTP client, data
//! models and the error type.

pub mod api;
pub mod client;
pub mod error;
pub mod models;

pub use api::ConfluenceApi;
pub use client::ConfluenceClient;
pub use error::{ConfluenceError, ErrorKind};
pub use models::{Attachment, Page, PageDefaults, UserInfo, Version};
