//! crates/know_flow_client/src/lib.rs
//!
//! Rust client for the Know-Flow API: configuration, the retrying request core,
//! typed operations and a headless study chat.

pub mod chat;
pub mod client;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod response;

pub use chat::{ChatMessage, ChatRole, StudyChat};
pub use client::{ApiClient, RequestOptions};
pub use config::{ClientConfig, ConfigError};
pub use error::ClientError;
pub use response::{ApiOutcome, ResponseHandler};
