//! HTTP request pipeline for the DocChat backend.
//!
//! This crate provides the configuration, error normalization, wire models and the
//! request executor used to upload documents and chat against them.

pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod telemetry;

pub use client::{ApiClient, ApiRequest, RequestBody, UploadDocument, CHAT_PATH, UPLOAD_PATH};
pub use config::{resolve_base_url, Config};
pub use error::{normalize, ApiError, ConfigError, ErrorKind, Failure, Result};
pub use models::{
    ChatData, ChatReply, ChatRequest, ErrorBody, ErrorEnvelope, SuccessEnvelope,
    UploadData,
};
