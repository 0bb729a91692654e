//! Snapshot types published to UI subscribers.

use chrono::{DateTime, Utc};
use docchat_api::{ApiError, ChatReply, UploadData};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::OperationState;

/// Who authored a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One entry of the chat transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub role: Role,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            text: text.into(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BannerKind {
    Loading,
    Success,
    Error,
}

/// Status line shown above the upload and chat panels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Banner {
    pub kind: BannerKind,
    pub message: String,
    /// Error code, for error banners
    pub code: Option<String>,
    pub request_id: Option<String>,
    /// Trying the same action again may succeed (timeouts, network errors)
    pub retryable: bool,
}

impl Banner {
    pub fn loading(message: impl Into<String>) -> Self {
        Self {
            kind: BannerKind::Loading,
            message: message.into(),
            code: None,
            request_id: None,
            retryable: false,
        }
    }

    pub fn success(message: impl Into<String>, request_id: &str) -> Self {
        Self {
            kind: BannerKind::Success,
            message: message.into(),
            code: None,
            request_id: (!request_id.is_empty()).then(|| request_id.to_string()),
            retryable: false,
        }
    }

    pub fn error(error: &ApiError) -> Self {
        Self {
            kind: BannerKind::Error,
            message: error.user_message().to_string(),
            code: Some(error.code.clone()),
            request_id: (!error.request_id.is_empty()).then(|| error.request_id.clone()),
            retryable: error.kind().is_retryable(),
        }
    }
}

/// Everything a rendering layer needs, published after every transition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    pub upload: OperationState<UploadData>,
    pub chat: OperationState<ChatReply>,
    /// Filename of the last successfully uploaded document
    pub document: Option<String>,
    pub transcript: Vec<ChatMessage>,
    pub banner: Option<Banner>,
}

impl SessionSnapshot {
    /// Chat is available only while the upload operation is in `Success`.
    pub fn chat_enabled(&self) -> bool {
        self.upload.is_success()
    }
}
