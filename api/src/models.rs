//! Wire models shared by the executor and the operation adapters.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Standard success envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessEnvelope<T> {
    pub success: bool,
    /// Correlation id; empty when neither body nor header supplied one
    pub request_id: String,
    pub data: T,
}

impl<T> SuccessEnvelope<T> {
    pub fn new(request_id: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            request_id: request_id.into(),
            data,
        }
    }
}

/// Error envelope as sent by the backend.
///
/// Fields are kept as raw JSON so one malformed field never hides the others.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<Value>,
    pub error: ErrorBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ErrorEnvelope {
    /// Body correlation id, when it is a non-blank string.
    pub fn request_id(&self) -> Option<&str> {
        non_blank_str(self.request_id.as_ref())
    }
}

impl ErrorBody {
    pub fn code(&self) -> Option<&str> {
        non_blank_str(self.code.as_ref())
    }

    pub fn message(&self) -> Option<&str> {
        non_blank_str(self.message.as_ref())
    }
}

/// Upload result payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadData {
    pub status: String,
    pub message: String,
    /// Name of the document now active for chat
    pub filename: String,
}

/// Chat request payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub query: String,
}

/// Chat result payload.
///
/// Either an informational answer or an action with arbitrary extra fields.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChatData {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A chat result after strict discrimination.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatReply {
    /// Informational answer text
    Answer(String),
    /// Structured action; `fields` holds the complete payload
    Action {
        action: String,
        fields: Map<String, Value>,
    },
    /// Any other shape
    Other(Value),
}

const FALLBACK_REPLY_TEXT: &str = "Received response from backend.";

impl ChatData {
    /// Discriminate the payload: a non-blank `answer` wins, then a non-blank `action`.
    pub fn reply(&self) -> ChatReply {
        if let Some(answer) = non_blank_str(self.answer.as_ref()) {
            return ChatReply::Answer(answer.to_string());
        }

        if let Some(action) = non_blank_str(self.action.as_ref()) {
            return ChatReply::Action {
                action: action.to_string(),
                fields: self.to_map(),
            };
        }

        ChatReply::Other(Value::Object(self.to_map()))
    }

    fn to_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => self.extra.clone(),
        }
    }
}

impl ChatReply {
    /// Text an assistant message shows for this reply.
    pub fn display_text(&self) -> String {
        match self {
            ChatReply::Answer(answer) => answer.clone(),
            ChatReply::Action { fields, .. } => {
                serde_json::to_string_pretty(fields).unwrap_or_else(|_| FALLBACK_REPLY_TEXT.to_string())
            }
            ChatReply::Other(_) => FALLBACK_REPLY_TEXT.to_string(),
        }
    }
}

fn non_blank_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}
