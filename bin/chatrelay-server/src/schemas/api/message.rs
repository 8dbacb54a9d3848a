use crate::entities::Message;
use crate::services::conversation::IncomingMessage;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Body of `POST /api/chats/{id}/messages`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct SendMessageRequest {
    /// The user's message. Must not be blank; at most 128 KiB of UTF-8.
    #[serde(default)]
    pub message: String,
    /// Model to generate with; defaults to the configured or first installed model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Decorate the prompt with a fact. Defaults to the server setting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crazy_mode: Option<bool>,
}

impl From<SendMessageRequest> for IncomingMessage {
    fn from(req: SendMessageRequest) -> Self {
        IncomingMessage {
            text: req.message,
            model: req.model,
            fact_mode: req.crazy_mode,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub id: String,
    pub chat_id: String,
    /// `"user"` or `"assistant"`.
    pub role: String,
    pub content: String,
    pub created_at: String,
}

impl Message {
    pub fn to_response(&self) -> MessageResponse {
        MessageResponse {
            id: self.id.clone(),
            chat_id: self.chat_id.clone(),
            role: self.role.to_string(),
            content: self.content.clone(),
            created_at: self.created_at.to_rfc3339(),
        }
    }
}
