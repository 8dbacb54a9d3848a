use crate::entities::Chat;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// Title given to chats created without one.
pub const DEFAULT_CHAT_TITLE: &str = "New Chat";

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, Validate)]
pub struct CreateChatRequest {
    /// Optional; blank or missing titles become `"New Chat"`.
    #[serde(default)]
    #[validate(length(max = 200))]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, Validate)]
pub struct RenameChatRequest {
    #[serde(default)]
    #[validate(length(max = 200))]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatResponse {
    pub id: String,
    pub title: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

impl Chat {
    pub fn to_response(&self) -> ChatResponse {
        ChatResponse {
            id: self.id.clone(),
            title: self.title.clone(),
            created_at: self.created_at.to_rfc3339(),
            updated_at: self.updated_at.to_rfc3339(),
        }
    }
}
