use chatrelay_core::Role;
use chrono::{DateTime, Utc};

/// A row in the `messages` table. Messages are never updated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    pub chat_id: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}
