use chrono::{DateTime, Utc};

/// A row in the `chats` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chat {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    /// Bumped on rename and whenever a message is appended.
    pub updated_at: DateTime<Utc>,
}
