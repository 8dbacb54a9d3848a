use std::future::Future;

use chatrelay_core::Role;
use chrono::Utc;
use uuid::Uuid;

use crate::entities::{Message, SqliteStore, format_ts, parse_ts};

pub trait MessageStore: Send + Sync + 'static {
    /// Insert a message. Does not touch the owning chat.
    fn append_message(
        &self,
        chat_id: &str,
        role: Role,
        content: &str,
    ) -> impl Future<Output = Result<Message, sqlx::Error>> + Send;

    /// Messages of one chat in creation order.
    fn list_messages(&self, chat_id: &str) -> impl Future<Output = Result<Vec<Message>, sqlx::Error>> + Send;
}

impl MessageStore for SqliteStore {
    async fn append_message(&self, chat_id: &str, role: Role, content: &str) -> Result<Message, sqlx::Error> {
        let msg = Message {
            id: Uuid::new_v4().to_string(),
            chat_id: chat_id.to_owned(),
            role,
            content: content.to_owned(),
            created_at: Utc::now(),
        };
        sqlx::query(
            "INSERT INTO messages (id, chat_id, role, content, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&msg.id)
        .bind(&msg.chat_id)
        .bind(msg.role.as_ref())
        .bind(&msg.content)
        .bind(format_ts(msg.created_at))
        .execute(&self.pool)
        .await?;
        Ok(msg)
    }

    async fn list_messages(&self, chat_id: &str) -> Result<Vec<Message>, sqlx::Error> {
        let rows: Vec<(String, String, String, String, String)> = sqlx::query_as(
            "SELECT id, chat_id, role, content, created_at \
             FROM messages WHERE chat_id = ?1 ORDER BY created_at ASC, rowid ASC",
        )
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(id, chat_id, role, content, created_at)| Message {
                role: role.parse().unwrap_or_else(|_| {
                    tracing::warn!(raw = %role, message_id = %id, "unknown message role; treating as assistant");
                    Role::Assistant
                }),
                id,
                chat_id,
                content,
                created_at: parse_ts(&created_at, "messages.created_at"),
            })
            .collect())
    }
}
