use std::future::Future;

use chrono::Utc;
use uuid::Uuid;

use crate::entities::{Chat, SqliteStore, format_ts, parse_ts};

type ChatRow = (String, String, String, String);

/// Title of the chat created on first start.
pub const WELCOME_CHAT_TITLE: &str = "Welcome Chat";

pub trait ChatStore: Send + Sync + 'static {
    fn create_chat(&self, title: &str) -> impl Future<Output = Result<Chat, sqlx::Error>> + Send;
    fn get_chat(&self, id: &str) -> impl Future<Output = Result<Option<Chat>, sqlx::Error>> + Send;
    /// Most recently updated first.
    fn list_chats(&self) -> impl Future<Output = Result<Vec<Chat>, sqlx::Error>> + Send;
    fn count_chats(&self) -> impl Future<Output = Result<i64, sqlx::Error>> + Send;
    /// Returns `false` when no chat has this id.
    fn rename_chat(&self, id: &str, title: &str) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;
    /// Bump `updated_at`. Returns `false` when no chat has this id.
    fn touch_chat(&self, id: &str) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;
    /// Delete a chat and all of its messages. Returns `false` when absent.
    fn delete_chat(&self, id: &str) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;
}

fn chat_from_row((id, title, created_at, updated_at): ChatRow) -> Chat {
    Chat {
        id,
        title,
        created_at: parse_ts(&created_at, "chats.created_at"),
        updated_at: parse_ts(&updated_at, "chats.updated_at"),
    }
}

impl ChatStore for SqliteStore {
    async fn create_chat(&self, title: &str) -> Result<Chat, sqlx::Error> {
        let now = Utc::now();
        let chat = Chat {
            id: Uuid::new_v4().to_string(),
            title: title.to_owned(),
            created_at: now,
            updated_at: now,
        };
        sqlx::query("INSERT INTO chats (id, title, created_at, updated_at) VALUES (?1, ?2, ?3, ?4)")
            .bind(&chat.id)
            .bind(&chat.title)
            .bind(format_ts(chat.created_at))
            .bind(format_ts(chat.updated_at))
            .execute(&self.pool)
            .await?;
        Ok(chat)
    }

    async fn get_chat(&self, id: &str) -> Result<Option<Chat>, sqlx::Error> {
        let row: Option<ChatRow> =
            sqlx::query_as("SELECT id, title, created_at, updated_at FROM chats WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(chat_from_row))
    }

    async fn list_chats(&self) -> Result<Vec<Chat>, sqlx::Error> {
        let rows: Vec<ChatRow> = sqlx::query_as(
            "SELECT id, title, created_at, updated_at \
             FROM chats ORDER BY updated_at DESC, rowid DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(chat_from_row).collect())
    }

    async fn count_chats(&self) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM chats")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn rename_chat(&self, id: &str, title: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE chats SET title = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(title)
            .bind(format_ts(Utc::now()))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn touch_chat(&self, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE chats SET updated_at = ?1 WHERE id = ?2")
            .bind(format_ts(Utc::now()))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_chat(&self, id: &str) -> Result<bool, sqlx::Error> {
        // Explicit child delete: the cascade only fires when the connection has
        // foreign keys enabled.
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM messages WHERE chat_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM chats WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Create the welcome chat when the store holds no chats at all.
pub async fn ensure_welcome_chat<S: ChatStore>(store: &S) -> Result<Option<Chat>, sqlx::Error> {
    if store.count_chats().await? > 0 {
        return Ok(None);
    }
    let chat = store.create_chat(WELCOME_CHAT_TITLE).await?;
    tracing::info!(chat_id = %chat.id, "created welcome chat");
    Ok(Some(chat))
}
