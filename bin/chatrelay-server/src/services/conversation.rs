//! One chat turn: validate, pick a model, persist the user message, stream the
//! model's reply through the reframer and persist it once complete.
//!
//! The turn is split in two so that every rejection happens before the HTTP
//! response starts:
//! - [`prepare_turn`] runs synchronously with the request and fails with a
//!   4xx [`ServerError`] (empty message, unknown chat, no model available).
//! - [`stream_reply`] is the response body. From here on failures are
//!   reported in-band as an `{"error": ...}` frame.
//!
//! The assistant message is written only after a `done` frame arrives and
//! before that frame is forwarded. If the client goes away earlier, the body
//! stream is dropped, the upstream request with it, and nothing is saved.

use std::sync::Arc;

use chatrelay_core::{
    Fact, FactSource, Frame, ModelClient, ReframeMode, Role, compose_prompt, reframe, render_history,
};
use futures::{Stream, StreamExt};
use tracing::{debug, error, info, warn};

use crate::entities::{ChatStore, MessageStore, SqliteStore};
use crate::error::ServerError;

/// Maximum accepted message size in bytes.
pub const MAX_MESSAGE_BYTES: usize = 128 * 1024;

pub const NO_MODELS_MESSAGE: &str = "No models available. Please install a model first.";

/// Per-message behaviour fixed by configuration.
#[derive(Debug, Clone, Default)]
pub struct ConversationOptions {
    /// Decorate prompts with a fact unless the request says otherwise.
    pub fact_mode_default: bool,
    /// Model used when the request names none.
    pub default_model: Option<String>,
    pub reframe_mode: ReframeMode,
}

/// A user message as received.
#[derive(Debug, Clone, Default)]
pub struct IncomingMessage {
    pub text: String,
    pub model: Option<String>,
    /// Overrides [`ConversationOptions::fact_mode_default`].
    pub fact_mode: Option<bool>,
}

/// A turn whose user message is stored and whose prompt is ready.
#[derive(Debug, Clone)]
pub struct PreparedTurn {
    pub chat_id: String,
    pub model: String,
    pub prompt: String,
    pub fact: Option<Fact>,
}

/// Everything up to (not including) the upstream call.
pub async fn prepare_turn(
    store: &SqliteStore,
    models: &dyn ModelClient,
    facts: &dyn FactSource,
    options: &ConversationOptions,
    chat_id: &str,
    incoming: IncomingMessage,
) -> Result<PreparedTurn, ServerError> {
    let text = incoming.text.trim();
    if text.is_empty() {
        return Err(ServerError::BadRequest("Message required".into()));
    }
    if text.len() > MAX_MESSAGE_BYTES {
        return Err(ServerError::BadRequest(format!(
            "message too large ({} bytes); maximum is {MAX_MESSAGE_BYTES} bytes",
            text.len()
        )));
    }
    if store.get_chat(chat_id).await?.is_none() {
        return Err(ServerError::NotFound(format!("chat {chat_id} not found")));
    }

    let model = select_model(models, incoming.model, options.default_model.as_deref()).await?;
    debug!(%chat_id, %model, "model selected");

    store.append_message(chat_id, Role::User, text).await?;
    store.touch_chat(chat_id).await?;

    let messages = store.list_messages(chat_id).await?;
    let history = render_history(messages.iter().map(|m| (m.role, m.content.as_str())));

    let fact = if incoming.fact_mode.unwrap_or(options.fact_mode_default) {
        facts.fetch_fact().await
    } else {
        None
    };
    let prompt = compose_prompt(&history, fact.as_ref());

    info!(
        %chat_id,
        %model,
        history_len = messages.len(),
        prompt_len = prompt.len(),
        with_fact = fact.is_some(),
        "turn prepared"
    );

    Ok(PreparedTurn {
        chat_id: chat_id.to_owned(),
        model,
        prompt,
        fact,
    })
}

/// Explicit model, else the configured default, else the first installed one.
async fn select_model(
    models: &dyn ModelClient,
    requested: Option<String>,
    default_model: Option<&str>,
) -> Result<String, ServerError> {
    if let Some(model) = requested.map(|m| m.trim().to_owned()).filter(|m| !m.is_empty()) {
        return Ok(model);
    }
    if let Some(model) = default_model {
        return Ok(model.to_owned());
    }

    let installed = models.list_models().await.unwrap_or_else(|e| {
        warn!(error = %e, "could not list installed models");
        Vec::new()
    });
    installed
        .into_iter()
        .next()
        .map(|m| m.name)
        .ok_or_else(|| ServerError::BadRequest(NO_MODELS_MESSAGE.into()))
}

/// The response body of a turn, one frame per NDJSON line.
pub fn stream_reply(
    store: Arc<SqliteStore>,
    models: Arc<dyn ModelClient>,
    mode: ReframeMode,
    turn: PreparedTurn,
) -> impl Stream<Item = Frame> + Send + 'static {
    async_stream::stream! {
        let PreparedTurn { chat_id, model, prompt, fact } = turn;

        let upstream = match models.stream_generate(&prompt, &model).await {
            Ok(upstream) => upstream,
            Err(e) => {
                warn!(%chat_id, %model, error = %e, "could not open generation stream");
                yield Frame::error(e.to_string());
                return;
            }
        };

        let mut frames = std::pin::pin!(reframe(upstream, mode));
        let mut reply = String::new();

        while let Some(mut frame) = frames.next().await {
            if frame.is_error() {
                warn!(
                    %chat_id,
                    error = frame.error_message().unwrap_or_default(),
                    "generation failed; reply not saved"
                );
                yield frame;
                return;
            }

            if let Some(text) = frame.response() {
                reply.push_str(text);
            }

            if frame.is_done() {
                save_reply(&store, &chat_id, &reply).await;
                if let Some(fact) = &fact {
                    match serde_json::to_value(fact) {
                        Ok(value) => frame.insert("fact_used", value),
                        Err(e) => warn!(error = %e, "could not serialise fact"),
                    }
                }
                yield frame;
                return;
            }

            yield frame;
        }

        warn!(%chat_id, reply_len = reply.len(), "upstream ended without a done frame; reply not saved");
    }
}

async fn save_reply(store: &SqliteStore, chat_id: &str, reply: &str) {
    match store.append_message(chat_id, Role::Assistant, reply).await {
        Ok(msg) => {
            info!(%chat_id, message_id = %msg.id, reply_len = reply.len(), "assistant reply persisted");
            if let Err(e) = store.touch_chat(chat_id).await {
                warn!(%chat_id, error = %e, "failed to bump chat timestamp");
            }
        }
        Err(e) => error!(%chat_id, error = %e, "failed to persist assistant reply"),
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
