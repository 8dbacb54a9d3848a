//! Chat history and the streaming message endpoint.
//!
//! `POST /api/chats/{id}/messages` answers with `application/x-ndjson`: one
//! JSON object per line, each forwarded as soon as the reframer produces it.
//! Validation failures are ordinary JSON error responses; anything that goes
//! wrong once the stream has started arrives as an `{"error": ...}` line.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures::StreamExt;
use utoipa::OpenApi;

use crate::entities::{ChatStore, MessageStore};
use crate::error::ServerError;
use crate::routes::api::parse_body;
use crate::schemas::api::message::{MessageResponse, SendMessageRequest};
use crate::services::conversation::{prepare_turn, stream_reply};
use crate::state::AppState;

const NDJSON: &str = "application/x-ndjson";

#[derive(OpenApi)]
#[openapi(
    paths(list_messages, send_message),
    components(schemas(SendMessageRequest, MessageResponse))
)]
pub struct MessagesApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/chats/{id}/messages", get(list_messages).post(send_message))
}

#[utoipa::path(
    get,
    path = "/api/chats/{id}/messages",
    tag = "messages",
    params(("id" = String, Path, description = "Chat id")),
    responses(
        (status = 200, description = "Messages in creation order", body = Vec<MessageResponse>),
        (status = 404, description = "No such chat"),
    )
)]
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<MessageResponse>>, ServerError> {
    if state.store.get_chat(&id).await?.is_none() {
        return Err(ServerError::NotFound(format!("chat {id} not found")));
    }
    let messages = state.store.list_messages(&id).await?;
    Ok(Json(messages.iter().map(|m| m.to_response()).collect()))
}

/// Send a user message and stream the model's reply.
///
/// The final line carries `"done": true` and, when a fact decorated the
/// prompt, `"fact_used": {"subject", "text"}`.
#[utoipa::path(
    post,
    path = "/api/chats/{id}/messages",
    tag = "messages",
    params(("id" = String, Path, description = "Chat id")),
    request_body = SendMessageRequest,
    responses(
        (status = 200, description = "NDJSON stream of generation frames", content_type = "application/x-ndjson", body = String),
        (status = 400, description = "Empty or oversized message, or no model available"),
        (status = 404, description = "No such chat"),
    )
)]
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Response, ServerError> {
    let req: SendMessageRequest = parse_body(&body)?;

    let options = state.conversation_options();
    let turn = prepare_turn(
        &state.store,
        state.models.as_ref(),
        state.facts.as_ref(),
        &options,
        &id,
        req.into(),
    )
    .await?;

    let frames = stream_reply(
        Arc::clone(&state.store),
        Arc::clone(&state.models),
        options.reframe_mode,
        turn,
    );
    let body = Body::from_stream(frames.map(|frame| Ok::<_, Infallible>(Bytes::from(frame.to_ndjson()))));

    Ok((
        [(header::CONTENT_TYPE, NDJSON), (header::CACHE_CONTROL, "no-cache")],
        body,
    )
        .into_response())
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use super::*;
    use crate::testing::{Script, ScriptedModels, body_bytes, body_json, test_state};
    use axum::http::{Request, StatusCode};
    use chatrelay_core::Role;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    async fn post_message(app: &Router, chat_id: &str, body: Value) -> Response {
        let request = Request::post(format!("/api/chats/{chat_id}/messages"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request");
        app.clone().oneshot(request).await.expect("response")
    }

    #[tokio::test]
    async fn reply_is_streamed_as_ndjson_and_persisted() {
        let models = ScriptedModels::new(Script::Fragments(vec![
            "{\"response\":\"Hel",
            "lo\",\"done\":false}\n{\"resp",
            "onse\":\" world\",\"done\":true}",
        ]));
        let state = test_state(models).await;
        let chat = state.store.create_chat("t").await.expect("create");
        let app = crate::routes::build(Arc::clone(&state));

        let resp = post_message(&app, &chat.id, json!({ "message": "hi", "model": "llama3" })).await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()),
            Some(NDJSON)
        );
        let body = body_bytes(resp).await;
        assert_eq!(
            std::str::from_utf8(&body).expect("utf8"),
            "{\"response\":\"Hello\",\"done\":false}\n{\"response\":\" world\",\"done\":true}\n"
        );

        let listed = app
            .clone()
            .oneshot(
                Request::get(format!("/api/chats/{}/messages", chat.id))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        let messages = body_json(listed).await;
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[1]["role"], "assistant");
        assert_eq!(messages[1]["content"], "Hello world");
    }

    #[tokio::test]
    async fn blank_message_is_rejected() {
        let state = test_state(ScriptedModels::new(Script::Fragments(vec![]))).await;
        let chat = state.store.create_chat("t").await.expect("create");
        let app = crate::routes::build(state);

        let resp = post_message(&app, &chat.id, json!({ "message": "  \n" })).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["error"], "Message required");
    }

    #[tokio::test]
    async fn unknown_chat_is_not_found() {
        let app = crate::routes::build(test_state(ScriptedModels::new(Script::Fragments(vec![]))).await);

        let resp = post_message(&app, "missing", json!({ "message": "hi", "model": "m" })).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = app
            .oneshot(Request::get("/api/chats/missing/messages").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn no_models_is_a_json_error_and_stores_nothing() {
        let models = ScriptedModels::new(Script::Fragments(vec!["{\"done\":true}"]));
        let state = test_state(Arc::clone(&models)).await;
        let chat = state.store.create_chat("t").await.expect("create");
        let app = crate::routes::build(Arc::clone(&state));

        let resp = post_message(&app, &chat.id, json!({ "message": "hi" })).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(resp).await["error"],
            "No models available. Please install a model first."
        );
        assert_eq!(models.generate_calls(), 0);
        assert!(state.store.list_messages(&chat.id).await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn upstream_failure_arrives_in_band() {
        let models = ScriptedModels::new(Script::FailAfter(vec![], "connection reset"));
        let state = test_state(models).await;
        let chat = state.store.create_chat("t").await.expect("create");
        let app = crate::routes::build(Arc::clone(&state));

        let resp = post_message(&app, &chat.id, json!({ "message": "hi", "model": "m" })).await;

        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_bytes(resp).await;
        let lines: Vec<Value> = std::str::from_utf8(&body)
            .expect("utf8")
            .lines()
            .map(|l| serde_json::from_str(l).expect("json line"))
            .collect();
        assert_eq!(lines.len(), 1);
        assert!(lines[0]["error"].as_str().unwrap_or_default().contains("connection reset"));

        let messages = state.store.list_messages(&chat.id).await.expect("list");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::User);
    }
}
