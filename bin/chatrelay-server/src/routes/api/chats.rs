use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use tracing::info;
use utoipa::OpenApi;
use validator::Validate;

use crate::entities::ChatStore;
use crate::error::ServerError;
use crate::routes::api::parse_body;
use crate::schemas::api::chat::{
    ChatResponse, CreateChatRequest, DEFAULT_CHAT_TITLE, RenameChatRequest, SuccessResponse,
};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(list_chats, create_chat, rename_chat, delete_chat),
    components(schemas(CreateChatRequest, RenameChatRequest, ChatResponse, SuccessResponse))
)]
pub struct ChatsApi;

/// Register chat routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/chats", get(list_chats).post(create_chat))
        .route("/chats/{id}", put(rename_chat).delete(delete_chat))
}

// ── Chat handlers ─────────────────────────────────────────────────────────────

#[utoipa::path(
    get,
    path = "/api/chats",
    tag = "chats",
    responses(
        (status = 200, description = "Chats, most recently updated first", body = Vec<ChatResponse>),
        (status = 500, description = "Database error"),
    )
)]
pub async fn list_chats(State(state): State<Arc<AppState>>) -> Result<Json<Vec<ChatResponse>>, ServerError> {
    let chats = state.store.list_chats().await?;
    Ok(Json(chats.iter().map(|c| c.to_response()).collect()))
}

#[utoipa::path(
    post,
    path = "/api/chats",
    tag = "chats",
    request_body = CreateChatRequest,
    responses(
        (status = 201, description = "Chat created", body = ChatResponse),
        (status = 400, description = "Bad request"),
        (status = 500, description = "Database error"),
    )
)]
pub async fn create_chat(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<(StatusCode, Json<ChatResponse>), ServerError> {
    let req: CreateChatRequest = parse_body(&body)?;
    req.validate()?;

    let title = req
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(DEFAULT_CHAT_TITLE);
    let chat = state.store.create_chat(title).await?;
    info!(chat_id = %chat.id, "chat created");
    Ok((StatusCode::CREATED, Json(chat.to_response())))
}

#[utoipa::path(
    put,
    path = "/api/chats/{id}",
    tag = "chats",
    params(("id" = String, Path, description = "Chat id")),
    request_body = RenameChatRequest,
    responses(
        (status = 200, description = "Chat renamed", body = SuccessResponse),
        (status = 400, description = "Title missing or too long"),
        (status = 404, description = "No such chat"),
    )
)]
pub async fn rename_chat(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<SuccessResponse>, ServerError> {
    let req: RenameChatRequest = parse_body(&body)?;
    req.validate()?;

    let title = req
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ServerError::BadRequest("Title required".into()))?;
    if !state.store.rename_chat(&id, title).await? {
        return Err(ServerError::NotFound(format!("chat {id} not found")));
    }
    Ok(Json(SuccessResponse::ok()))
}

#[utoipa::path(
    delete,
    path = "/api/chats/{id}",
    tag = "chats",
    params(("id" = String, Path, description = "Chat id")),
    responses(
        (status = 200, description = "Chat and its messages deleted", body = SuccessResponse),
        (status = 404, description = "No such chat"),
    )
)]
pub async fn delete_chat(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, ServerError> {
    if !state.store.delete_chat(&id).await? {
        return Err(ServerError::NotFound(format!("chat {id} not found")));
    }
    info!(chat_id = %id, "chat deleted");
    Ok(Json(SuccessResponse::ok()))
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use crate::routes::build;
    use crate::testing::{Script, ScriptedModels, body_json, test_state};
    use axum::Router;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use axum::response::Response;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    async fn app() -> Router {
        build(test_state(ScriptedModels::new(Script::Fragments(vec![]))).await)
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> Response {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");
        app.clone().oneshot(request).await.expect("response")
    }

    #[tokio::test]
    async fn create_without_body_uses_default_title() {
        let app = app().await;

        let resp = send(&app, "POST", "/api/chats", None).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let chat = body_json(resp).await;
        assert_eq!(chat["title"], "New Chat");
        assert!(!chat["id"].as_str().unwrap_or_default().is_empty());

        let resp = send(&app, "POST", "/api/chats", Some(json!({ "title": "   " }))).await;
        assert_eq!(body_json(resp).await["title"], "New Chat");
    }

    #[tokio::test]
    async fn created_chats_are_listed_newest_first() {
        let app = app().await;
        send(&app, "POST", "/api/chats", Some(json!({ "title": "one" }))).await;
        send(&app, "POST", "/api/chats", Some(json!({ "title": "two" }))).await;

        let resp = send(&app, "GET", "/api/chats", None).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let titles: Vec<Value> = body_json(resp)
            .await
            .as_array()
            .expect("array")
            .iter()
            .map(|c| c["title"].clone())
            .collect();
        assert_eq!(titles, vec![json!("two"), json!("one")]);
    }

    #[tokio::test]
    async fn rename_requires_title_and_existing_chat() {
        let app = app().await;
        let chat = body_json(send(&app, "POST", "/api/chats", None).await).await;
        let uri = format!("/api/chats/{}", chat["id"].as_str().expect("id"));

        let resp = send(&app, "PUT", &uri, Some(json!({}))).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["error"], "Title required");

        let resp = send(&app, "PUT", "/api/chats/missing", Some(json!({ "title": "x" }))).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = send(&app, "PUT", &uri, Some(json!({ "title": "Renamed" }))).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await, json!({ "success": true }));

        let listed = body_json(send(&app, "GET", "/api/chats", None).await).await;
        assert_eq!(listed[0]["title"], "Renamed");
    }

    #[tokio::test]
    async fn overlong_title_is_rejected() {
        let app = app().await;
        let resp = send(&app, "POST", "/api/chats", Some(json!({ "title": "x".repeat(201) }))).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn delete_removes_chat_and_is_not_found_afterwards() {
        let app = app().await;
        let chat = body_json(send(&app, "POST", "/api/chats", None).await).await;
        let uri = format!("/api/chats/{}", chat["id"].as_str().expect("id"));

        let resp = send(&app, "DELETE", &uri, None).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await, json!({ "success": true }));

        let resp = send(&app, "DELETE", &uri, None).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let listed = body_json(send(&app, "GET", "/api/chats", None).await).await;
        assert_eq!(listed, json!([]));
    }
}
