pub mod chats;
pub mod messages;
pub mod models;

use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use serde::de::DeserializeOwned;
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::state::AppState;

/// Routes nested under `/api`.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .merge(chats::router())
        .merge(messages::router())
        .merge(models::router())
}

#[derive(OpenApi)]
#[openapi()]
pub struct Api;

pub fn api_docs() -> utoipa::openapi::OpenApi {
    let mut spec = Api::openapi();
    spec.merge(chats::ChatsApi::openapi());
    spec.merge(messages::MessagesApi::openapi());
    spec.merge(models::ModelsApi::openapi());
    spec
}

/// Decode a JSON request body. An empty body decodes as `T::default()`, so
/// every field is reported as missing by the handler rather than as a parse
/// failure.
pub(crate) fn parse_body<T>(body: &Bytes) -> Result<T, ServerError>
where
    T: DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| ServerError::BadRequest(format!("invalid JSON body: {e}")))
}
