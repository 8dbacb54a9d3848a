use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use tracing::warn;
use utoipa::OpenApi;

use crate::schemas::api::models::ModelResponse;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(list_models), components(schemas(ModelResponse)))]
pub struct ModelsApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/models", get(list_models))
}

/// Installed models of the model server.
///
/// An unreachable model server yields an empty list rather than an error so
/// the model picker can still render.
#[utoipa::path(
    get,
    path = "/api/models",
    tag = "models",
    responses(
        (status = 200, description = "Installed models", body = Vec<ModelResponse>),
    )
)]
pub async fn list_models(State(state): State<Arc<AppState>>) -> Json<Vec<ModelResponse>> {
    match state.models.list_models().await {
        Ok(models) => Json(models.into_iter().map(ModelResponse::from).collect()),
        Err(e) => {
            warn!(error = %e, "could not list installed models");
            Json(Vec::new())
        }
    }
}
