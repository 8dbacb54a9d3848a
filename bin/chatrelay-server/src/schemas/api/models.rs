use chatrelay_core::ModelInfo;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// An installed model.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ModelResponse {
    pub name: String,
    /// Size on disk in bytes; `0` when unknown.
    pub size: u64,
}

impl From<ModelInfo> for ModelResponse {
    fn from(info: ModelInfo) -> Self {
        ModelResponse {
            name: info.name,
            size: info.size,
        }
    }
}
