//! Client side of the text-generation server.
//!
//! [`ModelClient`] is the seam the request handler depends on; the default
//! implementation is [`ollama::OllamaClient`]. Tests substitute scripted
//! clients.

pub mod ollama;
mod utf8;

pub use ollama::OllamaClient;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::UpstreamError;

/// Raw body fragments of one generation, in arrival order. An `Err` item is a
/// mid-stream connection failure and is always the last item.
pub type FragmentStream = BoxStream<'static, Result<String, UpstreamError>>;

/// An installed model as reported by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    /// Size on disk in bytes; `0` when the server did not say.
    #[serde(default)]
    pub size: u64,
}

#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Start a streaming generation.
    ///
    /// Resolves once response headers arrive. Connection failures and non-2xx
    /// statuses are returned as `Err` before any fragment is produced.
    async fn stream_generate(&self, prompt: &str, model: &str) -> Result<FragmentStream, UpstreamError>;

    /// List installed models, in the order the server reports them.
    async fn list_models(&self) -> Result<Vec<ModelInfo>, UpstreamError>;
}
