//! Ollama HTTP API client.
//!
//! `POST /api/generate` with `"stream": true` answers with NDJSON:
//! ```text
//! {"model":"llama3","response":"Hel","done":false}
//! {"model":"llama3","response":"lo","done":false}
//! {"model":"llama3","response":"","done":true,"eval_count":2}
//! ```
//! The body is forwarded as raw text fragments; turning them back into
//! objects is the reframer's job.
//!
//! Reference: <https://github.com/ollama/ollama/blob/main/docs/api.md>

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::utf8::Utf8Carry;
use super::{FragmentStream, ModelClient, ModelInfo};
use crate::error::UpstreamError;

/// Total timeout for short, non-streaming calls such as `/api/tags`.
const LIST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

/// [`ModelClient`] for an Ollama server.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: String,
    /// Connect timeout only: a generation may legitimately run for minutes.
    stream_http: reqwest::Client,
    http: reqwest::Client,
}

impl OllamaClient {
    /// `base_url` is the server root, e.g. `http://localhost:11434`.
    pub fn new(base_url: impl Into<String>, connect_timeout: Duration) -> Result<Self, UpstreamError> {
        let stream_http = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;
        let http = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(LIST_TIMEOUT)
            .build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            stream_http,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

#[async_trait]
impl ModelClient for OllamaClient {
    async fn stream_generate(&self, prompt: &str, model: &str) -> Result<FragmentStream, UpstreamError> {
        let url = self.endpoint("api/generate");
        debug!(%url, %model, prompt_len = prompt.len(), "opening generation stream");

        let response = self
            .stream_http
            .post(&url)
            .json(&GenerateRequest {
                model,
                prompt,
                stream: true,
            })
            .send()
            .await
            .map_err(|e| UpstreamError::from_send(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(text_fragments(response.bytes_stream()).boxed())
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, UpstreamError> {
        let url = self.endpoint("api/tags");
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| UpstreamError::from_send(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let tags: TagsResponse = response.json().await.map_err(|e| UpstreamError::InvalidResponse {
            message: e.to_string(),
        })?;
        info!(count = tags.models.len(), "listed installed models");
        Ok(tags.models)
    }
}

/// Map an HTTP byte stream to UTF-8 text fragments. Empty fragments (a chunk
/// holding only part of a multi-byte character) are skipped.
fn text_fragments<S>(bytes: S) -> impl futures::Stream<Item = Result<String, UpstreamError>> + Send + 'static
where
    S: futures::Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send + 'static,
{
    async_stream::stream! {
        let mut carry = Utf8Carry::default();
        let mut bytes = std::pin::pin!(bytes);

        while let Some(chunk) = bytes.next().await {
            match chunk {
                Ok(chunk) => {
                    let text = carry.decode(&chunk);
                    if !text.is_empty() {
                        yield Ok(text);
                    }
                }
                Err(e) => {
                    yield Err(UpstreamError::Http(e));
                    return;
                }
            }
        }

        if let Some(rest) = carry.finish() {
            yield Ok(rest);
        }
    }
}
