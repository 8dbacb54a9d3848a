//! Fact source used to decorate prompts.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::UpstreamError;

/// A fetched fact. Serialised as-is into the `fact_used` field of the final
/// frame of a reply that used it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fact {
    pub subject: String,
    pub text: String,
}

#[async_trait]
pub trait FactSource: Send + Sync {
    /// Fetch one fact. Any failure, including an empty fact, is `None`.
    async fn fetch_fact(&self) -> Option<Fact>;
}

/// Shape of the third-party fact API response.
#[derive(Debug, Deserialize)]
struct FactPayload {
    #[serde(default = "unknown_subject")]
    animal: String,
    #[serde(default)]
    fact: String,
}

fn unknown_subject() -> String {
    "Unknown".to_owned()
}

/// [`FactSource`] backed by an HTTP GET returning `{"animal": .., "fact": ..}`.
#[derive(Debug, Clone)]
pub struct HttpFactSource {
    url: String,
    http: reqwest::Client,
}

impl HttpFactSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            url: url.into(),
            http,
        })
    }

    async fn try_fetch(&self) -> Result<FactPayload, UpstreamError> {
        let response = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| UpstreamError::from_send(&self.url, e))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json::<FactPayload>().await?)
    }
}

#[async_trait]
impl FactSource for HttpFactSource {
    async fn fetch_fact(&self) -> Option<Fact> {
        match self.try_fetch().await {
            Ok(payload) if payload.fact.trim().is_empty() => {
                debug!(url = %self.url, "fact source returned an empty fact");
                None
            }
            Ok(payload) => Some(Fact {
                subject: payload.animal,
                text: payload.fact,
            }),
            Err(e) => {
                warn!(url = %self.url, error = %e, "failed to fetch fact");
                None
            }
        }
    }
}
