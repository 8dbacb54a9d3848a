//! Test fixtures: in-process doubles for the model server and the fact API,
//! plus response body helpers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::response::Response;
use chatrelay_core::{Fact, FactSource, FragmentStream, ModelClient, ModelInfo, UpstreamError};
use futures::StreamExt;
use http_body_util::BodyExt;
use serde_json::Value;

use crate::config::Config;
use crate::entities::{SqliteStore, memory_store};
use crate::state::AppState;

pub async fn test_store() -> Arc<SqliteStore> {
    Arc::new(memory_store().await)
}

/// What a [`ScriptedModels`] generation stream does.
#[derive(Debug, Clone)]
pub enum Script {
    /// Yield these fragments, then end.
    Fragments(Vec<&'static str>),
    /// Yield these fragments, then fail with the message.
    FailAfter(Vec<&'static str>, &'static str),
}

#[derive(Debug)]
pub struct ScriptedModels {
    script: Script,
    installed: Vec<ModelInfo>,
    generate_calls: AtomicUsize,
    list_calls: AtomicUsize,
    last_request: Mutex<Option<(String, String)>>,
}

impl ScriptedModels {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            installed: Vec::new(),
            generate_calls: AtomicUsize::new(0),
            list_calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        })
    }

    pub fn with_models(self: Arc<Self>, installed: Vec<ModelInfo>) -> Arc<Self> {
        let mut inner = Arc::try_unwrap(self).expect("unshared");
        inner.installed = installed;
        Arc::new(inner)
    }

    pub fn generate_calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.last_request.lock().expect("lock").as_ref().map(|(p, _)| p.clone())
    }

    pub fn last_model(&self) -> Option<String> {
        self.last_request.lock().expect("lock").as_ref().map(|(_, m)| m.clone())
    }
}

#[async_trait]
impl ModelClient for ScriptedModels {
    async fn stream_generate(&self, prompt: &str, model: &str) -> Result<FragmentStream, UpstreamError> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().expect("lock") = Some((prompt.to_owned(), model.to_owned()));

        let (fragments, failure) = match &self.script {
            Script::Fragments(f) => (f.clone(), None),
            Script::FailAfter(f, msg) => (f.clone(), Some(*msg)),
        };
        let mut items: Vec<Result<String, UpstreamError>> =
            fragments.into_iter().map(|f| Ok(f.to_owned())).collect();
        if let Some(message) = failure {
            items.push(Err(UpstreamError::InvalidResponse {
                message: message.to_owned(),
            }));
        }
        Ok(futures::stream::iter(items).boxed())
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, UpstreamError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.installed.clone())
    }
}

#[derive(Debug, Default)]
pub struct StaticFacts {
    fact: Option<Fact>,
    calls: AtomicUsize,
}

impl StaticFacts {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn some(subject: &str, text: &str) -> Self {
        Self {
            fact: Some(Fact {
                subject: subject.into(),
                text: text.into(),
            }),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FactSource for StaticFacts {
    async fn fetch_fact(&self) -> Option<Fact> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.fact.clone()
    }
}

/// State with fact mode off and the scripted model client.
pub async fn test_state(models: Arc<ScriptedModels>) -> Arc<AppState> {
    let config = Config {
        fact_mode_default: false,
        ..Config::default()
    };
    Arc::new(AppState::new(
        config,
        memory_store().await,
        models,
        Arc::new(StaticFacts::none()),
    ))
}

pub async fn body_bytes(resp: Response) -> axum::body::Bytes {
    resp.into_body().collect().await.expect("body").to_bytes()
}

pub async fn body_json(resp: Response) -> Value {
    serde_json::from_slice(&body_bytes(resp).await).expect("JSON body")
}
