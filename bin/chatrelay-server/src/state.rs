//! Shared application state injected into every Axum handler.

use std::fmt;
use std::sync::Arc;

use chatrelay_core::{FactSource, ModelClient};

use crate::config::Config;
use crate::entities::SqliteStore;
use crate::services::conversation::ConversationOptions;

/// State shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Chat and message store.
    pub store: Arc<SqliteStore>,
    /// Text-generation server.
    pub models: Arc<dyn ModelClient>,
    /// Source of prompt-decorating facts.
    pub facts: Arc<dyn FactSource>,
}

impl AppState {
    pub fn new(
        config: Config,
        store: SqliteStore,
        models: Arc<dyn ModelClient>,
        facts: Arc<dyn FactSource>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            store: Arc::new(store),
            models,
            facts,
        }
    }

    /// The per-message behaviour the configuration asks for.
    pub fn conversation_options(&self) -> ConversationOptions {
        ConversationOptions {
            fact_mode_default: self.config.fact_mode_default,
            default_model: self.config.default_model.clone(),
            reframe_mode: self.config.reframe_mode,
        }
    }
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}
