//! chatrelay-core – the transport-independent half of chatrelay.
//!
//! - [`reframer`] turns an arbitrarily chunked upstream body into NDJSON frames.
//! - [`prompt`] renders chat history and the optional fact preamble.
//! - [`upstream`] talks to the text-generation server (Ollama API).
//! - [`facts`] fetches the fact used to decorate prompts.

pub mod error;
pub mod facts;
pub mod frame;
pub mod prompt;
pub mod reframer;
pub mod upstream;

pub use error::UpstreamError;
pub use facts::{Fact, FactSource, HttpFactSource};
pub use frame::Frame;
pub use prompt::{Role, compose_prompt, render_history};
pub use reframer::{ReframeMode, Reframer, reframe};
pub use upstream::{FragmentStream, ModelClient, ModelInfo, OllamaClient};
