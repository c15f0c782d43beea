//! Generation backend adapter
//!
//! Uniform interface over the code-generation providers. A request is
//! formatted with the safety policy and quality guidance, sent to exactly
//! one provider, and the structured `{status, code|reason}` reply is parsed,
//! sanitized and classified.

mod analysis;
mod gemini;
mod openai;
mod prompt;

pub use analysis::{analyze_complexity, estimate_render_time};
pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;
pub use prompt::retry_prompt;

use async_trait::async_trait;
use reel_core::domain::render::{Backend, Complexity, RenderConfig};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Errors surfaced by code generation. None of them are retried here.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("backend {0} is not configured")]
    UnsupportedBackend(Backend),

    #[error("{backend} request failed: {source}")]
    Transport {
        backend: Backend,
        #[source]
        source: reqwest::Error,
    },

    #[error("{backend} returned status {status}: {body}")]
    Provider {
        backend: Backend,
        status: u16,
        body: String,
    },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("prompt rejected: {0}")]
    Rejected(String),

    #[error("generated code uses a prohibited construct: {0}")]
    UnsafeCode(String),

    #[error("generation timed out after {0:?}")]
    TimedOut(Duration),
}

/// A request for animation code
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    /// Unset resolves to the generator's default backend
    pub backend: Option<Backend>,
    pub config: RenderConfig,
}

/// Accepted, sanitized code plus its estimates
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedCode {
    pub code: String,
    pub complexity: Complexity,
    /// Estimated render duration in seconds
    pub estimated_render_time: u64,
    pub backend: Backend,
}

/// Produces animation code for a prompt
#[async_trait]
pub trait CodeGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedCode, GenerationError>;
}

/// A single chat-style model endpoint
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn backend(&self) -> Backend;

    /// Sends one system/user exchange and returns the raw reply text
    async fn complete(&self, system_prompt: &str, user_prompt: &str)
    -> Result<String, GenerationError>;
}

/// Code generator that routes each request to one of several providers
pub struct MultiBackendGenerator {
    providers: HashMap<Backend, Arc<dyn LlmProvider>>,
    default_backend: Backend,
}

impl MultiBackendGenerator {
    pub fn new(default_backend: Backend) -> Self {
        Self {
            providers: HashMap::new(),
            default_backend,
        }
    }

    /// Registers a provider under its own backend
    pub fn with_provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.providers.insert(provider.backend(), provider);
        self
    }

    pub fn backends(&self) -> Vec<Backend> {
        let mut backends: Vec<Backend> = self.providers.keys().copied().collect();
        backends.sort_by_key(|b| b.as_str());
        backends
    }
}

#[async_trait]
impl CodeGenerator for MultiBackendGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedCode, GenerationError> {
        let backend = request.backend.unwrap_or(self.default_backend);
        let provider = self
            .providers
            .get(&backend)
            .ok_or(GenerationError::UnsupportedBackend(backend))?;

        let user_prompt = prompt::user_prompt(&request.prompt, &request.config);
        let raw = provider
            .complete(prompt::SYSTEM_PROMPT, &user_prompt)
            .await?;
        debug!("{} replied with {} bytes", backend, raw.len());

        let code = prompt::parse_response(&raw)?;
        let code = prompt::sanitize_code(&code)?;
        let complexity = analyze_complexity(&code);
        let estimated_render_time = estimate_render_time(complexity, &request.config);

        info!(
            "Generated code using {} ({:?}, ~{}s render)",
            backend, complexity, estimated_render_time
        );

        Ok(GeneratedCode {
            code,
            complexity,
            estimated_render_time,
            backend,
        })
    }
}
