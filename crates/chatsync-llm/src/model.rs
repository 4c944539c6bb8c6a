use std::sync::Arc;

use crate::request::GenerateRequest;
use crate::response::Response;

/// A cheaply clonable, type-erased language model handle.
///
/// Request handlers share one handle; every clone talks to the same backend.
#[derive(Clone)]
pub struct LanguageModel {
    inner: Arc<dyn LanguageModelBackend>,
}

impl LanguageModel {
    /// Wrap any backend implementation into a model.
    pub fn new(backend: impl LanguageModelBackend + 'static) -> Self {
        Self {
            inner: Arc::new(backend),
        }
    }

    /// The model identifier (e.g. `"gpt-4o"`).
    pub fn model_id(&self) -> &str {
        self.inner.model_id()
    }

    /// The provider name this model belongs to.
    pub fn provider(&self) -> &str {
        self.inner.provider()
    }

    /// Generate a streaming response.
    pub fn generate(&self, request: impl Into<GenerateRequest>) -> Response {
        self.inner.generate(request.into())
    }
}

impl std::fmt::Debug for LanguageModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanguageModel")
            .field("provider", &self.provider())
            .field("model_id", &self.model_id())
            .finish()
    }
}

/// Trait that provider crates implement for a specific model.
pub trait LanguageModelBackend: Send + Sync {
    fn model_id(&self) -> &str;
    fn provider(&self) -> &str;
    fn generate(&self, request: GenerateRequest) -> Response;
}
