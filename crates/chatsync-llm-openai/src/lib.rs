mod convert;
mod stream;
mod types;

use chatsync_llm::request::GenerateRequest;
use chatsync_llm::response::Response;
use chatsync_llm::{LanguageModel, LanguageModelBackend};
use std::sync::Arc;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Configuration for the OpenAI backend.
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    pub api_key: String,
    pub base_url: String,
}

/// Create a model handle for `model_id` talking to the Responses API.
pub fn model(config: OpenAIConfig, model_id: impl Into<String>) -> LanguageModel {
    LanguageModel::new(OpenAIModel {
        model_id: model_id.into(),
        state: Arc::new(ProviderState {
            client: reqwest::Client::new(),
            config,
        }),
    })
}

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

struct ProviderState {
    client: reqwest::Client,
    config: OpenAIConfig,
}

struct OpenAIModel {
    model_id: String,
    state: Arc<ProviderState>,
}

impl LanguageModelBackend for OpenAIModel {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn provider(&self) -> &str {
        "openai"
    }

    fn generate(&self, request: GenerateRequest) -> Response {
        let body = convert::to_openai_request(&self.model_id, &request);
        let state = Arc::clone(&self.state);
        Response::new(stream::open(state, body))
    }
}
