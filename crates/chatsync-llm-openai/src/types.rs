//! OpenAI Responses API wire types.
//!
//! These are the raw JSON shapes sent to / received from the API.
//! They are intentionally separate from the chatsync-llm public types.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct OpenAIRequest {
    pub model: String,
    pub input: Vec<InputItem>,
    pub stream: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<OpenAITool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallel_tool_calls: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputItem {
    Message { role: Role, content: Vec<InputContent> },
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputContent {
    InputText { text: String },
    /// Used for assistant message content (previous output replayed as input).
    OutputText { text: String },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum OpenAITool {
    #[serde(rename = "function")]
    Function {
        name: String,
        description: String,
        parameters: serde_json::Value,
        strict: bool,
    },
}

// ---------------------------------------------------------------------------
// SSE event types (only the ones we care about for streaming)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ResponseObject {
    pub usage: Option<UsageObject>,
    #[serde(default)]
    pub error: Option<ErrorObject>,
}

#[derive(Debug, Deserialize)]
pub struct UsageObject {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

#[derive(Debug, Deserialize)]
pub struct ErrorObject {
    #[serde(default)]
    pub code: Option<String>,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct OutputItemAdded {
    pub item: OutputItem,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputItem {
    FunctionCall {
        id: String,
        #[serde(default)]
        name: String,
        #[serde(default)]
        call_id: String,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
pub struct OutputTextDelta {
    pub delta: String,
}

#[derive(Debug, Deserialize)]
pub struct FunctionCallArgumentsDelta {
    pub item_id: Option<String>,
    pub delta: String,
}

#[derive(Debug, Deserialize)]
pub struct OutputItemDone {
    pub item: OutputItemComplete,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputItemComplete {
    FunctionCall {
        id: String,
        call_id: String,
        name: String,
        arguments: String,
    },
    #[serde(other)]
    Unknown,
}

/// Payload of `response.completed` and `response.failed`.
#[derive(Debug, Deserialize)]
pub struct ResponseEnvelope {
    pub response: ResponseObject,
}
