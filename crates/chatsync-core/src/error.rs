/// Failures reported by a [`BlobStore`](crate::store::BlobStore).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(Box<dyn std::error::Error + Send + Sync>),

    #[error("storage task failed: {0}")]
    Task(String),
}

/// Errors from [`ConversationController::handle_message`](crate::ConversationController::handle_message).
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// The request was rejected before any state was touched.
    #[error("{0}")]
    Validation(&'static str),

    #[error("model call failed: {0}")]
    Model(#[from] chatsync_llm::Error),

    #[error("model requested unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid tool arguments: {0}")]
    ToolArguments(#[source] serde_json::Error),

    /// Memory and subscribers already reflect the update; only the durable
    /// write failed.
    #[error("user data was updated but could not be saved")]
    Persist,
}

impl ChatError {
    pub fn is_validation(&self) -> bool {
        matches!(self, ChatError::Validation(_))
    }
}

/// A tool descriptor that cannot be offered to the model.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ToolSpecError {
    #[error("tool name must not be empty")]
    EmptyName,

    #[error("tool '{0}' must take an object of parameters")]
    NotAnObject(String),

    #[error("tool '{tool}' requires undeclared parameter '{field}'")]
    UndeclaredRequired { tool: String, field: String },

    #[error("tool '{tool}' declares parameter '{field}' twice")]
    DuplicateProperty { tool: String, field: String },
}
