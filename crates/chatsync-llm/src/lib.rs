pub mod describe;
pub mod error;
pub mod model;
pub mod request;
pub mod response;
pub mod stream;

pub use describe::Describe;
pub use error::Error;
pub use model::{LanguageModel, LanguageModelBackend};
pub use request::{
    GenerateOptions, GenerateRequest, Message, Property, RequestBuilder, Schema, ToolCallPart,
    ToolDefinition, request,
};
pub use response::{GenerateResult, Response};
pub use stream::{FinishReason, StreamEvent, Usage};
