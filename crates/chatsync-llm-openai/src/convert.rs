//! Converts between chatsync-llm generic types and OpenAI Responses API wire format.

use chatsync_llm::request::{GenerateRequest, Message};

use crate::types::{InputContent, InputItem, OpenAIRequest, OpenAITool, Role};

pub fn to_openai_request(model_id: &str, req: &GenerateRequest) -> OpenAIRequest {
    // The Responses API takes `instructions` separately. The transcript keeps
    // at most one system message, but if several arrive the last one wins.
    let mut instructions: Option<String> = None;
    let mut input: Vec<InputItem> = Vec::new();

    for msg in &req.messages {
        match msg {
            Message::System { text } => {
                instructions = Some(text.clone());
            }
            Message::User { text } => {
                input.push(InputItem::Message {
                    role: Role::User,
                    content: vec![InputContent::InputText { text: text.clone() }],
                });
            }
            Message::Assistant { text } => {
                // Assistant text is replayed as "output_text", not "input_text".
                input.push(InputItem::Message {
                    role: Role::Assistant,
                    content: vec![InputContent::OutputText { text: text.clone() }],
                });
            }
        }
    }

    let tools: Vec<OpenAITool> = req
        .tools
        .iter()
        .map(|t| OpenAITool::Function {
            name: t.name.clone(),
            description: t.description.clone(),
            parameters: t.parameters.to_json_schema(),
            strict: true,
        })
        .collect();

    // The flag is meaningless without tools and the API rejects it there.
    let parallel_tool_calls = if tools.is_empty() {
        None
    } else {
        req.options.parallel_tool_calls
    };

    OpenAIRequest {
        model: model_id.to_string(),
        input,
        stream: true,
        instructions,
        max_output_tokens: req.options.max_tokens,
        temperature: req.options.temperature,
        tools,
        parallel_tool_calls,
    }
}
