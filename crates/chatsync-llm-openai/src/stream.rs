//! Opens an SSE connection to the OpenAI Responses API and maps events
//! to the chatsync-llm `StreamEvent` type.

use crate::ProviderState;
use crate::types::{
    FunctionCallArgumentsDelta, OpenAIRequest, OutputItem, OutputItemAdded, OutputItemComplete,
    OutputItemDone, OutputTextDelta, ResponseEnvelope,
};
use chatsync_llm::error::Error;
use chatsync_llm::request::ToolCallPart;
use chatsync_llm::stream::{FinishReason, StreamEvent, Usage};
use eventsource_stream::Eventsource;
use futures::Stream;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_stream::StreamExt;

pub fn open(
    state: Arc<ProviderState>,
    body: OpenAIRequest,
) -> impl Stream<Item = Result<StreamEvent, Error>> + Send {
    async_stream::try_stream! {
        let url = format!("{}/responses", state.config.base_url);
        tracing::debug!(model = %body.model, items = body.input.len(), "opening response stream");

        let resp = state
            .client
            .post(&url)
            .bearer_auth(&state.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Http(Box::new(e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body_text = resp.text().await.unwrap_or_default();
            Err(Error::Api {
                code: status.as_str().to_string(),
                message: body_text,
            })?;
            unreachable!();
        }

        let mut sse = resp.bytes_stream().eventsource();
        let mut mapper = EventMapper::new();

        while let Some(event) = sse.next().await {
            match event {
                Ok(event) => {
                    if let Some(stream_event) = mapper.map_event(&event.event, &event.data)? {
                        yield stream_event;
                    }
                }
                Err(e) => {
                    Err(Error::Sse(e.to_string()))?;
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Event mapper (stateful, tracks tool call indices)
// ---------------------------------------------------------------------------

pub(crate) struct EventMapper {
    /// Counter for tool call indices we expose to the consumer.
    tool_call_index: usize,
    /// Maps OpenAI output item ID -> our tool call index.
    id_to_index: HashMap<String, usize>,
    /// Whether we saw any tool calls (to determine finish reason).
    has_tool_calls: bool,
}

impl EventMapper {
    pub(crate) fn new() -> Self {
        Self {
            tool_call_index: 0,
            id_to_index: HashMap::new(),
            has_tool_calls: false,
        }
    }

    pub(crate) fn map_event(
        &mut self,
        event_type: &str,
        data: &str,
    ) -> Result<Option<StreamEvent>, Error> {
        match event_type {
            "response.output_text.delta" => {
                let parsed: OutputTextDelta = serde_json::from_str(data)?;
                Ok(Some(StreamEvent::TextDelta(parsed.delta)))
            }

            "response.output_item.added" => {
                let parsed: OutputItemAdded = serde_json::from_str(data)?;
                match parsed.item {
                    OutputItem::FunctionCall { id, name, call_id } => {
                        let index = self.tool_call_index;
                        self.tool_call_index += 1;
                        self.id_to_index.insert(id, index);
                        self.has_tool_calls = true;
                        Ok(Some(StreamEvent::ToolCallBegin {
                            index,
                            id: call_id,
                            name,
                        }))
                    }
                    OutputItem::Unknown => Ok(None),
                }
            }

            "response.function_call_arguments.delta" => {
                let parsed: FunctionCallArgumentsDelta = serde_json::from_str(data)?;
                let index = parsed
                    .item_id
                    .as_ref()
                    .and_then(|id| self.id_to_index.get(id).copied())
                    .unwrap_or_else(|| self.tool_call_index.saturating_sub(1));
                Ok(Some(StreamEvent::ToolCallDelta {
                    index,
                    arguments_delta: parsed.delta,
                }))
            }

            "response.output_item.done" => {
                let parsed: OutputItemDone = serde_json::from_str(data)?;
                match parsed.item {
                    OutputItemComplete::FunctionCall {
                        id,
                        call_id,
                        name,
                        arguments,
                    } => {
                        let index = self.id_to_index.get(&id).copied().unwrap_or(0);
                        Ok(Some(StreamEvent::ToolCallEnd {
                            index,
                            call: ToolCallPart {
                                id: call_id,
                                name,
                                arguments,
                            },
                        }))
                    }
                    OutputItemComplete::Unknown => Ok(None),
                }
            }

            "response.completed" => {
                let parsed: ResponseEnvelope = serde_json::from_str(data)?;
                let usage = parsed.response.usage.map(|u| Usage {
                    input_tokens: u.input_tokens,
                    output_tokens: u.output_tokens,
                });
                let reason = if self.has_tool_calls {
                    FinishReason::ToolCalls
                } else {
                    FinishReason::Stop
                };
                Ok(Some(StreamEvent::Finish { reason, usage }))
            }

            "response.incomplete" => {
                let parsed: ResponseEnvelope = serde_json::from_str(data)?;
                let usage = parsed.response.usage.map(|u| Usage {
                    input_tokens: u.input_tokens,
                    output_tokens: u.output_tokens,
                });
                Ok(Some(StreamEvent::Finish {
                    reason: FinishReason::Length,
                    usage,
                }))
            }

            "response.failed" => {
                let parsed: ResponseEnvelope = serde_json::from_str(data)?;
                match parsed.response.error {
                    Some(err) => Err(Error::Api {
                        code: err.code.unwrap_or_else(|| "response_failed".into()),
                        message: err.message,
                    }),
                    None => Ok(Some(StreamEvent::Error("response failed".into()))),
                }
            }

            "error" => Ok(Some(StreamEvent::Error(data.to_string()))),

            // Everything else (response.created, response.in_progress,
            // content_part events, *.done text events) carries nothing new.
            _ => Ok(None),
        }
    }
}
