//! Translates between the OpenAI Chat Completions wire shape and this
//! crate's internal [`crate::session::CoreEvent`] stream: flattening
//! `messages[]`/`tools[]` into a Cursor prompt and tool list on the way in,
//! and re-emitting core events as SSE chunks (or one aggregated response) on
//! the way out. Grounded on `core/src/chat_completions.rs`'s
//! `stream_chat_completions` (message flattening, tool JSON passthrough) and
//! its `AggregatedChatStream` (the non-streaming collapse rule).
//!
//! Request/response (de)serialization of the OpenAI payload itself is the
//! out-of-scope HTTP framework's job; the types here are the typed boundary
//! the framework hands requests across and reads responses back through.

use cursor_protocol::McpToolDefinition;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::session::CoreEvent;

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub tools: Vec<ChatTool>,
    #[serde(default)]
    pub stream: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<JsonValue>,
    #[serde(default)]
    pub tool_calls: Vec<ChatToolCall>,
    #[serde(default)]
    pub tool_call_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatToolCall {
    pub id: String,
    pub function: ChatFunctionCall,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatFunctionCall {
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatTool {
    pub function: ChatToolFunction,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatToolFunction {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: JsonValue,
}

/// Concatenates `messages[]` into one Cursor prompt, role-labeling each turn
/// so the model can still tell a tool result from a user message even though
/// Cursor only ever sees a single flat string. Assistant tool-calls are
/// rendered as readable JSON rather than dropped, since a later turn in the
/// same flattened history may refer back to them.
pub fn flatten_prompt(messages: &[ChatMessage]) -> String {
    let mut out = String::new();
    for message in messages {
        match message.role.as_str() {
            "assistant" => {
                if let Some(text) = message_text(message) {
                    out.push_str("[assistant]\n");
                    out.push_str(&text);
                    out.push_str("\n\n");
                }
                for call in &message.tool_calls {
                    let rendered = serde_json::json!({
                        "tool_call_id": call.id,
                        "name": call.function.name,
                        "arguments": call.function.arguments,
                    });
                    out.push_str("[assistant tool_call]\n");
                    out.push_str(&serde_json::to_string_pretty(&rendered).unwrap_or_default());
                    out.push_str("\n\n");
                }
            }
            "tool" => {
                let id = message.tool_call_id.as_deref().unwrap_or("");
                out.push_str(&format!("[tool result {id}]\n"));
                out.push_str(&message_text(message).unwrap_or_default());
                out.push_str("\n\n");
            }
            role => {
                if let Some(text) = message_text(message) {
                    out.push_str(&format!("[{role}]\n"));
                    out.push_str(&text);
                    out.push_str("\n\n");
                }
            }
        }
    }
    out.trim_end().to_string()
}

/// OpenAI content may be a plain string or a list of `{type, text}` parts;
/// only the text parts matter for the flattened prompt.
fn message_text(message: &ChatMessage) -> Option<String> {
    match message.content.as_ref()? {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Array(items) => {
            let mut text = String::new();
            for item in items {
                if let Some(t) = item.get("text").and_then(|t| t.as_str()) {
                    text.push_str(t);
                }
            }
            if text.is_empty() { None } else { Some(text) }
        }
        _ => None,
    }
}

/// Forwards `tools[].function` verbatim into `McpToolDefinition`s, passing
/// the JSON-schema `parameters` object through the generic wire `Value`
/// encoder untouched.
pub fn extract_tools(tools: &[ChatTool]) -> Vec<McpToolDefinition> {
    tools
        .iter()
        .map(|tool| McpToolDefinition {
            name: tool.function.name.clone(),
            description: tool.function.description.clone(),
            json_schema: cursor_protocol::json_to_wire(&tool.function.parameters),
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct Delta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<DeltaToolCall>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeltaToolCall {
    pub index: u32,
    pub id: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub function: DeltaFunctionCall,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeltaFunctionCall {
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct ChunkChoice {
    pub index: u32,
    pub delta: Delta,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub object: &'static str,
    pub model: String,
    pub choices: Vec<ChunkChoice>,
}

/// Formats one chunk as an SSE `data:` line, ready to write straight to the
/// response body.
pub fn format_chunk(chunk: &ChatCompletionChunk) -> String {
    format!("data: {}\n\n", serde_json::to_string(chunk).unwrap_or_default())
}

pub const DONE: &str = "data: [DONE]\n\n";

/// Terminal error event for a stream that's already past its response
/// headers: per §7, a fatal mid-session error (a bad trailer, a dropped
/// connection) still has to close out the SSE body gracefully rather than
/// abandoning it, so it's surfaced as one more `data:` line carrying an
/// OpenAI-shaped error envelope before `[DONE]`.
pub fn format_error_chunk(message: &str) -> String {
    let body = serde_json::json!({
        "error": {
            "message": message,
            "type": "cursor_proxy_error",
        }
    });
    format!("data: {}\n\n", serde_json::to_string(&body).unwrap_or_default())
}

/// Turns one `CoreEvent` into zero or more streaming chunks, tracking
/// `tool_calls[].index` across partial-argument deltas and the
/// `finish_reason` rule from §4.5 ("tool_calls" if the turn ended on a tool
/// request, "stop" otherwise).
pub struct ChunkEmitter {
    id: String,
    model: String,
    next_tool_index: u32,
    last_was_tool: bool,
    any_text_sent: bool,
}

impl ChunkEmitter {
    pub fn new(id: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            model: model.into(),
            next_tool_index: 0,
            last_was_tool: false,
            any_text_sent: false,
        }
    }

    pub fn emit(&mut self, event: &CoreEvent) -> Vec<ChatCompletionChunk> {
        match event {
            CoreEvent::Text(text) => {
                self.last_was_tool = false;
                self.any_text_sent = true;
                vec![self.chunk(Delta {
                    role: first_role(self.any_text_sent),
                    content: Some(text.clone()),
                    tool_calls: Vec::new(),
                })]
            }
            CoreEvent::ToolExecRequested {
                tool_call_id,
                name,
                arguments,
            } => {
                let index = self.next_tool_index;
                self.next_tool_index += 1;
                self.last_was_tool = true;
                vec![self.chunk(Delta {
                    role: None,
                    content: None,
                    tool_calls: vec![DeltaToolCall {
                        index,
                        id: tool_call_id.clone(),
                        kind: "function",
                        function: DeltaFunctionCall {
                            name: name.clone(),
                            arguments: serde_json::to_string(arguments).unwrap_or_default(),
                        },
                    }],
                })]
            }
            CoreEvent::PartialToolCall {
                tool_call_id: _,
                args_text_delta,
            } => {
                let index = self.next_tool_index.saturating_sub(1);
                vec![self.chunk(Delta {
                    role: None,
                    content: None,
                    tool_calls: vec![DeltaToolCall {
                        index,
                        id: String::new(),
                        kind: "function",
                        function: DeltaFunctionCall {
                            name: String::new(),
                            arguments: args_text_delta.clone(),
                        },
                    }],
                })]
            }
            CoreEvent::TurnEnded => {
                let finish_reason = if self.last_was_tool { "tool_calls" } else { "stop" };
                vec![self.chunk_with_finish(finish_reason)]
            }
            // Tool-call-started/completed/checkpoint/aborted carry no
            // OpenAI-visible shape of their own; they only matter to the
            // idle/progress tracker inside `Session`.
            CoreEvent::ToolCallStarted { .. }
            | CoreEvent::ToolCallCompleted { .. }
            | CoreEvent::Checkpoint(_)
            | CoreEvent::Aborted(_) => Vec::new(),
        }
    }

    fn chunk(&self, delta: Delta) -> ChatCompletionChunk {
        ChatCompletionChunk {
            id: self.id.clone(),
            object: "chat.completion.chunk",
            model: self.model.clone(),
            choices: vec![ChunkChoice {
                index: 0,
                delta,
                finish_reason: None,
            }],
        }
    }

    fn chunk_with_finish(&self, finish_reason: &str) -> ChatCompletionChunk {
        ChatCompletionChunk {
            id: self.id.clone(),
            object: "chat.completion.chunk",
            model: self.model.clone(),
            choices: vec![ChunkChoice {
                index: 0,
                delta: Delta::default(),
                finish_reason: Some(finish_reason.to_string()),
            }],
        }
    }
}

fn first_role(any_text_sent: bool) -> Option<String> {
    if any_text_sent { None } else { Some("assistant".to_string()) }
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub function: DeltaFunctionCall,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct ResponseMessage {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseChoice {
    pub index: u32,
    pub message: ResponseMessage,
    pub finish_reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: &'static str,
    pub model: String,
    pub choices: Vec<ResponseChoice>,
}

/// Collapses an entire core-event stream into one JSON body, the same way
/// `AggregatedChatStream` collapses incremental `OutputItemDone` deltas into
/// a single final assistant message before `Completed`: all text
/// concatenated in arrival order, all tool-exec requests collected into one
/// `tool_calls[]` array in arrival order.
#[derive(Debug, Default)]
pub struct Aggregator {
    content: String,
    tool_calls: Vec<ToolCall>,
    last_was_tool: bool,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: &CoreEvent) {
        match event {
            CoreEvent::Text(text) => {
                self.content.push_str(text);
                self.last_was_tool = false;
            }
            CoreEvent::ToolExecRequested {
                tool_call_id,
                name,
                arguments,
            } => {
                self.tool_calls.push(ToolCall {
                    id: tool_call_id.clone(),
                    kind: "function",
                    function: DeltaFunctionCall {
                        name: name.clone(),
                        arguments: serde_json::to_string(arguments).unwrap_or_default(),
                    },
                });
                self.last_was_tool = true;
            }
            CoreEvent::TurnEnded
            | CoreEvent::ToolCallStarted { .. }
            | CoreEvent::ToolCallCompleted { .. }
            | CoreEvent::PartialToolCall { .. }
            | CoreEvent::Checkpoint(_)
            | CoreEvent::Aborted(_) => {}
        }
    }

    pub fn finish(self, id: impl Into<String>, model: impl Into<String>) -> ChatCompletionResponse {
        let finish_reason = if self.last_was_tool { "tool_calls" } else { "stop" }.to_string();
        let content = if self.content.is_empty() && !self.tool_calls.is_empty() {
            None
        } else {
            Some(self.content)
        };
        ChatCompletionResponse {
            id: id.into(),
            object: "chat.completion",
            model: model.into(),
            choices: vec![ResponseChoice {
                index: 0,
                message: ResponseMessage {
                    role: "assistant".to_string(),
                    content,
                    tool_calls: self.tool_calls,
                },
                finish_reason,
            }],
        }
    }
}
