//! Server → client message shapes received off the `RunSSE` stream.

use cursor_wire::fields::{find, parse_fields};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq)]
pub enum InteractionUpdate {
    TextDelta(String),
    ToolCallStarted { raw: Vec<u8> },
    ToolCallCompleted { raw: Vec<u8> },
    PartialToolCall { call_id: String, args_text_delta: String },
    TokenDelta(String),
    Heartbeat,
    TurnEnded,
}

impl InteractionUpdate {
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let fields = parse_fields(bytes)?;
        if let Some(f) = find(&fields, 1) {
            let inner = parse_fields(f.as_bytes().unwrap_or(&[]))?;
            let text = find(&inner, 1).and_then(|f| f.as_str()).unwrap_or("").to_string();
            return Ok(InteractionUpdate::TextDelta(text));
        }
        if let Some(f) = find(&fields, 2) {
            return Ok(InteractionUpdate::ToolCallStarted {
                raw: f.as_bytes().unwrap_or(&[]).to_vec(),
            });
        }
        if let Some(f) = find(&fields, 3) {
            return Ok(InteractionUpdate::ToolCallCompleted {
                raw: f.as_bytes().unwrap_or(&[]).to_vec(),
            });
        }
        if let Some(f) = find(&fields, 7) {
            let inner = parse_fields(f.as_bytes().unwrap_or(&[]))?;
            return Ok(InteractionUpdate::PartialToolCall {
                call_id: find(&inner, 1).and_then(|f| f.as_str()).unwrap_or("").to_string(),
                args_text_delta: find(&inner, 2).and_then(|f| f.as_str()).unwrap_or("").to_string(),
            });
        }
        if let Some(f) = find(&fields, 8) {
            let inner = parse_fields(f.as_bytes().unwrap_or(&[]))?;
            let text = find(&inner, 1).and_then(|f| f.as_str()).unwrap_or("").to_string();
            return Ok(InteractionUpdate::TokenDelta(text));
        }
        if find(&fields, 13).is_some() {
            return Ok(InteractionUpdate::Heartbeat);
        }
        if find(&fields, 14).is_some() {
            return Ok(InteractionUpdate::TurnEnded);
        }
        Err(crate::error::SchemaError::UnknownVariant {
            message: "InteractionUpdate",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetBlobArgs {
    pub blob_id: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetBlobArgs {
    pub blob_id: Vec<u8>,
    pub blob_data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvServerOp {
    GetBlobArgs(GetBlobArgs),
    SetBlobArgs(SetBlobArgs),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvServerMessage {
    pub id: u32,
    pub op: KvServerOp,
}

impl KvServerMessage {
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let fields = parse_fields(bytes)?;
        let id = find(&fields, 1).and_then(|f| f.as_u64()).unwrap_or(0) as u32;
        if let Some(f) = find(&fields, 2) {
            let inner = parse_fields(f.as_bytes().unwrap_or(&[]))?;
            let blob_id = find(&inner, 1).and_then(|f| f.as_bytes()).unwrap_or(&[]).to_vec();
            return Ok(KvServerMessage {
                id,
                op: KvServerOp::GetBlobArgs(GetBlobArgs { blob_id }),
            });
        }
        if let Some(f) = find(&fields, 3) {
            let inner = parse_fields(f.as_bytes().unwrap_or(&[]))?;
            let blob_id = find(&inner, 1).and_then(|f| f.as_bytes()).unwrap_or(&[]).to_vec();
            let blob_data = find(&inner, 2).and_then(|f| f.as_bytes()).unwrap_or(&[]).to_vec();
            return Ok(KvServerMessage {
                id,
                op: KvServerOp::SetBlobArgs(SetBlobArgs { blob_id, blob_data }),
            });
        }
        Err(crate::error::SchemaError::UnknownVariant {
            message: "KvServerMessage",
        })
    }
}

/// The request-context-refresh variant carries no payload this bridge needs
/// to act on; it's acknowledged like any other exec, with an empty result.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecServerArgs {
    Shell { command: String, description: Option<String>, workdir: Option<String> },
    Read { file_path: String },
    Ls { path: String },
    Grep { pattern: String, path: String, is_glob: bool },
    Write { file_path: String, content: String },
    Mcp { tool_name: String, arguments: cursor_wire::Value },
    RequestContext,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecServerMessage {
    pub id: u32,
    pub exec_id: String,
    pub args: ExecServerArgs,
}

/// Mirrors `ExecClientMessage`'s field numbering: the server's "args" for a
/// given exec type occupies the same field slot this client later replies on
/// with the corresponding "result" (see DESIGN.md).
impl ExecServerMessage {
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let fields = parse_fields(bytes)?;
        let id = find(&fields, 1).and_then(|f| f.as_u64()).unwrap_or(0) as u32;
        let exec_id = find(&fields, 15).and_then(|f| f.as_str()).unwrap_or("").to_string();

        if let Some(f) = find(&fields, 2) {
            let inner = parse_fields(f.as_bytes().unwrap_or(&[]))?;
            return Ok(ExecServerMessage {
                id,
                exec_id,
                args: ExecServerArgs::Shell {
                    command: find(&inner, 1).and_then(|f| f.as_str()).unwrap_or("").to_string(),
                    description: find(&inner, 2).and_then(|f| f.as_str()).map(|s| s.to_string()),
                    workdir: find(&inner, 3).and_then(|f| f.as_str()).map(|s| s.to_string()),
                },
            });
        }
        if let Some(f) = find(&fields, 4) {
            let inner = parse_fields(f.as_bytes().unwrap_or(&[]))?;
            return Ok(ExecServerMessage {
                id,
                exec_id,
                args: ExecServerArgs::Ls {
                    path: find(&inner, 1).and_then(|f| f.as_str()).unwrap_or("").to_string(),
                },
            });
        }
        if let Some(f) = find(&fields, 6) {
            let inner = parse_fields(f.as_bytes().unwrap_or(&[]))?;
            return Ok(ExecServerMessage {
                id,
                exec_id,
                args: ExecServerArgs::Read {
                    file_path: find(&inner, 1).and_then(|f| f.as_str()).unwrap_or("").to_string(),
                },
            });
        }
        if let Some(f) = find(&fields, 7) {
            let inner = parse_fields(f.as_bytes().unwrap_or(&[]))?;
            return Ok(ExecServerMessage {
                id,
                exec_id,
                args: ExecServerArgs::Grep {
                    pattern: find(&inner, 1).and_then(|f| f.as_str()).unwrap_or("").to_string(),
                    path: find(&inner, 2).and_then(|f| f.as_str()).unwrap_or("").to_string(),
                    is_glob: find(&inner, 3).map(|f| f.as_bool()).unwrap_or(false),
                },
            });
        }
        if let Some(f) = find(&fields, 8) {
            let inner = parse_fields(f.as_bytes().unwrap_or(&[]))?;
            return Ok(ExecServerMessage {
                id,
                exec_id,
                args: ExecServerArgs::Write {
                    file_path: find(&inner, 1).and_then(|f| f.as_str()).unwrap_or("").to_string(),
                    content: find(&inner, 2).and_then(|f| f.as_str()).unwrap_or("").to_string(),
                },
            });
        }
        if let Some(f) = find(&fields, 11) {
            let inner = parse_fields(f.as_bytes().unwrap_or(&[]))?;
            let arguments = find(&inner, 2)
                .and_then(|f| f.as_bytes())
                .map(cursor_wire::Value::decode)
                .transpose()?
                .unwrap_or(cursor_wire::Value::Null);
            return Ok(ExecServerMessage {
                id,
                exec_id,
                args: ExecServerArgs::Mcp {
                    tool_name: find(&inner, 1).and_then(|f| f.as_str()).unwrap_or("").to_string(),
                    arguments,
                },
            });
        }
        if find(&fields, 12).is_some() {
            return Ok(ExecServerMessage {
                id,
                exec_id,
                args: ExecServerArgs::RequestContext,
            });
        }
        Err(crate::error::SchemaError::UnknownVariant {
            message: "ExecServerMessage",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AgentServerMessage {
    InteractionUpdate(InteractionUpdate),
    ExecServerMessage(ExecServerMessage),
    ConversationCheckpointUpdate(Vec<u8>),
    KvServerMessage(KvServerMessage),
    ExecServerControlMessage(Vec<u8>),
    InteractionQuery(Vec<u8>),
}

impl AgentServerMessage {
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let fields = parse_fields(bytes)?;
        if let Some(f) = find(&fields, 1) {
            return Ok(AgentServerMessage::InteractionUpdate(InteractionUpdate::decode(
                f.as_bytes().unwrap_or(&[]),
            )?));
        }
        if let Some(f) = find(&fields, 2) {
            return Ok(AgentServerMessage::ExecServerMessage(ExecServerMessage::decode(
                f.as_bytes().unwrap_or(&[]),
            )?));
        }
        if let Some(f) = find(&fields, 3) {
            return Ok(AgentServerMessage::ConversationCheckpointUpdate(
                f.as_bytes().unwrap_or(&[]).to_vec(),
            ));
        }
        if let Some(f) = find(&fields, 4) {
            return Ok(AgentServerMessage::KvServerMessage(KvServerMessage::decode(
                f.as_bytes().unwrap_or(&[]),
            )?));
        }
        if let Some(f) = find(&fields, 5) {
            return Ok(AgentServerMessage::ExecServerControlMessage(
                f.as_bytes().unwrap_or(&[]).to_vec(),
            ));
        }
        if let Some(f) = find(&fields, 7) {
            return Ok(AgentServerMessage::InteractionQuery(
                f.as_bytes().unwrap_or(&[]).to_vec(),
            ));
        }
        Err(crate::error::SchemaError::UnknownVariant {
            message: "AgentServerMessage",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cursor_wire::fields::{write_message_field, write_string_field, write_varint_field};
    use pretty_assertions::assert_eq;

    #[test]
    fn text_delta_and_presence_only_turn_ended_decode() {
        // AgentServerMessage{interaction_update:{text_delta:{text:""}}}
        let mut text_delta = Vec::new();
        write_string_field(&mut text_delta, 1, "");
        let mut update = Vec::new();
        write_message_field(&mut update, 1, &text_delta);
        let mut msg = Vec::new();
        write_message_field(&mut msg, 1, &update);
        let decoded = AgentServerMessage::decode(&msg).unwrap();
        assert_eq!(
            decoded,
            AgentServerMessage::InteractionUpdate(InteractionUpdate::TextDelta(String::new()))
        );

        // turn_ended is presence-only: an empty nested message still counts.
        let mut update = Vec::new();
        write_message_field(&mut update, 14, &[]);
        let mut msg = Vec::new();
        write_message_field(&mut msg, 1, &update);
        let decoded = AgentServerMessage::decode(&msg).unwrap();
        assert_eq!(
            decoded,
            AgentServerMessage::InteractionUpdate(InteractionUpdate::TurnEnded)
        );
    }

    #[test]
    fn exec_server_message_shell_args_round_trip() {
        let mut shell = Vec::new();
        write_string_field(&mut shell, 1, "echo hi");
        let mut msg = Vec::new();
        write_varint_field(&mut msg, 1, 7);
        write_message_field(&mut msg, 2, &shell);
        write_string_field(&mut msg, 15, "exec-7");
        let decoded = ExecServerMessage::decode(&msg).unwrap();
        assert_eq!(decoded.id, 7);
        assert_eq!(decoded.exec_id, "exec-7");
        assert_eq!(
            decoded.args,
            ExecServerArgs::Shell {
                command: "echo hi".into(),
                description: None,
                workdir: None,
            }
        );
    }
}
