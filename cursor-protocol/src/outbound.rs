//! Client → server message shapes (the `BidiAppend` side of the transport).

use cursor_wire::Value;
use cursor_wire::fields::{
    find, parse_fields, write_bool_field, write_bytes_field, write_message_field,
    write_string_field, write_varint_field,
};

use crate::error::Result;
use crate::error::SchemaError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BidiRequestId {
    pub request_id: String,
}

impl BidiRequestId {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        write_string_field(&mut buf, 1, &self.request_id);
        buf
    }
}

/// The body of every `BidiAppend` unary call. `data` carries the already
/// encoded `AgentClientMessage` bytes for this append; field 1 is lowercase
/// hex of those bytes, not the raw bytes themselves (observed on the wire as
/// `data_hex` — the name is literal, not a trace-tool label).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BidiAppendRequest {
    pub data: Vec<u8>,
    pub request_id: BidiRequestId,
    pub append_seqno: i64,
}

impl BidiAppendRequest {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        write_string_field(&mut buf, 1, &hex_encode(&self.data));
        write_message_field(&mut buf, 2, &self.request_id.encode());
        write_varint_field(&mut buf, 3, self.append_seqno as u64);
        buf
    }
}

fn hex_encode(data: &[u8]) -> String {
    let mut s = String::with_capacity(data.len() * 2);
    for b in data {
        s.push_str(&format!("{b:02x}"));
    }
    s
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentClientMessage {
    RunRequest(AgentRunRequest),
    ExecClientMessage(ExecClientMessage),
    KvClientMessage(KvClientMessage),
    ExecClientControlMessage(ExecClientControlMessage),
}

impl AgentClientMessage {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        match self {
            AgentClientMessage::RunRequest(m) => write_message_field(&mut buf, 1, &m.encode()),
            AgentClientMessage::ExecClientMessage(m) => write_message_field(&mut buf, 2, &m.encode()),
            AgentClientMessage::KvClientMessage(m) => write_message_field(&mut buf, 3, &m.encode()),
            AgentClientMessage::ExecClientControlMessage(m) => {
                write_message_field(&mut buf, 5, &m.encode())
            }
        }
        buf
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ExecClientResult {
    #[default]
    None,
    Shell(crate::exec_result::ShellResult),
    Ls(crate::exec_result::LsResult),
    Read(crate::exec_result::ReadResult),
    Grep(crate::exec_result::GrepResult),
    Write(crate::exec_result::WriteResult),
    Mcp(crate::exec_result::McpResult),
    RequestContext(crate::exec_result::RequestContextResult),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecClientMessage {
    pub id: u32,
    pub result: ExecClientResult,
    pub exec_id: String,
}

impl ExecClientMessage {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        write_varint_field(&mut buf, 1, self.id as u64);
        match &self.result {
            ExecClientResult::None => {}
            ExecClientResult::Shell(r) => write_message_field(&mut buf, 2, &r.encode()),
            ExecClientResult::Ls(r) => write_message_field(&mut buf, 4, &r.encode()),
            ExecClientResult::Read(r) => write_message_field(&mut buf, 6, &r.encode()),
            ExecClientResult::Grep(r) => write_message_field(&mut buf, 7, &r.encode()),
            ExecClientResult::Write(r) => write_message_field(&mut buf, 8, &r.encode()),
            ExecClientResult::Mcp(r) => write_message_field(&mut buf, 11, &r.encode()),
            ExecClientResult::RequestContext(r) => write_message_field(&mut buf, 12, &r.encode()),
        }
        write_string_field(&mut buf, 15, &self.exec_id);
        buf
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecClientControlMessage {
    pub stream_close_id: u32,
}

impl ExecClientControlMessage {
    pub fn encode(&self) -> Vec<u8> {
        let mut inner = Vec::new();
        write_varint_field(&mut inner, 1, self.stream_close_id as u64);
        let mut buf = Vec::new();
        write_message_field(&mut buf, 1, &inner);
        buf
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvClientResult {
    GetBlobResult { blob_data: Option<Vec<u8>> },
    SetBlobResult,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvClientMessage {
    pub id: u32,
    pub result: KvClientResult,
}

impl KvClientMessage {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        write_varint_field(&mut buf, 1, self.id as u64);
        match &self.result {
            KvClientResult::GetBlobResult { blob_data } => {
                let mut inner = Vec::new();
                if let Some(data) = blob_data {
                    write_bytes_field(&mut inner, 1, data);
                }
                write_message_field(&mut buf, 2, &inner);
            }
            KvClientResult::SetBlobResult => write_message_field(&mut buf, 3, &[]),
        }
        buf
    }
}

/// Selects which model Cursor should run the turn against. The wire traces
/// give no field beyond the model id itself; everything else (limits,
/// capabilities) lives client-side in [`crate::model_catalog`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDetails {
    pub model_id: String,
}

impl ModelDetails {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        write_string_field(&mut buf, 1, &self.model_id);
        buf
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct McpToolsWrapper {
    pub tools: Vec<McpToolDefinition>,
}

impl McpToolsWrapper {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        for tool in &self.tools {
            write_message_field(&mut buf, 1, &tool.encode());
        }
        buf
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentRunRequest {
    pub action: ConversationAction,
    pub model_details: Option<ModelDetails>,
    pub mcp_tools: Vec<McpToolDefinition>,
    pub conversation_id: String,
    pub mcp_file_system_options: Option<McpFileSystemOptions>,
}

impl AgentRunRequest {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        // field 1 (conversation_state) is always the empty message: Cursor's
        // server starts a new conversation on every run, never resuming
        // server-side state across requests (see the adapter's session-reuse
        // design choice).
        write_message_field(&mut buf, 1, &[]);
        write_message_field(&mut buf, 2, &self.action.encode());
        if let Some(model) = &self.model_details {
            write_message_field(&mut buf, 3, &model.encode());
        }
        if !self.mcp_tools.is_empty() {
            let wrapper = McpToolsWrapper {
                tools: self.mcp_tools.clone(),
            };
            write_message_field(&mut buf, 4, &wrapper.encode());
        }
        write_string_field(&mut buf, 5, &self.conversation_id);
        if let Some(opts) = &self.mcp_file_system_options {
            write_message_field(&mut buf, 6, &opts.encode());
        }
        buf
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationAction {
    UserMessageAction {
        user_message: UserMessage,
        request_context: RequestContext,
    },
}

impl ConversationAction {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        match self {
            ConversationAction::UserMessageAction {
                user_message,
                request_context,
            } => {
                write_message_field(&mut buf, 1, &user_message.encode());
                write_message_field(&mut buf, 2, &request_context.encode());
            }
        }
        buf
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationMode {
    Ask = 1,
    Agent = 2,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserMessage {
    pub text: String,
    pub message_id: String,
    pub mode: ConversationMode,
}

impl UserMessage {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        write_string_field(&mut buf, 1, &self.text);
        write_string_field(&mut buf, 2, &self.message_id);
        write_varint_field(&mut buf, 4, self.mode as u64);
        buf
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Env {
    pub os: String,
    pub workspace_path: String,
    pub shell: String,
    pub timezone: String,
}

impl Env {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        write_string_field(&mut buf, 1, &self.os);
        write_string_field(&mut buf, 2, &self.workspace_path);
        write_string_field(&mut buf, 3, &self.shell);
        write_string_field(&mut buf, 10, &self.timezone);
        // field 11 repeats the workspace path per the wire table; kept
        // identical to field 2 rather than modeled as a second concept.
        write_string_field(&mut buf, 11, &self.workspace_path);
        buf
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub env: Env,
    pub mcp_tool: Vec<McpToolDefinition>,
    pub mcp_instructions: String,
}

impl RequestContext {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        write_message_field(&mut buf, 4, &self.env.encode());
        for tool in &self.mcp_tool {
            write_message_field(&mut buf, 7, &tool.encode());
        }
        write_string_field(&mut buf, 14, &self.mcp_instructions);
        buf
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct McpToolDefinition {
    pub name: String,
    pub description: String,
    pub json_schema: Value,
}

impl McpToolDefinition {
    pub fn qualified_name(&self) -> String {
        format!("cursor-tools-{}", self.name)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        write_string_field(&mut buf, 1, &self.qualified_name());
        write_string_field(&mut buf, 2, &self.description);
        write_message_field(&mut buf, 3, &self.json_schema.encode());
        write_string_field(&mut buf, 4, "cursor-tools");
        write_string_field(&mut buf, 5, &self.name);
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let fields = parse_fields(bytes)?;
        let description = find(&fields, 2).and_then(|f| f.as_str()).unwrap_or("").to_string();
        let json_schema = find(&fields, 3)
            .and_then(|f| f.as_bytes())
            .map(Value::decode)
            .transpose()?
            .unwrap_or(Value::Null);
        let name = find(&fields, 5)
            .and_then(|f| f.as_str())
            .ok_or(SchemaError::MissingField {
                message: "McpToolDefinition",
                field: "name",
            })?
            .to_string();
        Ok(McpToolDefinition {
            name,
            description,
            json_schema,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct McpFileSystemOptions {
    pub enabled: bool,
    pub workspace_project_dir: String,
    pub mcp_descriptor: Vec<String>,
}

impl McpFileSystemOptions {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        write_bool_field(&mut buf, 1, self.enabled);
        write_string_field(&mut buf, 2, &self.workspace_project_dir);
        for d in &self.mcp_descriptor {
            write_string_field(&mut buf, 3, d);
        }
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec_result::ShellResult;
    use pretty_assertions::assert_eq;

    #[test]
    fn s2_stream_close_matches_the_wire_vectors() {
        let msg = ExecClientControlMessage { stream_close_id: 1 };
        assert_eq!(msg.encode(), vec![0x0a, 0x02, 0x08, 0x01]);

        let msg = ExecClientControlMessage { stream_close_id: 0 };
        assert_eq!(msg.encode(), vec![0x0a, 0x00]);
    }

    #[test]
    fn s4_shell_result_envelope_round_trips() {
        let msg = ExecClientMessage {
            id: 0,
            result: ExecClientResult::Shell(ShellResult {
                command: "echo".into(),
                cwd: "/".into(),
                exit_code: 0,
                stdout: "ok\n".into(),
                stderr: String::new(),
                truncated: false,
                exec_time_ms: 100,
            }),
            exec_id: "ex".into(),
        };
        let encoded = msg.encode();
        // field 1 (id=0) must be entirely absent.
        let fields = parse_fields(&encoded).unwrap();
        assert!(find(&fields, 1).is_none());
        assert_eq!(find(&fields, 15).unwrap().as_str(), Some("ex"));
        let shell_bytes = find(&fields, 2).unwrap().as_bytes().unwrap();
        let inner = parse_fields(shell_bytes).unwrap();
        let populated: Vec<u32> = inner.iter().map(|f| f.field_number).collect();
        assert_eq!(populated, vec![1, 2, 5, 7]);
    }

    #[test]
    fn mcp_tool_definition_round_trips() {
        let tool = McpToolDefinition {
            name: "bash".into(),
            description: "run a shell command".into(),
            json_schema: Value::object([("type", Value::String("object".into()))]),
        };
        let decoded = McpToolDefinition::decode(&tool.encode()).unwrap();
        assert_eq!(decoded.name, tool.name);
        assert_eq!(decoded.description, tool.description);
        assert_eq!(decoded.json_schema, tool.json_schema);
    }
}
