//! Field-number tables for the message kinds Cursor's bidi agent service
//! exchanges, built on top of `cursor_wire`'s codec primitives.

pub mod error;
pub mod exec_result;
pub mod inbound;
pub mod json;
pub mod model_catalog;
pub mod outbound;

pub use error::Result;
pub use error::SchemaError;

pub use model_catalog::Catalog;
pub use model_catalog::ModelLimits;
pub use model_catalog::UsableModel;

pub use inbound::AgentServerMessage;
pub use inbound::ExecServerArgs;
pub use inbound::ExecServerMessage;
pub use inbound::GetBlobArgs;
pub use inbound::InteractionUpdate;
pub use inbound::KvServerMessage;
pub use inbound::KvServerOp;
pub use inbound::SetBlobArgs;

pub use outbound::AgentClientMessage;
pub use outbound::AgentRunRequest;
pub use outbound::BidiAppendRequest;
pub use outbound::BidiRequestId;
pub use outbound::ConversationAction;
pub use outbound::ConversationMode;
pub use outbound::Env;
pub use outbound::ExecClientControlMessage;
pub use outbound::ExecClientMessage;
pub use outbound::ExecClientResult;
pub use outbound::KvClientMessage;
pub use outbound::KvClientResult;
pub use outbound::McpFileSystemOptions;
pub use outbound::McpToolDefinition;
pub use outbound::McpToolsWrapper;
pub use outbound::ModelDetails;
pub use outbound::RequestContext;
pub use outbound::UserMessage;

pub use exec_result::GrepResult;
pub use exec_result::LsResult;
pub use exec_result::McpCallResult;
pub use exec_result::McpResult;
pub use exec_result::ReadResult;
pub use exec_result::RequestContextResult;
pub use exec_result::ShellResult;
pub use exec_result::TextContentBlock;
pub use exec_result::WriteResult;

pub use json::json_to_wire;
pub use json::wire_to_json;
