//! Per-exec-type result payloads nested inside `ExecClientMessage`. Field
//! orderings here are chosen to match the wire traces exactly (see the
//! `s4_shell_result_envelope_round_trips` test in `outbound.rs`); where a
//! trace doesn't pin down a field we don't otherwise need, we still reserve
//! its slot rather than renumber around it.

use cursor_wire::encode_signed32_as_varint;
use cursor_wire::fields::{
    find, parse_fields, write_bool_field, write_message_field, write_string_field,
    write_varint_field,
};

use crate::error::Result;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellResult {
    pub command: String,
    pub cwd: String,
    pub exit_code: i32,
    pub stderr: String,
    pub stdout: String,
    pub truncated: bool,
    pub exec_time_ms: u64,
}

impl ShellResult {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        write_string_field(&mut buf, 1, &self.command);
        write_string_field(&mut buf, 2, &self.cwd);
        write_varint_field(&mut buf, 3, encode_signed32_as_varint(self.exit_code));
        write_string_field(&mut buf, 4, &self.stderr);
        write_string_field(&mut buf, 5, &self.stdout);
        write_bool_field(&mut buf, 6, self.truncated);
        write_varint_field(&mut buf, 7, self.exec_time_ms);
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let fields = parse_fields(bytes)?;
        Ok(ShellResult {
            command: find(&fields, 1).and_then(|f| f.as_str()).unwrap_or("").to_string(),
            cwd: find(&fields, 2).and_then(|f| f.as_str()).unwrap_or("").to_string(),
            exit_code: find(&fields, 3).and_then(|f| f.as_u64()).unwrap_or(0) as i32,
            stderr: find(&fields, 4).and_then(|f| f.as_str()).unwrap_or("").to_string(),
            stdout: find(&fields, 5).and_then(|f| f.as_str()).unwrap_or("").to_string(),
            truncated: find(&fields, 6).map(|f| f.as_bool()).unwrap_or(false),
            exec_time_ms: find(&fields, 7).and_then(|f| f.as_u64()).unwrap_or(0),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadResult {
    pub content: String,
    pub total_lines: u64,
    pub file_size: u64,
    pub truncated: bool,
}

impl ReadResult {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        write_string_field(&mut buf, 1, &self.content);
        write_varint_field(&mut buf, 2, self.total_lines);
        write_varint_field(&mut buf, 3, self.file_size);
        write_bool_field(&mut buf, 4, self.truncated);
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let fields = parse_fields(bytes)?;
        Ok(ReadResult {
            content: find(&fields, 1).and_then(|f| f.as_str()).unwrap_or("").to_string(),
            total_lines: find(&fields, 2).and_then(|f| f.as_u64()).unwrap_or(0),
            file_size: find(&fields, 3).and_then(|f| f.as_u64()).unwrap_or(0),
            truncated: find(&fields, 4).map(|f| f.as_bool()).unwrap_or(false),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LsResult {
    pub files: String,
}

impl LsResult {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        write_string_field(&mut buf, 1, &self.files);
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let fields = parse_fields(bytes)?;
        Ok(LsResult {
            files: find(&fields, 1).and_then(|f| f.as_str()).unwrap_or("").to_string(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrepResult {
    pub matches: Vec<String>,
}

impl GrepResult {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        for m in &self.matches {
            write_string_field(&mut buf, 1, m);
        }
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let fields = parse_fields(bytes)?;
        let matches = fields
            .iter()
            .filter(|f| f.field_number == 1)
            .filter_map(|f| f.as_str())
            .map(|s| s.to_string())
            .collect();
        Ok(GrepResult { matches })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteResult {
    Success {
        lines_created: u64,
        file_size: u64,
        file_content_after_write: String,
    },
    Failure {
        error: String,
    },
}

impl Default for WriteResult {
    fn default() -> Self {
        WriteResult::Success {
            lines_created: 0,
            file_size: 0,
            file_content_after_write: String::new(),
        }
    }
}

impl WriteResult {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        match self {
            WriteResult::Success {
                lines_created,
                file_size,
                file_content_after_write,
            } => {
                let mut inner = Vec::new();
                write_varint_field(&mut inner, 1, *lines_created);
                write_varint_field(&mut inner, 2, *file_size);
                write_string_field(&mut inner, 3, file_content_after_write);
                write_message_field(&mut buf, 1, &inner);
            }
            WriteResult::Failure { error } => {
                let mut inner = Vec::new();
                write_string_field(&mut inner, 1, error);
                write_message_field(&mut buf, 2, &inner);
            }
        }
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let fields = parse_fields(bytes)?;
        if let Some(f) = find(&fields, 2) {
            let inner = parse_fields(f.as_bytes().unwrap_or(&[]))?;
            return Ok(WriteResult::Failure {
                error: find(&inner, 1).and_then(|f| f.as_str()).unwrap_or("").to_string(),
            });
        }
        let inner = find(&fields, 1)
            .and_then(|f| f.as_bytes())
            .map(parse_fields)
            .transpose()?
            .unwrap_or_default();
        Ok(WriteResult::Success {
            lines_created: find(&inner, 1).and_then(|f| f.as_u64()).unwrap_or(0),
            file_size: find(&inner, 2).and_then(|f| f.as_u64()).unwrap_or(0),
            file_content_after_write: find(&inner, 3).and_then(|f| f.as_str()).unwrap_or("").to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextContentBlock {
    Text(String),
}

impl TextContentBlock {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        match self {
            TextContentBlock::Text(text) => write_string_field(&mut buf, 1, text),
        }
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let fields = parse_fields(bytes)?;
        Ok(TextContentBlock::Text(
            find(&fields, 1).and_then(|f| f.as_str()).unwrap_or("").to_string(),
        ))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct McpCallResult {
    pub content: Vec<TextContentBlock>,
}

impl McpCallResult {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        for block in &self.content {
            write_message_field(&mut buf, 1, &block.encode());
        }
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let fields = parse_fields(bytes)?;
        let mut content = Vec::new();
        for f in fields.iter().filter(|f| f.field_number == 1) {
            if let Some(b) = f.as_bytes() {
                content.push(TextContentBlock::decode(b)?);
            }
        }
        Ok(McpCallResult { content })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum McpResult {
    Success(McpCallResult),
    Failure { error: String },
}

impl Default for McpResult {
    fn default() -> Self {
        McpResult::Success(McpCallResult::default())
    }
}

impl McpResult {
    pub fn text(text: impl Into<String>) -> McpResult {
        McpResult::Success(McpCallResult {
            content: vec![TextContentBlock::Text(text.into())],
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        match self {
            McpResult::Success(result) => {
                let mut success = Vec::new();
                write_message_field(&mut success, 1, &result.encode());
                write_message_field(&mut buf, 1, &success);
            }
            McpResult::Failure { error } => {
                let mut inner = Vec::new();
                write_string_field(&mut inner, 1, error);
                write_message_field(&mut buf, 2, &inner);
            }
        }
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let fields = parse_fields(bytes)?;
        if let Some(f) = find(&fields, 2) {
            let inner = parse_fields(f.as_bytes().unwrap_or(&[]))?;
            return Ok(McpResult::Failure {
                error: find(&inner, 1).and_then(|f| f.as_str()).unwrap_or("").to_string(),
            });
        }
        let success_bytes = find(&fields, 1).and_then(|f| f.as_bytes()).unwrap_or(&[]);
        let success_fields = parse_fields(success_bytes)?;
        let result_bytes = find(&success_fields, 1).and_then(|f| f.as_bytes()).unwrap_or(&[]);
        Ok(McpResult::Success(McpCallResult::decode(result_bytes)?))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContextResult;

impl RequestContextResult {
    pub fn encode(&self) -> Vec<u8> {
        Vec::new()
    }

    pub fn decode(_bytes: &[u8]) -> Result<Self> {
        Ok(RequestContextResult)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn s3_mcp_result_wrap_matches_the_wire_vector() {
        let result = McpResult::text("test result");
        let encoded = result.encode();
        let expected = [
            0x0a, 0x11, 0x0a, 0x0f, 0x0a, 0x0d, 0x0a, 0x0b, 0x74, 0x65, 0x73, 0x74, 0x20, 0x72,
            0x65, 0x73, 0x75, 0x6c, 0x74,
        ];
        assert_eq!(encoded, expected);
        assert_eq!(McpResult::decode(&encoded).unwrap(), result);
    }

    #[test]
    fn shell_result_round_trips() {
        let r = ShellResult {
            command: "ls -la".into(),
            cwd: "/tmp".into(),
            exit_code: -1,
            stderr: "oops".into(),
            stdout: "".into(),
            truncated: true,
            exec_time_ms: 42,
        };
        assert_eq!(ShellResult::decode(&r.encode()).unwrap(), r);
    }

    #[test]
    fn write_result_failure_round_trips() {
        let r = WriteResult::Failure {
            error: "permission denied".into(),
        };
        assert_eq!(WriteResult::decode(&r.encode()).unwrap(), r);
    }
}
