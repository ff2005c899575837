//! Translates Cursor's server-initiated exec requests into OpenAI
//! `tool_calls` and routes OpenAI tool results back into the matching
//! Cursor reply encoding. Grounded on `core/src/mcp_tool_call.rs`'s
//! begin/end event shape, generalized from "one kind of MCP call" to
//! Cursor's seven exec variants.

use cursor_protocol::ExecClientResult;
use cursor_protocol::ExecServerArgs;
use cursor_protocol::GrepResult;
use cursor_protocol::LsResult;
use cursor_protocol::McpResult;
use cursor_protocol::ReadResult;
use cursor_protocol::RequestContextResult;
use cursor_protocol::ShellResult;
use cursor_protocol::WriteResult;
use rand::Rng;
use serde_json::Value as JsonValue;
use serde_json::json;

/// One exec request registered while awaiting its OpenAI tool result.
#[derive(Debug, Clone)]
pub struct PendingExec {
    pub id: u32,
    pub exec_id: String,
    pub args: ExecServerArgs,
}

/// Builds the synthetic OpenAI tool-call id `sess_<sid>__call_<base>`. `base`
/// is sanitized to `[A-Za-z0-9]`, truncated to 32 characters; an empty
/// sanitized base falls back to a random hex string so two different exec
/// requests with no usable identifier still get distinct ids.
pub fn make_tool_call_id(session_id: &str, base: &str) -> String {
    let sanitized: String = base
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(32)
        .collect();
    let base = if sanitized.is_empty() {
        random_base()
    } else {
        sanitized
    };
    format!("sess_{session_id}__call_{base}")
}

fn random_base() -> String {
    let mut rng = rand::rng();
    (0..16)
        .map(|_| {
            let n: u8 = rng.random_range(0..16);
            std::char::from_digit(n as u32, 16).unwrap_or('0')
        })
        .collect()
}

/// Recovers the session id a synthetic tool-call id was minted under.
pub fn parse_session_id(tool_call_id: &str) -> Option<&str> {
    let rest = tool_call_id.strip_prefix("sess_")?;
    let (session_id, _) = rest.split_once("__call_")?;
    Some(session_id)
}

/// The OpenAI-facing tool name for a given exec request.
pub fn openai_tool_name(args: &ExecServerArgs) -> String {
    match args {
        ExecServerArgs::Shell { .. } => "bash".to_string(),
        ExecServerArgs::Read { .. } => "read".to_string(),
        ExecServerArgs::Ls { .. } => "list".to_string(),
        ExecServerArgs::Grep { is_glob, .. } => {
            if *is_glob { "glob" } else { "grep" }.to_string()
        }
        ExecServerArgs::Write { .. } => "write".to_string(),
        ExecServerArgs::Mcp { tool_name, .. } => tool_name.clone(),
        ExecServerArgs::RequestContext => "request_context".to_string(),
    }
}

/// The OpenAI tool-call `arguments` JSON for a given exec request.
pub fn openai_tool_arguments(args: &ExecServerArgs) -> JsonValue {
    match args {
        ExecServerArgs::Shell {
            command,
            description,
            workdir,
        } => {
            let mut obj = json!({ "command": command });
            if let Some(d) = description {
                obj["description"] = json!(d);
            }
            if let Some(w) = workdir {
                obj["workdir"] = json!(w);
            }
            obj
        }
        ExecServerArgs::Read { file_path } => json!({ "filePath": file_path }),
        ExecServerArgs::Ls { path } => json!({ "path": path }),
        ExecServerArgs::Grep { pattern, path, .. } => json!({ "pattern": pattern, "path": path }),
        ExecServerArgs::Write { file_path, content } => {
            json!({ "filePath": file_path, "content": content })
        }
        ExecServerArgs::Mcp { arguments, .. } => cursor_protocol::wire_to_json(arguments),
        ExecServerArgs::RequestContext => json!({}),
    }
}

/// Reconstructs the Cursor reply for a given exec type from the raw OpenAI
/// tool-result `content` string, per the per-type rules in §4.4.
pub fn result_from_tool_content(args: &ExecServerArgs, content: &str) -> ExecClientResult {
    match args {
        ExecServerArgs::Shell { .. } => ExecClientResult::Shell(shell_result_from_content(content)),
        ExecServerArgs::Read { .. } => ExecClientResult::Read(ReadResult {
            total_lines: content.split('\n').count() as u64,
            file_size: content.len() as u64,
            truncated: false,
            content: content.to_string(),
        }),
        ExecServerArgs::Ls { .. } => ExecClientResult::Ls(LsResult {
            files: content.to_string(),
        }),
        ExecServerArgs::Grep { .. } => ExecClientResult::Grep(GrepResult {
            matches: content.lines().filter(|l| !l.is_empty()).map(str::to_string).collect(),
        }),
        ExecServerArgs::Write { .. } => ExecClientResult::Write(write_result_from_content(content)),
        ExecServerArgs::Mcp { .. } => ExecClientResult::Mcp(mcp_result_from_content(content)),
        ExecServerArgs::RequestContext => ExecClientResult::RequestContext(RequestContextResult),
    }
}

fn shell_result_from_content(content: &str) -> ShellResult {
    if let Ok(parsed) = serde_json::from_str::<JsonValue>(content) {
        if parsed.is_object() {
            return ShellResult {
                command: String::new(),
                cwd: String::new(),
                stdout: parsed.get("stdout").and_then(|v| v.as_str()).unwrap_or("").to_string(),
                stderr: parsed.get("stderr").and_then(|v| v.as_str()).unwrap_or("").to_string(),
                exit_code: parsed.get("exitCode").and_then(|v| v.as_i64()).unwrap_or(0) as i32,
                truncated: parsed.get("truncated").and_then(|v| v.as_bool()).unwrap_or(false),
                exec_time_ms: parsed.get("executionTimeMs").and_then(|v| v.as_u64()).unwrap_or(0),
            };
        }
    }
    ShellResult {
        command: String::new(),
        cwd: String::new(),
        stdout: content.to_string(),
        stderr: String::new(),
        exit_code: 0,
        truncated: false,
        exec_time_ms: 0,
    }
}

fn write_result_from_content(content: &str) -> WriteResult {
    if let Ok(parsed) = serde_json::from_str::<JsonValue>(content) {
        if let Some(error) = parsed.get("error").and_then(|v| v.as_str()) {
            return WriteResult::Failure { error: error.to_string() };
        }
        if parsed.get("linesCreated").is_some() || parsed.get("fileSize").is_some() {
            return WriteResult::Success {
                lines_created: parsed.get("linesCreated").and_then(|v| v.as_u64()).unwrap_or(0),
                file_size: parsed.get("fileSize").and_then(|v| v.as_u64()).unwrap_or(0),
                file_content_after_write: parsed
                    .get("fileContentAfterWrite")
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string(),
            };
        }
    }
    WriteResult::Success {
        lines_created: content.split('\n').count() as u64,
        file_size: content.len() as u64,
        file_content_after_write: content.to_string(),
    }
}

fn mcp_result_from_content(content: &str) -> McpResult {
    if let Ok(parsed) = serde_json::from_str::<JsonValue>(content) {
        if let Some(error) = parsed.get("error").and_then(|v| v.as_str()) {
            return McpResult::Failure { error: error.to_string() };
        }
    }
    McpResult::text(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn tool_call_id_round_trips_the_session_id() {
        let id = make_tool_call_id("abc123", "exec-7");
        assert_eq!(parse_session_id(&id), Some("abc123"));
        assert!(id.ends_with("__call_exec7"));
    }

    #[test]
    fn empty_base_falls_back_to_a_random_id() {
        let a = make_tool_call_id("sid", "!!!");
        let b = make_tool_call_id("sid", "!!!");
        assert_eq!(parse_session_id(&a), Some("sid"));
        assert_ne!(a, b, "two empty bases should not collide");
    }

    #[test]
    fn base_is_truncated_to_32_chars() {
        let long = "a".repeat(64);
        let id = make_tool_call_id("sid", &long);
        let base = id.strip_prefix("sess_sid__call_").unwrap();
        assert_eq!(base.len(), 32);
    }

    #[test]
    fn grep_becomes_glob_when_is_glob_is_set() {
        let args = ExecServerArgs::Grep {
            pattern: "*.rs".into(),
            path: ".".into(),
            is_glob: true,
        };
        assert_eq!(openai_tool_name(&args), "glob");
    }

    #[test]
    fn shell_result_falls_back_to_raw_stdout_on_non_json_content() {
        let args = ExecServerArgs::Shell {
            command: "echo hi".into(),
            description: None,
            workdir: None,
        };
        let ExecClientResult::Shell(r) = result_from_tool_content(&args, "hi\n") else {
            panic!("expected shell result");
        };
        assert_eq!(r.stdout, "hi\n");
        assert_eq!(r.exit_code, 0);
    }

    #[test]
    fn write_result_parses_error_as_failure() {
        let args = ExecServerArgs::Write {
            file_path: "/tmp/x".into(),
            content: "hi".into(),
        };
        let result = result_from_tool_content(&args, r#"{"error":"permission denied"}"#);
        assert_eq!(
            result,
            ExecClientResult::Write(WriteResult::Failure {
                error: "permission denied".into()
            })
        );
    }

    #[test]
    fn mcp_result_wraps_plain_text() {
        let args = ExecServerArgs::Mcp {
            tool_name: "search".into(),
            arguments: cursor_wire::Value::Null,
        };
        let result = result_from_tool_content(&args, "found 3 matches");
        assert_eq!(
            result,
            ExecClientResult::Mcp(McpResult::text("found 3 matches"))
        );
    }
}
