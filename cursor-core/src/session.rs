//! Drives one bidirectional Cursor session: demultiplexes inbound
//! `AgentServerMessage`s into [`CoreEvent`]s, tracks `append_seqno`, the
//! blob store, pending tool execs and the heartbeat/idle policy. Modeled on
//! `codex-core::Session`'s `Mutex`-guarded `State` (never held across an
//! `.await`) rather than an actor with its own task, since the actual
//! transport loop lives in `crate::transport` and drives this struct from
//! the outside.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

use cursor_protocol::AgentClientMessage;
use cursor_protocol::AgentServerMessage;
use cursor_protocol::ExecClientControlMessage;
use cursor_protocol::ExecClientMessage;
use cursor_protocol::ExecServerMessage;
use cursor_protocol::InteractionUpdate;
use cursor_protocol::KvClientMessage;
use cursor_protocol::KvClientResult;
use cursor_protocol::KvServerOp;
use cursor_wire::parse_fields;
use serde_json::Value as JsonValue;

use crate::blob_store::BlobStore;
use crate::config::Config;
use crate::error::CoreError;
use crate::error::Result;
use crate::tool_bridge;
use crate::tool_bridge::PendingExec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Opening,
    Streaming,
    AwaitingTool,
    Closing,
    Closed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CoreEvent {
    Text(String),
    ToolExecRequested {
        tool_call_id: String,
        name: String,
        arguments: JsonValue,
    },
    ToolCallStarted {
        raw: Vec<u8>,
    },
    ToolCallCompleted {
        raw: Vec<u8>,
    },
    PartialToolCall {
        tool_call_id: String,
        args_text_delta: String,
    },
    Checkpoint(Vec<u8>),
    Aborted(Vec<u8>),
    TurnEnded,
}

#[derive(Debug, Default)]
struct IdleTracker {
    last_progress_at: Option<Instant>,
    heartbeats_since_progress: u32,
    any_progress_yet: bool,
}

/// Output of feeding one decoded inbound message through the session: the
/// events the OpenAI adapter should emit, plus any outbound messages the
/// bridge must send back immediately (e.g. blob replies) without waiting on
/// an external tool result.
#[derive(Debug, Default)]
pub struct HandleOutcome {
    pub events: Vec<CoreEvent>,
    pub outbound: Vec<AgentClientMessage>,
}

pub struct Session {
    pub id: String,
    config: Config,
    state: Mutex<SessionState>,
    append_seqno: Mutex<i64>,
    blob_store: Mutex<BlobStore>,
    pending_execs: Mutex<HashMap<String, PendingExec>>,
    idle: Mutex<IdleTracker>,
    assistant_blobs: Mutex<Vec<String>>,
    any_text_emitted: Mutex<bool>,
    deadline: Instant,
}

impl Session {
    pub fn new(id: impl Into<String>, config: Config) -> Self {
        let deadline = Instant::now() + config.session_deadline;
        Self {
            id: id.into(),
            config,
            state: Mutex::new(SessionState::Opening),
            append_seqno: Mutex::new(0),
            blob_store: Mutex::new(BlobStore::new()),
            pending_execs: Mutex::new(HashMap::new()),
            idle: Mutex::new(IdleTracker {
                last_progress_at: Some(Instant::now()),
                heartbeats_since_progress: 0,
                any_progress_yet: false,
            }),
            assistant_blobs: Mutex::new(Vec::new()),
            any_text_emitted: Mutex::new(false),
            deadline,
        }
    }

    pub fn state(&self) -> SessionState {
        #[expect(clippy::unwrap_used)]
        *self.state.lock().unwrap()
    }

    fn set_state(&self, state: SessionState) {
        #[expect(clippy::unwrap_used)]
        {
            *self.state.lock().unwrap() = state;
        }
    }

    /// Atomically reserves the next `append_seqno`, starting at 0.
    pub fn next_append_seqno(&self) -> i64 {
        #[expect(clippy::unwrap_used)]
        let mut seqno = self.append_seqno.lock().unwrap();
        let current = *seqno;
        *seqno += 1;
        current
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.deadline
    }

    fn mark_progress(&self) {
        #[expect(clippy::unwrap_used)]
        let mut idle = self.idle.lock().unwrap();
        idle.last_progress_at = Some(Instant::now());
        idle.heartbeats_since_progress = 0;
        idle.any_progress_yet = true;
    }

    /// Decodes one raw inbound frame payload and drives the state machine.
    pub fn handle_frame(&self, payload: &[u8]) -> Result<HandleOutcome> {
        let msg = AgentServerMessage::decode(payload)?;
        self.handle_message(msg)
    }

    pub fn handle_message(&self, msg: AgentServerMessage) -> Result<HandleOutcome> {
        if !matches!(
            msg,
            AgentServerMessage::InteractionUpdate(InteractionUpdate::Heartbeat)
        ) {
            self.mark_progress();
        }

        match msg {
            AgentServerMessage::InteractionUpdate(update) => self.handle_interaction_update(update),
            AgentServerMessage::ExecServerMessage(exec) => Ok(self.handle_exec_request(exec)),
            AgentServerMessage::ConversationCheckpointUpdate(raw) => Ok(HandleOutcome {
                events: vec![CoreEvent::Checkpoint(raw)],
                outbound: Vec::new(),
            }),
            AgentServerMessage::KvServerMessage(kv) => Ok(self.handle_kv_message(kv)),
            AgentServerMessage::ExecServerControlMessage(raw) => Ok(HandleOutcome {
                events: vec![CoreEvent::Aborted(raw)],
                outbound: Vec::new(),
            }),
            AgentServerMessage::InteractionQuery(_) => Ok(HandleOutcome::default()),
        }
    }

    fn handle_interaction_update(&self, update: InteractionUpdate) -> Result<HandleOutcome> {
        match update {
            InteractionUpdate::TextDelta(text) | InteractionUpdate::TokenDelta(text) => {
                #[expect(clippy::unwrap_used)]
                {
                    *self.any_text_emitted.lock().unwrap() = true;
                }
                Ok(HandleOutcome {
                    events: vec![CoreEvent::Text(text)],
                    outbound: Vec::new(),
                })
            }
            InteractionUpdate::ToolCallStarted { raw } => {
                self.set_state(SessionState::Streaming);
                Ok(HandleOutcome {
                    events: vec![CoreEvent::ToolCallStarted { raw }],
                    outbound: Vec::new(),
                })
            }
            InteractionUpdate::ToolCallCompleted { raw } => Ok(HandleOutcome {
                events: vec![CoreEvent::ToolCallCompleted { raw }],
                outbound: Vec::new(),
            }),
            InteractionUpdate::PartialToolCall {
                call_id,
                args_text_delta,
            } => Ok(HandleOutcome {
                events: vec![CoreEvent::PartialToolCall {
                    tool_call_id: call_id,
                    args_text_delta,
                }],
                outbound: Vec::new(),
            }),
            InteractionUpdate::Heartbeat => Ok(self.handle_heartbeat()),
            InteractionUpdate::TurnEnded => Ok(self.close_turn()),
        }
    }

    fn handle_heartbeat(&self) -> HandleOutcome {
        let starved = {
            #[expect(clippy::unwrap_used)]
            let mut idle = self.idle.lock().unwrap();
            idle.heartbeats_since_progress += 1;
            let (idle_ms, max_beats) = if idle.any_progress_yet {
                (self.config.heartbeat_idle_ms_pgrs, self.config.heartbeat_max_beats_pgrs)
            } else {
                (self.config.heartbeat_idle_ms_nopgrs, self.config.heartbeat_max_beats_nopgrs)
            };
            let elapsed_ms = idle
                .last_progress_at
                .map(|t| t.elapsed().as_millis() as u64)
                .unwrap_or(0);
            elapsed_ms >= idle_ms || u64::from(idle.heartbeats_since_progress) >= max_beats
        };
        if starved {
            self.close_turn()
        } else {
            HandleOutcome::default()
        }
    }

    fn close_turn(&self) -> HandleOutcome {
        self.set_state(SessionState::Closing);
        let mut events = Vec::new();
        #[expect(clippy::unwrap_used)]
        let any_text = *self.any_text_emitted.lock().unwrap();
        if !any_text {
            #[expect(clippy::unwrap_used)]
            let recovered = self.assistant_blobs.lock().unwrap().clone();
            for text in recovered {
                events.push(CoreEvent::Text(text));
            }
        }
        events.push(CoreEvent::TurnEnded);
        self.set_state(SessionState::Closed);
        HandleOutcome {
            events,
            outbound: Vec::new(),
        }
    }

    fn handle_exec_request(&self, exec: ExecServerMessage) -> HandleOutcome {
        self.set_state(SessionState::AwaitingTool);
        let base = if !exec.exec_id.is_empty() {
            exec.exec_id.clone()
        } else {
            exec.id.to_string()
        };
        let tool_call_id = tool_bridge::make_tool_call_id(&self.id, &base);
        let name = tool_bridge::openai_tool_name(&exec.args);
        let arguments = tool_bridge::openai_tool_arguments(&exec.args);

        #[expect(clippy::unwrap_used)]
        {
            self.pending_execs.lock().unwrap().insert(
                tool_call_id.clone(),
                PendingExec {
                    id: exec.id,
                    exec_id: exec.exec_id,
                    args: exec.args,
                },
            );
        }

        HandleOutcome {
            events: vec![CoreEvent::ToolExecRequested {
                tool_call_id,
                name,
                arguments,
            }],
            outbound: Vec::new(),
        }
    }

    fn handle_kv_message(&self, kv: cursor_protocol::KvServerMessage) -> HandleOutcome {
        let outbound = match kv.op {
            KvServerOp::GetBlobArgs(args) => {
                #[expect(clippy::unwrap_used)]
                let data = self.blob_store.lock().unwrap().get(&args.blob_id);
                AgentClientMessage::KvClientMessage(KvClientMessage {
                    id: kv.id,
                    result: KvClientResult::GetBlobResult {
                        blob_data: Some(data),
                    },
                })
            }
            KvServerOp::SetBlobArgs(args) => {
                #[expect(clippy::unwrap_used)]
                {
                    self.blob_store
                        .lock()
                        .unwrap()
                        .set(args.blob_id.clone(), args.blob_data.clone());
                }
                let recovered = extract_assistant_texts(&args.blob_data);
                if !recovered.is_empty() {
                    #[expect(clippy::unwrap_used)]
                    self.assistant_blobs.lock().unwrap().extend(recovered);
                }
                AgentClientMessage::KvClientMessage(KvClientMessage {
                    id: kv.id,
                    result: KvClientResult::SetBlobResult,
                })
            }
        };
        HandleOutcome {
            events: Vec::new(),
            outbound: vec![outbound],
        }
    }

    /// Builds the (result, stream_close) append pair for a completed OpenAI
    /// tool result and removes the exec from `pending_execs`. Per §4.4 an
    /// unrecognized `tool_call_id` is logged and dropped, never fatal.
    pub fn send_tool_result(
        &self,
        tool_call_id: &str,
        content: &str,
    ) -> Result<(AgentClientMessage, AgentClientMessage)> {
        #[expect(clippy::unwrap_used)]
        let pending = self
            .pending_execs
            .lock()
            .unwrap()
            .remove(tool_call_id)
            .ok_or_else(|| CoreError::UnknownToolCallId(tool_call_id.to_string()))?;

        let result = tool_bridge::result_from_tool_content(&pending.args, content);
        let result_msg = AgentClientMessage::ExecClientMessage(ExecClientMessage {
            id: pending.id,
            result,
            exec_id: pending.exec_id,
        });
        let close_msg = AgentClientMessage::ExecClientControlMessage(ExecClientControlMessage {
            stream_close_id: pending.id,
        });

        self.set_state(SessionState::Streaming);
        Ok((result_msg, close_msg))
    }

    pub fn pending_exec_count(&self) -> usize {
        #[expect(clippy::unwrap_used)]
        self.pending_execs.lock().unwrap().len()
    }
}

/// Recovers assistant-authored text from a blob-set payload, per the three
/// fallbacks in §4.3: structured JSON (`role`/`content`, a `messages` array),
/// or — failing that — a protobuf-field scan for long, printable strings.
fn extract_assistant_texts(data: &[u8]) -> Vec<String> {
    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(json) = serde_json::from_str::<JsonValue>(text) {
            return extract_from_json(&json);
        }
    }
    extract_from_protobuf_fallback(data)
}

fn extract_from_json(json: &JsonValue) -> Vec<String> {
    let mut out = Vec::new();
    collect_assistant_message(json, &mut out);
    if let Some(messages) = json.get("messages").and_then(|m| m.as_array()) {
        for message in messages {
            collect_assistant_message(message, &mut out);
        }
    }
    out
}

fn collect_assistant_message(value: &JsonValue, out: &mut Vec<String>) {
    let Some(role) = value.get("role").and_then(|r| r.as_str()) else {
        return;
    };
    if role != "assistant" {
        return;
    }
    match value.get("content") {
        Some(JsonValue::String(s)) => out.push(s.clone()),
        Some(JsonValue::Array(items)) => {
            for item in items {
                if item.get("type").and_then(|t| t.as_str()) == Some("text") {
                    if let Some(text) = item.get("text").and_then(|t| t.as_str()) {
                        out.push(text.to_string());
                    }
                }
            }
        }
        _ => {}
    }
}

fn extract_from_protobuf_fallback(data: &[u8]) -> Vec<String> {
    let Ok(fields) = parse_fields(data) else {
        return Vec::new();
    };
    fields
        .iter()
        .filter_map(|f| f.as_str())
        .filter(|s| s.len() > 50 && !s.starts_with('{') && !s.starts_with('['))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cursor_protocol::GetBlobArgs;
    use cursor_protocol::KvServerMessage;
    use cursor_protocol::SetBlobArgs;
    use pretty_assertions::assert_eq;

    fn session() -> Session {
        Session::new("sid", Config::default())
    }

    #[test]
    fn append_seqno_is_strictly_increasing_from_zero() {
        let s = session();
        assert_eq!(s.next_append_seqno(), 0);
        assert_eq!(s.next_append_seqno(), 1);
        assert_eq!(s.next_append_seqno(), 2);
    }

    #[test]
    fn text_delta_marks_progress_and_emits_text() {
        let s = session();
        let outcome = s
            .handle_message(AgentServerMessage::InteractionUpdate(InteractionUpdate::TextDelta(
                "hi".into(),
            )))
            .unwrap();
        assert_eq!(outcome.events, vec![CoreEvent::Text("hi".into())]);
    }

    #[test]
    fn heartbeat_starvation_forces_turn_end_after_max_beats() {
        let mut cfg = Config::default();
        cfg.heartbeat_max_beats_pgrs = 3;
        let s = Session::new("sid", cfg);
        s.handle_message(AgentServerMessage::InteractionUpdate(InteractionUpdate::TextDelta(
            "hi".into(),
        )))
        .unwrap();

        for _ in 0..2 {
            let outcome = s
                .handle_message(AgentServerMessage::InteractionUpdate(InteractionUpdate::Heartbeat))
                .unwrap();
            assert!(outcome.events.is_empty());
        }
        let outcome = s
            .handle_message(AgentServerMessage::InteractionUpdate(InteractionUpdate::Heartbeat))
            .unwrap();
        assert_eq!(outcome.events, vec![CoreEvent::TurnEnded]);
        assert_eq!(s.state(), SessionState::Closed);
    }

    #[test]
    fn s5_exactly_1000_heartbeats_after_progress_triggers_synthetic_turn_end() {
        let s = Session::new("sid", Config::default());
        s.handle_message(AgentServerMessage::InteractionUpdate(InteractionUpdate::TextDelta(
            "hi".into(),
        )))
        .unwrap();

        for _ in 0..999 {
            let outcome = s
                .handle_message(AgentServerMessage::InteractionUpdate(InteractionUpdate::Heartbeat))
                .unwrap();
            assert!(outcome.events.is_empty());
        }
        let outcome = s
            .handle_message(AgentServerMessage::InteractionUpdate(InteractionUpdate::Heartbeat))
            .unwrap();
        assert_eq!(outcome.events, vec![CoreEvent::TurnEnded]);
        assert_eq!(s.state(), SessionState::Closed);
    }

    #[test]
    fn assistant_blob_is_recovered_on_turn_end_when_no_text_streamed() {
        let s = session();
        let blob = serde_json::json!({"role": "assistant", "content": "recovered text"})
            .to_string()
            .into_bytes();
        s.handle_message(AgentServerMessage::KvServerMessage(KvServerMessage {
            id: 1,
            op: KvServerOp::SetBlobArgs(SetBlobArgs {
                blob_id: b"blob-1".to_vec(),
                blob_data: blob,
            }),
        }))
        .unwrap();

        let outcome = s
            .handle_message(AgentServerMessage::InteractionUpdate(InteractionUpdate::TurnEnded))
            .unwrap();
        assert_eq!(
            outcome.events,
            vec![
                CoreEvent::Text("recovered text".into()),
                CoreEvent::TurnEnded
            ]
        );
    }

    #[test]
    fn streamed_text_suppresses_blob_recovery() {
        let s = session();
        s.handle_message(AgentServerMessage::InteractionUpdate(InteractionUpdate::TextDelta(
            "live text".into(),
        )))
        .unwrap();
        let blob = serde_json::json!({"role": "assistant", "content": "should not appear"})
            .to_string()
            .into_bytes();
        s.handle_message(AgentServerMessage::KvServerMessage(KvServerMessage {
            id: 1,
            op: KvServerOp::SetBlobArgs(SetBlobArgs {
                blob_id: b"blob-1".to_vec(),
                blob_data: blob,
            }),
        }))
        .unwrap();

        let outcome = s
            .handle_message(AgentServerMessage::InteractionUpdate(InteractionUpdate::TurnEnded))
            .unwrap();
        assert_eq!(outcome.events, vec![CoreEvent::TurnEnded]);
    }

    #[test]
    fn get_blob_echoes_the_server_id() {
        let s = session();
        let outcome = s
            .handle_message(AgentServerMessage::KvServerMessage(KvServerMessage {
                id: 42,
                op: KvServerOp::GetBlobArgs(GetBlobArgs {
                    blob_id: b"missing".to_vec(),
                }),
            }))
            .unwrap();
        let AgentClientMessage::KvClientMessage(msg) = &outcome.outbound[0] else {
            panic!("expected kv client message");
        };
        assert_eq!(msg.id, 42);
    }

    #[test]
    fn exec_request_registers_pending_exec_and_unknown_result_errors() {
        let s = session();
        let outcome = s
            .handle_message(AgentServerMessage::ExecServerMessage(ExecServerMessage {
                id: 1,
                exec_id: "exec-1".into(),
                args: cursor_protocol::ExecServerArgs::Shell {
                    command: "ls".into(),
                    description: None,
                    workdir: None,
                },
            }))
            .unwrap();
        assert_eq!(s.pending_exec_count(), 1);
        let CoreEvent::ToolExecRequested { tool_call_id, name, .. } = &outcome.events[0] else {
            panic!("expected tool exec requested event");
        };
        assert_eq!(name, "bash");

        let (result, close) = s.send_tool_result(tool_call_id, "total 0\n").unwrap();
        assert!(matches!(result, AgentClientMessage::ExecClientMessage(_)));
        assert!(matches!(close, AgentClientMessage::ExecClientControlMessage(_)));
        assert_eq!(s.pending_exec_count(), 0);

        let err = s.send_tool_result("sess_sid__call_bogus", "x").unwrap_err();
        assert!(matches!(err, CoreError::UnknownToolCallId(_)));
    }
}
