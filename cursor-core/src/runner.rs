//! Drives one inbound OpenAI Chat Completions request through a fresh
//! Cursor session end to end: opens the `RunSSE`/`BidiAppend` pair, feeds
//! every inbound frame through [`Session`], forwards whatever the session
//! wants sent back, and turns the resulting `CoreEvent`s into either a
//! sequence of SSE chunks or one aggregated response.
//!
//! Because OpenAI's protocol is stateless per request while Cursor's is a
//! long-lived server-driven session, a session is opened fresh for every
//! inbound request and abandoned (not drained to `TurnEnded`) the moment the
//! first tool call is requested — the matching tool result only ever shows
//! up flattened into the *next* request's prompt. Grounded on
//! `core/src/chat_completions.rs`'s `stream_chat_completions`, generalized
//! from "open one SSE POST" to "open a RunSSE stream and feed it its first
//! BidiAppend."

use std::time::Instant;

use cursor_protocol::AgentClientMessage;
use cursor_protocol::AgentRunRequest;
use cursor_protocol::BidiRequestId;
use cursor_protocol::ConversationAction;
use cursor_protocol::ConversationMode;
use cursor_protocol::Env;
use cursor_protocol::McpFileSystemOptions;
use cursor_protocol::ModelDetails;
use cursor_protocol::RequestContext;
use cursor_protocol::UserMessage;
use cursor_wire::check_trailer;
use futures::StreamExt;
use uuid::Uuid;

use crate::config::Config;
use crate::error::CoreError;
use crate::error::Result;
use crate::openai_adapter::Aggregator;
use crate::openai_adapter::ChatCompletionRequest;
use crate::openai_adapter::ChatCompletionResponse;
use crate::openai_adapter::ChunkEmitter;
use crate::openai_adapter::extract_tools;
use crate::openai_adapter::flatten_prompt;
use crate::session::CoreEvent;
use crate::session::Session;
use crate::transport::HttpTransport;
use crate::transport::InboundChannel;
use crate::transport::OutboundChannel;

const RUN_SSE_PATH: &str = "/agent.v1.AgentService/RunSSE";

pub struct SessionRunner;

impl SessionRunner {
    /// Drives the request to completion, invoking `emit` with each
    /// already-SSE-formatted line (`data: ...\n\n`, including the trailing
    /// `data: [DONE]\n\n`) as it becomes available. Wiring that into an
    /// actual HTTP response body is the out-of-scope framework's job; this
    /// only produces the lines in order.
    pub async fn run_streaming(
        transport: &mut HttpTransport,
        config: Config,
        request: ChatCompletionRequest,
        mut emit: impl FnMut(String),
    ) -> Result<()> {
        let model = request.model.clone();
        let chat_id = format!("chatcmpl-{}", Uuid::new_v4());
        let deadline_ms = config.session_deadline.as_millis() as u64;
        let (session, inbound, request_id) = open_session(transport, &config, request).await?;
        let mut emitter = ChunkEmitter::new(chat_id, model);
        let outcome = drive(&session, inbound, transport, &request_id, deadline_ms, |event| {
            for chunk in emitter.emit(event) {
                emit(crate::openai_adapter::format_chunk(&chunk));
            }
        })
        .await;
        // The response headers (and likely some chunks) are already on the
        // wire by the time a mid-session error can occur, so per §7 it's
        // surfaced as a terminal error chunk rather than propagated as an
        // HTTP-level failure.
        if let Err(err) = outcome {
            tracing::warn!(%err, "session ended in error; surfacing as a terminal SSE chunk");
            emit(crate::openai_adapter::format_error_chunk(&err.to_string()));
        }
        emit(crate::openai_adapter::DONE.to_string());
        Ok(())
    }

    /// Drives the request to completion and collapses every event into one
    /// JSON response, the non-streaming counterpart of [`Self::run_streaming`].
    pub async fn run_aggregated(
        transport: &mut HttpTransport,
        config: Config,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse> {
        let model = request.model.clone();
        let chat_id = format!("chatcmpl-{}", Uuid::new_v4());
        let deadline_ms = config.session_deadline.as_millis() as u64;
        let (session, inbound, request_id) = open_session(transport, &config, request).await?;
        let mut aggregator = Aggregator::new();
        drive(&session, inbound, transport, &request_id, deadline_ms, |event| {
            aggregator.apply(event);
        })
        .await?;
        Ok(aggregator.finish(chat_id, model))
    }
}

/// Builds the initial `AgentRunRequest` from the inbound OpenAI request,
/// opens the `RunSSE` inbound stream, and sends it as the first
/// (`seqno == 0`) `BidiAppend`. The spec calls for both calls to be opened
/// concurrently; in practice `open_inbound` only blocks until the server's
/// response headers arrive (the stream is already live by the time it
/// returns), so sending the initial append immediately afterward is
/// functionally equivalent without needing to juggle two simultaneous
/// borrows of the same transport.
async fn open_session(
    transport: &mut HttpTransport,
    config: &Config,
    request: ChatCompletionRequest,
) -> Result<(Session, crate::transport::HttpFrameStream, String)> {
    let request_id = Uuid::new_v4().to_string();
    let conversation_id = Uuid::new_v4().to_string();
    let message_id = Uuid::new_v4().to_string();

    let tools = extract_tools(&request.tools);
    let workspace_path = config.workspace_path.to_string_lossy().to_string();
    let env = Env {
        os: std::env::consts::OS.to_string(),
        workspace_path: workspace_path.clone(),
        shell: std::env::var("SHELL").unwrap_or_default(),
        timezone: std::env::var("TZ").unwrap_or_default(),
    };
    let request_context = RequestContext {
        env,
        mcp_tool: tools.clone(),
        mcp_instructions: String::new(),
    };
    let user_message = UserMessage {
        text: flatten_prompt(&request.messages),
        message_id,
        mode: ConversationMode::Agent,
    };
    let run_request = AgentRunRequest {
        action: ConversationAction::UserMessageAction {
            user_message,
            request_context,
        },
        model_details: Some(ModelDetails {
            model_id: request.model,
        }),
        mcp_tools: tools,
        conversation_id: conversation_id.clone(),
        mcp_file_system_options: Some(McpFileSystemOptions {
            enabled: true,
            workspace_project_dir: workspace_path,
            mcp_descriptor: Vec::new(),
        }),
    };

    let body = BidiRequestId {
        request_id: request_id.clone(),
    }
    .encode();
    let inbound = transport.open_inbound(RUN_SSE_PATH, &request_id, &body).await?;

    let session = Session::new(conversation_id, config.clone());
    let seqno = session.next_append_seqno();
    transport
        .send_append(&AgentClientMessage::RunRequest(run_request), &request_id, seqno)
        .await?;

    Ok((session, inbound, request_id))
}

/// Feeds inbound frames through `session`, forwarding any reply the session
/// wants sent back over `outbound` and calling `on_event` for every emitted
/// [`CoreEvent`]. Returns as soon as the turn ends, a tool call is
/// requested (the session is abandoned at that point, per the module
/// doc), the stream closes, or the session's deadline elapses.
async fn drive<I, O>(
    session: &Session,
    mut inbound: I,
    outbound: &mut O,
    request_id: &str,
    deadline_ms: u64,
    mut on_event: impl FnMut(&CoreEvent),
) -> Result<()>
where
    I: InboundChannel,
    O: OutboundChannel,
{
    loop {
        if session.is_expired(Instant::now()) {
            return Err(CoreError::DeadlineExceeded(deadline_ms));
        }

        let Some(frame) = inbound.next().await else {
            return Ok(());
        };
        let frame = frame?;

        if frame.is_trailer {
            check_trailer(&frame.payload)?;
            return Ok(());
        }

        let outcome = session.handle_frame(&frame.payload)?;
        for message in &outcome.outbound {
            let seqno = session.next_append_seqno();
            outbound.send_append(message, request_id, seqno).await?;
        }

        let mut turn_ended = false;
        let mut tool_requested = false;
        for event in &outcome.events {
            on_event(event);
            match event {
                CoreEvent::TurnEnded => turn_ended = true,
                CoreEvent::ToolExecRequested { .. } => tool_requested = true,
                _ => {}
            }
        }
        if tool_requested || turn_ended {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cursor_wire::Frame;
    use cursor_wire::fields::write_message_field;
    use cursor_wire::fields::write_string_field;
    use pretty_assertions::assert_eq;

    use crate::openai_adapter::ChatMessage;
    use crate::transport::FakeTransport;

    fn text_delta_frame(text: &str) -> Frame {
        let mut text_delta = Vec::new();
        write_string_field(&mut text_delta, 1, text);
        let mut update = Vec::new();
        write_message_field(&mut update, 1, &text_delta);
        let mut msg = Vec::new();
        write_message_field(&mut msg, 1, &update);
        Frame {
            is_trailer: false,
            payload: msg,
        }
    }

    fn turn_ended_frame() -> Frame {
        let mut update = Vec::new();
        write_message_field(&mut update, 14, &[]);
        let mut msg = Vec::new();
        write_message_field(&mut msg, 1, &update);
        Frame {
            is_trailer: false,
            payload: msg,
        }
    }

    fn user_message(text: &str) -> ChatMessage {
        ChatMessage {
            role: "user".to_string(),
            content: Some(serde_json::Value::String(text.to_string())),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    #[tokio::test]
    async fn drive_emits_text_then_stops_on_turn_ended() {
        let session = Session::new("sid", Config::default());
        let inbound = FakeTransport::new(vec![text_delta_frame("hello"), turn_ended_frame()]).into_stream();
        let mut outbound = FakeTransport::new(vec![]);
        let mut events = Vec::new();
        drive(&session, inbound, &mut outbound, "req-1", 60_000, |event| {
            events.push(event.clone());
        })
        .await
        .unwrap();

        assert_eq!(
            events,
            vec![CoreEvent::Text("hello".to_string()), CoreEvent::TurnEnded]
        );
    }

    #[tokio::test]
    async fn drive_stops_immediately_on_tool_exec_request_without_waiting_for_a_result() {
        let session = Session::new("sid", Config::default());
        let mut shell = Vec::new();
        write_string_field(&mut shell, 1, "ls");
        let mut exec = Vec::new();
        write_message_field(&mut exec, 2, &shell);
        let mut msg = Vec::new();
        write_message_field(&mut msg, 2, &exec);
        let exec_frame = Frame {
            is_trailer: false,
            payload: msg,
        };
        // A second frame is queued but must never be consumed: the loop
        // returns as soon as the tool exec request is observed.
        let inbound =
            FakeTransport::new(vec![exec_frame, text_delta_frame("should not arrive")]).into_stream();
        let mut outbound = FakeTransport::new(vec![]);
        let mut events = Vec::new();
        drive(&session, inbound, &mut outbound, "req-1", 60_000, |event| {
            events.push(event.clone());
        })
        .await
        .unwrap();

        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], CoreEvent::ToolExecRequested { .. }));
    }

    #[tokio::test]
    async fn drive_raises_the_trailer_status_as_an_error() {
        let session = Session::new("sid", Config::default());
        let trailer = Frame {
            is_trailer: true,
            payload: b"grpc-status: 13\r\ngrpc-message: boom\r\n".to_vec(),
        };
        let inbound = FakeTransport::new(vec![trailer]).into_stream();
        let mut outbound = FakeTransport::new(vec![]);
        let err = drive(&session, inbound, &mut outbound, "req-1", 60_000, |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Wire(cursor_wire::WireError::TrailerStatus { status: 13, .. })));
    }

    #[test]
    fn flatten_prompt_smoke_test_for_run_request_construction() {
        let messages = vec![user_message("hi there")];
        let prompt = flatten_prompt(&messages);
        assert_eq!(prompt, "[user]\nhi there");
    }
}
