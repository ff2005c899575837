//! Moves framed bytes between this process and Cursor's bidi RPC endpoints.
//! `HttpTransport`'s attempt loop mirrors `core/src/client.rs`'s
//! `ModelClient::stream`: the same "retry on 429/5xx honoring `Retry-After`,
//! otherwise exponential backoff, give up after `CURSOR_REQUEST_MAX_RETRIES`"
//! shape, generalized from "open one SSE response" to "open an inbound
//! gRPC-web stream, then append unary request bodies to it."

use std::pin::Pin;
use std::task::Context;
use std::task::Poll;
use std::time::Duration;

use cursor_protocol::AgentClientMessage;
use cursor_protocol::ModelDetails;
use cursor_wire::Frame;
use cursor_wire::FrameReader;
use cursor_wire::encode_frame;
use futures::Stream;
use futures::StreamExt;
use rand::Rng;
use reqwest::Client;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderValue;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::debug;
use tracing::warn;

/// `x-cursor-client-version` is pinned to this crate's own version; Cursor's
/// server has never been observed rejecting a call over this header's value,
/// only logging it.
const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

use crate::config::Config;
use crate::error::CoreError;
use crate::error::Result;

fn backoff(attempt: u64) -> Duration {
    let base_delay_ms = 200u64 * (1u64 << attempt.min(6).saturating_sub(1));
    let jitter = rand::rng().random_range(0.8..1.2);
    Duration::from_millis((base_delay_ms as f64 * jitter) as u64)
}

/// Builds a header value from a plain-ASCII source we control (tokens,
/// checksums, uuids); falls back to an empty value rather than panicking if
/// a caller ever manages to pass something header-hostile through.
fn header_value(s: &str) -> HeaderValue {
    HeaderValue::from_str(s).unwrap_or_else(|_| HeaderValue::from_static(""))
}

/// Best-effort IANA/offset timezone name for the `x-cursor-timezone` header.
/// There is no `TZ`-independent way to ask the OS for this from stdlib alone
/// and pulling in `iana-time-zone` just for one header isn't worth a new
/// dependency; `TZ` covers every server/container deployment this proxy
/// actually runs under.
fn local_timezone() -> String {
    std::env::var("TZ").unwrap_or_default()
}

/// Source of inbound frames for one session's bidi stream. A plain `Stream`
/// bound rather than a bespoke trait: both `HttpTransport` and the in-memory
/// fake just need to hand back a `Stream<Item = Result<Frame>>`.
pub trait InboundChannel: Stream<Item = Result<Frame>> + Unpin + Send {}
impl<T: Stream<Item = Result<Frame>> + Unpin + Send> InboundChannel for T {}

/// Sink accepting unary append requests for one session's bidi stream.
pub trait OutboundChannel: Send {
    async fn send_append(
        &mut self,
        message: &AgentClientMessage,
        request_id: &str,
        append_seqno: i64,
    ) -> Result<()>;
}

pub struct HttpTransport {
    client: Client,
    config: Config,
    auth: cursor_login::AuthManager,
}

impl HttpTransport {
    pub fn new(config: Config, auth: cursor_login::AuthManager) -> Self {
        Self {
            client: Client::new(),
            config,
            auth,
        }
    }

    /// Builds the documented Cursor header set (§4.6) for one call. `token`
    /// is used both for the bearer credential and to derive the rotating
    /// `x-cursor-checksum`; `request_id` is echoed as `x-request-id` so
    /// server-side logs can correlate the two HTTP calls that share a
    /// session.
    fn cursor_headers(&self, token: &str, request_id: &str, content_type: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(reqwest::header::CONTENT_TYPE, header_value(content_type));
        headers.insert("x-cursor-checksum", header_value(&cursor_login::generate_checksum(token)));
        headers.insert("x-cursor-client-version", header_value(CLIENT_VERSION));
        headers.insert("x-cursor-client-type", header_value("cli"));
        headers.insert("x-cursor-timezone", header_value(&local_timezone()));
        headers.insert("x-ghost-mode", header_value("false"));
        headers.insert("x-cursor-streaming", header_value("true"));
        headers.insert("x-request-id", header_value(request_id));
        headers
    }

    /// Opens the server-streamed side of a bidi session and returns a
    /// `Stream` of decoded frames, retrying the initial connect the same way
    /// `ModelClient::stream` retries the initial POST. `body` is the encoded
    /// `BidiRequestId`; framing happens here so callers only ever deal in
    /// plain message bytes.
    pub async fn open_inbound(
        &self,
        path: &str,
        request_id: &str,
        body: &[u8],
    ) -> Result<HttpFrameStream> {
        let url = format!("{}{path}", self.config.base_url);
        let framed = encode_frame(body);
        let mut attempt = 0u64;
        let mut refreshed_once = false;
        loop {
            attempt += 1;
            let token = self
                .auth
                .access_token()
                .await?
                .ok_or(CoreError::Unauthorized("open_inbound"))?;
            let res = self
                .client
                .post(&url)
                .bearer_auth(&token)
                .headers(self.cursor_headers(&token, request_id, "application/grpc-web+proto"))
                .body(framed.clone())
                .send()
                .await;
            match res {
                Ok(resp) if resp.status().is_success() => {
                    let (tx, rx) = mpsc::channel::<Result<Frame>>(32);
                    let byte_stream = resp.bytes_stream();
                    tokio::spawn(pump_frames(byte_stream, tx));
                    return Ok(HttpFrameStream { rx });
                }
                Ok(resp) if resp.status() == StatusCode::UNAUTHORIZED => {
                    if refreshed_once {
                        return Err(CoreError::Unauthorized("open_inbound"));
                    }
                    refreshed_once = true;
                    self.auth
                        .force_refresh()
                        .await
                        .map_err(|e| CoreError::AuthRefreshFailed(e.to_string()))?;
                    warn!("open_inbound got 401; forced a token refresh and is retrying once");
                }
                Ok(resp) => {
                    let status = resp.status();
                    if !(status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()) {
                        return Err(CoreError::RetryLimit(status));
                    }
                    if attempt > self.max_retries() {
                        return Err(CoreError::RetryLimit(status));
                    }
                    let retry_after = resp
                        .headers()
                        .get(reqwest::header::RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.parse::<u64>().ok());
                    let delay = retry_after
                        .map(|s| Duration::from_secs(s))
                        .unwrap_or_else(|| backoff(attempt));
                    warn!(attempt, ?delay, "retrying bidi open");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    if attempt > self.max_retries() {
                        return Err(e.into());
                    }
                    tokio::time::sleep(backoff(attempt)).await;
                }
            }
        }
    }

    fn max_retries(&self) -> u64 {
        *crate::flags::CURSOR_REQUEST_MAX_RETRIES
    }
}

impl OutboundChannel for HttpTransport {
    async fn send_append(
        &mut self,
        message: &AgentClientMessage,
        request_id: &str,
        append_seqno: i64,
    ) -> Result<()> {
        let append = cursor_protocol::BidiAppendRequest {
            data: message.encode(),
            request_id: cursor_protocol::BidiRequestId {
                request_id: request_id.to_string(),
            },
            append_seqno,
        };
        let url = format!("{}/aiserver.v1.BidiService/BidiAppend", self.config.base_url);
        let framed = encode_frame(&append.encode());
        let mut attempt = 0u64;
        let mut refreshed_once = false;
        loop {
            attempt += 1;
            let token = self
                .auth
                .access_token()
                .await?
                .ok_or(CoreError::Unauthorized("send_append"))?;
            let res = self
                .client
                .post(&url)
                .bearer_auth(&token)
                .headers(self.cursor_headers(&token, request_id, "application/grpc-web+proto"))
                .body(framed.clone())
                .send()
                .await;
            match res {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                Ok(resp) if resp.status() == StatusCode::UNAUTHORIZED => {
                    if refreshed_once {
                        return Err(CoreError::Unauthorized("send_append"));
                    }
                    refreshed_once = true;
                    self.auth
                        .force_refresh()
                        .await
                        .map_err(|e| CoreError::AuthRefreshFailed(e.to_string()))?;
                    warn!("send_append got 401; forced a token refresh and is retrying once");
                }
                Ok(resp) => {
                    let status = resp.status();
                    if !(status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()) {
                        return Err(CoreError::RetryLimit(status));
                    }
                    if attempt > self.max_retries() {
                        return Err(CoreError::RetryLimit(status));
                    }
                    tokio::time::sleep(backoff(attempt)).await;
                }
                Err(e) => {
                    if attempt > self.max_retries() {
                        return Err(e.into());
                    }
                    tokio::time::sleep(backoff(attempt)).await;
                }
            }
        }
    }
}

async fn pump_frames(
    mut byte_stream: impl Stream<Item = reqwest::Result<bytes::Bytes>> + Unpin,
    tx: mpsc::Sender<Result<Frame>>,
) {
    let mut reader = FrameReader::new();
    while let Some(chunk) = byte_stream.next().await {
        let chunk = match chunk {
            Ok(c) => c,
            Err(e) => {
                let _ = tx.send(Err(e.into())).await;
                return;
            }
        };
        reader.push(&chunk);
        loop {
            match reader.next_frame() {
                Ok(Some(frame)) => {
                    if tx.send(Ok(frame)).await.is_err() {
                        return;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    let _ = tx.send(Err(e.into())).await;
                    return;
                }
            }
        }
    }
    debug!("inbound byte stream ended");
}

pub struct HttpFrameStream {
    rx: mpsc::Receiver<Result<Frame>>,
}

impl Stream for HttpFrameStream {
    type Item = Result<Frame>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// In-memory fake implementing both channel traits, for session-loop tests
/// that shouldn't need a live server.
pub struct FakeTransport {
    inbound: Vec<Result<Frame>>,
    pub sent: Vec<(Vec<u8>, String, i64)>,
}

impl FakeTransport {
    pub fn new(inbound: Vec<Frame>) -> Self {
        Self {
            inbound: inbound.into_iter().map(Ok).collect(),
            sent: Vec::new(),
        }
    }

    pub fn into_stream(self) -> futures::stream::Iter<std::vec::IntoIter<Result<Frame>>> {
        futures::stream::iter(self.inbound)
    }
}

impl OutboundChannel for FakeTransport {
    async fn send_append(
        &mut self,
        message: &AgentClientMessage,
        request_id: &str,
        append_seqno: i64,
    ) -> Result<()> {
        self.sent
            .push((message.encode(), request_id.to_string(), append_seqno));
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct UsableModelEntry {
    #[serde(rename = "modelId")]
    model_id: String,
    #[serde(rename = "displayModelId", default)]
    display_model_id: Option<String>,
    #[serde(default)]
    aliases: Vec<String>,
    #[serde(rename = "displayName", default)]
    display_name: Option<String>,
    #[serde(rename = "displayNameShort", default)]
    display_name_short: Option<String>,
}

impl From<UsableModelEntry> for cursor_protocol::UsableModel {
    fn from(entry: UsableModelEntry) -> Self {
        cursor_protocol::UsableModel {
            model_id: entry.model_id,
            display_model_id: entry.display_model_id,
            aliases: entry.aliases,
            display_name: entry.display_name,
            display_name_short: entry.display_name_short,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GetUsableModelsResponse {
    #[serde(default)]
    models: Vec<UsableModelEntry>,
}

#[derive(Debug, Deserialize)]
struct GetDefaultModelResponse {
    #[serde(rename = "modelDetails")]
    model_details: ModelDetailsResponse,
}

#[derive(Debug, Deserialize)]
struct ModelDetailsResponse {
    #[serde(rename = "modelId")]
    model_id: String,
}

/// Sidecar JSON/Connect clients used to merge server-reported model aliases
/// into the static catalog at startup (§6.1); the static table stays
/// authoritative for context/output limits.
pub struct ModelCatalogClient<'a> {
    transport: &'a HttpTransport,
}

impl<'a> ModelCatalogClient<'a> {
    pub fn new(transport: &'a HttpTransport) -> Self {
        Self { transport }
    }

    pub async fn get_usable_models(&self) -> Result<Vec<cursor_protocol::UsableModel>> {
        let url = format!(
            "{}/aiserver.v1.AiService/GetUsableModels",
            self.transport.config.base_url
        );
        let token = self
            .transport
            .auth
            .access_token()
            .await?
            .ok_or(CoreError::Unauthorized("get_usable_models"))?;
        let request_id = uuid::Uuid::new_v4().to_string();
        let resp: GetUsableModelsResponse = self
            .transport
            .client
            .post(&url)
            .bearer_auth(&token)
            .headers(self.transport.cursor_headers(&token, &request_id, "application/json"))
            .header("connect-protocol-version", "1")
            .json(&serde_json::json!({}))
            .send()
            .await?
            .json()
            .await?;
        Ok(resp.models.into_iter().map(Into::into).collect())
    }

    /// Fetches the usable-models list and merges it into `catalog` in place,
    /// so every later `catalog.limits_for(...)` call in this process also
    /// recognizes the server's reported aliases and display ids.
    pub async fn refresh_catalog(&self, catalog: &mut cursor_protocol::Catalog) -> Result<()> {
        let models = self.get_usable_models().await?;
        catalog.merge_usable_models(models);
        Ok(())
    }

    pub async fn get_default_model(&self) -> Result<ModelDetails> {
        let url = format!(
            "{}/aiserver.v1.AiService/GetDefaultModelForCli",
            self.transport.config.base_url
        );
        let token = self
            .transport
            .auth
            .access_token()
            .await?
            .ok_or(CoreError::Unauthorized("get_default_model"))?;
        let request_id = uuid::Uuid::new_v4().to_string();
        let resp: GetDefaultModelResponse = self
            .transport
            .client
            .post(&url)
            .bearer_auth(&token)
            .headers(self.transport.cursor_headers(&token, &request_id, "application/json"))
            .header("connect-protocol-version", "1")
            .json(&serde_json::json!({}))
            .send()
            .await?
            .json()
            .await?;
        Ok(ModelDetails {
            model_id: resp.model_details.model_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cursor_wire::encode_frame;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn fake_transport_replays_pushed_frames() {
        let payload = encode_frame(b"hello");
        let mut reader = FrameReader::new();
        reader.push(&payload);
        let frame = reader.next_frame().unwrap().unwrap();

        let fake = FakeTransport::new(vec![frame.clone()]);
        let mut stream = fake.into_stream();
        let got = stream.next().await.unwrap().unwrap();
        assert_eq!(got.payload, frame.payload);
    }

    #[tokio::test]
    async fn fake_transport_records_sent_appends() {
        let mut fake = FakeTransport::new(vec![]);
        let msg = AgentClientMessage::ExecClientControlMessage(cursor_protocol::ExecClientControlMessage {
            stream_close_id: 3,
        });
        fake.send_append(&msg, "req-1", 0).await.unwrap();
        assert_eq!(fake.sent.len(), 1);
        assert_eq!(fake.sent[0].1, "req-1");
        assert_eq!(fake.sent[0].2, 0);
    }

    #[test]
    fn backoff_grows_with_attempt_and_stays_jittered() {
        let d1 = backoff(1);
        let d4 = backoff(4);
        assert!(d4 > d1);
        assert!(d1 >= Duration::from_millis(160));
    }

    #[test]
    fn usable_model_entry_carries_aliases_into_the_catalog() {
        let entry = UsableModelEntry {
            model_id: "sonnet-4.5".to_string(),
            display_model_id: Some("claude-sonnet-4-5-20250929".to_string()),
            aliases: vec!["claude-4.5-sonnet".to_string()],
            display_name: Some("Claude Sonnet 4.5".to_string()),
            display_name_short: Some("Sonnet 4.5".to_string()),
        };
        let usable: cursor_protocol::UsableModel = entry.into();

        let mut catalog = cursor_protocol::Catalog::new();
        catalog.merge_usable_models(vec![usable]);
        assert_eq!(
            catalog.canonical_model_id("claude-4.5-sonnet"),
            "sonnet-4.5"
        );
        assert_eq!(
            catalog.canonical_model_id("claude-sonnet-4-5-20250929"),
            "sonnet-4.5"
        );
    }
}
