//! Event-stream listener.
//!
//! Reads `GET {base}/sse` line by line, learns the submission endpoint from
//! the session announcement and routes response envelopes to the
//! [`Correlator`]. Anything it cannot use is dropped.

use std::{
    io,
    sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError},
};

use futures::{StreamExt, TryStreamExt};
use regex::Regex;
use tokio_util::{
    bytes::BytesMut,
    codec::{Decoder, FramedRead, LinesCodec, LinesCodecError},
    io::StreamReader,
};
use tracing::{debug, error, info, trace, warn};

use super::correlator::Correlator;
use super::transport::HttpTransport;
use super::types::ResponseEnvelope;

/// Framing prefix of every payload line.
pub const DATA_PREFIX: &str = "data: ";

/// Sentinel some servers emit at end of stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Marker identifying a session announcement.
const SESSION_MARKER: &str = "session_id=";

/// Longest line accepted from the stream.
const MAX_LINE_LENGTH: usize = 1 << 20;

/// Relative submission path: `/message?session_id=` followed by hex digits
/// separated by dashes (a UUID in practice).
static ENDPOINT_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(/message\?session_id=[a-fA-F0-9-]+)").expect("endpoint pattern is valid")
});

/// Classified event-stream payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Relative submission path announced by the server.
    Endpoint(String),
    /// End-of-stream sentinel.
    Done,
    /// Response envelope carrying a correlation id.
    Response(ResponseEnvelope),
    /// Malformed or irrelevant payload.
    Ignored,
}

/// Classify one raw line of the event stream.
///
/// Lines without the `data: ` prefix (comments, `event:` fields, keep-alives)
/// are ignored.
pub fn classify_line(line: &str) -> Frame {
    let line = line.trim();
    match line.strip_prefix(DATA_PREFIX) {
        Some(payload) => classify_payload(payload),
        None => Frame::Ignored,
    }
}

/// Classify a payload with the framing prefix already stripped.
pub fn classify_payload(payload: &str) -> Frame {
    if payload.contains(SESSION_MARKER) {
        return ENDPOINT_PATH
            .captures(payload)
            .and_then(|c| c.get(1))
            .map_or(Frame::Ignored, |m| Frame::Endpoint(m.as_str().to_string()));
    }
    if payload.starts_with("/message") {
        return Frame::Endpoint(payload.to_string());
    }
    if payload == DONE_SENTINEL {
        return Frame::Done;
    }
    match serde_json::from_str::<ResponseEnvelope>(payload) {
        Ok(env) if env.id.is_some() => Frame::Response(env),
        _ => Frame::Ignored,
    }
}

/// Absolute submission endpoint of the current session.
///
/// The first announcement wins until [`EndpointSlot::reset`] starts a new
/// session.
#[derive(Debug, Default)]
pub struct EndpointSlot {
    url: Mutex<Option<String>>,
}

impl EndpointSlot {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> MutexGuard<'_, Option<String>> {
        self.url.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self) -> Option<String> {
        self.slot().clone()
    }

    /// Record `url` unless an endpoint is already known. Returns whether this
    /// call set it.
    pub fn set(&self, url: String) -> bool {
        let mut slot = self.slot();
        if slot.is_some() {
            return false;
        }
        *slot = Some(url);
        true
    }

    /// Forget the endpoint of a finished session.
    pub fn reset(&self) {
        self.slot().take();
    }
}

/// Line decoder for the event stream.
///
/// Oversized and non-UTF-8 lines are dropped and decoding resumes at the
/// next newline. Only I/O failures end the stream.
#[derive(Debug)]
pub struct StreamLines {
    inner: LinesCodec,
}

impl StreamLines {
    pub fn new(max_length: usize) -> Self {
        Self {
            inner: LinesCodec::new_with_max_length(max_length),
        }
    }

    /// `None` means the line was dropped and decoding should continue.
    fn recover(
        result: Result<Option<String>, LinesCodecError>,
    ) -> Option<io::Result<Option<String>>> {
        match result {
            Ok(line) => Some(Ok(line)),
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                debug!(name: "mcp.stream.oversized", "Dropping oversized line");
                None
            }
            Err(LinesCodecError::Io(e)) if e.kind() == io::ErrorKind::InvalidData => {
                debug!(name: "mcp.stream.invalid_utf8", "Dropping non UTF-8 line");
                None
            }
            Err(LinesCodecError::Io(e)) => Some(Err(e)),
        }
    }
}

impl Default for StreamLines {
    fn default() -> Self {
        Self::new(MAX_LINE_LENGTH)
    }
}

impl Decoder for StreamLines {
    type Item = String;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> io::Result<Option<String>> {
        // After a dropped line the inner codec discards up to the next
        // newline, so every retry consumes input.
        loop {
            if let Some(result) = Self::recover(self.inner.decode(src)) {
                return result;
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> io::Result<Option<String>> {
        loop {
            if let Some(result) = Self::recover(self.inner.decode_eof(src)) {
                return result;
            }
        }
    }
}

/// Routes classified frames into session state.
#[derive(Debug, Clone)]
pub struct FrameRouter {
    base_url: String,
    endpoint: Arc<EndpointSlot>,
    correlator: Arc<Correlator>,
}

impl FrameRouter {
    pub fn new(
        base_url: impl Into<String>,
        endpoint: Arc<EndpointSlot>,
        correlator: Arc<Correlator>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            endpoint,
            correlator,
        }
    }

    /// Handle one raw stream line. Never fails.
    pub fn route_line(&self, line: &str) {
        match classify_line(line) {
            Frame::Endpoint(path) => {
                let url = format!("{}{}", self.base_url, path);
                if self.endpoint.set(url.clone()) {
                    info!(name: "mcp.endpoint.discovered", endpoint = %url, "Session endpoint discovered");
                } else if let Some(current) = self.endpoint.get().filter(|c| *c != url) {
                    warn!(
                        name: "mcp.endpoint.reannounced",
                        current = %current,
                        announced = %url,
                        "Ignoring endpoint re-announcement"
                    );
                }
            }
            Frame::Response(env) => {
                let Some(id) = env.id else { return };
                if self.correlator.resolve(id, env) {
                    debug!(name: "mcp.response.routed", id, "Response routed");
                } else {
                    debug!(name: "mcp.response.unmatched", id, "Dropping response with no pending request");
                }
            }
            Frame::Done => trace!(name: "mcp.stream.done", "Stream sentinel received"),
            Frame::Ignored => {
                if !line.trim().is_empty() {
                    trace!(name: "mcp.stream.ignored", line = %line.trim(), "Dropping payload");
                }
            }
        }
    }
}

/// Body of the background listener task.
///
/// Runs until the stream ends or a connection error occurs; both are logged,
/// neither is propagated. Unreadable lines are skipped.
pub async fn run(transport: Arc<HttpTransport>, router: FrameRouter) {
    let url = transport.event_stream_url();
    let resp = match transport.open_event_stream().await {
        Ok(resp) => resp,
        Err(e) => {
            error!(name: "mcp.stream.connect_failed", url = %url, error = %e, "SSE error");
            return;
        }
    };
    info!(name: "mcp.stream.opened", url = %url, "Event stream opened");

    let bytes = resp.bytes_stream().map_err(std::io::Error::other);
    let lines = FramedRead::new(StreamReader::new(bytes), StreamLines::default());
    futures::pin_mut!(lines);

    while let Some(line) = lines.next().await {
        match line {
            Ok(line) => router.route_line(&line),
            Err(e) => {
                error!(name: "mcp.stream.read_failed", url = %url, error = %e, "SSE error");
                return;
            }
        }
    }

    warn!(name: "mcp.stream.ended", url = %url, "Event stream ended");
}
