//! End-to-end tests of the SSE MCP client against an in-process mock of the
//! HuskyLens MCP server.

use std::{
    convert::Infallible,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::{Duration, Instant},
};

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::sse::{Event, Sse},
    routing::{get, post},
};
use futures::{Stream, StreamExt};
use huskylens_mcp::mcp::{
    McpClientConfig, McpError, SessionState, SseMcpClient, ToolInvoker, extract_text,
};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

const SESSION: &str = "5f0c2b8e-9d41-4c7a-a1e3-0b6f2d9c8e71";
const SECOND_SESSION: &str = "a3d9e1f0-7b2c-4e85-9f14-6c0b8d2e4a97";

#[derive(Debug, Clone, Copy)]
enum Mode {
    /// Answer every tool call right away, with some noise first.
    Echo,
    /// Never answer tool calls.
    Silent,
    /// Hold tool responses until `n` arrived, then push them in reverse.
    Reverse(usize),
    /// Answer the first `initialize` with a JSON-RPC error.
    RejectInitialize,
    /// Never answer `initialize`.
    HoldInitialize,
}

struct Mock {
    mode: Mode,
    announce: bool,
    /// Sender of the most recent event stream.
    events: Mutex<Option<mpsc::UnboundedSender<String>>>,
    streams: AtomicUsize,
    initializes: AtomicUsize,
    posted: Mutex<Vec<Value>>,
    held: Mutex<Vec<Value>>,
}

impl Mock {
    fn push(&self, v: &Value) {
        self.push_raw(v.to_string());
    }

    fn push_raw(&self, data: impl Into<String>) {
        if let Some(events) = self.events.lock().unwrap().as_ref() {
            let _ = events.send(data.into());
        }
    }

    fn posted(&self) -> Vec<Value> {
        self.posted.lock().unwrap().clone()
    }
}

async fn sse_handler(
    State(mock): State<Arc<Mock>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (events, rx) = mpsc::unbounded_channel();
    *mock.events.lock().unwrap() = Some(events);
    let session = match mock.streams.fetch_add(1, Ordering::SeqCst) {
        0 => SESSION,
        _ => SECOND_SESSION,
    };
    let hello: Vec<Result<Event, Infallible>> = if mock.announce {
        vec![Ok(Event::default()
            .event("endpoint")
            .data(format!("/message?session_id={session}")))]
    } else {
        Vec::new()
    };
    let stream = futures::stream::iter(hello).chain(
        UnboundedReceiverStream::new(rx).map(|data| Ok(Event::default().data(data))),
    );
    Sse::new(stream)
}

fn tool_reply(id: &Value, params: &Value) -> Value {
    let op = params["arguments"]["operation"].as_str().unwrap_or_default();
    let text = match op {
        "application_list" => "FaceRecognition,ObjectTracking".to_string(),
        other => format!("{}:{other}", params["name"].as_str().unwrap_or_default()),
    };
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": {"content": [{"type": "text", "text": text}], "isError": false}
    })
}

async fn message_handler(
    State(mock): State<Arc<Mock>>,
    Json(body): Json<Value>,
) -> (StatusCode, &'static str) {
    mock.posted.lock().unwrap().push(body.clone());
    let Some(id) = body.get("id").cloned() else {
        return (StatusCode::ACCEPTED, "Accepted");
    };

    if body["method"] == "initialize" {
        let first = mock.initializes.fetch_add(1, Ordering::SeqCst) == 0;
        if matches!(mock.mode, Mode::HoldInitialize) {
            return (StatusCode::ACCEPTED, "Accepted");
        }
        let reply = if first && matches!(mock.mode, Mode::RejectInitialize) {
            json!({"jsonrpc": "2.0", "id": id, "error": {"code": -32602, "message": "unsupported protocol version"}})
        } else {
            json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {
                    "protocolVersion": "2024-11-05",
                    "capabilities": {"tools": {}},
                    "serverInfo": {"name": "HuskyLens", "version": "2.0"}
                }
            })
        };
        mock.push(&reply);
        return (StatusCode::ACCEPTED, "Accepted");
    }

    let reply = tool_reply(&id, &body["params"]);
    match mock.mode {
        Mode::Echo | Mode::RejectInitialize | Mode::HoldInitialize => {
            mock.push_raw("{broken json");
            mock.push(&json!({"jsonrpc": "2.0", "id": 999, "result": {}}));
            mock.push_raw("[DONE]");
            mock.push(&reply);
        }
        Mode::Silent => {}
        Mode::Reverse(n) => {
            let mut held = mock.held.lock().unwrap();
            held.push(reply);
            if held.len() == n {
                for r in held.drain(..).rev() {
                    mock.push(&r);
                }
            }
        }
    }
    (StatusCode::ACCEPTED, "Accepted")
}

async fn start_mock(mode: Mode, announce: bool) -> (String, Arc<Mock>) {
    let mock = Arc::new(Mock {
        mode,
        announce,
        events: Mutex::new(None),
        streams: AtomicUsize::new(0),
        initializes: AtomicUsize::new(0),
        posted: Mutex::new(Vec::new()),
        held: Mutex::new(Vec::new()),
    });

    let app = Router::new()
        .route("/sse", get(sse_handler))
        .route("/message", post(message_handler))
        .with_state(Arc::clone(&mock));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), mock)
}

fn client_for(url: &str, request_timeout: Duration) -> SseMcpClient {
    let mut config = McpClientConfig::new(url);
    config.request_timeout = request_timeout;
    config.discovery_attempts = 50;
    config.discovery_interval = Duration::from_millis(20);
    SseMcpClient::new(config).unwrap()
}

#[tokio::test]
async fn test_connect_and_list_applications() {
    let (url, mock) = start_mock(Mode::Echo, true).await;
    let client = client_for(&url, Duration::from_secs(5));

    client.connect().await.expect("connect");
    assert_eq!(client.state(), SessionState::Ready);
    assert_eq!(
        client.endpoint(),
        Some(format!("{url}/message?session_id={SESSION}"))
    );

    let resp = client
        .call_tool("manage_applications", json!({"operation": "application_list"}))
        .await
        .unwrap();
    assert_eq!(resp.id, Some(1));
    assert_eq!(extract_text(&resp), "FaceRecognition,ObjectTracking");

    let posted = mock.posted();
    assert_eq!(posted.len(), 3);
    assert_eq!(posted[0]["method"], "initialize");
    assert_eq!(posted[0]["params"]["protocolVersion"], "2024-11-05");
    assert_eq!(posted[0]["params"]["clientInfo"]["name"], "huskylens-mcp");
    assert_eq!(
        posted[1],
        json!({"jsonrpc": "2.0", "method": "notifications/initialized", "params": {}})
    );
    assert_eq!(
        posted[2],
        json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/call",
            "params": {"name": "manage_applications", "arguments": {"operation": "application_list"}}
        })
    );

    client.close().await;
}

#[tokio::test]
async fn test_out_of_order_responses_are_routed_by_id() {
    let (url, _mock) = start_mock(Mode::Reverse(3), true).await;
    let client = client_for(&url, Duration::from_secs(5));
    client.connect().await.unwrap();

    let (list, current, photo) = tokio::join!(
        client.call_tool("manage_applications", json!({"operation": "application_list"})),
        client.call_tool("manage_applications", json!({"operation": "current_application"})),
        client.call_tool("multimedia_control", json!({"operation": "take_photo"})),
    );

    assert_eq!(
        extract_text(&list.unwrap()),
        "FaceRecognition,ObjectTracking"
    );
    assert_eq!(
        extract_text(&current.unwrap()),
        "manage_applications:current_application"
    );
    assert_eq!(
        extract_text(&photo.unwrap()),
        "multimedia_control:take_photo"
    );

    client.close().await;
}

#[tokio::test]
async fn test_unanswered_call_times_out_as_error_result() {
    let (url, _mock) = start_mock(Mode::Silent, true).await;
    let timeout = Duration::from_millis(300);
    let client = client_for(&url, timeout);
    client.connect().await.unwrap();

    let started = Instant::now();
    let resp = client
        .call_tool("get_recognition_result", json!({"operation": "get_result"}))
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert!(elapsed >= timeout, "returned after {elapsed:?}");
    assert!(elapsed < Duration::from_secs(3), "returned after {elapsed:?}");
    assert!(resp.is_error());
    assert!(resp.error_message().unwrap().contains("timed out"));
    assert_eq!(extract_text(&resp), "");

    // The session keeps working after a timeout.
    assert!(client.is_ready());
    client.close().await;
}

#[tokio::test]
async fn test_missing_endpoint_fails_connect() {
    let (url, mock) = start_mock(Mode::Echo, false).await;
    let mut config = McpClientConfig::new(url);
    config.discovery_attempts = 5;
    config.discovery_interval = Duration::from_millis(20);
    let client = SseMcpClient::new(config).unwrap();

    let err = client.connect().await.unwrap_err();
    assert!(matches!(err, McpError::EndpointDiscovery { attempts: 5 }));
    assert!(!client.listener_running());
    assert!(mock.posted().is_empty());

    let err = client
        .call_tool("manage_applications", json!({"operation": "application_list"}))
        .await
        .unwrap_err();
    assert!(matches!(err, McpError::NotConnected));
    client.close().await;
}

#[tokio::test]
async fn test_rejected_initialize_fails_handshake() {
    let (url, mock) = start_mock(Mode::RejectInitialize, true).await;
    let client = client_for(&url, Duration::from_secs(5));

    let err = client.connect().await.unwrap_err();
    let McpError::Handshake(msg) = err else {
        panic!("expected handshake error, got {err:?}");
    };
    assert!(msg.contains("unsupported protocol version"));
    assert_eq!(client.state(), SessionState::Disconnected);
    assert_eq!(client.endpoint(), None);
    assert!(!client.listener_running());
    // No `initialized` notification after a failed initialize.
    assert_eq!(mock.posted().len(), 1);
    client.close().await;
}

#[tokio::test]
async fn test_reconnect_after_failed_handshake_uses_new_session() {
    let (url, mock) = start_mock(Mode::RejectInitialize, true).await;
    let client = client_for(&url, Duration::from_secs(5));

    assert!(matches!(
        client.connect().await,
        Err(McpError::Handshake(_))
    ));

    client.connect().await.expect("second connect");
    assert_eq!(client.state(), SessionState::Ready);
    assert_eq!(
        client.endpoint(),
        Some(format!("{url}/message?session_id={SECOND_SESSION}"))
    );

    let resp = client
        .call_tool("manage_applications", json!({"operation": "application_list"}))
        .await
        .unwrap();
    assert_eq!(extract_text(&resp), "FaceRecognition,ObjectTracking");

    let methods: Vec<Value> = mock.posted().iter().map(|p| p["method"].clone()).collect();
    assert_eq!(
        methods,
        vec![
            json!("initialize"),
            json!("initialize"),
            json!("notifications/initialized"),
            json!("tools/call"),
        ]
    );
    client.close().await;
}

#[tokio::test]
async fn test_call_during_handshake_is_not_sent() {
    let (url, mock) = start_mock(Mode::HoldInitialize, true).await;
    let client = client_for(&url, Duration::from_secs(5));

    let during_handshake = async {
        while client.state() != SessionState::Handshaking || mock.posted().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let err = client
            .call_tool("manage_applications", json!({"operation": "application_list"}))
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::NotConnected));

        let posted = mock.posted();
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0]["method"], "initialize");
        client.close().await;
    };

    let (connected, ()) = tokio::time::timeout(
        Duration::from_secs(3),
        async { tokio::join!(client.connect(), during_handshake) },
    )
    .await
    .expect("handshake check finished");
    assert!(connected.is_err());
    assert_eq!(client.state(), SessionState::Closed);
}

#[tokio::test]
async fn test_oversized_frame_does_not_stop_listener() {
    let (url, mock) = start_mock(Mode::Echo, true).await;
    let client = client_for(&url, Duration::from_secs(5));
    client.connect().await.unwrap();

    // Longer than the listener's line limit.
    let blob = "x".repeat(1_100_000);
    mock.push_raw(format!(r#"{{"jsonrpc":"2.0","blob":"{blob}"}}"#));

    let resp = client
        .call_tool("manage_applications", json!({"operation": "application_list"}))
        .await
        .unwrap();
    assert_eq!(extract_text(&resp), "FaceRecognition,ObjectTracking");
    assert!(client.listener_running());
    client.close().await;
}

#[tokio::test]
async fn test_close_is_idempotent_and_stops_listener() {
    let (url, _mock) = start_mock(Mode::Echo, true).await;
    let client = client_for(&url, Duration::from_secs(5));
    client.connect().await.unwrap();
    assert!(client.listener_running());

    client.close().await;
    client.close().await;
    assert_eq!(client.state(), SessionState::Closed);
    assert!(!client.listener_running());

    let err = client
        .call_tool("manage_applications", json!({"operation": "application_list"}))
        .await
        .unwrap_err();
    assert!(matches!(err, McpError::Closed));
}

#[tokio::test]
async fn test_connect_twice_is_rejected() {
    let (url, _mock) = start_mock(Mode::Echo, true).await;
    let client = client_for(&url, Duration::from_secs(5));
    client.connect().await.unwrap();
    assert!(matches!(
        client.connect().await,
        Err(McpError::AlreadyConnected)
    ));
    client.close().await;
}
