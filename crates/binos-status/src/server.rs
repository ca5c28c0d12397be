//! [`StatusServer`] – HTTP + WebSocket status surface.
//!
//! Listens on `0.0.0.0:8080` (configurable via [`StatusServer::with_port`]).
//!
//! * Regular HTTP requests → routed to the status/command API.
//! * WebSocket upgrades → live snapshot push + command intake.
//!
//! The server owns nothing but a [`ControllerHandle`]; every reply is
//! rendered from an immutable snapshot, and every command is queued for the
//! controller's next tick.

use std::net::SocketAddr;

use binos_controller::ControllerHandle;
use binos_types::{BinError, BinState, CompartmentId, ManualCommand};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, info, warn};

/// Default TCP port for the status HTTP/WebSocket server.
pub const DEFAULT_PORT: u16 = 8080;

/// Landing page pointing clients at the API.
const INDEX_HTML: &str = "<html><body><h1>BinOS Status API</h1>\
<p>GET /api/status for the current snapshot; connect a WebSocket on this \
port for live updates.</p></body></html>";

/// Upper bound on a request head before the connection is dropped.
const MAX_REQUEST_BYTES: usize = 16 * 1024;

// ---------------------------------------------------------------------------
// StatusServer
// ---------------------------------------------------------------------------

/// Lightweight HTTP + WebSocket server rendering controller snapshots and
/// queuing manual commands.
///
/// # Example
///
/// ```rust,no_run
/// use binos_status::StatusServer;
/// # async fn doc(handle: binos_controller::ControllerHandle) {
/// StatusServer::new(handle)
///     .with_port(8081)
///     .run()
///     .await
///     .expect("status server failed");
/// # }
/// ```
pub struct StatusServer {
    handle: ControllerHandle,
    port: u16,
}

impl StatusServer {
    /// Create a server over `handle` on the [`DEFAULT_PORT`].
    pub fn new(handle: ControllerHandle) -> Self {
        Self {
            handle,
            port: DEFAULT_PORT,
        }
    }

    /// Override the listening port (builder-style).
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Return the configured port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Start the server.
    ///
    /// # Errors
    ///
    /// Returns [`BinError::Channel`] if the TCP listener cannot bind.
    pub async fn run(self) -> Result<(), BinError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            BinError::Channel(format!("[binos-status] bind error on {addr}: {e}"))
        })?;

        info!(port = self.port, "status surface listening");

        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let handle = self.handle.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, peer, handle).await {
                            warn!(%peer, error = %e, "client error");
                        }
                    });
                }
                Err(e) => {
                    warn!(error = %e, "accept error");
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Per-connection handler
// ---------------------------------------------------------------------------

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    handle: ControllerHandle,
) -> Result<(), BinError> {
    // Peek at the first bytes to decide whether to upgrade to WebSocket or
    // serve the HTTP API.  `peek` does not consume the data, so
    // tungstenite's handshaker sees the full HTTP request.
    let mut buf = [0u8; 1024];
    let n = stream
        .peek(&mut buf)
        .await
        .map_err(|e| BinError::Channel(format!("peek error from {peer}: {e}")))?;

    let header_preview = String::from_utf8_lossy(&buf[..n]);
    let is_ws_upgrade = header_preview.lines().any(|line| {
        line.to_lowercase().starts_with("upgrade:") && line.to_lowercase().contains("websocket")
    });

    if is_ws_upgrade {
        handle_ws(stream, peer, handle).await
    } else {
        handle_http(stream, handle).await
    }
}

// ---------------------------------------------------------------------------
// Plain HTTP: status + command API
// ---------------------------------------------------------------------------

struct HttpRequest {
    method: String,
    path: String,
    body: String,
}

async fn handle_http(mut stream: TcpStream, handle: ControllerHandle) -> Result<(), BinError> {
    let request = read_request(&mut stream).await?;
    debug!(method = %request.method, path = %request.path, "http request");

    let (status, content_type, body) = route(&request, &handle).await;
    let response = http_response(status, content_type, &body);
    stream
        .write_all(response.as_bytes())
        .await
        .map_err(|e| BinError::Channel(format!("HTTP write error: {e}")))?;
    Ok(())
}

async fn read_request(stream: &mut TcpStream) -> Result<HttpRequest, BinError> {
    let mut buf: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 1024];

    let header_end = loop {
        let n = stream
            .read(&mut chunk)
            .await
            .map_err(|e| BinError::Channel(format!("HTTP read error: {e}")))?;
        if n == 0 {
            return Err(BinError::Channel("connection closed mid-request".to_string()));
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = find_subslice(&buf, b"\r\n\r\n") {
            break pos + 4;
        }
        if buf.len() > MAX_REQUEST_BYTES {
            return Err(BinError::Channel("request head too large".to_string()));
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let content_length = head
        .lines()
        .find_map(|line| {
            let (key, value) = line.split_once(':')?;
            if key.eq_ignore_ascii_case("content-length") {
                value.trim().parse::<usize>().ok()
            } else {
                None
            }
        })
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = stream
            .read(&mut chunk)
            .await
            .map_err(|e| BinError::Channel(format!("HTTP read error: {e}")))?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let body_end = (header_end + content_length).min(buf.len());
    let body = String::from_utf8_lossy(&buf[header_end..body_end]).to_string();

    let request_line = head.lines().next().unwrap_or("");
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or("").to_string();
    let path = parts.next().unwrap_or("/").to_string();

    Ok(HttpRequest { method, path, body })
}

/// Resolve a request to `(status line, content type, body)`.
async fn route(
    request: &HttpRequest,
    handle: &ControllerHandle,
) -> (&'static str, &'static str, String) {
    // Routing ignores any query string.
    let path = request.path.split('?').next().unwrap_or("/");

    match (request.method.as_str(), path) {
        ("GET", "/") => ("200 OK", "text/html; charset=utf-8", INDEX_HTML.to_string()),

        ("GET", "/api/status") => match serde_json::to_string(&handle.status()) {
            Ok(json) => ("200 OK", "application/json", json),
            Err(e) => (
                "500 Internal Server Error",
                "application/json",
                json!({"status": "error", "message": e.to_string()}).to_string(),
            ),
        },

        ("POST", "/api/open") | ("POST", "/api/close") => {
            let opening = path == "/api/open";
            let Some(compartment) =
                form_param(&request.body, "bin").and_then(compartment_from_param)
            else {
                return (
                    "400 Bad Request",
                    "application/json",
                    json!({"status": "error", "message": "missing or invalid bin parameter"})
                        .to_string(),
                );
            };
            let command = if opening {
                ManualCommand::Open(compartment)
            } else {
                ManualCommand::Close(compartment)
            };
            match handle.submit(command).await {
                Ok(_) => (
                    "200 OK",
                    "application/json",
                    json!({
                        "status": if opening { "opened" } else { "closed" },
                        "bin": compartment.label(),
                    })
                    .to_string(),
                ),
                Err(BinError::Rejected(reason)) => (
                    "400 Bad Request",
                    "application/json",
                    json!({"status": "error", "reason": reason.code()}).to_string(),
                ),
                Err(e) => (
                    "500 Internal Server Error",
                    "application/json",
                    json!({"status": "error", "message": e.to_string()}).to_string(),
                ),
            }
        }

        ("POST", "/api/maintenance") => match handle.submit(ManualCommand::ToggleMaintenance).await
        {
            Ok(state) => (
                "200 OK",
                "application/json",
                json!({
                    "status": if state == BinState::Maintenance {
                        "maintenance_mode"
                    } else {
                        "normal_mode"
                    }
                })
                .to_string(),
            ),
            Err(e) => (
                "500 Internal Server Error",
                "application/json",
                json!({"status": "error", "message": e.to_string()}).to_string(),
            ),
        },

        _ => (
            "404 Not Found",
            "application/json",
            json!({"status": "error", "message": "not found"}).to_string(),
        ),
    }
}

fn http_response(status: &str, content_type: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {status}\r\n\
         Content-Type: {content_type}\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n\
         {body}",
        body.len()
    )
}

// ---------------------------------------------------------------------------
// WebSocket: live snapshots + command intake
// ---------------------------------------------------------------------------

async fn handle_ws(
    stream: TcpStream,
    peer: SocketAddr,
    handle: ControllerHandle,
) -> Result<(), BinError> {
    let ws_stream = accept_async(stream).await.map_err(|e| {
        BinError::Channel(format!("[binos-status] WS handshake from {peer}: {e}"))
    })?;

    let (mut ws_tx, mut ws_rx) = ws_stream.split();
    let mut status_rx = handle.watch();

    // Initial snapshot on connect.
    if let Ok(json) = serde_json::to_string(&handle.status()) {
        if ws_tx.send(Message::Text(json.into())).await.is_err() {
            return Ok(());
        }
    }

    loop {
        tokio::select! {
            // ── Downstream: snapshot changes → client ──────────────────────
            changed = status_rx.changed() => {
                match changed {
                    Ok(()) => {
                        let snapshot = *status_rx.borrow_and_update();
                        match serde_json::to_string(&snapshot) {
                            Ok(json) => {
                                if ws_tx.send(Message::Text(json.into())).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => {
                                warn!(error = %e, "snapshot serialization error");
                            }
                        }
                    }
                    // Controller shut down; nothing more to push.
                    Err(_) => break,
                }
            }
            // ── Upstream: client → controller ──────────────────────────────
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = handle_ws_message(text.as_str(), &handle).await {
                            if ws_tx.send(Message::Text(reply.into())).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Upstream message parsing
// ---------------------------------------------------------------------------

/// A recognized WebSocket command frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WsCommand {
    GetStatus,
    Manual(ManualCommand),
}

/// Parse an incoming WebSocket text frame.
///
/// Recognized commands:
///
/// | `command` | Effect |
/// |---|---|
/// | `get_status` | Replies with the current snapshot |
/// | `open_organic` / `open_non_organic` | Queues a manual open |
/// | `close_organic` / `close_non_organic` | Queues a manual close |
/// | `toggle_maintenance` | Queues the maintenance toggle |
///
/// Unknown or malformed frames are silently ignored.
pub(crate) fn parse_ws_command(text: &str) -> Option<WsCommand> {
    let json: serde_json::Value = serde_json::from_str(text).ok()?;
    match json.get("command")?.as_str()? {
        "get_status" => Some(WsCommand::GetStatus),
        "open_organic" => Some(WsCommand::Manual(ManualCommand::Open(CompartmentId::Organic))),
        "open_non_organic" => Some(WsCommand::Manual(ManualCommand::Open(
            CompartmentId::NonOrganic,
        ))),
        "close_organic" => Some(WsCommand::Manual(ManualCommand::Close(
            CompartmentId::Organic,
        ))),
        "close_non_organic" => Some(WsCommand::Manual(ManualCommand::Close(
            CompartmentId::NonOrganic,
        ))),
        "toggle_maintenance" => Some(WsCommand::Manual(ManualCommand::ToggleMaintenance)),
        _ => None,
    }
}

/// Handle one parsed frame, returning the reply to send (if any).
pub(crate) async fn handle_ws_message(text: &str, handle: &ControllerHandle) -> Option<String> {
    match parse_ws_command(text)? {
        WsCommand::GetStatus => serde_json::to_string(&handle.status()).ok(),
        WsCommand::Manual(command) => Some(match handle.submit(command).await {
            Ok(_) => json!({"status": "ok"}).to_string(),
            Err(BinError::Rejected(reason)) => {
                json!({"status": "error", "reason": reason.code()}).to_string()
            }
            Err(e) => json!({"status": "error", "message": e.to_string()}).to_string(),
        }),
    }
}

// ---------------------------------------------------------------------------
// Small helpers
// ---------------------------------------------------------------------------

fn form_param<'a>(body: &'a str, key: &str) -> Option<&'a str> {
    body.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        (k == key).then_some(v)
    })
}

fn compartment_from_param(value: &str) -> Option<CompartmentId> {
    match value {
        "organic" => Some(CompartmentId::Organic),
        "non_organic" => Some(CompartmentId::NonOrganic),
        _ => None,
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
