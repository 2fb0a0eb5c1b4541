//! Local HTTP control panel for mydock.
//!
//! A single-threaded `tiny_http` loop bound to the loopback interface. Every
//! `/_api/` route requires the `auth` query parameter to match the token kept
//! in the data directory; the token is handed to the browser in the URL
//! fragment printed at startup.
//!
//! The [`TestServer`] helper starts a panel on a random port for integration testing.

use mydock_core::Reconciler;
use rand::Rng;
use serde_json::json;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tiny_http::{Header, Method, Response, Server, StatusCode};
use tracing::{debug, error, info};

pub const DEFAULT_PORT: u16 = 8185;
const TOKEN_LEN: usize = 27;
const TOKEN_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";
const INDEX_HTML: &str = include_str!("../assets/index.html");

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {message}")]
    Bind { addr: String, message: String },
    #[error("token file error: {0}")]
    Io(#[from] std::io::Error),
}

/// Read the panel token from `path`, generating and storing a new one when
/// the file is missing or empty.
pub fn load_or_create_token(path: &Path) -> Result<String, ServerError> {
    if let Ok(text) = fs::read_to_string(path) {
        let token = text.trim();
        if !token.is_empty() {
            return Ok(token.to_owned());
        }
    }
    let mut rng = rand::rng();
    let token: String = (0..TOKEN_LEN)
        .map(|_| char::from(TOKEN_ALPHABET[rng.random_range(0..TOKEN_ALPHABET.len())]))
        .collect();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, &token)?;
    info!("generated control panel token in {}", path.display());
    Ok(token)
}

/// Address the browser should open.
pub fn panel_url(port: u16, token: &str) -> String {
    format!("http://localhost:{port}/#_auth_{token}")
}

/// What the server loop does after a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Shutdown,
}

/// Shared state of the control panel.
pub struct Panel {
    token: String,
    reconciler: Mutex<Reconciler>,
}

impl Panel {
    pub fn new(token: impl Into<String>, reconciler: Reconciler) -> Self {
        Self {
            token: token.into(),
            reconciler: Mutex::new(reconciler),
        }
    }

    fn authorized(&self, query: Option<&str>) -> bool {
        query_param(query, "auth") == Some(self.token.as_str())
    }

    fn status(&self) -> Result<serde_json::Value, String> {
        let mut reconciler = self
            .reconciler
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // Other tools may have changed the engine or the commands file.
        reconciler.reload().map_err(|e| e.to_string())?;
        let report = reconciler.status().map_err(|e| e.to_string())?;
        let report = serde_json::to_value(report).map_err(|e| e.to_string())?;
        Ok(json!({ "status": "OK", "report": report }))
    }
}

/// Split a request URL into its path and query.
pub fn split_url(url: &str) -> (&str, Option<&str>) {
    match url.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (url, None),
    }
}

/// Value of `key` in a `k=v&k=v` query string.
pub fn query_param<'a>(query: Option<&'a str>, key: &str) -> Option<&'a str> {
    query?
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v)
}

fn no_cache() -> Header {
    Header::from_bytes("Cache-Control", "no-store").expect("valid header")
}

fn respond_text(req: tiny_http::Request, code: u16, msg: &str) {
    let _ = req.respond(
        Response::from_string(msg)
            .with_status_code(StatusCode(code))
            .with_header(no_cache()),
    );
}

fn respond_json(req: tiny_http::Request, value: &serde_json::Value) {
    let header = Header::from_bytes("Content-Type", "application/json").expect("valid header");
    let _ = req.respond(
        Response::from_string(value.to_string())
            .with_header(header)
            .with_header(no_cache()),
    );
}

fn respond_html(req: tiny_http::Request) {
    let header =
        Header::from_bytes("Content-Type", "text/html; charset=utf-8").expect("valid header");
    let _ = req.respond(Response::from_string(INDEX_HTML).with_header(header));
}

/// Handle a single HTTP request.
pub fn handle_request(panel: &Panel, req: tiny_http::Request) -> Flow {
    let method = req.method().clone();
    let url = req.url().to_owned();
    let (path, query) = split_url(&url);
    debug!("{method} {path}");

    if method != Method::Get {
        respond_text(req, 405, "405 Method Not Allowed");
        return Flow::Continue;
    }

    match path {
        "/" | "/index.html" => respond_html(req),
        "/health" => respond_json(req, &json!({ "status": "ok" })),
        "/_api/status" | "/_api/shutdown" if !panel.authorized(query) => {
            respond_text(req, 403, "403 Forbidden\n\nInvalid authentication token.");
        }
        "/_api/status" => match panel.status() {
            Ok(body) => respond_json(req, &body),
            Err(message) => {
                error!("status request failed: {message}");
                respond_json(req, &json!({ "status": "ERROR", "message": message }));
            }
        },
        "/_api/shutdown" => {
            info!("shutdown requested");
            respond_json(req, &json!({ "status": "OK" }));
            return Flow::Shutdown;
        }
        _ => respond_text(req, 404, "404 Not Found"),
    }
    Flow::Continue
}

fn serve(server: &Server, panel: &Panel) {
    for request in server.incoming_requests() {
        if handle_request(panel, request) == Flow::Shutdown {
            break;
        }
    }
}

/// Serve `panel` on `127.0.0.1:<port>` until a shutdown request arrives.
pub fn run_server(panel: &Panel, port: u16) -> Result<(), ServerError> {
    let addr = format!("127.0.0.1:{port}");
    let server = Server::http(&addr).map_err(|e| ServerError::Bind {
        addr: addr.clone(),
        message: e.to_string(),
    })?;
    info!("control panel listening on {addr}");
    serve(&server, panel);
    Ok(())
}

/// A test helper that starts a control panel on a random port in a background thread.
///
/// Drop the `TestServer` to stop the server (via `Server::unblock`).
pub struct TestServer {
    pub url: String,
    pub port: u16,
    pub token: String,
    server: Arc<Server>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl TestServer {
    /// Start a panel whose token lives in the reconciler's data directory.
    /// Binds to `127.0.0.1:0` (random port).
    pub fn start(reconciler: Reconciler) -> Self {
        let token = load_or_create_token(&reconciler.settings().token_path())
            .expect("failed to create token");
        let server =
            Arc::new(Server::http("127.0.0.1:0").expect("failed to bind test HTTP server"));
        let port = server.server_addr().to_ip().expect("not an IP addr").port();
        let url = format!("http://127.0.0.1:{port}");

        let panel = Panel::new(token.clone(), reconciler);
        let srv = Arc::clone(&server);
        let handle = std::thread::spawn(move || serve(&srv, &panel));

        Self {
            url,
            port,
            token,
            server,
            handle: Some(handle),
        }
    }

    /// Whether the server loop has exited.
    pub fn is_finished(&self) -> bool {
        self.handle
            .as_ref()
            .is_none_or(std::thread::JoinHandle::is_finished)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
