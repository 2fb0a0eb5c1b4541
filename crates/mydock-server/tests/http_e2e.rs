//! Control panel tests against a real server on a random port.

use mydock_core::{AssumeYes, Reconciler, Settings};
use mydock_runtime::{MemorySourceTree, MockEngine};
use mydock_server::TestServer;
use std::io::Read;
use std::time::{Duration, Instant};

fn start_server() -> (TestServer, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("dev.Dockerfile"), "FROM alpine\n").unwrap();
    let config = dir.path().join("commands.yaml");
    std::fs::write(&config, "dev:\n  dockerfile: dev.Dockerfile\n").unwrap();
    let settings = Settings::new(&config, dir.path().join("data"));
    let reconciler = Reconciler::new(
        settings,
        Box::new(MockEngine::new()),
        Box::new(MemorySourceTree::new(dir.path())),
        Box::new(AssumeYes),
    )
    .unwrap();
    (TestServer::start(reconciler), dir)
}

/// Status code and body, or the status code of a rejected request.
fn get(url: &str) -> Result<(u16, String), u16> {
    match ureq::get(url).call() {
        Ok(resp) => {
            let code = resp.status().as_u16();
            let mut body = String::new();
            resp.into_body()
                .into_reader()
                .read_to_string(&mut body)
                .unwrap();
            Ok((code, body))
        }
        Err(ureq::Error::StatusCode(code)) => Err(code),
        Err(e) => panic!("request to {url} failed: {e}"),
    }
}

fn get_json(url: &str) -> serde_json::Value {
    let (code, body) = get(url).unwrap();
    assert_eq!(code, 200);
    serde_json::from_str(&body).unwrap()
}

#[test]
fn health_needs_no_token() {
    let (server, _dir) = start_server();
    let body = get_json(&format!("{}/health", server.url));
    assert_eq!(body["status"], "ok");
}

#[test]
fn status_reports_commands() {
    let (server, _dir) = start_server();
    let body = get_json(&format!("{}/_api/status?auth={}", server.url, server.token));
    assert_eq!(body["status"], "OK");
    let commands = body["report"]["commands"].as_array().unwrap();
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0]["name"], "dev");
    assert_eq!(commands[0]["freshness"], "deleted");
    assert!(commands[0]["container"].is_null());
}

#[test]
fn api_rejects_bad_tokens() {
    let (server, _dir) = start_server();
    assert_eq!(
        get(&format!("{}/_api/status?auth=wrong", server.url)).unwrap_err(),
        403
    );
    assert_eq!(get(&format!("{}/_api/status", server.url)).unwrap_err(), 403);
    assert_eq!(get(&format!("{}/_api/shutdown", server.url)).unwrap_err(), 403);
    assert!(!server.is_finished());
}

#[test]
fn unknown_route_is_404() {
    let (server, _dir) = start_server();
    assert_eq!(get(&format!("{}/nope", server.url)).unwrap_err(), 404);
}

#[test]
fn non_get_is_405() {
    let (server, _dir) = start_server();
    let result = ureq::post(&format!("{}/health", server.url)).send_empty();
    assert!(matches!(result, Err(ureq::Error::StatusCode(405))));
}

#[test]
fn broken_config_is_reported_as_error_payload() {
    let (server, dir) = start_server();
    std::fs::write(dir.path().join("commands.yaml"), "dev: [unclosed\n").unwrap();
    let body = get_json(&format!("{}/_api/status?auth={}", server.url, server.token));
    assert_eq!(body["status"], "ERROR");
    assert!(body["message"].as_str().unwrap().contains("commands file"));
}

#[test]
fn token_is_persisted_in_data_dir() {
    let (server, dir) = start_server();
    let stored = std::fs::read_to_string(dir.path().join("data").join("private-key.txt")).unwrap();
    assert_eq!(stored, server.token);
    assert_eq!(server.token.len(), 27);
}

#[test]
fn index_page_is_served() {
    let (server, _dir) = start_server();
    let (code, body) = get(&format!("{}/", server.url)).unwrap();
    assert_eq!(code, 200);
    assert!(body.contains("/_api/status"));
}

#[test]
fn shutdown_stops_the_loop() {
    let (server, _dir) = start_server();
    let body = get_json(&format!("{}/_api/shutdown?auth={}", server.url, server.token));
    assert_eq!(body["status"], "OK");

    let deadline = Instant::now() + Duration::from_secs(5);
    while !server.is_finished() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(20));
    }
    assert!(server.is_finished());
}
