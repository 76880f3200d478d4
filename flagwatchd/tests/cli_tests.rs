mod common;

use std::net::{SocketAddr, TcpListener};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use axum::{Json, Router, routing::post};
use serde_json::{Value, json};

use crate::common::{assert_contains, init_test_logging};

struct DaemonProcess(Child);

impl Drop for DaemonProcess {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

fn free_local_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    listener.local_addr().expect("local addr")
}

async fn start_fake_flipt() -> SocketAddr {
    let router = Router::new()
        .route(
            "/evaluate/v1/boolean",
            post(|| async { Json(json!({"enabled": true, "reason": "MATCH_EVALUATION_REASON"})) }),
        )
        .route(
            "/evaluate/v1/variant",
            post(|| async { Json(json!({"match": true, "variantKey": "#3366ff"})) }),
        );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

fn spawn_daemon(listen: SocketAddr, flipt_url: &str) -> DaemonProcess {
    let child = Command::new(env!("CARGO_BIN_EXE_flagwatchd"))
        .arg("--listen")
        .arg(listen.to_string())
        .env("FLIPT_URL", flipt_url)
        .env("FLIPT_TIMEOUT_MS", "500")
        .env("FLAGWATCH_LOG_LEVEL", "warn")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("Failed to start flagwatchd");
    DaemonProcess(child)
}

async fn fetch_status(listen: SocketAddr) -> Value {
    let client = reqwest::Client::new();
    let url = format!("http://{listen}/feature-status");
    for _ in 0..50 {
        if let Ok(resp) = client.get(&url).send().await {
            return resp.json().await.expect("status document is JSON");
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("flagwatchd never answered on {url}");
}

#[test]
fn test_flagwatchd_help_includes_usage() {
    init_test_logging();
    crate::test_log!("TEST START: test_flagwatchd_help_includes_usage");

    let output = Command::new(env!("CARGO_BIN_EXE_flagwatchd"))
        .arg("--help")
        .output()
        .expect("Failed to run flagwatchd --help");

    assert!(output.status.success(), "flagwatchd --help failed");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_contains(&stdout, "flagwatchd");
    assert_contains(&stdout, "--listen");
    assert_contains(&stdout, "--render");

    crate::test_log!("TEST PASS: test_flagwatchd_help_includes_usage");
}

#[test]
fn test_flagwatchd_rejects_unknown_render_mode() {
    init_test_logging();

    let output = Command::new(env!("CARGO_BIN_EXE_flagwatchd"))
        .args(["--render", "xml"])
        .output()
        .expect("Failed to run flagwatchd");

    assert!(!output.status.success());
}

#[tokio::test]
async fn test_flagwatchd_serves_status_from_flipt() {
    init_test_logging();
    crate::test_log!("TEST START: test_flagwatchd_serves_status_from_flipt");

    let flipt = start_fake_flipt().await;
    let listen = free_local_addr();
    let _daemon = spawn_daemon(listen, &format!("http://{flipt}"));

    let status = fetch_status(listen).await;
    assert_eq!(status["status"], "ENABLED");
    assert_eq!(status["color"], "green");
    assert_eq!(status["warning"], "");
    assert_eq!(status["boxColor"], "#3366ff");

    crate::test_log!("TEST PASS: test_flagwatchd_serves_status_from_flipt");
}

#[tokio::test]
async fn test_flagwatchd_reports_error_when_flipt_is_down() {
    init_test_logging();

    let dead_flipt = free_local_addr();
    let listen = free_local_addr();
    let _daemon = spawn_daemon(listen, &format!("http://{dead_flipt}"));

    let status = fetch_status(listen).await;
    assert_eq!(status["status"], "ERROR");
    assert_eq!(status["color"], "red");
    assert_eq!(status["boxColor"], "#888888");
    assert!(!status["warning"].as_str().unwrap().is_empty());
}
