//! Message routing, defaults and error codes.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use guardian::actions::{CommandLimits, HttpError, HttpRequest, HttpResponse, HttpTransport};
use guardian::config::GuardianConfig;
use guardian::decision::DecisionJournal;
use guardian::guard::Guardian;
use guardian::ipc::Dispatcher;

struct EchoTransport;

#[async_trait]
impl HttpTransport for EchoTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, HttpError> {
        Ok(HttpResponse {
            status: 204,
            headers: BTreeMap::new(),
            body: format!("{} {}", request.method, request.url),
        })
    }
}

fn dispatcher(dir: &Path) -> Dispatcher {
    let mut config = GuardianConfig {
        enabled: true,
        ..GuardianConfig::default()
    };
    config.paths.journal = dir.join("journal.jsonl");
    config.paths.last_resort = dir.join("last-resort.jsonl");
    Dispatcher::new(
        Guardian::from_config(&config),
        CommandLimits::default(),
        Arc::new(EchoTransport),
    )
}

fn entries(dir: &Path) -> Vec<serde_json::Value> {
    DecisionJournal::new(dir.join("journal.jsonl"))
        .entries()
        .expect("entries")
}

#[tokio::test]
async fn request_errors_exit_with_code_two() {
    let tmp = tempfile::tempdir().expect("temp dir");
    let dispatcher = dispatcher(tmp.path());

    let cases = [
        ("   ", "empty_input"),
        ("{nope", "invalid_json"),
        (r#"{"task_id": "x"}"#, "missing_type"),
        (r#"{"type": "teleport"}"#, "unknown_type"),
        (r#"{"type": "command_exec"}"#, "missing_command"),
        (r#"{"type": "file_write", "content": "x"}"#, "missing_path"),
        (r#"{"type": "file_delete"}"#, "missing_path"),
        (r#"{"type": "json_write", "data": {}}"#, "missing_path"),
        (r#"{"type": "http_request", "request": {}}"#, "missing_url"),
    ];
    for (raw, code) in cases {
        let reply = dispatcher.handle(raw).await;
        assert_eq!(reply.exit_code, 2, "{raw}");
        assert_eq!(reply.body["ok"], false, "{raw}");
        assert_eq!(reply.body["error"], code, "{raw}");
    }
    assert!(entries(tmp.path()).is_empty());
}

#[tokio::test]
async fn ping_reports_status() {
    let tmp = tempfile::tempdir().expect("temp dir");
    let reply = dispatcher(tmp.path()).handle(r#"{"type": "ping"}"#).await;
    assert_eq!(reply.exit_code, 0);
    assert_eq!(reply.body["ok"], true);
    assert_eq!(reply.body["status"]["backend"], "standalone");
    assert_eq!(reply.body["status"]["enabled"], true);
}

#[tokio::test]
async fn file_write_uses_default_task_and_lane() {
    let tmp = tempfile::tempdir().expect("temp dir");
    let target = tmp.path().join("notes/a.txt");
    let message = json!({ "type": "file_write", "path": target, "content": "abc" });

    let reply = dispatcher(tmp.path()).handle(&message.to_string()).await;

    assert_eq!(reply.exit_code, 0);
    assert_eq!(reply.body["task_id"], "unknown");
    assert_eq!(reply.body["lane"], "main");
    assert_eq!(reply.body["result"]["bytes"], 3);
    assert_eq!(reply.body["audit"]["state"], "journaled");
    assert_eq!(entries(tmp.path())[0]["metadata"]["exists"], true);
}

#[tokio::test]
async fn command_failure_is_a_normal_reply() {
    let tmp = tempfile::tempdir().expect("temp dir");
    let message = json!({ "type": "command_exec", "task_id": "job-7", "lane": "ops", "command": "exit 3" });

    let reply = dispatcher(tmp.path()).handle(&message.to_string()).await;

    assert_eq!(reply.exit_code, 0);
    assert_eq!(reply.body["result"]["returncode"], 3);
    let journaled = entries(tmp.path());
    assert_eq!(journaled[0]["task_id"], "job-7");
    assert_eq!(journaled[0]["lane"], "ops");
    assert_eq!(journaled[0]["validation_tier"], "fail");
}

#[tokio::test]
async fn operation_error_replies_exception() {
    let tmp = tempfile::tempdir().expect("temp dir");
    let message = json!({ "type": "file_delete", "path": tmp.path().join("absent") });

    let reply = dispatcher(tmp.path()).handle(&message.to_string()).await;

    assert_eq!(reply.exit_code, 1);
    assert_eq!(reply.body["error"], "exception");
    assert!(reply.body["detail"].is_string());
    assert_eq!(entries(tmp.path())[0]["result"], "fail");
}

#[tokio::test]
async fn json_write_and_http_request_round_through_wrappers() {
    let tmp = tempfile::tempdir().expect("temp dir");
    let dispatcher = dispatcher(tmp.path());

    let write = json!({ "type": "json_write", "path": tmp.path().join("d.json"), "data": { "k": 1 } });
    let reply = dispatcher.handle(&write.to_string()).await;
    assert_eq!(reply.exit_code, 0);
    assert_eq!(reply.body["result"]["written"], true);

    let http = json!({
        "type": "http_request",
        "request": { "method": "delete", "url": "https://example.com/items/1" },
    });
    let reply = dispatcher.handle(&http.to_string()).await;
    assert_eq!(reply.exit_code, 0);
    assert_eq!(reply.body["result"]["status"], 204);

    let journaled = entries(tmp.path());
    assert_eq!(journaled.len(), 2);
    assert_eq!(journaled[1]["action_type"], "http_request");
    assert_eq!(journaled[1]["validation_tier"], "success");
    assert_eq!(journaled[1]["metadata"]["method"], "DELETE");
}
