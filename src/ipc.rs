//! JSON message front end.
//!
//! One request object in, one reply object out. Every reply carries `ok`;
//! failures carry a machine-readable `error` code. Request problems exit
//! with code 2, failures of the wrapped operation with code 1.

use std::fmt::Display;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::debug;

use crate::actions::{
    remove_file, wrap_command_exec_with, wrap_file_delete, wrap_file_write, wrap_http_request,
    wrap_json_write, write_text, CommandLimits, HttpRequest, HttpTransport,
};
use crate::executor::{DirectExecutor, ExecResult};
use crate::guard::{Guarded, Guardian};

/// Statuses an `http_request` message expects when it names none.
pub const DEFAULT_EXPECTED_STATUSES: [u16; 4] = [200, 201, 202, 204];

/// Characters of unparseable input echoed back in an `invalid_json` reply.
const RAW_ECHO_CHARS: usize = 500;

/// Problems with the request itself, before any action runs.
#[derive(Debug, thiserror::Error)]
pub enum IpcError {
    /// Input was empty or whitespace.
    #[error("empty input")]
    EmptyInput,
    /// Input was not a JSON object.
    #[error("invalid JSON: {detail}")]
    InvalidJson {
        /// Parser message.
        detail: String,
        /// Leading part of the raw input.
        raw: String,
    },
    /// The `type` field was absent or empty.
    #[error("missing message type")]
    MissingType,
    /// The `type` field named no known message.
    #[error("unknown message type: {0}")]
    UnknownType(String),
    /// A field the message type requires was absent.
    #[error("{msg_type}: {code}")]
    MissingField {
        /// Message type.
        msg_type: String,
        /// Error code naming the field.
        code: &'static str,
    },
}

impl IpcError {
    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptyInput => "empty_input",
            Self::InvalidJson { .. } => "invalid_json",
            Self::MissingType => "missing_type",
            Self::UnknownType(_) => "unknown_type",
            Self::MissingField { code, .. } => *code,
        }
    }

    fn into_reply(self) -> Reply {
        let mut body = Map::new();
        body.insert("ok".to_owned(), Value::Bool(false));
        body.insert("error".to_owned(), Value::String(self.code().to_owned()));
        match self {
            Self::InvalidJson { detail, raw } => {
                body.insert("detail".to_owned(), Value::String(detail));
                body.insert("raw".to_owned(), Value::String(raw));
            }
            Self::UnknownType(msg_type) | Self::MissingField { msg_type, .. } => {
                body.insert("type".to_owned(), Value::String(msg_type));
            }
            Self::EmptyInput | Self::MissingType => {}
        }
        Reply {
            body: Value::Object(body),
            exit_code: 2,
        }
    }
}

/// A reply and the process exit code that goes with it.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    /// JSON reply object.
    pub body: Value,
    /// `0` ok, `1` operation failure, `2` bad request.
    pub exit_code: i32,
}

/// Identity of the message being handled.
struct Envelope {
    msg_type: String,
    task_id: String,
    lane: String,
}

impl Envelope {
    fn success(&self, result: Value, audit: Value) -> Reply {
        Reply {
            body: json!({
                "ok": true,
                "type": self.msg_type,
                "task_id": self.task_id,
                "lane": self.lane,
                "result": result,
                "audit": audit,
            }),
            exit_code: 0,
        }
    }

    fn exception(&self, detail: String, audit: Value) -> Reply {
        Reply {
            body: json!({
                "ok": false,
                "type": self.msg_type,
                "task_id": self.task_id,
                "lane": self.lane,
                "error": "exception",
                "detail": detail,
                "audit": audit,
            }),
            exit_code: 1,
        }
    }

    fn missing(&self, code: &'static str) -> IpcError {
        IpcError::MissingField {
            msg_type: self.msg_type.clone(),
            code,
        }
    }

    /// Render a guarded outcome as a reply.
    fn settle<T, E: Display>(&self, guarded: Guarded<T, E>, render: impl FnOnce(T) -> Value) -> Reply {
        let (outcome, audit) = guarded.into_parts();
        let audit = json!(audit);
        match outcome {
            Ok(value) => self.success(render(value), audit),
            Err(e) => self.exception(e.to_string(), audit),
        }
    }
}

/// Routes messages to the action wrappers.
pub struct Dispatcher {
    guardian: Guardian,
    limits: CommandLimits,
    http: Arc<dyn HttpTransport>,
}

impl Dispatcher {
    /// Build a dispatcher over an explicit membrane and transport.
    pub fn new(guardian: Guardian, limits: CommandLimits, http: Arc<dyn HttpTransport>) -> Self {
        Self {
            guardian,
            limits,
            http,
        }
    }

    /// Handle one raw message.
    pub async fn handle(&self, raw: &str) -> Reply {
        match self.dispatch(raw).await {
            Ok(reply) => reply,
            Err(e) => {
                debug!(code = e.code(), error = %e, "rejected message");
                e.into_reply()
            }
        }
    }

    async fn dispatch(&self, raw: &str) -> Result<Reply, IpcError> {
        if raw.trim().is_empty() {
            return Err(IpcError::EmptyInput);
        }
        let message: Map<String, Value> =
            serde_json::from_str(raw).map_err(|e| IpcError::InvalidJson {
                detail: e.to_string(),
                raw: raw.chars().take(RAW_ECHO_CHARS).collect(),
            })?;

        let msg_type = str_field(&message, "type")
            .filter(|t| !t.is_empty())
            .ok_or(IpcError::MissingType)?;
        let envelope = Envelope {
            msg_type: msg_type.to_owned(),
            task_id: str_field(&message, "task_id").unwrap_or("unknown").to_owned(),
            lane: str_field(&message, "lane").unwrap_or("main").to_owned(),
        };
        debug!(
            msg_type = %envelope.msg_type,
            task_id = %envelope.task_id,
            lane = %envelope.lane,
            "dispatching message"
        );

        match msg_type {
            "ping" => Ok(Reply {
                body: json!({ "ok": true, "type": "ping", "status": self.guardian.status() }),
                exit_code: 0,
            }),
            "command_exec" => self.command_exec(&envelope, &message).await,
            "file_write" => self.file_write(&envelope, &message).await,
            "file_delete" => self.file_delete(&envelope, &message).await,
            "json_write" => self.json_write(&envelope, &message).await,
            "http_request" => self.http_request(&envelope, &message).await,
            other => Err(IpcError::UnknownType(other.to_owned())),
        }
    }

    async fn command_exec(
        &self,
        envelope: &Envelope,
        message: &Map<String, Value>,
    ) -> Result<Reply, IpcError> {
        let command = str_field(message, "command")
            .filter(|c| !c.is_empty())
            .ok_or_else(|| envelope.missing("missing_command"))?;
        let guarded = wrap_command_exec_with(
            &self.guardian,
            &DirectExecutor::new(),
            &self.limits,
            &envelope.task_id,
            &envelope.lane,
            command,
        )
        .await;
        Ok(envelope.settle(guarded, |result: ExecResult| {
            json!({
                "args": result.command,
                "returncode": result.exit_code,
                "stdout": result.stdout,
                "stderr": result.stderr,
                "timed_out": result.timed_out,
            })
        }))
    }

    async fn file_write(
        &self,
        envelope: &Envelope,
        message: &Map<String, Value>,
    ) -> Result<Reply, IpcError> {
        let path = path_field(envelope, message)?;
        let content = str_field(message, "content").unwrap_or_default();
        let guarded = wrap_file_write(
            &self.guardian,
            &envelope.task_id,
            &envelope.lane,
            &path,
            content,
            write_text,
        )
        .await;
        Ok(envelope.settle(guarded, |receipt| json!(receipt)))
    }

    async fn file_delete(
        &self,
        envelope: &Envelope,
        message: &Map<String, Value>,
    ) -> Result<Reply, IpcError> {
        let path = path_field(envelope, message)?;
        let guarded = wrap_file_delete(
            &self.guardian,
            &envelope.task_id,
            &envelope.lane,
            &path,
            remove_file,
        )
        .await;
        Ok(envelope.settle(guarded, |()| {
            json!({ "deleted": true, "path": path.display().to_string() })
        }))
    }

    async fn json_write(
        &self,
        envelope: &Envelope,
        message: &Map<String, Value>,
    ) -> Result<Reply, IpcError> {
        let path = path_field(envelope, message)?;
        let data = message.get("data").cloned().unwrap_or(Value::Null);
        let guarded = wrap_json_write(
            &self.guardian,
            &envelope.task_id,
            &envelope.lane,
            &path,
            &data,
            write_text,
        )
        .await;
        Ok(envelope.settle(guarded, |written: PathBuf| {
            json!({ "written": true, "path": written.display().to_string() })
        }))
    }

    async fn http_request(
        &self,
        envelope: &Envelope,
        message: &Map<String, Value>,
    ) -> Result<Reply, IpcError> {
        let request_value = message
            .get("request")
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()));
        let has_url = request_value
            .get("url")
            .and_then(Value::as_str)
            .is_some_and(|u| !u.is_empty());
        if !has_url {
            return Err(envelope.missing("missing_url"));
        }
        let request: HttpRequest =
            serde_json::from_value(request_value).map_err(|e| IpcError::InvalidJson {
                detail: e.to_string(),
                raw: String::new(),
            })?;
        let expected: Vec<u16> = message
            .get("expected_statuses")
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .filter_map(Value::as_u64)
                    .filter_map(|s| u16::try_from(s).ok())
                    .collect()
            })
            .unwrap_or_else(|| DEFAULT_EXPECTED_STATUSES.to_vec());

        let guarded = wrap_http_request(
            &self.guardian,
            self.http.as_ref(),
            &envelope.task_id,
            &envelope.lane,
            &request,
            &expected,
        )
        .await;
        Ok(envelope.settle(guarded, |response| json!(response)))
    }
}

fn str_field<'a>(message: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    message.get(key).and_then(Value::as_str)
}

fn path_field(envelope: &Envelope, message: &Map<String, Value>) -> Result<PathBuf, IpcError> {
    str_field(message, "path")
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .ok_or_else(|| envelope.missing("missing_path"))
}
