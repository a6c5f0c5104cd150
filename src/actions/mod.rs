//! Per-action wrappers around the membrane.
//!
//! Each wrapper fixes an action type and a prior confidence, runs the
//! caller's operation as `perform`, and independently re-checks the
//! real-world effect as `validate` rather than trusting the operation's
//! return value.

use std::fmt;

pub mod command;
pub mod file;
pub mod http;
pub mod json;

pub use command::{wrap_command_exec, wrap_command_exec_with, CommandLimits};
pub use file::{remove_file, wrap_file_delete, wrap_file_write, write_text, WriteReceipt};
pub use http::{wrap_http_request, HttpError, HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
pub use json::wrap_json_write;

/// High-risk action types recognized by the wrappers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionType {
    /// Writing a file.
    FileWrite,
    /// Deleting a file.
    FileDelete,
    /// Running a shell command.
    CommandExec,
    /// Writing a JSON document.
    JsonWrite,
    /// Sending an outbound HTTP request.
    HttpRequest,
}

impl ActionType {
    /// Every action type, in allowlist order.
    pub const ALL: [ActionType; 5] = [
        Self::FileWrite,
        Self::FileDelete,
        Self::CommandExec,
        Self::JsonWrite,
        Self::HttpRequest,
    ];

    /// Wire name used in records and the allowlist.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FileWrite => "file_write",
            Self::FileDelete => "file_delete",
            Self::CommandExec => "command_exec",
            Self::JsonWrite => "json_write",
            Self::HttpRequest => "http_request",
        }
    }

    /// Prior confidence the wrapper records for this action.
    pub fn confidence_pre(self) -> f64 {
        match self {
            Self::FileWrite => 0.8,
            Self::FileDelete => 0.85,
            Self::CommandExec => 0.7,
            Self::JsonWrite => 0.82,
            Self::HttpRequest => 0.75,
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keep at most `max_chars` characters of `text`.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_owned(),
        None => text.to_owned(),
    }
}
