//! Structured-data write wrapper.

use std::fmt::Display;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::guard::{GuardRequest, Guarded, Guardian, Validation};

use super::ActionType;

/// Serialize `data` pretty-printed and write it under the guard.
///
/// Validation re-reads the file and checks that it parses as JSON.
/// Returns the written path.
pub async fn wrap_json_write<R, E, W>(
    guardian: &Guardian,
    task_id: &str,
    lane: &str,
    file_path: &Path,
    data: &Value,
    write_fn: W,
) -> Guarded<PathBuf, E>
where
    W: FnOnce(&Path, &str) -> Result<R, E>,
    E: Display + From<serde_json::Error>,
{
    let action = ActionType::JsonWrite;
    let request = GuardRequest::new(
        task_id,
        lane,
        action.as_str(),
        "JSON written and valid",
        action.confidence_pre(),
    )
    .with_metadata("path", file_path.display().to_string());

    guardian
        .exec_with_guard(
            request,
            move || async move {
                let text = serde_json::to_string_pretty(data)?;
                write_fn(file_path, &text)?;
                Ok(file_path.to_path_buf())
            },
            |path: &PathBuf| Ok(check_json(path)),
        )
        .await
}

fn check_json(path: &Path) -> Validation {
    let parsed = std::fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|text| serde_json::from_str::<Value>(&text).map_err(|e| e.to_string()));
    match parsed {
        Ok(_) => Validation::from_check(true).with("json_valid", true),
        Err(error) => Validation::from_check(false)
            .with("json_valid", false)
            .with("error", error),
    }
}
