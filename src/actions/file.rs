//! File write and delete wrappers.

use std::fmt::Display;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::guard::{GuardRequest, Guarded, Guardian, Validation};

use super::ActionType;

/// What [`write_text`] did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteReceipt {
    /// Always `true` on return.
    pub written: bool,
    /// Target path.
    pub path: PathBuf,
    /// UTF-8 byte length written.
    pub bytes: usize,
}

/// Write `content` to `path`, creating parent directories.
///
/// # Errors
///
/// Returns the underlying I/O error.
pub fn write_text(path: &Path, content: &str) -> std::io::Result<WriteReceipt> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(WriteReceipt {
        written: true,
        path: path.to_path_buf(),
        bytes: content.len(),
    })
}

/// Remove the file at `path`.
///
/// # Errors
///
/// Returns the underlying I/O error.
pub fn remove_file(path: &Path) -> std::io::Result<()> {
    std::fs::remove_file(path)
}

/// Write a file under the guard; succeeds when the file exists afterwards.
pub async fn wrap_file_write<R, E, W>(
    guardian: &Guardian,
    task_id: &str,
    lane: &str,
    file_path: &Path,
    content: &str,
    write_fn: W,
) -> Guarded<R, E>
where
    W: FnOnce(&Path, &str) -> Result<R, E>,
    E: Display,
{
    let action = ActionType::FileWrite;
    let path_label = file_path.display().to_string();
    let request = GuardRequest::new(
        task_id,
        lane,
        action.as_str(),
        format!("{path_label} exists"),
        action.confidence_pre(),
    )
    .with_metadata("path", path_label.clone())
    .with_metadata("bytes", content.len());

    guardian
        .exec_with_guard(
            request,
            move || async move { write_fn(file_path, content) },
            |_| {
                let exists = file_path.exists();
                Ok(Validation::from_check(exists)
                    .with("exists", exists)
                    .with("path", path_label))
            },
        )
        .await
}

/// Delete a file under the guard; succeeds when the path is gone afterwards.
pub async fn wrap_file_delete<R, E, D>(
    guardian: &Guardian,
    task_id: &str,
    lane: &str,
    file_path: &Path,
    delete_fn: D,
) -> Guarded<R, E>
where
    D: FnOnce(&Path) -> Result<R, E>,
    E: Display,
{
    let action = ActionType::FileDelete;
    let path_label = file_path.display().to_string();
    let request = GuardRequest::new(
        task_id,
        lane,
        action.as_str(),
        format!("{path_label} removed"),
        action.confidence_pre(),
    )
    .with_metadata("path", path_label.clone());

    guardian
        .exec_with_guard(
            request,
            move || async move { delete_fn(file_path) },
            |_| {
                let exists_after = file_path.exists();
                Ok(Validation::from_check(!exists_after)
                    .with("exists_after", exists_after)
                    .with("path", path_label))
            },
        )
        .await
}
