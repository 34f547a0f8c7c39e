//! JSON Patch operation types and JSON Pointer helpers.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// A single JSON Patch operation (RFC 6902 shape).
///
/// Paths are RFC 6901 JSON Pointers. The differ only emits `add`, `remove`,
/// and `replace`; the full set is accepted by
/// [`apply()`](crate::patch::apply()) so conformant patches from other
/// producers work too.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOp {
    Add { path: String, value: Value },
    Remove { path: String },
    Replace { path: String, value: Value },
    Move { path: String, from: String },
    Copy { path: String, from: String },
    Test { path: String, value: Value },
}

impl PatchOp {
    /// The operation's target path.
    pub fn path(&self) -> &str {
        match self {
            PatchOp::Add { path, .. }
            | PatchOp::Remove { path }
            | PatchOp::Replace { path, .. }
            | PatchOp::Move { path, .. }
            | PatchOp::Copy { path, .. }
            | PatchOp::Test { path, .. } => path,
        }
    }
}

/// Errors from applying a patch.
#[derive(Debug, Error)]
pub enum PatchError {
    #[error("Invalid pointer: {0}")]
    InvalidPointer(String),

    #[error("Path not found: {0}")]
    PathNotFound(String),

    #[error("Index out of bounds: {0}")]
    OutOfBounds(String),

    #[error("Test failed at {0}")]
    TestFailed(String),
}

/// Escape a single pointer token (RFC 6901: `~` -> `~0`, `/` -> `~1`).
pub(crate) fn escape(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

/// Unescape a single pointer token.
pub(crate) fn unescape(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

/// Split a JSON Pointer into unescaped tokens. The empty pointer addresses
/// the whole document and yields no tokens.
pub(crate) fn parse_pointer(path: &str) -> Result<Vec<String>, PatchError> {
    if path.is_empty() {
        return Ok(Vec::new());
    }
    if !path.starts_with('/') {
        return Err(PatchError::InvalidPointer(path.to_string()));
    }
    Ok(path[1..].split('/').map(unescape).collect())
}
