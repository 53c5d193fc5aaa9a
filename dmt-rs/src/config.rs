//! Context file loader.
//!
//! A context file is a JSON object whose entries become template constants:
//!
//! ```json
//! { "user": "ada", "count": 3, "tags": ["a", "b"], "owner": { "id": 7 } }
//! ```
//!
//! Numbers load as `Number`, arrays as `List`, objects as `Map`.  Template
//! `const` declarations of the same name overwrite these values.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::template::value::Value;
use crate::var::VarStore;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("top level must be an object, found {0}")]
    NotAnObject(&'static str),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Parse context JSON text into a constants table.
pub fn load_context_str(s: &str) -> ConfigResult<VarStore> {
    match serde_json::from_str::<serde_json::Value>(s)? {
        serde_json::Value::Object(entries) => {
            Ok(entries.into_iter().map(|(name, value)| (name, Value::from(value))).collect())
        }
        other => Err(ConfigError::NotAnObject(json_kind(&other))),
    }
}

/// Read and parse a context file.
pub fn load_context_file(path: &Path) -> ConfigResult<VarStore> {
    let s = std::fs::read_to_string(path)
        .map_err(|source| ConfigError::Io { path: path.to_owned(), source })?;
    let constants = load_context_str(&s)?;
    debug!(path = %path.display(), entries = constants.len(), "loaded context file");
    Ok(constants)
}

/// Like [`load_context_file`], but a missing file yields `None`.
pub fn load_context_optional(path: &Path) -> ConfigResult<Option<VarStore>> {
    match load_context_file(path) {
        Ok(constants) => Ok(Some(constants)),
        Err(ConfigError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no context file");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

fn json_kind(json: &serde_json::Value) -> &'static str {
    match json {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
