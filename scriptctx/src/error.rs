//! Error taxonomy shared by contexts and the cache.

use std::path::PathBuf;

use thiserror::Error;

/// Broad category of a [`ScriptError`], for caller-side handling
/// (e.g. retrying on [`ErrorKind::FileAccess`] but not on [`ErrorKind::Load`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    FileAccess,
    Load,
    Eval,
    Call,
    Export,
    InternalFault,
}

/// Every failure surfaced by [`ScriptContext`](crate::ScriptContext) and
/// [`ContextCache`](crate::ContextCache).
#[derive(Debug, Error)]
pub enum ScriptError {
    /// Missing or unreadable script file (stat or read).
    #[error("cannot access {}: {source}", .path.display())]
    FileAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Parse or runtime failure while loading into a fresh instance.
    #[error("failed to load {name}: {message}")]
    Load { name: String, message: String },

    /// Parse or runtime failure of an incremental eval.
    #[error("eval failed: {message}")]
    Eval { message: String },

    #[error("function {name} is not found in script")]
    NotAFunction { name: String },

    /// Runtime failure raised while a script function was running.
    #[error("call to {name} failed: {message}")]
    Call { name: String, message: String },

    /// A script value could not be exported into the requested native shape.
    #[error("cannot export {name}: {message}")]
    Export { name: String, message: String },

    #[error("reading global {name} failed: {message}")]
    GetGlobal { name: String, message: String },

    /// Unexpected failure inside the interpreter layer.
    #[error("internal fault: {0}")]
    Internal(String),
}

impl ScriptError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScriptError::FileAccess { .. } => ErrorKind::FileAccess,
            ScriptError::Load { .. } => ErrorKind::Load,
            ScriptError::Eval { .. } => ErrorKind::Eval,
            ScriptError::NotAFunction { .. } | ScriptError::Call { .. } => ErrorKind::Call,
            ScriptError::Export { .. } => ErrorKind::Export,
            ScriptError::GetGlobal { .. } | ScriptError::Internal(_) => ErrorKind::InternalFault,
        }
    }

    /// `true` when the same request may succeed later without the script
    /// changing (the file may reappear or become readable).
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::FileAccess
    }

    pub(crate) fn file_access(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ScriptError::FileAccess { path: path.into(), source }
    }
}

impl From<mlua::Error> for ScriptError {
    fn from(e: mlua::Error) -> Self {
        ScriptError::Internal(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ScriptError>;

// ── Tests ─────────────────────────────────────────────────────────────────────
