//! Gateway error types.

use std::path::{Path, PathBuf};

use libevm_interop::CodecError;

/// Top-level error type for the gateway crate.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The native method ran and reported a failure in its envelope.
    #[error("{method} failed: {message} (args: {args})")]
    Operation {
        method: String,
        /// JSON-encoded arguments, empty for calls without payload.
        args: String,
        message: String,
    },

    /// The boundary contract was violated: null, non-UTF-8 or malformed
    /// response. Never retried.
    #[error("protocol violation in {method}: {reason}")]
    Protocol { method: String, reason: String },

    /// Arguments could not be encoded.
    #[error("encoding error: {0}")]
    Encoding(#[from] CodecError),

    /// A string handed to the boundary contains an interior NUL byte.
    #[error("string contains a NUL byte: {0:?}")]
    InvalidString(String),

    /// A filesystem path handed to the boundary is not valid UTF-8.
    #[error("path is not valid UTF-8: {}", .0.display())]
    InvalidPath(PathBuf),

    /// Shared library could not be opened.
    #[error("library error: {0}")]
    Library(#[from] libloading::Error),

    /// Shared library lacks required exports.
    #[error("missing required symbols: {}", .0.join(", "))]
    MissingSymbols(Vec<String>),

    /// Configuration value could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The process-wide gateway is already bound to another native module.
    #[error("gateway already initialized with a different native module")]
    AlreadyInitialized,

    /// No process-wide gateway has been installed yet.
    #[error("gateway not initialized")]
    NotInitialized,
}

impl GatewayError {
    /// Whether the error leaves the boundary in an unknown state.
    ///
    /// Fatal errors must not be retried; operation errors are ordinary
    /// results of a well-formed exchange.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            GatewayError::Protocol { .. }
                | GatewayError::Library(_)
                | GatewayError::MissingSymbols(_)
        )
    }

    /// Native method involved, if any.
    pub fn method(&self) -> Option<&str> {
        match self {
            GatewayError::Operation { method, .. } | GatewayError::Protocol { method, .. } => {
                Some(method)
            }
            _ => None,
        }
    }

    /// Native error message of an operation error.
    pub fn native_message(&self) -> Option<&str> {
        match self {
            GatewayError::Operation { message, .. } => Some(message),
            _ => None,
        }
    }
}

/// Borrow `path` as UTF-8 for the wire, refusing anything that would be
/// rewritten on the way.
pub(crate) fn wire_path(path: &Path) -> Result<&str, GatewayError> {
    path.to_str().ok_or_else(|| GatewayError::InvalidPath(path.to_path_buf()))
}
