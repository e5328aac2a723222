//! Native-side error type. Every variant ends up as the `error` string of a
//! response envelope.

use libevm_interop::{CodecError, Handle};

pub type StubResult<T> = Result<T, StubError>;

#[derive(Debug, thiserror::Error)]
pub enum StubError {
    #[error("method not found: {0}")]
    MethodNotFound(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("invalid handle: {0}")]
    InvalidHandle(Handle),

    #[error("missing trie node {0}")]
    MissingRoot(String),

    #[error("invalid revision id: {0}")]
    InvalidRevision(i32),

    #[error("{0}")]
    State(String),

    #[error("tracer not found: {0}")]
    TracerNotFound(String),

    #[error("callback failed: {0}")]
    Callback(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoding error: {0}")]
    Codec(#[from] CodecError),
}

impl From<serde_json::Error> for StubError {
    fn from(e: serde_json::Error) -> Self {
        StubError::Codec(CodecError::Json(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_handle_message() {
        assert_eq!(StubError::InvalidHandle(42).to_string(), "invalid handle: 42");
    }

    #[test]
    fn test_method_not_found_message() {
        assert_eq!(
            StubError::MethodNotFound("Nope".into()).to_string(),
            "method not found: Nope"
        );
    }
}
