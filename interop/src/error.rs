//! Codec error type for the interop wire format.

/// Errors raised while encoding or decoding boundary payloads.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// A hex string could not be parsed.
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    /// A fixed-size value had the wrong number of bytes.
    #[error("invalid length: expected {expected} bytes, got {got}")]
    InvalidLength { expected: usize, got: usize },

    /// A quantity did not fit the target integer type.
    #[error("quantity out of range: {0}")]
    OutOfRange(String),

    /// JSON encoding or decoding failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = CodecError::InvalidLength { expected: 20, got: 3 };
        assert_eq!(format!("{}", err), "invalid length: expected 20 bytes, got 3");

        let err = CodecError::InvalidHex("0xzz".into());
        assert!(format!("{}", err).contains("0xzz"));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<u32>("nope").unwrap_err();
        let err: CodecError = json_err.into();
        assert!(matches!(err, CodecError::Json(_)));
    }
}
