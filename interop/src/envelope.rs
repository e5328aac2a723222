//! The `{error, result}` envelope wrapping every gateway response.
//!
//! Invariant: `error` is empty if and only if `result` is the well-formed
//! payload. When `error` is non-empty, `result` carries no meaning and is
//! never decoded.

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::CodecError;

/// Uniform response of every native method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Envelope<R> {
    /// Empty on success, the native error message otherwise.
    pub error: String,
    /// The payload; `None` for methods without a return value and on failure.
    #[serde(default)]
    pub result: Option<R>,
}

impl<R> Envelope<R> {
    /// A successful envelope carrying `result`.
    pub fn success(result: R) -> Self {
        Self {
            error: String::new(),
            result: Some(result),
        }
    }

    /// A failed envelope. An empty message is replaced, since an empty
    /// `error` would signal success.
    pub fn failure(message: impl Into<String>) -> Self {
        let mut error = message.into();
        if error.is_empty() {
            error.push_str("unknown error");
        }
        Self { error, result: None }
    }

    pub fn is_error(&self) -> bool {
        !self.error.is_empty()
    }
}

impl Envelope<()> {
    /// A successful envelope for a method without a return value.
    pub fn empty() -> Self {
        Self {
            error: String::new(),
            result: None,
        }
    }
}

/// Decode an envelope and its typed payload.
///
/// The outer `Err` is a protocol failure: the text is not an envelope, or the
/// payload of a successful envelope does not match `R`. The inner `Err` is the
/// native error message of a well-formed failed envelope.
pub fn decode_envelope<R: DeserializeOwned>(json: &str) -> Result<Result<R, String>, CodecError> {
    let raw: Envelope<serde_json::Value> = serde_json::from_str(json)?;
    if raw.is_error() {
        return Ok(Err(raw.error));
    }
    let payload = raw.result.unwrap_or(serde_json::Value::Null);
    Ok(Ok(serde_json::from_value(payload)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_roundtrip() {
        let json = serde_json::to_string(&Envelope::success(42u32)).unwrap();
        assert_eq!(json, r#"{"error":"","result":42}"#);
        assert_eq!(decode_envelope::<u32>(&json).unwrap(), Ok(42));
    }

    #[test]
    fn test_unit_result() {
        let json = serde_json::to_string(&Envelope::empty()).unwrap();
        assert_eq!(json, r#"{"error":"","result":null}"#);
        assert_eq!(decode_envelope::<()>(&json).unwrap(), Ok(()));
        // result may also be omitted entirely
        assert_eq!(decode_envelope::<()>(r#"{"error":""}"#).unwrap(), Ok(()));
    }

    #[test]
    fn test_failure_ignores_result() {
        let json = r#"{"error":"invalid handle: 7","result":"garbage"}"#;
        assert_eq!(
            decode_envelope::<u32>(json).unwrap(),
            Err("invalid handle: 7".to_string())
        );
    }

    #[test]
    fn test_failure_never_empty() {
        let env: Envelope<()> = Envelope::failure("");
        assert!(env.is_error());
    }

    #[test]
    fn test_malformed_is_codec_error() {
        assert!(decode_envelope::<u32>("not json").is_err());
        assert!(decode_envelope::<u32>(r#"{"result":1}"#).is_err());
        assert!(decode_envelope::<u32>(r#"{"error":"","result":"text"}"#).is_err());
        assert!(decode_envelope::<u32>(r#"{"error":"","result":1,"extra":true}"#).is_err());
    }
}
