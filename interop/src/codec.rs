//! JSON codec and hex helpers for the boundary wire format.
//!
//! Every payload crossing the boundary is a JSON document. Binary values are
//! `0x`-prefixed lowercase hex, and integer quantities that may exceed a
//! machine word (`uint256`, and `uint64` for symmetry with the native side)
//! are `0x`-prefixed hex quantities without leading zeros.
//!
//! The `hex_*` submodules are meant for `#[serde(with = "...")]`.

use num_bigint::BigUint;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::CodecError;

/// Encode a value as a JSON string.
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, CodecError> {
    Ok(serde_json::to_string(value)?)
}

/// Decode a JSON string into a value.
pub fn from_json<T: DeserializeOwned>(json: &str) -> Result<T, CodecError> {
    Ok(serde_json::from_str(json)?)
}

/// Encode bytes as a `0x`-prefixed lowercase hex string.
pub fn encode_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(2 + bytes.len() * 2);
    s.push_str("0x");
    s.push_str(&hex::encode(bytes));
    s
}

/// Decode a hex string, with or without the `0x` prefix.
pub fn decode_hex(s: &str) -> Result<Vec<u8>, CodecError> {
    let digits = strip_hex_prefix(s);
    hex::decode(digits).map_err(|_| CodecError::InvalidHex(s.to_string()))
}

/// Encode an unsigned big integer as a hex quantity (`0x0`, `0x1a`, ...).
pub fn encode_quantity(value: &BigUint) -> String {
    format!("0x{:x}", value)
}

/// Decode a hex quantity into an unsigned big integer.
pub fn decode_quantity(s: &str) -> Result<BigUint, CodecError> {
    let digits = strip_hex_prefix(s);
    if digits.is_empty() {
        return Err(CodecError::InvalidHex(s.to_string()));
    }
    BigUint::parse_bytes(digits.as_bytes(), 16).ok_or_else(|| CodecError::InvalidHex(s.to_string()))
}

/// Decode a hex quantity into a `u64`.
pub fn decode_u64(s: &str) -> Result<u64, CodecError> {
    let digits = strip_hex_prefix(s);
    if digits.is_empty() {
        return Err(CodecError::InvalidHex(s.to_string()));
    }
    u64::from_str_radix(digits, 16).map_err(|_| CodecError::OutOfRange(s.to_string()))
}

fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

/// `Vec<u8>` as a `0x`-prefixed hex string. `null` decodes to an empty vector.
pub mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::encode_hex(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s: Option<String> = Option::deserialize(deserializer)?;
        match s {
            Some(s) => super::decode_hex(&s).map_err(serde::de::Error::custom),
            None => Ok(Vec::new()),
        }
    }
}

/// `u64` as a hex quantity.
pub mod hex_u64 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{:x}", value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::decode_u64(&s).map_err(serde::de::Error::custom)
    }
}

/// `BigUint` as a hex quantity.
pub mod hex_big {
    use num_bigint::BigUint;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &BigUint, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::encode_quantity(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigUint, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::decode_quantity(&s).map_err(serde::de::Error::custom)
    }
}

/// `Option<BigUint>` as a hex quantity or `null`.
pub mod hex_big_opt {
    use num_bigint::BigUint;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<BigUint>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_str(&super::encode_quantity(v)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<BigUint>, D::Error> {
        let s: Option<String> = Option::deserialize(deserializer)?;
        s.map(|s| super::decode_quantity(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

/// Standalone hex quantity, for payloads that are a bare `uint256`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct HexBig(#[serde(with = "hex_big")] pub BigUint);

/// Standalone hex `uint64` quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct HexU64(#[serde(with = "hex_u64")] pub u64);

/// Standalone hex byte string.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct HexBytes(#[serde(with = "hex_bytes")] pub Vec<u8>);
