//! Core value types shared across the boundary.
//!
//! `Address` and `Hash` are fixed-size byte strings that encode as
//! `0x`-prefixed hex. `Handle` is the integer that names a native-side
//! object or a registered host callback.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::codec::{decode_hex, encode_hex};
use crate::error::CodecError;

/// Integer naming a native-side object (store, state view, tracer) or a
/// registered host callback. Unique per category, not globally.
pub type Handle = i32;

/// Callback handle reserved for the log-forwarding bridge.
pub const LOG_CALLBACK_HANDLE: Handle = 0;

macro_rules! fixed_bytes {
    ($(#[$meta:meta])* $name:ident, $len:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            /// Length in bytes.
            pub const LENGTH: usize = $len;

            /// All-zero value.
            pub const ZERO: Self = Self([0u8; $len]);

            /// Build from a slice of exactly `LENGTH` bytes.
            pub fn from_slice(bytes: &[u8]) -> Result<Self, CodecError> {
                if bytes.len() != $len {
                    return Err(CodecError::InvalidLength { expected: $len, got: bytes.len() });
                }
                let mut out = [0u8; $len];
                out.copy_from_slice(bytes);
                Ok(Self(out))
            }

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            pub fn is_zero(&self) -> bool {
                self.0 == [0u8; $len]
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = CodecError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_slice(&decode_hex(s)?)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&encode_hex(&self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), encode_hex(&self.0))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&encode_hex(&self.0))
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

fixed_bytes!(
    /// 20-byte account address.
    Address,
    20
);

fixed_bytes!(
    /// 32-byte digest: state roots, code hashes, storage keys and values, block hashes.
    Hash,
    32
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_parse_and_display() {
        let addr: Address = "0xbafe3b6f2a19658df3cb5efca158c93272ff5c0b".parse().unwrap();
        assert_eq!(addr.to_string(), "0xbafe3b6f2a19658df3cb5efca158c93272ff5c0b");
        assert!(!addr.is_zero());
    }

    #[test]
    fn test_wrong_length_rejected() {
        let err = "0x1234".parse::<Address>().unwrap_err();
        assert!(matches!(err, CodecError::InvalidLength { expected: 20, got: 2 }));
        assert!(Hash::from_slice(&[0u8; 31]).is_err());
    }

    #[test]
    fn test_zero_constants() {
        assert!(Hash::ZERO.is_zero());
        assert_eq!(Hash::default(), Hash::ZERO);
        assert_eq!(Address::ZERO.to_string(), format!("0x{}", "00".repeat(20)));
    }

    #[test]
    fn test_serde_as_hex_string() {
        let hash = Hash([0xab; 32]);
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"0x{}\"", "ab".repeat(32)));
        let back: Hash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hash);
    }

    #[test]
    fn test_debug_names_type() {
        let addr = Address([1u8; 20]);
        assert!(format!("{:?}", addr).starts_with("Address(0x0101"));
    }
}
