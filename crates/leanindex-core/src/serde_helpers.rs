//! Serde helpers for the header wire format.
//!
//! Endpoints emit roots as hex strings (the `0x` prefix is optional) and
//! integers either as JSON numbers or decimal strings.

use serde::{de::Error, Deserialize, Deserializer, Serializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(u64),
    String(String),
}

/// Parse a hex string, with or without the `0x` prefix.
pub fn parse_hex(s: &str) -> Result<Vec<u8>, hex::FromHexError> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(s)
}

/// Format bytes as a `0x`-prefixed lowercase hex string.
pub fn to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// `u64` that accepts a JSON number or a decimal string.
pub mod flex_u64 {
    use super::*;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        match NumberOrString::deserialize(deserializer)? {
            NumberOrString::Number(n) => Ok(n),
            NumberOrString::String(s) => s
                .trim()
                .parse::<u64>()
                .map_err(|e| D::Error::custom(format!("invalid integer '{s}': {e}"))),
        }
    }

    pub fn serialize<S>(value: &u64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(*value)
    }
}

/// Variable-length byte string encoded as hex.
///
/// Length is deliberately not checked here; the codec and the processor
/// own that rule.
pub mod hex_bytes {
    use super::*;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_hex(&s).map_err(|e| D::Error::custom(format!("invalid hex string '{s}': {e}")))
    }

    pub fn serialize<S>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&to_hex(value))
    }
}

/// Fixed 32-byte root encoded as hex.
pub mod hex_root {
    use super::*;
    use crate::types::Root;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Root, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bytes = hex_bytes::deserialize(deserializer)?;
        let len = bytes.len();
        bytes
            .try_into()
            .map_err(|_| D::Error::custom(format!("expected 32-byte root, got {len} bytes")))
    }

    pub fn serialize<S>(value: &Root, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&to_hex(value))
    }
}
