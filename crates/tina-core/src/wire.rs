//! Field wrappers for the shapes the protocol client puts on the wire.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A 64-bit integer as sent by the protocol client.
///
/// Accepts a plain JSON number, a decimal string, or the `{low, high, unsigned}`
/// object produced by JavaScript `Long` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Long(pub i64);

#[derive(Deserialize)]
#[serde(untagged)]
enum LongRepr {
    Int(i64),
    Unsigned(u64),
    Float(f64),
    Text(String),
    Parts {
        low: i32,
        high: i32,
        #[serde(default)]
        unsigned: bool,
    },
}

impl Long {
    pub fn value(self) -> i64 {
        self.0
    }

    fn from_parts(low: i32, high: i32, unsigned: bool) -> Self {
        let bits = ((high as u32 as u64) << 32) | (low as u32 as u64);
        if unsigned {
            Long(i64::try_from(bits).unwrap_or(i64::MAX))
        } else {
            Long(bits as i64)
        }
    }
}

impl From<i64> for Long {
    fn from(value: i64) -> Self {
        Long(value)
    }
}

impl<'de> Deserialize<'de> for Long {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match LongRepr::deserialize(deserializer)? {
            LongRepr::Int(v) => Ok(Long(v)),
            LongRepr::Unsigned(v) => Ok(Long(i64::try_from(v).unwrap_or(i64::MAX))),
            LongRepr::Float(v) if v.is_finite() => Ok(Long(v.trunc() as i64)),
            LongRepr::Float(v) => Err(D::Error::custom(format!("non-finite number {v}"))),
            LongRepr::Text(s) => s
                .trim()
                .parse::<i64>()
                .map(Long)
                .map_err(|e| D::Error::custom(format!("invalid 64-bit integer {s:?}: {e}"))),
            LongRepr::Parts {
                low,
                high,
                unsigned,
            } => Ok(Long::from_parts(low, high, unsigned)),
        }
    }
}

impl Serialize for Long {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.0)
    }
}

/// Binary payload: a JSON array of bytes or a base64 string.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Binary(pub Vec<u8>);

#[derive(Deserialize)]
#[serde(untagged)]
enum BinaryRepr {
    Bytes(Vec<u8>),
    Encoded(String),
}

impl<'de> Deserialize<'de> for Binary {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match BinaryRepr::deserialize(deserializer)? {
            BinaryRepr::Bytes(bytes) => Ok(Binary(bytes)),
            BinaryRepr::Encoded(s) => STANDARD
                .decode(s.as_bytes())
                .map(Binary)
                .map_err(|e| D::Error::custom(format!("invalid base64 payload: {e}"))),
        }
    }
}

impl Serialize for Binary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(&self.0))
    }
}

/// A field of a partial update.
///
/// `Absent` means the field was not mentioned and must stay unchanged;
/// `Null` means the sender explicitly cleared it.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Nullable<T> {
    #[default]
    Absent,
    Null,
    Value(T),
}

impl<T> Nullable<T> {
    pub fn is_absent(&self) -> bool {
        matches!(self, Nullable::Absent)
    }
}

impl<T> From<T> for Nullable<T> {
    fn from(value: T) -> Self {
        Nullable::Value(value)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Nullable<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(v) => Nullable::Value(v),
            None => Nullable::Null,
        })
    }
}

impl<T: Serialize> Serialize for Nullable<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Nullable::Value(v) => v.serialize(serializer),
            _ => serializer.serialize_none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Probe {
        #[serde(default)]
        count: Nullable<Long>,
        #[serde(default)]
        token: Nullable<Binary>,
    }

    #[test]
    fn test_long_from_number_and_string() {
        let a: Long = serde_json::from_str("42").unwrap();
        let b: Long = serde_json::from_str("\"1700000000123\"").unwrap();
        assert_eq!(a, Long(42));
        assert_eq!(b, Long(1_700_000_000_123));
    }

    #[test]
    fn test_long_from_parts() {
        let v: Long = serde_json::from_str(r#"{"low": 5, "high": 1, "unsigned": false}"#).unwrap();
        assert_eq!(v.value(), (1_i64 << 32) + 5);

        let neg: Long = serde_json::from_str(r#"{"low": -1, "high": -1, "unsigned": false}"#).unwrap();
        assert_eq!(neg.value(), -1);

        let big: Long = serde_json::from_str(r#"{"low": -1, "high": -1, "unsigned": true}"#).unwrap();
        assert_eq!(big.value(), i64::MAX);
    }

    #[test]
    fn test_binary_from_array_and_base64() {
        let raw: Binary = serde_json::from_str("[1, 2, 3]").unwrap();
        let encoded: Binary = serde_json::from_str("\"AQID\"").unwrap();
        assert_eq!(raw, encoded);
        assert!(serde_json::from_str::<Binary>("\"not base64!\"").is_err());
    }

    #[test]
    fn test_nullable_tri_state() {
        let absent: Probe = serde_json::from_str("{}").unwrap();
        assert!(absent.count.is_absent());

        let null: Probe = serde_json::from_str(r#"{"count": null, "token": null}"#).unwrap();
        assert_eq!(null.count, Nullable::Null);
        assert_eq!(null.token, Nullable::Null);

        let set: Probe = serde_json::from_str(r#"{"count": "7"}"#).unwrap();
        assert_eq!(set.count, Nullable::Value(Long(7)));
    }
}
