//! Value serialization seam.
//!
//! Handles and feeds move record values through [`serde_json::Value`] so
//! the codec stays object-safe; typed conversion happens at the edges
//! with serde.

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Errors from encoding or decoding record values.
#[derive(Debug, thiserror::Error)]
#[error("codec error: {0}")]
pub struct CodecError(pub String);

/// Byte-level codec for topic values.
///
/// Implementations must be pure per call; the same input always yields
/// the same output.
pub trait ValueCodec: Send + Sync {
    /// Encode a value into topic bytes.
    ///
    /// # Errors
    ///
    /// [`CodecError`] if the value cannot be represented.
    fn encode(&self, value: &serde_json::Value) -> Result<Vec<u8>, CodecError>;

    /// Decode topic bytes into a value.
    ///
    /// # Errors
    ///
    /// [`CodecError`] for malformed input.
    fn decode(&self, bytes: &[u8]) -> Result<serde_json::Value, CodecError>;
}

/// JSON codec, the default.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl ValueCodec for JsonCodec {
    fn encode(&self, value: &serde_json::Value) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(value).map_err(|e| CodecError(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<serde_json::Value, CodecError> {
        serde_json::from_slice(bytes).map_err(|e| CodecError(e.to_string()))
    }
}

/// Serialize a record into the codec's intermediate value.
///
/// # Errors
///
/// [`CodecError`] if the record does not serialize.
pub fn to_value<T: Serialize>(record: &T) -> Result<serde_json::Value, CodecError> {
    serde_json::to_value(record).map_err(|e| CodecError(e.to_string()))
}

/// Deserialize a record from the codec's intermediate value.
///
/// # Errors
///
/// [`CodecError`] if the value does not match the record shape.
pub fn from_value<T: DeserializeOwned>(value: serde_json::Value) -> Result<T, CodecError> {
    serde_json::from_value(value).map_err(|e| CodecError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_round_trip() {
        let codec = JsonCodec;
        let value = serde_json::json!({"a": 1, "b": "two"});
        let bytes = codec.encode(&value).unwrap();
        assert_eq!(codec.decode(&bytes).unwrap(), value);
    }

    #[test]
    fn malformed_input_is_an_error() {
        let codec = JsonCodec;
        assert!(codec.decode(b"{not json").is_err());
    }
}
