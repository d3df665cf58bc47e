use serde::{Serialize, de::DeserializeOwned};

use crate::error::{Error, Result};

/// Wire format for published measurements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// JSON format (human-readable, good for debugging).
    #[default]
    Json,

    /// CBOR format (compact binary).
    Cbor,
}

impl Format {
    /// Get the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Format::Json => "application/json",
            Format::Cbor => "application/cbor",
        }
    }
}

/// Encode a value to bytes using the specified format.
pub fn encode<T: Serialize>(value: &T, format: Format) -> Result<Vec<u8>> {
    match format {
        Format::Json => serde_json::to_vec(value).map_err(Error::from),
        Format::Cbor => {
            let mut buf = Vec::new();
            ciborium::into_writer(value, &mut buf)?;
            Ok(buf)
        }
    }
}

/// Decode bytes to a value using the specified format.
pub fn decode<T: DeserializeOwned>(data: &[u8], format: Format) -> Result<T> {
    match format {
        Format::Json => serde_json::from_slice(data).map_err(Error::from),
        Format::Cbor => ciborium::from_reader(data).map_err(Error::from),
    }
}

/// Guess the format of a payload: JSON documents start with `{` or `[`.
pub fn detect_format(data: &[u8]) -> Format {
    match data.first() {
        Some(b'{') | Some(b'[') => Format::Json,
        _ => Format::Cbor,
    }
}

/// Decode bytes, auto-detecting the format.
pub fn decode_auto<T: DeserializeOwned>(data: &[u8]) -> Result<T> {
    decode(data, detect_format(data))
}
