//! Encoding of session payloads into the row's `data` column: base64 of JSON.
//! Any JSON value is accepted, so payloads stay opaque to the store.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::store::{SessionData, SessionResult, SessionStoreError};

pub fn encode(data: &SessionData) -> SessionResult<String> {
    let json = serde_json::to_vec(data)
        .map_err(|e| SessionStoreError::Codec(format!("Failed to serialize session: {}", e)))?;
    Ok(STANDARD.encode(json))
}

/// Decodes a stored payload. A blank column decodes to an empty session.
pub fn decode(encoded: &str) -> SessionResult<SessionData> {
    let encoded = encoded.trim();
    if encoded.is_empty() {
        return Ok(SessionData::default());
    }

    let json = STANDARD
        .decode(encoded)
        .map_err(|e| SessionStoreError::Codec(format!("Payload is not valid base64: {}", e)))?;
    serde_json::from_slice(&json)
        .map_err(|e| SessionStoreError::Codec(format!("Failed to parse session: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_known_encoding() {
        let mut data = SessionData::new();
        data.set("x", 1);
        // base64 of {"x":1}
        assert_eq!(encode(&data).unwrap(), "eyJ4IjoxfQ==");
        assert_eq!(decode("eyJ4IjoxfQ==").unwrap(), data);
    }

    #[test]
    fn test_blank_is_empty_session() {
        assert!(decode("").unwrap().is_empty());
        assert!(decode("  ").unwrap().is_empty());
        assert_eq!(encode(&SessionData::new()).unwrap(), "e30=");
    }

    #[test]
    fn test_nested_values_survive() {
        let mut data = SessionData::new();
        data.set("cart", json!([{"sku": "A-1", "qty": 2}]));
        data.set("flash", json!(null));
        assert_eq!(decode(&encode(&data).unwrap()).unwrap(), data);
    }

    #[test]
    fn test_corrupt_payloads() {
        assert!(matches!(decode("%%%"), Err(SessionStoreError::Codec(_))));
        // base64 of "not json"
        assert!(matches!(decode("bm90IGpzb24="), Err(SessionStoreError::Codec(_))));
    }

    #[test]
    fn test_non_map_payloads_round_trip() {
        // base64 of [1]
        assert_eq!(decode("WzFd").unwrap(), SessionData::from(json!([1])));

        let blob = SessionData::from("a|i:1;".to_string());
        let encoded = encode(&blob).unwrap();
        assert_eq!(decode(&encoded).unwrap(), blob);
    }
}
