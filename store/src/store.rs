use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tablesess_core::TableError;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

/// Longest id the table service accepts as a row key, in bytes
const MAX_SESSION_ID_LEN: usize = 1024;

/// Error type for session store operations
#[derive(Debug, Error)]
pub enum SessionStoreError {
    /// Session not found
    #[error("Session not found: {0}")]
    NotFound(String),
    /// The id cannot be used as a row key
    #[error("Invalid session id: {0}")]
    InvalidId(String),
    /// The backing table service failed or could not be reached
    #[error("Session store unavailable: {0}")]
    Unavailable(#[from] TableError),
    /// Stored payload could not be encoded or decoded
    #[error("Session payload error: {0}")]
    Codec(String),
}

/// Result type for session store operations
pub type SessionResult<T> = Result<T, SessionStoreError>;

/// Session payload, stored opaquely as a JSON value.
///
/// Hosts that keep key-value state use the map view (`get`/`set`/`remove`);
/// hosts that hand over an already serialized blob wrap it with `From<Value>`
/// or `From<String>` and get the same value back from `read`. A null, an
/// empty map or an empty string is an empty session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionData {
    value: Value,
}

impl Default for SessionData {
    fn default() -> Self {
        Self {
            value: Value::Object(Map::new()),
        }
    }
}

impl SessionData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a key-value pair. A payload that is not a map is replaced by one.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        if !self.value.is_object() {
            self.value = Value::Object(Map::new());
        }
        if let Value::Object(map) = &mut self.value {
            map.insert(key.into(), value.into());
        }
    }

    /// Get a value from the session data by key
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.value.as_object()?.get(key)
    }

    /// Remove a key-value pair from the session data
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.value.as_object_mut()?.remove(key)
    }

    pub fn is_empty(&self) -> bool {
        match &self.value {
            Value::Null => true,
            Value::Object(map) => map.is_empty(),
            Value::String(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Number of keys; a non-empty payload that is not a map counts as one
    pub fn len(&self) -> usize {
        match &self.value {
            Value::Object(map) => map.len(),
            _ if self.is_empty() => 0,
            _ => 1,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.value.as_object().into_iter().flat_map(|map| map.iter())
    }

    /// The whole payload
    pub fn as_value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }
}

impl From<Value> for SessionData {
    fn from(value: Value) -> Self {
        Self { value }
    }
}

/// A host-serialized blob kept as-is
impl From<String> for SessionData {
    fn from(blob: String) -> Self {
        Self {
            value: Value::String(blob),
        }
    }
}

impl From<BTreeMap<String, Value>> for SessionData {
    fn from(values: BTreeMap<String, Value>) -> Self {
        values.into_iter().collect()
    }
}

impl FromIterator<(String, Value)> for SessionData {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            value: Value::Object(iter.into_iter().collect()),
        }
    }
}

/// Outcome of one garbage-collection pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcReport {
    /// Rows written before this epoch second were eligible
    pub cutoff: i64,
    /// Rows returned by the expiry query
    pub matched: usize,
    /// Rows removed, including rows already gone at delete time
    pub deleted: usize,
    /// Rows whose delete failed; they stay eligible for the next pass
    pub failed: usize,
}

/// Checks that `id` is usable as a row key.
///
/// Row keys cannot be empty, longer than 1 KiB, or contain `/`, `\`, `#`, `?`
/// or control characters.
pub fn validate_session_id(id: &str) -> SessionResult<()> {
    if id.is_empty() {
        return Err(SessionStoreError::InvalidId("empty id".to_string()));
    }
    if id.len() > MAX_SESSION_ID_LEN {
        return Err(SessionStoreError::InvalidId(format!(
            "id is {} bytes, limit is {}",
            id.len(),
            MAX_SESSION_ID_LEN
        )));
    }
    if let Some(c) = id
        .chars()
        .find(|c| matches!(c, '/' | '\\' | '#' | '?') || c.is_control())
    {
        return Err(SessionStoreError::InvalidId(format!(
            "id contains forbidden character {:?}",
            c
        )));
    }
    Ok(())
}

/// Generates a fresh random session id
pub fn generate_session_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Session-handler contract: the lifecycle calls a web host makes per request
#[async_trait]
pub trait SessionStore: Send + Sync + Debug {
    /// Prepare the backing storage. Safe to call repeatedly.
    async fn open(&self) -> SessionResult<()>;

    /// Release the store at the end of a request. The host calls this explicitly.
    async fn close(&self) -> SessionResult<()>;

    /// Load a session; a missing session reads as empty
    async fn read(&self, id: &str) -> SessionResult<SessionData>;

    /// Persist a session, refreshing its timestamp
    async fn write(&self, id: &str, data: &SessionData) -> SessionResult<()>;

    /// Delete a session by ID
    async fn destroy(&self, id: &str) -> SessionResult<()>;

    /// Delete sessions last written more than `lifetime` ago
    async fn gc(&self, lifetime: Duration) -> SessionResult<GcReport>;

    /// Like `read`, but any failure reads as an empty session
    async fn read_or_empty(&self, id: &str) -> SessionData {
        match self.read(id).await {
            Ok(data) => data,
            Err(e) => {
                warn!(session_id = id, error = %e, "Session read failed, treating as empty");
                SessionData::default()
            }
        }
    }
}

/// Type alias for Arc-wrapped SessionStore trait objects
pub type SessionStoreRef = Arc<dyn SessionStore>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_session_data_operations() {
        let mut data = SessionData::new();
        assert!(data.is_empty());

        data.set("x", 1);
        data.set("user", "alice");
        assert_eq!(data.len(), 2);
        assert_eq!(data.get("x"), Some(&json!(1)));
        assert_eq!(data.get("user"), Some(&json!("alice")));
        assert_eq!(data.get("nonexistent"), None);

        data.set("x", json!({"nested": [1, 2]}));
        assert_eq!(data.get("x"), Some(&json!({"nested": [1, 2]})));

        assert_eq!(data.remove("x"), Some(json!({"nested": [1, 2]})));
        assert_eq!(data.remove("x"), None);
        assert_eq!(data.len(), 1);
    }

    #[test]
    fn test_session_data_serializes_as_map() {
        let data: SessionData = [("x".to_string(), json!(1))].into_iter().collect();
        assert_eq!(serde_json::to_string(&data).unwrap(), r#"{"x":1}"#);
    }

    #[test]
    fn test_opaque_payloads() {
        let blob = SessionData::from("user|s:5:\"alice\";".to_string());
        assert!(!blob.is_empty());
        assert_eq!(blob.len(), 1);
        assert_eq!(blob.get("user"), None);
        assert_eq!(blob.iter().count(), 0);
        assert_eq!(blob.as_value(), &json!("user|s:5:\"alice\";"));

        let list = SessionData::from(json!([1, 2, 3]));
        assert_eq!(serde_json::to_string(&list).unwrap(), "[1,2,3]");

        for empty in [json!(null), json!({}), json!("")] {
            assert!(SessionData::from(empty).is_empty());
        }

        // Setting a key turns a non-map payload into a map
        let mut data = SessionData::from(json!(7));
        data.set("x", 1);
        assert_eq!(data.into_value(), json!({"x": 1}));
    }

    #[test]
    fn test_validate_session_id() {
        assert!(validate_session_id("abc").is_ok());
        assert!(validate_session_id("9f1c2d3e4b5a60718293a4b5c6d7e8f9").is_ok());
        assert!(validate_session_id(&"a".repeat(MAX_SESSION_ID_LEN)).is_ok());

        for bad in ["", "a/b", "a\\b", "a#b", "a?b", "a\nb", "a\u{7f}b"] {
            assert!(
                matches!(validate_session_id(bad), Err(SessionStoreError::InvalidId(_))),
                "{:?} should be rejected",
                bad
            );
        }
        assert!(validate_session_id(&"a".repeat(MAX_SESSION_ID_LEN + 1)).is_err());
    }

    #[test]
    fn test_generated_ids_are_valid_and_distinct() {
        let a = generate_session_id();
        let b = generate_session_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
        assert!(validate_session_id(&a).is_ok());
    }

    #[test]
    fn test_table_error_converts_to_unavailable() {
        let err: SessionStoreError = TableError::Http {
            status_code: 503,
            message: "busy".to_string(),
        }
        .into();
        assert!(matches!(err, SessionStoreError::Unavailable(_)));
    }
}
