use serde::{Deserialize, Serialize};
use std::fmt;

/// How a session write reaches the table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// A single insert-or-replace call
    #[default]
    Upsert,
    /// Fetch the row, then update it, or insert when it is absent.
    /// Not atomic: concurrent writers race and the last one wins.
    FetchThenUpdate,
}

/// One session row as stored in the table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEntity {
    #[serde(rename = "PartitionKey")]
    pub partition_key: String,
    #[serde(rename = "RowKey")]
    pub row_key: String,
    /// Base64 of the serialized session payload
    #[serde(default)]
    pub data: String,
    /// Epoch seconds of the last write
    #[serde(rename = "createdat", default)]
    pub created_at: i64,
}

impl SessionEntity {
    pub fn new(
        partition_key: impl Into<String>,
        row_key: impl Into<String>,
        data: impl Into<String>,
        created_at: i64,
    ) -> Self {
        Self {
            partition_key: partition_key.into(),
            row_key: row_key.into(),
            data: data.into(),
            created_at,
        }
    }
}

/// Selects the rows of one partition written before a cutoff
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityFilter {
    pub partition_key: String,
    /// Exclusive upper bound on `createdat`
    pub created_before: i64,
}

impl EntityFilter {
    pub fn new(partition_key: impl Into<String>, created_before: i64) -> Self {
        Self {
            partition_key: partition_key.into(),
            created_before,
        }
    }

    /// Evaluates the filter against an entity the way the service would
    pub fn matches(&self, entity: &SessionEntity) -> bool {
        entity.partition_key == self.partition_key && entity.created_at < self.created_before
    }

    /// Renders the filter as an OData `$filter` expression
    pub fn to_odata(&self) -> String {
        format!(
            "PartitionKey eq '{}' and createdat lt {}",
            escape_odata_literal(&self.partition_key),
            self.created_before
        )
    }
}

impl fmt::Display for EntityFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_odata())
    }
}

/// Doubles single quotes for use inside an OData string literal
pub fn escape_odata_literal(value: &str) -> String {
    value.replace('\'', "''")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_rendering() {
        let filter = EntityFilter::new("sessions", 9500);
        assert_eq!(
            filter.to_odata(),
            "PartitionKey eq 'sessions' and createdat lt 9500"
        );

        let quoted = EntityFilter::new("o'brien", -5);
        assert_eq!(
            quoted.to_string(),
            "PartitionKey eq 'o''brien' and createdat lt -5"
        );
    }

    #[test]
    fn test_filter_is_strict_and_partition_scoped() {
        let filter = EntityFilter::new("sessions", 9000);

        assert!(filter.matches(&SessionEntity::new("sessions", "a", "", 100)));
        assert!(!filter.matches(&SessionEntity::new("sessions", "b", "", 9000)));
        assert!(!filter.matches(&SessionEntity::new("other", "c", "", 100)));
    }

    #[test]
    fn test_entity_wire_format() {
        let entity = SessionEntity::new("sessions", "abc", "eyJ4IjoxfQ==", 1700000000);
        let json = serde_json::to_value(&entity).unwrap();
        assert_eq!(json["PartitionKey"], "sessions");
        assert_eq!(json["RowKey"], "abc");
        assert_eq!(json["data"], "eyJ4IjoxfQ==");
        assert_eq!(json["createdat"], 1700000000);

        // Service responses carry extra system properties
        let parsed: SessionEntity = serde_json::from_str(
            r#"{"PartitionKey":"sessions","RowKey":"abc","Timestamp":"2024-01-01T00:00:00Z","data":"e30=","createdat":42}"#,
        )
        .unwrap();
        assert_eq!(parsed, SessionEntity::new("sessions", "abc", "e30=", 42));
    }

    #[test]
    fn test_write_mode_names() {
        assert_eq!(
            serde_json::to_string(&WriteMode::FetchThenUpdate).unwrap(),
            "\"fetch_then_update\""
        );
        assert_eq!(WriteMode::default(), WriteMode::Upsert);
    }
}
