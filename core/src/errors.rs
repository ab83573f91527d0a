use thiserror::Error;

/// Errors reported by a table service
#[derive(Error, Debug)]
pub enum TableError {
    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("Conflict: {resource} already exists")]
    Conflict { resource: String },

    #[error("HTTP Error: {status_code} - {message}")]
    Http { status_code: u16, message: String },

    #[error(transparent)]
    Request(#[from] reqwest::Error),

    #[error("Parsing Error: {0}")]
    Parsing(String),

    #[error("Authentication Error: {0}")]
    Auth(String),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Storage Error: {0}")]
    Storage(String),
}

impl TableError {
    pub fn not_found(resource: impl Into<String>) -> Self {
        TableError::NotFound {
            resource: resource.into(),
        }
    }

    pub fn conflict(resource: impl Into<String>) -> Self {
        TableError::Conflict {
            resource: resource.into(),
        }
    }

    /// True when the service reported that the table or entity does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, TableError::NotFound { .. })
    }

    /// True when the service rejected a create because the resource exists
    pub fn is_conflict(&self) -> bool {
        matches!(self, TableError::Conflict { .. })
    }
}

impl From<serde_json::Error> for TableError {
    fn from(e: serde_json::Error) -> Self {
        TableError::Parsing(e.to_string())
    }
}

/// Result type for table service operations
pub type TableResult<T> = Result<T, TableError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_helpers() {
        assert!(TableError::not_found("phpsess").is_not_found());
        assert!(!TableError::not_found("phpsess").is_conflict());
        assert!(TableError::conflict("phpsess").is_conflict());

        let http = TableError::Http {
            status_code: 503,
            message: "ServerBusy".to_string(),
        };
        assert!(!http.is_not_found());
        assert!(!http.is_conflict());
        assert_eq!(http.to_string(), "HTTP Error: 503 - ServerBusy");
    }
}
