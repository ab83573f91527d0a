use crate::errors::{TableError, TableResult};
use std::fmt;

const DEFAULT_PROTOCOL: &str = "https";
const DEFAULT_ENDPOINT_SUFFIX: &str = "core.windows.net";

/// Storage account credentials and the table endpoint they address
#[derive(Clone, PartialEq, Eq)]
pub struct StorageCredentials {
    pub account_name: String,
    pub account_key: String,
    pub protocol: String,
    pub endpoint_suffix: String,
    /// Explicit table endpoint, e.g. an emulator URL. Overrides protocol and suffix.
    pub table_endpoint: Option<String>,
}

// The account key never goes to logs
impl fmt::Debug for StorageCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageCredentials")
            .field("account_name", &self.account_name)
            .field("protocol", &self.protocol)
            .field("endpoint_suffix", &self.endpoint_suffix)
            .field("table_endpoint", &self.table_endpoint)
            .finish_non_exhaustive()
    }
}

impl StorageCredentials {
    /// Credentials for the public cloud endpoint of `account_name`
    pub fn new(account_name: impl Into<String>, account_key: impl Into<String>) -> Self {
        Self {
            account_name: account_name.into(),
            account_key: account_key.into(),
            protocol: DEFAULT_PROTOCOL.to_string(),
            endpoint_suffix: DEFAULT_ENDPOINT_SUFFIX.to_string(),
            table_endpoint: None,
        }
    }

    pub fn with_table_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.table_endpoint = Some(endpoint.into());
        self
    }

    /// Parses a `Key=Value;Key=Value` storage connection string.
    ///
    /// Recognised keys are `DefaultEndpointsProtocol`, `AccountName`, `AccountKey`,
    /// `EndpointSuffix` and `TableEndpoint`. Unknown keys (blob/queue endpoints,
    /// SAS tokens) are ignored.
    pub fn from_connection_string(connection_string: &str) -> TableResult<Self> {
        let mut account_name = None;
        let mut account_key = None;
        let mut protocol = None;
        let mut endpoint_suffix = None;
        let mut table_endpoint = None;

        for segment in connection_string.split(';') {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }
            // Account keys are base64 and may end in '=', so only split once
            let (key, value) = segment.split_once('=').ok_or_else(|| {
                TableError::Config(format!("Malformed connection string segment: {}", segment))
            })?;
            match key.trim() {
                "AccountName" => account_name = Some(value.to_string()),
                "AccountKey" => account_key = Some(value.to_string()),
                "DefaultEndpointsProtocol" => protocol = Some(value.to_string()),
                "EndpointSuffix" => endpoint_suffix = Some(value.to_string()),
                "TableEndpoint" => table_endpoint = Some(value.trim_end_matches('/').to_string()),
                _ => {}
            }
        }

        let account_name = account_name.ok_or_else(|| {
            TableError::Config("Connection string is missing AccountName".to_string())
        })?;
        let account_key = account_key.ok_or_else(|| {
            TableError::Config("Connection string is missing AccountKey".to_string())
        })?;

        Ok(Self {
            account_name,
            account_key,
            protocol: protocol.unwrap_or_else(|| DEFAULT_PROTOCOL.to_string()),
            endpoint_suffix: endpoint_suffix.unwrap_or_else(|| DEFAULT_ENDPOINT_SUFFIX.to_string()),
            table_endpoint,
        })
    }

    /// Base URL of the table service, without a trailing slash
    pub fn table_endpoint(&self) -> String {
        match &self.table_endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!(
                "{}://{}.table.{}",
                self.protocol, self.account_name, self.endpoint_suffix
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_endpoint() {
        let creds = StorageCredentials::new("myaccount", "a2V5");
        assert_eq!(
            creds.table_endpoint(),
            "https://myaccount.table.core.windows.net"
        );
    }

    #[test]
    fn test_parse_connection_string() {
        let creds = StorageCredentials::from_connection_string(
            "DefaultEndpointsProtocol=https;AccountName=myaccount;AccountKey=c2VjcmV0a2V5==;EndpointSuffix=core.chinacloudapi.cn",
        )
        .unwrap();

        assert_eq!(creds.account_name, "myaccount");
        assert_eq!(creds.account_key, "c2VjcmV0a2V5==");
        assert_eq!(
            creds.table_endpoint(),
            "https://myaccount.table.core.chinacloudapi.cn"
        );
    }

    #[test]
    fn test_parse_emulator_connection_string() {
        let creds = StorageCredentials::from_connection_string(
            "DefaultEndpointsProtocol=http;AccountName=devstoreaccount1;AccountKey=a2V5;TableEndpoint=http://127.0.0.1:10002/devstoreaccount1/;",
        )
        .unwrap();

        assert_eq!(
            creds.table_endpoint(),
            "http://127.0.0.1:10002/devstoreaccount1"
        );
    }

    #[test]
    fn test_missing_key_is_rejected() {
        let err = StorageCredentials::from_connection_string("AccountName=myaccount").unwrap_err();
        assert!(matches!(err, TableError::Config(_)));

        let err = StorageCredentials::from_connection_string("AccountName").unwrap_err();
        assert!(matches!(err, TableError::Config(_)));
    }

    #[test]
    fn test_debug_hides_key() {
        let creds = StorageCredentials::new("myaccount", "c2VjcmV0");
        let rendered = format!("{:?}", creds);
        assert!(rendered.contains("myaccount"));
        assert!(!rendered.contains("c2VjcmV0"));
    }
}
