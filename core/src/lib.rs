// Core table-storage plumbing for tablesess:
// - Configuration and credential loading
// - Shared error types
// - The `TableService` seam and the entity model it speaks
// - An HTTP client for the Azure Table REST API

// Export config module - Configuration loading
pub mod config;
pub use config::*;

// Export credentials module - Account name/key and connection strings
pub mod credentials;
pub use credentials::StorageCredentials;

// Export errors module - Shared error types
pub mod errors;
pub use errors::*;

// Export types module - Entities and query filters
pub mod types;
pub use types::*;

// Export table module - The remote table service contract
pub mod table;
pub use table::{TableService, TableServiceRef};

// Request signing for the HTTP client
pub mod auth;

// Export client module - HTTP client for the table service
pub mod client;
pub use client::TableClient;
