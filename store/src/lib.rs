//! Session persistence for tablesess
//!
//! This crate provides the session-handler contract used by web hosts to keep
//! session state between requests. It defines a `SessionStore` trait and a
//! table-backed implementation that stores one row per session in a remote
//! table service.

pub mod adapters;
pub mod clock;
pub mod codec;
pub mod store;

pub use adapters::{InMemoryTableService, TableSessionStore};
pub use clock::{Clock, FixedClock, SystemClock};
pub use store::{
    generate_session_id, validate_session_id, GcReport, SessionData, SessionResult,
    SessionStore, SessionStoreError, SessionStoreRef,
};
