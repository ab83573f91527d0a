//! Storage backends: the table-backed session store and an in-memory table service

pub mod in_memory;
pub mod table;

pub use in_memory::InMemoryTableService;
pub use table::TableSessionStore;
