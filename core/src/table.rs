use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::TableResult;
use crate::types::{EntityFilter, SessionEntity};

/// Operations the session store needs from a remote table service.
///
/// Implementations report a missing table or entity as `TableError::NotFound`
/// and a create of an existing resource as `TableError::Conflict`.
#[async_trait]
pub trait TableService: Send + Sync + Debug {
    /// Succeeds when the table exists
    async fn get_table(&self, table: &str) -> TableResult<()>;

    /// Creates the table
    async fn create_table(&self, table: &str) -> TableResult<()>;

    /// Fetches one entity by key
    async fn get_entity(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> TableResult<SessionEntity>;

    /// Inserts a new entity; fails with `Conflict` if the key is taken
    async fn insert_entity(&self, table: &str, entity: &SessionEntity) -> TableResult<()>;

    /// Replaces an existing entity; fails with `NotFound` if it is absent
    async fn update_entity(&self, table: &str, entity: &SessionEntity) -> TableResult<()>;

    /// Inserts the entity or replaces whatever is stored under its key
    async fn insert_or_replace_entity(
        &self,
        table: &str,
        entity: &SessionEntity,
    ) -> TableResult<()>;

    /// Deletes one entity by key
    async fn delete_entity(&self, table: &str, partition_key: &str, row_key: &str)
        -> TableResult<()>;

    /// Returns every entity matching the filter
    async fn query_entities(
        &self,
        table: &str,
        filter: &EntityFilter,
    ) -> TableResult<Vec<SessionEntity>>;
}

/// Type alias for Arc-wrapped TableService trait objects
pub type TableServiceRef = Arc<dyn TableService>;

#[async_trait]
impl<T: TableService + ?Sized> TableService for Arc<T> {
    async fn get_table(&self, table: &str) -> TableResult<()> {
        (**self).get_table(table).await
    }

    async fn create_table(&self, table: &str) -> TableResult<()> {
        (**self).create_table(table).await
    }

    async fn get_entity(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> TableResult<SessionEntity> {
        (**self).get_entity(table, partition_key, row_key).await
    }

    async fn insert_entity(&self, table: &str, entity: &SessionEntity) -> TableResult<()> {
        (**self).insert_entity(table, entity).await
    }

    async fn update_entity(&self, table: &str, entity: &SessionEntity) -> TableResult<()> {
        (**self).update_entity(table, entity).await
    }

    async fn insert_or_replace_entity(
        &self,
        table: &str,
        entity: &SessionEntity,
    ) -> TableResult<()> {
        (**self).insert_or_replace_entity(table, entity).await
    }

    async fn delete_entity(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> TableResult<()> {
        (**self).delete_entity(table, partition_key, row_key).await
    }

    async fn query_entities(
        &self,
        table: &str,
        filter: &EntityFilter,
    ) -> TableResult<Vec<SessionEntity>> {
        (**self).query_entities(table, filter).await
    }
}
