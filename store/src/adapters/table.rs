use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tablesess_core::{EntityFilter, SessionConfig, SessionEntity, TableService, WriteMode};
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::codec;
use crate::store::{
    validate_session_id, GcReport, SessionData, SessionResult, SessionStore, SessionStoreError,
};

/// Session store keeping one row per session in a table service.
///
/// Every session lives in a single partition of one table; the row key is the
/// session id. Rows carry the encoded payload and the epoch second of their
/// last write, which drives garbage collection.
pub struct TableSessionStore<T> {
    service: T,
    table: String,
    partition: String,
    write_mode: WriteMode,
    clock: Arc<dyn Clock>,
}

impl<T: fmt::Debug> fmt::Debug for TableSessionStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableSessionStore")
            .field("service", &self.service)
            .field("table", &self.table)
            .field("partition", &self.partition)
            .field("write_mode", &self.write_mode)
            .finish_non_exhaustive()
    }
}

impl<T: TableService> TableSessionStore<T> {
    pub fn new(service: T, table: impl Into<String>, partition: impl Into<String>) -> Self {
        Self {
            service,
            table: table.into(),
            partition: partition.into(),
            write_mode: WriteMode::default(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Table, partition and write mode taken from configuration
    pub fn from_config(service: T, config: &SessionConfig) -> Self {
        Self::new(service, config.table_name(), config.partition_name())
            .with_write_mode(config.write_mode())
    }

    pub fn with_write_mode(mut self, write_mode: WriteMode) -> Self {
        self.write_mode = write_mode;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    pub fn partition_name(&self) -> &str {
        &self.partition
    }

    /// Insert-or-replace in one call
    async fn upsert(&self, entity: &SessionEntity) -> SessionResult<()> {
        self.service
            .insert_or_replace_entity(&self.table, entity)
            .await?;
        Ok(())
    }

    /// Fetch, then update or insert. Two round trips; concurrent writers race.
    async fn fetch_then_update(&self, entity: &SessionEntity) -> SessionResult<()> {
        let exists = match self
            .service
            .get_entity(&self.table, &self.partition, &entity.row_key)
            .await
        {
            Ok(_) => true,
            Err(e) if e.is_not_found() => false,
            Err(e) => return Err(e.into()),
        };

        if exists {
            match self.service.update_entity(&self.table, entity).await {
                // Deleted between the fetch and the update
                Err(e) if e.is_not_found() => {
                    self.service.insert_entity(&self.table, entity).await?
                }
                other => other?,
            }
        } else {
            match self.service.insert_entity(&self.table, entity).await {
                // Another writer inserted first; last writer wins
                Err(e) if e.is_conflict() => {
                    self.service.update_entity(&self.table, entity).await?
                }
                other => other?,
            }
        }
        Ok(())
    }
}

#[async_trait]
impl<T: TableService> SessionStore for TableSessionStore<T> {
    async fn open(&self) -> SessionResult<()> {
        match self.service.get_table(&self.table).await {
            Ok(()) => {
                debug!("Opened existing table '{}'", self.table);
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                info!("Table '{}' not found, creating new table.", self.table);
                match self.service.create_table(&self.table).await {
                    Ok(()) => Ok(()),
                    Err(e) if e.is_conflict() => {
                        debug!("Table '{}' was created concurrently", self.table);
                        Ok(())
                    }
                    Err(e) => Err(e.into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn close(&self) -> SessionResult<()> {
        // Writes go straight to the table, nothing is buffered
        debug!("Closed session store for table '{}'", self.table);
        Ok(())
    }

    async fn read(&self, id: &str) -> SessionResult<SessionData> {
        validate_session_id(id)?;

        match self
            .service
            .get_entity(&self.table, &self.partition, id)
            .await
        {
            Ok(entity) => codec::decode(&entity.data),
            Err(e) if e.is_not_found() => {
                debug!("No stored session {}", id);
                Ok(SessionData::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, id: &str, data: &SessionData) -> SessionResult<()> {
        validate_session_id(id)?;

        let entity = SessionEntity::new(
            self.partition.as_str(),
            id,
            codec::encode(data)?,
            self.clock.now(),
        );

        match self.write_mode {
            WriteMode::Upsert => self.upsert(&entity).await?,
            WriteMode::FetchThenUpdate => self.fetch_then_update(&entity).await?,
        }
        debug!("Wrote session {} ({} keys)", id, data.len());
        Ok(())
    }

    async fn destroy(&self, id: &str) -> SessionResult<()> {
        validate_session_id(id)?;

        match self
            .service
            .delete_entity(&self.table, &self.partition, id)
            .await
        {
            Ok(()) => {
                debug!("Destroyed session {}", id);
                Ok(())
            }
            Err(e) if e.is_not_found() => Err(SessionStoreError::NotFound(id.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    async fn gc(&self, lifetime: Duration) -> SessionResult<GcReport> {
        let lifetime = i64::try_from(lifetime.as_secs()).unwrap_or(i64::MAX);
        let cutoff = self.clock.now().saturating_sub(lifetime);
        let filter = EntityFilter::new(self.partition.as_str(), cutoff);

        let expired = self.service.query_entities(&self.table, &filter).await?;
        let mut report = GcReport {
            cutoff,
            matched: expired.len(),
            ..GcReport::default()
        };

        // One delete per row; a failed row is left for the next pass
        for entity in expired {
            match self
                .service
                .delete_entity(&self.table, &self.partition, &entity.row_key)
                .await
            {
                Ok(()) => report.deleted += 1,
                Err(e) if e.is_not_found() => {
                    debug!("Expired session {} was already gone", entity.row_key);
                    report.deleted += 1;
                }
                Err(e) => {
                    warn!(session_id = %entity.row_key, error = %e, "Failed to delete expired session");
                    report.failed += 1;
                }
            }
        }

        if report.matched > 0 {
            info!(
                cutoff,
                deleted = report.deleted,
                failed = report.failed,
                "Cleaned up {} expired sessions",
                report.deleted
            );
        }
        Ok(report)
    }
}
