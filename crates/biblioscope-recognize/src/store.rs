use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use biblioscope_core::{Attachment, BibRecord, CandidateRecord, CoreError, Database, ItemId};

use crate::error::{Result, ScienceError};

const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// The library the recognizer reads attachments from and writes records to.
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Resolves once the schema is usable.
    async fn wait_until_ready(&self) -> Result<()>;

    async fn get_attachment(&self, id: ItemId) -> Result<Option<Attachment>>;

    /// Create a record from `candidate`, copy the attachment's collections
    /// onto it and make the attachment its child, atomically.
    async fn materialize(
        &self,
        attachment_id: ItemId,
        candidate: CandidateRecord,
    ) -> Result<BibRecord>;
}

/// [`ItemStore`] over the SQLite library; blocking calls run on the
/// blocking pool.
#[derive(Clone)]
pub struct SqliteItemStore {
    db: Arc<Database>,
}

impl SqliteItemStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> biblioscope_core::Result<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| CoreError::InvalidState(format!("store task failed: {e}")))?
            .map_err(ScienceError::from)
    }
}

#[async_trait]
impl ItemStore for SqliteItemStore {
    async fn wait_until_ready(&self) -> Result<()> {
        while !self.blocking(|db| db.is_ready()).await? {
            tracing::debug!("waiting for library schema");
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }
        Ok(())
    }

    async fn get_attachment(&self, id: ItemId) -> Result<Option<Attachment>> {
        self.blocking(move |db| db.get_attachment(id)).await
    }

    async fn materialize(
        &self,
        attachment_id: ItemId,
        candidate: CandidateRecord,
    ) -> Result<BibRecord> {
        self.blocking(move |db| db.materialize_record(attachment_id, &candidate))
            .await
    }
}
