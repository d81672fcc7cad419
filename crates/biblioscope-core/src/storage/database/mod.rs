mod connection;
mod migrations;
mod schema;

pub use connection::ConnectionPool;
pub use migrations::{Migration, get_applied_versions, run_migrations};
pub use schema::SCHEMA_VERSION;

use std::path::Path;

use crate::error::{CoreError, Result};
use crate::models::{Attachment, BibRecord, CandidateRecord, Collection, ItemId, ItemSummary};

use super::repositories::{
    CollectionRepository, ItemRepository, Repository, SqliteCollectionRepository,
    SqliteItemRepository,
};

pub fn open_database(path: &Path) -> Result<ConnectionPool> {
    let pool = ConnectionPool::open(path)?;
    {
        let conn = pool.get_connection();
        migrations::run_migrations(&conn)?;
    }
    Ok(pool)
}

pub fn open_in_memory() -> Result<ConnectionPool> {
    let pool = ConnectionPool::open_in_memory()?;
    {
        let conn = pool.get_connection();
        migrations::run_migrations(&conn)?;
    }
    Ok(pool)
}

/// The library database: attachments, bibliographic records and collections.
pub struct Database {
    pool: ConnectionPool,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let pool = open_database(path)?;
        Ok(Self { pool })
    }

    pub fn open_in_memory() -> Result<Self> {
        let pool = open_in_memory()?;
        Ok(Self { pool })
    }

    pub fn path(&self) -> Option<&Path> {
        self.pool.path()
    }

    /// True once every known migration has been applied.
    pub fn is_ready(&self) -> Result<bool> {
        let conn = self.pool.get_connection();
        let versions = get_applied_versions(&conn)?;
        Ok(versions.contains(&SCHEMA_VERSION))
    }

    // ─── Items ─────────────────────────────────────────────

    pub fn add_attachment(
        &self,
        title: &str,
        file_path: Option<&str>,
        content_type: &str,
    ) -> Result<Attachment> {
        let conn = self.pool.get_connection();
        SqliteItemRepository::new(&conn).insert_attachment(title, file_path, content_type)
    }

    pub fn get_attachment(&self, id: ItemId) -> Result<Option<Attachment>> {
        let conn = self.pool.get_connection();
        SqliteItemRepository::new(&conn).find_attachment(id)
    }

    pub fn get_record(&self, id: ItemId) -> Result<Option<BibRecord>> {
        let conn = self.pool.get_connection();
        SqliteItemRepository::new(&conn).find_by_id(&id)
    }

    pub fn list_items(&self) -> Result<Vec<ItemSummary>> {
        let conn = self.pool.get_connection();
        SqliteItemRepository::new(&conn).list()
    }

    pub fn children_of(&self, id: ItemId) -> Result<Vec<ItemSummary>> {
        let conn = self.pool.get_connection();
        SqliteItemRepository::new(&conn).children_of(id)
    }

    pub fn list_recognizable_attachments(&self) -> Result<Vec<Attachment>> {
        let conn = self.pool.get_connection();
        SqliteItemRepository::new(&conn).list_recognizable()
    }

    pub fn count_items(&self) -> Result<usize> {
        let conn = self.pool.get_connection();
        SqliteItemRepository::new(&conn).count()
    }

    // ─── Collections ───────────────────────────────────────

    pub fn create_collection(&self, name: &str) -> Result<Collection> {
        let conn = self.pool.get_connection();
        SqliteCollectionRepository::new(&conn).create(name)
    }

    /// Find a collection by name, creating it when missing.
    pub fn ensure_collection(&self, name: &str) -> Result<Collection> {
        let conn = self.pool.get_connection();
        let repo = SqliteCollectionRepository::new(&conn);
        match repo.find_by_name(name)? {
            Some(collection) => Ok(collection),
            None => repo.create(name),
        }
    }

    pub fn add_to_collection(&self, collection_id: i64, item_id: ItemId) -> Result<()> {
        let conn = self.pool.get_connection();
        let repo = SqliteCollectionRepository::new(&conn);
        if repo.find_by_id(&collection_id)?.is_none() {
            return Err(CoreError::CollectionNotFound(collection_id.to_string()));
        }
        repo.add_item(collection_id, item_id)
    }

    pub fn item_collections(&self, item_id: ItemId) -> Result<Vec<Collection>> {
        let conn = self.pool.get_connection();
        SqliteCollectionRepository::new(&conn).collections_of(item_id)
    }

    // ─── Materialization ───────────────────────────────────

    /// Turn an accepted candidate into a stored record and make the
    /// attachment its child.
    ///
    /// Record creation, collection copy and reparenting commit together;
    /// if the attachment is missing or already has a parent nothing is kept.
    pub fn materialize_record(
        &self,
        attachment_id: ItemId,
        candidate: &CandidateRecord,
    ) -> Result<BibRecord> {
        let mut conn = self.pool.get_connection();
        let tx = conn.transaction()?;

        let record = {
            let items = SqliteItemRepository::new(&tx);
            let collections = SqliteCollectionRepository::new(&tx);

            let record = items.insert_record(candidate)?;
            let copied = collections.copy_memberships(attachment_id, record.id)?;
            if !items.set_parent(attachment_id, record.id)? {
                // Dropping `tx` rolls back the insert and the copied memberships.
                return Err(CoreError::InvalidState(format!(
                    "attachment {attachment_id} is missing or already has a parent"
                )));
            }
            tracing::debug!(
                attachment = %attachment_id,
                record = %record.id,
                collections = copied,
                "materialized record"
            );
            record
        };

        tx.commit()?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Creator, ItemType};
    use tempfile::TempDir;

    fn candidate() -> CandidateRecord {
        let mut c = CandidateRecord::new(ItemType::JournalArticle, "Deep Learning")
            .with_catalog("CrossRef");
        c.creators.push(Creator::author("Yann", "LeCun"));
        c.fields.doi = Some("10.1038/nature14539".to_string());
        c
    }

    #[test]
    fn test_open_runs_migrations() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.is_ready().unwrap());
        assert_eq!(db.count_items().unwrap(), 0);
    }

    #[test]
    fn test_open_on_disk_creates_parent_dir() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("library.db");
        let db = Database::open(&path).unwrap();
        assert!(path.exists());
        assert_eq!(db.path(), Some(path.as_path()));
        assert!(Database::open_in_memory().unwrap().path().is_none());
    }

    #[test]
    fn test_add_and_get_attachment() {
        let db = Database::open_in_memory().unwrap();
        let att = db
            .add_attachment("paper.pdf", Some("/tmp/paper.pdf"), "application/pdf")
            .unwrap();

        let loaded = db.get_attachment(att.id).unwrap().unwrap();
        assert_eq!(loaded.title, "paper.pdf");
        assert!(loaded.can_recognize());
        assert_eq!(db.list_recognizable_attachments().unwrap().len(), 1);
        assert!(db.get_record(att.id).unwrap().is_none());
    }

    #[test]
    fn test_materialize_reparents_and_copies_collections() {
        let db = Database::open_in_memory().unwrap();
        let att = db
            .add_attachment("paper.pdf", Some("/tmp/paper.pdf"), "application/pdf")
            .unwrap();
        let inbox = db.ensure_collection("Inbox").unwrap();
        let reading = db.ensure_collection("Reading").unwrap();
        db.add_to_collection(inbox.id, att.id).unwrap();
        db.add_to_collection(reading.id, att.id).unwrap();

        let record = db.materialize_record(att.id, &candidate()).unwrap();
        assert_eq!(record.title, "Deep Learning");

        let stored = db.get_record(record.id).unwrap().unwrap();
        assert_eq!(stored.creators[0].last_name, "LeCun");
        assert_eq!(stored.fields.doi.as_deref(), Some("10.1038/nature14539"));
        assert_eq!(stored.library_catalog.as_deref(), Some("CrossRef"));

        let att = db.get_attachment(att.id).unwrap().unwrap();
        assert_eq!(att.parent_id, Some(record.id));
        assert!(!att.can_recognize());

        let names: Vec<_> = db
            .item_collections(record.id)
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Inbox", "Reading"]);

        let children = db.children_of(record.id).unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].id, att.id);
    }

    #[test]
    fn test_materialize_missing_attachment_rolls_back() {
        let db = Database::open_in_memory().unwrap();
        let before = db.count_items().unwrap();

        let err = db.materialize_record(ItemId(999), &candidate()).unwrap_err();
        assert!(matches!(err, CoreError::InvalidState(_)));
        assert_eq!(db.count_items().unwrap(), before);
    }

    #[test]
    fn test_materialize_twice_rolls_back_second() {
        let db = Database::open_in_memory().unwrap();
        let att = db
            .add_attachment("paper.pdf", Some("/tmp/paper.pdf"), "application/pdf")
            .unwrap();
        let collection = db.ensure_collection("Inbox").unwrap();
        db.add_to_collection(collection.id, att.id).unwrap();

        db.materialize_record(att.id, &candidate()).unwrap();
        let count = db.count_items().unwrap();

        assert!(db.materialize_record(att.id, &candidate()).is_err());
        assert_eq!(db.count_items().unwrap(), count);
    }

    #[test]
    fn test_list_groups_children_under_parents() {
        let db = Database::open_in_memory().unwrap();
        let a = db.add_attachment("a.pdf", None, "application/pdf").unwrap();
        let b = db.add_attachment("b.pdf", None, "application/pdf").unwrap();
        let record = db.materialize_record(a.id, &candidate()).unwrap();

        let ids: Vec<_> = db.list_items().unwrap().into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![b.id, record.id, a.id]);
    }

    #[test]
    fn test_ensure_collection_reuses_existing() {
        let db = Database::open_in_memory().unwrap();
        let first = db.ensure_collection("Inbox").unwrap();
        let again = db.ensure_collection("Inbox").unwrap();
        assert_eq!(first.id, again.id);
        assert_ne!(db.ensure_collection("Reading").unwrap().id, first.id);
    }

    #[test]
    fn test_add_to_unknown_collection_fails() {
        let db = Database::open_in_memory().unwrap();
        let att = db.add_attachment("a.pdf", None, "application/pdf").unwrap();
        assert!(matches!(
            db.add_to_collection(42, att.id),
            Err(CoreError::CollectionNotFound(_))
        ));
    }
}
