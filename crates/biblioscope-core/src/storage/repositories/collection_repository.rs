use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};

use crate::error::Result;
use crate::models::{Collection, ItemId, new_item_key};

use super::Repository;

pub trait CollectionRepository: Repository<Entity = Collection, Id = i64> {
    fn create(&self, name: &str) -> Result<Collection>;
    fn find_by_name(&self, name: &str) -> Result<Option<Collection>>;
    fn list(&self) -> Result<Vec<Collection>>;
    fn add_item(&self, collection_id: i64, item_id: ItemId) -> Result<()>;
    fn collections_of(&self, item_id: ItemId) -> Result<Vec<Collection>>;
    /// Give `to` every collection membership `from` has. Returns the number copied.
    fn copy_memberships(&self, from: ItemId, to: ItemId) -> Result<usize>;
}

pub struct SqliteCollectionRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteCollectionRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn row_to_collection(row: &rusqlite::Row) -> rusqlite::Result<Collection> {
        Ok(Collection {
            id: row.get(0)?,
            key: row.get(1)?,
            name: row.get(2)?,
        })
    }

    fn query_collections(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<Collection>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, Self::row_to_collection)?;
        let mut collections = Vec::new();
        for row in rows {
            collections.push(row?);
        }
        Ok(collections)
    }
}

impl<'a> Repository for SqliteCollectionRepository<'a> {
    type Entity = Collection;
    type Id = i64;

    fn find_by_id(&self, id: &Self::Id) -> Result<Option<Self::Entity>> {
        let collection = self
            .conn
            .query_row(
                "SELECT id, key, name FROM collections WHERE id = ?1",
                params![id],
                Self::row_to_collection,
            )
            .optional()?;
        Ok(collection)
    }
}

impl<'a> CollectionRepository for SqliteCollectionRepository<'a> {
    fn create(&self, name: &str) -> Result<Collection> {
        let key = new_item_key();
        self.conn.execute(
            "INSERT INTO collections (key, name) VALUES (?1, ?2)",
            params![key, name],
        )?;
        Ok(Collection {
            id: self.conn.last_insert_rowid(),
            key,
            name: name.to_string(),
        })
    }

    fn find_by_name(&self, name: &str) -> Result<Option<Collection>> {
        let collection = self
            .conn
            .query_row(
                "SELECT id, key, name FROM collections WHERE name = ?1",
                params![name],
                Self::row_to_collection,
            )
            .optional()?;
        Ok(collection)
    }

    fn list(&self) -> Result<Vec<Collection>> {
        self.query_collections("SELECT id, key, name FROM collections ORDER BY name", [])
    }

    fn add_item(&self, collection_id: i64, item_id: ItemId) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO collection_items (collection_id, item_id, added_at)
             VALUES (?1, ?2, ?3)",
            params![collection_id, item_id.0, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn collections_of(&self, item_id: ItemId) -> Result<Vec<Collection>> {
        self.query_collections(
            "SELECT c.id, c.key, c.name FROM collections c
             JOIN collection_items ci ON ci.collection_id = c.id
             WHERE ci.item_id = ?1 ORDER BY c.name",
            params![item_id.0],
        )
    }

    fn copy_memberships(&self, from: ItemId, to: ItemId) -> Result<usize> {
        let copied = self.conn.execute(
            "INSERT OR IGNORE INTO collection_items (collection_id, item_id, added_at)
             SELECT collection_id, ?2, ?3 FROM collection_items WHERE item_id = ?1",
            params![from.0, to.0, Utc::now().to_rfc3339()],
        )?;
        Ok(copied)
    }
}
