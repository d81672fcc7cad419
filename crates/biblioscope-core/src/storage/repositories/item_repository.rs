use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use crate::error::Result;
use crate::models::{
    Attachment, BibRecord, CandidateRecord, ItemId, ItemSummary, ItemType, PDF_CONTENT_TYPE,
    new_item_key,
};

use super::Repository;

pub trait ItemRepository: Repository<Entity = BibRecord, Id = ItemId> {
    fn insert_attachment(
        &self,
        title: &str,
        file_path: Option<&str>,
        content_type: &str,
    ) -> Result<Attachment>;
    fn find_attachment(&self, id: ItemId) -> Result<Option<Attachment>>;
    fn insert_record(&self, candidate: &CandidateRecord) -> Result<BibRecord>;
    /// Set the parent of a top-level attachment. Returns `false` when the
    /// item is missing, not an attachment, or already has a parent.
    fn set_parent(&self, attachment_id: ItemId, parent_id: ItemId) -> Result<bool>;
    fn list(&self) -> Result<Vec<ItemSummary>>;
    fn children_of(&self, id: ItemId) -> Result<Vec<ItemSummary>>;
    fn list_recognizable(&self) -> Result<Vec<Attachment>>;
    fn count(&self) -> Result<usize>;
}

pub struct SqliteItemRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteItemRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    const ATTACHMENT_COLUMNS: &'static str =
        "id, key, title, file_path, content_type, parent_id, date_added";

    const RECORD_COLUMNS: &'static str =
        "id, key, item_type, title, creators, fields, library_catalog, date_added";

    fn row_to_attachment(row: &rusqlite::Row) -> rusqlite::Result<Attachment> {
        let date_added: String = row.get(6)?;
        Ok(Attachment {
            id: ItemId(row.get(0)?),
            key: row.get(1)?,
            title: row.get(2)?,
            file_path: row.get(3)?,
            content_type: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
            parent_id: row.get::<_, Option<i64>>(5)?.map(ItemId),
            date_added: parse_timestamp(&date_added),
        })
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<BibRecord> {
        let item_type: String = row.get(2)?;
        let creators_str: String = row.get(4)?;
        let fields_str: String = row.get(5)?;
        let date_added: String = row.get(7)?;

        Ok(BibRecord {
            id: ItemId(row.get(0)?),
            key: row.get(1)?,
            item_type: ItemType::from_label(&item_type),
            title: row.get(3)?,
            creators: serde_json::from_str(&creators_str).unwrap_or_default(),
            fields: serde_json::from_str(&fields_str).unwrap_or_default(),
            library_catalog: row.get(6)?,
            date_added: parse_timestamp(&date_added),
        })
    }

    fn row_to_summary(row: &rusqlite::Row) -> rusqlite::Result<ItemSummary> {
        let item_type: String = row.get(1)?;
        Ok(ItemSummary {
            id: ItemId(row.get(0)?),
            item_type: ItemType::from_label(&item_type),
            title: row.get(2)?,
            parent_id: row.get::<_, Option<i64>>(3)?.map(ItemId),
            file_path: row.get(4)?,
        })
    }

    fn query_summaries(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<ItemSummary>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, Self::row_to_summary)?;
        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        Ok(items)
    }
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default()
}

impl<'a> Repository for SqliteItemRepository<'a> {
    type Entity = BibRecord;
    type Id = ItemId;

    fn find_by_id(&self, id: &Self::Id) -> Result<Option<Self::Entity>> {
        let sql = format!(
            "SELECT {} FROM items WHERE id = ?1 AND item_type != 'attachment'",
            Self::RECORD_COLUMNS
        );
        let record = self
            .conn
            .query_row(&sql, params![id.0], Self::row_to_record)
            .optional()?;
        Ok(record)
    }
}

impl<'a> ItemRepository for SqliteItemRepository<'a> {
    fn insert_attachment(
        &self,
        title: &str,
        file_path: Option<&str>,
        content_type: &str,
    ) -> Result<Attachment> {
        let now = Utc::now();
        let key = new_item_key();
        self.conn.execute(
            "INSERT INTO items
                (key, item_type, title, file_path, content_type, date_added, date_modified)
             VALUES (?1, 'attachment', ?2, ?3, ?4, ?5, ?5)",
            params![key, title, file_path, content_type, now.to_rfc3339()],
        )?;

        Ok(Attachment {
            id: ItemId(self.conn.last_insert_rowid()),
            key,
            title: title.to_string(),
            file_path: file_path.map(str::to_string),
            content_type: content_type.to_string(),
            parent_id: None,
            date_added: now,
        })
    }

    fn find_attachment(&self, id: ItemId) -> Result<Option<Attachment>> {
        let sql = format!(
            "SELECT {} FROM items WHERE id = ?1 AND item_type = 'attachment'",
            Self::ATTACHMENT_COLUMNS
        );
        let attachment = self
            .conn
            .query_row(&sql, params![id.0], Self::row_to_attachment)
            .optional()?;
        Ok(attachment)
    }

    fn insert_record(&self, candidate: &CandidateRecord) -> Result<BibRecord> {
        let now = Utc::now();
        let key = new_item_key();
        let creators_json = serde_json::to_string(&candidate.creators)?;
        let fields_json = serde_json::to_string(&candidate.fields)?;

        self.conn.execute(
            "INSERT INTO items
                (key, item_type, title, creators, fields, library_catalog,
                 date_added, date_modified)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            params![
                key,
                candidate.item_type.as_str(),
                candidate.title,
                creators_json,
                fields_json,
                candidate.library_catalog.as_deref(),
                now.to_rfc3339(),
            ],
        )?;

        Ok(BibRecord {
            id: ItemId(self.conn.last_insert_rowid()),
            key,
            item_type: candidate.item_type,
            title: candidate.title.clone(),
            creators: candidate.creators.clone(),
            fields: candidate.fields.clone(),
            library_catalog: candidate.library_catalog.clone(),
            date_added: now,
        })
    }

    fn set_parent(&self, attachment_id: ItemId, parent_id: ItemId) -> Result<bool> {
        let affected = self.conn.execute(
            "UPDATE items SET parent_id = ?1, date_modified = ?2
             WHERE id = ?3 AND item_type = 'attachment' AND parent_id IS NULL",
            params![parent_id.0, Utc::now().to_rfc3339(), attachment_id.0],
        )?;
        Ok(affected == 1)
    }

    fn list(&self) -> Result<Vec<ItemSummary>> {
        self.query_summaries(
            "SELECT id, item_type, title, parent_id, file_path
             FROM items ORDER BY COALESCE(parent_id, id), parent_id IS NOT NULL, id",
            [],
        )
    }

    fn children_of(&self, id: ItemId) -> Result<Vec<ItemSummary>> {
        self.query_summaries(
            "SELECT id, item_type, title, parent_id, file_path
             FROM items WHERE parent_id = ?1 ORDER BY id",
            params![id.0],
        )
    }

    fn list_recognizable(&self) -> Result<Vec<Attachment>> {
        let sql = format!(
            "SELECT {} FROM items
             WHERE item_type = 'attachment' AND parent_id IS NULL AND content_type = ?1
             ORDER BY id",
            Self::ATTACHMENT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![PDF_CONTENT_TYPE], Self::row_to_attachment)?;
        let mut attachments = Vec::new();
        for row in rows {
            attachments.push(row?);
        }
        Ok(attachments)
    }

    fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
