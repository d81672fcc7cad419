use rusqlite::Connection;

use super::Migration;
use crate::error::Result;
use crate::storage::database::schema::{create_indexes, create_tables};

/// Items (attachments and records share one table), collections and
/// memberships.
pub struct V1Initial;

impl Migration for V1Initial {
    fn version(&self) -> u32 {
        1
    }

    fn description(&self) -> &'static str {
        "items with parent links, collections, collection memberships"
    }

    fn up(&self, conn: &Connection) -> Result<()> {
        create_tables(conn)?;
        create_indexes(conn)
    }
}
