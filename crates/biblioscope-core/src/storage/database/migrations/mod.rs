mod v1_initial;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};

use crate::error::{CoreError, Result};

/// One schema step. Applied at most once per library file.
pub trait Migration {
    fn version(&self) -> u32;
    fn description(&self) -> &'static str;
    fn up(&self, conn: &Connection) -> Result<()>;
}

fn all_migrations() -> Vec<Box<dyn Migration>> {
    vec![Box::new(v1_initial::V1Initial)]
}

fn migrations_table_exists(conn: &Connection) -> Result<bool> {
    let name: Option<String> = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'schema_migrations'",
            [],
            |row| row.get(0),
        )
        .optional()?;
    Ok(name.is_some())
}

/// Apply every pending migration. Each one commits together with its
/// `schema_migrations` row, so a failed step leaves no partial schema.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let applied = get_applied_versions(conn)?;

    for migration in all_migrations() {
        let version = migration.version();
        if applied.contains(&version) {
            continue;
        }

        tracing::debug!(version, description = migration.description(), "applying migration");
        let tx = conn.unchecked_transaction()?;
        migration.up(&tx).map_err(|e| CoreError::Migration {
            version,
            message: e.to_string(),
        })?;
        tx.execute(
            "INSERT INTO schema_migrations(version, applied_at) VALUES (?1, ?2)",
            rusqlite::params![version, Utc::now().to_rfc3339()],
        )?;
        tx.commit()?;
    }

    Ok(())
}

/// Applied versions in ascending order; empty for a fresh file.
pub fn get_applied_versions(conn: &Connection) -> Result<Vec<u32>> {
    if !migrations_table_exists(conn)? {
        return Ok(Vec::new());
    }

    let mut stmt = conn.prepare("SELECT version FROM schema_migrations ORDER BY version")?;
    let versions = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<u32>>>()?;
    Ok(versions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::schema::SCHEMA_VERSION;

    #[test]
    fn fresh_connection_has_no_versions() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(get_applied_versions(&conn).unwrap().is_empty());
    }

    #[test]
    fn migrations_apply_once() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        assert_eq!(get_applied_versions(&conn).unwrap(), vec![SCHEMA_VERSION]);
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                 AND name IN ('items', 'collections', 'collection_items')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 3);
    }
}
