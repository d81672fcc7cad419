use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rusqlite::Connection;

use super::schema::apply_pragmas;
use crate::error::Result;

/// How long a statement waits on a lock held by another process (a second
/// `biblioscope` invocation on the same library) before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// The single library connection, shared between the CLI thread and the
/// blocking tasks the item store spawns.
pub struct ConnectionPool {
    path: Option<PathBuf>,
    connection: Mutex<Connection>,
}

impl ConnectionPool {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::configure(conn, Some(path.to_path_buf()))
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::configure(Connection::open_in_memory()?, None)
    }

    fn configure(conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        apply_pragmas(&conn)?;
        tracing::debug!(path = ?path, "library database opened");
        Ok(Self {
            path,
            connection: Mutex::new(conn),
        })
    }

    /// Lock the connection. A panic in another holder does not leave SQLite
    /// in a broken state, so a poisoned lock is recovered.
    pub fn get_connection(&self) -> MutexGuard<'_, Connection> {
        self.connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// `None` for in-memory libraries.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}
