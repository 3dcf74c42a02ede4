use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::StoreError;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS seen (id TEXT PRIMARY KEY)";

/// Durable set of candidate ids that have already been processed.
pub trait SeenStore: Send + Sync {
    /// Record `id` and return true if it was not recorded before.
    /// Returns false, with no side effect, for an id already present.
    fn is_new(&self, id: &str) -> Result<bool, StoreError>;
}

/// SQLite-backed seen set. Every call opens its own connection and commits
/// before returning, so nothing is held open between runs.
#[derive(Debug, Clone)]
pub struct SqliteSeenStore {
    path: PathBuf,
}

impl SqliteSeenStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let store = Self { path };
        store.connect()?.execute_batch(SCHEMA)?;
        tracing::debug!(path = %store.path.display(), "seen store ready");
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, id: &str) -> Result<bool, StoreError> {
        let found = self
            .connect()?
            .query_row("SELECT 1 FROM seen WHERE id = ?1", params![id], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        let count: i64 = self
            .connect()?
            .query_row("SELECT COUNT(*) FROM seen", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    fn connect(&self) -> Result<Connection, StoreError> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(conn)
    }
}

impl SeenStore for SqliteSeenStore {
    fn is_new(&self, id: &str) -> Result<bool, StoreError> {
        // single statement: the existence check and the insert cannot interleave
        let inserted = self
            .connect()?
            .execute("INSERT OR IGNORE INTO seen (id) VALUES (?1)", params![id])?;
        Ok(inserted == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sighting_is_new_and_later_ones_are_not() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteSeenStore::open(dir.path().join("seen.db")).unwrap();

        assert!(store.is_new("https://openalex.org/W1").unwrap());
        assert!(store.contains("https://openalex.org/W1").unwrap());
        assert!(!store.is_new("https://openalex.org/W1").unwrap());
        assert!(!store.is_new("https://openalex.org/W1").unwrap());
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn seen_ids_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seen.db");

        {
            let store = SqliteSeenStore::open(&path).unwrap();
            assert!(store.is_new("W1").unwrap());
        }

        let reopened = SqliteSeenStore::open(&path).unwrap();
        assert!(!reopened.is_new("W1").unwrap());
        assert!(reopened.is_new("W2").unwrap());
        assert_eq!(reopened.len().unwrap(), 2);
    }

    #[test]
    fn open_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("data").join("seen.db");

        let store = SqliteSeenStore::open(&path).unwrap();
        assert!(path.exists());
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn ids_are_matched_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteSeenStore::open(dir.path().join("seen.db")).unwrap();

        assert!(store.is_new("W1").unwrap());
        assert!(store.is_new("w1").unwrap());
        assert!(store.is_new("W1 ").unwrap());
        assert_eq!(store.len().unwrap(), 3);
    }
}
