use rusqlite::{params, Connection, OptionalExtension, Result as SqlResult, Row};
use serde::Serialize;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS frames (
        id             INTEGER PRIMARY KEY AUTOINCREMENT,
        session        TEXT    NOT NULL,
        identifier     TEXT    NOT NULL,
        captured_at    REAL    NOT NULL,
        path           TEXT    NOT NULL,
        size_bytes     INTEGER NOT NULL,
        archived_at_ms INTEGER NOT NULL,
        UNIQUE(session, identifier)
    );
    CREATE INDEX IF NOT EXISTS idx_frames_time
        ON frames(session, captured_at);";

/// SQLite index of every frame handed to the archive directory.
///
/// One file per archive root: `{dir}/catalog.db`. This is what a downstream
/// indexer reads to find new frames and their capture timestamps.
///
/// WAL mode is enabled so an indexer can read while the recorder writes.
pub struct FrameCatalog {
    conn: Mutex<Connection>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogEntry {
    pub session: String,
    pub identifier: String,
    /// Session-relative capture time in seconds.
    pub captured_at: f64,
    pub path: String,
    pub size_bytes: i64,
    /// Unix millis when the frame was archived.
    pub archived_at_ms: i64,
}

impl FrameCatalog {
    /// Open (or create) the catalog in `dir`, creating `dir` if needed.
    pub fn open(dir: &Path) -> SqlResult<Self> {
        std::fs::create_dir_all(dir).map_err(|_e| rusqlite::Error::InvalidPath(dir.into()))?;

        let db_path = dir.join("catalog.db");
        let conn = Connection::open(&db_path)?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        conn.execute_batch(SCHEMA)?;

        info!(path = db_path.display().to_string(), "frame catalog opened");

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory catalog, used by tests.
    #[cfg(test)]
    pub fn open_in_memory() -> SqlResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        // A panic while holding the lock leaves the connection itself intact.
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record an archived frame. Re-archiving the same identifier in the same
    /// session replaces the row, so retried hand-offs do not duplicate.
    pub fn upsert(&self, entry: &CatalogEntry) -> SqlResult<()> {
        self.lock().execute(
            "INSERT INTO frames (session, identifier, captured_at, path, size_bytes, archived_at_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(session, identifier) DO UPDATE SET
                captured_at    = excluded.captured_at,
                path           = excluded.path,
                size_bytes     = excluded.size_bytes,
                archived_at_ms = excluded.archived_at_ms",
            params![
                entry.session,
                entry.identifier,
                entry.captured_at,
                entry.path,
                entry.size_bytes,
                entry.archived_at_ms,
            ],
        )?;
        debug!(session = entry.session, identifier = entry.identifier, "catalogued frame");
        Ok(())
    }

    /// All frames of a session in capture order.
    pub fn session_frames(&self, session: &str) -> SqlResult<Vec<CatalogEntry>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT session, identifier, captured_at, path, size_bytes, archived_at_ms
             FROM frames WHERE session = ?1 ORDER BY captured_at ASC, identifier ASC",
        )?;
        let rows = stmt.query_map(params![session], entry_from_row)?;
        let entries = rows.collect::<SqlResult<Vec<_>>>()?;
        Ok(entries)
    }

    pub fn get(&self, session: &str, identifier: &str) -> SqlResult<Option<CatalogEntry>> {
        self.lock()
            .query_row(
                "SELECT session, identifier, captured_at, path, size_bytes, archived_at_ms
                 FROM frames WHERE session = ?1 AND identifier = ?2",
                params![session, identifier],
                entry_from_row,
            )
            .optional()
    }

    pub fn count(&self) -> SqlResult<i64> {
        self.lock()
            .query_row("SELECT COUNT(*) FROM frames", [], |row| row.get(0))
    }
}

fn entry_from_row(row: &Row<'_>) -> SqlResult<CatalogEntry> {
    Ok(CatalogEntry {
        session: row.get(0)?,
        identifier: row.get(1)?,
        captured_at: row.get(2)?,
        path: row.get(3)?,
        size_bytes: row.get(4)?,
        archived_at_ms: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(identifier: &str, captured_at: f64, size: i64) -> CatalogEntry {
        CatalogEntry {
            session: "s1".into(),
            identifier: identifier.into(),
            captured_at,
            path: format!("/archive/s1/{identifier}"),
            size_bytes: size,
            archived_at_ms: 1_700_000_000_000,
        }
    }

    #[test]
    fn upsert_and_list_in_capture_order() {
        let catalog = FrameCatalog::open_in_memory().unwrap();
        catalog.upsert(&entry("frame_2.000.jpg", 2.0, 10)).unwrap();
        catalog.upsert(&entry("frame_0.500.jpg", 0.5, 10)).unwrap();

        let frames = catalog.session_frames("s1").unwrap();
        let ids: Vec<&str> = frames.iter().map(|f| f.identifier.as_str()).collect();
        assert_eq!(ids, vec!["frame_0.500.jpg", "frame_2.000.jpg"]);
        assert!(catalog.session_frames("other").unwrap().is_empty());
    }

    #[test]
    fn re_archiving_replaces_row() {
        let catalog = FrameCatalog::open_in_memory().unwrap();
        catalog.upsert(&entry("frame_1.000.jpg", 1.0, 10)).unwrap();
        catalog.upsert(&entry("frame_1.000.jpg", 1.0, 99)).unwrap();

        assert_eq!(catalog.count().unwrap(), 1);
        let row = catalog.get("s1", "frame_1.000.jpg").unwrap().unwrap();
        assert_eq!(row.size_bytes, 99);
        assert!(catalog.get("s1", "missing.jpg").unwrap().is_none());
    }

    #[test]
    fn open_creates_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("archive");
        let catalog = FrameCatalog::open(&root).unwrap();
        catalog.upsert(&entry("frame_0.000.jpg", 0.0, 1)).unwrap();
        assert!(root.join("catalog.db").exists());

        drop(catalog);
        let reopened = FrameCatalog::open(&root).unwrap();
        assert_eq!(reopened.count().unwrap(), 1);
    }
}
