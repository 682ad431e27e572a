//! Cache namespace storage trait and SQLite implementation.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::snapshot::ResponseSnapshot;

/// Per-namespace overview used by the status report.
#[derive(Debug, Clone)]
pub struct NamespaceSummary {
  /// Namespace name, version tag included.
  pub name: String,
  /// Number of stored snapshots.
  pub entries: u64,
  /// When the newest snapshot was written.
  pub last_cached: Option<DateTime<Utc>>,
}

/// Trait for the persistent namespace storage backend.
///
/// Namespaces are named buckets of (request key -> response snapshot) pairs.
/// A namespace exists exactly while it holds at least one snapshot.
pub trait CacheStorage: Send + Sync {
  /// Store a snapshot under `(namespace, key)`, replacing any previous one.
  fn put(&self, namespace: &str, key: &str, snapshot: &ResponseSnapshot) -> Result<()>;

  /// Read the snapshot stored under `(namespace, key)`.
  #[allow(dead_code)]
  fn get(&self, namespace: &str, key: &str) -> Result<Option<ResponseSnapshot>>;

  /// Read the most recently stored snapshot for `key` across all namespaces.
  fn match_any(&self, key: &str) -> Result<Option<ResponseSnapshot>>;

  /// Names of every namespace currently holding snapshots.
  fn list_namespaces(&self) -> Result<Vec<String>>;

  /// Delete a namespace and everything stored in it.
  fn delete_namespace(&self, namespace: &str) -> Result<()>;

  /// Entry counts and last-write times per namespace.
  fn summaries(&self) -> Result<Vec<NamespaceSummary>>;
}

/// SQLite-based namespace storage.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open (or create) the cache database at the default location.
  pub fn open() -> Result<Self> {
    Self::open_at(&Self::default_path()?)
  }

  /// Open (or create) the cache database at an explicit path.
  pub fn open_at(path: &Path) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;

    Ok(storage)
  }

  /// In-memory database for tests.
  #[cfg(test)]
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory cache database: {}", e))?;

    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;

    Ok(storage)
  }

  /// Get the default database path.
  fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("numcache").join("cache.db"))
  }

  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }
}

/// Schema for the snapshot table.
const CACHE_SCHEMA: &str = r#"
-- Response snapshots, keyed by namespace + request identity
CREATE TABLE IF NOT EXISTS snapshots (
    namespace TEXT NOT NULL,
    request_key TEXT NOT NULL,
    status INTEGER NOT NULL,
    headers BLOB NOT NULL,
    body BLOB NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (namespace, request_key)
);

CREATE INDEX IF NOT EXISTS idx_snapshots_request ON snapshots(request_key);
"#;

impl CacheStorage for SqliteStorage {
  fn put(&self, namespace: &str, key: &str, snapshot: &ResponseSnapshot) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let headers = serde_json::to_vec(&snapshot.headers)
      .map_err(|e| eyre!("Failed to serialize headers: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO snapshots (namespace, request_key, status, headers, body, cached_at)
         VALUES (?, ?, ?, ?, ?, datetime('now'))",
        params![namespace, key, snapshot.status, headers, snapshot.body],
      )
      .map_err(|e| eyre!("Failed to store snapshot: {}", e))?;

    Ok(())
  }

  fn get(&self, namespace: &str, key: &str) -> Result<Option<ResponseSnapshot>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare(
        "SELECT status, headers, body FROM snapshots
         WHERE namespace = ? AND request_key = ?",
      )
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let row: Option<(u16, Vec<u8>, Vec<u8>)> = stmt
      .query_row(params![namespace, key], |row| {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?))
      })
      .ok();

    row.map(row_to_snapshot).transpose()
  }

  fn match_any(&self, key: &str) -> Result<Option<ResponseSnapshot>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    // Newest write wins; on a same-second tie the dynamic namespace sorts
    // ahead of the static one.
    let mut stmt = conn
      .prepare(
        "SELECT status, headers, body FROM snapshots
         WHERE request_key = ?
         ORDER BY cached_at DESC, namespace ASC
         LIMIT 1",
      )
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let row: Option<(u16, Vec<u8>, Vec<u8>)> = stmt
      .query_row(params![key], |row| {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?))
      })
      .ok();

    row.map(row_to_snapshot).transpose()
  }

  fn list_namespaces(&self) -> Result<Vec<String>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare("SELECT DISTINCT namespace FROM snapshots ORDER BY namespace")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let names: Vec<String> = stmt
      .query_map([], |row| row.get(0))
      .map_err(|e| eyre!("Failed to list namespaces: {}", e))?
      .filter_map(|r| r.ok())
      .collect();

    Ok(names)
  }

  fn delete_namespace(&self, namespace: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute("DELETE FROM snapshots WHERE namespace = ?", params![namespace])
      .map_err(|e| eyre!("Failed to delete namespace {}: {}", namespace, e))?;

    Ok(())
  }

  fn summaries(&self) -> Result<Vec<NamespaceSummary>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare(
        "SELECT namespace, COUNT(*), MAX(cached_at) FROM snapshots
         GROUP BY namespace ORDER BY namespace",
      )
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let rows: Vec<(String, u64, Option<String>)> = stmt
      .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
      .map_err(|e| eyre!("Failed to summarize namespaces: {}", e))?
      .filter_map(|r| r.ok())
      .collect();

    rows
      .into_iter()
      .map(|(name, entries, last)| {
        let last_cached = last.map(|s| parse_datetime(&s)).transpose()?;
        Ok(NamespaceSummary {
          name,
          entries,
          last_cached,
        })
      })
      .collect()
  }
}

/// Rebuild a snapshot from its table columns.
fn row_to_snapshot((status, headers, body): (u16, Vec<u8>, Vec<u8>)) -> Result<ResponseSnapshot> {
  let headers: Vec<(String, String)> =
    serde_json::from_slice(&headers).map_err(|e| eyre!("Failed to parse headers: {}", e))?;

  Ok(ResponseSnapshot::new(status, headers, body))
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn snapshot(status: u16, body: &[u8]) -> ResponseSnapshot {
    ResponseSnapshot::new(
      status,
      vec![("content-type".to_string(), "text/html".to_string())],
      body.to_vec(),
    )
  }

  #[test]
  fn test_round_trip_preserves_snapshot() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    let original = snapshot(200, b"<html>shell</html>");

    storage.put("static-v4", "/index.html", &original).unwrap();
    let loaded = storage.get("static-v4", "/index.html").unwrap().unwrap();

    assert_eq!(loaded, original);
    assert_eq!(loaded.body, b"<html>shell</html>");
  }

  #[test]
  fn test_get_misses_for_unknown_key() {
    let storage = SqliteStorage::open_in_memory().unwrap();

    assert!(storage.get("static-v4", "/index.html").unwrap().is_none());
    assert!(storage.match_any("/index.html").unwrap().is_none());
  }

  #[test]
  fn test_put_replaces_existing_snapshot() {
    let storage = SqliteStorage::open_in_memory().unwrap();

    storage.put("dynamic-v4", "/", &snapshot(200, b"old")).unwrap();
    storage.put("dynamic-v4", "/", &snapshot(200, b"new")).unwrap();

    let loaded = storage.get("dynamic-v4", "/").unwrap().unwrap();
    assert_eq!(loaded.body, b"new");

    let summaries = storage.summaries().unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].entries, 1);
  }

  #[test]
  fn test_match_any_searches_every_namespace() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage
      .put("static-v4", "/index.html", &snapshot(200, b"seeded"))
      .unwrap();

    let found = storage.match_any("/index.html").unwrap().unwrap();
    assert_eq!(found.body, b"seeded");
  }

  #[test]
  fn test_match_any_prefers_dynamic_over_static() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage
      .put("static-v4", "/index.html", &snapshot(200, b"installed"))
      .unwrap();
    storage
      .put("dynamic-v4", "/index.html", &snapshot(200, b"revalidated"))
      .unwrap();

    let found = storage.match_any("/index.html").unwrap().unwrap();
    assert_eq!(found.body, b"revalidated");
  }

  #[test]
  fn test_list_and_delete_namespaces() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage.put("static-v3", "/a", &snapshot(200, b"a")).unwrap();
    storage.put("static-v4", "/a", &snapshot(200, b"a")).unwrap();
    storage.put("dynamic-v4", "/b", &snapshot(200, b"b")).unwrap();

    assert_eq!(
      storage.list_namespaces().unwrap(),
      vec!["dynamic-v4", "static-v3", "static-v4"]
    );

    storage.delete_namespace("static-v3").unwrap();

    assert_eq!(
      storage.list_namespaces().unwrap(),
      vec!["dynamic-v4", "static-v4"]
    );
    assert!(storage.get("static-v3", "/a").unwrap().is_none());
  }

  #[test]
  fn test_summaries_report_counts() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage.put("static-v4", "/a", &snapshot(200, b"a")).unwrap();
    storage.put("static-v4", "/b", &snapshot(200, b"b")).unwrap();
    storage.put("dynamic-v4", "/c", &snapshot(200, b"c")).unwrap();

    let summaries = storage.summaries().unwrap();
    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0].name, "dynamic-v4");
    assert_eq!(summaries[0].entries, 1);
    assert_eq!(summaries[1].name, "static-v4");
    assert_eq!(summaries[1].entries, 2);
    assert!(summaries[1].last_cached.is_some());
  }

  #[test]
  fn test_snapshots_persist_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.db");

    {
      let storage = SqliteStorage::open_at(&path).unwrap();
      storage
        .put("static-v4", "/manifest.json", &snapshot(200, b"{}"))
        .unwrap();
    }

    let storage = SqliteStorage::open_at(&path).unwrap();
    let loaded = storage.get("static-v4", "/manifest.json").unwrap().unwrap();
    assert_eq!(loaded.body, b"{}");
  }
}
