use crate::logging;
use chrono::{DateTime, Utc};
use eyre::{Result, WrapErr};
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

use crate::settings::{SETTINGS_KEY, Settings};

/// Key-value persistence for the overlay settings record.
pub trait SettingsStore {
    /// The raw persisted record, if any.
    fn get(&self) -> Result<Option<Value>>;
    fn set(&mut self, value: &Value) -> Result<()>;
    fn kind(&self) -> &'static str;

    /// Persisted record merged over the defaults.
    fn load_settings(&self) -> Result<Settings> {
        Ok(Settings::from_persisted(self.get()?.as_ref()))
    }

    fn save_settings(&mut self, settings: &Settings) -> Result<()> {
        self.set(&settings.to_value())
    }
}

pub type SharedStore = Rc<RefCell<dyn SettingsStore>>;

/// Durable store: one SQLite table of JSON values keyed by name.
pub struct SqliteStore {
    conn: Connection,
    key: String,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .wrap_err_with(|| format!("cannot open storage at {}", path.display()))?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        Self::init_db(&conn)?;
        Ok(Self {
            conn,
            key: SETTINGS_KEY.to_string(),
        })
    }

    fn init_db(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS storage (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at DATETIME DEFAULT (datetime('now'))
            );
            ",
        )?;
        Ok(())
    }

    /// When the record was last written.
    pub fn updated_at(&self) -> Result<Option<DateTime<Utc>>> {
        let stamp = self
            .conn
            .query_row(
                "SELECT updated_at FROM storage WHERE key=?",
                params![self.key],
                |row| row.get::<_, DateTime<Utc>>(0),
            )
            .optional()?;
        Ok(stamp)
    }
}

impl SettingsStore for SqliteStore {
    fn get(&self) -> Result<Option<Value>> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM storage WHERE key=?",
                params![self.key],
                |row| row.get(0),
            )
            .optional()?;
        match raw {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(value) => Ok(Some(value)),
                Err(err) => {
                    logging::warn("storage", format!("discarding unreadable record: {err}"));
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    fn set(&mut self, value: &Value) -> Result<()> {
        self.conn.execute(
            "INSERT INTO storage (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value=excluded.value, updated_at=excluded.updated_at",
            params![self.key, serde_json::to_string(value)?, Utc::now()],
        )?;
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "sqlite"
    }
}

/// In-process fallback; clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Rc<RefCell<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemoryStore {
    fn get(&self) -> Result<Option<Value>> {
        let entries = self.entries.borrow();
        Ok(entries
            .get(SETTINGS_KEY)
            .and_then(|raw| serde_json::from_str(raw).ok()))
    }

    fn set(&mut self, value: &Value) -> Result<()> {
        self.entries
            .borrow_mut()
            .insert(SETTINGS_KEY.to_string(), serde_json::to_string(value)?);
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}

/// The durable store, or the in-process fallback when it cannot be opened.
pub fn open_settings_store(path: &Path) -> SharedStore {
    match SqliteStore::open(path) {
        Ok(store) => Rc::new(RefCell::new(store)),
        Err(err) => {
            logging::warn(
                "storage",
                format!("durable storage unavailable ({err:#}); using in-memory settings"),
            );
            Rc::new(RefCell::new(MemoryStore::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::NextBehavior;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_sqlite_last_write_wins() -> Result<()> {
        let mut store = SqliteStore::in_memory()?;
        assert_eq!(store.get()?, None);
        assert_eq!(store.load_settings()?, Settings::default());

        store.set(&json!({ "skipTime": 60 }))?;
        store.set(&json!({ "skipTime": 120, "nextBehavior": "manual" }))?;
        let settings = store.load_settings()?;
        assert_eq!(settings.skip_time, 120);
        assert_eq!(settings.next_behavior, NextBehavior::Manual);
        assert!(store.updated_at()?.is_some());
        Ok(())
    }

    #[test]
    fn test_sqlite_persists_across_connections() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("nested").join("storage.db");
        {
            let mut store = SqliteStore::open(&path)?;
            store.save_settings(&Settings {
                skip_time: 150,
                ..Settings::default()
            })?;
        }
        let store = SqliteStore::open(&path)?;
        assert_eq!(store.load_settings()?.skip_time, 150);
        Ok(())
    }

    #[test]
    fn test_memory_store_clones_share_entries() -> Result<()> {
        let store = MemoryStore::new();
        let mut writer = store.clone();
        writer.set(&json!({ "nextButtonEnabled": false }))?;
        assert!(!store.load_settings()?.next_button_enabled);
        Ok(())
    }

    #[test]
    fn test_unopenable_path_falls_back_to_memory() -> Result<()> {
        let dir = tempdir()?;
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "not a directory")?;
        let store = open_settings_store(&blocker.join("storage.db"));
        assert_eq!(store.borrow().kind(), "memory");
        Ok(())
    }
}
