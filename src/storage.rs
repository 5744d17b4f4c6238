//! Persistence: a raw key-value backend plus the typed records on top.

use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{debug, warn};

use crate::app_dirs::AppDirs;
use crate::error::StorageError;
use crate::player::PlayerProfile;
use crate::rating::{RatingBook, RatingEntry};
use crate::session::Session;

pub const CURRENT_PLAYER_KEY: &str = "tock.currentPlayer";
pub const LAST_SESSION_KEY: &str = "tock.lastSession";
pub const RATING_KEY: &str = "tock.rating";

/// String key-value backend.
pub trait KvStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
}

/// One backend shared by the app shell and the running session.
pub type SharedStore = Rc<RefCell<dyn KvStore>>;

pub fn shared<K: KvStore + 'static>(kv: K) -> SharedStore {
    Rc::new(RefCell::new(kv))
}

impl<K: KvStore + ?Sized> KvStore for Rc<RefCell<K>> {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.borrow().get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.borrow_mut().set(key, value)
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.borrow_mut().remove(key)
    }
}

/// Process-local store for tests and `--ephemeral` runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.values.remove(key);
        Ok(())
    }
}

/// SQLite-backed store: one `records` table of JSON strings.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open the store at the default state path, creating it if needed.
    pub fn open_default() -> Result<Self, StorageError> {
        let path = AppDirs::db_path().unwrap_or_else(|| PathBuf::from("tock.db"));
        Self::open(path)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "opened record store");
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
            [],
        )?;
        Ok(Self { conn })
    }
}

impl KvStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM records WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.conn.execute(
            r#"
            INSERT INTO records (key, value) VALUES (?1, ?2)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP
            "#,
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.conn
            .execute("DELETE FROM records WHERE key = ?1", params![key])?;
        Ok(())
    }
}

/// The three game records over any [`KvStore`]. Reads never fail: broken or
/// unreadable data comes back as the empty default with a warning.
#[derive(Debug)]
pub struct GameStore<S: KvStore> {
    kv: S,
}

impl<S: KvStore> GameStore<S> {
    pub fn new(kv: S) -> Self {
        Self { kv }
    }

    pub fn current_player(&self) -> Option<PlayerProfile> {
        self.read_json(CURRENT_PLAYER_KEY)
    }

    pub fn save_current_player(&mut self, player: &PlayerProfile) -> Result<(), StorageError> {
        self.write_json(CURRENT_PLAYER_KEY, player)
    }

    pub fn clear_current_player(&mut self) -> Result<(), StorageError> {
        self.kv.remove(CURRENT_PLAYER_KEY)
    }

    pub fn last_session(&self) -> Option<Session> {
        self.read_json(LAST_SESSION_KEY)
    }

    /// `None` stores an explicit null, as a fresh player does.
    pub fn save_session(&mut self, session: Option<&Session>) -> Result<(), StorageError> {
        self.write_json(LAST_SESSION_KEY, &session)
    }

    pub fn rating(&self) -> RatingBook {
        match self.read_raw(RATING_KEY) {
            Some(raw) => match serde_json::from_str::<Value>(&raw) {
                Ok(value) => RatingBook::from_value(value),
                Err(err) => {
                    warn!(key = RATING_KEY, error = %err, "could not parse stored record");
                    RatingBook::default()
                }
            },
            None => RatingBook::default(),
        }
    }

    /// Add an entry to a bucket. Returns its place on that board.
    pub fn push_rating(
        &mut self,
        bucket: &str,
        entry: RatingEntry,
    ) -> Result<Option<usize>, StorageError> {
        let mut book = self.rating();
        let place = book.push(bucket, entry);
        self.write_json(RATING_KEY, &book)?;
        Ok(place)
    }

    pub fn clear_rating(&mut self) -> Result<(), StorageError> {
        self.kv.remove(RATING_KEY)
    }

    fn read_raw(&self, key: &str) -> Option<String> {
        match self.kv.get(key) {
            Ok(value) => value,
            Err(err) => {
                warn!(key, error = %err, "could not read stored record");
                None
            }
        }
    }

    fn read_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.read_raw(key)?;
        match serde_json::from_str::<Option<T>>(&raw) {
            Ok(value) => value,
            Err(err) => {
                warn!(key, error = %err, "could not parse stored record");
                None
            }
        }
    }

    fn write_json<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<(), StorageError> {
        let data = serde_json::to_string(value)?;
        self.kv.set(key, &data)
    }
}
