//! Key/value storage that outlives a single run of the client.
//!
//! This plays the role of a browser's local storage: the session token is
//! written under [AUTH_TOKEN_KEY] and read back on start up.

use std::{
    collections::HashMap,
    path::Path,
    sync::{Arc, Mutex},
};

use rusqlite::{Connection, OptionalExtension};

use crate::Error;

/// The key the session token is stored under.
pub const AUTH_TOKEN_KEY: &str = "auth_token";

/// Persists string values under string keys.
pub trait LocalStorage: Send + Sync {
    /// Get the value stored under `key`.
    fn get(&self, key: &str) -> Result<Option<String>, Error>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<(), Error>;

    /// Remove the value stored under `key`. Missing keys are not an error.
    fn remove(&self, key: &str) -> Result<(), Error>;
}

/// Storage that only lives as long as the process.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    items: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    /// Create an empty storage.
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let items = self.items.lock().map_err(|_| Error::StorageLockError)?;

        Ok(items.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        self.items
            .lock()
            .map_err(|_| Error::StorageLockError)?
            .insert(key.to_owned(), value.to_owned());

        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), Error> {
        self.items
            .lock()
            .map_err(|_| Error::StorageLockError)?
            .remove(key);

        Ok(())
    }
}

/// Storage backed by a SQLite database file.
#[derive(Debug, Clone)]
pub struct SqliteStorage {
    connection: Arc<Mutex<Connection>>,
}

impl SqliteStorage {
    /// Open (or create) the storage database at `path`.
    ///
    /// # Errors
    /// Returns [Error::SqlError] if the database cannot be opened or the
    /// storage table cannot be created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Create the storage from an existing connection, e.g. an in-memory
    /// database.
    ///
    /// # Errors
    /// Returns [Error::SqlError] if the storage table cannot be created.
    pub fn from_connection(connection: Connection) -> Result<Self, Error> {
        create_storage_table(&connection)?;

        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }
}

impl LocalStorage for SqliteStorage {
    fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let connection = self
            .connection
            .lock()
            .map_err(|_| Error::StorageLockError)?;

        connection
            .query_row(
                "SELECT value FROM local_storage WHERE key = ?1",
                [key],
                |row| row.get(0),
            )
            .optional()
            .map_err(Error::from)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        let connection = self
            .connection
            .lock()
            .map_err(|_| Error::StorageLockError)?;

        connection.execute(
            "INSERT INTO local_storage (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            (key, value),
        )?;

        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), Error> {
        let connection = self
            .connection
            .lock()
            .map_err(|_| Error::StorageLockError)?;

        connection.execute("DELETE FROM local_storage WHERE key = ?1", [key])?;

        Ok(())
    }
}

fn create_storage_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS local_storage (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
                )",
        (),
    )?;

    Ok(())
}
