// SQLite Database Connection Management
// One explicitly constructed handle, cloned into every repository and worker

use rusqlite::{Connection, Result as SqliteResult};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::schema;

/// Default database file name
pub const DATABASE_FILE: &str = "vulnstore.db";

/// Pause between startup open attempts
pub const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Thread-safe database wrapper
/// Uses Arc<Mutex<Connection>> so concurrent writers serialize on one connection
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) a database file
    /// Automatically enables WAL mode and runs migrations
    pub fn new(path: PathBuf) -> Result<Self, String> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| format!("Failed to create database directory: {}", e))?;
            }
        }

        let conn = Connection::open(&path)
            .map_err(|e| format!("Failed to open database: {}", e))?;

        Self::configure(conn)
    }

    /// Open a private in-memory database (tests and dry runs)
    pub fn in_memory() -> Result<Self, String> {
        let conn = Connection::open_in_memory()
            .map_err(|e| format!("Failed to open in-memory database: {}", e))?;

        Self::configure(conn)
    }

    /// Open the database, retrying with a fixed delay between attempts
    pub fn open_with_retry(path: &Path, attempts: u32, delay: Duration) -> Result<Self, String> {
        let attempts = attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match Self::new(path.to_path_buf()) {
                Ok(db) => {
                    log::info!("[database] Opened {} (attempt {})", path.display(), attempt);
                    return Ok(db);
                }
                Err(e) => {
                    log::error!(
                        "[database] Open attempt {}/{} failed for {}: {}",
                        attempt,
                        attempts,
                        path.display(),
                        e
                    );
                    last_error = e;
                }
            }

            if attempt < attempts {
                std::thread::sleep(delay);
            }
        }

        Err(format!(
            "Database unavailable after {} attempts: {}",
            attempts, last_error
        ))
    }

    fn configure(conn: Connection) -> Result<Self, String> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA busy_timeout=5000;
            PRAGMA synchronous=NORMAL;
            PRAGMA foreign_keys=ON;
            "#,
        )
        .map_err(|e| format!("Failed to configure database: {}", e))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.run_migrations()?;

        Ok(db)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, String> {
        self.conn
            .lock()
            .map_err(|e| format!("Failed to acquire database lock: {}", e))
    }

    fn run_migrations(&self) -> Result<(), String> {
        let conn = self.lock()?;
        schema::run_migrations(&conn)
    }

    /// Execute a function with the database connection
    pub fn with_connection<T, F>(&self, f: F) -> Result<T, String>
    where
        F: FnOnce(&Connection) -> Result<T, String>,
    {
        let conn = self.lock()?;
        f(&conn)
    }

    /// Execute a function with the database connection (raw SQLite result)
    pub fn with_connection_raw<T, F>(&self, f: F) -> Result<T, String>
    where
        F: FnOnce(&Connection) -> SqliteResult<T>,
    {
        let conn = self.lock()?;
        f(&conn).map_err(|e| format!("Database error: {}", e))
    }

    /// Execute a function inside a transaction
    /// Commits on success; the transaction rolls back when dropped on error
    pub fn with_transaction<T, F>(&self, f: F) -> Result<T, String>
    where
        F: FnOnce(&Connection) -> Result<T, String>,
    {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| format!("Failed to start transaction: {}", e))?;

        let result = f(&tx)?;
        tx.commit()
            .map_err(|e| format!("Failed to commit transaction: {}", e))?;
        Ok(result)
    }

    /// Get the current schema version
    pub fn schema_version(&self) -> Result<i32, String> {
        self.with_connection(|conn| schema::get_version(conn))
    }
}
