//! Database access layer with connection pooling and migrations
//!
//! This module is organized by domain:
//! - `imports` - Import job lifecycle and counters
//! - `mappings` - Mapping registry, generic over users and books
//! - `sessions` - Session registration, listing and explicit transitions
//! - `recompute` - Batch re-derivation of session status
//! - `progress` - Playback progress mirror
//! - `stats` - Reconciliation counts

use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use tracing::info;

use crate::error::{Error, Result};

mod imports;
mod mappings;
mod progress;
mod recompute;
mod sessions;
mod stats;

pub use mappings::MappingKind;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Environment variable for database encryption key
pub const DB_KEY_ENV: &str = "RESHELF_DB_KEY";

/// Derive an encryption key from a passphrase using Argon2
///
/// Uses a fixed application salt so the same passphrase always produces the same key,
/// regardless of database path.
fn derive_key(passphrase: &str) -> Result<String> {
    use argon2::{password_hash::SaltString, Argon2, PasswordHasher};

    // Fixed application salt - changing this would invalidate all existing encrypted databases
    const APP_SALT: &[u8; 16] = b"reshelf-salt-v01";

    let salt = SaltString::encode_b64(APP_SALT)
        .map_err(|e| Error::Encryption(format!("Failed to create salt: {}", e)))?;

    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(passphrase.as_bytes(), &salt)
        .map_err(|e| Error::Encryption(format!("Failed to derive key: {}", e)))?;

    let hash_str = hash
        .hash
        .ok_or_else(|| Error::Encryption("No hash output".to_string()))?;
    Ok(hex::encode(hash_str.as_bytes()))
}

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parse a SQLite datetime string into a DateTime<Utc>
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    chrono::NaiveDateTime::parse_from_str(s, DATETIME_FORMAT)
        .map(|dt| dt.and_utc())
        .unwrap_or_else(|_| Utc::now())
}

pub(crate) fn parse_optional_datetime(s: Option<String>) -> Option<DateTime<Utc>> {
    s.as_deref().map(parse_datetime)
}

/// Format a timestamp the way SQLite's CURRENT_TIMESTAMP does
pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.format(DATETIME_FORMAT).to_string()
}

/// Database wrapper with connection pooling
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    /// Opened with an SQLCipher key
    encrypted: bool,
}

impl Database {
    /// Create a new database connection pool with encryption
    ///
    /// Requires `RESHELF_DB_KEY` environment variable to be set. Use
    /// `new_unencrypted()` for development/testing without encryption.
    pub fn new(path: &str) -> Result<Self> {
        match std::env::var(DB_KEY_ENV).ok() {
            Some(key) => Self::new_with_key(path, Some(&key)),
            None => Err(Error::Encryption(format!(
                "Database encryption required. Set {} environment variable with your passphrase, \
                or use --no-encrypt for unencrypted databases.",
                DB_KEY_ENV
            ))),
        }
    }

    /// Create a new unencrypted database connection pool
    pub fn new_unencrypted(path: &str) -> Result<Self> {
        Self::new_with_key(path, None)
    }

    /// Create a new database with an explicit encryption key
    pub fn new_with_key(path: &str, passphrase: Option<&str>) -> Result<Self> {
        let encrypted = passphrase.is_some();
        let key_pragma = match passphrase {
            Some(pass) => Some(format!("PRAGMA key = 'x\"{}\"';", derive_key(pass)?)),
            None => None,
        };

        // Pragmas are per-connection
        let manager = SqliteConnectionManager::file(path).with_init(move |conn| {
            if let Some(ref pragma) = key_pragma {
                conn.execute_batch(pragma)?;
            }
            conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")?;
            Ok(())
        });

        let pool = Pool::builder().max_size(10).build(manager)?;

        let db = Self {
            pool,
            encrypted,
        };
        db.run_migrations()?;

        Ok(db)
    }

    /// Create a throwaway database (for testing)
    ///
    /// Note: Uses a temporary file rather than `:memory:` because every pooled
    /// connection to `:memory:` would see its own empty database.
    pub fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "reshelf_test_{}_{}.db",
            std::process::id(),
            id
        ));
        let path = path.to_string_lossy().into_owned();

        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", path, suffix));
        }

        Self::new_unencrypted(&path)
    }

    /// Whether this handle was opened with a passphrase
    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- WAL mode: readers don't block the single writer
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;

            -- Import jobs (one per external backup)
            CREATE TABLE IF NOT EXISTS imports (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                backup_path TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL DEFAULT 'pending',   -- pending, mapping, importing, completed, failed
                total_users INTEGER NOT NULL DEFAULT 0,
                total_books INTEGER NOT NULL DEFAULT 0,
                total_sessions INTEGER NOT NULL DEFAULT 0,
                users_mapped INTEGER NOT NULL DEFAULT 0,
                books_mapped INTEGER NOT NULL DEFAULT 0,
                sessions_imported INTEGER NOT NULL DEFAULT 0,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_imports_created ON imports(created_at);

            -- External users and their catalog counterparts
            CREATE TABLE IF NOT EXISTS user_mappings (
                import_id TEXT NOT NULL REFERENCES imports(id) ON DELETE CASCADE,
                external_id TEXT NOT NULL,
                external_username TEXT NOT NULL,
                external_email TEXT,
                internal_id TEXT,                          -- NULL = unmapped
                internal_name TEXT,
                internal_detail TEXT,
                mapped_at DATETIME,                        -- set iff internal_id is set
                session_count INTEGER NOT NULL DEFAULT 0,
                total_listen_secs REAL NOT NULL DEFAULT 0,
                confidence REAL NOT NULL DEFAULT 0 CHECK (confidence >= 0 AND confidence <= 1),
                match_reason TEXT,
                suggestions TEXT NOT NULL DEFAULT '[]',    -- JSON: ordered MatchSuggestion list
                PRIMARY KEY (import_id, external_id),
                CHECK ((internal_id IS NULL) = (mapped_at IS NULL))
            );

            CREATE INDEX IF NOT EXISTS idx_user_mappings_name ON user_mappings(import_id, external_username);
            CREATE INDEX IF NOT EXISTS idx_user_mappings_internal ON user_mappings(import_id, internal_id);

            -- External library items and their catalog counterparts
            CREATE TABLE IF NOT EXISTS book_mappings (
                import_id TEXT NOT NULL REFERENCES imports(id) ON DELETE CASCADE,
                external_id TEXT NOT NULL,
                external_title TEXT NOT NULL,
                external_author TEXT,
                external_asin TEXT,
                external_isbn TEXT,
                duration_secs REAL NOT NULL DEFAULT 0,
                internal_id TEXT,                          -- NULL = unmapped
                internal_name TEXT,
                internal_detail TEXT,
                mapped_at DATETIME,                        -- set iff internal_id is set
                confidence REAL NOT NULL DEFAULT 0 CHECK (confidence >= 0 AND confidence <= 1),
                match_reason TEXT,
                suggestions TEXT NOT NULL DEFAULT '[]',    -- JSON: ordered MatchSuggestion list
                PRIMARY KEY (import_id, external_id),
                CHECK ((internal_id IS NULL) = (mapped_at IS NULL))
            );

            CREATE INDEX IF NOT EXISTS idx_book_mappings_title ON book_mappings(import_id, external_title);
            CREATE INDEX IF NOT EXISTS idx_book_mappings_internal ON book_mappings(import_id, internal_id);

            -- Listening sessions; status is derived from the mapping tables
            CREATE TABLE IF NOT EXISTS import_sessions (
                import_id TEXT NOT NULL REFERENCES imports(id) ON DELETE CASCADE,
                external_session_id TEXT NOT NULL,
                external_user_id TEXT NOT NULL,
                external_media_id TEXT NOT NULL,
                started_at DATETIME NOT NULL,
                duration_secs REAL NOT NULL DEFAULT 0,
                start_position REAL NOT NULL DEFAULT 0,
                end_position REAL NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'pending_user'
                    CHECK (status IN ('pending_user', 'pending_book', 'ready', 'imported', 'skipped')),
                imported_at DATETIME,
                skip_reason TEXT,
                PRIMARY KEY (import_id, external_session_id)
            );

            CREATE INDEX IF NOT EXISTS idx_import_sessions_status ON import_sessions(import_id, status);
            CREATE INDEX IF NOT EXISTS idx_import_sessions_started ON import_sessions(import_id, started_at);
            CREATE INDEX IF NOT EXISTS idx_import_sessions_user ON import_sessions(import_id, external_user_id);
            CREATE INDEX IF NOT EXISTS idx_import_sessions_media ON import_sessions(import_id, external_media_id);

            -- Playback progress; status is owned by the downstream importer
            CREATE TABLE IF NOT EXISTS import_progress (
                import_id TEXT NOT NULL REFERENCES imports(id) ON DELETE CASCADE,
                external_user_id TEXT NOT NULL,
                external_media_id TEXT NOT NULL,
                current_position REAL NOT NULL DEFAULT 0,  -- playback position (seconds)
                duration REAL NOT NULL DEFAULT 0,
                progress REAL NOT NULL DEFAULT 0,
                is_finished BOOLEAN NOT NULL DEFAULT 0,
                finished_at DATETIME,
                last_update DATETIME NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',    -- pending, imported, skipped
                imported_at DATETIME,
                PRIMARY KEY (import_id, external_user_id, external_media_id)
            );

            CREATE INDEX IF NOT EXISTS idx_import_progress_user ON import_progress(import_id, external_user_id, last_update);
            CREATE INDEX IF NOT EXISTS idx_import_progress_status ON import_progress(import_id, status);
            "#,
        )?;

        info!("Database schema initialized");
        Ok(())
    }
}
