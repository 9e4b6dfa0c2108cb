//! Profile persistence — the account store behind player progress.
//!
//! [`ProfileRepository`] is the contract the rest of the system writes
//! through. Two implementations ship here: [`SqliteProfileRepository`] for
//! real deployments and [`MemoryProfileRepository`] for tests and
//! throwaway servers.
//!
//! The SQLite schema keeps progress as a JSON document next to a nullable
//! `total_reward` column the leaderboard sorts on:
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS profiles (
//!     account_id   TEXT PRIMARY KEY,
//!     display_name TEXT UNIQUE,
//!     total_reward INTEGER,
//!     progress     BLOB NOT NULL,
//!     updated_at   TEXT NOT NULL
//! );
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use tracing::{debug, info, warn};

use crate::config::PersistenceConfig;
use crate::error::{CoreError, Result};
use crate::types::{AccountId, Profile, ProfileSummary, ProgressRecord};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS profiles (
    account_id   TEXT PRIMARY KEY,
    display_name TEXT UNIQUE,
    total_reward INTEGER,
    progress     BLOB NOT NULL,
    updated_at   TEXT NOT NULL
);";

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

/// Durable account store.
pub trait ProfileRepository: Send + Sync {
    /// Register a new profile under `display_name`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DuplicateName`] if the name is taken, or a
    /// storage error.
    fn create_profile(&self, display_name: &str) -> Result<Profile>;

    /// Fetch a profile, `None` if the account has never been stored.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    fn get_profile(&self, account: AccountId) -> Result<Option<Profile>>;

    /// Replace an account's progress, creating a nameless profile if none
    /// exists yet.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    fn update_progress(&self, account: AccountId, progress: &ProgressRecord) -> Result<()>;

    /// Name and total of every stored profile, unordered.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    fn list_summaries(&self) -> Result<Vec<ProfileSummary>>;
}

// ---------------------------------------------------------------------------
// SQLite
// ---------------------------------------------------------------------------

/// Profile store backed by a single SQLite database.
pub struct SqliteProfileRepository {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl std::fmt::Debug for SqliteProfileRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteProfileRepository")
            .field("db_path", &self.db_path)
            .finish_non_exhaustive()
    }
}

impl SqliteProfileRepository {
    /// Open (or create) the database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Database`] on SQLite failures.
    pub fn open<P: AsRef<Path>>(path: P, config: &PersistenceConfig) -> Result<Self> {
        let db_path = path.as_ref().to_path_buf();
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = Connection::open_with_flags(&db_path, flags)?;

        if config.wal_mode {
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        }
        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
        conn.execute_batch("PRAGMA busy_timeout = 5000;")?;
        conn.execute_batch(SCHEMA)?;

        info!(
            path = %db_path.display(),
            wal = config.wal_mode,
            "Profile store opened"
        );

        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
        })
    }

    /// Open an in-memory database (useful for tests).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Database`] on SQLite failures.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path: PathBuf::from(":memory:"),
        })
    }

    /// Path to the database file (or `:memory:`).
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Run SQLite's integrity check.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Database`] if the check itself fails.
    pub fn integrity_check(&self) -> Result<bool> {
        let conn = self.conn.lock();
        let result: String = conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        Ok(result == "ok")
    }
}

fn encode_progress(progress: &ProgressRecord) -> Result<Vec<u8>> {
    serde_json::to_vec(progress).map_err(|e| CoreError::Serialization(e.to_string()))
}

fn decode_progress(data: &[u8]) -> Result<ProgressRecord> {
    serde_json::from_slice(data).map_err(|e| CoreError::Serialization(e.to_string()))
}

impl ProfileRepository for SqliteProfileRepository {
    fn create_profile(&self, display_name: &str) -> Result<Profile> {
        let conn = self.conn.lock();

        let taken: Option<String> = conn
            .query_row(
                "SELECT account_id FROM profiles WHERE display_name = ?1",
                params![display_name],
                |row| row.get(0),
            )
            .optional()?;
        if taken.is_some() {
            return Err(CoreError::DuplicateName(display_name.to_string()));
        }

        let profile = Profile {
            account_id: AccountId::new(),
            display_name: Some(display_name.to_string()),
            progress: ProgressRecord::default(),
        };
        conn.execute(
            "INSERT INTO profiles (account_id, display_name, total_reward, progress, updated_at)
             VALUES (?1, ?2, NULL, ?3, ?4)",
            params![
                profile.account_id.to_string(),
                display_name,
                encode_progress(&profile.progress)?,
                Utc::now().to_rfc3339()
            ],
        )?;

        info!(account = %profile.account_id, name = %display_name, "Profile created");
        Ok(profile)
    }

    fn get_profile(&self, account: AccountId) -> Result<Option<Profile>> {
        let start = Instant::now();
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT display_name, progress FROM profiles WHERE account_id = ?1",
        )?;

        let row: Option<(Option<String>, Vec<u8>)> = stmt
            .query_row(params![account.to_string()], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .optional()?;

        let Some((display_name, data)) = row else {
            return Ok(None);
        };

        let progress = decode_progress(&data)?;
        debug!(
            account = %account,
            total = progress.total_reward,
            elapsed_us = start.elapsed().as_micros(),
            "Loaded profile"
        );

        Ok(Some(Profile {
            account_id: account,
            display_name,
            progress,
        }))
    }

    fn update_progress(&self, account: AccountId, progress: &ProgressRecord) -> Result<()> {
        let start = Instant::now();
        let data = encode_progress(progress)?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO profiles (account_id, display_name, total_reward, progress, updated_at)
             VALUES (?1, NULL, ?2, ?3, ?4)
             ON CONFLICT(account_id) DO UPDATE SET
                total_reward = excluded.total_reward,
                progress = excluded.progress,
                updated_at = excluded.updated_at",
            params![
                account.to_string(),
                progress.total_reward,
                data,
                Utc::now().to_rfc3339()
            ],
        )?;

        debug!(
            account = %account,
            total = progress.total_reward,
            bytes = data.len(),
            elapsed_us = start.elapsed().as_micros(),
            "Saved progress"
        );
        Ok(())
    }

    fn list_summaries(&self) -> Result<Vec<ProfileSummary>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached("SELECT display_name, total_reward FROM profiles")?;
        let rows = stmt.query_map([], |row| {
            Ok(ProfileSummary {
                display_name: row.get(0)?,
                total_reward: row.get(1)?,
            })
        })?;

        let mut summaries = Vec::new();
        for row in rows {
            match row {
                Ok(summary) => summaries.push(summary),
                Err(e) => warn!(error = %e, "Skipping unreadable profile row"),
            }
        }
        Ok(summaries)
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// Non-durable profile store.
#[derive(Debug, Default)]
pub struct MemoryProfileRepository {
    profiles: RwLock<HashMap<AccountId, Profile>>,
}

impl MemoryProfileRepository {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a profile as-is, replacing any existing one.
    pub fn insert(&self, profile: Profile) {
        self.profiles.write().insert(profile.account_id, profile);
    }
}

impl ProfileRepository for MemoryProfileRepository {
    fn create_profile(&self, display_name: &str) -> Result<Profile> {
        let mut profiles = self.profiles.write();
        if profiles
            .values()
            .any(|p| p.display_name.as_deref() == Some(display_name))
        {
            return Err(CoreError::DuplicateName(display_name.to_string()));
        }
        let profile = Profile {
            account_id: AccountId::new(),
            display_name: Some(display_name.to_string()),
            progress: ProgressRecord::default(),
        };
        profiles.insert(profile.account_id, profile.clone());
        Ok(profile)
    }

    fn get_profile(&self, account: AccountId) -> Result<Option<Profile>> {
        Ok(self.profiles.read().get(&account).cloned())
    }

    fn update_progress(&self, account: AccountId, progress: &ProgressRecord) -> Result<()> {
        self.profiles
            .write()
            .entry(account)
            .and_modify(|p| p.progress = progress.clone())
            .or_insert_with(|| Profile {
                account_id: account,
                display_name: None,
                progress: progress.clone(),
            });
        Ok(())
    }

    fn list_summaries(&self) -> Result<Vec<ProfileSummary>> {
        Ok(self
            .profiles
            .read()
            .values()
            .map(|p| ProfileSummary {
                display_name: p.display_name.clone(),
                total_reward: (!p.progress.completed_vendor_ids.is_empty())
                    .then_some(p.progress.total_reward),
            })
            .collect())
    }
}
