//! Credential pool with round-robin rotation.
//!
//! Keys are read once at startup from `GEMINI_API_KEY`,
//! `GEMINI_API_KEY_BACKUP` and `GEMINI_API_KEY_BACKUP_2` through
//! `GEMINI_API_KEY_BACKUP_10`, in that order. Missing or blank variables are
//! skipped.
//!
//! The cursor is shared by every request in the process. Concurrent callers
//! may observe interleaved positions, which is fine: each call still gets a
//! valid key and over `n` calls every key is handed out `floor(n/k)` or
//! `ceil(n/k)` times.

use std::sync::atomic::{AtomicUsize, Ordering};

use secrecy::SecretString;
use tracing::info;

use crate::error::GenerationError;

/// Primary credential variable.
pub const PRIMARY_KEY_VAR: &str = "GEMINI_API_KEY";

/// First backup credential variable; numbered backups follow as
/// `GEMINI_API_KEY_BACKUP_2` and up.
pub const BACKUP_KEY_VAR: &str = "GEMINI_API_KEY_BACKUP";

/// Highest numbered backup that is looked up.
pub const LAST_NUMBERED_BACKUP: u32 = 10;

/// Environment variable names in lookup order.
#[must_use]
pub fn credential_var_names() -> Vec<String> {
    let mut names = vec![PRIMARY_KEY_VAR.to_string(), BACKUP_KEY_VAR.to_string()];
    names.extend((2..=LAST_NUMBERED_BACKUP).map(|i| format!("{BACKUP_KEY_VAR}_{i}")));
    names
}

/// Ordered, immutable set of credentials with a shared rotation cursor.
pub struct KeyRotationPool {
    keys: Vec<SecretString>,
    cursor: AtomicUsize,
}

impl std::fmt::Debug for KeyRotationPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyRotationPool")
            .field("keys", &format_args!("[REDACTED; {}]", self.keys.len()))
            .field("cursor", &self.cursor.load(Ordering::Relaxed))
            .finish()
    }
}

impl KeyRotationPool {
    /// Build a pool from raw key strings, dropping blank ones.
    #[must_use]
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys = keys
            .into_iter()
            .map(Into::into)
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .map(SecretString::new)
            .collect();
        Self {
            keys,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Read credentials from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read credentials through `lookup`, in [`credential_var_names`] order.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let pool = Self::new(credential_var_names().iter().filter_map(|name| lookup(name)));
        info!(credentials = pool.len(), "Loaded generation credentials");
        pool
    }

    /// Hand out the credential under the cursor and advance it.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::PoolEmpty`] if no credentials are configured.
    pub fn next(&self) -> Result<&SecretString, GenerationError> {
        let len = self.keys.len();
        if len == 0 {
            return Err(GenerationError::PoolEmpty);
        }
        let index = self
            .cursor
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |c| Some((c + 1) % len))
            .unwrap_or_else(|current| current);
        Ok(&self.keys[index % len])
    }

    /// Number of credentials.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the pool has no credentials.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn exposed(pool: &KeyRotationPool) -> String {
        pool.next().expect("key").expose_secret().clone()
    }

    #[test]
    fn empty_pool_reports_pool_empty() {
        let pool = KeyRotationPool::new(Vec::<String>::new());
        assert!(pool.is_empty());
        assert!(matches!(pool.next(), Err(GenerationError::PoolEmpty)));
    }

    #[test]
    fn rotation_wraps_in_order() {
        let pool = KeyRotationPool::new(["a", "b", "c"]);
        let seen: Vec<String> = (0..7).map(|_| exposed(&pool)).collect();
        assert_eq!(seen, vec!["a", "b", "c", "a", "b", "c", "a"]);
    }

    #[test]
    fn env_lookup_follows_documented_order_and_skips_blanks() {
        let env: HashMap<&str, &str> = [
            ("GEMINI_API_KEY_BACKUP_10", "ten"),
            ("GEMINI_API_KEY", "primary"),
            ("GEMINI_API_KEY_BACKUP", "  "),
            ("GEMINI_API_KEY_BACKUP_2", "two"),
            ("GEMINI_API_KEY_BACKUP_11", "ignored"),
        ]
        .into_iter()
        .collect();

        let pool = KeyRotationPool::from_lookup(|name| env.get(name).map(ToString::to_string));
        assert_eq!(pool.len(), 3);
        assert_eq!(exposed(&pool), "primary");
        assert_eq!(exposed(&pool), "two");
        assert_eq!(exposed(&pool), "ten");
    }

    #[test]
    fn var_names_cover_primary_and_ten_backups() {
        let names = credential_var_names();
        assert_eq!(names.len(), 11);
        assert_eq!(names[0], "GEMINI_API_KEY");
        assert_eq!(names[1], "GEMINI_API_KEY_BACKUP");
        assert_eq!(names[10], "GEMINI_API_KEY_BACKUP_10");
    }

    #[test]
    fn debug_output_is_redacted() {
        let pool = KeyRotationPool::new(["super-secret"]);
        let rendered = format!("{pool:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("REDACTED"));
    }
}
