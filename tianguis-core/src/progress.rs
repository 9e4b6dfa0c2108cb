//! Progress store — applies finished sessions to per-account progress.
//!
//! Each account is loaded from the repository at most once while it stays
//! resident. Until that initial load has completed, writes for the account
//! are refused with [`CoreError::ProgressNotLoaded`] so that a write can never
//! clobber history that simply has not been read yet.
//!
//! Resident accounts live in an LRU of per-account slots. The LRU lock is only
//! held to find a slot; loads and writes hold that account's slot lock, so a
//! slow write for one account never stalls another. An evicted account is
//! simply read again on its next access.
//!
//! `apply_outcome` checks the completed-stand set, persists the updated record
//! and only then commits it to the cache, all under the slot lock. A stand is
//! therefore counted once, and a failed write leaves the cached record
//! untouched so the same outcome can be retried.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::error::{CoreError, Result};
use crate::persistence::ProfileRepository;
use crate::types::{AccountId, ProgressRecord};

/// Accounts kept resident when no capacity is configured.
pub const DEFAULT_CACHE_CAPACITY: usize = 4096;

/// `None` until the account's initial load completes.
type Slot = Arc<Mutex<Option<ProgressRecord>>>;

/// Result of [`ProgressStore::apply_outcome`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    /// The reward was folded in and persisted.
    Recorded(ProgressRecord),
    /// The stand was already completed; nothing changed.
    AlreadyCompleted(ProgressRecord),
}

/// Bounded per-account progress cache in front of a [`ProfileRepository`].
pub struct ProgressStore {
    repository: Arc<dyn ProfileRepository>,
    slots: Mutex<LruCache<AccountId, Slot>>,
}

impl std::fmt::Debug for ProgressStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressStore")
            .field("cached_accounts", &self.cached_accounts())
            .finish_non_exhaustive()
    }
}

impl ProgressStore {
    /// Wrap a repository with [`DEFAULT_CACHE_CAPACITY`].
    #[must_use]
    pub fn new(repository: Arc<dyn ProfileRepository>) -> Self {
        Self::with_capacity(repository, DEFAULT_CACHE_CAPACITY)
    }

    /// Wrap a repository, keeping at most `capacity` accounts resident
    /// (a zero capacity is treated as one).
    #[must_use]
    pub fn with_capacity(repository: Arc<dyn ProfileRepository>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            repository,
            slots: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// The underlying repository.
    #[must_use]
    pub fn repository(&self) -> &Arc<dyn ProfileRepository> {
        &self.repository
    }

    /// Number of accounts currently resident.
    #[must_use]
    pub fn cached_accounts(&self) -> usize {
        self.slots.lock().len()
    }

    /// Load an account's progress, hitting the repository only the first
    /// time. Accounts with no stored profile start from an empty record.
    ///
    /// The slot stays locked for the duration of the first read, so
    /// concurrent callers for the same account wait for it instead of
    /// issuing a second load.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the initial read fails; nothing is cached
    /// in that case and the next call retries the load.
    pub fn load_progress(&self, account: AccountId) -> Result<ProgressRecord> {
        let slot = self.slot(account);
        let mut guard = slot.lock();
        if let Some(record) = guard.as_ref() {
            return Ok(record.clone());
        }

        let record = self
            .repository
            .get_profile(account)?
            .map(|profile| profile.progress)
            .unwrap_or_default();
        debug!(
            account = %account,
            total = record.total_reward,
            stands = record.completed_vendor_ids.len(),
            "Initial progress load"
        );
        *guard = Some(record.clone());
        Ok(record)
    }

    /// Whether the initial load for the account has completed and the
    /// account is still resident.
    #[must_use]
    pub fn is_loaded(&self, account: AccountId) -> bool {
        let slot = self.slots.lock().peek(&account).cloned();
        slot.is_some_and(|slot| slot.lock().is_some())
    }

    /// Fold a finished session's reward into the account's progress and
    /// persist it, unless the stand is already completed.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ProgressNotLoaded`] if the account has not been
    /// loaded (or was evicted since), or a storage error if the write fails.
    pub fn apply_outcome(
        &self,
        account: AccountId,
        stand_id: u32,
        vendor_type: &str,
        reward_amount: u32,
    ) -> Result<Applied> {
        let slot = self.slots.lock().get(&account).cloned();
        let Some(slot) = slot else {
            return Err(Self::suppressed(account, vendor_type));
        };
        let mut guard = slot.lock();
        let Some(cached) = guard.as_mut() else {
            return Err(Self::suppressed(account, vendor_type));
        };

        if cached.has_completed(stand_id) {
            info!(
                account = %account,
                vendor = %vendor_type,
                "Stand already completed, outcome not counted again"
            );
            return Ok(Applied::AlreadyCompleted(cached.clone()));
        }

        let mut updated = cached.clone();
        updated.apply(stand_id, vendor_type, reward_amount);
        self.repository.update_progress(account, &updated)?;
        *cached = updated.clone();

        info!(
            account = %account,
            vendor = %vendor_type,
            reward = reward_amount,
            total = updated.total_reward,
            "Progress updated"
        );
        Ok(Applied::Recorded(updated))
    }

    /// Drop an account's cached state; the next access reloads it.
    pub fn evict(&self, account: AccountId) {
        self.slots.lock().pop(&account);
    }

    fn slot(&self, account: AccountId) -> Slot {
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get(&account) {
            return Arc::clone(slot);
        }
        let slot = Slot::default();
        slots.put(account, Arc::clone(&slot));
        slot
    }

    fn suppressed(account: AccountId, vendor_type: &str) -> CoreError {
        warn!(
            account = %account,
            vendor = %vendor_type,
            "Suppressed progress write issued before the initial load"
        );
        CoreError::ProgressNotLoaded(account)
    }
}
