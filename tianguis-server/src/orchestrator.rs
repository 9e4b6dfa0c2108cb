//! Session orchestrator — the boundary-facing entry point.
//!
//! Every request is self-contained: the opening turn draws a fresh session
//! and hands back what the caller must echo on later turns (vendor id,
//! transcript, round target), and each player turn rebuilds the session from
//! that transcript, plays exactly one round and discards it.
//!
//! When a round terminates a session and the request carries an account,
//! the outcome is folded into that account's progress. Stands the account
//! has already completed are never counted twice, and a failed write is
//! retried a bounded number of times, then logged and the account's cached
//! record dropped so the next read goes back to the store. It never fails
//! the turn.
//!
//! Profile store calls are synchronous (SQLite), so they run on tokio's
//! blocking pool rather than on the async workers.

use std::ops::RangeInclusive;
use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use tianguis_core::catalog::{VendorCatalog, VendorSummary};
use tianguis_core::config::SessionConfig;
use tianguis_core::leaderboard::{self, LeaderboardEntry};
use tianguis_core::progress::Applied;
use tianguis_core::types::{AccountId, Outcome, Profile, ProgressRecord, Transcript};
use tianguis_core::{CoreError, ProgressStore, Vendor};
use tianguis_llm::GenerationClient;

use crate::session::{ConversationSession, SessionError};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors surfaced to the transport layer.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The requested vendor does not exist.
    #[error("Unknown vendor: {0}")]
    UnknownVendor(String),

    /// The request was malformed or inconsistent.
    #[error("Invalid request: {0}")]
    Validation(String),

    /// A session transition was rejected.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The profile store failed.
    #[error("Storage error: {0}")]
    Storage(#[source] CoreError),

    /// A blocking store task panicked or was cancelled.
    #[error("Store task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl From<CoreError> for OrchestratorError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::VendorNotFound(id) => Self::UnknownVendor(id),
            CoreError::DuplicateName(name) => {
                Self::Validation(format!("username '{name}' is already taken"))
            }
            CoreError::InvalidTranscript(reason) => Self::Validation(reason),
            other => Self::Storage(other),
        }
    }
}

// ---------------------------------------------------------------------------
// Boundary types
// ---------------------------------------------------------------------------

/// What the caller needs to open a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpeningTurn {
    /// Public view of the vendor.
    pub vendor_summary: VendorSummary,
    /// The vendor's first line; the transcript starts with it.
    pub opening_line: String,
    /// Rounds this conversation lasts. Echoed back on every player turn.
    pub round_target: u32,
}

/// One player turn as supplied by the caller.
#[derive(Debug, Clone)]
pub struct PlayerTurn {
    /// Vendor being talked to.
    pub vendor_id: String,
    /// Conversation so far, opening line included.
    pub history: Transcript,
    /// What the player says this round.
    pub player_message: String,
    /// 1-based number of the round being played.
    pub round_index: u32,
    /// Round target returned by the opening turn.
    pub round_target: u32,
}

/// The vendor's answer to a player turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnReply {
    /// Text to show the player.
    pub display_text: String,
    /// Present only when this round ended the conversation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
}

/// What happened to a terminal outcome on its way to progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitStatus {
    /// The round did not end the session.
    NotTerminal,
    /// No account context was supplied.
    Anonymous,
    /// The account had already completed this stand.
    AlreadyCompleted,
    /// Progress was written.
    Committed,
    /// Every write attempt failed; the outcome was dropped.
    Lost,
}

// ---------------------------------------------------------------------------
// SessionOrchestrator
// ---------------------------------------------------------------------------

/// Creates, advances and finalizes sessions on behalf of the transport.
pub struct SessionOrchestrator {
    catalog: Arc<VendorCatalog>,
    generator: Arc<GenerationClient>,
    progress: Arc<ProgressStore>,
    rounds: RangeInclusive<u32>,
    write_attempts: u32,
}

impl std::fmt::Debug for SessionOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionOrchestrator")
            .field("vendors", &self.catalog.len())
            .field("generator", &self.generator)
            .field("rounds", &self.rounds)
            .field("write_attempts", &self.write_attempts)
            .finish_non_exhaustive()
    }
}

impl SessionOrchestrator {
    /// Wire the orchestrator to its collaborators.
    #[must_use]
    pub fn new(
        catalog: Arc<VendorCatalog>,
        generator: Arc<GenerationClient>,
        progress: Arc<ProgressStore>,
        session: &SessionConfig,
        write_attempts: u32,
    ) -> Self {
        Self {
            catalog,
            generator,
            progress,
            rounds: session.min_rounds..=session.max_rounds,
            write_attempts: write_attempts.max(1),
        }
    }

    /// The vendor roster.
    #[must_use]
    pub fn catalog(&self) -> &VendorCatalog {
        &self.catalog
    }

    /// The generation client.
    #[must_use]
    pub fn generator(&self) -> &GenerationClient {
        &self.generator
    }

    /// Allowed round targets.
    #[must_use]
    pub fn rounds(&self) -> &RangeInclusive<u32> {
        &self.rounds
    }

    /// Start a conversation with `vendor_id`.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::UnknownVendor`] if the vendor does not
    /// exist.
    pub fn opening_turn(&self, vendor_id: &str) -> Result<OpeningTurn, OrchestratorError> {
        let vendor = self.vendor(vendor_id)?;
        let mut session = ConversationSession::new(vendor.clone());
        let opening_line = session
            .start(self.rounds.clone(), &mut rand::thread_rng())?
            .to_string();

        info!(
            vendor = %vendor.id,
            round_target = session.round_target(),
            "Opening turn"
        );
        Ok(OpeningTurn {
            vendor_summary: VendorSummary::from(vendor),
            opening_line,
            round_target: session.round_target(),
        })
    }

    /// Play one round of a conversation rebuilt from `turn`.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::UnknownVendor`] or
    /// [`OrchestratorError::Validation`] when the turn is rejected at the
    /// boundary. Backend and persistence failures never surface here.
    pub async fn player_turn(
        &self,
        account: Option<AccountId>,
        turn: PlayerTurn,
    ) -> Result<TurnReply, OrchestratorError> {
        let (reply, _) = self.player_turn_with_status(account, turn).await?;
        Ok(reply)
    }

    /// [`Self::player_turn`], also reporting what happened to progress.
    ///
    /// # Errors
    ///
    /// Same as [`Self::player_turn`].
    pub async fn player_turn_with_status(
        &self,
        account: Option<AccountId>,
        turn: PlayerTurn,
    ) -> Result<(TurnReply, CommitStatus), OrchestratorError> {
        let vendor = self.vendor(&turn.vendor_id)?;
        self.validate_turn(&turn)?;

        let mut session = ConversationSession::resume(
            vendor.clone(),
            turn.history,
            turn.round_index - 1,
            turn.round_target,
        )?;
        let mut rng = StdRng::from_entropy();
        let reply = session
            .advance(&self.catalog, &self.generator, &turn.player_message, &mut rng)
            .await?;

        let status = match (&reply.outcome, account) {
            (None, _) => CommitStatus::NotTerminal,
            (Some(_), None) => {
                debug!(vendor = %vendor.id, "Terminal round without account context, nothing committed");
                CommitStatus::Anonymous
            }
            (Some(result), Some(account)) => self.commit(account, vendor, result).await,
        };

        Ok((
            TurnReply {
                display_text: reply.display_text,
                outcome: reply.outcome,
            },
            status,
        ))
    }

    /// Ranked totals of every named account.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Storage`] if the profile store fails.
    pub async fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>, OrchestratorError> {
        let summaries = self
            .blocking(|progress| progress.repository().list_summaries())
            .await?;
        Ok(leaderboard::rank(summaries))
    }

    /// The account's progress.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Storage`] if the profile store fails.
    pub async fn progress(&self, account: AccountId) -> Result<ProgressRecord, OrchestratorError> {
        self.blocking(move |progress| progress.load_progress(account))
            .await
    }

    /// Register a named account.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Validation`] for a blank or taken name.
    pub async fn register(&self, username: &str) -> Result<Profile, OrchestratorError> {
        let username = username.trim().to_string();
        if username.is_empty() {
            return Err(OrchestratorError::Validation("username is required".into()));
        }
        let profile = self
            .blocking(move |progress| progress.repository().create_profile(&username))
            .await?;
        info!(account = %profile.account_id, "Account registered");
        Ok(profile)
    }

    // -- internals ----------------------------------------------------------

    fn vendor(&self, vendor_id: &str) -> Result<&Vendor, OrchestratorError> {
        Ok(self.catalog.get(vendor_id.trim())?)
    }

    fn validate_turn(&self, turn: &PlayerTurn) -> Result<(), OrchestratorError> {
        if turn.player_message.trim().is_empty() {
            return Err(OrchestratorError::Validation("player message is empty".into()));
        }
        if !self.rounds.contains(&turn.round_target) {
            return Err(OrchestratorError::Validation(format!(
                "round target {} is outside {}..={}",
                turn.round_target,
                self.rounds.start(),
                self.rounds.end()
            )));
        }
        if turn.round_index < 1 || turn.round_index > turn.round_target {
            return Err(OrchestratorError::Validation(format!(
                "round {} is outside 1..={}",
                turn.round_index, turn.round_target
            )));
        }
        Ok(())
    }

    async fn blocking<T, F>(&self, job: F) -> Result<T, OrchestratorError>
    where
        F: FnOnce(&ProgressStore) -> tianguis_core::error::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let progress = Arc::clone(&self.progress);
        let result = tokio::task::spawn_blocking(move || job(&progress)).await?;
        Ok(result?)
    }

    async fn commit(&self, account: AccountId, vendor: &Vendor, result: &Outcome) -> CommitStatus {
        let stand_id = vendor.stand_id;
        let vendor_id = vendor.id.clone();
        let reward = result.reward_amount;
        let attempts = self.write_attempts;

        let status = self
            .blocking(move |progress| {
                Ok(record_outcome(progress, attempts, account, stand_id, &vendor_id, reward))
            })
            .await;
        status.unwrap_or_else(|err| {
            error!(
                account = %account,
                vendor = %vendor.id,
                reward,
                error = %err,
                "Progress commit task failed, outcome not recorded"
            );
            CommitStatus::Lost
        })
    }
}

/// Fold one terminal outcome into progress, retrying failed writes.
fn record_outcome(
    progress: &ProgressStore,
    attempts: u32,
    account: AccountId,
    stand_id: u32,
    vendor_id: &str,
    reward: u32,
) -> CommitStatus {
    for attempt in 1..=attempts {
        // Loading first also covers an account evicted since the last turn.
        let applied = progress
            .load_progress(account)
            .and_then(|_| progress.apply_outcome(account, stand_id, vendor_id, reward));
        match applied {
            Ok(Applied::Recorded(_)) => return CommitStatus::Committed,
            Ok(Applied::AlreadyCompleted(_)) => return CommitStatus::AlreadyCompleted,
            Err(err) => warn!(
                account = %account,
                vendor = %vendor_id,
                attempt,
                attempts,
                error = %err,
                "Progress write failed"
            ),
        }
    }

    error!(
        account = %account,
        vendor = %vendor_id,
        reward,
        "Progress write lost after all attempts"
    );
    progress.evict(account);
    CommitStatus::Lost
}
