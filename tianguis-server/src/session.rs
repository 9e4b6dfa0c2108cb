//! Conversation session — the per-vendor negotiation state machine.
//!
//! ```text
//! Uninitialized ──start──▶ AwaitingPlayerInput ──advance──▶ Scoring
//!                                ▲                             │
//!                                └──── non-terminal round ─────┤
//!                                                              ▼
//!                                                         Terminated
//! ```
//!
//! A session lives for one conversation with one vendor. The round counter
//! only moves on player messages; the outcome is set exactly once, on the
//! advance where `round_index` reaches `round_target`. Generation failures
//! never surface as errors: the vendor answers from its fallback table
//! instead.
//!
//! Sessions can also be rebuilt with [`ConversationSession::resume`] from a
//! caller-supplied transcript, which is how the stateless HTTP boundary
//! plays one round per request.

use std::ops::RangeInclusive;

use rand::Rng;
use thiserror::Error;
use tracing::{debug, info, warn};

use tianguis_core::catalog::{Vendor, VendorCatalog};
use tianguis_core::outcome::{self, VendorReply};
use tianguis_core::types::{Message, Outcome, Speaker, Transcript};
use tianguis_llm::{ChatTurn, GenerationClient, GenerationRequest, VendorPrompt};

/// Errors raised by session transitions.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The transition is not allowed from the current state.
    #[error("Invalid session state: cannot {action} while {state:?}")]
    InvalidState {
        /// What was attempted.
        action: &'static str,
        /// State the session was in.
        state: SessionState,
    },

    /// Caller-supplied data was rejected.
    #[error("Invalid session input: {0}")]
    Validation(String),
}

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, no opening line yet.
    Uninitialized,
    /// Waiting for the player's next message.
    AwaitingPlayerInput,
    /// Terminal round in progress; the vendor is deciding the reward.
    Scoring,
    /// Outcome decided. No further input is accepted.
    Terminated,
}

/// One conversation between the player and a vendor.
#[derive(Debug, Clone)]
pub struct ConversationSession {
    vendor: Vendor,
    round_index: u32,
    round_target: u32,
    history: Transcript,
    state: SessionState,
    outcome: Option<Outcome>,
}

impl ConversationSession {
    /// A fresh, uninitialized session with `vendor`.
    #[must_use]
    pub fn new(vendor: Vendor) -> Self {
        Self {
            vendor,
            round_index: 0,
            round_target: 0,
            history: Transcript::new(),
            state: SessionState::Uninitialized,
            outcome: None,
        }
    }

    /// Rebuild a session that has already played `completed_rounds` rounds.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Validation`] if the round numbers are out of
    /// range or the transcript disagrees with them.
    pub fn resume(
        vendor: Vendor,
        history: Transcript,
        completed_rounds: u32,
        round_target: u32,
    ) -> Result<Self, SessionError> {
        if round_target == 0 {
            return Err(SessionError::Validation("round target must be positive".into()));
        }
        if completed_rounds >= round_target {
            return Err(SessionError::Validation(format!(
                "{completed_rounds} rounds already completed out of {round_target}"
            )));
        }
        history
            .validate(completed_rounds)
            .map_err(|e| SessionError::Validation(e.to_string()))?;

        Ok(Self {
            vendor,
            round_index: completed_rounds,
            round_target,
            history,
            state: SessionState::AwaitingPlayerInput,
            outcome: None,
        })
    }

    /// Draw the round target from `rounds`, pick an opening line and record
    /// it as the vendor's first message.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidState`] unless the session is
    /// uninitialized, or [`SessionError::Validation`] for an empty range.
    pub fn start<R: Rng>(
        &mut self,
        rounds: RangeInclusive<u32>,
        rng: &mut R,
    ) -> Result<&str, SessionError> {
        if self.state != SessionState::Uninitialized {
            return Err(SessionError::InvalidState {
                action: "start",
                state: self.state,
            });
        }
        if rounds.is_empty() || *rounds.start() == 0 {
            return Err(SessionError::Validation(format!(
                "round range {}..={} is empty",
                rounds.start(),
                rounds.end()
            )));
        }

        self.round_target = rng.gen_range(rounds);
        let opening = self.vendor.pick_opening_line(rng).to_string();
        self.history.push(Message::vendor(opening));
        self.state = SessionState::AwaitingPlayerInput;

        debug!(
            vendor = %self.vendor.id,
            round_target = self.round_target,
            "Session started"
        );
        Ok(self
            .history
            .last()
            .map(|m| m.text.as_str())
            .unwrap_or_default())
    }

    /// Play one round: record the player's message, obtain the vendor's
    /// reply and, on the terminal round, the outcome.
    ///
    /// The backend is tried through `generator` with credential failover; if
    /// no attempt produces text the reply comes from the vendor's fallback
    /// table, drawn with `rng`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidState`] unless the session is awaiting
    /// player input, or [`SessionError::Validation`] for a blank message.
    pub async fn advance<R: Rng + Send>(
        &mut self,
        catalog: &VendorCatalog,
        generator: &GenerationClient,
        player_message: &str,
        rng: &mut R,
    ) -> Result<VendorReply, SessionError> {
        if self.state != SessionState::AwaitingPlayerInput {
            return Err(SessionError::InvalidState {
                action: "advance",
                state: self.state,
            });
        }
        let player_message = player_message.trim();
        if player_message.is_empty() {
            return Err(SessionError::Validation("player message is empty".into()));
        }

        let request = self.generation_request(player_message);
        self.history.push(Message::player(player_message));
        self.round_index += 1;
        let terminal = self.round_index >= self.round_target;
        if terminal {
            self.state = SessionState::Scoring;
        }

        let reply = match generator.generate(&request).await {
            Ok(text) => outcome::extract(&self.vendor, &text, terminal),
            Err(err) => {
                warn!(
                    vendor = %self.vendor.id,
                    round = self.round_index,
                    error = %err,
                    "Generation unavailable, answering from fallback table"
                );
                outcome::fallback_turn(catalog, &self.vendor, terminal, rng)
            }
        };

        self.history.push(Message::vendor(reply.display_text.clone()));
        if let Some(result) = &reply.outcome {
            self.outcome = Some(result.clone());
            self.state = SessionState::Terminated;
            info!(
                vendor = %self.vendor.id,
                rounds = self.round_index,
                reward = result.reward_amount,
                success = result.success,
                "Session terminated"
            );
        } else {
            self.state = SessionState::AwaitingPlayerInput;
            debug!(
                vendor = %self.vendor.id,
                round = self.round_index,
                round_target = self.round_target,
                "Round played"
            );
        }
        Ok(reply)
    }

    /// Walk away from the conversation. Nothing is persisted.
    pub fn abandon(self) {
        debug!(
            vendor = %self.vendor.id,
            round = self.round_index,
            state = ?self.state,
            "Session abandoned"
        );
    }

    fn generation_request(&self, player_message: &str) -> GenerationRequest {
        let prompt = VendorPrompt {
            persona: &self.vendor.persona_prompt,
            reward_item: &self.vendor.reward_item_name,
            difficulty: self.vendor.difficulty,
            round: self.round_index + 1,
            round_target: self.round_target,
        };
        let history = self.history.messages().iter().map(|m| match m.speaker {
            Speaker::Player => ChatTurn::user(m.text.clone()),
            Speaker::Vendor => ChatTurn::model(m.text.clone()),
        });
        GenerationRequest::new(prompt.system_prompt(), history, player_message)
    }

    // -- Accessors ----------------------------------------------------------

    /// The vendor being talked to.
    #[must_use]
    pub fn vendor(&self) -> &Vendor {
        &self.vendor
    }

    /// Player messages recorded so far.
    #[must_use]
    pub fn round_index(&self) -> u32 {
        self.round_index
    }

    /// Rounds this session lasts.
    #[must_use]
    pub fn round_target(&self) -> u32 {
        self.round_target
    }

    /// Conversation so far.
    #[must_use]
    pub fn history(&self) -> &Transcript {
        &self.history
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the outcome has been decided.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.state == SessionState::Terminated
    }

    /// The outcome, present once terminated.
    #[must_use]
    pub fn outcome(&self) -> Option<&Outcome> {
        self.outcome.as_ref()
    }
}
