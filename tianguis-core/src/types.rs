//! Core type definitions for the persuasion game.
//!
//! All types are serializable; the wire names are camelCase because these
//! structures travel straight through the HTTP transport.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, Result};

// ---------------------------------------------------------------------------
// Game constants
// ---------------------------------------------------------------------------

/// Smallest reward a vendor can award.
pub const MIN_REWARD: u32 = 0;
/// Largest reward a vendor can award.
pub const MAX_REWARD: u32 = 15;
/// Reward used when a terminal response carries no reward directive.
pub const DEFAULT_REWARD: u32 = 3;
/// Fewest rounds a session can last.
pub const MIN_ROUNDS: u32 = 3;
/// Most rounds a session can last.
pub const MAX_ROUNDS: u32 = 5;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Identifier of a player account, supplied by the authenticated context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(pub Uuid);

impl AccountId {
    /// Create a new random account ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AccountId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AccountId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

// ---------------------------------------------------------------------------
// Dialogue
// ---------------------------------------------------------------------------

/// Who said a line of dialogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    /// The player character.
    Player,
    /// The NPC vendor.
    Vendor,
}

/// One line of dialogue. Immutable once appended to a [`Transcript`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Who spoke.
    pub speaker: Speaker,
    /// What was said.
    pub text: String,
}

impl Message {
    /// A line spoken by the player.
    #[must_use]
    pub fn player(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Player,
            text: text.into(),
        }
    }

    /// A line spoken by the vendor.
    #[must_use]
    pub fn vendor(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Vendor,
            text: text.into(),
        }
    }
}

/// Chronological, append-only conversation history.
///
/// Transcripts arrive from the caller on every turn, so this is the value the
/// session is re-derived from. Unknown speaker tags are rejected during
/// deserialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript(Vec<Message>);

impl Transcript {
    /// An empty transcript.
    #[must_use]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Append a message at the end.
    pub fn push(&mut self, message: Message) {
        self.0.push(message);
    }

    /// All messages, oldest first.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.0
    }

    /// Number of messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no message has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The most recent message, if any.
    #[must_use]
    pub fn last(&self) -> Option<&Message> {
        self.0.last()
    }

    /// How many player messages the transcript holds (one per completed round).
    #[must_use]
    pub fn player_turns(&self) -> u32 {
        let count = self
            .0
            .iter()
            .filter(|m| m.speaker == Speaker::Player)
            .count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    /// Check that a caller-supplied transcript is consistent with the number
    /// of rounds the caller claims are already complete.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidTranscript`] if the transcript does not
    /// open with a vendor line or its player-turn count disagrees with
    /// `completed_rounds`.
    pub fn validate(&self, completed_rounds: u32) -> Result<()> {
        match self.0.first() {
            Some(first) if first.speaker == Speaker::Vendor => {}
            Some(_) => {
                return Err(CoreError::InvalidTranscript(
                    "conversation must open with the vendor's line".into(),
                ));
            }
            None => {
                return Err(CoreError::InvalidTranscript(
                    "conversation history is empty".into(),
                ));
            }
        }

        let turns = self.player_turns();
        if turns != completed_rounds {
            return Err(CoreError::InvalidTranscript(format!(
                "history holds {turns} player turns but {completed_rounds} rounds were completed"
            )));
        }
        Ok(())
    }
}

impl From<Vec<Message>> for Transcript {
    fn from(messages: Vec<Message>) -> Self {
        Self(messages)
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Terminal result of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outcome {
    /// Reward quantity, always within `[MIN_REWARD, MAX_REWARD]`.
    pub reward_amount: u32,
    /// Line announcing the result to the player.
    pub result_text: String,
    /// Whether the player walked away with anything.
    pub success: bool,
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Durable per-account game progress.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    /// Reward counts keyed by vendor type (e.g. `"tacos"`).
    #[serde(default)]
    pub inventory_by_vendor_type: BTreeMap<String, u32>,
    /// Sum of every reward ever won.
    #[serde(default)]
    pub total_reward: u32,
    /// Stand ids the player has already finished.
    #[serde(default)]
    pub completed_vendor_ids: BTreeSet<u32>,
}

impl ProgressRecord {
    /// Fold one completed session into the record.
    pub fn apply(&mut self, stand_id: u32, vendor_type: &str, reward_amount: u32) {
        *self
            .inventory_by_vendor_type
            .entry(vendor_type.to_string())
            .or_insert(0) += reward_amount;
        self.total_reward = self.total_reward.saturating_add(reward_amount);
        self.completed_vendor_ids.insert(stand_id);
    }

    /// Whether the stand has already been completed.
    #[must_use]
    pub fn has_completed(&self, stand_id: u32) -> bool {
        self.completed_vendor_ids.contains(&stand_id)
    }
}

/// A stored player profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    /// Owning account.
    pub account_id: AccountId,
    /// Public name, absent for accounts that never registered one.
    pub display_name: Option<String>,
    /// Game progress.
    pub progress: ProgressRecord,
}

/// The slice of a profile the leaderboard reads. `total_reward` is nullable
/// in storage for profiles that never finished a stand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileSummary {
    /// Public name, if any.
    pub display_name: Option<String>,
    /// Stored total, if any.
    pub total_reward: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opened() -> Transcript {
        Transcript::from(vec![Message::vendor("¿Qué quieres?")])
    }

    #[test]
    fn speaker_tags_are_lowercase() {
        let json = serde_json::to_string(&Message::player("hola")).expect("serialize");
        assert_eq!(json, r#"{"speaker":"player","text":"hola"}"#);
    }

    #[test]
    fn unknown_speaker_tag_is_rejected() {
        let result: std::result::Result<Transcript, _> =
            serde_json::from_str(r#"[{"speaker":"sistema","text":"x"}]"#);
        assert!(result.is_err());
    }

    #[test]
    fn validate_accepts_consistent_history() {
        let mut t = opened();
        assert!(t.validate(0).is_ok());
        t.push(Message::player("hola"));
        t.push(Message::vendor("¿Y qué?"));
        assert!(t.validate(1).is_ok());
    }

    #[test]
    fn validate_rejects_round_mismatch() {
        let mut t = opened();
        t.push(Message::player("hola"));
        t.push(Message::vendor("¿Y qué?"));
        assert!(matches!(t.validate(0), Err(CoreError::InvalidTranscript(_))));
        assert!(matches!(t.validate(2), Err(CoreError::InvalidTranscript(_))));
    }

    #[test]
    fn validate_rejects_missing_opening_line() {
        assert!(Transcript::new().validate(0).is_err());
        let t = Transcript::from(vec![Message::player("hola")]);
        assert!(t.validate(1).is_err());
    }

    #[test]
    fn progress_apply_accumulates() {
        let mut record = ProgressRecord::default();
        record.apply(1, "tacos", 2);
        record.apply(2, "frutas", 7);
        record.apply(2, "frutas", 1);
        assert_eq!(record.total_reward, 10);
        assert_eq!(record.inventory_by_vendor_type["frutas"], 8);
        assert_eq!(record.completed_vendor_ids.len(), 2);
        assert!(record.has_completed(1));
        assert!(!record.has_completed(3));
    }

    #[test]
    fn account_id_parses_from_header_value() {
        let id = AccountId::new();
        let parsed: AccountId = format!(" {id} ").parse().expect("parse");
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<AccountId>().is_err());
    }
}
