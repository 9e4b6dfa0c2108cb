//! Request types shared by every generation backend.

use serde::{Deserialize, Serialize};

/// Who produced a turn, in the backend's vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The player.
    User,
    /// The vendor.
    Model,
}

/// One turn of conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    /// Speaker.
    pub role: Role,
    /// What was said.
    pub text: String,
}

impl ChatTurn {
    /// A player turn.
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    /// A vendor turn.
    #[must_use]
    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
        }
    }
}

/// Everything a backend needs for one reply: the system prompt and the
/// conversation so far, ending with the player's latest message.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// Persona, game rules and (on the terminal round) the scoring rubric.
    pub system_instruction: String,
    /// Chronological history.
    pub contents: Vec<ChatTurn>,
}

impl GenerationRequest {
    /// Build a request from a system prompt, prior history and the player's
    /// new message.
    #[must_use]
    pub fn new(
        system_instruction: impl Into<String>,
        history: impl IntoIterator<Item = ChatTurn>,
        player_message: impl Into<String>,
    ) -> Self {
        let mut contents: Vec<ChatTurn> = history.into_iter().collect();
        contents.push(ChatTurn::user(player_message));
        Self {
            system_instruction: system_instruction.into(),
            contents,
        }
    }
}
