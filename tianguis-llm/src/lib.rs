//! # tianguis-llm — text generation for tianguis vendors
//!
//! Everything that talks to the language model lives here:
//!   - **keys** — credential pool with round-robin rotation
//!   - **prompt** — vendor system prompt and terminal-round scoring rubric
//!   - **client** — the `GenerationBackend` seam, the Gemini backend and
//!     `GenerationClient`, which fails over across credentials
//!
//! The crate knows nothing about sessions or scoring. A failed `generate`
//! is an ordinary outcome; callers are expected to answer from a canned
//! fallback instead of surfacing the error to the player.
//!
//! ```text
//! GenerationClient::generate
//!   ├─ attempt 1: pool.next() → backend.generate (timeout) ──ok──▶ text
//!   ├─ attempt 2: pool.next() → backend.generate (timeout) ──ok──▶ text
//!   └─ … up to max(pool size, 1) attempts ──────────────────err──▶ fallback
//! ```

pub mod client;
pub mod error;
pub mod keys;
pub mod prompt;
pub mod types;

pub use client::{GeminiBackend, GeminiSettings, GenerationBackend, GenerationClient};
pub use error::GenerationError;
pub use keys::KeyRotationPool;
pub use prompt::VendorPrompt;
pub use types::{ChatTurn, GenerationRequest, Role};
