//! # tianguis-server — sessions, orchestration and HTTP for tianguis
//!
//! This crate ties the game-agnostic domain in `tianguis-core` to the
//! generation layer in `tianguis-llm` and exposes the result over HTTP.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                 http (axum)                  │
//! │  opening-turn · advance-turn · leaderboard   │
//! └──────────────────────┬───────────────────────┘
//!                        ▼
//!            ┌───────────────────────┐
//!            │  SessionOrchestrator  │──────▶ ProgressStore ──▶ SQLite
//!            └───────────┬───────────┘
//!                        ▼
//!            ┌───────────────────────┐
//!            │  ConversationSession  │──────▶ GenerationClient ──▶ Gemini
//!            └───────────────────────┘        (fallback tables on failure)
//! ```
//!
//! ## Modules
//!
//! - `session` — the per-vendor state machine
//! - `orchestrator` — stateless per-request entry point, progress commits
//! - `http` — router, DTOs, error mapping
//! - `config` — config loading and service assembly
//! - `telemetry` — tracing subscriber

pub mod config;
pub mod http;
pub mod orchestrator;
pub mod session;
pub mod telemetry;

pub use http::{AppState, router};
pub use orchestrator::{OrchestratorError, SessionOrchestrator};
pub use session::{ConversationSession, SessionError, SessionState};
