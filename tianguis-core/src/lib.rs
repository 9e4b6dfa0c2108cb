//! # tianguis-core
//!
//! Game-agnostic domain for the tianguis persuasion game: a player walks up
//! to a market vendor and has a handful of rounds to talk them into handing
//! over some food.
//!
//! - **Catalog** — the fixed vendor roster and each vendor's fallback lines
//! - **Outcome** — reward directives, result text, deterministic fallback
//! - **Progress** — per-account inventory, totals and completed stands
//! - **Persistence** — the account store behind progress
//! - **Leaderboard** — ranking of stored totals
//!
//! Nothing in this crate talks to the network; the generation backend and
//! the conversation state machine live in `tianguis-llm` and
//! `tianguis-server`.

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod catalog;
pub mod config;
pub mod error;
pub mod leaderboard;
pub mod outcome;
pub mod persistence;
pub mod progress;
pub mod types;

pub use catalog::{Vendor, VendorCatalog, VendorSummary};
pub use config::TianguisConfig;
pub use error::CoreError;
pub use progress::ProgressStore;
pub use types::*;
