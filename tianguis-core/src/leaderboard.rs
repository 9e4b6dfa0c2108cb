//! Leaderboard ranking.

use serde::{Deserialize, Serialize};

use crate::types::ProfileSummary;

/// Most entries the leaderboard returns.
pub const LEADERBOARD_LIMIT: usize = 20;

/// One leaderboard row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    /// Player's public name.
    pub display_name: String,
    /// Total reward won, `0` if none recorded.
    pub total_reward: u32,
}

/// Rank profiles by total reward, highest first.
///
/// Missing totals count as `0`; profiles without a (non-blank) display name
/// are dropped; ties keep their input order; at most
/// [`LEADERBOARD_LIMIT`] entries are returned.
#[must_use]
pub fn rank(summaries: impl IntoIterator<Item = ProfileSummary>) -> Vec<LeaderboardEntry> {
    let mut entries: Vec<LeaderboardEntry> = summaries
        .into_iter()
        .filter_map(|summary| {
            let name = summary.display_name?;
            if name.trim().is_empty() {
                return None;
            }
            Some(LeaderboardEntry {
                display_name: name,
                total_reward: summary.total_reward.unwrap_or(0),
            })
        })
        .collect();

    entries.sort_by(|a, b| b.total_reward.cmp(&a.total_reward));
    entries.truncate(LEADERBOARD_LIMIT);
    entries
}
