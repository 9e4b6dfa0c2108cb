//! Outcome extraction — turning a vendor's reply into display text and,
//! on the terminal round, a reward.
//!
//! Generated replies on the terminal round carry a reward directive such as
//! `[REWARD: 7]`. Exactly the first directive is parsed and cut out of the
//! text; any later ones are left in place as ordinary text. The parsed value
//! is clamped to `[MIN_REWARD, MAX_REWARD]` rather than rejected, and a reply
//! without a directive earns [`DEFAULT_REWARD`].
//!
//! When the backend is unreachable, [`fallback_turn`] produces an
//! in-character line instead. Its terminal reward depends only on vendor
//! difficulty, since the fallback never judges what the player said.

use std::ops::Range;
use std::sync::OnceLock;

use rand::Rng;
use rand::seq::SliceRandom;
use regex::Regex;
use tracing::debug;

use crate::catalog::{Vendor, VendorCatalog};
use crate::types::{DEFAULT_REWARD, MAX_REWARD, MIN_REWARD, Outcome};

/// What the vendor says when the fallback path hands out a token reward.
pub const GRUDGING_REWARD_LINE: &str = "Bueno, está bien... te daré algo. ¡Toma!";

fn reward_directive_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| match Regex::new(r"(?i)\[REWARD:\s*([0-9]+)\]") {
        Ok(re) => re,
        Err(_) => unreachable!("static regex pattern is valid"),
    })
}

// ---------------------------------------------------------------------------
// Directive parsing
// ---------------------------------------------------------------------------

/// A reward directive located in generated text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardDirective {
    /// Clamped reward amount.
    pub amount: u32,
    /// Byte span of the directive within the text.
    pub span: Range<usize>,
}

/// Find the first reward directive in `text`.
#[must_use]
pub fn find_directive(text: &str) -> Option<RewardDirective> {
    let captures = reward_directive_regex().captures(text)?;
    let whole = captures.get(0)?;
    let digits = captures.get(1)?.as_str();
    Some(RewardDirective {
        amount: clamp_reward(digits),
        span: whole.range(),
    })
}

/// Parse a run of digits into a reward, saturating values too large to
/// represent and clamping into `[MIN_REWARD, MAX_REWARD]`.
#[must_use]
pub fn clamp_reward(digits: &str) -> u32 {
    let value = digits.parse::<u64>().unwrap_or(u64::MAX);
    let clamped = value.clamp(u64::from(MIN_REWARD), u64::from(MAX_REWARD));
    u32::try_from(clamped).unwrap_or(MAX_REWARD)
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// A vendor reply ready to show the player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorReply {
    /// Text to display.
    pub display_text: String,
    /// Present only on the terminal round.
    pub outcome: Option<Outcome>,
}

/// Build the outcome for a reward decided by the generation backend.
#[must_use]
pub fn scored_outcome(vendor: &Vendor, reward_amount: u32) -> Outcome {
    let result_text = if reward_amount > 0 {
        format!(
            "¡{} te dio {} {}!",
            vendor.display_name, reward_amount, vendor.reward_item_name
        )
    } else {
        format!("{} no te dio nada esta vez.", vendor.display_name)
    };
    Outcome {
        reward_amount,
        result_text,
        success: reward_amount > 0,
    }
}

/// Split a generated reply into display text and, on the terminal round, an
/// outcome.
#[must_use]
pub fn extract(vendor: &Vendor, generated: &str, terminal: bool) -> VendorReply {
    if !terminal {
        return VendorReply {
            display_text: generated.to_string(),
            outcome: None,
        };
    }

    let (display_text, reward) = match find_directive(generated) {
        Some(directive) => {
            let mut stripped = String::with_capacity(generated.len());
            stripped.push_str(&generated[..directive.span.start]);
            stripped.push_str(&generated[directive.span.end..]);
            (stripped.trim().to_string(), directive.amount)
        }
        None => {
            debug!(vendor = %vendor.id, "Terminal reply carried no reward directive");
            (generated.to_string(), DEFAULT_REWARD)
        }
    };

    VendorReply {
        display_text,
        outcome: Some(scored_outcome(vendor, reward)),
    }
}

// ---------------------------------------------------------------------------
// Fallback
// ---------------------------------------------------------------------------

/// Lowest reward the fallback path can award for `difficulty`:
/// `max(1, 5 - floor(difficulty / 2))`.
#[must_use]
pub fn fallback_reward_floor(difficulty: u8) -> u32 {
    let base = 5 - i32::from(difficulty / 2);
    u32::try_from(base.max(1)).unwrap_or(1)
}

/// Token reward for the fallback path: the floor plus `0..=2`.
#[must_use]
pub fn fallback_reward<R: Rng>(difficulty: u8, rng: &mut R) -> u32 {
    fallback_reward_floor(difficulty) + rng.gen_range(0..=2)
}

/// Produce a reply without the generation backend.
///
/// Non-terminal rounds get a random line from the vendor's fallback table.
/// The terminal round gets [`GRUDGING_REWARD_LINE`] and a difficulty-based
/// token reward, always counted as a success.
#[must_use]
pub fn fallback_turn<R: Rng>(
    catalog: &VendorCatalog,
    vendor: &Vendor,
    terminal: bool,
    rng: &mut R,
) -> VendorReply {
    if terminal {
        let reward_amount = fallback_reward(vendor.difficulty, rng);
        return VendorReply {
            display_text: GRUDGING_REWARD_LINE.to_string(),
            outcome: Some(scored_outcome(vendor, reward_amount)),
        };
    }

    let lines = catalog.fallback_lines(&vendor.id);
    let line = lines.choose(rng).copied().unwrap_or(GRUDGING_REWARD_LINE);
    VendorReply {
        display_text: line.to_string(),
        outcome: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn tacos() -> Vendor {
        VendorCatalog::builtin().get("tacos").expect("tacos").clone()
    }

    #[test]
    fn non_terminal_text_passes_through() {
        let reply = extract(&tacos(), "  Órale, ¿y qué más? [REWARD: 9] ", false);
        assert_eq!(reply.display_text, "  Órale, ¿y qué más? [REWARD: 9] ");
        assert!(reply.outcome.is_none());
    }

    #[test]
    fn terminal_directive_is_parsed_and_stripped() {
        let reply = extract(&tacos(), "Está bien... [REWARD: 2]", true);
        assert_eq!(reply.display_text, "Está bien...");
        let outcome = reply.outcome.expect("outcome");
        assert_eq!(outcome.reward_amount, 2);
        assert!(outcome.success);
        assert_eq!(outcome.result_text, "¡Don José te dio 2 tacos al pastor!");
    }

    #[test]
    fn directive_on_its_own_line_is_stripped() {
        let reply = extract(&tacos(), "Ándale pues.\n[reward:5]\n", true);
        assert_eq!(reply.display_text, "Ándale pues.");
        assert_eq!(reply.outcome.expect("outcome").reward_amount, 5);
    }

    #[test]
    fn out_of_range_directive_is_clamped() {
        let reply = extract(&tacos(), "¡Toma todo! [REWARD: 40]", true);
        assert_eq!(reply.outcome.expect("outcome").reward_amount, MAX_REWARD);

        let huge = extract(&tacos(), "[REWARD: 99999999999999999999999]", true);
        assert_eq!(huge.outcome.expect("outcome").reward_amount, MAX_REWARD);
    }

    #[test]
    fn zero_reward_is_a_failure() {
        let reply = extract(&tacos(), "Lárgate. [REWARD: 0]", true);
        let outcome = reply.outcome.expect("outcome");
        assert_eq!(outcome.reward_amount, 0);
        assert!(!outcome.success);
        assert_eq!(outcome.result_text, "Don José no te dio nada esta vez.");
    }

    #[test]
    fn missing_directive_defaults_to_three() {
        let reply = extract(&tacos(), "Bueno, ya estuvo.", true);
        assert_eq!(reply.display_text, "Bueno, ya estuvo.");
        assert_eq!(reply.outcome.expect("outcome").reward_amount, DEFAULT_REWARD);
    }

    #[test]
    fn only_the_first_directive_is_honored() {
        let reply = extract(&tacos(), "Va [REWARD: 4] y no [REWARD: 12]", true);
        assert_eq!(reply.outcome.expect("outcome").reward_amount, 4);
        assert_eq!(reply.display_text, "Va  y no [REWARD: 12]");
    }

    #[test]
    fn fallback_floor_matches_difficulty_table() {
        assert_eq!(fallback_reward_floor(1), 5);
        assert_eq!(fallback_reward_floor(3), 4);
        assert_eq!(fallback_reward_floor(7), 2);
        assert_eq!(fallback_reward_floor(8), 1);
        assert_eq!(fallback_reward_floor(10), 1);
    }

    #[test]
    fn fallback_terminal_turn_rewards_grudgingly() {
        let catalog = VendorCatalog::builtin();
        let frutas = catalog.get("frutas").expect("frutas");
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..50 {
            let reply = fallback_turn(&catalog, frutas, true, &mut rng);
            assert_eq!(reply.display_text, GRUDGING_REWARD_LINE);
            let outcome = reply.outcome.expect("outcome");
            assert!((4..=6).contains(&outcome.reward_amount));
            assert!(outcome.success);
            assert!(outcome.result_text.contains("Doña María"));
            assert!(outcome.result_text.contains("frutas frescas"));
        }
    }

    #[test]
    fn fallback_non_terminal_turn_uses_vendor_table() {
        let catalog = VendorCatalog::builtin();
        let elotes = catalog.get("elotes").expect("elotes");
        let table = catalog.fallback_lines("elotes");
        let mut rng = StdRng::seed_from_u64(3);
        let reply = fallback_turn(&catalog, elotes, false, &mut rng);
        assert!(reply.outcome.is_none());
        assert!(table.contains(&reply.display_text.as_str()));
    }
}
