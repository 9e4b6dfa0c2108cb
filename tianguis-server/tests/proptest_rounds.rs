//! Property-based tests for round bookkeeping.

use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;

use tianguis_core::VendorCatalog;
use tianguis_core::types::{Message, Transcript};
use tianguis_server::{ConversationSession, SessionState};

fn vendor_ids() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec!["tacos", "frutas", "dulces", "elotes", "pan"])
}

proptest! {
    #[test]
    fn round_target_stays_in_configured_range(
        min in 1u32..8,
        span in 0u32..4,
        seed in any::<u64>(),
        vendor_id in vendor_ids(),
    ) {
        let catalog = VendorCatalog::builtin();
        let vendor = catalog.get(vendor_id).expect("vendor").clone();
        let mut session = ConversationSession::new(vendor);
        let mut rng = StdRng::seed_from_u64(seed);

        session.start(min..=min + span, &mut rng).expect("start");
        prop_assert!(session.round_target() >= min);
        prop_assert!(session.round_target() <= min + span);
        prop_assert_eq!(session.round_index(), 0);
        prop_assert_eq!(session.state(), SessionState::AwaitingPlayerInput);
    }

    #[test]
    fn resume_accepts_exactly_the_unfinished_rounds(
        completed in 0u32..7,
        target in 1u32..7,
    ) {
        let catalog = VendorCatalog::builtin();
        let vendor = catalog.get("tacos").expect("vendor").clone();
        let mut messages = vec![Message::vendor("¿Qué quieres?")];
        for _ in 0..completed {
            messages.push(Message::player("ándale"));
            messages.push(Message::vendor("no"));
        }

        let resumed = ConversationSession::resume(vendor, Transcript::from(messages), completed, target);
        prop_assert_eq!(resumed.is_ok(), completed < target);
    }
}
