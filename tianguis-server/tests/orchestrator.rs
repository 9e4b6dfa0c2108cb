//! Orchestrator integration tests — full turns against a scripted backend.

mod common;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use tianguis_core::outcome::GRUDGING_REWARD_LINE;
use tianguis_core::persistence::ProfileRepository;
use tianguis_core::types::{Message, Transcript};
use tianguis_llm::Role;
use tianguis_server::OrchestratorError;
use tianguis_server::orchestrator::{CommitStatus, PlayerTurn};

use common::{FlakyRepository, ScriptedBackend, memory_repository, orchestrator, turn};

// ---------------------------------------------------------------------------
// Opening turn
// ---------------------------------------------------------------------------

#[test]
fn opening_turn_draws_target_and_opening_line() {
    let orch = orchestrator(ScriptedBackend::replying("hola"), &["k1"], memory_repository());
    let opening = orch.opening_turn("pan").expect("opening");

    let vendor = orch.catalog().get("pan").expect("pan");
    assert_eq!(opening.vendor_summary.display_name, "Doña Rosa");
    assert_eq!(opening.vendor_summary.difficulty, 4);
    assert!(vendor.opening_lines.contains(&opening.opening_line));
    assert!((3..=5).contains(&opening.round_target));
}

#[test]
fn every_round_target_is_reachable() {
    let orch = orchestrator(ScriptedBackend::replying("hola"), &["k1"], memory_repository());
    let seen: BTreeSet<u32> = (0..300)
        .map(|_| orch.opening_turn("tacos").expect("opening").round_target)
        .collect();
    assert_eq!(seen, BTreeSet::from([3, 4, 5]));
}

#[test]
fn opening_turn_for_unknown_vendor_is_rejected() {
    let orch = orchestrator(ScriptedBackend::replying("hola"), &["k1"], memory_repository());
    assert!(matches!(
        orch.opening_turn("churros"),
        Err(OrchestratorError::UnknownVendor(_))
    ));
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

#[tokio::test]
async fn tacos_terminal_round_scores_from_directive() {
    let backend = ScriptedBackend::replying("Está bien...\n[REWARD: 2]");
    let orch = orchestrator(backend.clone(), &["k1"], memory_repository());

    let reply = orch.player_turn(None, turn("tacos", 3, 3)).await.expect("turn");
    let result = reply.outcome.expect("terminal outcome");
    assert_eq!(reply.display_text, "Está bien...");
    assert_eq!(result.reward_amount, 2);
    assert!(result.success);
    assert_eq!(result.result_text, "¡Don José te dio 2 tacos al pastor!");

    let requests = backend.requests.lock();
    let request = requests.last().expect("one request");
    assert!(request.system_instruction.contains("Don José"));
    assert!(request.system_instruction.contains("ronda 3 de 3"));
    assert!(request.system_instruction.contains("[REWARD: X]"));
    assert_eq!(request.contents.first().map(|t| t.role), Some(Role::Model));
    assert_eq!(request.contents.len(), 6);
    assert_eq!(request.contents.last().map(|t| t.role), Some(Role::User));
}

#[tokio::test]
async fn tacos_conversation_played_round_by_round() {
    let backend = ScriptedBackend::new(|request, _| {
        if request.system_instruction.contains("ronda 3 de 3") {
            Ok("Está bien...\n[REWARD: 2]".to_string())
        } else {
            Ok("¿Y yo por qué te voy a regalar algo?".to_string())
        }
    });
    let orch = orchestrator(backend.clone(), &["k1"], memory_repository());
    let opening = orch.opening_turn("tacos").expect("opening");

    let mut history = vec![Message::vendor(opening.opening_line)];
    let lines = ["hola", "¿me das un taco?", "disculpa el desorden…"];
    let mut last = None;
    for (round_index, line) in (1..=3).zip(lines) {
        let reply = orch
            .player_turn(
                None,
                PlayerTurn {
                    vendor_id: "tacos".into(),
                    history: Transcript::from(history.clone()),
                    player_message: line.into(),
                    round_index,
                    round_target: 3,
                },
            )
            .await
            .expect("turn");

        let prompt = backend.requests.lock().last().expect("request").system_instruction.clone();
        assert!(prompt.contains(&format!("ronda {round_index} de 3")));
        if round_index < 3 {
            assert!(reply.outcome.is_none(), "round {round_index} must not score");
        }
        history.push(Message::player(line));
        history.push(Message::vendor(reply.display_text.clone()));
        last = Some(reply);
    }

    let last = last.expect("three rounds played");
    assert_eq!(last.display_text, "Está bien...");
    let result = last.outcome.expect("terminal outcome");
    assert_eq!(result.reward_amount, 2);
    assert!(result.success);
    assert_eq!(backend.calls(), 3);
}

#[tokio::test]
async fn non_terminal_round_has_no_outcome_and_no_rubric() {
    let backend = ScriptedBackend::replying("¿Y eso qué? [REWARD: 9]");
    let orch = orchestrator(backend.clone(), &["k1"], memory_repository());

    let (reply, status) = orch
        .player_turn_with_status(None, turn("elotes", 1, 4))
        .await
        .expect("turn");
    assert!(reply.outcome.is_none());
    assert_eq!(reply.display_text, "¿Y eso qué? [REWARD: 9]");
    assert_eq!(status, CommitStatus::NotTerminal);

    let requests = backend.requests.lock();
    assert!(!requests[0].system_instruction.contains("[REWARD: X]"));
    assert!(requests[0].system_instruction.contains("ronda 1 de 4"));
}

#[tokio::test]
async fn terminal_reply_without_directive_earns_default() {
    let orch = orchestrator(
        ScriptedBackend::replying("Ándale pues, llévatelo."),
        &["k1"],
        memory_repository(),
    );
    let reply = orch.player_turn(None, turn("dulces", 5, 5)).await.expect("turn");
    assert_eq!(reply.outcome.expect("outcome").reward_amount, 3);
}

#[tokio::test]
async fn zero_reward_is_a_failed_negotiation() {
    let orch = orchestrator(
        ScriptedBackend::replying("¡Fuera de aquí! [REWARD: 0]"),
        &["k1"],
        memory_repository(),
    );
    let result = orch
        .player_turn(None, turn("tacos", 3, 3))
        .await
        .expect("turn")
        .outcome
        .expect("outcome");
    assert_eq!(result.reward_amount, 0);
    assert!(!result.success);
    assert_eq!(result.result_text, "Don José no te dio nada esta vez.");
}

// ---------------------------------------------------------------------------
// Failover and fallback
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failing_credential_rotates_to_the_next_one() {
    let backend = ScriptedBackend::new(|_, key| {
        if key == "bad" {
            Err(tianguis_llm::GenerationError::Status { status: 429 })
        } else {
            Ok("Órale, pásale.".to_string())
        }
    });
    let orch = orchestrator(backend.clone(), &["bad", "good"], memory_repository());

    let reply = orch.player_turn(None, turn("dulces", 1, 3)).await.expect("turn");
    assert_eq!(reply.display_text, "Órale, pásale.");
    assert_eq!(*backend.credentials.lock(), vec!["bad", "good"]);
}

#[tokio::test]
async fn all_credentials_down_on_terminal_round_falls_back() {
    let backend = ScriptedBackend::failing(503);
    let orch = orchestrator(backend.clone(), &["k1", "k2"], memory_repository());

    let reply = orch.player_turn(None, turn("frutas", 3, 3)).await.expect("turn");
    let result = reply.outcome.expect("fallback outcome");
    assert_eq!(reply.display_text, GRUDGING_REWARD_LINE);
    assert!((4..=6).contains(&result.reward_amount));
    assert!(result.success);
    assert!(result.result_text.contains("Doña María"));
    assert!(result.result_text.contains("frutas frescas"));
    assert_eq!(backend.calls(), 2);
}

#[tokio::test]
async fn all_credentials_down_mid_conversation_uses_fallback_table() {
    let orch = orchestrator(ScriptedBackend::failing(500), &["k1"], memory_repository());
    let reply = orch.player_turn(None, turn("pan", 2, 4)).await.expect("turn");

    let table = orch.catalog().fallback_lines("pan");
    assert!(table.contains(&reply.display_text.as_str()));
    assert!(reply.outcome.is_none());
}

#[tokio::test]
async fn empty_pool_never_calls_the_backend() {
    let backend = ScriptedBackend::replying("nunca");
    let orch = orchestrator(backend.clone(), &[], memory_repository());

    let reply = orch.player_turn(None, turn("tacos", 3, 3)).await.expect("turn");
    // difficulty 7: floor is max(1, 5 - 3) = 2
    assert!((2..=4).contains(&reply.outcome.expect("outcome").reward_amount));
    assert_eq!(backend.calls(), 0);
}

// ---------------------------------------------------------------------------
// Progress commits
// ---------------------------------------------------------------------------

#[tokio::test]
async fn terminal_outcome_is_committed_once() {
    let repo = memory_repository();
    let orch = orchestrator(
        ScriptedBackend::replying("Toma, te lo ganaste. [REWARD: 8]"),
        &["k1"],
        repo.clone(),
    );
    let account = orch.register("michi").await.expect("register").account_id;

    let (_, first) = orch
        .player_turn_with_status(Some(account), turn("dulces", 3, 3))
        .await
        .expect("turn");
    assert_eq!(first, CommitStatus::Committed);

    let (replayed, second) = orch
        .player_turn_with_status(Some(account), turn("dulces", 3, 3))
        .await
        .expect("turn");
    assert!(replayed.outcome.is_some());
    assert_eq!(second, CommitStatus::AlreadyCompleted);

    let record = orch.progress(account).await.expect("progress");
    assert_eq!(record.total_reward, 8);
    assert_eq!(record.inventory_by_vendor_type.get("dulces"), Some(&8));
    assert!(record.has_completed(3));

    let stored = repo.get_profile(account).expect("get").expect("profile");
    assert_eq!(stored.progress, record);
}

#[tokio::test]
async fn anonymous_and_mid_game_turns_commit_nothing() {
    let repo = memory_repository();
    let orch = orchestrator(ScriptedBackend::replying("Va. [REWARD: 5]"), &["k1"], repo.clone());
    let account = orch.register("gatito").await.expect("register").account_id;

    let (_, anonymous) = orch
        .player_turn_with_status(None, turn("pan", 3, 3))
        .await
        .expect("turn");
    assert_eq!(anonymous, CommitStatus::Anonymous);

    let (_, mid) = orch
        .player_turn_with_status(Some(account), turn("pan", 1, 3))
        .await
        .expect("turn");
    assert_eq!(mid, CommitStatus::NotTerminal);

    assert_eq!(orch.progress(account).await.expect("progress").total_reward, 0);
    assert!(orch.leaderboard().await.expect("board").iter().all(|e| e.total_reward == 0));
}

#[tokio::test]
async fn transient_write_failures_are_retried() {
    let repo = Arc::new(FlakyRepository::default());
    repo.fail_writes.store(2, Ordering::SeqCst);
    let orch = orchestrator(ScriptedBackend::replying("Ok. [REWARD: 4]"), &["k1"], repo.clone());
    let account = orch.register("rosa").await.expect("register").account_id;

    let (_, status) = orch
        .player_turn_with_status(Some(account), turn("elotes", 4, 4))
        .await
        .expect("turn");
    assert_eq!(status, CommitStatus::Committed);
    assert_eq!(repo.writes.load(Ordering::SeqCst), 3);
    assert_eq!(orch.progress(account).await.expect("progress").total_reward, 4);
}

#[tokio::test]
async fn persistent_write_failure_never_fails_the_turn() {
    let repo = Arc::new(FlakyRepository::default());
    repo.fail_writes.store(10, Ordering::SeqCst);
    let orch = orchestrator(ScriptedBackend::replying("Ok. [REWARD: 4]"), &["k1"], repo.clone());
    let account = orch.register("pepe").await.expect("register").account_id;

    let (reply, status) = orch
        .player_turn_with_status(Some(account), turn("elotes", 4, 4))
        .await
        .expect("turn still succeeds");
    assert_eq!(reply.outcome.expect("outcome").reward_amount, 4);
    assert_eq!(status, CommitStatus::Lost);
    assert_eq!(repo.writes.load(Ordering::SeqCst), 3);
    assert_eq!(orch.progress(account).await.expect("progress").total_reward, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_terminal_turns_commit_once() {
    let repo = Arc::new(FlakyRepository::default());
    repo.write_delay_ms.store(50, Ordering::SeqCst);
    let orch = Arc::new(orchestrator(
        ScriptedBackend::replying("Llévatelos. [REWARD: 6]"),
        &["k1"],
        repo.clone(),
    ));
    let account = orch.register("luna").await.expect("register").account_id;

    let turns: Vec<_> = (0..4)
        .map(|_| {
            let orch = Arc::clone(&orch);
            tokio::spawn(async move {
                orch.player_turn_with_status(Some(account), turn("dulces", 3, 3))
                    .await
                    .expect("turn")
                    .1
            })
        })
        .collect();
    let mut statuses = Vec::new();
    for handle in turns {
        statuses.push(handle.await.expect("join"));
    }

    let committed = statuses.iter().filter(|s| **s == CommitStatus::Committed).count();
    assert_eq!(committed, 1, "{statuses:?}");
    assert_eq!(repo.writes.load(Ordering::SeqCst), 1);
    assert_eq!(orch.progress(account).await.expect("progress").total_reward, 6);
}

#[tokio::test]
async fn slow_store_writes_do_not_stall_the_runtime() {
    let repo = Arc::new(FlakyRepository::default());
    repo.write_delay_ms.store(600, Ordering::SeqCst);
    let orch = Arc::new(orchestrator(
        ScriptedBackend::replying("Ok. [REWARD: 1]"),
        &["k1"],
        repo.clone(),
    ));
    let account = orch.register("sol").await.expect("register").account_id;

    let commit = tokio::spawn({
        let orch = Arc::clone(&orch);
        async move {
            orch.player_turn_with_status(Some(account), turn("pan", 3, 3))
                .await
                .expect("turn")
                .1
        }
    });

    // Single-threaded runtime: this timer only fires on time if the write
    // runs off the async worker.
    let started = Instant::now();
    tokio::task::yield_now().await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(started.elapsed() < Duration::from_millis(400));

    assert_eq!(commit.await.expect("join"), CommitStatus::Committed);
}

// ---------------------------------------------------------------------------
// Boundary validation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn malformed_turns_are_rejected() {
    let backend = ScriptedBackend::replying("hola");
    let orch = orchestrator(backend.clone(), &["k1"], memory_repository());

    let mut blank = turn("tacos", 1, 3);
    blank.player_message = "   ".into();
    let mut mismatched = turn("tacos", 2, 3);
    mismatched.history = common::transcript("¿Qué quieres?", 0);

    let cases = vec![
        ("unknown vendor", turn("churros", 1, 3)),
        ("round zero", turn("tacos", 0, 3)),
        ("round past target", turn("tacos", 4, 3)),
        ("target too high", turn("tacos", 1, 6)),
        ("target too low", turn("tacos", 1, 2)),
        ("blank message", blank),
        ("transcript mismatch", mismatched),
    ];

    for (name, bad) in cases {
        let result = orch.player_turn(None, bad).await;
        assert!(
            matches!(
                result,
                Err(OrchestratorError::UnknownVendor(_)
                    | OrchestratorError::Validation(_)
                    | OrchestratorError::Session(_))
            ),
            "{name} should be rejected, got {result:?}"
        );
    }
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn duplicate_or_blank_usernames_are_rejected() {
    let orch = orchestrator(ScriptedBackend::replying("hola"), &["k1"], memory_repository());
    orch.register("michi").await.expect("first");
    assert!(matches!(orch.register("michi").await, Err(OrchestratorError::Validation(_))));
    assert!(matches!(orch.register("  ").await, Err(OrchestratorError::Validation(_))));
}
