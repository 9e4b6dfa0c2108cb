//! Tianguis benchmark suite.
//!
//! Everything here sits on the per-turn hot path outside the network call:
//!   directive_extraction_terminal ..... parse, strip and clamp `[REWARD: n]`
//!   fallback_turn_terminal ............ canned reply when the backend is down
//!   vendor_prompt_terminal ............ system prompt with scoring rubric
//!   key_rotation_next ................. shared credential cursor

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use rand::SeedableRng;
use rand::rngs::StdRng;

use tianguis_core::VendorCatalog;
use tianguis_core::outcome;
use tianguis_llm::{KeyRotationPool, VendorPrompt};

const TERMINAL_REPLY: &str = "¡Ay, qué bonito lo que dices! Me recuerdas a mi esposo, \
    que en paz descanse. Ándale, llévate unas conchitas.\n[REWARD: 9]";

fn bench_directive_extraction(c: &mut Criterion) {
    let catalog = VendorCatalog::builtin();
    let vendor = catalog.get("pan").expect("builtin vendor");

    c.bench_function("directive_extraction_terminal", |b| {
        b.iter(|| black_box(outcome::extract(vendor, black_box(TERMINAL_REPLY), true)));
    });

    c.bench_function("directive_extraction_passthrough", |b| {
        b.iter(|| black_box(outcome::extract(vendor, black_box(TERMINAL_REPLY), false)));
    });
}

fn bench_fallback(c: &mut Criterion) {
    let catalog = VendorCatalog::builtin();
    let vendor = catalog.get("tacos").expect("builtin vendor");
    let mut rng = StdRng::seed_from_u64(42);

    c.bench_function("fallback_turn_terminal", |b| {
        b.iter(|| black_box(outcome::fallback_turn(&catalog, vendor, true, &mut rng)));
    });
}

fn bench_prompt(c: &mut Criterion) {
    let catalog = VendorCatalog::builtin();
    let vendor = catalog.get("elotes").expect("builtin vendor");
    let prompt = VendorPrompt {
        persona: &vendor.persona_prompt,
        reward_item: &vendor.reward_item_name,
        difficulty: vendor.difficulty,
        round: 5,
        round_target: 5,
    };

    c.bench_function("vendor_prompt_terminal", |b| {
        b.iter(|| black_box(black_box(&prompt).system_prompt()));
    });
}

fn bench_rotation(c: &mut Criterion) {
    let pool = KeyRotationPool::new((0..11).map(|i| format!("key-{i}")));

    c.bench_function("key_rotation_next", |b| {
        b.iter(|| {
            let _ = black_box(pool.next());
        });
    });
}

criterion_group!(
    benches,
    bench_directive_extraction,
    bench_fallback,
    bench_prompt,
    bench_rotation
);
criterion_main!(benches);
