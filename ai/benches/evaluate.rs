use criterion::{black_box, criterion_group, criterion_main, Criterion};

use contrast_ai::NTupleNetwork;
use contrast_core::rules;
use contrast_core::GameState;

fn bench_evaluate(c: &mut Criterion) {
    let network = NTupleNetwork::new();

    let mut state = GameState::new();
    for _ in 0..6 {
        let moves = rules::legal_moves(&state);
        if moves.is_empty() {
            break;
        }
        let mv = moves[moves.len() / 2];
        state.apply_move(&mv);
    }

    c.bench_function("evaluate_midgame", |b| {
        b.iter(|| network.evaluate(black_box(&state)))
    });

    c.bench_function("one_ply_scan", |b| {
        b.iter(|| {
            let moves = rules::legal_moves(black_box(&state));
            moves
                .iter()
                .map(|mv| {
                    let mut next = state.clone();
                    next.apply_move(mv);
                    -network.evaluate(&next)
                })
                .fold(f32::NEG_INFINITY, f32::max)
        })
    });
}

criterion_group!(benches, bench_evaluate);
criterion_main!(benches);
