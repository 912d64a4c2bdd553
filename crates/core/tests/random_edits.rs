//! Seeded random edit sequences checking the store invariants and the
//! converter's round-trip and monotonicity properties.

use beatmap_timing_core::{Rejected, TimingEngine};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

const SEEDS: u64 = 32;
const EDITS_PER_SEED: usize = 60;

fn offsets(engine: &TimingEngine) -> Vec<f64> {
    engine
        .points()
        .points()
        .iter()
        .map(|p| p.offset_seconds())
        .collect()
}

fn strictly_increasing(values: &[f64]) -> bool {
    values.windows(2).all(|pair| pair[0] < pair[1])
}

fn random_edit(engine: &mut TimingEngine, rng: &mut ChaCha8Rng) {
    let ids: Vec<_> = engine.points().points().iter().map(|p| p.id()).collect();
    let id = ids[rng.random_range(0..ids.len())];

    let before = engine.snapshot();
    let outcome: Result<(), Rejected> = match rng.random_range(0..20) {
        0..=4 => engine
            .insert_timing_point(rng.random_range(-5.0..60.0), rng.random_range(30.0..300.0))
            .map(|_| ()),
        5..=6 => engine.move_timing_point(id, rng.random_range(-5.0..60.0)),
        7..=8 => engine.set_bpm(id, rng.random_range(-50.0..300.0)),
        9 => engine.delete_timing_point(id),
        10..=11 => {
            engine.update_time_signature(
                rng.random_range(-2..24),
                rng.random_range(-1..13),
                rng.random_range(0..70),
            );
            Ok(())
        }
        12 => engine.remove_time_signature(rng.random_range(0..24)),
        13 => engine.move_time_signature(rng.random_range(0..24), rng.random_range(-2..24)),
        14..=15 => {
            if engine.undo().is_none() {
                assert_eq!(engine.snapshot(), before, "empty undo changed state");
            }
            Ok(())
        }
        16..=17 => {
            if engine.redo().is_none() {
                assert_eq!(engine.snapshot(), before, "empty redo changed state");
            }
            Ok(())
        }
        18 if rng.random_bool(0.25) => {
            engine.clear_all();
            Ok(())
        }
        _ => engine
            .insert_timing_point(rng.random_range(-5.0..60.0), 120.0)
            .map(|_| ()),
    };

    if outcome.is_err() {
        assert_eq!(engine.snapshot(), before, "rejected edit changed state");
    }
}

#[test]
fn offsets_stay_strictly_increasing() {
    for seed in 0..SEEDS {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut engine = TimingEngine::default();

        for _ in 0..EDITS_PER_SEED {
            random_edit(&mut engine, &mut rng);
            assert!(strictly_increasing(&offsets(&engine)), "seed {seed}");
            assert!(engine.points().is_consistent(), "seed {seed}");
            assert!(engine.signatures().is_consistent(), "seed {seed}");
        }
    }
}

#[test]
fn cached_positions_match_the_converter() {
    for seed in 0..SEEDS {
        let mut rng = ChaCha8Rng::seed_from_u64(1_000 + seed);
        let mut engine = TimingEngine::default();
        for _ in 0..EDITS_PER_SEED {
            random_edit(&mut engine, &mut rng);
        }

        for point in engine.points().points() {
            let position = engine.time_to_musical_position(point.offset_seconds());
            assert!(
                (position - point.musical_position()).abs() < 1e-6,
                "seed {seed}: cached {} vs converted {position}",
                point.musical_position()
            );
        }
    }
}

#[test]
fn time_and_position_round_trip() {
    for seed in 0..SEEDS {
        let mut rng = ChaCha8Rng::seed_from_u64(2_000 + seed);
        let mut engine = TimingEngine::default();
        for _ in 0..EDITS_PER_SEED {
            random_edit(&mut engine, &mut rng);
        }

        for _ in 0..50 {
            let time = rng.random_range(-10.0..90.0);
            let back = engine.musical_position_to_time(engine.time_to_musical_position(time));
            assert!((back - time).abs() < 1e-6, "seed {seed}: {time} -> {back}");

            let position = rng.random_range(-3.0..40.0);
            let back = engine.time_to_musical_position(engine.musical_position_to_time(position));
            assert!(
                (back - position).abs() < 1e-6,
                "seed {seed}: {position} -> {back}"
            );
        }
    }
}

#[test]
fn position_is_monotonic_in_time() {
    for seed in 0..SEEDS {
        let mut rng = ChaCha8Rng::seed_from_u64(3_000 + seed);
        let mut engine = TimingEngine::default();
        for _ in 0..EDITS_PER_SEED {
            random_edit(&mut engine, &mut rng);
        }

        let mut previous = f64::NEG_INFINITY;
        for step in 0..2_000 {
            let time = -10.0 + step as f64 * 0.05;
            let position = engine.time_to_musical_position(time);
            assert!(position >= previous, "seed {seed}: decreasing at {time}s");
            previous = position;
        }
    }
}

#[test]
fn undo_to_start_and_redo_to_end() {
    for seed in 0..8 {
        let mut rng = ChaCha8Rng::seed_from_u64(4_000 + seed);
        let mut engine = TimingEngine::default();
        let initial = engine.snapshot();
        for _ in 0..EDITS_PER_SEED {
            random_edit(&mut engine, &mut rng);
        }
        // Interleaved undos may leave a redo tail; the journal ends past it.
        while engine.redo().is_some() {}
        let last = engine.snapshot();

        while engine.undo().is_some() {}
        assert_eq!(engine.snapshot(), initial, "seed {seed}");
        while engine.redo().is_some() {}
        assert_eq!(engine.snapshot(), last, "seed {seed}");
    }
}
