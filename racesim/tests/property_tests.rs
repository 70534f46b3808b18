//! Property tests for the simulation invariants.
//!
//! Uses proptest to verify:
//! 1. Speed bounds - every speed lies within the distance scaled bounds of the horse
//! 2. Monotonic progress - no horse ever moves backwards
//! 3. Frozen finishers - finished horses keep progress 1 and their position
//! 4. Unique positions - positions of a round always form a permutation of 1..=n
//! 5. Program shape - rounds, distances and horse draws follow the configuration

use horse_racesim::core::horse::{generate_horses, Horse};
use horse_racesim::core::race::{generate_race_program, simulate_race_step, ProgramStatus};
use horse_racesim::core::speed_model::{calc_horse_speed, SpeedBounds};
use horse_racesim::pre::read_sim_pars::{RaceConfig, SimConstants};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;

// -- Strategies (proptest) ------------------------------------------------------------------------

fn arb_condition() -> impl Strategy<Value = u32> {
    60u32..=100
}

fn arb_distance() -> impl Strategy<Value = u32> {
    prop::sample::select(vec![1200u32, 1400, 1600, 1800, 2000, 2200])
}

fn arb_field() -> impl Strategy<Value = Vec<u32>> {
    prop::collection::vec(arb_condition(), 2..12)
}

fn field(conditions: &[u32]) -> Vec<Horse> {
    conditions
        .iter()
        .enumerate()
        .map(|(i, &condition)| {
            Horse::new(i as u32 + 1, &format!("Horse {}", i + 1), "#FF0000", condition)
        })
        .collect()
}

// -- 1. Speed bounds ------------------------------------------------------------------------------

proptest! {
    #[test]
    fn speed_within_bounds(
        condition in arb_condition(),
        distance in arb_distance(),
        progress in 0.0..1.0f64,
        seed in any::<u64>(),
    ) {
        let consts = SimConstants::default();
        let mut rng = StdRng::seed_from_u64(seed);
        let mut horse = Horse::new(1, "Horse 1", "#FF0000", condition);
        let bounds = SpeedBounds::new(condition, distance, &consts);

        // repeated calls exercise the smoothing of the speed factor as well
        for _ in 0..20 {
            let speed = calc_horse_speed(&mut horse, distance, progress, &consts, &mut rng);
            prop_assert!(speed.is_finite());
            prop_assert!(speed >= bounds.min && speed <= bounds.max,
                "speed {} outside [{}, {}]", speed, bounds.min, bounds.max);
        }
        prop_assert!(horse.racing_style().is_some());
    }
}

// -- 2. to 4. Step simulator ----------------------------------------------------------------------

proptest! {
    #[test]
    fn race_invariants_hold(
        conditions in arb_field(),
        distance in arb_distance(),
        step_size in 0.05..0.5f64,
        seed in any::<u64>(),
    ) {
        let consts = SimConstants::default();
        let mut rng = StdRng::seed_from_u64(seed);
        let mut horses = field(&conditions);
        let mut finished = HashSet::new();
        let mut finish_positions = std::collections::HashMap::new();
        let mut no_results = 0;

        for _ in 0..10_000 {
            if finished.len() == horses.len() {
                break;
            }
            let before: Vec<f64> = horses.iter().map(|h| h.progress).collect();

            let results = simulate_race_step(
                &mut horses, distance, &mut finished, Some(step_size), &consts, &mut rng,
            ).unwrap();
            no_results += results.len();

            for (horse, progress_before) in horses.iter().zip(before.iter()) {
                prop_assert!(horse.progress >= *progress_before);
                prop_assert!(horse.progress <= 1.0);
            }

            for result in results.iter() {
                prop_assert!(finish_positions.insert(result.horse_id, result.position).is_none());
            }
            for horse in horses.iter().filter(|h| finished.contains(&h.id)) {
                prop_assert_eq!(horse.progress, 1.0);
                prop_assert_eq!(horse.position, finish_positions.get(&horse.id).copied());
            }

            let mut positions: Vec<u32> = horses.iter().filter_map(|h| h.position).collect();
            positions.sort_unstable();
            prop_assert_eq!(positions, (1..=horses.len() as u32).collect::<Vec<u32>>());
        }

        prop_assert_eq!(finished.len(), horses.len());
        prop_assert_eq!(no_results, horses.len());
    }
}

// -- 5. Program shape -----------------------------------------------------------------------------

proptest! {
    #[test]
    fn program_follows_config(
        horses_per_race in 1usize..=20,
        total_rounds in 1usize..=6,
        seed in any::<u64>(),
    ) {
        let mut config = RaceConfig::default();
        config.horses_per_race = horses_per_race;
        config.total_rounds = total_rounds;
        let mut rng = StdRng::seed_from_u64(seed);

        let pool = generate_horses(&config, &mut rng).unwrap();
        let program = generate_race_program(&pool, &config, &mut rng).unwrap();

        prop_assert_eq!(program.status, ProgramStatus::Generated);
        prop_assert_eq!(program.current_round, 0);
        prop_assert_eq!(program.rounds.len(), total_rounds);

        for (i, round) in program.rounds.iter().enumerate() {
            prop_assert_eq!(round.id, i as u32 + 1);
            prop_assert_eq!(round.distance, config.round_distances[i]);
            prop_assert_eq!(round.horses.len(), horses_per_race);
            prop_assert!(round.results.is_empty());

            let ids: HashSet<u32> = round.horses.iter().map(|h| h.id).collect();
            prop_assert_eq!(ids.len(), horses_per_race);
            for horse in round.horses.iter() {
                prop_assert!(pool.iter().any(|p| p.id == horse.id && p.name == horse.name));
                prop_assert_eq!(horse.progress, 0.0);
                prop_assert!(horse.position.is_none());
            }
        }
    }
}
