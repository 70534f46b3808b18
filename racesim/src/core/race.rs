use crate::core::error::RaceError;
use crate::core::horse::Horse;
use crate::core::speed_model::calc_horse_speed;
use crate::post::race_result::RaceResult;
use crate::pre::read_sim_pars::{RaceConfig, SimConstants};
use helpers::general::{argsort, SortOrder};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoundStatus {
    Pending,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProgramStatus {
    Idle,
    Generated,
    Racing,
    Paused,
    Completed,
}

impl Default for ProgramStatus {
    fn default() -> Self {
        ProgramStatus::Idle
    }
}

/// * `id` - 1-based round number
/// * `distance` - (m) Race distance of the round
/// * `horses` - Round-local copies of the participating horses
/// * `results` - Results keyed by horse id, no duplicates
/// * `status` - Round status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceRound {
    pub id: u32,
    pub distance: u32,
    pub horses: Vec<Horse>,
    pub results: Vec<RaceResult>,
    pub status: RoundStatus,
}

impl RaceRound {
    /// upsert_result replaces the result of the same horse or appends a new one.
    pub fn upsert_result(&mut self, result: RaceResult) {
        match self
            .results
            .iter_mut()
            .find(|r| r.horse_id == result.horse_id)
        {
            Some(existing) => *existing = result,
            None => self.results.push(result),
        }
    }

    pub fn get_horse(&self, horse_id: u32) -> Option<&Horse> {
        self.horses.iter().find(|h| h.id == horse_id)
    }

    /// get_all_finished returns true once every horse of the round has a result.
    pub fn get_all_finished(&self) -> bool {
        !self.horses.is_empty()
            && self
                .horses
                .iter()
                .all(|h| self.results.iter().any(|r| r.horse_id == h.id))
    }

    /// Results sorted by finishing position.
    pub fn get_sorted_results(&self) -> Vec<RaceResult> {
        let mut results = self.results.to_owned();
        results.sort_by_key(|r| r.position);
        results
    }
}

/// * `rounds` - Ordered rounds of the program
/// * `current_round` - 0-based index of the active round
/// * `status` - Overall program status
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RaceProgram {
    pub rounds: Vec<RaceRound>,
    pub current_round: usize,
    pub status: ProgramStatus,
}

impl RaceProgram {
    pub fn get_current_round(&self) -> Option<&RaceRound> {
        self.rounds.get(self.current_round)
    }

    pub fn get_current_round_mut(&mut self) -> Option<&mut RaceRound> {
        self.rounds.get_mut(self.current_round)
    }

    pub fn is_last_round(&self) -> bool {
        self.current_round + 1 >= self.rounds.len()
    }
}

/// generate_race_program builds the configured number of rounds. Each round draws its horses
/// without replacement from the pool and gets the distance of the ladder entry at its index. The
/// round horses are fresh copies with cleared race state.
pub fn generate_race_program<R: Rng + ?Sized>(
    horses: &[Horse],
    config: &RaceConfig,
    rng: &mut R,
) -> Result<RaceProgram, RaceError> {
    if horses.len() < config.horses_per_race {
        return Err(RaceError::ProgramGenerationFailed(format!(
            "{} horses per race requested, pool contains {}",
            config.horses_per_race,
            horses.len()
        )));
    }

    let mut rounds = Vec::with_capacity(config.total_rounds);

    for i in 0..config.total_rounds {
        let distance = *config.round_distances.get(i).ok_or_else(|| {
            RaceError::ProgramGenerationFailed(format!("no distance configured for round {}", i + 1))
        })?;

        let round_horses: Vec<Horse> = horses
            .choose_multiple(rng, config.horses_per_race)
            .map(|horse| {
                let mut horse = horse.to_owned();
                horse.reset_race_state();
                horse
            })
            .collect();

        rounds.push(RaceRound {
            id: i as u32 + 1,
            distance,
            horses: round_horses,
            results: Vec::new(),
            status: RoundStatus::Pending,
        });
    }

    Ok(RaceProgram {
        rounds,
        current_round: 0,
        status: ProgramStatus::Generated,
    })
}

/// validate_horse checks the data the speed model relies on.
fn validate_horse(horse: &Horse, consts: &SimConstants) -> Result<(), RaceError> {
    let condition = horse.condition as f64;
    if condition < consts.min_condition || condition > consts.max_condition {
        return Err(RaceError::MalformedHorse {
            horse_id: horse.id,
            reason: format!(
                "condition {} outside [{}, {}]",
                horse.condition, consts.min_condition, consts.max_condition
            ),
        });
    }
    if !horse.progress.is_finite() || horse.progress < 0.0 {
        return Err(RaceError::MalformedHorse {
            horse_id: horse.id,
            reason: format!("progress {} is not a valid course fraction", horse.progress),
        });
    }
    Ok(())
}

/// simulate_race_step advances every horse that has not finished yet by one tick and returns the
/// results of the horses that crossed the finish line in this tick.
///
/// * `finished_horses` - Ids of finished horses, owned by the caller for the whole round
/// * `step_size` - Progress step multiplier, `consts.step_size` if None
///
/// Horses finishing in the same call get sequential positions in iteration order. Finished horses
/// keep progress 1 and their finish position, the others are ranked behind them by descending
/// progress. The horses are validated before any of them is touched.
pub fn simulate_race_step<R: Rng + ?Sized>(
    horses: &mut [Horse],
    distance: u32,
    finished_horses: &mut HashSet<u32>,
    step_size: Option<f64>,
    consts: &SimConstants,
    rng: &mut R,
) -> Result<Vec<RaceResult>, RaceError> {
    if distance == 0 {
        return Err(RaceError::InvalidDistance(distance));
    }
    for horse in horses.iter().filter(|h| !finished_horses.contains(&h.id)) {
        validate_horse(horse, consts)?;
    }

    let step_size = step_size.unwrap_or(consts.step_size);
    let mut results = Vec::new();

    // advance unfinished horses
    for horse in horses.iter_mut() {
        if finished_horses.contains(&horse.id) {
            continue;
        }

        let progress = horse.progress;
        let speed = calc_horse_speed(horse, distance, progress, consts, rng);
        let new_progress = (progress + speed * step_size).max(progress);

        if new_progress >= 1.0 {
            finished_horses.insert(horse.id);
            horse.progress = 1.0;
            horse.position = Some(finished_horses.len() as u32);

            results.push(RaceResult {
                position: finished_horses.len() as u32,
                horse_id: horse.id,
                horse_name: horse.name.to_owned(),
                finish_time: None,
            });
        } else {
            horse.progress = new_progress;
        }
    }

    // rank the remaining horses behind the finished ones, starting at finished + 1 so live
    // positions stay unique within the round
    let running_idxs: Vec<usize> = (0..horses.len())
        .filter(|&i| !finished_horses.contains(&horses[i].id))
        .collect();
    let running_progress: Vec<f64> = running_idxs.iter().map(|&i| horses[i].progress).collect();
    let no_finished = horses.len() - running_idxs.len();

    for (rank, sorted_idx) in argsort(&running_progress, SortOrder::Descending)
        .into_iter()
        .enumerate()
    {
        horses[running_idxs[sorted_idx]].position = Some((no_finished + rank + 1) as u32);
    }

    Ok(results)
}
