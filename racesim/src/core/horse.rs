use crate::core::error::RaceError;
use crate::pre::read_sim_pars::RaceConfig;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Behavioral archetype that shapes the speed curve over the course of a race.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RacingStyle {
    /// Fast start, fades towards the finish
    Frontrunner,
    /// Consistent pace
    Steady,
    /// Slow start, strong finish
    Closer,
}

impl RacingStyle {
    /// from_roll maps a uniform draw in [0, 1) to a style: < 0.3 frontrunner, < 0.7 steady, else
    /// closer.
    pub fn from_roll(roll: f64) -> RacingStyle {
        if roll < 0.3 {
            RacingStyle::Frontrunner
        } else if roll < 0.7 {
            RacingStyle::Steady
        } else {
            RacingStyle::Closer
        }
    }
}

/// Per-round random coefficients of a horse. They are drawn on the first speed evaluation of a
/// round and stay constant for the rest of it, except `last_speed_factor` which carries the
/// smoothed speed from tick to tick.
///
/// * `race_day_factor` - Day-to-day performance variation in [0.95, 1.05]
/// * `track_preference` - Track condition affinity in [0.96, 1.04]
/// * `lucky_factor` - Luck in [0.97, 1.03]
/// * `distance_preference` - Preference for shorter (-0.03) or longer (+0.03) races
/// * `racing_style` - Style used for this round
/// * `last_speed_factor` - Smoothed speed factor of the previous tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceDayFactors {
    pub race_day_factor: f64,
    pub track_preference: f64,
    pub lucky_factor: f64,
    pub distance_preference: f64,
    pub racing_style: RacingStyle,
    pub last_speed_factor: f64,
}

/// Whether the per-round coefficients of a horse have been drawn for the current round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RaceDayState {
    NotInitialized,
    Initialized(RaceDayFactors),
}

impl Default for RaceDayState {
    fn default() -> Self {
        RaceDayState::NotInitialized
    }
}

/// * `id` - Unique id within the pool (1..N)
/// * `name` - Unique name within the pool
/// * `color` - Unique hex color within the pool
/// * `condition` - Long-run ability, never changed after creation
/// * `progress` - Fraction of the course completed in the current round
/// * `position` - Live 1-based rank in the current round, None until computed
/// * `race_day` - Per-round random coefficients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Horse {
    pub id: u32,
    pub name: String,
    pub color: String,
    pub condition: u32,
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub position: Option<u32>,
    #[serde(default)]
    pub race_day: RaceDayState,
}

impl Horse {
    pub fn new(id: u32, name: &str, color: &str, condition: u32) -> Horse {
        Horse {
            id,
            name: name.to_owned(),
            color: color.to_owned(),
            condition,
            progress: 0.0,
            position: None,
            race_day: RaceDayState::NotInitialized,
        }
    }

    /// Racing style of the current round, None before the first speed evaluation.
    pub fn racing_style(&self) -> Option<RacingStyle> {
        match &self.race_day {
            RaceDayState::Initialized(factors) => Some(factors.racing_style),
            RaceDayState::NotInitialized => None,
        }
    }

    /// The method clears all state belonging to a single round, such that the speed model draws
    /// fresh coefficients (including the racing style) on the next evaluation.
    pub fn reset_race_state(&mut self) {
        self.progress = 0.0;
        self.position = None;
        self.race_day = RaceDayState::NotInitialized;
    }
}

/// generate_horses creates the horse pool with unique shuffled names and colors and a condition
/// drawn uniformly from the configured inclusive range.
pub fn generate_horses<R: Rng + ?Sized>(
    config: &RaceConfig,
    rng: &mut R,
) -> Result<Vec<Horse>, RaceError> {
    if config.min_horse_condition > config.max_horse_condition {
        return Err(RaceError::HorseGenerationFailed(format!(
            "condition range [{}, {}] is empty",
            config.min_horse_condition, config.max_horse_condition
        )));
    }

    let names = draw_unique(&config.horse_names, config.horse_count, rng).ok_or_else(|| {
        RaceError::HorseGenerationFailed(format!(
            "{} unique names required, {} available",
            config.horse_count,
            config.horse_names.len()
        ))
    })?;
    let colors = draw_unique(&config.colors, config.horse_count, rng).ok_or_else(|| {
        RaceError::HorseGenerationFailed(format!(
            "{} unique colors required, {} available",
            config.horse_count,
            config.colors.len()
        ))
    })?;

    let horses = names
        .iter()
        .zip(colors.iter())
        .enumerate()
        .map(|(i, (name, color))| {
            let condition = rng.gen_range(config.min_horse_condition..=config.max_horse_condition);
            Horse::new(i as u32 + 1, name, color, condition)
        })
        .collect();

    Ok(horses)
}

/// draw_unique draws `amount` distinct values without replacement. Duplicates in the source list
/// are collapsed first, None is returned if not enough distinct values are left.
fn draw_unique<R: Rng + ?Sized>(values: &[String], amount: usize, rng: &mut R) -> Option<Vec<String>> {
    let mut unique: Vec<&String> = Vec::with_capacity(values.len());
    for value in values {
        if !unique.contains(&value) {
            unique.push(value);
        }
    }

    if unique.len() < amount {
        return None;
    }

    unique.shuffle(rng);
    Some(unique.into_iter().take(amount).cloned().collect())
}

/// reset_horse_progress clears progress, position and every per-round coefficient of the given
/// horses.
pub fn reset_horse_progress(horses: &mut [Horse]) {
    for horse in horses.iter_mut() {
        horse.reset_race_state();
    }
}
