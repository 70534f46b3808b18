use anyhow::Context;
use helpers::general::InputValueError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::OpenOptions;
use std::path::Path;
use std::time::Duration;

pub const HORSE_NAMES: [&str; 25] = [
    "Thunder Bolt",
    "Silver Arrow",
    "Midnight Star",
    "Golden Hooves",
    "Wind Runner",
    "Storm Chaser",
    "Royal Gallop",
    "Diamond Dust",
    "Swift Spirit",
    "Blazing Speed",
    "Lucky Charm",
    "Highland Racer",
    "Shadow Dancer",
    "Victory Lap",
    "Rapid Fire",
    "Mystic Stride",
    "Brave Heart",
    "Enchanted Run",
    "Stellar Dash",
    "Noble Steed",
    "Epic Journey",
    "Graceful Gait",
    "Wild Glory",
    "Mighty Hoof",
    "Daring Dash",
];

pub const COLORS: [&str; 20] = [
    "#FF0000", "#0000FF", "#008000", "#FFFF00", "#FFA500", "#800080", "#FFC0CB", "#A52A2A",
    "#000000", "#FFFFFF", "#808080", "#00FFFF", "#FF00FF", "#00FF00", "#008080", "#4B0082",
    "#EE82EE", "#800000", "#000080", "#808000",
];

/// * `horse_count` - Number of horses in the pool
/// * `horses_per_race` - Number of horses drawn into each round
/// * `total_rounds` - Number of rounds in a program
/// * `round_distances` - (m) Ascending distance ladder, one entry per round
/// * `round_transition_delay_ms` - (ms) Pause between a finished round and the next one
/// * `round_resume_delay_ms` - (ms) Grace period before the next round starts racing
/// * `tick_interval_ms` - (ms) Wall time represented by one simulation tick
/// * `min_horse_condition` / `max_horse_condition` - Inclusive condition range at creation
/// * `horse_names` - Name list the pool is drawn from without replacement
/// * `colors` - Color palette (hex) the pool is drawn from without replacement
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct RaceConfig {
    pub horse_count: usize,
    pub horses_per_race: usize,
    pub total_rounds: usize,
    pub round_distances: Vec<u32>,
    pub round_transition_delay_ms: u64,
    pub round_resume_delay_ms: u64,
    pub tick_interval_ms: u64,
    pub min_horse_condition: u32,
    pub max_horse_condition: u32,
    pub horse_names: Vec<String>,
    pub colors: Vec<String>,
}

impl Default for RaceConfig {
    fn default() -> Self {
        RaceConfig {
            horse_count: 20,
            horses_per_race: 10,
            total_rounds: 6,
            round_distances: vec![1200, 1400, 1600, 1800, 2000, 2200],
            round_transition_delay_ms: 6000,
            round_resume_delay_ms: 500,
            tick_interval_ms: 50,
            min_horse_condition: 60,
            max_horse_condition: 100,
            horse_names: HORSE_NAMES.iter().map(|&name| name.to_owned()).collect(),
            colors: COLORS.iter().map(|&color| color.to_owned()).collect(),
        }
    }
}

impl RaceConfig {
    pub fn round_transition_delay(&self) -> Duration {
        Duration::from_millis(self.round_transition_delay_ms)
    }

    pub fn round_resume_delay(&self) -> Duration {
        Duration::from_millis(self.round_resume_delay_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

/// Tuning constants of the speed model and the step simulator.
///
/// * `step_size` - Default progress step multiplier per tick
/// * `min_condition` / `max_condition` - Normalization range of the condition
/// * `frontrunner_boost` / `frontrunner_fade` - Early multiplier and its quadratic fade
/// * `closer_start_penalty` / `closer_boost` - Early penalty and cubic late bonus
/// * `position_factor` / `max_pack_boost` - Pack racing boost per position behind and its cap
/// * `stability_base_min` / `stability_base_max` - Bounds of the condition based stability
/// * `base_multiplier` - Base speed multiplier
/// * `minimum_speed_factor` / `maximum_speed_factor` - Speed bounds at the reference distance
/// * `transition_rate_base` - Base rate at which the speed factor follows its target
/// * `burst_chance` - Probability of a one-tick speed burst
/// * `min_burst_boost` / `max_burst_boost` - Range of the burst multiplier
/// * `reference_distance` - (m) Shortest distance, all distance scaling is relative to it
/// * `distance_preference_weight` - Linear penalty weight of a distance mismatch
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct SimConstants {
    pub step_size: f64,
    pub min_condition: f64,
    pub max_condition: f64,
    pub frontrunner_boost: f64,
    pub frontrunner_fade: f64,
    pub closer_start_penalty: f64,
    pub closer_boost: f64,
    pub position_factor: f64,
    pub max_pack_boost: f64,
    pub stability_base_min: f64,
    pub stability_base_max: f64,
    pub base_multiplier: f64,
    pub minimum_speed_factor: f64,
    pub maximum_speed_factor: f64,
    pub transition_rate_base: f64,
    pub burst_chance: f64,
    pub min_burst_boost: f64,
    pub max_burst_boost: f64,
    pub reference_distance: f64,
    pub distance_preference_weight: f64,
}

impl Default for SimConstants {
    fn default() -> Self {
        SimConstants {
            step_size: 0.005,
            min_condition: 60.0,
            max_condition: 100.0,
            frontrunner_boost: 1.07,
            frontrunner_fade: 0.25,
            closer_start_penalty: 0.85,
            closer_boost: 0.25,
            position_factor: 0.08,
            max_pack_boost: 0.3,
            stability_base_min: 0.9,
            stability_base_max: 0.99,
            base_multiplier: 0.075,
            minimum_speed_factor: 0.071,
            maximum_speed_factor: 0.1,
            transition_rate_base: 0.08,
            burst_chance: 0.005,
            min_burst_boost: 1.04,
            max_burst_boost: 1.12,
            reference_distance: 1200.0,
            distance_preference_weight: 0.03,
        }
    }
}

/// SimPars is used to store all other parameter structs.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct SimPars {
    pub race_config: RaceConfig,
    pub sim_constants: SimConstants,
}

impl SimPars {
    /// validate checks the parameters for consistency. The first violated requirement is
    /// returned.
    pub fn validate(&self) -> Result<(), InputValueError> {
        let cfg = &self.race_config;
        let consts = &self.sim_constants;

        if cfg.horse_count == 0 {
            return Err(InputValueError::new("horse_count", "must be positive"));
        }
        if cfg.horses_per_race == 0 || cfg.horses_per_race > cfg.horse_count {
            return Err(InputValueError::new(
                "horses_per_race",
                "must be in [1, horse_count]",
            ));
        }
        if cfg.total_rounds == 0 || cfg.round_distances.len() < cfg.total_rounds {
            return Err(InputValueError::new(
                "round_distances",
                "must contain one distance per round",
            ));
        }
        if cfg.round_distances.iter().any(|&d| d == 0)
            || cfg.round_distances.windows(2).any(|w| w[0] >= w[1])
        {
            return Err(InputValueError::new(
                "round_distances",
                "must be positive and strictly ascending",
            ));
        }
        if cfg.min_horse_condition > cfg.max_horse_condition {
            return Err(InputValueError::new(
                "min_horse_condition",
                "must not exceed max_horse_condition",
            ));
        }
        if (cfg.min_horse_condition as f64) < consts.min_condition
            || (cfg.max_horse_condition as f64) > consts.max_condition
        {
            return Err(InputValueError::new(
                "max_horse_condition",
                "condition range must lie within the speed model's condition range",
            ));
        }
        if count_unique(&cfg.horse_names) < cfg.horse_count {
            return Err(InputValueError::new(
                "horse_names",
                "needs at least horse_count unique names",
            ));
        }
        if count_unique(&cfg.colors) < cfg.horse_count {
            return Err(InputValueError::new(
                "colors",
                "needs at least horse_count unique colors",
            ));
        }
        if cfg.tick_interval_ms == 0 {
            return Err(InputValueError::new("tick_interval_ms", "must be positive"));
        }
        if consts.min_condition >= consts.max_condition {
            return Err(InputValueError::new(
                "min_condition",
                "must be below max_condition",
            ));
        }
        if !(consts.step_size > 0.0) {
            return Err(InputValueError::new("step_size", "must be positive"));
        }
        if !(0.0..=1.0).contains(&consts.burst_chance) {
            return Err(InputValueError::new("burst_chance", "must be in [0, 1]"));
        }
        if consts.min_burst_boost > consts.max_burst_boost {
            return Err(InputValueError::new(
                "min_burst_boost",
                "must not exceed max_burst_boost",
            ));
        }
        if !(consts.minimum_speed_factor > 0.0)
            || consts.minimum_speed_factor >= consts.maximum_speed_factor
        {
            return Err(InputValueError::new(
                "minimum_speed_factor",
                "must be positive and below maximum_speed_factor",
            ));
        }
        if !(consts.reference_distance > 0.0) {
            return Err(InputValueError::new("reference_distance", "must be positive"));
        }

        Ok(())
    }
}

fn count_unique(values: &[String]) -> usize {
    values.iter().collect::<HashSet<_>>().len()
}

/// read_sim_pars reads the JSON file and decodes the JSON string into the simulation parameters
/// struct. Missing fields are filled with their defaults, the result is validated.
pub fn read_sim_pars(filepath: &Path) -> anyhow::Result<SimPars> {
    let fh = OpenOptions::new()
        .read(true)
        .open(filepath)
        .with_context(|| format!("Failed to open parameter file {}!", filepath.display()))?;
    let pars: SimPars = serde_json::from_reader(&fh)
        .with_context(|| format!("Failed to parse parameter file {}!", filepath.display()))?;
    pars.validate()
        .with_context(|| format!("Invalid parameters in {}!", filepath.display()))?;
    Ok(pars)
}
