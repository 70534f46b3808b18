//! Per-tick speed model.
//!
//! Turns the static condition of a horse and its per-round coefficients into a speed, i.e. the
//! progress (fraction of the course) gained per unit step. All factors are multiplicative; the
//! result is smoothed over ticks and clamped to distance scaled bounds.

use crate::core::horse::{Horse, RaceDayFactors, RaceDayState, RacingStyle};
use crate::pre::read_sim_pars::SimConstants;
use rand::Rng;
use rand_distr::{Distribution, Uniform};
use std::f64::consts::PI;

const RACE_DAY_FACTOR_RANGE: (f64, f64) = (0.95, 1.05);
const TRACK_PREFERENCE_RANGE: (f64, f64) = (0.96, 1.04);
const LUCKY_FACTOR_RANGE: (f64, f64) = (0.97, 1.03);
const DISTANCE_PREFERENCE_RANGE: (f64, f64) = (-0.03, 0.03);

/// SpeedBounds contains the admissible speed range of a horse for a given distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedBounds {
    pub min: f64,
    pub max: f64,
}

impl SpeedBounds {
    /// Both bounds shrink with the distance (reference_distance / distance), the upper one also
    /// grows by up to 20 % with the condition.
    pub fn new(condition: u32, distance: u32, consts: &SimConstants) -> SpeedBounds {
        let distance_scaling_factor = consts.reference_distance / distance as f64;
        let condition_speed_bonus = 1.0 + condition_impact(condition, consts) * 0.2;

        SpeedBounds {
            min: consts.minimum_speed_factor * distance_scaling_factor,
            max: consts.maximum_speed_factor * condition_speed_bonus * distance_scaling_factor,
        }
    }

    pub fn clamp(&self, speed: f64) -> f64 {
        speed.max(self.min).min(self.max)
    }
}

/// condition_impact normalizes the condition to [0, 1] over the configured condition range.
pub fn condition_impact(condition: u32, consts: &SimConstants) -> f64 {
    (condition as f64 - consts.min_condition) / (consts.max_condition - consts.min_condition)
}

/// draw_race_day_factors draws the per-round coefficients of a horse.
pub fn draw_race_day_factors<R: Rng + ?Sized>(rng: &mut R) -> RaceDayFactors {
    let race_day_factor = draw_in(RACE_DAY_FACTOR_RANGE, rng);
    let track_preference = draw_in(TRACK_PREFERENCE_RANGE, rng);
    let lucky_factor = draw_in(LUCKY_FACTOR_RANGE, rng);
    let racing_style = RacingStyle::from_roll(rng.gen::<f64>());
    let distance_preference = draw_in(DISTANCE_PREFERENCE_RANGE, rng);

    RaceDayFactors {
        race_day_factor,
        track_preference,
        lucky_factor,
        distance_preference,
        racing_style,
        last_speed_factor: 1.0,
    }
}

fn draw_in<R: Rng + ?Sized>(range: (f64, f64), rng: &mut R) -> f64 {
    Uniform::new_inclusive(range.0, range.1).sample(rng)
}

/// racing_style_factor returns the progress dependent multiplier of a racing style.
pub fn racing_style_factor(
    style: RacingStyle,
    condition: u32,
    progress: f64,
    consts: &SimConstants,
) -> f64 {
    let impact = condition_impact(condition, consts);
    let style_effectiveness = 0.7 + impact * 0.3;

    match style {
        RacingStyle::Frontrunner => {
            // fitter horses fade less
            let fade_factor = consts.frontrunner_fade * (1.0 - impact);
            consts.frontrunner_boost * style_effectiveness * (1.0 - progress.powi(2) * fade_factor)
        }
        RacingStyle::Closer => {
            let closing_power = consts.closer_boost * style_effectiveness;
            consts.closer_start_penalty + progress.powi(3) * closing_power
        }
        RacingStyle::Steady => style_effectiveness,
    }
}

/// pack_racing_factor boosts horses running behind the leader. Stronger horses depend less on
/// the pack.
pub fn pack_racing_factor(position: Option<u32>, condition: u32, consts: &SimConstants) -> f64 {
    match position {
        Some(pos) if pos > 1 => {
            let independence_factor = (condition as f64 / consts.max_condition).max(0.5).min(1.0);
            let pack_dependence = 1.2 - independence_factor;
            let position_factor =
                ((pos - 1) as f64 * consts.position_factor).min(consts.max_pack_boost);
            1.0 + position_factor * pack_dependence
        }
        _ => 1.0,
    }
}

/// section_factor is a low amplitude oscillation over the course, phase shifted per horse.
pub fn section_factor(horse_id: u32, progress: f64) -> f64 {
    (progress * PI * 2.0 + horse_id as f64 * 0.7).sin() * 0.01
}

/// calc_horse_speed returns the current speed of a horse for the given distance and progress.
///
/// On the first call within a round the per-round coefficients of the horse are drawn. Each call
/// updates the smoothed speed factor stored on the horse. The returned value always lies within
/// `SpeedBounds::new(horse.condition, distance, consts)`.
pub fn calc_horse_speed<R: Rng + ?Sized>(
    horse: &mut Horse,
    distance: u32,
    progress: f64,
    consts: &SimConstants,
    rng: &mut R,
) -> f64 {
    let mut factors = match std::mem::take(&mut horse.race_day) {
        RaceDayState::Initialized(factors) => factors,
        RaceDayState::NotInitialized => draw_race_day_factors(rng),
    };

    let condition = horse.condition;

    let impact = condition_impact(condition, consts);
    let condition_factor = impact.powi(2);
    let base_speed = (condition as f64 / 10.0) * (0.90 + condition_factor * 0.7);

    // random one-tick burst
    let burst_factor = if rng.gen::<f64>() < consts.burst_chance {
        Uniform::new_inclusive(consts.min_burst_boost, consts.max_burst_boost).sample(rng)
    } else {
        1.0
    };

    let style_factor = racing_style_factor(factors.racing_style, condition, progress, consts);
    let pack_factor = pack_racing_factor(horse.position, condition, consts);

    // stability damps the jitter of fitter horses
    let stability_base = (condition as f64 / consts.max_condition)
        .min(consts.stability_base_max)
        .max(consts.stability_base_min);
    let stability_variance = (consts.max_condition - condition as f64) / 2000.0;
    let stability_factor = stability_base + rng.gen::<f64>() * stability_variance;
    let random_adjustment = (rng.gen::<f64>() * 0.01 - 0.005) * (1.01 - stability_factor);

    let sect_factor = section_factor(horse.id, progress);

    let target_factor = factors.race_day_factor
        * factors.track_preference
        * factors.lucky_factor
        * burst_factor
        * style_factor
        * pack_factor
        * (1.0 + sect_factor)
        * (1.0 + random_adjustment);

    // fitter horses adapt their pace faster
    let transition_rate = consts.transition_rate_base * (1.0 + impact * 0.5);
    let new_speed_factor =
        factors.last_speed_factor * (1.0 - transition_rate) + target_factor * transition_rate;
    factors.last_speed_factor = new_speed_factor;

    let race_length = distance as f64 / consts.reference_distance;
    let distance_match_factor = 1.0
        - (race_length - (1.0 + factors.distance_preference)).abs()
            * consts.distance_preference_weight;

    let base_multiplier = consts.base_multiplier * (1.0 + impact * 0.25);
    let distance_scaling_factor = consts.reference_distance / distance as f64;

    let speed = base_speed
        * base_multiplier
        * new_speed_factor
        * distance_match_factor
        * distance_scaling_factor;

    horse.race_day = RaceDayState::Initialized(factors);

    SpeedBounds::new(condition, distance, consts).clamp(speed)
}
