use crate::core::race::RaceRound;
use crate::core::state_handler::RaceController;
use crate::interfaces::render_interface::{RaceState, MAX_RENDER_UPDATE_FREQUENCY};
use crate::post::race_result::{ProgramResult, ProgressTrace, RoundResult};
use crate::pre::read_sim_pars::SimPars;
use anyhow::Context;
use flume::Sender;
use std::thread::sleep;
use std::time::{Duration, Instant};

/// handle_program creates a horse pool and a race program on the basis of the inserted
/// parameters, races all rounds including the pauses between them, and returns the results for
/// post-processing.
///
/// * `step_size` - Progress step multiplier per tick, the configured one if None
/// * `print_debug` - Log the state of the race once per second of race time
/// * `tx` - If set, the program runs in real-time and race snapshots are sent through it
/// * `realtime_factor` - Speed-up of the real-time mode
pub fn handle_program(
    sim_pars: &SimPars,
    step_size: Option<f64>,
    print_debug: bool,
    tx: Option<&Sender<RaceState>>,
    realtime_factor: f64,
) -> anyhow::Result<ProgramResult> {
    if realtime_factor <= 0.0 || !realtime_factor.is_finite() {
        anyhow::bail!("Real-time factor must be positive, got {}!", realtime_factor);
    }

    sim_pars
        .validate()
        .context("Invalid simulation parameters!")?;

    let mut controller = RaceController::new(sim_pars);
    controller.generate_horses();
    check_error(&controller)?;
    controller.generate_race_program();
    check_error(&controller)?;
    controller.start_race();
    check_error(&controller)?;

    let tick_interval = sim_pars.race_config.tick_interval();
    let render_interval = Duration::from_secs_f64(1.0 / MAX_RENDER_UPDATE_FREQUENCY);
    let sim_realtime = tx.is_some();

    let mut program_result = ProgramResult::default();
    let mut traces: Vec<ProgressTrace> = Vec::new();
    let mut trace_round_id: Option<u32> = None;

    let mut t_sim = Duration::from_secs(0);
    let mut t_debug_print = Duration::from_secs(0);
    let mut t_render_update: Option<Duration> = None;

    while !controller.is_completed() {
        let t_start = Instant::now();

        if controller.is_racing() {
            // traces restart with every round
            if let Some(round) = controller.get_current_round() {
                if trace_round_id != Some(round.id) {
                    traces = init_traces(round);
                    trace_round_id = Some(round.id);
                }
            }

            controller.advance_tick(step_size);

            if let Some(round) = controller.get_current_round() {
                for (trace, horse) in traces.iter_mut().zip(round.horses.iter()) {
                    trace.progress.push(horse.progress);
                }
            }

            if controller.get_current_round_finished() {
                if let Some(round) = controller.get_current_round() {
                    let final_results = round.get_sorted_results();
                    program_result.rounds.push(RoundResult {
                        round_id: round.id,
                        distance: round.distance,
                        results: final_results.to_owned(),
                        progress_traces: std::mem::take(&mut traces),
                    });
                    controller.finish_current_round(final_results);
                }
            }
        } else if !controller.is_completed()
            && !controller.is_transitioning()
            && controller.get_no_pending_tasks() == 0
        {
            anyhow::bail!(
                "Race program stalled in status {:?}!",
                controller.get_status()
            );
        }
        check_error(&controller)?;

        controller.advance_time(tick_interval);
        t_sim += tick_interval;

        if print_debug && t_sim >= t_debug_print + Duration::from_secs(1) {
            print_race_state(&controller, t_sim);
            t_debug_print = t_sim;
        }

        if let Some(tx) = tx {
            if t_render_update.map_or(true, |t| t_sim >= t + render_interval) {
                tx.send(RaceState::from_controller(&controller)?)
                    .context("Failed to send race state to renderer!")?;
                t_render_update = Some(t_sim);
            }
        }

        // sleep until the tick is finished in real-time as well
        if sim_realtime {
            match tick_interval
                .div_f64(realtime_factor)
                .checked_sub(t_start.elapsed())
            {
                Some(t_sleep) => sleep(t_sleep),
                None => log::warn!("Could not keep up with real-time!"),
            }
        }
    }

    // after the loop finishes, send the final result once
    if let Some(tx) = tx {
        let mut final_msg = RaceState::from_controller(&controller)?;
        final_msg.final_result = Some(program_result.to_owned());
        tx.send(final_msg)
            .context("Failed to send final program result to renderer!")?;
    }

    Ok(program_result)
}

fn check_error(controller: &RaceController) -> anyhow::Result<()> {
    match controller.get_error_message() {
        Some(message) => anyhow::bail!("Race program aborted: {}", message),
        None => Ok(()),
    }
}

fn init_traces(round: &RaceRound) -> Vec<ProgressTrace> {
    round
        .horses
        .iter()
        .map(|horse| ProgressTrace {
            horse_id: horse.id,
            horse_name: horse.name.to_owned(),
            color: horse.color.to_owned(),
            progress: Vec::new(),
        })
        .collect()
}

fn print_race_state(controller: &RaceController, t_sim: Duration) {
    let round = match controller.get_current_round() {
        Some(round) => round,
        None => return,
    };

    if controller.is_transitioning() {
        log::info!(
            "Simulating... {:.1}s, waiting for round {}",
            t_sim.as_secs_f64(),
            round.id + 1
        );
        return;
    }

    match round.horses.iter().find(|h| h.position == Some(1)) {
        Some(leader) => log::info!(
            "Simulating... {:.1}s, round {} leader is {} at {:.1}%",
            t_sim.as_secs_f64(),
            round.id,
            leader.name,
            leader.progress * 100.0
        ),
        None => log::info!(
            "Simulating... {:.1}s, round {} about to start",
            t_sim.as_secs_f64(),
            round.id
        ),
    }
}
