//! Round lifecycle controller.
//!
//! `RaceController` owns the horse pool, the race program and all timers. Every public action
//! catches its own failure: the latest error is stored in the error field and the controller
//! falls back to a safe state instead of handing the error to the caller.

use crate::core::error::RaceError;
use crate::core::horse::{generate_horses, reset_horse_progress, Horse};
use crate::core::race::{
    generate_race_program, simulate_race_step, ProgramStatus, RaceProgram, RaceRound,
    RoundStatus,
};
use crate::core::scheduler::{ScheduledEvent, Scheduler, TaskHandle};
use crate::post::race_result::{format_finish_time, RaceResult};
use crate::pre::read_sim_pars::{RaceConfig, SimConstants, SimPars};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;
use std::time::Duration;

#[derive(Debug)]
pub struct RaceController {
    // parameters
    config: RaceConfig,
    consts: SimConstants,

    // pool and program
    horses: Vec<Horse>,
    program: RaceProgram,

    // transition state
    is_transitioning: bool,
    next_round_index: Option<usize>,
    scheduler: Scheduler,
    pending_transition: Option<TaskHandle>,
    pending_resume: Option<TaskHandle>,

    // state of the current round
    finished_horses: HashSet<u32>,
    round_ticks: u64,

    // set once at construction, blocks generating and ticking
    config_error: Option<RaceError>,
    error: Option<RaceError>,
    rng: StdRng,
}

impl RaceController {
    pub fn new(sim_pars: &SimPars) -> RaceController {
        RaceController::with_rng(sim_pars, StdRng::from_entropy())
    }

    /// with_rng creates a controller drawing from the inserted generator. Invalid parameters are
    /// recorded as the latest error and every generating or ticking action is refused.
    pub fn with_rng(sim_pars: &SimPars, rng: StdRng) -> RaceController {
        let config_error = sim_pars
            .validate()
            .err()
            .map(|e| RaceError::InvalidConfig(e.to_string()));
        if let Some(e) = &config_error {
            log::error!("{}", e);
        }

        RaceController {
            config: sim_pars.race_config.to_owned(),
            consts: sim_pars.sim_constants.to_owned(),
            horses: Vec::new(),
            program: RaceProgram::default(),
            is_transitioning: false,
            next_round_index: None,
            scheduler: Scheduler::new(),
            pending_transition: None,
            pending_resume: None,
            finished_horses: HashSet::new(),
            round_ticks: 0,
            error: config_error.to_owned(),
            config_error,
            rng,
        }
    }

    // ---------------------------------------------------------------------------------------------
    // ACTIONS -------------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// generate_horses replaces the horse pool. On failure the previous pool is kept.
    pub fn generate_horses(&mut self) {
        if !self.check_config() {
            return;
        }

        match generate_horses(&self.config, &mut self.rng) {
            Ok(horses) => {
                log::info!("Generated a pool of {} horses", horses.len());
                self.horses = horses;
                self.error = None;
            }
            Err(e) => self.record_error(e),
        }
    }

    /// generate_race_program replaces the program and drops all pending timers. On failure the
    /// previous program is kept.
    pub fn generate_race_program(&mut self) {
        if !self.check_config() {
            return;
        }

        match generate_race_program(&self.horses, &self.config, &mut self.rng) {
            Ok(program) => {
                log::info!("Generated a race program with {} rounds", program.rounds.len());
                self.cancel_timers();
                self.program = program;
                self.is_transitioning = false;
                self.next_round_index = None;
                self.reset_round_state();
                self.error = None;
            }
            Err(e) => self.record_error(e),
        }
    }

    /// start_race starts or resumes the current round. Ignored unless `can_start`.
    pub fn start_race(&mut self) {
        if !self.can_start() || !self.check_config() {
            return;
        }

        match self.try_start_race() {
            Ok(()) => self.error = None,
            Err(e) => {
                self.record_error(e);
                self.fall_back_to_pause();
            }
        }
    }

    fn try_start_race(&mut self) -> Result<(), RaceError> {
        let round = self
            .program
            .get_current_round_mut()
            .ok_or(RaceError::NoActiveRound)?;
        round.status = RoundStatus::InProgress;
        log::info!("Racing round {} over {}m", round.id, round.distance);
        self.program.status = ProgramStatus::Racing;
        Ok(())
    }

    /// pause_race pauses a running race, any other status is left unchanged.
    pub fn pause_race(&mut self) {
        if self.program.status == ProgramStatus::Racing {
            self.program.status = ProgramStatus::Paused;
        }
    }

    /// toggle_race switches between racing and paused. Ignored while transitioning.
    pub fn toggle_race(&mut self) {
        if self.is_transitioning {
            return;
        }

        if self.program.status == ProgramStatus::Racing {
            self.pause_race();
        } else {
            self.start_race();
        }
    }

    /// begin_transition_to_next_round completes the program after the last round. Otherwise it
    /// pauses the program and schedules the hand-over to the next round. Calls while a
    /// transition is already running are ignored.
    pub fn begin_transition_to_next_round(&mut self) {
        if self.program.rounds.is_empty() {
            self.record_error(RaceError::TransitionFailed(
                "the race program contains no rounds".to_owned(),
            ));
            self.is_transitioning = false;
            self.fall_back_to_pause();
            return;
        }

        if self.program.is_last_round() {
            log::info!("Last round finished, race program completed");
            self.program.status = ProgramStatus::Completed;
            self.is_transitioning = false;
            return;
        }

        if self.is_transitioning {
            return;
        }

        self.is_transitioning = true;
        self.next_round_index = Some(self.program.current_round + 1);
        self.program.status = ProgramStatus::Paused;
        self.pending_transition = Some(self.scheduler.schedule(
            self.config.round_transition_delay(),
            ScheduledEvent::CompleteTransition,
        ));
        log::debug!(
            "Transition to round index {} scheduled in {}ms",
            self.program.current_round + 1,
            self.config.round_transition_delay_ms
        );
        self.error = None;
    }

    /// complete_transition_to_next_round moves to the next round, resets its horses and schedules
    /// the start of racing after the resume delay.
    pub fn complete_transition_to_next_round(&mut self) {
        match self.try_complete_transition() {
            Ok(()) => self.error = None,
            Err(e) => {
                self.record_error(e);
                self.is_transitioning = false;
                self.fall_back_to_pause();
            }
        }
    }

    fn try_complete_transition(&mut self) -> Result<(), RaceError> {
        let next_idx = self.program.current_round + 1;
        let round = self.program.rounds.get_mut(next_idx).ok_or_else(|| {
            RaceError::TransitionFailed(format!("round index {} does not exist", next_idx))
        })?;

        reset_horse_progress(&mut round.horses);
        round.status = RoundStatus::Pending;
        log::info!("Round {} over {}m is up next", round.id, round.distance);

        self.program.current_round = next_idx;
        self.is_transitioning = false;
        self.next_round_index = None;
        self.pending_transition = None;
        self.reset_round_state();

        self.pending_resume = Some(self.scheduler.schedule(
            self.config.round_resume_delay(),
            ScheduledEvent::ResumeRacing {
                round_index: next_idx,
            },
        ));
        Ok(())
    }

    /// advance_time moves the controller clock forward and runs every task that becomes due, in
    /// order of their due time.
    pub fn advance_time(&mut self, elapsed: Duration) {
        let target = self.scheduler.now() + elapsed;

        while let Some((handle, event)) = self.scheduler.pop_due(target) {
            self.handle_scheduled_event(handle, event);
        }
        self.scheduler.advance_to(target);
    }

    fn handle_scheduled_event(&mut self, handle: TaskHandle, event: ScheduledEvent) {
        match event {
            ScheduledEvent::CompleteTransition => {
                if self.pending_transition == Some(handle) {
                    self.pending_transition = None;
                }
                self.complete_transition_to_next_round();
            }
            ScheduledEvent::ResumeRacing { round_index } => {
                if self.pending_resume == Some(handle) {
                    self.pending_resume = None;
                }

                // the round may have changed since the task was scheduled
                if self.program.current_round != round_index {
                    log::warn!(
                        "Ignoring stale resume of round index {} (current is {})",
                        round_index,
                        self.program.current_round
                    );
                    return;
                }

                self.program.status = ProgramStatus::Racing;
                if let Some(round) = self.program.get_current_round_mut() {
                    round.status = RoundStatus::InProgress;
                    log::info!("Racing round {} over {}m", round.id, round.distance);
                }
            }
        }
    }

    /// advance_tick runs one step of the current round while racing. Finish times are stamped from
    /// the ticks elapsed in the round and the new results are upserted into the round. Returns the
    /// results of the horses that finished in this tick.
    pub fn advance_tick(&mut self, step_size: Option<f64>) -> Vec<RaceResult> {
        if self.program.status != ProgramStatus::Racing || !self.check_config() {
            return Vec::new();
        }

        match self.try_advance_tick(step_size) {
            Ok(results) => results,
            Err(e) => {
                self.record_error(e);
                self.fall_back_to_pause();
                Vec::new()
            }
        }
    }

    fn try_advance_tick(&mut self, step_size: Option<f64>) -> Result<Vec<RaceResult>, RaceError> {
        let round = self
            .program
            .rounds
            .get_mut(self.program.current_round)
            .ok_or(RaceError::NoActiveRound)?;

        let mut results = simulate_race_step(
            &mut round.horses,
            round.distance,
            &mut self.finished_horses,
            step_size,
            &self.consts,
            &mut self.rng,
        )?;
        self.round_ticks += 1;

        let elapsed = Duration::from_millis(self.config.tick_interval_ms * self.round_ticks);
        for result in results.iter_mut() {
            result.finish_time = Some(format_finish_time(elapsed));
            log::debug!(
                "{} finished round {} in position {}",
                result.horse_name,
                round.id,
                result.position
            );
            round.upsert_result(result.to_owned());
        }

        Ok(results)
    }

    /// update_live_results upserts a single result into the current round.
    pub fn update_live_results(&mut self, result: RaceResult) {
        if let Some(round) = self.program.get_current_round_mut() {
            round.upsert_result(result);
        }
        self.error = None;
    }

    /// finish_current_round stores the final results, completes the round and begins the
    /// transition to the next one.
    pub fn finish_current_round(&mut self, final_results: Vec<RaceResult>) {
        if let Some(round) = self.program.get_current_round_mut() {
            for result in final_results {
                round.upsert_result(result);
            }
            round.status = RoundStatus::Completed;
            log::info!("Round {} completed", round.id);
        } else {
            self.record_error(RaceError::NoActiveRound);
            self.fall_back_to_pause();
            return;
        }

        self.begin_transition_to_next_round();
    }

    /// update_horse_progress overrides the progress of a horse of the current round.
    pub fn update_horse_progress(&mut self, horse_id: u32, progress: f64) {
        if self.program.get_current_round().is_none() {
            return;
        }

        if !progress.is_finite() || progress < 0.0 {
            self.record_error(RaceError::MalformedHorse {
                horse_id,
                reason: format!("progress {} is not a valid course fraction", progress),
            });
            return;
        }

        // finished horses stay frozen at the finish line
        if self.finished_horses.contains(&horse_id) {
            self.record_error(RaceError::MalformedHorse {
                horse_id,
                reason: "progress of a finished horse cannot change".to_owned(),
            });
            return;
        }

        if let Some(horse) = self
            .program
            .get_current_round_mut()
            .and_then(|round| round.horses.iter_mut().find(|h| h.id == horse_id))
        {
            horse.progress = progress;
        }
        self.error = None;
    }

    /// restart resets the horses of every round and returns to idle. Pool and program are kept.
    pub fn restart(&mut self) {
        for round in self.program.rounds.iter_mut() {
            reset_horse_progress(&mut round.horses);
        }

        self.cancel_timers();
        self.program.status = ProgramStatus::Idle;
        self.program.current_round = 0;
        self.is_transitioning = false;
        self.next_round_index = None;
        self.reset_round_state();
        self.error = None;
        log::info!("Race program restarted");
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    // ---------------------------------------------------------------------------------------------
    // METHODS (HELPERS) ---------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// check_config re-records a configuration error so it survives `clear_error`.
    fn check_config(&mut self) -> bool {
        match &self.config_error {
            Some(e) => {
                self.error = Some(e.to_owned());
                false
            }
            None => true,
        }
    }

    fn record_error(&mut self, error: RaceError) {
        log::error!("{}", error);
        self.error = Some(error);
    }

    /// fall_back_to_pause moves a generated or running program to paused.
    fn fall_back_to_pause(&mut self) {
        if matches!(
            self.program.status,
            ProgramStatus::Generated | ProgramStatus::Racing
        ) {
            self.program.status = ProgramStatus::Paused;
        }
    }

    fn cancel_timers(&mut self) {
        let handles = [self.pending_transition.take(), self.pending_resume.take()];
        for handle in handles.iter().flatten() {
            if self.scheduler.is_pending(*handle) {
                self.scheduler.cancel(*handle);
                log::debug!("Cancelled pending task {:?}", handle);
            }
        }
    }

    fn reset_round_state(&mut self) {
        self.finished_horses.clear();
        self.round_ticks = 0;
    }

    // ---------------------------------------------------------------------------------------------
    // GETTERS -------------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    pub fn get_config(&self) -> &RaceConfig {
        &self.config
    }

    pub fn get_horses(&self) -> &[Horse] {
        &self.horses
    }

    pub fn get_horse_by_id(&self, horse_id: u32) -> Option<&Horse> {
        self.horses.iter().find(|h| h.id == horse_id)
    }

    pub fn get_program(&self) -> &RaceProgram {
        &self.program
    }

    pub fn get_status(&self) -> ProgramStatus {
        self.program.status
    }

    pub fn get_current_round(&self) -> Option<&RaceRound> {
        self.program.get_current_round()
    }

    /// Preview of the round a running transition leads to.
    pub fn get_next_round(&self) -> Option<&RaceRound> {
        self.next_round_index
            .and_then(|idx| self.program.rounds.get(idx))
    }

    pub fn get_next_round_index(&self) -> Option<usize> {
        self.next_round_index
    }

    pub fn is_transitioning(&self) -> bool {
        self.is_transitioning
    }

    pub fn is_racing(&self) -> bool {
        self.program.status == ProgramStatus::Racing
    }

    pub fn is_paused(&self) -> bool {
        self.program.status == ProgramStatus::Paused
    }

    pub fn is_completed(&self) -> bool {
        self.program.status == ProgramStatus::Completed
    }

    pub fn can_start(&self) -> bool {
        matches!(
            self.program.status,
            ProgramStatus::Generated | ProgramStatus::Paused
        ) && !self.is_transitioning
    }

    pub fn get_error(&self) -> Option<&RaceError> {
        self.error.as_ref()
    }

    pub fn get_error_message(&self) -> Option<String> {
        self.error.as_ref().map(|e| e.to_string())
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// get_current_round_finished returns true once every horse of the current round finished.
    pub fn get_current_round_finished(&self) -> bool {
        self.program
            .get_current_round()
            .map(|round| round.get_all_finished())
            .unwrap_or(false)
    }

    pub fn get_round_ticks(&self) -> u64 {
        self.round_ticks
    }

    pub fn get_no_pending_tasks(&self) -> usize {
        self.scheduler.get_no_pending()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> RaceController {
        RaceController::with_rng(&SimPars::default(), StdRng::seed_from_u64(42))
    }

    fn generated_controller() -> RaceController {
        let mut ctrl = controller();
        ctrl.generate_horses();
        ctrl.generate_race_program();
        ctrl
    }

    fn transition_delay() -> Duration {
        RaceConfig::default().round_transition_delay()
    }

    fn resume_delay() -> Duration {
        RaceConfig::default().round_resume_delay()
    }

    #[test]
    fn starts_idle() {
        let ctrl = controller();
        assert_eq!(ctrl.get_status(), ProgramStatus::Idle);
        assert!(!ctrl.can_start());
        assert!(ctrl.get_current_round().is_none());
        assert!(ctrl.get_horses().is_empty());
    }

    #[test]
    fn generate_and_start() {
        let mut ctrl = generated_controller();
        assert_eq!(ctrl.get_horses().len(), 20);
        assert_eq!(ctrl.get_status(), ProgramStatus::Generated);
        assert!(ctrl.can_start());

        ctrl.start_race();
        assert!(ctrl.is_racing());
        assert_eq!(
            ctrl.get_current_round().map(|r| r.status),
            Some(RoundStatus::InProgress)
        );
        assert!(!ctrl.has_error());
    }

    #[test]
    fn toggle_pauses_and_resumes() {
        let mut ctrl = generated_controller();
        ctrl.start_race();

        ctrl.toggle_race();
        assert!(ctrl.is_paused());
        ctrl.toggle_race();
        assert!(ctrl.is_racing());
    }

    #[test]
    fn pause_only_from_racing() {
        let mut ctrl = generated_controller();
        ctrl.pause_race();
        assert_eq!(ctrl.get_status(), ProgramStatus::Generated);
    }

    #[test]
    fn ticks_only_while_racing() {
        let mut ctrl = generated_controller();
        assert!(ctrl.advance_tick(None).is_empty());
        assert_eq!(ctrl.get_round_ticks(), 0);

        ctrl.start_race();
        ctrl.advance_tick(None);
        assert_eq!(ctrl.get_round_ticks(), 1);
        let round = ctrl.get_current_round().unwrap();
        assert!(round.horses.iter().all(|h| h.progress > 0.0 && h.position.is_some()));
    }

    #[test]
    fn finished_round_begins_transition() {
        let mut ctrl = generated_controller();
        ctrl.start_race();

        while !ctrl.get_current_round_finished() {
            ctrl.advance_tick(Some(0.5));
        }
        let round = ctrl.get_current_round().unwrap();
        assert!(round.results.iter().all(|r| r.finish_time.is_some()));
        let mut positions: Vec<u32> = round.results.iter().map(|r| r.position).collect();
        positions.sort_unstable();
        assert_eq!(positions, (1..=10).collect::<Vec<u32>>());

        let final_results = round.results.to_owned();
        ctrl.finish_current_round(final_results);

        assert_eq!(ctrl.get_program().rounds[0].status, RoundStatus::Completed);
        assert!(ctrl.is_transitioning());
        assert!(ctrl.is_paused());
        assert_eq!(ctrl.get_next_round_index(), Some(1));
        assert_eq!(ctrl.get_next_round().map(|r| r.id), Some(2));
        assert_eq!(ctrl.get_no_pending_tasks(), 1);
    }

    #[test]
    fn begin_transition_while_transitioning_is_noop() {
        let mut ctrl = generated_controller();
        ctrl.start_race();
        ctrl.begin_transition_to_next_round();
        assert!(ctrl.is_transitioning());

        ctrl.advance_time(Duration::from_millis(1000));
        ctrl.begin_transition_to_next_round();

        assert!(ctrl.is_transitioning());
        assert_eq!(ctrl.get_next_round_index(), Some(1));
        assert_eq!(ctrl.get_program().current_round, 0);
        assert_eq!(ctrl.get_no_pending_tasks(), 1);
    }

    #[test]
    fn toggle_is_ignored_while_transitioning() {
        let mut ctrl = generated_controller();
        ctrl.start_race();
        ctrl.begin_transition_to_next_round();

        ctrl.toggle_race();
        assert!(ctrl.is_paused());
        ctrl.start_race();
        assert!(ctrl.is_paused());
    }

    #[test]
    fn transition_hands_over_after_delays() {
        let mut ctrl = generated_controller();
        ctrl.start_race();
        for _ in 0..20 {
            ctrl.advance_tick(None);
        }
        ctrl.begin_transition_to_next_round();

        ctrl.advance_time(transition_delay() - Duration::from_millis(1));
        assert!(ctrl.is_transitioning());
        assert_eq!(ctrl.get_program().current_round, 0);

        ctrl.advance_time(Duration::from_millis(1));
        assert!(!ctrl.is_transitioning());
        assert_eq!(ctrl.get_next_round_index(), None);
        assert_eq!(ctrl.get_program().current_round, 1);
        assert!(ctrl.is_paused());
        assert_eq!(ctrl.get_round_ticks(), 0);
        let round = ctrl.get_current_round().unwrap();
        assert_eq!(round.status, RoundStatus::Pending);
        assert!(round.horses.iter().all(|h| h.progress == 0.0 && h.position.is_none()));

        ctrl.advance_time(resume_delay());
        assert!(ctrl.is_racing());
        assert_eq!(
            ctrl.get_current_round().map(|r| r.status),
            Some(RoundStatus::InProgress)
        );
        assert_eq!(ctrl.get_no_pending_tasks(), 0);
    }

    #[test]
    fn single_advance_fires_both_tasks() {
        let mut ctrl = generated_controller();
        ctrl.start_race();
        ctrl.begin_transition_to_next_round();

        ctrl.advance_time(transition_delay() + resume_delay());
        assert!(ctrl.is_racing());
        assert_eq!(ctrl.get_program().current_round, 1);
    }

    #[test]
    fn last_round_completes_without_timer() {
        let mut ctrl = generated_controller();
        ctrl.start_race();
        for _ in 0..5 {
            ctrl.begin_transition_to_next_round();
            ctrl.advance_time(transition_delay() + resume_delay());
        }
        assert_eq!(ctrl.get_program().current_round, 5);
        assert!(ctrl.is_racing());

        ctrl.begin_transition_to_next_round();
        assert!(ctrl.is_completed());
        assert!(!ctrl.is_transitioning());
        assert_eq!(ctrl.get_no_pending_tasks(), 0);

        ctrl.advance_time(Duration::from_secs(60));
        assert!(ctrl.is_completed());
        assert!(!ctrl.can_start());
    }

    #[test]
    fn restart_cancels_pending_transition() {
        let mut ctrl = generated_controller();
        ctrl.start_race();
        ctrl.advance_tick(None);
        ctrl.begin_transition_to_next_round();

        ctrl.restart();
        assert_eq!(ctrl.get_status(), ProgramStatus::Idle);
        assert!(!ctrl.is_transitioning());
        assert_eq!(ctrl.get_next_round_index(), None);
        assert_eq!(ctrl.get_no_pending_tasks(), 0);
        assert!(ctrl
            .get_program()
            .rounds
            .iter()
            .flat_map(|r| r.horses.iter())
            .all(|h| h.progress == 0.0 && h.position.is_none()));

        ctrl.advance_time(transition_delay() + resume_delay());
        assert_eq!(ctrl.get_status(), ProgramStatus::Idle);
        assert_eq!(ctrl.get_program().current_round, 0);
        assert_eq!(ctrl.get_program().rounds.len(), 6);
    }

    #[test]
    fn stale_resume_is_ignored() {
        let mut ctrl = generated_controller();
        ctrl.start_race();
        ctrl.begin_transition_to_next_round();
        ctrl.advance_time(transition_delay());
        ctrl.restart();

        // a resume that escaped cancellation must not revive the program
        let handle = ctrl.scheduler.schedule(
            Duration::from_millis(0),
            ScheduledEvent::ResumeRacing { round_index: 1 },
        );
        ctrl.handle_scheduled_event(handle, ScheduledEvent::ResumeRacing { round_index: 1 });
        assert_eq!(ctrl.get_status(), ProgramStatus::Idle);
    }

    #[test]
    fn failed_generation_keeps_previous_pool() {
        let mut ctrl = generated_controller();
        let pool = ctrl.get_horses().to_vec();
        let program = ctrl.get_program().to_owned();

        ctrl.config.colors.truncate(3);
        ctrl.generate_horses();
        assert!(matches!(
            ctrl.get_error(),
            Some(RaceError::HorseGenerationFailed(_))
        ));
        assert_eq!(ctrl.get_horses(), &pool[..]);

        ctrl.config.horses_per_race = 50;
        ctrl.generate_race_program();
        assert!(matches!(
            ctrl.get_error(),
            Some(RaceError::ProgramGenerationFailed(_))
        ));
        assert_eq!(ctrl.get_program(), &program);

        ctrl.clear_error();
        assert!(!ctrl.has_error());
    }

    #[test]
    fn failed_start_falls_back_to_pause() {
        let mut ctrl = generated_controller();
        ctrl.program.rounds.clear();

        ctrl.start_race();
        assert_eq!(ctrl.get_error(), Some(&RaceError::NoActiveRound));
        assert!(ctrl.is_paused());
        assert_eq!(
            ctrl.get_error_message().as_deref(),
            Some("No active round in the race program")
        );
    }

    #[test]
    fn malformed_horse_pauses_the_race() {
        let mut ctrl = generated_controller();
        ctrl.start_race();
        ctrl.program.rounds[0].horses[0].progress = f64::NAN;

        assert!(ctrl.advance_tick(None).is_empty());
        assert!(matches!(
            ctrl.get_error(),
            Some(RaceError::MalformedHorse { .. })
        ));
        assert!(ctrl.is_paused());
    }

    #[test]
    fn live_results_are_upserted() {
        let mut ctrl = generated_controller();
        ctrl.start_race();
        let horse = ctrl.get_current_round().unwrap().horses[0].to_owned();
        let result = |position| RaceResult {
            position,
            horse_id: horse.id,
            horse_name: horse.name.to_owned(),
            finish_time: None,
        };

        ctrl.update_live_results(result(3));
        ctrl.update_live_results(result(1));
        let results = &ctrl.get_current_round().unwrap().results;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].position, 1);
    }

    #[test]
    fn horse_progress_can_be_overridden() {
        let mut ctrl = generated_controller();
        let horse_id = ctrl.get_current_round().unwrap().horses[2].id;

        ctrl.update_horse_progress(horse_id, 0.4);
        assert_eq!(
            ctrl.get_current_round().unwrap().get_horse(horse_id).map(|h| h.progress),
            Some(0.4)
        );

        ctrl.update_horse_progress(horse_id, f64::INFINITY);
        assert!(ctrl.has_error());
        assert_eq!(
            ctrl.get_current_round().unwrap().get_horse(horse_id).map(|h| h.progress),
            Some(0.4)
        );
        // the master pool is untouched
        assert_eq!(ctrl.get_horse_by_id(horse_id).map(|h| h.progress), Some(0.0));
    }

    #[test]
    fn finished_horse_progress_is_frozen() {
        let mut ctrl = generated_controller();
        ctrl.start_race();
        let horse_id = ctrl.get_current_round().unwrap().horses[0].id;
        ctrl.update_horse_progress(horse_id, 0.999);

        let mut no_ticks = 0;
        while !ctrl.finished_horses.contains(&horse_id) {
            ctrl.advance_tick(None);
            no_ticks += 1;
            assert!(no_ticks < 1000);
        }

        ctrl.update_horse_progress(horse_id, 0.2);
        assert!(matches!(
            ctrl.get_error(),
            Some(RaceError::MalformedHorse { .. })
        ));

        ctrl.advance_tick(None);
        let horse = ctrl.get_current_round().unwrap().get_horse(horse_id).unwrap();
        assert_eq!(horse.progress, 1.0);
        assert_eq!(horse.position, Some(1));
    }

    #[test]
    fn invalid_constants_are_recorded_not_panicking() {
        let mut sim_pars = SimPars::default();
        sim_pars.sim_constants.min_burst_boost = 1.2;
        sim_pars.sim_constants.max_burst_boost = 1.0;
        sim_pars.sim_constants.burst_chance = 1.0;

        let mut ctrl = RaceController::with_rng(&sim_pars, StdRng::seed_from_u64(42));
        assert!(matches!(ctrl.get_error(), Some(RaceError::InvalidConfig(_))));

        ctrl.clear_error();
        ctrl.generate_horses();
        ctrl.generate_race_program();
        ctrl.start_race();
        assert!(ctrl.advance_tick(None).is_empty());

        assert!(ctrl.has_error());
        assert!(ctrl.get_horses().is_empty());
        assert_eq!(ctrl.get_status(), ProgramStatus::Idle);
    }

    #[test]
    fn regeneration_drops_pending_timers() {
        let mut ctrl = generated_controller();
        ctrl.start_race();
        ctrl.begin_transition_to_next_round();

        ctrl.generate_race_program();
        assert_eq!(ctrl.get_no_pending_tasks(), 0);
        assert_eq!(ctrl.get_status(), ProgramStatus::Generated);

        ctrl.advance_time(transition_delay() + resume_delay());
        assert_eq!(ctrl.get_program().current_round, 0);
        assert_eq!(ctrl.get_status(), ProgramStatus::Generated);
    }
}
