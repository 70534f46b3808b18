//! Tick-based horse race simulator.
//!
//! * `core` - horses, speed model, step simulator, program generator and round lifecycle
//! * `pre` - configuration and command line options
//! * `post` - race results and their output
//! * `interfaces` - snapshots handed to a renderer

pub mod core {
    pub mod error;
    pub mod handle_race;
    pub mod horse;
    pub mod race;
    pub mod scheduler;
    pub mod speed_model;
    pub mod state_handler;
}

pub mod pre {
    pub mod read_sim_pars;
    pub mod sim_opts;
}

pub mod post {
    pub mod race_result;
}

pub mod interfaces {
    pub mod render_interface;
}
