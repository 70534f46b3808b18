use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser, Clone)]
#[clap(
    version = "0.1.0",
    name = "HORSE-RS",
    about = "A tick-based multi-round horse race simulator written in Rust"
)]
pub struct SimOpts {
    // FLAGS ---------------------------------------------------------------------------------------
    /// Activate debug printing
    #[clap(short, long)]
    pub debug: bool,

    /// Race the program in real-time and print the leader while racing (single run only)
    #[clap(short = 'R', long)]
    pub realtime: bool,

    /// Save a plot of the progress traces of the last round as PNG
    #[clap(long)]
    pub plot: bool,

    // OPTIONS -------------------------------------------------------------------------------------
    /// Set number of simulation runs (ignored in real-time mode)
    #[clap(short, long, default_value = "1")]
    pub no_sim_runs: u32,

    /// Set path to the simulation parameter file (OPTIONAL: if not set, uses the default program)
    #[clap(short, long)]
    pub parfile_path: Option<PathBuf>,

    /// Set real-time factor (only relevant in real-time mode)
    #[clap(short, long, default_value = "1.0")]
    pub realtime_factor: f64,

    /// Set progress step multiplier per tick, should be in the range (0.0, 1.0]
    #[clap(short, long)]
    pub step_size: Option<f64>,

    /// Set directory the result files are written to
    #[clap(short, long, default_value = "output")]
    pub output_dir: PathBuf,
}
