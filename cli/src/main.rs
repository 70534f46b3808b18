use anyhow::Context;
use clap::Parser;
use horse_racesim::core::handle_race::handle_program;
use horse_racesim::interfaces::render_interface::{RaceState, RgbColor};
use horse_racesim::post::race_result::{format_distance, ProgramResult, RoundResult};
use horse_racesim::pre::read_sim_pars::{read_sim_pars, SimPars};
use horse_racesim::pre::sim_opts::SimOpts;
use plotters::prelude::*;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Instant;

/// export_progress_plot draws the progress of every horse of the inserted round over the ticks
/// and returns the path of the written PNG.
fn export_progress_plot(round: &RoundResult, out_dir: &Path) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(out_dir)?;
    let out_path = out_dir.join(format!("round_{}_progress.png", round.round_id));

    let no_ticks = round
        .progress_traces
        .iter()
        .map(|trace| trace.progress.len())
        .max()
        .unwrap_or(0)
        .max(1) as u32;

    {
        let root = BitMapBackend::new(&out_path, (1280, 720)).into_drawing_area();
        root.fill(&WHITE)?;
        let mut chart = ChartBuilder::on(&root)
            .caption(
                format!(
                    "Round {} ({})",
                    round.round_id,
                    format_distance(round.distance)
                ),
                ("sans-serif", 24).into_font(),
            )
            .margin(20)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(0u32..no_ticks, 0.0..100.0)?;

        chart
            .configure_mesh()
            .x_desc("Tick")
            .y_desc("Progress (%)")
            .label_style(("sans-serif", 16))
            .axis_desc_style(("sans-serif", 16))
            .draw()?;

        for trace in round.progress_traces.iter() {
            let color = RgbColor::parse(&trace.color)?;
            let line_color = RGBColor(color.r, color.g, color.b);
            let series = trace
                .progress
                .iter()
                .enumerate()
                .map(|(tick, progress)| (tick as u32, progress * 100.0));

            chart
                .draw_series(LineSeries::new(series, line_color.stroke_width(2)))?
                .label(trace.horse_name.to_owned())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], line_color));
        }

        chart
            .configure_series_labels()
            .border_style(&BLACK)
            .background_style(&WHITE.mix(0.8))
            .label_font(("sans-serif", 16))
            .position(SeriesLabelPosition::LowerRight)
            .draw()?;

        root.present()?;
    }
    Ok(out_path)
}

/// postprocess prints the results and writes the requested output files.
fn postprocess(program_result: &ProgramResult, sim_opts: &SimOpts) -> anyhow::Result<()> {
    program_result.print_results();

    let csv_path =
        program_result.write_results_to_csv(Some(&sim_opts.output_dir.join("last_run.csv")))?;
    log::info!("Results written to {:?}", csv_path);

    if sim_opts.plot {
        if let Some(round) = program_result.rounds.last() {
            match export_progress_plot(round, &sim_opts.output_dir) {
                Ok(path) => log::info!("Plot saved to {:?}", path),
                Err(e) => log::warn!("Could not save plot: {}", e),
            }
        }
    }

    Ok(())
}

fn main() -> anyhow::Result<()> {
    // PRE-PROCESSING ------------------------------------------------------------------------------
    // get simulation options from the command line arguments
    let sim_opts: SimOpts = SimOpts::parse();

    let log_level = if sim_opts.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    // get simulation parameters
    let sim_pars = if let Some(parfile_path) = &sim_opts.parfile_path {
        log::info!("Reading simulation parameters from {:?}", parfile_path);
        read_sim_pars(parfile_path)?
    } else {
        log::info!("No parameter file provided, using the default program");
        let sim_pars = SimPars::default();
        sim_pars.validate()?;
        sim_pars
    };

    if let Some(step_size) = sim_opts.step_size {
        if !(step_size > 0.0 && step_size <= 1.0) {
            anyhow::bail!("Step size must be in the range (0.0, 1.0], got {}!", step_size);
        }
    }

    // print program details
    log::info!(
        "Simulating {} rounds with {} of {} horses each",
        sim_pars.race_config.total_rounds,
        sim_pars.race_config.horses_per_race,
        sim_pars.race_config.horse_count
    );

    // EXECUTION -----------------------------------------------------------------------------------
    if sim_opts.realtime {
        // REAL-TIME CASE - simulator thread sends snapshots, main thread prints them
        log::info!("Racing in real-time (factor {})...", sim_opts.realtime_factor);
        let (tx, rx) = flume::unbounded::<RaceState>();

        let sim_opts_thread = sim_opts.clone();
        let sim_pars_thread = sim_pars.clone();

        let sim_handle = thread::spawn(move || {
            handle_program(
                &sim_pars_thread,
                sim_opts_thread.step_size,
                sim_opts_thread.debug,
                Some(&tx),
                sim_opts_thread.realtime_factor,
            )
        });

        let mut last_line = String::new();
        for race_state in rx.iter() {
            if race_state.final_result.is_some() {
                break;
            }

            let line = match (race_state.round_id, race_state.get_leader()) {
                _ if race_state.is_transitioning => match &race_state.next_round {
                    Some(next) => format!(
                        "Next up: round {} ({})",
                        next.round_id,
                        format_distance(next.distance)
                    ),
                    None => continue,
                },
                (Some(round_id), Some(leader)) => format!(
                    "Round {}: {} leads at {:.0}%",
                    round_id,
                    leader.name,
                    leader.progress * 100.0
                ),
                _ => continue,
            };

            // only print when the displayed state changes
            if line != last_line {
                println!("{}", line);
                last_line = line;
            }
        }

        let program_result = sim_handle
            .join()
            .map_err(|_| anyhow::anyhow!("Simulator thread panicked!"))??;
        postprocess(&program_result, &sim_opts)?;
    } else if sim_opts.no_sim_runs <= 1 {
        // SINGLE RUN CASE
        let t_start = Instant::now();
        let program_result = handle_program(
            &sim_pars,
            sim_opts.step_size,
            sim_opts.debug,
            None,
            sim_opts.realtime_factor,
        )?;
        log::info!("Execution time: {}ms", t_start.elapsed().as_millis());

        postprocess(&program_result, &sim_opts)?;
    } else {
        // MULTIPLE RUNS CASE - runs are independent and executed in parallel
        let t_start = Instant::now();
        let program_results = (0..sim_opts.no_sim_runs)
            .into_par_iter()
            .map(|run| {
                handle_program(
                    &sim_pars,
                    sim_opts.step_size,
                    false,
                    None,
                    sim_opts.realtime_factor,
                )
                .with_context(|| format!("Simulation run {} failed!", run + 1))
            })
            .collect::<anyhow::Result<Vec<ProgramResult>>>()?;
        log::info!(
            "Execution time for {} runs: {}ms",
            sim_opts.no_sim_runs,
            t_start.elapsed().as_millis()
        );

        for (run, program_result) in program_results.iter().enumerate() {
            let winners: Vec<String> = program_result
                .rounds
                .iter()
                .filter_map(|round| round.get_winner())
                .map(|winner| winner.horse_name.to_owned())
                .collect();
            println!("RESULT: Run {} winners: {}", run + 1, winners.join(", "));
        }

        if let Some(program_result) = program_results.last() {
            postprocess(program_result, &sim_opts)?;
        }
    }

    Ok(())
}
