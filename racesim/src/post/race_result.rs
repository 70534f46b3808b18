use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// RaceResult is the finishing record of one horse in one round.
///
/// * `position` - 1-based finishing position, unique within a round
/// * `horse_id` - Id of the horse
/// * `horse_name` - Name of the horse (denormalized for display)
/// * `finish_time` - Formatted time from the round start to crossing the line
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RaceResult {
    pub position: u32,
    pub horse_id: u32,
    pub horse_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_time: Option<String>,
}

/// ProgressTrace stores the progress of one horse after every tick of a round.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ProgressTrace {
    pub horse_id: u32,
    pub horse_name: String,
    pub color: String,
    pub progress: Vec<f64>,
}

/// RoundResult contains all round information that is required for post-processing.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RoundResult {
    pub round_id: u32,
    pub distance: u32,
    pub results: Vec<RaceResult>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub progress_traces: Vec<ProgressTrace>,
}

impl RoundResult {
    pub fn get_winner(&self) -> Option<&RaceResult> {
        self.results.iter().min_by_key(|r| r.position)
    }
}

#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    round: u32,
    distance: &'a str,
    position: u32,
    horse_id: u32,
    horse_name: &'a str,
    finish_time: &'a str,
}

/// ProgramResult collects the results of all rounds of a program.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct ProgramResult {
    pub rounds: Vec<RoundResult>,
}

impl ProgramResult {
    /// format_results returns the results of all rounds as a printable table.
    pub fn format_results(&self) -> Result<String, std::fmt::Error> {
        let mut content = String::new();

        for round in self.rounds.iter() {
            writeln!(
                &mut content,
                "RESULT: Round {} ({})",
                round.round_id,
                format_distance(round.distance)
            )?;
            writeln!(&mut content, "pos, {:>3}, {:<16}, time", "id", "name")?;

            let mut results = round.results.to_owned();
            results.sort_by_key(|r| r.position);
            for result in results.iter() {
                writeln!(
                    &mut content,
                    "{:3}, {:3}, {:<16}, {}",
                    result.position,
                    result.horse_id,
                    result.horse_name,
                    result.finish_time.as_deref().unwrap_or("-")
                )?;
            }
        }

        Ok(content)
    }

    /// print_results prints the results of all rounds to the console output.
    pub fn print_results(&self) {
        match self.format_results() {
            Ok(content) => print!("{}", content),
            Err(e) => log::error!("Could not format race results: {}", e),
        }
    }

    /// write_results_to_csv writes one row per round and horse. If no path is given the results
    /// are written to `output/last_run.csv`. Returns the path of the written file.
    pub fn write_results_to_csv(&self, path: Option<&Path>) -> anyhow::Result<PathBuf> {
        let out_path = match path {
            Some(p) => p.to_path_buf(),
            None => Path::new("output").join("last_run.csv"),
        };
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut writer = csv::Writer::from_path(&out_path)?;
        for round in self.rounds.iter() {
            let distance = format_distance(round.distance);
            let mut results = round.results.to_owned();
            results.sort_by_key(|r| r.position);

            for result in results.iter() {
                writer.serialize(CsvRow {
                    round: round.round_id,
                    distance: &distance,
                    position: result.position,
                    horse_id: result.horse_id,
                    horse_name: &result.horse_name,
                    finish_time: result.finish_time.as_deref().unwrap_or(""),
                })?;
            }
        }
        writer.flush()?;

        Ok(out_path)
    }
}

/// format_distance formats a distance in meters, e.g. 1200 -> "1200m".
pub fn format_distance(meters: u32) -> String {
    format!("{}m", meters)
}

/// format_finish_time formats an elapsed race time as minutes, seconds and milliseconds, e.g.
/// "1:05.350".
pub fn format_finish_time(elapsed: Duration) -> String {
    let millis = elapsed.as_millis();
    format!(
        "{}:{:02}.{:03}",
        millis / 60_000,
        (millis / 1000) % 60,
        millis % 1000
    )
}
