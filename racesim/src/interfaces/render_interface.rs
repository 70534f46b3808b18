use crate::core::race::ProgramStatus;
use crate::core::state_handler::RaceController;
use crate::post::race_result::ProgramResult;
use anyhow::Context;

pub const MAX_RENDER_UPDATE_FREQUENCY: f64 = 20.0;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RgbColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl RgbColor {
    /// parse converts a CSS color string, e.g. "#FF4500", into its RGB components.
    pub fn parse(color: &str) -> anyhow::Result<RgbColor> {
        let tmp_color = color
            .parse::<css_color_parser::Color>()
            .with_context(|| format!("Could not parse color {}!", color))?;
        Ok(RgbColor {
            r: tmp_color.r,
            g: tmp_color.g,
            b: tmp_color.b,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HorseState {
    pub horse_id: u32,
    pub name: String,
    pub color: RgbColor,
    pub progress: f64,
    pub position: Option<u32>,
}

/// RoundPreview describes the round a running transition leads to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoundPreview {
    pub round_id: u32,
    pub distance: u32,
    pub horse_names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RaceState {
    pub status: ProgramStatus,
    pub round_id: Option<u32>,
    pub distance: Option<u32>,
    pub horse_states: Vec<HorseState>,

    // set while the program waits between two rounds
    pub is_transitioning: bool,
    pub next_round: Option<RoundPreview>,

    pub error_message: Option<String>,

    // final results payload (sent once when the program is completed)
    pub final_result: Option<ProgramResult>,
}

impl RaceState {
    /// from_controller takes a snapshot of the current round of the inserted controller.
    pub fn from_controller(controller: &RaceController) -> anyhow::Result<RaceState> {
        let round = controller.get_current_round();

        let mut horse_states = Vec::new();
        if let Some(round) = round {
            horse_states.reserve(round.horses.len());
            for horse in round.horses.iter() {
                horse_states.push(HorseState {
                    horse_id: horse.id,
                    name: horse.name.to_owned(),
                    color: RgbColor::parse(&horse.color)?,
                    progress: horse.progress,
                    position: horse.position,
                });
            }
        }

        let next_round = controller.get_next_round().map(|next| RoundPreview {
            round_id: next.id,
            distance: next.distance,
            horse_names: next.horses.iter().map(|h| h.name.to_owned()).collect(),
        });

        Ok(RaceState {
            status: controller.get_status(),
            round_id: round.map(|r| r.id),
            distance: round.map(|r| r.distance),
            horse_states,
            is_transitioning: controller.is_transitioning(),
            next_round,
            error_message: controller.get_error_message(),
            final_result: None,
        })
    }

    /// get_leader returns the horse in first place, if positions are assigned yet.
    pub fn get_leader(&self) -> Option<&HorseState> {
        self.horse_states.iter().find(|h| h.position == Some(1))
    }
}
