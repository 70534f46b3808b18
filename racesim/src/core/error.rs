//! Outcome type of all fallible simulation operations.
//!
//! The round lifecycle controller never hands these to its callers directly: it records the
//! latest one in its error field and falls back to a safe state.

/// Errors that can occur while generating, simulating or transitioning races.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RaceError {
    /// The simulation parameters violate a requirement of the speed model or the lifecycle.
    #[error("Invalid race configuration: {0}")]
    InvalidConfig(String),

    /// The horse pool could not be created.
    #[error("Failed to generate horses: {0}")]
    HorseGenerationFailed(String),

    /// The race program could not be created.
    #[error("Failed to generate race program: {0}")]
    ProgramGenerationFailed(String),

    /// A horse handed to the step simulator carries unusable data.
    #[error("Error occurred during race simulation: horse {horse_id} is malformed ({reason})")]
    MalformedHorse {
        /// The offending horse.
        horse_id: u32,
        /// What is wrong with it.
        reason: String,
    },

    /// The race distance cannot be simulated.
    #[error("Error occurred during race simulation: invalid distance {0}m")]
    InvalidDistance(u32),

    /// The program is in an unexpected state during start or round transition.
    #[error("Error during round transition: {0}")]
    TransitionFailed(String),

    /// An action needs an active round but the program has none.
    #[error("No active round in the race program")]
    NoActiveRound,
}
