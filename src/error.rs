use std::error::Error;
use std::fmt;

/// Hard failures of the simulation core.
///
/// Illegal in-game actions are not errors: they resolve as no-ops with a
/// penalty for the learning agent. These variants cover misconfiguration,
/// malformed external input and broken invariants.
#[derive(Debug, Clone, PartialEq)]
pub enum SimError {
    /// No free cell was found after `attempts` random draws.
    NoFreeCell { grid_size: usize, attempts: usize },
    /// An action named an agent index that does not exist.
    UnknownAgent { index: usize, n_agents: usize },
    /// Discrete action index outside the known kinds.
    InvalidActionKind(usize),
    /// Movement offsets outside -1..=1.
    InvalidDirection { dx: i32, dy: i32 },
    /// Speech vector of the wrong length.
    SpeechLength { expected: usize, actual: usize },
    /// `step` was called before the first `reset`.
    NotRunning,
    InvalidConfig(String),
    InvariantViolation(String),
}

impl fmt::Display for SimError {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SimError::NoFreeCell {
                grid_size,
                attempts,
            } => write!(
                formatter,
                "no free cell found on {}x{} grid after {} attempts (too many entities?)",
                grid_size, grid_size, attempts
            ),
            SimError::UnknownAgent { index, n_agents } => write!(
                formatter,
                "agent index {} out of range (world has {} agents)",
                index, n_agents
            ),
            SimError::InvalidActionKind(kind) => {
                write!(formatter, "unknown discrete action {}", kind)
            }
            SimError::InvalidDirection { dx, dy } => {
                write!(formatter, "invalid movement ({}, {})", dx, dy)
            }
            SimError::SpeechLength { expected, actual } => write!(
                formatter,
                "speech vector has length {}, expected {}",
                actual, expected
            ),
            SimError::NotRunning => write!(formatter, "world stepped before reset"),
            SimError::InvalidConfig(reason) => write!(formatter, "invalid config: {}", reason),
            SimError::InvariantViolation(reason) => {
                write!(formatter, "invariant violated: {}", reason)
            }
        }
    }
}

impl Error for SimError {}
