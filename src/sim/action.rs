//! Agent actions: the typed form used by the core and the raw form
//! external trainers send.

use crate::config::WorldConfig;
use crate::error::SimError;
use crate::state::{AgentId, Speech};

/// Discrete action kinds, in resolution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Move,
    PickUp,
    Offer,
    Accept,
    StopOffering,
    Drop,
    Speak,
    Wait,
}

impl ActionKind {
    pub const COUNT: usize = 8;

    /// Every kind in the order a tick resolves them.
    pub const ALL: [ActionKind; Self::COUNT] = [
        ActionKind::Move,
        ActionKind::PickUp,
        ActionKind::Offer,
        ActionKind::Accept,
        ActionKind::StopOffering,
        ActionKind::Drop,
        ActionKind::Speak,
        ActionKind::Wait,
    ];

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn from_index(index: usize) -> Result<Self, SimError> {
        Self::ALL
            .get(index)
            .copied()
            .ok_or(SimError::InvalidActionKind(index))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Move => "move",
            ActionKind::PickUp => "pick_up",
            ActionKind::Offer => "offer",
            ActionKind::Accept => "accept",
            ActionKind::StopOffering => "stop_offering",
            ActionKind::Drop => "drop",
            ActionKind::Speak => "speak",
            ActionKind::Wait => "wait",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Step by (dx, dy), each in -1..=1
    Move { dx: i32, dy: i32 },
    PickUp,
    Offer { target: AgentId },
    Accept { target: AgentId },
    StopOffering { target: AgentId },
    Drop,
    Speak { speech: Speech },
    Wait,
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Move { .. } => ActionKind::Move,
            Action::PickUp => ActionKind::PickUp,
            Action::Offer { .. } => ActionKind::Offer,
            Action::Accept { .. } => ActionKind::Accept,
            Action::StopOffering { .. } => ActionKind::StopOffering,
            Action::Drop => ActionKind::Drop,
            Action::Speak { .. } => ActionKind::Speak,
            Action::Wait => ActionKind::Wait,
        }
    }

    /// Reject actions that cannot be resolved against this world shape.
    pub fn validate(&self, config: &WorldConfig) -> Result<(), SimError> {
        let check_target = |target: &AgentId| {
            if target.0 == 0 || target.index() >= config.n_agents {
                Err(SimError::UnknownAgent {
                    index: (target.0 as usize).wrapping_sub(1),
                    n_agents: config.n_agents,
                })
            } else {
                Ok(())
            }
        };

        match self {
            Action::Move { dx, dy } => {
                if !(-1..=1).contains(dx) || !(-1..=1).contains(dy) {
                    return Err(SimError::InvalidDirection { dx: *dx, dy: *dy });
                }
                Ok(())
            }
            Action::Offer { target }
            | Action::Accept { target }
            | Action::StopOffering { target } => check_target(target),
            Action::Speak { speech } => {
                if speech.len() != config.speech_len {
                    return Err(SimError::SpeechLength {
                        expected: config.speech_len,
                        actual: speech.len(),
                    });
                }
                Ok(())
            }
            Action::PickUp | Action::Drop | Action::Wait => Ok(()),
        }
    }
}

/// Action in the flat shape a trainer emits: discrete kind, movement
/// offsets in 0..=2, 0-based target index and a speech vector.
#[derive(Debug, Clone, PartialEq)]
pub struct RawAction {
    pub action: usize,
    pub dx: usize,
    pub dy: usize,
    pub agent: usize,
    pub speech: Vec<f32>,
}

impl RawAction {
    /// Decode into a typed action, failing on any out-of-range field.
    pub fn decode(self, config: &WorldConfig) -> Result<Action, SimError> {
        let target = || {
            if self.agent >= config.n_agents {
                Err(SimError::UnknownAgent {
                    index: self.agent,
                    n_agents: config.n_agents,
                })
            } else {
                Ok(AgentId::from_index(self.agent))
            }
        };

        let action = match ActionKind::from_index(self.action)? {
            ActionKind::Move => {
                if self.dx > 2 || self.dy > 2 {
                    return Err(SimError::InvalidDirection {
                        dx: self.dx as i32 - 1,
                        dy: self.dy as i32 - 1,
                    });
                }
                Action::Move {
                    dx: self.dx as i32 - 1,
                    dy: self.dy as i32 - 1,
                }
            }
            ActionKind::PickUp => Action::PickUp,
            ActionKind::Offer => Action::Offer { target: target()? },
            ActionKind::Accept => Action::Accept { target: target()? },
            ActionKind::StopOffering => Action::StopOffering { target: target()? },
            ActionKind::Drop => Action::Drop,
            ActionKind::Speak => Action::Speak {
                speech: Speech::from_vec(self.speech),
            },
            ActionKind::Wait => Action::Wait,
        };
        action.validate(config)?;
        Ok(action)
    }
}
