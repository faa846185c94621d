use crate::infra::Position;

use super::piece::{PieceId, PieceSpec};
use super::speech::{ListenHistory, Speech};

/// 1-based agent identity, stable for the lifetime of the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AgentId(pub u16);

impl AgentId {
    /// Build from a 0-based index into the agent list.
    pub fn from_index(index: usize) -> Self {
        AgentId(index as u16 + 1)
    }

    pub fn index(&self) -> usize {
        self.0 as usize - 1
    }
}

/// A piece another agent is offering to this one. Holds identifiers only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncomingOffer {
    pub from: AgentId,
    pub piece: PieceId,
}

#[derive(Debug, Clone)]
pub struct Agent {
    pub id: AgentId,
    pub position: Position,
    /// Team tag, 1..=n_colors
    pub color: u8,
    /// Piece this agent is trying to collect; fixed for the episode
    pub desired: PieceSpec,
    pub piece_in_hand: Option<PieceId>,
    /// Offer made to this agent, if any
    pub incoming_offer: Option<IncomingOffer>,
    /// Agent this agent is currently offering its held piece to
    pub offering_to: Option<AgentId>,
    /// What this agent said this tick
    pub speech: Speech,
    pub listen_history: ListenHistory,
    reward: f32,
    learning: bool,
}

impl Agent {
    pub fn new(id: AgentId, learning: bool, listen_history_size: usize, speech_len: usize) -> Self {
        Self {
            id,
            position: Position::default(),
            color: 0,
            desired: PieceSpec {
                color: 0,
                letter: 0,
            },
            piece_in_hand: None,
            incoming_offer: None,
            offering_to: None,
            speech: Speech::silent(speech_len),
            listen_history: ListenHistory::new(listen_history_size, speech_len),
            reward: 0.0,
            learning,
        }
    }

    /// Start a new episode at `position` with a fresh color and target.
    pub fn reset(&mut self, position: Position, color: u8, desired: PieceSpec) {
        self.position = position;
        self.color = color;
        self.desired = desired;
        self.piece_in_hand = None;
        self.incoming_offer = None;
        self.offering_to = None;
        self.clear_speech();
        self.listen_history.clear();
        self.reward = 0.0;
    }

    pub fn is_learning_agent(&self) -> bool {
        self.learning
    }

    pub(crate) fn set_learning(&mut self, learning: bool) {
        self.learning = learning;
    }

    pub fn is_holding(&self) -> bool {
        self.piece_in_hand.is_some()
    }

    pub fn clear_speech(&mut self) {
        self.speech = Speech::silent(self.speech.len());
    }

    pub fn add_reward(&mut self, amount: f32) {
        self.reward += amount;
    }

    /// Apply a penalty. Only the learning agent is ever penalized.
    pub fn penalize(&mut self, amount: f32) {
        if self.learning {
            self.reward -= amount;
        }
    }

    /// Apply a reward that only the learning agent collects.
    pub fn reward_if_learning(&mut self, amount: f32) {
        if self.learning {
            self.reward += amount;
        }
    }

    /// Drain the reward accumulated since the last call.
    pub fn take_reward(&mut self) -> f32 {
        std::mem::take(&mut self.reward)
    }

    pub fn pending_reward(&self) -> f32 {
        self.reward
    }
}
