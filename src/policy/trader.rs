use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};

use crate::config::{VISION_GRID_SIZE, VISION_OFFSET, WorldConfig};
use crate::sim::Action;
use crate::state::{AgentId, Normalizer, Observation, Speech};

use super::Policy;

/// Ticks an unanswered offer stays open before it is withdrawn.
const OFFER_PATIENCE: usize = 4;
const SPEAK_PROBABILITY: f64 = 0.1;

/// Hand-scripted teammate: collects pieces of its own color, offers them to
/// nearby agents of other teams and accepts whatever it is offered.
pub struct TraderPolicy {
    rng: StdRng,
    norm: Normalizer,
    speech_len: usize,
    pending_offer: Option<(AgentId, usize)>,
}

impl TraderPolicy {
    pub fn new(config: &WorldConfig, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            norm: Normalizer::new(config),
            speech_len: config.speech_len,
            pending_offer: None,
        }
    }

    /// Ids of visible agents on another team.
    fn other_teams(&self, obs: &Observation) -> Vec<AgentId> {
        let my_color = obs.center().agent_color;
        let mut found = Vec::new();
        for x in 0..VISION_GRID_SIZE {
            for y in 0..VISION_GRID_SIZE {
                let cell = &obs.vision[x][y];
                if cell.agent_id == 0.0 || cell.agent_color == my_color {
                    continue;
                }
                if let Some(id) = self.norm.agent_from(cell.agent_id) {
                    found.push(AgentId(id));
                }
            }
        }
        found
    }

    /// Nearest loose piece of my color, as a window coordinate.
    fn nearest_own_piece(&self, obs: &Observation) -> Option<(i32, i32)> {
        let my_color = obs.center().agent_color;
        let c = VISION_OFFSET;
        let mut best: Option<((i32, i32), i32)> = None;
        for x in 0..VISION_GRID_SIZE {
            for y in 0..VISION_GRID_SIZE {
                let cell = &obs.vision[x][y];
                let (x, y) = (x as i32, y as i32);
                let occupied_by_other = cell.agent_id != 0.0 && (x, y) != (c, c);
                if cell.piece_color != my_color || occupied_by_other {
                    continue;
                }
                let steps = (x - c).abs().max((y - c).abs());
                if best.is_none_or(|(_, closest)| steps < closest) {
                    best = Some(((x, y), steps));
                }
            }
        }
        best.map(|(cell, _)| cell)
    }

    fn wander(&mut self) -> Action {
        Action::Move {
            dx: self.rng.random_range(-1..=1),
            dy: self.rng.random_range(-1..=1),
        }
    }

    /// Announce the desired piece in the first two speech slots.
    fn announce(&self, obs: &Observation) -> Action {
        let mut values = vec![0.0; self.speech_len];
        for (slot, value) in values.iter_mut().zip(obs.desired_piece) {
            *slot = value;
        }
        Action::Speak {
            speech: Speech::from_vec(values),
        }
    }
}

impl Policy for TraderPolicy {
    fn choose_action(&mut self, obs: &Observation) -> Action {
        let holding = obs.offer.holding > 0.5;

        if obs.offer.offered_letter > 0.0
            && let Some(from) = self.norm.agent_from(obs.offer.offering_agent)
        {
            return Action::Accept {
                target: AgentId(from),
            };
        }

        if !holding {
            self.pending_offer = None;
        }

        if let Some((target, waited)) = self.pending_offer {
            if waited >= OFFER_PATIENCE {
                self.pending_offer = None;
                return Action::StopOffering { target };
            }
            self.pending_offer = Some((target, waited + 1));
            return self.wander();
        }

        if holding {
            let candidates = self.other_teams(obs);
            if let Some(&target) = candidates.choose(&mut self.rng) {
                self.pending_offer = Some((target, 0));
                return Action::Offer { target };
            }
            return self.wander();
        }

        let c = VISION_OFFSET;
        match self.nearest_own_piece(obs) {
            Some((x, y)) if (x, y) == (c, c) => Action::PickUp,
            Some((x, y)) => Action::Move {
                dx: (x - c).signum(),
                dy: (y - c).signum(),
            },
            None if self.rng.random_bool(SPEAK_PROBABILITY) => self.announce(obs),
            None => self.wander(),
        }
    }

    fn name(&self) -> &str {
        "trader"
    }
}
