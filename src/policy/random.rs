use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::WorldConfig;
use crate::sim::{Action, ActionKind};
use crate::state::{AgentId, Observation, Speech};

use super::Policy;

/// Uniformly random actions over every kind.
pub struct RandomPolicy {
    rng: StdRng,
    n_agents: usize,
    speech_len: usize,
}

impl RandomPolicy {
    pub fn new(config: &WorldConfig, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            n_agents: config.n_agents,
            speech_len: config.speech_len,
        }
    }

    fn random_target(&mut self) -> AgentId {
        AgentId::from_index(self.rng.random_range(0..self.n_agents))
    }
}

impl Policy for RandomPolicy {
    fn choose_action(&mut self, _observation: &Observation) -> Action {
        let kind = ActionKind::ALL[self.rng.random_range(0..ActionKind::COUNT)];
        match kind {
            ActionKind::Move => Action::Move {
                dx: self.rng.random_range(-1..=1),
                dy: self.rng.random_range(-1..=1),
            },
            ActionKind::PickUp => Action::PickUp,
            ActionKind::Offer => Action::Offer {
                target: self.random_target(),
            },
            ActionKind::Accept => Action::Accept {
                target: self.random_target(),
            },
            ActionKind::StopOffering => Action::StopOffering {
                target: self.random_target(),
            },
            ActionKind::Drop => Action::Drop,
            ActionKind::Speak => {
                let values = (0..self.speech_len)
                    .map(|_| self.rng.random_range(-1.0..=1.0))
                    .collect();
                Action::Speak {
                    speech: Speech::from_vec(values),
                }
            }
            ActionKind::Wait => Action::Wait,
        }
    }

    fn name(&self) -> &str {
        "random"
    }
}
