use crate::sim::action::ActionKind;

/// Per-episode counters, reset with the world.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EpisodeStats {
    pub moves: usize,
    pub pickups: usize,
    pub offers: usize,
    pub withdrawn_offers: usize,
    /// Accepted pieces that did not match and changed hands
    pub trades: usize,
    /// Accepted pieces that matched and left the world
    pub pieces_found: usize,
    /// Explicit Drop actions; pieces set down to accept an offer are not counted
    pub drops: usize,
    pub utterances: usize,
    /// Failed actions of any kind, all agents
    pub invalid_actions: usize,
    /// Failed actions of the learning agent only
    pub learning_agent_invalid_actions: usize,
}

impl EpisodeStats {
    pub fn record_success(&mut self, kind: ActionKind) {
        match kind {
            ActionKind::Move => self.moves += 1,
            ActionKind::PickUp => self.pickups += 1,
            ActionKind::Offer => self.offers += 1,
            ActionKind::StopOffering => self.withdrawn_offers += 1,
            ActionKind::Drop => self.drops += 1,
            ActionKind::Speak => self.utterances += 1,
            ActionKind::Accept | ActionKind::Wait => {}
        }
    }

    pub fn record_invalid(&mut self, learning: bool) {
        self.invalid_actions += 1;
        if learning {
            self.learning_agent_invalid_actions += 1;
        }
    }
}
