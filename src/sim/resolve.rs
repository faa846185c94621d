//! Resolution of one agent's action against the shared agents and pieces.

use rand::rngs::StdRng;
use tracing::{debug, trace};

use crate::config::{LISTEN_RANGE, WorldConfig};
use crate::error::SimError;
use crate::infra::Position;
use crate::infra::grid::{cell_free, in_bounds, random_free_position};
use crate::state::{Agent, AgentId, IncomingOffer, Piece, PieceId, PieceRegistry, Speech};

use super::action::{Action, ActionKind};
use super::stats::EpisodeStats;

/// A piece that matched its receiver's desired piece and left the world.
#[derive(Debug, Clone, PartialEq)]
pub struct FoundPiece {
    pub receiver: AgentId,
    pub giver: AgentId,
    pub piece: Piece,
}

/// Mutable view of the world used while resolving a tick.
pub struct TickContext<'a> {
    pub config: &'a WorldConfig,
    pub agents: &'a mut [Agent],
    pub pieces: &'a mut PieceRegistry,
    pub rng: &'a mut StdRng,
    pub stats: &'a mut EpisodeStats,
    pub found: &'a mut Vec<FoundPiece>,
}

impl TickContext<'_> {
    /// Resolve `action` for the agent at index `actor` and return the reward
    /// it earned. The held piece always ends up on the agent's cell.
    pub fn step_agent(&mut self, actor: usize, action: &Action) -> Result<f32, SimError> {
        self.agent(actor)?;

        match action {
            Action::Move { dx, dy } => self.move_agent(actor, *dx, *dy),
            Action::PickUp => self.pick_up(actor),
            Action::Offer { target } => {
                let target = self.target_index(*target)?;
                self.offer(actor, target);
            }
            Action::Accept { target } => {
                let target = self.target_index(*target)?;
                self.accept(actor, target)?;
            }
            Action::StopOffering { target } => {
                let target = self.target_index(*target)?;
                self.stop_offering(actor, target);
            }
            Action::Drop => self.drop_piece(actor)?,
            Action::Speak { speech } => self.speak(actor, speech),
            Action::Wait => {}
        }

        self.sync_held_piece(actor);
        Ok(self.agents[actor].take_reward())
    }

    fn agent(&self, index: usize) -> Result<&Agent, SimError> {
        self.agents.get(index).ok_or(SimError::UnknownAgent {
            index,
            n_agents: self.agents.len(),
        })
    }

    fn target_index(&self, target: AgentId) -> Result<usize, SimError> {
        let index = (target.0 as usize).wrapping_sub(1);
        self.agent(index)?;
        Ok(index)
    }

    fn invalid(&mut self, actor: usize, kind: ActionKind, penalty: f32) {
        let agent = &mut self.agents[actor];
        agent.penalize(penalty);
        self.stats.record_invalid(agent.is_learning_agent());
        trace!(agent = agent.id.0, action = kind.as_str(), "invalid action");
    }

    fn move_agent(&mut self, actor: usize, dx: i32, dy: i32) {
        let dest = self.agents[actor].position.offset(dx, dy);
        let free = in_bounds(&dest, self.config.grid_size)
            && cell_free(&dest, self.agents.iter().map(|agent| agent.position));

        if free {
            self.agents[actor].position = dest;
            self.stats.record_success(ActionKind::Move);
        } else {
            self.invalid(
                actor,
                ActionKind::Move,
                self.config.rewards.invalid_movement_penalty,
            );
        }
    }

    fn pick_up(&mut self, actor: usize) {
        if self.agents[actor].is_holding() {
            return;
        }

        let position = self.agents[actor].position;
        let held: Vec<PieceId> = self
            .agents
            .iter()
            .filter_map(|agent| agent.piece_in_hand)
            .collect();
        let found = self
            .pieces
            .iter()
            .find(|piece| piece.position == position && !held.contains(&piece.id))
            .map(|piece| (piece.id, piece.color));

        match found {
            Some((id, color)) if color == self.agents[actor].color => {
                self.agents[actor].piece_in_hand = Some(id);
                self.stats.record_success(ActionKind::PickUp);
            }
            Some(_) => self.invalid(
                actor,
                ActionKind::PickUp,
                self.config.rewards.invalid_pick_up_penalty,
            ),
            None => {}
        }
    }

    fn offer(&mut self, actor: usize, target: usize) {
        let Some(piece) = self.agents[actor].piece_in_hand else {
            return;
        };
        if target == actor {
            return;
        }

        let offerer = &self.agents[actor];
        let receiver = &self.agents[target];
        let receiver_free = receiver.incoming_offer.is_none();
        let in_range = offerer.position.distance(&receiver.position) <= self.config.vision_radius();
        let not_offering = offerer.offering_to.is_none();

        if receiver_free && in_range && not_offering {
            let from = offerer.id;
            let to = receiver.id;
            self.agents[target].incoming_offer = Some(IncomingOffer { from, piece });
            self.agents[actor].offering_to = Some(to);
            self.agents[actor].reward_if_learning(self.config.rewards.successful_offer_reward);
            self.stats.record_success(ActionKind::Offer);
        } else {
            self.invalid(
                actor,
                ActionKind::Offer,
                self.config.rewards.invalid_offer_penalty,
            );
        }
    }

    fn accept(&mut self, actor: usize, target: usize) -> Result<(), SimError> {
        let Some(offer) = self.agents[actor].incoming_offer else {
            return Ok(());
        };
        // The offer only stands while the named agent still holds that exact piece
        if target == actor || self.agents[target].piece_in_hand != Some(offer.piece) {
            trace!(
                agent = self.agents[actor].id.0,
                target = self.agents[target].id.0,
                "stale offer ignored"
            );
            return Ok(());
        }

        self.agents[actor].reward_if_learning(self.config.rewards.accept_piece_reward);

        if self.agents[actor].is_holding() {
            self.release_piece(actor)?;
        }

        let piece = self.pieces.get(offer.piece).cloned().ok_or_else(|| {
            SimError::InvariantViolation(format!(
                "offered piece {:?} held by agent {} is not in the world",
                offer.piece, self.agents[target].id.0
            ))
        })?;

        let receiver_id = self.agents[actor].id;
        let giver_id = self.agents[target].id;
        if piece.matches(&self.agents[actor].desired) {
            let bonus = if self.agents[actor].is_learning_agent() {
                self.config.rewards.piece_found_reward
            } else {
                self.config.rewards.teammate_piece_found_reward
            };
            self.agents[actor].add_reward(bonus);
            self.pieces.remove(offer.piece);
            self.stats.pieces_found += 1;
            debug!(
                receiver = receiver_id.0,
                giver = giver_id.0,
                color = piece.color,
                letter = piece.letter,
                "piece found"
            );
            self.found.push(FoundPiece {
                receiver: receiver_id,
                giver: giver_id,
                piece,
            });
        } else {
            self.agents[actor].piece_in_hand = Some(offer.piece);
            self.stats.trades += 1;
            debug!(receiver = receiver_id.0, giver = giver_id.0, "trade");
        }

        self.agents[actor].incoming_offer = None;
        self.agents[target].piece_in_hand = None;
        self.agents[target].offering_to = None;
        Ok(())
    }

    fn stop_offering(&mut self, actor: usize, target: usize) {
        let held = self.agents[actor].piece_in_hand;
        let id = self.agents[actor].id;
        let offered_by_me = self.agents[target]
            .incoming_offer
            .is_some_and(|offer| offer.from == id && Some(offer.piece) == held);

        if held.is_some() && offered_by_me {
            self.agents[target].incoming_offer = None;
            self.agents[actor].offering_to = None;
            self.stats.record_success(ActionKind::StopOffering);
        } else {
            self.invalid(
                actor,
                ActionKind::StopOffering,
                self.config.rewards.invalid_stop_offering_penalty,
            );
        }
    }

    fn drop_piece(&mut self, actor: usize) -> Result<(), SimError> {
        if !self.agents[actor].is_holding() {
            self.invalid(
                actor,
                ActionKind::Drop,
                self.config.rewards.invalid_drop_piece_penalty,
            );
            return Ok(());
        }
        self.release_piece(actor)?;
        self.stats.record_success(ActionKind::Drop);
        Ok(())
    }

    /// Put the held piece on a random free cell and empty the hand.
    fn release_piece(&mut self, actor: usize) -> Result<(), SimError> {
        let Some(piece) = self.agents[actor].piece_in_hand else {
            return Ok(());
        };

        let mut occupied: Vec<Position> = self.agents.iter().map(|agent| agent.position).collect();
        occupied.extend(self.pieces.positions());
        let position = random_free_position(&mut *self.rng, self.config.grid_size, &occupied)?;

        self.pieces.relocate(piece, position);
        self.agents[actor].piece_in_hand = None;
        self.release_outgoing_offer(actor);
        Ok(())
    }

    fn speak(&mut self, actor: usize, speech: &Speech) {
        self.agents[actor].speech = speech.clone();
        self.stats.record_success(ActionKind::Speak);
    }

    /// Cancel the offer of a piece that just left `actor`'s hand.
    fn release_outgoing_offer(&mut self, actor: usize) {
        let id = self.agents[actor].id;
        let Some(to) = self.agents[actor].offering_to.take() else {
            return;
        };
        if let Some(receiver) = self.agents.get_mut(to.index())
            && receiver.incoming_offer.is_some_and(|offer| offer.from == id)
        {
            receiver.incoming_offer = None;
        }
    }

    fn sync_held_piece(&mut self, actor: usize) {
        let agent = &self.agents[actor];
        if let Some(piece) = agent.piece_in_hand {
            self.pieces.relocate(piece, agent.position);
        }
    }
}

/// Let every agent hear the nearest other agent that spoke this tick.
///
/// Only speakers within `LISTEN_RANGE` count; on equal distance the one
/// earlier in the agent list wins. Nothing is recorded if nobody qualifies.
pub fn propagate_speech(agents: &mut [Agent]) {
    let heard: Vec<Option<Speech>> = agents
        .iter()
        .map(|listener| {
            let mut best: Option<(f32, &Speech)> = None;
            for speaker in agents.iter() {
                if speaker.id == listener.id || speaker.speech.is_silent() {
                    continue;
                }
                let distance = speaker.position.distance(&listener.position);
                if distance > LISTEN_RANGE {
                    continue;
                }
                if best.is_none_or(|(closest, _)| distance < closest) {
                    best = Some((distance, &speaker.speech));
                }
            }
            best.map(|(_, speech)| speech.clone())
        })
        .collect();

    for (agent, speech) in agents.iter_mut().zip(heard) {
        if let Some(speech) = speech {
            agent.listen_history.push(speech);
        }
    }
}
