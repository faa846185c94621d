//! Per-agent observation: local vision window, offer state, desired piece
//! and listen history, all normalized to [0, 1].

use crate::config::{VISION_GRID_SIZE, VISION_OFFSET, WorldConfig};
use crate::infra::{Bounds, Position};

use super::agent::Agent;
use super::piece::{Piece, PieceRegistry};
use super::speech::Speech;

/// Floats per vision cell.
pub const VISION_CELL_LEN: usize = 6;
/// Floats in the offer summary.
pub const OFFER_LEN: usize = 4;
/// Floats in the desired-piece encoding.
pub const DESIRED_LEN: usize = 2;

/// One cell of the vision window. All zeros means nothing visible.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VisionCell {
    pub agent_id: f32,
    pub agent_color: f32,
    pub piece_letter: f32,
    pub piece_color: f32,
    /// Letter of the piece the observed agent is holding
    pub held_letter: f32,
    /// Color of the piece the observed agent is holding
    pub held_color: f32,
}

impl VisionCell {
    pub fn as_array(&self) -> [f32; VISION_CELL_LEN] {
        [
            self.agent_id,
            self.agent_color,
            self.piece_letter,
            self.piece_color,
            self.held_letter,
            self.held_color,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OfferSummary {
    pub offered_letter: f32,
    pub offered_color: f32,
    /// Normalized id of the agent making the offer
    pub offering_agent: f32,
    /// 1.0 when the observer holds a piece
    pub holding: f32,
}

/// Normalization divisors, fixed at world construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalizer {
    pub max_agent_id: f32,
    pub max_letter: f32,
    pub n_colors: f32,
}

impl Normalizer {
    pub fn new(config: &WorldConfig) -> Self {
        Self {
            max_agent_id: config.n_agents as f32,
            max_letter: config.n_letters as f32,
            n_colors: config.n_colors as f32,
        }
    }

    pub fn agent(&self, id: u16) -> f32 {
        id as f32 / self.max_agent_id
    }

    pub fn letter(&self, letter: u8) -> f32 {
        letter as f32 / self.max_letter
    }

    pub fn color(&self, color: u8) -> f32 {
        color as f32 / self.n_colors
    }

    /// Recover an agent id from its normalized value. Zero means none.
    pub fn agent_from(&self, value: f32) -> Option<u16> {
        let id = (value * self.max_agent_id).round();
        if id >= 1.0 { Some(id as u16) } else { None }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Indexed `[x][y]`; the observer sits at the center
    pub vision: [[VisionCell; VISION_GRID_SIZE]; VISION_GRID_SIZE],
    pub offer: OfferSummary,
    /// (letter, color) of the desired piece
    pub desired_piece: [f32; DESIRED_LEN],
    /// Heard speech, oldest first
    pub listen_history: Vec<Speech>,
}

impl Observation {
    /// Build `agent`'s view of the world. Pure: nothing is mutated.
    pub fn build(
        agent: &Agent,
        agents: &[Agent],
        pieces: &PieceRegistry,
        config: &WorldConfig,
    ) -> Self {
        let norm = Normalizer::new(config);
        let radius = config.vision_radius();
        let window = Bounds::from_center_and_range(agent.position, VISION_OFFSET);
        let mut vision = [[VisionCell::default(); VISION_GRID_SIZE]; VISION_GRID_SIZE];

        for other in agents {
            if other.position.distance(&agent.position) > radius {
                continue;
            }
            let Some(cell) = window_cell(&mut vision, &window, agent.position, other.position)
            else {
                continue;
            };
            let held = other.piece_in_hand.and_then(|id| pieces.get(id));
            cell.agent_id = norm.agent(other.id.0);
            cell.agent_color = norm.color(other.color);
            cell.held_letter = held.map_or(0.0, |p| norm.letter(p.letter));
            cell.held_color = held.map_or(0.0, |p| norm.color(p.color));
        }

        for piece in pieces.iter() {
            if piece.position.distance(&agent.position) > radius {
                continue;
            }
            let Some(cell) = window_cell(&mut vision, &window, agent.position, piece.position)
            else {
                continue;
            };
            cell.piece_letter = norm.letter(piece.letter);
            cell.piece_color = norm.color(piece.color);
        }

        let offered: Option<&Piece> = agent
            .incoming_offer
            .and_then(|offer| pieces.get(offer.piece));
        let offer = OfferSummary {
            offered_letter: offered.map_or(0.0, |p| norm.letter(p.letter)),
            offered_color: offered.map_or(0.0, |p| norm.color(p.color)),
            offering_agent: agent
                .incoming_offer
                .map_or(0.0, |offer| norm.agent(offer.from.0)),
            holding: if agent.is_holding() { 1.0 } else { 0.0 },
        };

        Self {
            vision,
            offer,
            desired_piece: [
                norm.letter(agent.desired.letter),
                norm.color(agent.desired.color),
            ],
            listen_history: agent.listen_history.iter().cloned().collect(),
        }
    }

    /// Cell at window coordinates, if inside the window.
    pub fn cell(&self, x: usize, y: usize) -> Option<&VisionCell> {
        self.vision.get(x).and_then(|column| column.get(y))
    }

    /// The observer's own cell.
    pub fn center(&self) -> &VisionCell {
        let c = VISION_OFFSET as usize;
        &self.vision[c][c]
    }

    /// Length of `flatten()` for a given configuration.
    pub fn flat_len(config: &WorldConfig) -> usize {
        VISION_GRID_SIZE * VISION_GRID_SIZE * VISION_CELL_LEN
            + OFFER_LEN
            + DESIRED_LEN
            + config.listen_history_size * config.speech_len
    }

    /// Flat feature vector: vision (x-major), offer, desired piece, speech.
    pub fn flatten(&self) -> Vec<f32> {
        let speech_len: usize = self.listen_history.iter().map(Speech::len).sum();
        let mut out = Vec::with_capacity(
            VISION_GRID_SIZE * VISION_GRID_SIZE * VISION_CELL_LEN + OFFER_LEN + DESIRED_LEN + speech_len,
        );
        for column in &self.vision {
            for cell in column {
                out.extend_from_slice(&cell.as_array());
            }
        }
        out.extend_from_slice(&[
            self.offer.offered_letter,
            self.offer.offered_color,
            self.offer.offering_agent,
            self.offer.holding,
        ]);
        out.extend_from_slice(&self.desired_piece);
        for speech in &self.listen_history {
            out.extend_from_slice(speech.as_slice());
        }
        out
    }
}

fn window_cell<'a>(
    vision: &'a mut [[VisionCell; VISION_GRID_SIZE]; VISION_GRID_SIZE],
    window: &Bounds,
    observer: Position,
    seen: Position,
) -> Option<&'a mut VisionCell> {
    if !window.contains(&seen) {
        return None;
    }
    let x = (seen.x - (observer.x - VISION_OFFSET)) as usize;
    let y = (seen.y - (observer.y - VISION_OFFSET)) as usize;
    vision.get_mut(x).and_then(|column| column.get_mut(y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::agent::{AgentId, IncomingOffer};
    use crate::state::piece::PieceSpec;

    fn config() -> WorldConfig {
        WorldConfig {
            grid_size: 10,
            n_agents: 4,
            n_pieces: 4,
            n_colors: 2,
            n_letters: 2,
            listen_history_size: 3,
            speech_len: 2,
            ..WorldConfig::default()
        }
    }

    fn agent_at(id: u16, x: i32, y: i32, color: u8) -> Agent {
        let mut agent = Agent::new(AgentId(id), false, 3, 2);
        agent.reset(Position::new(x, y), color, PieceSpec { color: 2, letter: 1 });
        agent
    }

    #[test]
    fn test_vision_places_agents_and_pieces() {
        let config = config();
        let mut pieces = PieceRegistry::new();
        let held = pieces.spawn(Position::new(6, 5), 2, 2);
        pieces.spawn(Position::new(4, 4), 1, 1);
        // Out of Euclidean range although inside the square window
        pieces.spawn(Position::new(7, 7), 1, 1);

        let me = agent_at(1, 5, 5, 1);
        let mut neighbor = agent_at(2, 6, 5, 2);
        neighbor.piece_in_hand = Some(held);
        let far = agent_at(3, 9, 9, 1);
        let agents = vec![me.clone(), neighbor, far];

        let obs = Observation::build(&me, &agents, &pieces, &config);

        assert_eq!(obs.center().agent_id, 0.25);
        assert_eq!(obs.center().agent_color, 0.5);

        let cell = obs.cell(3, 2).copied().unwrap_or_default();
        assert_eq!(cell.agent_id, 0.5);
        assert_eq!(cell.agent_color, 1.0);
        assert_eq!(cell.held_letter, 1.0);
        assert_eq!(cell.held_color, 1.0);
        // Held piece is co-located with its holder
        assert_eq!(cell.piece_letter, 1.0);

        let loose = obs.cell(1, 1).copied().unwrap_or_default();
        assert_eq!(loose.piece_letter, 0.5);
        assert_eq!(loose.piece_color, 0.5);
        assert_eq!(loose.agent_id, 0.0);

        assert_eq!(obs.cell(4, 4).copied().unwrap_or_default(), VisionCell::default());
    }

    #[test]
    fn test_offer_and_desired_encoding() {
        let config = config();
        let mut pieces = PieceRegistry::new();
        let offered = pieces.spawn(Position::new(2, 2), 2, 1);

        let mut me = agent_at(1, 5, 5, 1);
        me.incoming_offer = Some(IncomingOffer {
            from: AgentId(4),
            piece: offered,
        });
        let agents = vec![me.clone()];
        let obs = Observation::build(&me, &agents, &pieces, &config);

        assert_eq!(
            obs.offer,
            OfferSummary {
                offered_letter: 0.5,
                offered_color: 1.0,
                offering_agent: 1.0,
                holding: 0.0,
            }
        );
        assert_eq!(obs.desired_piece, [0.5, 1.0]);
        assert_eq!(obs.listen_history.len(), 3);
    }

    #[test]
    fn test_edge_of_grid_does_not_panic() {
        let config = config();
        let mut pieces = PieceRegistry::new();
        pieces.spawn(Position::new(0, 1), 1, 2);
        let me = agent_at(1, 0, 0, 1);
        let agents = vec![me.clone()];
        let obs = Observation::build(&me, &agents, &pieces, &config);
        assert_eq!(obs.cell(2, 3).map(|c| c.piece_letter), Some(1.0));
    }

    #[test]
    fn test_flatten_length() {
        let config = config();
        let pieces = PieceRegistry::new();
        let me = agent_at(1, 5, 5, 1);
        let obs = Observation::build(&me, &[me.clone()], &pieces, &config);
        assert_eq!(obs.flatten().len(), Observation::flat_len(&config));
        assert_eq!(Observation::flat_len(&config), 150 + 4 + 2 + 6);
    }

    #[test]
    fn test_normalizer_recovers_agent_id() {
        let norm = Normalizer::new(&config());
        assert_eq!(norm.agent_from(norm.agent(3)), Some(3));
        assert_eq!(norm.agent_from(0.0), None);
    }
}
