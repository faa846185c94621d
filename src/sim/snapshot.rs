use crate::infra::Position;
use crate::state::{AgentId, PieceSpec};

#[derive(Debug, Clone, PartialEq)]
pub struct AgentView {
    pub id: AgentId,
    pub position: Position,
    pub color: u8,
    pub desired: PieceSpec,
    pub held: Option<PieceSpec>,
    pub learning: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PieceView {
    pub position: Position,
    pub color: u8,
    pub letter: u8,
}

/// Owned copy of everything a renderer needs for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldSnapshot {
    pub episode: usize,
    pub step: usize,
    pub grid_size: usize,
    pub agents: Vec<AgentView>,
    pub pieces: Vec<PieceView>,
    pub learning_reward: f32,
    pub collective_reward: f32,
}

impl WorldSnapshot {
    /// Render as text. Agents print as their id (last digit), loose pieces
    /// as `a`, `b`, ... by letter, empty cells as `.`.
    pub fn draw_ascii(&self) -> String {
        let mut rows = vec![vec!['.'; self.grid_size]; self.grid_size];

        for piece in &self.pieces {
            if let Some(cell) = cell_mut(&mut rows, piece.position) {
                *cell = (b'a' + piece.letter.saturating_sub(1).min(25)) as char;
            }
        }
        for agent in &self.agents {
            if let Some(cell) = cell_mut(&mut rows, agent.position) {
                *cell = char::from_digit(agent.id.0 as u32 % 10, 10).unwrap_or('?');
            }
        }

        let mut out = String::with_capacity(self.grid_size * (self.grid_size + 1));
        for row in rows {
            out.extend(row);
            out.push('\n');
        }
        out
    }
}

fn cell_mut(rows: &mut [Vec<char>], pos: Position) -> Option<&mut char> {
    if pos.x < 0 || pos.y < 0 {
        return None;
    }
    rows.get_mut(pos.y as usize)
        .and_then(|row| row.get_mut(pos.x as usize))
}
