use crate::infra::Position;

/// Stable identity of a piece within one episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PieceId(pub u32);

/// The (color, letter) pair an agent is trying to collect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PieceSpec {
    pub color: u8,
    pub letter: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Piece {
    pub id: PieceId,
    pub position: Position,
    pub color: u8,
    pub letter: u8,
}

impl Piece {
    pub fn spec(&self) -> PieceSpec {
        PieceSpec {
            color: self.color,
            letter: self.letter,
        }
    }

    pub fn matches(&self, spec: &PieceSpec) -> bool {
        self.color == spec.color && self.letter == spec.letter
    }
}

/// All pieces in the world, in spawn order.
///
/// Scan order is stable: removal keeps the relative order of the remaining
/// pieces, so "first piece found" lookups are reproducible.
#[derive(Clone, Debug, Default)]
pub struct PieceRegistry {
    pieces: Vec<Piece>,
    next_id: u32,
}

impl PieceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&mut self, position: Position, color: u8, letter: u8) -> PieceId {
        let id = PieceId(self.next_id);
        self.next_id += 1;
        self.pieces.push(Piece {
            id,
            position,
            color,
            letter,
        });
        id
    }

    pub fn get(&self, id: PieceId) -> Option<&Piece> {
        self.pieces.iter().find(|piece| piece.id == id)
    }

    pub fn get_mut(&mut self, id: PieceId) -> Option<&mut Piece> {
        self.pieces.iter_mut().find(|piece| piece.id == id)
    }

    /// Move a piece. Returns false if the piece no longer exists.
    pub fn relocate(&mut self, id: PieceId, position: Position) -> bool {
        match self.get_mut(id) {
            Some(piece) => {
                piece.position = position;
                true
            }
            None => false,
        }
    }

    /// Remove a piece permanently.
    pub fn remove(&mut self, id: PieceId) -> Option<Piece> {
        let index = self.pieces.iter().position(|piece| piece.id == id)?;
        Some(self.pieces.remove(index))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Piece> {
        self.pieces.iter()
    }

    pub fn positions(&self) -> Vec<Position> {
        self.pieces.iter().map(|piece| piece.position).collect()
    }

    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    pub fn contains(&self, id: PieceId) -> bool {
        self.get(id).is_some()
    }

    /// Drop every piece and restart id numbering.
    pub fn clear(&mut self) {
        self.pieces.clear();
        self.next_id = 0;
    }
}
