#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance, used for vision, offers and hearing.
    pub fn distance(&self, other: &Position) -> f32 {
        let dx = (self.x - other.x) as f32;
        let dy = (self.y - other.y) as f32;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn offset(&self, dx: i32, dy: i32) -> Position {
        Position::new(self.x + dx, self.y + dy)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub min_x: i32,
    pub max_x: i32,
    pub min_y: i32,
    pub max_y: i32,
}

impl Bounds {
    /// Bounds of a square `grid_size` x `grid_size` grid starting at the origin.
    pub fn from_grid_size(grid_size: usize) -> Self {
        let last = grid_size as i32 - 1;
        Self {
            min_x: 0,
            max_x: last,
            min_y: 0,
            max_y: last,
        }
    }

    pub fn from_center_and_range(center: Position, range: i32) -> Self {
        Self {
            min_x: center.x - range,
            max_x: center.x + range,
            min_y: center.y - range,
            max_y: center.y + range,
        }
    }

    pub fn contains(&self, pos: &Position) -> bool {
        pos.x >= self.min_x && pos.x <= self.max_x && pos.y >= self.min_y && pos.y <= self.max_y
    }
}
