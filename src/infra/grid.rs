//! Spatial helpers over the square grid.

use rand::Rng;

use super::{Bounds, Position};
use crate::error::SimError;

pub fn in_bounds(pos: &Position, grid_size: usize) -> bool {
    Bounds::from_grid_size(grid_size).contains(pos)
}

/// True if no occupant sits on `pos`.
pub fn cell_free<I>(pos: &Position, occupied: I) -> bool
where
    I: IntoIterator<Item = Position>,
{
    occupied.into_iter().all(|other| other != *pos)
}

/// Draw uniformly random cells until one is not in `occupied`.
///
/// Gives up after `grid_size^2` draws; running out means the grid is too
/// crowded for the configured entity counts.
#[tracing::instrument(level = "trace", skip(rng, occupied), fields(occupied = occupied.len()))]
pub fn random_free_position<R: Rng + ?Sized>(
    rng: &mut R,
    grid_size: usize,
    occupied: &[Position],
) -> Result<Position, SimError> {
    let attempts = grid_size * grid_size;
    for _ in 0..attempts {
        let pos = Position::new(
            rng.random_range(0..grid_size) as i32,
            rng.random_range(0..grid_size) as i32,
        );
        if cell_free(&pos, occupied.iter().copied()) {
            return Ok(pos);
        }
    }
    Err(SimError::NoFreeCell {
        grid_size,
        attempts,
    })
}
