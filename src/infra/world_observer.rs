use crate::sim::{EpisodeSummary, FoundPiece, WorldSnapshot};

/// Rendering/logging sink fed by the world every tick.
///
/// Implementations must return quickly; the simulation never waits for a
/// frame to be drawn.
pub trait WorldObserver: Send {
    /// Called after `reset` with the initial layout
    fn on_episode_start(&mut self, snapshot: &WorldSnapshot);

    /// Called after every resolved tick
    fn on_frame(&mut self, snapshot: &WorldSnapshot);

    /// Called when a piece matched its receiver and left the world
    fn on_piece_found(&mut self, _found: &FoundPiece) {
        // Default implementation does nothing
    }

    /// Called when the step budget runs out
    fn on_episode_end(&mut self, summary: &EpisodeSummary);
}
