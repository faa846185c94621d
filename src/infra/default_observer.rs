use tracing::{debug, info, trace};

use crate::infra::WorldObserver;
use crate::sim::{EpisodeSummary, FoundPiece, WorldSnapshot};

/// Logs episode events through `tracing`. The full map is drawn at trace level.
pub struct DefaultObserver;

impl WorldObserver for DefaultObserver {
    fn on_episode_start(&mut self, snapshot: &WorldSnapshot) {
        info!("Episode {} started", snapshot.episode);
        info!("- grid size: {}x{}", snapshot.grid_size, snapshot.grid_size);
        info!("- agents: {}, pieces: {}", snapshot.agents.len(), snapshot.pieces.len());
        if let Some(learner) = snapshot.agents.iter().find(|agent| agent.learning) {
            info!(
                "- learning agent: {} (color {}, wants {}/{})",
                learner.id.0, learner.color, learner.desired.color, learner.desired.letter
            );
        }
    }

    fn on_frame(&mut self, snapshot: &WorldSnapshot) {
        debug!(
            "step: {}, reward: {:.2}, collective: {:.2}, pieces left: {}",
            snapshot.step,
            snapshot.learning_reward,
            snapshot.collective_reward,
            snapshot.pieces.len()
        );
        trace!("\n{}", snapshot.draw_ascii());
    }

    fn on_piece_found(&mut self, found: &FoundPiece) {
        info!(
            "Agent {} received its piece ({}/{}) from agent {}",
            found.receiver.0, found.piece.color, found.piece.letter, found.giver.0
        );
    }

    fn on_episode_end(&mut self, summary: &EpisodeSummary) {
        info!(
            "Episode {} finished after {} steps",
            summary.episode, summary.steps
        );
        info!(
            "- reward: {:.2}, collective: {:.2}, pieces found: {}, trades: {}",
            summary.learning_reward,
            summary.collective_reward,
            summary.stats.pieces_found,
            summary.stats.trades
        );
    }
}
