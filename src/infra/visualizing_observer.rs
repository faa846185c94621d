use std::sync::{Arc, Mutex, TryLockError, mpsc};

use crate::infra::WorldObserver;
use crate::sim::{EpisodeSummary, FoundPiece, WorldSnapshot};
use crate::ui::{LogColor, LogMessage, SharedSnapshot};

/// Publishes frames into a shared slot read by the renderer and forwards
/// notable events over a log channel.
///
/// Frames are dropped rather than waited for when the renderer holds the lock.
pub struct VisualizingObserver {
    shared_state: SharedSnapshot,
    log_tx: mpsc::Sender<LogMessage>,
    dropped_frames: usize,
}

impl VisualizingObserver {
    pub fn new(shared_state: Arc<Mutex<Option<WorldSnapshot>>>, log_tx: mpsc::Sender<LogMessage>) -> Self {
        Self {
            shared_state,
            log_tx,
            dropped_frames: 0,
        }
    }

    pub fn dropped_frames(&self) -> usize {
        self.dropped_frames
    }

    fn send_log(&self, text: String, color: LogColor) {
        // Renderer may already be gone
        let _ = self.log_tx.send(LogMessage { text, color });
    }

    fn publish(&mut self, snapshot: &WorldSnapshot) {
        match self.shared_state.try_lock() {
            Ok(mut slot) => *slot = Some(snapshot.clone()),
            Err(TryLockError::WouldBlock) => self.dropped_frames += 1,
            Err(TryLockError::Poisoned(poisoned)) => {
                *poisoned.into_inner() = Some(snapshot.clone());
            }
        }
    }
}

impl WorldObserver for VisualizingObserver {
    fn on_episode_start(&mut self, snapshot: &WorldSnapshot) {
        self.send_log(format!("Episode {}", snapshot.episode), LogColor::White);
        self.publish(snapshot);
    }

    fn on_frame(&mut self, snapshot: &WorldSnapshot) {
        self.publish(snapshot);
    }

    fn on_piece_found(&mut self, found: &FoundPiece) {
        self.send_log(
            format!(
                "Agent {} found its piece (from agent {})",
                found.receiver.0, found.giver.0
            ),
            LogColor::Green,
        );
    }

    fn on_episode_end(&mut self, summary: &EpisodeSummary) {
        let color = if summary.stats.pieces_found > 0 {
            LogColor::Green
        } else {
            LogColor::Yellow
        };
        self.send_log(
            format!(
                "Episode {} done: reward {:.2}, collective {:.2}, found {}",
                summary.episode,
                summary.learning_reward,
                summary.collective_reward,
                summary.stats.pieces_found
            ),
            color,
        );
    }
}
