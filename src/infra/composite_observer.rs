use crate::infra::WorldObserver;
use crate::sim::{EpisodeSummary, FoundPiece, WorldSnapshot};

/// Fans every event out to a list of observers, in order.
pub struct CompositeObserver {
    observers: Vec<Box<dyn WorldObserver>>,
}

impl CompositeObserver {
    pub fn new(observers: Vec<Box<dyn WorldObserver>>) -> Self {
        Self { observers }
    }

    pub fn push(&mut self, observer: Box<dyn WorldObserver>) {
        self.observers.push(observer);
    }
}

impl WorldObserver for CompositeObserver {
    fn on_episode_start(&mut self, snapshot: &WorldSnapshot) {
        for observer in &mut self.observers {
            observer.on_episode_start(snapshot);
        }
    }

    fn on_frame(&mut self, snapshot: &WorldSnapshot) {
        for observer in &mut self.observers {
            observer.on_frame(snapshot);
        }
    }

    fn on_piece_found(&mut self, found: &FoundPiece) {
        for observer in &mut self.observers {
            observer.on_piece_found(found);
        }
    }

    fn on_episode_end(&mut self, summary: &EpisodeSummary) {
        for observer in &mut self.observers {
            observer.on_episode_end(summary);
        }
    }
}
