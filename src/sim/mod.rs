mod action;
mod resolve;
mod snapshot;
mod stats;
mod world;

#[cfg(test)]
mod tests;

pub use action::{Action, ActionKind, RawAction};
pub use resolve::{FoundPiece, TickContext, propagate_speech};
pub use snapshot::{AgentView, PieceView, WorldSnapshot};
pub use stats::EpisodeStats;
pub use world::{EpisodeSummary, Phase, StepInfo, StepResult, World};
