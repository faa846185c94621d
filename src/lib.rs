pub mod config;
pub mod error;
pub mod infra;
pub mod metrics;
pub mod policy;
pub mod sim;
pub mod state;
pub mod ui;

// Re-export commonly used types for convenience
pub use config::{RewardConfig, WorldConfig};
pub use error::SimError;
pub use infra::Position;
pub use policy::{Policy, RandomPolicy, TraderPolicy};
pub use sim::{Action, ActionKind, RawAction, StepResult, World};
pub use state::{AgentId, Observation};
