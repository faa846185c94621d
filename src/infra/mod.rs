mod composite_observer;
mod default_observer;
pub mod grid;
mod types;
mod visualizing_observer;
mod world_observer;

pub use composite_observer::CompositeObserver;
pub use default_observer::DefaultObserver;
pub use types::{Bounds, Position};
pub use visualizing_observer::VisualizingObserver;
pub use world_observer::WorldObserver;
