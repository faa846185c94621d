use std::sync::{Arc, Mutex};

use crate::sim::WorldSnapshot;

#[cfg(feature = "visualizer")]
mod visualizer;

#[cfg(feature = "visualizer")]
pub use visualizer::run_visualizer;

/// Latest frame handed from the simulation thread to the renderer.
pub type SharedSnapshot = Arc<Mutex<Option<WorldSnapshot>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogColor {
    White,
    Green,
    Yellow,
    Red,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogMessage {
    pub text: String,
    pub color: LogColor,
}

/// RGB for a team color; cycles past the built-in palette.
pub fn team_rgb(color: u8) -> (f32, f32, f32) {
    const PALETTE: [(f32, f32, f32); 6] = [
        (0.9, 0.25, 0.25),
        (0.25, 0.8, 0.3),
        (0.3, 0.45, 0.95),
        (0.95, 0.8, 0.2),
        (0.75, 0.35, 0.9),
        (0.2, 0.85, 0.85),
    ];
    match color {
        0 => (0.5, 0.5, 0.5),
        c => PALETTE[(c as usize - 1) % PALETTE.len()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_team_rgb_cycles() {
        assert_eq!(team_rgb(1), team_rgb(7));
        assert_ne!(team_rgb(1), team_rgb(2));
        assert_eq!(team_rgb(0), (0.5, 0.5, 0.5));
    }
}
