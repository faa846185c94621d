//! World and reward configuration.

use std::env;
use std::str::FromStr;

use crate::error::SimError;

/// Side of the square vision window centered on an agent.
pub const VISION_GRID_SIZE: usize = 5;
/// Offset used to map world coordinates into the vision window.
/// Matches `VISION_GRID_SIZE / 2` only while the window stays at 5.
pub const VISION_OFFSET: i32 = 2;
/// Maximum distance at which speech is heard.
pub const LISTEN_RANGE: f32 = 5.0;

/// Reward and penalty magnitudes. Penalties are stored positive and subtracted.
#[derive(Debug, Clone, PartialEq)]
pub struct RewardConfig {
    pub invalid_movement_penalty: f32,
    pub invalid_pick_up_penalty: f32,
    pub invalid_offer_penalty: f32,
    pub invalid_stop_offering_penalty: f32,
    pub invalid_drop_piece_penalty: f32,
    pub successful_offer_reward: f32,
    pub accept_piece_reward: f32,
    /// Learning agent receives its own desired piece
    pub piece_found_reward: f32,
    /// A non-learning agent receives its desired piece
    pub teammate_piece_found_reward: f32,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            invalid_movement_penalty: 1.0,
            invalid_pick_up_penalty: 1.0,
            invalid_offer_penalty: 1.0,
            invalid_stop_offering_penalty: 1.0,
            invalid_drop_piece_penalty: 1.0,
            successful_offer_reward: 1.0,
            accept_piece_reward: 3.0,
            piece_found_reward: 20.0,
            teammate_piece_found_reward: 0.5,
        }
    }
}

/// Immutable world configuration, shared by every component.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldConfig {
    /// Grid is `grid_size` x `grid_size`
    pub grid_size: usize,
    pub n_agents: usize,
    pub n_pieces: usize,
    pub n_colors: usize,
    pub n_letters: usize,
    /// Steps per episode
    pub max_steps: usize,
    /// Number of heard speech vectors kept per agent
    pub listen_history_size: usize,
    /// Length of every speech vector
    pub speech_len: usize,
    pub rewards: RewardConfig,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            grid_size: 12,
            n_agents: 9,
            n_pieces: 9,
            n_colors: 3,
            n_letters: 2,
            max_steps: 256,
            listen_history_size: 5,
            speech_len: 120,
            rewards: RewardConfig::default(),
        }
    }
}

/// Parse an optional environment variable. Unset is `None`; set but
/// unparsable is an error.
pub fn env_opt<T: FromStr>(key: &str) -> Result<Option<T>, SimError> {
    match env::var(key) {
        Ok(val) => val
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| SimError::InvalidConfig(format!("{} has an invalid value: {:?}", key, val))),
        Err(_) => Ok(None),
    }
}

pub fn env_or<T: FromStr>(key: &str, default: T) -> Result<T, SimError> {
    Ok(env_opt(key)?.unwrap_or(default))
}

impl WorldConfig {
    /// Load from `TRADEGRID_*` environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, SimError> {
        let defaults = Self::default();
        let config = Self {
            grid_size: env_or("TRADEGRID_GRID_SIZE", defaults.grid_size)?,
            n_agents: env_or("TRADEGRID_AGENTS", defaults.n_agents)?,
            n_pieces: env_or("TRADEGRID_PIECES", defaults.n_pieces)?,
            n_colors: env_or("TRADEGRID_COLORS", defaults.n_colors)?,
            n_letters: env_or("TRADEGRID_LETTERS", defaults.n_letters)?,
            max_steps: env_or("TRADEGRID_MAX_STEPS", defaults.max_steps)?,
            listen_history_size: env_or("TRADEGRID_LISTEN_HISTORY", defaults.listen_history_size)?,
            speech_len: env_or("TRADEGRID_SPEECH_LEN", defaults.speech_len)?,
            rewards: defaults.rewards,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SimError> {
        let fail = |reason: &str| Err(SimError::InvalidConfig(reason.to_string()));

        if self.grid_size == 0 {
            return fail("grid_size must be positive");
        }
        if self.n_agents == 0 {
            return fail("at least one agent is required");
        }
        if self.n_agents > self.n_pieces {
            return fail("n_pieces must be at least n_agents");
        }
        if self.n_colors < 2 {
            return fail("at least two colors are required");
        }
        if self.n_letters == 0 {
            return fail("at least one letter is required");
        }
        if self.n_agents > u16::MAX as usize {
            return fail("too many agents");
        }
        if self.n_colors > u8::MAX as usize || self.n_letters > u8::MAX as usize {
            return fail("colors and letters must fit in a byte");
        }
        let cells = self.grid_size * self.grid_size;
        if self.n_agents > cells || self.n_pieces > cells {
            return fail("more entities than grid cells");
        }
        if self.max_steps == 0 {
            return fail("max_steps must be positive");
        }
        if self.listen_history_size == 0 {
            return fail("listen_history_size must be positive");
        }
        if self.speech_len == 0 {
            return fail("speech_len must be positive");
        }
        Ok(())
    }

    /// Vision radius: half the vision window, rounded down.
    pub fn vision_radius(&self) -> f32 {
        (VISION_GRID_SIZE / 2) as f32
    }
}
