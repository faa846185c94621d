//! Rolling episode statistics for console reporting.

use std::collections::VecDeque;
use std::time::Instant;

use crate::sim::EpisodeSummary;

/// Moving average over the last `window_size` values
#[derive(Debug, Clone)]
pub struct MovingAverage {
    values: VecDeque<f32>,
    window_size: usize,
    sum: f32,
}

impl MovingAverage {
    pub fn new(window_size: usize) -> Self {
        Self {
            values: VecDeque::with_capacity(window_size),
            window_size: window_size.max(1),
            sum: 0.0,
        }
    }

    pub fn push(&mut self, value: f32) {
        if self.values.len() >= self.window_size
            && let Some(old) = self.values.pop_front()
        {
            self.sum -= old;
        }
        self.values.push_back(value);
        self.sum += value;
    }

    pub fn average(&self) -> f32 {
        if self.values.is_empty() {
            0.0
        } else {
            self.sum / self.values.len() as f32
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Aggregates over a run of episodes
#[derive(Debug)]
pub struct RunMetrics {
    pub learning_rewards: MovingAverage,
    pub collective_rewards: MovingAverage,
    pub pieces_found: MovingAverage,
    pub trades: MovingAverage,
    /// Invalid actions of the learning agent per episode
    pub invalid_actions: MovingAverage,
    pub episodes: usize,
    pub total_steps: usize,
    start_time: Instant,
}

impl RunMetrics {
    pub fn new(window_size: usize) -> Self {
        Self {
            learning_rewards: MovingAverage::new(window_size),
            collective_rewards: MovingAverage::new(window_size),
            pieces_found: MovingAverage::new(window_size),
            trades: MovingAverage::new(window_size),
            invalid_actions: MovingAverage::new(window_size),
            episodes: 0,
            total_steps: 0,
            start_time: Instant::now(),
        }
    }

    pub fn record_episode(&mut self, summary: &EpisodeSummary) {
        self.learning_rewards.push(summary.learning_reward);
        self.collective_rewards.push(summary.collective_reward);
        self.pieces_found.push(summary.stats.pieces_found as f32);
        self.trades.push(summary.stats.trades as f32);
        self.invalid_actions
            .push(summary.stats.learning_agent_invalid_actions as f32);
        self.episodes += 1;
        self.total_steps += summary.steps;
    }

    pub fn steps_per_second(&self) -> f64 {
        let duration = self.start_time.elapsed().as_secs_f64();
        if duration > 0.0 {
            self.total_steps as f64 / duration
        } else {
            0.0
        }
    }

    pub fn log_to_console(&self) {
        tracing::info!(
            "Episodes {} | Steps {} | SPS {:.1}",
            self.episodes,
            self.total_steps,
            self.steps_per_second()
        );
        tracing::info!(
            "  Reward: {:.2} | Collective: {:.2} | Found: {:.2} | Trades: {:.2} | Invalid: {:.1}",
            self.learning_rewards.average(),
            self.collective_rewards.average(),
            self.pieces_found.average(),
            self.trades.average(),
            self.invalid_actions.average()
        );
    }
}
