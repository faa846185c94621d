//! Turn coordinator: owns agents and pieces, collects one action per agent
//! per tick and resolves them grouped by kind.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::config::WorldConfig;
use crate::error::SimError;
use crate::infra::WorldObserver;
use crate::infra::grid::random_free_position;
use crate::policy::Policy;
use crate::state::{Agent, AgentId, Observation, Piece, PieceRegistry, PieceSpec};

use super::action::{Action, ActionKind, RawAction};
use super::resolve::{FoundPiece, TickContext, propagate_speech};
use super::snapshot::{AgentView, PieceView, WorldSnapshot};
use super::stats::EpisodeStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Not reset yet, or the last episode was aborted by an error
    Idle,
    Running,
}

/// Additional information from a step
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepInfo {
    /// Steps taken this episode
    pub steps: usize,
    /// Reward earned by non-learning agents this tick
    pub collective_reward: f32,
    /// Learning agent reward so far this episode
    pub episode_reward: f32,
    /// Non-learning agent reward so far this episode
    pub episode_collective_reward: f32,
    pub pieces_remaining: usize,
    /// Pieces matched and removed this tick
    pub pieces_found: usize,
}

#[derive(Debug, Clone)]
pub struct StepResult {
    /// Learning agent's observation after the tick
    pub observation: Observation,
    /// Learning agent's reward for the tick
    pub reward: f32,
    pub terminated: bool,
    pub truncated: bool,
    pub info: StepInfo,
}

/// Totals reported when an episode runs out of steps.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeSummary {
    pub episode: usize,
    pub steps: usize,
    pub learning_reward: f32,
    pub collective_reward: f32,
    pub pieces_remaining: usize,
    pub stats: EpisodeStats,
}

pub struct World {
    config: WorldConfig,
    agents: Vec<Agent>,
    pieces: PieceRegistry,
    /// One per agent; `None` for the learning agent
    policies: Vec<Option<Box<dyn Policy>>>,
    learning_agent: AgentId,
    phase: Phase,
    step: usize,
    episode: usize,
    rng: StdRng,
    episode_reward: f32,
    collective_reward: f32,
    stats: EpisodeStats,
    observer: Option<Box<dyn WorldObserver>>,
}

impl World {
    /// Create a world whose learning agent is drawn at random.
    ///
    /// `policies` is called once for every non-learning agent.
    pub fn new<F>(config: WorldConfig, seed: Option<u64>, policies: F) -> Result<Self, SimError>
    where
        F: FnMut(AgentId) -> Box<dyn Policy>,
    {
        config.validate()?;
        let mut rng = seed_rng(seed);
        let learning_agent = AgentId::from_index(rng.random_range(0..config.n_agents));
        Self::build(config, rng, learning_agent, policies)
    }

    /// Create a world with a chosen learning agent.
    pub fn with_learning_agent<F>(
        config: WorldConfig,
        seed: Option<u64>,
        learning_agent: AgentId,
        policies: F,
    ) -> Result<Self, SimError>
    where
        F: FnMut(AgentId) -> Box<dyn Policy>,
    {
        config.validate()?;
        if learning_agent.0 == 0 || learning_agent.index() >= config.n_agents {
            return Err(SimError::UnknownAgent {
                index: (learning_agent.0 as usize).wrapping_sub(1),
                n_agents: config.n_agents,
            });
        }
        Self::build(config, seed_rng(seed), learning_agent, policies)
    }

    fn build<F>(
        config: WorldConfig,
        rng: StdRng,
        learning_agent: AgentId,
        policies: F,
    ) -> Result<Self, SimError>
    where
        F: FnMut(AgentId) -> Box<dyn Policy>,
    {
        let agents = (0..config.n_agents)
            .map(|index| {
                let id = AgentId::from_index(index);
                Agent::new(
                    id,
                    id == learning_agent,
                    config.listen_history_size,
                    config.speech_len,
                )
            })
            .collect();

        let mut world = Self {
            config,
            agents,
            pieces: PieceRegistry::new(),
            policies: Vec::new(),
            learning_agent,
            phase: Phase::Idle,
            step: 0,
            episode: 0,
            rng,
            episode_reward: 0.0,
            collective_reward: 0.0,
            stats: EpisodeStats::default(),
            observer: None,
        };
        world.install_policies(policies);
        info!(
            agents = world.config.n_agents,
            learning_agent = learning_agent.0,
            "world created"
        );
        Ok(world)
    }

    /// Replace the policies of all non-learning agents.
    pub fn install_policies<F>(&mut self, mut factory: F)
    where
        F: FnMut(AgentId) -> Box<dyn Policy>,
    {
        self.policies = self
            .agents
            .iter()
            .map(|agent| {
                if agent.id == self.learning_agent {
                    None
                } else {
                    Some(factory(agent.id))
                }
            })
            .collect();
    }

    /// Hand control of another agent to the learner. Policies are rebuilt
    /// with `factory` because the previous learning agent now needs one.
    pub fn set_learning_agent<F>(&mut self, id: AgentId, factory: F) -> Result<(), SimError>
    where
        F: FnMut(AgentId) -> Box<dyn Policy>,
    {
        if id.0 == 0 || id.index() >= self.agents.len() {
            return Err(SimError::UnknownAgent {
                index: (id.0 as usize).wrapping_sub(1),
                n_agents: self.agents.len(),
            });
        }
        for agent in &mut self.agents {
            agent.set_learning(agent.id == id);
        }
        self.learning_agent = id;
        self.install_policies(factory);
        debug!(learning_agent = id.0, "learning agent changed");
        Ok(())
    }

    pub fn set_observer(&mut self, observer: Box<dyn WorldObserver>) {
        self.observer = Some(observer);
    }

    /// Restart the random stream; the next `reset` is reproducible.
    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Start a new episode and return the learning agent's first observation.
    pub fn reset(&mut self) -> Result<Observation, SimError> {
        let n_agents = self.config.n_agents;
        let n_colors = self.config.n_colors;
        let grid_size = self.config.grid_size;

        let mut colors: Vec<u8> = (0..n_agents).map(|i| (i % n_colors) as u8 + 1).collect();
        colors.shuffle(&mut self.rng);

        // The first n_agents pieces are the agents' targets, colored so that
        // their owner can never pick them up alone
        self.pieces.clear();
        let mut occupied = Vec::with_capacity(self.config.n_pieces);
        for i in 0..self.config.n_pieces {
            let letter = self.rng.random_range(1..=self.config.n_letters) as u8;
            let position = random_free_position(&mut self.rng, grid_size, &occupied)?;
            let color = match colors.get(i) {
                Some(&agent_color) => mismatched_color(&mut self.rng, agent_color, n_colors),
                None => self.rng.random_range(1..=n_colors) as u8,
            };
            self.pieces.spawn(position, color, letter);
            occupied.push(position);
        }

        let targets: Vec<PieceSpec> = self.pieces.iter().take(n_agents).map(Piece::spec).collect();
        let mut placed = Vec::with_capacity(n_agents);
        for (index, target) in targets.into_iter().enumerate() {
            let position = random_free_position(&mut self.rng, grid_size, &placed)?;
            self.agents[index].reset(position, colors[index], target);
            placed.push(position);
        }

        self.phase = Phase::Running;
        self.step = 0;
        self.episode += 1;
        self.episode_reward = 0.0;
        self.collective_reward = 0.0;
        self.stats = EpisodeStats::default();

        info!(
            episode = self.episode,
            learning_agent = self.learning_agent.0,
            pieces = self.pieces.len(),
            "episode reset"
        );

        if self.observer.is_some() {
            let snapshot = self.snapshot();
            if let Some(observer) = self.observer.as_mut() {
                observer.on_episode_start(&snapshot);
            }
        }

        Ok(self.learning_observation())
    }

    /// Advance one tick with the learning agent's action.
    pub fn step(&mut self, action: Action) -> Result<StepResult, SimError> {
        if self.phase == Phase::Idle {
            return Err(SimError::NotRunning);
        }
        if self.step >= self.config.max_steps {
            return Ok(StepResult {
                observation: self.learning_observation(),
                reward: 0.0,
                terminated: true,
                truncated: false,
                info: self.info(0.0, 0),
            });
        }
        action.validate(&self.config)?;

        let queue = self.collect_actions(action)?;

        for agent in &mut self.agents {
            agent.clear_speech();
        }

        let mut found = Vec::new();
        let (reward, collective) = match self.resolve_tick(&queue, &mut found) {
            Ok(rewards) => rewards,
            Err(e) => {
                // The tick is only partly applied; the episode cannot continue
                self.phase = Phase::Idle;
                warn!(episode = self.episode, step = self.step, error = %e, "episode aborted");
                return Err(e);
            }
        };

        propagate_speech(&mut self.agents);

        self.step += 1;
        self.episode_reward += reward;
        self.collective_reward += collective;
        let terminated = self.step >= self.config.max_steps;

        debug_assert!(
            self.check_invariants().is_ok(),
            "{:?}",
            self.check_invariants()
        );

        self.notify(&found, terminated);

        Ok(StepResult {
            observation: self.learning_observation(),
            reward,
            terminated,
            truncated: false,
            info: self.info(collective, found.len()),
        })
    }

    /// Apply every queued action and return the learning agent's reward and
    /// the collective reward of everyone else.
    fn resolve_tick(
        &mut self,
        queue: &[Vec<(usize, Action)>],
        found: &mut Vec<FoundPiece>,
    ) -> Result<(f32, f32), SimError> {
        let learning_index = self.learning_agent.index();
        let mut reward = 0.0;
        let mut collective = 0.0;
        let mut ctx = TickContext {
            config: &self.config,
            agents: &mut self.agents,
            pieces: &mut self.pieces,
            rng: &mut self.rng,
            stats: &mut self.stats,
            found,
        };
        for bucket in queue {
            for (index, action) in bucket {
                let delta = ctx.step_agent(*index, action)?;
                if *index == learning_index {
                    reward += delta;
                } else {
                    collective += delta;
                }
            }
        }
        Ok((reward, collective))
    }

    /// Decode a trainer-shaped action and step with it.
    pub fn step_raw(&mut self, raw: RawAction) -> Result<StepResult, SimError> {
        let action = raw.decode(&self.config)?;
        self.step(action)
    }

    /// Gather one validated action per agent, bucketed by kind in
    /// resolution order. Within a bucket agents keep list order.
    fn collect_actions(
        &mut self,
        learning_action: Action,
    ) -> Result<[Vec<(usize, Action)>; ActionKind::COUNT], SimError> {
        let mut queue: [Vec<(usize, Action)>; ActionKind::COUNT] = Default::default();
        let mut learning_action = Some(learning_action);

        for index in 0..self.agents.len() {
            let action = match self.policies.get_mut(index).and_then(Option::as_mut) {
                Some(policy) => {
                    let obs = Observation::build(
                        &self.agents[index],
                        &self.agents,
                        &self.pieces,
                        &self.config,
                    );
                    let action = policy.choose_action(&obs);
                    action.validate(&self.config)?;
                    action
                }
                None => learning_action.take().ok_or_else(|| {
                    SimError::InvariantViolation(format!(
                        "agent {} has no policy",
                        self.agents[index].id.0
                    ))
                })?,
            };
            queue[action.kind().index()].push((index, action));
        }
        Ok(queue)
    }

    fn notify(&mut self, found: &[FoundPiece], terminated: bool) {
        let summary = terminated.then(|| self.summary());
        if let Some(summary) = &summary {
            info!(
                episode = summary.episode,
                reward = summary.learning_reward,
                collective_reward = summary.collective_reward,
                total = summary.learning_reward + summary.collective_reward,
                pieces_found = summary.stats.pieces_found,
                trades = summary.stats.trades,
                "end of episode"
            );
        }

        if self.observer.is_none() {
            return;
        }
        let snapshot = self.snapshot();
        if let Some(observer) = self.observer.as_mut() {
            for piece in found {
                observer.on_piece_found(piece);
            }
            observer.on_frame(&snapshot);
            if let Some(summary) = &summary {
                observer.on_episode_end(summary);
            }
        }
    }

    fn info(&self, collective: f32, pieces_found: usize) -> StepInfo {
        StepInfo {
            steps: self.step,
            collective_reward: collective,
            episode_reward: self.episode_reward,
            episode_collective_reward: self.collective_reward,
            pieces_remaining: self.pieces.len(),
            pieces_found,
        }
    }

    pub fn summary(&self) -> EpisodeSummary {
        EpisodeSummary {
            episode: self.episode,
            steps: self.step,
            learning_reward: self.episode_reward,
            collective_reward: self.collective_reward,
            pieces_remaining: self.pieces.len(),
            stats: self.stats.clone(),
        }
    }

    fn learning_observation(&self) -> Observation {
        let agent = &self.agents[self.learning_agent.index()];
        Observation::build(agent, &self.agents, &self.pieces, &self.config)
    }

    /// Observation of any agent, built from the current state.
    pub fn observe(&self, id: AgentId) -> Option<Observation> {
        let agent = self.agents.get((id.0 as usize).wrapping_sub(1))?;
        Some(Observation::build(
            agent,
            &self.agents,
            &self.pieces,
            &self.config,
        ))
    }

    pub fn snapshot(&self) -> WorldSnapshot {
        let spec = |id| self.pieces.get(id).map(Piece::spec);
        WorldSnapshot {
            episode: self.episode,
            step: self.step,
            grid_size: self.config.grid_size,
            agents: self
                .agents
                .iter()
                .map(|agent| AgentView {
                    id: agent.id,
                    position: agent.position,
                    color: agent.color,
                    desired: agent.desired,
                    held: agent.piece_in_hand.and_then(spec),
                    learning: agent.is_learning_agent(),
                })
                .collect(),
            pieces: self
                .pieces
                .iter()
                .map(|piece| PieceView {
                    position: piece.position,
                    color: piece.color,
                    letter: piece.letter,
                })
                .collect(),
            learning_reward: self.episode_reward,
            collective_reward: self.collective_reward,
        }
    }

    /// Verify ownership and offer linkage.
    pub fn check_invariants(&self) -> Result<(), SimError> {
        let violation = |msg: String| Err(SimError::InvariantViolation(msg));
        let mut held = Vec::new();

        for agent in &self.agents {
            if let Some(piece_id) = agent.piece_in_hand {
                let Some(piece) = self.pieces.get(piece_id) else {
                    return violation(format!(
                        "agent {} holds missing piece {:?}",
                        agent.id.0, piece_id
                    ));
                };
                if held.contains(&piece_id) {
                    return violation(format!("piece {:?} held twice", piece_id));
                }
                if piece.position != agent.position {
                    return violation(format!(
                        "piece {:?} not on holder {}",
                        piece_id, agent.id.0
                    ));
                }
                held.push(piece_id);
            }

            if let Some(offer) = agent.incoming_offer {
                let offerer = &self.agents[offer.from.index()];
                if offerer.piece_in_hand != Some(offer.piece) {
                    return violation(format!(
                        "agent {} offered piece {:?} it does not hold",
                        offer.from.0, offer.piece
                    ));
                }
                if offerer.offering_to != Some(agent.id) {
                    return violation(format!(
                        "offer from {} to {} is one-sided",
                        offer.from.0, agent.id.0
                    ));
                }
            }

            if let Some(to) = agent.offering_to {
                let receiver = &self.agents[to.index()];
                if receiver.incoming_offer.map(|offer| offer.from) != Some(agent.id) {
                    return violation(format!(
                        "agent {} offers to {} without a matching incoming offer",
                        agent.id.0, to.0
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get((id.0 as usize).wrapping_sub(1))
    }

    pub fn pieces(&self) -> &PieceRegistry {
        &self.pieces
    }

    pub fn learning_agent(&self) -> AgentId {
        self.learning_agent
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn step_count(&self) -> usize {
        self.step
    }

    pub fn episode(&self) -> usize {
        self.episode
    }

    pub fn episode_reward(&self) -> f32 {
        self.episode_reward
    }

    /// Reward accrued by non-learning agents this episode. Tracked for
    /// logging only; never part of the per-step reward.
    pub fn collective_reward(&self) -> f32 {
        self.collective_reward
    }

    pub fn stats(&self) -> &EpisodeStats {
        &self.stats
    }

    #[cfg(test)]
    pub(crate) fn agents_mut(&mut self) -> &mut [Agent] {
        &mut self.agents
    }

    #[cfg(test)]
    pub(crate) fn pieces_mut(&mut self) -> &mut PieceRegistry {
        &mut self.pieces
    }
}

fn seed_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

/// Uniform color in 1..=n_colors other than `forbidden`.
fn mismatched_color<R: Rng + ?Sized>(rng: &mut R, forbidden: u8, n_colors: usize) -> u8 {
    let mut color = rng.random_range(0..n_colors);
    if color + 1 == forbidden as usize {
        color = (color + rng.random_range(1..n_colors)) % n_colors;
    }
    debug!(forbidden, color = color + 1, "seeded target color");
    color as u8 + 1
}
