use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::config::WorldConfig;
use crate::error::SimError;
use crate::infra::Position;
use crate::policy::{Policy, RandomPolicy, TraderPolicy};
use crate::sim::{Action, Phase, RawAction, StepResult, World};
use crate::state::{AgentId, IncomingOffer, Observation, PieceId, PieceSpec, Speech};

/// Teammate that plays back queued actions, then waits.
#[derive(Clone, Default)]
struct Script(Arc<Mutex<VecDeque<Action>>>);

impl Script {
    fn push(&self, action: Action) {
        self.0.lock().unwrap().push_back(action);
    }
}

impl Policy for Script {
    fn choose_action(&mut self, _observation: &Observation) -> Action {
        self.0.lock().unwrap().pop_front().unwrap_or(Action::Wait)
    }
}

struct Harness {
    world: World,
    scripts: Vec<Script>,
}

impl Harness {
    /// Three agents on an 8x8 grid, agent 1 learning, no pieces.
    fn new() -> Self {
        Self::with_config(WorldConfig {
            grid_size: 8,
            n_agents: 3,
            n_pieces: 3,
            n_colors: 3,
            n_letters: 2,
            speech_len: 4,
            ..WorldConfig::default()
        })
    }

    fn with_config(config: WorldConfig) -> Self {
        let scripts: Vec<Script> = (0..config.n_agents).map(|_| Script::default()).collect();
        let handles = scripts.clone();
        let mut world = World::with_learning_agent(config, Some(42), AgentId(1), move |id| {
            Box::new(handles[id.index()].clone()) as Box<dyn Policy>
        })
        .unwrap();
        world.reset().unwrap();
        world.pieces_mut().clear();
        Self { world, scripts }
    }

    fn place(&mut self, id: u16, x: i32, y: i32, color: u8, desired: (u8, u8)) {
        let desired = PieceSpec {
            color: desired.0,
            letter: desired.1,
        };
        self.world.agents_mut()[AgentId(id).index()].reset(Position::new(x, y), color, desired);
    }

    /// Put a new piece in an agent's hand.
    fn give(&mut self, id: u16, color: u8, letter: u8) -> PieceId {
        let index = AgentId(id).index();
        let position = self.world.agents()[index].position;
        let piece = self.world.pieces_mut().spawn(position, color, letter);
        self.world.agents_mut()[index].piece_in_hand = Some(piece);
        piece
    }

    fn script(&self, id: u16, action: Action) {
        self.scripts[AgentId(id).index()].push(action);
    }

    fn step(&mut self, action: Action) -> StepResult {
        let result = self.world.step(action).unwrap();
        assert_eq!(self.world.check_invariants(), Ok(()));
        result
    }

    fn agent(&self, id: u16) -> &crate::state::Agent {
        self.world.agent(AgentId(id)).unwrap()
    }
}

fn speech(first: f32) -> Speech {
    Speech::from_vec(vec![first, 0.0, 0.0, 0.0])
}

#[test]
fn test_reset_layout() {
    let config = WorldConfig::default();
    let mut world = World::new(config.clone(), Some(5), |_| {
        Box::new(|_: &Observation| Action::Wait) as Box<dyn Policy>
    })
    .unwrap();
    world.reset().unwrap();

    let mut per_color = vec![0; config.n_colors + 1];
    for agent in world.agents() {
        per_color[agent.color as usize] += 1;
    }
    assert_eq!(per_color[1..], [3, 3, 3]);

    let pieces: Vec<_> = world.pieces().iter().collect();
    assert_eq!(pieces.len(), config.n_pieces);
    for (agent, piece) in world.agents().iter().zip(&pieces) {
        assert_eq!(agent.desired, piece.spec());
        assert_ne!(agent.desired.color, agent.color);
        assert!(!agent.is_holding());
        assert!(agent.listen_history.iter().all(Speech::is_silent));
    }

    let mut agent_cells: Vec<_> = world.agents().iter().map(|a| a.position).collect();
    agent_cells.sort_by_key(|p| (p.x, p.y));
    agent_cells.dedup();
    assert_eq!(agent_cells.len(), config.n_agents);

    let mut piece_cells = world.pieces().positions();
    piece_cells.sort_by_key(|p| (p.x, p.y));
    piece_cells.dedup();
    assert_eq!(piece_cells.len(), config.n_pieces);
}

#[test]
fn test_same_seed_same_episode() {
    let config = WorldConfig::default();
    let build = || {
        let trader_config = config.clone();
        let mut world = World::new(config.clone(), Some(17), move |id| {
            Box::new(TraderPolicy::new(&trader_config, id.0 as u64)) as Box<dyn Policy>
        })
        .unwrap();
        world.reset().unwrap();
        world
    };

    let mut a = build();
    let mut b = build();
    assert_eq!(a.learning_agent(), b.learning_agent());
    assert_eq!(a.snapshot(), b.snapshot());

    for _ in 0..50 {
        let ra = a.step(Action::Wait).unwrap();
        let rb = b.step(Action::Wait).unwrap();
        assert_eq!(ra.reward, rb.reward);
    }
    assert_eq!(a.snapshot(), b.snapshot());

    a.reseed(3);
    b.reseed(3);
    a.reset().unwrap();
    b.reset().unwrap();
    assert_eq!(a.snapshot(), b.snapshot());
}

#[test]
fn test_long_run_keeps_invariants() {
    let config = WorldConfig::default();
    let trader_config = config.clone();
    let mut world = World::new(config.clone(), Some(7), move |id| {
        Box::new(TraderPolicy::new(&trader_config, 100 + id.0 as u64)) as Box<dyn Policy>
    })
    .unwrap();
    let mut learner = RandomPolicy::new(&config, 1);

    for _ in 0..3 {
        let mut observation = world.reset().unwrap();
        let mut previous_pieces = world.pieces().len();
        loop {
            let result = world.step(learner.choose_action(&observation)).unwrap();
            assert_eq!(world.check_invariants(), Ok(()));

            let pieces = world.pieces().len();
            assert!(pieces <= previous_pieces);
            assert_eq!(pieces, config.n_pieces - world.stats().pieces_found);
            previous_pieces = pieces;

            let mut cells: Vec<_> = world.agents().iter().map(|a| a.position).collect();
            cells.sort_by_key(|p| (p.x, p.y));
            cells.dedup();
            assert_eq!(cells.len(), config.n_agents);

            assert_eq!(result.observation.flatten().len(), Observation::flat_len(&config));
            observation = result.observation;
            if result.terminated {
                break;
            }
        }
        assert_eq!(world.step_count(), config.max_steps);
    }
}

#[test]
fn test_terminates_exactly_at_max_steps() {
    let mut world = World::new(WorldConfig::default(), Some(3), |_| {
        Box::new(|_: &Observation| Action::Wait) as Box<dyn Policy>
    })
    .unwrap();
    world.reset().unwrap();

    for step in 1..=256 {
        let result = world.step(Action::Wait).unwrap();
        assert_eq!(result.terminated, step == 256, "step {}", step);
        assert!(!result.truncated);
        assert_eq!(result.info.steps, step);
    }

    let before = world.snapshot();
    let result = world.step(Action::Move { dx: 1, dy: 0 }).unwrap();
    assert!(result.terminated);
    assert_eq!(result.reward, 0.0);
    assert_eq!(world.step_count(), 256);
    assert_eq!(world.snapshot(), before);

    // A fresh episode starts counting again
    world.reset().unwrap();
    assert!(!world.step(Action::Wait).unwrap().terminated);
}

#[test]
fn test_step_before_reset() {
    let mut world = World::new(WorldConfig::default(), Some(1), |_| {
        Box::new(|_: &Observation| Action::Wait) as Box<dyn Policy>
    })
    .unwrap();
    assert!(matches!(world.step(Action::Wait), Err(SimError::NotRunning)));
}

#[test]
fn test_malformed_action_rejected_before_mutation() {
    let mut h = Harness::new();
    h.place(1, 2, 2, 1, (2, 1));
    h.place(2, 4, 4, 2, (1, 1));
    h.place(3, 6, 6, 3, (1, 2));
    h.script(2, Action::Move { dx: 1, dy: 0 });

    assert_eq!(
        h.world.step(Action::Move { dx: 2, dy: 0 }).unwrap_err(),
        SimError::InvalidDirection { dx: 2, dy: 0 }
    );
    assert_eq!(
        h.world
            .step(Action::Offer {
                target: AgentId(4)
            })
            .unwrap_err(),
        SimError::UnknownAgent {
            index: 3,
            n_agents: 3
        }
    );
    assert_eq!(
        h.world
            .step(Action::Speak {
                speech: Speech::silent(3)
            })
            .unwrap_err(),
        SimError::SpeechLength {
            expected: 4,
            actual: 3
        }
    );
    assert_eq!(h.world.step_count(), 0);
    assert_eq!(h.agent(2).position, Position::new(4, 4));
}

#[test]
fn test_raw_actions() {
    let mut h = Harness::new();
    h.place(1, 2, 2, 1, (2, 1));
    h.place(2, 4, 4, 2, (1, 1));
    h.place(3, 6, 6, 3, (1, 2));

    let raw = |action, dx, dy, agent| RawAction {
        action,
        dx,
        dy,
        agent,
        speech: vec![0.0; 4],
    };

    let result = h.world.step_raw(raw(0, 2, 1, 0)).unwrap();
    assert_eq!(result.reward, 0.0);
    assert_eq!(h.agent(1).position, Position::new(3, 2));

    h.world.step_raw(raw(7, 0, 0, 0)).unwrap();
    assert_eq!(h.world.step_count(), 2);

    assert_eq!(
        h.world.step_raw(raw(2, 1, 1, 3)).unwrap_err(),
        SimError::UnknownAgent {
            index: 3,
            n_agents: 3
        }
    );
    assert_eq!(
        h.world.step_raw(raw(8, 1, 1, 0)).unwrap_err(),
        SimError::InvalidActionKind(8)
    );
}

#[test]
fn test_movement_penalties() {
    let mut h = Harness::new();
    h.place(1, 0, 0, 1, (2, 1));
    h.place(2, 2, 0, 2, (1, 1));
    h.place(3, 6, 6, 3, (1, 2));

    // Off the grid
    assert_eq!(h.step(Action::Move { dx: -1, dy: 0 }).reward, -1.0);
    assert_eq!(h.agent(1).position, Position::new(0, 0));

    assert_eq!(h.step(Action::Move { dx: 1, dy: 0 }).reward, 0.0);
    assert_eq!(h.agent(1).position, Position::new(1, 0));

    // Into another agent
    assert_eq!(h.step(Action::Move { dx: 1, dy: 0 }).reward, -1.0);
    assert_eq!(h.agent(1).position, Position::new(1, 0));

    // Standing still collides with itself
    assert_eq!(h.step(Action::Move { dx: 0, dy: 0 }).reward, -1.0);

    assert_eq!(h.world.stats().learning_agent_invalid_actions, 3);
}

#[test]
fn test_teammates_never_penalized() {
    let mut h = Harness::new();
    h.place(1, 4, 4, 1, (2, 1));
    h.place(2, 0, 0, 2, (1, 1));
    h.place(3, 6, 6, 3, (1, 2));
    h.script(2, Action::Move { dx: -1, dy: -1 });
    h.script(3, Action::Drop);

    let result = h.step(Action::Wait);
    assert_eq!(result.reward, 0.0);
    assert_eq!(result.info.collective_reward, 0.0);
    assert_eq!(h.world.stats().invalid_actions, 2);
    assert_eq!(h.world.stats().learning_agent_invalid_actions, 0);
}

#[test]
fn test_moves_resolve_in_agent_order() {
    let mut h = Harness::new();
    h.place(1, 2, 2, 1, (2, 1));
    h.place(2, 4, 2, 2, (1, 1));
    h.place(3, 6, 6, 3, (1, 2));
    h.script(2, Action::Move { dx: -1, dy: 0 });

    assert_eq!(h.step(Action::Move { dx: 1, dy: 0 }).reward, 0.0);
    assert_eq!(h.agent(1).position, Position::new(3, 2));
    assert_eq!(h.agent(2).position, Position::new(4, 2));
}

#[test]
fn test_held_piece_moves_with_agent() {
    let mut h = Harness::new();
    h.place(1, 2, 2, 1, (2, 1));
    h.place(2, 5, 5, 2, (1, 1));
    h.place(3, 6, 6, 3, (1, 2));
    let piece = h.give(1, 1, 1);

    h.step(Action::Move { dx: 1, dy: 1 });
    assert_eq!(
        h.world.pieces().get(piece).unwrap().position,
        Position::new(3, 3)
    );
}

#[test]
fn test_pick_up() {
    let mut h = Harness::new();
    h.place(1, 2, 2, 1, (2, 1));
    h.place(2, 5, 5, 2, (1, 1));
    h.place(3, 6, 6, 3, (1, 2));
    h.world.pieces_mut().spawn(Position::new(2, 2), 2, 1);
    let own = h.world.pieces_mut().spawn(Position::new(3, 2), 1, 2);

    // Wrong color underfoot
    assert_eq!(h.step(Action::PickUp).reward, -1.0);
    assert!(!h.agent(1).is_holding());

    h.step(Action::Move { dx: 1, dy: 0 });
    assert_eq!(h.step(Action::PickUp).reward, 0.0);
    assert_eq!(h.agent(1).piece_in_hand, Some(own));

    // Already holding: nothing happens
    assert_eq!(h.step(Action::PickUp).reward, 0.0);
    assert_eq!(h.agent(1).piece_in_hand, Some(own));

    // Nothing underfoot
    h.step(Action::Move { dx: 0, dy: 1 });
    h.step(Action::Drop);
    assert_eq!(h.step(Action::PickUp).reward, 0.0);
}

#[test]
fn test_offer_then_stop_offering() {
    let mut h = Harness::new();
    h.place(1, 2, 2, 1, (2, 1));
    h.place(2, 3, 2, 2, (1, 1));
    h.place(3, 6, 6, 3, (1, 2));
    let piece = h.give(1, 1, 2);

    let result = h.step(Action::Offer {
        target: AgentId(2),
    });
    assert_eq!(result.reward, 1.0);
    assert_eq!(
        h.agent(2).incoming_offer,
        Some(IncomingOffer {
            from: AgentId(1),
            piece
        })
    );
    assert_eq!(h.agent(1).offering_to, Some(AgentId(2)));
    assert_eq!(h.agent(1).piece_in_hand, Some(piece));

    // The receiver sees the offer
    let seen = h.world.observe(AgentId(2)).unwrap();
    assert!(seen.offer.offered_letter > 0.0);
    assert!((seen.offer.offering_agent - 1.0 / 3.0).abs() < 1e-6);

    let result = h.step(Action::StopOffering {
        target: AgentId(2),
    });
    assert_eq!(result.reward, 0.0);
    assert!(h.agent(2).incoming_offer.is_none());
    assert!(h.agent(1).offering_to.is_none());
    assert_eq!(h.agent(1).piece_in_hand, Some(piece));

    // Nothing left to withdraw
    let result = h.step(Action::StopOffering {
        target: AgentId(2),
    });
    assert_eq!(result.reward, -1.0);
}

#[test]
fn test_offer_failures() {
    let mut h = Harness::new();
    h.place(1, 2, 2, 1, (2, 1));
    h.place(2, 3, 3, 2, (1, 1));
    h.place(3, 2, 3, 3, (1, 2));
    h.give(2, 2, 1);

    // Empty hand: silent no-op
    assert_eq!(h.step(Action::Offer { target: AgentId(3) }).reward, 0.0);

    h.give(1, 1, 2);
    // Offering to oneself: silent no-op
    assert_eq!(h.step(Action::Offer { target: AgentId(1) }).reward, 0.0);

    h.script(2, Action::Offer { target: AgentId(3) });
    h.step(Action::Wait);
    assert_eq!(h.agent(3).incoming_offer.map(|o| o.from), Some(AgentId(2)));

    // Target already has an offer
    assert_eq!(h.step(Action::Offer { target: AgentId(3) }).reward, -1.0);
    assert_eq!(h.agent(3).incoming_offer.map(|o| o.from), Some(AgentId(2)));
    assert!(h.agent(1).offering_to.is_none());
}

#[test]
fn test_offer_to_busy_target_out_of_range_fails_once() {
    let mut h = Harness::new();
    h.place(1, 0, 0, 1, (2, 1));
    h.place(2, 6, 5, 2, (1, 1));
    h.place(3, 6, 6, 3, (1, 2));
    h.give(1, 1, 2);
    h.give(2, 2, 1);
    h.script(2, Action::Offer { target: AgentId(3) });
    h.step(Action::Wait);
    assert_eq!(h.agent(3).incoming_offer.map(|o| o.from), Some(AgentId(2)));

    // Busy and out of vision: one penalty, not two
    let result = h.step(Action::Offer { target: AgentId(3) });
    assert_eq!(result.reward, -1.0);
    assert_eq!(h.world.stats().learning_agent_invalid_actions, 1);
    assert_eq!(h.agent(3).incoming_offer.map(|o| o.from), Some(AgentId(2)));
    assert!(h.agent(1).offering_to.is_none());
}

#[test]
fn test_one_offer_at_a_time() {
    let mut h = Harness::new();
    h.place(1, 2, 2, 1, (2, 1));
    h.place(2, 3, 2, 2, (1, 1));
    h.place(3, 2, 3, 3, (1, 2));
    h.give(1, 1, 2);

    assert_eq!(h.step(Action::Offer { target: AgentId(2) }).reward, 1.0);
    assert_eq!(h.step(Action::Offer { target: AgentId(3) }).reward, -1.0);
    assert!(h.agent(3).incoming_offer.is_none());
    assert_eq!(h.agent(1).offering_to, Some(AgentId(2)));

    // Withdrawing from the wrong agent fails
    assert_eq!(
        h.step(Action::StopOffering {
            target: AgentId(3)
        })
        .reward,
        -1.0
    );
}

#[test]
fn test_offer_out_of_vision_fails() {
    let mut h = Harness::new();
    h.place(1, 2, 2, 1, (2, 1));
    h.place(2, 5, 2, 2, (1, 1));
    h.place(3, 6, 6, 3, (1, 2));
    h.give(1, 1, 2);

    assert_eq!(h.step(Action::Offer { target: AgentId(2) }).reward, -1.0);
    assert!(h.agent(2).incoming_offer.is_none());
}

#[test]
fn test_first_offer_in_tick_wins() {
    let mut h = Harness::new();
    h.place(1, 2, 2, 1, (2, 1));
    h.place(2, 3, 3, 2, (1, 1));
    h.place(3, 2, 3, 3, (1, 2));
    h.give(1, 1, 2);
    h.give(2, 2, 2);
    h.script(2, Action::Offer { target: AgentId(3) });

    assert_eq!(h.step(Action::Offer { target: AgentId(3) }).reward, 1.0);
    assert_eq!(h.agent(3).incoming_offer.map(|o| o.from), Some(AgentId(1)));
    assert!(h.agent(2).offering_to.is_none());
}

#[test]
fn test_found_piece_leaves_world() {
    let mut h = Harness::new();
    h.place(1, 2, 2, 1, (2, 1));
    h.place(2, 3, 2, 2, (1, 1));
    h.place(3, 6, 6, 3, (1, 2));
    let piece = h.give(2, 2, 1);
    h.world.pieces_mut().spawn(Position::new(7, 7), 3, 2);
    h.script(2, Action::Offer { target: AgentId(1) });

    let result = h.step(Action::Wait);
    assert_eq!(result.reward, 0.0);
    assert_eq!(result.info.collective_reward, 0.0);
    assert!(h.agent(1).incoming_offer.is_some());

    let result = h.step(Action::Accept { target: AgentId(2) });
    assert_eq!(result.reward, 3.0 + 20.0);
    assert_eq!(result.info.pieces_found, 1);
    assert_eq!(result.info.pieces_remaining, 1);
    assert!(!h.world.pieces().contains(piece));
    assert!(!h.agent(1).is_holding());
    assert!(!h.agent(2).is_holding());
    assert!(h.agent(1).incoming_offer.is_none());
    assert!(h.agent(2).offering_to.is_none());
    assert_eq!(h.world.stats().pieces_found, 1);
}

#[test]
fn test_teammate_finding_piece_feeds_collective_reward() {
    let mut h = Harness::new();
    h.place(1, 2, 2, 1, (2, 1));
    h.place(2, 3, 2, 2, (1, 2));
    h.place(3, 6, 6, 3, (1, 2));
    h.give(1, 1, 2);

    assert_eq!(h.step(Action::Offer { target: AgentId(2) }).reward, 1.0);
    h.script(2, Action::Accept { target: AgentId(1) });
    let result = h.step(Action::Wait);

    assert_eq!(result.reward, 0.0);
    assert_eq!(result.info.collective_reward, 0.5);
    assert_eq!(h.world.collective_reward(), 0.5);
    assert!(!h.agent(1).is_holding());
    assert!(h.agent(1).offering_to.is_none());
}

#[test]
fn test_mismatched_piece_is_traded() {
    let mut h = Harness::new();
    h.place(1, 2, 2, 1, (2, 1));
    h.place(2, 3, 2, 2, (1, 1));
    h.place(3, 6, 6, 3, (1, 2));
    let piece = h.give(2, 2, 2);
    h.script(2, Action::Offer { target: AgentId(1) });
    h.step(Action::Wait);

    let result = h.step(Action::Accept { target: AgentId(2) });
    assert_eq!(result.reward, 3.0);
    assert_eq!(h.agent(1).piece_in_hand, Some(piece));
    assert!(!h.agent(2).is_holding());
    assert_eq!(
        h.world.pieces().get(piece).unwrap().position,
        Position::new(2, 2)
    );
    assert_eq!(h.world.stats().trades, 1);
}

#[test]
fn test_accept_while_holding_drops_first() {
    let mut h = Harness::new();
    h.place(1, 2, 2, 1, (2, 1));
    h.place(2, 3, 2, 2, (1, 1));
    h.place(3, 6, 6, 3, (1, 2));
    let mine = h.give(1, 1, 2);
    let offered = h.give(2, 2, 2);
    h.script(2, Action::Offer { target: AgentId(1) });
    h.step(Action::Wait);

    h.step(Action::Accept { target: AgentId(2) });
    assert_eq!(h.agent(1).piece_in_hand, Some(offered));

    let dropped = h.world.pieces().get(mine).unwrap().position;
    assert!(h.world.agents().iter().all(|a| a.position != dropped));
    assert_eq!(
        h.world
            .pieces()
            .iter()
            .filter(|p| p.position == dropped)
            .count(),
        1
    );
    // Setting a piece down to accept is not a Drop action
    assert_eq!(h.world.stats().drops, 0);
}

#[test]
fn test_stale_accept_is_ignored() {
    let mut h = Harness::new();
    h.place(1, 2, 2, 1, (2, 1));
    h.place(2, 3, 2, 2, (1, 1));
    h.place(3, 2, 3, 3, (1, 2));
    let piece = h.give(2, 2, 1);

    // No offer at all
    assert_eq!(h.step(Action::Accept { target: AgentId(2) }).reward, 0.0);

    h.script(2, Action::Offer { target: AgentId(1) });
    h.step(Action::Wait);

    // Naming an agent that does not hold the offered piece
    assert_eq!(h.step(Action::Accept { target: AgentId(3) }).reward, 0.0);
    assert_eq!(h.agent(2).piece_in_hand, Some(piece));
    assert!(h.agent(1).incoming_offer.is_some());
    assert!(h.world.pieces().contains(piece));
}

#[test]
fn test_accept_resolves_before_drop() {
    let mut h = Harness::new();
    h.place(1, 2, 2, 1, (2, 1));
    h.place(2, 3, 2, 2, (1, 1));
    h.place(3, 6, 6, 3, (1, 2));
    let piece = h.give(2, 2, 2);
    h.script(2, Action::Offer { target: AgentId(1) });
    h.step(Action::Wait);

    h.script(2, Action::Drop);
    assert_eq!(h.step(Action::Accept { target: AgentId(2) }).reward, 3.0);
    assert_eq!(h.agent(1).piece_in_hand, Some(piece));
}

#[test]
fn test_drop_releases_offer() {
    let mut h = Harness::new();
    h.place(1, 2, 2, 1, (2, 1));
    h.place(2, 3, 2, 2, (1, 1));
    h.place(3, 6, 6, 3, (1, 2));
    let piece = h.give(1, 1, 2);
    h.step(Action::Offer { target: AgentId(2) });

    assert_eq!(h.step(Action::Drop).reward, 0.0);
    assert!(!h.agent(1).is_holding());
    assert!(h.agent(1).offering_to.is_none());
    assert!(h.agent(2).incoming_offer.is_none());

    let dropped = h.world.pieces().get(piece).unwrap().position;
    assert!(h.world.agents().iter().all(|a| a.position != dropped));
    assert_eq!(h.world.stats().drops, 1);

    // Empty hand
    assert_eq!(h.step(Action::Drop).reward, -1.0);
    assert_eq!(h.world.stats().drops, 1);
}

#[test]
fn test_drop_on_full_grid() {
    let mut h = Harness::with_config(WorldConfig {
        grid_size: 3,
        n_agents: 2,
        n_pieces: 2,
        n_colors: 2,
        n_letters: 2,
        speech_len: 4,
        ..WorldConfig::default()
    });
    h.place(1, 0, 0, 1, (2, 1));
    h.place(2, 1, 0, 2, (1, 1));
    h.give(1, 1, 1);
    for y in 0..3 {
        for x in 0..3 {
            if y > 0 || x == 2 {
                h.world.pieces_mut().spawn(Position::new(x, y), 2, 2);
            }
        }
    }

    assert_eq!(
        h.world.step(Action::Drop).unwrap_err(),
        SimError::NoFreeCell {
            grid_size: 3,
            attempts: 9
        }
    );
}

#[test]
fn test_failed_tick_ends_episode() {
    let mut h = Harness::with_config(WorldConfig {
        grid_size: 3,
        n_agents: 2,
        n_pieces: 2,
        n_colors: 2,
        n_letters: 2,
        speech_len: 4,
        ..WorldConfig::default()
    });
    h.place(1, 0, 0, 1, (2, 1));
    h.place(2, 1, 0, 2, (1, 1));
    h.give(1, 1, 1);
    for y in 0..3 {
        for x in 0..3 {
            if y > 0 || x == 2 {
                h.world.pieces_mut().spawn(Position::new(x, y), 2, 2);
            }
        }
    }
    // Resolves before the failing drop
    h.script(2, Action::Move { dx: 0, dy: 1 });

    assert!(matches!(
        h.world.step(Action::Drop),
        Err(SimError::NoFreeCell { .. })
    ));
    assert_eq!(h.world.phase(), Phase::Idle);
    assert_eq!(h.world.step_count(), 0);
    assert_eq!(h.world.step(Action::Wait).unwrap_err(), SimError::NotRunning);

    h.world.reset().unwrap();
    assert_eq!(h.world.phase(), Phase::Running);
    assert!(h.world.step(Action::Wait).is_ok());
}

#[test]
fn test_listen_history_keeps_last_five() {
    let mut h = Harness::new();
    h.place(1, 2, 2, 1, (2, 1));
    h.place(2, 3, 2, 2, (1, 1));
    h.place(3, 7, 7, 3, (1, 2));
    for tick in 1..=7 {
        h.script(2, Action::Speak {
            speech: speech(tick as f32),
        });
    }

    let mut last = None;
    for _ in 0..7 {
        last = Some(h.step(Action::Wait));
    }
    let history = last.unwrap().observation.listen_history;
    let heard: Vec<f32> = history.iter().map(|s| s.as_slice()[0]).collect();
    assert_eq!(heard, vec![3.0, 4.0, 5.0, 6.0, 7.0]);

    // Out of range
    assert!(h.agent(3).listen_history.iter().all(Speech::is_silent));
    // Speech is cleared at the start of every tick
    h.step(Action::Wait);
    assert!(h.agent(2).speech.is_silent());
}

#[test]
fn test_nearest_speaker_is_heard() {
    let mut h = Harness::new();
    h.place(1, 2, 2, 1, (2, 1));
    h.place(2, 3, 2, 2, (1, 1));
    h.place(3, 5, 2, 3, (1, 2));
    h.script(2, Action::Speak { speech: speech(2.0) });
    h.script(3, Action::Speak { speech: speech(3.0) });

    h.step(Action::Wait);
    let newest = |id: u16| h.agent(id).listen_history.iter().last().unwrap().as_slice()[0];
    assert_eq!(newest(1), 2.0);
    assert_eq!(newest(2), 3.0);
    assert_eq!(newest(3), 2.0);
}

#[test]
fn test_equal_distance_prefers_earlier_agent() {
    let mut h = Harness::new();
    h.place(1, 2, 2, 1, (2, 1));
    h.place(2, 3, 2, 2, (1, 1));
    h.place(3, 1, 2, 3, (1, 2));
    h.script(2, Action::Speak { speech: speech(2.0) });
    h.script(3, Action::Speak { speech: speech(3.0) });

    let result = h.step(Action::Wait);
    let newest = result.observation.listen_history.last().unwrap().as_slice()[0];
    assert_eq!(newest, 2.0);
}

#[test]
fn test_swapping_learning_agent() {
    let mut h = Harness::new();
    h.place(1, 2, 2, 1, (2, 1));
    h.place(2, 0, 0, 2, (1, 1));
    h.place(3, 6, 6, 3, (1, 2));

    h.world
        .set_learning_agent(AgentId(2), |_| {
            Box::new(|_: &Observation| Action::Move { dx: -1, dy: 0 }) as Box<dyn Policy>
        })
        .unwrap();
    assert!(h.agent(2).is_learning_agent());
    assert!(!h.agent(1).is_learning_agent());

    let result = h.step(Action::Move { dx: -1, dy: 0 });
    assert_eq!(result.reward, -1.0);
    assert_eq!(h.agent(1).position, Position::new(1, 2));

    assert!(
        h.world
            .set_learning_agent(AgentId(4), |_| {
                Box::new(|_: &Observation| Action::Wait) as Box<dyn Policy>
            })
            .is_err()
    );
}
