use std::error::Error;

use dotenv::dotenv;
use time::{OffsetDateTime, format_description};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use tradegrid::config::{WorldConfig, env_opt, env_or};
use tradegrid::infra::{DefaultObserver, WorldObserver};
use tradegrid::metrics::RunMetrics;
use tradegrid::policy::{Policy, RandomPolicy, TraderPolicy};
use tradegrid::sim::World;
use tradegrid::state::AgentId;

const METRICS_WINDOW: usize = 100;
const REPORT_EVERY: usize = 10;

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tradegrid=info,warn"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(true)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("a global tracing subscriber was already installed");
    }
}

fn run_id() -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    format_description::parse_borrowed::<1>("[year][month][day]-[hour][minute][second]")
        .ok()
        .and_then(|format| now.format(&format).ok())
        .unwrap_or_else(|| now.unix_timestamp().to_string())
}

/// Scripted teammates, each with its own seed derived from the run seed.
fn trader_factory(config: &WorldConfig, seed: u64) -> impl FnMut(AgentId) -> Box<dyn Policy> {
    let config = config.clone();
    move |id| -> Box<dyn Policy> {
        Box::new(TraderPolicy::new(&config, seed.wrapping_add(id.0 as u64)))
    }
}

fn run_episodes(
    world: &mut World,
    learner: &mut dyn Policy,
    episodes: usize,
    seed: Option<u64>,
) -> Result<RunMetrics, Box<dyn Error>> {
    let mut metrics = RunMetrics::new(METRICS_WINDOW);

    for episode in 0..episodes {
        if let Some(seed) = seed {
            world.reseed(seed.wrapping_add(episode as u64));
        }
        let mut observation = world.reset()?;
        loop {
            let action = learner.choose_action(&observation);
            let result = world.step(action)?;
            observation = result.observation;
            if result.terminated || result.truncated {
                break;
            }
        }

        metrics.record_episode(&world.summary());
        if metrics.episodes % REPORT_EVERY == 0 {
            metrics.log_to_console();
        }
    }
    Ok(metrics)
}

fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();
    init_logging();

    let config = WorldConfig::from_env()?;
    let episodes: usize = env_or("TRADEGRID_EPISODES", 1)?;
    let seed: Option<u64> = env_opt("TRADEGRID_SEED")?;
    let enable_viz: bool = env_or("TRADEGRID_VISUALIZER", false)?;

    let run = run_id();
    tracing::info!(
        "Run {}: {} episodes, grid {}x{}, {} agents, seed {:?}",
        run,
        episodes,
        config.grid_size,
        config.grid_size,
        config.n_agents,
        seed
    );
    tracing::info!("Visualizer enabled: {}", enable_viz);

    let policy_seed = seed.unwrap_or_else(rand::random);
    let mut world = World::new(config.clone(), seed, trader_factory(&config, policy_seed))?;
    let mut learner = RandomPolicy::new(&config, policy_seed.wrapping_mul(31));
    tracing::info!(
        "Learning agent {} driven by {} policy",
        world.learning_agent().0,
        learner.name()
    );

    if enable_viz {
        return run_with_visualizer(world, learner, episodes, seed);
    }

    world.set_observer(Box::new(DefaultObserver));
    let metrics = run_episodes(&mut world, &mut learner, episodes, seed)?;
    metrics.log_to_console();
    Ok(())
}

#[cfg(feature = "visualizer")]
fn run_with_visualizer(
    mut world: World,
    mut learner: RandomPolicy,
    episodes: usize,
    seed: Option<u64>,
) -> Result<(), Box<dyn Error>> {
    use std::sync::{Arc, Mutex, mpsc};
    use tradegrid::infra::{CompositeObserver, VisualizingObserver};
    use tradegrid::ui::run_visualizer;

    let shared_state = Arc::new(Mutex::new(None));
    let (log_tx, log_rx) = mpsc::channel();
    let (ready_tx, ready_rx) = mpsc::channel();

    let observers: Vec<Box<dyn WorldObserver>> = vec![
        Box::new(DefaultObserver),
        Box::new(VisualizingObserver::new(Arc::clone(&shared_state), log_tx)),
    ];
    world.set_observer(Box::new(CompositeObserver::new(observers)));

    std::thread::spawn(move || {
        if ready_rx.recv().is_err() {
            return;
        }
        match run_episodes(&mut world, &mut learner, episodes, seed) {
            Ok(metrics) => metrics.log_to_console(),
            Err(e) => tracing::error!("Simulation stopped: {}", e),
        }
    });

    run_visualizer(shared_state, ready_tx, log_rx);
    Ok(())
}

#[cfg(not(feature = "visualizer"))]
fn run_with_visualizer(
    mut world: World,
    mut learner: RandomPolicy,
    episodes: usize,
    seed: Option<u64>,
) -> Result<(), Box<dyn Error>> {
    tracing::warn!("Built without the `visualizer` feature, logging to console instead");
    let observer: Box<dyn WorldObserver> = Box::new(DefaultObserver);
    world.set_observer(observer);
    let metrics = run_episodes(&mut world, &mut learner, episodes, seed)?;
    metrics.log_to_console();
    Ok(())
}
