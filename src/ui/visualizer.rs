use std::collections::VecDeque;
use std::sync::{Mutex, mpsc};

use bevy::camera::visibility::ViewVisibility;
use bevy::prelude::*;

use crate::sim::WorldSnapshot;
use crate::ui::{LogColor, LogMessage, SharedSnapshot, team_rgb};

const TILE_SIZE: f32 = 40.0;
const WINDOW_WIDTH: f32 = 1024.0;
const WINDOW_HEIGHT: f32 = 768.0;
const LOG_LINES: usize = 12;

#[derive(Resource)]
struct SnapshotResource {
    state: SharedSnapshot,
    last_frame: Option<(usize, usize)>,
    camera_initialized: bool,
}

#[derive(Resource)]
struct ReadySignal {
    sender: Option<mpsc::Sender<()>>,
}

#[derive(Resource)]
struct LogResource {
    receiver: Mutex<mpsc::Receiver<LogMessage>>,
    lines: VecDeque<LogMessage>,
}

#[derive(Component)]
struct FrameEntity;

#[derive(Component)]
struct LogPanel;

/// Run the renderer on the current thread until the window closes.
///
/// `ready_tx` fires once the first frame has been set up, so the
/// simulation thread can wait for it before stepping.
pub fn run_visualizer(
    state: SharedSnapshot,
    ready_tx: mpsc::Sender<()>,
    log_rx: mpsc::Receiver<LogMessage>,
) {
    App::new()
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: "Tradegrid".to_string(),
                resolution: (WINDOW_WIDTH as u32, WINDOW_HEIGHT as u32).into(),
                ..default()
            }),
            ..default()
        }))
        .insert_resource(ClearColor(Color::srgb(0.1, 0.1, 0.15)))
        .insert_resource(SnapshotResource {
            state,
            last_frame: None,
            camera_initialized: false,
        })
        .insert_resource(ReadySignal {
            sender: Some(ready_tx),
        })
        .insert_resource(LogResource {
            receiver: Mutex::new(log_rx),
            lines: VecDeque::with_capacity(LOG_LINES),
        })
        .add_systems(Startup, setup)
        .add_systems(Update, (signal_ready, update_frame, update_log))
        .run();
}

fn setup(mut commands: Commands) {
    commands.spawn((
        Camera2d,
        Transform::default(),
        GlobalTransform::default(),
        Visibility::default(),
        InheritedVisibility::default(),
        ViewVisibility::default(),
    ));

    commands.spawn((
        Text::new(""),
        TextFont {
            font_size: 14.0,
            ..default()
        },
        TextColor(Color::WHITE),
        Node {
            position_type: PositionType::Absolute,
            bottom: Val::Px(10.0),
            left: Val::Px(10.0),
            ..default()
        },
        LogPanel,
    ));
}

fn signal_ready(mut ready: ResMut<ReadySignal>) {
    if let Some(sender) = ready.sender.take() {
        let _ = sender.send(());
        tracing::info!("Visualizer ready, starting simulation");
    }
}

fn update_frame(
    mut commands: Commands,
    mut resource: ResMut<SnapshotResource>,
    query: Query<Entity, With<FrameEntity>>,
    mut camera_query: Query<&mut Transform, With<Camera2d>>,
) {
    let snapshot = {
        let Ok(guard) = resource.state.lock() else {
            return;
        };
        let Some(snapshot) = guard.as_ref() else {
            return;
        };
        let frame = (snapshot.episode, snapshot.step);
        if resource.last_frame == Some(frame) && !query.is_empty() {
            return;
        }
        snapshot.clone()
    };
    resource.last_frame = Some((snapshot.episode, snapshot.step));

    for entity in query.iter() {
        commands.entity(entity).despawn();
    }

    if !resource.camera_initialized
        && let Ok(mut camera) = camera_query.single_mut()
    {
        let extent = snapshot.grid_size as f32 * TILE_SIZE;
        camera.translation.x = extent / 2.0;
        camera.translation.y = -extent / 2.0;
        let scale = (WINDOW_WIDTH / extent).min(WINDOW_HEIGHT / extent) * 0.85;
        camera.scale = Vec3::splat(1.0 / scale);
        resource.camera_initialized = true;
    }

    render_snapshot(&mut commands, &snapshot);
}

fn tile_center(x: i32, y: i32) -> (f32, f32) {
    (
        x as f32 * TILE_SIZE + TILE_SIZE / 2.0,
        -(y as f32 * TILE_SIZE + TILE_SIZE / 2.0),
    )
}

fn render_snapshot(commands: &mut Commands, snapshot: &WorldSnapshot) {
    for y in 0..snapshot.grid_size as i32 {
        for x in 0..snapshot.grid_size as i32 {
            let (cx, cy) = tile_center(x, y);
            commands.spawn((
                Sprite {
                    color: Color::srgb(0.2, 0.2, 0.22),
                    custom_size: Some(Vec2::splat(TILE_SIZE - 2.0)),
                    ..default()
                },
                Transform::from_xyz(cx, cy, 0.0),
                FrameEntity,
            ));
        }
    }

    for piece in &snapshot.pieces {
        let (cx, cy) = tile_center(piece.position.x, piece.position.y);
        let (r, g, b) = team_rgb(piece.color);
        commands.spawn((
            Sprite {
                color: Color::srgb(r, g, b),
                custom_size: Some(Vec2::splat(TILE_SIZE * 0.35)),
                ..default()
            },
            Transform::from_xyz(cx, cy, 1.0),
            FrameEntity,
        ));
        commands.spawn((
            Text2d::new(letter_char(piece.letter).to_string()),
            TextFont {
                font_size: 12.0,
                ..default()
            },
            TextColor(Color::BLACK),
            Transform::from_xyz(cx, cy, 1.5),
            FrameEntity,
        ));
    }

    for agent in &snapshot.agents {
        let (cx, cy) = tile_center(agent.position.x, agent.position.y);
        let (r, g, b) = team_rgb(agent.color);
        let outline = if agent.learning {
            Color::WHITE
        } else {
            Color::srgb(0.05, 0.05, 0.05)
        };
        commands.spawn((
            Sprite {
                color: outline,
                custom_size: Some(Vec2::splat(TILE_SIZE * 0.8)),
                ..default()
            },
            Transform::from_xyz(cx, cy, 2.0),
            FrameEntity,
        ));
        commands.spawn((
            Sprite {
                color: Color::srgb(r, g, b),
                custom_size: Some(Vec2::splat(TILE_SIZE * 0.7)),
                ..default()
            },
            Transform::from_xyz(cx, cy, 2.1),
            FrameEntity,
        ));
        let label = match agent.held {
            Some(held) => format!("{}{}", agent.id.0, letter_char(held.letter)),
            None => agent.id.0.to_string(),
        };
        commands.spawn((
            Text2d::new(label),
            TextFont {
                font_size: 14.0,
                ..default()
            },
            TextColor(Color::BLACK),
            Transform::from_xyz(cx, cy, 2.5),
            FrameEntity,
        ));

        // Desired piece, in its color, tucked into the tile corner
        let (r, g, b) = team_rgb(agent.desired.color);
        commands.spawn((
            Text2d::new(letter_char(agent.desired.letter).to_string()),
            TextFont {
                font_size: 10.0,
                ..default()
            },
            TextColor(Color::srgb(r, g, b)),
            Transform::from_xyz(cx + TILE_SIZE * 0.35, cy - TILE_SIZE * 0.35, 2.6),
            FrameEntity,
        ));
    }

    commands.spawn((
        Text::new(format!(
            "Episode: {} | Step: {} | Reward: {:.2} | Collective: {:.2} | Pieces: {}",
            snapshot.episode,
            snapshot.step,
            snapshot.learning_reward,
            snapshot.collective_reward,
            snapshot.pieces.len()
        )),
        TextFont {
            font_size: 18.0,
            ..default()
        },
        TextColor(Color::WHITE),
        Node {
            position_type: PositionType::Absolute,
            top: Val::Px(10.0),
            left: Val::Px(10.0),
            ..default()
        },
        FrameEntity,
    ));
}

fn update_log(mut log: ResMut<LogResource>, mut panel: Query<&mut Text, With<LogPanel>>) {
    let log = &mut *log;
    let incoming: Vec<LogMessage> = match log.receiver.lock() {
        Ok(receiver) => receiver.try_iter().collect(),
        Err(_) => return,
    };
    if incoming.is_empty() {
        return;
    }
    for message in incoming {
        if log.lines.len() >= LOG_LINES {
            log.lines.pop_front();
        }
        log.lines.push_back(message);
    }

    if let Ok(mut text) = panel.single_mut() {
        let body: Vec<String> = log
            .lines
            .iter()
            .map(|line| format!("{} {}", marker(line.color), line.text))
            .collect();
        **text = body.join("\n");
    }
}

fn marker(color: LogColor) -> &'static str {
    match color {
        LogColor::White => "-",
        LogColor::Green => "+",
        LogColor::Yellow => "~",
        LogColor::Red => "!",
    }
}

fn letter_char(letter: u8) -> char {
    (b'a' + letter.saturating_sub(1).min(25)) as char
}
