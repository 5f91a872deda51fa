/// Entry point and frame loop.

mod config;
mod domain;
mod sim;
mod ui;

use std::io;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crossterm::event::KeyCode;

use config::GameConfig;
use domain::entity::Dir;
use sim::event::GameEvent;
use sim::step;
use sim::world::World;
use ui::input::InputState;
use ui::renderer::Renderer;
use ui::sound::SoundEngine;

const FRAME_SLEEP: Duration = Duration::from_millis(5);

/// Longest simulation step fed to the core; a stalled terminal must not
/// turn into a single huge leap.
const MAX_TICK: Duration = Duration::from_millis(50);

fn main() {
    let cfg = GameConfig::load();

    let seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos() ^ d.as_secs() as u32)
        .unwrap_or(1);
    let mut world = World::new(seed);
    world.start(cfg.cranes, cfg.layout);

    let mut renderer = Renderer::new();
    if let Err(e) = renderer.init() {
        eprintln!("Terminal init failed: {e}");
        return;
    }

    let sound = if cfg.sound { SoundEngine::new() } else { None };

    let result = game_loop(&mut world, &mut renderer, sound.as_ref(), &cfg);

    if let Err(e) = renderer.cleanup() {
        eprintln!("Terminal cleanup failed: {e}");
    }
    if let Err(e) = result {
        eprintln!("Game error: {e}");
    }

    println!("Final score: {}", world.score());
}

fn game_loop(
    world: &mut World,
    renderer: &mut Renderer,
    sound: Option<&SoundEngine>,
    cfg: &GameConfig,
) -> io::Result<()> {
    let mut input = InputState::new();
    let mut high_score = config::load_high_score();
    let mut last_frame = Instant::now();

    loop {
        input.drain();

        if input.quit_requested() || input.any_pressed(KEYS_QUIT) {
            break;
        }
        handle_meta(world, renderer, &input, cfg);

        // Held movement keys become the standing request; releasing them
        // clears it. The core consumes the request when legal.
        if world.player.alive() {
            match detect_direction(&input) {
                Some(direction) => world.request_move(direction),
                None => world.request_stop(),
            }
        }

        let elapsed = last_frame.elapsed().min(MAX_TICK);
        last_frame = Instant::now();
        let events = step::step(world, elapsed);

        for event in &events {
            if let GameEvent::GameOver = event {
                if world.score() > high_score {
                    high_score = world.score();
                    config::save_high_score(high_score);
                }
            }
        }
        play_events(sound, &events);

        renderer.render(world, high_score)?;
        std::thread::sleep(FRAME_SLEEP);
    }

    Ok(())
}

// ── Key bindings ──

const KEYS_LEFT: &[KeyCode] = &[KeyCode::Left, KeyCode::Char('a'), KeyCode::Char('A')];
const KEYS_RIGHT: &[KeyCode] = &[KeyCode::Right, KeyCode::Char('d'), KeyCode::Char('D')];
const KEYS_UP: &[KeyCode] = &[KeyCode::Up, KeyCode::Char('w'), KeyCode::Char('W')];
const KEYS_UP_LEFT: &[KeyCode] = &[KeyCode::Char('q'), KeyCode::Char('Q')];
const KEYS_UP_RIGHT: &[KeyCode] = &[KeyCode::Char('e'), KeyCode::Char('E')];
const KEYS_RESTART: &[KeyCode] = &[KeyCode::Char(' ')];
const KEYS_PAUSE: &[KeyCode] = &[KeyCode::Char('p'), KeyCode::Char('P'), KeyCode::Char('0')];
const KEYS_GOD: &[KeyCode] = &[KeyCode::Char('g'), KeyCode::Char('G')];
const KEYS_DEBUG: &[KeyCode] = &[KeyCode::F(1)];
const KEYS_QUIT: &[KeyCode] = &[KeyCode::Esc];

/// Direction from the held keys. Diagonals come from the dedicated keys
/// or from holding a vertical and a horizontal key together.
fn detect_direction(input: &InputState) -> Option<Dir> {
    let left = input.any_held(KEYS_LEFT);
    let right = input.any_held(KEYS_RIGHT);
    let up = input.any_held(KEYS_UP);

    if input.any_held(KEYS_UP_LEFT) || (up && left) {
        return Some(Dir::UP_LEFT);
    }
    if input.any_held(KEYS_UP_RIGHT) || (up && right) {
        return Some(Dir::UP_RIGHT);
    }
    if up {
        return Some(Dir::UP);
    }
    if left && !right {
        return Some(Dir::LEFT);
    }
    if right && !left {
        return Some(Dir::RIGHT);
    }
    None
}

fn handle_meta(world: &mut World, renderer: &mut Renderer, input: &InputState, cfg: &GameConfig) {
    if !world.player.alive() {
        if input.any_pressed(KEYS_RESTART) {
            world.start(cfg.cranes, cfg.layout);
        }
        return;
    }

    if input.any_pressed(KEYS_PAUSE) {
        world.toggle_pause();
    }
    if input.any_pressed(KEYS_GOD) {
        world.toggle_god_mode();
    }
    if input.any_pressed(KEYS_DEBUG) {
        renderer.debug_overlay = !renderer.debug_overlay;
    }
    // Extra crane on demand, debug aid gated behind god mode.
    if world.god_mode && input.any_pressed(&[KeyCode::Char('c'), KeyCode::Char('C')]) {
        world.add_crane();
    }
}

fn play_events(sound: Option<&SoundEngine>, events: &[GameEvent]) {
    let Some(sfx) = sound else { return };
    for event in events {
        match event {
            GameEvent::PlayerJumped => sfx.play_jump(),
            GameEvent::PlayerPushed => sfx.play_push(),
            GameEvent::PlayerLanded => sfx.play_land(),
            GameEvent::CrateDropped { .. } => sfx.play_drop(),
            GameEvent::CrateSmashed { .. } => sfx.play_smash(),
            GameEvent::RowScored { .. } => sfx.play_score(),
            GameEvent::GameOver => sfx.play_game_over(),
            _ => {}
        }
    }
}
