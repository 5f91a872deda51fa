/// Keyboard state tracker.
///
/// The simulation wants "which direction is being held", but terminals
/// only deliver key-press events (with auto-repeat). A key therefore
/// counts as held for a short window after its last press and expires
/// when the repeats stop. Fresh presses are kept separately for
/// edge-triggered actions (pause, restart, god mode).

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};

/// A key without press/repeat events for this long counts as released.
const HOLD_TIMEOUT: Duration = Duration::from_millis(160);

pub struct InputState {
    /// Last press/repeat instant per key.
    held: HashMap<KeyCode, Instant>,
    /// Keys that went from released to held during the last drain.
    pressed: Vec<KeyCode>,
    quit: bool,
}

impl InputState {
    pub fn new() -> Self {
        InputState {
            held: HashMap::with_capacity(16),
            pressed: Vec::with_capacity(8),
            quit: false,
        }
    }

    /// Pull every pending terminal event. Call once per frame.
    pub fn drain(&mut self) {
        self.pressed.clear();

        while event::poll(Duration::ZERO).unwrap_or(false) {
            let Ok(Event::Key(key)) = event::read() else {
                continue;
            };
            match key.kind {
                KeyEventKind::Release => {
                    self.held.remove(&key.code);
                }
                _ => {
                    if key.modifiers.contains(KeyModifiers::CONTROL)
                        && matches!(key.code, KeyCode::Char('c') | KeyCode::Char('C'))
                    {
                        self.quit = true;
                    }
                    if !self.is_held(key.code) {
                        self.pressed.push(key.code);
                    }
                    self.held.insert(key.code, Instant::now());
                }
            }
        }

        // Terminals without release reporting: expire stale holds.
        let now = Instant::now();
        self.held.retain(|_, t| now.duration_since(*t) < HOLD_TIMEOUT);
    }

    pub fn is_held(&self, code: KeyCode) -> bool {
        self.held
            .get(&code)
            .map(|t| t.elapsed() < HOLD_TIMEOUT)
            .unwrap_or(false)
    }

    pub fn any_held(&self, codes: &[KeyCode]) -> bool {
        codes.iter().any(|&c| self.is_held(c))
    }

    pub fn was_pressed(&self, code: KeyCode) -> bool {
        self.pressed.contains(&code)
    }

    pub fn any_pressed(&self, codes: &[KeyCode]) -> bool {
        codes.iter().any(|&c| self.was_pressed(c))
    }

    /// Ctrl-C seen at any point.
    pub fn quit_requested(&self) -> bool {
        self.quit
    }
}
