/// Entities: Player, Crate and Crane, all built on the shared `Body`.
///
/// Entities never hold references to each other. A crane remembers the
/// crate on its hook by id, index slots hold ids, and `NULL_ID` marks an
/// empty slot. The world owns every entity and resolves ids through its
/// own map.

use super::grid::{Vec2, CELL_SIZE, SPEED};
use super::kinematics::{Body, Progress};

pub type EntityId = u64;

/// Reserved "no entity" id used in index slots and crane hooks.
pub const NULL_ID: EntityId = 0;

/// Hands out process-unique entity ids, starting above `NULL_ID`.
#[derive(Clone, Debug)]
pub struct IdAllocator {
    next: EntityId,
}

impl IdAllocator {
    pub fn new() -> Self {
        IdAllocator { next: NULL_ID + 1 }
    }

    pub fn allocate(&mut self) -> EntityId {
        let id = self.next;
        self.next += 1;
        id
    }
}

// ── Directions ──

/// Movement direction as a bit set of the four cardinal flags.
/// Diagonals are the OR of a vertical and a horizontal flag; Left|Right
/// and Up|Down are contradictory and rejected by `is_valid`.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Dir(u8);

impl Dir {
    pub const NONE: Dir = Dir(0);
    pub const LEFT: Dir = Dir(1);
    pub const RIGHT: Dir = Dir(1 << 1);
    pub const UP: Dir = Dir(1 << 2);
    pub const DOWN: Dir = Dir(1 << 3);

    pub const UP_LEFT: Dir = Dir(Self::UP.0 | Self::LEFT.0);
    pub const UP_RIGHT: Dir = Dir(Self::UP.0 | Self::RIGHT.0);
    pub const DOWN_LEFT: Dir = Dir(Self::DOWN.0 | Self::LEFT.0);
    pub const DOWN_RIGHT: Dir = Dir(Self::DOWN.0 | Self::RIGHT.0);

    pub const fn join(self, other: Dir) -> Dir {
        Dir(self.0 | other.0)
    }

    pub fn has(self, flag: Dir) -> bool {
        self.0 & flag.0 != 0
    }

    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    pub fn is_valid(self) -> bool {
        !(self.has(Dir::LEFT) && self.has(Dir::RIGHT))
            && !(self.has(Dir::UP) && self.has(Dir::DOWN))
    }

    /// Unit signs on each axis: X to the right, Y up.
    pub fn signs(self) -> Vec2 {
        Vec2::new(
            (self.has(Dir::RIGHT) as i8 - self.has(Dir::LEFT) as i8) as f32,
            (self.has(Dir::UP) as i8 - self.has(Dir::DOWN) as i8) as f32,
        )
    }
}

// ── Crate ──

/// Number of cosmetic resting styles a crate can spawn with.
pub const CRATE_STYLES: u8 = 8;

/// Wall-clock length of the destruction countdown, seconds.
/// Fixed span regardless of how the simulation is ticked.
pub const BLOW_DURATION: f32 = 0.3;

#[derive(Clone, Debug)]
pub struct Crate {
    id: EntityId,
    pub body: Body,
    style: u8,
    /// Seconds since `blow` was called; `None` until then.
    blow_elapsed: Option<f32>,
}

impl Crate {
    pub fn new(id: EntityId, style: u8) -> Self {
        Crate {
            id,
            body: Body::default(),
            style: style % CRATE_STYLES,
            blow_elapsed: None,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Cosmetic resting style; carries no rules meaning.
    pub fn style(&self) -> u8 {
        self.style
    }

    /// Advance the countdown and the kinematics.
    pub fn update(&mut self, dt: f32) -> Progress {
        if let Some(elapsed) = &mut self.blow_elapsed {
            *elapsed += dt;
        }
        let progress = self.body.tick(dt);
        if progress == Progress::Finished {
            self.body.finish_move();
        }
        progress
    }

    /// Begin a one-cell shove or an unbounded fall. Horizontal and
    /// vertical courses are independent: shoving a falling crate leaves
    /// its descent untouched.
    pub fn start_move(&mut self, direction: Dir) {
        if direction.has(Dir::LEFT) {
            self.body.set_course_x(-SPEED, -CELL_SIZE);
        } else if direction.has(Dir::RIGHT) {
            self.body.set_course_x(SPEED, CELL_SIZE);
        } else if direction.has(Dir::DOWN) {
            self.body.set_course_y(-SPEED, f32::NEG_INFINITY);
        }
    }

    /// Start the destruction countdown. Idempotent: returns whether this
    /// call actually started it, which is what scoring keys off.
    pub fn blow(&mut self) -> bool {
        if self.blow_elapsed.is_some() {
            return false;
        }
        self.blow_elapsed = Some(0.0);
        self.body.halt();
        true
    }

    /// Countdown running but not yet elapsed.
    pub fn is_blowing(&self) -> bool {
        matches!(self.blow_elapsed, Some(t) if t <= BLOW_DURATION)
    }

    /// Countdown elapsed; the crate is ready to be removed.
    pub fn is_blown(&self) -> bool {
        matches!(self.blow_elapsed, Some(t) if t > BLOW_DURATION)
    }
}

// ── Player ──

/// The player stands two cells tall.
pub const PLAYER_HEIGHT: f32 = 2.0 * CELL_SIZE;

#[derive(Clone, Debug)]
pub struct Player {
    pub body: Body,
    direction: Dir,
    pushing: bool,
    facing_left: bool,
    alive: bool,
}

impl Player {
    pub fn new() -> Self {
        Player {
            body: Body::default(),
            direction: Dir::NONE,
            pushing: false,
            facing_left: true,
            alive: true,
        }
    }

    pub fn update(&mut self, dt: f32) -> Progress {
        let progress = self.body.tick(dt);
        if progress == Progress::Finished {
            self.body.finish_move();
        }
        progress
    }

    /// Begin a move in `direction`, optionally shoving a crate.
    /// Contradictory flag combinations are rejected without any state
    /// change, as is a push paired with anything but pure Left/Right.
    pub fn start_move(&mut self, direction: Dir, push: bool) {
        if !direction.is_valid() {
            return;
        }
        if push && direction != Dir::LEFT && direction != Dir::RIGHT {
            return;
        }

        self.body.halt();
        self.direction = direction;
        self.pushing = push;
        if direction.has(Dir::LEFT) || direction.has(Dir::RIGHT) {
            self.facing_left = direction.has(Dir::LEFT);
        }

        let signs = direction.signs();
        self.body.set_course_x(signs.x * SPEED, signs.x * CELL_SIZE);
        if direction == Dir::DOWN {
            // Falling: stopped externally by the ground check.
            self.body.set_course_y(-SPEED, f32::NEG_INFINITY);
        } else {
            self.body.set_course_y(signs.y * SPEED, signs.y * CELL_SIZE);
        }
    }

    pub fn direction(&self) -> Dir {
        self.direction
    }

    /// Neutral stance once settled with nothing pending. Cosmetic.
    pub fn idle(&mut self) {
        self.pushing = false;
    }

    pub fn is_pushing(&self) -> bool {
        self.pushing
    }

    pub fn faces_left(&self) -> bool {
        self.facing_left
    }

    pub fn alive(&self) -> bool {
        self.alive
    }

    pub fn set_alive(&mut self, alive: bool) {
        self.alive = alive;
    }
}

// ── Crane ──

/// Altitude of the crane rail (bottom edge of a crane), world units.
pub const CRANE_ALTITUDE: f32 = 44.0;

/// Width of a crane, world units.
pub const CRANE_WIDTH: f32 = 12.0;

/// Offset of a carried crate relative to the crane position.
pub const HOOK_OFFSET: Vec2 = Vec2::new(4.0, -3.0);

/// Altitude at which a released crate starts falling.
pub const DROP_ALTITUDE: f32 = CRANE_ALTITUDE + HOOK_OFFSET.y;

/// How long the hook is shown open after a release, seconds. Cosmetic.
const HOOK_OPEN_SECS: f32 = 0.4;

#[derive(Clone, Debug)]
pub struct Crane {
    pub body: Body,
    moving_left: bool,
    lap_done: bool,
    crate_id: EntityId,
    drop_column: usize,
    open_timer: f32,
}

impl Crane {
    pub fn new() -> Self {
        Crane {
            body: Body::default(),
            moving_left: true,
            lap_done: false,
            crate_id: NULL_ID,
            drop_column: 0,
            open_timer: 0.0,
        }
    }

    pub fn update(&mut self, dt: f32) -> Progress {
        if self.open_timer > 0.0 {
            self.open_timer = (self.open_timer - dt).max(0.0);
        }
        let progress = self.body.tick(dt);
        if progress == Progress::Finished {
            // No snap: the rail sits off the cell grid. The crane simply
            // stops advancing and waits for the world to start a new lap.
            self.lap_done = true;
        }
        progress
    }

    /// Place the crane at a lap start and give it a course to travel.
    pub fn reset(&mut self, position: Vec2, left: bool, travel: f32) {
        self.body.set_position(position);
        self.body.halt();
        let sign = if left { -1.0 } else { 1.0 };
        self.body.set_course_x(sign * SPEED, sign * travel);
        self.moving_left = left;
        self.lap_done = false;
        self.open_timer = 0.0;
    }

    /// Freeze in place. Used once the player is dead.
    pub fn stop(&mut self) {
        self.body.halt();
    }

    pub fn is_left(&self) -> bool {
        self.moving_left
    }

    pub fn lap_done(&self) -> bool {
        self.lap_done
    }

    pub fn crate_id(&self) -> EntityId {
        self.crate_id
    }

    pub fn is_loaded(&self) -> bool {
        self.crate_id != NULL_ID
    }

    pub fn load(&mut self, id: EntityId) {
        self.crate_id = id;
    }

    /// Release the carried crate, returning its id.
    pub fn release(&mut self) -> EntityId {
        let id = self.crate_id;
        self.crate_id = NULL_ID;
        self.open_timer = HOOK_OPEN_SECS;
        id
    }

    pub fn drop_column(&self) -> usize {
        self.drop_column
    }

    pub fn set_drop_column(&mut self, column: usize) {
        self.drop_column = column;
    }

    /// Hook open right after a release. Cosmetic.
    pub fn hook_open(&self) -> bool {
        self.open_timer > 0.0
    }

    /// World position a carried crate hangs at.
    pub fn hook_position(&self) -> Vec2 {
        self.body.position() + HOOK_OFFSET
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── Dir ──

    #[test]
    fn contradictory_directions_are_invalid() {
        assert!(!Dir::LEFT.join(Dir::RIGHT).is_valid());
        assert!(!Dir::UP.join(Dir::DOWN).is_valid());
        assert!(Dir::UP_LEFT.is_valid());
        assert!(Dir::NONE.is_valid());
    }

    #[test]
    fn diagonals_carry_both_flags() {
        assert!(Dir::UP_RIGHT.has(Dir::UP));
        assert!(Dir::UP_RIGHT.has(Dir::RIGHT));
        assert!(!Dir::UP_RIGHT.has(Dir::LEFT));
        assert_eq!(Dir::DOWN_LEFT.signs(), Vec2::new(-1.0, -1.0));
    }

    // ── Crate ──

    #[test]
    fn blow_starts_exactly_once() {
        let mut c = Crate::new(7, 0);
        assert!(c.blow());
        assert!(!c.blow());
        assert!(c.is_blowing());
        assert!(!c.is_blown());
    }

    #[test]
    fn blown_state_is_monotonic() {
        let mut c = Crate::new(7, 0);
        c.blow();
        c.update(BLOW_DURATION + 0.01);
        assert!(c.is_blown());
        for _ in 0..10 {
            c.update(0.1);
            assert!(c.is_blown());
            assert!(!c.is_blowing());
        }
    }

    #[test]
    fn blow_halts_motion() {
        let mut c = Crate::new(7, 0);
        c.start_move(Dir::DOWN);
        assert!(c.body.is_falling());
        c.blow();
        assert!(!c.body.is_moving());
    }

    #[test]
    fn countdown_is_independent_of_tick_granularity() {
        let mut coarse = Crate::new(1, 0);
        let mut fine = Crate::new(2, 0);
        coarse.blow();
        fine.blow();
        coarse.update(0.35);
        for _ in 0..35 {
            fine.update(0.01);
        }
        assert!(coarse.is_blown());
        assert!(fine.is_blown());
    }

    // ── Player ──

    #[test]
    fn invalid_move_leaves_player_untouched() {
        let mut p = Player::new();
        p.start_move(Dir::LEFT.join(Dir::RIGHT), false);
        assert_eq!(p.direction(), Dir::NONE);
        assert!(!p.body.is_moving());
    }

    #[test]
    fn push_requires_pure_horizontal() {
        let mut p = Player::new();
        p.start_move(Dir::UP_LEFT, true);
        assert_eq!(p.direction(), Dir::NONE);
        p.start_move(Dir::LEFT, true);
        assert_eq!(p.direction(), Dir::LEFT);
        assert!(p.is_pushing());
    }

    #[test]
    fn down_move_is_an_unbounded_fall() {
        let mut p = Player::new();
        p.body.set_position(Vec2::new(0.0, 3.0 * CELL_SIZE));
        p.start_move(Dir::DOWN, false);
        assert!(p.body.is_falling());
        for _ in 0..50 {
            assert_ne!(p.update(0.05), Progress::Finished);
        }
    }

    #[test]
    fn jump_arc_is_one_cell_each_axis() {
        let mut p = Player::new();
        p.start_move(Dir::UP_RIGHT, false);
        assert_eq!(p.update(1.0), Progress::Finished);
        assert_eq!(p.body.column(), Some(1));
        assert_eq!(p.body.row(), Some(1));
    }

    // ── Crane ──

    #[test]
    fn crane_keeps_rail_position_after_lap() {
        let mut c = Crane::new();
        c.reset(Vec2::new(10.0, CRANE_ALTITUDE), true, 4.0);
        assert_eq!(c.update(1.0), Progress::Finished);
        assert!(c.lap_done());
        // Off-grid rail altitude must survive lap completion.
        assert_eq!(c.body.position(), Vec2::new(6.0, CRANE_ALTITUDE));
        // Further ticks hold position and keep reporting the lap.
        c.update(1.0);
        assert_eq!(c.body.position(), Vec2::new(6.0, CRANE_ALTITUDE));
        assert!(c.lap_done());
    }

    #[test]
    fn release_empties_the_hook() {
        let mut c = Crane::new();
        c.load(42);
        assert!(c.is_loaded());
        assert_eq!(c.release(), 42);
        assert!(!c.is_loaded());
        assert!(c.hook_open());
    }
}
