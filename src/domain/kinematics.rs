/// Shared motion primitive for boxes, the player and the cranes.
///
/// A `Body` owes a signed "remaining displacement" on each axis for its
/// current discrete move. Each tick applies `velocity * dt`, clamped per
/// axis so the final step lands exactly on the target instead of
/// overshooting. Completion is reported as an explicit `Progress` value;
/// the owner decides what a finished move means (settle, continue a jump
/// arc, start a new lap). There are no callbacks, so per-tick ordering
/// stays in the orchestrator's hands.
///
/// A fall is a move with an infinite downward remaining displacement; it
/// never completes by itself and is ended externally via `stop_falling`
/// once a support check finds ground.

use super::grid::{self, Vec2, COORD_TOLERANCE, SPEED_TOLERANCE};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Progress {
    /// No motion this tick.
    Idle,
    /// Moved, displacement still owed.
    Moving,
    /// The move completed this tick (or had already completed).
    Finished,
}

#[derive(Clone, Debug, Default)]
pub struct Body {
    position: Vec2,
    velocity: Vec2,
    remaining: Vec2,
}

/// Step to apply on one axis: the raw offset while the move is still in
/// progress, or exactly the remainder when it would cross the target.
fn clamped_step(remaining: f32, offset: f32) -> f32 {
    if remaining == 0.0 {
        return 0.0;
    }
    let left = remaining - offset;
    if (remaining < 0.0) == (left < 0.0) && left.abs() > COORD_TOLERANCE {
        offset
    } else {
        remaining
    }
}

impl Body {
    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn set_position(&mut self, position: Vec2) {
        self.position = position;
    }

    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    pub fn is_moving(&self) -> bool {
        self.velocity.x.abs().max(self.velocity.y.abs()) >= SPEED_TOLERANCE
    }

    pub fn is_falling(&self) -> bool {
        self.velocity.y < 0.0
    }

    /// Column of the current position, absent while between columns.
    pub fn column(&self) -> Option<usize> {
        grid::column_of(self.position.x)
    }

    /// Row of the current position, absent while between rows.
    pub fn row(&self) -> Option<usize> {
        grid::row_of(self.position.y)
    }

    /// Assign a horizontal course without touching the vertical one.
    /// A box pushed mid-fall keeps falling while it slides.
    pub fn set_course_x(&mut self, velocity: f32, remaining: f32) {
        self.velocity.x = velocity;
        self.remaining.x = remaining;
    }

    /// Assign a vertical course without touching the horizontal one.
    pub fn set_course_y(&mut self, velocity: f32, remaining: f32) {
        self.velocity.y = velocity;
        self.remaining.y = remaining;
    }

    /// Drop any pending motion on both axes. Position is left as-is.
    pub fn halt(&mut self) {
        self.velocity = Vec2::ZERO;
        self.remaining = Vec2::ZERO;
    }

    /// Advance by `dt` seconds.
    pub fn tick(&mut self, dt: f32) -> Progress {
        if !self.is_moving() {
            return Progress::Idle;
        }

        let offset = self.velocity * dt;
        let step = Vec2::new(
            clamped_step(self.remaining.x, offset.x),
            clamped_step(self.remaining.y, offset.y),
        );
        self.position += step;
        self.remaining -= step;

        if self.remaining.x == 0.0 && self.remaining.y == 0.0 {
            Progress::Finished
        } else {
            Progress::Moving
        }
    }

    /// Snap to the grid and clear the course. The owner calls this when a
    /// finished move should leave the body settled; a crane deliberately
    /// skips it to keep its off-grid rail position.
    pub fn finish_move(&mut self) {
        self.position = Vec2::new(grid::snapped(self.position.x), grid::snapped(self.position.y));
        self.velocity = Vec2::ZERO;
        self.remaining = Vec2::ZERO;
    }

    /// End a fall: zero the vertical course and snap Y to the grid.
    /// Returns `Finished` only when no horizontal motion is pending, so a
    /// box that lands mid-slide keeps sliding to the next column first.
    pub fn stop_falling(&mut self) -> Progress {
        self.velocity.y = 0.0;
        self.remaining.y = 0.0;
        self.position.y = grid::snapped(self.position.y);
        if self.is_moving() {
            Progress::Moving
        } else {
            self.finish_move();
            Progress::Finished
        }
    }
}
