/// Field geometry and the continuous/discrete coordinate model.
///
/// Positions are continuous 2D vectors in world units, with the origin at
/// the bottom-left corner of the field, X to the right and Y up. The
/// discrete grid is derived from them: a position is "settled" on an axis
/// when it lies within `COORD_TOLERANCE` of an exact cell multiple, and
/// only then does it map to a row or column. Anything between cells is a
/// valid state the caller has to handle, not an error.

use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};

/// Side length of one grid cell in world units.
pub const CELL_SIZE: f32 = 8.0;

pub const COLUMNS: usize = 12;
pub const ROWS: usize = 5;

/// Width of the region in which moving objects are visible.
pub const REGION_WIDTH: f32 = 97.0;

/// Travel speed shared by every entity, world units per second.
pub const SPEED: f32 = 1.5 * CELL_SIZE;

/// Precision used to decide whether a position sits on the grid.
pub const COORD_TOLERANCE: f32 = 1.0e-5;

/// Velocities below this magnitude count as standing still.
pub const SPEED_TOLERANCE: f32 = 1.0e-2;

#[derive(Clone, Copy, PartialEq, Debug, Default)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Vec2 { x, y }
    }
}

impl Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Vec2) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl SubAssign for Vec2 {
    fn sub_assign(&mut self, rhs: Vec2) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;
    fn mul(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

/// Round a scalar to the nearest cell multiple.
pub fn snapped(value: f32) -> f32 {
    (value / CELL_SIZE).round() * CELL_SIZE
}

/// Is the scalar settled on the cell grid?
pub fn is_settled(value: f32) -> bool {
    (snapped(value) - value).abs() < COORD_TOLERANCE
}

/// Map a settled scalar to a cell index below `limit`.
/// `None` when the position is between cells or outside the field.
fn cell_index(value: f32, limit: usize) -> Option<usize> {
    if !is_settled(value) {
        return None;
    }
    let index = (value / CELL_SIZE).round();
    if index < 0.0 {
        return None;
    }
    let index = index as usize;
    if index >= limit {
        return None;
    }
    Some(index)
}

/// Column of a settled x position, if inside the field.
pub fn column_of(x: f32) -> Option<usize> {
    cell_index(x, COLUMNS)
}

/// Row of a settled y position, if inside the field.
pub fn row_of(y: f32) -> Option<usize> {
    cell_index(y, ROWS)
}

/// World position of the cell at (row, column).
pub fn cell_position(row: usize, column: usize) -> Vec2 {
    Vec2::new(column as f32 * CELL_SIZE, row as f32 * CELL_SIZE)
}
