/// Legality rules for player moves, crate pushes and crane drops.
///
/// Pure predicates over a `FieldView` snapshot: they answer "is this
/// legal" without performing anything. An illegal action is simply a
/// `None`/`false` answer; the orchestrator ignores it silently.
///
/// Heights are in rows; positions in world units. The player occupies a
/// two-cell band: a crate level with the player's feet can be pushed, a
/// crate between waist and head blocks, a crate above the head is
/// ignored.

use super::entity::{Dir, EntityId, DROP_ALTITUDE, NULL_ID, PLAYER_HEIGHT};
use super::grid::{Vec2, CELL_SIZE, COLUMNS, ROWS};

/// Number of bottom rows in which jumping is allowed.
pub const JUMP_ROWS: usize = 3;

/// One crate, as the rules see it.
#[derive(Clone, Copy, Debug)]
pub struct CrateRef {
    pub id: EntityId,
    pub pos: Vec2,
    /// Settled column, absent while between columns.
    pub column: Option<usize>,
    /// In free flight (pushed or falling); carried crates are not.
    pub airborne: bool,
}

/// Immutable snapshot of everything the legality rules consult.
pub struct FieldView<'a> {
    /// Resting-stack height per column.
    pub heights: [usize; COLUMNS],
    /// Static index: resting crate ids per column, contiguous from row 0.
    pub stacks: &'a [[EntityId; ROWS]; COLUMNS],
    /// Every live crate, including the ones on crane hooks.
    pub crates: &'a [CrateRef],
    pub player_pos: Vec2,
    pub player_row: Option<usize>,
    pub player_column: Option<usize>,
}

impl<'a> FieldView<'a> {
    fn airborne(&self) -> impl Iterator<Item = &CrateRef> + '_ {
        self.crates.iter().filter(|c| c.airborne)
    }

    fn crate_pos(&self, id: EntityId) -> Option<Vec2> {
        self.crates.iter().find(|c| c.id == id).map(|c| c.pos)
    }
}

/// Can the player start a move in `direction` from the settled cell?
///
/// `None` means illegal. `Some(NULL_ID)` is a plain move; any other id is
/// the crate that gets shoved along with it.
pub fn can_player_move(view: &FieldView, direction: Dir) -> Option<EntityId> {
    let row = view.player_row?;
    let column = view.player_column?;

    match direction {
        Dir::LEFT => can_move_horizontal(view, row, column, true),
        Dir::RIGHT => can_move_horizontal(view, row, column, false),
        Dir::UP => can_move_vertical(view, row, column).then_some(NULL_ID),
        Dir::UP_LEFT => can_move_diagonal(view, row, column, true).then_some(NULL_ID),
        Dir::UP_RIGHT => can_move_diagonal(view, row, column, false).then_some(NULL_ID),
        _ => None,
    }
}

fn can_move_horizontal(
    view: &FieldView,
    row: usize,
    column: usize,
    left: bool,
) -> Option<EntityId> {
    // Field boundary.
    if (left && column < 1) || (!left && column > COLUMNS - 2) {
        return None;
    }

    let k: isize = if left { -1 } else { 1 };
    let player_y = view.player_pos.y;

    // Airborne crates in the adjacent column interact by height band.
    let mut pushed = NULL_ID;
    let mut pushed_y = 0.0;
    for c in view.airborne() {
        let Some(crate_column) = c.column else { continue };
        if crate_column as isize != column as isize + k {
            continue;
        }

        if c.pos.y >= player_y + CELL_SIZE && c.pos.y <= player_y + PLAYER_HEIGHT {
            // Between waist and head: the crate is a wall.
            return None;
        }
        if c.pos.y < player_y + CELL_SIZE && c.pos.y > player_y {
            // Between waist and feet: a push target, if it has room.
            if can_push_crate(view, c.pos, crate_column, left) {
                pushed = c.id;
                pushed_y = c.pos.y;
            } else {
                return None;
            }
        }
    }

    if pushed != NULL_ID {
        // Grabbing a falling crate raises the player to its level; any
        // crate hanging in the player's own column inside that span makes
        // the grab illegal.
        let player_column = view.player_column?;
        for c in view.airborne() {
            if c.column == Some(player_column)
                && pushed_y + PLAYER_HEIGHT > c.pos.y
                && player_y + PLAYER_HEIGHT < c.pos.y
            {
                return None;
            }
        }
        return Some(pushed);
    }

    // No airborne crate to interact with: step across or step down.
    let next = (column as isize + k) as usize;
    let next_height = view.heights[next];
    let height = view.heights[column];
    if row == next_height || (row == height && row > next_height) {
        return Some(NULL_ID);
    }

    // Step with a push: the adjacent stack must be exactly one higher,
    // and its top crate must have room to go.
    if next_height == 0 || row + 1 != next_height {
        return None;
    }
    let top = view.stacks[next][next_height - 1];
    let top_pos = view.crate_pos(top)?;
    if can_push_crate(view, top_pos, next, left) {
        Some(top)
    } else {
        None
    }
}

fn can_move_vertical(view: &FieldView, row: usize, column: usize) -> bool {
    // Jumping is only allowed near the floor, and only off solid ground.
    row < JUMP_ROWS && row == view.heights[column]
}

fn can_move_diagonal(view: &FieldView, row: usize, column: usize, left: bool) -> bool {
    if row >= JUMP_ROWS {
        return false;
    }
    if (left && column <= 1) || (!left && column >= COLUMNS - 2) {
        return false;
    }

    // Resting stacks along the arc: launch off solid ground, clear the
    // adjacent stack, land at most one row higher two columns over.
    let k: isize = if left { -1 } else { 1 };
    let over = (column as isize + k) as usize;
    let landing = (column as isize + 2 * k) as usize;
    if row != view.heights[column]
        || row < view.heights[over]
        || row + 1 < view.heights[landing]
    {
        return false;
    }

    // Airborne crates along the arc. Vertical speeds are all equal, so
    // relative heights now predict the whole arc.
    let player_y = view.player_pos.y;
    for c in view.airborne() {
        let Some(crate_column) = c.column else { continue };
        let span = (crate_column as isize - column as isize).abs();

        // Next column: the head must clear the crate at the arc's peak.
        if span == 1 && c.pos.y - CELL_SIZE < player_y + PLAYER_HEIGHT + CELL_SIZE {
            return false;
        }

        // Landing column: a crate still high enough to meet the player at
        // the end of the arc forbids the jump; one that lands first, or
        // stays far above, does not.
        if span == 2
            && c.pos.y >= player_y + CELL_SIZE
            && c.pos.y - 2.0 * CELL_SIZE < player_y + PLAYER_HEIGHT + CELL_SIZE
        {
            return false;
        }
    }
    true
}

/// Can the crate at `pos` in `column` be shoved one cell toward `left`?
pub fn can_push_crate(view: &FieldView, pos: Vec2, column: usize, left: bool) -> bool {
    // Room to push into.
    if (left && column < 1) || (!left && column > COLUMNS - 2) {
        return false;
    }

    // The destination stack must not reach the crate.
    let k: isize = if left { -1 } else { 1 };
    let dest = (column as isize + k) as usize;
    if pos.y < view.heights[dest] as f32 * CELL_SIZE {
        return false;
    }

    // No airborne crate in a neighbouring column at overlapping height.
    for c in view.airborne() {
        let Some(crate_column) = c.column else { continue };
        if (crate_column as isize - column as isize).abs() != 1 {
            continue;
        }
        if (pos.y - c.pos.y).abs() < CELL_SIZE {
            return false;
        }
    }
    true
}

/// Can the crate `carried` be released into `column`?
pub fn can_drop_crate(view: &FieldView, carried: EntityId, column: usize) -> bool {
    // Never onto a player standing right under the rail.
    if view.player_column == Some(column) && view.player_row == Some(JUMP_ROWS) {
        return false;
    }

    // The stack must have room.
    if view.heights[column] >= ROWS {
        return false;
    }

    // The drop altitude must be clear of every other crate in the lane.
    for c in view.crates {
        if c.column == Some(column)
            && c.id != carried
            && (DROP_ALTITUDE - c.pos.y).abs() < CELL_SIZE
        {
            return false;
        }
    }
    true
}

/// Direction that continues a finished move, if any: the second half of a
/// diagonal jump arc. From the peak the player either walks onto a stack
/// that reaches the peak, or keeps descending diagonally onto the lower
/// landing point.
pub fn player_next_direction(
    heights: &[usize; COLUMNS],
    direction: Dir,
    row: usize,
    column: usize,
) -> Dir {
    if direction == Dir::UP_LEFT {
        if column >= 1 && row == heights[column - 1] {
            Dir::LEFT
        } else {
            Dir::DOWN_LEFT
        }
    } else if direction == Dir::UP_RIGHT {
        if column + 1 < COLUMNS && row == heights[column + 1] {
            Dir::RIGHT
        } else {
            Dir::DOWN_RIGHT
        }
    } else {
        Dir::NONE
    }
}

/// Does a crate at `crate_pos` strike the player's body?
/// Horizontal alignment within half a cell, vertical inside the band
/// between feet and head.
pub fn crate_hits_player(crate_pos: Vec2, player_pos: Vec2) -> bool {
    let height_range = crate_pos.y - player_pos.y;
    (player_pos.x - crate_pos.x).abs() < CELL_SIZE / 2.0
        && height_range < PLAYER_HEIGHT
        && height_range > 0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::grid::{cell_position, column_of, row_of};

    /// Build a view from resting-stack heights alone. Crate ids are
    /// synthesized per slot so push targets can be identified.
    struct Fixture {
        heights: [usize; COLUMNS],
        stacks: [[EntityId; ROWS]; COLUMNS],
        crates: Vec<CrateRef>,
        player_pos: Vec2,
    }

    fn fixture(heights: [usize; COLUMNS], player_row: usize, player_column: usize) -> Fixture {
        let mut stacks = [[NULL_ID; ROWS]; COLUMNS];
        let mut crates = Vec::new();
        let mut next_id: EntityId = 1;
        for (column, &height) in heights.iter().enumerate() {
            for row in 0..height {
                stacks[column][row] = next_id;
                crates.push(CrateRef {
                    id: next_id,
                    pos: cell_position(row, column),
                    column: Some(column),
                    airborne: false,
                });
                next_id += 1;
            }
        }
        Fixture {
            heights,
            stacks,
            crates,
            player_pos: cell_position(player_row, player_column),
        }
    }

    impl Fixture {
        fn add_airborne(&mut self, pos: Vec2) -> EntityId {
            let id = 1000 + self.crates.len() as EntityId;
            self.crates.push(CrateRef {
                id,
                pos,
                column: column_of(pos.x),
                airborne: true,
            });
            id
        }

        fn view(&self) -> FieldView<'_> {
            FieldView {
                heights: self.heights,
                stacks: &self.stacks,
                crates: &self.crates,
                player_pos: self.player_pos,
                player_row: row_of(self.player_pos.y),
                player_column: column_of(self.player_pos.x),
            }
        }
    }

    #[test]
    fn step_onto_equal_height_is_plain() {
        // Player on the floor at column 5, column 4 empty: plain step,
        // not a push, even though column 3 holds a crate.
        let mut heights = [0; COLUMNS];
        heights[3] = 1;
        let f = fixture(heights, 0, 5);
        assert_eq!(can_player_move(&f.view(), Dir::LEFT), Some(NULL_ID));
    }

    #[test]
    fn step_down_from_own_stack() {
        let mut heights = [0; COLUMNS];
        heights[5] = 2;
        let f = fixture(heights, 2, 5);
        assert_eq!(can_player_move(&f.view(), Dir::LEFT), Some(NULL_ID));
        assert_eq!(can_player_move(&f.view(), Dir::RIGHT), Some(NULL_ID));
    }

    #[test]
    fn wall_of_two_blocks() {
        // Adjacent stack two higher than the player: no step, no push.
        let mut heights = [0; COLUMNS];
        heights[4] = 2;
        let f = fixture(heights, 0, 5);
        assert_eq!(can_player_move(&f.view(), Dir::LEFT), None);
    }

    #[test]
    fn push_resting_crate_one_step_up() {
        let mut heights = [0; COLUMNS];
        heights[4] = 1;
        let f = fixture(heights, 0, 5);
        let view = f.view();
        let pushed = can_player_move(&view, Dir::LEFT);
        assert_eq!(pushed, Some(f.stacks[4][0]));
    }

    #[test]
    fn push_blocked_by_far_stack() {
        // Crate at column 4 would be pushed into column 3, but column 3
        // is already at the crate's height.
        let mut heights = [0; COLUMNS];
        heights[4] = 1;
        heights[3] = 1;
        let f = fixture(heights, 0, 5);
        assert_eq!(can_player_move(&f.view(), Dir::LEFT), None);
    }

    #[test]
    fn push_at_field_edge_is_illegal() {
        let mut heights = [0; COLUMNS];
        heights[0] = 1;
        let f = fixture(heights, 0, 1);
        // Pushing left from column 0 would leave the field.
        assert_eq!(can_player_move(&f.view(), Dir::LEFT), None);
    }

    #[test]
    fn falling_crate_at_head_height_blocks() {
        let mut f = fixture([0; COLUMNS], 0, 5);
        // Head band is [CELL, 2*CELL] above the feet.
        f.add_airborne(Vec2::new(4.0 * CELL_SIZE, 1.5 * CELL_SIZE));
        assert_eq!(can_player_move(&f.view(), Dir::LEFT), None);
    }

    #[test]
    fn falling_crate_at_waist_is_pushed() {
        let mut f = fixture([0; COLUMNS], 0, 5);
        let id = f.add_airborne(Vec2::new(4.0 * CELL_SIZE, 0.5 * CELL_SIZE));
        assert_eq!(can_player_move(&f.view(), Dir::LEFT), Some(id));
    }

    #[test]
    fn far_overhead_crate_is_ignored() {
        let mut f = fixture([0; COLUMNS], 0, 5);
        f.add_airborne(Vec2::new(4.0 * CELL_SIZE, 4.0 * CELL_SIZE));
        assert_eq!(can_player_move(&f.view(), Dir::LEFT), Some(NULL_ID));
    }

    #[test]
    fn push_legality_gates_the_move() {
        // The waist-height crate cannot be pushed because another
        // airborne crate occupies the next column at the same height.
        let mut f = fixture([0; COLUMNS], 0, 5);
        f.add_airborne(Vec2::new(4.0 * CELL_SIZE, 0.5 * CELL_SIZE));
        f.add_airborne(Vec2::new(3.0 * CELL_SIZE, 0.7 * CELL_SIZE));
        assert_eq!(can_player_move(&f.view(), Dir::LEFT), None);
    }

    #[test]
    fn jump_needs_solid_ground() {
        let mut heights = [0; COLUMNS];
        heights[5] = 1;
        let f = fixture(heights, 1, 5);
        assert_eq!(can_player_move(&f.view(), Dir::UP), Some(NULL_ID));
        // Airborne (row above the stack): no jump.
        let g = fixture(heights, 2, 5);
        assert_eq!(can_player_move(&g.view(), Dir::UP), None);
    }

    #[test]
    fn jump_band_is_bounded() {
        let mut heights = [0; COLUMNS];
        heights[5] = JUMP_ROWS;
        let f = fixture(heights, JUMP_ROWS, 5);
        assert_eq!(can_player_move(&f.view(), Dir::UP), None);
    }

    #[test]
    fn diagonal_clears_low_stacks_only() {
        let mut heights = [0; COLUMNS];
        heights[5] = 1;
        heights[4] = 1;
        heights[3] = 2;
        // From the top of column 5, over column 4 (equal), onto column 3
        // (one higher): legal.
        let f = fixture(heights, 1, 5);
        assert_eq!(can_player_move(&f.view(), Dir::UP_LEFT), Some(NULL_ID));

        // Raise the overflown stack above the player: illegal.
        let mut tall = heights;
        tall[4] = 2;
        let g = fixture(tall, 1, 5);
        assert_eq!(can_player_move(&g.view(), Dir::UP_LEFT), None);
    }

    #[test]
    fn diagonal_blocked_by_crate_falling_beside() {
        let mut heights = [0; COLUMNS];
        heights[5] = 1;
        let mut f = fixture(heights, 1, 5);
        // A crate low over the adjacent column meets the head mid-arc.
        f.add_airborne(Vec2::new(4.0 * CELL_SIZE, 4.0 * CELL_SIZE));
        assert_eq!(can_player_move(&f.view(), Dir::UP_LEFT), None);
    }

    #[test]
    fn unsettled_player_cannot_move() {
        let mut f = fixture([0; COLUMNS], 0, 5);
        f.player_pos.y += 3.0; // mid-air between rows
        assert_eq!(can_player_move(&f.view(), Dir::LEFT), None);
        assert_eq!(can_player_move(&f.view(), Dir::UP), None);
    }

    #[test]
    fn arc_continuation_depends_on_landing_height() {
        let mut heights = [0usize; COLUMNS];
        heights[4] = 2;
        // Peak at row 2 above column 5; the stack to the left reaches the
        // peak, so the arc flattens into a plain step.
        assert_eq!(
            player_next_direction(&heights, Dir::UP_LEFT, 2, 5),
            Dir::LEFT
        );
        // Lower landing: the arc turns downward.
        heights[4] = 1;
        assert_eq!(
            player_next_direction(&heights, Dir::UP_LEFT, 2, 5),
            Dir::DOWN_LEFT
        );
        // Plain moves have no continuation.
        assert_eq!(player_next_direction(&heights, Dir::LEFT, 0, 5), Dir::NONE);
    }

    #[test]
    fn hit_band_matches_body_height() {
        let player = Vec2::new(40.0, 0.0);
        // Directly overhead, inside the band.
        assert!(crate_hits_player(Vec2::new(40.0, 10.0), player));
        // At the same level: a resting neighbour, not a hit.
        assert!(!crate_hits_player(Vec2::new(40.0, 0.0), player));
        // Above the head.
        assert!(!crate_hits_player(Vec2::new(40.0, 17.0), player));
        // Misaligned by a full half cell.
        assert!(!crate_hits_player(Vec2::new(44.0, 10.0), player));
    }

    #[test]
    fn drop_rules() {
        let mut heights = [0; COLUMNS];
        heights[2] = ROWS; // full stack
        let f = fixture(heights, 0, 5);
        let view = f.view();
        assert!(!can_drop_crate(&view, NULL_ID, 2));
        assert!(can_drop_crate(&view, NULL_ID, 7));

        // Player standing at the jump ceiling right under the rail.
        let mut tall = [0; COLUMNS];
        tall[7] = JUMP_ROWS;
        let g = fixture(tall, JUMP_ROWS, 7);
        assert!(!can_drop_crate(&g.view(), NULL_ID, 7));

        // Another crate already occupies the drop altitude.
        let mut h = fixture([0; COLUMNS], 0, 5);
        h.add_airborne(Vec2::new(7.0 * CELL_SIZE, DROP_ALTITUDE - 2.0));
        assert!(!can_drop_crate(&h.view(), NULL_ID, 7));
    }
}
