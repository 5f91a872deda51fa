/// World: the complete state of a running game.
///
/// ## Ownership
///
/// The world owns every entity. Crates live in an id-keyed map; two
/// indexes classify them: `stacks` (resting crates, one stack per column,
/// contiguous from row 0) and `airborne` (crates in free flight). A crate
/// on a crane hook is in neither; the crane's `crate_id` is its only
/// reference. Cranes occupy fixed slots; a slot keeps its ring phase for
/// the whole game.
///
/// ## Mutation
///
/// All mutation happens inside `step::step`, driven by explicit
/// `Progress` results, never from entity callbacks, so the per-tick
/// order (player, cranes, resting crates, airborne crates, bottom row)
/// is plain to read there.

use std::collections::{BTreeMap, BTreeSet};

use crate::domain::entity::{
    Crane, Crate, Dir, EntityId, IdAllocator, Player, CRANE_ALTITUDE, CRANE_WIDTH, CRATE_STYLES,
    NULL_ID,
};
use crate::domain::grid::{cell_position, Vec2, COLUMNS, REGION_WIDTH, ROWS};
use crate::domain::rules::{CrateRef, FieldView};
use super::layout::{random_layout, LAYOUTS};
use super::rng::Rng;

/// Crane slots in the patrol ring.
pub const MAX_CRANES: usize = 5;

/// Most cranes a game may start with.
pub const MAX_INITIAL_CRANES: u8 = 3;

/// Distance between neighbouring ring positions, world units.
pub const CRANE_INTERVAL: f32 = 22.0;

/// Points for a crane releasing its crate (player alive).
pub const DROP_SCORE: u32 = 2;

/// Bottom-row clear pays this per active crane.
pub const ROW_SCORE_MULTIPLIER: u32 = 10;

/// Distance a crane travels in one lap, entry offset excluded. Long
/// enough to emerge fully from behind one edge and vanish behind the
/// other.
pub fn lap_length() -> f32 {
    CRANE_WIDTH + MAX_CRANES as f32 * CRANE_INTERVAL
}

/// Lap start position: just beyond the edge the crane enters from,
/// pushed `offset` units further out.
pub fn crane_start_position(left: bool, offset: f32) -> Vec2 {
    let x = if left {
        REGION_WIDTH + offset
    } else {
        -CRANE_WIDTH - offset
    };
    Vec2::new(x, CRANE_ALTITUDE)
}

/// Read-only state dump for the diagnostic overlay.
#[derive(Clone, Debug)]
pub struct DebugSnapshot {
    pub score: u32,
    pub god_mode: bool,
    /// Occupied slots: (slot, x position, heading left).
    pub cranes: Vec<(usize, f32, bool)>,
}

pub struct World {
    pub player: Player,
    pub requested: Dir,

    pub crates: BTreeMap<EntityId, Crate>,
    /// Resting crates per column, contiguous from row 0.
    pub stacks: [[EntityId; ROWS]; COLUMNS],
    /// Crates in free flight (pushed or falling), never carried ones.
    pub airborne: BTreeSet<EntityId>,

    pub cranes: [Option<Crane>; MAX_CRANES],

    pub score: u32,
    pub paused: bool,
    pub god_mode: bool,

    pub ids: IdAllocator,
    pub rng: Rng,
}

impl World {
    pub fn new(seed: u32) -> Self {
        World {
            player: Player::new(),
            requested: Dir::NONE,
            crates: BTreeMap::new(),
            stacks: [[NULL_ID; ROWS]; COLUMNS],
            airborne: BTreeSet::new(),
            cranes: [None, None, None, None, None],
            score: 0,
            paused: false,
            god_mode: false,
            ids: IdAllocator::new(),
            rng: Rng::new(seed),
        }
    }

    /// (Re)initialize the field and begin a game.
    ///
    /// `layout_index` selects a hand-authored layout; anything else rolls
    /// a random one. `cranes` is clamped to 1..=MAX_INITIAL_CRANES.
    pub fn start(&mut self, cranes: u8, layout_index: Option<usize>) {
        self.clear_objects();

        let layout = match layout_index {
            Some(index) if index < LAYOUTS.len() => LAYOUTS[index],
            _ => random_layout(&mut self.rng),
        };
        for (column, &height) in layout.stacks.iter().enumerate() {
            for row in 0..height {
                self.add_resting_crate(row, column);
            }
        }

        self.set_player_column(layout.player_column);
        self.player.set_alive(true);
        self.player.start_move(Dir::NONE, false);
        self.requested = Dir::NONE;

        self.add_cranes(cranes);

        self.score = 0;
        self.paused = false;
    }

    fn clear_objects(&mut self) {
        self.crates.clear();
        self.airborne.clear();
        for column in self.stacks.iter_mut() {
            column.fill(NULL_ID);
        }
        for slot in self.cranes.iter_mut() {
            *slot = None;
        }
    }

    // ── Entity construction ──

    /// Create a crate with a random resting style. The caller places it.
    pub fn spawn_crate(&mut self) -> EntityId {
        let id = self.ids.allocate();
        let style = self.rng.below(CRATE_STYLES as u32) as u8;
        self.crates.insert(id, Crate::new(id, style));
        id
    }

    fn add_resting_crate(&mut self, row: usize, column: usize) {
        let id = self.spawn_crate();
        if let Some(c) = self.crates.get_mut(&id) {
            c.body.set_position(cell_position(row, column));
        }
        self.stacks[column][row] = id;
    }

    fn set_player_column(&mut self, column: usize) {
        let row = self.column_height(column);
        self.player.body.set_position(cell_position(row, column));
    }

    // ── Cranes ──

    pub fn crane_count(&self) -> usize {
        self.cranes.iter().filter(|c| c.is_some()).count()
    }

    pub fn add_cranes(&mut self, quantity: u8) {
        let quantity = quantity.clamp(1, MAX_INITIAL_CRANES);
        for _ in 0..quantity {
            self.add_crane();
        }
    }

    /// Put a crane into a free ring slot. Returns the slot, or `None`
    /// when the ring is full.
    ///
    /// Slot 0 is the phase reference. A later crane takes the free slot
    /// whose ring position is next due to start a lap; if that position
    /// is still inside the visible region, the crane enters one whole lap
    /// later so it never pops in mid-screen.
    pub fn add_crane(&mut self) -> Option<usize> {
        if self.crane_count() >= MAX_CRANES {
            return None;
        }

        let mut index = 0;
        let mut entry_offset = 0.0f32;
        if self.crane_count() != 0 {
            let first = self.cranes[0].as_ref()?;
            let start = crane_start_position(first.is_left(), 0.0);
            let first_travelled = (first.body.position().x - start.x).abs();

            let mut offset = 0.0f32;
            for slot in 1..MAX_CRANES {
                if self.cranes[slot].is_some() {
                    continue;
                }
                offset = first_travelled - slot as f32 * CRANE_INTERVAL;
                index = slot;
                if offset <= 0.0 {
                    // This ring position is already out of sight.
                    break;
                }
            }
            if offset > 0.0 {
                offset -= lap_length();
            }
            entry_offset = offset;
        }

        let mut crane = Crane::new();
        self.reset_crane(&mut crane, entry_offset.abs());
        self.cranes[index] = Some(crane);
        Some(index)
    }

    /// Send a crane on a fresh lap: random heading, random drop column,
    /// crate loaded if the hook is empty.
    pub fn reset_crane(&mut self, crane: &mut Crane, offset: f32) {
        let left = self.rng.coin();
        let position = crane_start_position(left, offset);
        crane.reset(position, left, offset + lap_length());
        crane.set_drop_column(self.rng.below(COLUMNS as u32) as usize);

        if !crane.is_loaded() {
            let id = self.spawn_crate();
            crane.load(id);
        }
        let hook = crane.hook_position();
        if let Some(c) = self.crates.get_mut(&crane.crate_id()) {
            c.body.set_position(hook);
        }
    }

    // ── Queries ──

    /// Count of resting crates stacked from row 0 without gaps.
    pub fn column_height(&self, column: usize) -> usize {
        self.stacks[column]
            .iter()
            .position(|&id| id == NULL_ID)
            .unwrap_or(ROWS)
    }

    pub fn heights(&self) -> [usize; COLUMNS] {
        let mut heights = [0; COLUMNS];
        for (column, height) in heights.iter_mut().enumerate() {
            *height = self.column_height(column);
        }
        heights
    }

    pub fn bottom_row_filled(&self) -> bool {
        self.stacks.iter().all(|column| column[0] != NULL_ID)
    }

    /// Snapshot of every live crate for the legality rules.
    pub fn crate_refs(&self) -> Vec<CrateRef> {
        self.crates
            .values()
            .map(|c| CrateRef {
                id: c.id(),
                pos: c.body.position(),
                column: c.body.column(),
                airborne: self.airborne.contains(&c.id()),
            })
            .collect()
    }

    pub fn field_view<'a>(&'a self, crates: &'a [CrateRef]) -> FieldView<'a> {
        FieldView {
            heights: self.heights(),
            stacks: &self.stacks,
            crates,
            player_pos: self.player.body.position(),
            player_row: self.player.body.row(),
            player_column: self.player.body.column(),
        }
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    // ── Requests from the input layer ──

    pub fn request_move(&mut self, direction: Dir) {
        self.requested = direction;
    }

    pub fn request_stop(&mut self) {
        self.requested = Dir::NONE;
    }

    /// Pause freezes the simulation in place; nothing is destroyed and
    /// every position and velocity survives the gap untouched.
    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
    }

    pub fn toggle_god_mode(&mut self) {
        self.god_mode = !self.god_mode;
    }

    pub fn debug_snapshot(&self) -> DebugSnapshot {
        DebugSnapshot {
            score: self.score,
            god_mode: self.god_mode,
            cranes: self
                .cranes
                .iter()
                .enumerate()
                .filter_map(|(slot, crane)| {
                    crane
                        .as_ref()
                        .map(|c| (slot, c.body.position().x, c.is_left()))
                })
                .collect(),
        }
    }
}
