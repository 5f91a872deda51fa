/// Events emitted during a simulation step.
/// The presentation layer consumes these for sound and flourish.

use crate::domain::entity::EntityId;

#[derive(Clone, Debug)]
#[allow(dead_code)]
pub enum GameEvent {
    PlayerJumped,
    PlayerPushed,
    PlayerLanded,
    /// A crane released its crate into a column.
    CrateDropped { column: usize },
    /// A crate struck the player and started its countdown.
    CrateSmashed { id: EntityId },
    /// The full bottom row started blowing; points already applied.
    RowScored { points: u32 },
    /// The blown bottom row has been erased from the field.
    RowCleared,
    CraneAdded { slot: usize },
    GameOver,
}
