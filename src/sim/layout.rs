/// Initial field layouts.
///
/// A game starts either from one of the hand-authored layouts below or
/// from the random generator. The random generator obeys three rules:
/// no stack higher than `MAX_INITIAL_STACK`, at least one stack at that
/// cap (which follows from placing `INITIAL_CRATES` crates under the
/// cap), and the last crate placed never completes the bottom row.

use crate::domain::grid::COLUMNS;
use super::rng::Rng;

/// Crates placed by the random generator.
pub const INITIAL_CRATES: usize = 12;

/// Tallest stack the generator may build.
pub const MAX_INITIAL_STACK: usize = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Layout {
    /// Column the player starts on, at the top of its stack.
    pub player_column: usize,
    /// Initial stack height per column.
    pub stacks: [usize; COLUMNS],
}

/// Hand-authored starting positions, selectable by index.
pub const LAYOUTS: [Layout; 8] = [
    Layout { player_column: 3, stacks: [1, 1, 1, 1, 1, 0, 1, 1, 1, 1, 1, 1] },
    Layout { player_column: 4, stacks: [0, 0, 1, 2, 1, 2, 0, 0, 0, 0, 0, 0] },
    Layout { player_column: 5, stacks: [0, 0, 0, 1, 2, 3, 2, 1, 0, 0, 0, 0] },
    Layout { player_column: 2, stacks: [0, 3, 2, 2, 2, 2, 2, 2, 2, 3, 4, 5] },
    Layout { player_column: 1, stacks: [1, 2, 1, 0, 1, 2, 1, 0, 1, 2, 1, 2] },
    Layout { player_column: 1, stacks: [5, 0, 4, 5, 5, 5, 5, 5, 5, 5, 5, 5] },
    Layout { player_column: 4, stacks: [1, 2, 0, 2, 1, 2, 1, 1, 1, 1, 1, 1] },
    Layout { player_column: 3, stacks: [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0] },
];

/// Roll a fresh random layout.
pub fn random_layout(rng: &mut Rng) -> Layout {
    let mut stacks = [0usize; COLUMNS];
    let mut used = [false; COLUMNS];
    for i in 0..INITIAL_CRATES {
        let column = loop {
            let column = rng.below(COLUMNS as u32) as usize;
            if stacks[column] >= MAX_INITIAL_STACK {
                continue;
            }
            // The twelfth distinct column would fill the bottom row.
            let occupied = used.iter().filter(|&&u| u).count();
            if i == INITIAL_CRATES - 1 && occupied == COLUMNS - 1 && !used[column] {
                continue;
            }
            break column;
        };
        used[column] = true;
        stacks[column] += 1;
    }

    // The player starts on the leftmost stack that reached the cap.
    let player_column = stacks
        .iter()
        .position(|&h| h == MAX_INITIAL_STACK)
        .unwrap_or(0);
    Layout { player_column, stacks }
}
