/// The step function: advances the world by one tick.
///
/// Processing order:
///   1. Player: kinematics, arc continuation, pending request, gravity
///   2. Cranes: travel, drop evaluation, lap reset
///   3. Crates: resting first, then the airborne set
///   4. Bottom row: blow, score, erase, spawn an extra crane
///
/// Reclassification between the static index and the airborne set
/// happens inside each crate's own update, so a later update in the same
/// tick always observes fresh state. Completion comes back as a
/// `Progress` value; nothing re-enters the world behind its back.
///
/// Ledge policy: a crate shoved past a ledge starts falling on the same
/// update its horizontal move completes.

use std::time::Duration;

use crate::domain::entity::{Crane, Dir, EntityId, DROP_ALTITUDE, NULL_ID};
use crate::domain::grid::{Vec2, CELL_SIZE, COLUMNS};
use crate::domain::kinematics::Progress;
use crate::domain::rules;
use super::event::GameEvent;
use super::world::{World, DROP_SCORE, ROW_SCORE_MULTIPLIER};

pub fn step(world: &mut World, elapsed: Duration) -> Vec<GameEvent> {
    if world.paused {
        // A paused world is frozen, not torn down.
        return vec![];
    }

    let dt = elapsed.as_secs_f32();
    let mut events = Vec::new();

    update_player(world, dt, &mut events);
    update_cranes(world, dt, &mut events);
    update_crates(world, dt, &mut events);

    if world.bottom_row_filled() && blow_bottom_row(world, &mut events) {
        events.push(GameEvent::RowCleared);
        if let Some(slot) = world.add_crane() {
            events.push(GameEvent::CraneAdded { slot });
        }
    }

    events
}

// ── Player ──

fn update_player(world: &mut World, dt: f32, events: &mut Vec<GameEvent>) {
    let progress = world.player.update(dt);
    if progress == Progress::Finished {
        // A finished diagonal arc continues: flat onto a stack that
        // reaches the peak, diagonally down otherwise. Anything else
        // ends the move.
        let last = world.player.direction();
        if let (Some(row), Some(column)) = (world.player.body.row(), world.player.body.column()) {
            let next = rules::player_next_direction(&world.heights(), last, row, column);
            world.player.start_move(next, false);
        }
    }

    // A pending request is attempted once the player can take it: idle,
    // or airborne and falling. Illegal requests are dropped silently.
    if !world.requested.is_none()
        && world.player.alive()
        && (world.player.direction().is_none() || world.player.body.is_falling())
    {
        move_player(world, world.requested, events);
        world.requested = Dir::NONE;
    }

    let Some(column) = world.player.body.column() else {
        return;
    };

    if world.requested.is_none() && !world.player.body.is_moving() {
        world.player.idle();
    }

    let surface = world.column_height(column) as f32 * CELL_SIZE;
    if world.player.body.position().y > surface {
        if !world.player.body.is_moving() {
            world.player.start_move(Dir::DOWN, false);
        }
        return;
    }

    if world.player.direction() == Dir::DOWN {
        world.player.body.stop_falling();
        world.player.start_move(Dir::NONE, false);
        events.push(GameEvent::PlayerLanded);
    }
}

fn move_player(world: &mut World, direction: Dir, events: &mut Vec<GameEvent>) {
    let verdict = {
        let refs = world.crate_refs();
        let view = world.field_view(&refs);
        rules::can_player_move(&view, direction)
    };
    let Some(pushed) = verdict else {
        return;
    };

    let push = pushed != NULL_ID;
    if push {
        let shove_dir = if direction.has(Dir::LEFT) {
            Dir::LEFT
        } else {
            Dir::RIGHT
        };
        shove_crate(world, pushed, shove_dir);
        events.push(GameEvent::PlayerPushed);
    }
    world.player.start_move(direction, push);
    if direction.has(Dir::UP) {
        events.push(GameEvent::PlayerJumped);
    }
}

/// Push execution: the crate leaves the static index and joins the
/// airborne set before its shove begins.
fn shove_crate(world: &mut World, id: EntityId, direction: Dir) {
    if let Some(c) = world.crates.get(&id) {
        if let (Some(row), Some(column)) = (c.body.row(), c.body.column()) {
            if world.stacks[column][row] == id {
                world.stacks[column][row] = NULL_ID;
            }
        }
    }
    world.airborne.insert(id);
    if let Some(c) = world.crates.get_mut(&id) {
        c.start_move(direction);
    }
}

// ── Cranes ──

fn update_cranes(world: &mut World, dt: f32, events: &mut Vec<GameEvent>) {
    for slot in 0..world.cranes.len() {
        let Some(mut crane) = world.cranes[slot].take() else {
            continue;
        };
        update_crane(world, &mut crane, dt, events);
        world.cranes[slot] = Some(crane);
    }
}

fn update_crane(world: &mut World, crane: &mut Crane, dt: f32, events: &mut Vec<GameEvent>) {
    let hook_before = crane.hook_position().x;
    crane.update(dt);

    if crane.is_loaded() {
        // The drop is evaluated on the tick the hook crosses the drop
        // lane's center, once per pass.
        let hook_after = crane.hook_position().x;
        let target = crane.drop_column() as f32 * CELL_SIZE;
        let crossed = (hook_before - target) * (hook_after - target) <= 0.0
            && hook_before != hook_after;
        if crossed {
            let legal = {
                let refs = world.crate_refs();
                let view = world.field_view(&refs);
                rules::can_drop_crate(&view, crane.crate_id(), crane.drop_column())
            };
            if legal {
                release_crate(world, crane, events);
            }
        }
    }

    if crane.is_loaded() {
        // Still carrying: the crate rides the hook.
        let hook = crane.hook_position();
        if let Some(c) = world.crates.get_mut(&crane.crate_id()) {
            c.body.set_position(hook);
        }
    }

    if crane.lap_done() {
        if world.player.alive() {
            world.reset_crane(crane, 0.0);
        } else {
            crane.stop();
        }
    }
}

fn release_crate(world: &mut World, crane: &mut Crane, events: &mut Vec<GameEvent>) {
    let column = crane.drop_column();
    let id = crane.release();
    if let Some(c) = world.crates.get_mut(&id) {
        // Snapped into the lane so the fall lands exactly in-column.
        c.body
            .set_position(Vec2::new(column as f32 * CELL_SIZE, DROP_ALTITUDE));
    }
    world.airborne.insert(id);
    if world.player.alive() {
        world.score += DROP_SCORE;
    }
    events.push(GameEvent::CrateDropped { column });
}

// ── Crates ──

fn update_crates(world: &mut World, dt: f32, events: &mut Vec<GameEvent>) {
    let resting: Vec<EntityId> = world
        .stacks
        .iter()
        .flat_map(|column| column.iter().copied())
        .filter(|&id| id != NULL_ID)
        .collect();
    for id in resting {
        update_one_crate(world, id, dt, events);
    }

    // The set mutates during the loop; iterate a copy.
    let airborne: Vec<EntityId> = world.airborne.iter().copied().collect();
    for id in airborne {
        let struck_midair = update_one_crate(world, id, dt, events);
        if struck_midair {
            world.airborne.remove(&id);
            world.crates.remove(&id);
        }
    }
}

/// Advance one crate. Returns true when the crate finished blowing in
/// mid-air (struck in flight) and should be deleted right away.
fn update_one_crate(world: &mut World, id: EntityId, dt: f32, events: &mut Vec<GameEvent>) -> bool {
    let (progress, pos, column, falling) = {
        let Some(c) = world.crates.get_mut(&id) else {
            // A stale id degrades to a no-op.
            return false;
        };
        let progress = c.update(dt);
        if c.is_blowing() {
            return false;
        }
        if c.is_blown() {
            return c.body.position().y > 0.0;
        }
        (progress, c.body.position(), c.body.column(), c.body.is_falling())
    };

    if rules::crate_hits_player(pos, world.player.body.position()) {
        if let Some(c) = world.crates.get_mut(&id) {
            c.blow();
        }
        events.push(GameEvent::CrateSmashed { id });
        if world.player.alive()
            && !world.god_mode
            && !world.player.direction().has(Dir::UP)
        {
            // Caught flat-footed under a crate. A head-on jump instead
            // smashes the crate, which the blow above already did.
            world.player.set_alive(false);
            events.push(GameEvent::GameOver);
        }
        return false;
    }

    // Supporting surface: the crate's own stack, or the taller of the
    // two stacks it spans while between columns.
    let support_rows = match column {
        Some(column) => world.column_height(column),
        None => {
            let exact = pos.x / CELL_SIZE;
            let lo = exact.floor().max(0.0) as usize;
            let hi = exact.ceil().max(0.0) as usize;
            let lo_h = if lo < COLUMNS { world.column_height(lo) } else { 0 };
            let hi_h = if hi < COLUMNS { world.column_height(hi) } else { 0 };
            lo_h.max(hi_h)
        }
    };
    let support = support_rows as f32 * CELL_SIZE;

    if pos.y <= support {
        if falling {
            let landed = match world.crates.get_mut(&id) {
                Some(c) => c.body.stop_falling() == Progress::Finished,
                None => false,
            };
            if landed {
                settle_crate(world, id);
            }
        } else if progress == Progress::Finished {
            // A horizontal shove completed on solid ground.
            settle_crate(world, id);
        }
    } else if !falling {
        // Unsupported and not descending yet: the fall starts now. This
        // covers a shove that just carried the crate past a ledge and a
        // resting crate whose row was cleared from under it.
        begin_fall(world, id);
    }

    false
}

fn settle_crate(world: &mut World, id: EntityId) {
    let Some(c) = world.crates.get(&id) else { return };
    let (Some(row), Some(column)) = (c.body.row(), c.body.column()) else {
        return;
    };
    world.airborne.remove(&id);
    world.stacks[column][row] = id;
}

fn begin_fall(world: &mut World, id: EntityId) {
    let Some(c) = world.crates.get(&id) else { return };
    if let (Some(row), Some(column)) = (c.body.row(), c.body.column()) {
        if world.stacks[column][row] == id {
            world.stacks[column][row] = NULL_ID;
        }
    }
    world.airborne.insert(id);
    if let Some(c) = world.crates.get_mut(&id) {
        c.start_move(Dir::DOWN);
    }
}

// ── Bottom row ──

/// Blow the filled bottom row. Scores once, on the pass that starts any
/// countdown; erases the row once every crate in it has elapsed.
/// Returns true when the row is gone.
fn blow_bottom_row(world: &mut World, events: &mut Vec<GameEvent>) -> bool {
    let mut score_started = false;
    let mut row_blown = true;
    for column in 0..COLUMNS {
        let id = world.stacks[column][0];
        let Some(c) = world.crates.get_mut(&id) else {
            continue;
        };
        if !c.is_blown() {
            score_started |= c.blow();
            row_blown = false;
        } else {
            world.crates.remove(&id);
            world.stacks[column][0] = NULL_ID;
        }
    }

    if score_started {
        let points = world.crane_count() as u32 * ROW_SCORE_MULTIPLIER;
        world.score += points;
        events.push(GameEvent::RowScored { points });
    }
    row_blown
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::{CRANE_ALTITUDE, CRANE_WIDTH};
    use crate::domain::grid::cell_position;

    fn tick(world: &mut World, secs: f32) -> Vec<GameEvent> {
        step(world, Duration::from_secs_f32(secs))
    }

    fn run(world: &mut World, secs: f32, step_secs: f32) -> Vec<GameEvent> {
        let mut events = Vec::new();
        let mut t = 0.0;
        while t < secs {
            events.extend(tick(world, step_secs));
            t += step_secs;
        }
        events
    }

    /// Remove the crane fleet so a test controls every crate itself.
    fn ground_cranes(world: &mut World) {
        for slot in world.cranes.iter_mut() {
            if let Some(crane) = slot.take() {
                world.crates.remove(&crane.crate_id());
            }
        }
    }

    fn place_resting(world: &mut World, row: usize, column: usize) -> EntityId {
        let id = world.spawn_crate();
        world
            .crates
            .get_mut(&id)
            .unwrap()
            .body
            .set_position(cell_position(row, column));
        world.stacks[column][row] = id;
        id
    }

    fn drop_airborne(world: &mut World, x: f32, y: f32) -> EntityId {
        let id = world.spawn_crate();
        {
            let c = world.crates.get_mut(&id).unwrap();
            c.body.set_position(Vec2::new(x, y));
            c.start_move(Dir::DOWN);
        }
        world.airborne.insert(id);
        id
    }

    fn contiguous(world: &World) -> bool {
        world.stacks.iter().all(|column| {
            let height = column
                .iter()
                .position(|&id| id == NULL_ID)
                .unwrap_or(column.len());
            column[height..].iter().all(|&id| id == NULL_ID)
        })
    }

    fn count<F: Fn(&GameEvent) -> bool>(events: &[GameEvent], pred: F) -> usize {
        events.iter().filter(|e| pred(e)).count()
    }

    // ── Bottom row ──

    #[test]
    fn full_bottom_row_scores_once_and_clears() {
        let mut world = World::new(77);
        world.start(2, Some(0));
        assert_eq!(world.crane_count(), 2);

        // Layout 0 leaves only column 5 open; fill it.
        place_resting(&mut world, 0, 5);
        assert!(world.bottom_row_filled());

        // Three ticks: blow + score, countdown, erase.
        let mut events = tick(&mut world, 0.2);
        assert_eq!(world.score(), 2 * ROW_SCORE_MULTIPLIER);
        events.extend(tick(&mut world, 0.2));
        assert_eq!(world.score(), 2 * ROW_SCORE_MULTIPLIER);
        events.extend(tick(&mut world, 0.2));

        assert_eq!(
            count(&events, |e| matches!(e, GameEvent::RowScored { points: 20 })),
            1
        );
        assert_eq!(count(&events, |e| matches!(e, GameEvent::RowCleared)), 1);
        assert!(world.stacks.iter().all(|column| column[0] == NULL_ID));
        // The clear freed a ring slot for one more crane.
        assert_eq!(
            count(&events, |e| matches!(e, GameEvent::CraneAdded { .. })),
            1
        );
        assert_eq!(world.crane_count(), 3);
        assert_eq!(world.score(), 2 * ROW_SCORE_MULTIPLIER);
    }

    // ── Collisions ──

    #[test]
    fn crate_falling_on_player_ends_the_game_once() {
        let mut world = World::new(5);
        world.start(1, Some(7));
        ground_cranes(&mut world);

        // Player sits at (row 0, column 3); a crate falls onto its head.
        let id = drop_airborne(&mut world, 3.0 * CELL_SIZE, 12.0);
        let events = tick(&mut world, 0.01);
        assert!(!world.player.alive());
        assert_eq!(count(&events, |e| matches!(e, GameEvent::GameOver)), 1);
        assert_eq!(
            count(&events, |e| matches!(e, GameEvent::CrateSmashed { .. })),
            1
        );

        // Struck in flight: the crate vanishes once its countdown runs
        // out, and the game-over fires no second time.
        let later = run(&mut world, 0.6, 0.05);
        assert_eq!(count(&later, |e| matches!(e, GameEvent::GameOver)), 0);
        assert!(!world.crates.contains_key(&id));
        assert!(!world.airborne.contains(&id));
    }

    #[test]
    fn god_mode_spares_the_player() {
        let mut world = World::new(5);
        world.start(1, Some(7));
        ground_cranes(&mut world);
        world.god_mode = true;

        drop_airborne(&mut world, 3.0 * CELL_SIZE, 12.0);
        let events = tick(&mut world, 0.01);
        assert!(world.player.alive());
        assert_eq!(count(&events, |e| matches!(e, GameEvent::GameOver)), 0);
        // The crate still smashes against the player.
        assert_eq!(
            count(&events, |e| matches!(e, GameEvent::CrateSmashed { .. })),
            1
        );
    }

    #[test]
    fn upward_jump_smashes_the_crate_instead() {
        let mut world = World::new(5);
        world.start(1, Some(7));
        ground_cranes(&mut world);

        world.player.start_move(Dir::UP, false);
        drop_airborne(&mut world, 3.0 * CELL_SIZE, 12.0);
        let events = tick(&mut world, 0.01);
        assert!(world.player.alive());
        assert_eq!(count(&events, |e| matches!(e, GameEvent::GameOver)), 0);
        assert_eq!(
            count(&events, |e| matches!(e, GameEvent::CrateSmashed { .. })),
            1
        );
    }

    // ── Pushing ──

    #[test]
    fn push_execution_matches_push_legality() {
        let mut world = World::new(8);
        world.start(1, Some(1));
        ground_cranes(&mut world);

        // Layout 1: player on column 4 at row 1; column 5 is two high,
        // so stepping right shoves its top crate into empty column 6.
        let top = world.stacks[5][1];
        assert_ne!(top, NULL_ID);
        {
            let refs = world.crate_refs();
            let view = world.field_view(&refs);
            assert_eq!(rules::can_player_move(&view, Dir::RIGHT), Some(top));
            assert!(rules::can_push_crate(&view, cell_position(1, 5), 5, false));
        }

        world.request_move(Dir::RIGHT);
        let events = run(&mut world, 3.0, 0.1);
        assert_eq!(count(&events, |e| matches!(e, GameEvent::PlayerPushed)), 1);

        // Ledge policy: the shoved crate fell off the two-stack and
        // settled on the floor of column 6.
        assert_eq!(world.stacks[6][0], top);
        assert!(world.airborne.is_empty());
        assert_eq!(world.player.body.column(), Some(5));
        assert_eq!(world.player.body.row(), Some(1));
        assert!(contiguous(&world));
    }

    // ── Cranes ──

    #[test]
    fn crane_releases_on_lane_crossing() {
        let mut world = World::new(13);
        world.start(1, Some(7));

        // Steer the single crane deterministically: rightward pass with
        // the hook aimed at column 5.
        let mut crane = world.cranes[0].take().unwrap();
        let carried = crane.crate_id();
        crane.reset(Vec2::new(-CRANE_WIDTH, CRANE_ALTITUDE), false, 400.0);
        crane.set_drop_column(5);
        world.cranes[0] = Some(crane);

        let events = run(&mut world, 8.0, 0.05);
        assert_eq!(
            count(&events, |e| matches!(e, GameEvent::CrateDropped { column: 5 })),
            1
        );
        assert_eq!(world.score(), DROP_SCORE);
        // The released crate fell straight down its lane and settled.
        assert_eq!(world.stacks[5][0], carried);
        assert!(!world.airborne.contains(&carried));
        assert!(!world.cranes[0].as_ref().unwrap().is_loaded());
    }

    #[test]
    fn halted_crane_stays_put_after_game_over() {
        let mut world = World::new(19);
        world.start(1, Some(7));
        world.player.set_alive(false);

        // Let the crane finish its lap with the player dead.
        let _ = run(&mut world, 30.0, 0.1);
        let crane = world.cranes[0].as_ref().unwrap();
        assert!(!crane.body.is_moving());
        let frozen_x = crane.body.position().x;

        let _ = run(&mut world, 1.0, 0.1);
        assert_eq!(world.cranes[0].as_ref().unwrap().body.position().x, frozen_x);
    }

    // ── Pause ──

    #[test]
    fn paused_step_freezes_everything() {
        let mut world = World::new(21);
        world.start(2, Some(2));
        drop_airborne(&mut world, 0.0, 30.0);
        world.toggle_pause();

        let player_pos = world.player.body.position();
        let crate_pos: Vec<Vec2> = world.crates.values().map(|c| c.body.position()).collect();
        let score = world.score();

        let events = run(&mut world, 2.0, 0.1);
        assert!(events.is_empty());
        assert_eq!(world.player.body.position(), player_pos);
        let after: Vec<Vec2> = world.crates.values().map(|c| c.body.position()).collect();
        assert_eq!(after, crate_pos);
        assert_eq!(world.score(), score);

        // Unpausing resumes the interrupted fall.
        world.toggle_pause();
        let _ = tick(&mut world, 0.1);
        let moved: Vec<Vec2> = world.crates.values().map(|c| c.body.position()).collect();
        assert_ne!(moved, crate_pos);
    }

    // ── Jump arcs ──

    #[test]
    fn diagonal_jump_chains_into_descent() {
        let mut world = World::new(33);
        world.start(1, Some(7));
        ground_cranes(&mut world);

        // One crate under the player at column 5; columns 6 and 7 empty.
        place_resting(&mut world, 0, 5);
        world.player.body.set_position(cell_position(1, 5));

        world.request_move(Dir::UP_RIGHT);
        let events = run(&mut world, 4.0, 0.05);

        assert_eq!(count(&events, |e| matches!(e, GameEvent::PlayerJumped)), 1);
        assert_eq!(count(&events, |e| matches!(e, GameEvent::PlayerLanded)), 1);
        // Up-right to the peak, down-right past it, then a straight fall
        // onto the floor of column 7.
        assert_eq!(world.player.body.column(), Some(7));
        assert_eq!(world.player.body.row(), Some(0));
    }

    #[test]
    fn step_down_lands_on_the_lower_stack() {
        let mut world = World::new(37);
        world.start(1, Some(7));
        ground_cranes(&mut world);

        place_resting(&mut world, 0, 4);
        world.player.body.set_position(cell_position(1, 4));

        world.request_move(Dir::RIGHT);
        let events = run(&mut world, 3.0, 0.05);
        assert_eq!(count(&events, |e| matches!(e, GameEvent::PlayerLanded)), 1);
        assert_eq!(world.player.body.column(), Some(5));
        assert_eq!(world.player.body.row(), Some(0));
    }

    // ── Degradation ──

    #[test]
    fn stale_ids_degrade_to_noops() {
        let mut world = World::new(3);
        world.start(1, Some(0));
        let crates_before = world.crates.len();
        let airborne_before = world.airborne.len();

        let mut events = Vec::new();
        assert!(!update_one_crate(&mut world, 424_242, 0.1, &mut events));
        settle_crate(&mut world, 424_242);
        begin_fall(&mut world, 424_242);

        assert!(events.is_empty());
        assert_eq!(world.crates.len(), crates_before);
        assert_eq!(world.airborne.len(), airborne_before);
    }

    // ── Long-run invariants ──

    #[test]
    fn indexes_stay_consistent_under_load() {
        let mut world = World::new(4242);
        world.start(3, None);
        let _ = run(&mut world, 12.0, 0.05);

        assert!(contiguous(&world));
        for &id in world.crates.keys() {
            let in_stack = world
                .stacks
                .iter()
                .flatten()
                .filter(|&&slot| slot == id)
                .count();
            let in_air = world.airborne.contains(&id) as usize;
            let carried = world
                .cranes
                .iter()
                .flatten()
                .filter(|c| c.crate_id() == id)
                .count();
            assert_eq!(in_stack + in_air + carried, 1, "crate {id} misindexed");
        }
    }
}
