/// Presentation layer: double-buffered, diff-based terminal renderer.
///
/// A frame is composed into a fixed-size cell buffer, compared against
/// the previous frame, and only changed cells are emitted (batched with
/// `queue!`, one flush per frame). The mapping from world units to
/// terminal cells is 2 units per character column and 4 units per
/// character row, so one field cell is a 4x2 block and sub-cell motion
/// stays visible.
///
/// Everything here reads the world through its public queries; no rules
/// live in this module.

use std::io::{self, BufWriter, Stdout, Write};

use crossterm::{
    cursor::{Hide, MoveTo, Show},
    execute, queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen},
};

use crate::domain::entity::{Crane, EntityId, NULL_ID, PLAYER_HEIGHT};
use crate::domain::grid::{Vec2, COLUMNS};
use crate::sim::world::World;

/// Screen layout: one HUD row, the world area, a ground line and a
/// status row.
const WORLD_ROWS: usize = 13;
const ORIGIN_ROW: usize = WORLD_ROWS; // screen row of world y = 0
const FIELD_CHARS: usize = COLUMNS * 4;
const FRAME_W: usize = FIELD_CHARS + 2;
const FRAME_H: usize = WORLD_ROWS + 3;

#[derive(Clone, Copy, PartialEq, Eq)]
struct Cell {
    ch: char,
    fg: Color,
}

const BLANK: Cell = Cell { ch: ' ', fg: Color::Reset };

struct FrameBuffer {
    cells: Vec<Cell>,
}

impl FrameBuffer {
    fn new() -> Self {
        FrameBuffer { cells: vec![BLANK; FRAME_W * FRAME_H] }
    }

    fn clear(&mut self) {
        self.cells.fill(BLANK);
    }

    fn set(&mut self, x: i32, y: i32, ch: char, fg: Color) {
        if x >= 0 && (x as usize) < FRAME_W && y >= 0 && (y as usize) < FRAME_H {
            self.cells[y as usize * FRAME_W + x as usize] = Cell { ch, fg };
        }
    }

    fn text(&mut self, x: i32, y: i32, s: &str, fg: Color) {
        for (i, ch) in s.chars().enumerate() {
            self.set(x + i as i32, y, ch, fg);
        }
    }
}

/// World x in units to leftmost character of a 4-wide sprite.
fn sx(x: f32) -> i32 {
    1 + (x / 2.0).round() as i32
}

/// World y in units to screen row (y up, rows down).
fn sy(y: f32) -> i32 {
    ORIGIN_ROW as i32 - (y / 4.0).round() as i32
}

const CRATE_COLORS: [Color; 4] = [Color::Yellow, Color::DarkYellow, Color::Red, Color::DarkRed];

pub struct Renderer {
    out: BufWriter<Stdout>,
    front: FrameBuffer,
    back: FrameBuffer,
    forced: bool,
    /// Frames since the player died; drives the two-phase collapse.
    death_frames: u32,
    pub debug_overlay: bool,
}

impl Renderer {
    pub fn new() -> Self {
        Renderer {
            out: BufWriter::new(io::stdout()),
            front: FrameBuffer::new(),
            back: FrameBuffer::new(),
            forced: true,
            death_frames: 0,
            debug_overlay: false,
        }
    }

    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(self.out, EnterAlternateScreen, Hide, Clear(ClearType::All))?;
        Ok(())
    }

    pub fn cleanup(&mut self) -> io::Result<()> {
        execute!(self.out, Show, LeaveAlternateScreen, ResetColor)?;
        terminal::disable_raw_mode()?;
        Ok(())
    }

    pub fn render(&mut self, world: &World, high_score: u32) -> io::Result<()> {
        self.front.clear();

        self.draw_frame();
        self.draw_hud(world, high_score);
        for crane in world.cranes.iter().flatten() {
            self.draw_crane(world, crane);
        }
        self.draw_crates(world);
        self.draw_player(world);
        if world.paused {
            self.draw_banner("P A U S E D");
        }
        if !world.player.alive() {
            self.death_frames += 1;
            self.draw_banner("GAME OVER - SPACE RESTARTS");
        } else {
            self.death_frames = 0;
        }
        if self.debug_overlay {
            self.draw_debug(world);
        }

        self.flush_diff()
    }

    // ── Composition ──

    fn draw_frame(&mut self) {
        for y in 0..=WORLD_ROWS as i32 {
            self.front.set(0, y, '|', Color::DarkGrey);
            self.front.set(FRAME_W as i32 - 1, y, '|', Color::DarkGrey);
        }
        for x in 0..FRAME_W as i32 {
            self.front.set(x, WORLD_ROWS as i32 + 1, '=', Color::DarkGrey);
        }
    }

    fn draw_hud(&mut self, world: &World, high_score: u32) {
        let god = if world.god_mode { "  GOD" } else { "" };
        let hud = format!(
            "SCORE {:05}  HI {:05}  CRANES {}{}",
            world.score(),
            high_score.max(world.score()),
            world.crane_count(),
            god,
        );
        self.front.text(1, 0, &hud, Color::White);
    }

    fn draw_crane(&mut self, world: &World, crane: &Crane) {
        let pos = crane.body.position();
        let left = sx(pos.x);
        let top = sy(pos.y) - 1;
        let arm = if crane.is_left() { '<' } else { '>' };
        let body = [arm, '#', '#', arm];
        for (i, ch) in body.iter().enumerate() {
            self.clipped(left + i as i32, top, *ch, Color::Magenta);
        }
        // Hook below the cab; open briefly after a release.
        let hook = if crane.hook_open() { 'v' } else { '+' };
        self.clipped(left + 2, top + 1, hook, Color::Magenta);

        // The carried crate hangs from the hook.
        if crane.is_loaded() {
            if let Some(c) = world.crates.get(&crane.crate_id()) {
                self.draw_crate(c.body.position(), c.style(), false);
            }
        }
    }

    fn draw_crates(&mut self, world: &World) {
        // Resting crates first, then the airborne set; carried crates are
        // drawn with their crane.
        for column in world.stacks.iter() {
            for &id in column.iter() {
                if id != NULL_ID {
                    self.draw_indexed_crate(world, id);
                }
            }
        }
        for &id in world.airborne.iter() {
            self.draw_indexed_crate(world, id);
        }
    }

    fn draw_indexed_crate(&mut self, world: &World, id: EntityId) {
        if let Some(c) = world.crates.get(&id) {
            self.draw_crate(c.body.position(), c.style(), c.is_blowing() || c.is_blown());
        }
    }

    fn draw_crate(&mut self, pos: Vec2, style: u8, blowing: bool) {
        let left = sx(pos.x);
        let bottom = sy(pos.y);
        if blowing {
            for (i, ch) in ['>', '*', '*', '<'].iter().enumerate() {
                self.clipped(left + i as i32, bottom, *ch, Color::Red);
            }
            for (i, ch) in ['\\', '~', '~', '/'].iter().enumerate() {
                self.clipped(left + i as i32, bottom - 1, *ch, Color::Red);
            }
            return;
        }
        let color = CRATE_COLORS[(style % 4) as usize];
        let fill = if style < 4 { '=' } else { '#' };
        for (i, ch) in ['[', fill, fill, ']'].iter().enumerate() {
            self.clipped(left + i as i32, bottom, *ch, color);
            self.clipped(left + i as i32, bottom - 1, *ch, color);
        }
    }

    fn draw_player(&mut self, world: &World) {
        let player = &world.player;
        let pos = player.body.position();
        let left = sx(pos.x);
        let bottom = sy(pos.y);

        if !player.alive() {
            // Two cosmetic phases: a brief stagger, then flat out.
            let sprite: [&str; 4] = if self.death_frames < 30 {
                ["    ", " xx ", " /| ", " /\\ "]
            } else {
                ["    ", "    ", "    ", "x___"]
            };
            self.draw_sprite(left, bottom, &sprite, Color::Red);
            return;
        }

        let rising = player.body.velocity().y > 0.0;
        let falling = player.body.is_falling();
        let sprite: [&str; 4] = if rising || falling {
            ["\\o/ ", " #  ", " #  ", "/ \\ "]
        } else if player.is_pushing() {
            [" o==", " #= ", " #  ", "/ \\ "]
        } else {
            [" o  ", "/#\\ ", " #  ", "/ \\ "]
        };
        let sprite = if player.faces_left() {
            mirror(&sprite)
        } else {
            sprite.map(|s| s.to_string())
        };
        let rows: [&str; 4] = [
            sprite[0].as_str(),
            sprite[1].as_str(),
            sprite[2].as_str(),
            sprite[3].as_str(),
        ];
        self.draw_sprite(left, bottom, &rows, Color::Cyan);
    }

    fn draw_sprite(&mut self, left: i32, bottom: i32, rows: &[&str; 4], fg: Color) {
        let height = (PLAYER_HEIGHT / 4.0) as i32; // rows on screen
        for (i, row) in rows.iter().enumerate() {
            let y = bottom - height + 1 + i as i32;
            for (j, ch) in row.chars().enumerate() {
                if ch != ' ' {
                    self.clipped(left + j as i32, y, ch, fg);
                }
            }
        }
    }

    fn draw_banner(&mut self, text: &str) {
        let y = (WORLD_ROWS / 2) as i32;
        let x = (FRAME_W as i32 - text.len() as i32) / 2;
        self.front.text(x, y, text, Color::White);
    }

    fn draw_debug(&mut self, world: &World) {
        let snapshot = world.debug_snapshot();
        let y = FRAME_H as i32 - 1;
        let mut line = format!("dbg score={} god={}", snapshot.score, snapshot.god_mode);
        for (slot, x, left) in snapshot.cranes {
            let arrow = if left { '<' } else { '>' };
            line.push_str(&format!(" {slot}:{arrow}{x:.0}"));
        }
        self.front.text(0, y, &line, Color::Green);
    }

    /// Plot inside the field frame only; cranes slide behind the edges.
    fn clipped(&mut self, x: i32, y: i32, ch: char, fg: Color) {
        if x >= 1 && x <= FIELD_CHARS as i32 && y >= 0 && y <= WORLD_ROWS as i32 {
            self.front.set(x, y, ch, fg);
        }
    }

    // ── Diff output ──

    fn flush_diff(&mut self) -> io::Result<()> {
        let mut fg = Color::Reset;
        queue!(self.out, SetForegroundColor(fg))?;
        for y in 0..FRAME_H {
            for x in 0..FRAME_W {
                let cell = self.front.cells[y * FRAME_W + x];
                if !self.forced && cell == self.back.cells[y * FRAME_W + x] {
                    continue;
                }
                if cell.fg != fg {
                    fg = cell.fg;
                    queue!(self.out, SetForegroundColor(fg))?;
                }
                queue!(self.out, MoveTo(x as u16, y as u16), Print(cell.ch))?;
            }
        }
        self.out.flush()?;
        std::mem::swap(&mut self.front, &mut self.back);
        self.forced = false;
        Ok(())
    }
}

fn mirror(rows: &[&str; 4]) -> [String; 4] {
    let flip = |c: char| match c {
        '/' => '\\',
        '\\' => '/',
        '<' => '>',
        '>' => '<',
        '[' => ']',
        ']' => '[',
        '(' => ')',
        ')' => '(',
        other => other,
    };
    rows.map(|row| row.chars().rev().map(flip).collect())
}
