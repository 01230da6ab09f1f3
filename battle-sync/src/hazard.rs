//! Walking hazards that live on top of the stack
//!
//! Each actor falls under gravity until it rests one row above the highest
//! occupied cell of its column, then walks sideways, turning at walls and
//! blocks. The resting row is recomputed every tick, so clearing lines
//! under a walker makes it fall again and a stack rising into it crushes it.

use rand::Rng;

use crate::board::{Board, BOARD_COLS, BOARD_ROWS};
use crate::config::HazardConfig;

const MAX_COL: i32 = BOARD_COLS as i32 - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HazardPhase {
    Falling,
    Walking,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HazardActor {
    x: f32,
    y: f32,
    vy: f32,
    dir: i8,
    phase: HazardPhase,
    lifetime: f32,
}

impl HazardActor {
    fn new(col: i32, dir: i8, lifetime: f32) -> Self {
        HazardActor {
            x: col.clamp(0, MAX_COL) as f32,
            y: -1.0,
            vy: 0.0,
            dir: if dir < 0 { -1 } else { 1 },
            phase: HazardPhase::Falling,
            lifetime,
        }
    }

    pub fn x(&self) -> f32 {
        self.x
    }

    pub fn y(&self) -> f32 {
        self.y
    }

    pub fn dir(&self) -> i8 {
        self.dir
    }

    pub fn phase(&self) -> HazardPhase {
        self.phase
    }

    /// Board cell `(col, row)` the actor is standing in
    pub fn cell(&self) -> (i32, i32) {
        (self.x.round() as i32, self.y.round() as i32)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HazardEvent {
    /// Touched by the falling piece while walking
    Eliminated { x: i32, y: i32 },
    /// Crushed by geometry
    Destroyed { x: i32, y: i32 },
    /// Lifetime ran out or it left the board
    Expired { x: i32, y: i32 },
}

#[derive(Debug, Clone)]
pub struct HazardSim {
    actors: Vec<HazardActor>,
    config: HazardConfig,
    spawn_timer: f32,
}

impl HazardSim {
    pub fn new(config: HazardConfig) -> Self {
        HazardSim {
            actors: Vec::new(),
            config,
            spawn_timer: 0.0,
        }
    }

    pub fn actors(&self) -> &[HazardActor] {
        &self.actors
    }

    pub fn clear(&mut self) {
        self.actors.clear();
        self.spawn_timer = 0.0;
    }

    /// Spawn a new actor above column `col`
    pub fn spawn(&mut self, col: i32, dir: i8) {
        self.actors
            .push(HazardActor::new(col, dir, self.config.lifetime_secs));
    }

    /// Advance the spawn timer and spawn at a random column when it fires
    pub fn spawn_due(&mut self, dt: f32, rng: &mut impl Rng) -> bool {
        if !self.config.enabled {
            return false;
        }
        self.spawn_timer += dt;
        if self.spawn_timer < self.config.spawn_interval_secs {
            return false;
        }
        self.spawn_timer = 0.0;
        let col = rng.random_range(0..=MAX_COL);
        let dir = if rng.random_bool(0.5) { 1 } else { -1 };
        self.spawn(col, dir);
        true
    }

    /// Advance every actor by `dt` seconds against the current board
    pub fn update(&mut self, dt: f32, board: &Board) -> Vec<HazardEvent> {
        let mut events = Vec::new();
        let config = &self.config;
        self.actors.retain_mut(|actor| match step_actor(actor, dt, board, config) {
            Some(event) => {
                events.push(event);
                false
            }
            None => true,
        });
        events
    }

    /// Remove walking actors standing in any of `cells`
    pub fn eliminate_at(&mut self, cells: &[(i32, i32)]) -> Vec<HazardEvent> {
        let mut events = Vec::new();
        self.actors.retain(|actor| {
            let cell = actor.cell();
            if actor.phase == HazardPhase::Walking && cells.contains(&cell) {
                events.push(HazardEvent::Eliminated {
                    x: cell.0,
                    y: cell.1,
                });
                false
            } else {
                true
            }
        });
        events
    }
}

// Row an actor in `col` comes to rest on, scanning down from its current row
fn resting_row(board: &Board, col: i32, y: f32) -> f32 {
    let start = y.max(0.0).floor() as i32;
    (start..BOARD_ROWS as i32)
        .find(|&row| board.is_occupied(col, row))
        .map(|row| row as f32 - 1.0)
        .unwrap_or((BOARD_ROWS - 1) as f32)
}

fn step_actor(
    actor: &mut HazardActor,
    dt: f32,
    board: &Board,
    config: &HazardConfig,
) -> Option<HazardEvent> {
    if actor.phase == HazardPhase::Walking {
        let (x, y) = actor.cell();
        if board.is_occupied(x, y) {
            return Some(HazardEvent::Destroyed { x, y });
        }
    }

    actor.vy += config.gravity * dt;
    actor.y += actor.vy * dt;

    let col = (actor.x.round() as i32).clamp(0, MAX_COL);
    let rest = resting_row(board, col, actor.y);
    // column filled to the top row: nowhere to stand
    if rest < 0.0 {
        return Some(HazardEvent::Destroyed { x: col, y: 0 });
    }
    if actor.y >= rest {
        actor.y = rest;
        actor.vy = 0.0;
        actor.phase = HazardPhase::Walking;
        let row = actor.y.round() as i32;
        if board.is_occupied(col, row) {
            return Some(HazardEvent::Destroyed { x: col, y: row });
        }
    } else {
        actor.phase = HazardPhase::Falling;
    }

    if actor.y > BOARD_ROWS as f32 + 1.0 {
        let (x, y) = actor.cell();
        return Some(HazardEvent::Expired { x, y });
    }

    if actor.phase == HazardPhase::Walking {
        actor.lifetime -= dt;
        if actor.lifetime <= 0.0 {
            let (x, y) = actor.cell();
            return Some(HazardEvent::Expired { x, y });
        }

        let next_x = actor.x + actor.dir as f32 * config.walk_speed * dt;
        let row = actor.y.round() as i32;
        if next_x < 0.0 || next_x > MAX_COL as f32 || board.is_occupied(next_x.round() as i32, row)
        {
            actor.dir = -actor.dir;
        } else {
            actor.x = next_x;
        }
    }

    None
}
