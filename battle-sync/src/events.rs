//! Inputs consumed and events emitted by a battle session

use crate::board::RotateDir;
use crate::types::Role;

/// Player intent, produced by a keyboard, a bot or a test script
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    /// Shift the falling piece horizontally by `dx` columns
    Move(i32),
    Rotate(RotateDir),
    /// Move one row down now
    SoftDrop,
    HardDrop,
    /// Flip the lobby ready flag
    ReadyToggle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineClear {
    pub count: u32,
    pub rows: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HazardHit {
    pub x: i32,
    pub y: i32,
}

/// Everything a renderer or sound layer needs to react to
#[derive(Debug, Clone, PartialEq)]
pub enum CoreEvent {
    LineCleared(LineClear),
    HazardEliminated(HazardHit),
    GarbageReceived { lines: u32 },
    CountdownStarted { started_at: f64 },
    RoundStarted { round: u32 },
    RoundLost,
    RoundWon,
    /// Round resolved without ending the series; back in the lobby
    BackToLobby,
    MatchOver { winner: Role },
}
