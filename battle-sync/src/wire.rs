//! Shared room document layout and the grid string format
//!
//! ```text
//! battles/<room> = {
//!   state, countdown, winner, last_update,
//!   p1: { joined, ready, lost, match_wins, grid, score, stomps, attack_count },
//!   p2: { ... }
//! }
//! ```
//!
//! `grid` is 200 characters, row-major from the top row: `0` for an empty
//! cell, `1`..`7` for piece colours and `G` for garbage.

use serde::{Deserialize, Serialize};

use crate::board::{Board, CellColor, BOARD_COLS, BOARD_ROWS};
use crate::error::{Result, SyncError};
use crate::types::{Phase, Role};

pub const GRID_LEN: usize = BOARD_COLS * BOARD_ROWS;

const EMPTY_CELL: char = '0';

/// A decoded board snapshot, as seen by the other player
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireGrid {
    cells: Vec<Option<CellColor>>,
}

impl WireGrid {
    pub fn empty() -> Self {
        WireGrid {
            cells: vec![None; GRID_LEN],
        }
    }

    /// Snapshot of the locked cells with the falling piece drawn in
    pub fn from_board(board: &Board) -> Self {
        let mut cells = Vec::with_capacity(GRID_LEN);
        for y in 0..BOARD_ROWS as i32 {
            for x in 0..BOARD_COLS as i32 {
                cells.push(board.cell(x, y));
            }
        }
        if let Some(piece) = board.active() {
            let color = piece.kind().color();
            for (x, y) in piece.cells() {
                if x >= 0 && (x as usize) < BOARD_COLS && y >= 0 && (y as usize) < BOARD_ROWS {
                    cells[y as usize * BOARD_COLS + x as usize] = Some(color);
                }
            }
        }
        WireGrid { cells }
    }

    /// Parse a grid string. An empty string is an empty board.
    pub fn parse(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Ok(Self::empty());
        }
        let mut cells = Vec::with_capacity(GRID_LEN);
        for ch in s.chars() {
            let cell = match ch {
                EMPTY_CELL => None,
                other => Some(CellColor::from_wire(other).ok_or_else(|| {
                    SyncError::Serialization(format!("Invalid grid character '{}'", other))
                })?),
            };
            cells.push(cell);
        }
        if cells.len() != GRID_LEN {
            return Err(SyncError::Serialization(format!(
                "Grid has {} cells, expected {}",
                cells.len(),
                GRID_LEN
            )));
        }
        Ok(WireGrid { cells })
    }

    pub fn encode(&self) -> String {
        self.cells
            .iter()
            .map(|cell| cell.map_or(EMPTY_CELL, CellColor::to_wire))
            .collect()
    }

    pub fn cols(&self) -> usize {
        BOARD_COLS
    }

    pub fn rows(&self) -> usize {
        BOARD_ROWS
    }

    pub fn cell(&self, x: usize, y: usize) -> Option<CellColor> {
        if x < BOARD_COLS && y < BOARD_ROWS {
            self.cells[y * BOARD_COLS + x]
        } else {
            None
        }
    }

    /// Height of the highest occupied cell, 0 for an empty board
    pub fn stack_height(&self) -> usize {
        (0..BOARD_ROWS)
            .find(|&y| (0..BOARD_COLS).any(|x| self.cell(x, y).is_some()))
            .map_or(0, |top| BOARD_ROWS - top)
    }
}

impl Default for WireGrid {
    fn default() -> Self {
        Self::empty()
    }
}

/// Encode a board, falling piece included, for a push
pub fn encode_board(board: &Board) -> String {
    WireGrid::from_board(board).encode()
}

/// One player's subtree of the room document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerDoc {
    pub joined: bool,
    pub ready: bool,
    pub lost: bool,
    pub match_wins: u32,
    pub grid: String,
    pub score: u64,
    pub stomps: u32,
    /// Cumulative attacks ever sent; only grows
    pub attack_count: u64,
}

impl PlayerDoc {
    fn fresh(joined: bool) -> Self {
        PlayerDoc {
            joined,
            grid: WireGrid::empty().encode(),
            ..Default::default()
        }
    }
}

/// The whole room document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomDoc {
    pub state: String,
    /// Wall clock seconds when the countdown started
    pub countdown: f64,
    /// Slot of the series winner, empty while undecided
    pub winner: String,
    /// Heartbeat of player one, wall clock seconds
    pub last_update: f64,
    pub p1: PlayerDoc,
    pub p2: PlayerDoc,
}

impl RoomDoc {
    /// Document written by player one when it opens the room
    pub fn fresh(now: f64) -> Self {
        RoomDoc {
            state: Phase::Waiting.as_wire().to_string(),
            countdown: 0.0,
            winner: String::new(),
            last_update: now,
            p1: PlayerDoc::fresh(true),
            p2: PlayerDoc::fresh(false),
        }
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn to_value(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn phase(&self) -> Phase {
        Phase::from_wire(&self.state)
    }

    pub fn player(&self, role: Role) -> &PlayerDoc {
        match role {
            Role::P1 => &self.p1,
            Role::P2 => &self.p2,
        }
    }

    pub fn player_mut(&mut self, role: Role) -> &mut PlayerDoc {
        match role {
            Role::P1 => &mut self.p1,
            Role::P2 => &mut self.p2,
        }
    }

    pub fn winner(&self) -> Option<Role> {
        Role::from_slot(&self.winner)
    }

    pub fn both_ready(&self) -> bool {
        self.p1.ready && self.p2.ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_grid_overlays_active_piece() {
        let board = Board::new(4);
        let grid = WireGrid::from_board(&board);
        let piece = board.active().unwrap();
        for (x, y) in piece.cells() {
            assert_eq!(
                grid.cell(x as usize, y as usize),
                Some(piece.kind().color())
            );
        }
        let encoded = grid.encode();
        assert_eq!(encoded.len(), GRID_LEN);
        assert_eq!(encoded.chars().filter(|&c| c != '0').count(), 4);
    }

    #[test]
    fn test_grid_parse() {
        let mut s = "0".repeat(GRID_LEN - 2);
        s.push('G');
        s.push('7');
        let grid = WireGrid::parse(&s).unwrap();
        assert_eq!(grid.cell(8, 19), Some(CellColor::Garbage));
        assert_eq!(grid.cell(9, 19), Some(CellColor::L));
        assert_eq!(grid.stack_height(), 1);
        assert_eq!(grid.encode(), s);

        assert_eq!(WireGrid::parse("").unwrap(), WireGrid::empty());
        assert!(WireGrid::parse("000").is_err());
        assert!(WireGrid::parse(&"x".repeat(GRID_LEN)).is_err());
    }

    #[test]
    fn test_room_doc_field_names() {
        let doc = RoomDoc::fresh(12.5);
        let value = doc.to_value().unwrap();
        assert_eq!(value["state"], "waiting");
        assert_eq!(value["last_update"], 12.5);
        assert_eq!(value["p1"]["joined"], true);
        assert_eq!(value["p2"]["attack_count"], 0);
        assert_eq!(value["p2"]["match_wins"], 0);
        assert_eq!(value["p1"]["grid"].as_str().unwrap().len(), GRID_LEN);
    }

    #[test]
    fn test_room_doc_tolerates_missing_fields() {
        let doc = RoomDoc::from_value(json!({
            "state": "countdown",
            "countdown": 100.0,
            "p2": { "ready": true, "attack_count": 5 }
        }))
        .unwrap();
        assert_eq!(doc.phase(), Phase::Countdown);
        assert!(doc.p2.ready);
        assert!(!doc.p1.ready);
        assert!(!doc.both_ready());
        assert_eq!(doc.player(Role::P2).attack_count, 5);
        assert_eq!(doc.winner(), None);
    }
}
