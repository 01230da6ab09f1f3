use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

pub const BOARD_COLS: usize = 10;
pub const BOARD_ROWS: usize = 20;

// Spawn origin of every new piece
const SPAWN_X: i32 = BOARD_COLS as i32 / 2 - 1;
const SPAWN_Y: i32 = 0;

// Offsets tried after a plain rotation collides
const ROTATION_KICKS: [(i32, i32); 3] = [(-1, 0), (1, 0), (0, -1)];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellColor {
    I,
    O,
    T,
    S,
    Z,
    J,
    L,
    Garbage,
}

impl CellColor {
    /// Character used for this colour in the shared grid string
    pub fn to_wire(self) -> char {
        match self {
            CellColor::I => '1',
            CellColor::O => '2',
            CellColor::T => '3',
            CellColor::S => '4',
            CellColor::Z => '5',
            CellColor::J => '6',
            CellColor::L => '7',
            CellColor::Garbage => 'G',
        }
    }

    pub fn from_wire(c: char) -> Option<CellColor> {
        match c {
            '1' => Some(CellColor::I),
            '2' => Some(CellColor::O),
            '3' => Some(CellColor::T),
            '4' => Some(CellColor::S),
            '5' => Some(CellColor::Z),
            '6' => Some(CellColor::J),
            '7' => Some(CellColor::L),
            'G' => Some(CellColor::Garbage),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PieceKind {
    I,
    O,
    T,
    S,
    Z,
    J,
    L,
}

impl PieceKind {
    pub const ALL: [PieceKind; 7] = [
        PieceKind::I,
        PieceKind::O,
        PieceKind::T,
        PieceKind::S,
        PieceKind::Z,
        PieceKind::J,
        PieceKind::L,
    ];

    // Cell offsets relative to the piece origin, in spawn orientation
    fn offsets(self) -> [(i32, i32); 4] {
        match self {
            PieceKind::I => [(0, 0), (1, 0), (2, 0), (3, 0)],
            PieceKind::O => [(0, 0), (1, 0), (0, 1), (1, 1)],
            PieceKind::T => [(1, 0), (0, 1), (1, 1), (2, 1)],
            PieceKind::S => [(1, 0), (2, 0), (0, 1), (1, 1)],
            PieceKind::Z => [(0, 0), (1, 0), (1, 1), (2, 1)],
            PieceKind::J => [(0, 0), (0, 1), (1, 1), (2, 1)],
            PieceKind::L => [(2, 0), (0, 1), (1, 1), (2, 1)],
        }
    }

    pub fn color(self) -> CellColor {
        match self {
            PieceKind::I => CellColor::I,
            PieceKind::O => CellColor::O,
            PieceKind::T => CellColor::T,
            PieceKind::S => CellColor::S,
            PieceKind::Z => CellColor::Z,
            PieceKind::J => CellColor::J,
            PieceKind::L => CellColor::L,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RotateDir {
    Clockwise,
    CounterClockwise,
}

/// The falling piece: shape offsets plus board origin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivePiece {
    kind: PieceKind,
    offsets: [(i32, i32); 4],
    x: i32,
    y: i32,
}

impl ActivePiece {
    fn spawn(kind: PieceKind) -> Self {
        ActivePiece {
            kind,
            offsets: kind.offsets(),
            x: SPAWN_X,
            y: SPAWN_Y,
        }
    }

    pub fn kind(&self) -> PieceKind {
        self.kind
    }

    pub fn x(&self) -> i32 {
        self.x
    }

    pub fn y(&self) -> i32 {
        self.y
    }

    /// Absolute board coordinates `(col, row)` of the four cells
    pub fn cells(&self) -> [(i32, i32); 4] {
        self.offsets.map(|(dx, dy)| (self.x + dx, self.y + dy))
    }

    fn moved(&self, dx: i32, dy: i32) -> Self {
        ActivePiece {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }

    fn rotated(&self, dir: RotateDir) -> Self {
        let offsets = match dir {
            RotateDir::Clockwise => self.offsets.map(|(x, y)| (-y, x)),
            RotateDir::CounterClockwise => self.offsets.map(|(x, y)| (y, -x)),
        };
        ActivePiece { offsets, ..*self }
    }
}

/// Cleared rows reported by a lock
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockResult {
    pub lines: u32,
    /// Row indices as they were before the clear, top to bottom
    pub rows: Vec<usize>,
}

/// Outcome of one gravity step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropStep {
    /// No active piece
    Idle,
    Moved,
    /// Blocked, but the lock delay has not run out
    Resting,
    Locked(LockResult),
}

type Row = [Option<CellColor>; BOARD_COLS];

/// 10x20 playfield with one falling piece
///
/// Row 0 is the top. Every operation keeps the active piece inside the
/// board and off occupied cells; illegal moves are reported with `false`.
#[derive(Debug, Clone)]
pub struct Board {
    cells: [Row; BOARD_ROWS],
    active: Option<ActivePiece>,
    bag: Vec<PieceKind>,
    rng: StdRng,
    lock_delay_steps: u32,
    lock_steps: u32,
    topped_out: bool,
}

impl Board {
    /// Create an empty board with its first piece spawned
    pub fn new(seed: u64) -> Self {
        let mut board = Board {
            cells: [[None; BOARD_COLS]; BOARD_ROWS],
            active: None,
            bag: Vec::with_capacity(PieceKind::ALL.len()),
            rng: StdRng::seed_from_u64(seed),
            lock_delay_steps: 0,
            lock_steps: 0,
            topped_out: false,
        };
        board.spawn_next();
        board
    }

    pub fn with_lock_delay_steps(mut self, steps: u32) -> Self {
        self.lock_delay_steps = steps;
        self
    }

    /// Empty the board for a new round and spawn a fresh piece
    pub fn reset(&mut self) {
        self.cells = [[None; BOARD_COLS]; BOARD_ROWS];
        self.active = None;
        self.bag.clear();
        self.lock_steps = 0;
        self.topped_out = false;
        self.spawn_next();
    }

    pub fn cols(&self) -> usize {
        BOARD_COLS
    }

    pub fn rows(&self) -> usize {
        BOARD_ROWS
    }

    /// Locked cell at `(x, y)`; anything outside the board reads as empty
    pub fn cell(&self, x: i32, y: i32) -> Option<CellColor> {
        if Self::in_bounds(x, y) {
            self.cells[y as usize][x as usize]
        } else {
            None
        }
    }

    pub fn is_occupied(&self, x: i32, y: i32) -> bool {
        self.cell(x, y).is_some()
    }

    /// Overwrite a locked cell, for scripted layouts. Out-of-range writes are ignored.
    pub fn set_cell(&mut self, x: usize, y: usize, color: Option<CellColor>) {
        if x < BOARD_COLS && y < BOARD_ROWS {
            self.cells[y][x] = color;
        }
    }

    pub fn active(&self) -> Option<&ActivePiece> {
        self.active.as_ref()
    }

    /// Set once a piece could not be placed; the round is lost
    pub fn topped_out(&self) -> bool {
        self.topped_out
    }

    fn in_bounds(x: i32, y: i32) -> bool {
        x >= 0 && x < BOARD_COLS as i32 && y >= 0 && y < BOARD_ROWS as i32
    }

    fn collides(&self, piece: &ActivePiece) -> bool {
        piece
            .cells()
            .iter()
            .any(|&(x, y)| !Self::in_bounds(x, y) || self.cells[y as usize][x as usize].is_some())
    }

    pub fn try_move(&mut self, dx: i32, dy: i32) -> bool {
        let Some(current) = self.active else {
            return false;
        };
        let moved = current.moved(dx, dy);
        if self.collides(&moved) {
            return false;
        }
        self.active = Some(moved);
        self.lock_steps = 0;
        true
    }

    /// Slide sideways one column at a time, stopping at the first block.
    /// Returns the number of columns actually moved.
    pub fn try_shift(&mut self, dx: i32) -> u32 {
        let step = dx.signum();
        let mut moved = 0;
        while moved < dx.unsigned_abs() && self.try_move(step, 0) {
            moved += 1;
        }
        moved
    }

    pub fn try_rotate(&mut self, dir: RotateDir) -> bool {
        let Some(current) = self.active else {
            return false;
        };
        // The square has no distinct orientations
        if current.kind == PieceKind::O {
            return true;
        }
        let rotated = current.rotated(dir);
        let candidates = std::iter::once((0, 0)).chain(ROTATION_KICKS);
        for (dx, dy) in candidates {
            let kicked = rotated.moved(dx, dy);
            if !self.collides(&kicked) {
                self.active = Some(kicked);
                self.lock_steps = 0;
                return true;
            }
        }
        false
    }

    /// One gravity step: move down, or count towards the lock delay and lock
    pub fn step_down(&mut self) -> DropStep {
        if self.active.is_none() {
            return DropStep::Idle;
        }
        if self.try_move(0, 1) {
            return DropStep::Moved;
        }
        self.lock_steps += 1;
        if self.lock_steps > self.lock_delay_steps {
            DropStep::Locked(self.lock_and_clear())
        } else {
            DropStep::Resting
        }
    }

    /// Move the piece straight down until it rests, without locking.
    /// Returns every cell the piece covered on the way.
    pub fn drop_to_rest(&mut self) -> Option<Vec<(i32, i32)>> {
        let start = self.active?;
        let mut swept = start.cells().to_vec();
        while self.try_move(0, 1) {
            if let Some(piece) = self.active {
                swept.extend(piece.cells());
            }
        }
        Some(swept)
    }

    /// Drop the piece as far as it goes and lock it
    pub fn hard_drop(&mut self) -> Option<LockResult> {
        self.drop_to_rest()?;
        Some(self.lock_and_clear())
    }

    /// Commit the active piece, then remove full rows and shift the rest down
    pub fn lock_and_clear(&mut self) -> LockResult {
        let Some(piece) = self.active.take() else {
            return LockResult::default();
        };
        let color = piece.kind.color();
        for (x, y) in piece.cells() {
            if Self::in_bounds(x, y) {
                self.cells[y as usize][x as usize] = Some(color);
            }
        }
        self.lock_steps = 0;

        let full: Vec<usize> = (0..BOARD_ROWS)
            .filter(|&y| self.cells[y].iter().all(Option::is_some))
            .collect();
        if !full.is_empty() {
            let mut cells = [[None; BOARD_COLS]; BOARD_ROWS];
            let kept = self
                .cells
                .iter()
                .enumerate()
                .filter(|(y, _)| !full.contains(y))
                .map(|(_, row)| *row);
            for (offset, row) in kept.enumerate() {
                cells[full.len() + offset] = row;
            }
            self.cells = cells;
        }

        LockResult {
            lines: full.len() as u32,
            rows: full,
        }
    }

    /// Spawn the next piece from the bag. Returns false on top-out.
    pub fn spawn_next(&mut self) -> bool {
        let kind = self.next_from_bag();
        self.spawn_piece(kind)
    }

    pub(crate) fn spawn_piece(&mut self, kind: PieceKind) -> bool {
        let piece = ActivePiece::spawn(kind);
        self.lock_steps = 0;
        if self.collides(&piece) {
            self.active = None;
            self.topped_out = true;
            return false;
        }
        self.active = Some(piece);
        true
    }

    fn next_from_bag(&mut self) -> PieceKind {
        if self.bag.is_empty() {
            self.bag.extend_from_slice(&PieceKind::ALL);
            self.bag.shuffle(&mut self.rng);
        }
        self.bag.pop().unwrap_or(PieceKind::I)
    }

    /// Push `n` garbage rows in from the bottom, each with one random gap.
    ///
    /// The top `n` rows leave the board. If the raised stack reaches the
    /// falling piece, the piece is lifted; when there is no room left the
    /// board tops out.
    pub fn apply_garbage(&mut self, n: u32) {
        let n = (n as usize).min(BOARD_ROWS);
        for _ in 0..n {
            self.cells.copy_within(1.., 0);
            let gap = self.rng.random_range(0..BOARD_COLS);
            let mut row = [Some(CellColor::Garbage); BOARD_COLS];
            row[gap] = None;
            self.cells[BOARD_ROWS - 1] = row;
        }

        let Some(mut piece) = self.active else {
            return;
        };
        while self.collides(&piece) {
            if piece.y <= 0 {
                self.active = None;
                self.topped_out = true;
                return;
            }
            piece = piece.moved(0, -1);
        }
        self.active = Some(piece);
    }
}
