//! Input source that plays a battle session on its own

use battle_sync::board::ActivePiece;
use battle_sync::{BattleSession, Board, Input, Phase, RotateDir};

use crate::frequency_regulator::FrequencyRegulator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Placement {
    rotations: u32,
    target_x: i32,
}

/// Greedy placement bot, paced by a frequency regulator
pub struct Bot {
    regulator: FrequencyRegulator,
    plan: Option<Placement>,
    rotations_done: u32,
    planned_for: Option<ActivePiece>,
}

impl Bot {
    pub fn new(regulator: FrequencyRegulator) -> Self {
        Bot {
            regulator,
            plan: None,
            rotations_done: 0,
            planned_for: None,
        }
    }

    /// Inputs to feed into the session this tick
    pub fn next_inputs(&mut self, session: &BattleSession) -> Vec<Input> {
        let budget = self.regulator.step();
        match session.phase() {
            Phase::Waiting if !session.is_ready() && budget > 0 => vec![Input::ReadyToggle],
            Phase::Playing => {
                let mut board = session.board().clone();
                let mut inputs = Vec::new();
                for _ in 0..budget {
                    let Some(input) = self.next_move(&board) else {
                        break;
                    };
                    apply(&mut board, input);
                    inputs.push(input);
                }
                inputs
            }
            _ => {
                self.plan = None;
                self.planned_for = None;
                Vec::new()
            }
        }
    }

    fn next_move(&mut self, board: &Board) -> Option<Input> {
        let piece = *board.active()?;
        // a piece we never saw, or one that was lifted by garbage
        let fresh = match self.planned_for {
            Some(planned) => planned.kind() != piece.kind() || piece.y() < planned.y(),
            None => true,
        };
        if fresh || self.plan.is_none() {
            self.plan = Some(best_placement(board));
            self.rotations_done = 0;
        }
        self.planned_for = Some(piece);
        let plan = self.plan?;

        if self.rotations_done < plan.rotations {
            self.rotations_done += 1;
            return Some(Input::Rotate(RotateDir::Clockwise));
        }
        let input = match piece.x().cmp(&plan.target_x) {
            std::cmp::Ordering::Less => Input::Move(1),
            std::cmp::Ordering::Greater => Input::Move(-1),
            std::cmp::Ordering::Equal => {
                self.plan = None;
                self.planned_for = None;
                Input::HardDrop
            }
        };
        if let Input::Move(dx) = input {
            let mut probe = board.clone();
            if !probe.try_move(dx, 0) {
                self.plan = None;
                self.planned_for = None;
                return Some(Input::HardDrop);
            }
        }
        Some(input)
    }
}

fn apply(board: &mut Board, input: Input) {
    match input {
        Input::Move(dx) => {
            board.try_shift(dx);
        }
        Input::Rotate(dir) => {
            board.try_rotate(dir);
        }
        Input::HardDrop => {
            board.hard_drop();
        }
        Input::SoftDrop | Input::ReadyToggle => {}
    }
}

/// Try every rotation and column on a copy of the board and keep the best
fn best_placement(board: &Board) -> Placement {
    let mut best = Placement {
        rotations: 0,
        target_x: board.active().map(|p| p.x()).unwrap_or(0),
    };
    let mut best_score = f64::MIN;
    for rotations in 0..4 {
        let mut rotated = board.clone();
        if (0..rotations).any(|_| !rotated.try_rotate(RotateDir::Clockwise)) {
            continue;
        }
        for dx in -(board.cols() as i32)..=board.cols() as i32 {
            let mut trial = rotated.clone();
            let step = dx.signum();
            if (0..dx.abs()).any(|_| !trial.try_move(step, 0)) {
                continue;
            }
            let Some(target_x) = trial.active().map(|p| p.x()) else {
                continue;
            };
            let Some(lock) = trial.hard_drop() else {
                continue;
            };
            let score = evaluate(&trial, lock.lines);
            if score > best_score {
                best_score = score;
                best = Placement {
                    rotations,
                    target_x,
                };
            }
        }
    }
    best
}

fn evaluate(board: &Board, lines: u32) -> f64 {
    let cols = board.cols() as i32;
    let rows = board.rows() as i32;
    let mut heights = Vec::with_capacity(cols as usize);
    let mut holes = 0;
    for x in 0..cols {
        let top = (0..rows).find(|&y| board.is_occupied(x, y)).unwrap_or(rows);
        heights.push(rows - top);
        holes += (top..rows).filter(|&y| !board.is_occupied(x, y)).count();
    }
    let aggregate: i32 = heights.iter().sum();
    let bumpiness: i32 = heights.windows(2).map(|w| (w[0] - w[1]).abs()).sum();
    let max_height = heights.iter().copied().max().unwrap_or(0);

    lines as f64 * 8.0
        - holes as f64 * 3.5
        - aggregate as f64 * 0.5
        - bumpiness as f64 * 0.35
        - max_height as f64 * 0.2
}
