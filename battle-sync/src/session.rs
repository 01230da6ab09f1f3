//! One player's side of a battle: local simulation plus synchronization
//!
//! [`BattleSession`] owns the board, the hazards, the outgoing attack
//! counter, the sync client and the match flow. It is driven by two calls:
//! [`BattleSession::handle_input`] for player intent and
//! [`BattleSession::tick`] at a fixed rate. Network results only reach the
//! game inside `tick`.

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::attack::AttackAccumulator;
use crate::board::{Board, DropStep, LockResult};
use crate::config::GameConfig;
use crate::coordinator::MatchCoordinator;
use crate::events::{CoreEvent, HazardHit, Input, LineClear};
use crate::hazard::{HazardEvent, HazardSim};
use crate::room::PushSnapshot;
use crate::sync_client::SyncClient;
use crate::types::Phase;
use crate::wire::encode_board;

pub struct BattleSession {
    config: GameConfig,
    board: Board,
    hazards: HazardSim,
    attacks: AttackAccumulator,
    sync: SyncClient,
    coordinator: MatchCoordinator,
    rng: StdRng,
    score: u64,
    stomps: u32,
    fall_timer: f32,
    ready: bool,
}

impl BattleSession {
    /// Build a session around a client that already joined its room
    pub fn new(sync: SyncClient, config: GameConfig) -> Self {
        let seed = config.seed.unwrap_or_else(rand::random);
        let board = Board::new(seed).with_lock_delay_steps(config.lock_delay_steps);
        let coordinator = MatchCoordinator::new(sync.role(), sync.config());
        Self {
            hazards: HazardSim::new(config.hazard.clone()),
            board,
            attacks: AttackAccumulator::new(),
            sync,
            coordinator,
            rng: StdRng::seed_from_u64(seed.wrapping_add(1)),
            score: 0,
            stomps: 0,
            fall_timer: 0.0,
            ready: false,
            config,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn hazards(&self) -> &HazardSim {
        &self.hazards
    }

    pub fn sync(&self) -> &SyncClient {
        &self.sync
    }

    pub fn coordinator(&self) -> &MatchCoordinator {
        &self.coordinator
    }

    pub fn phase(&self) -> Phase {
        self.coordinator.phase()
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    pub fn stomps(&self) -> u32 {
        self.stomps
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Give the room slot back
    pub async fn leave(&mut self) -> crate::error::Result<()> {
        self.sync.leave().await
    }

    pub fn handle_input(&mut self, input: Input) -> Vec<CoreEvent> {
        let mut events = Vec::new();
        if input == Input::ReadyToggle {
            if self.phase() == Phase::Waiting {
                self.ready = !self.ready;
                self.sync.set_ready(self.ready);
            }
            return events;
        }
        if self.phase() != Phase::Playing {
            return events;
        }

        match input {
            Input::Move(dx) => {
                self.board.try_shift(dx);
            }
            Input::Rotate(dir) => {
                self.board.try_rotate(dir);
            }
            Input::SoftDrop => {
                self.fall_timer = 0.0;
                self.fall_step(&mut events);
            }
            Input::HardDrop => {
                // walkers anywhere on the way down are stomped before the lock
                if let Some(swept) = self.board.drop_to_rest() {
                    self.stomp(&swept, &mut events);
                    let lock = self.board.lock_and_clear();
                    self.after_lock(lock, &mut events);
                }
            }
            Input::ReadyToggle => {}
        }
        self.check_stomps(&mut events);
        events
    }

    /// Advance the session by `dt` seconds at wall clock `now`
    pub fn tick(&mut self, now: f64, dt: f32) -> Vec<CoreEvent> {
        let mut events = Vec::new();

        let sync_events = self.sync.process_results();
        let flow = self.coordinator.update(now, &mut self.sync, &sync_events);
        for event in &flow {
            match event {
                CoreEvent::RoundStarted { .. } => self.start_round(),
                CoreEvent::BackToLobby => self.ready = false,
                _ => {}
            }
        }
        events.extend(flow);

        if self.phase() == Phase::Playing {
            self.step_playing(dt, &mut events);
        }

        if matches!(self.phase(), Phase::Playing | Phase::RoundOver) {
            let board = &self.board;
            let (score, stomps) = (self.score, self.stomps);
            self.sync.maybe_push(now, &mut self.attacks, || PushSnapshot {
                grid: encode_board(board),
                score,
                stomps,
            });
        }
        self.sync.maybe_pull(now);
        events
    }

    fn step_playing(&mut self, dt: f32, events: &mut Vec<CoreEvent>) {
        let garbage = self.sync.take_garbage();
        if garbage > 0 {
            self.board.apply_garbage(garbage);
            events.push(CoreEvent::GarbageReceived { lines: garbage });
            if self.board.topped_out() {
                events.extend(self.coordinator.report_round_loss(&mut self.sync));
                return;
            }
        }

        self.hazards.spawn_due(dt, &mut self.rng);
        for event in self.hazards.update(dt, &self.board) {
            tracing::trace!("Hazard gone: {:?}", event);
        }
        self.check_stomps(events);

        self.fall_timer += dt;
        while self.fall_timer >= self.config.fall_interval_secs && self.phase() == Phase::Playing {
            self.fall_timer -= self.config.fall_interval_secs;
            self.fall_step(events);
        }
    }

    /// One gravity step. The piece stomps where it stands before it can lock.
    fn fall_step(&mut self, events: &mut Vec<CoreEvent>) {
        self.check_stomps(events);
        match self.board.step_down() {
            DropStep::Moved => self.check_stomps(events),
            DropStep::Locked(lock) => self.after_lock(lock, events),
            DropStep::Idle | DropStep::Resting => {}
        }
    }

    fn check_stomps(&mut self, events: &mut Vec<CoreEvent>) {
        let Some(piece) = self.board.active() else {
            return;
        };
        let cells = piece.cells();
        self.stomp(&cells, events);
    }

    fn stomp(&mut self, cells: &[(i32, i32)], events: &mut Vec<CoreEvent>) {
        for event in self.hazards.eliminate_at(cells) {
            if let HazardEvent::Eliminated { x, y } = event {
                self.stomps += 1;
                self.score += self.config.stomp_score;
                self.attacks.on_hazard_eliminated();
                events.push(CoreEvent::HazardEliminated(HazardHit { x, y }));
            }
        }
    }

    fn after_lock(&mut self, lock: LockResult, events: &mut Vec<CoreEvent>) {
        if lock.lines > 0 {
            self.score += lock.lines as u64 * self.config.line_score;
            self.attacks.on_lines_cleared(lock.lines);
            events.push(CoreEvent::LineCleared(LineClear {
                count: lock.lines,
                rows: lock.rows,
            }));
        }
        if !self.board.spawn_next() {
            events.extend(self.coordinator.report_round_loss(&mut self.sync));
        }
    }

    fn start_round(&mut self) {
        self.board.reset();
        self.hazards.clear();
        self.attacks.reset();
        self.sync.discard_garbage();
        self.fall_timer = 0.0;
        self.ready = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{CellColor, PieceKind};
    use crate::config::{HazardConfig, SyncConfig};
    use crate::hazard::HazardPhase;
    use crate::room;
    use crate::store::{fields, DocPath, MatchStore, MemoryStore};
    use crate::types::Role;
    use serde_json::json;
    use std::sync::Arc;

    async fn session(role: Role, store: &MemoryStore, seed: u64) -> BattleSession {
        let config = SyncConfig::default()
            .with_push_interval_ms(0)
            .with_pull_interval_ms(0);
        let mut sync = SyncClient::new(role, Arc::new(store.clone()), config);
        sync.join(0.0).await.unwrap();
        let game = GameConfig::default()
            .with_seed(seed)
            .with_hazard(HazardConfig::default().with_enabled(false));
        BattleSession::new(sync, game)
    }

    /// Tick without gravity, then wait for the network work it started
    async fn step(s: &mut BattleSession, now: f64) -> Vec<CoreEvent> {
        let events = s.tick(now, 0.0);
        s.sync.flush().await;
        events
    }

    async fn run_until_playing(a: &mut BattleSession, b: &mut BattleSession, t: &mut f64) {
        a.handle_input(Input::ReadyToggle);
        b.handle_input(Input::ReadyToggle);
        a.sync.flush().await;
        b.sync.flush().await;
        for _ in 0..40 {
            *t += 0.5;
            step(a, *t).await;
            step(b, *t).await;
            if a.phase() == Phase::Playing && b.phase() == Phase::Playing {
                return;
            }
        }
        panic!("round never started");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_two_lines_and_a_stomp_send_three_rows() {
        let store = MemoryStore::new();
        let mut a = session(Role::P1, &store, 1).await;
        let mut b = session(Role::P2, &store, 2).await;
        let mut t = 0.0;
        run_until_playing(&mut a, &mut b, &mut t).await;

        // two rows missing only the square's columns
        for y in 18..20 {
            for x in (0..10).filter(|x| *x != 4 && *x != 5) {
                a.board.set_cell(x, y, Some(CellColor::Garbage));
            }
        }
        a.board.spawn_piece(PieceKind::O);
        let events = a.handle_input(Input::HardDrop);
        assert!(events.contains(&CoreEvent::LineCleared(LineClear {
            count: 2,
            rows: vec![18, 19],
        })));
        assert_eq!(a.score(), 2000);

        // a hazard lands in column 2 and the next square comes down on it
        a.hazards.spawn(2, 1);
        while a.hazards.actors()[0].phase() != HazardPhase::Walking {
            a.hazards.update(0.05, &a.board);
        }
        let (hx, hy) = a.hazards.actors()[0].cell();
        assert_eq!((hx, hy), (2, 19));
        a.board.spawn_piece(PieceKind::O);
        assert!(a.board.try_move(-2, 0));
        let events = a.handle_input(Input::HardDrop);
        assert_eq!(
            events,
            vec![CoreEvent::HazardEliminated(HazardHit { x: 2, y: 19 })]
        );
        assert!(a.hazards().actors().is_empty());
        assert_eq!(a.stomps(), 1);
        assert_eq!(a.score(), 2500);
        assert_eq!(a.attacks.pending(), 3);

        t += 0.5;
        step(&mut a, t).await;
        let mut received = 0;
        for _ in 0..4 {
            t += 0.5;
            step(&mut a, t).await;
            for event in step(&mut b, t).await {
                if let CoreEvent::GarbageReceived { lines } = event {
                    received += lines;
                }
            }
        }
        assert_eq!(received, 3);
        assert_eq!(a.sync().sent_total(), 3);
        for y in 17..20 {
            let holes = (0..10).filter(|&x| !b.board().is_occupied(x, y)).count();
            assert_eq!(holes, 1, "row {} should have exactly one gap", y);
        }
        assert!((0..10).all(|x| !b.board().is_occupied(x, 16)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_top_out_loses_the_round() {
        let store = MemoryStore::new();
        let mut a = session(Role::P1, &store, 3).await;
        let mut b = session(Role::P2, &store, 4).await;
        let mut t = 0.0;
        run_until_playing(&mut a, &mut b, &mut t).await;

        for y in 2..20 {
            for x in 1..10 {
                a.board.set_cell(x, y, Some(CellColor::Garbage));
            }
        }
        // the square locks in the spawn area, so no next piece fits
        a.board.spawn_piece(PieceKind::O);
        let events = a.handle_input(Input::HardDrop);
        assert_eq!(events, vec![CoreEvent::RoundLost]);
        assert_eq!(a.phase(), Phase::RoundOver);

        let mut b_events = Vec::new();
        for _ in 0..4 {
            t += 0.5;
            step(&mut a, t).await;
            b_events.extend(step(&mut b, t).await);
        }
        assert!(b_events.contains(&CoreEvent::RoundWon));
        assert!(b_events.contains(&CoreEvent::BackToLobby));
        assert_eq!(a.phase(), Phase::Waiting);
        assert_eq!(b.phase(), Phase::Waiting);
        assert!(!a.is_ready() && !b.is_ready());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_gravity_and_inputs_only_while_playing() {
        let store = MemoryStore::new();
        let mut a = session(Role::P1, &store, 5).await;
        let before = *a.board().active().unwrap();
        assert!(a.handle_input(Input::HardDrop).is_empty());
        a.tick(1.0, 5.0);
        assert_eq!(*a.board().active().unwrap(), before);

        let mut b = session(Role::P2, &store, 6).await;
        let mut t = 1.0;
        run_until_playing(&mut a, &mut b, &mut t).await;
        let start_y = a.board().active().unwrap().y();
        a.tick(t, 1.7);
        assert_eq!(a.board().active().unwrap().y(), start_y + 2);
    }

    /// Hazard standing still at the bottom of column 2
    fn walker_at_column_two(s: &mut BattleSession) {
        s.hazards = HazardSim::new(
            HazardConfig::default()
                .with_enabled(false)
                .with_walk_speed(0.0),
        );
        s.hazards.spawn(2, 1);
        while s.hazards.actors()[0].phase() != HazardPhase::Walking {
            s.hazards.update(0.05, &s.board);
        }
        assert_eq!(s.hazards.actors()[0].cell(), (2, 19));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_gravity_lands_piece_on_hazard() {
        let store = MemoryStore::new();
        let mut a = session(Role::P1, &store, 7).await;
        let mut b = session(Role::P2, &store, 8).await;
        let mut t = 0.0;
        run_until_playing(&mut a, &mut b, &mut t).await;

        walker_at_column_two(&mut a);
        a.board.spawn_piece(PieceKind::O);
        assert_eq!(a.board.try_shift(-2), 2);
        for _ in 0..17 {
            assert!(a.board.try_move(0, 1));
        }

        // one gravity step brings the square onto the walker
        t += 0.5;
        let events = a.tick(t, 0.8);
        assert!(events.contains(&CoreEvent::HazardEliminated(HazardHit { x: 2, y: 19 })));
        assert_eq!(a.stomps(), 1);
        assert!(a.hazards().actors().is_empty());

        a.sync.settle().await;
        assert_eq!(a.sync().sent_total(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_incoming_garbage_tops_out_and_reports_loss() {
        let store = MemoryStore::new();
        let mut a = session(Role::P1, &store, 9).await;
        let mut b = session(Role::P2, &store, 10).await;
        let mut t = 0.0;
        run_until_playing(&mut a, &mut b, &mut t).await;

        for y in 2..20 {
            for x in 1..10 {
                a.board.set_cell(x, y, Some(CellColor::Garbage));
            }
        }
        store
            .patch(DocPath::Player(Role::P2), fields(json!({"attack_count": 2})))
            .await
            .unwrap();

        let mut events = Vec::new();
        for _ in 0..4 {
            t += 0.5;
            events.extend(step(&mut a, t).await);
            if events.contains(&CoreEvent::RoundLost) {
                break;
            }
        }
        assert!(events.contains(&CoreEvent::GarbageReceived { lines: 2 }));
        assert!(events.contains(&CoreEvent::RoundLost));
        assert!(a.board().topped_out());
        assert_eq!(a.phase(), Phase::RoundOver);

        let doc = room::fetch_room(&store).await.unwrap().unwrap();
        assert_eq!(doc.p2.match_wins, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_move_cannot_jump_over_blocks() {
        let store = MemoryStore::new();
        let mut a = session(Role::P1, &store, 11).await;
        let mut b = session(Role::P2, &store, 12).await;
        let mut t = 0.0;
        run_until_playing(&mut a, &mut b, &mut t).await;

        a.board.set_cell(2, 0, Some(CellColor::Garbage));
        a.board.set_cell(2, 1, Some(CellColor::Garbage));
        a.board.spawn_piece(PieceKind::O);
        a.handle_input(Input::Move(-4));
        assert_eq!(a.board().active().unwrap().x(), 3);
    }
}
