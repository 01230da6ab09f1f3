//! Push/pull synchronization of one client with the room document
//!
//! The client never blocks the game loop. Every network operation runs in
//! its own tokio task and reports an outcome over a channel; outcomes are
//! folded into local state only inside [`SyncClient::process_results`], so
//! the owner decides when remote state becomes visible.
//!
//! Pushes and pulls are throttled independently and never overlap with
//! themselves. Transient failures are logged and dropped; the next due
//! tick simply tries again.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;

use crate::attack::{AttackAccumulator, ObservedTotal};
use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::room::{self, PushSnapshot, RoundLoss};
use crate::stats::{StatsTracker, SyncStats};
use crate::store::{DocPath, MatchStore};
use crate::types::{Phase, Role};
use crate::wire::{RoomDoc, WireGrid};

/// Something a merged network result tells the game
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncEvent {
    /// New garbage lines were queued
    GarbageIncoming(u32),
    /// The opponent's `lost` flag turned true
    OpponentLost,
    /// A pull found no room document
    RoomMissing,
}

/// Control writes issued on behalf of the match flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlOp {
    Ready,
    Countdown,
    StartRound,
    Heartbeat,
}

/// What a spawned operation was doing, for outcomes that carry no result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskKind {
    Push,
    Pull,
    Control(ControlOp),
    RoundLoss,
}

enum Outcome {
    /// The task panicked before producing a result
    Aborted(TaskKind),
    Pushed { total: u64, bytes: usize },
    PushFailed { drained: u32, error: SyncError },
    Pulled { doc: Option<RoomDoc>, bytes: usize, at: f64 },
    PullFailed(SyncError),
    Control { op: ControlOp, result: Result<()> },
    RoundLoss(Result<RoundLoss>),
}

/// Last known state of the room as seen by this client
#[derive(Debug, Clone, Default)]
pub struct RemoteView {
    doc: Option<RoomDoc>,
    opponent_grid: WireGrid,
    last_pull_at: Option<f64>,
}

impl RemoteView {
    pub fn doc(&self) -> Option<&RoomDoc> {
        self.doc.as_ref()
    }

    /// Phase of the room, `Waiting` until something was pulled
    pub fn phase(&self) -> Phase {
        self.doc.as_ref().map(RoomDoc::phase).unwrap_or_default()
    }

    /// Last good opponent grid; malformed grids never replace it
    pub fn opponent_grid(&self) -> &WireGrid {
        &self.opponent_grid
    }

    /// Dispatch time of the last pull that returned a document
    pub fn last_pull_at(&self) -> Option<f64> {
        self.last_pull_at
    }
}

/// One player's connection to a room
pub struct SyncClient {
    role: Role,
    store: Arc<dyn MatchStore>,
    config: SyncConfig,
    outcome_tx: flume::Sender<Outcome>,
    outcome_rx: flume::Receiver<Outcome>,
    in_flight: usize,
    push_in_flight: bool,
    pull_in_flight: bool,
    last_push_at: Option<f64>,
    last_pull_at: Option<f64>,
    last_heartbeat_at: Option<f64>,
    sent_total: u64,
    observed: ObservedTotal,
    pending_garbage: u32,
    opponent_lost: bool,
    view: RemoteView,
    stats: StatsTracker,
}

fn due(last: Option<f64>, interval: f64, now: f64) -> bool {
    last.map_or(true, |at| now - at >= interval)
}

impl SyncClient {
    pub fn new(role: Role, store: Arc<dyn MatchStore>, config: SyncConfig) -> Self {
        let (outcome_tx, outcome_rx) = flume::unbounded();
        Self {
            role,
            store,
            config,
            outcome_tx,
            outcome_rx,
            in_flight: 0,
            push_in_flight: false,
            pull_in_flight: false,
            last_push_at: None,
            last_pull_at: None,
            last_heartbeat_at: None,
            sent_total: 0,
            observed: ObservedTotal::new(),
            pending_garbage: 0,
            opponent_lost: false,
            view: RemoteView::default(),
            stats: StatsTracker::new(),
        }
    }

    /// Pick a free slot in the room and join it.
    ///
    /// An absent or abandoned room makes this client player one.
    pub async fn join_auto(store: Arc<dyn MatchStore>, config: SyncConfig, now: f64) -> Result<Self> {
        let role = room::choose_role(store.as_ref(), now, config.stale_room_secs).await?;
        let mut client = Self::new(role, store, config);
        client.join(now).await?;
        Ok(client)
    }

    /// Take this client's slot: player one (re)creates the room, player
    /// two joins the existing one. Seeds the opponent view so totals
    /// already on the document are not turned into garbage.
    pub async fn join(&mut self, now: f64) -> Result<()> {
        match self.role {
            Role::P1 => {
                room::open_room(self.store.as_ref(), now).await?;
            }
            Role::P2 => room::join_room(self.store.as_ref(), self.role).await?,
        }
        let doc = room::fetch_room(self.store.as_ref())
            .await?
            .ok_or_else(|| SyncError::RoomNotFound("room vanished after join".to_string()))?;
        let opponent = doc.player(self.role.opponent());
        self.observed = ObservedTotal::starting_at(opponent.attack_count);
        self.sent_total = doc.player(self.role).attack_count;
        self.opponent_lost = opponent.lost;
        if let Ok(grid) = WireGrid::parse(&opponent.grid) {
            self.view.opponent_grid = grid;
        }
        self.view.doc = Some(doc);
        self.view.last_pull_at = Some(now);
        if self.role.is_owner() {
            self.last_heartbeat_at = Some(now);
        }
        tracing::info!("Client '{}' joined the room", self.role);
        Ok(())
    }

    /// Give the slot back
    pub async fn leave(&mut self) -> Result<()> {
        self.settle().await;
        room::leave_room(self.store.as_ref(), self.role).await?;
        tracing::info!("Client '{}' left the room", self.role);
        Ok(())
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn view(&self) -> &RemoteView {
        &self.view
    }

    pub fn stats(&self) -> SyncStats {
        self.stats.get_stats()
    }

    /// Cumulative total confirmed by the last successful push
    pub fn sent_total(&self) -> u64 {
        self.sent_total
    }

    /// Highest opponent total turned into garbage so far
    pub fn observed_total(&self) -> u64 {
        self.observed.total()
    }

    pub fn pending_garbage(&self) -> u32 {
        self.pending_garbage
    }

    /// Hand queued garbage to the board
    pub fn take_garbage(&mut self) -> u32 {
        std::mem::take(&mut self.pending_garbage)
    }

    /// Drop queued garbage, used when a new round starts
    pub fn discard_garbage(&mut self) {
        if self.pending_garbage > 0 {
            tracing::debug!(
                "Client '{}' discarding {} garbage line(s)",
                self.role,
                self.pending_garbage
            );
        }
        self.pending_garbage = 0;
    }

    /// Number of spawned operations whose outcome was not merged yet
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// True when no pull has succeeded for longer than the stale window
    pub fn is_stale(&self, now: f64) -> bool {
        self.view
            .last_pull_at
            .map_or(true, |at| now - at > self.config.stale_view_secs())
    }

    fn spawn<F>(&mut self, kind: TaskKind, task: F)
    where
        F: Future<Output = Outcome> + Send + 'static,
    {
        self.in_flight += 1;
        let tx = self.outcome_tx.clone();
        tokio::spawn(async move {
            // each spawned task reports exactly once, panic included
            let outcome = AssertUnwindSafe(task)
                .catch_unwind()
                .await
                .unwrap_or(Outcome::Aborted(kind));
            let _ = tx.send(outcome);
        });
    }

    /// Start a push if one is due and none is running.
    ///
    /// Attacks are drained only when the push is actually dispatched, and
    /// the snapshot is built lazily for the same reason. Returns whether a
    /// push was started.
    pub fn maybe_push<F>(&mut self, now: f64, attacks: &mut AttackAccumulator, snapshot: F) -> bool
    where
        F: FnOnce() -> PushSnapshot,
    {
        if self.push_in_flight || !due(self.last_push_at, self.config.push_interval_secs(), now) {
            return false;
        }
        self.push_in_flight = true;
        self.last_push_at = Some(now);
        let drained = attacks.drain_for_sync();
        let snapshot = snapshot();
        let store = self.store.clone();
        let role = self.role;
        tracing::trace!("Client '{}' pushing with {} new attack(s)", role, drained);
        self.spawn(TaskKind::Push, async move {
            let bytes = snapshot.grid.len();
            match room::push_snapshot(store.as_ref(), role, &snapshot, drained).await {
                Ok(total) => Outcome::Pushed { total, bytes },
                Err(error) => Outcome::PushFailed { drained, error },
            }
        });
        true
    }

    /// Start a pull if one is due and none is running. Player one also
    /// refreshes the room heartbeat from here.
    pub fn maybe_pull(&mut self, now: f64) -> bool {
        if self.role.is_owner()
            && due(
                self.last_heartbeat_at,
                self.config.heartbeat_interval_secs(),
                now,
            )
        {
            self.last_heartbeat_at = Some(now);
            let store = self.store.clone();
            self.spawn(TaskKind::Control(ControlOp::Heartbeat), async move {
                Outcome::Control {
                    op: ControlOp::Heartbeat,
                    result: room::heartbeat(store.as_ref(), now).await,
                }
            });
        }

        if self.pull_in_flight || !due(self.last_pull_at, self.config.pull_interval_secs(), now) {
            return false;
        }
        self.pull_in_flight = true;
        self.last_pull_at = Some(now);
        let store = self.store.clone();
        self.spawn(TaskKind::Pull, async move {
            let value = match store.get(DocPath::Room).await {
                Ok(value) => value,
                Err(error) => return Outcome::PullFailed(error),
            };
            let Some(value) = value else {
                return Outcome::Pulled {
                    doc: None,
                    bytes: 0,
                    at: now,
                };
            };
            let bytes = value.to_string().len();
            match RoomDoc::from_value(value) {
                Ok(doc) => Outcome::Pulled {
                    doc: Some(doc),
                    bytes,
                    at: now,
                },
                Err(error) => Outcome::PullFailed(error),
            }
        });
        true
    }

    pub fn set_ready(&mut self, ready: bool) {
        let store = self.store.clone();
        let role = self.role;
        self.spawn(TaskKind::Control(ControlOp::Ready), async move {
            Outcome::Control {
                op: ControlOp::Ready,
                result: room::set_ready(store.as_ref(), role, ready).await,
            }
        });
    }

    /// Write the countdown start; player one only
    pub fn request_countdown(&mut self, now: f64) -> Result<()> {
        if !self.role.is_owner() {
            return Err(SyncError::NotRoomOwner);
        }
        let store = self.store.clone();
        self.spawn(TaskKind::Control(ControlOp::Countdown), async move {
            Outcome::Control {
                op: ControlOp::Countdown,
                result: room::start_countdown(store.as_ref(), now).await,
            }
        });
        Ok(())
    }

    /// Write `state=playing`; player one only
    pub fn request_playing(&mut self) -> Result<()> {
        if !self.role.is_owner() {
            return Err(SyncError::NotRoomOwner);
        }
        let store = self.store.clone();
        self.spawn(TaskKind::Control(ControlOp::StartRound), async move {
            Outcome::Control {
                op: ControlOp::StartRound,
                result: room::start_round(store.as_ref()).await,
            }
        });
        Ok(())
    }

    pub fn report_round_loss(&mut self, best_of: u32) {
        let store = self.store.clone();
        let role = self.role;
        self.spawn(TaskKind::RoundLoss, async move {
            Outcome::RoundLoss(room::report_round_loss(store.as_ref(), role, best_of).await)
        });
    }

    /// Merge every outcome that has arrived so far
    pub fn process_results(&mut self) -> Vec<SyncEvent> {
        let mut events = Vec::new();
        while let Ok(outcome) = self.outcome_rx.try_recv() {
            self.merge(outcome, &mut events);
        }
        events
    }

    /// Wait for everything in flight and merge it
    pub async fn settle(&mut self) -> Vec<SyncEvent> {
        let mut events = Vec::new();
        while self.in_flight > 0 {
            match self.outcome_rx.recv_async().await {
                Ok(outcome) => self.merge(outcome, &mut events),
                Err(_) => break,
            }
        }
        events
    }

    /// Wait until every spawned operation has reported, leaving the
    /// outcomes queued for the next `process_results`
    pub async fn flush(&self) {
        while self.outcome_rx.len() < self.in_flight {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    fn merge(&mut self, outcome: Outcome, events: &mut Vec<SyncEvent>) {
        self.in_flight = self.in_flight.saturating_sub(1);
        match outcome {
            Outcome::Aborted(kind) => {
                match kind {
                    TaskKind::Push => {
                        self.push_in_flight = false;
                        self.stats.record_push_failure();
                    }
                    TaskKind::Pull => {
                        self.pull_in_flight = false;
                        self.stats.record_pull_failure();
                    }
                    TaskKind::Control(_) | TaskKind::RoundLoss => {}
                }
                tracing::warn!("Client '{}' {:?} task panicked", self.role, kind);
            }
            Outcome::Pushed { total, bytes } => {
                self.push_in_flight = false;
                self.stats.record_push(bytes);
                self.sent_total = total;
                tracing::debug!("Client '{}' pushed, attack total {}", self.role, total);
            }
            Outcome::PushFailed { drained, error } => {
                self.push_in_flight = false;
                self.stats.record_push_failure();
                if drained > 0 {
                    tracing::warn!(
                        "Client '{}' push failed, {} attack(s) lost: {}",
                        self.role,
                        drained,
                        error
                    );
                } else {
                    tracing::warn!("Client '{}' push failed: {}", self.role, error);
                }
            }
            Outcome::Pulled {
                doc: Some(doc),
                bytes,
                at,
            } => {
                self.pull_in_flight = false;
                self.stats.record_pull(bytes);
                self.apply_pull(doc, at, events);
            }
            Outcome::Pulled { doc: None, .. } => {
                self.pull_in_flight = false;
                self.stats.record_pull_failure();
                tracing::warn!("Client '{}' pulled an empty room", self.role);
                events.push(SyncEvent::RoomMissing);
            }
            Outcome::PullFailed(error) => {
                self.pull_in_flight = false;
                self.stats.record_pull_failure();
                tracing::warn!("Client '{}' pull failed: {}", self.role, error);
            }
            Outcome::Control { op, result } => {
                if let Err(e) = result {
                    tracing::warn!("Client '{}' {:?} write failed: {}", self.role, op, e);
                }
            }
            Outcome::RoundLoss(Ok(loss)) => {
                tracing::info!(
                    "Client '{}' reported its loss, opponent has {} win(s){}",
                    self.role,
                    loss.opponent_wins,
                    if loss.match_over { ", match over" } else { "" }
                );
            }
            Outcome::RoundLoss(Err(e)) => {
                tracing::warn!("Client '{}' failed to report its loss: {}", self.role, e);
            }
        }
    }

    fn apply_pull(&mut self, doc: RoomDoc, at: f64, events: &mut Vec<SyncEvent>) {
        let opponent = doc.player(self.role.opponent());
        match WireGrid::parse(&opponent.grid) {
            Ok(grid) => self.view.opponent_grid = grid,
            Err(e) => tracing::debug!("Client '{}' kept last opponent grid: {}", self.role, e),
        }

        let incoming = self.observed.observe(opponent.attack_count);
        if incoming > 0 {
            self.pending_garbage = self.pending_garbage.saturating_add(incoming);
            tracing::debug!(
                "Client '{}' queued {} garbage line(s), opponent total {}",
                self.role,
                incoming,
                opponent.attack_count
            );
            events.push(SyncEvent::GarbageIncoming(incoming));
        }

        if opponent.lost && !self.opponent_lost {
            events.push(SyncEvent::OpponentLost);
        }
        self.opponent_lost = opponent.lost;

        self.view.doc = Some(doc);
        self.view.last_pull_at = Some(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{fields, MemoryStore};
    use futures::future::BoxFuture;
    use serde_json::json;

    fn fast_config() -> SyncConfig {
        SyncConfig::default()
            .with_push_interval_ms(0)
            .with_pull_interval_ms(0)
    }

    async fn pair(store: &MemoryStore, config: SyncConfig) -> (SyncClient, SyncClient) {
        let mut p1 = SyncClient::new(Role::P1, Arc::new(store.clone()), config.clone());
        p1.join(0.0).await.unwrap();
        let mut p2 = SyncClient::new(Role::P2, Arc::new(store.clone()), config);
        p2.join(0.0).await.unwrap();
        (p1, p2)
    }

    async fn pull(client: &mut SyncClient, now: f64) -> Vec<SyncEvent> {
        assert!(client.maybe_pull(now));
        client.settle().await
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_push_is_throttled_and_never_overlaps() {
        let store = MemoryStore::new();
        let (mut p1, _p2) = pair(&store, SyncConfig::default()).await;
        let mut attacks = AttackAccumulator::new();

        attacks.on_lines_cleared(1);
        assert!(p1.maybe_push(0.0, &mut attacks, PushSnapshot::default));
        assert_eq!(attacks.pending(), 0);

        // still in flight: nothing drained even though the interval passed
        attacks.on_lines_cleared(2);
        assert!(!p1.maybe_push(1.0, &mut attacks, PushSnapshot::default));
        assert_eq!(attacks.pending(), 2);

        p1.settle().await;
        assert_eq!(p1.sent_total(), 1);
        assert!(!p1.maybe_push(0.2, &mut attacks, PushSnapshot::default));
        assert_eq!(attacks.pending(), 2);
        assert!(p1.maybe_push(0.4, &mut attacks, PushSnapshot::default));
        p1.settle().await;
        assert_eq!(p1.sent_total(), 3);
        assert_eq!(p1.stats().pushes, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_failed_push_loses_its_batch() {
        let store = MemoryStore::new();
        let (mut p1, _p2) = pair(&store, fast_config()).await;
        let mut attacks = AttackAccumulator::new();

        store.set_offline(true);
        attacks.on_lines_cleared(2);
        assert!(p1.maybe_push(1.0, &mut attacks, PushSnapshot::default));
        let events = p1.settle().await;
        assert!(events.is_empty());
        assert_eq!(p1.stats().push_failures, 1);
        assert_eq!(attacks.pending(), 0);

        // a failed pull is swallowed too
        assert!(p1.maybe_pull(1.0));
        assert!(p1.settle().await.is_empty());
        assert_eq!(p1.stats().pull_failures, 1);

        store.set_offline(false);
        attacks.on_hazard_eliminated();
        assert!(p1.maybe_push(2.0, &mut attacks, PushSnapshot::default));
        p1.settle().await;
        assert_eq!(p1.sent_total(), 1);
        let doc = room::fetch_room(&store).await.unwrap().unwrap();
        assert_eq!(doc.p1.attack_count, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_two_lines_and_a_stomp_arrive_as_three() {
        let store = MemoryStore::new();
        let (mut p1, mut p2) = pair(&store, fast_config()).await;
        let mut attacks = AttackAccumulator::new();

        attacks.on_lines_cleared(2);
        assert!(p1.maybe_push(1.0, &mut attacks, PushSnapshot::default));
        p1.settle().await;
        let mut received = 0;
        for event in pull(&mut p2, 1.1).await {
            if let SyncEvent::GarbageIncoming(n) = event {
                received += n;
            }
        }
        assert_eq!(received, 2);

        attacks.on_hazard_eliminated();
        assert!(p1.maybe_push(2.0, &mut attacks, PushSnapshot::default));
        p1.settle().await;
        for i in 0..5 {
            pull(&mut p2, 2.0 + i as f64).await;
        }
        assert_eq!(p2.pending_garbage(), 3);
        assert_eq!(p2.observed_total(), 3);
        assert_eq!(p2.take_garbage(), 3);
        assert_eq!(p2.take_garbage(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_join_does_not_replay_existing_total() {
        let store = MemoryStore::new();
        let mut p1 = SyncClient::new(Role::P1, Arc::new(store.clone()), fast_config());
        p1.join(0.0).await.unwrap();
        store
            .patch(DocPath::Player(Role::P1), fields(json!({"attack_count": 5})))
            .await
            .unwrap();

        let mut p2 = SyncClient::new(Role::P2, Arc::new(store.clone()), fast_config());
        p2.join(1.0).await.unwrap();
        assert!(pull(&mut p2, 2.0).await.is_empty());
        assert_eq!(p2.pending_garbage(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_opponent_lost_is_reported_once() {
        let store = MemoryStore::new();
        let (mut p1, _p2) = pair(&store, fast_config()).await;
        store
            .patch(DocPath::Player(Role::P2), fields(json!({"lost": true})))
            .await
            .unwrap();

        assert_eq!(pull(&mut p1, 1.0).await, vec![SyncEvent::OpponentLost]);
        assert!(pull(&mut p1, 2.0).await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_malformed_grid_keeps_last_good_one() {
        let store = MemoryStore::new();
        let (mut p1, _p2) = pair(&store, fast_config()).await;
        let mut grid = "0".repeat(199);
        grid.push('G');
        store
            .patch(DocPath::Player(Role::P2), fields(json!({"grid": grid})))
            .await
            .unwrap();
        pull(&mut p1, 1.0).await;
        assert_eq!(p1.view().opponent_grid().encode(), grid);

        store
            .patch(DocPath::Player(Role::P2), fields(json!({"grid": "xyz"})))
            .await
            .unwrap();
        pull(&mut p1, 2.0).await;
        assert_eq!(p1.view().opponent_grid().encode(), grid);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_owner_only_writes() {
        let store = MemoryStore::new();
        let (mut p1, mut p2) = pair(&store, fast_config()).await;
        assert!(matches!(
            p2.request_countdown(5.0),
            Err(SyncError::NotRoomOwner)
        ));
        assert!(matches!(p2.request_playing(), Err(SyncError::NotRoomOwner)));

        p1.request_countdown(5.0).unwrap();
        p1.settle().await;
        pull(&mut p2, 5.1).await;
        assert_eq!(p2.view().phase(), Phase::Countdown);
        assert_eq!(p2.view().doc().unwrap().countdown, 5.0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_join_auto_and_staleness() {
        let store = MemoryStore::new();
        let shared: Arc<dyn MatchStore> = Arc::new(store.clone());
        let p1 = SyncClient::join_auto(shared.clone(), fast_config(), 10.0)
            .await
            .unwrap();
        assert_eq!(p1.role(), Role::P1);
        let mut p2 = SyncClient::join_auto(shared.clone(), fast_config(), 11.0)
            .await
            .unwrap();
        assert_eq!(p2.role(), Role::P2);
        assert!(matches!(
            SyncClient::join_auto(shared, fast_config(), 12.0).await,
            Err(SyncError::RoomFull(_))
        ));

        assert!(!p2.is_stale(12.0));
        assert!(p2.is_stale(20.0));
        pull(&mut p2, 20.0).await;
        assert!(!p2.is_stale(21.0));
    }

    /// Store whose every request panics inside the spawned task
    struct PanickingStore;

    impl MatchStore for PanickingStore {
        fn get(&self, _path: DocPath) -> BoxFuture<'_, Result<Option<serde_json::Value>>> {
            async { panic!("store backend bug") }.boxed()
        }

        fn put(&self, _path: DocPath, _value: serde_json::Value) -> BoxFuture<'_, Result<()>> {
            async { panic!("store backend bug") }.boxed()
        }

        fn patch(
            &self,
            _path: DocPath,
            _fields: serde_json::Map<String, serde_json::Value>,
        ) -> BoxFuture<'_, Result<()>> {
            async { panic!("store backend bug") }.boxed()
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_panicking_task_still_settles() {
        let mut client = SyncClient::new(Role::P2, Arc::new(PanickingStore), fast_config());
        let mut attacks = AttackAccumulator::new();
        attacks.on_lines_cleared(1);

        assert!(client.maybe_push(1.0, &mut attacks, PushSnapshot::default));
        assert!(client.maybe_pull(1.0));
        client.set_ready(true);
        assert_eq!(client.in_flight(), 3);

        client.flush().await;
        assert!(client.settle().await.is_empty());
        assert_eq!(client.in_flight(), 0);
        let stats = client.stats();
        assert_eq!(stats.push_failures, 1);
        assert_eq!(stats.pull_failures, 1);

        // neither direction is stuck behind the lost task
        assert!(client.maybe_push(2.0, &mut attacks, PushSnapshot::default));
        assert!(client.maybe_pull(2.0));
        client.settle().await;
        assert_eq!(client.in_flight(), 0);
        assert_eq!(client.stats().push_failures, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_owner_heartbeat() {
        let store = MemoryStore::new();
        let config = fast_config().with_heartbeat_interval_ms(5000);
        let (mut p1, _p2) = pair(&store, config).await;
        pull(&mut p1, 3.0).await;
        assert_eq!(p1.view().doc().unwrap().last_update, 0.0);
        pull(&mut p1, 6.0).await;
        let doc = room::fetch_room(&store).await.unwrap().unwrap();
        assert_eq!(doc.last_update, 6.0);
    }
}
