//! Best-of-N match flow driven by the pulled room document
//!
//! ```text
//! Waiting -> Countdown -> Playing -> RoundOver -> Waiting
//!                                  \-> MatchOver
//! ```
//!
//! The local phase follows the remote `state` with a few local shortcuts:
//! the countdown ends on the local clock without waiting for another pull,
//! and a lost round is entered as soon as it is reported.

use crate::config::SyncConfig;
use crate::events::CoreEvent;
use crate::sync_client::{SyncClient, SyncEvent};
use crate::types::{series_winner, Phase, Role};
use crate::wire::RoomDoc;

/// The fields of the room document the match flow reads
#[derive(Debug, Clone, Copy)]
struct RemoteSummary {
    phase: Phase,
    countdown: f64,
    both_ready: bool,
    p1_wins: u32,
    p2_wins: u32,
    winner: Option<Role>,
}

impl RemoteSummary {
    fn of(doc: &RoomDoc) -> Self {
        RemoteSummary {
            phase: doc.phase(),
            countdown: doc.countdown,
            both_ready: doc.both_ready(),
            p1_wins: doc.p1.match_wins,
            p2_wins: doc.p2.match_wins,
            winner: doc.winner(),
        }
    }

    fn wins(&self, role: Role) -> u32 {
        match role {
            Role::P1 => self.p1_wins,
            Role::P2 => self.p2_wins,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MatchCoordinator {
    role: Role,
    best_of: u32,
    countdown_secs: f64,
    phase: Phase,
    round: u32,
    countdown_started_at: Option<f64>,
    countdown_requested: bool,
    wins_at_round_start: u32,
    round_winner: Option<Role>,
    match_winner: Option<Role>,
}

impl MatchCoordinator {
    pub fn new(role: Role, config: &SyncConfig) -> Self {
        Self {
            role,
            best_of: config.best_of.max(1),
            countdown_secs: config.countdown_secs(),
            phase: Phase::Waiting,
            round: 0,
            countdown_started_at: None,
            countdown_requested: false,
            wins_at_round_start: 0,
            round_winner: None,
            match_winner: None,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn best_of(&self) -> u32 {
        self.best_of
    }

    /// Rounds started so far, 1-based once the first one begins
    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn round_winner(&self) -> Option<Role> {
        self.round_winner
    }

    pub fn match_winner(&self) -> Option<Role> {
        self.match_winner
    }

    /// Seconds left before the round starts, while counting down
    pub fn countdown_remaining(&self, now: f64) -> Option<f64> {
        match (self.phase, self.countdown_started_at) {
            (Phase::Countdown, Some(at)) => Some((self.countdown_secs - (now - at)).max(0.0)),
            _ => None,
        }
    }

    /// Advance the match flow from the latest remote view and the events
    /// of the last merge
    pub fn update(&mut self, now: f64, sync: &mut SyncClient, sync_events: &[SyncEvent]) -> Vec<CoreEvent> {
        let mut events = Vec::new();
        if self.phase == Phase::MatchOver {
            return events;
        }
        let Some(remote) = sync.view().doc().map(RemoteSummary::of) else {
            return events;
        };

        if remote.phase == Phase::MatchOver {
            let winner = remote
                .winner
                .or_else(|| series_winner(remote.p1_wins, remote.p2_wins, self.best_of));
            if let Some(winner) = winner {
                if self.phase == Phase::Playing && winner == self.role {
                    self.round_winner = Some(self.role);
                    events.push(CoreEvent::RoundWon);
                }
                self.phase = Phase::MatchOver;
                self.match_winner = Some(winner);
                tracing::info!(
                    "Match '{}' over, winner {} ({}-{})",
                    self.role,
                    winner,
                    remote.p1_wins,
                    remote.p2_wins
                );
                events.push(CoreEvent::MatchOver { winner });
                return events;
            }
        }

        match self.phase {
            Phase::Waiting => match remote.phase {
                Phase::Countdown => self.enter_countdown(remote.countdown, &mut events),
                Phase::Playing => {
                    tracing::info!("Match '{}' joined a round in progress", self.role);
                    self.start_round(&remote, &mut events);
                }
                Phase::Waiting if self.role.is_owner() && remote.both_ready && !self.countdown_requested => {
                    match sync.request_countdown(now) {
                        Ok(()) => self.countdown_requested = true,
                        Err(e) => tracing::warn!("Match '{}' cannot start countdown: {}", self.role, e),
                    }
                }
                _ => {}
            },
            Phase::Countdown => {
                let started_at = self.countdown_started_at.unwrap_or(remote.countdown);
                if remote.phase == Phase::Playing || now - started_at >= self.countdown_secs {
                    if self.role.is_owner() && remote.phase != Phase::Playing {
                        if let Err(e) = sync.request_playing() {
                            tracing::warn!("Match '{}' cannot start round: {}", self.role, e);
                        }
                    }
                    self.start_round(&remote, &mut events);
                } else if remote.phase == Phase::Waiting {
                    tracing::info!("Match '{}' countdown withdrawn", self.role);
                    self.back_to_lobby(&mut events);
                }
            }
            Phase::Playing => {
                if sync_events.contains(&SyncEvent::OpponentLost) {
                    self.round_winner = Some(self.role);
                    self.phase = Phase::RoundOver;
                    tracing::info!("Match '{}' won round {}", self.role, self.round);
                    events.push(CoreEvent::RoundWon);
                } else if remote.phase == Phase::Waiting
                    && remote.wins(self.role) > self.wins_at_round_start
                {
                    // the opponent's lost flag came and went between two pulls
                    self.round_winner = Some(self.role);
                    tracing::info!("Match '{}' won round {} (inferred)", self.role, self.round);
                    events.push(CoreEvent::RoundWon);
                    self.back_to_lobby(&mut events);
                }
            }
            Phase::RoundOver => {
                if remote.phase == Phase::Waiting {
                    self.back_to_lobby(&mut events);
                }
            }
            Phase::MatchOver => {}
        }
        events
    }

    /// Declare the local round lost after a top-out. Only once per round.
    pub fn report_round_loss(&mut self, sync: &mut SyncClient) -> Vec<CoreEvent> {
        if self.phase != Phase::Playing {
            return Vec::new();
        }
        sync.report_round_loss(self.best_of);
        self.phase = Phase::RoundOver;
        self.round_winner = Some(self.role.opponent());
        tracing::info!("Match '{}' lost round {}", self.role, self.round);
        vec![CoreEvent::RoundLost]
    }

    fn enter_countdown(&mut self, started_at: f64, events: &mut Vec<CoreEvent>) {
        self.phase = Phase::Countdown;
        self.countdown_started_at = Some(started_at);
        tracing::info!("Match '{}' countdown started at {:.3}", self.role, started_at);
        events.push(CoreEvent::CountdownStarted { started_at });
    }

    fn start_round(&mut self, remote: &RemoteSummary, events: &mut Vec<CoreEvent>) {
        self.phase = Phase::Playing;
        self.round += 1;
        self.countdown_started_at = None;
        self.countdown_requested = false;
        self.wins_at_round_start = remote.wins(self.role);
        self.round_winner = None;
        tracing::info!("Match '{}' round {} started", self.role, self.round);
        events.push(CoreEvent::RoundStarted { round: self.round });
    }

    fn back_to_lobby(&mut self, events: &mut Vec<CoreEvent>) {
        self.phase = Phase::Waiting;
        self.countdown_started_at = None;
        self.countdown_requested = false;
        events.push(CoreEvent::BackToLobby);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{fields, DocPath, MatchStore, MemoryStore};
    use serde_json::json;
    use std::sync::Arc;

    struct Player {
        sync: SyncClient,
        coord: MatchCoordinator,
    }

    impl Player {
        async fn join(role: Role, store: &MemoryStore) -> Self {
            let config = SyncConfig::default()
                .with_push_interval_ms(0)
                .with_pull_interval_ms(0);
            let mut sync = SyncClient::new(role, Arc::new(store.clone()), config.clone());
            sync.join(0.0).await.unwrap();
            let coord = MatchCoordinator::new(role, &config);
            Player { sync, coord }
        }

        /// Flush pending writes, pull once and advance the flow
        async fn step(&mut self, now: f64) -> Vec<CoreEvent> {
            self.sync.settle().await;
            self.sync.maybe_pull(now);
            let sync_events = self.sync.settle().await;
            let events = self.coord.update(now, &mut self.sync, &sync_events);
            self.sync.settle().await;
            events
        }

        async fn ready(&mut self) {
            self.sync.set_ready(true);
            self.sync.settle().await;
        }
    }

    async fn start_round(a: &mut Player, b: &mut Player, at: f64) {
        a.ready().await;
        b.ready().await;
        a.step(at).await;
        assert!(a.step(at + 0.1).await.contains(&CoreEvent::CountdownStarted { started_at: at }));
        b.step(at + 0.1).await;
        assert_eq!(b.coord.phase(), Phase::Countdown);
        let a_events = a.step(at + 3.0).await;
        assert!(matches!(a_events.as_slice(), [CoreEvent::RoundStarted { .. }]));
        b.step(at + 3.0).await;
        assert_eq!(b.coord.phase(), Phase::Playing);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_countdown_scenario() {
        let store = MemoryStore::new();
        let mut a = Player::join(Role::P1, &store).await;
        let mut b = Player::join(Role::P2, &store).await;

        a.ready().await;
        assert!(a.step(5.0).await.is_empty());
        b.ready().await;

        // player one sees both ready at t=10 and writes the countdown
        assert!(a.step(10.0).await.is_empty());
        let doc = room_doc(&store).await;
        assert_eq!(doc.phase(), Phase::Countdown);
        assert_eq!(doc.countdown, 10.0);

        assert_eq!(
            a.step(10.2).await,
            vec![CoreEvent::CountdownStarted { started_at: 10.0 }]
        );
        assert_eq!(
            b.step(10.4).await,
            vec![CoreEvent::CountdownStarted { started_at: 10.0 }]
        );
        assert!(a.step(12.9).await.is_empty());
        assert!(b.step(12.9).await.is_empty());
        assert_eq!(a.coord.countdown_remaining(12.0), Some(1.0));

        assert_eq!(a.step(13.0).await, vec![CoreEvent::RoundStarted { round: 1 }]);
        assert_eq!(room_doc(&store).await.phase(), Phase::Playing);
        assert_eq!(b.step(13.0).await, vec![CoreEvent::RoundStarted { round: 1 }]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_countdown_ends_on_local_clock() {
        let store = MemoryStore::new();
        let mut a = Player::join(Role::P1, &store).await;
        let mut b = Player::join(Role::P2, &store).await;
        a.ready().await;
        b.ready().await;
        a.step(10.0).await;
        b.step(10.5).await;
        assert_eq!(b.coord.phase(), Phase::Countdown);

        // no further pull reaches player two, it still starts on time
        store.set_offline(true);
        assert_eq!(b.step(13.0).await, vec![CoreEvent::RoundStarted { round: 1 }]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_best_of_three() {
        let store = MemoryStore::new();
        let mut a = Player::join(Role::P1, &store).await;
        let mut b = Player::join(Role::P2, &store).await;

        // round 1: player one tops out, player two infers the win
        start_round(&mut a, &mut b, 10.0).await;
        assert_eq!(a.coord.report_round_loss(&mut a.sync), vec![CoreEvent::RoundLost]);
        assert!(a.coord.report_round_loss(&mut a.sync).is_empty());
        a.sync.settle().await;
        assert_eq!(
            b.step(20.0).await,
            vec![CoreEvent::RoundWon, CoreEvent::BackToLobby]
        );
        assert_eq!(a.step(20.0).await, vec![CoreEvent::BackToLobby]);
        assert_eq!(a.coord.phase(), Phase::Waiting);
        assert_eq!(b.coord.round_winner(), Some(Role::P2));

        // round 2: player one loses again and the series is decided
        start_round(&mut a, &mut b, 30.0).await;
        assert_eq!(a.coord.round(), 2);
        a.coord.report_round_loss(&mut a.sync);
        a.sync.settle().await;
        assert_eq!(
            b.step(40.0).await,
            vec![CoreEvent::RoundWon, CoreEvent::MatchOver { winner: Role::P2 }]
        );
        assert_eq!(
            a.step(40.0).await,
            vec![CoreEvent::MatchOver { winner: Role::P2 }]
        );
        assert_eq!(a.coord.match_winner(), Some(Role::P2));
        assert!(b.step(41.0).await.is_empty());

        let doc = room_doc(&store).await;
        assert_eq!(doc.winner(), Some(Role::P2));
        assert_eq!(doc.p2.match_wins, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_round_won_from_opponent_lost_flag() {
        let store = MemoryStore::new();
        let mut a = Player::join(Role::P1, &store).await;
        let mut b = Player::join(Role::P2, &store).await;
        start_round(&mut a, &mut b, 10.0).await;

        store
            .patch(DocPath::Player(Role::P2), fields(json!({"lost": true})))
            .await
            .unwrap();
        assert_eq!(a.step(15.0).await, vec![CoreEvent::RoundWon]);
        assert_eq!(a.coord.phase(), Phase::RoundOver);

        store
            .patch(DocPath::Room, fields(json!({"state": "waiting"})))
            .await
            .unwrap();
        assert_eq!(a.step(16.0).await, vec![CoreEvent::BackToLobby]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_late_joiner_starts_playing() {
        let store = MemoryStore::new();
        let mut a = Player::join(Role::P1, &store).await;
        store
            .patch(DocPath::Room, fields(json!({"state": "playing"})))
            .await
            .unwrap();
        assert_eq!(a.step(1.0).await, vec![CoreEvent::RoundStarted { round: 1 }]);
    }

    async fn room_doc(store: &MemoryStore) -> RoomDoc {
        let value = store.get(DocPath::Room).await.unwrap().unwrap();
        RoomDoc::from_value(value).unwrap()
    }
}
