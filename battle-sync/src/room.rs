//! Match protocol operations on the shared room document
//!
//! Each function is one logical write or read sequence against a
//! [`MatchStore`]. Players only write their own subtree, with two
//! exceptions: player one owns the countdown and round start fields, and
//! the loser of a round credits the opponent's `match_wins` and resolves
//! the phase. Nothing here is atomic across requests.

use serde_json::json;

use crate::error::{Result, SyncError};
use crate::store::{fields, DocPath, MatchStore};
use crate::types::{series_winner, Phase, Role};
use crate::wire::RoomDoc;

/// What a client publishes about its own board on every push
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushSnapshot {
    pub grid: String,
    pub score: u64,
    pub stomps: u32,
}

/// Result of a reported round loss
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundLoss {
    /// Opponent's win counter after the increment
    pub opponent_wins: u32,
    pub match_over: bool,
}

pub async fn fetch_room(store: &dyn MatchStore) -> Result<Option<RoomDoc>> {
    match store.get(DocPath::Room).await? {
        Some(value) => Ok(Some(RoomDoc::from_value(value)?)),
        None => Ok(None),
    }
}

/// Player one (re)creates the room with a fresh document
pub async fn open_room(store: &dyn MatchStore, now: f64) -> Result<RoomDoc> {
    let doc = RoomDoc::fresh(now);
    store.put(DocPath::Room, doc.to_value()?).await?;
    Ok(doc)
}

/// Player two takes its slot in an existing room
pub async fn join_room(store: &dyn MatchStore, role: Role) -> Result<()> {
    if store.get(DocPath::Room).await?.is_none() {
        return Err(SyncError::RoomNotFound(format!(
            "no room document for {}",
            role
        )));
    }
    store
        .patch(
            DocPath::Player(role),
            fields(json!({"joined": true, "ready": false, "lost": false})),
        )
        .await
}

/// Pick a slot: an absent or abandoned room is ours to open, otherwise
/// take the free second slot
pub async fn choose_role(store: &dyn MatchStore, now: f64, stale_room_secs: u64) -> Result<Role> {
    let Some(doc) = fetch_room(store).await? else {
        return Ok(Role::P1);
    };
    if now - doc.last_update > stale_room_secs as f64 {
        tracing::info!(
            "Room heartbeat is {:.0}s old, taking it over",
            now - doc.last_update
        );
        return Ok(Role::P1);
    }
    if !doc.p2.joined {
        return Ok(Role::P2);
    }
    Err(SyncError::RoomFull("both player slots are taken".to_string()))
}

pub async fn leave_room(store: &dyn MatchStore, role: Role) -> Result<()> {
    store
        .patch(
            DocPath::Player(role),
            fields(json!({"joined": false, "ready": false})),
        )
        .await
}

/// Publish a snapshot and fold `drained` attacks into the cumulative total.
///
/// Reads the current total first and writes `current + drained` together
/// with the snapshot in one patch. Returns the new total.
pub async fn push_snapshot(
    store: &dyn MatchStore,
    role: Role,
    snapshot: &PushSnapshot,
    drained: u32,
) -> Result<u64> {
    let current = store
        .get(DocPath::Player(role))
        .await?
        .and_then(|player| player.get("attack_count").and_then(|v| v.as_u64()))
        .unwrap_or(0);
    let total = current + drained as u64;
    store
        .patch(
            DocPath::Player(role),
            fields(json!({
                "grid": snapshot.grid,
                "score": snapshot.score,
                "stomps": snapshot.stomps,
                "attack_count": total,
            })),
        )
        .await?;
    Ok(total)
}

pub async fn set_ready(store: &dyn MatchStore, role: Role, ready: bool) -> Result<()> {
    store
        .patch(DocPath::Player(role), fields(json!({"ready": ready})))
        .await
}

pub async fn start_countdown(store: &dyn MatchStore, now: f64) -> Result<()> {
    store
        .patch(
            DocPath::Room,
            fields(json!({"state": Phase::Countdown.as_wire(), "countdown": now})),
        )
        .await
}

pub async fn start_round(store: &dyn MatchStore) -> Result<()> {
    store
        .patch(
            DocPath::Room,
            fields(json!({"state": Phase::Playing.as_wire()})),
        )
        .await
}

pub async fn heartbeat(store: &dyn MatchStore, now: f64) -> Result<()> {
    store
        .patch(DocPath::Room, fields(json!({"last_update": now})))
        .await
}

/// Declare this player the loser of the current round.
///
/// Marks `lost`, credits the opponent one win, then either ends the series
/// or sends both players back to the lobby with their flags cleared. Two
/// players reporting at once can both be credited; there is no
/// compare-and-set to prevent it.
pub async fn report_round_loss(store: &dyn MatchStore, role: Role, best_of: u32) -> Result<RoundLoss> {
    let opponent = role.opponent();
    store
        .patch(DocPath::Player(role), fields(json!({"lost": true})))
        .await?;

    let previous = store
        .get(DocPath::Player(opponent))
        .await?
        .and_then(|player| player.get("match_wins").and_then(|v| v.as_u64()))
        .unwrap_or(0) as u32;
    let opponent_wins = previous + 1;
    store
        .patch(
            DocPath::Player(opponent),
            fields(json!({"match_wins": opponent_wins})),
        )
        .await?;

    let (p1_wins, p2_wins) = match opponent {
        Role::P1 => (opponent_wins, 0),
        Role::P2 => (0, opponent_wins),
    };
    let match_over = series_winner(p1_wins, p2_wins, best_of).is_some();
    if match_over {
        store
            .patch(
                DocPath::Room,
                fields(json!({
                    "state": Phase::MatchOver.as_wire(),
                    "winner": opponent.slot(),
                })),
            )
            .await?;
    } else {
        store
            .patch(
                DocPath::Room,
                fields(json!({"state": Phase::Waiting.as_wire()})),
            )
            .await?;
        for player in [role, opponent] {
            store
                .patch(
                    DocPath::Player(player),
                    fields(json!({"lost": false, "ready": false})),
                )
                .await?;
        }
    }

    Ok(RoundLoss {
        opponent_wins,
        match_over,
    })
}
