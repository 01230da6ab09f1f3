//! # battle-sync
//!
//! Match synchronization core for two-player falling-block battles.
//!
//! ## Overview
//!
//! Each player runs an authoritative local simulation and exchanges state
//! with the opponent through one shared key-value document per room. The
//! library covers everything between the two:
//!
//! - the local [`Board`] and its wandering hazards ([`HazardSim`])
//! - outgoing attack counting and exactly-once garbage delivery through a
//!   cumulative total ([`AttackAccumulator`], [`ObservedTotal`])
//! - throttled push/pull against the room document ([`SyncClient`])
//! - the best-of-N match flow ([`MatchCoordinator`])
//! - interchangeable document backends: in-process, Firebase-style REST,
//!   and zenoh query/reply ([`MatchStore`])
//!
//! [`BattleSession`] ties these together for one player.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use battle_sync::{unix_now, BattleSession, GameConfig, MemoryStore, SyncClient, SyncConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(MemoryStore::new());
//!     let sync = SyncClient::join_auto(store, SyncConfig::default(), unix_now()).await?;
//!     let mut session = BattleSession::new(sync, GameConfig::default());
//!     let events = session.tick(unix_now(), 1.0 / 60.0);
//!     println!("{:?}", events);
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod attack;
pub mod board;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod hazard;
pub mod name_generator;
pub mod room;
pub mod session;
pub mod stats;
pub mod store;
pub mod sync_client;
pub mod types;
pub mod wire;

// Re-exports for convenience
pub use attack::{apply_delta, AttackAccumulator, ObservedTotal};
pub use board::{Board, CellColor, PieceKind, RotateDir, BOARD_COLS, BOARD_ROWS};
pub use config::{GameConfig, HazardConfig, SyncConfig};
pub use coordinator::MatchCoordinator;
pub use error::{Result, SyncError};
pub use events::{CoreEvent, Input};
pub use hazard::{HazardActor, HazardEvent, HazardPhase, HazardSim};
pub use session::BattleSession;
pub use stats::SyncStats;
pub use store::{HttpStore, MatchStore, MemoryStore, RoomHost, SessionExt, ZenohStore};
pub use sync_client::{RemoteView, SyncClient, SyncEvent};
pub use types::{unix_now, Phase, Role, RoomId};
pub use wire::{RoomDoc, WireGrid};
