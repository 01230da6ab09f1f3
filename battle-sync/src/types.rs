/// Core types for the battle-sync library
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{Result, SyncError};
use crate::name_generator;

/// Room identifier
///
/// RoomId is used both as a zenoh key chunk and as a REST path segment:
/// - Non-empty UTF-8 string
/// - Cannot contain: / * $ ? # @ . [ ] or whitespace
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomId(String);

impl RoomId {
    /// Generate a new room name, pronounceable with a numeric suffix
    pub fn generate() -> Self {
        RoomId(name_generator::generate_unique_name())
    }

    /// Create from a specific name
    /// Returns error if name contains invalid characters
    pub fn from_name(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(RoomId(name))
    }

    /// Get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(s: &str) -> Result<()> {
        if s.is_empty() {
            return Err(SyncError::InvalidRoomName(
                "Room name cannot be empty".to_string(),
            ));
        }

        for ch in s.chars() {
            if ch.is_whitespace() || matches!(ch, '/' | '*' | '$' | '?' | '#' | '@' | '.' | '[' | ']')
            {
                return Err(SyncError::InvalidRoomName(format!(
                    "Room name '{}' contains invalid character '{}'",
                    s, ch
                )));
            }
        }

        Ok(())
    }
}

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RoomId {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        RoomId::from_name(s)
    }
}

/// Player slot in a room
///
/// `P1` creates the room and is the only writer of the countdown and
/// round start fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    P1,
    P2,
}

impl Role {
    /// Key of this player's subtree in the room document
    pub fn slot(self) -> &'static str {
        match self {
            Role::P1 => "p1",
            Role::P2 => "p2",
        }
    }

    pub fn opponent(self) -> Role {
        match self {
            Role::P1 => Role::P2,
            Role::P2 => Role::P1,
        }
    }

    /// Parse a slot key, as stored in the `winner` field
    pub fn from_slot(slot: &str) -> Option<Role> {
        match slot {
            "p1" => Some(Role::P1),
            "p2" => Some(Role::P2),
            _ => None,
        }
    }

    pub fn is_owner(self) -> bool {
        self == Role::P1
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.slot())
    }
}

/// Match phase, shared through the room document `state` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Phase {
    #[default]
    Waiting,
    Countdown,
    Playing,
    RoundOver,
    MatchOver,
}

impl Phase {
    pub fn as_wire(self) -> &'static str {
        match self {
            Phase::Waiting => "waiting",
            Phase::Countdown => "countdown",
            Phase::Playing => "playing",
            Phase::RoundOver => "round_over",
            Phase::MatchOver => "match_over",
        }
    }

    /// Unknown or missing values read as `Waiting`
    pub fn from_wire(s: &str) -> Phase {
        match s {
            "countdown" => Phase::Countdown,
            "playing" => Phase::Playing,
            "round_over" => Phase::RoundOver,
            "match_over" => Phase::MatchOver,
            _ => Phase::Waiting,
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_wire())
    }
}

/// Wall clock seconds since the unix epoch.
///
/// Countdown start times are compared across machines, so they use the
/// wall clock rather than a monotonic instant.
pub fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Rounds a player must win to take a best-of-`best_of` series
pub fn wins_needed(best_of: u32) -> u32 {
    best_of.max(1).div_ceil(2)
}

/// Winner of the series given both win counters, if any
pub fn series_winner(p1_wins: u32, p2_wins: u32, best_of: u32) -> Option<Role> {
    let needed = wins_needed(best_of);
    if p1_wins >= needed {
        Some(Role::P1)
    } else if p2_wins >= needed {
        Some(Role::P2)
    } else {
        None
    }
}
