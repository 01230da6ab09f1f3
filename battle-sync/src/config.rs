//! Configuration for a battle session

/// Timing and protocol settings for the shared room document
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Minimum time between two pushes of the local snapshot (in milliseconds)
    pub push_interval_ms: u64,

    /// Minimum time between two pulls of the room document (in milliseconds)
    pub pull_interval_ms: u64,

    /// How often player one refreshes `last_update` (in milliseconds)
    pub heartbeat_interval_ms: u64,

    /// Countdown length before a round starts (in milliseconds)
    pub countdown_ms: u64,

    /// Number of rounds in the series
    pub best_of: u32,

    /// Per-request timeout of the remote store (in milliseconds)
    pub request_timeout_ms: u64,

    /// A room whose heartbeat is older than this may be taken over (in seconds)
    pub stale_room_secs: u64,

    /// Opponent view is reported stale after this long without a good pull (in milliseconds)
    pub stale_view_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            push_interval_ms: 350,
            pull_interval_ms: 500,
            heartbeat_interval_ms: 5000,
            countdown_ms: 3000,
            best_of: 3,
            request_timeout_ms: 3000,
            stale_room_secs: 3600,
            stale_view_ms: 3000,
        }
    }
}

impl SyncConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the push interval in milliseconds
    pub fn with_push_interval_ms(mut self, interval_ms: u64) -> Self {
        self.push_interval_ms = interval_ms;
        self
    }

    /// Set the pull interval in milliseconds
    pub fn with_pull_interval_ms(mut self, interval_ms: u64) -> Self {
        self.pull_interval_ms = interval_ms;
        self
    }

    /// Set the heartbeat interval in milliseconds
    pub fn with_heartbeat_interval_ms(mut self, interval_ms: u64) -> Self {
        self.heartbeat_interval_ms = interval_ms;
        self
    }

    /// Set the countdown length in milliseconds
    pub fn with_countdown_ms(mut self, countdown_ms: u64) -> Self {
        self.countdown_ms = countdown_ms;
        self
    }

    /// Set the series length; zero is treated as one
    pub fn with_best_of(mut self, best_of: u32) -> Self {
        self.best_of = best_of.max(1);
        self
    }

    /// Set the remote request timeout in milliseconds
    pub fn with_request_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.request_timeout_ms = timeout_ms;
        self
    }

    /// Set the age after which an abandoned room is reused
    pub fn with_stale_room_secs(mut self, secs: u64) -> Self {
        self.stale_room_secs = secs;
        self
    }

    pub(crate) fn push_interval_secs(&self) -> f64 {
        self.push_interval_ms as f64 / 1000.0
    }

    pub(crate) fn pull_interval_secs(&self) -> f64 {
        self.pull_interval_ms as f64 / 1000.0
    }

    pub(crate) fn heartbeat_interval_secs(&self) -> f64 {
        self.heartbeat_interval_ms as f64 / 1000.0
    }

    pub(crate) fn countdown_secs(&self) -> f64 {
        self.countdown_ms as f64 / 1000.0
    }

    pub(crate) fn stale_view_secs(&self) -> f64 {
        self.stale_view_ms as f64 / 1000.0
    }
}

/// Hazard actor physics and spawning
#[derive(Debug, Clone)]
pub struct HazardConfig {
    /// Spawn hazards at all
    pub enabled: bool,
    /// Downward acceleration in rows per second squared
    pub gravity: f32,
    /// Horizontal speed while walking, in columns per second
    pub walk_speed: f32,
    /// Seconds a walking hazard survives
    pub lifetime_secs: f32,
    /// Seconds between two spawns
    pub spawn_interval_secs: f32,
}

impl Default for HazardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            gravity: 32.0,
            walk_speed: 1.8,
            lifetime_secs: 16.0,
            spawn_interval_secs: 8.0,
        }
    }
}

impl HazardConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_gravity(mut self, gravity: f32) -> Self {
        self.gravity = gravity;
        self
    }

    pub fn with_walk_speed(mut self, walk_speed: f32) -> Self {
        self.walk_speed = walk_speed;
        self
    }

    pub fn with_lifetime_secs(mut self, secs: f32) -> Self {
        self.lifetime_secs = secs;
        self
    }

    pub fn with_spawn_interval_secs(mut self, secs: f32) -> Self {
        self.spawn_interval_secs = secs;
        self
    }
}

/// Local simulation settings
#[derive(Debug, Clone)]
pub struct GameConfig {
    /// Seconds between two gravity steps
    pub fall_interval_secs: f32,
    /// Gravity steps a resting piece survives before it locks
    pub lock_delay_steps: u32,
    /// Score per cleared line
    pub line_score: u64,
    /// Score per eliminated hazard
    pub stomp_score: u64,
    /// Seed of the piece and garbage generator (random if None)
    pub seed: Option<u64>,
    /// Hazard settings
    pub hazard: HazardConfig,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            fall_interval_secs: 0.8,
            lock_delay_steps: 0,
            line_score: 1000,
            stomp_score: 500,
            seed: None,
            hazard: HazardConfig::default(),
        }
    }
}

impl GameConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the gravity interval in seconds
    pub fn with_fall_interval_secs(mut self, secs: f32) -> Self {
        self.fall_interval_secs = secs;
        self
    }

    /// Set the lock delay in gravity steps
    pub fn with_lock_delay_steps(mut self, steps: u32) -> Self {
        self.lock_delay_steps = steps;
        self
    }

    /// Set the random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the hazard configuration
    pub fn with_hazard(mut self, hazard: HazardConfig) -> Self {
        self.hazard = hazard;
        self
    }
}
