//! Outgoing attack bookkeeping and the incoming garbage reducer
//!
//! Outgoing attacks are counted locally and folded into a cumulative
//! `attack_count` on the room document. The receiver never consumes
//! anything remotely; it remembers the last total it observed and turns
//! only the difference into garbage, which makes re-reading the same
//! document harmless.

/// Locally earned attacks waiting for the next push
#[derive(Debug, Clone, Default)]
pub struct AttackAccumulator {
    pending: u32,
}

impl AttackAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// One attack per cleared line
    pub fn on_lines_cleared(&mut self, lines: u32) {
        self.pending += lines;
    }

    pub fn on_hazard_eliminated(&mut self) {
        self.pending += 1;
    }

    pub fn pending(&self) -> u32 {
        self.pending
    }

    /// Take everything pending. The caller owns the amount from here on;
    /// if its push fails the amount is gone.
    pub fn drain_for_sync(&mut self) -> u32 {
        std::mem::take(&mut self.pending)
    }

    pub fn reset(&mut self) {
        self.pending = 0;
    }
}

/// Garbage lines owed for moving from `prev_total` to `new_total`
pub fn apply_delta(prev_total: u64, new_total: u64) -> u64 {
    new_total.saturating_sub(prev_total)
}

/// Last opponent total this client has turned into garbage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObservedTotal {
    total: u64,
}

impl ObservedTotal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an already published total, owing nothing for it
    pub fn starting_at(total: u64) -> Self {
        ObservedTotal { total }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Fold a freshly read remote total in and return the garbage it adds.
    ///
    /// A total lower than the observed one means the room document was
    /// recreated: the counter re-bases and nothing is owed.
    pub fn observe(&mut self, remote_total: u64) -> u32 {
        let delta = apply_delta(self.total, remote_total);
        if remote_total < self.total {
            tracing::debug!(
                "Opponent total went back from {} to {}, re-basing",
                self.total,
                remote_total
            );
        }
        self.total = remote_total;
        u32::try_from(delta).unwrap_or(u32::MAX)
    }
}
