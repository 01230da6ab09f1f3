//! Sync health counters

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Snapshot of push/pull traffic for one client
#[derive(Debug, Clone)]
pub struct SyncStats {
    pub pushes: u64,
    pub push_failures: u64,
    pub pulls: u64,
    pub pull_failures: u64,
    /// Payload bytes pushed
    pub output_bytes: u64,
    /// Payload bytes pulled
    pub input_bytes: u64,
    pub start_time: Instant,
    pub input_kbps: f64,
    pub output_kbps: f64,
}

impl SyncStats {
    pub fn new() -> Self {
        Self {
            pushes: 0,
            push_failures: 0,
            pulls: 0,
            pull_failures: 0,
            output_bytes: 0,
            input_bytes: 0,
            start_time: Instant::now(),
            input_kbps: 0.0,
            output_kbps: 0.0,
        }
    }

    /// Update throughput calculations based on elapsed time
    pub fn update_throughput(&mut self) {
        let elapsed_secs = self.start_time.elapsed().as_secs_f64();
        if elapsed_secs > 0.0 {
            self.input_kbps = (self.input_bytes as f64) / 1024.0 / elapsed_secs;
            self.output_kbps = (self.output_bytes as f64) / 1024.0 / elapsed_secs;
        }
    }
}

impl Default for SyncStats {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SyncStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Push: {} ok / {} failed ({:.2} KB/s), Pull: {} ok / {} failed ({:.2} KB/s)",
            self.pushes,
            self.push_failures,
            self.output_kbps,
            self.pulls,
            self.pull_failures,
            self.input_kbps
        )
    }
}

/// Counters shared with the spawned network tasks
///
/// Uses atomic operations for lock-free concurrent updates
#[derive(Debug, Clone)]
pub struct StatsTracker {
    pushes: Arc<AtomicU64>,
    push_failures: Arc<AtomicU64>,
    pulls: Arc<AtomicU64>,
    pull_failures: Arc<AtomicU64>,
    output_bytes: Arc<AtomicU64>,
    input_bytes: Arc<AtomicU64>,
    start_time: Instant,
}

impl StatsTracker {
    pub fn new() -> Self {
        Self {
            pushes: Arc::new(AtomicU64::new(0)),
            push_failures: Arc::new(AtomicU64::new(0)),
            pulls: Arc::new(AtomicU64::new(0)),
            pull_failures: Arc::new(AtomicU64::new(0)),
            output_bytes: Arc::new(AtomicU64::new(0)),
            input_bytes: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
        }
    }

    pub fn record_push(&self, bytes: usize) {
        self.pushes.fetch_add(1, Ordering::Relaxed);
        self.output_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_push_failure(&self) {
        self.push_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pull(&self, bytes: usize) {
        self.pulls.fetch_add(1, Ordering::Relaxed);
        self.input_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_pull_failure(&self) {
        self.pull_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current statistics snapshot
    pub fn get_stats(&self) -> SyncStats {
        let mut stats = SyncStats {
            pushes: self.pushes.load(Ordering::Relaxed),
            push_failures: self.push_failures.load(Ordering::Relaxed),
            pulls: self.pulls.load(Ordering::Relaxed),
            pull_failures: self.pull_failures.load(Ordering::Relaxed),
            output_bytes: self.output_bytes.load(Ordering::Relaxed),
            input_bytes: self.input_bytes.load(Ordering::Relaxed),
            start_time: self.start_time,
            input_kbps: 0.0,
            output_kbps: 0.0,
        };
        stats.update_throughput();
        stats
    }
}

impl Default for StatsTracker {
    fn default() -> Self {
        Self::new()
    }
}
