/// Spreads a number of events evenly over a cycle of ticks.
///
/// `FrequencyRegulator::new(3, 4)` yields 3 events over every 4 calls to
/// `step()`, front-loaded: 1, 1, 1, 0, 1, 1, 1, 0, ...
#[derive(Debug, Clone)]
pub struct FrequencyRegulator {
    events: usize,
    ticks: usize,
    tick: usize,
    emitted: usize,
}

impl FrequencyRegulator {
    pub fn new(events: usize, ticks: usize) -> Self {
        FrequencyRegulator {
            events,
            ticks: ticks.max(1),
            tick: 0,
            emitted: 0,
        }
    }

    /// One event every `interval_ms` for a loop ticking every `tick_ms`
    pub fn every(interval_ms: u64, tick_ms: u64) -> Self {
        if interval_ms <= tick_ms {
            let per_tick = (tick_ms / interval_ms.max(1)).max(1) as usize;
            Self::new(per_tick, 1)
        } else {
            Self::new(1, interval_ms.div_ceil(tick_ms.max(1)) as usize)
        }
    }

    /// Number of events due this tick
    pub fn step(&mut self) -> usize {
        let target = (self.events * (self.tick + 1)).div_ceil(self.ticks);
        let due = target - self.emitted;
        self.emitted += due;
        self.tick += 1;
        if self.tick == self.ticks {
            self.tick = 0;
            self.emitted = 0;
        }
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spreads_events_over_cycle() {
        let mut regulator = FrequencyRegulator::new(3, 4);
        let steps: Vec<usize> = (0..8).map(|_| regulator.step()).collect();
        assert_eq!(steps, vec![1, 1, 1, 0, 1, 1, 1, 0]);
    }

    #[test]
    fn test_every_interval() {
        let mut slow = FrequencyRegulator::every(150, 16);
        let total: usize = (0..100).map(|_| slow.step()).sum();
        assert_eq!(total, 10);

        let mut fast = FrequencyRegulator::every(5, 16);
        assert_eq!(fast.step(), 3);
    }
}
