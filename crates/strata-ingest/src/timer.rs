use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use tracing::info;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PhaseStat {
    pub count: u64,
    pub total: Duration,
}

/// Accumulates wall time per named phase.
#[derive(Debug, Default)]
pub struct PhaseTimer {
    started: BTreeMap<&'static str, Instant>,
    stats: BTreeMap<&'static str, PhaseStat>,
}

impl PhaseTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&mut self, tag: &'static str) {
        self.started.insert(tag, Instant::now());
        self.stats.entry(tag).or_default().count += 1;
    }

    /// Close the phase opened by the last `enter(tag)`. Unmatched exits
    /// are ignored.
    pub fn exit(&mut self, tag: &'static str) {
        if let Some(start) = self.started.remove(tag) {
            self.stats.entry(tag).or_default().total += start.elapsed();
        }
    }

    /// Run `f` inside phase `tag`.
    pub fn time<T>(&mut self, tag: &'static str, f: impl FnOnce() -> T) -> T {
        self.enter(tag);
        let out = f();
        self.exit(tag);
        out
    }

    pub fn get(&self, tag: &str) -> Option<PhaseStat> {
        self.stats.get(tag).copied()
    }

    pub fn summary(&self) {
        for (tag, stat) in &self.stats {
            info!(phase = tag, count = stat.count, total_ms = stat.total.as_millis() as u64, "phase timing");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_and_accumulates() {
        let mut timer = PhaseTimer::new();
        timer.time("push", || std::thread::sleep(Duration::from_millis(2)));
        timer.time("push", || ());
        timer.exit("never-entered");
        let push = timer.get("push").unwrap();
        assert_eq!(push.count, 2);
        assert!(push.total >= Duration::from_millis(2));
        assert!(timer.get("never-entered").is_none());
        timer.summary();
    }
}
