//! Engine statistics.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated as evaluators are built.
#[derive(Debug, Default)]
pub struct EngineStats {
    empty: AtomicU64,
    constant: AtomicU64,
    pass_through: AtomicU64,
    composite: AtomicU64,
    compiled: AtomicU64,
    unit_bytes: AtomicU64,
    native_bytes: AtomicU64,
}

impl EngineStats {
    pub(crate) fn record_empty(&self) {
        self.empty.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_constant(&self) {
        self.constant.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_pass_through(&self) {
        self.pass_through.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_composite(&self) {
        self.composite.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_compiled(&self, unit_bytes: usize, native_bytes: usize) {
        self.compiled.fetch_add(1, Ordering::Relaxed);
        self.unit_bytes.fetch_add(unit_bytes as u64, Ordering::Relaxed);
        self.native_bytes.fetch_add(native_bytes as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            empty: self.empty.load(Ordering::Relaxed),
            constant: self.constant.load(Ordering::Relaxed),
            pass_through: self.pass_through.load(Ordering::Relaxed),
            composite: self.composite.load(Ordering::Relaxed),
            compiled: self.compiled.load(Ordering::Relaxed),
            unit_bytes: self.unit_bytes.load(Ordering::Relaxed),
            native_bytes: self.native_bytes.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`EngineStats`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Empty templates.
    pub empty: u64,
    /// All-static templates.
    pub constant: u64,
    /// Single dynamic fragment, returned as is.
    pub pass_through: u64,
    /// Naive composites built.
    pub composite: u64,
    /// Units compiled and loaded.
    pub compiled: u64,
    /// Total encoded unit size.
    pub unit_bytes: u64,
    /// Total native render code size.
    pub native_bytes: u64,
}

impl StatsSnapshot {
    /// Evaluators built through any path.
    pub fn total(&self) -> u64 {
        self.empty + self.constant + self.pass_through + self.composite + self.compiled
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Text Model Engine Statistics:")?;
        writeln!(f, "  Empty: {}", self.empty)?;
        writeln!(f, "  Constant: {}", self.constant)?;
        writeln!(f, "  Pass-through: {}", self.pass_through)?;
        writeln!(f, "  Composite: {}", self.composite)?;
        writeln!(f, "  Compiled units: {}", self.compiled)?;
        writeln!(f, "  Unit bytes: {}", self.unit_bytes)?;
        if self.native_bytes > 0 {
            writeln!(f, "  Native code bytes: {}", self.native_bytes)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_totals() {
        let stats = EngineStats::default();
        stats.record_constant();
        stats.record_compiled(40, 0);
        stats.record_compiled(60, 12);
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total(), 3);
        assert_eq!(snapshot.unit_bytes, 100);
        assert!(snapshot.to_string().contains("Native code bytes: 12"));
    }
}
