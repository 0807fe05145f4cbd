//! Engine occupancy and maintenance counters.
//!
//! [`EngineStats`] is a point-in-time snapshot taken on a writer thread.
//! [`MaintenanceReport`] describes one `maintain()` pass;
//! [`MaintenanceTotals`] accumulates them for the background maintainer.

use rill_arena::{ArenaStats, ReclaimReport};
use rill_core::Epoch;

/// Occupancy snapshot of a [`StorageEngine`](crate::StorageEngine).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Chunks ever minted by the pool.
    pub chunks_minted: usize,
    /// Chunks in the free list.
    pub chunks_free: usize,
    /// Chunks referenced by a current descriptor or awaiting reclaim.
    pub chunks_in_use: usize,
    /// Retired items not yet reclaimed.
    pub retired_pending: usize,
    /// Handles in the `Active` state.
    pub handles_active: usize,
    /// Handles in the `Retiring` state.
    pub handles_retiring: usize,
    /// Current global epoch.
    pub global_epoch: Epoch,
    /// Epoch published by the reader; `u64::MAX` while it holds nothing.
    pub reader_epoch: u64,
}

impl From<ArenaStats> for EngineStats {
    fn from(s: ArenaStats) -> Self {
        Self {
            chunks_minted: s.pool.minted,
            chunks_free: s.pool.free,
            chunks_in_use: s.pool.in_use(),
            retired_pending: s.retired_pending,
            handles_active: s.handles_active,
            handles_retiring: s.handles_retiring,
            global_epoch: s.global_epoch,
            reader_epoch: s.reader_epoch,
        }
    }
}

/// Outcome of one `maintain()` pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    /// Global epoch at the end of the pass.
    pub epoch: Epoch,
    /// Chunks returned to the pool.
    pub chunks_recycled: usize,
    /// Descriptors dropped.
    pub descriptors_dropped: usize,
    /// Handles made reusable.
    pub handles_released: usize,
    /// Retired items the reader may still reach.
    pub still_pending: usize,
}

impl MaintenanceReport {
    pub(crate) fn new(epoch: Epoch, r: ReclaimReport) -> Self {
        Self {
            epoch,
            chunks_recycled: r.chunks,
            descriptors_dropped: r.descriptors,
            handles_released: r.handles,
            still_pending: r.still_pending,
        }
    }

    /// Whether the pass reclaimed anything.
    pub fn is_empty(&self) -> bool {
        self.chunks_recycled == 0 && self.descriptors_dropped == 0 && self.handles_released == 0
    }
}

/// Running sums over many maintenance passes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MaintenanceTotals {
    /// Passes run.
    pub passes: u64,
    /// Chunks returned to the pool.
    pub chunks_recycled: u64,
    /// Descriptors dropped.
    pub descriptors_dropped: u64,
    /// Handles made reusable.
    pub handles_released: u64,
}

impl MaintenanceTotals {
    /// Fold one pass into the totals.
    pub fn record(&mut self, report: &MaintenanceReport) {
        self.passes += 1;
        self.chunks_recycled += report.chunks_recycled as u64;
        self.descriptors_dropped += report.descriptors_dropped as u64;
        self.handles_released += report.handles_released as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_report_is_empty() {
        assert!(MaintenanceReport::default().is_empty());
    }

    #[test]
    fn totals_accumulate() {
        let mut totals = MaintenanceTotals::default();
        let report = MaintenanceReport {
            chunks_recycled: 3,
            descriptors_dropped: 1,
            ..MaintenanceReport::default()
        };
        totals.record(&report);
        totals.record(&MaintenanceReport::default());
        assert_eq!(totals.passes, 2);
        assert_eq!(totals.chunks_recycled, 3);
        assert_eq!(totals.descriptors_dropped, 1);
        assert_eq!(totals.handles_released, 0);
    }

    #[test]
    fn stats_from_arena() {
        let arena = ArenaStats {
            pool: rill_arena::PoolStats {
                minted: 10,
                free: 4,
                capacity: 16,
            },
            retired_pending: 2,
            handles_active: 1,
            handles_retiring: 0,
            global_epoch: Epoch(5),
            reader_epoch: 4,
        };
        let stats = EngineStats::from(arena);
        assert_eq!(stats.chunks_in_use, 6);
        assert_eq!(stats.global_epoch, Epoch(5));
    }
}
