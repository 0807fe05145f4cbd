//! `SampleArena`: the pool, reclaimer and descriptor table behind one owner.
//!
//! Keeping the three together guarantees that every descriptor unlinked
//! from the table is tagged on the same clock the reader pins against, and
//! that every chunk id a view resolves belongs to the pool the view reads.

use rill_core::{
    BufferHandle, Epoch, FrameCount, FrameIdx, Interleaved, SampleFormat, StoreError,
};

use crate::config::ArenaConfig;
use crate::descriptor::DescriptorView;
use crate::epoch::{EpochClock, ReaderPin};
use crate::pool::{ChunkPool, PoolStats};
use crate::reclaim::{Garbage, ReclaimReport, Reclaimer};
use crate::table::{DescriptorTable, HandleState};

/// Occupancy snapshot across the arena.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ArenaStats {
    /// Chunk pool counters.
    pub pool: PoolStats,
    /// Items waiting in the retire queue.
    pub retired_pending: usize,
    /// Handles in the `Active` state.
    pub handles_active: usize,
    /// Handles in the `Retiring` state.
    pub handles_retiring: usize,
    /// Current global epoch.
    pub global_epoch: Epoch,
    /// Reader's published epoch, or [`EPOCH_UNPINNED`](crate::EPOCH_UNPINNED).
    pub reader_epoch: u64,
}

/// Chunked sample storage shared by writers and one real-time reader.
pub struct SampleArena {
    config: ArenaConfig,
    pool: ChunkPool,
    reclaimer: Reclaimer,
    table: DescriptorTable,
}

// Compile-time assertion: SampleArena must be Send + Sync.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<SampleArena>();
};

impl SampleArena {
    /// Build an arena, minting the prewarm chunks.
    pub fn new(config: ArenaConfig) -> Result<Self, StoreError> {
        config.validate()?;
        let pool = ChunkPool::new(&config)?;
        let table = DescriptorTable::new(config.max_handles as usize);
        Ok(Self {
            config,
            pool,
            reclaimer: Reclaimer::new(),
            table,
        })
    }

    /// Configuration the arena was built with.
    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    /// The chunk pool.
    pub fn pool(&self) -> &ChunkPool {
        &self.pool
    }

    /// The epoch clock.
    pub fn clock(&self) -> &EpochClock {
        self.reclaimer.clock()
    }

    // ── reader side ─────────────────────────────────────────────

    /// Take the single reader slot.
    pub fn claim_reader(&self) -> Option<ReaderPin> {
        self.clock().claim_reader()
    }

    /// Give the reader slot back.
    pub fn release_reader(&self, pin: &mut ReaderPin) {
        self.clock().release_reader(pin);
    }

    /// Reader checkpoint. Real-time safe.
    pub fn checkpoint(&self, pin: &mut ReaderPin) -> Epoch {
        self.clock().pin(pin)
    }

    /// Reader holds nothing until the next checkpoint. Real-time safe.
    pub fn park(&self, pin: &mut ReaderPin) {
        self.clock().unpin(pin);
    }

    /// Current descriptor of `handle`, or `None`. Real-time safe.
    pub fn read<'g>(
        &'g self,
        handle: BufferHandle,
        pin: &'g ReaderPin,
    ) -> Option<DescriptorView<'g>> {
        self.table
            .read(handle, self.clock(), pin)
            .map(|desc| DescriptorView::new(desc, &self.pool))
    }

    // ── writer side ─────────────────────────────────────────────

    /// See [`DescriptorTable::create`].
    pub fn create(&self, handle: BufferHandle, format: SampleFormat) -> Result<u64, StoreError> {
        self.table.create(handle, format, &self.pool)
    }

    /// See [`DescriptorTable::allocate`].
    pub fn allocate(&self, format: SampleFormat) -> Result<BufferHandle, StoreError> {
        self.table.allocate(format, &self.pool)
    }

    /// See [`DescriptorTable::append`].
    pub fn append(
        &self,
        handle: BufferHandle,
        block: &Interleaved<'_>,
    ) -> Result<FrameCount, StoreError> {
        self.table.append(handle, block, &self.pool, &self.reclaimer)
    }

    /// See [`DescriptorTable::write_at`].
    pub fn write_at(
        &self,
        handle: BufferHandle,
        start: FrameIdx,
        block: &Interleaved<'_>,
    ) -> Result<FrameCount, StoreError> {
        self.table
            .write_at(handle, start, block, &self.pool, &self.reclaimer)
    }

    /// See [`DescriptorTable::truncate`].
    pub fn truncate(
        &self,
        handle: BufferHandle,
        frames: FrameCount,
    ) -> Result<FrameCount, StoreError> {
        self.table.truncate(handle, frames, &self.reclaimer)
    }

    /// See [`DescriptorTable::replace`].
    pub fn replace(
        &self,
        handle: BufferHandle,
        block: &Interleaved<'_>,
    ) -> Result<FrameCount, StoreError> {
        self.table.replace(handle, block, &self.pool, &self.reclaimer)
    }

    /// See [`DescriptorTable::destroy`].
    pub fn destroy(&self, handle: BufferHandle) -> Result<(), StoreError> {
        self.table.destroy(handle, &self.reclaimer)
    }

    /// See [`DescriptorTable::state`].
    pub fn state(&self, handle: BufferHandle) -> Result<HandleState, StoreError> {
        self.table.state(handle)
    }

    /// See [`DescriptorTable::frames`].
    pub fn frames(&self, handle: BufferHandle) -> Result<FrameCount, StoreError> {
        self.table.frames(handle)
    }

    /// Recycle everything the reader has moved past.
    ///
    /// Chunks go back to the pool before slots are released, so a handle
    /// reused right after this call can only receive chunks that no retiring
    /// descriptor references.
    pub fn reclaim(&self) -> ReclaimReport {
        let (garbage, report) = self.reclaimer.collect();
        let mut chunks = Vec::new();
        let mut handles = Vec::new();
        for item in garbage {
            match item {
                Garbage::Chunks(ids) => chunks.extend(ids),
                Garbage::Descriptor(desc) => drop(desc),
                Garbage::Handle(handle) => handles.push(handle),
            }
        }
        if !chunks.is_empty() {
            self.pool.release_many(chunks);
        }
        for handle in handles {
            self.table.release_slot(handle);
        }
        report
    }

    /// Forced flush: park the reader and recycle everything retired.
    ///
    /// Exclusive access to `pin` is the caller's proof that no view is
    /// alive.
    pub fn flush(&self, pin: &mut ReaderPin) -> ReclaimReport {
        self.park(pin);
        self.reclaim()
    }

    /// Occupancy snapshot. Takes the pool and reclaimer locks, never a
    /// handle's writer lock.
    pub fn stats(&self) -> ArenaStats {
        let (handles_active, handles_retiring) = self.table.census();
        ArenaStats {
            pool: self.pool.stats(),
            retired_pending: self.reclaimer.pending(),
            handles_active,
            handles_retiring,
            global_epoch: self.clock().current(),
            reader_epoch: self.clock().reader_epoch(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rill_core::ChannelIdx;

    fn arena(canary: Option<f32>) -> SampleArena {
        SampleArena::new(ArenaConfig {
            prewarm_chunks: 0,
            max_chunks: 16,
            max_handles: 4,
            canary,
            ..ArenaConfig::new(4)
        })
        .unwrap()
    }

    fn ramp(n: usize) -> Vec<f32> {
        (0..n).map(|i| i as f32 + 1.0).collect()
    }

    #[test]
    fn invalid_config_rejected() {
        assert!(SampleArena::new(ArenaConfig::new(0)).is_err());
    }

    #[test]
    fn reader_sees_nothing_until_checkpoint() {
        let a = arena(None);
        let h = a.allocate(SampleFormat::mono(1)).unwrap();
        let mut pin = a.claim_reader().unwrap();
        assert!(a.read(h, &pin).is_none());
        a.checkpoint(&mut pin);
        assert!(a.read(h, &pin).is_some());
        a.park(&mut pin);
        assert!(a.read(h, &pin).is_none());
    }

    #[test]
    fn old_view_survives_truncate_and_reclaim() {
        let a = arena(Some(-1.0));
        let h = a.allocate(SampleFormat::mono(1)).unwrap();
        a.append(h, &Interleaved::mono(1, &ramp(10))).unwrap();

        let mut pin = a.claim_reader().unwrap();
        a.checkpoint(&mut pin);
        {
            let view = a.read(h, &pin).unwrap();
            a.truncate(h, FrameCount(5)).unwrap();
            let report = a.reclaim();
            assert_eq!(report.chunks, 0);
            let mut out = [0.0; 10];
            assert_eq!(view.read(ChannelIdx(0), FrameIdx(0), &mut out), FrameCount(10));
            assert_eq!(out.to_vec(), ramp(10));
        }
        a.checkpoint(&mut pin);
        let report = a.reclaim();
        assert_eq!(report.chunks, 1);
        assert_eq!(report.descriptors, 1);
        assert_eq!(a.read(h, &pin).unwrap().frames(), FrameCount(5));
    }

    #[test]
    fn destroy_then_reclaim_frees_slot() {
        let a = arena(None);
        let h = a.allocate(SampleFormat::mono(1)).unwrap();
        a.append(h, &Interleaved::mono(1, &ramp(8))).unwrap();
        a.destroy(h).unwrap();

        let stats = a.stats();
        assert_eq!(stats.handles_retiring, 1);
        assert_eq!(stats.pool.in_use(), 2);

        let report = a.reclaim();
        assert_eq!(report.handles, 1);
        assert_eq!(a.state(h), Ok(HandleState::Unallocated));
        assert_eq!(a.stats().pool.in_use(), 0);
    }

    #[test]
    fn flush_parks_and_reclaims() {
        let a = arena(None);
        let h = a.allocate(SampleFormat::mono(1)).unwrap();
        a.append(h, &Interleaved::mono(1, &ramp(8))).unwrap();
        let mut pin = a.claim_reader().unwrap();
        a.checkpoint(&mut pin);
        a.replace(h, &Interleaved::mono(1, &ramp(3))).unwrap();
        assert_eq!(a.reclaim().chunks, 0);

        let report = a.flush(&mut pin);
        assert_eq!(report.chunks, 2);
        assert!(!pin.is_pinned());
        assert_eq!(a.stats().retired_pending, 0);
    }

    #[test]
    fn recycled_chunks_carry_canary() {
        let a = arena(Some(-7.0));
        let h = a.allocate(SampleFormat::mono(1)).unwrap();
        a.append(h, &Interleaved::mono(1, &ramp(4))).unwrap();
        a.destroy(h).unwrap();
        a.reclaim();
        let stats = a.pool().stats();
        assert_eq!(stats.free, 1);
        let chunk = a.pool().chunk(rill_core::ChunkId(0)).unwrap();
        assert!(chunk.is_filled_with(-7.0));
    }
}
