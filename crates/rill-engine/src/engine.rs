//! The writer-side facade over the sample arena.
//!
//! [`StorageEngine`] is a cheap, cloneable handle to shared state: any
//! number of writer threads may hold a clone. Writes to different buffer
//! handles proceed in parallel; two writers on the same handle race for its
//! writer lock and the loser gets [`StoreError::Conflict`].

use std::sync::Arc;
use std::thread;

use crossbeam_channel::bounded;

use rill_arena::{HandleState, SampleArena};
use rill_core::{BufferHandle, FrameCount, FrameIdx, Interleaved, SampleFormat, StoreError};

use crate::config::{ConfigError, EngineConfig, MaintainerConfig};
use crate::maintainer::{maintainer_loop, Maintainer};
use crate::metrics::{EngineStats, MaintenanceReport};
use crate::reader::RealtimeReader;

/// One writer mutation of a buffer.
#[derive(Clone, Copy, Debug)]
pub enum WriteOp<'a> {
    /// Add frames after the current end.
    Append(Interleaved<'a>),
    /// Overwrite frames from `start` on, clamped to the current length.
    Overwrite {
        /// First frame written.
        start: FrameIdx,
        /// Replacement samples; must match the buffer's channel count.
        block: Interleaved<'a>,
    },
    /// Keep only the first `n` frames.
    Truncate(FrameCount),
    /// Swap the whole content (and possibly the format) in one version.
    Replace(Interleaved<'a>),
}

pub(crate) struct EngineShared {
    pub(crate) arena: SampleArena,
    backlog_warning: usize,
}

/// Handle-based sample storage for writer threads.
#[derive(Clone)]
pub struct StorageEngine {
    shared: Arc<EngineShared>,
}

impl StorageEngine {
    /// Build an engine, minting the prewarm chunks.
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let arena = SampleArena::new(config.arena_config())?;
        log::debug!(
            "storage engine up: {} frames/chunk, {} prewarmed, ceiling {} chunks, {} handles",
            config.frames_per_chunk,
            config.prewarm_chunks,
            config.max_chunks,
            config.max_handles
        );
        Ok(Self {
            shared: Arc::new(EngineShared {
                arena,
                backlog_warning: config.backlog_warning,
            }),
        })
    }

    /// The arena underneath, for diagnostics.
    pub fn arena(&self) -> &SampleArena {
        &self.shared.arena
    }

    /// Frames per chunk.
    pub fn frames_per_chunk(&self) -> usize {
        self.shared.arena.pool().frames_per_chunk()
    }

    /// Hand out the single real-time reader.
    ///
    /// Fails with [`StoreError::ReaderActive`] while another reader is alive.
    pub fn realtime_reader(&self) -> Result<RealtimeReader, StoreError> {
        let pin = self
            .shared
            .arena
            .claim_reader()
            .ok_or(StoreError::ReaderActive)?;
        Ok(RealtimeReader::new(Arc::clone(&self.shared), pin))
    }

    /// Create an empty buffer in the lowest free handle slot.
    pub fn allocate_handle(&self, format: SampleFormat) -> Result<BufferHandle, StoreError> {
        self.shared.arena.allocate(format)
    }

    /// Create an empty buffer at a caller-chosen handle.
    pub fn create(&self, handle: BufferHandle, format: SampleFormat) -> Result<(), StoreError> {
        self.shared.arena.create(handle, format).map(|_| ())
    }

    /// Apply one write. Returns the buffer's new valid frame count, except
    /// for [`WriteOp::Overwrite`], which returns the frames written.
    pub fn write(&self, handle: BufferHandle, op: WriteOp<'_>) -> Result<FrameCount, StoreError> {
        match op {
            WriteOp::Append(block) => self.shared.arena.append(handle, &block),
            WriteOp::Overwrite { start, block } => {
                self.shared.arena.write_at(handle, start, &block)
            }
            WriteOp::Truncate(frames) => self.shared.arena.truncate(handle, frames),
            WriteOp::Replace(block) => self.shared.arena.replace(handle, &block),
        }
    }

    /// Append interleaved frames.
    pub fn append(
        &self,
        handle: BufferHandle,
        block: Interleaved<'_>,
    ) -> Result<FrameCount, StoreError> {
        self.write(handle, WriteOp::Append(block))
    }

    /// Overwrite frames from `start` on in a single version. Returns the
    /// frames written; the buffer never grows.
    pub fn write_at(
        &self,
        handle: BufferHandle,
        start: FrameIdx,
        block: Interleaved<'_>,
    ) -> Result<FrameCount, StoreError> {
        self.write(handle, WriteOp::Overwrite { start, block })
    }

    /// Keep only the first `frames` frames.
    pub fn truncate(
        &self,
        handle: BufferHandle,
        frames: FrameCount,
    ) -> Result<FrameCount, StoreError> {
        self.write(handle, WriteOp::Truncate(frames))
    }

    /// Replace the content in a single version.
    pub fn replace(
        &self,
        handle: BufferHandle,
        block: Interleaved<'_>,
    ) -> Result<FrameCount, StoreError> {
        self.write(handle, WriteOp::Replace(block))
    }

    /// Destroy the buffer. The handle stays `Retiring` until a
    /// [`maintain`](Self::maintain) pass finds the reader past the free.
    pub fn free(&self, handle: BufferHandle) -> Result<(), StoreError> {
        self.shared.arena.destroy(handle)
    }

    /// Lifecycle state of `handle`.
    pub fn state(&self, handle: BufferHandle) -> Result<HandleState, StoreError> {
        self.shared.arena.state(handle)
    }

    /// Writer-side frame count of `handle`.
    pub fn frames(&self, handle: BufferHandle) -> Result<FrameCount, StoreError> {
        self.shared.arena.frames(handle)
    }

    /// Recycle everything the reader has moved past. Never call from the
    /// real-time thread.
    pub fn maintain(&self) -> MaintenanceReport {
        let reclaimed = self.shared.arena.reclaim();
        self.report(reclaimed)
    }

    /// Forced flush for a stopped stream.
    ///
    /// Holding `&mut` on the reader is the proof that it is not inside a
    /// processing block. The reader is parked; its next
    /// [`checkpoint`](RealtimeReader::checkpoint) resumes reading.
    pub fn flush(&self, reader: &mut RealtimeReader) -> MaintenanceReport {
        let reclaimed = self.shared.arena.flush(reader.pin_mut());
        log::debug!("forced flush");
        self.report(reclaimed)
    }

    fn report(&self, reclaimed: rill_arena::ReclaimReport) -> MaintenanceReport {
        let report = MaintenanceReport::new(self.shared.arena.clock().current(), reclaimed);
        if !report.is_empty() {
            log::debug!(
                "maintain: {} chunks, {} descriptors, {} handles reclaimed; {} pending",
                report.chunks_recycled,
                report.descriptors_dropped,
                report.handles_released,
                report.still_pending
            );
        }
        if report.still_pending > self.shared.backlog_warning {
            log::warn!(
                "retire backlog at {} items (reader epoch {}); is the reader checkpointing?",
                report.still_pending,
                reclaimed.reader_epoch
            );
        }
        report
    }

    /// Occupancy snapshot.
    pub fn stats(&self) -> EngineStats {
        self.shared.arena.stats().into()
    }

    /// Run [`maintain`](Self::maintain) periodically on a named thread.
    pub fn spawn_maintainer(&self, config: MaintainerConfig) -> Result<Maintainer, ConfigError> {
        config.validate()?;
        let (stop_tx, stop_rx) = bounded(1);
        let engine = self.clone();
        let thread = thread::Builder::new()
            .name("rill-maintain".into())
            .spawn(move || maintainer_loop(engine, stop_rx, config.interval))
            .map_err(|e| ConfigError::ThreadSpawnFailed {
                reason: format!("maintainer: {e}"),
            })?;
        Ok(Maintainer::new(stop_tx, thread))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> StorageEngine {
        StorageEngine::new(EngineConfig {
            frames_per_chunk: 4,
            prewarm_chunks: 4,
            max_chunks: 32,
            max_handles: 4,
            ..EngineConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn invalid_config_fails_construction() {
        let result = StorageEngine::new(EngineConfig {
            frames_per_chunk: 0,
            ..EngineConfig::default()
        });
        assert!(matches!(result, Err(ConfigError::ZeroChunkSize)));
    }

    #[test]
    fn write_variants_dispatch() {
        let e = engine();
        let h = e.allocate_handle(SampleFormat::mono(48_000)).unwrap();
        let data = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(
            e.write(h, WriteOp::Append(Interleaved::mono(48_000, &data))),
            Ok(FrameCount(5))
        );
        let patch = WriteOp::Overwrite {
            start: FrameIdx(3),
            block: Interleaved::mono(48_000, &[9.0, 9.0, 9.0]),
        };
        assert_eq!(e.write(h, patch), Ok(FrameCount(2)));
        assert_eq!(e.frames(h), Ok(FrameCount(5)));
        assert_eq!(e.write(h, WriteOp::Truncate(FrameCount(2))), Ok(FrameCount(2)));
        assert_eq!(
            e.write(h, WriteOp::Replace(Interleaved::mono(48_000, &data[..3]))),
            Ok(FrameCount(3))
        );
        assert_eq!(e.frames(h), Ok(FrameCount(3)));
    }

    #[test]
    fn second_reader_refused() {
        let e = engine();
        let reader = e.realtime_reader().unwrap();
        assert_eq!(e.realtime_reader().err(), Some(StoreError::ReaderActive));
        drop(reader);
        assert!(e.realtime_reader().is_ok());
    }

    #[test]
    fn free_then_maintain_releases_handle() {
        let e = engine();
        let h = e.allocate_handle(SampleFormat::mono(1)).unwrap();
        e.free(h).unwrap();
        assert_eq!(e.state(h), Ok(HandleState::Retiring));
        let report = e.maintain();
        assert_eq!(report.handles_released, 1);
        assert_eq!(e.state(h), Ok(HandleState::Unallocated));
        assert_eq!(e.free(h), Err(StoreError::NotFound { handle: h }));
    }

    #[test]
    fn clones_share_state() {
        let e = engine();
        let other = e.clone();
        let h = e.allocate_handle(SampleFormat::mono(1)).unwrap();
        assert_eq!(other.state(h), Ok(HandleState::Active));
        assert_eq!(other.stats().handles_active, 1);
    }

    #[test]
    fn stats_track_chunks() {
        let e = engine();
        let h = e.allocate_handle(SampleFormat::mono(1)).unwrap();
        e.append(h, Interleaved::mono(1, &[0.0; 9])).unwrap();
        let stats = e.stats();
        assert_eq!(stats.chunks_in_use, 3);
        assert_eq!(stats.chunks_minted, 4);
        assert_eq!(stats.chunks_free, 1);
        assert_eq!(stats.handles_active, 1);
    }
}
