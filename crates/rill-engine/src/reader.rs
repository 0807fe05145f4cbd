//! The real-time reader endpoint.
//!
//! Typical use inside an audio callback:
//!
//! ```ignore
//! reader.checkpoint();
//! if let Some(view) = reader.read_for_realtime(handle) {
//!     view.read(ChannelIdx(0), FrameIdx(pos), &mut out);
//! }
//! ```
//!
//! Nothing here locks, allocates or blocks. Create and drop the reader off
//! the real-time thread: it holds a reference-counted handle to the engine.

use std::sync::Arc;

use rill_arena::{DescriptorView, ReaderPin};
use rill_core::{BufferHandle, Epoch};

use crate::engine::EngineShared;

/// The single real-time reader of a [`StorageEngine`](crate::StorageEngine).
///
/// Views returned by [`read_for_realtime`](Self::read_for_realtime) borrow
/// the reader, so they end before the next checkpoint.
pub struct RealtimeReader {
    shared: Arc<EngineShared>,
    pin: ReaderPin,
}

impl RealtimeReader {
    pub(crate) fn new(shared: Arc<EngineShared>, pin: ReaderPin) -> Self {
        Self { shared, pin }
    }

    pub(crate) fn pin_mut(&mut self) -> &mut ReaderPin {
        &mut self.pin
    }

    /// Publish the epoch this block reads at. Call once per processing
    /// block, before any read.
    pub fn checkpoint(&mut self) -> Epoch {
        self.shared.arena.checkpoint(&mut self.pin)
    }

    /// Stop holding anything, e.g. when the stream stops. Reads return
    /// `None` until the next checkpoint.
    pub fn park(&mut self) {
        self.shared.arena.park(&mut self.pin);
    }

    /// Whether the reader is between a checkpoint and a park.
    pub fn is_active(&self) -> bool {
        self.pin.is_pinned()
    }

    /// Current published descriptor of `handle`.
    ///
    /// `None` for unknown or unallocated handles and while parked.
    #[inline]
    pub fn read_for_realtime(&self, handle: BufferHandle) -> Option<DescriptorView<'_>> {
        self.shared.arena.read(handle, &self.pin)
    }
}

impl Drop for RealtimeReader {
    fn drop(&mut self) {
        self.shared.arena.release_reader(&mut self.pin);
    }
}

#[cfg(test)]
mod tests {
    use rill_core::{ChannelIdx, FrameIdx, Interleaved, SampleFormat};

    use crate::{EngineConfig, StorageEngine};

    fn engine() -> StorageEngine {
        StorageEngine::new(EngineConfig {
            frames_per_chunk: 4,
            prewarm_chunks: 0,
            max_chunks: 16,
            max_handles: 2,
            ..EngineConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn reads_need_a_checkpoint() {
        let e = engine();
        let h = e.allocate_handle(SampleFormat::mono(1)).unwrap();
        let mut reader = e.realtime_reader().unwrap();
        assert!(!reader.is_active());
        assert!(reader.read_for_realtime(h).is_none());
        reader.checkpoint();
        assert!(reader.is_active());
        assert!(reader.read_for_realtime(h).is_some());
        reader.park();
        assert!(reader.read_for_realtime(h).is_none());
    }

    #[test]
    fn unknown_handle_is_none() {
        let e = engine();
        let mut reader = e.realtime_reader().unwrap();
        reader.checkpoint();
        assert!(reader.read_for_realtime(rill_core::BufferHandle(0)).is_none());
        assert!(reader.read_for_realtime(rill_core::BufferHandle(99)).is_none());
    }

    #[test]
    fn view_reads_samples() {
        let e = engine();
        let h = e.allocate_handle(SampleFormat::mono(1)).unwrap();
        e.append(h, Interleaved::mono(1, &[0.5, 0.25, -0.5])).unwrap();
        let mut reader = e.realtime_reader().unwrap();
        reader.checkpoint();
        let view = reader.read_for_realtime(h).unwrap();
        assert_eq!(view.sample(ChannelIdx(0), FrameIdx(1)), Some(0.25));
        assert_eq!(view.frames().0, 3);
    }

    #[test]
    fn dropping_reader_unpins() {
        let e = engine();
        let mut reader = e.realtime_reader().unwrap();
        reader.checkpoint();
        assert_ne!(e.stats().reader_epoch, u64::MAX);
        drop(reader);
        assert_eq!(e.stats().reader_epoch, u64::MAX);
    }
}
