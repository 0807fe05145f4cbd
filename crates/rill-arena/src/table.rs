//! Buffer descriptor table: stable handles to the current descriptor.
//!
//! Each handle slot pairs a published descriptor pointer (read lock-free by
//! the real-time thread) with a writer mutex. Writers take the mutex with
//! `try_lock`, so two writers racing on one handle see [`StoreError::Conflict`]
//! instead of queueing. Every mutation builds a complete descriptor, swaps it
//! in, and retires what the old one referenced exclusively.
//!
//! Lifecycle and frame count are mirrored in atomics so that observers
//! ([`DescriptorTable::state`], [`DescriptorTable::frames`],
//! [`DescriptorTable::census`]) and the reclaimer never take a writer lock.
//!
//! Slot lifecycle: `Unallocated -> Active -> Retiring -> Unallocated`. The
//! first two edges are taken under the writer lock. The last is taken by
//! [`DescriptorTable::release_slot`] once the reclaimer has proven the
//! reader is past the destroy.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, TryLockError};

use smallvec::SmallVec;

use rill_core::{BufferHandle, FrameCount, FrameIdx, Interleaved, SampleFormat, StoreError};

use crate::descriptor::{Descriptor, Superseded};
use crate::epoch::{EpochClock, ReaderPin};
use crate::pool::ChunkPool;
use crate::raw::PublishedDescriptor;
use crate::reclaim::{Garbage, Reclaimer};

/// Lifecycle state of a handle slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum HandleState {
    /// Free for `create`/`allocate`.
    Unallocated = 0,
    /// Holds a published descriptor.
    Active = 1,
    /// Destroyed; waiting for the reader to move past the destroy.
    Retiring = 2,
}

impl HandleState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Active,
            2 => Self::Retiring,
            _ => Self::Unallocated,
        }
    }
}

struct SlotState {
    version: u64,
}

struct HandleSlot {
    published: PublishedDescriptor,
    lifecycle: AtomicU8,
    /// Frames of the published descriptor. Zero unless `Active`.
    frames: AtomicU64,
    writer: Mutex<SlotState>,
}

impl HandleSlot {
    fn lifecycle(&self) -> HandleState {
        HandleState::from_u8(self.lifecycle.load(Ordering::Acquire))
    }

    fn set_lifecycle(&self, state: HandleState) {
        self.lifecycle.store(state as u8, Ordering::Release);
    }
}

type SlotGuard<'a> = MutexGuard<'a, SlotState>;

/// Fixed-capacity map from [`BufferHandle`] to its current [`Descriptor`].
pub struct DescriptorTable {
    slots: Box<[HandleSlot]>,
}

// Compile-time assertion: DescriptorTable must be Send + Sync.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<DescriptorTable>();
};

impl DescriptorTable {
    /// Create a table with `capacity` unallocated slots.
    pub fn new(capacity: usize) -> Self {
        let slots = (0..capacity)
            .map(|_| HandleSlot {
                published: PublishedDescriptor::empty(),
                lifecycle: AtomicU8::new(HandleState::Unallocated as u8),
                frames: AtomicU64::new(0),
                writer: Mutex::new(SlotState { version: 0 }),
            })
            .collect();
        Self { slots }
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Initialise `handle` with an empty buffer. Returns the version
    /// published.
    pub fn create(
        &self,
        handle: BufferHandle,
        format: SampleFormat,
        pool: &ChunkPool,
    ) -> Result<u64, StoreError> {
        format.validate()?;
        let slot = self.slot(handle)?;
        let mut state = try_lock(slot, handle)?;
        self.create_locked(slot, &mut state, handle, format, pool)
    }

    /// Create a buffer in the lowest unallocated slot.
    ///
    /// Retiring and active slots are skipped. A free slot whose writer lock
    /// is held by a racing allocator is waited for, not skipped, so
    /// [`StoreError::HandlesExhausted`] means every slot was in use.
    pub fn allocate(
        &self,
        format: SampleFormat,
        pool: &ChunkPool,
    ) -> Result<BufferHandle, StoreError> {
        format.validate()?;
        for (index, slot) in self.slots.iter().enumerate() {
            if slot.lifecycle() != HandleState::Unallocated {
                continue;
            }
            let handle = BufferHandle(index as u32);
            let mut state = lock(slot);
            if slot.lifecycle() != HandleState::Unallocated {
                continue;
            }
            self.create_locked(slot, &mut state, handle, format, pool)?;
            return Ok(handle);
        }
        Err(StoreError::HandlesExhausted {
            capacity: self.slots.len(),
        })
    }

    fn create_locked(
        &self,
        slot: &HandleSlot,
        state: &mut SlotGuard<'_>,
        handle: BufferHandle,
        format: SampleFormat,
        pool: &ChunkPool,
    ) -> Result<u64, StoreError> {
        if slot.lifecycle() != HandleState::Unallocated {
            return Err(StoreError::AlreadyExists { handle });
        }
        state.version += 1;
        let desc = Descriptor::empty(format, pool.frames_per_chunk(), state.version);
        let prev = slot.published.publish(Some(Box::new(desc)));
        debug_assert!(prev.is_none());
        slot.frames.store(0, Ordering::Release);
        slot.set_lifecycle(HandleState::Active);
        log::debug!(
            "created {handle} ({} ch @ {} Hz)",
            format.channels,
            format.sample_rate
        );
        Ok(state.version)
    }

    /// Append `block` to the buffer. Returns the new valid frame count.
    pub fn append(
        &self,
        handle: BufferHandle,
        block: &Interleaved<'_>,
        pool: &ChunkPool,
        reclaimer: &Reclaimer,
    ) -> Result<FrameCount, StoreError> {
        self.mutate(handle, reclaimer, |current, version| {
            current.extended(block, pool, version).map(Some)
        })
    }

    /// Overwrite frames from `start` on with `block`, clamped to the current
    /// length. Returns the frames written; zero publishes nothing.
    pub fn write_at(
        &self,
        handle: BufferHandle,
        start: FrameIdx,
        block: &Interleaved<'_>,
        pool: &ChunkPool,
        reclaimer: &Reclaimer,
    ) -> Result<FrameCount, StoreError> {
        let mut written = FrameCount::ZERO;
        self.mutate(handle, reclaimer, |current, version| {
            let next = current.overwritten(start, block, pool, version)?;
            Ok(next.map(|(desc, superseded, n)| {
                written = n;
                (desc, superseded)
            }))
        })?;
        Ok(written)
    }

    /// Cut the buffer to its first `frames` frames. Returns the new valid
    /// frame count.
    ///
    /// Truncating to the current length publishes nothing.
    pub fn truncate(
        &self,
        handle: BufferHandle,
        frames: FrameCount,
        reclaimer: &Reclaimer,
    ) -> Result<FrameCount, StoreError> {
        self.mutate(handle, reclaimer, |current, version| {
            if frames == current.frames() {
                return Ok(None);
            }
            current.truncated(frames, version).map(Some)
        })
    }

    /// Replace the whole content with `block` as one version. The format may
    /// change. Returns the new valid frame count.
    pub fn replace(
        &self,
        handle: BufferHandle,
        block: &Interleaved<'_>,
        pool: &ChunkPool,
        reclaimer: &Reclaimer,
    ) -> Result<FrameCount, StoreError> {
        self.mutate(handle, reclaimer, |current, version| {
            let next = Descriptor::filled(block, pool, version)?;
            Ok(Some((next, current.all_chunks().iter().copied().collect())))
        })
    }

    /// Unlink the buffer and retire its descriptor, its chunks and the slot.
    pub fn destroy(
        &self,
        handle: BufferHandle,
        reclaimer: &Reclaimer,
    ) -> Result<(), StoreError> {
        let slot = self.slot(handle)?;
        let _state = try_lock(slot, handle)?;
        if slot.lifecycle() != HandleState::Active {
            return Err(StoreError::NotFound { handle });
        }
        let prev = slot.published.publish(None);
        slot.frames.store(0, Ordering::Release);
        // Retiring must be visible before the handle can be collected.
        slot.set_lifecycle(HandleState::Retiring);
        let mut garbage: SmallVec<[Garbage; 3]> = SmallVec::new();
        if let Some(prev) = prev {
            garbage.push(Garbage::Chunks(prev.all_chunks().iter().copied().collect()));
            garbage.push(Garbage::Descriptor(prev));
        }
        garbage.push(Garbage::Handle(handle));
        let tag = reclaimer.retire(garbage);
        log::debug!("destroyed {handle}, retiring at epoch {tag}");
        Ok(())
    }

    /// Return a retiring slot to `Unallocated`. Called by the reclaimer's
    /// dispatcher once the destroy is unreachable.
    pub fn release_slot(&self, handle: BufferHandle) {
        let Ok(slot) = self.slot(handle) else {
            return;
        };
        let released = slot.lifecycle.compare_exchange(
            HandleState::Retiring as u8,
            HandleState::Unallocated as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        if released.is_ok() {
            log::debug!("{handle} reusable");
        }
    }

    /// Current lifecycle state of `handle`.
    pub fn state(&self, handle: BufferHandle) -> Result<HandleState, StoreError> {
        Ok(self.slot(handle)?.lifecycle())
    }

    /// Writer-side view of the current frame count.
    pub fn frames(&self, handle: BufferHandle) -> Result<FrameCount, StoreError> {
        let slot = self.slot(handle)?;
        if slot.lifecycle() != HandleState::Active {
            return Err(StoreError::NotFound { handle });
        }
        Ok(FrameCount(slot.frames.load(Ordering::Acquire)))
    }

    /// Count slots per state: `(active, retiring)`.
    pub fn census(&self) -> (usize, usize) {
        self.slots
            .iter()
            .fold((0, 0), |(active, retiring), slot| match slot.lifecycle() {
                HandleState::Active => (active + 1, retiring),
                HandleState::Retiring => (active, retiring + 1),
                HandleState::Unallocated => (active, retiring),
            })
    }

    /// Real-time lookup. `None` for unknown handles, unpublished slots and
    /// a reader that is not pinned on `clock`.
    pub(crate) fn read<'g>(
        &'g self,
        handle: BufferHandle,
        clock: &EpochClock,
        pin: &'g ReaderPin,
    ) -> Option<&'g Descriptor> {
        self.slots
            .get(handle.index())?
            .published
            .load_pinned(clock, pin)
    }

    /// Shared body of the writes: lock, build, publish, retire.
    ///
    /// `build` returns `None` when there is nothing to publish.
    fn mutate<F>(
        &self,
        handle: BufferHandle,
        reclaimer: &Reclaimer,
        build: F,
    ) -> Result<FrameCount, StoreError>
    where
        F: FnOnce(&Descriptor, u64) -> Result<Option<(Descriptor, Superseded)>, StoreError>,
    {
        let slot = self.slot(handle)?;
        let mut state = try_lock(slot, handle)?;
        if slot.lifecycle() != HandleState::Active {
            return Err(StoreError::NotFound { handle });
        }
        let current = slot
            .published
            .load_locked(&state)
            .ok_or(StoreError::NotFound { handle })?;
        let version = state.version + 1;
        let Some((next, superseded)) = build(current, version)? else {
            return Ok(current.frames());
        };
        let frames = next.frames();

        let prev = slot.published.publish(Some(Box::new(next)));
        slot.frames.store(frames.0, Ordering::Release);
        state.version = version;
        if let Some(prev) = prev {
            let mut garbage: SmallVec<[Garbage; 2]> = SmallVec::new();
            if !superseded.is_empty() {
                garbage.push(Garbage::Chunks(superseded));
            }
            garbage.push(Garbage::Descriptor(prev));
            reclaimer.retire(garbage);
        }
        log::trace!("{handle} now v{version}, {frames}");
        Ok(frames)
    }

    fn slot(&self, handle: BufferHandle) -> Result<&HandleSlot, StoreError> {
        self.slots
            .get(handle.index())
            .ok_or(StoreError::NotFound { handle })
    }
}

fn try_lock(slot: &HandleSlot, handle: BufferHandle) -> Result<SlotGuard<'_>, StoreError> {
    match slot.writer.try_lock() {
        Ok(guard) => Ok(guard),
        Err(TryLockError::Poisoned(poisoned)) => Ok(poisoned.into_inner()),
        Err(TryLockError::WouldBlock) => Err(StoreError::Conflict { handle }),
    }
}

fn lock(slot: &HandleSlot) -> SlotGuard<'_> {
    slot.writer.lock().unwrap_or_else(PoisonError::into_inner)
}
