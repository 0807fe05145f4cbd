//! Deferred reclamation of chunks, descriptors and handle slots.
//!
//! Anything unlinked from the reader's view is retired here together with
//! the epoch it was unlinked at. [`Reclaimer::collect`] hands back every
//! entry whose tag the reader has moved past. The queue is FIFO and tags
//! never decrease, so collection stops at the first entry still in use.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use smallvec::SmallVec;

use rill_core::{BufferHandle, ChunkId, Epoch};

use crate::descriptor::Descriptor;
use crate::epoch::EpochClock;

/// Something waiting for the reader to move on.
#[derive(Debug)]
pub enum Garbage {
    /// Chunks no longer referenced by any current descriptor.
    Chunks(SmallVec<[ChunkId; 2]>),
    /// A descriptor unlinked from its handle slot.
    Descriptor(Box<Descriptor>),
    /// A freed handle whose slot may be reused.
    Handle(BufferHandle),
}

/// Counts from one collection pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReclaimReport {
    /// Reader epoch the pass was checked against.
    pub reader_epoch: u64,
    /// Chunks handed back for recycling.
    pub chunks: usize,
    /// Descriptors dropped.
    pub descriptors: usize,
    /// Handle slots released.
    pub handles: usize,
    /// Entries still waiting after the pass.
    pub still_pending: usize,
}

/// Epoch-tagged retire queue.
pub struct Reclaimer {
    clock: EpochClock,
    retired: Mutex<VecDeque<(Epoch, Garbage)>>,
}

// Compile-time assertion: Reclaimer must be Send + Sync.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<Reclaimer>();
};

impl Default for Reclaimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Reclaimer {
    /// Create an empty reclaimer with a fresh clock.
    pub fn new() -> Self {
        Self {
            clock: EpochClock::new(),
            retired: Mutex::new(VecDeque::new()),
        }
    }

    /// The clock every retirement is tagged against.
    pub fn clock(&self) -> &EpochClock {
        &self.clock
    }

    /// Retire a batch unlinked by a single publication.
    ///
    /// Advances the clock and tags every item with the pre-advance epoch.
    /// The caller must have unlinked the items before calling. Returns the
    /// tag.
    pub fn retire(&self, items: impl IntoIterator<Item = Garbage>) -> Epoch {
        let mut queue = self.lock();
        // Advance under the queue lock so tags enter the queue in order.
        let tag = self.clock.advance();
        let before = queue.len();
        queue.extend(items.into_iter().map(|g| (tag, g)));
        log::trace!("retired {} item(s) at {tag}", queue.len() - before);
        tag
    }

    /// Entries waiting for the reader.
    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    /// Take every entry the reader can no longer reach.
    ///
    /// The queue lock is released before returning so that callers can
    /// dispatch the garbage while taking other locks.
    pub fn collect(&self) -> (Vec<Garbage>, ReclaimReport) {
        let reader_epoch = self.clock.reader_epoch();
        let mut queue = self.lock();
        let ready = queue
            .iter()
            .take_while(|(tag, _)| reader_epoch > tag.0)
            .count();
        let taken: Vec<Garbage> = queue.drain(..ready).map(|(_, g)| g).collect();
        let still_pending = queue.len();
        drop(queue);

        let mut report = ReclaimReport {
            reader_epoch,
            still_pending,
            ..ReclaimReport::default()
        };
        for garbage in &taken {
            match garbage {
                Garbage::Chunks(ids) => report.chunks += ids.len(),
                Garbage::Descriptor(_) => report.descriptors += 1,
                Garbage::Handle(_) => report.handles += 1,
            }
        }
        (taken, report)
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<(Epoch, Garbage)>> {
        self.retired.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
