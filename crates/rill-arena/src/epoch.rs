//! Epoch clock shared by writers and the single real-time reader.
//!
//! Writers advance the global epoch each time they unlink something from
//! the reader's view and tag the unlinked object with the epoch they
//! advanced from. The reader pins once per processing block by publishing
//! the global epoch it observed. An object tagged `E` is unreachable once
//! the reader's published epoch is greater than `E`: every lookup made
//! after that pin observed the unlink.
//!
//! The pin and the reclaim check are each followed/preceded by a `SeqCst`
//! fence so that a reader coming out of the parked state cannot publish a
//! stale epoch after a writer has already decided everything is free.

use std::sync::atomic::{fence, AtomicBool, AtomicU64, Ordering};

use rill_core::Epoch;

/// Sentinel meaning "the reader holds nothing".
pub const EPOCH_UNPINNED: u64 = u64::MAX;

static CLOCK_IDS: AtomicU64 = AtomicU64::new(1);

/// Reader epoch cell, padded to keep writer traffic on the global counter
/// off the reader's cache line.
///
/// 128-byte alignment covers both 64-byte (x86) and 128-byte (Apple
/// M-series) cache line sizes.
#[repr(align(128))]
struct ReaderEpoch {
    observed: AtomicU64,
}

/// Global epoch counter plus the reader's published epoch.
pub struct EpochClock {
    global: AtomicU64,
    reader: ReaderEpoch,
    claimed: AtomicBool,
    id: u64,
}

// Compile-time assertion: EpochClock must be Send + Sync.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<EpochClock>();
};

impl Default for EpochClock {
    fn default() -> Self {
        Self::new()
    }
}

impl EpochClock {
    /// Create a clock at epoch 1 with an unpinned reader.
    pub fn new() -> Self {
        Self {
            global: AtomicU64::new(1),
            reader: ReaderEpoch {
                observed: AtomicU64::new(EPOCH_UNPINNED),
            },
            claimed: AtomicBool::new(false),
            id: CLOCK_IDS.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Current global epoch.
    pub fn current(&self) -> Epoch {
        Epoch(self.global.load(Ordering::Acquire))
    }

    /// Advance the global epoch. Writer side only.
    ///
    /// Returns the epoch that was current before the advance. Anything
    /// unlinked before this call must be tagged with the returned value.
    pub fn advance(&self) -> Epoch {
        let prev = self.global.fetch_add(1, Ordering::AcqRel);
        fence(Ordering::SeqCst);
        Epoch(prev)
    }

    /// The reader's published epoch, or [`EPOCH_UNPINNED`].
    pub fn reader_epoch(&self) -> u64 {
        fence(Ordering::SeqCst);
        self.reader.observed.load(Ordering::Acquire)
    }

    /// Whether an object tagged `tag` is provably unreachable by the reader.
    pub fn is_reclaimable(&self, tag: Epoch) -> bool {
        self.reader_epoch() > tag.0
    }

    /// Take the single reader slot. Returns `None` while another pin exists.
    pub fn claim_reader(&self) -> Option<ReaderPin> {
        self.claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ReaderPin {
                clock_id: self.id,
                pinned: false,
            })
    }

    /// Give the reader slot back, unpinning first.
    pub fn release_reader(&self, pin: &mut ReaderPin) {
        if !self.owns(pin) {
            return;
        }
        self.unpin(pin);
        pin.clock_id = 0;
        self.claimed.store(false, Ordering::Release);
    }

    /// Whether `pin` was claimed from this clock and is still held.
    pub fn owns(&self, pin: &ReaderPin) -> bool {
        pin.clock_id == self.id
    }

    /// Reader checkpoint: publish the current global epoch.
    ///
    /// Real-time safe: two loads, one store and a fence. Requires `&mut`
    /// so that no view obtained under the previous pin is still alive.
    pub fn pin(&self, pin: &mut ReaderPin) -> Epoch {
        if !self.owns(pin) {
            return Epoch(0);
        }
        let observed = self.global.load(Ordering::Acquire);
        self.reader.observed.store(observed, Ordering::Release);
        fence(Ordering::SeqCst);
        pin.pinned = true;
        Epoch(observed)
    }

    /// Reader parks: it holds nothing until the next [`pin`](Self::pin).
    pub fn unpin(&self, pin: &mut ReaderPin) {
        if !self.owns(pin) {
            return;
        }
        pin.pinned = false;
        self.reader
            .observed
            .store(EPOCH_UNPINNED, Ordering::Release);
    }
}

/// Proof of being the one real-time reader of an [`EpochClock`].
///
/// Views into published descriptors borrow the pin; re-pinning or parking
/// needs `&mut`, so no view can survive a checkpoint.
#[derive(Debug)]
pub struct ReaderPin {
    clock_id: u64,
    pinned: bool,
}

impl ReaderPin {
    /// Whether the reader is pinned (may read published descriptors).
    pub fn is_pinned(&self) -> bool {
        self.pinned
    }
}
