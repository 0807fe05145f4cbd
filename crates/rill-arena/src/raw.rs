//! Descriptor publication: the only `unsafe` code in the workspace.
//!
//! A handle slot owns at most one current [`Descriptor`] through an
//! `AtomicPtr`. Writers swap in a new boxed descriptor with release
//! ordering; the swapped-out box is returned to the caller, which must hand
//! it to the reclaimer rather than drop it. The reader loads with acquire
//! ordering and derefs only while pinned.
//!
//! Invariants relied on by the `unsafe` blocks below:
//!
//! 1. Every non-null pointer stored here came from `Box::into_raw`.
//! 2. A pointer is turned back into a `Box` exactly once: either by
//!    [`PublishedDescriptor::publish`] (which unlinks it) or by `Drop`.
//! 3. An unlinked descriptor is dropped only by the reclaimer, after the
//!    reader of the clock passed to [`PublishedDescriptor::load_pinned`]
//!    has pinned at an epoch past the descriptor's retire tag.
//! 4. Writers serialise `publish` calls on one slot behind the slot mutex,
//!    and the descriptor current under that mutex is never retired while
//!    it is held.

#![allow(unsafe_code)]

use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::MutexGuard;

use crate::descriptor::Descriptor;
use crate::epoch::{EpochClock, ReaderPin};

pub(crate) struct PublishedDescriptor {
    ptr: AtomicPtr<Descriptor>,
}

impl PublishedDescriptor {
    pub(crate) fn empty() -> Self {
        Self {
            ptr: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// Replace the current descriptor. Returns the unlinked one, which the
    /// caller must retire.
    pub(crate) fn publish(&self, next: Option<Box<Descriptor>>) -> Option<Box<Descriptor>> {
        let raw = next.map_or(ptr::null_mut(), Box::into_raw);
        let prev = self.ptr.swap(raw, Ordering::AcqRel);
        if prev.is_null() {
            None
        } else {
            // SAFETY: `prev` came from `Box::into_raw` (invariant 1) and the
            // swap removed it from the slot, so no other path can rebuild
            // the box (invariant 2).
            Some(unsafe { Box::from_raw(prev) })
        }
    }

    /// Writer-side load, valid while the slot's writer lock is held.
    pub(crate) fn load_locked<'g, T>(
        &self,
        _writer: &'g MutexGuard<'_, T>,
    ) -> Option<&'g Descriptor> {
        let raw = self.ptr.load(Ordering::Acquire);
        // SAFETY: the slot lock is held for `'g`; the current descriptor is
        // retired only by a `publish` under that same lock (invariant 4),
        // so it outlives the guard borrow.
        unsafe { raw.as_ref() }
    }

    /// Reader-side load. Returns `None` unless `pin` is a pinned reader of
    /// `clock`.
    pub(crate) fn load_pinned<'g>(
        &'g self,
        clock: &EpochClock,
        pin: &'g ReaderPin,
    ) -> Option<&'g Descriptor> {
        if !clock.owns(pin) || !pin.is_pinned() {
            return None;
        }
        let raw = self.ptr.load(Ordering::Acquire);
        // SAFETY: the reader is pinned on the clock that tags every
        // descriptor unlinked from this slot. Anything this load can observe
        // is either current or was retired at a tag not below the pinned
        // epoch, and stays allocated until the reader re-pins, which needs
        // `&mut ReaderPin` and so ends `'g` (invariant 3).
        unsafe { raw.as_ref() }
    }

    #[cfg(test)]
    fn is_published(&self) -> bool {
        !self.ptr.load(Ordering::Acquire).is_null()
    }
}

impl Drop for PublishedDescriptor {
    fn drop(&mut self) {
        let raw = *self.ptr.get_mut();
        if !raw.is_null() {
            // SAFETY: `&mut self` means no reader or writer can reach the
            // slot; the pointer came from `Box::into_raw` (invariant 1).
            drop(unsafe { Box::from_raw(raw) });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rill_core::SampleFormat;
    use std::sync::Mutex;

    fn desc(version: u64) -> Box<Descriptor> {
        Box::new(Descriptor::empty(SampleFormat::mono(1), 4, version))
    }

    #[test]
    fn publish_returns_previous() {
        let slot = PublishedDescriptor::empty();
        assert!(!slot.is_published());
        assert!(slot.publish(Some(desc(1))).is_none());
        let prev = slot.publish(Some(desc(2))).unwrap();
        assert_eq!(prev.version(), 1);
        let last = slot.publish(None).unwrap();
        assert_eq!(last.version(), 2);
        assert!(!slot.is_published());
    }

    #[test]
    fn locked_load_sees_current() {
        let lock = Mutex::new(());
        let slot = PublishedDescriptor::empty();
        slot.publish(Some(desc(7)));
        let guard = lock.lock().unwrap();
        assert_eq!(slot.load_locked(&guard).map(Descriptor::version), Some(7));
    }

    #[test]
    fn pinned_load_requires_pinned_owner() {
        let clock = EpochClock::new();
        let slot = PublishedDescriptor::empty();
        slot.publish(Some(desc(3)));

        let mut pin = clock.claim_reader().unwrap();
        assert!(slot.load_pinned(&clock, &pin).is_none());
        clock.pin(&mut pin);
        assert_eq!(slot.load_pinned(&clock, &pin).map(Descriptor::version), Some(3));

        let other = EpochClock::new();
        assert!(slot.load_pinned(&other, &pin).is_none());
    }
}
