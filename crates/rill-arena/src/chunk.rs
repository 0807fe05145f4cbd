//! Fixed-capacity sample chunks.
//!
//! A [`Chunk`] is the unit of storage handed out by the pool. Samples are
//! kept as `f32` bit patterns in `AtomicU32` cells so that a writer filling
//! a fresh chunk and the real-time reader scanning a published one never
//! need `unsafe` or a lock. All cell accesses are `Relaxed`; ordering comes
//! from the release/acquire pair on descriptor publication.

use std::collections::TryReserveError;
use std::sync::atomic::{AtomicU32, Ordering};

/// A block of `capacity` samples of one channel.
pub struct Chunk {
    samples: Box<[AtomicU32]>,
}

impl Chunk {
    /// Allocate a zeroed chunk, reporting allocator failure instead of aborting.
    pub fn try_new(capacity: usize) -> Result<Self, TryReserveError> {
        let mut samples = Vec::new();
        samples.try_reserve_exact(capacity)?;
        samples.extend((0..capacity).map(|_| AtomicU32::new(0)));
        Ok(Self {
            samples: samples.into_boxed_slice(),
        })
    }

    /// Number of samples the chunk holds.
    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    /// Read the sample at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= capacity`.
    #[inline]
    pub fn load(&self, index: usize) -> f32 {
        f32::from_bits(self.samples[index].load(Ordering::Relaxed))
    }

    /// Write the sample at `index`. Only legal before the chunk is published.
    #[inline]
    pub fn store(&self, index: usize, value: f32) {
        self.samples[index].store(value.to_bits(), Ordering::Relaxed);
    }

    /// Overwrite every sample with `value`.
    pub fn fill(&self, value: f32) {
        let bits = value.to_bits();
        for cell in self.samples.iter() {
            cell.store(bits, Ordering::Relaxed);
        }
    }

    /// Copy `out.len()` samples starting at `start` into `out`.
    ///
    /// # Panics
    ///
    /// Panics if the range exceeds the chunk.
    #[inline]
    pub fn copy_to(&self, start: usize, out: &mut [f32]) {
        let cells = &self.samples[start..start + out.len()];
        for (dst, cell) in out.iter_mut().zip(cells) {
            *dst = f32::from_bits(cell.load(Ordering::Relaxed));
        }
    }

    /// Copy the first `len` samples of `src` into this chunk.
    pub fn copy_prefix_from(&self, src: &Chunk, len: usize) {
        for (dst, cell) in self.samples[..len].iter().zip(&src.samples[..len]) {
            dst.store(cell.load(Ordering::Relaxed), Ordering::Relaxed);
        }
    }

    /// Whether every sample equals `value` bit-for-bit.
    pub fn is_filled_with(&self, value: f32) -> bool {
        let bits = value.to_bits();
        self.samples
            .iter()
            .all(|cell| cell.load(Ordering::Relaxed) == bits)
    }
}

impl std::fmt::Debug for Chunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunk")
            .field("capacity", &self.capacity())
            .finish()
    }
}
