//! Arena configuration parameters.

use rill_core::StoreError;

/// Configuration for the sample arena.
///
/// Controls chunk sizing, pool limits and handle capacity. Validated at
/// construction; all values are immutable after creation.
#[derive(Clone, Debug, PartialEq)]
pub struct ArenaConfig {
    /// Sample frames per chunk (per channel).
    ///
    /// Default: 4096. Must be non-zero.
    pub frames_per_chunk: u32,

    /// Chunks minted up front so that early writes do not hit the allocator.
    ///
    /// Default: 64. Must not exceed `max_chunks`.
    pub prewarm_chunks: u32,

    /// Maximum number of chunks the pool will ever mint.
    ///
    /// Default: 16_384 (256 MiB of `f32` at the default chunk size).
    pub max_chunks: u32,

    /// Number of handle slots in the descriptor table.
    ///
    /// Default: 256.
    pub max_handles: u32,

    /// Value written over every chunk as it is recycled into the free list.
    ///
    /// `None` (default) skips the fill. Useful for catching reads of
    /// recycled memory in tests.
    pub canary: Option<f32>,
}

impl ArenaConfig {
    /// Default chunk size in frames.
    pub const DEFAULT_FRAMES_PER_CHUNK: u32 = 4096;

    /// Default number of pre-minted chunks.
    pub const DEFAULT_PREWARM_CHUNKS: u32 = 64;

    /// Default pool ceiling.
    pub const DEFAULT_MAX_CHUNKS: u32 = 16_384;

    /// Default handle capacity.
    pub const DEFAULT_MAX_HANDLES: u32 = 256;

    /// Create a config with the given chunk size and defaults elsewhere.
    pub fn new(frames_per_chunk: u32) -> Self {
        Self {
            frames_per_chunk,
            prewarm_chunks: Self::DEFAULT_PREWARM_CHUNKS,
            max_chunks: Self::DEFAULT_MAX_CHUNKS,
            max_handles: Self::DEFAULT_MAX_HANDLES,
            canary: None,
        }
    }

    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.frames_per_chunk == 0 {
            return Err(StoreError::invalid("frames_per_chunk must be non-zero"));
        }
        if self.max_chunks == 0 {
            return Err(StoreError::invalid("max_chunks must be non-zero"));
        }
        if self.prewarm_chunks > self.max_chunks {
            return Err(StoreError::invalid(format!(
                "prewarm_chunks ({}) exceeds max_chunks ({})",
                self.prewarm_chunks, self.max_chunks
            )));
        }
        if self.max_handles == 0 {
            return Err(StoreError::invalid("max_handles must be non-zero"));
        }
        if self.canary.is_some_and(|c| c.is_nan()) {
            // NaN never compares equal, which would make canary checks vacuous.
            return Err(StoreError::invalid("canary must not be NaN"));
        }
        Ok(())
    }

    /// Bytes of sample storage in one chunk.
    pub fn chunk_bytes(&self) -> usize {
        self.frames_per_chunk as usize * std::mem::size_of::<f32>()
    }
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_FRAMES_PER_CHUNK)
    }
}
