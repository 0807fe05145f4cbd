//! Benchmark profiles for the Rill sample store.
//!
//! - [`voice_bank_profile`]: engine sized for a sampler with many short voices
//! - [`load_voice_bank`]: fill an engine with deterministic stereo buffers

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use rill_core::{BufferHandle, Interleaved, SampleFormat, StoreError};
use rill_engine::{EngineConfig, StorageEngine};
use rill_test_utils::ramp;

/// Sample rate used by every profile.
pub const SAMPLE_RATE: u32 = 48_000;

/// Engine config for `voices` stereo voices of up to `frames` frames each,
/// with headroom for one full rewrite of every voice.
pub fn voice_bank_profile(voices: usize, frames: usize) -> EngineConfig {
    let frames_per_chunk = 1024;
    let per_voice = frames.div_ceil(frames_per_chunk) * 2;
    let max_chunks = (per_voice * voices * 2 + 64) as u32;
    EngineConfig {
        frames_per_chunk: frames_per_chunk as u32,
        prewarm_chunks: max_chunks,
        max_chunks,
        max_handles: voices as u32,
        ..EngineConfig::default()
    }
}

/// Allocate `voices` stereo buffers of `frames` frames each.
pub fn load_voice_bank(
    engine: &StorageEngine,
    voices: usize,
    frames: usize,
) -> Result<Vec<BufferHandle>, StoreError> {
    let format = SampleFormat::stereo(SAMPLE_RATE);
    let block = ramp(frames, 2);
    (0..voices)
        .map(|_| {
            let h = engine.allocate_handle(format)?;
            engine.append(h, Interleaved::new(format, &block))?;
            Ok(h)
        })
        .collect()
}
