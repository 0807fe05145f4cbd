//! Signal fixtures and consistency checks for Rill development.
//!
//! Every fixture is deterministic and exactly representable in `f32`, so
//! tests compare with `==` rather than tolerances.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::fmt;

/// Frames a stamped generation can describe before the stamp aliases.
pub const STAMP_FRAMES: usize = 1 << 16;

/// Generations before stamps wrap.
pub const STAMP_GENERATIONS: u32 = 1 << 8;

/// Value of a ramp sample: distinct per channel and frame.
///
/// Exact for `channel < 16` and `frame < 1_000_000`.
pub fn ramp_value(frame: usize, channel: usize) -> f32 {
    (channel * 1_000_000 + frame) as f32
}

/// Interleaved ramp of `frames` frames and `channels` channels, starting at
/// frame `start`.
pub fn ramp_from(start: usize, frames: usize, channels: usize) -> Vec<f32> {
    let mut out = Vec::with_capacity(frames * channels);
    for f in start..start + frames {
        for ch in 0..channels {
            out.push(ramp_value(f, ch));
        }
    }
    out
}

/// Interleaved ramp starting at frame 0.
pub fn ramp(frames: usize, channels: usize) -> Vec<f32> {
    ramp_from(0, frames, channels)
}

/// One channel of an interleaved block.
pub fn deinterleave(samples: &[f32], channels: usize, channel: usize) -> Vec<f32> {
    samples
        .iter()
        .skip(channel)
        .step_by(channels)
        .copied()
        .collect()
}

/// Sample `frame` of a buffer written during `generation`.
///
/// Stamps encode both numbers, so a read that mixes generations, or sees
/// a recycled chunk, fails [`check_stamped`].
pub fn stamp(generation: u32, frame: usize) -> f32 {
    let g = generation % STAMP_GENERATIONS;
    let f = (frame % STAMP_FRAMES) as u32;
    (g * STAMP_FRAMES as u32 + f) as f32 + 1.0
}

/// Stamped mono samples for frames `start..start + frames`.
pub fn stamped(generation: u32, start: usize, frames: usize) -> Vec<f32> {
    (start..start + frames).map(|f| stamp(generation, f)).collect()
}

/// Why a block of samples is not one consistent generation.
#[derive(Clone, Debug, PartialEq)]
pub struct StampMismatch {
    pub frame: usize,
    pub expected: f32,
    pub found: f32,
}

impl fmt::Display for StampMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "frame {}: expected {}, found {}",
            self.frame, self.expected, self.found
        )
    }
}

/// Check that `samples` are frames `0..len` of a single generation.
///
/// Returns the generation (modulo [`STAMP_GENERATIONS`]), or `None` for an
/// empty block.
pub fn check_stamped(samples: &[f32]) -> Result<Option<u32>, StampMismatch> {
    let Some(&first) = samples.first() else {
        return Ok(None);
    };
    let generation = (first - 1.0) as u32 / STAMP_FRAMES as u32;
    for (frame, &found) in samples.iter().enumerate() {
        let expected = stamp(generation, frame);
        if found.to_bits() != expected.to_bits() {
            return Err(StampMismatch {
                frame,
                expected,
                found,
            });
        }
    }
    Ok(Some(generation))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ramp_is_interleaved() {
        let r = ramp(3, 2);
        assert_eq!(r, vec![0.0, 1_000_000.0, 1.0, 1_000_001.0, 2.0, 1_000_002.0]);
        assert_eq!(deinterleave(&r, 2, 1), vec![1_000_000.0, 1_000_001.0, 1_000_002.0]);
    }

    #[test]
    fn stamped_block_checks() {
        let block = stamped(7, 0, 100);
        assert_eq!(check_stamped(&block), Ok(Some(7)));
        assert_eq!(check_stamped(&[]), Ok(None));
    }

    #[test]
    fn mixed_generations_fail() {
        let mut block = stamped(3, 0, 10);
        block.extend(stamped(4, 10, 5));
        let err = check_stamped(&block).unwrap_err();
        assert_eq!(err.frame, 10);
    }

    #[test]
    fn canary_fails() {
        let mut block = stamped(1, 0, 8);
        block[5] = -1.0;
        assert!(check_stamped(&block).is_err());
    }

    #[test]
    fn stamps_are_exact() {
        let top = stamp(STAMP_GENERATIONS - 1, STAMP_FRAMES - 1);
        assert!(top <= (1u32 << 24) as f32);
        assert_ne!(top, stamp(STAMP_GENERATIONS - 1, STAMP_FRAMES - 2));
    }
}
