//! Sample formats and interleaved input blocks.

use crate::error::StoreError;
use crate::id::{ChannelCount, FrameCount};

/// Upper bound on channels per buffer. Larger values are almost always an
/// underflowed subtraction upstream.
pub const MAX_CHANNELS: u32 = 1024;

/// Upper bound on frames per buffer: one week of audio at 44.1 kHz.
pub const MAX_FRAMES: u64 = 44_100 * 604_800;

/// Channel layout and rate of a buffer.
///
/// The store is agnostic to the rate; it is carried so that readers can
/// interpret the data without a side channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SampleFormat {
    /// Number of channels.
    pub channels: ChannelCount,
    /// Frames per second.
    pub sample_rate: u32,
}

impl SampleFormat {
    /// Build a format, validating it against the sanity limits.
    pub fn new(channels: u32, sample_rate: u32) -> Result<Self, StoreError> {
        let format = Self {
            channels: ChannelCount(channels),
            sample_rate,
        };
        format.validate()?;
        Ok(format)
    }

    /// Single channel at the given rate.
    pub fn mono(sample_rate: u32) -> Self {
        Self {
            channels: ChannelCount::MONO,
            sample_rate,
        }
    }

    /// Two channels at the given rate.
    pub fn stereo(sample_rate: u32) -> Self {
        Self {
            channels: ChannelCount::STEREO,
            sample_rate,
        }
    }

    /// Check channel count and rate.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.channels.0 == 0 {
            return Err(StoreError::invalid("channel count must be at least 1"));
        }
        if self.channels.0 > MAX_CHANNELS {
            return Err(StoreError::invalid(format!(
                "channel count {} exceeds {MAX_CHANNELS}",
                self.channels
            )));
        }
        if self.sample_rate == 0 {
            return Err(StoreError::invalid("sample rate must be non-zero"));
        }
        Ok(())
    }
}

/// A borrowed block of interleaved samples, as handed over by a decoder.
#[derive(Clone, Copy, Debug)]
pub struct Interleaved<'a> {
    /// Layout of `samples`.
    pub format: SampleFormat,
    /// `frames * channels` samples, frame-major.
    pub samples: &'a [f32],
}

impl<'a> Interleaved<'a> {
    /// Wrap a sample slice.
    pub fn new(format: SampleFormat, samples: &'a [f32]) -> Self {
        Self { format, samples }
    }

    /// Mono block.
    pub fn mono(sample_rate: u32, samples: &'a [f32]) -> Self {
        Self::new(SampleFormat::mono(sample_rate), samples)
    }

    /// Number of whole frames in the block.
    pub fn frames(&self) -> FrameCount {
        FrameCount((self.samples.len() / self.format.channels.as_usize().max(1)) as u64)
    }

    /// Sample of `channel` in frame `frame`.
    ///
    /// # Panics
    ///
    /// Panics if the frame or channel is out of range.
    pub fn sample(&self, frame: usize, channel: usize) -> f32 {
        self.samples[frame * self.format.channels.as_usize() + channel]
    }

    /// Validate the format and that the samples form whole frames.
    pub fn validate(&self) -> Result<FrameCount, StoreError> {
        self.format.validate()?;
        let channels = self.format.channels.as_usize();
        if self.samples.len() % channels != 0 {
            return Err(StoreError::invalid(format!(
                "{} samples do not form whole frames of {channels} channels",
                self.samples.len()
            )));
        }
        let frames = self.frames();
        if frames.0 > MAX_FRAMES {
            return Err(StoreError::invalid(format!(
                "{frames} exceeds the limit of {MAX_FRAMES}"
            )));
        }
        Ok(frames)
    }
}
