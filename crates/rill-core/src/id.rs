//! Strongly-typed counts and identifiers.
//!
//! Frame and channel quantities get their own newtypes so that a frame
//! index can never be passed where a channel index is expected.

use std::fmt;

/// A number of sample frames (one sample per channel).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameCount(pub u64);

impl FrameCount {
    /// Zero frames.
    pub const ZERO: Self = Self(0);

    /// The count as a `usize` index bound.
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for FrameCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} frames", self.0)
    }
}

impl From<u64> for FrameCount {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Position of a frame within a buffer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameIdx(pub u64);

impl fmt::Display for FrameIdx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for FrameIdx {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Number of interleaved channels in a buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelCount(pub u32);

impl ChannelCount {
    /// One channel.
    pub const MONO: Self = Self(1);
    /// Two channels.
    pub const STEREO: Self = Self(2);

    /// The count as a `usize`.
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ChannelCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index of a channel within a buffer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelIdx(pub u32);

impl fmt::Display for ChannelIdx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable external reference to "the current descriptor" of a buffer.
///
/// Handles are small integers indexing the descriptor table. The table
/// swaps which descriptor a handle resolves to; the handle itself never
/// changes meaning while it is live.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferHandle(pub u32);

impl BufferHandle {
    /// The handle as a table index.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BufferHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u32> for BufferHandle {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Index of a chunk in the pool's chunk directory.
///
/// Descriptors hold chunk ids, never owning references.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkId(pub u32);

impl ChunkId {
    /// The id as a directory index.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chunk {}", self.0)
    }
}

/// A value of the process-wide reclamation epoch counter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Epoch(pub u64);

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats() {
        assert_eq!(BufferHandle(3).to_string(), "#3");
        assert_eq!(FrameCount(10).to_string(), "10 frames");
        assert_eq!(ChunkId(7).to_string(), "chunk 7");
    }

    #[test]
    fn conversions() {
        assert_eq!(FrameCount::from(5).as_usize(), 5);
        assert_eq!(BufferHandle::from(9).index(), 9);
        assert_eq!(ChannelCount::STEREO.as_usize(), 2);
    }
}
