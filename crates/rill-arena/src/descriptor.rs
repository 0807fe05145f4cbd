//! Immutable buffer descriptors and the real-time view over them.
//!
//! A [`Descriptor`] is one published version of a buffer: its format, its
//! valid frame count and, per channel, the ordered chunk ids holding the
//! samples. Chunk lists are stored flat and channel-major. Descriptors are
//! never edited after publication; every mutation builds a new one that
//! shares the unchanged prefix of chunk ids with its predecessor.

use smallvec::SmallVec;

use rill_core::{
    ChannelIdx, ChunkId, FrameCount, FrameIdx, Interleaved, SampleFormat, StoreError, MAX_FRAMES,
};

use crate::pool::{ChunkPool, Fresh};

/// Chunks dropped from the reader's view by a new descriptor version.
///
/// One entry per channel is the common case (a replaced partial tail).
pub type Superseded = SmallVec<[ChunkId; 2]>;

/// One published version of a buffer.
#[derive(Clone, Debug, PartialEq)]
pub struct Descriptor {
    version: u64,
    format: SampleFormat,
    frames: FrameCount,
    frames_per_chunk: usize,
    chunks_per_channel: usize,
    chunks: Box<[ChunkId]>,
}

impl Descriptor {
    /// An empty buffer.
    pub fn empty(format: SampleFormat, frames_per_chunk: usize, version: u64) -> Self {
        Self {
            version,
            format,
            frames: FrameCount::ZERO,
            frames_per_chunk,
            chunks_per_channel: 0,
            chunks: Box::default(),
        }
    }

    /// Publication counter of the handle slot; increases with every new
    /// version, across the slot's lifetimes.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Channel layout and rate.
    pub fn format(&self) -> SampleFormat {
        self.format
    }

    /// Valid frames.
    pub fn frames(&self) -> FrameCount {
        self.frames
    }

    /// Chunks per channel.
    pub fn chunks_per_channel(&self) -> usize {
        self.chunks_per_channel
    }

    /// Ordered chunk ids of one channel.
    pub fn channel_chunks(&self, channel: usize) -> &[ChunkId] {
        let start = channel * self.chunks_per_channel;
        self.chunks
            .get(start..start + self.chunks_per_channel)
            .unwrap_or(&[])
    }

    /// Every chunk id, channel-major.
    pub fn all_chunks(&self) -> &[ChunkId] {
        &self.chunks
    }

    fn with_version(&self, version: u64) -> Self {
        Self {
            version,
            ..self.clone()
        }
    }

    fn chunks_for(&self, frames: u64) -> usize {
        frames.div_ceil(self.frames_per_chunk as u64) as usize
    }

    /// A new version holding `block` as its entire content.
    ///
    /// Acquires fresh chunks from `pool`; on failure nothing is leaked.
    pub fn filled(
        block: &Interleaved<'_>,
        pool: &ChunkPool,
        version: u64,
    ) -> Result<Self, StoreError> {
        block.validate()?;
        let empty = Self::empty(block.format, pool.frames_per_chunk(), version);
        let (desc, superseded) = empty.extended(block, pool, version)?;
        debug_assert!(superseded.is_empty());
        Ok(desc)
    }

    /// A new version with `block` appended.
    ///
    /// Full chunks are shared with `self`. A partially filled tail chunk is
    /// copied into a fresh chunk before the new samples land, so the chunk
    /// the reader may still be scanning is never written. Returns the new
    /// descriptor and the tail chunks it no longer references.
    pub fn extended(
        &self,
        block: &Interleaved<'_>,
        pool: &ChunkPool,
        version: u64,
    ) -> Result<(Self, Superseded), StoreError> {
        let added = block.validate()?;
        if block.format.channels != self.format.channels {
            return Err(StoreError::invalid(format!(
                "appending {} channels to a {}-channel buffer",
                block.format.channels, self.format.channels
            )));
        }
        if added.0 == 0 {
            return Ok((self.with_version(version), Superseded::new()));
        }
        let old_frames = self.frames.0;
        let total = old_frames
            .checked_add(added.0)
            .filter(|&t| t <= MAX_FRAMES)
            .ok_or_else(|| {
                StoreError::invalid(format!(
                    "appending {added} to {} exceeds the limit of {MAX_FRAMES}",
                    self.frames
                ))
            })?;

        let fpc = self.frames_per_chunk;
        let channels = self.format.channels.as_usize();
        let kept = old_frames as usize / fpc;
        let tail = old_frames as usize % fpc;
        let per_channel = self.chunks_for(total);
        let fresh_per_channel = per_channel - kept;

        let fresh = pool.acquire_many(fresh_per_channel * channels)?;

        let mut chunks = Vec::with_capacity(per_channel * channels);
        let mut superseded = Superseded::new();
        for ch in 0..channels {
            let old = self.channel_chunks(ch);
            let mine = &fresh[ch * fresh_per_channel..(ch + 1) * fresh_per_channel];
            chunks.extend_from_slice(&old[..kept]);
            chunks.extend(mine.iter().map(|f| f.id));

            if tail > 0 {
                let old_tail = old[kept];
                if let (Some(src), Some(dst)) = (pool.chunk(old_tail), mine.first()) {
                    dst.chunk.copy_prefix_from(src, tail);
                }
                superseded.push(old_tail);
            }
            write_channel(block, ch, mine, old_frames as usize - kept * fpc, fpc);
        }

        Ok((
            Self {
                version,
                format: self.format,
                frames: FrameCount(total),
                frames_per_chunk: fpc,
                chunks_per_channel: per_channel,
                chunks: chunks.into_boxed_slice(),
            },
            superseded,
        ))
    }

    /// A new version with the frames from `start` on overwritten by `block`.
    ///
    /// The region is clamped to the current end; the buffer never grows.
    /// Every chunk the region touches is copied into a fresh chunk before
    /// the new samples land, the rest are shared. Returns `None` when the
    /// clamped region is empty, else the new descriptor, the chunks it
    /// displaced and the frames written.
    pub fn overwritten(
        &self,
        start: FrameIdx,
        block: &Interleaved<'_>,
        pool: &ChunkPool,
        version: u64,
    ) -> Result<Option<(Self, Superseded, FrameCount)>, StoreError> {
        let len = block.validate()?;
        if block.format.channels != self.format.channels {
            return Err(StoreError::invalid(format!(
                "writing {} channels into a {}-channel buffer",
                block.format.channels, self.format.channels
            )));
        }
        if start.0 > MAX_FRAMES {
            return Err(StoreError::invalid(format!(
                "write start {start} exceeds the limit of {MAX_FRAMES}"
            )));
        }
        if start.0 >= self.frames.0 || len.0 == 0 {
            return Ok(None);
        }
        let written = len.0.min(self.frames.0 - start.0) as usize;

        let fpc = self.frames_per_chunk;
        let channels = self.format.channels.as_usize();
        let frames = self.frames.as_usize();
        let start = start.0 as usize;
        let first = start / fpc;
        let touched = (start + written - 1) / fpc - first + 1;

        let fresh = pool.acquire_many(touched * channels)?;

        let mut chunks = self.chunks.to_vec();
        let mut superseded = Superseded::new();
        for ch in 0..channels {
            let mine = &fresh[ch * touched..(ch + 1) * touched];
            for (k, dst) in mine.iter().enumerate() {
                let index = ch * self.chunks_per_channel + first + k;
                let old = chunks[index];
                let valid = (frames - (first + k) * fpc).min(fpc);
                if let Some(src) = pool.chunk(old) {
                    dst.chunk.copy_prefix_from(src, valid);
                }
                chunks[index] = dst.id;
                superseded.push(old);
            }
            let offset = start - first * fpc;
            for f in 0..written {
                let pos = offset + f;
                if let Some(dst) = mine.get(pos / fpc) {
                    dst.chunk.store(pos % fpc, block.sample(f, ch));
                }
            }
        }

        Ok(Some((
            Self {
                version,
                format: self.format,
                frames: self.frames,
                frames_per_chunk: fpc,
                chunks_per_channel: self.chunks_per_channel,
                chunks: chunks.into_boxed_slice(),
            },
            superseded,
            FrameCount(written as u64),
        )))
    }

    /// A new version keeping the first `frames` frames.
    ///
    /// Shares every chunk it keeps, including a now partially filled tail.
    /// Returns the chunks past the new end.
    pub fn truncated(
        &self,
        frames: FrameCount,
        version: u64,
    ) -> Result<(Self, Superseded), StoreError> {
        if frames > self.frames {
            return Err(StoreError::invalid(format!(
                "cannot truncate {} to {frames}",
                self.frames
            )));
        }
        let channels = self.format.channels.as_usize();
        let per_channel = self.chunks_for(frames.0);
        let mut chunks = Vec::with_capacity(per_channel * channels);
        let mut superseded = Superseded::new();
        for ch in 0..channels {
            let old = self.channel_chunks(ch);
            chunks.extend_from_slice(&old[..per_channel]);
            superseded.extend_from_slice(&old[per_channel..]);
        }
        Ok((
            Self {
                version,
                format: self.format,
                frames,
                frames_per_chunk: self.frames_per_chunk,
                chunks_per_channel: per_channel,
                chunks: chunks.into_boxed_slice(),
            },
            superseded,
        ))
    }
}

/// Deinterleave channel `ch` of `block` into `fresh`, starting at frame
/// `offset` of the first fresh chunk.
fn write_channel(
    block: &Interleaved<'_>,
    ch: usize,
    fresh: &[Fresh<'_>],
    offset: usize,
    fpc: usize,
) {
    let frames = block.frames().as_usize();
    for f in 0..frames {
        let pos = offset + f;
        if let Some(dst) = fresh.get(pos / fpc) {
            dst.chunk.store(pos % fpc, block.sample(f, ch));
        }
    }
}

/// Read-only access to one published descriptor and the chunks it names.
///
/// Every method is real-time safe: no locks, no allocation, no blocking.
#[derive(Clone, Copy)]
pub struct DescriptorView<'a> {
    desc: &'a Descriptor,
    pool: &'a ChunkPool,
}

impl<'a> DescriptorView<'a> {
    /// Pair a descriptor with the pool its chunk ids index.
    pub fn new(desc: &'a Descriptor, pool: &'a ChunkPool) -> Self {
        Self { desc, pool }
    }

    /// The underlying descriptor.
    pub fn descriptor(&self) -> &'a Descriptor {
        self.desc
    }

    /// Version of the descriptor.
    pub fn version(&self) -> u64 {
        self.desc.version
    }

    /// Format of the buffer.
    pub fn format(&self) -> SampleFormat {
        self.desc.format
    }

    /// Valid frames.
    pub fn frames(&self) -> FrameCount {
        self.desc.frames
    }

    /// Whether the buffer holds no frames.
    pub fn is_empty(&self) -> bool {
        self.desc.frames.0 == 0
    }

    /// Chunks per channel.
    pub fn chunk_count(&self) -> usize {
        self.desc.chunks_per_channel
    }

    /// Valid frames in chunk `index` of each channel.
    pub fn chunk_frames(&self, index: usize) -> usize {
        let fpc = self.desc.frames_per_chunk;
        let frames = self.desc.frames.as_usize();
        frames.saturating_sub(index * fpc).min(fpc)
    }

    /// A single sample, or `None` out of range.
    pub fn sample(&self, channel: ChannelIdx, frame: FrameIdx) -> Option<f32> {
        if frame.0 >= self.desc.frames.0 || channel.0 >= self.desc.format.channels.0 {
            return None;
        }
        let fpc = self.desc.frames_per_chunk;
        let frame = frame.0 as usize;
        let id = *self.desc.channel_chunks(channel.0 as usize).get(frame / fpc)?;
        self.pool.chunk(id).map(|c| c.load(frame % fpc))
    }

    /// Linearly interpolated sample at a fractional frame position.
    ///
    /// Positions past the last frame clamp to it.
    pub fn sample_lerp(&self, channel: ChannelIdx, position: f32) -> Option<f32> {
        if position.is_nan() || position < 0.0 || self.is_empty() {
            return None;
        }
        let last = self.desc.frames.0 - 1;
        let i0 = (position.floor() as u64).min(last);
        let i1 = (position.ceil() as u64).min(last);
        let t = position - position.floor();
        let a = self.sample(channel, FrameIdx(i0))?;
        let b = self.sample(channel, FrameIdx(i1))?;
        Some(a + (b - a) * t)
    }

    /// Copy frames of one channel starting at `start` into `out`.
    ///
    /// Returns frames copied: `min(out.len(), frames - start)`, zero when
    /// `start` is at or past the end.
    pub fn read(&self, channel: ChannelIdx, start: FrameIdx, out: &mut [f32]) -> FrameCount {
        let frames = self.desc.frames.0;
        if start.0 >= frames || channel.0 >= self.desc.format.channels.0 {
            return FrameCount::ZERO;
        }
        let count = (out.len() as u64).min(frames - start.0) as usize;
        let fpc = self.desc.frames_per_chunk;
        let ids = self.desc.channel_chunks(channel.0 as usize);

        let mut done = 0;
        let mut pos = start.0 as usize;
        while done < count {
            let offset = pos % fpc;
            let run = (fpc - offset).min(count - done);
            let dst = &mut out[done..done + run];
            match ids.get(pos / fpc).and_then(|&id| self.pool.chunk(id)) {
                Some(chunk) => chunk.copy_to(offset, dst),
                None => dst.fill(0.0),
            }
            done += run;
            pos += run;
        }
        FrameCount(count as u64)
    }

    /// Copy whole frames starting at `start` into `out`, interleaved.
    ///
    /// Returns frames copied.
    pub fn read_interleaved(&self, start: FrameIdx, out: &mut [f32]) -> FrameCount {
        let channels = self.desc.format.channels.as_usize();
        let frames = self.desc.frames.0;
        if start.0 >= frames {
            return FrameCount::ZERO;
        }
        let count = ((out.len() / channels) as u64).min(frames - start.0) as usize;
        let fpc = self.desc.frames_per_chunk;
        for ch in 0..channels {
            let ids = self.desc.channel_chunks(ch);
            for f in 0..count {
                let pos = start.0 as usize + f;
                out[f * channels + ch] = ids
                    .get(pos / fpc)
                    .and_then(|&id| self.pool.chunk(id))
                    .map_or(0.0, |c| c.load(pos % fpc));
            }
        }
        FrameCount(count as u64)
    }
}

impl std::fmt::Debug for DescriptorView<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DescriptorView")
            .field("version", &self.desc.version)
            .field("frames", &self.desc.frames)
            .field("chunks_per_channel", &self.desc.chunks_per_channel)
            .finish()
    }
}
