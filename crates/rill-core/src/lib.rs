//! Core types for the Rill real-time sample store.
//!
//! This is the leaf crate with zero internal dependencies. It defines the
//! vocabulary shared by every layer above it: typed frame/channel counts,
//! buffer and chunk identifiers, the sample format of a buffer, and the
//! writer-side error taxonomy.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod format;
pub mod id;

pub use error::StoreError;
pub use format::{Interleaved, SampleFormat, MAX_CHANNELS, MAX_FRAMES};
pub use id::{BufferHandle, ChannelCount, ChannelIdx, ChunkId, Epoch, FrameCount, FrameIdx};
