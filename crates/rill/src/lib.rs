//! Rill: real-time safe chunked storage for audio sample buffers.
//!
//! This is the top-level facade crate that re-exports the public API from
//! all Rill sub-crates. For most users, adding `rill` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use rill::prelude::*;
//!
//! let engine = StorageEngine::new(EngineConfig {
//!     frames_per_chunk: 4,
//!     ..EngineConfig::default()
//! })
//! .unwrap();
//!
//! // Writer thread: load a buffer.
//! let voice = engine.allocate_handle(SampleFormat::mono(48_000)).unwrap();
//! let samples: Vec<f32> = (0..10).map(|i| i as f32).collect();
//! engine.append(voice, Interleaved::mono(48_000, &samples)).unwrap();
//!
//! // Audio thread: one checkpoint per block, then lock-free reads.
//! let mut reader = engine.realtime_reader().unwrap();
//! reader.checkpoint();
//! let view = reader.read_for_realtime(voice).unwrap();
//! let mut out = [0.0f32; 4];
//! view.read(ChannelIdx(0), FrameIdx(8), &mut out);
//! assert_eq!(&out[..2], &[8.0, 9.0]);
//!
//! // Writer thread: free, then reclaim once the reader has moved on.
//! engine.free(voice).unwrap();
//! reader.checkpoint();
//! assert_eq!(engine.maintain().handles_released, 1);
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `rill-core` | IDs, counts, sample formats, `StoreError` |
//! | [`arena`] | `rill-arena` | Chunk pool, epoch clock, reclaimer, descriptor table |
//! | [`engine`] | `rill-engine` | `StorageEngine`, `RealtimeReader`, maintenance thread |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types and the error taxonomy (`rill-core`).
pub use rill_core as types;

/// Chunk pool, epoch reclamation, and the descriptor table (`rill-arena`).
///
/// Most users only need [`arena::DescriptorView`], also in the [`prelude`].
pub use rill_arena as arena;

/// The storage engine facade (`rill-engine`).
pub use rill_engine as engine;

/// Common imports for typical Rill usage.
///
/// ```rust
/// use rill::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use rill_core::{
        BufferHandle, ChannelCount, ChannelIdx, FrameCount, FrameIdx, Interleaved, SampleFormat,
    };

    // Errors
    pub use rill_core::StoreError;

    // Reader views
    pub use rill_arena::{DescriptorView, HandleState};

    // Engine
    pub use rill_engine::{
        EngineConfig, EngineStats, MaintainerConfig, MaintenanceReport, RealtimeReader,
        StorageEngine, WriteOp,
    };
}
