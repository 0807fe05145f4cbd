//! Chunked sample storage with epoch-based reclamation.
//!
//! This crate is the only one in the workspace that contains `unsafe`
//! code, confined to `raw.rs` (descriptor publication).
//!
//! # Architecture
//!
//! ```text
//! SampleArena (orchestrator)
//! ├── ChunkPool
//! │   ├── directory: OnceLock<Chunk>[max_chunks] (minted lazily, never freed)
//! │   └── free list (writer side, Mutex)
//! ├── Reclaimer
//! │   ├── EpochClock (global counter + reader epoch)
//! │   └── retired queue: (epoch, Garbage) in epoch order
//! └── DescriptorTable
//!     └── HandleSlot[max_handles]
//!         ├── PublishedDescriptor (AtomicPtr, read by the real-time thread)
//!         └── writer state (Mutex, try_lock -> Conflict)
//! ```
//!
//! # Read path
//!
//! The real-time reader holds a [`ReaderPin`]. Pinning publishes the epoch
//! it observed; a descriptor or chunk retired at epoch `E` is recycled only
//! once the reader has pinned at an epoch greater than `E`. Views borrow the
//! pin, so they cannot outlive the next re-pin.
//!
//! Chunk samples are stored as `AtomicU32` bit patterns. Writers fill a
//! chunk with relaxed stores before publishing it with a release swap; the
//! reader's acquire load of the descriptor makes those stores visible.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

pub mod arena;
pub mod chunk;
pub mod config;
pub mod descriptor;
pub mod epoch;
pub mod pool;
mod raw;
pub mod reclaim;
pub mod table;

// Public re-exports for the primary API surface.
pub use arena::{ArenaStats, SampleArena};
pub use chunk::Chunk;
pub use config::ArenaConfig;
pub use descriptor::{Descriptor, DescriptorView};
pub use epoch::{EpochClock, ReaderPin, EPOCH_UNPINNED};
pub use pool::{ChunkPool, PoolStats};
pub use reclaim::{Garbage, ReclaimReport, Reclaimer};
pub use table::{DescriptorTable, HandleState};
