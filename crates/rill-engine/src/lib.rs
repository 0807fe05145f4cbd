//! Storage engine for chunked audio sample buffers.
//!
//! [`StorageEngine`] is the writer-side facade: handle allocation, the
//! append/truncate/replace write variants, `free`, and the `maintain`
//! pass that recycles what the real-time reader has moved past.
//! [`RealtimeReader`] is the one audio-thread endpoint; every method on it
//! is lock-free and allocation-free.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod engine;
pub mod maintainer;
pub mod metrics;
pub mod reader;

pub use config::{ConfigError, EngineConfig, MaintainerConfig};
pub use engine::{StorageEngine, WriteOp};
pub use maintainer::Maintainer;
pub use metrics::{EngineStats, MaintenanceReport, MaintenanceTotals};
pub use reader::RealtimeReader;

pub use rill_arena::{DescriptorView, HandleState};
