//! Writer-side error taxonomy.
//!
//! Every variant is reported synchronously to the writer thread that made
//! the failing call. The real-time read path has no error conditions: an
//! unknown handle is a `None`, not an error.

use std::error::Error;
use std::fmt;

use crate::id::BufferHandle;

/// Errors returned by writer operations on the sample store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreError {
    /// The chunk pool cannot satisfy an acquisition.
    OutOfMemory {
        /// Chunks the operation needed.
        requested_chunks: usize,
        /// Chunks that could still be handed out (free or mintable).
        available_chunks: usize,
    },
    /// The handle is not allocated (or out of range).
    NotFound {
        /// The handle that was not found.
        handle: BufferHandle,
    },
    /// The handle is still in use (active or retiring).
    AlreadyExists {
        /// The handle that is in use.
        handle: BufferHandle,
    },
    /// Another writer is mutating the same handle; retry.
    Conflict {
        /// The contended handle.
        handle: BufferHandle,
    },
    /// The single real-time reader is already handed out.
    ReaderActive,
    /// Every handle slot is occupied.
    HandlesExhausted {
        /// Maximum handle count of the table.
        capacity: usize,
    },
    /// An argument or configuration value is unusable.
    InvalidArgument {
        /// What was wrong.
        reason: String,
    },
}

impl StoreError {
    /// Shorthand for an [`InvalidArgument`](Self::InvalidArgument).
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Whether the caller should simply retry the same call.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfMemory {
                requested_chunks,
                available_chunks,
            } => write!(
                f,
                "chunk pool exhausted: requested {requested_chunks} chunks, {available_chunks} available"
            ),
            Self::NotFound { handle } => write!(f, "handle {handle} is not allocated"),
            Self::AlreadyExists { handle } => write!(f, "handle {handle} is already in use"),
            Self::Conflict { handle } => {
                write!(f, "concurrent write to handle {handle}, retry")
            }
            Self::ReaderActive => write!(f, "a real-time reader is already active"),
            Self::HandlesExhausted { capacity } => {
                write!(f, "all {capacity} handle slots are in use")
            }
            Self::InvalidArgument { reason } => write!(f, "invalid argument: {reason}"),
        }
    }
}

impl Error for StoreError {}
