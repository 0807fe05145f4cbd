//! Engine configuration, validation, and error types.

use std::error::Error;
use std::fmt;
use std::time::Duration;

use rill_arena::ArenaConfig;
use rill_core::StoreError;

// ── EngineConfig ───────────────────────────────────────────────────

/// Configuration for constructing a [`StorageEngine`](crate::StorageEngine).
///
/// Validated once at construction; immutable afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    /// Frames per chunk (per channel). Default: 4096.
    pub frames_per_chunk: u32,
    /// Chunks minted at construction. Default: 64.
    pub prewarm_chunks: u32,
    /// Hard ceiling on chunks the pool will mint. Default: 16_384.
    pub max_chunks: u32,
    /// Number of handle slots. Default: 256.
    pub max_handles: u32,
    /// Fill value for recycled chunks. Default: `None`.
    pub canary: Option<f32>,
    /// Retired items still pending after a `maintain()` pass above which a
    /// warning is logged. Default: 4096.
    pub backlog_warning: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            frames_per_chunk: ArenaConfig::DEFAULT_FRAMES_PER_CHUNK,
            prewarm_chunks: ArenaConfig::DEFAULT_PREWARM_CHUNKS,
            max_chunks: ArenaConfig::DEFAULT_MAX_CHUNKS,
            max_handles: ArenaConfig::DEFAULT_MAX_HANDLES,
            canary: None,
            backlog_warning: 4096,
        }
    }
}

impl EngineConfig {
    /// Check all structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frames_per_chunk == 0 {
            return Err(ConfigError::ZeroChunkSize);
        }
        if self.max_chunks == 0 {
            return Err(ConfigError::ZeroMaxChunks);
        }
        if self.prewarm_chunks > self.max_chunks {
            return Err(ConfigError::PrewarmExceedsMax {
                prewarm: self.prewarm_chunks,
                max: self.max_chunks,
            });
        }
        if self.max_handles == 0 {
            return Err(ConfigError::ZeroHandles);
        }
        if self.canary.is_some_and(f32::is_nan) {
            return Err(ConfigError::NanCanary);
        }
        Ok(())
    }

    /// The arena-level subset of this config.
    pub fn arena_config(&self) -> ArenaConfig {
        ArenaConfig {
            frames_per_chunk: self.frames_per_chunk,
            prewarm_chunks: self.prewarm_chunks,
            max_chunks: self.max_chunks,
            max_handles: self.max_handles,
            canary: self.canary,
        }
    }
}

// ── MaintainerConfig ───────────────────────────────────────────────

/// Configuration for the background maintenance thread.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MaintainerConfig {
    /// Time between `maintain()` passes. Default: 10 ms. Must be non-zero.
    pub interval: Duration,
}

impl Default for MaintainerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(10),
        }
    }
}

impl MaintainerConfig {
    /// Check the interval.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }
        Ok(())
    }
}

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected while building an engine or its maintenance thread.
#[derive(Debug, PartialEq)]
pub enum ConfigError {
    /// `frames_per_chunk` is zero.
    ZeroChunkSize,
    /// `max_chunks` is zero.
    ZeroMaxChunks,
    /// More chunks requested up front than the pool may ever hold.
    PrewarmExceedsMax {
        /// Configured prewarm count.
        prewarm: u32,
        /// Configured ceiling.
        max: u32,
    },
    /// `max_handles` is zero.
    ZeroHandles,
    /// The canary is NaN and would never compare equal.
    NanCanary,
    /// Maintenance interval is zero.
    ZeroInterval,
    /// Arena construction failed (e.g. prewarm could not be allocated).
    Arena(StoreError),
    /// A background thread could not be spawned.
    ThreadSpawnFailed {
        /// Description of which thread failed.
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroChunkSize => write!(f, "frames_per_chunk must be at least 1"),
            Self::ZeroMaxChunks => write!(f, "max_chunks must be at least 1"),
            Self::PrewarmExceedsMax { prewarm, max } => {
                write!(f, "prewarm_chunks {prewarm} exceeds max_chunks {max}")
            }
            Self::ZeroHandles => write!(f, "max_handles must be at least 1"),
            Self::NanCanary => write!(f, "canary must not be NaN"),
            Self::ZeroInterval => write!(f, "maintenance interval must be non-zero"),
            Self::Arena(e) => write!(f, "arena: {e}"),
            Self::ThreadSpawnFailed { reason } => {
                write!(f, "thread spawn failed: {reason}")
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Arena(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for ConfigError {
    fn from(e: StoreError) -> Self {
        Self::Arena(e)
    }
}

impl From<ConfigError> for StoreError {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::Arena(inner) => inner,
            other => StoreError::invalid(other.to_string()),
        }
    }
}
