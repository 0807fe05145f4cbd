//! Chunk pool: a fixed directory of lazily minted chunks plus a free list.
//!
//! The directory is sized to `max_chunks` at construction so that it never
//! moves: the real-time reader resolves a [`ChunkId`] with a single
//! `OnceLock::get`, which is an acquire load. Minting (the only call into
//! the general allocator) and free-list traffic happen on writer threads
//! under a mutex the reader never touches. Chunks are never returned to the
//! allocator while the pool is alive.

use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

use rill_core::{ChunkId, StoreError};

use crate::chunk::Chunk;
use crate::config::ArenaConfig;

/// A chunk handed out by [`ChunkPool::acquire_many`].
#[derive(Clone, Copy, Debug)]
pub struct Fresh<'p> {
    /// Directory index of the chunk.
    pub id: ChunkId,
    /// The chunk itself, owned by the caller until published or released.
    pub chunk: &'p Chunk,
}

/// Pool occupancy counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Chunks ever minted (bounded by `capacity`).
    pub minted: usize,
    /// Minted chunks sitting in the free list.
    pub free: usize,
    /// Directory size (`max_chunks`).
    pub capacity: usize,
}

impl PoolStats {
    /// Minted chunks not in the free list (published or awaiting reclaim).
    pub fn in_use(&self) -> usize {
        self.minted - self.free
    }

    /// Chunks that could still be acquired.
    pub fn available(&self) -> usize {
        self.free + (self.capacity - self.minted)
    }
}

struct FreeList {
    free: Vec<ChunkId>,
    minted: usize,
}

/// Owner of every chunk in the arena.
pub struct ChunkPool {
    directory: Box<[OnceLock<Chunk>]>,
    frames_per_chunk: usize,
    canary: Option<f32>,
    free_list: Mutex<FreeList>,
}

// Compile-time assertion: ChunkPool must be Send + Sync.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<ChunkPool>();
};

impl ChunkPool {
    /// Create a pool and mint `prewarm_chunks` chunks up front.
    pub fn new(config: &ArenaConfig) -> Result<Self, StoreError> {
        config.validate()?;
        let capacity = config.max_chunks as usize;
        let directory = (0..capacity).map(|_| OnceLock::new()).collect();
        let pool = Self {
            directory,
            frames_per_chunk: config.frames_per_chunk as usize,
            canary: config.canary,
            free_list: Mutex::new(FreeList {
                free: Vec::with_capacity(capacity),
                minted: 0,
            }),
        };
        {
            let mut list = pool.lock();
            for _ in 0..config.prewarm_chunks {
                let id = pool.mint(&mut list, 1)?;
                list.free.push(id);
            }
        }
        // Keep pop order ascending so fresh pools hand out chunk 0 first.
        pool.lock().free.reverse();
        Ok(pool)
    }

    /// Samples per chunk.
    pub fn frames_per_chunk(&self) -> usize {
        self.frames_per_chunk
    }

    /// Resolve a chunk id. Lock-free; callable from the real-time thread.
    #[inline]
    pub fn chunk(&self, id: ChunkId) -> Option<&Chunk> {
        self.directory.get(id.index()).and_then(OnceLock::get)
    }

    /// Acquire a single chunk. Writer side only.
    pub fn acquire(&self) -> Result<Fresh<'_>, StoreError> {
        let mut out = self.acquire_many(1)?;
        out.pop().ok_or(StoreError::OutOfMemory {
            requested_chunks: 1,
            available_chunks: 0,
        })
    }

    /// Acquire `count` chunks, all or nothing. Writer side only.
    ///
    /// Reuses free chunks first and mints the remainder. Fails with
    /// [`StoreError::OutOfMemory`] if the ceiling or the allocator cannot
    /// satisfy the whole request; in that case nothing is taken.
    pub fn acquire_many(&self, count: usize) -> Result<Vec<Fresh<'_>>, StoreError> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let mut list = self.lock();
        let available = list.free.len() + (self.directory.len() - list.minted);
        if count > available {
            log::warn!("chunk pool exhausted: requested {count}, available {available}");
            return Err(StoreError::OutOfMemory {
                requested_chunks: count,
                available_chunks: available,
            });
        }
        let mut out = Vec::with_capacity(count);
        while out.len() < count {
            let id = match list.free.pop() {
                Some(id) => id,
                None => match self.mint(&mut list, count) {
                    Ok(id) => id,
                    Err(e) => {
                        list.free.extend(out.iter().map(|f: &Fresh<'_>| f.id));
                        return Err(e);
                    }
                },
            };
            match self.chunk(id) {
                Some(chunk) => out.push(Fresh { id, chunk }),
                None => {
                    list.free.push(id);
                    list.free.extend(out.iter().map(|f| f.id));
                    return Err(StoreError::OutOfMemory {
                        requested_chunks: count,
                        available_chunks: 0,
                    });
                }
            }
        }
        Ok(out)
    }

    /// Return a chunk to the free list. Writer side only.
    ///
    /// The caller guarantees no published descriptor still references the
    /// chunk (either it was never published or the reclaimer cleared it).
    pub fn release(&self, id: ChunkId) {
        self.release_many(std::iter::once(id));
    }

    /// Return several chunks to the free list.
    pub fn release_many(&self, ids: impl IntoIterator<Item = ChunkId>) {
        let ids: Vec<ChunkId> = ids.into_iter().collect();
        if let Some(canary) = self.canary {
            for &id in &ids {
                if let Some(chunk) = self.chunk(id) {
                    chunk.fill(canary);
                }
            }
        }
        for id in &ids {
            log::trace!("recycled {id}");
        }
        self.lock().free.extend(ids);
    }

    /// Occupancy snapshot.
    pub fn stats(&self) -> PoolStats {
        let list = self.lock();
        PoolStats {
            minted: list.minted,
            free: list.free.len(),
            capacity: self.directory.len(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FreeList> {
        self.free_list.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn mint(&self, list: &mut FreeList, requested: usize) -> Result<ChunkId, StoreError> {
        let index = list.minted;
        let oom = StoreError::OutOfMemory {
            requested_chunks: requested,
            available_chunks: list.free.len(),
        };
        let Some(cell) = self.directory.get(index) else {
            return Err(oom);
        };
        let Ok(chunk) = Chunk::try_new(self.frames_per_chunk) else {
            return Err(oom);
        };
        // `minted` only grows under the lock, so `cell` has never been set.
        let set = cell.set(chunk);
        debug_assert!(set.is_ok(), "chunk {index} minted twice");
        if set.is_err() {
            log::error!("chunk {index} minted twice; refusing to reuse its cell");
            return Err(oom);
        }
        list.minted += 1;
        Ok(ChunkId(index as u32))
    }
}
