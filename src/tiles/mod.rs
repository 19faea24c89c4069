//! Two-tier map tile cache.
//!
//! `TileCache::get` never blocks: it answers from the memory tier or
//! schedules the tile on a worker pool and returns `Pending`. Workers check
//! the disk store, fall back to the network, write successes through to both
//! tiers and report every completion on the event channel so the shell knows
//! when to repaint.
//!
//! Memory tier, in-flight set and failure records share one mutex. A key is
//! therefore fetched at most once at a time, however many callers ask for it.

mod disk;
mod grid;
mod key;
mod memory;
mod pixels;
mod source;

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

pub use disk::{DiskStore, DiskUsage};
pub use grid::{
    MAX_TILE_ZOOM, MIN_TILE_ZOOM, TILE_SIZE_PX, TilePlacement, geo_to_tile, tile_count,
    tile_to_geo, tile_zoom_for, visible_tiles,
};
pub use key::{TileKey, TileProvider};
pub use pixels::TileImage;
pub use source::{HttpTileSource, TileSource};

use memory::MemoryTier;

use crate::config::CacheConfig;
use crate::errors::{CacheError, DomainError, FetchError};
use crate::log::{debug, info, warn};
use crate::transform::ViewState;

// ============================================================================
// Public types
// ============================================================================

/// Answer of [`TileCache::get`]
#[derive(Debug, Clone, PartialEq)]
pub enum TileLookup {
    Ready(Arc<TileImage>),
    /// Being loaded; an event follows when it is done
    Pending,
    /// Gave up on this tile; draw a placeholder
    Failed(FetchError),
}

impl TileLookup {
    pub fn tile(&self) -> Option<&Arc<TileImage>> {
        match self {
            TileLookup::Ready(tile) => Some(tile),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TileOutcome {
    Ready { from_disk: bool },
    Failed(FetchError),
}

/// A tile finished loading; the view should repaint
#[derive(Debug, Clone, PartialEq)]
pub struct TileEvent {
    pub key: TileKey,
    pub outcome: TileOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub memory_tiles: usize,
    pub pending: usize,
    pub failed: usize,
    /// Requests made to the tile source
    pub network_fetches: u64,
    /// Tiles promoted from disk into memory
    pub disk_hits: u64,
}

// ============================================================================
// Shared state
// ============================================================================

struct Failure {
    attempts: u32,
    error: FetchError,
}

struct CacheState {
    memory: MemoryTier,
    pending: HashSet<TileKey>,
    /// Pending keys reloaded while in flight; their current load is discarded
    stale: HashSet<TileKey>,
    failed: HashMap<TileKey, Failure>,
}

struct Shared {
    state: Mutex<CacheState>,
    disk: DiskStore,
    source: Arc<dyn TileSource>,
    events: flume::Sender<TileEvent>,
    network_fetches: AtomicU64,
    disk_hits: AtomicU64,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Disk first, then the source. A disk file that does not decode counts
    /// as a miss.
    fn load(&self, key: &TileKey) -> Result<(TileImage, bool), FetchError> {
        if let Some(bytes) = self.disk.read(key) {
            match TileImage::decode(&bytes) {
                Ok(tile) => return Ok((tile, true)),
                Err(e) => {
                    warn!(%key, error = %e, "cached tile is corrupt, refetching");
                }
            }
        }

        self.network_fetches.fetch_add(1, Ordering::Relaxed);
        let bytes = self.source.fetch(key)?;
        let tile = TileImage::decode(&bytes)?;
        if let Err(e) = self.disk.write(key, &bytes) {
            warn!(%key, error = %e, "could not store tile on disk");
        }
        Ok((tile, false))
    }

    /// Publish the result of a load. Returns false, leaving the key pending,
    /// when the key was reloaded in the meantime and must be loaded again.
    fn complete(&self, key: TileKey, result: Result<(TileImage, bool), FetchError>) -> bool {
        let outcome = {
            let mut state = self.lock();
            if state.stale.remove(&key) {
                return false;
            }
            state.pending.remove(&key);
            match result {
                Ok((tile, from_disk)) => {
                    if from_disk {
                        self.disk_hits.fetch_add(1, Ordering::Relaxed);
                    }
                    state.failed.remove(&key);
                    if let Some(evicted) = state.memory.insert(key, Arc::new(tile)) {
                        debug!(%evicted, "evicted tile from memory");
                    }
                    TileOutcome::Ready { from_disk }
                }
                Err(error) => {
                    debug!(%key, %error, "tile failed");
                    let failure = state.failed.entry(key).or_insert(Failure {
                        attempts: 0,
                        error: error.clone(),
                    });
                    failure.attempts += 1;
                    failure.error = error.clone();
                    TileOutcome::Failed(error)
                }
            }
        };
        // nobody listening is fine
        let _ = self.events.send(TileEvent { key, outcome });
        true
    }
}

fn run_worker(shared: Arc<Shared>, jobs: flume::Receiver<TileKey>) {
    for key in jobs.iter() {
        while !shared.complete(key, shared.load(&key)) {
            debug!(%key, "reloaded while loading, starting over");
            if let Err(e) = shared.disk.remove(&key) {
                warn!(%key, error = %e, "could not remove cached tile");
            }
        }
    }
}

// ============================================================================
// TileCache
// ============================================================================

pub struct TileCache {
    config: CacheConfig,
    max_attempts: u32,
    shared: Arc<Shared>,
    jobs: Option<flume::Sender<TileKey>>,
    events: flume::Receiver<TileEvent>,
    workers: Vec<JoinHandle<()>>,
}

impl TileCache {
    /// A cache backed by the public tile servers
    pub fn new(config: CacheConfig) -> Result<Self, CacheError> {
        let source = HttpTileSource::new(&config)?;
        Self::with_source(config, Arc::new(source))
    }

    pub fn with_source(config: CacheConfig, source: Arc<dyn TileSource>) -> Result<Self, CacheError> {
        let disk = DiskStore::open(&config.cache_dir)?;
        let (event_tx, events) = flume::unbounded();
        let (jobs, job_rx) = flume::unbounded();

        let shared = Arc::new(Shared {
            state: Mutex::new(CacheState {
                memory: MemoryTier::new(config.memory_capacity),
                pending: HashSet::new(),
                stale: HashSet::new(),
                failed: HashMap::new(),
            }),
            disk,
            source,
            events: event_tx,
            network_fetches: AtomicU64::new(0),
            disk_hits: AtomicU64::new(0),
        });

        let count = config.workers.max(1);
        let mut workers = Vec::with_capacity(count);
        for i in 0..count {
            let shared = Arc::clone(&shared);
            let job_rx = job_rx.clone();
            let handle = thread::Builder::new()
                .name(format!("tile-worker-{i}"))
                .spawn(move || run_worker(shared, job_rx))
                .map_err(CacheError::Spawn)?;
            workers.push(handle);
        }
        info!(dir = %config.cache_dir.display(), workers = count, "tile cache ready");

        Ok(Self {
            max_attempts: config.max_attempts.max(1),
            config,
            shared,
            jobs: Some(jobs),
            events,
            workers,
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn disk(&self) -> &DiskStore {
        &self.shared.disk
    }

    /// Current state of `key`, scheduling a load if it is neither in memory,
    /// in flight, nor given up on.
    pub fn get(&self, key: TileKey) -> TileLookup {
        let mut state = self.shared.lock();
        if let Some(tile) = state.memory.get(&key) {
            return TileLookup::Ready(tile);
        }
        if state.pending.contains(&key) {
            return TileLookup::Pending;
        }
        if let Some(failure) = state.failed.get(&key) {
            if failure.attempts >= self.max_attempts {
                return TileLookup::Failed(failure.error.clone());
            }
        }
        self.schedule(&mut state, key)
    }

    fn schedule(&self, state: &mut CacheState, key: TileKey) -> TileLookup {
        let Some(jobs) = &self.jobs else {
            return TileLookup::Failed(FetchError::ShutDown);
        };
        state.pending.insert(key);
        if jobs.send(key).is_err() {
            state.pending.remove(&key);
            return TileLookup::Failed(FetchError::ShutDown);
        }
        TileLookup::Pending
    }

    /// Look up every tile covering the view, in drawing order.
    pub fn visible(
        &self,
        view: &ViewState,
        provider: TileProvider,
    ) -> Result<Vec<(TilePlacement, TileLookup)>, DomainError> {
        Ok(visible_tiles(view, provider)?
            .into_iter()
            .map(|placement| (placement, self.get(placement.key)))
            .collect())
    }

    /// Completions since the last call. Call once per frame.
    pub fn poll_events(&self) -> Vec<TileEvent> {
        let mut events = Vec::new();
        loop {
            match self.events.try_recv() {
                Ok(event) => events.push(event),
                Err(flume::TryRecvError::Empty) | Err(flume::TryRecvError::Disconnected) => break,
            }
        }
        events
    }

    /// The raw event channel, for shells that block or select on it
    pub fn events(&self) -> &flume::Receiver<TileEvent> {
        &self.events
    }

    /// Forget everything about `key`, including its disk file, and fetch it
    /// again.
    pub fn reload(&self, key: TileKey) -> TileLookup {
        let mut state = self.shared.lock();
        state.failed.remove(&key);
        state.memory.remove(&key);
        if let Err(e) = self.shared.disk.remove(&key) {
            warn!(%key, error = %e, "could not remove cached tile");
        }
        if state.pending.contains(&key) {
            state.stale.insert(key);
            return TileLookup::Pending;
        }
        self.schedule(&mut state, key)
    }

    /// Clear all failure records; the next `get` of each key tries again.
    /// Returns how many keys were cleared.
    pub fn reload_failed(&self) -> usize {
        let mut state = self.shared.lock();
        let count = state.failed.len();
        state.failed.clear();
        count
    }

    pub fn contains_in_memory(&self, key: &TileKey) -> bool {
        self.shared.lock().memory.contains(key)
    }

    pub fn clear_memory(&self) {
        self.shared.lock().memory.clear();
    }

    /// Delete all tiles from disk. The memory tier is untouched.
    pub fn clear_disk(&self) -> Result<(), CacheError> {
        let disk = &self.shared.disk;
        disk.clear().map_err(|source| CacheError::Io {
            path: disk.root().to_path_buf(),
            source,
        })
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.shared.lock();
        CacheStats {
            memory_tiles: state.memory.len(),
            pending: state.pending.len(),
            failed: state.failed.len(),
            network_fetches: self.shared.network_fetches.load(Ordering::Relaxed),
            disk_hits: self.shared.disk_hits.load(Ordering::Relaxed),
        }
    }

    /// Stop accepting work and wait for the workers. Already queued loads
    /// still run to completion.
    pub fn shutdown(&mut self) {
        if self.jobs.take().is_none() {
            return;
        }
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                warn!("tile worker panicked");
            }
        }
        debug!("tile cache shut down");
    }
}

impl Drop for TileCache {
    fn drop(&mut self) {
        self.shutdown();
    }
}
