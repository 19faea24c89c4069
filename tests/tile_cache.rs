//! Tile cache behaviour against an in-process tile source.

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use std::time::Duration;

use citysketch::config::CacheConfig;
use citysketch::errors::FetchError;
use citysketch::tiles::{
    TileCache, TileEvent, TileKey, TileLookup, TileOutcome, TileProvider, TileSource,
};
use image::{ImageFormat, Rgba, RgbaImage};

fn png(shade: u8) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    RgbaImage::from_pixel(1, 1, Rgba([shade, shade, shade, 255]))
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

/// Counts fetches; fails while `failing` is set
struct MockSource {
    fetches: AtomicUsize,
    delay: Duration,
    failing: Mutex<bool>,
}

impl MockSource {
    fn new() -> Arc<Self> {
        Self::slow(Duration::ZERO)
    }

    fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            fetches: AtomicUsize::new(0),
            delay,
            failing: Mutex::new(false),
        })
    }

    fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }

    fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl TileSource for MockSource {
    fn fetch(&self, key: &TileKey) -> Result<Vec<u8>, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        thread::sleep(self.delay);
        if *self.failing.lock().unwrap() {
            return Err(FetchError::Http {
                status: 503,
                url: key.url(),
            });
        }
        Ok(png(key.x as u8))
    }
}

fn config(dir: &tempfile::TempDir) -> CacheConfig {
    CacheConfig::default().with_cache_dir(dir.path())
}

fn key(x: u32) -> TileKey {
    TileKey::new(TileProvider::OpenStreetMap, 16, x, 22000)
}

fn next_event(cache: &TileCache) -> TileEvent {
    cache
        .events()
        .recv_timeout(Duration::from_secs(10))
        .expect("no tile event")
}

/// Request `key` and wait for it to settle
fn load(cache: &TileCache, key: TileKey) -> TileEvent {
    assert_eq!(cache.get(key), TileLookup::Pending);
    let event = next_event(cache);
    assert_eq!(event.key, key);
    event
}

// ============================================================================
// De-duplication
// ============================================================================

#[test]
fn concurrent_requests_fetch_once() {
    let dir = tempfile::tempdir().unwrap();
    let source = MockSource::slow(Duration::from_millis(50));
    let cache = Arc::new(TileCache::with_source(config(&dir), source.clone()).unwrap());
    let barrier = Arc::new(Barrier::new(16));

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                cache.get(key(1))
            })
        })
        .collect();
    for handle in handles {
        let lookup = handle.join().unwrap();
        assert!(matches!(lookup, TileLookup::Pending | TileLookup::Ready(_)));
    }

    let event = next_event(&cache);
    assert_eq!(event.outcome, TileOutcome::Ready { from_disk: false });
    assert!(cache.get(key(1)).tile().is_some());
    assert_eq!(source.fetches(), 1);
    assert!(cache.events().try_recv().is_err(), "only one completion expected");
}

// ============================================================================
// Tiers
// ============================================================================

#[test]
fn memory_eviction_keeps_disk() {
    let dir = tempfile::tempdir().unwrap();
    let source = MockSource::new();
    let mut cfg = config(&dir);
    cfg.memory_capacity = 3;
    let cache = TileCache::with_source(cfg, source.clone()).unwrap();

    for x in 0..3 {
        load(&cache, key(x));
    }
    // touch 0 so that 1 is the least recently used
    assert!(cache.get(key(0)).tile().is_some());
    load(&cache, key(3));

    assert!(cache.contains_in_memory(&key(0)));
    assert!(!cache.contains_in_memory(&key(1)));
    assert_eq!(cache.stats().memory_tiles, 3);
    assert!(cache.disk().contains(&key(1)));

    // evicted tile comes back from disk without another fetch
    let event = load(&cache, key(1));
    assert_eq!(event.outcome, TileOutcome::Ready { from_disk: true });
    assert_eq!(source.fetches(), 4);
}

#[test]
fn disk_tiles_survive_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let source = MockSource::new();
    {
        let cache = TileCache::with_source(config(&dir), source.clone()).unwrap();
        load(&cache, key(7));
    }

    let cache = TileCache::with_source(config(&dir), source.clone()).unwrap();
    let event = load(&cache, key(7));
    assert_eq!(event.outcome, TileOutcome::Ready { from_disk: true });
    assert_eq!(source.fetches(), 1);

    let tile = cache.get(key(7));
    assert_eq!(tile.tile().unwrap().pixel(0, 0), Some([7, 7, 7, 255]));
    assert_eq!(cache.stats().disk_hits, 1);
}

#[test]
fn corrupt_disk_file_is_refetched() {
    let dir = tempfile::tempdir().unwrap();
    let source = MockSource::new();
    let cache = TileCache::with_source(config(&dir), source.clone()).unwrap();

    let path = cache.disk().path_for(&key(5));
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, b"not an image").unwrap();

    let event = load(&cache, key(5));
    assert_eq!(event.outcome, TileOutcome::Ready { from_disk: false });
    assert_eq!(source.fetches(), 1);
    assert_eq!(std::fs::read(&path).unwrap(), png(5));
}

#[test]
fn clear_disk_leaves_memory() {
    let dir = tempfile::tempdir().unwrap();
    let cache = TileCache::with_source(config(&dir), MockSource::new()).unwrap();
    load(&cache, key(2));

    cache.clear_disk().unwrap();
    assert!(!cache.disk().contains(&key(2)));
    assert!(cache.get(key(2)).tile().is_some());
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn failures_retry_then_stick() {
    let dir = tempfile::tempdir().unwrap();
    let source = MockSource::new();
    source.set_failing(true);
    let cache = TileCache::with_source(config(&dir), source.clone()).unwrap();

    let first = load(&cache, key(9));
    assert!(matches!(
        first.outcome,
        TileOutcome::Failed(FetchError::Http { status: 503, .. })
    ));
    assert!(!cache.contains_in_memory(&key(9)));
    assert!(!cache.disk().contains(&key(9)));

    // one retry on the next request
    load(&cache, key(9));
    assert_eq!(source.fetches(), 2);

    // then it stays failed without touching the source
    assert!(matches!(cache.get(key(9)), TileLookup::Failed(_)));
    assert!(matches!(cache.get(key(9)), TileLookup::Failed(_)));
    assert_eq!(source.fetches(), 2);
    assert_eq!(cache.stats().failed, 1);

    source.set_failing(false);
    let event = match cache.reload(key(9)) {
        TileLookup::Pending => next_event(&cache),
        other => panic!("expected a fresh load, got {other:?}"),
    };
    assert_eq!(event.outcome, TileOutcome::Ready { from_disk: false });
    assert_eq!(cache.stats().failed, 0);
}

#[test]
fn reload_failed_clears_every_record() {
    let dir = tempfile::tempdir().unwrap();
    let source = MockSource::new();
    source.set_failing(true);
    let mut cfg = config(&dir);
    cfg.max_attempts = 1;
    let cache = TileCache::with_source(cfg, source.clone()).unwrap();

    load(&cache, key(1));
    load(&cache, key(2));
    assert!(matches!(cache.get(key(1)), TileLookup::Failed(_)));

    source.set_failing(false);
    assert_eq!(cache.reload_failed(), 2);
    let event = load(&cache, key(1));
    assert_eq!(event.outcome, TileOutcome::Ready { from_disk: false });
}

#[test]
fn reload_while_loading_fetches_again() {
    let dir = tempfile::tempdir().unwrap();
    let source = MockSource::slow(Duration::from_millis(100));
    let mut cfg = config(&dir);
    cfg.workers = 1;
    let cache = TileCache::with_source(cfg, source.clone()).unwrap();

    assert_eq!(cache.get(key(4)), TileLookup::Pending);
    assert_eq!(cache.reload(key(4)), TileLookup::Pending);

    let event = next_event(&cache);
    assert_eq!(event.key, key(4));
    assert_eq!(event.outcome, TileOutcome::Ready { from_disk: false });
    assert_eq!(source.fetches(), 2);
    assert!(cache.events().try_recv().is_err(), "only one completion expected");
    assert_eq!(cache.stats().pending, 0);
}

#[test]
fn shutdown_waits_for_queued_work() {
    let dir = tempfile::tempdir().unwrap();
    let source = MockSource::slow(Duration::from_millis(20));
    let mut cfg = config(&dir);
    cfg.workers = 1;
    let mut cache = TileCache::with_source(cfg, source.clone()).unwrap();

    for x in 0..3 {
        cache.get(key(x));
    }
    cache.shutdown();
    assert_eq!(source.fetches(), 3);
    assert_eq!(cache.poll_events().len(), 3);
}
