use std::ops::RangeInclusive;
use std::time::Duration;

use camino::Utf8PathBuf;
use citysketch::austal::{self, AustalFile};
use citysketch::config::CacheConfig;
use citysketch::tiles::{DiskStore, TileCache, TileKey, TileOutcome, TileProvider, geo_to_tile};
use citysketch::types::GeoPoint;
use citysketch::{Settings, TileLookup};
use miette::{IntoDiagnostic, miette};

fn usage() {
    eprintln!("Usage: cargo xtask <command>");
    eprintln!("Commands:");
    eprintln!("  cache-info [dir]                                 Show tile cache usage");
    eprintln!("  clear-cache [dir]                                Delete cached tiles");
    eprintln!("  prefetch <provider> <lat> <lon> <zoom> <radius>  Warm the cache around a point");
    eprintln!("  austal <path>                                    Summarize an austal.txt");
}

fn main() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        usage();
        std::process::exit(1);
    }

    match args[1].as_str() {
        "cache-info" => cache_info(cache_config(args.get(2))),
        "clear-cache" => clear_cache(cache_config(args.get(2))),
        "prefetch" => prefetch(&args[2..]),
        "austal" => match args.get(2) {
            Some(path) => austal_summary(Utf8PathBuf::from(path)),
            None => {
                usage();
                std::process::exit(1);
            }
        },
        _ => {
            eprintln!("Unknown command: {}", args[1]);
            usage();
            std::process::exit(1);
        }
    }
}

fn cache_config(dir: Option<&String>) -> CacheConfig {
    let config = CacheConfig::from_env();
    match dir {
        Some(dir) => config.with_cache_dir(Utf8PathBuf::from(dir)),
        None => config,
    }
}

fn cache_info(config: CacheConfig) -> miette::Result<()> {
    let store = DiskStore::open(&config.cache_dir)?;
    println!("{}", store.root().display());
    let mut total = 0;
    for usage in store.usage().into_diagnostic()? {
        total += usage.bytes;
        println!(
            "  {:<14} {:>7} tiles {:>10.1} KiB",
            usage.provider.name(),
            usage.files,
            usage.bytes as f64 / 1024.0
        );
    }
    println!("  {:<14} {:>24.1} KiB", "total", total as f64 / 1024.0);
    Ok(())
}

fn clear_cache(config: CacheConfig) -> miette::Result<()> {
    let store = DiskStore::open(&config.cache_dir)?;
    store.clear().into_diagnostic()?;
    eprintln!("Cleared {}", store.root().display());
    Ok(())
}

fn parse<T: std::str::FromStr>(args: &[String], index: usize, name: &str) -> miette::Result<T> {
    let raw = args
        .get(index)
        .ok_or_else(|| miette!("missing argument <{name}>"))?;
    raw.parse()
        .map_err(|_| miette!("invalid <{name}>: {raw:?}"))
}

fn prefetch(args: &[String]) -> miette::Result<()> {
    let provider: TileProvider = args
        .first()
        .ok_or_else(|| miette!("missing argument <provider>"))?
        .parse()?;
    let lat: f64 = parse(args, 1, "lat")?;
    let lon: f64 = parse(args, 2, "lon")?;
    let zoom: u8 = parse(args, 3, "zoom")?;
    let radius: u32 = parse(args, 4, "radius")?;
    if zoom > 19 {
        return Err(miette!("zoom {zoom} is beyond what tile servers offer"));
    }

    let (cx, cy) = geo_to_tile(GeoPoint::new(lat, lon), zoom);
    let n = 1u32 << zoom;
    let clamp = |v: f64| (v.max(0.0) as u32).min(n - 1);
    let (cx, cy) = (clamp(cx), clamp(cy));

    let mut keys = Vec::new();
    for y in tile_span(cy, radius, n) {
        for x in tile_span(cx, radius, n) {
            keys.push(TileKey::new(provider, zoom, x, y));
        }
    }

    let cache = TileCache::new(CacheConfig::from_env())?;
    let mut waiting = 0;
    let mut ready = 0;
    for key in &keys {
        match cache.get(*key) {
            TileLookup::Ready(_) => ready += 1,
            TileLookup::Pending => waiting += 1,
            TileLookup::Failed(e) => eprintln!("{key}: {e}"),
        }
    }

    let mut failed = 0;
    let mut from_disk = 0;
    while waiting > 0 {
        let event = cache
            .events()
            .recv_timeout(Duration::from_secs(60))
            .into_diagnostic()?;
        waiting -= 1;
        match event.outcome {
            TileOutcome::Ready { from_disk: true } => from_disk += 1,
            TileOutcome::Ready { from_disk: false } => ready += 1,
            TileOutcome::Failed(e) => {
                failed += 1;
                eprintln!("{}: {e}", event.key);
            }
        }
    }

    eprintln!(
        "{} tiles: {ready} downloaded or in memory, {from_disk} already on disk, {failed} failed",
        keys.len()
    );
    Ok(())
}

/// Tile indices within `radius` of `center` on an axis of `n` tiles
fn tile_span(center: u32, radius: u32, n: u32) -> RangeInclusive<u32> {
    center.saturating_sub(radius)..=center.saturating_add(radius).min(n - 1)
}

fn austal_summary(path: Utf8PathBuf) -> miette::Result<()> {
    let file = AustalFile::read(&path)?;
    match file.center()? {
        Some(center) => println!("center      {center}"),
        None => println!("center      (none)"),
    }
    let reference = file.center()?.unwrap_or_default();
    let buildings =
        austal::import_buildings(&file, reference, Settings::default().storey_height())?;
    println!("buildings   {}", buildings.len());
    for (i, b) in buildings.iter().enumerate() {
        let bbox = b.bounding_box();
        println!(
            "  #{i:<3} {:>9.2} {:>9.2}  {:>7.2} x {:<7.2} h {:.1}",
            bbox.min.x.raw(),
            bbox.min.y.raw(),
            bbox.width().raw(),
            bbox.height().raw(),
            b.height().raw()
        );
    }
    let others: Vec<&str> = file
        .keys()
        .filter(|k| !["gg", "xb", "yb", "ab", "bb", "cb", "wb"].contains(k))
        .collect();
    println!("other keys  {}", others.join(" "));
    Ok(())
}
