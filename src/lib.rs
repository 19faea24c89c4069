//! Spatial core of a building-footprint sketching tool.
//!
//! Buildings are drawn on a local Web Mercator plane (meters, Y north)
//! centered on a geographic reference point and shown over slippy-map
//! imagery. The crate covers the coordinate transforms, footprint geometry,
//! corner snapping, the background tile cache and the AUSTAL `austal.txt`
//! building exchange. Windowing and rendering belong to the host shell.

use pest_derive::Parser;

pub mod austal;
pub mod building;
pub mod config;
pub mod defaults;
pub mod errors;
pub mod log;
pub mod project;
pub mod snap;
pub mod tiles;
pub mod transform;
pub mod types;

#[derive(Parser)]
#[grammar = "austal.pest"]
pub struct AustalParser;

pub use austal::{AustalFile, AustalValue};
pub use building::{Building, BuildingId, Footprint, FootprintOps, ShapeKind};
pub use config::{CacheConfig, Settings};
pub use project::Project;
pub use snap::SnapEngine;
pub use tiles::{TileCache, TileKey, TileLookup, TileProvider};
pub use transform::ViewState;
pub use types::{GeoPoint, Meters, Px};
