//! Default sizes and interaction constants

use crate::types::{Meters, Px};

/// Smallest extent (side or radius) a footprint may be edited down to
pub const MIN_EXTENT: Meters = Meters(1.0);
/// Vertices used to approximate a round footprint
pub const ROUND_VERTEX_COUNT: usize = 24;
pub const STOREY_HEIGHT: Meters = Meters(3.3);
pub const DEFAULT_STOREYS: u32 = 3;
/// Turns within this many degrees of 90 count as right angles when judging
/// whether an outline is a rectangle
pub const RIGHT_ANGLE_TOLERANCE_DEG: f64 = 15.0;

pub const SNAP_THRESHOLD_PX: Px = Px(15.0);
/// Pick radius for corner handles of selected buildings
pub const HANDLE_PICK_PX: Px = Px(10.0);

pub const ZOOM_STEP_PERCENT: f64 = 20.0;
pub const MIN_ZOOM: f64 = 0.1;
pub const MAX_ZOOM: f64 = 10.0;
/// Zoom-to-buildings never zooms in further than this
pub const FIT_MAX_ZOOM: f64 = 5.0;
pub const FIT_MARGIN_PX: Px = Px(50.0);

pub const TILE_MEMORY_CAPACITY: usize = 100;
pub const TILE_WORKERS: usize = 4;
pub const TILE_TIMEOUT_SECS: u64 = 5;
pub const TILE_MAX_ATTEMPTS: u32 = 2;
pub const TILE_USER_AGENT: &str = concat!("citysketch/", env!("CARGO_PKG_VERSION"));
