//! Slippy-map tile math and viewport coverage.
//!
//! Tile coordinates use the usual XYZ scheme: `x` grows east, `y` grows
//! south, and zoom `z` has `2^z` tiles per axis. Placement goes through the
//! same Mercator plane as the buildings, so imagery and footprints line up.

use std::f64::consts::PI;

use glam::dvec2;

use super::key::{TileKey, TileProvider};
use crate::errors::DomainError;
use crate::transform::{MERCATOR_HALF_WORLD, ViewState, mercator_offset};
use crate::types::{GeoPoint, Point, Px, ScreenPt, WorldPt};

/// Edge length of a tile image in pixels
pub const TILE_SIZE_PX: f64 = 256.0;
pub const MIN_TILE_ZOOM: u8 = 11;
pub const MAX_TILE_ZOOM: u8 = 18;

/// Tiles per axis at `zoom`
pub fn tile_count(zoom: u8) -> u32 {
    1u32 << zoom
}

/// Fractional tile coordinates of a geographic point
pub fn geo_to_tile(geo: GeoPoint, zoom: u8) -> (f64, f64) {
    let n = tile_count(zoom) as f64;
    let lat = geo.lat.to_radians();
    let x = (geo.lon + 180.0) / 360.0 * n;
    let y = (1.0 - lat.tan().asinh() / PI) / 2.0 * n;
    (x, y)
}

/// Geographic coordinate of a (fractional) tile position; integer inputs give
/// the tile's north-west corner.
pub fn tile_to_geo(x: f64, y: f64, zoom: u8) -> GeoPoint {
    let n = tile_count(zoom) as f64;
    let lon = x / n * 360.0 - 180.0;
    let lat = (PI * (1.0 - 2.0 * y / n)).sinh().atan().to_degrees();
    GeoPoint::new(lat, lon)
}

/// Width of a tile in Mercator meters
fn tile_span(zoom: u8) -> f64 {
    2.0 * MERCATOR_HALF_WORLD / tile_count(zoom) as f64
}

/// Smallest tile zoom whose image pixels are no larger than screen pixels at
/// the view's zoom, within `[MIN_TILE_ZOOM, MAX_TILE_ZOOM]`.
pub fn tile_zoom_for(view: &ViewState) -> u8 {
    let mut zoom = MIN_TILE_ZOOM;
    while zoom < MAX_TILE_ZOOM && tile_span(zoom) / TILE_SIZE_PX * view.zoom > 1.0 {
        zoom += 1;
    }
    zoom
}

/// Where one tile goes on screen
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TilePlacement {
    pub key: TileKey,
    /// Top-left corner
    pub origin: ScreenPt,
    /// Edge length on screen
    pub size: Px,
}

/// Tiles covering the viewport, row-major from the top-left, restricted to
/// the valid `0..2^z` range.
pub fn visible_tiles(
    view: &ViewState,
    provider: TileProvider,
) -> Result<Vec<TilePlacement>, DomainError> {
    let zoom = tile_zoom_for(view);
    let offset = mercator_offset(view.reference())?;
    let span = tile_span(zoom);
    let last = (tile_count(zoom) - 1) as f64;

    let top_left = view.screen_to_world(Point::new(Px::ZERO, Px::ZERO)).to_dvec2() + offset;
    let bottom_right = view
        .screen_to_world(Point::new(view.viewport.w, view.viewport.h))
        .to_dvec2()
        + offset;

    let col = |gx: f64| (gx + MERCATOR_HALF_WORLD) / span;
    let row = |gy: f64| (MERCATOR_HALF_WORLD - gy) / span;

    let x0 = col(top_left.x).floor().max(0.0);
    let x1 = col(bottom_right.x).floor().min(last);
    let y0 = row(top_left.y).floor().max(0.0);
    let y1 = row(bottom_right.y).floor().min(last);
    if !(x0 <= x1 && y0 <= y1) {
        return Ok(Vec::new());
    }

    let size = Px(span * view.zoom);
    let mut placements = Vec::with_capacity(((x1 - x0 + 1.0) * (y1 - y0 + 1.0)) as usize);
    for y in y0 as u32..=y1 as u32 {
        for x in x0 as u32..=x1 as u32 {
            let corner = dvec2(
                x as f64 * span - MERCATOR_HALF_WORLD,
                MERCATOR_HALF_WORLD - y as f64 * span,
            ) - offset;
            placements.push(TilePlacement {
                key: TileKey::new(provider, zoom, x, y),
                origin: view.world_to_screen(WorldPt::from_dvec2(corner)),
                size,
            });
        }
    }
    Ok(placements)
}
