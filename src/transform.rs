//! Coordinate transforms between screen pixels, world meters and WGS84.
//!
//! World space is a local Web Mercator plane: meters east/north of the
//! geographic reference center, Y pointing north. Screen space has its origin
//! at the top-left of the viewport with Y pointing down.

use std::f64::consts::PI;

use glam::{DVec2, dvec2};

use crate::defaults;
use crate::errors::DomainError;
use crate::log::debug;
use crate::types::{GeoPoint, Meters, Point, Px, ScreenPt, Size, WorldBox, WorldPt};

/// Half the circumference of the Web Mercator world, in meters.
pub const MERCATOR_HALF_WORLD: f64 = 20037508.34;

/// Latitudes must lie strictly inside `(-MAX_LATITUDE, MAX_LATITUDE)`.
pub const MAX_LATITUDE: f64 = 85.05;

fn check_latitude(lat: f64) -> Result<f64, DomainError> {
    if !lat.is_finite() {
        Err(DomainError::NonFinite)
    } else if lat <= -MAX_LATITUDE || lat >= MAX_LATITUDE {
        Err(DomainError::LatitudeOutOfRange { lat })
    } else {
        Ok(lat)
    }
}

fn check_geo(p: GeoPoint) -> Result<GeoPoint, DomainError> {
    check_latitude(p.lat)?;
    if p.lon.is_finite() {
        Ok(p)
    } else {
        Err(DomainError::NonFinite)
    }
}

/// Unshifted Mercator northing of a latitude
fn mercator_y(lat: f64) -> f64 {
    ((90.0 + lat) * PI / 360.0).tan().ln() * MERCATOR_HALF_WORLD / PI
}

/// Absolute Mercator coordinates of the reference center, i.e. the offset
/// between the local world plane and the global Mercator plane.
pub fn mercator_offset(reference: GeoPoint) -> Result<DVec2, DomainError> {
    let reference = check_geo(reference)?;
    Ok(dvec2(
        reference.lon * MERCATOR_HALF_WORLD / 180.0,
        mercator_y(reference.lat),
    ))
}

/// Project a geographic coordinate into the world plane centered on `reference`.
pub fn geo_to_world(geo: GeoPoint, reference: GeoPoint) -> Result<WorldPt, DomainError> {
    let geo = check_geo(geo)?;
    let reference = check_geo(reference)?;
    let x = (geo.lon - reference.lon) * MERCATOR_HALF_WORLD / 180.0;
    let y = mercator_y(geo.lat) - mercator_y(reference.lat);
    Ok(WorldPt::from_dvec2(dvec2(x, y)))
}

/// Inverse of [`geo_to_world`]. Fails when the result would lie outside the
/// projectable latitude band.
pub fn world_to_geo(p: WorldPt, reference: GeoPoint) -> Result<GeoPoint, DomainError> {
    if !p.is_finite() {
        return Err(DomainError::NonFinite);
    }
    let reference = check_geo(reference)?;
    let y = p.y.raw() + mercator_y(reference.lat);
    let lat = (2.0 * (y * PI / MERCATOR_HALF_WORLD).exp().atan() - PI / 2.0) * 180.0 / PI;
    let lon = reference.lon + p.x.raw() * 180.0 / MERCATOR_HALF_WORLD;
    check_latitude(lat)?;
    Ok(GeoPoint::new(lat, lon))
}

/// Pan, zoom and viewport of the editing canvas plus the geographic origin
/// of world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewState {
    pub pan_x: Px,
    pub pan_y: Px,
    /// Pixels per world meter
    pub zoom: f64,
    pub viewport: Size<Px>,
    reference: GeoPoint,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            pan_x: Px::ZERO,
            pan_y: Px::ZERO,
            zoom: 1.0,
            viewport: Size { w: Px(800.0), h: Px(600.0) },
            reference: GeoPoint::default(),
        }
    }
}

impl ViewState {
    pub fn new(viewport: Size<Px>, reference: GeoPoint) -> Result<Self, DomainError> {
        Ok(Self {
            viewport,
            reference: check_geo(reference)?,
            ..Self::default()
        })
    }

    pub fn reference(&self) -> GeoPoint {
        self.reference
    }

    /// Move the world origin. Existing world coordinates keep their values,
    /// so they now denote different geographic places.
    pub fn set_reference(&mut self, reference: GeoPoint) -> Result<(), DomainError> {
        self.reference = check_geo(reference)?;
        Ok(())
    }

    pub fn set_viewport(&mut self, viewport: Size<Px>) {
        self.viewport = viewport;
    }

    pub fn screen_to_world(&self, p: ScreenPt) -> WorldPt {
        Point::new(
            Meters((p.x.raw() - self.pan_x.raw()) / self.zoom),
            Meters((self.viewport.h.raw() - p.y.raw() + self.pan_y.raw()) / self.zoom),
        )
    }

    pub fn world_to_screen(&self, p: WorldPt) -> ScreenPt {
        Point::new(
            Px(p.x.raw() * self.zoom + self.pan_x.raw()),
            Px(self.viewport.h.raw() + self.pan_y.raw() - p.y.raw() * self.zoom),
        )
    }

    pub fn geo_to_world(&self, geo: GeoPoint) -> Result<WorldPt, DomainError> {
        geo_to_world(geo, self.reference)
    }

    pub fn world_to_geo(&self, p: WorldPt) -> Result<GeoPoint, DomainError> {
        world_to_geo(p, self.reference)
    }

    /// World distance covered by a screen distance at the current zoom
    pub fn pixels_to_world(&self, px: Px) -> Meters {
        px.to_meters(self.zoom)
    }

    pub fn pan_by(&mut self, dx: Px, dy: Px) {
        self.pan_x = self.pan_x + dx;
        self.pan_y = self.pan_y + dy;
    }

    /// Multiply the zoom by `factor`, keeping the world point under `at` fixed
    /// on screen. The zoom is clamped to `[MIN_ZOOM, MAX_ZOOM]`.
    pub fn zoom_at(&mut self, at: ScreenPt, factor: f64) {
        if !factor.is_finite() || factor <= 0.0 {
            return;
        }
        let anchor = self.screen_to_world(at);
        self.zoom = (self.zoom * factor).clamp(defaults::MIN_ZOOM, defaults::MAX_ZOOM);
        let moved = self.world_to_screen(anchor);
        self.pan_x = self.pan_x + (at.x - moved.x);
        self.pan_y = self.pan_y + (at.y - moved.y);
    }

    /// One zoom step in or out about `at`; `factor` is the zoom-in multiplier
    pub fn zoom_step(&mut self, at: ScreenPt, zoom_in: bool, factor: f64) {
        self.zoom_at(at, if zoom_in { factor } else { 1.0 / factor });
    }

    /// Choose zoom and pan so `bounds` fills the viewport minus `margin` on
    /// every side. A degenerate axis does not constrain the zoom.
    pub fn fit_bounds(&mut self, bounds: &WorldBox, margin: Px) {
        if bounds.is_empty() {
            return;
        }
        let fit = |available: f64, extent: Meters| {
            if extent.raw() > 0.0 {
                available / extent.raw()
            } else {
                f64::INFINITY
            }
        };
        let zx = fit(self.viewport.w.raw() - 2.0 * margin.raw(), bounds.width());
        let zy = fit(self.viewport.h.raw() - 2.0 * margin.raw(), bounds.height());
        let zoom = zx.min(zy).min(defaults::FIT_MAX_ZOOM);
        self.zoom = if zoom > 0.0 { zoom.max(defaults::MIN_ZOOM) } else { defaults::MIN_ZOOM };

        let center = bounds.center();
        self.pan_x = Px(self.viewport.w.raw() / 2.0 - center.x.raw() * self.zoom);
        self.pan_y = Px(center.y.raw() * self.zoom - self.viewport.h.raw() / 2.0);
        debug!(zoom = self.zoom, "fit view to bounds");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{spt, wpt};

    fn view() -> ViewState {
        let mut v = ViewState::new(
            Size { w: Px(800.0), h: Px(600.0) },
            GeoPoint::new(49.75, 6.65),
        )
        .unwrap();
        v.pan_x = Px(37.5);
        v.pan_y = Px(-12.25);
        v.zoom = 2.5;
        v
    }

    // ========================================================================
    // Screen/world tests
    // ========================================================================

    #[test]
    fn screen_world_round_trip() {
        let v = view();
        for (x, y) in [(0.0, 0.0), (799.0, 1.0), (123.456, 567.89), (-40.0, 900.0)] {
            let s = spt(x, y);
            let back = v.world_to_screen(v.screen_to_world(s));
            assert!(back.distance(s).raw() < 1e-6, "{s:?} -> {back:?}");
        }
    }

    #[test]
    fn screen_y_points_down_world_y_points_up() {
        let v = ViewState::default();
        let top = v.screen_to_world(spt(0.0, 0.0));
        let bottom = v.screen_to_world(spt(0.0, 600.0));
        assert_eq!(bottom, wpt(0.0, 0.0));
        assert_eq!(top, wpt(0.0, 600.0));
    }

    #[test]
    fn zoom_at_keeps_cursor_fixed() {
        let mut v = view();
        let cursor = spt(300.0, 200.0);
        let before = v.screen_to_world(cursor);
        v.zoom_at(cursor, 1.1);
        let after = v.screen_to_world(cursor);
        assert!(before.distance(after).raw() < 1e-9);
        assert!((v.zoom - 2.75).abs() < 1e-12);
    }

    #[test]
    fn zoom_is_clamped() {
        let mut v = view();
        v.zoom_at(spt(0.0, 0.0), 100.0);
        assert_eq!(v.zoom, defaults::MAX_ZOOM);
        v.zoom_at(spt(0.0, 0.0), 1e-6);
        assert_eq!(v.zoom, defaults::MIN_ZOOM);
    }

    #[test]
    fn zoom_step_in_then_out_restores() {
        let mut v = view();
        let cursor = spt(400.0, 300.0);
        v.zoom_step(cursor, true, 1.2);
        assert!((v.zoom - 3.0).abs() < 1e-12);
        v.zoom_step(cursor, false, 1.2);
        assert!((v.zoom - 2.5).abs() < 1e-12);
    }

    #[test]
    fn fit_bounds_centers_box() {
        let mut v = ViewState::default();
        let bounds = WorldBox::from_corners(wpt(0.0, 0.0), wpt(350.0, 100.0));
        v.fit_bounds(&bounds, Px(50.0));
        assert!((v.zoom - 2.0).abs() < 1e-12);
        let c = v.world_to_screen(bounds.center());
        assert!(c.distance(spt(400.0, 300.0)).raw() < 1e-9);
    }

    #[test]
    fn fit_bounds_caps_zoom() {
        let mut v = ViewState::default();
        v.fit_bounds(&WorldBox::from_corners(wpt(0.0, 0.0), wpt(10.0, 10.0)), Px(50.0));
        assert_eq!(v.zoom, defaults::FIT_MAX_ZOOM);
    }

    // ========================================================================
    // Geographic tests
    // ========================================================================

    #[test]
    fn reference_maps_to_origin() {
        let r = GeoPoint::new(49.75, 6.65);
        let p = geo_to_world(r, r).unwrap();
        assert!(p.x.raw().abs() < 1e-9 && p.y.raw().abs() < 1e-9);
    }

    #[test]
    fn geo_world_round_trip() {
        let r = GeoPoint::new(49.75, 6.65);
        for p in [wpt(0.0, 0.0), wpt(1234.5, -987.25), wpt(-50_000.0, 75_000.0)] {
            let geo = world_to_geo(p, r).unwrap();
            let back = geo_to_world(geo, r).unwrap();
            assert!(back.distance(p).raw() < 1e-6, "{p:?} -> {back:?}");
        }
    }

    #[test]
    fn one_degree_of_longitude_at_equator() {
        let p = geo_to_world(GeoPoint::new(0.0, 1.0), GeoPoint::new(0.0, 0.0)).unwrap();
        assert!((p.x.raw() - MERCATOR_HALF_WORLD / 180.0).abs() < 1e-6);
        assert!(p.y.raw().abs() < 1e-6);
    }

    #[test]
    fn polar_latitudes_are_rejected() {
        let r = GeoPoint::new(0.0, 0.0);
        assert_eq!(
            geo_to_world(GeoPoint::new(86.0, 0.0), r),
            Err(DomainError::LatitudeOutOfRange { lat: 86.0 })
        );
        assert!(geo_to_world(GeoPoint::new(0.0, 0.0), GeoPoint::new(-85.05, 0.0)).is_err());
        assert_eq!(
            geo_to_world(GeoPoint::new(f64::NAN, 0.0), r),
            Err(DomainError::NonFinite)
        );
    }

    #[test]
    fn world_to_geo_rejects_polar_result() {
        let r = GeoPoint::new(0.0, 0.0);
        let y = mercator_y(86.0);
        let err = world_to_geo(wpt(0.0, y), r).unwrap_err();
        assert!(matches!(err, DomainError::LatitudeOutOfRange { lat } if (lat - 86.0).abs() < 1e-9));
    }

    #[test]
    fn mercator_offset_of_null_island_is_zero() {
        assert!(mercator_offset(GeoPoint::new(0.0, 0.0)).unwrap().length() < 1e-6);
    }
}
