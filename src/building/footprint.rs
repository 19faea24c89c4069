//! Footprint shapes
//!
//! Each shape is its own type that knows how to:
//! - List its outline relative to the building anchor
//! - Apply a corner drag (resize or rotate)
//!
//! Offsets are world-space vectors from the anchor, so shapes never see
//! absolute coordinates.

use std::f64::consts::{FRAC_PI_2, TAU};
use std::fmt;

use enum_dispatch::enum_dispatch;
use glam::{DVec2, dvec2};

use crate::defaults::{MIN_EXTENT, ROUND_VERTEX_COUNT};
use crate::errors::GeometryError;
use crate::types::Meters;

/// Discriminant of a [`Footprint`], used in messages and exports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    Rectangular,
    Round,
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShapeKind::Rectangular => write!(f, "rectangular"),
            ShapeKind::Round => write!(f, "round"),
        }
    }
}

/// Common behavior for all footprints
#[enum_dispatch]
pub trait FootprintOps {
    fn kind(&self) -> ShapeKind;

    /// Outline vertices as offsets from the anchor, counter-clockwise
    /// (world Y points north). Index 0 is the anchor itself for rectangles.
    fn corner_offsets(&self) -> Vec<DVec2>;

    /// Drag `corner` so that it lies as close as possible to `anchor + d`
    /// without rotating.
    fn resize(&mut self, corner: usize, d: DVec2) -> Result<(), GeometryError>;

    /// Drag `corner` to `anchor + d`, rotating about the anchor.
    fn rotate(&mut self, corner: usize, d: DVec2) -> Result<(), GeometryError>;

    fn set_radius(&mut self, radius: Meters) -> Result<(), GeometryError>;
}

fn clamp_extent(v: f64) -> f64 {
    v.max(MIN_EXTENT.raw())
}

fn finite_extent(v: f64) -> Result<f64, GeometryError> {
    Ok(clamp_extent(Meters::try_new(v)?.raw()))
}

// ============================================================================
// Rectangle
// ============================================================================

/// Rectangle spanned by the rotated local axes at the anchor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RectFootprint {
    a: f64,
    b: f64,
    rotation: f64,
}

impl RectFootprint {
    /// Extents below [`MIN_EXTENT`] are raised to it.
    pub fn new(a: Meters, b: Meters, rotation: f64) -> Result<Self, GeometryError> {
        if !rotation.is_finite() {
            return Err(GeometryError::NonFinite);
        }
        Ok(Self {
            a: finite_extent(a.raw())?,
            b: finite_extent(b.raw())?,
            rotation,
        })
    }

    /// Extent along the local X axis
    pub fn a(&self) -> Meters {
        Meters(self.a)
    }

    /// Extent along the local Y axis
    pub fn b(&self) -> Meters {
        Meters(self.b)
    }

    /// Radians, counter-clockwise from east. Not normalized.
    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    fn axes(&self) -> (DVec2, DVec2) {
        let u = DVec2::from_angle(self.rotation);
        (u, u.perp())
    }

    fn check_corner(corner: usize) -> Result<(), GeometryError> {
        if corner == 0 || corner >= 4 {
            Err(GeometryError::InvalidCorner {
                index: corner,
                count_minus_one: 3,
            })
        } else {
            Ok(())
        }
    }
}

impl FootprintOps for RectFootprint {
    fn kind(&self) -> ShapeKind {
        ShapeKind::Rectangular
    }

    fn corner_offsets(&self) -> Vec<DVec2> {
        let (u, v) = self.axes();
        vec![DVec2::ZERO, u * self.a, u * self.a + v * self.b, v * self.b]
    }

    fn resize(&mut self, corner: usize, d: DVec2) -> Result<(), GeometryError> {
        Self::check_corner(corner)?;
        let (u, v) = self.axes();
        if matches!(corner, 1 | 2) {
            self.a = clamp_extent(d.dot(u));
        }
        if matches!(corner, 2 | 3) {
            self.b = clamp_extent(d.dot(v));
        }
        Ok(())
    }

    fn rotate(&mut self, corner: usize, d: DVec2) -> Result<(), GeometryError> {
        Self::check_corner(corner)?;
        let dist = d.length();
        if dist == 0.0 {
            return Ok(());
        }
        let angle = d.y.atan2(d.x);
        match corner {
            1 => {
                self.rotation = angle;
                self.a = clamp_extent(dist);
            }
            3 => {
                self.rotation = angle - FRAC_PI_2;
                self.b = clamp_extent(dist);
            }
            _ => {
                let diagonal = self.a.hypot(self.b);
                let scale = dist / diagonal;
                self.rotation = angle - self.b.atan2(self.a);
                self.a = clamp_extent(self.a * scale);
                self.b = clamp_extent(self.b * scale);
            }
        }
        Ok(())
    }

    fn set_radius(&mut self, _radius: Meters) -> Result<(), GeometryError> {
        Err(GeometryError::Unsupported {
            operation: "set_radius",
            shape: self.kind(),
        })
    }
}

// ============================================================================
// Round
// ============================================================================

/// Circle centered on the anchor, approximated by a regular polygon
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoundFootprint {
    radius: f64,
}

impl RoundFootprint {
    pub fn new(radius: Meters) -> Result<Self, GeometryError> {
        Ok(Self {
            radius: finite_extent(radius.raw())?,
        })
    }

    pub fn radius(&self) -> Meters {
        Meters(self.radius)
    }
}

impl FootprintOps for RoundFootprint {
    fn kind(&self) -> ShapeKind {
        ShapeKind::Round
    }

    fn corner_offsets(&self) -> Vec<DVec2> {
        (0..ROUND_VERTEX_COUNT)
            .map(|i| {
                let theta = TAU * i as f64 / ROUND_VERTEX_COUNT as f64;
                dvec2(theta.cos(), theta.sin()) * self.radius
            })
            .collect()
    }

    fn resize(&mut self, _corner: usize, _d: DVec2) -> Result<(), GeometryError> {
        Err(GeometryError::Unsupported {
            operation: "resize",
            shape: self.kind(),
        })
    }

    fn rotate(&mut self, _corner: usize, _d: DVec2) -> Result<(), GeometryError> {
        Err(GeometryError::Unsupported {
            operation: "rotate",
            shape: self.kind(),
        })
    }

    fn set_radius(&mut self, radius: Meters) -> Result<(), GeometryError> {
        self.radius = finite_extent(radius.raw())?;
        Ok(())
    }
}

// ============================================================================
// Footprint Enum
// ============================================================================

/// The closed set of footprint shapes a building can have
#[enum_dispatch(FootprintOps)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Footprint {
    Rectangular(RectFootprint),
    Round(RoundFootprint),
}

impl Footprint {
    pub fn as_rect(&self) -> Option<&RectFootprint> {
        match self {
            Footprint::Rectangular(r) => Some(r),
            Footprint::Round(_) => None,
        }
    }

    pub fn as_round(&self) -> Option<&RoundFootprint> {
        match self {
            Footprint::Round(r) => Some(r),
            Footprint::Rectangular(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_4, PI};

    fn rect(a: f64, b: f64, rotation: f64) -> RectFootprint {
        RectFootprint::new(Meters(a), Meters(b), rotation).unwrap()
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn signed_area(pts: &[DVec2]) -> f64 {
        let n = pts.len();
        (0..n).map(|i| pts[i].perp_dot(pts[(i + 1) % n])).sum::<f64>() / 2.0
    }

    // ========================================================================
    // Rectangle tests
    // ========================================================================

    #[test]
    fn rect_corners_unrotated() {
        let c = rect(25.0, 15.0, 0.0).corner_offsets();
        assert_eq!(c, vec![dvec2(0.0, 0.0), dvec2(25.0, 0.0), dvec2(25.0, 15.0), dvec2(0.0, 15.0)]);
    }

    #[test]
    fn rect_corners_are_ccw_for_any_rotation() {
        for rotation in [0.0, FRAC_PI_4, FRAC_PI_2, PI, 1.5 * PI, 2.345, -7.0] {
            let c = rect(10.0, 4.0, rotation).corner_offsets();
            assert!(close(signed_area(&c), 40.0), "rotation {rotation}");
        }
    }

    #[test]
    fn rect_new_clamps_small_extents() {
        let r = rect(0.2, -3.0, 0.0);
        assert_eq!(r.a(), Meters(1.0));
        assert_eq!(r.b(), Meters(1.0));
    }

    #[test]
    fn rect_new_rejects_nan() {
        assert!(matches!(
            RectFootprint::new(Meters(f64::NAN), Meters(1.0), 0.0),
            Err(GeometryError::InvalidDimension(_))
        ));
        assert_eq!(
            RectFootprint::new(Meters(1.0), Meters(1.0), f64::INFINITY),
            Err(GeometryError::NonFinite)
        );
    }

    #[test]
    fn resize_projects_onto_rotated_axes() {
        let mut r = rect(10.0, 10.0, FRAC_PI_2);
        // local X now points north, local Y points west
        r.resize(2, dvec2(-4.0, 7.0)).unwrap();
        assert!(close(r.a, 7.0));
        assert!(close(r.b, 4.0));
        assert_eq!(r.rotation, FRAC_PI_2);
    }

    #[test]
    fn resize_single_axis() {
        let mut r = rect(10.0, 10.0, 0.0);
        r.resize(1, dvec2(20.0, 99.0)).unwrap();
        assert_eq!((r.a, r.b), (20.0, 10.0));
        r.resize(3, dvec2(99.0, 5.0)).unwrap();
        assert_eq!((r.a, r.b), (20.0, 5.0));
    }

    #[test]
    fn resize_clamps_inverted_drag() {
        let mut r = rect(10.0, 10.0, 0.0);
        r.resize(2, dvec2(-5.0, 0.5)).unwrap();
        assert_eq!((r.a, r.b), (1.0, 1.0));
    }

    #[test]
    fn anchor_corner_is_rejected() {
        let mut r = rect(10.0, 10.0, 0.0);
        assert_eq!(
            r.resize(0, dvec2(1.0, 1.0)),
            Err(GeometryError::InvalidCorner { index: 0, count_minus_one: 3 })
        );
        assert!(r.rotate(4, dvec2(1.0, 1.0)).is_err());
    }

    #[test]
    fn rotate_corner_one_aligns_x_axis() {
        let mut r = rect(10.0, 5.0, 0.0);
        r.rotate(1, dvec2(0.0, 8.0)).unwrap();
        assert!(close(r.rotation, FRAC_PI_2));
        assert!(close(r.a, 8.0));
        assert_eq!(r.b, 5.0);
    }

    #[test]
    fn rotate_corner_three_aligns_y_axis() {
        let mut r = rect(10.0, 5.0, 0.0);
        r.rotate(3, dvec2(-6.0, 0.0)).unwrap();
        assert!(close(r.rotation, FRAC_PI_2));
        assert!(close(r.b, 6.0));
    }

    #[test]
    fn rotate_corner_two_lands_on_target() {
        let mut r = rect(3.0, 4.0, 0.0);
        let target = dvec2(-7.0, 7.5);
        r.rotate(2, target).unwrap();
        let c = r.corner_offsets()[2];
        assert!(c.distance(target) < 1e-9, "{c:?}");
        assert!(close(r.b / r.a, 4.0 / 3.0));
    }

    #[test]
    fn rotate_zero_length_is_noop() {
        let mut r = rect(3.0, 4.0, 0.3);
        let before = r;
        r.rotate(2, DVec2::ZERO).unwrap();
        assert_eq!(r, before);
    }

    #[test]
    fn rect_has_no_radius() {
        let mut r = rect(3.0, 4.0, 0.0);
        assert_eq!(
            r.set_radius(Meters(2.0)),
            Err(GeometryError::Unsupported {
                operation: "set_radius",
                shape: ShapeKind::Rectangular
            })
        );
    }

    // ========================================================================
    // Round tests
    // ========================================================================

    #[test]
    fn round_outline() {
        let r = RoundFootprint::new(Meters(5.0)).unwrap();
        let c = r.corner_offsets();
        assert_eq!(c.len(), ROUND_VERTEX_COUNT);
        assert_eq!(c[0], dvec2(5.0, 0.0));
        assert!(c.iter().all(|p| close(p.length(), 5.0)));
        assert!(signed_area(&c) > 0.0);
    }

    #[test]
    fn round_rejects_corner_edits() {
        let mut f: Footprint = RoundFootprint::new(Meters(5.0)).unwrap().into();
        assert!(matches!(
            f.resize(1, dvec2(1.0, 1.0)),
            Err(GeometryError::Unsupported { shape: ShapeKind::Round, .. })
        ));
        assert!(matches!(
            f.rotate(1, dvec2(1.0, 1.0)),
            Err(GeometryError::Unsupported { operation: "rotate", .. })
        ));
    }

    #[test]
    fn round_set_radius_clamps() {
        let mut f: Footprint = RoundFootprint::new(Meters(5.0)).unwrap().into();
        f.set_radius(Meters(0.25)).unwrap();
        assert_eq!(f.as_round().map(|r| r.radius()), Some(Meters(1.0)));
    }

    #[test]
    fn dispatch_reports_kind() {
        let f: Footprint = rect(1.0, 2.0, 0.0).into();
        assert_eq!(f.kind(), ShapeKind::Rectangular);
        assert!(f.as_rect().is_some());
        assert!(f.as_round().is_none());
    }
}
