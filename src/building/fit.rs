//! Fitting a single rotated rectangle to an arbitrary outline.
//!
//! Surveyed or mapped footprints come with extra vertices, slightly skewed
//! corners and sometimes a repeated closing vertex. [`fit_rectangle`] replaces
//! such an outline by the smallest-area rectangle enclosing its convex hull.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

use glam::DVec2;

use super::Building;
use crate::defaults;
use crate::errors::GeometryError;
use crate::types::{Meters, WorldPt};

const ANGLE_EPS: f64 = 1e-12;

/// A rotated rectangle in building terms: corner 0, the side lengths and the
/// direction of side `a`. Corners run counter-clockwise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FittedRect {
    pub anchor: WorldPt,
    pub a: Meters,
    pub b: Meters,
    /// Radians, in `(-π/4, π/4]` up to rounding
    pub rotation: f64,
}

impl FittedRect {
    pub fn area(&self) -> f64 {
        self.a.raw() * self.b.raw()
    }

    fn axes(&self) -> (DVec2, DVec2) {
        let u = DVec2::from_angle(self.rotation);
        (u, u.perp())
    }

    /// Same rectangle, starting at the next corner that keeps the rotation
    /// in `(-π/4, π/4]`.
    fn canonical(mut self) -> Self {
        while self.rotation > FRAC_PI_4 + ANGLE_EPS {
            let (_, v) = self.axes();
            self.anchor = WorldPt::from_dvec2(self.anchor.to_dvec2() + v * self.b.raw());
            std::mem::swap(&mut self.a, &mut self.b);
            self.rotation -= FRAC_PI_2;
        }
        while self.rotation <= -FRAC_PI_4 - ANGLE_EPS {
            let (u, _) = self.axes();
            self.anchor = WorldPt::from_dvec2(self.anchor.to_dvec2() + u * self.a.raw());
            std::mem::swap(&mut self.a, &mut self.b);
            self.rotation += FRAC_PI_2;
        }
        self
    }
}

/// Vertices as vectors, without a repeated closing vertex.
fn ring(points: &[WorldPt]) -> Result<Vec<DVec2>, GeometryError> {
    if points.iter().any(|p| !p.is_finite()) {
        return Err(GeometryError::NonFinite);
    }
    let mut ring: Vec<DVec2> = points.iter().map(|p| p.to_dvec2()).collect();
    if ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    if ring.is_empty() {
        return Err(GeometryError::EmptyPolygon);
    }
    Ok(ring)
}

fn hull_of(points: &[DVec2]) -> Vec<DVec2> {
    let mut pts = points.to_vec();
    pts.sort_by(|p, q| p.x.total_cmp(&q.x).then(p.y.total_cmp(&q.y)));
    pts.dedup();
    if pts.len() < 3 {
        return pts;
    }

    let turns_left = |hull: &[DVec2], p: DVec2| {
        let (o, a) = (hull[hull.len() - 2], hull[hull.len() - 1]);
        (a - o).perp_dot(p - o) > 0.0
    };
    let mut hull: Vec<DVec2> = Vec::with_capacity(pts.len() + 1);
    for &p in &pts {
        while hull.len() >= 2 && !turns_left(&hull, p) {
            hull.pop();
        }
        hull.push(p);
    }
    let lower = hull.len() + 1;
    for &p in pts.iter().rev().skip(1) {
        while hull.len() >= lower && !turns_left(&hull, p) {
            hull.pop();
        }
        hull.push(p);
    }
    // the walk ends where it started
    hull.pop();
    hull
}

/// Convex hull, counter-clockwise from the leftmost (then lowest) point,
/// without collinear vertices. Fewer than three points come back sorted.
pub fn convex_hull(points: &[WorldPt]) -> Vec<WorldPt> {
    let pts: Vec<DVec2> = points
        .iter()
        .filter(|p| p.is_finite())
        .map(|p| p.to_dvec2())
        .collect();
    hull_of(&pts).into_iter().map(WorldPt::from_dvec2).collect()
}

/// Smallest-area rectangle enclosing `points`, with one side flush to a hull
/// edge. Outlines without area (a point, collinear points) get their
/// axis-aligned bounding box, which may have zero extents.
pub fn fit_rectangle(points: &[WorldPt]) -> Result<FittedRect, GeometryError> {
    let ring = ring(points)?;
    let hull = hull_of(&ring);

    if hull.len() < 3 {
        let (lo, hi) = ring.iter().fold(
            (DVec2::splat(f64::INFINITY), DVec2::splat(f64::NEG_INFINITY)),
            |(lo, hi), &p| (lo.min(p), hi.max(p)),
        );
        return Ok(FittedRect {
            anchor: WorldPt::from_dvec2(lo),
            a: Meters(hi.x - lo.x),
            b: Meters(hi.y - lo.y),
            rotation: 0.0,
        });
    }

    let mut best: Option<FittedRect> = None;
    for (i, &origin) in hull.iter().enumerate() {
        let u = (hull[(i + 1) % hull.len()] - origin).normalize();
        let v = u.perp();
        let (mut s_min, mut s_max, mut t_max) = (0.0f64, 0.0f64, 0.0f64);
        for &p in &hull {
            let d = p - origin;
            s_min = s_min.min(d.dot(u));
            s_max = s_max.max(d.dot(u));
            t_max = t_max.max(d.dot(v));
        }
        let candidate = FittedRect {
            anchor: WorldPt::from_dvec2(origin + u * s_min),
            a: Meters(s_max - s_min),
            b: Meters(t_max),
            rotation: u.y.atan2(u.x),
        };
        // equal areas keep the earlier edge
        if best.is_none_or(|b| candidate.area() < b.area() * (1.0 - 1e-9)) {
            best = Some(candidate);
        }
    }
    best.map(FittedRect::canonical)
        .ok_or(GeometryError::EmptyPolygon)
}

/// Whether `points` is close enough to a rectangle to be replaced by one
/// without losing its shape: all but two turns are right angles within
/// [`defaults::RIGHT_ANGLE_TOLERANCE_DEG`]. Triangles and other outlines of
/// fewer than four vertices pass; outlines of more than eight never do.
pub fn is_approximately_rectangular(points: &[WorldPt]) -> bool {
    let Ok(ring) = ring(points) else {
        return false;
    };
    let n = ring.len();
    if n < 4 {
        return true;
    }
    if n > 8 {
        return false;
    }
    let right_angles = (0..n)
        .filter(|&i| {
            let e1 = ring[(i + 1) % n] - ring[i];
            let e2 = ring[(i + 2) % n] - ring[(i + 1) % n];
            let turn = e1.perp_dot(e2).atan2(e1.dot(e2)).abs().to_degrees();
            (turn - 90.0).abs() < defaults::RIGHT_ANGLE_TOLERANCE_DEG
        })
        .count();
    right_angles + 2 >= n
}

impl Building {
    /// Rectangular building fitted to an outline in world coordinates.
    /// Sides shorter than the minimum building size are raised to it.
    pub fn from_polygon(points: &[WorldPt]) -> Result<Self, GeometryError> {
        let fit = fit_rectangle(points)?;
        Self::rectangular(fit.anchor, fit.a, fit.b, fit.rotation)
    }
}
