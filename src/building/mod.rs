//! Building footprints and their editing operations.
//!
//! A building is an anchor point in world meters plus a [`Footprint`]. For
//! rectangles the anchor is corner 0 and the pivot of every rotation; for
//! round buildings it is the center.

mod extrude;
mod fit;
mod footprint;
mod record;

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use extrude::Prism;
pub use fit::{FittedRect, convex_hull, fit_rectangle, is_approximately_rectangular};
pub use footprint::{Footprint, FootprintOps, RectFootprint, RoundFootprint, ShapeKind};
pub use record::BuildingRecord;

use crate::errors::GeometryError;
use crate::types::{Meters, Offset, WorldBox, WorldPt};

/// Opaque, immutable building identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildingId(String);

impl BuildingId {
    /// A fresh random (UUIDv4) identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for BuildingId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for BuildingId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for BuildingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Building {
    id: BuildingId,
    anchor: WorldPt,
    footprint: Footprint,
    height: Meters,
    storeys: u32,
}

fn check_point(p: WorldPt) -> Result<WorldPt, GeometryError> {
    if p.is_finite() { Ok(p) } else { Err(GeometryError::NonFinite) }
}

impl Building {
    pub fn new(anchor: WorldPt, footprint: Footprint) -> Result<Self, GeometryError> {
        Ok(Self {
            id: BuildingId::generate(),
            anchor: check_point(anchor)?,
            footprint,
            height: Meters::ZERO,
            storeys: 0,
        })
    }

    /// Rectangle with corner 0 at `anchor`. Extents are clamped to the
    /// minimum building size.
    pub fn rectangular(
        anchor: WorldPt,
        a: Meters,
        b: Meters,
        rotation: f64,
    ) -> Result<Self, GeometryError> {
        Self::new(anchor, RectFootprint::new(a, b, rotation)?.into())
    }

    pub fn round(center: WorldPt, radius: Meters) -> Result<Self, GeometryError> {
        Self::new(center, RoundFootprint::new(radius)?.into())
    }

    /// Replace the generated identifier (used when loading saved buildings)
    pub fn with_id(mut self, id: impl Into<BuildingId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_storeys(mut self, storeys: u32, storey_height: Meters) -> Result<Self, GeometryError> {
        self.set_storeys(storeys, storey_height)?;
        Ok(self)
    }

    /// Set the height and derive the storey count from it, at least one.
    pub fn with_height(mut self, height: Meters, storey_height: Meters) -> Result<Self, GeometryError> {
        let per_storey = Meters::try_non_negative(storey_height.raw())?.raw();
        let storeys = if per_storey > 0.0 {
            (height.raw() / per_storey).round().max(1.0) as u32
        } else {
            1
        };
        self.set_storeys(storeys, storey_height)?;
        self.set_height(height)?;
        Ok(self)
    }

    pub fn id(&self) -> &BuildingId {
        &self.id
    }

    pub fn anchor(&self) -> WorldPt {
        self.anchor
    }

    pub fn footprint(&self) -> &Footprint {
        &self.footprint
    }

    pub fn kind(&self) -> ShapeKind {
        self.footprint.kind()
    }

    pub fn height(&self) -> Meters {
        self.height
    }

    pub fn storeys(&self) -> u32 {
        self.storeys
    }

    /// Outline in world coordinates, counter-clockwise.
    pub fn corners(&self) -> Vec<WorldPt> {
        let anchor = self.anchor.to_dvec2();
        self.footprint
            .corner_offsets()
            .into_iter()
            .map(|o| WorldPt::from_dvec2(anchor + o))
            .collect()
    }

    /// Even-odd point-in-polygon test against [`Building::corners`].
    pub fn contains_point(&self, p: WorldPt) -> bool {
        let corners = self.corners();
        let (x, y) = (p.x.raw(), p.y.raw());
        let mut inside = false;
        let mut j = corners.len() - 1;
        for i in 0..corners.len() {
            let (xi, yi) = (corners[i].x.raw(), corners[i].y.raw());
            let (xj, yj) = (corners[j].x.raw(), corners[j].y.raw());
            if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
                inside = !inside;
            }
            j = i;
        }
        inside
    }

    /// Drag `corner` towards `p` keeping the anchor and rotation fixed.
    pub fn resize(&mut self, corner: usize, p: WorldPt) -> Result<(), GeometryError> {
        let p = check_point(p)?;
        self.footprint.resize(corner, (p - self.anchor).to_dvec2())
    }

    /// Drag `corner` to `p`, rotating about the anchor.
    pub fn rotate(&mut self, corner: usize, p: WorldPt) -> Result<(), GeometryError> {
        let p = check_point(p)?;
        self.footprint.rotate(corner, (p - self.anchor).to_dvec2())
    }

    pub fn set_radius(&mut self, radius: Meters) -> Result<(), GeometryError> {
        self.footprint.set_radius(radius)
    }

    pub fn translate_to(&mut self, anchor: WorldPt) -> Result<(), GeometryError> {
        self.anchor = check_point(anchor)?;
        Ok(())
    }

    pub fn shift(&mut self, by: Offset<Meters>) -> Result<(), GeometryError> {
        self.translate_to(self.anchor + by)
    }

    /// Index of the first outline vertex strictly closer than `threshold` to `p`.
    pub fn corner_near(&self, p: WorldPt, threshold: Meters) -> Option<usize> {
        self.corners()
            .into_iter()
            .position(|c| c.distance(p) < threshold)
    }

    pub fn bounding_box(&self) -> WorldBox {
        let mut bbox = WorldBox::new();
        for c in self.corners() {
            bbox.expand_point(c);
        }
        bbox
    }

    pub fn extrude(&self) -> Prism {
        Prism::extrude(&self.corners(), self.height)
    }

    /// Set the storey count and derive the height from it. Nothing changes
    /// when `storey_height` is negative or not finite.
    pub fn set_storeys(&mut self, storeys: u32, storey_height: Meters) -> Result<(), GeometryError> {
        let storey_height = Meters::try_non_negative(storey_height.raw())?;
        self.storeys = storeys;
        self.height = storey_height * storeys as f64;
        Ok(())
    }

    /// Set the height directly. The storey count is left alone.
    pub fn set_height(&mut self, height: Meters) -> Result<(), GeometryError> {
        self.height = Meters::try_non_negative(height.raw())?;
        Ok(())
    }
}
