//! Snap-to-corner search used while placing and editing buildings.
//!
//! Distances are measured in screen pixels so the snap radius feels the
//! same at every zoom level.

use crate::building::{Building, BuildingId};
use crate::config::Settings;
use crate::defaults;
use crate::transform::ViewState;
use crate::types::{Px, WorldPt};

/// A building corner that attracted a point
#[derive(Debug, Clone, PartialEq)]
pub struct SnapTarget {
    pub building: BuildingId,
    pub corner: usize,
    pub point: WorldPt,
    /// Screen distance from the candidate
    pub distance: Px,
}

/// Result of [`SnapEngine::snap`]
#[derive(Debug, Clone, PartialEq)]
pub struct Snapped {
    pub point: WorldPt,
    /// `None` when the candidate was returned unchanged
    pub target: Option<SnapTarget>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapEngine {
    pub threshold: Px,
    pub enabled: bool,
}

impl Default for SnapEngine {
    fn default() -> Self {
        Self {
            threshold: defaults::SNAP_THRESHOLD_PX,
            enabled: true,
        }
    }
}

impl SnapEngine {
    pub fn new(threshold: Px, enabled: bool) -> Self {
        Self { threshold, enabled }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.snap_threshold(), settings.snap_enabled)
    }

    /// The corner closest to `candidate` on screen among all buildings except
    /// `exclude`, however far away. On equal distances the earlier building,
    /// then the lower corner index, wins.
    pub fn nearest_corner(
        &self,
        candidate: WorldPt,
        buildings: &[Building],
        exclude: Option<&BuildingId>,
        view: &ViewState,
    ) -> Option<SnapTarget> {
        let at = view.world_to_screen(candidate);
        let mut best: Option<SnapTarget> = None;
        for building in buildings {
            if exclude == Some(building.id()) {
                continue;
            }
            for (corner, point) in building.corners().into_iter().enumerate() {
                let distance = view.world_to_screen(point).distance(at);
                if best.as_ref().is_none_or(|b| distance < b.distance) {
                    best = Some(SnapTarget {
                        building: building.id().clone(),
                        corner,
                        point,
                        distance,
                    });
                }
            }
        }
        best
    }

    /// Replace `candidate` by the nearest corner when it lies within the
    /// threshold; otherwise return it unchanged.
    pub fn snap(
        &self,
        candidate: WorldPt,
        buildings: &[Building],
        exclude: Option<&BuildingId>,
        view: &ViewState,
    ) -> Snapped {
        if !self.enabled {
            return Snapped { point: candidate, target: None };
        }
        match self.nearest_corner(candidate, buildings, exclude, view) {
            Some(target) if target.distance <= self.threshold => Snapped {
                point: target.point,
                target: Some(target),
            },
            _ => Snapped { point: candidate, target: None },
        }
    }
}
