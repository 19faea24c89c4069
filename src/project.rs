//! The editable building collection and the interactive gestures on it.
//!
//! A [`Project`] owns every building in insertion order. The selection only
//! refers to buildings by id and is kept a subset of the collection.

use std::collections::HashSet;

use glam::DVec2;

use crate::austal::{self, AustalFile};
use crate::building::{Building, BuildingId, BuildingRecord, RectFootprint};
use crate::config::Settings;
use crate::defaults;
use crate::errors::{AustalError, GeometryError, ProjectError};
use crate::log::debug;
use crate::snap::{SnapEngine, Snapped};
use crate::transform::ViewState;
use crate::types::{BBox, Meters, ScreenPt, WorldBox, WorldPt};

/// Ids of the selected buildings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection(HashSet<BuildingId>);

impl Selection {
    pub fn contains(&self, id: &BuildingId) -> bool {
        self.0.contains(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BuildingId> {
        self.0.iter()
    }
}

/// What dragging a corner handle does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragMode {
    Resize,
    /// Rotate about the anchor (Ctrl held)
    Rotate,
}

/// A rectangle being drawn with two clicks: the first fixes the anchor, the
/// cursor then spans the rectangle until the second click.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CreationGesture {
    anchor: WorldPt,
    a: f64,
    b: f64,
    rotation: f64,
}

impl CreationGesture {
    pub fn start(anchor: WorldPt) -> Self {
        Self {
            anchor,
            a: 0.0,
            b: 0.0,
            rotation: 0.0,
        }
    }

    pub fn anchor(&self) -> WorldPt {
        self.anchor
    }

    pub fn extents(&self) -> (Meters, Meters) {
        (Meters(self.a), Meters(self.b))
    }

    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    /// Span the rectangle to `cursor` along the current rotation.
    pub fn update(&mut self, cursor: WorldPt) {
        let d = (cursor - self.anchor).to_dvec2();
        let u = DVec2::from_angle(self.rotation);
        self.a = d.dot(u);
        self.b = d.dot(u.perp());
    }

    /// Turn the rectangle so its far corner points at `cursor`, keeping
    /// the extents.
    pub fn update_rotating(&mut self, cursor: WorldPt) {
        let d = (cursor - self.anchor).to_dvec2();
        if d == DVec2::ZERO {
            return;
        }
        self.rotation = d.y.atan2(d.x) - self.b.atan2(self.a);
    }

    /// Outline as currently drawn (not yet clamped)
    pub fn preview_corners(&self) -> [WorldPt; 4] {
        let u = DVec2::from_angle(self.rotation);
        let v = u.perp();
        let o = self.anchor.to_dvec2();
        [
            self.anchor,
            WorldPt::from_dvec2(o + u * self.a),
            WorldPt::from_dvec2(o + u * self.a + v * self.b),
            WorldPt::from_dvec2(o + v * self.b),
        ]
    }

    /// The finished building with the default storey count.
    pub fn finish(self, settings: &Settings) -> Result<Building, GeometryError> {
        let footprint = RectFootprint::new(Meters(self.a), Meters(self.b), self.rotation)?;
        Ok(Building::new(self.anchor, footprint.into())?
            .with_storeys(settings.default_storeys, settings.storey_height())?)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Project {
    buildings: Vec<Building>,
    selection: Selection,
    pub view: ViewState,
    pub settings: Settings,
}

fn unknown(id: &BuildingId) -> ProjectError {
    ProjectError::UnknownBuilding { id: id.to_string() }
}

impl Project {
    pub fn new(view: ViewState, settings: Settings) -> Self {
        Self {
            buildings: Vec::new(),
            selection: Selection::default(),
            view,
            settings,
        }
    }

    // ========================================================================
    // Collection
    // ========================================================================

    /// All buildings in insertion (drawing) order
    pub fn buildings(&self) -> &[Building] {
        &self.buildings
    }

    pub fn building(&self, id: &BuildingId) -> Option<&Building> {
        self.buildings.iter().find(|b| b.id() == id)
    }

    fn building_mut(&mut self, id: &BuildingId) -> Result<&mut Building, ProjectError> {
        self.buildings
            .iter_mut()
            .find(|b| b.id() == id)
            .ok_or_else(|| unknown(id))
    }

    pub fn add(&mut self, building: Building) -> Result<(), ProjectError> {
        if self.building(building.id()).is_some() {
            return Err(ProjectError::DuplicateId {
                id: building.id().to_string(),
            });
        }
        self.buildings.push(building);
        Ok(())
    }

    pub fn remove(&mut self, id: &BuildingId) -> Result<Building, ProjectError> {
        let index = self
            .buildings
            .iter()
            .position(|b| b.id() == id)
            .ok_or_else(|| unknown(id))?;
        self.selection.0.remove(id);
        Ok(self.buildings.remove(index))
    }

    /// Remove every selected building, returning them in collection order.
    pub fn delete_selected(&mut self) -> Vec<Building> {
        let selection = std::mem::take(&mut self.selection);
        let (removed, kept): (Vec<Building>, Vec<Building>) = std::mem::take(&mut self.buildings)
            .into_iter()
            .partition(|b| selection.contains(b.id()));
        self.buildings = kept;
        debug!(count = removed.len(), "deleted selected buildings");
        removed
    }

    /// Replace the whole collection, e.g. after loading a file. The
    /// selection is cleared.
    pub fn replace_buildings(
        &mut self,
        buildings: impl IntoIterator<Item = Building>,
    ) -> Result<(), ProjectError> {
        let mut seen = HashSet::new();
        let buildings: Vec<Building> = buildings.into_iter().collect();
        for b in &buildings {
            if !seen.insert(b.id()) {
                return Err(ProjectError::DuplicateId { id: b.id().to_string() });
            }
        }
        self.buildings = buildings;
        self.selection.0.clear();
        Ok(())
    }

    fn extend_buildings(&mut self, buildings: Vec<Building>) {
        self.buildings.extend(buildings);
    }

    pub fn records(&self) -> Vec<BuildingRecord> {
        self.buildings.iter().map(BuildingRecord::from).collect()
    }

    /// Union of all building bounding boxes, empty without buildings
    pub fn bounds(&self) -> WorldBox {
        let mut bbox = BBox::new();
        for b in &self.buildings {
            bbox.expand_bbox(&b.bounding_box());
        }
        bbox
    }

    /// Add a rectangular building fitted to `outline` (world coordinates),
    /// `height` tall. Returns its id.
    pub fn add_outline(&mut self, outline: &[WorldPt], height: Meters) -> Result<BuildingId, ProjectError> {
        let building =
            Building::from_polygon(outline)?.with_height(height, self.settings.storey_height())?;
        let id = building.id().clone();
        self.add(building)?;
        Ok(id)
    }

    /// Append the buildings of an AUSTAL file, shifted into this project's
    /// world frame. Returns how many were added.
    pub fn import_austal(&mut self, file: &AustalFile) -> Result<usize, AustalError> {
        let imported = austal::import_buildings(file, self.view.reference(), self.settings.storey_height())?;
        let count = imported.len();
        self.extend_buildings(imported);
        Ok(count)
    }

    /// Write all buildings into `file` as bounding boxes. An existing `gg`
    /// center is kept, otherwise the project reference becomes the center.
    pub fn export_austal(&self, file: &mut AustalFile) -> Result<(), AustalError> {
        let center = match file.center()? {
            Some(center) => center,
            None => {
                file.set_center(self.view.reference());
                self.view.reference()
            }
        };
        let boxes = austal::export_buildings(&self.buildings, self.view.reference(), center)?;
        file.set_buildings(&boxes);
        Ok(())
    }

    // ========================================================================
    // Selection
    // ========================================================================

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn is_selected(&self, id: &BuildingId) -> bool {
        self.selection.contains(id)
    }

    pub fn select_only(&mut self, id: &BuildingId) -> Result<(), ProjectError> {
        self.building(id).ok_or_else(|| unknown(id))?;
        self.selection.0.clear();
        self.selection.0.insert(id.clone());
        Ok(())
    }

    /// Flip the selection state of one building. Returns the new state.
    pub fn toggle_selected(&mut self, id: &BuildingId) -> Result<bool, ProjectError> {
        self.building(id).ok_or_else(|| unknown(id))?;
        if self.selection.0.remove(id) {
            Ok(false)
        } else {
            self.selection.0.insert(id.clone());
            Ok(true)
        }
    }

    pub fn clear_selection(&mut self) {
        self.selection.0.clear();
    }

    pub fn select_all(&mut self) {
        self.selection.0 = self.buildings.iter().map(|b| b.id().clone()).collect();
    }

    /// Topmost (last drawn) building containing `p`
    pub fn building_at(&self, p: WorldPt) -> Option<&Building> {
        self.buildings.iter().rev().find(|b| b.contains_point(p))
    }

    /// Plain click selects the building under the cursor and deselects the
    /// rest; with `toggle` (Ctrl) only that building flips. A plain click on
    /// empty ground clears the selection.
    pub fn click_select(&mut self, at: ScreenPt, toggle: bool) -> Option<BuildingId> {
        let p = self.view.screen_to_world(at);
        let hit = self.building_at(p).map(|b| b.id().clone());
        match (&hit, toggle) {
            (Some(id), false) => {
                self.selection.0.clear();
                self.selection.0.insert(id.clone());
            }
            (Some(id), true) => {
                if !self.selection.0.remove(id) {
                    self.selection.0.insert(id.clone());
                }
            }
            (None, false) => self.selection.0.clear(),
            (None, true) => {}
        }
        hit
    }

    /// Add every building whose bounding box lies completely inside the
    /// screen rectangle spanned by `from` and `to`. Returns how many were
    /// newly selected.
    pub fn select_in_rect(&mut self, from: ScreenPt, to: ScreenPt) -> usize {
        let rect = BBox::from_corners(self.view.screen_to_world(from), self.view.screen_to_world(to));
        let mut added = 0;
        for b in &self.buildings {
            if rect.contains_bbox(&b.bounding_box()) && self.selection.0.insert(b.id().clone()) {
                added += 1;
            }
        }
        added
    }

    /// A corner handle of a selected building under the cursor
    pub fn pick_selected_corner(&self, at: ScreenPt) -> Option<(BuildingId, usize)> {
        let p = self.view.screen_to_world(at);
        let threshold = self.view.pixels_to_world(defaults::HANDLE_PICK_PX);
        self.buildings
            .iter()
            .filter(|b| self.selection.contains(b.id()))
            .find_map(|b| b.corner_near(p, threshold).map(|c| (b.id().clone(), c)))
    }

    pub fn set_selected_storeys(&mut self, storeys: u32) -> Result<(), ProjectError> {
        let storey_height = Meters::try_non_negative(self.settings.storey_height)
            .map_err(GeometryError::from)?;
        for b in self.buildings.iter_mut().filter(|b| self.selection.contains(b.id())) {
            b.set_storeys(storeys, storey_height)?;
        }
        Ok(())
    }

    pub fn set_selected_height(&mut self, height: Meters) -> Result<(), ProjectError> {
        Meters::try_non_negative(height.raw()).map_err(GeometryError::from)?;
        for b in self.buildings.iter_mut().filter(|b| self.selection.contains(b.id())) {
            b.set_height(height)?;
        }
        Ok(())
    }

    // ========================================================================
    // View
    // ========================================================================

    pub fn snap_engine(&self) -> SnapEngine {
        SnapEngine::from_settings(&self.settings)
    }

    pub fn snap_point(&self, p: WorldPt, exclude: Option<&BuildingId>) -> Snapped {
        self.snap_engine().snap(p, &self.buildings, exclude, &self.view)
    }

    pub fn zoom_step(&mut self, at: ScreenPt, zoom_in: bool) {
        self.view.zoom_step(at, zoom_in, self.settings.zoom_step_factor());
    }

    /// Fit all buildings into the viewport. No-op without buildings.
    pub fn zoom_to_buildings(&mut self) {
        let bounds = self.bounds();
        if !bounds.is_empty() {
            self.view.fit_bounds(&bounds, defaults::FIT_MARGIN_PX);
        }
    }

    // ========================================================================
    // Gestures
    // ========================================================================

    /// First click of the creation gesture; the anchor snaps to nearby corners.
    pub fn begin_creation(&self, at: ScreenPt) -> CreationGesture {
        let p = self.view.screen_to_world(at);
        CreationGesture::start(self.snap_point(p, None).point)
    }

    /// Second click: the gesture becomes a building.
    pub fn finish_creation(&mut self, gesture: CreationGesture) -> Result<BuildingId, ProjectError> {
        let building = gesture.finish(&self.settings)?;
        let id = building.id().clone();
        self.add(building)?;
        Ok(id)
    }

    /// Drag a corner handle to the cursor, snapping to other buildings.
    pub fn drag_corner(
        &mut self,
        id: &BuildingId,
        corner: usize,
        mode: DragMode,
        at: ScreenPt,
    ) -> Result<(), ProjectError> {
        let p = self.view.screen_to_world(at);
        let target = self.snap_point(p, Some(id)).point;
        let building = self.building_mut(id)?;
        match mode {
            DragMode::Resize => building.resize(corner, target)?,
            DragMode::Rotate => building.rotate(corner, target)?,
        }
        Ok(())
    }

    /// Move a building by the cursor motion `from -> to`. The moved anchor
    /// snaps to corners of other buildings.
    pub fn drag_building(
        &mut self,
        id: &BuildingId,
        from: ScreenPt,
        to: ScreenPt,
    ) -> Result<(), ProjectError> {
        let delta = self.view.screen_to_world(to) - self.view.screen_to_world(from);
        let anchor = self.building(id).ok_or_else(|| unknown(id))?.anchor();
        let target = self.snap_point(anchor + delta, Some(id)).point;
        self.building_mut(id)?.translate_to(target)?;
        Ok(())
    }

    /// Pan by a screen-space drag on empty ground.
    pub fn pan(&mut self, from: ScreenPt, to: ScreenPt) {
        self.view.pan_by(to.x - from.x, to.y - from.y);
    }
}
