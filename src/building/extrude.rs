//! LoD1 block model of a building: its footprint extruded to its height.

use glam::{DVec3, dvec3};

use crate::types::{Meters, WorldPt};

/// A closed prism over a footprint ring.
///
/// Vertices `0..n` are the ground ring and `n..2n` the roof ring, both in
/// footprint order. Every face is listed counter-clockwise as seen from
/// outside the solid.
#[derive(Debug, Clone, PartialEq)]
pub struct Prism {
    pub vertices: Vec<DVec3>,
    pub faces: Vec<Vec<usize>>,
}

impl Prism {
    /// `ring` must be counter-clockwise when seen from above.
    pub fn extrude(ring: &[WorldPt], height: Meters) -> Self {
        let n = ring.len();
        let mut vertices = Vec::with_capacity(2 * n);
        for z in [0.0, height.raw()] {
            vertices.extend(ring.iter().map(|p| dvec3(p.x.raw(), p.y.raw(), z)));
        }

        let mut faces = Vec::with_capacity(n + 2);
        // ground faces down, so walk the ring backwards
        faces.push(std::iter::once(0).chain((1..n).rev()).collect());
        faces.push((n..2 * n).collect());
        for i in 0..n {
            let j = (i + 1) % n;
            faces.push(vec![i, j, j + n, i + n]);
        }
        Self { vertices, faces }
    }

    pub fn ground(&self) -> &[usize] {
        &self.faces[0]
    }

    pub fn roof(&self) -> &[usize] {
        &self.faces[1]
    }

    pub fn walls(&self) -> &[Vec<usize>] {
        &self.faces[2..]
    }
}
