//! 2D partitions separating the overlapping surfaces of one plane in a leaf.

use crate::classify::Classifier;
use crate::config::BuildConfig;
use crate::error::{BuildError, Capacity};
use crate::geometry::CollisionGeometry;
use crate::provenance::Provenance;
use crate::{Classification, Plane2D, PlaneRef, Projection};

use super::node::{Bsp2dChild, Bsp2dNode};
use super::selector::split_cost;

/// A candidate dividing line and where it sends each surface.
#[derive(Debug, Clone)]
struct LineSplit {
    line: Plane2D,
    back: Vec<usize>,
    front: Vec<usize>,
}

impl LineSplit {
    fn cost(&self) -> usize {
        split_cost(self.back.len(), self.front.len())
    }
}

/// Builds the 2D tree for `surfaces`, which all lie on `plane`.
///
/// Candidate lines run along every projected loop edge. A line is usable
/// only if it leaves neither side holding every surface and puts each
/// surface on at least one side.
pub(crate) fn build_bsp2d(
    geometry: &mut CollisionGeometry,
    provenance: &Provenance,
    config: &BuildConfig,
    plane: PlaneRef,
    surfaces: &[usize],
) -> Result<Bsp2dChild, BuildError> {
    let projection = Projection::for_plane(&geometry.planes[plane.index()], plane);
    build_child(geometry, provenance, config, plane, projection, surfaces)
}

fn build_child(
    geometry: &mut CollisionGeometry,
    provenance: &Provenance,
    config: &BuildConfig,
    plane: PlaneRef,
    projection: Projection,
    surfaces: &[usize],
) -> Result<Bsp2dChild, BuildError> {
    if let [surface] = surfaces {
        return Ok(Bsp2dChild::Surface(*surface));
    }

    let split = {
        let classifier = Classifier::new(geometry, provenance, config);
        best_line(&classifier, geometry, projection, surfaces)
    };
    let Some(split) = split else {
        return Err(BuildError::OverlappingSurfaces {
            plane,
            surfaces: surfaces.to_vec(),
        });
    };

    let index = geometry.bsp2d_nodes.len();
    if index > Bsp2dChild::MAX_INDEX {
        return Err(BuildError::CapacityExceeded {
            kind: Capacity::Bsp2dNodes,
            limit: Bsp2dChild::MAX_INDEX + 1,
        });
    }
    geometry.bsp2d_nodes.push(Bsp2dNode {
        plane: split.line,
        left: Bsp2dChild::Node(index),
        right: Bsp2dChild::Node(index),
    });
    log::trace!(
        "bsp2d node {index}: {} back, {} front of {:?}",
        split.back.len(),
        split.front.len(),
        split.line
    );

    let left = build_child(geometry, provenance, config, plane, projection, &split.back)?;
    let right = build_child(geometry, provenance, config, plane, projection, &split.front)?;
    let node = &mut geometry.bsp2d_nodes[index];
    node.left = left;
    node.right = right;

    Ok(Bsp2dChild::Node(index))
}

fn best_line(
    classifier: &Classifier<'_>,
    geometry: &CollisionGeometry,
    projection: Projection,
    surfaces: &[usize],
) -> Option<LineSplit> {
    let mut best: Option<LineSplit> = None;

    for &source in surfaces {
        for step in geometry.surface_loop(source) {
            let line = Plane2D::through_points(
                projection.project(geometry.vertices[step.from].point),
                projection.project(geometry.vertices[step.to].point),
            );
            let Some(candidate) = classify_group(classifier, line, projection, surfaces) else {
                continue;
            };
            if best.as_ref().is_none_or(|b| candidate.cost() < b.cost()) {
                best = Some(candidate);
            }
        }
    }

    best
}

fn classify_group(
    classifier: &Classifier<'_>,
    line: Plane2D,
    projection: Projection,
    surfaces: &[usize],
) -> Option<LineSplit> {
    let mut split = LineSplit {
        line,
        back: Vec::new(),
        front: Vec::new(),
    };

    for &surface in surfaces {
        match classifier.surface_relationship_2d(surface, &line, projection) {
            Classification::Back => split.back.push(surface),
            Classification::Front => split.front.push(surface),
            Classification::Spanning => {
                split.back.push(surface);
                split.front.push(surface);
            }
            // A surface on neither side would drop out of the 2D tree.
            Classification::Unknown | Classification::Coplanar => return None,
        }
    }

    let count = surfaces.len();
    (split.back.len() < count && split.front.len() < count).then_some(split)
}
