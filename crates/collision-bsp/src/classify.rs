//! Classification of vertices and surfaces against splitting planes.

use nalgebra::{Point3, Vector3};

use crate::config::BuildConfig;
use crate::geometry::CollisionGeometry;
use crate::provenance::Provenance;
use crate::{Classification, Plane2D, Plane3D, PlaneSide, Projection};

/// Read-only view used to classify geometry during a build.
#[derive(Debug, Clone, Copy)]
pub struct Classifier<'a> {
    geometry: &'a CollisionGeometry,
    provenance: &'a Provenance,
    config: &'a BuildConfig,
}

impl<'a> Classifier<'a> {
    pub fn new(
        geometry: &'a CollisionGeometry,
        provenance: &'a Provenance,
        config: &'a BuildConfig,
    ) -> Self {
        Self {
            geometry,
            provenance,
            config,
        }
    }

    /// Side of `plane` a point lies on, with the configured "on plane" window.
    #[inline]
    pub fn vertex_relationship(&self, point: Point3<f32>, plane: &Plane3D) -> PlaneSide {
        plane.classify_point_with_epsilon(point, self.config.vertex_epsilon)
    }

    /// Classifies a surface against the plane record `plane_index`.
    ///
    /// Surfaces supported by that record are `Coplanar`. A split surface with
    /// no vertex decisively off the plane takes the first decisive answer of
    /// its ancestors, or `Unknown` if none has one.
    pub fn surface_relationship(&self, surface: usize, plane_index: usize) -> Classification {
        let plane = self.geometry.planes[plane_index];
        let relationship = self.loop_relationship(surface, plane_index, &plane);
        if relationship != Classification::Unknown {
            return relationship;
        }

        for ancestor in self.provenance.ancestors(surface) {
            let inherited = self.loop_relationship(ancestor, plane_index, &plane);
            if matches!(inherited, Classification::Front | Classification::Back) {
                log::trace!("surface {surface} takes {inherited:?} from ancestor {ancestor}");
                return inherited;
            }
        }
        Classification::Unknown
    }

    fn loop_relationship(
        &self,
        surface: usize,
        plane_index: usize,
        plane: &Plane3D,
    ) -> Classification {
        if self.geometry.surfaces[surface].plane.index() == plane_index {
            return Classification::Coplanar;
        }

        let mut relationship = Classification::Unknown;
        for point in self.geometry.surface_points(surface) {
            relationship = relationship.with_side(self.vertex_relationship(point, plane));
            if relationship == Classification::Spanning {
                break;
            }
        }
        relationship
    }

    /// Classifies a surface's projected loop against a 2D line.
    ///
    /// Never returns `Coplanar`; a loop entirely on the line is `Unknown`.
    pub fn surface_relationship_2d(
        &self,
        surface: usize,
        line: &Plane2D,
        projection: Projection,
    ) -> Classification {
        let mut relationship = Classification::Unknown;
        for point in self.geometry.surface_points(surface) {
            let projected = projection.project(point);
            let side = line.classify_point_with_epsilon(projected, self.config.line_epsilon);
            relationship = relationship.with_side(side);
            if relationship == Classification::Spanning {
                break;
            }
        }
        if relationship == Classification::Unknown {
            log::warn!("surface {surface} has no vertex off line {line:?}, possible T-junction");
        }
        relationship
    }

    /// Twice the area of a surface projected on its own oriented plane.
    ///
    /// Loops wound against their plane count as zero.
    pub fn surface_plane_fit(&self, surface: usize) -> f64 {
        let normal = self.geometry.surface_plane(surface).normal().cast::<f64>();
        let mut points = self.geometry.surface_points(surface).map(|p| p.cast::<f64>());
        let Some(first) = points.next() else {
            return 0.0;
        };

        let mut fit = 0.0;
        let mut previous = first;
        for point in points.chain(std::iter::once(first)) {
            let cross: Vector3<f64> = (previous - first).cross(&(point - first));
            fit += normal.dot(&cross);
            previous = point;
        }
        fit.max(0.0)
    }

    /// Whether every listed surface lies behind or on every other's plane.
    ///
    /// Such a set bounds a single convex cell.
    pub fn encloses_convex_cell(&self, surfaces: &[usize]) -> bool {
        surfaces.iter().all(|&outer| {
            let plane = self.geometry.surface_plane(outer);
            surfaces
                .iter()
                .filter(|&&inner| inner != outer)
                .all(|&inner| {
                    self.geometry
                        .surface_points(inner)
                        .all(|p| self.vertex_relationship(p, &plane) != PlaneSide::Front)
                })
        })
    }
}
