//! Winged-edge collision geometry and the BSP output arrays built over it.
//!
//! Every record refers to others by index into the arrays of one
//! [`CollisionGeometry`]. Each edge borders two surfaces: the left surface
//! walks it `start → end` and continues with `forward_edge`, the right
//! surface walks it `end → start` and continues with `reverse_edge`.

mod mesh;

pub use mesh::MeshBuilder;

use std::collections::BTreeSet;

use bitflags::bitflags;
use nalgebra::Point3;

use crate::bsp::{Bsp2dChild, Bsp2dNode, Bsp2dReference, Bsp3dNode, Leaf, NodeRef};
use crate::error::{BuildError, Capacity};
use crate::{Plane3D, PlaneRef};

/// Sentinel for an index that is not set.
///
/// Only edges synthesized while splitting a surface carry it; they border a
/// single surface and have no twin loop.
pub const INVALID: usize = usize::MAX;

/// A point of the collision mesh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub point: Point3<f32>,
    /// One edge touching this vertex.
    pub first_edge: usize,
}

/// A directed boundary segment shared by two surface loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub start_vertex: usize,
    pub end_vertex: usize,
    /// Next edge around `left_surface`.
    pub forward_edge: usize,
    /// Next edge around `right_surface`.
    pub reverse_edge: usize,
    pub left_surface: usize,
    pub right_surface: usize,
}

impl Edge {
    /// An edge bordering only `surface`, to be linked later.
    pub(crate) fn half(start_vertex: usize, end_vertex: usize, surface: usize) -> Self {
        Self {
            start_vertex,
            end_vertex,
            forward_edge: INVALID,
            reverse_edge: INVALID,
            left_surface: surface,
            right_surface: INVALID,
        }
    }

    /// The edge that follows this one around `surface`.
    #[inline]
    pub fn next_in_loop(&self, surface: usize) -> usize {
        if self.right_surface == surface {
            self.reverse_edge
        } else {
            self.forward_edge
        }
    }

    /// Endpoints of the edge in the winding order of `surface`.
    #[inline]
    pub fn oriented(&self, surface: usize) -> (usize, usize) {
        if self.right_surface == surface {
            (self.end_vertex, self.start_vertex)
        } else {
            (self.start_vertex, self.end_vertex)
        }
    }
}

bitflags! {
    /// Per-surface collision properties.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SurfaceFlags: u8 {
        const TWO_SIDED = 0b0000_0001;
        const INVISIBLE = 0b0000_0010;
        const CLIMBABLE = 0b0000_0100;
        const BREAKABLE = 0b0000_1000;
        const INVALID   = 0b0001_0000;
        const CONVEYOR  = 0b0010_0000;
    }
}

/// A closed polygon bounded by an edge loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Surface {
    /// Supporting plane; flipped when the surface faces the plane's back.
    pub plane: PlaneRef,
    pub first_edge: usize,
    pub material: u16,
    pub breakable_surface: u8,
    pub flags: SurfaceFlags,
}

impl Surface {
    /// A surface on `plane` with no loop yet.
    pub fn new(plane: PlaneRef) -> Self {
        Self {
            plane,
            first_edge: INVALID,
            material: 0,
            breakable_surface: 0,
            flags: SurfaceFlags::empty(),
        }
    }

    #[inline]
    pub fn is_two_sided(&self) -> bool {
        self.flags.contains(SurfaceFlags::TWO_SIDED)
    }
}

/// One step of a surface loop, oriented in the surface's winding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopEdge {
    pub edge: usize,
    pub from: usize,
    pub to: usize,
}

/// Iterator over the edges around one surface.
///
/// Stops after as many steps as there are edges, or at an index out of
/// range, so a corrupt loop cannot spin forever; [`SurfaceLoop::is_closed`]
/// tells whether the walk actually returned to the first edge.
#[derive(Debug, Clone)]
pub struct SurfaceLoop<'a> {
    edges: &'a [Edge],
    surface: usize,
    first: usize,
    current: Option<usize>,
    remaining: usize,
    closed: bool,
}

impl<'a> SurfaceLoop<'a> {
    fn new(edges: &'a [Edge], surface: usize, first: usize) -> Self {
        Self {
            edges,
            surface,
            first,
            current: Some(first),
            remaining: edges.len(),
            closed: false,
        }
    }

    /// Whether the walk has come back around to the first edge.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Iterator for SurfaceLoop<'_> {
    type Item = LoopEdge;

    fn next(&mut self) -> Option<LoopEdge> {
        let index = self.current.take()?;
        let edge = self.edges.get(index)?;
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let (from, to) = edge.oriented(self.surface);
        let next = edge.next_in_loop(self.surface);
        if next == self.first {
            self.closed = true;
        } else {
            self.current = Some(next);
        }
        Some(LoopEdge { edge: index, from, to })
    }
}

/// Array lengths recorded before a split, restored once its subtree is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    pub vertices: usize,
    pub edges: usize,
    pub surfaces: usize,
}

/// The geometry and BSP of one collision slot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollisionGeometry {
    pub vertices: Vec<Vertex>,
    pub edges: Vec<Edge>,
    pub surfaces: Vec<Surface>,
    pub planes: Vec<Plane3D>,
    pub bsp3d_nodes: Vec<Bsp3dNode>,
    pub leaves: Vec<Leaf>,
    pub bsp2d_references: Vec<Bsp2dReference>,
    pub bsp2d_nodes: Vec<Bsp2dNode>,
}

impl CollisionGeometry {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves a plane reference into its (possibly negated) equation.
    ///
    /// # Panics
    /// Panics if the plane index is out of range.
    #[inline]
    pub fn plane_equation(&self, plane: PlaneRef) -> Plane3D {
        plane.apply(&self.planes[plane.index()])
    }

    /// The oriented supporting plane of a surface.
    #[inline]
    pub fn surface_plane(&self, surface: usize) -> Plane3D {
        self.plane_equation(self.surfaces[surface].plane)
    }

    /// Walks the edge loop of `surface` from its first edge.
    pub fn surface_loop(&self, surface: usize) -> SurfaceLoop<'_> {
        SurfaceLoop::new(&self.edges, surface, self.surfaces[surface].first_edge)
    }

    /// Loop vertices of `surface` in winding order.
    pub fn surface_points(&self, surface: usize) -> impl Iterator<Item = Point3<f32>> + '_ {
        self.surface_loop(surface)
            .map(move |step| self.vertices[step.from].point)
    }

    /// Number of edges around `surface`, or `None` if the loop does not close.
    pub fn surface_edge_count(&self, surface: usize) -> Option<usize> {
        let mut walk = self.surface_loop(surface);
        let count = walk.by_ref().count();
        walk.is_closed().then_some(count)
    }

    /// Distance between the endpoints of an edge.
    pub fn edge_length(&self, edge: usize) -> f32 {
        let edge = &self.edges[edge];
        let start = self.vertices[edge.start_vertex].point;
        let end = self.vertices[edge.end_vertex].point;
        (end - start).norm()
    }

    /// Records the current vertex, edge and surface counts.
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            vertices: self.vertices.len(),
            edges: self.edges.len(),
            surfaces: self.surfaces.len(),
        }
    }

    /// Drops every vertex, edge and surface appended since `checkpoint`.
    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        self.vertices.truncate(checkpoint.vertices);
        self.edges.truncate(checkpoint.edges);
        self.surfaces.truncate(checkpoint.surfaces);
    }

    /// Index of a plane matching `plane` (or its negation) within
    /// `tolerance`, appending `plane` if none does.
    pub fn intern_plane(&mut self, plane: Plane3D, tolerance: f32) -> Result<usize, BuildError> {
        let inverse = plane.flipped();
        if let Some(index) = self
            .planes
            .iter()
            .position(|p| p.approx_eq(&plane, tolerance) || p.approx_eq(&inverse, tolerance))
        {
            return Ok(index);
        }
        if self.planes.len() > PlaneRef::MAX_INDEX {
            return Err(BuildError::CapacityExceeded {
                kind: Capacity::Planes,
                limit: PlaneRef::MAX_INDEX + 1,
            });
        }
        self.planes.push(plane);
        Ok(self.planes.len() - 1)
    }

    /// Removes all BSP output, keeping the mesh.
    pub fn clear_bsp(&mut self) {
        self.bsp3d_nodes.clear();
        self.leaves.clear();
        self.bsp2d_references.clear();
        self.bsp2d_nodes.clear();
    }

    /// The 3D nodes in their packed 8-byte form.
    pub fn packed_bsp3d_nodes(&self) -> Vec<u64> {
        self.bsp3d_nodes.iter().map(Bsp3dNode::pack).collect()
    }

    /// Entry point of the 3D tree.
    ///
    /// Nodes are stored in pre-order, so node 0 is the root whenever any node
    /// exists; a tree without nodes is a single leaf, or nothing.
    pub fn root(&self) -> NodeRef {
        if !self.bsp3d_nodes.is_empty() {
            NodeRef::Node(0)
        } else if !self.leaves.is_empty() {
            NodeRef::Leaf(0)
        } else {
            NodeRef::Empty
        }
    }

    /// Descends the 3D tree to the leaf (or empty space) containing `point`.
    ///
    /// Points exactly on a node plane descend to the front.
    pub fn locate(&self, point: Point3<f32>) -> NodeRef {
        let mut current = self.root();
        while let NodeRef::Node(index) = current {
            let Some(node) = self.bsp3d_nodes.get(index) else {
                return NodeRef::Empty;
            };
            let plane = self.plane_equation(node.plane);
            current = if plane.signed_distance(point) >= 0.0 {
                node.front
            } else {
                node.back
            };
        }
        current
    }

    /// Distinct surfaces reachable from a 2D child.
    pub fn bsp2d_surfaces(&self, child: Bsp2dChild) -> BTreeSet<usize> {
        let mut surfaces = BTreeSet::new();
        self.collect_bsp2d_surfaces(child, &mut surfaces);
        surfaces
    }

    fn collect_bsp2d_surfaces(&self, child: Bsp2dChild, surfaces: &mut BTreeSet<usize>) {
        match child {
            Bsp2dChild::Surface(surface) => {
                surfaces.insert(surface);
            }
            Bsp2dChild::Node(index) => {
                if let Some(node) = self.bsp2d_nodes.get(index) {
                    self.collect_bsp2d_surfaces(node.left, surfaces);
                    self.collect_bsp2d_surfaces(node.right, surfaces);
                }
            }
        }
    }

    /// Distinct surfaces referenced by a leaf, in ascending order.
    pub fn leaf_surfaces(&self, leaf: usize) -> Vec<usize> {
        let mut surfaces = BTreeSet::new();
        for reference in self.leaves[leaf].bsp2d_references() {
            self.collect_bsp2d_surfaces(self.bsp2d_references[reference].node, &mut surfaces);
        }
        surfaces.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    fn make_unit_square() -> CollisionGeometry {
        let mut builder = MeshBuilder::new();
        let a = builder.add_vertex(Point3::new(0.0, 0.0, 0.0));
        let b = builder.add_vertex(Point3::new(1.0, 0.0, 0.0));
        let c = builder.add_vertex(Point3::new(1.0, 1.0, 0.0));
        let d = builder.add_vertex(Point3::new(0.0, 1.0, 0.0));
        builder.add_face(&[a, b, c, d]);
        builder.add_face(&[d, c, b, a]);
        builder.build().unwrap()
    }

    #[test]
    fn surface_loop_visits_vertices_in_winding_order() {
        let geometry = make_unit_square();

        let front: Vec<_> = geometry.surface_points(0).collect();
        assert_eq!(front.len(), 4);
        assert_eq!(front[0], Point3::new(0.0, 0.0, 0.0));
        assert_eq!(front[1], Point3::new(1.0, 0.0, 0.0));
        assert_eq!(front[2], Point3::new(1.0, 1.0, 0.0));

        let back: Vec<_> = geometry.surface_points(1).collect();
        assert_eq!(back[0], Point3::new(0.0, 1.0, 0.0));
        assert_eq!(back[1], Point3::new(1.0, 1.0, 0.0));

        assert_eq!(geometry.surface_edge_count(0), Some(4));
        assert_eq!(geometry.surface_edge_count(1), Some(4));
    }

    #[test]
    fn broken_loop_is_not_closed() {
        let mut geometry = make_unit_square();
        let first = geometry.surfaces[0].first_edge;
        let second = geometry.edges[first].next_in_loop(0);
        // Make the second edge loop back onto itself instead of continuing.
        if geometry.edges[second].right_surface == 0 {
            geometry.edges[second].reverse_edge = second;
        } else {
            geometry.edges[second].forward_edge = second;
        }
        assert_eq!(geometry.surface_edge_count(0), None);
    }

    #[test]
    fn checkpoint_rollback_truncates_appended_geometry() {
        let mut geometry = make_unit_square();
        let checkpoint = geometry.checkpoint();

        geometry.vertices.push(Vertex {
            point: Point3::origin(),
            first_edge: INVALID,
        });
        geometry.edges.push(Edge::half(0, 1, 2));
        geometry.surfaces.push(Surface::new(PlaneRef::new(0)));

        geometry.rollback(checkpoint);
        assert_eq!(geometry.checkpoint(), checkpoint);
        assert_eq!(geometry.vertices.len(), 4);
        assert_eq!(geometry.surfaces.len(), 2);
    }

    #[test]
    fn intern_plane_reuses_matching_or_negated_plane() {
        let mut geometry = make_unit_square();
        assert_eq!(geometry.planes.len(), 1);

        let same = Plane3D::new(Vector3::new(0.0, 0.0, 1.0), 0.0005);
        let negated = Plane3D::new(Vector3::new(0.0, 0.0, -1.0), 0.0);
        let other = Plane3D::axis_aligned(0, 0.5);

        assert_eq!(geometry.intern_plane(same, 0.001).unwrap(), 0);
        assert_eq!(geometry.intern_plane(negated, 0.001).unwrap(), 0);
        assert_eq!(geometry.intern_plane(other, 0.001).unwrap(), 1);
        assert_eq!(geometry.planes.len(), 2);
    }

    #[test]
    fn empty_tree_locates_nothing() {
        let geometry = make_unit_square();
        assert_eq!(geometry.root(), NodeRef::Empty);
        assert_eq!(geometry.locate(Point3::new(0.5, 0.5, 1.0)), NodeRef::Empty);
    }

    #[test]
    fn locate_follows_plane_sides() {
        let mut geometry = make_unit_square();
        geometry.leaves.push(Leaf::default());
        geometry.leaves.push(Leaf::default());
        geometry.bsp3d_nodes.push(Bsp3dNode {
            plane: PlaneRef::new(0),
            back: NodeRef::Leaf(0),
            front: NodeRef::Leaf(1),
        });

        assert_eq!(geometry.locate(Point3::new(0.0, 0.0, 2.0)), NodeRef::Leaf(1));
        assert_eq!(geometry.locate(Point3::new(0.0, 0.0, -2.0)), NodeRef::Leaf(0));
        assert_eq!(geometry.packed_bsp3d_nodes().len(), 1);
    }
}
