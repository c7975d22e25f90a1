//! Cutting a surface of the winged-edge mesh in two along a plane.

use crate::classify::Classifier;
use crate::config::BuildConfig;
use crate::error::TopologyError;
use crate::geometry::{CollisionGeometry, Edge, INVALID, LoopEdge, Surface, Vertex};
use crate::provenance::Provenance;
use crate::PlaneSide;

/// The two surfaces produced by [`split_surface`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitSurfaces {
    /// Part behind the plane.
    pub back: usize,
    /// Part in front of (or on) the plane.
    pub front: usize,
}

/// Edge shared by both children, opened at the first crossing and closed at
/// the second.
#[derive(Debug, Clone, Copy)]
struct DividingEdge {
    edge: usize,
    closed: bool,
}

/// Cuts `surface` with plane record `plane_index`, appending two child
/// surfaces with their own edge loops.
///
/// Walks the parent loop in winding order. An edge whose endpoints lie
/// strictly on opposite sides gains an intersection vertex and becomes two
/// half edges; the two crossings are joined by a new dividing edge that is
/// the only edge bordering both children. Other edges are copied onto the
/// side they lie on. The parent is left untouched so rolling back the
/// appended records restores the mesh exactly.
///
/// The caller must ensure the surface spans the plane.
pub fn split_surface(
    geometry: &mut CollisionGeometry,
    provenance: &mut Provenance,
    config: &BuildConfig,
    surface: usize,
    plane_index: usize,
) -> Result<SplitSurfaces, TopologyError> {
    let plane = geometry.planes[plane_index];
    let parent = geometry.surfaces[surface];

    let steps: Vec<LoopEdge> = {
        let mut walk = geometry.surface_loop(surface);
        let steps = walk.by_ref().collect();
        if !walk.is_closed() {
            return Err(TopologyError::OpenLoop { surface });
        }
        steps
    };

    let sides: Vec<(PlaneSide, PlaneSide)> = {
        let classifier = Classifier::new(geometry, provenance, config);
        steps
            .iter()
            .map(|step| {
                let a = geometry.vertices[step.from].point;
                let b = geometry.vertices[step.to].point;
                (
                    classifier.vertex_relationship(a, &plane),
                    classifier.vertex_relationship(b, &plane),
                )
            })
            .collect()
    };

    let back = geometry.surfaces.len();
    let front = back + 1;
    for _ in 0..2 {
        geometry.surfaces.push(Surface {
            first_edge: INVALID,
            ..parent
        });
    }
    let child = |side: PlaneSide| if side == PlaneSide::Back { back } else { front };

    let mut dividing: Option<DividingEdge> = None;
    let mut first_new: Option<usize> = None;
    let mut previous: Option<usize> = None;

    for (step, &(side_a, side_b)) in steps.iter().zip(&sides) {
        let crosses = matches!(
            (side_a, side_b),
            (PlaneSide::Front, PlaneSide::Back) | (PlaneSide::Back, PlaneSide::Front)
        );

        if crosses {
            let a = geometry.vertices[step.from].point;
            let b = geometry.vertices[step.to].point;
            let vertex = geometry.vertices.len();
            let edge_a = geometry.edges.len();
            let edge_b = edge_a + 1;
            geometry.vertices.push(Vertex {
                point: plane.segment_intersection(a, b),
                first_edge: edge_a,
            });
            geometry.edges.push(Edge::half(step.from, vertex, child(side_a)));
            geometry.edges.push(Edge::half(vertex, step.to, child(side_b)));

            let divider = match dividing {
                None => {
                    let divider = geometry.edges.len();
                    geometry.edges.push(Edge {
                        start_vertex: vertex,
                        end_vertex: INVALID,
                        forward_edge: INVALID,
                        reverse_edge: edge_b,
                        left_surface: child(side_a),
                        right_surface: child(side_b),
                    });
                    dividing = Some(DividingEdge {
                        edge: divider,
                        closed: false,
                    });
                    divider
                }
                Some(ref mut open) => {
                    close_dividing_edge(geometry, open, vertex, edge_b, surface)?;
                    open.edge
                }
            };
            geometry.edges[edge_a].forward_edge = divider;

            first_new.get_or_insert(edge_a);
            if let Some(prev) = previous {
                geometry.edges[prev].forward_edge = edge_a;
            }
            previous = Some(edge_b);
        } else if side_a != PlaneSide::OnPlane || side_b == PlaneSide::OnPlane {
            let owner = if side_a == PlaneSide::Back || side_b == PlaneSide::Back {
                back
            } else {
                front
            };
            let copy = geometry.edges.len();
            geometry.edges.push(Edge::half(step.from, step.to, owner));

            first_new.get_or_insert(copy);
            if let Some(prev) = previous {
                geometry.edges[prev].forward_edge = copy;
            }
            previous = Some(copy);
        } else {
            // The loop leaves the plane at A.
            let copy = geometry.edges.len();
            geometry.edges.push(Edge::half(step.from, step.to, child(side_b)));

            let divider = match dividing {
                None => {
                    let divider = geometry.edges.len();
                    let (left, right) = if side_b == PlaneSide::Back {
                        (front, back)
                    } else {
                        (back, front)
                    };
                    geometry.edges.push(Edge {
                        start_vertex: step.from,
                        end_vertex: INVALID,
                        forward_edge: INVALID,
                        reverse_edge: copy,
                        left_surface: left,
                        right_surface: right,
                    });
                    dividing = Some(DividingEdge {
                        edge: divider,
                        closed: false,
                    });
                    divider
                }
                Some(ref mut open) => {
                    close_dividing_edge(geometry, open, step.from, copy, surface)?;
                    open.edge
                }
            };

            first_new.get_or_insert(divider);
            if let Some(prev) = previous {
                geometry.edges[prev].forward_edge = divider;
            }
            previous = Some(copy);
        }
    }

    let (Some(first_new), Some(last)) = (first_new, previous) else {
        return Err(TopologyError::NoNewEdges { surface });
    };
    let Some(dividing) = dividing else {
        return Err(TopologyError::MissingDividingEdge { surface });
    };
    if !dividing.closed {
        return Err(TopologyError::UnclosedDividingEdge { surface });
    }
    geometry.edges[last].forward_edge = first_new;

    for child in [back, front] {
        geometry.surfaces[child].first_edge = dividing.edge;
        provenance.record(child, surface);
    }

    log::trace!("split surface {surface} into {back} (back) and {front} (front)");
    Ok(SplitSurfaces { back, front })
}

fn close_dividing_edge(
    geometry: &mut CollisionGeometry,
    dividing: &mut DividingEdge,
    vertex: usize,
    next: usize,
    surface: usize,
) -> Result<(), TopologyError> {
    let edge = &mut geometry.edges[dividing.edge];
    if dividing.closed || edge.end_vertex != INVALID || edge.forward_edge != INVALID {
        return Err(TopologyError::DividingEdgeReclosed { surface });
    }
    edge.end_vertex = vertex;
    edge.forward_edge = next;
    dividing.closed = true;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::MeshBuilder;
    use crate::Plane3D;
    use nalgebra::Point3;

    /// A unit square in the z = 0 plane and its back face.
    fn make_square() -> CollisionGeometry {
        let mut builder = MeshBuilder::new();
        let a = builder.add_vertex(Point3::new(0.0, 0.0, 0.0));
        let b = builder.add_vertex(Point3::new(1.0, 0.0, 0.0));
        let c = builder.add_vertex(Point3::new(1.0, 1.0, 0.0));
        let d = builder.add_vertex(Point3::new(0.0, 1.0, 0.0));
        builder.add_face(&[a, b, c, d]);
        builder.add_face(&[d, c, b, a]);
        builder.build().unwrap()
    }

    fn split_with(geometry: &mut CollisionGeometry, plane: Plane3D) -> (SplitSurfaces, Provenance) {
        geometry.planes.push(plane);
        let plane_index = geometry.planes.len() - 1;
        let mut provenance = Provenance::new();
        let split =
            split_surface(geometry, &mut provenance, &BuildConfig::default(), 0, plane_index)
                .unwrap();
        (split, provenance)
    }

    #[test]
    fn midpoint_cut_yields_two_quads() {
        let mut geometry = make_square();
        let plane = Plane3D::axis_aligned(0, 0.5);
        let (split, provenance) = split_with(&mut geometry, plane);

        assert_eq!(geometry.surface_edge_count(split.back), Some(4));
        assert_eq!(geometry.surface_edge_count(split.front), Some(4));
        assert_eq!(provenance.parent(split.back), Some(0));
        assert_eq!(provenance.parent(split.front), Some(0));

        // Two intersection vertices, both on the plane.
        assert_eq!(geometry.vertices.len(), 6);
        for vertex in &geometry.vertices[4..] {
            assert!(plane.signed_distance(vertex.point).abs() < 1e-6);
        }

        for point in geometry.surface_points(split.back) {
            assert!(point.x <= 0.5 + 1e-6);
        }
        for point in geometry.surface_points(split.front) {
            assert!(point.x >= 0.5 - 1e-6);
        }
    }

    #[test]
    fn dividing_edge_borders_both_children() {
        let mut geometry = make_square();
        let (split, _) = split_with(&mut geometry, Plane3D::axis_aligned(1, 0.5));

        let dividing = geometry.surfaces[split.back].first_edge;
        assert_eq!(dividing, geometry.surfaces[split.front].first_edge);
        let edge = geometry.edges[dividing];
        let mut borders = [edge.left_surface, edge.right_surface];
        borders.sort();
        assert_eq!(borders, [split.back, split.front]);

        let shared = geometry.edges[4..]
            .iter()
            .filter(|e| e.right_surface != INVALID)
            .count();
        assert_eq!(shared, 1);
    }

    #[test]
    fn corner_cut_yields_triangle_and_pentagon() {
        let mut geometry = make_square();
        // x + y = 0.5 cuts off the corner at the origin.
        let plane = Plane3D::new(nalgebra::Vector3::new(1.0, 1.0, 0.0), 0.5);
        let (split, _) = split_with(&mut geometry, plane);

        assert_eq!(geometry.surface_edge_count(split.back), Some(3));
        assert_eq!(geometry.surface_edge_count(split.front), Some(5));
    }

    #[test]
    fn cut_through_vertices_reuses_them() {
        let mut geometry = make_square();
        // The diagonal through (1, 0) and (0, 1).
        let plane = Plane3D::new(nalgebra::Vector3::new(1.0, 1.0, 0.0), 1.0);
        let (split, _) = split_with(&mut geometry, plane);

        assert_eq!(geometry.vertices.len(), 4);
        assert_eq!(geometry.surface_edge_count(split.back), Some(3));
        assert_eq!(geometry.surface_edge_count(split.front), Some(3));
    }

    #[test]
    fn children_copy_parent_properties() {
        let mut geometry = make_square();
        geometry.surfaces[0].material = 7;
        geometry.surfaces[0].breakable_surface = 3;
        let (split, _) = split_with(&mut geometry, Plane3D::axis_aligned(0, 0.25));

        for child in [split.back, split.front] {
            let surface = geometry.surfaces[child];
            assert_eq!(surface.material, 7);
            assert_eq!(surface.breakable_surface, 3);
            assert_eq!(surface.plane, geometry.surfaces[0].plane);
        }
    }

    #[test]
    fn rollback_restores_mesh() {
        let mut geometry = make_square();
        geometry.planes.push(Plane3D::axis_aligned(0, 0.5));
        let original = geometry.clone();
        let checkpoint = geometry.checkpoint();

        let mut provenance = Provenance::new();
        let plane_index = geometry.planes.len() - 1;
        split_surface(&mut geometry, &mut provenance, &BuildConfig::default(), 0, plane_index)
            .unwrap();
        geometry.rollback(checkpoint);
        provenance.truncate(checkpoint.surfaces);

        assert_eq!(geometry, original);
        assert!(provenance.is_empty());
    }
}
