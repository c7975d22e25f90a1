//! Topology checks run on collision geometry before a rebuild touches it.

use crate::config::BuildConfig;
use crate::error::{GeometryError, LoopDirection};
use crate::geometry::CollisionGeometry;

/// Checks that `geometry` is a well-formed winged-edge mesh.
///
/// Edges are checked in order, then surfaces; the first failure is returned.
pub fn verify_geometry(
    geometry: &CollisionGeometry,
    config: &BuildConfig,
) -> Result<(), GeometryError> {
    if geometry.edges.is_empty() || geometry.surfaces.is_empty() {
        return Err(GeometryError::Empty);
    }

    for index in 0..geometry.edges.len() {
        verify_edge(geometry, config, index)?;
    }

    for index in 0..geometry.surfaces.len() {
        verify_surface(geometry, config, index)?;
    }

    Ok(())
}

fn verify_edge(
    geometry: &CollisionGeometry,
    config: &BuildConfig,
    index: usize,
) -> Result<(), GeometryError> {
    let edge = &geometry.edges[index];
    let vertex_count = geometry.vertices.len();
    let edge_count = geometry.edges.len();
    let surface_count = geometry.surfaces.len();

    if edge.start_vertex >= vertex_count {
        return Err(GeometryError::BadStartVertex { edge: index });
    }
    if edge.end_vertex >= vertex_count {
        return Err(GeometryError::BadEndVertex { edge: index });
    }
    if edge.start_vertex == edge.end_vertex {
        return Err(GeometryError::SingleVertex { edge: index });
    }

    let length = geometry.edge_length(index);
    if length < config.min_edge_length {
        return Err(GeometryError::ShortEdge { edge: index, length });
    }

    if edge.forward_edge >= edge_count {
        return Err(GeometryError::BadForwardEdge { edge: index });
    }
    if edge.reverse_edge >= edge_count {
        return Err(GeometryError::BadReverseEdge { edge: index });
    }
    if edge.forward_edge == index || edge.reverse_edge == index {
        return Err(GeometryError::SelfReference { edge: index });
    }
    if edge.forward_edge == edge.reverse_edge {
        return Err(GeometryError::SingleNeighbor { edge: index });
    }

    for direction in [LoopDirection::Forward, LoopDirection::Reverse] {
        let (next, vertex, surface) = match direction {
            LoopDirection::Forward => (edge.forward_edge, edge.end_vertex, edge.left_surface),
            LoopDirection::Reverse => (edge.reverse_edge, edge.start_vertex, edge.right_surface),
        };
        let next = &geometry.edges[next];
        let continues_left = next.start_vertex == vertex && next.left_surface == surface;
        let continues_right = next.end_vertex == vertex && next.right_surface == surface;
        if !continues_left && !continues_right {
            return Err(GeometryError::BrokenLoop { edge: index, direction });
        }
    }

    if edge.left_surface >= surface_count {
        return Err(GeometryError::BadLeftSurface { edge: index });
    }
    if edge.right_surface >= surface_count {
        return Err(GeometryError::BadRightSurface { edge: index });
    }
    if edge.left_surface == edge.right_surface {
        return Err(GeometryError::SingleSurface { edge: index });
    }

    Ok(())
}

fn verify_surface(
    geometry: &CollisionGeometry,
    config: &BuildConfig,
    index: usize,
) -> Result<(), GeometryError> {
    let surface = &geometry.surfaces[index];

    if surface.plane.index() >= geometry.planes.len() {
        return Err(GeometryError::BadPlane { surface: index });
    }
    if surface.first_edge >= geometry.edges.len() {
        return Err(GeometryError::BadFirstEdge { surface: index });
    }

    let count = geometry
        .surface_edge_count(index)
        .ok_or(GeometryError::OpenLoop { surface: index })?;
    if count > config.max_surface_edges {
        return Err(GeometryError::TooManyEdges { surface: index, count });
    }

    Ok(())
}
