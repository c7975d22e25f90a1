//! Assembly of winged-edge collision geometry from indexed faces.

use std::collections::HashMap;

use nalgebra::{Point3, Vector3};

use super::{CollisionGeometry, Edge, INVALID, Surface, SurfaceFlags, Vertex};
use crate::config::PLANE_MATCH_TOLERANCE;
use crate::error::MeshError;
use crate::{Plane3D, PlaneRef};

/// Faces whose doubled area falls below this are rejected as degenerate.
const MIN_FACE_AREA: f32 = 1e-6;

#[derive(Debug, Clone)]
struct Face {
    vertices: Vec<usize>,
    flags: SurfaceFlags,
    material: u16,
}

/// Builds a [`CollisionGeometry`] from vertex positions and face loops.
///
/// Faces are wound counter-clockwise when seen from the side their plane
/// faces. Every undirected edge must be shared by exactly two faces with
/// opposite winding, so the result is a closed mesh.
///
/// ```
/// use collision_bsp::MeshBuilder;
/// use nalgebra::Point3;
///
/// let mut builder = MeshBuilder::new();
/// let a = builder.add_vertex(Point3::new(0.0, 0.0, 0.0));
/// let b = builder.add_vertex(Point3::new(1.0, 0.0, 0.0));
/// let c = builder.add_vertex(Point3::new(0.0, 1.0, 0.0));
/// builder.add_face(&[a, b, c]);
/// builder.add_face(&[c, b, a]);
/// let geometry = builder.build().unwrap();
/// assert_eq!(geometry.edges.len(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct MeshBuilder {
    points: Vec<Point3<f32>>,
    faces: Vec<Face>,
    plane_tolerance: f32,
}

impl Default for MeshBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MeshBuilder {
    pub fn new() -> Self {
        Self {
            points: Vec::new(),
            faces: Vec::new(),
            plane_tolerance: PLANE_MATCH_TOLERANCE,
        }
    }

    /// Sets the tolerance under which coplanar faces share a plane record.
    pub fn with_plane_tolerance(mut self, tolerance: f32) -> Self {
        self.plane_tolerance = tolerance;
        self
    }

    /// Adds a vertex and returns its index.
    pub fn add_vertex(&mut self, point: Point3<f32>) -> usize {
        self.points.push(point);
        self.points.len() - 1
    }

    /// Adds a face with default flags and returns its surface index.
    pub fn add_face(&mut self, vertices: &[usize]) -> usize {
        self.add_face_with_flags(vertices, SurfaceFlags::empty())
    }

    /// Adds a face with the given surface flags and returns its surface index.
    pub fn add_face_with_flags(&mut self, vertices: &[usize], flags: SurfaceFlags) -> usize {
        self.faces.push(Face {
            vertices: vertices.to_vec(),
            flags,
            material: 0,
        });
        self.faces.len() - 1
    }

    /// Sets the material index of a previously added face.
    pub fn set_material(&mut self, face: usize, material: u16) {
        if let Some(face) = self.faces.get_mut(face) {
            face.material = material;
        }
    }

    /// Validates the faces and links them into a winged-edge mesh.
    pub fn build(&self) -> Result<CollisionGeometry, MeshError> {
        let mut geometry = CollisionGeometry::new();
        geometry.vertices = self
            .points
            .iter()
            .map(|&point| Vertex {
                point,
                first_edge: INVALID,
            })
            .collect();

        for (index, face) in self.faces.iter().enumerate() {
            let plane = self.face_plane(index, face)?;
            let plane = intern_oriented(&mut geometry.planes, plane, self.plane_tolerance).ok_or(
                MeshError::TooManyPlanes {
                    face: index,
                    limit: PlaneRef::MAX_INDEX + 1,
                },
            )?;
            geometry.surfaces.push(Surface {
                plane,
                first_edge: INVALID,
                material: face.material,
                breakable_surface: 0,
                flags: face.flags,
            });
        }

        // Undirected edge -> edge record
        let mut edge_map: HashMap<(usize, usize), usize> = HashMap::new();
        let mut face_edges: Vec<Vec<usize>> = Vec::with_capacity(self.faces.len());

        for (index, face) in self.faces.iter().enumerate() {
            let count = face.vertices.len();
            let mut loop_edges = Vec::with_capacity(count);
            for i in 0..count {
                let from = face.vertices[i];
                let to = face.vertices[(i + 1) % count];
                let key = (from.min(to), from.max(to));

                let edge = match edge_map.get(&key) {
                    None => {
                        geometry.edges.push(Edge::half(from, to, index));
                        let edge = geometry.edges.len() - 1;
                        edge_map.insert(key, edge);
                        edge
                    }
                    Some(&edge) => {
                        let record = &mut geometry.edges[edge];
                        if record.start_vertex == from {
                            return Err(MeshError::DuplicateEdge {
                                start: from,
                                end: to,
                            });
                        }
                        if record.right_surface != INVALID {
                            return Err(MeshError::NonManifoldEdge {
                                start: from,
                                end: to,
                            });
                        }
                        record.right_surface = index;
                        edge
                    }
                };
                loop_edges.push(edge);
            }
            face_edges.push(loop_edges);
        }

        if let Some(open) = geometry.edges.iter().find(|e| e.right_surface == INVALID) {
            return Err(MeshError::OpenEdge {
                start: open.start_vertex,
                end: open.end_vertex,
            });
        }

        // Link each loop; the face that created an edge walks it forward.
        for (index, loop_edges) in face_edges.iter().enumerate() {
            let vertices = &self.faces[index].vertices;
            for (i, &edge) in loop_edges.iter().enumerate() {
                let next = loop_edges[(i + 1) % loop_edges.len()];
                let record = &mut geometry.edges[edge];
                if record.start_vertex == vertices[i] {
                    record.forward_edge = next;
                } else {
                    record.reverse_edge = next;
                }
            }
            geometry.surfaces[index].first_edge = loop_edges[0];
        }

        for (index, edge) in geometry.edges.iter().enumerate() {
            for vertex in [edge.start_vertex, edge.end_vertex] {
                let vertex = &mut geometry.vertices[vertex];
                if vertex.first_edge == INVALID {
                    vertex.first_edge = index;
                }
            }
        }

        log::debug!(
            "assembled mesh: {} vertices, {} edges, {} surfaces, {} planes",
            geometry.vertices.len(),
            geometry.edges.len(),
            geometry.surfaces.len(),
            geometry.planes.len()
        );
        Ok(geometry)
    }

    /// Supporting plane of a face from its Newell normal.
    fn face_plane(&self, index: usize, face: &Face) -> Result<Plane3D, MeshError> {
        if face.vertices.len() < 3 {
            return Err(MeshError::TooFewVertices { face: index });
        }
        if let Some(&vertex) = face.vertices.iter().find(|&&v| v >= self.points.len()) {
            return Err(MeshError::VertexOutOfRange {
                face: index,
                vertex,
            });
        }

        let count = face.vertices.len();
        let origin = self.points[face.vertices[0]];
        let mut normal = Vector3::zeros();
        for i in 0..count {
            let from = face.vertices[i];
            let to = face.vertices[(i + 1) % count];
            if from == to {
                return Err(MeshError::DegenerateFace { face: index });
            }
            normal += (self.points[from] - origin).cross(&(self.points[to] - origin));
        }

        if normal.norm() < MIN_FACE_AREA {
            return Err(MeshError::DegenerateFace { face: index });
        }
        Plane3D::from_point_and_normal(origin, normal)
            .ok_or(MeshError::DegenerateFace { face: index })
    }
}

/// Reference to a plane in `planes` matching `plane` in either orientation,
/// appending it when none does.
///
/// Returns `None` if appending would overflow the packed plane index.
fn intern_oriented(
    planes: &mut Vec<Plane3D>,
    plane: Plane3D,
    tolerance: f32,
) -> Option<PlaneRef> {
    let inverse = plane.flipped();
    for (index, existing) in planes.iter().enumerate() {
        if existing.approx_eq(&plane, tolerance) {
            return Some(PlaneRef::new(index));
        }
        if existing.approx_eq(&inverse, tolerance) {
            return Some(PlaneRef::flipped(index));
        }
    }
    if planes.len() > PlaneRef::MAX_INDEX {
        return None;
    }
    planes.push(plane);
    Some(PlaneRef::new(planes.len() - 1))
}
