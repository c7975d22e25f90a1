//! Collision BSP (Binary Space Partitioning) rebuilding for winged-edge meshes.
//!
//! A [`CollisionGeometry`] holds one closed mesh as vertex, edge, surface and
//! plane arrays, together with the BSP built over it. [`rebuild`] verifies
//! the mesh and replaces the BSP arrays with a freshly built tree; a
//! [`MeshBuilder`] assembles valid geometry from plain face lists.

pub mod bsp;
pub mod classify;
mod config;
mod error;
pub mod geometry;
mod plane;
pub mod provenance;
pub mod split;
mod verify;

pub use bsp::{BspBuilder, BspVisitor, NodeRef, rebuild, rebuild_in_place};
pub use config::{
    BuildConfig, EXHAUSTIVE_SEARCH_LIMIT, LINE_EPSILON, MAX_SURFACE_EDGES, MIN_EDGE_LENGTH,
    PLANE_MATCH_TOLERANCE, VERTEX_EPSILON,
};
pub use error::{BuildError, Capacity, GeometryError, LoopDirection, MeshError, TopologyError};
pub use geometry::{CollisionGeometry, Edge, INVALID, MeshBuilder, Surface, SurfaceFlags, Vertex};
pub use plane::{Classification, Plane2D, Plane3D, PlaneRef, PlaneSide, Projection};
pub use verify::verify_geometry;
