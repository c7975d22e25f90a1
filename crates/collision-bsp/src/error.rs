//! Error types for verification, mesh assembly and BSP construction.

use thiserror::Error;

use crate::PlaneRef;

/// Which side of an edge's loop a traversal check failed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopDirection {
    /// The loop of the edge's left surface, continued via `forward_edge`.
    Forward,
    /// The loop of the edge's right surface, continued via `reverse_edge`.
    Reverse,
}

impl std::fmt::Display for LoopDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoopDirection::Forward => f.write_str("forward"),
            LoopDirection::Reverse => f.write_str("reverse"),
        }
    }
}

/// Malformed input geometry, reported by [`verify_geometry`](crate::verify_geometry).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("collision geometry has no edges or no surfaces")]
    Empty,

    #[error("edge {edge} has a bad start vertex index")]
    BadStartVertex { edge: usize },

    #[error("edge {edge} has a bad end vertex index")]
    BadEndVertex { edge: usize },

    #[error("edge {edge} references only one vertex")]
    SingleVertex { edge: usize },

    #[error("edge {edge} is too short ({length})")]
    ShortEdge { edge: usize, length: f32 },

    #[error("edge {edge} has a bad forward edge index")]
    BadForwardEdge { edge: usize },

    #[error("edge {edge} has a bad reverse edge index")]
    BadReverseEdge { edge: usize },

    #[error("edge {edge} references itself")]
    SelfReference { edge: usize },

    #[error("edge {edge} references only one edge")]
    SingleNeighbor { edge: usize },

    #[error("edge {edge} doesn't share a vertex or surface with its {direction} edge")]
    BrokenLoop { edge: usize, direction: LoopDirection },

    #[error("edge {edge} has a bad left surface index")]
    BadLeftSurface { edge: usize },

    #[error("edge {edge} has a bad right surface index")]
    BadRightSurface { edge: usize },

    #[error("edge {edge} references only one surface")]
    SingleSurface { edge: usize },

    #[error("surface {surface} has a bad first edge index")]
    BadFirstEdge { surface: usize },

    #[error("surface {surface} edge loop never returns to its first edge")]
    OpenLoop { surface: usize },

    #[error("surface {surface} has too many edges ({count})")]
    TooManyEdges { surface: usize, count: usize },

    #[error("surface {surface} has a bad plane index")]
    BadPlane { surface: usize },
}

/// Problems assembling a [`CollisionGeometry`](crate::CollisionGeometry) from faces.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MeshError {
    #[error("face {face} has fewer than three vertices")]
    TooFewVertices { face: usize },

    #[error("face {face} references missing vertex {vertex}")]
    VertexOutOfRange { face: usize, vertex: usize },

    #[error("face {face} has zero area")]
    DegenerateFace { face: usize },

    #[error("edge {start}->{end} is used twice with the same winding")]
    DuplicateEdge { start: usize, end: usize },

    #[error("edge {start}->{end} is shared by more than two faces")]
    NonManifoldEdge { start: usize, end: usize },

    #[error("edge {start}->{end} borders only one face")]
    OpenEdge { start: usize, end: usize },

    #[error("face {face} needs a plane beyond the limit of {limit}")]
    TooManyPlanes { face: usize, limit: usize },
}

/// A loop invariant broken while cutting a surface.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TopologyError {
    #[error("dividing edge of surface {surface} was closed twice")]
    DividingEdgeReclosed { surface: usize },

    #[error("dividing edge of surface {surface} was never created")]
    MissingDividingEdge { surface: usize },

    #[error("dividing edge of surface {surface} was never closed")]
    UnclosedDividingEdge { surface: usize },

    #[error("splitting surface {surface} produced no edges")]
    NoNewEdges { surface: usize },

    #[error("surface {surface} loop does not close")]
    OpenLoop { surface: usize },
}

/// What ran out of room in the packed output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capacity {
    Planes,
    Bsp3dNodes,
    Leaves,
    Bsp2dNodes,
    Surfaces,
}

impl std::fmt::Display for Capacity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Capacity::Planes => "planes",
            Capacity::Bsp3dNodes => "bsp3d nodes",
            Capacity::Leaves => "leaves",
            Capacity::Bsp2dNodes => "bsp2d nodes",
            Capacity::Surfaces => "surfaces",
        };
        f.write_str(name)
    }
}

/// A failed BSP rebuild. The slot being rebuilt is left untouched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuildError {
    #[error("failed to verify collision geometry: {0}")]
    InvalidGeometry(#[from] GeometryError),

    #[error("failed to split surface: {0}")]
    Topology(#[from] TopologyError),

    #[error("tried to build a leaf while {free} surfaces are still free")]
    Undecidable { free: usize },

    #[error("no splitting plane could be chosen for {free} free surfaces")]
    NoSplittingPlane { free: usize },

    #[error("overlapping surfaces {surfaces:?} on plane {plane:?} cannot be separated")]
    OverlappingSurfaces { plane: PlaneRef, surfaces: Vec<usize> },

    #[error("too many {kind} for the collision format (limit {limit})")]
    CapacityExceeded { kind: Capacity, limit: usize },
}
