//! Tolerances and thresholds used while rebuilding a collision BSP.

/// Points within this distance of a plane are considered "on" the plane.
pub const VERTEX_EPSILON: f32 = 0.000_244_140_625;

/// Points within this distance of a 2D dividing line are considered on the line.
pub const LINE_EPSILON: f32 = 0.000_122_070_312_5;

/// Shortest edge accepted by the geometry verifier.
pub const MIN_EDGE_LENGTH: f32 = 0.001;

/// Longest surface loop accepted by the geometry verifier.
pub const MAX_SURFACE_EDGES: usize = 8;

/// Per-component tolerance when matching a generated plane against the plane table.
pub const PLANE_MATCH_TOLERANCE: f32 = 0.001;

/// Below this many free surfaces, every surface plane is tried as a splitter.
pub const EXHAUSTIVE_SEARCH_LIMIT: usize = 1024;

/// Settings for a BSP rebuild.
///
/// The defaults reproduce the tolerances the collision format was authored
/// against; changing them is mostly useful for tests and for unusually
/// scaled geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildConfig {
    /// Half-width of the "on plane" window for 3D vertex classification.
    pub vertex_epsilon: f32,
    /// Half-width of the "on line" window for 2D vertex classification.
    pub line_epsilon: f32,
    /// Minimum edge length accepted by the verifier.
    pub min_edge_length: f32,
    /// Maximum number of edges around a single surface.
    pub max_surface_edges: usize,
    /// Tolerance used to reuse an existing plane instead of appending one.
    pub plane_match_tolerance: f32,
    /// Free-surface count at which plane selection switches to the axis sweep.
    pub exhaustive_search_limit: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            vertex_epsilon: VERTEX_EPSILON,
            line_epsilon: LINE_EPSILON,
            min_edge_length: MIN_EDGE_LENGTH,
            max_surface_edges: MAX_SURFACE_EDGES,
            plane_match_tolerance: PLANE_MATCH_TOLERANCE,
            exhaustive_search_limit: EXHAUSTIVE_SEARCH_LIMIT,
        }
    }
}

impl BuildConfig {
    /// Creates a configuration with the default tolerances.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the 3D "on plane" window.
    pub fn with_vertex_epsilon(mut self, epsilon: f32) -> Self {
        self.vertex_epsilon = epsilon;
        self
    }

    /// Sets the 2D "on line" window.
    pub fn with_line_epsilon(mut self, epsilon: f32) -> Self {
        self.line_epsilon = epsilon;
        self
    }

    /// Sets the shortest edge accepted by the verifier.
    pub fn with_min_edge_length(mut self, length: f32) -> Self {
        self.min_edge_length = length;
        self
    }

    /// Sets the longest surface loop accepted by the verifier.
    pub fn with_max_surface_edges(mut self, count: usize) -> Self {
        self.max_surface_edges = count;
        self
    }

    /// Sets the plane reuse tolerance.
    pub fn with_plane_match_tolerance(mut self, tolerance: f32) -> Self {
        self.plane_match_tolerance = tolerance;
        self
    }

    /// Sets the free-surface count at which the axis sweep takes over.
    pub fn with_exhaustive_search_limit(mut self, limit: usize) -> Self {
        self.exhaustive_search_limit = limit;
        self
    }
}
