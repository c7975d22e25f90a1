//! Plane and line representations used to partition collision geometry.

use nalgebra::{Point2, Point3, Vector2, Vector3};

use crate::config::VERTEX_EPSILON;

/// Which side of a plane a point lies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneSide {
    /// Point is in front of the plane (positive side of normal)
    Front,
    /// Point is behind the plane (negative side of normal)
    Back,
    /// Point lies on the plane (within epsilon tolerance)
    OnPlane,
}

/// Classification of a surface (or a set of vertices) relative to a plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// No vertex was decisively on either side and the surface is not
    /// supported by the plane.
    Unknown,
    /// All decisive vertices are behind the plane
    Back,
    /// All decisive vertices are in front of the plane
    Front,
    /// Vertices are on both sides (spans the plane)
    Spanning,
    /// The surface is supported by the plane itself.
    Coplanar,
}

impl Classification {
    /// Folds one more vertex side into the classification.
    ///
    /// `OnPlane` vertices never change the result.
    #[inline]
    pub fn with_side(self, side: PlaneSide) -> Self {
        match (self, side) {
            (current, PlaneSide::OnPlane) => current,
            (Classification::Unknown, PlaneSide::Back) => Classification::Back,
            (Classification::Unknown, PlaneSide::Front) => Classification::Front,
            (Classification::Back, PlaneSide::Front) | (Classification::Front, PlaneSide::Back) => {
                Classification::Spanning
            }
            (current, _) => current,
        }
    }

    /// Returns true if some part lies behind the plane.
    #[inline]
    pub fn has_back(self) -> bool {
        matches!(self, Classification::Back | Classification::Spanning)
    }

    /// Returns true if some part lies in front of the plane.
    #[inline]
    pub fn has_front(self) -> bool {
        matches!(self, Classification::Front | Classification::Spanning)
    }
}

/// A plane in 3D space, represented as `normal · point = offset`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane3D {
    normal: Vector3<f32>,
    offset: f32,
}

impl Plane3D {
    /// Creates a new plane from a normal vector and offset.
    /// The normal will be normalized automatically.
    ///
    /// # Panics
    /// Panics if the normal vector has zero length.
    pub fn new(normal: Vector3<f32>, offset: f32) -> Self {
        let norm = normal.norm();
        assert!(norm > f32::EPSILON, "Plane normal cannot be zero");
        Self {
            normal: normal / norm,
            offset: offset / norm,
        }
    }

    /// Creates a plane from a point on the plane and a normal vector.
    /// Returns `None` if the normal has zero length.
    pub fn from_point_and_normal(point: Point3<f32>, normal: Vector3<f32>) -> Option<Self> {
        let norm = normal.norm();
        if norm <= f32::EPSILON {
            return None;
        }
        let unit_normal = normal / norm;
        Some(Self {
            normal: unit_normal,
            offset: unit_normal.dot(&point.coords),
        })
    }

    /// Creates the axis-aligned plane `coordinate[axis] = offset`.
    pub fn axis_aligned(axis: usize, offset: f32) -> Self {
        let mut normal = Vector3::zeros();
        normal[axis] = 1.0;
        Self { normal, offset }
    }

    /// Returns the unit normal vector of the plane.
    #[inline]
    pub fn normal(&self) -> Vector3<f32> {
        self.normal
    }

    /// Returns the signed distance from the origin to the plane along the normal.
    #[inline]
    pub fn offset(&self) -> f32 {
        self.offset
    }

    /// Computes the signed distance from a point to the plane.
    /// - Positive: point is in front (same side as normal)
    /// - Negative: point is behind (opposite side from normal)
    /// - Zero: point is on the plane
    #[inline]
    pub fn signed_distance(&self, point: Point3<f32>) -> f32 {
        self.normal.dot(&point.coords) - self.offset
    }

    /// Classifies which side of the plane a point lies on.
    /// Uses the default `VERTEX_EPSILON` tolerance.
    #[inline]
    pub fn classify_point(&self, point: Point3<f32>) -> PlaneSide {
        self.classify_point_with_epsilon(point, VERTEX_EPSILON)
    }

    /// Classifies which side of the plane a point lies on, with a custom epsilon.
    /// Distances exactly on the window boundary count as on the plane.
    pub fn classify_point_with_epsilon(&self, point: Point3<f32>, epsilon: f32) -> PlaneSide {
        let dist = self.signed_distance(point);
        if dist < -epsilon {
            PlaneSide::Back
        } else if dist > epsilon {
            PlaneSide::Front
        } else {
            PlaneSide::OnPlane
        }
    }

    /// Returns a new plane with the normal flipped (facing the opposite direction).
    #[inline]
    pub fn flipped(&self) -> Self {
        Self {
            normal: -self.normal,
            offset: -self.offset,
        }
    }

    /// Index of the normal component with the largest magnitude.
    ///
    /// Ties favour Z, then Y.
    pub fn dominant_axis(&self) -> usize {
        let [i, j, k] = [self.normal.x.abs(), self.normal.y.abs(), self.normal.z.abs()];
        if k < j || k < i {
            if j >= i { 1 } else { 0 }
        } else {
            2
        }
    }

    /// Returns true if every component of `self` is within `tolerance` of `other`.
    pub fn approx_eq(&self, other: &Plane3D, tolerance: f32) -> bool {
        (self.normal - other.normal).iter().all(|c| c.abs() < tolerance)
            && (self.offset - other.offset).abs() < tolerance
    }

    /// Point where the segment `a → b` meets the plane, interpolated by the
    /// ratio of the endpoints' signed distances.
    ///
    /// The caller must ensure the endpoints lie on opposite sides.
    pub fn segment_intersection(&self, a: Point3<f32>, b: Point3<f32>) -> Point3<f32> {
        let da = self.signed_distance(a);
        let db = self.signed_distance(b);
        let ratio = da / (da - db);
        a + (b - a) * ratio
    }
}

/// Reference to a plane record, optionally negated.
///
/// A flipped reference denotes the same plane with its equation negated, so
/// oppositely facing coplanar surfaces can share one plane record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaneRef {
    index: usize,
    flipped: bool,
}

impl PlaneRef {
    /// Largest plane index that fits the packed 16-bit field.
    pub const MAX_INDEX: usize = 0x7FFF;

    /// Reference to `index` as stored.
    pub const fn new(index: usize) -> Self {
        Self {
            index,
            flipped: false,
        }
    }

    /// Reference to `index` with the equation negated.
    pub const fn flipped(index: usize) -> Self {
        Self {
            index,
            flipped: true,
        }
    }

    /// Index into the plane table.
    #[inline]
    pub fn index(self) -> usize {
        self.index
    }

    /// Whether the plane equation is negated.
    #[inline]
    pub fn is_flipped(self) -> bool {
        self.flipped
    }

    /// Same plane record, opposite orientation.
    #[inline]
    pub fn reversed(self) -> Self {
        Self {
            index: self.index,
            flipped: !self.flipped,
        }
    }

    /// Resolves the reference against a plane equation.
    #[inline]
    pub fn apply(self, plane: &Plane3D) -> Plane3D {
        if self.flipped { plane.flipped() } else { *plane }
    }

    /// Packs into the signed 16-bit field: low 15 bits index, high bit flipped.
    pub fn pack(self) -> i16 {
        debug_assert!(self.index <= Self::MAX_INDEX, "plane index out of range");
        let raw = (self.index as u16 & 0x7FFF) | if self.flipped { 0x8000 } else { 0 };
        raw as i16
    }

    /// Inverse of [`PlaneRef::pack`].
    pub fn unpack(raw: i16) -> Self {
        let raw = raw as u16;
        Self {
            index: usize::from(raw & 0x7FFF),
            flipped: raw & 0x8000 != 0,
        }
    }
}

/// A line in a 2D projection, represented as `normal · point = offset`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane2D {
    normal: Vector2<f32>,
    offset: f32,
}

impl Plane2D {
    /// Lines shorter than this keep their raw, unnormalized normal.
    const MIN_LENGTH: f32 = 0.0001;

    /// Creates a line from its raw components.
    pub fn new(normal: Vector2<f32>, offset: f32) -> Self {
        Self { normal, offset }
    }

    /// The line through `a` and `b`; its front side is to the right of `a → b`.
    ///
    /// For a counter-clockwise loop, the interior of the loop is behind every
    /// line built from its edges.
    pub fn through_points(a: Point2<f32>, b: Point2<f32>) -> Self {
        let normal = Vector2::new(b.y - a.y, a.x - b.x);
        let length = normal.norm();
        if length.abs() < Self::MIN_LENGTH {
            return Self {
                normal,
                offset: 0.0,
            };
        }
        let normal = normal / length;
        Self {
            normal,
            offset: normal.dot(&a.coords),
        }
    }

    /// Returns the normal of the line.
    #[inline]
    pub fn normal(&self) -> Vector2<f32> {
        self.normal
    }

    /// Returns the offset of the line along its normal.
    #[inline]
    pub fn offset(&self) -> f32 {
        self.offset
    }

    /// Signed distance of `point` from the line.
    #[inline]
    pub fn signed_distance(&self, point: Point2<f32>) -> f32 {
        self.normal.dot(&point.coords) - self.offset
    }

    /// Classifies a point against the line with the given window.
    pub fn classify_point_with_epsilon(&self, point: Point2<f32>, epsilon: f32) -> PlaneSide {
        let dist = self.signed_distance(point);
        if dist < -epsilon {
            PlaneSide::Back
        } else if dist > epsilon {
            PlaneSide::Front
        } else {
            PlaneSide::OnPlane
        }
    }
}

/// Drops one coordinate of a 3D point so coplanar surfaces can be compared in 2D.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Projection {
    axis: usize,
    mirrored: bool,
}

impl Projection {
    /// Coordinates kept for each `(axis, mirrored)` pair, ordered so loops
    /// keep their winding when seen from the front of the plane.
    const COORDINATES: [[(usize, usize); 2]; 3] = [
        [(2, 1), (1, 2)],
        [(0, 2), (2, 0)],
        [(1, 0), (0, 1)],
    ];

    /// Projection along `axis`, swapping the kept coordinates when `mirrored`.
    pub fn new(axis: usize, mirrored: bool) -> Self {
        debug_assert!(axis < 3, "projection axis out of range");
        Self { axis, mirrored }
    }

    /// Projection for surfaces supported by `reference` into `plane`.
    pub fn for_plane(plane: &Plane3D, reference: PlaneRef) -> Self {
        let axis = plane.dominant_axis();
        let positive = plane.normal()[axis] > 0.0;
        Self::new(axis, positive != reference.is_flipped())
    }

    /// Projects a point onto the two kept coordinates.
    #[inline]
    pub fn project(&self, point: Point3<f32>) -> Point2<f32> {
        let (u, v) = Self::COORDINATES[self.axis][usize::from(self.mirrored)];
        Point2::new(point[u], point[v])
    }
}
