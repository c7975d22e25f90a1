//! Splitting plane selection strategies for BSP tree construction.
//!
//! The choice of splitting plane decides how many surfaces get cut and how
//! balanced the tree is. Trying every surface plane gives good trees but is
//! quadratic in the number of surfaces, so large sets fall back to a single
//! sweep over axis-aligned candidates.

use crate::classify::Classifier;
use crate::config::BuildConfig;
use crate::error::BuildError;
use crate::geometry::CollisionGeometry;
use crate::provenance::Provenance;
use crate::{Classification, Plane3D};

use super::working_set::SurfaceSet;

/// How a candidate plane would partition a [`SurfaceSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitScore {
    pub plane_index: usize,
    /// Free entries that would land behind the plane.
    pub back: usize,
    /// Free entries that would land in front of the plane.
    pub front: usize,
    pub back_used: usize,
    pub front_used: usize,
}

impl SplitScore {
    fn empty(plane_index: usize) -> Self {
        Self {
            plane_index,
            back: 0,
            front: 0,
            back_used: 0,
            front_used: 0,
        }
    }

    /// Lower is better.
    #[inline]
    pub fn cost(&self) -> usize {
        split_cost(self.back, self.front)
    }

    /// Whether splitting `free` free entries this way leaves each side with
    /// fewer of them.
    ///
    /// Recursion only terminates if every split makes progress on both
    /// sides. A surface plane always does, since its own surface leaves the
    /// free part.
    pub fn separates(&self, free: usize) -> bool {
        self.back < free && self.front < free
    }
}

/// Penalizes imbalance and, twice as hard, duplicated or cut surfaces.
#[inline]
pub fn split_cost(back: usize, front: usize) -> usize {
    back.abs_diff(front) + 2 * (back + front)
}

/// Counts where every entry of `set` would go if split by `plane_index`.
pub fn score_plane(
    classifier: &Classifier<'_>,
    geometry: &CollisionGeometry,
    set: &SurfaceSet,
    plane_index: usize,
) -> SplitScore {
    let mut score = SplitScore::empty(plane_index);

    for (entry, free) in set.iter() {
        let relationship = classifier.surface_relationship(entry.surface, plane_index);
        if relationship == Classification::Coplanar {
            if !free {
                log::warn!(
                    "surface {} on splitting plane {plane_index} is not free",
                    entry.surface
                );
            }
            if entry.resolved {
                continue;
            }
            let surface = &geometry.surfaces[entry.surface];
            match (surface.is_two_sided(), surface.plane.is_flipped()) {
                (true, true) => score.back_used += 1,
                (true, false) => score.front_used += 1,
                (false, _) => {
                    score.back_used += 1;
                    score.front_used += 1;
                }
            }
            continue;
        }

        // A surface on neither side is kept on both.
        let (back, front) = match relationship {
            Classification::Unknown => (true, true),
            other => (other.has_back(), other.has_front()),
        };
        if free {
            score.back += usize::from(back);
            score.front += usize::from(front);
        } else {
            score.back_used += usize::from(back);
            score.front_used += usize::from(front);
        }
    }

    score
}

/// Strategy for choosing the plane that splits a BSP cell.
///
/// Implementations may append planes to the geometry but must not touch
/// anything else.
pub trait PlaneSelector {
    /// Picks a splitting plane for `set`.
    ///
    /// Returns [`BuildError::NoSplittingPlane`] if no candidate exists.
    fn select(
        &self,
        geometry: &mut CollisionGeometry,
        provenance: &Provenance,
        config: &BuildConfig,
        set: &SurfaceSet,
    ) -> Result<SplitScore, BuildError>;
}

/// Tries the supporting plane of every free surface and keeps the cheapest.
///
/// Ties keep the earliest candidate.
#[derive(Debug, Clone, Copy, Default)]
pub struct SurfacePlanes;

impl PlaneSelector for SurfacePlanes {
    fn select(
        &self,
        geometry: &mut CollisionGeometry,
        provenance: &Provenance,
        config: &BuildConfig,
        set: &SurfaceSet,
    ) -> Result<SplitScore, BuildError> {
        let classifier = Classifier::new(geometry, provenance, config);
        let mut best: Option<SplitScore> = None;

        for entry in set.free() {
            let plane_index = geometry.surfaces[entry.surface].plane.index();
            let score = score_plane(&classifier, geometry, set, plane_index);
            if best.is_none_or(|b| score.cost() < b.cost()) {
                best = Some(score);
            }
        }

        best.ok_or(BuildError::NoSplittingPlane {
            free: set.free_count(),
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct Extent {
    coordinate: f32,
    is_max: bool,
}

/// Sweeps the surface extents along X, Y and Z and splits at the best
/// midpoint between two consecutive extents.
///
/// The resulting axis-aligned plane reuses a plane record when one matches
/// within the configured tolerance.
#[derive(Debug, Clone, Copy, Default)]
pub struct AxisSweep;

impl AxisSweep {
    fn best_axis_plane(
        &self,
        geometry: &CollisionGeometry,
        set: &SurfaceSet,
    ) -> Option<(usize, f32)> {
        let mut best: Option<(usize, usize, f32)> = None;

        for axis in 0..3 {
            let mut extents = Vec::with_capacity(set.free_count() * 2);
            for entry in set.free() {
                let (min, max) = geometry
                    .surface_points(entry.surface)
                    .fold((f32::MAX, f32::MIN), |(min, max), p| {
                        (min.min(p[axis]), max.max(p[axis]))
                    });
                extents.push(Extent {
                    coordinate: min,
                    is_max: false,
                });
                extents.push(Extent {
                    coordinate: max,
                    is_max: true,
                });
            }
            extents.sort_by(|a, b| {
                a.coordinate
                    .total_cmp(&b.coordinate)
                    .then(a.is_max.cmp(&b.is_max))
            });

            let mut front = set.free_count();
            let mut back = 0;
            for k in 1..extents.len() {
                if extents[k - 1].is_max {
                    front = front.saturating_sub(1);
                } else {
                    back += 1;
                }
                let cost = split_cost(back, front);
                if best.is_none_or(|(best_cost, _, _)| cost < best_cost) {
                    let offset = (extents[k].coordinate + extents[k - 1].coordinate) * 0.5;
                    best = Some((cost, axis, offset));
                }
            }
        }

        best.map(|(_, axis, offset)| (axis, offset))
    }
}

impl PlaneSelector for AxisSweep {
    fn select(
        &self,
        geometry: &mut CollisionGeometry,
        provenance: &Provenance,
        config: &BuildConfig,
        set: &SurfaceSet,
    ) -> Result<SplitScore, BuildError> {
        let (axis, offset) = self
            .best_axis_plane(geometry, set)
            .ok_or(BuildError::NoSplittingPlane {
                free: set.free_count(),
            })?;

        let plane_index = geometry
            .intern_plane(Plane3D::axis_aligned(axis, offset), config.plane_match_tolerance)?;
        log::debug!("axis sweep chose axis {axis} at {offset} (plane {plane_index})");

        let classifier = Classifier::new(geometry, provenance, config);
        Ok(score_plane(&classifier, geometry, set, plane_index))
    }
}

/// Uses [`SurfacePlanes`] below the configured exhaustive search limit and
/// [`AxisSweep`] at or above it.
///
/// An axis plane that fails to separate the free entries is replaced by the
/// best surface plane.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSelector;

impl PlaneSelector for DefaultSelector {
    fn select(
        &self,
        geometry: &mut CollisionGeometry,
        provenance: &Provenance,
        config: &BuildConfig,
        set: &SurfaceSet,
    ) -> Result<SplitScore, BuildError> {
        if set.free_count() < config.exhaustive_search_limit {
            SurfacePlanes.select(geometry, provenance, config, set)
        } else {
            let score = AxisSweep.select(geometry, provenance, config, set)?;
            if score.separates(set.free_count()) {
                return Ok(score);
            }
            log::debug!(
                "axis plane {} does not separate, trying surface planes",
                score.plane_index
            );
            SurfacePlanes.select(geometry, provenance, config, set)
        }
    }
}
