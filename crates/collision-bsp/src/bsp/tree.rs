//! Collision BSP construction.

use crate::classify::Classifier;
use crate::config::BuildConfig;
use crate::error::{BuildError, Capacity};
use crate::geometry::CollisionGeometry;
use crate::provenance::Provenance;
use crate::split::split_surface;
use crate::verify::verify_geometry;
use crate::{Classification, PlaneRef};

use super::bsp2d::build_bsp2d;
use super::node::{Bsp2dChild, Bsp2dReference, Bsp3dNode, Leaf, LeafFlags, NodeRef};
use super::selector::{DefaultSelector, PlaneSelector};
use super::working_set::{SetEntry, SurfaceSet, SurfaceSetBuilder};

/// Rebuilds the collision BSP of a mesh.
///
/// The builder verifies the mesh, then recursively partitions its surfaces
/// with planes chosen by a [`PlaneSelector`] until every cell is either empty
/// or a convex leaf. Surfaces of a leaf that share a supporting plane are
/// separated by a 2D tree.
///
/// # Example
///
/// ```
/// use collision_bsp::{BspBuilder, BuildConfig, MeshBuilder, NodeRef};
/// use nalgebra::Point3;
///
/// let mut mesh = MeshBuilder::new();
/// let a = mesh.add_vertex(Point3::new(0.0, 0.0, 0.0));
/// let b = mesh.add_vertex(Point3::new(1.0, 0.0, 0.0));
/// let c = mesh.add_vertex(Point3::new(0.0, 1.0, 0.0));
/// let d = mesh.add_vertex(Point3::new(0.0, 0.0, 1.0));
/// mesh.add_face(&[a, c, b]);
/// mesh.add_face(&[a, b, d]);
/// mesh.add_face(&[a, d, c]);
/// mesh.add_face(&[b, c, d]);
/// let geometry = mesh.build().unwrap();
///
/// let rebuilt = BspBuilder::new(BuildConfig::default()).build(&geometry).unwrap();
/// assert_eq!(rebuilt.root(), NodeRef::Leaf(0));
/// ```
#[derive(Debug, Clone, Default)]
pub struct BspBuilder<S: PlaneSelector = DefaultSelector> {
    config: BuildConfig,
    selector: S,
}

impl BspBuilder {
    /// Creates a builder using the [`DefaultSelector`].
    pub fn new(config: BuildConfig) -> Self {
        Self {
            config,
            selector: DefaultSelector,
        }
    }
}

impl<S: PlaneSelector> BspBuilder<S> {
    pub fn with_selector(config: BuildConfig, selector: S) -> Self {
        Self { config, selector }
    }

    #[inline]
    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Returns a copy of `geometry` with freshly built BSP arrays.
    ///
    /// The copy keeps the input vertices, edges and surfaces. Planes may have
    /// been appended by the selector.
    pub fn build(&self, geometry: &CollisionGeometry) -> Result<CollisionGeometry, BuildError> {
        self.run(geometry.clone()).map(|(rebuilt, _)| rebuilt)
    }

    /// Rebuilds the BSP arrays of `geometry` and returns the root.
    ///
    /// On error `geometry` is left as it was.
    pub fn build_in_place(&self, geometry: &mut CollisionGeometry) -> Result<NodeRef, BuildError> {
        let (rebuilt, root) = self.run(geometry.clone())?;
        *geometry = rebuilt;
        Ok(root)
    }

    fn run(&self, geometry: CollisionGeometry) -> Result<(CollisionGeometry, NodeRef), BuildError> {
        match self.try_run(geometry) {
            Ok((geometry, root)) => {
                log::info!(
                    "rebuilt collision bsp: {} bsp3d nodes, {} leaves, {} bsp2d references, \
                     {} bsp2d nodes, {} planes",
                    geometry.bsp3d_nodes.len(),
                    geometry.leaves.len(),
                    geometry.bsp2d_references.len(),
                    geometry.bsp2d_nodes.len(),
                    geometry.planes.len()
                );
                Ok((geometry, root))
            }
            Err(err) => {
                log::error!("collision bsp rebuild failed: {err}");
                Err(err)
            }
        }
    }

    fn try_run(
        &self,
        mut geometry: CollisionGeometry,
    ) -> Result<(CollisionGeometry, NodeRef), BuildError> {
        geometry.clear_bsp();
        verify_geometry(&geometry, &self.config)?;
        // Leaves name surfaces through 15-bit 2D children.
        if geometry.surfaces.len() > Bsp2dChild::MAX_INDEX + 1 {
            return Err(BuildError::CapacityExceeded {
                kind: Capacity::Surfaces,
                limit: Bsp2dChild::MAX_INDEX + 1,
            });
        }
        // Nodes and 2D references name planes through 15-bit plane fields.
        if geometry.planes.len() > PlaneRef::MAX_INDEX + 1 {
            return Err(BuildError::CapacityExceeded {
                kind: Capacity::Planes,
                limit: PlaneRef::MAX_INDEX + 1,
            });
        }

        let mut build = TreeBuild {
            geometry,
            provenance: Provenance::new(),
            config: &self.config,
            selector: &self.selector,
        };
        let root = build.build_root()?;
        Ok((build.geometry, root))
    }
}

/// Rebuilds the BSP of `geometry` with the [`DefaultSelector`].
///
/// See [`BspBuilder::build`].
pub fn rebuild(
    geometry: &CollisionGeometry,
    config: &BuildConfig,
) -> Result<CollisionGeometry, BuildError> {
    BspBuilder::new(config.clone()).build(geometry)
}

/// Rebuilds the BSP of `geometry` in place with the [`DefaultSelector`].
///
/// See [`BspBuilder::build_in_place`].
pub fn rebuild_in_place(
    geometry: &mut CollisionGeometry,
    config: &BuildConfig,
) -> Result<NodeRef, BuildError> {
    BspBuilder::new(config.clone()).build_in_place(geometry)
}

/// What a cell of the 3D tree becomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
    /// No collidable geometry.
    Empty,
    Split,
    /// A leaf of every entry.
    Leaf,
    /// A leaf of the unresolved used entries only.
    UnresolvedLeaf,
}

/// State of one rebuild.
struct TreeBuild<'a, S> {
    geometry: CollisionGeometry,
    provenance: Provenance,
    config: &'a BuildConfig,
    selector: &'a S,
}

impl<S: PlaneSelector> TreeBuild<'_, S> {
    fn classifier(&self) -> Classifier<'_> {
        Classifier::new(&self.geometry, &self.provenance, self.config)
    }

    fn build_root(&mut self) -> Result<NodeRef, BuildError> {
        let set = SurfaceSet::initial(&self.geometry);
        if set.is_empty() {
            return Ok(NodeRef::Empty);
        }

        // A convex mesh is a single cell; skip the split search. Resolved
        // surfaces never reach a leaf, so they take the full search.
        let all_unresolved = set.free().iter().all(|entry| !entry.resolved);
        if all_unresolved && set.free_count() < self.config.exhaustive_search_limit {
            let surfaces: Vec<usize> = set.free().iter().map(|entry| entry.surface).collect();
            if self.classifier().encloses_convex_cell(&surfaces) {
                log::debug!(
                    "mesh of {} surfaces is convex, building a single leaf",
                    surfaces.len()
                );
                return self.build_leaf(&SurfaceSet::used_only(set.free().to_vec()));
            }
        }

        self.build_node(set)
    }

    fn build_node(&mut self, set: SurfaceSet) -> Result<NodeRef, BuildError> {
        match self.decide(&set) {
            Decision::Empty => Ok(NodeRef::Empty),
            Decision::Split => self.split(&set),
            Decision::Leaf => self.build_leaf(&set),
            Decision::UnresolvedLeaf => {
                let unresolved = set
                    .used()
                    .iter()
                    .copied()
                    .filter(|entry| !entry.resolved)
                    .collect();
                self.build_leaf(&SurfaceSet::used_only(unresolved))
            }
        }
    }

    fn decide(&self, set: &SurfaceSet) -> Decision {
        if set.is_empty() {
            return Decision::Empty;
        }

        let free_unresolved = set.free().iter().any(|entry| !entry.resolved);
        let used_resolved = set.used().iter().any(|entry| entry.resolved);
        let used_unresolved = set.used().iter().any(|entry| !entry.resolved);

        if free_unresolved || (set.free_count() > 0 && !used_resolved) {
            return Decision::Split;
        }
        if set.free_count() == 0 && !used_resolved {
            return Decision::Leaf;
        }
        if !used_unresolved {
            return Decision::Empty;
        }

        // Surfaces facing into the cell and surfaces facing away both bound
        // it. The larger side wins, with a bias towards solid.
        let classifier = self.classifier();
        let (unresolved_fit, resolved_fit) =
            set.used().iter().fold((0.0, 0.0), |(unresolved, resolved), entry| {
                let fit = classifier.surface_plane_fit(entry.surface);
                if entry.resolved {
                    (unresolved, resolved + fit)
                } else {
                    (unresolved + fit, resolved)
                }
            });
        log::trace!("mixed cell: unresolved fit {unresolved_fit}, resolved fit {resolved_fit}");

        if 4.0 * unresolved_fit <= resolved_fit {
            Decision::Empty
        } else {
            Decision::UnresolvedLeaf
        }
    }

    fn split(&mut self, set: &SurfaceSet) -> Result<NodeRef, BuildError> {
        let free = set.free_count();
        let score = self
            .selector
            .select(&mut self.geometry, &self.provenance, self.config, set)?;
        if !score.separates(free) {
            return Err(BuildError::NoSplittingPlane { free });
        }
        log::debug!(
            "splitting {} free and {} used entries by plane {}: {} back, {} front",
            free,
            set.used_count(),
            score.plane_index,
            score.back,
            score.front
        );

        let checkpoint = self.geometry.checkpoint();
        let (back, front) = self.partition(set, score.plane_index)?;

        let index = self.geometry.bsp3d_nodes.len();
        if index > NodeRef::MAX_NODE_INDEX {
            return Err(BuildError::CapacityExceeded {
                kind: Capacity::Bsp3dNodes,
                limit: NodeRef::MAX_NODE_INDEX + 1,
            });
        }
        let plane = PlaneRef::new(score.plane_index);
        self.geometry.bsp3d_nodes.push(Bsp3dNode {
            plane,
            back: NodeRef::Empty,
            front: NodeRef::Empty,
        });

        let back = self.build_node(back)?;
        let front = self.build_node(front)?;
        self.geometry.bsp3d_nodes[index] = Bsp3dNode { plane, back, front };

        self.geometry.rollback(checkpoint);
        self.provenance.truncate(checkpoint.surfaces);
        Ok(NodeRef::Node(index))
    }

    /// Sorts the entries of `set` onto either side of plane `plane_index`,
    /// cutting the ones that span it.
    fn partition(
        &mut self,
        set: &SurfaceSet,
        plane_index: usize,
    ) -> Result<(SurfaceSet, SurfaceSet), BuildError> {
        let mut back = SurfaceSetBuilder::new();
        let mut front = SurfaceSetBuilder::new();

        for (entry, free) in set.iter() {
            let relationship = self.classifier().surface_relationship(entry.surface, plane_index);
            match relationship {
                Classification::Back => back.push(entry, free),
                Classification::Front => front.push(entry, free),
                Classification::Unknown => {
                    back.push(entry, free);
                    front.push(entry, free);
                }
                Classification::Spanning => {
                    let parts = split_surface(
                        &mut self.geometry,
                        &mut self.provenance,
                        self.config,
                        entry.surface,
                        plane_index,
                    )?;
                    back.push(
                        SetEntry {
                            surface: parts.back,
                            ..entry
                        },
                        free,
                    );
                    front.push(
                        SetEntry {
                            surface: parts.front,
                            ..entry
                        },
                        free,
                    );
                }
                Classification::Coplanar => {
                    self.partition_coplanar(entry, free, &mut back, &mut front)
                }
            }
        }

        Ok((back.build(), front.build()))
    }

    /// A surface on the splitting plane stops being a splitter. It faces
    /// into the cell on its front side and is settled on its back side.
    fn partition_coplanar(
        &self,
        entry: SetEntry,
        free: bool,
        back: &mut SurfaceSetBuilder,
        front: &mut SurfaceSetBuilder,
    ) {
        if !free {
            log::warn!("used surface {} lies on the splitting plane", entry.surface);
        }
        if entry.resolved {
            return;
        }

        let surface = &self.geometry.surfaces[entry.surface];
        let facing = SetEntry::unresolved(entry.surface);
        let settled = SetEntry::resolved(entry.surface);
        match (surface.is_two_sided(), surface.plane.is_flipped()) {
            (false, false) => {
                back.push_used(settled);
                front.push_used(facing);
            }
            (false, true) => {
                back.push_used(facing);
                front.push_used(settled);
            }
            (true, false) => front.push_used(facing),
            (true, true) => back.push_used(facing),
        }
    }

    fn build_leaf(&mut self, set: &SurfaceSet) -> Result<NodeRef, BuildError> {
        if set.free_count() > 0 {
            return Err(BuildError::Undecidable {
                free: set.free_count(),
            });
        }

        let mut surfaces: Vec<usize> = Vec::with_capacity(set.used_count());
        for entry in set.used() {
            let root = self.provenance.root(entry.surface);
            if !surfaces.contains(&root) {
                surfaces.push(root);
            }
        }

        let index = self.geometry.leaves.len();
        if index > NodeRef::MAX_LEAF_INDEX {
            return Err(BuildError::CapacityExceeded {
                kind: Capacity::Leaves,
                limit: NodeRef::MAX_LEAF_INDEX + 1,
            });
        }
        let mut leaf = Leaf::default();
        self.geometry.leaves.push(leaf);

        let mut grouped = vec![false; surfaces.len()];
        for i in 0..surfaces.len() {
            let surface = self.geometry.surfaces[surfaces[i]];
            if surface.is_two_sided() {
                leaf.flags.insert(LeafFlags::CONTAINS_DOUBLE_SIDED_SURFACES);
            }
            if grouped[i] {
                continue;
            }

            let plane = surface.plane;
            let mut group = Vec::new();
            for j in i..surfaces.len() {
                if !grouped[j] && self.geometry.surfaces[surfaces[j]].plane == plane {
                    grouped[j] = true;
                    group.push(surfaces[j]);
                }
            }

            let node =
                build_bsp2d(&mut self.geometry, &self.provenance, self.config, plane, &group)?;
            let reference = self.geometry.bsp2d_references.len();
            self.geometry.bsp2d_references.push(Bsp2dReference { plane, node });
            leaf.first_bsp2d_reference.get_or_insert(reference);
            leaf.bsp2d_reference_count += 1;
        }
        self.geometry.leaves[index] = leaf;

        log::trace!("leaf {index}: surfaces {surfaces:?}");
        Ok(NodeRef::Leaf(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bsp::selector::{SplitScore, score_plane};
    use crate::config::EXHAUSTIVE_SEARCH_LIMIT;
    use crate::error::GeometryError;
    use crate::geometry::{MeshBuilder, SurfaceFlags};
    use nalgebra::Point3;

    fn make_tetrahedron() -> CollisionGeometry {
        let mut builder = MeshBuilder::new();
        let a = builder.add_vertex(Point3::new(0.0, 0.0, 0.0));
        let b = builder.add_vertex(Point3::new(1.0, 0.0, 0.0));
        let c = builder.add_vertex(Point3::new(0.0, 1.0, 0.0));
        let d = builder.add_vertex(Point3::new(0.0, 0.0, 1.0));
        builder.add_face(&[a, c, b]);
        builder.add_face(&[a, b, d]);
        builder.add_face(&[a, d, c]);
        builder.add_face(&[b, c, d]);
        builder.build().unwrap()
    }

    /// `count` disjoint unit boxes in a row, each shifted by 3 along X.
    fn make_boxes(count: usize) -> CollisionGeometry {
        let mut builder = MeshBuilder::new();
        for i in 0..count {
            let x0 = 3.0 * i as f32;
            let mut v = Vec::new();
            for z in [0.0, 1.0] {
                for (x, y) in [(x0, 0.0), (x0 + 1.0, 0.0), (x0 + 1.0, 1.0), (x0, 1.0)] {
                    v.push(builder.add_vertex(Point3::new(x, y, z)));
                }
            }
            builder.add_face(&[v[0], v[3], v[2], v[1]]);
            builder.add_face(&[v[4], v[5], v[6], v[7]]);
            builder.add_face(&[v[0], v[1], v[5], v[4]]);
            builder.add_face(&[v[2], v[3], v[7], v[6]]);
            builder.add_face(&[v[1], v[2], v[6], v[5]]);
            builder.add_face(&[v[0], v[4], v[7], v[3]]);
        }
        builder.build().unwrap()
    }

    fn make_two_boxes() -> CollisionGeometry {
        make_boxes(2)
    }

    /// An L-shaped prism of height 1, its outline split into two convex
    /// caps top and bottom.
    fn make_l_prism() -> CollisionGeometry {
        let outline = [
            (0.0, 0.0),
            (2.0, 0.0),
            (2.0, 1.0),
            (1.0, 1.0),
            (1.0, 2.0),
            (0.0, 2.0),
            (0.0, 1.0),
        ];
        let mut builder = MeshBuilder::new();
        let b: Vec<usize> = outline
            .iter()
            .map(|&(x, y)| builder.add_vertex(Point3::new(x, y, 0.0)))
            .collect();
        let t: Vec<usize> = outline
            .iter()
            .map(|&(x, y)| builder.add_vertex(Point3::new(x, y, 1.0)))
            .collect();

        builder.add_face(&[t[0], t[1], t[2], t[3], t[6]]);
        builder.add_face(&[t[6], t[3], t[4], t[5]]);
        builder.add_face(&[b[6], b[3], b[2], b[1], b[0]]);
        builder.add_face(&[b[5], b[4], b[3], b[6]]);
        for (i, j) in [(0, 1), (1, 2), (2, 3), (3, 4), (4, 5)] {
            builder.add_face(&[b[i], b[j], t[j], t[i]]);
        }
        builder.add_face(&[b[5], b[6], b[0], t[0], t[6], t[5]]);
        builder.build().unwrap()
    }

    /// A 2x1x1 box whose top is made of two coplanar squares.
    fn make_split_top_box() -> CollisionGeometry {
        let mut builder = MeshBuilder::new();
        let b: Vec<usize> = [(0.0, 0.0), (2.0, 0.0), (2.0, 1.0), (0.0, 1.0)]
            .iter()
            .map(|&(x, y)| builder.add_vertex(Point3::new(x, y, 0.0)))
            .collect();
        let t: Vec<usize> = [(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (2.0, 1.0), (1.0, 1.0), (0.0, 1.0)]
            .iter()
            .map(|&(x, y)| builder.add_vertex(Point3::new(x, y, 1.0)))
            .collect();

        builder.add_face(&[b[0], b[3], b[2], b[1]]);
        builder.add_face(&[t[0], t[1], t[4], t[5]]);
        builder.add_face(&[t[1], t[2], t[3], t[4]]);
        builder.add_face(&[b[0], b[1], t[2], t[1], t[0]]);
        builder.add_face(&[b[2], b[3], t[5], t[4], t[3]]);
        builder.add_face(&[b[1], b[2], t[3], t[2]]);
        builder.add_face(&[b[0], t[0], t[5], b[3]]);
        builder.build().unwrap()
    }

    fn leaves_of(geometry: &CollisionGeometry) -> Vec<Vec<usize>> {
        (0..geometry.leaves.len()).map(|leaf| geometry.leaf_surfaces(leaf)).collect()
    }

    #[test]
    fn convex_mesh_is_a_single_leaf() {
        let rebuilt = rebuild(&make_tetrahedron(), &BuildConfig::default()).unwrap();
        assert!(rebuilt.bsp3d_nodes.is_empty());
        assert_eq!(rebuilt.leaves.len(), 1);
        assert_eq!(rebuilt.leaf_surfaces(0), vec![0, 1, 2, 3]);
        // Four distinct planes, one 2D reference each.
        assert_eq!(rebuilt.bsp2d_references.len(), 4);
        assert!(rebuilt.bsp2d_nodes.is_empty());
    }

    #[test]
    fn disjoint_boxes_need_splits() {
        let geometry = make_two_boxes();
        let rebuilt = rebuild(&geometry, &BuildConfig::default()).unwrap();

        assert!(!rebuilt.bsp3d_nodes.is_empty());
        assert_eq!(rebuilt.root(), NodeRef::Node(0));
        assert_eq!(rebuilt.vertices, geometry.vertices);
        assert_eq!(rebuilt.edges, geometry.edges);
        assert_eq!(rebuilt.surfaces, geometry.surfaces);

        for leaf in leaves_of(&rebuilt) {
            assert!(!leaf.is_empty());
        }
        for reference in &rebuilt.bsp2d_references {
            if let Bsp2dChild::Node(index) = reference.node {
                assert!(index < rebuilt.bsp2d_nodes.len());
            }
        }
    }

    #[test]
    fn nodes_are_emitted_in_pre_order() {
        let rebuilt = rebuild(&make_two_boxes(), &BuildConfig::default()).unwrap();
        for (index, node) in rebuilt.bsp3d_nodes.iter().enumerate() {
            for child in [node.back, node.front] {
                match child {
                    NodeRef::Node(child) => {
                        assert!(child > index);
                        assert!(child < rebuilt.bsp3d_nodes.len());
                    }
                    NodeRef::Leaf(leaf) => assert!(leaf < rebuilt.leaves.len()),
                    NodeRef::Empty => {}
                }
            }
        }
    }

    #[test]
    fn empty_mesh_fails_verification() {
        let result = rebuild(&CollisionGeometry::new(), &BuildConfig::default());
        assert_eq!(result, Err(BuildError::InvalidGeometry(GeometryError::Empty)));
    }

    #[test]
    fn resolved_surfaces_never_reach_a_leaf() {
        let mut geometry = make_two_boxes();
        for surface in &mut geometry.surfaces[6..] {
            surface.flags |= SurfaceFlags::CLIMBABLE;
        }
        let rebuilt = rebuild(&geometry, &BuildConfig::default()).unwrap();

        for leaf in leaves_of(&rebuilt) {
            assert!(leaf.iter().all(|&surface| surface < 6), "leaf {leaf:?}");
        }
    }

    #[test]
    fn two_sided_surfaces_flag_their_leaf() {
        let mut geometry = make_tetrahedron();
        geometry.surfaces[2].flags |= SurfaceFlags::TWO_SIDED;
        let rebuilt = rebuild(&geometry, &BuildConfig::default()).unwrap();
        assert!(rebuilt.leaves[0].flags.contains(LeafFlags::CONTAINS_DOUBLE_SIDED_SURFACES));
    }

    /// Always proposes the first plane record, whatever the set.
    struct FixedPlane;

    impl PlaneSelector for FixedPlane {
        fn select(
            &self,
            geometry: &mut CollisionGeometry,
            provenance: &Provenance,
            config: &BuildConfig,
            set: &SurfaceSet,
        ) -> Result<SplitScore, BuildError> {
            let classifier = Classifier::new(geometry, provenance, config);
            Ok(score_plane(&classifier, geometry, set, 0))
        }
    }

    #[test]
    fn stalled_selector_reports_no_splitting_plane() {
        let geometry = make_two_boxes();
        let builder = BspBuilder::with_selector(BuildConfig::default(), FixedPlane);
        let mut target = geometry.clone();

        let result = builder.build_in_place(&mut target);
        assert!(matches!(result, Err(BuildError::NoSplittingPlane { .. })), "{result:?}");
        assert_eq!(target, geometry);
    }

    #[test]
    fn concave_prism_covers_every_surface() {
        let geometry = make_l_prism();
        let rebuilt = rebuild(&geometry, &BuildConfig::default()).unwrap();
        assert_eq!(rebuilt.root(), NodeRef::Node(0));

        let mut seen = vec![false; geometry.surfaces.len()];
        for leaf in 0..rebuilt.leaves.len() {
            let mut named = Vec::new();
            for reference in rebuilt.leaves[leaf].bsp2d_references() {
                named.extend(rebuilt.bsp2d_surfaces(rebuilt.bsp2d_references[reference].node));
            }
            let distinct = rebuilt.leaf_surfaces(leaf);
            assert_eq!(named.len(), distinct.len(), "leaf {leaf} repeats a surface");
            for surface in distinct {
                seen[surface] = true;
            }
        }
        assert!(seen.iter().all(|&seen| seen), "{seen:?}");
    }

    #[test]
    fn concave_prism_locates_the_notch() {
        let rebuilt = rebuild(&make_l_prism(), &BuildConfig::default()).unwrap();

        for inside in [
            Point3::new(0.5, 0.5, 0.5),
            Point3::new(1.5, 0.5, 0.5),
            Point3::new(0.5, 1.5, 0.5),
        ] {
            assert_eq!(rebuilt.locate(inside), NodeRef::Empty, "{inside:?}");
        }
        match rebuilt.locate(Point3::new(1.5, 1.5, 0.5)) {
            NodeRef::Leaf(leaf) => assert_eq!(rebuilt.leaf_surfaces(leaf), vec![6, 7]),
            other => panic!("notch located in {other:?}"),
        }
        match rebuilt.locate(Point3::new(-1.0, 0.5, 0.5)) {
            NodeRef::Leaf(leaf) => assert_eq!(rebuilt.leaf_surfaces(leaf), vec![9]),
            other => panic!("outside point located in {other:?}"),
        }
        assert!(matches!(rebuilt.locate(Point3::new(5.0, 5.0, 5.0)), NodeRef::Leaf(_)));
    }

    #[test]
    fn rebuilding_twice_is_stable() {
        let axis_only = BuildConfig::default().with_exhaustive_search_limit(0);
        for config in [BuildConfig::default(), axis_only] {
            for geometry in [make_two_boxes(), make_l_prism()] {
                let once = rebuild(&geometry, &config).unwrap();
                let twice = rebuild(&once, &config).unwrap();
                assert_eq!(once, twice);
            }
        }
    }

    #[test]
    fn axis_sweep_adds_planes_and_keeps_surfaces() {
        let geometry = make_l_prism();
        let config = BuildConfig::default().with_exhaustive_search_limit(0);
        let rebuilt = rebuild(&geometry, &config).unwrap();

        assert!(rebuilt.planes.len() > geometry.planes.len());
        assert_eq!(rebuilt.planes[..geometry.planes.len()], geometry.planes[..]);
        assert_eq!(rebuilt.surfaces, geometry.surfaces);

        let mut seen: Vec<usize> = leaves_of(&rebuilt).into_iter().flatten().collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen, (0..geometry.surfaces.len()).collect::<Vec<_>>());
    }

    #[test]
    fn invalid_mesh_is_left_untouched() {
        let mut geometry = make_tetrahedron();
        geometry.edges[0].end_vertex = geometry.edges[0].start_vertex;
        let original = geometry.clone();

        let result = rebuild_in_place(&mut geometry, &BuildConfig::default());
        assert_eq!(
            result,
            Err(BuildError::InvalidGeometry(GeometryError::SingleVertex { edge: 0 }))
        );
        assert_eq!(geometry, original);
    }

    #[test]
    fn coplanar_surfaces_share_a_bsp2d_tree() {
        let rebuilt = rebuild(&make_split_top_box(), &BuildConfig::default()).unwrap();

        assert!(rebuilt.bsp3d_nodes.is_empty());
        assert_eq!(rebuilt.leaves.len(), 1);
        assert_eq!(rebuilt.leaf_surfaces(0), (0..7).collect::<Vec<_>>());
        assert_eq!(rebuilt.bsp2d_references.len(), 6);
        assert_eq!(rebuilt.bsp2d_nodes.len(), 1);

        let node = &rebuilt.bsp2d_nodes[0];
        let mut children = [node.left, node.right];
        children.sort_by_key(|child| child.pack());
        assert_eq!(children, [Bsp2dChild::Surface(1), Bsp2dChild::Surface(2)]);
    }

    #[test]
    fn stale_bsp_output_is_replaced() {
        let boxes = rebuild(&make_two_boxes(), &BuildConfig::default()).unwrap();
        let mut geometry = make_tetrahedron();
        geometry.bsp3d_nodes = boxes.bsp3d_nodes.clone();
        geometry.leaves = boxes.leaves.clone();
        geometry.bsp2d_references = boxes.bsp2d_references.clone();
        geometry.bsp2d_nodes = boxes.bsp2d_nodes.clone();

        let root = rebuild_in_place(&mut geometry, &BuildConfig::default()).unwrap();
        assert_eq!(root, NodeRef::Leaf(0));
        assert!(geometry.bsp3d_nodes.is_empty());
        assert_eq!(geometry.leaves.len(), 1);
        assert_eq!(geometry.bsp2d_references.len(), 4);
    }

    #[test]
    fn traversal_visits_each_leaf_once() {
        let rebuilt = rebuild(&make_l_prism(), &BuildConfig::default()).unwrap();
        let mut visitor = crate::bsp::CollectingVisitor::new();
        rebuilt.traverse(&mut visitor);

        let mut visited: Vec<usize> = visitor.leaves().iter().map(|(leaf, _)| *leaf).collect();
        visited.sort_unstable();
        assert_eq!(visited, (0..rebuilt.leaves.len()).collect::<Vec<_>>());
    }

    #[test]
    fn climbable_surface_stays_out_of_a_convex_leaf() {
        let mut geometry = make_tetrahedron();
        geometry.surfaces[0].flags |= SurfaceFlags::CLIMBABLE;
        let rebuilt = rebuild(&geometry, &BuildConfig::default()).unwrap();

        assert!(!rebuilt.bsp3d_nodes.is_empty());
        let mut seen: Vec<usize> = leaves_of(&rebuilt).into_iter().flatten().collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[test]
    fn plane_table_over_packed_limit_is_rejected() {
        let mut geometry = make_tetrahedron();
        let filler = geometry.planes[0];
        geometry.planes.resize(PlaneRef::MAX_INDEX + 2, filler);
        let original = geometry.clone();

        let result = rebuild_in_place(&mut geometry, &BuildConfig::default());
        assert_eq!(
            result,
            Err(BuildError::CapacityExceeded {
                kind: Capacity::Planes,
                limit: PlaneRef::MAX_INDEX + 1,
            })
        );
        assert_eq!(geometry, original);
    }

    #[test]
    fn large_mesh_uses_axis_sweep_at_default_limit() {
        let geometry = make_boxes(180);
        assert!(geometry.surfaces.len() >= EXHAUSTIVE_SEARCH_LIMIT);
        let rebuilt = rebuild(&geometry, &BuildConfig::default()).unwrap();

        // Only the sweep appends planes.
        assert!(rebuilt.planes.len() > geometry.planes.len());
        let mut seen: Vec<usize> = leaves_of(&rebuilt).into_iter().flatten().collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen, (0..geometry.surfaces.len()).collect::<Vec<_>>());
    }
}
