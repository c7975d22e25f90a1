//! Collision BSP structures and their construction.
//!
//! A collision BSP recursively partitions space with planes until every cell
//! is either empty or a convex leaf bounded by the mesh surfaces facing into
//! it. Surfaces of a leaf that share a supporting plane are kept apart by a
//! small 2D tree over that plane.
//!
//! # Example
//!
//! ```
//! use collision_bsp::bsp::CollectingVisitor;
//! use collision_bsp::{BuildConfig, MeshBuilder, rebuild};
//! use nalgebra::Point3;
//!
//! let mut mesh = MeshBuilder::new();
//! let a = mesh.add_vertex(Point3::new(0.0, 0.0, 0.0));
//! let b = mesh.add_vertex(Point3::new(1.0, 0.0, 0.0));
//! let c = mesh.add_vertex(Point3::new(0.0, 1.0, 0.0));
//! let d = mesh.add_vertex(Point3::new(0.0, 0.0, 1.0));
//! mesh.add_face(&[a, c, b]);
//! mesh.add_face(&[a, b, d]);
//! mesh.add_face(&[a, d, c]);
//! mesh.add_face(&[b, c, d]);
//! let geometry = rebuild(&mesh.build().unwrap(), &BuildConfig::default()).unwrap();
//!
//! let mut visitor = CollectingVisitor::new();
//! geometry.traverse(&mut visitor);
//! assert_eq!(visitor.into_leaves(), vec![(0, vec![0, 1, 2, 3])]);
//! ```
//!
//! # Architecture
//!
//! - [`BspBuilder`]: Verifies a mesh and builds its 3D and 2D trees
//! - [`Bsp3dNode`], [`Leaf`], [`Bsp2dNode`]: The output records and their packed forms
//! - [`PlaneSelector`]: Strategy trait for choosing splitting planes
//! - [`BspVisitor`]: Visitor trait for walking the leaves of a built tree

mod bsp2d;
mod node;
mod selector;
mod tree;
mod visitor;
mod working_set;

pub use node::{Bsp2dChild, Bsp2dNode, Bsp2dReference, Bsp3dNode, Leaf, LeafFlags, NodeRef};
pub use selector::{
    AxisSweep, DefaultSelector, PlaneSelector, SplitScore, SurfacePlanes, score_plane, split_cost,
};
pub use tree::{BspBuilder, rebuild, rebuild_in_place};
pub use visitor::{BspVisitor, CollectingVisitor, FnVisitor};
pub use working_set::{SetEntry, SurfaceSet, SurfaceSetBuilder};
