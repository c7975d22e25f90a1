//! Visitor pattern for walking the leaves of a built collision BSP.
//!
//! Visitors allow custom processing of leaves during traversal without
//! coupling the traversal logic to specific use cases.

use crate::geometry::CollisionGeometry;

use super::node::NodeRef;

/// Visitor for processing leaves during BSP traversal.
///
/// Common uses include:
/// - Collecting the surfaces reachable from a point of view
/// - Checking per-leaf invariants in tests
/// - Gathering statistics about the tree
pub trait BspVisitor {
    /// Called once for each reachable leaf.
    ///
    /// `surfaces` are the input surfaces named by the leaf's 2D trees, in
    /// ascending order.
    fn visit_leaf(&mut self, leaf: usize, surfaces: &[usize]);
}

/// A simple visitor that collects every visited leaf with its surfaces.
#[derive(Debug, Default)]
pub struct CollectingVisitor {
    collected: Vec<(usize, Vec<usize>)>,
}

impl CollectingVisitor {
    /// Creates a new empty collecting visitor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the collected leaves in visiting order.
    pub fn into_leaves(self) -> Vec<(usize, Vec<usize>)> {
        self.collected
    }

    pub fn leaves(&self) -> &[(usize, Vec<usize>)] {
        &self.collected
    }
}

impl BspVisitor for CollectingVisitor {
    fn visit_leaf(&mut self, leaf: usize, surfaces: &[usize]) {
        self.collected.push((leaf, surfaces.to_vec()));
    }
}

/// A visitor that calls a closure for each leaf.
pub struct FnVisitor<F>
where
    F: FnMut(usize, &[usize]),
{
    func: F,
}

impl<F> FnVisitor<F>
where
    F: FnMut(usize, &[usize]),
{
    /// Creates a new visitor from a closure.
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> BspVisitor for FnVisitor<F>
where
    F: FnMut(usize, &[usize]),
{
    fn visit_leaf(&mut self, leaf: usize, surfaces: &[usize]) {
        (self.func)(leaf, surfaces);
    }
}

impl CollisionGeometry {
    /// Visits every leaf reachable from the root, depth first, back
    /// children before front children.
    pub fn traverse<V: BspVisitor>(&self, visitor: &mut V) {
        let mut visited = vec![false; self.bsp3d_nodes.len()];
        let mut stack = vec![self.root()];

        while let Some(current) = stack.pop() {
            match current {
                NodeRef::Empty => {}
                NodeRef::Leaf(leaf) => {
                    if leaf < self.leaves.len() {
                        visitor.visit_leaf(leaf, &self.leaf_surfaces(leaf));
                    } else {
                        log::warn!("leaf {leaf} out of range");
                    }
                }
                NodeRef::Node(index) => {
                    let Some(node) = self.bsp3d_nodes.get(index) else {
                        log::warn!("bsp3d node {index} out of range");
                        continue;
                    };
                    if std::mem::replace(&mut visited[index], true) {
                        log::warn!("bsp3d node {index} reached twice");
                        continue;
                    }
                    // Pushed last, popped first.
                    stack.push(node.front);
                    stack.push(node.back);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bsp::{Bsp3dNode, Leaf};
    use crate::geometry::MeshBuilder;
    use crate::PlaneRef;
    use nalgebra::Point3;

    /// One plane z = 0 and two leaves without surfaces, one per side.
    fn make_split_slab() -> CollisionGeometry {
        let mut builder = MeshBuilder::new();
        let a = builder.add_vertex(Point3::new(0.0, 0.0, 0.0));
        let b = builder.add_vertex(Point3::new(1.0, 0.0, 0.0));
        let c = builder.add_vertex(Point3::new(0.0, 1.0, 0.0));
        builder.add_face(&[a, b, c]);
        builder.add_face(&[c, b, a]);
        let mut geometry = builder.build().unwrap();

        geometry.leaves.push(Leaf::default());
        geometry.leaves.push(Leaf::default());
        geometry.bsp3d_nodes.push(Bsp3dNode {
            plane: PlaneRef::new(0),
            back: NodeRef::Leaf(0),
            front: NodeRef::Leaf(1),
        });
        geometry
    }

    #[test]
    fn collecting_visitor_empty() {
        let visitor = CollectingVisitor::new();
        assert!(visitor.leaves().is_empty());
    }

    #[test]
    fn collecting_visitor_collects() {
        let mut visitor = CollectingVisitor::new();
        visitor.visit_leaf(3, &[1, 2]);
        visitor.visit_leaf(0, &[]);

        let collected = visitor.into_leaves();
        assert_eq!(collected, vec![(3, vec![1, 2]), (0, vec![])]);
    }

    #[test]
    fn fn_visitor_calls_closure() {
        let mut count = 0;
        {
            let mut visitor = FnVisitor::new(|_: usize, surfaces: &[usize]| {
                count += surfaces.len();
            });
            visitor.visit_leaf(0, &[4, 5]);
            visitor.visit_leaf(1, &[6]);
        }
        assert_eq!(count, 3);
    }

    #[test]
    fn traverse_visits_back_before_front() {
        let geometry = make_split_slab();
        let mut visitor = CollectingVisitor::new();
        geometry.traverse(&mut visitor);

        let order: Vec<usize> = visitor.leaves().iter().map(|(leaf, _)| *leaf).collect();
        assert_eq!(order, vec![0, 1]);
    }

    #[test]
    fn traverse_skips_cycles() {
        let mut geometry = make_split_slab();
        geometry.bsp3d_nodes[0].front = NodeRef::Node(0);

        let mut visitor = CollectingVisitor::new();
        geometry.traverse(&mut visitor);
        assert_eq!(visitor.leaves().len(), 1);
    }
}
