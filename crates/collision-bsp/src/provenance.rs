//! Parent links from split surfaces back to the surfaces they were cut from.

use std::collections::BTreeMap;

/// Forest of derived surface → parent surface links.
///
/// Input surfaces have no entry; each split records both children. Surface
/// indices grow monotonically during a build, so truncating the surface
/// array and [`Provenance::truncate`] with the same count stay in step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Provenance {
    parents: BTreeMap<usize, usize>,
}

impl Provenance {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `child` was cut from `parent`.
    pub fn record(&mut self, child: usize, parent: usize) {
        self.parents.insert(child, parent);
    }

    /// The surface `surface` was cut from, if any.
    #[inline]
    pub fn parent(&self, surface: usize) -> Option<usize> {
        self.parents.get(&surface).copied()
    }

    /// Parents of `surface`, nearest first, ending at an input surface.
    pub fn ancestors(&self, surface: usize) -> Ancestors<'_> {
        Ancestors {
            provenance: self,
            current: surface,
        }
    }

    /// The input surface `surface` ultimately derives from.
    pub fn root(&self, surface: usize) -> usize {
        self.ancestors(surface).last().unwrap_or(surface)
    }

    /// Number of derived surfaces recorded.
    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    /// Forgets every surface with an index of `surface_count` or more.
    pub fn truncate(&mut self, surface_count: usize) {
        self.parents.split_off(&surface_count);
    }
}

/// Iterator returned by [`Provenance::ancestors`].
#[derive(Debug, Clone)]
pub struct Ancestors<'a> {
    provenance: &'a Provenance,
    current: usize,
}

impl Iterator for Ancestors<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let parent = self.provenance.parent(self.current)?;
        self.current = parent;
        Some(parent)
    }
}
