//! The transient list of surfaces a BSP cell still has to account for.

use crate::geometry::{CollisionGeometry, SurfaceFlags};

/// One surface in a [`SurfaceSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SetEntry {
    pub surface: usize,
    /// Already settled to one side of an ancestor plane.
    ///
    /// Unresolved free entries are still candidate splitters; unresolved used
    /// entries face into the current cell.
    pub resolved: bool,
}

impl SetEntry {
    #[inline]
    pub fn resolved(surface: usize) -> Self {
        Self {
            surface,
            resolved: true,
        }
    }

    #[inline]
    pub fn unresolved(surface: usize) -> Self {
        Self {
            surface,
            resolved: false,
        }
    }
}

/// Ordered surface entries split into a free prefix and a used suffix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SurfaceSet {
    entries: Vec<SetEntry>,
    free_count: usize,
}

impl SurfaceSet {
    /// The starting set for a rebuild: every surface free, climbable and
    /// breakable surfaces already resolved.
    pub fn initial(geometry: &CollisionGeometry) -> Self {
        let entries: Vec<SetEntry> = geometry
            .surfaces
            .iter()
            .enumerate()
            .map(|(index, surface)| SetEntry {
                surface: index,
                resolved: surface
                    .flags
                    .intersects(SurfaceFlags::CLIMBABLE | SurfaceFlags::BREAKABLE),
            })
            .collect();
        let free_count = entries.len();
        Self { entries, free_count }
    }

    /// A set whose entries are all used.
    pub fn used_only(entries: Vec<SetEntry>) -> Self {
        Self {
            entries,
            free_count: 0,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn free_count(&self) -> usize {
        self.free_count
    }

    #[inline]
    pub fn used_count(&self) -> usize {
        self.entries.len() - self.free_count
    }

    #[inline]
    pub fn free(&self) -> &[SetEntry] {
        &self.entries[..self.free_count]
    }

    #[inline]
    pub fn used(&self) -> &[SetEntry] {
        &self.entries[self.free_count..]
    }

    /// Every entry, paired with whether it is free.
    pub fn iter(&self) -> impl Iterator<Item = (SetEntry, bool)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, &entry)| (entry, i < self.free_count))
    }
}

/// Accumulates the free and used parts of a child set.
#[derive(Debug, Clone, Default)]
pub struct SurfaceSetBuilder {
    free: Vec<SetEntry>,
    used: Vec<SetEntry>,
}

impl SurfaceSetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: SetEntry, free: bool) {
        if free {
            self.free.push(entry);
        } else {
            self.used.push(entry);
        }
    }

    pub fn push_used(&mut self, entry: SetEntry) {
        self.used.push(entry);
    }

    pub fn build(self) -> SurfaceSet {
        let free_count = self.free.len();
        let mut entries = self.free;
        entries.extend(self.used);
        SurfaceSet { entries, free_count }
    }
}
