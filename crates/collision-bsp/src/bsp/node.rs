//! Output records of a collision BSP and their packed encodings.

use bitflags::bitflags;

use crate::{Plane2D, PlaneRef};

/// Child of a 3D node: another node, a leaf, or no geometry at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRef {
    /// Index into the 3D node table.
    Node(usize),
    /// Index into the leaf table.
    Leaf(usize),
    /// The subspace holds no geometry.
    Empty,
}

impl NodeRef {
    /// Packed value of [`NodeRef::Empty`].
    pub const EMPTY_BITS: u32 = 0x00FF_FFFF;

    /// Bit marking a leaf index in the packed value.
    pub const LEAF_BIT: u32 = 0x0080_0000;

    /// Largest node index that fits the packed field.
    pub const MAX_NODE_INDEX: usize = 0x007F_FFFF;

    /// Largest leaf index that fits the packed field without aliasing `Empty`.
    pub const MAX_LEAF_INDEX: usize = 0x007F_FFFE;

    /// Returns true for [`NodeRef::Empty`].
    #[inline]
    pub fn is_empty(self) -> bool {
        matches!(self, NodeRef::Empty)
    }

    /// Packs into the 24-bit child field (returned in the low bits).
    pub fn pack(self) -> u32 {
        match self {
            NodeRef::Node(index) => {
                debug_assert!(index <= Self::MAX_NODE_INDEX, "node index out of range");
                index as u32 & 0x007F_FFFF
            }
            NodeRef::Leaf(index) => {
                debug_assert!(index <= Self::MAX_LEAF_INDEX, "leaf index out of range");
                Self::LEAF_BIT | (index as u32 & 0x007F_FFFF)
            }
            NodeRef::Empty => Self::EMPTY_BITS,
        }
    }

    /// Inverse of [`NodeRef::pack`]; bits above the low 24 are ignored.
    pub fn unpack(bits: u32) -> Self {
        let bits = bits & 0x00FF_FFFF;
        if bits == Self::EMPTY_BITS {
            NodeRef::Empty
        } else if bits & Self::LEAF_BIT != 0 {
            NodeRef::Leaf((bits & !Self::LEAF_BIT) as usize)
        } else {
            NodeRef::Node(bits as usize)
        }
    }
}

/// An internal node of the 3D tree.
///
/// Space behind `plane` is described by `back`, space in front by `front`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bsp3dNode {
    pub plane: PlaneRef,
    pub back: NodeRef,
    pub front: NodeRef,
}

impl Bsp3dNode {
    /// Packs the node into its 8-byte record.
    ///
    /// Little-endian layout: plane (i16), back child (3 bytes), front child (3 bytes).
    pub fn pack(&self) -> u64 {
        let plane = u64::from(self.plane.pack() as u16);
        let back = u64::from(self.back.pack());
        let front = u64::from(self.front.pack());
        plane | (back << 16) | (front << 40)
    }

    /// Inverse of [`Bsp3dNode::pack`].
    pub fn unpack(value: u64) -> Self {
        Self {
            plane: PlaneRef::unpack(value as u16 as i16),
            back: NodeRef::unpack((value >> 16) as u32),
            front: NodeRef::unpack((value >> 40) as u32),
        }
    }

    /// Packed record as its eight little-endian bytes.
    pub fn to_bytes(&self) -> [u8; 8] {
        self.pack().to_le_bytes()
    }
}

bitflags! {
    /// Properties of a leaf derived from its surfaces.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct LeafFlags: u8 {
        /// At least one surface in the leaf is two-sided.
        const CONTAINS_DOUBLE_SIDED_SURFACES = 0b0000_0001;
    }
}

/// A convex terminal cell of the 3D tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Leaf {
    pub flags: LeafFlags,
    /// Number of consecutive 2D references owned by this leaf.
    pub bsp2d_reference_count: usize,
    /// First 2D reference owned by this leaf, if it has any.
    pub first_bsp2d_reference: Option<usize>,
}

impl Leaf {
    /// Indices of the 2D references owned by this leaf.
    pub fn bsp2d_references(&self) -> std::ops::Range<usize> {
        match self.first_bsp2d_reference {
            Some(first) => first..first + self.bsp2d_reference_count,
            None => 0..0,
        }
    }
}

/// Child of a 2D node: another 2D node or a single surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bsp2dChild {
    /// Index into the 2D node table.
    Node(usize),
    /// Index into the surface table.
    Surface(usize),
}

impl Bsp2dChild {
    /// Largest index that fits the packed 16-bit field.
    pub const MAX_INDEX: usize = 0x7FFF;

    /// Packs into a signed 16-bit field; the high bit marks a surface.
    pub fn pack(self) -> i16 {
        let raw = match self {
            Bsp2dChild::Node(index) => {
                debug_assert!(index <= Self::MAX_INDEX, "bsp2d node index out of range");
                index as u16 & 0x7FFF
            }
            Bsp2dChild::Surface(index) => {
                debug_assert!(index <= Self::MAX_INDEX, "surface index out of range");
                0x8000 | (index as u16 & 0x7FFF)
            }
        };
        raw as i16
    }

    /// Inverse of [`Bsp2dChild::pack`].
    pub fn unpack(raw: i16) -> Self {
        let raw = raw as u16;
        let index = usize::from(raw & 0x7FFF);
        if raw & 0x8000 != 0 {
            Bsp2dChild::Surface(index)
        } else {
            Bsp2dChild::Node(index)
        }
    }
}

/// A 2D node separating surfaces that share one supporting plane.
///
/// `left` holds the surfaces behind the line, `right` those in front.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bsp2dNode {
    pub plane: Plane2D,
    pub left: Bsp2dChild,
    pub right: Bsp2dChild,
}

/// Root of one leaf's 2D tree for a single supporting plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bsp2dReference {
    pub plane: PlaneRef,
    pub node: Bsp2dChild,
}
