//! Index newtypes for the symbol table and statement-node arena.
//!
//! All four follow the same pattern: a `u32` index with `u32::MAX` reserved
//! as an invalid sentinel, so an "unset" slot costs nothing over a set one.

use std::fmt;

/// Stable index of a symbol-table slot.
///
/// A `SymId` stays valid for the life of the slot; zapping a symbol marks the
/// slot `Unused` but the id may be reissued by a later allocation.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct SymId(u32);

impl SymId {
    /// Invalid symbol id (sentinel for "no symbol").
    pub const INVALID: SymId = SymId(u32::MAX);

    /// Create a new `SymId`.
    #[inline]
    pub const fn new(index: u32) -> Self {
        SymId(index)
    }

    /// Index into the symbol table.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Raw u32 value.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Check if this id refers to a symbol at all.
    #[inline]
    pub const fn is_valid(self) -> bool {
        self.0 != u32::MAX
    }
}

impl fmt::Debug for SymId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "SymId({})", self.0)
        } else {
            write!(f, "SymId::INVALID")
        }
    }
}

impl Default for SymId {
    fn default() -> Self {
        Self::INVALID
    }
}

/// Index of a statement node in the [`NodeArena`](crate::NodeArena).
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
#[repr(transparent)]
pub struct NodeId(u32);

impl NodeId {
    /// Invalid node id (sentinel value).
    pub const INVALID: NodeId = NodeId(u32::MAX);

    /// Create a new `NodeId`.
    #[inline]
    pub const fn new(index: u32) -> Self {
        NodeId(index)
    }

    /// Index into the arena.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Raw u32 value.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Check if this is a valid id.
    #[inline]
    pub const fn is_valid(self) -> bool {
        self.0 != u32::MAX
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "NodeId({})", self.0)
        } else {
            write!(f, "NodeId::INVALID")
        }
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::INVALID
    }
}

/// Contiguous range in the arena's flat statement-list pool.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct NodeRange {
    pub start: u32,
    pub len: u32,
}

impl NodeRange {
    /// Empty range.
    pub const EMPTY: NodeRange = NodeRange { start: 0, len: 0 };

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.len == 0
    }
}

/// Contiguous range in the arena's flat argument pool.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct ArgRange {
    pub start: u32,
    pub len: u32,
}

impl ArgRange {
    /// Empty range (a call with no arguments).
    pub const EMPTY: ArgRange = ArgRange { start: 0, len: 0 };

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.len == 0
    }
}

/// Contiguous range in the arena's flat case-arm pool.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct ArmRange {
    pub start: u32,
    pub len: u32,
}

impl ArmRange {
    /// Empty range.
    pub const EMPTY: ArmRange = ArmRange { start: 0, len: 0 };

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.len == 0
    }
}
