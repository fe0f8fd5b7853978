//! Compiled statement-tree nodes.
//!
//! The external compiler lowers source text into a flat [`NodeArena`]; the
//! dispatcher in `rho_eval` walks it by [`NodeId`]. Nested statement lists,
//! argument lists, and case arms live in flat side pools addressed by range,
//! so a `Node` stays small and `Copy`.

use crate::{ArgRange, ArmRange, Name, NodeId, NodeRange, SymId};

/// What a value position in a statement evaluates to.
///
/// The compiler resolves every value position either to a symbol it created
/// (a literal constant or a named variable slot) or to a value-producing
/// call node.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Operand {
    /// An existing symbol: literal constant, named variable, or formal
    /// parameter (a Transfer symbol).
    Sym(SymId),
    /// A call node whose result symbol is the value.
    Node(NodeId),
}

/// One actual argument of a call.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct Arg {
    pub value: Operand,
    /// `Some` for a keyword-tagged argument (`/FOO`, `NAME=value`).
    pub keyword: Option<Name>,
}

impl Arg {
    /// A plain positional argument.
    #[inline]
    pub const fn positional(value: Operand) -> Self {
        Arg {
            value,
            keyword: None,
        }
    }

    /// A keyword-tagged argument.
    #[inline]
    pub const fn keyword(name: Name, value: Operand) -> Self {
        Arg {
            value,
            keyword: Some(name),
        }
    }
}

/// One arm of a `Case` statement: run `body` when `guard` is true.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct CaseArm {
    pub guard: Operand,
    pub body: NodeId,
}

/// Statement-node kinds consumed by the dispatcher.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum NodeKind {
    /// No-op statement (empty body positions).
    Nop,
    /// Execute a statement list in order.
    Block(NodeRange),
    /// Assignment: bind the source value to the target symbol.
    Replace { target: SymId, source: Operand },
    /// Call a builtin routine through its declared keyword table.
    InternalCall { routine: Name, args: ArgRange },
    /// Call a user-defined subroutine or function by name.
    UserCall { routine: Name, args: ArgRange },
    /// Call a user-defined code block by name.
    CodeBlockCall { routine: Name, args: ArgRange },
    /// Two-way branch on a scalar condition.
    If {
        cond: Operand,
        then_branch: NodeId,
        else_branch: Option<NodeId>,
    },
    /// Guard-per-arm case: first true guard wins.
    Case {
        arms: ArmRange,
        default: Option<NodeId>,
    },
    /// Index-selected case: selector picks a branch, out of range runs the
    /// default.
    NumericCase {
        selector: Operand,
        branches: NodeRange,
        default: Option<NodeId>,
    },
    /// Counted loop over a scalar counter symbol.
    For {
        counter: SymId,
        start: Operand,
        end: Operand,
        /// Defaults to 1 when absent.
        step: Option<Operand>,
        body: NodeId,
    },
    /// Body first, exit when `until` becomes true.
    Repeat { body: NodeId, until: Operand },
    /// Condition first, body while true.
    WhileDo { cond: Operand, body: NodeId },
    /// Body first, repeat while `cond` stays true.
    DoWhile { body: NodeId, cond: Operand },
    /// Return from the enclosing routine, with a value only inside a
    /// function.
    Return { value: Option<Operand> },
    /// Leave the innermost loop.
    Break,
    /// Skip to the innermost loop's next condition check.
    Continue,
    /// Unwind every routine frame back to the top level.
    ReturnAll,
}

/// A compiled statement node.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct Node {
    pub kind: NodeKind,
    /// Source line the statement came from, for diagnostics.
    pub line: u32,
}

/// Flat arena of statement nodes and their side pools.
#[derive(Default)]
pub struct NodeArena {
    nodes: Vec<Node>,
    stmt_lists: Vec<NodeId>,
    args: Vec<Arg>,
    arms: Vec<CaseArm>,
}

impl NodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a node, returning its id.
    pub fn alloc(&mut self, kind: NodeKind, line: u32) -> NodeId {
        let id = NodeId::new(u32::try_from(self.nodes.len()).unwrap_or(u32::MAX));
        self.nodes.push(Node { kind, line });
        id
    }

    /// Store a statement list in the flat pool.
    pub fn alloc_stmt_list(&mut self, stmts: &[NodeId]) -> NodeRange {
        let start = u32::try_from(self.stmt_lists.len()).unwrap_or(u32::MAX);
        self.stmt_lists.extend_from_slice(stmts);
        NodeRange {
            start,
            len: u32::try_from(stmts.len()).unwrap_or(u32::MAX),
        }
    }

    /// Store an argument list in the flat pool.
    pub fn alloc_args(&mut self, args: &[Arg]) -> ArgRange {
        let start = u32::try_from(self.args.len()).unwrap_or(u32::MAX);
        self.args.extend_from_slice(args);
        ArgRange {
            start,
            len: u32::try_from(args.len()).unwrap_or(u32::MAX),
        }
    }

    /// Store a list of case arms in the flat pool.
    pub fn alloc_arms(&mut self, arms: &[CaseArm]) -> ArmRange {
        let start = u32::try_from(self.arms.len()).unwrap_or(u32::MAX);
        self.arms.extend_from_slice(arms);
        ArmRange {
            start,
            len: u32::try_from(arms.len()).unwrap_or(u32::MAX),
        }
    }

    /// Get a node by id.
    #[inline]
    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    /// Resolve a statement-list range.
    #[inline]
    pub fn stmt_list(&self, range: NodeRange) -> &[NodeId] {
        let start = range.start as usize;
        &self.stmt_lists[start..start + range.len as usize]
    }

    /// Resolve an argument range.
    #[inline]
    pub fn args(&self, range: ArgRange) -> &[Arg] {
        let start = range.start as usize;
        &self.args[start..start + range.len as usize]
    }

    /// Resolve a case-arm range.
    #[inline]
    pub fn arms(&self, range: ArmRange) -> &[CaseArm] {
        let start = range.start as usize;
        &self.arms[start..start + range.len as usize]
    }

    /// Number of allocated nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
