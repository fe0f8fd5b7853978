//! Rho IR - shared runtime representation for the Rho interpreter.
//!
//! The external compiler produces everything in this crate; the runtime
//! (`rho_eval`) only ever consumes it:
//!
//! - [`Name`] / [`StringInterner`] - interned identifiers
//! - [`SymId`] / [`NodeId`] - stable indices into the symbol table and the
//!   statement-node arena
//! - [`NodeArena`] / [`NodeKind`] - the compiled statement tree
//! - [`RoutineMeta`] - formal parameters and body of a user routine
//! - [`KeywordSpec`] / [`BuiltinSpec`] - declared keyword tables for builtins
//! - [`DataType`] - numeric/string data-type tags and the widening lattice

mod dtype;
mod ids;
mod interner;
mod name;
mod node;
mod routine;

pub use dtype::DataType;
pub use ids::{ArgRange, ArmRange, NodeId, NodeRange, SymId};
pub use interner::StringInterner;
pub use name::Name;
pub use node::{Arg, CaseArm, Node, NodeArena, NodeKind, Operand};
pub use routine::{BuiltinSpec, KeywordDeclError, KeywordSpec, RoutineMeta, RoutineParam};
