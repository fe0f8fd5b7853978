//! Rho Eval - Statement execution engine for the Rho runtime.
//!
//! This crate runs compiled statement trees against a symbol table. It is
//! the interactive half of the system: the external compiler lowers source
//! text into `rho_ir` nodes, and everything here executes them one
//! statement at a time.
//!
//! # Architecture
//!
//! - `SymbolTable`: slot arena, temporary allocator, and embedded-ownership
//!   bookkeeping
//! - `replace`: the assignment engine (move vs. copy, scalar-pointer
//!   stores)
//! - `call`: argument binding for builtin and user routines
//! - `ParamSnapshot`: the recursion guard around formal-parameter rows
//! - `exec`: the recursive statement dispatcher
//! - `Interp`: the state container tying the pieces together

pub mod call;
pub mod errors;
mod exec;
pub mod interpreter;
mod recursion;
pub mod replace;
pub mod symtab;

pub use call::{BoundArgs, Builtin, BuiltinFn};
pub use errors::{Control, ErrorClass, ExecError, ExecErrorKind, Status, ValueResult};
pub use interpreter::{CompiledRoutine, Interp, InterpBuilder, RoutineCompiler, RoutineKind};
pub use recursion::ParamSnapshot;
pub use replace::{deep_copy, replace, take_over};
pub use symtab::{
    ArrayData, ArrayPayload, Context, FormatCache, PointerSlot, ScalarCell, ScalarValue, SymClass,
    SymFlags, Symbol, SymbolTable,
};
