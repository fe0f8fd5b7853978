//! Recursion safety for user-routine calls.
//!
//! Formal parameters live in the routine's own symbol rows, shared by every
//! invocation. Before a call rebinds them to its actual arguments, the full
//! row contents are snapshotted; after the call completes — success, error,
//! or early return — every row is restored in parameter order. Each call
//! frame therefore owns an independent snapshot, which is what makes direct
//! and indirect recursion safe without a per-call parameter table.

use smallvec::SmallVec;

use rho_ir::{RoutineParam, SymId};

use crate::symtab::{Symbol, SymbolTable};

/// Saved formal-parameter rows of one call frame.
pub struct ParamSnapshot {
    rows: SmallVec<[(SymId, Symbol); 4]>,
}

impl ParamSnapshot {
    /// Capture the current row contents of every formal parameter.
    pub fn capture(table: &SymbolTable, params: &[RoutineParam]) -> Self {
        ParamSnapshot {
            rows: params
                .iter()
                .map(|p| (p.sym, table.get(p.sym).clone()))
                .collect(),
        }
    }

    /// Restore every saved row, in parameter order.
    ///
    /// Callers run this on every exit path of the wrapped call.
    pub fn restore(self, table: &mut SymbolTable) {
        for (id, row) in self.rows {
            *table.get_mut(id) = row;
        }
    }
}
