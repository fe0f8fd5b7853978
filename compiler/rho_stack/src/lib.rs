//! Host-stack growth for deep script recursion.
//!
//! The dispatcher's own call stack is the interpreter's call stack: one host
//! frame per nested statement or routine call. Deeply recursive scripts would
//! otherwise overflow the host stack, so the dispatcher wraps its recursive
//! entry in [`ensure_sufficient_stack`], which grows the stack on demand via
//! `stacker` on native targets and is a no-op on WASM.

/// Minimum stack space to keep available (100KB red zone).
const RED_ZONE: usize = 100 * 1024;

/// Stack space to allocate when growing (1MB per growth).
const STACK_PER_RECURSION: usize = 1024 * 1024;

/// Ensure sufficient stack space is available before executing `f`.
///
/// If less than the red zone remains, additional stack is allocated before
/// `f` runs, so a recursive dispatcher call cannot overflow the host stack.
#[cfg(not(target_family = "wasm"))]
#[inline]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

/// WASM passthrough: the WASM runtime manages its own stack.
#[cfg(target_family = "wasm")]
#[inline]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    let _ = (RED_ZONE, STACK_PER_RECURSION);
    f()
}
