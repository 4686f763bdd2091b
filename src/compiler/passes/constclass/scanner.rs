//! Cheap pre-filter deciding which methods are worth matching.

use crate::{analysis::ControlFlowGraph, metadata::DexMethod};

/// Returns `true` if `method` may contain a chain with at least `min_cases` cases.
///
/// Rejects methods that must not be optimized, have no code, contain exception handlers,
/// have no `if-eq`/`if-ne`, or load fewer than `min_cases` class constants. Every method a
/// matcher could accept passes this filter.
#[must_use]
pub fn should_consider_method(method: &DexMethod, min_cases: usize) -> bool {
    if method.no_optimizations {
        return false;
    }
    method
        .code()
        .is_some_and(|code| should_consider_code(code, min_cases))
}

fn should_consider_code(code: &ControlFlowGraph, min_cases: usize) -> bool {
    let mut has_equality_branch = false;
    for block in code.blocks() {
        if block.is_catch() {
            return false;
        }
        has_equality_branch |= block.ends_in_equality_branch();
    }
    has_equality_branch && code.count_const_class() >= min_cases
}
