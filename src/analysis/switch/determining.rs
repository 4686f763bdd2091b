//! Discriminant register lookup for equality branches.

use crate::{
    analysis::{dataflow::ConstantFixpoint, BlockId, ControlFlowGraph},
    assembly::{Insn, Reg},
};

/// Returns the operands of an `if-eq`/`if-ne` instruction.
pub(crate) fn equality_operands(insn: &Insn) -> Option<(Reg, Reg)> {
    match insn {
        Insn::IfEq { left, right } | Insn::IfNe { left, right } => Some((*left, *right)),
        _ => None,
    }
}

/// Finds the register an equality branch at the end of `block` discriminates on.
///
/// The branch must compare a register whose value is statically unknown against one holding a
/// known constant; the unknown operand is returned. Returns `None` for any other shape,
/// including comparisons where both or neither operand is known.
#[must_use]
pub fn find_determining_reg(
    fixpoint: &ConstantFixpoint,
    cfg: &ControlFlowGraph,
    block: BlockId,
) -> Option<Reg> {
    let insns = cfg.block(block)?.insns();
    let index = insns.len().checked_sub(1)?;
    let (left, right) = equality_operands(&insns[index])?;
    if left == right {
        return None;
    }

    let env = fixpoint.env_before(cfg, block, index)?;
    match (env.get(left).is_some(), env.get(right).is_some()) {
        (false, true) => Some(left),
        (true, false) => Some(right),
        _ => None,
    }
}
