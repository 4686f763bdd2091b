//! Local rewrites that expose equality chains to the finder.
//!
//! Compilers often stage a constant through a temporary before comparing it:
//!
//! ```text
//! const-class v3, LA;
//! move-object v1, v3
//! if-eq v0, v1
//! ```
//!
//! A chain block may only contain constant loads, so such moves are turned back into loads.

use std::collections::BTreeMap;

use crate::{
    analysis::ControlFlowGraph,
    assembly::{Insn, Reg},
};

/// Replaces moves of block-local constants with a fresh load of the same constant.
///
/// Within each block, a `move`/`move-object` whose source was last written by a constant load
/// earlier in the same block becomes that load into the move's destination. Returns the number
/// of moves replaced.
pub fn simplify_moves(cfg: &mut ControlFlowGraph) -> usize {
    let mut replaced = 0;
    for block in cfg.blocks_mut() {
        let mut loads: BTreeMap<Reg, Insn> = BTreeMap::new();
        for insn in block.insns_mut().iter_mut() {
            if let Insn::Move { dest, src } | Insn::MoveObject { dest, src } = *insn {
                if let Some(load) = loads.get(&src).and_then(|load| reload(load, dest)) {
                    *insn = load;
                    replaced += 1;
                }
            }

            let Some(dest) = insn.dest() else {
                continue;
            };
            if insn.is_const_load() {
                loads.insert(dest, insn.clone());
            } else {
                loads.remove(&dest);
            }
        }
    }
    replaced
}

fn reload(load: &Insn, dest: Reg) -> Option<Insn> {
    match load {
        Insn::Const { literal, .. } => Some(Insn::Const {
            dest,
            literal: *literal,
        }),
        Insn::ConstString { value, .. } => Some(Insn::ConstString {
            dest,
            value: value.clone(),
        }),
        Insn::ConstClass { ty, .. } => Some(Insn::ConstClass {
            dest,
            ty: ty.clone(),
        }),
        _ => None,
    }
}
