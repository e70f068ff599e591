//! C8: the fixed-point driver (§4.7). Repeats simplification over a function's blocks in
//! reverse-postorder until no rewrite fires, bounded by `SimplifyConfig::max_iterations`
//! as a safety valve rather than an expected exit condition.

use crate::config::{PassSet, RepeatMask, SimplifyConfig};
use crate::diagnostics::DiagnosticSink;
use crate::function::Function;
use crate::insn::{BlockId, InsnId, Payload};
use crate::killer::{dead_insn, kill};
use crate::opcode::Opcode;
use crate::simplify::{insert_branch, insert_select, simplify_instruction};

pub struct Driver {
    config: SimplifyConfig,
}

impl Driver {
    pub fn new(config: SimplifyConfig) -> Self {
        Driver { config }
    }

    pub fn config(&self) -> &SimplifyConfig {
        &self.config
    }

    /// Runs canonicalization/algebraic/if-conversion rewrites plus dead-code elimination
    /// to a fixed point (§4.7). Returns the union of every repeat flag raised across all
    /// iterations, so a caller can decide whether to re-run a downstream pass such as
    /// CSE or symbol-table cleanup that lives outside this crate.
    pub fn run_to_fixed_point(&self, f: &mut Function, sink: &mut dyn DiagnosticSink) -> RepeatMask {
        let mut total = RepeatMask::empty();
        let mut iteration = 0u32;

        loop {
            let mut round = RepeatMask::empty();
            let order = f.reverse_postorder();

            for block_id in order {
                let insn_ids: Vec<InsnId> = f.block(block_id).insns.clone();
                for insn_id in insn_ids {
                    if self.config.enabled_passes.contains(PassSet::CANONICALIZE)
                        || self.config.enabled_passes.contains(PassSet::ALGEBRAIC)
                    {
                        let r = simplify_instruction(f, insn_id, &self.config, sink);
                        round |= r;
                    }
                }

                if self.config.enabled_passes.contains(PassSet::IF_CONVERT)
                    && try_if_convert(f, block_id, &mut round)
                {
                    // CFG just changed under us; the rest of this round's blocks are
                    // revisited on the next outer iteration instead of continuing here.
                }

                if self.config.enabled_passes.contains(PassSet::DCE) {
                    let insn_ids: Vec<InsnId> = f.block(block_id).insns.clone();
                    for insn_id in insn_ids {
                        if dead_insn(f, insn_id) {
                            kill(f, insn_id, false, &mut round);
                        }
                    }
                }
            }

            total |= round;
            iteration += 1;
            log::debug!(
                "fixed-point iteration {} on `{}`: repeat={:?}",
                iteration,
                f.name,
                round
            );

            if round.is_empty() || iteration >= self.config.max_iterations {
                if iteration >= self.config.max_iterations && !round.is_empty() {
                    log::warn!(
                        "`{}` did not reach a fixed point within {} iterations",
                        f.name,
                        self.config.max_iterations
                    );
                }
                break;
            }
        }

        total
    }
}

/// §4.6.7's if-conversion: a diamond where both arms are empty except for an
/// unconditional jump to the same merge block collapses into the entry block directly,
/// replacing each φ in the merge block with a `SEL` keyed on the diamond's condition.
///
/// Recognizes exactly `entry: cbr c -> (b1, b2)`, `b1: br m` (b1's only insn, entry its
/// only pred), `b2: br m` (same shape), `m`'s preds == {b1, b2}. Leaves `b1`/`b2` as
/// unreachable arena entries rather than compacting block ids, mirroring how a killed
/// instruction keeps its arena slot (§9 Design Notes).
fn try_if_convert(f: &mut Function, entry: BlockId, repeat: &mut RepeatMask) -> bool {
    let Some(&term_id) = f.block(entry).insns.last() else { return false };
    if f.insn(term_id).opcode != Opcode::Cbr {
        return false;
    }
    let (b1, b2) = match &f.insn(term_id).payload {
        Payload::Terminator { cond: Some(_), targets, .. } if targets.len() == 2 => (targets[0], targets[1]),
        _ => return false,
    };

    let trivial_br_target = |f: &Function, b: BlockId| -> Option<BlockId> {
        let blk = f.block(b);
        if blk.preds != [entry] || blk.insns.len() != 1 {
            return None;
        }
        let only = f.insn(blk.insns[0]);
        match (&only.opcode, &only.payload) {
            (Opcode::Br, Payload::Terminator { targets, .. }) if targets.len() == 1 => Some(targets[0]),
            _ => None,
        }
    };
    let Some(m1) = trivial_br_target(f, b1) else { return false };
    let Some(m2) = trivial_br_target(f, b2) else { return false };
    if m1 != m2 {
        return false;
    }
    let merge = m1;
    {
        let preds = &f.block(merge).preds;
        if preds.len() != 2 || !preds.contains(&b1) || !preds.contains(&b2) {
            return false;
        }
    }

    let phi_ids: Vec<InsnId> =
        f.block(merge).insns.iter().copied().filter(|&i| f.insn(i).opcode == Opcode::Phi).collect();
    if phi_ids.is_empty() {
        return false;
    }

    for phi in phi_ids {
        let sources = match &f.insn(phi).payload {
            Payload::Phi { sources } => sources.clone(),
            _ => continue,
        };
        let v1 = sources.iter().find(|(b, _)| *b == b1).map(|(_, v)| *v);
        let v2 = sources.iter().find(|(b, _)| *b == b2).map(|(_, v)| *v);
        let (Some(if_true), Some(if_false)) = (v1, v2) else { continue };
        insert_select(f, entry, term_id, phi, if_true, if_false, repeat);
    }

    insert_branch(f, entry, term_id, merge, repeat);

    f.block_mut(b1).remove_pred(entry);
    f.block_mut(b2).remove_pred(entry);
    f.block_mut(merge).remove_pred(b1);
    f.block_mut(merge).remove_pred(b2);
    f.block_mut(merge).add_pred(entry);

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::NullSink;
    use crate::insn::{IrType, Payload, SourcePos};
    use crate::opcode::Opcode;
    use crate::pseudo::Pseudo;

    #[test]
    fn constant_chain_folds_to_a_single_value_and_dce_removes_the_rest() {
        let mut f = Function::new("f");
        let a = f.alloc_insn(
            f.entry,
            Opcode::Add,
            IrType::int(32, true),
            Payload::Binary { lhs: Pseudo::Val(2), rhs: Pseudo::Val(3) },
            SourcePos::default(),
        );
        let b = f.alloc_insn(
            f.entry,
            Opcode::Mul,
            IrType::int(32, true),
            Payload::Binary { lhs: Pseudo::Reg(a), rhs: Pseudo::Val(10) },
            SourcePos::default(),
        );
        f.alloc_insn(
            f.entry,
            Opcode::Ret,
            IrType::int(32, true),
            Payload::Terminator { cond: Some(Pseudo::Reg(b)), targets: vec![], switch_arms: vec![] },
            SourcePos::default(),
        );

        let driver = Driver::new(SimplifyConfig::default());
        let mut sink = NullSink;
        driver.run_to_fixed_point(&mut f, &mut sink);

        assert_eq!(f.get_operand(*f.block(f.entry).insns.last().unwrap(), crate::insn::Slot::Src1), Some(Pseudo::Val(50)));
    }

    #[test]
    fn bounded_by_max_iterations() {
        let mut config = SimplifyConfig::default();
        config.max_iterations = 1;
        let mut f = Function::new("f");
        f.alloc_insn(
            f.entry,
            Opcode::Ret,
            IrType::int(32, true),
            Payload::Terminator { cond: None, targets: vec![], switch_arms: vec![] },
            SourcePos::default(),
        );
        let driver = Driver::new(config);
        let mut sink = NullSink;
        driver.run_to_fixed_point(&mut f, &mut sink);
    }
}
