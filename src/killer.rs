//! C5: instruction death, including the cascading kill that follows a dead def's
//! operands back to their own defs (§4.5).

use crate::config::RepeatMask;
use crate::function::Function;
use crate::insn::InsnId;
use crate::pseudo::Pseudo;
use crate::usedef::operand_slots;

fn defining_insn(p: Pseudo) -> Option<InsnId> {
    match p {
        Pseudo::Reg(id) | Pseudo::Phi(id) => Some(id),
        _ => None,
    }
}

/// True if `id` could be killed right now: not already dead, no side effects, and
/// (for value-producing instructions) no remaining users. STORE, volatile LOAD, and
/// impure CALL never qualify regardless of `target`'s use count (§4.5).
pub fn dead_insn(f: &Function, id: InsnId) -> bool {
    let insn = f.insn(id);
    if insn.dead {
        return false;
    }
    if insn.has_side_effects() {
        return false;
    }
    if insn.target.is_void() {
        return true;
    }
    !f.pseudos.has_users(insn.target)
}

/// Kills `id`: marks it dead, drops it from its block's order, and releases its uses of
/// every operand. When releasing an operand's last use empties that operand's own
/// defining instruction of users, the kill cascades into that def too (§4.5's "killing
/// an instruction can make its operands' defining instructions dead in turn").
///
/// Returns `false` without doing anything if `id` has side effects and `force` is not
/// set (STORE is never killed this way; use `force` only when a whole block is proven
/// unreachable).
pub fn kill(f: &mut Function, id: InsnId, force: bool, repeat: &mut RepeatMask) -> bool {
    if f.insn(id).dead {
        return true;
    }
    if !force && f.insn(id).has_side_effects() {
        return false;
    }

    let was_terminator = f.insn(id).opcode.is_terminator();
    let operands = operand_slots(f.insn(id));

    f.insn_mut(id).dead = true;
    let block = f.insn(id).block;
    f.block_mut(block).remove(id);

    if was_terminator {
        repeat.insert(RepeatMask::CFG_CLEANUP);
    }
    if f.insn(id).target.is_sym() {
        repeat.insert(RepeatMask::SYMBOL_CLEANUP);
    }

    for (slot, operand) in operands {
        let emptied = f.kill_use(operand, id, slot);
        if emptied {
            if operand.is_sym() {
                repeat.insert(RepeatMask::SYMBOL_CLEANUP);
            }
            if let Some(def_id) = defining_insn(operand) {
                if dead_insn(f, def_id) {
                    kill(f, def_id, false, repeat);
                }
            }
        }
    }

    true
}
