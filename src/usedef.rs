//! C4: use-list maintenance primitives (§4.3).
//!
//! Every rewrite that changes an operand goes through `switch_pseudo` or
//! `replace_target` so the registry's use lists never drift from the payloads that
//! actually reference a pseudo.

use smallvec::SmallVec;

use crate::function::Function;
use crate::insn::{Insn, InsnId, Payload, Slot};
use crate::pseudo::Pseudo;

/// Enumerates every (slot, operand) pair an instruction's payload holds, in a stable
/// order. This is the single place that knows how to walk each payload shape, so both
/// use-list registration (`Function::alloc_insn`) and validation (`Function::validate`)
/// stay in sync by construction.
pub fn operand_slots(insn: &Insn) -> Vec<(Slot, Pseudo)> {
    let mut out = Vec::new();
    match &insn.payload {
        Payload::Terminator { cond, .. } => {
            if let Some(c) = cond {
                out.push((Slot::Src1, *c));
            }
        }
        Payload::Binary { lhs, rhs } => {
            out.push((Slot::Src1, *lhs));
            out.push((Slot::Src2, *rhs));
        }
        Payload::Unary { src } => out.push((Slot::Src1, *src)),
        Payload::Select { cond, if_true, if_false } => {
            out.push((Slot::Src1, *cond));
            out.push((Slot::Src2, *if_true));
            out.push((Slot::Src3, *if_false));
        }
        Payload::Load { addr, .. } => out.push((Slot::Base, *addr)),
        Payload::Store { addr, value, .. } => {
            out.push((Slot::Base, *addr));
            out.push((Slot::Src1, *value));
        }
        Payload::SetVal { value } => out.push((Slot::Src1, *value)),
        Payload::SymAddr { sym, .. } => out.push((Slot::Base, *sym)),
        Payload::Phi { sources } => {
            for (i, (_, v)) in sources.iter().enumerate() {
                out.push((Slot::Indexed(i as u16), *v));
            }
        }
        Payload::PhiSource { value, .. } => out.push((Slot::Src1, *value)),
        Payload::Cast { src, .. } => out.push((Slot::Src1, *src)),
        Payload::Call { callee, args, .. } => {
            out.push((Slot::Base, *callee));
            for (i, a) in args.iter().enumerate() {
                out.push((Slot::Indexed(i as u16), *a));
            }
        }
        Payload::Opaque { operand } => {
            if let Some(o) = operand {
                out.push((Slot::Src1, *o));
            }
        }
    }
    out
}

/// Mutable access to a single operand slot, mirroring `operand_slots`'s shape knowledge.
fn operand_mut<'a>(payload: &'a mut Payload, slot: Slot) -> Option<&'a mut Pseudo> {
    match (payload, slot) {
        (Payload::Terminator { cond, .. }, Slot::Src1) => cond.as_mut(),
        (Payload::Binary { lhs, .. }, Slot::Src1) => Some(lhs),
        (Payload::Binary { rhs, .. }, Slot::Src2) => Some(rhs),
        (Payload::Unary { src }, Slot::Src1) => Some(src),
        (Payload::Select { cond, .. }, Slot::Src1) => Some(cond),
        (Payload::Select { if_true, .. }, Slot::Src2) => Some(if_true),
        (Payload::Select { if_false, .. }, Slot::Src3) => Some(if_false),
        (Payload::Load { addr, .. }, Slot::Base) => Some(addr),
        (Payload::Store { addr, .. }, Slot::Base) => Some(addr),
        (Payload::Store { value, .. }, Slot::Src1) => Some(value),
        (Payload::SetVal { value }, Slot::Src1) => Some(value),
        (Payload::SymAddr { sym, .. }, Slot::Base) => Some(sym),
        (Payload::Phi { sources }, Slot::Indexed(i)) => sources.get_mut(i as usize).map(|(_, v)| v),
        (Payload::PhiSource { value, .. }, Slot::Src1) => Some(value),
        (Payload::Cast { src, .. }, Slot::Src1) => Some(src),
        (Payload::Call { callee, .. }, Slot::Base) => Some(callee),
        (Payload::Call { args, .. }, Slot::Indexed(i)) => args.get_mut(i as usize),
        (Payload::Opaque { operand }, Slot::Src1) => operand.as_mut(),
        _ => None,
    }
}

impl Function {
    pub fn get_operand(&self, insn: InsnId, slot: Slot) -> Option<Pseudo> {
        operand_slots(self.insn(insn)).into_iter().find(|&(s, _)| s == slot).map(|(_, p)| p)
    }

    /// Writes `new` into `insn`'s `slot`, updating the registry's use lists so the old
    /// operand loses this use site and the new one gains it. This is the one place a
    /// rewrite should touch an operand directly (§4.3's `use`/`remove_use` pair, fused).
    pub fn switch_pseudo(&mut self, insn: InsnId, slot: Slot, new: Pseudo) {
        let old = self.get_operand(insn, slot);
        debug_assert!(old.is_some(), "{slot:?} has no operand on {insn:?}'s payload shape");
        if let Some(p) = operand_mut(&mut self.insn_mut(insn).payload, slot) {
            *p = new;
        }
        if let Some(old) = old {
            self.pseudos.remove_user(old, insn, slot);
        }
        self.pseudos.add_user(new, insn, slot);
    }

    /// Registers `insn`'s use of `pseudo` at `slot` without touching the payload —
    /// used when a payload is constructed directly (outside `alloc_insn`'s bulk
    /// registration), e.g. when growing a PHI's source list.
    pub fn use_(&mut self, pseudo: Pseudo, insn: InsnId, slot: Slot) {
        self.pseudos.add_user(pseudo, insn, slot);
    }

    /// Unregisters one use site without touching the payload; callers that are about to
    /// kill the instruction outright use this instead of `switch_pseudo` since there is
    /// no replacement operand to install.
    pub fn remove_use(&mut self, pseudo: Pseudo, insn: InsnId, slot: Slot) {
        self.pseudos.remove_user(pseudo, insn, slot);
    }

    /// Drops `insn`'s use of `pseudo` at `slot` and reports whether that was the
    /// pseudo's last remaining use. The killer uses this to decide whether to cascade
    /// into the pseudo's defining instruction (§4.5).
    pub fn kill_use(&mut self, pseudo: Pseudo, insn: InsnId, slot: Slot) -> bool {
        self.remove_use(pseudo, insn, slot);
        pseudo.has_use_list() && !self.pseudos.has_users(pseudo)
    }

    /// Redirects every current use of `from` to `to` in one pass (§4.3): the canonical
    /// operation behind CSE and copy propagation. Returns the number of use sites moved.
    pub fn replace_target(&mut self, from: Pseudo, to: Pseudo) -> usize {
        if from == to {
            return 0;
        }
        let sites: SmallVec<[(InsnId, Slot); 4]> = self.pseudos.take_users(from);
        let moved = sites.len();
        for &(insn, slot) in &sites {
            if let Some(p) = operand_mut(&mut self.insn_mut(insn).payload, slot) {
                *p = to;
            }
        }
        self.pseudos.set_users(to, sites);
        moved
    }
}
