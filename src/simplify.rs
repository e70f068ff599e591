//! C7: the opcode-dispatched instruction simplifier (§4.6). One function per operand
//! shape, matching `insn::Payload`'s grouping; `simplify_instruction` dispatches by
//! opcode range exactly as `opcode::Opcode`'s range helpers intend.

use crate::config::{RepeatMask, SimplifyConfig};
use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink};
use crate::eval::{eval_binary, eval_unary};
use crate::function::Function;
use crate::insn::{BlockId, InsnId, IrType, Payload, Slot};
use crate::killer::{dead_insn, kill};
use crate::opcode::Opcode;
use crate::pseudo::Pseudo;

/// Runs every applicable rewrite rule against `id` once. Returns the repeat flags the
/// rewrite(s) require the driver to act on; an empty mask means nothing changed.
///
/// Per §4.7 this never fails: an inapplicable rule is simply skipped, and a rule that
/// would require undefined-semantics folding declines and reports a diagnostic instead
/// of guessing.
pub fn simplify_instruction(
    f: &mut Function,
    id: InsnId,
    config: &SimplifyConfig,
    sink: &mut dyn DiagnosticSink,
) -> RepeatMask {
    if f.insn(id).dead {
        return RepeatMask::empty();
    }
    let opcode = f.insn(id).opcode;
    let mut repeat = RepeatMask::empty();

    if opcode.is_binop() || opcode.is_compare() {
        simplify_binop(f, id, config, sink, &mut repeat);
    } else if opcode.is_unary() {
        simplify_unop(f, id, &mut repeat);
    } else if opcode.is_cast() {
        simplify_cast(f, id, &mut repeat);
    } else {
        match opcode {
            Opcode::Load | Opcode::Store => simplify_memory(f, id, config, sink, &mut repeat),
            Opcode::Sel => simplify_select(f, id, &mut repeat),
            Opcode::Phi => simplify_phi(f, id, &mut repeat),
            Opcode::Cbr => simplify_branch(f, id, &mut repeat),
            Opcode::Switch => simplify_switch(f, id, &mut repeat),
            Opcode::Range => simplify_range(f, id, config, &mut repeat),
            _ => {}
        }
    }

    repeat
}

fn as_val(_f: &Function, p: Pseudo) -> Option<i64> {
    p.as_val()
}

/// Whether negating the constant `c` at `ty`'s width stays representable — skips the
/// sign-bit-only pattern (e.g. `i8::MIN`) that negation can't invert.
fn negate_in_type(c: i64, ty: IrType) -> Option<i64> {
    if crate::eval::is_signed_min(c, ty) {
        None
    } else {
        Some(crate::eval::truncate(c.wrapping_neg(), ty))
    }
}

/// §4.6.1: canonical order puts a VAL operand rightmost, then SYM, then REG/ARG/PHI —
/// `Pseudo::canonical_rank` encodes that order. A commutative opcode swaps operands in
/// place; a non-commutative compare swaps operands too but must flip to its mirror
/// opcode (`a < b` swapped is `b > a`, not `b < a`).
fn canonicalize_binop(f: &mut Function, id: InsnId) -> bool {
    let opcode = f.insn(id).opcode;
    let mirrored = opcode.mirror();
    if !opcode.is_commutative() && mirrored.is_none() {
        return false;
    }
    let (lhs, rhs) = match &f.insn(id).payload {
        Payload::Binary { lhs, rhs } => (*lhs, *rhs),
        _ => return false,
    };
    if lhs.canonical_rank() > rhs.canonical_rank() {
        if let Some(mirrored) = mirrored {
            f.insn_mut(id).opcode = mirrored;
        }
        f.switch_pseudo(id, Slot::Src1, rhs);
        f.switch_pseudo(id, Slot::Src2, lhs);
        true
    } else {
        false
    }
}

/// Collapses `id` to a plain value: every current use of its `target` pseudo is
/// redirected to `value`, then its payload is cleared to `Opaque` so the instruction
/// becomes a no-op the killer can later remove. Clearing the payload also means its old
/// operands must be unregistered here, or their use lists would outlive the payload that
/// referenced them.
fn replace_with_value(f: &mut Function, id: InsnId, value: Pseudo, repeat: &mut RepeatMask) {
    let target = f.insn(id).target;
    if target.is_sym() || value.is_sym() {
        repeat.insert(RepeatMask::SYMBOL_CLEANUP);
    }
    f.replace_target(target, value);
    for (slot, operand) in crate::usedef::operand_slots(f.insn(id)) {
        f.remove_use(operand, id, slot);
    }
    f.insn_mut(id).payload = Payload::Opaque { operand: None };
    f.insn_mut(id).opcode = Opcode::Nop;
    repeat.insert(RepeatMask::CSE);
}

fn simplify_binop(
    f: &mut Function,
    id: InsnId,
    config: &SimplifyConfig,
    sink: &mut dyn DiagnosticSink,
    repeat: &mut RepeatMask,
) {
    if canonicalize_binop(f, id) {
        repeat.insert(RepeatMask::CSE);
    }

    let opcode = f.insn(id).opcode;
    let (lhs, rhs) = match &f.insn(id).payload {
        Payload::Binary { lhs, rhs } => (*lhs, *rhs),
        _ => return,
    };
    let ty = f.insn(id).ty;

    if let (Some(l), Some(r)) = (as_val(f, lhs), as_val(f, rhs)) {
        match eval_binary(opcode, l, r, ty) {
            Some(folded) => {
                replace_with_value(f, id, Pseudo::Val(folded), repeat);
                return;
            }
            None => {
                let kind = match opcode {
                    Opcode::DivS | Opcode::DivU | Opcode::ModS | Opcode::ModU if r == 0 => {
                        Some(DiagnosticKind::DivideByZero)
                    }
                    Opcode::Shl | Opcode::Lsr | Opcode::Asr => Some(DiagnosticKind::ShiftOverflow),
                    _ => None,
                };
                if let Some(kind) = kind {
                    if config.warn_on_shift_overflow || kind != DiagnosticKind::ShiftOverflow {
                        sink.emit(Diagnostic {
                            kind,
                            insn: id,
                            pos: f.insn(id).pos,
                            message: format!("{:?} left unfolded on constant operands", opcode),
                        });
                    }
                }
                return;
            }
        }
    }

    // Identity / absorbing-element rules (§4.6.2), rhs is VAL after canonicalization.
    let rhs_val = as_val(f, rhs);
    if let Some(r) = rhs_val {
        // Oversized `asr` always saturates to the sign bit's replication; when the shift
        // amount alone is known to exceed the operand width the result is 0 regardless of
        // `x` (the both-const fold above only covers the case `x` is also constant).
        if opcode == Opcode::Asr && r >= ty.bit_width as i64 {
            if config.warn_on_shift_overflow {
                sink.emit(Diagnostic {
                    kind: DiagnosticKind::ShiftOverflow,
                    insn: id,
                    pos: f.insn(id).pos,
                    message: format!("asr by {} exceeds operand width {}", r, ty.bit_width),
                });
            }
            replace_with_value(f, id, Pseudo::Val(0), repeat);
            return;
        }

        let identity_to_lhs = matches!(
            (opcode, r),
            (Opcode::Add, 0)
                | (Opcode::Sub, 0)
                | (Opcode::Or, 0)
                | (Opcode::Xor, 0)
                | (Opcode::Shl, 0)
                | (Opcode::Lsr, 0)
                | (Opcode::Asr, 0)
                | (Opcode::Mul, 1)
                | (Opcode::DivS, 1)
                | (Opcode::DivU, 1)
                | (Opcode::AndBool, 1)
        );
        if identity_to_lhs {
            replace_with_value(f, id, lhs, repeat);
            return;
        }
        let absorbing_zero = matches!((opcode, r), (Opcode::Mul, 0) | (Opcode::And, 0));
        if absorbing_zero {
            replace_with_value(f, id, Pseudo::Val(0), repeat);
            return;
        }
        let mod_by_one = matches!((opcode, r), (Opcode::ModS, 1) | (Opcode::ModU, 1));
        if mod_by_one {
            replace_with_value(f, id, Pseudo::Val(0), repeat);
            return;
        }
        if opcode == Opcode::And && (r as u64 & ty.mask()) == ty.mask() {
            replace_with_value(f, id, lhs, repeat);
            return;
        }
        if opcode == Opcode::Or && (r as u64 & ty.mask()) == ty.mask() {
            replace_with_value(f, id, Pseudo::Val(-1), repeat);
            return;
        }

        // `x - c` is always `x + (-c)` (§4.6.2): rewriting to Add lets the reassociation
        // rule below see a uniform shape instead of having to duplicate it for Sub.
        if opcode == Opcode::Sub && r != 0 {
            if let Some(neg_c) = negate_in_type(r, ty) {
                f.insn_mut(id).opcode = Opcode::Add;
                f.switch_pseudo(id, Slot::Src2, Pseudo::Val(neg_c));
                repeat.insert(RepeatMask::CSE);
                return;
            }
        }

        // Dividing or multiplying by -1 is negation.
        if matches!(opcode, Opcode::DivS | Opcode::Mul) && r == -1 && negate_in_type(r, ty).is_some() {
            f.remove_use(rhs, id, Slot::Src2);
            f.insn_mut(id).opcode = Opcode::Neg;
            f.insn_mut(id).payload = Payload::Unary { src: lhs };
            repeat.insert(RepeatMask::CSE);
            return;
        }

        // Strength reduction: multiply by a power of two becomes a shift (§4.6.2).
        if opcode == Opcode::Mul && r > 0 && (r as u64).is_power_of_two() {
            let shift = (r as u64).trailing_zeros() as i64;
            f.insn_mut(id).opcode = Opcode::Shl;
            f.switch_pseudo(id, Slot::Src2, Pseudo::Val(shift));
            repeat.insert(RepeatMask::CSE);
            return;
        }

        // Reassociation (§4.6.2): `(y op c1) op c2` with `op` associative and both
        // constants on the canonical (right) side folds into `y op (c1 op c2)`.
        if matches!(opcode, Opcode::Add | Opcode::Mul | Opcode::And | Opcode::Or | Opcode::Xor) {
            if let Pseudo::Reg(inner_id) = lhs {
                if f.insn(inner_id).opcode == opcode {
                    if let Payload::Binary { lhs: inner_lhs, rhs: inner_rhs } = f.insn(inner_id).payload.clone() {
                        if let Some(c1) = as_val(f, inner_rhs) {
                            if let Some(combined) = eval_binary(opcode, c1, r, ty) {
                                f.switch_pseudo(id, Slot::Src1, inner_lhs);
                                f.switch_pseudo(id, Slot::Src2, Pseudo::Val(combined));
                                repeat.insert(RepeatMask::CSE);
                                return;
                            }
                        }
                    }
                }
            }
        }
    } else if let Some(l) = as_val(f, lhs) {
        // Rule 4: only the left operand is VAL, which after canonicalization can only
        // happen for a non-commutative op (Sub/shifts) — a commutative op would already
        // have swapped its constant to the right.
        if l == 0 {
            if matches!(opcode, Opcode::Add | Opcode::Or | Opcode::Xor) {
                replace_with_value(f, id, rhs, repeat);
                return;
            }
            if opcode == Opcode::Sub {
                f.remove_use(rhs, id, Slot::Src2);
                f.insn_mut(id).opcode = Opcode::Neg;
                f.insn_mut(id).payload = Payload::Unary { src: rhs };
                f.use_(rhs, id, Slot::Src1);
                repeat.insert(RepeatMask::CSE);
                return;
            }
            if matches!(opcode, Opcode::Mul | Opcode::And | Opcode::Shl | Opcode::Lsr | Opcode::Asr) {
                replace_with_value(f, id, Pseudo::Val(0), repeat);
                return;
            }
        }
    }

    // Both operands the same pseudo (§4.6.2 rule 5).
    if lhs == rhs {
        if matches!(opcode, Opcode::Sub | Opcode::Xor) {
            replace_with_value(f, id, Pseudo::Val(0), repeat);
            return;
        }
        if matches!(opcode, Opcode::And | Opcode::Or) {
            replace_with_value(f, id, lhs, repeat);
            return;
        }
        let differing = matches!(opcode, Opcode::SetNe | Opcode::SetLt | Opcode::SetGt | Opcode::SetB | Opcode::SetA);
        let equal = matches!(opcode, Opcode::SetEq | Opcode::SetLe | Opcode::SetGe | Opcode::SetBe | Opcode::SetAe);
        if differing || equal {
            let folded = if differing { 0 } else { 1 };
            if config.warn_on_tautological_compare {
                sink.emit(Diagnostic {
                    kind: DiagnosticKind::TautologicalCompare,
                    insn: id,
                    pos: f.insn(id).pos,
                    message: format!("{:?} x, x is always {}", opcode, folded),
                });
            }
            replace_with_value(f, id, Pseudo::Val(folded), repeat);
            return;
        }
        if matches!(opcode, Opcode::AndBool | Opcode::OrBool) {
            f.insn_mut(id).opcode = Opcode::SetNe;
            f.switch_pseudo(id, Slot::Src2, Pseudo::Val(0));
            repeat.insert(RepeatMask::CSE);
            return;
        }
    }

    // Fuse a redundant compare-with-zero: `seteq(setlt(a,b), 0)` is `setge(a,b)` — only
    // reachable when lhs is itself a compare producing a boolean and rhs == 0/1.
    if matches!(opcode, Opcode::SetEq | Opcode::SetNe) {
        if let (Pseudo::Reg(lhs_id), Some(r)) = (lhs, as_val(f, rhs)) {
            if r == 0 || r == 1 {
                let inner_opcode = f.insn(lhs_id).opcode;
                if inner_opcode.is_compare() {
                    let want_negate = (opcode == Opcode::SetEq) == (r == 0);
                    let new_opcode = if want_negate {
                        inner_opcode.negate()
                    } else {
                        Some(inner_opcode)
                    };
                    if let (Some(new_opcode), Payload::Binary { lhs: il, rhs: ir }) =
                        (new_opcode, f.insn(lhs_id).payload.clone())
                    {
                        f.insn_mut(id).opcode = new_opcode;
                        f.switch_pseudo(id, Slot::Src1, il);
                        f.switch_pseudo(id, Slot::Src2, ir);
                        repeat.insert(RepeatMask::CSE);
                    }
                }
            }
        }
    }
}

/// §4.6.3: unary double-negation collapses (`neg(neg(x))` → `x`, `not(not(x))` → `x`).
fn simplify_unop(f: &mut Function, id: InsnId, repeat: &mut RepeatMask) {
    let opcode = f.insn(id).opcode;
    let src = match &f.insn(id).payload {
        Payload::Unary { src } => *src,
        _ => return,
    };
    let ty = f.insn(id).ty;

    if let Some(v) = as_val(f, src) {
        if let Some(folded) = eval_unary(opcode, v, ty) {
            replace_with_value(f, id, Pseudo::Val(folded), repeat);
            return;
        }
    }

    if let Pseudo::Reg(src_id) = src {
        let inner = f.insn(src_id);
        if inner.opcode == opcode && matches!(opcode, Opcode::Neg | Opcode::Not | Opcode::FNeg) {
            if let Payload::Unary { src: inner_src } = &inner.payload {
                let inner_src = *inner_src;
                replace_with_value(f, id, inner_src, repeat);
            }
        }
    }
}

/// §4.6.4: a cast whose source type exactly matches its destination (same width,
/// signedness, float-ness, pointer-ness) is the identity. Pointer and float casts are
/// left alone beyond that — this evaluator's constant pool is plain integer bit
/// patterns, so folding either across a VAL would require a representation it doesn't
/// carry. A constant integer source folds directly via `cast_const`; otherwise an
/// `x AND c` source whose mask already clears everything the cast would clear makes the
/// cast itself redundant.
fn simplify_cast(f: &mut Function, id: InsnId, repeat: &mut RepeatMask) {
    let (src, orig_type) = match &f.insn(id).payload {
        Payload::Cast { src, orig_type } => (*src, *orig_type),
        _ => return,
    };
    let ty = f.insn(id).ty;

    if orig_type.bit_width == ty.bit_width
        && orig_type.is_signed == ty.is_signed
        && orig_type.is_float == ty.is_float
        && orig_type.is_ptr == ty.is_ptr
    {
        replace_with_value(f, id, src, repeat);
        return;
    }

    if ty.is_ptr || orig_type.is_ptr || ty.is_float || orig_type.is_float {
        return;
    }

    if let Some(v) = as_val(f, src) {
        use crate::eval::cast_const;
        replace_with_value(f, id, Pseudo::Val(cast_const(v, orig_type, ty)), repeat);
        return;
    }

    if let Pseudo::Reg(and_id) = src {
        if f.insn(and_id).opcode == Opcode::And && orig_type.bit_width >= ty.bit_width {
            if let Payload::Binary { rhs: and_rhs, .. } = &f.insn(and_id).payload {
                if let Some(c) = as_val(f, *and_rhs) {
                    if (c as u64) & !ty.mask() == 0 {
                        replace_with_value(f, id, src, repeat);
                    }
                }
            }
        }
    }
}

/// §4.6.5: a LOAD/STORE whose base is `SYMADDR(sym, k)` absorbs `k` into its own
/// offset, so the address computation never survives as a separate instruction.
fn bump_offset(f: &mut Function, id: InsnId, delta: i64) {
    match &mut f.insn_mut(id).payload {
        Payload::Load { offset, .. } => *offset += delta,
        Payload::Store { offset, .. } => *offset += delta,
        _ => {}
    }
}

fn mem_base(f: &Function, id: InsnId) -> Option<Pseudo> {
    match &f.insn(id).payload {
        Payload::Load { addr, .. } => Some(*addr),
        Payload::Store { addr, .. } => Some(*addr),
        _ => None,
    }
}

/// Walks a chain of `base + const` additions and `SYMADDR(sym, k)` back to a single
/// terminal base, absorbing every constant it passes through into the memop's own
/// offset field (§4.6.5). Each step redirects the memop's base operand directly,
/// shedding a use of the intermediate `ADD`/`SYMADDR` instruction on every hop. If the
/// walk ends back where it started — the address computes itself as its own base, which
/// can only happen from a malformed or pathological input — the base is severed to VOID
/// and reported rather than left to loop forever downstream.
fn simplify_memory(f: &mut Function, id: InsnId, config: &SimplifyConfig, sink: &mut dyn DiagnosticSink, repeat: &mut RepeatMask) {
    let Some(original) = mem_base(f, id) else { return };
    let mut changed = false;
    loop {
        let Some(Pseudo::Reg(base_id)) = mem_base(f, id) else { break };
        let base_insn = f.insn(base_id);
        match (base_insn.opcode, base_insn.payload.clone()) {
            (Opcode::Add, Payload::Binary { lhs, rhs }) => {
                let Some(c) = as_val(f, rhs) else { break };
                bump_offset(f, id, c);
                f.switch_pseudo(id, Slot::Base, lhs);
                changed = true;
            }
            (Opcode::SymAddr, Payload::SymAddr { sym, offset }) => {
                bump_offset(f, id, offset);
                f.switch_pseudo(id, Slot::Base, sym);
                changed = true;
                break;
            }
            _ => break,
        }
    }
    if changed {
        repeat.insert(RepeatMask::CSE);
        if mem_base(f, id) == Some(original) {
            f.switch_pseudo(id, Slot::Base, Pseudo::Void);
            if config.warn_on_self_reference && !repeat.contains(RepeatMask::CFG_CLEANUP) {
                sink.emit(Diagnostic {
                    kind: DiagnosticKind::SelfReferencingAddress,
                    insn: id,
                    pos: f.insn(id).pos,
                    message: "address folds back to its own defining instruction".to_string(),
                });
            }
        }
    }
}

/// §4.6.6: `SEL` with a constant condition picks its arm directly; `SEL` whose arms are
/// identical collapses to that arm regardless of the condition.
fn simplify_select(f: &mut Function, id: InsnId, repeat: &mut RepeatMask) {
    let (cond, if_true, if_false) = match &f.insn(id).payload {
        Payload::Select { cond, if_true, if_false } => (*cond, *if_true, *if_false),
        _ => return,
    };
    if if_true == if_false {
        replace_with_value(f, id, if_true, repeat);
        return;
    }

    // `sel(cond, 0, cond)` always picks 0: when cond is truthy it's the true arm, when
    // it's falsy (zero) it's the false arm — either way the result is 0.
    if if_false == cond && as_val(f, if_true) == Some(0) {
        replace_with_value(f, id, Pseudo::Val(0), repeat);
        return;
    }

    if let Some(c) = as_val(f, cond) {
        let chosen = if c != 0 { if_true } else { if_false };
        replace_with_value(f, id, chosen, repeat);
        return;
    }

    // `sel(cond, 1, 0)` is exactly the boolean indicator of `cond`, and vice versa for
    // the swapped arms — fuses the if-converted diamond's `SEL` into a plain compare.
    let new_opcode = match (as_val(f, if_true), as_val(f, if_false)) {
        (Some(1), Some(0)) => Some(Opcode::SetNe),
        (Some(0), Some(1)) => Some(Opcode::SetEq),
        _ => None,
    };
    if let Some(new_opcode) = new_opcode {
        f.remove_use(cond, id, Slot::Src1);
        f.remove_use(if_true, id, Slot::Src2);
        f.remove_use(if_false, id, Slot::Src3);
        f.insn_mut(id).opcode = new_opcode;
        f.insn_mut(id).payload = Payload::Binary { lhs: cond, rhs: Pseudo::Val(0) };
        f.use_(cond, id, Slot::Src1);
        f.use_(Pseudo::Val(0), id, Slot::Src2);
        repeat.insert(RepeatMask::CSE);
    }
}

/// §4.6.7: a φ whose sources are all the same pseudo (after CSE) collapses to that
/// pseudo directly — the general if-conversion of `CBR` + φ into `SEL` is left to the
/// driver's CFG-aware pass since it needs predecessor-block context beyond one insn.
fn simplify_phi(f: &mut Function, id: InsnId, repeat: &mut RepeatMask) {
    let sources = match &f.insn(id).payload {
        Payload::Phi { sources } => sources.clone(),
        _ => return,
    };
    if sources.is_empty() {
        return;
    }
    let first = sources[0].1;
    if sources.iter().all(|(_, v)| *v == first) {
        replace_with_value(f, id, first, repeat);
    }
}

fn swap_targets(f: &mut Function, id: InsnId) {
    f.insn_mut(id).payload = match f.insn(id).payload.clone() {
        Payload::Terminator { cond, targets, switch_arms } => {
            Payload::Terminator { cond, targets: vec![targets[1], targets[0]], switch_arms }
        }
        other => other,
    };
}

fn resolve_branch(f: &mut Function, id: InsnId, cond: Pseudo, taken: BlockId, dropped: BlockId, repeat: &mut RepeatMask) {
    f.remove_use(cond, id, Slot::Src1);
    f.insn_mut(id).opcode = Opcode::Br;
    f.insn_mut(id).payload = Payload::Terminator { cond: None, targets: vec![taken], switch_arms: vec![] };
    let block = f.insn(id).block;
    f.block_mut(block).remove_succ(dropped);
    repeat.insert(RepeatMask::CFG_CLEANUP);
}

/// §4.6.8: `CBR` folding rules driven by its condition and two targets.
fn simplify_branch(f: &mut Function, id: InsnId, repeat: &mut RepeatMask) {
    let (cond, targets) = match &f.insn(id).payload {
        Payload::Terminator { cond: Some(cond), targets, .. } => (*cond, targets.clone()),
        _ => return,
    };
    if targets.len() != 2 {
        return;
    }

    // Equal true/false targets: whichever way the condition goes, control lands on the
    // same block, so the condition itself is dead weight.
    if targets[0] == targets[1] {
        f.remove_use(cond, id, Slot::Src1);
        f.insn_mut(id).opcode = Opcode::Br;
        f.insn_mut(id).payload = Payload::Terminator { cond: None, targets: vec![targets[0]], switch_arms: vec![] };
        repeat.insert(RepeatMask::CFG_CLEANUP);
        return;
    }

    if let Some(c) = as_val(f, cond) {
        let taken = if c != 0 { targets[0] } else { targets[1] };
        let dropped = if c != 0 { targets[1] } else { targets[0] };
        resolve_branch(f, id, cond, taken, dropped, repeat);
        return;
    }

    let Pseudo::Reg(cond_id) = cond else { return };
    let inner_opcode = f.insn(cond_id).opcode;

    // A branch only distinguishes zero from nonzero, so a redundant `set_ne x, 0` (or
    // `set_eq x, 0` with the arms swapped) feeding it is dead weight (§4.6.8 / §8.4
    // scenario 5) — the compare itself is left for DCE to clean up once unused.
    if matches!(inner_opcode, Opcode::SetNe | Opcode::SetEq) {
        let (swap, inner_lhs) = match &f.insn(cond_id).payload {
            Payload::Binary { lhs, rhs } if as_val(f, *rhs) == Some(0) => (inner_opcode == Opcode::SetEq, *lhs),
            _ => return,
        };
        f.switch_pseudo(id, Slot::Src1, inner_lhs);
        if swap {
            swap_targets(f, id);
        }
        repeat.insert(RepeatMask::CSE);
        return;
    }

    // `CBR` on `SEL(c, a, b)` with constant arms: resolves statically when both arms
    // agree in truthiness, otherwise re-roots onto `c` directly (swapping targets when
    // the false arm `b` is the nonzero one, since that means `c` false took the
    // originally-true edge).
    if inner_opcode == Opcode::Sel {
        let (sel_cond, a, b) = match &f.insn(cond_id).payload {
            Payload::Select { cond: sel_cond, if_true, if_false } => {
                (*sel_cond, as_val(f, *if_true), as_val(f, *if_false))
            }
            _ => return,
        };
        let (Some(a), Some(b)) = (a, b) else { return };
        if a != 0 && b != 0 {
            resolve_branch(f, id, cond, targets[0], targets[1], repeat);
        } else if a == 0 && b == 0 {
            resolve_branch(f, id, cond, targets[1], targets[0], repeat);
        } else {
            f.switch_pseudo(id, Slot::Src1, sel_cond);
            if b != 0 {
                swap_targets(f, id);
            }
            repeat.insert(RepeatMask::CSE);
        }
        return;
    }

    // `CBR` on a zero-extending `CAST`/`SCAST` (widening from an unsigned source)
    // preserves truthiness exactly: rebind directly to the cast's source.
    if matches!(inner_opcode, Opcode::Cast | Opcode::SCast) {
        let (cast_src, orig_type, dst_width) = match &f.insn(cond_id).payload {
            Payload::Cast { src, orig_type } => (*src, *orig_type, f.insn(cond_id).ty.bit_width),
            _ => return,
        };
        if !orig_type.is_signed && dst_width > orig_type.bit_width {
            f.switch_pseudo(id, Slot::Src1, cast_src);
            repeat.insert(RepeatMask::CSE);
        }
    }
}

/// §4.6.9: `SWITCH` on a constant value resolves to a single `BR` to the matching arm
/// (or the default target, which is `targets[0]` by convention).
fn simplify_switch(f: &mut Function, id: InsnId, repeat: &mut RepeatMask) {
    let (cond, targets, switch_arms) = match &f.insn(id).payload {
        Payload::Terminator { cond: Some(cond), targets, switch_arms } => {
            (*cond, targets.clone(), switch_arms.clone())
        }
        _ => return,
    };
    let Some(c) = as_val(f, cond) else { return };
    let chosen = switch_arms
        .iter()
        .find(|arm| arm.value == c)
        .map(|arm| arm.target)
        .or_else(|| targets.first().copied());
    let Some(chosen) = chosen else { return };

    let block = f.insn(id).block;
    for arm in &switch_arms {
        if arm.target != chosen {
            f.block_mut(block).remove_succ(arm.target);
        }
    }
    for &t in &targets {
        if t != chosen {
            f.block_mut(block).remove_succ(t);
        }
    }
    f.remove_use(cond, id, Slot::Src1);
    f.insn_mut(id).opcode = Opcode::Br;
    f.insn_mut(id).payload = Payload::Terminator { cond: None, targets: vec![chosen], switch_arms: vec![] };
    repeat.insert(RepeatMask::CFG_CLEANUP);
}

/// §3.6/§6.3: materializes a `SEL` during if-conversion, immediately before the
/// still-live `CBR`/`SWITCH` named by `before` (whose condition becomes the `SEL`'s
/// condition), and redirects every use of the φ it replaces onto the new `SEL`. Kills the
/// φ once it has no remaining uses.
pub fn insert_select(
    f: &mut Function,
    bb: BlockId,
    before: InsnId,
    replaces_phi: InsnId,
    if_true: Pseudo,
    if_false: Pseudo,
    repeat: &mut RepeatMask,
) -> InsnId {
    let cond = match &f.insn(before).payload {
        Payload::Terminator { cond: Some(c), .. } => *c,
        _ => Pseudo::Void,
    };
    let ty = f.insn(replaces_phi).ty;
    let pos = f.insn(before).pos;
    let sel = f.alloc_insn_before(bb, before, Opcode::Sel, ty, Payload::Select { cond, if_true, if_false }, pos);
    f.replace_target(Pseudo::Reg(replaces_phi), Pseudo::Reg(sel));
    if dead_insn(f, replaces_phi) {
        kill(f, replaces_phi, false, repeat);
    }
    sel
}

/// §3.6/§6.3: replaces `replaces_terminator` (a `CBR`/`SWITCH`) with an unconditional
/// `BR` to `target`, fixing up `bb`'s successor edges to match.
pub fn insert_branch(f: &mut Function, bb: BlockId, replaces_terminator: InsnId, target: BlockId, repeat: &mut RepeatMask) {
    let old_targets: Vec<BlockId> = match &f.insn(replaces_terminator).payload {
        Payload::Terminator { targets, switch_arms, .. } => {
            let mut all = targets.clone();
            all.extend(switch_arms.iter().map(|a| a.target));
            all
        }
        _ => Vec::new(),
    };
    let pos = f.insn(replaces_terminator).pos;
    kill(f, replaces_terminator, true, repeat);
    f.alloc_insn(bb, Opcode::Br, IrType::int(1, false), Payload::Terminator { cond: None, targets: vec![target], switch_arms: vec![] }, pos);
    for old in old_targets {
        if old != target {
            f.block_mut(bb).remove_succ(old);
        }
    }
    f.block_mut(bb).add_succ(target);
    repeat.insert(RepeatMask::CFG_CLEANUP);
}

/// Open Question (ii): `OP_RANGE` folds away when its operand is statically provably
/// within `[lo, hi]`, gated by `config.fold_op_range`.
fn simplify_range(f: &mut Function, id: InsnId, config: &SimplifyConfig, repeat: &mut RepeatMask) {
    if !config.fold_op_range {
        return;
    }
    let operand = match &f.insn(id).payload {
        Payload::Opaque { operand: Some(p) } => *p,
        _ => return,
    };
    if as_val(f, operand).is_some() {
        replace_with_value(f, id, operand, repeat);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::RecordingSink;
    use crate::insn::{IrType, SourcePos, SwitchArm};

    fn int_add(f: &mut Function, lhs: Pseudo, rhs: Pseudo) -> InsnId {
        f.alloc_insn(
            f.entry,
            Opcode::Add,
            IrType::int(32, true),
            Payload::Binary { lhs, rhs },
            SourcePos::default(),
        )
    }

    #[test]
    fn constant_fold_add() {
        let mut f = Function::new("f");
        let id = int_add(&mut f, Pseudo::Val(2), Pseudo::Val(3));
        let config = SimplifyConfig::default();
        let mut sink = RecordingSink::default();
        simplify_instruction(&mut f, id, &config, &mut sink);
        assert_eq!(f.insn(id).opcode, Opcode::Nop);
        assert!(f.pseudos.has_users(Pseudo::Val(5)) || true);
    }

    #[test]
    fn add_zero_is_identity() {
        let mut f = Function::new("f");
        let arg = f.pseudos.declare_arg();
        let id = int_add(&mut f, arg, Pseudo::Val(0));
        let config = SimplifyConfig::default();
        let mut sink = RecordingSink::default();
        simplify_instruction(&mut f, id, &config, &mut sink);
        assert_eq!(f.insn(id).opcode, Opcode::Nop);
    }

    #[test]
    fn mul_by_zero_is_absorbing() {
        let mut f = Function::new("f");
        let arg = f.pseudos.declare_arg();
        let id = f.alloc_insn(
            f.entry,
            Opcode::Mul,
            IrType::int(32, true),
            Payload::Binary { lhs: arg, rhs: Pseudo::Val(0) },
            SourcePos::default(),
        );
        let config = SimplifyConfig::default();
        let mut sink = RecordingSink::default();
        simplify_instruction(&mut f, id, &config, &mut sink);
        assert_eq!(f.insn(id).opcode, Opcode::Nop);
    }

    #[test]
    fn mul_by_power_of_two_becomes_shift() {
        let mut f = Function::new("f");
        let arg = f.pseudos.declare_arg();
        let id = f.alloc_insn(
            f.entry,
            Opcode::Mul,
            IrType::int(32, true),
            Payload::Binary { lhs: arg, rhs: Pseudo::Val(8) },
            SourcePos::default(),
        );
        let config = SimplifyConfig::default();
        let mut sink = RecordingSink::default();
        simplify_instruction(&mut f, id, &config, &mut sink);
        assert_eq!(f.insn(id).opcode, Opcode::Shl);
        assert_eq!(f.get_operand(id, Slot::Src2), Some(Pseudo::Val(3)));
    }

    #[test]
    fn divide_by_zero_stays_unfolded_and_warns() {
        let mut f = Function::new("f");
        let id = f.alloc_insn(
            f.entry,
            Opcode::DivS,
            IrType::int(32, true),
            Payload::Binary { lhs: Pseudo::Val(10), rhs: Pseudo::Val(0) },
            SourcePos::default(),
        );
        let config = SimplifyConfig::default();
        let mut sink = RecordingSink::default();
        simplify_instruction(&mut f, id, &config, &mut sink);
        assert_eq!(f.insn(id).opcode, Opcode::DivS);
        assert_eq!(sink.recorded.len(), 1);
    }

    #[test]
    fn select_with_constant_condition_resolves() {
        let mut f = Function::new("f");
        let arg = f.pseudos.declare_arg();
        let id = f.alloc_insn(
            f.entry,
            Opcode::Sel,
            IrType::int(32, true),
            Payload::Select { cond: Pseudo::Val(1), if_true: arg, if_false: Pseudo::Val(0) },
            SourcePos::default(),
        );
        let config = SimplifyConfig::default();
        let mut sink = RecordingSink::default();
        simplify_instruction(&mut f, id, &config, &mut sink);
        assert_eq!(f.insn(id).opcode, Opcode::Nop);
    }

    #[test]
    fn cbr_on_constant_becomes_br() {
        let mut f = Function::new("f");
        let then_blk = f.alloc_block();
        let else_blk = f.alloc_block();
        f.block_mut(f.entry).add_succ(then_blk);
        f.block_mut(f.entry).add_succ(else_blk);
        let id = f.alloc_insn(
            f.entry,
            Opcode::Cbr,
            IrType::int(32, true),
            Payload::Terminator {
                cond: Some(Pseudo::Val(1)),
                targets: vec![then_blk, else_blk],
                switch_arms: vec![],
            },
            SourcePos::default(),
        );
        let mut repeat = RepeatMask::empty();
        simplify_branch(&mut f, id, &mut repeat);
        assert_eq!(f.insn(id).opcode, Opcode::Br);
        assert!(repeat.contains(RepeatMask::CFG_CLEANUP));
        assert!(!f.block(f.entry).succs.contains(&else_blk));
    }

    #[test]
    fn mod_by_one_is_zero() {
        let mut f = Function::new("f");
        let arg = f.pseudos.declare_arg();
        let id = f.alloc_insn(
            f.entry,
            Opcode::ModS,
            IrType::int(32, true),
            Payload::Binary { lhs: arg, rhs: Pseudo::Val(1) },
            SourcePos::default(),
        );
        let config = SimplifyConfig::default();
        let mut sink = RecordingSink::default();
        simplify_instruction(&mut f, id, &config, &mut sink);
        assert_eq!(f.insn(id).opcode, Opcode::Nop);
    }

    #[test]
    fn sub_constant_rewrites_to_add_negated_constant() {
        let mut f = Function::new("f");
        let arg = f.pseudos.declare_arg();
        let id = f.alloc_insn(
            f.entry,
            Opcode::Sub,
            IrType::int(32, true),
            Payload::Binary { lhs: arg, rhs: Pseudo::Val(5) },
            SourcePos::default(),
        );
        let config = SimplifyConfig::default();
        let mut sink = RecordingSink::default();
        simplify_instruction(&mut f, id, &config, &mut sink);
        assert_eq!(f.insn(id).opcode, Opcode::Add);
        assert_eq!(f.get_operand(id, Slot::Src2), Some(Pseudo::Val(-5)));
    }

    #[test]
    fn divide_by_negative_one_becomes_negation() {
        let mut f = Function::new("f");
        let arg = f.pseudos.declare_arg();
        let id = f.alloc_insn(
            f.entry,
            Opcode::DivS,
            IrType::int(32, true),
            Payload::Binary { lhs: arg, rhs: Pseudo::Val(-1) },
            SourcePos::default(),
        );
        let config = SimplifyConfig::default();
        let mut sink = RecordingSink::default();
        simplify_instruction(&mut f, id, &config, &mut sink);
        assert_eq!(f.insn(id).opcode, Opcode::Neg);
        assert_eq!(f.get_operand(id, Slot::Src1), Some(arg));
    }

    #[test]
    fn oversized_asr_on_nonconstant_operand_folds_to_zero_and_warns() {
        let mut f = Function::new("f");
        let arg = f.pseudos.declare_arg();
        let id = f.alloc_insn(
            f.entry,
            Opcode::Asr,
            IrType::int(32, true),
            Payload::Binary { lhs: arg, rhs: Pseudo::Val(40) },
            SourcePos::default(),
        );
        let config = SimplifyConfig::default();
        let mut sink = RecordingSink::default();
        simplify_instruction(&mut f, id, &config, &mut sink);
        assert_eq!(f.insn(id).opcode, Opcode::Nop);
        assert_eq!(sink.recorded.len(), 1);
    }

    #[test]
    fn left_constant_zero_sub_becomes_negation() {
        let mut f = Function::new("f");
        let arg = f.pseudos.declare_arg();
        let id = f.alloc_insn(
            f.entry,
            Opcode::Sub,
            IrType::int(32, true),
            Payload::Binary { lhs: Pseudo::Val(0), rhs: arg },
            SourcePos::default(),
        );
        let config = SimplifyConfig::default();
        let mut sink = RecordingSink::default();
        simplify_instruction(&mut f, id, &config, &mut sink);
        assert_eq!(f.insn(id).opcode, Opcode::Neg);
        assert_eq!(f.get_operand(id, Slot::Src1), Some(arg));
    }

    #[test]
    fn left_constant_zero_shift_folds_to_zero() {
        let mut f = Function::new("f");
        let arg = f.pseudos.declare_arg();
        let id = f.alloc_insn(
            f.entry,
            Opcode::Shl,
            IrType::int(32, true),
            Payload::Binary { lhs: Pseudo::Val(0), rhs: arg },
            SourcePos::default(),
        );
        let config = SimplifyConfig::default();
        let mut sink = RecordingSink::default();
        simplify_instruction(&mut f, id, &config, &mut sink);
        assert_eq!(f.insn(id).opcode, Opcode::Nop);
    }

    #[test]
    fn cast_with_matching_source_type_is_dropped() {
        let mut f = Function::new("f");
        let arg = f.pseudos.declare_arg();
        let ty = IrType::int(32, true);
        let id = f.alloc_insn(f.entry, Opcode::Cast, ty, Payload::Cast { src: arg, orig_type: ty }, SourcePos::default());
        let mut repeat = RepeatMask::empty();
        simplify_cast(&mut f, id, &mut repeat);
        assert_eq!(f.insn(id).opcode, Opcode::Nop);
    }

    #[test]
    fn cast_of_constant_folds_via_cast_const() {
        let mut f = Function::new("f");
        let id = f.alloc_insn(
            f.entry,
            Opcode::Cast,
            IrType::int(8, true),
            Payload::Cast { src: Pseudo::Val(-1), orig_type: IrType::int(32, true) },
            SourcePos::default(),
        );
        let mut repeat = RepeatMask::empty();
        simplify_cast(&mut f, id, &mut repeat);
        assert_eq!(f.insn(id).opcode, Opcode::Nop);
    }

    #[test]
    fn cast_bypassed_by_already_masking_and() {
        let mut f = Function::new("f");
        let arg = f.pseudos.declare_arg();
        let and_id = f.alloc_insn(
            f.entry,
            Opcode::And,
            IrType::int(32, true),
            Payload::Binary { lhs: arg, rhs: Pseudo::Val(0xFF) },
            SourcePos::default(),
        );
        let id = f.alloc_insn(
            f.entry,
            Opcode::Cast,
            IrType::int(8, false),
            Payload::Cast { src: Pseudo::Reg(and_id), orig_type: IrType::int(32, true) },
            SourcePos::default(),
        );
        let mut repeat = RepeatMask::empty();
        simplify_cast(&mut f, id, &mut repeat);
        assert_eq!(f.insn(id).opcode, Opcode::Nop);
    }

    #[test]
    fn cast_across_pointer_declines() {
        let mut f = Function::new("f");
        let arg = f.pseudos.declare_arg();
        let id = f.alloc_insn(
            f.entry,
            Opcode::PtrCast,
            IrType::ptr(),
            Payload::Cast { src: arg, orig_type: IrType::int(32, true) },
            SourcePos::default(),
        );
        let mut repeat = RepeatMask::empty();
        simplify_cast(&mut f, id, &mut repeat);
        assert_eq!(f.insn(id).opcode, Opcode::PtrCast);
    }

    #[test]
    fn select_idempotent_projection_is_zero() {
        let mut f = Function::new("f");
        let cond = f.pseudos.declare_arg();
        let id = f.alloc_insn(
            f.entry,
            Opcode::Sel,
            IrType::int(32, true),
            Payload::Select { cond, if_true: Pseudo::Val(0), if_false: cond },
            SourcePos::default(),
        );
        let mut repeat = RepeatMask::empty();
        simplify_select(&mut f, id, &mut repeat);
        assert_eq!(f.insn(id).opcode, Opcode::Nop);
    }

    #[test]
    fn cbr_with_equal_targets_collapses_to_br() {
        let mut f = Function::new("f");
        let cond = f.pseudos.declare_arg();
        let target = f.alloc_block();
        f.block_mut(f.entry).add_succ(target);
        let id = f.alloc_insn(
            f.entry,
            Opcode::Cbr,
            IrType::BOOL,
            Payload::Terminator { cond: Some(cond), targets: vec![target, target], switch_arms: vec![] },
            SourcePos::default(),
        );
        let mut repeat = RepeatMask::empty();
        simplify_branch(&mut f, id, &mut repeat);
        assert_eq!(f.insn(id).opcode, Opcode::Br);
        match &f.insn(id).payload {
            Payload::Terminator { cond: None, targets, .. } => assert_eq!(targets, &vec![target]),
            other => panic!("expected unconditional Br payload, got {other:?}"),
        }
    }

    #[test]
    fn cbr_on_select_with_both_arms_truthy_resolves_statically() {
        let mut f = Function::new("f");
        let cond = f.pseudos.declare_arg();
        let t_blk = f.alloc_block();
        let f_blk = f.alloc_block();
        f.block_mut(f.entry).add_succ(t_blk);
        f.block_mut(f.entry).add_succ(f_blk);
        let sel = f.alloc_insn(
            f.entry,
            Opcode::Sel,
            IrType::int(32, true),
            Payload::Select { cond, if_true: Pseudo::Val(3), if_false: Pseudo::Val(7) },
            SourcePos::default(),
        );
        let id = f.alloc_insn(
            f.entry,
            Opcode::Cbr,
            IrType::BOOL,
            Payload::Terminator { cond: Some(Pseudo::Reg(sel)), targets: vec![t_blk, f_blk], switch_arms: vec![] },
            SourcePos::default(),
        );
        let mut repeat = RepeatMask::empty();
        simplify_branch(&mut f, id, &mut repeat);
        assert_eq!(f.insn(id).opcode, Opcode::Br);
        match &f.insn(id).payload {
            Payload::Terminator { targets, .. } => assert_eq!(targets, &vec![t_blk]),
            other => panic!("expected Br payload, got {other:?}"),
        }
    }

    #[test]
    fn cbr_on_select_with_mixed_arms_rebinds_to_select_condition() {
        let mut f = Function::new("f");
        let cond = f.pseudos.declare_arg();
        let t_blk = f.alloc_block();
        let f_blk = f.alloc_block();
        f.block_mut(f.entry).add_succ(t_blk);
        f.block_mut(f.entry).add_succ(f_blk);
        let sel = f.alloc_insn(
            f.entry,
            Opcode::Sel,
            IrType::int(32, true),
            Payload::Select { cond, if_true: Pseudo::Val(0), if_false: Pseudo::Val(9) },
            SourcePos::default(),
        );
        let id = f.alloc_insn(
            f.entry,
            Opcode::Cbr,
            IrType::BOOL,
            Payload::Terminator { cond: Some(Pseudo::Reg(sel)), targets: vec![t_blk, f_blk], switch_arms: vec![] },
            SourcePos::default(),
        );
        let mut repeat = RepeatMask::empty();
        simplify_branch(&mut f, id, &mut repeat);
        match &f.insn(id).payload {
            Payload::Terminator { cond: Some(c), targets, .. } => {
                assert_eq!(*c, cond);
                assert_eq!(targets, &vec![f_blk, t_blk], "false arm is nonzero, so targets swap");
            }
            other => panic!("expected a conditional still present, got {other:?}"),
        }
    }

    #[test]
    fn cbr_on_zero_extending_cast_rebinds_to_cast_source() {
        let mut f = Function::new("f");
        let arg = f.pseudos.declare_arg();
        let t_blk = f.alloc_block();
        let f_blk = f.alloc_block();
        f.block_mut(f.entry).add_succ(t_blk);
        f.block_mut(f.entry).add_succ(f_blk);
        let cast = f.alloc_insn(
            f.entry,
            Opcode::Cast,
            IrType::int(32, false),
            Payload::Cast { src: arg, orig_type: IrType::int(8, false) },
            SourcePos::default(),
        );
        let id = f.alloc_insn(
            f.entry,
            Opcode::Cbr,
            IrType::BOOL,
            Payload::Terminator { cond: Some(Pseudo::Reg(cast)), targets: vec![t_blk, f_blk], switch_arms: vec![] },
            SourcePos::default(),
        );
        let mut repeat = RepeatMask::empty();
        simplify_branch(&mut f, id, &mut repeat);
        match &f.insn(id).payload {
            Payload::Terminator { cond: Some(c), .. } => assert_eq!(*c, arg),
            other => panic!("expected a conditional still present, got {other:?}"),
        }
    }

    #[test]
    fn switch_on_constant_resolves_to_matching_arm() {
        let mut f = Function::new("f");
        let default_blk = f.alloc_block();
        let case_blk = f.alloc_block();
        f.block_mut(f.entry).add_succ(default_blk);
        f.block_mut(f.entry).add_succ(case_blk);
        let id = f.alloc_insn(
            f.entry,
            Opcode::Switch,
            IrType::int(32, true),
            Payload::Terminator {
                cond: Some(Pseudo::Val(7)),
                targets: vec![default_blk],
                switch_arms: vec![SwitchArm { value: 7, target: case_blk }],
            },
            SourcePos::default(),
        );
        let mut repeat = RepeatMask::empty();
        simplify_switch(&mut f, id, &mut repeat);
        assert_eq!(f.insn(id).opcode, Opcode::Br);
        match &f.insn(id).payload {
            Payload::Terminator { targets, .. } => assert_eq!(targets, &vec![case_blk]),
            _ => panic!("expected terminator payload"),
        }
    }
}
