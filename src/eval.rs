//! C6: the constant evaluator (§4.4). Operates purely on bit patterns plus an
//! `IrType`'s width/signedness — never on host `i64` arithmetic directly, since host
//! overflow and target overflow are different things once the width is below 64 bits.

use crate::insn::IrType;
use crate::opcode::Opcode;

/// Sign-extends the low `ty.bit_width` bits of `bits` to a full `i64`.
pub fn sign_extend(bits: u64, ty: IrType) -> i64 {
    let w = ty.bit_width;
    if w >= 64 {
        return bits as i64;
    }
    let masked = bits & ty.mask();
    let sign_bit = 1u64 << (w - 1);
    if masked & sign_bit != 0 {
        (masked | !ty.mask()) as i64
    } else {
        masked as i64
    }
}

/// Masks `v` down to `ty`'s bit width, discarding any bits above it (§4.4 "mask to `M`").
pub fn truncate(v: i64, ty: IrType) -> i64 {
    sign_extend((v as u64) & ty.mask(), ty)
}

pub(crate) fn is_signed_min(v: i64, ty: IrType) -> bool {
    if ty.bit_width >= 64 {
        v == i64::MIN
    } else {
        (v as u64) & ty.mask() == (1u64 << (ty.bit_width - 1))
    }
}

/// Folds an integer binop over two constant operands, returning `None` when the
/// operation is undefined C semantics and must be left unfolded rather than guessed at
/// (§4.4, §7 category 1, and DESIGN.md's Open Question (i) on `INT_MIN / -1`).
pub fn eval_binary(op: Opcode, lhs: i64, rhs: i64, ty: IrType) -> Option<i64> {
    let lhs = truncate(lhs, ty);
    let rhs = truncate(rhs, ty);
    let result = match op {
        Opcode::Add => lhs.wrapping_add(rhs),
        Opcode::Sub => lhs.wrapping_sub(rhs),
        Opcode::Mul => lhs.wrapping_mul(rhs),
        Opcode::DivS => {
            if rhs == 0 {
                return None;
            }
            if is_signed_min(lhs, ty) && rhs == -1 {
                return None;
            }
            lhs.wrapping_div(rhs)
        }
        Opcode::ModS => {
            if rhs == 0 {
                return None;
            }
            if is_signed_min(lhs, ty) && rhs == -1 {
                return None;
            }
            lhs.wrapping_rem(rhs)
        }
        Opcode::DivU => {
            let (l, r) = (lhs as u64 & ty.mask(), rhs as u64 & ty.mask());
            if r == 0 {
                return None;
            }
            (l / r) as i64
        }
        Opcode::ModU => {
            let (l, r) = (lhs as u64 & ty.mask(), rhs as u64 & ty.mask());
            if r == 0 {
                return None;
            }
            (l % r) as i64
        }
        Opcode::Shl | Opcode::Lsr | Opcode::Asr => {
            if rhs < 0 || rhs as u32 >= ty.bit_width as u32 {
                return None;
            }
            let shamt = rhs as u32;
            match op {
                Opcode::Shl => lhs.wrapping_shl(shamt),
                Opcode::Lsr => ((lhs as u64 & ty.mask()) >> shamt) as i64,
                Opcode::Asr => lhs.wrapping_shr(shamt),
                _ => unreachable!(),
            }
        }
        Opcode::And => lhs & rhs,
        Opcode::Or => lhs | rhs,
        Opcode::Xor => lhs ^ rhs,
        Opcode::AndBool => ((lhs != 0) && (rhs != 0)) as i64,
        Opcode::OrBool => ((lhs != 0) || (rhs != 0)) as i64,
        _ if op.is_int_compare() => {
            let (ul, ur) = (lhs as u64 & ty.mask(), rhs as u64 & ty.mask());
            (match op {
                Opcode::SetEq => lhs == rhs,
                Opcode::SetNe => lhs != rhs,
                Opcode::SetLt => lhs < rhs,
                Opcode::SetGt => lhs > rhs,
                Opcode::SetLe => lhs <= rhs,
                Opcode::SetGe => lhs >= rhs,
                Opcode::SetB => ul < ur,
                Opcode::SetA => ul > ur,
                Opcode::SetBe => ul <= ur,
                Opcode::SetAe => ul >= ur,
                _ => unreachable!(),
            }) as i64
        }
        _ => return None,
    };
    Some(truncate(result, ty))
}

/// Reinterprets a constant across a cast from `orig` to `dst` (§4.6.4): widens per
/// `orig`'s signedness first, then masks down to `dst`'s width.
pub fn cast_const(v: i64, orig: IrType, dst: IrType) -> i64 {
    let bits = (v as u64) & orig.mask();
    let widened = if orig.is_signed { sign_extend(bits, orig) } else { bits as i64 };
    truncate(widened, dst)
}

/// Folds a unary integer op over a constant operand (§4.4).
pub fn eval_unary(op: Opcode, src: i64, ty: IrType) -> Option<i64> {
    let src = truncate(src, ty);
    let result = match op {
        Opcode::Neg => src.wrapping_neg(),
        Opcode::Not => !src,
        _ => return None,
    };
    Some(truncate(result, ty))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn int_min_div_neg_one_is_left_unfolded() {
        let ty = IrType::int(32, true);
        let min = i32::MIN as i64;
        assert_eq!(eval_binary(Opcode::DivS, min, -1, ty), None);
    }

    #[test]
    fn div_by_zero_is_left_unfolded() {
        let ty = IrType::int(32, true);
        assert_eq!(eval_binary(Opcode::DivS, 10, 0, ty), None);
        assert_eq!(eval_binary(Opcode::DivU, 10, 0, ty), None);
    }

    #[test]
    fn oversized_shift_is_left_unfolded() {
        let ty = IrType::int(32, true);
        assert_eq!(eval_binary(Opcode::Shl, 1, 32, ty), None);
        assert_eq!(eval_binary(Opcode::Shl, 1, 31, ty).is_some(), true);
    }

    #[test]
    fn truncation_masks_to_width() {
        let ty = IrType::int(8, true);
        assert_eq!(truncate(256, ty), 0);
        assert_eq!(truncate(255, ty), -1);
    }

    proptest! {
        #[test]
        fn add_then_sub_round_trips_modulo_width(a: i32, b: i32) {
            let ty = IrType::int(32, true);
            let sum = eval_binary(Opcode::Add, a as i64, b as i64, ty).unwrap();
            let back = eval_binary(Opcode::Sub, sum, b as i64, ty).unwrap();
            prop_assert_eq!(truncate(a as i64, ty), back);
        }

        #[test]
        fn eval_binary_add_matches_wrapping_add_at_width(a: i8, b: i8) {
            let ty = IrType::int(8, true);
            let got = eval_binary(Opcode::Add, a as i64, b as i64, ty).unwrap();
            prop_assert_eq!(got, a.wrapping_add(b) as i64);
        }
    }
}
