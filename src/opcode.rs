//! The opcode enumeration and its range/metadata tables.
//!
//! Opcodes are kept in the exact grouping order the simplifier's range checks rely on:
//! terminators, then integer binops, then float compares, then integer compares. Anyone
//! reordering this enum must update the range bounds below in lockstep.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Opcode {
    BadOp,
    Entry,

    // --- terminators: Ret..=ComputedGoto ---
    Ret,
    Br,
    Cbr,
    Switch,
    ComputedGoto,

    // --- any binop: Add..=OrBool ---
    Add,
    Sub,
    Mul,
    DivU,
    DivS,
    ModU,
    ModS,
    Shl,
    Lsr,
    Asr,
    FAdd,
    FSub,
    FMul,
    FDiv,
    And,
    Or,
    Xor,
    AndBool,
    OrBool,

    // --- float compares: FCmpOrd..=FCmpUno ---
    FCmpOrd,
    FCmpOeq,
    FCmpOne,
    FCmpOle,
    FCmpOge,
    FCmpOlt,
    FCmpOgt,
    FCmpUeq,
    FCmpUne,
    FCmpUle,
    FCmpUge,
    FCmpUlt,
    FCmpUgt,
    FCmpUno,

    // --- int compares: SetEq..=SetAe ---
    SetEq,
    SetNe,
    SetLe,
    SetGe,
    SetLt,
    SetGt,
    SetB,
    SetA,
    SetBe,
    SetAe,

    Not,
    Neg,
    FNeg,

    Sel,

    Load,
    Store,

    SetVal,
    SetFVal,
    SymAddr,

    Phi,
    PhiSource,

    Cast,
    SCast,
    FpCast,
    PtrCast,

    InlinedCall,
    Call,

    Slice,
    Nop,
    DeathNote,
    Asm,
    Context,
    Range,
    Copy,
}

impl Opcode {
    fn rank(self) -> u8 {
        self as u8
    }

    pub fn is_terminator(self) -> bool {
        (Opcode::Ret.rank()..=Opcode::ComputedGoto.rank()).contains(&self.rank())
    }

    /// "any binop" per §4.2 — includes float arithmetic and boolean ops, used as the
    /// sole dispatch mechanism for binary-shaped instructions.
    pub fn is_binop(self) -> bool {
        (Opcode::Add.rank()..=Opcode::OrBool.rank()).contains(&self.rank())
    }

    pub fn is_float_binop(self) -> bool {
        matches!(self, Opcode::FAdd | Opcode::FSub | Opcode::FMul | Opcode::FDiv)
    }

    pub fn is_fp_compare(self) -> bool {
        (Opcode::FCmpOrd.rank()..=Opcode::FCmpUno.rank()).contains(&self.rank())
    }

    pub fn is_int_compare(self) -> bool {
        (Opcode::SetEq.rank()..=Opcode::SetAe.rank()).contains(&self.rank())
    }

    pub fn is_compare(self) -> bool {
        self.is_fp_compare() || self.is_int_compare()
    }

    pub fn is_commutative(self) -> bool {
        matches!(
            self,
            Opcode::Add
                | Opcode::Mul
                | Opcode::And
                | Opcode::Or
                | Opcode::Xor
                | Opcode::AndBool
                | Opcode::OrBool
                | Opcode::FAdd
                | Opcode::FMul
                | Opcode::SetEq
                | Opcode::SetNe
                | Opcode::FCmpOeq
                | Opcode::FCmpUne
        )
    }

    pub fn is_unary(self) -> bool {
        matches!(self, Opcode::Not | Opcode::Neg | Opcode::FNeg)
    }

    pub fn is_cast(self) -> bool {
        matches!(self, Opcode::Cast | Opcode::SCast | Opcode::FpCast | Opcode::PtrCast)
    }

    /// The mirror opcode for a non-commutative compare when its operands are swapped
    /// (`<` becomes `>` etc). `None` for opcodes that aren't mirrorable compares.
    pub fn mirror(self) -> Option<Opcode> {
        use Opcode::*;
        Some(match self {
            SetLt => SetGt,
            SetGt => SetLt,
            SetLe => SetGe,
            SetGe => SetLe,
            SetB => SetA,
            SetA => SetB,
            SetBe => SetAe,
            SetAe => SetBe,
            FCmpOlt => FCmpOgt,
            FCmpOgt => FCmpOlt,
            FCmpOle => FCmpOge,
            FCmpOge => FCmpOle,
            FCmpUlt => FCmpUgt,
            FCmpUgt => FCmpUlt,
            FCmpUle => FCmpUge,
            FCmpUge => FCmpUle,
            _ => return None,
        })
    }

    /// The negated opcode: `setne(a,b)` is true exactly when `seteq(a,b)` is false, etc.
    /// Used to fuse a redundant compare-with-zero/one (§4.6.2 rule 3).
    pub fn negate(self) -> Option<Opcode> {
        use Opcode::*;
        Some(match self {
            SetEq => SetNe,
            SetNe => SetEq,
            SetLt => SetGe,
            SetGe => SetLt,
            SetLe => SetGt,
            SetGt => SetLe,
            SetB => SetAe,
            SetAe => SetB,
            SetBe => SetA,
            SetA => SetBe,
            FCmpOrd => FCmpUno,
            FCmpUno => FCmpOrd,
            FCmpOeq => FCmpUne,
            FCmpUne => FCmpOeq,
            FCmpOne => FCmpUeq,
            FCmpUeq => FCmpOne,
            FCmpOle => FCmpUgt,
            FCmpUgt => FCmpOle,
            FCmpOge => FCmpUlt,
            FCmpUlt => FCmpOge,
            FCmpOlt => FCmpUge,
            FCmpUge => FCmpOlt,
            FCmpOgt => FCmpUle,
            FCmpUle => FCmpOgt,
            _ => return None,
        })
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}
