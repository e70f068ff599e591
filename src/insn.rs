//! C2: the instruction record and its opcode-keyed payload.

use serde::{Deserialize, Serialize};

use crate::opcode::Opcode;
use crate::pseudo::Pseudo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InsnId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(pub u32);

/// Identifies which operand field of an instruction's payload holds a given pseudo
/// (§3.3). `remove_use`/`replace_target` use this instead of searching the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Slot {
    Src1,
    Src2,
    Src3,
    Base,
    /// Index into a variadic operand list (`PHI` sources, `SWITCH` targets, `CALL` args).
    Indexed(u16),
}

/// Scalar type tag carried by every value-producing instruction (§3.2): width and
/// signedness drive the evaluator's masking, `is_float` routes opcode dispatch between
/// the integer and floating binop/compare families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IrType {
    pub bit_width: u8,
    pub is_signed: bool,
    pub is_float: bool,
    pub is_ptr: bool,
}

impl IrType {
    pub const BOOL: IrType = IrType { bit_width: 1, is_signed: false, is_float: false, is_ptr: false };

    pub fn int(bit_width: u8, is_signed: bool) -> Self {
        IrType { bit_width, is_signed, is_float: false, is_ptr: false }
    }

    pub fn float(bit_width: u8) -> Self {
        IrType { bit_width, is_signed: true, is_float: true, is_ptr: false }
    }

    pub fn ptr() -> Self {
        IrType { bit_width: 64, is_signed: false, is_float: false, is_ptr: true }
    }

    /// The all-ones mask for this width, per §4.4's "mask to the type's bit width".
    pub fn mask(self) -> u64 {
        if self.bit_width >= 64 {
            u64::MAX
        } else {
            (1u64 << self.bit_width) - 1
        }
    }
}

/// Source location a diagnostic can point at; front-end owned, opaque to this crate
/// beyond carrying it through for error messages (§6 external interfaces).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourcePos {
    pub line: u32,
    pub column: u32,
}

/// One CBR/SWITCH/BR/COMPUTED_GOTO successor edge: condition value plus destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchArm {
    pub value: i64,
    pub target: BlockId,
}

/// Opcode-shaped operand payload (§3.2). Variants group by *operand shape*, not by
/// individual opcode, matching the simplifier's opcode-range dispatch: anything that is
/// "any binop" lives in `Binary` regardless of which of the twenty binop opcodes it is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Payload {
    /// RET/BR/CBR/COMPUTED_GOTO/SWITCH.
    Terminator {
        cond: Option<Pseudo>,
        targets: Vec<BlockId>,
        switch_arms: Vec<SwitchArm>,
    },
    Binary { lhs: Pseudo, rhs: Pseudo },
    Unary { src: Pseudo },
    Select { cond: Pseudo, if_true: Pseudo, if_false: Pseudo },
    Load { addr: Pseudo, offset: i64, volatile: bool },
    Store { addr: Pseudo, offset: i64, value: Pseudo },
    SetVal { value: Pseudo },
    SymAddr { sym: Pseudo, offset: i64 },
    /// One entry per (predecessor block, incoming value) pair, in predecessor order.
    Phi { sources: Vec<(BlockId, Pseudo)> },
    /// A PHISOURCE feeds exactly one PHI via `value`; `phi` names the PHI it feeds.
    PhiSource { value: Pseudo, phi: InsnId },
    Cast { src: Pseudo, orig_type: IrType },
    Call { callee: Pseudo, args: Vec<Pseudo>, is_pure: bool },
    /// NOP/DEATH_NOTE/ASM/CONTEXT/SLICE/COPY/RANGE: no simplifier rule needs a typed
    /// payload for these beyond an optional single operand.
    Opaque { operand: Option<Pseudo> },
}

/// A single IR instruction (§3.2): arena-allocated, the unique definition site of its
/// `target` pseudo when it produces a value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Insn {
    pub id: InsnId,
    pub opcode: Opcode,
    pub block: BlockId,
    /// `Pseudo::Void` for instructions that produce no value (STORE, RET, branches).
    pub target: Pseudo,
    pub ty: IrType,
    pub payload: Payload,
    pub pos: SourcePos,
    /// Set by the killer (§4.5); a dead instruction keeps its slot in the arena (IDs
    /// never get reused) but is skipped by iteration and owns no uses.
    pub dead: bool,
}

impl Insn {
    pub fn is_dead(&self) -> bool {
        self.dead
    }

    pub fn has_side_effects(&self) -> bool {
        match self.opcode {
            Opcode::Store | Opcode::Asm | Opcode::DeathNote | Opcode::Context => true,
            Opcode::Call => !matches!(&self.payload, Payload::Call { is_pure, .. } if *is_pure),
            Opcode::Load => matches!(&self.payload, Payload::Load { volatile, .. } if *volatile),
            _ => self.opcode.is_terminator(),
        }
    }
}
