//! Crate-wide error type for malformed-input validation (§7 category 3).
//!
//! Internal invariant violations (§7 category 2) are `debug_assert!`s at their call
//! sites, not variants here — they indicate a bug in this crate, not bad input, and must
//! never be routinely recoverable.

use thiserror::Error;

use crate::insn::{BlockId, InsnId};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IrError {
    #[error("block {0:?} has no terminator")]
    UnterminatedBlock(BlockId),

    #[error("block {0:?} has a terminator before its last instruction")]
    TerminatorNotLast(BlockId),

    #[error("jump from block {from:?} targets undefined block {to:?}")]
    DanglingJumpTarget { from: BlockId, to: BlockId },

    #[error("phi {insn:?} has {got} source(s) but block {block:?} has {expected} predecessor(s)")]
    PhiArityMismatch { insn: InsnId, block: BlockId, expected: usize, got: usize },

    #[error("phi {insn:?} source block {source_block:?} is not a predecessor of {block:?}")]
    PhiSourceNotPredecessor { insn: InsnId, block: BlockId, source_block: BlockId },

    #[error("instruction {0:?} references itself as an operand")]
    SelfReferentialOperand(InsnId),

    #[error("function has no entry block registered")]
    MissingEntryBlock,
}
