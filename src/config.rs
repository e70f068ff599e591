//! Developer-flag surface (§6.4) and the pass-enablement/repeat bitsets the driver and
//! simplifier thread through explicitly rather than through global mutable state
//! (§9 Design Notes).

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// What the fixed-point driver should re-run because of a rewrite (§4.7): set by
    /// `simplify`/`killer` as an explicit return value, never a global.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct RepeatMask: u8 {
        const CSE            = 0b001;
        const SYMBOL_CLEANUP = 0b010;
        const CFG_CLEANUP    = 0b100;
    }
}

bitflags! {
    /// Mirrors the `-f<pass>` switches a CLI (out of scope here) would parse into this
    /// struct before constructing a `Driver` (§6.4).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct PassSet: u8 {
        const CANONICALIZE = 0b0001;
        const ALGEBRAIC    = 0b0010;
        const IF_CONVERT   = 0b0100;
        const DCE          = 0b1000;
    }
}

impl Default for PassSet {
    fn default() -> Self {
        PassSet::all()
    }
}

/// Per-function simplification knobs (§6.4, §9 "Open Question (ii)").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimplifyConfig {
    pub warn_on_shift_overflow: bool,
    pub warn_on_tautological_compare: bool,
    pub warn_on_self_reference: bool,
    /// Whether `OP_RANGE` folds away when its operand is statically in-range.
    /// Default `true` — see DESIGN.md's decision on Open Question (ii).
    pub fold_op_range: bool,
    pub enabled_passes: PassSet,
    /// Upper bound on fixed-point iterations (§4.7); a safety valve, never expected to
    /// be hit on well-formed input since each rewrite strictly shrinks or simplifies IR.
    pub max_iterations: u32,
}

impl Default for SimplifyConfig {
    fn default() -> Self {
        SimplifyConfig {
            warn_on_shift_overflow: true,
            warn_on_tautological_compare: true,
            warn_on_self_reference: true,
            fold_op_range: true,
            enabled_passes: PassSet::default(),
            max_iterations: 64,
        }
    }
}
