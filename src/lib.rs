//! IR data model and local instruction simplifier.
//!
//! Owns the SSA pseudo-register value model, the instruction store and its use-def
//! chains, basic blocks and the CFG, an opcode-dispatched peephole simplifier, and the
//! fixed-point driver that repeats it until stable. The C front-end, `linearize`,
//! `mem2reg`, `unssa`, IR pretty-printing, and backend codegen are external collaborators
//! this crate never constructs.

pub mod block;
pub mod config;
pub mod diagnostics;
pub mod driver;
pub mod error;
pub mod eval;
pub mod function;
pub mod insn;
pub mod killer;
pub mod module;
pub mod opcode;
pub mod pseudo;
pub mod simplify;
pub mod usedef;

pub use block::Block;
pub use config::{PassSet, RepeatMask, SimplifyConfig};
pub use diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink, LogDiagnosticSink, NullSink, RecordingSink};
pub use error::IrError;
pub use function::Function;
pub use insn::{BlockId, Insn, InsnId, IrType, Payload, Slot, SourcePos, SwitchArm};
pub use module::Module;
pub use opcode::Opcode;
pub use pseudo::{Pseudo, PseudoRegistry, SymbolId, SymbolInfo, SymbolKind};
pub use driver::Driver;
