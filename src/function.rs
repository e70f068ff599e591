//! §3.5: the per-function container — pseudo and instruction arenas, blocks, locals.

use serde::{Deserialize, Serialize};

use crate::block::{reverse_postorder, Block};
use crate::error::IrError;
use crate::insn::{BlockId, Insn, InsnId, IrType, Payload, SourcePos};
use crate::pseudo::{Pseudo, PseudoRegistry, SymbolId};

/// A compiled function: owns every instruction and block that belongs to it, so pseudo
/// handles (`InsnId`-keyed `Reg`/`Phi`) never need to cross a function boundary (§3.1,
/// §9 Design Notes on per-function arenas avoiding cross-function cycles).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub entry: BlockId,
    pub blocks: Vec<Block>,
    insns: Vec<Insn>,
    pub pseudos: PseudoRegistry,
    pub arg_types: Vec<IrType>,
    pub locals: Vec<SymbolId>,
}

impl Function {
    pub fn new(name: impl Into<String>) -> Self {
        let mut f = Function {
            name: name.into(),
            entry: BlockId(0),
            blocks: Vec::new(),
            insns: Vec::new(),
            pseudos: PseudoRegistry::new(),
            arg_types: Vec::new(),
            locals: Vec::new(),
        };
        let entry = f.alloc_block();
        f.entry = entry;
        f
    }

    pub fn alloc_block(&mut self) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(Block::new(id));
        id
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.0 as usize]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut Block {
        &mut self.blocks[id.0 as usize]
    }

    pub fn insn(&self, id: InsnId) -> &Insn {
        &self.insns[id.0 as usize]
    }

    pub fn insn_mut(&mut self, id: InsnId) -> &mut Insn {
        &mut self.insns[id.0 as usize]
    }

    pub fn insns(&self) -> &[Insn] {
        &self.insns
    }

    /// Allocates a new instruction in `block`'s arena slot and appends it to the block's
    /// order. The returned `InsnId` is also the identity a `Reg`/`Phi` pseudo carries
    /// when this instruction produces a value (§3.1).
    pub fn alloc_insn(
        &mut self,
        block: BlockId,
        opcode: crate::opcode::Opcode,
        ty: IrType,
        payload: Payload,
        pos: SourcePos,
    ) -> InsnId {
        let id = InsnId(self.insns.len() as u32);
        let target = if opcode == crate::opcode::Opcode::PhiSource {
            Pseudo::Phi(id)
        } else if opcode.is_terminator() || matches!(opcode, crate::opcode::Opcode::Store) {
            Pseudo::Void
        } else {
            Pseudo::Reg(id)
        };
        self.insns.push(Insn { id, opcode, block, target, ty, payload, pos, dead: false });
        self.register_operand_uses(id);
        self.block_mut(block).push(id);
        id
    }

    /// Forces `target` to `Pseudo::Void` after allocation, for opcodes with no result
    /// (RET/BR/CBR/SWITCH/terminators in general).
    pub fn set_void_target(&mut self, id: InsnId) {
        self.insns[id.0 as usize].target = Pseudo::Void;
    }

    /// Like `alloc_insn`, but inserts into `block`'s order immediately before `before`
    /// instead of appending. Used by `insert_select`/`insert_branch`/`alloc_phi` (§3.6,
    /// §4.1, §6.3), which need to land an instruction ahead of a still-live terminator.
    pub fn alloc_insn_before(
        &mut self,
        block: BlockId,
        before: InsnId,
        opcode: crate::opcode::Opcode,
        ty: IrType,
        payload: Payload,
        pos: SourcePos,
    ) -> InsnId {
        let id = InsnId(self.insns.len() as u32);
        let target = if opcode == crate::opcode::Opcode::PhiSource {
            Pseudo::Phi(id)
        } else if opcode.is_terminator() || matches!(opcode, crate::opcode::Opcode::Store) {
            Pseudo::Void
        } else {
            Pseudo::Reg(id)
        };
        self.insns.push(Insn { id, opcode, block, target, ty, payload, pos, dead: false });
        self.register_operand_uses(id);
        let insns = &mut self.block_mut(block).insns;
        let at = insns.iter().position(|&i| i == before).unwrap_or(insns.len());
        insns.insert(at, id);
        id
    }

    /// §4.1 C1 registry operation: allocates a PHISOURCE instruction in `source_bb`,
    /// immediately before its terminator, carrying `operand` forward as one source of the
    /// φ-node identified by `owner`. Returns the PHI pseudo this source defines and the
    /// instruction itself, matching the pair a φ-node's `sources` list records per
    /// predecessor.
    pub fn alloc_phi(&mut self, source_bb: BlockId, operand: Pseudo, owner: InsnId, ty: IrType) -> (Pseudo, InsnId) {
        let payload = Payload::PhiSource { value: operand, phi: owner };
        let terminator = self.block(source_bb).insns.last().copied();
        let id = match terminator {
            Some(before) => {
                self.alloc_insn_before(source_bb, before, crate::opcode::Opcode::PhiSource, ty, payload, SourcePos::default())
            }
            None => self.alloc_insn(source_bb, crate::opcode::Opcode::PhiSource, ty, payload, SourcePos::default()),
        };
        (Pseudo::Phi(id), id)
    }

    fn register_operand_uses(&mut self, id: InsnId) {
        for (slot, operand) in crate::usedef::operand_slots(self.insn(id)) {
            self.pseudos.add_user(operand, id, slot);
        }
    }

    pub fn reverse_postorder(&self) -> Vec<BlockId> {
        reverse_postorder(self.entry, &self.blocks)
    }

    /// Checks the invariants spec §8.1 lists as always-true on well-formed IR: every
    /// block ends in exactly one terminator, every jump target exists, every phi has one
    /// source per predecessor drawn from an actual predecessor.
    pub fn validate(&self) -> Result<(), IrError> {
        if self.blocks.is_empty() {
            return Err(IrError::MissingEntryBlock);
        }

        for block in &self.blocks {
            let live: Vec<&Insn> = block.insns.iter().map(|&i| self.insn(i)).filter(|i| !i.dead).collect();
            let Some(last) = live.last() else {
                return Err(IrError::UnterminatedBlock(block.id));
            };
            if !last.opcode.is_terminator() {
                return Err(IrError::UnterminatedBlock(block.id));
            }
            if live.iter().take(live.len() - 1).any(|i| i.opcode.is_terminator()) {
                return Err(IrError::TerminatorNotLast(block.id));
            }

            if let Payload::Terminator { targets, switch_arms, .. } = &last.payload {
                for &t in targets {
                    if t.0 as usize >= self.blocks.len() {
                        return Err(IrError::DanglingJumpTarget { from: block.id, to: t });
                    }
                }
                for arm in switch_arms {
                    if arm.target.0 as usize >= self.blocks.len() {
                        return Err(IrError::DanglingJumpTarget { from: block.id, to: arm.target });
                    }
                }
            }

            for &iid in &block.insns {
                let insn = self.insn(iid);
                if insn.dead {
                    continue;
                }
                if let Payload::Phi { sources } = &insn.payload {
                    if sources.len() != block.preds.len() {
                        return Err(IrError::PhiArityMismatch {
                            insn: iid,
                            block: block.id,
                            expected: block.preds.len(),
                            got: sources.len(),
                        });
                    }
                    for (src_block, _) in sources {
                        if !block.preds.contains(src_block) {
                            return Err(IrError::PhiSourceNotPredecessor {
                                insn: iid,
                                block: block.id,
                                source_block: *src_block,
                            });
                        }
                    }
                }

                for (_, operand) in crate::usedef::operand_slots(insn) {
                    if operand == Pseudo::Reg(iid) || operand == Pseudo::Phi(iid) {
                        return Err(IrError::SelfReferentialOperand(iid));
                    }
                }
            }
        }

        Ok(())
    }
}
