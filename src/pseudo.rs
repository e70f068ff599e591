//! Pseudo registry (C1): SSA value handles, interning, and use-list bookkeeping.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::insn::{InsnId, Slot};

/// A declaration a [`Pseudo::Sym`] refers to: a global, a function, or a string literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolKind {
    Global,
    Function,
    StringLiteral,
}

/// Metadata the front-end attaches to a symbol (§6.1): the core never re-derives these,
/// it only consumes them (pointer-ness gates cast simplification, `PURE` gates call
/// elimination, `VOLATILE` guards loads from being killed).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolInfo {
    pub name: String,
    pub kind: SymbolKind,
    pub is_ptr_type: bool,
    pub is_float_type: bool,
    pub bit_size: u8,
    pub is_signed: bool,
    pub volatile: bool,
    pub pure_fn: bool,
}

impl SymbolInfo {
    pub fn global(name: impl Into<String>, bit_size: u8, is_signed: bool) -> Self {
        Self {
            name: name.into(),
            kind: SymbolKind::Global,
            is_ptr_type: false,
            is_float_type: false,
            bit_size,
            is_signed,
            volatile: false,
            pure_fn: false,
        }
    }

    pub fn pure_function(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: SymbolKind::Function,
            is_ptr_type: true,
            is_float_type: false,
            bit_size: 64,
            is_signed: false,
            volatile: false,
            pure_fn: true,
        }
    }

    pub fn volatile(mut self) -> Self {
        self.volatile = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SymbolId(pub u32);

/// A polymorphic SSA value handle (§3.1).
///
/// `Reg`/`Phi` carry the id of their *defining instruction* rather than a separate
/// counter — a REG pseudo's identity and its unique-def invariant collapse into the same
/// field, which is exactly the guarantee §3.1 asks for ("a REG pseudo has exactly one
/// defining instruction... destroying the def invalidates the pseudo").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Pseudo {
    Void,
    Val(i64),
    Sym(SymbolId),
    Arg(u32),
    Reg(InsnId),
    /// Produced by a φ-source instruction (the `InsnId` of that PHISOURCE).
    Phi(InsnId),
}

impl Pseudo {
    /// VOID and VAL carry no use list; everything else does (§3.1).
    pub fn has_use_list(self) -> bool {
        !matches!(self, Pseudo::Void | Pseudo::Val(_))
    }

    pub fn is_val(self) -> bool {
        matches!(self, Pseudo::Val(_))
    }

    pub fn as_val(self) -> Option<i64> {
        match self {
            Pseudo::Val(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_sym(self) -> bool {
        matches!(self, Pseudo::Sym(_))
    }

    pub fn is_void(self) -> bool {
        matches!(self, Pseudo::Void)
    }

    /// Rank used by canonicalization: VAL sorts rightmost, then SYM, then everything
    /// else (REG/ARG/PHI), per the Canonical order glossary entry.
    pub fn canonical_rank(self) -> u8 {
        match self {
            Pseudo::Val(_) => 2,
            Pseudo::Sym(_) => 1,
            _ => 0,
        }
    }
}

/// Key identifying a use-listed pseudo's *identity* for the purposes of the side table
/// below (VAL/VOID never appear here since they have no use list).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum UseKey {
    Sym(SymbolId),
    Arg(u32),
    Reg(InsnId),
    Phi(InsnId),
}

impl UseKey {
    fn from_pseudo(p: Pseudo) -> Option<UseKey> {
        match p {
            Pseudo::Sym(s) => Some(UseKey::Sym(s)),
            Pseudo::Arg(n) => Some(UseKey::Arg(n)),
            Pseudo::Reg(i) => Some(UseKey::Reg(i)),
            Pseudo::Phi(i) => Some(UseKey::Phi(i)),
            Pseudo::Void | Pseudo::Val(_) => None,
        }
    }
}

/// One textual occurrence of a pseudo as an instruction operand (§3.3): the `Slot`
/// identifies which operand field holds it, so rewiring never has to search.
pub type UseSite = (InsnId, Slot);

/// C1: allocates and interns pseudos, and owns every use-listed pseudo's user list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PseudoRegistry {
    symbols: Vec<SymbolInfo>,
    symbol_cache: HashMap<String, SymbolId>,
    arg_count: u32,
    #[serde(skip)]
    users: HashMap<UseKey, SmallVec<[UseSite; 4]>>,
}

impl PseudoRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `value_pseudo` (§4.1): VAL pseudos carry no identity beyond their bit pattern, so
    /// interning is just returning the variant — two calls with the same `v` already
    /// compare equal without needing a lookup table.
    pub fn value_pseudo(v: i64) -> Pseudo {
        Pseudo::Val(v)
    }

    pub fn intern_symbol(&mut self, info: SymbolInfo) -> Pseudo {
        if let Some(&id) = self.symbol_cache.get(&info.name) {
            return Pseudo::Sym(id);
        }
        let id = SymbolId(self.symbols.len() as u32);
        self.symbol_cache.insert(info.name.clone(), id);
        self.symbols.push(info);
        Pseudo::Sym(id)
    }

    pub fn symbol_info(&self, id: SymbolId) -> &SymbolInfo {
        &self.symbols[id.0 as usize]
    }

    pub fn declare_arg(&mut self) -> Pseudo {
        let n = self.arg_count;
        self.arg_count += 1;
        Pseudo::Arg(n)
    }

    pub fn has_use_list(p: Pseudo) -> bool {
        p.has_use_list()
    }

    pub fn add_user(&mut self, p: Pseudo, insn: InsnId, slot: Slot) {
        if let Some(key) = UseKey::from_pseudo(p) {
            self.users.entry(key).or_default().push((insn, slot));
        }
    }

    /// Removes exactly one matching `(insn, slot)` entry. Per §4.3 this does not search:
    /// in a real implementation the slot pointer would identify the entry directly; here
    /// the `(insn, slot)` pair plays that role, so removal is a single equality scan of a
    /// typically tiny (≤ a few elements) `SmallVec`.
    pub fn remove_user(&mut self, p: Pseudo, insn: InsnId, slot: Slot) {
        if let Some(key) = UseKey::from_pseudo(p) {
            if let Some(list) = self.users.get_mut(&key) {
                let pos = list.iter().position(|&(i, s)| i == insn && s == slot);
                debug_assert!(pos.is_some(), "removing a use site {insn:?}/{slot:?} that was never registered for {p:?}");
                if let Some(pos) = pos {
                    list.remove(pos);
                }
                if list.is_empty() {
                    self.users.remove(&key);
                }
            }
        }
    }

    pub fn users(&self, p: Pseudo) -> &[UseSite] {
        match UseKey::from_pseudo(p) {
            Some(key) => self.users.get(&key).map(|v| v.as_slice()).unwrap_or(&[]),
            None => &[],
        }
    }

    pub fn user_count(&self, p: Pseudo) -> usize {
        self.users(p).len()
    }

    pub fn has_users(&self, p: Pseudo) -> bool {
        self.user_count(p) > 0
    }

    /// Moves every user of `from` onto `to` in one shot, used by `replace_target`.
    pub(crate) fn take_users(&mut self, from: Pseudo) -> SmallVec<[UseSite; 4]> {
        match UseKey::from_pseudo(from) {
            Some(key) => self.users.remove(&key).unwrap_or_default(),
            None => SmallVec::new(),
        }
    }

    pub(crate) fn set_users(&mut self, p: Pseudo, sites: SmallVec<[UseSite; 4]>) {
        if sites.is_empty() {
            return;
        }
        if let Some(key) = UseKey::from_pseudo(p) {
            self.users.entry(key).or_default().extend(sites);
        }
    }
}
