//! Ambient: a compilation unit holding many functions and external symbol declarations.
//!
//! Out of scope per spec.md (the C front-end, linker, and symbol resolution are external
//! collaborators); this is just the container the driver walks function-by-function.

use serde::{Deserialize, Serialize};

use crate::function::Function;
use crate::pseudo::SymbolInfo;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Module {
    pub functions: Vec<Function>,
    pub externs: Vec<SymbolInfo>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_function(&mut self, f: Function) {
        self.functions.push(f);
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn function_mut(&mut self, name: &str) -> Option<&mut Function> {
        self.functions.iter_mut().find(|f| f.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_name() {
        let mut m = Module::new();
        m.add_function(Function::new("main"));
        assert!(m.function("main").is_some());
        assert!(m.function("missing").is_none());
    }
}
