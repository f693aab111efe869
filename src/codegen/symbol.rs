//! Symbol table
//!
//! A stack of scopes, innermost last. Each scope maps an identifier to the
//! IR-level facts the generator needs about it: where it lives, its LLVM
//! type, and whether it may be reassigned.

use std::collections::HashMap;

use inkwell::types::{ArrayType, BasicTypeEnum};
use inkwell::values::{BasicValueEnum, PointerValue};

/// Everything the generator records about a declared name.
///
/// Entries hold either a storage pointer (`alloca`-backed variables) or an
/// inline value (compile-time constants); [SymbolEntry::variable] and
/// [SymbolEntry::constant] keep that invariant.
#[derive(Debug, Clone)]
pub struct SymbolEntry<'ctx> {
    /// Where the symbol lives; `None` for inline constants
    pub ptr: Option<PointerValue<'ctx>>,
    /// Inline value for constants that never hit memory
    pub value: Option<BasicValueEnum<'ctx>>,
    /// LLVM type of the stored value
    pub ty: BasicTypeEnum<'ctx>,
    /// Source-level type name, present for struct-typed symbols
    pub type_name: Option<String>,
    /// Present iff the symbol is an indexable array
    pub array_type: Option<ArrayType<'ctx>>,
    /// `const`-declared; forbids reassignment
    pub is_literal: bool,
}

impl<'ctx> SymbolEntry<'ctx> {
    pub fn variable(ptr: PointerValue<'ctx>, ty: BasicTypeEnum<'ctx>) -> Self {
        Self {
            ptr: Some(ptr),
            value: None,
            ty,
            type_name: None,
            array_type: None,
            is_literal: false,
        }
    }

    pub fn constant(value: BasicValueEnum<'ctx>, ty: BasicTypeEnum<'ctx>) -> Self {
        Self {
            ptr: None,
            value: Some(value),
            ty,
            type_name: None,
            array_type: None,
            is_literal: true,
        }
    }
}

pub struct SymbolTable<'ctx> {
    scopes: Vec<HashMap<String, SymbolEntry<'ctx>>>,
}

impl<'ctx> SymbolTable<'ctx> {
    /// Starts with the global scope already in place
    pub fn new() -> Self {
        Self {
            scopes: vec![HashMap::new()],
        }
    }

    pub fn push_scope(&mut self) {
        log::trace!("entering scope {}", self.scopes.len());
        self.scopes.push(HashMap::new());
    }

    pub fn pop_scope(&mut self) {
        debug_assert!(self.scopes.len() > 1, "the global scope stays");
        self.scopes.pop();
        log::trace!("left scope {}", self.scopes.len());
    }

    pub fn set(&mut self, name: impl Into<String>, entry: SymbolEntry<'ctx>) {
        let scope = self.scopes.last_mut().expect("at least the global scope");
        scope.insert(name.into(), entry);
    }

    /// Innermost scope first, stopping at the first match
    pub fn get(&self, name: &str) -> Option<&SymbolEntry<'ctx>> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }
}

impl Default for SymbolTable<'_> {
    fn default() -> Self {
        Self::new()
    }
}
