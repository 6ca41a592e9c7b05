//! Fixed-capacity symbol table.
//!
//! Global entries grow up from index 0; local entries grow down from the
//! top of the fixed-capacity table, matching the source layout's two
//! growth directions within one array.

use crate::diagnostics::{CompileError, Result};
use crate::types::PrimitiveType;

pub type SymbolId = usize;

/// Fixed capacity of the symbol table, matching the source language's
/// `NSYMBOLS`.
pub const NSYMBOLS: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuralType {
    Variable,
    Function,
    Array,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageClass {
    Global,
    Local,
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub ty: PrimitiveType,
    pub structural: StructuralType,
    pub storage: StorageClass,
    /// End-of-function label, set for `Function` symbols.
    pub end_label: Option<u32>,
    /// Element count for `Array` symbols; 1 for scalars.
    pub size: usize,
    /// Frame-relative byte offset for `Local` symbols.
    pub stack_offset: i64,
    /// Total local-variable frame size in bytes, set on `Function` symbols
    /// once their body has been parsed.
    pub frame_bytes: usize,
}

/// Fixed-capacity symbol table. Slots `[0, next_global)` hold globals;
/// slots `[next_local, NSYMBOLS)` hold locals. Entries are never freed
/// during compilation; `locals_floor` instead bounds name lookup to the
/// function currently being parsed, so an earlier function's locals stay
/// resident (codegen walks every function after parsing completes) without
/// being visible to a later function's identifier resolution.
pub struct SymbolTable {
    slots: Vec<Option<Symbol>>,
    next_global: usize,
    next_local: usize,
    locals_floor: usize,
}

impl SymbolTable {
    pub fn new() -> Self {
        let mut slots = Vec::with_capacity(NSYMBOLS);
        slots.resize_with(NSYMBOLS, || None);
        SymbolTable {
            slots,
            next_global: 0,
            next_local: NSYMBOLS,
            locals_floor: NSYMBOLS,
        }
    }

    /// Narrows local name lookup to symbols added from this point forward,
    /// called when the parser enters a new function. Previously-parsed
    /// functions' locals remain in the table but drop out of `find_local`.
    pub fn begin_function_scope(&mut self) {
        self.locals_floor = self.next_local;
    }

    /// Inserts a global symbol. Re-inserting an existing global name
    /// returns the existing slot rather than erroring.
    pub fn add_global(&mut self, symbol: Symbol) -> Result<SymbolId> {
        if let Some(existing) = self.find_global(&symbol.name) {
            return Ok(existing);
        }
        if self.next_global >= self.next_local {
            return Err(CompileError::internal(0, "symbol table is full"));
        }
        let id = self.next_global;
        self.slots[id] = Some(symbol);
        self.next_global += 1;
        Ok(id)
    }

    pub fn add_local(&mut self, symbol: Symbol) -> Result<SymbolId> {
        if self.next_local == 0 || self.next_local - 1 <= self.next_global {
            return Err(CompileError::internal(0, "symbol table is full"));
        }
        self.next_local -= 1;
        let id = self.next_local;
        self.slots[id] = Some(symbol);
        Ok(id)
    }

    fn find_global(&self, name: &str) -> Option<SymbolId> {
        self.slots[..self.next_global]
            .iter()
            .position(|s| s.as_ref().is_some_and(|s| s.name == name))
    }

    fn find_local(&self, name: &str) -> Option<SymbolId> {
        self.slots[self.next_local..self.locals_floor]
            .iter()
            .position(|s| s.as_ref().is_some_and(|s| s.name == name))
            .map(|offset| self.next_local + offset)
    }

    /// Looks up `name`, preferring a local match over a global one.
    pub fn lookup(&self, name: &str) -> Option<SymbolId> {
        self.find_local(name).or_else(|| self.find_global(name))
    }

    pub fn get(&self, id: SymbolId) -> &Symbol {
        self.slots[id]
            .as_ref()
            .expect("SymbolId must refer to a live slot")
    }

    pub fn get_mut(&mut self, id: SymbolId) -> &mut Symbol {
        self.slots[id]
            .as_mut()
            .expect("SymbolId must refer to a live slot")
    }

    /// Every global symbol, in insertion order.
    pub fn globals(&self) -> impl Iterator<Item = &Symbol> {
        self.slots[..self.next_global].iter().filter_map(|s| s.as_ref())
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str, ty: PrimitiveType, storage: StorageClass) -> Symbol {
        Symbol {
            name: name.to_string(),
            ty,
            structural: StructuralType::Variable,
            storage,
            end_label: None,
            size: 1,
            stack_offset: 0,
            frame_bytes: 0,
        }
    }

    #[test]
    fn lookup_after_insertion_returns_the_insertion_slot() {
        let mut table = SymbolTable::new();
        let id = table
            .add_global(var("counter", PrimitiveType::Int, StorageClass::Global))
            .unwrap();
        assert_eq!(table.lookup("counter"), Some(id));
    }

    #[test]
    fn locals_shadow_globals_of_the_same_name() {
        let mut table = SymbolTable::new();
        let g = table
            .add_global(var("x", PrimitiveType::Int, StorageClass::Global))
            .unwrap();
        let l = table
            .add_local(var("x", PrimitiveType::Int, StorageClass::Local))
            .unwrap();
        assert_ne!(g, l);
        assert_eq!(table.lookup("x"), Some(l));
    }

    #[test]
    fn re_adding_an_existing_global_returns_the_same_slot() {
        let mut table = SymbolTable::new();
        let first = table
            .add_global(var("g", PrimitiveType::Int, StorageClass::Global))
            .unwrap();
        let second = table
            .add_global(var("g", PrimitiveType::Long, StorageClass::Global))
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn begin_function_scope_hides_earlier_functions_locals_but_keeps_them_resident() {
        let mut table = SymbolTable::new();
        table.begin_function_scope();
        let first = table
            .add_local(var("i", PrimitiveType::Int, StorageClass::Local))
            .unwrap();
        table.begin_function_scope();
        let second = table
            .add_local(var("i", PrimitiveType::Int, StorageClass::Local))
            .unwrap();
        assert_eq!(table.lookup("i"), Some(second));
        // Not visible to lookup anymore, but the slot itself is untouched.
        assert_eq!(table.get(first).name, "i");
    }

    #[test]
    fn globals_and_locals_grow_from_opposite_ends() {
        let mut table = SymbolTable::new();
        let g = table
            .add_global(var("g", PrimitiveType::Int, StorageClass::Global))
            .unwrap();
        let l = table
            .add_local(var("l", PrimitiveType::Int, StorageClass::Local))
            .unwrap();
        assert_eq!(g, 0);
        assert_eq!(l, NSYMBOLS - 1);
    }
}
