// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Symbol table for labels.
//!
//! Insertion order is preserved; the entries file depends on it being
//! deterministic. Lookup is a linear scan, which is fine at the scale of
//! one translation unit.

/// What a symbol names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Code,
    Data,
    External,
    /// Declared `.entry` before any definition has been seen.
    Entry,
}

#[derive(Debug, Clone)]
pub struct SymbolEntry {
    pub name: String,
    pub address: u16,
    pub kind: SymbolKind,
    /// Set by `.entry`, independent of kind so data symbols keep both
    /// roles.
    pub is_entry: bool,
    pub defined: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum SymbolTableResult {
    Ok,
    Duplicate,
    NotFound,
    NotDefined,
    /// A name declared `.extern` was also given a local definition.
    ExternalConflict,
}

#[derive(Debug, Default)]
pub struct SymbolTable {
    entries: Vec<SymbolEntry>,
}

impl SymbolTable {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Insert a new symbol. Reconciliation of `.entry`/`.extern`
    /// redeclarations goes through [`define`], [`declare_extern`], and
    /// [`declare_entry`] instead.
    ///
    /// [`define`]: SymbolTable::define
    /// [`declare_extern`]: SymbolTable::declare_extern
    /// [`declare_entry`]: SymbolTable::declare_entry
    pub fn insert(&mut self, name: &str, address: u16, kind: SymbolKind) -> SymbolTableResult {
        if self.entry(name).is_some() {
            return SymbolTableResult::Duplicate;
        }
        self.entries.push(SymbolEntry {
            name: name.to_string(),
            address,
            kind,
            is_entry: kind == SymbolKind::Entry,
            defined: false,
        });
        SymbolTableResult::Ok
    }

    #[must_use]
    pub fn entry(&self, name: &str) -> Option<&SymbolEntry> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    pub fn entry_mut(&mut self, name: &str) -> Option<&mut SymbolEntry> {
        self.entries.iter_mut().find(|entry| entry.name == name)
    }

    /// Look up a symbol's address.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<u16> {
        self.entry(name).map(|entry| entry.address)
    }

    /// Give a symbol its definition at `address` with a concrete kind.
    /// An undefined placeholder (from `.entry`) keeps its entry flag and
    /// takes the concrete kind; a second definition is a duplicate; a
    /// name declared `.extern` cannot be defined locally.
    pub fn define(&mut self, name: &str, address: u16, kind: SymbolKind) -> SymbolTableResult {
        if let Some(entry) = self.entry_mut(name) {
            if entry.kind == SymbolKind::External {
                return SymbolTableResult::ExternalConflict;
            }
            if entry.defined {
                return SymbolTableResult::Duplicate;
            }
            entry.address = address;
            entry.kind = kind;
            entry.defined = true;
            return SymbolTableResult::Ok;
        }
        self.entries.push(SymbolEntry {
            name: name.to_string(),
            address,
            kind,
            is_entry: false,
            defined: true,
        });
        SymbolTableResult::Ok
    }

    /// Process one `.extern` operand. Externals live at address 0 and
    /// are never marked defined; redeclaring an external is idempotent,
    /// externing a defined name is an error, and a known-but-undefined
    /// name is left untouched.
    pub fn declare_extern(&mut self, name: &str) -> SymbolTableResult {
        match self.entry(name) {
            Some(entry) if entry.defined => SymbolTableResult::Duplicate,
            Some(_) => SymbolTableResult::Ok,
            None => {
                self.entries.push(SymbolEntry {
                    name: name.to_string(),
                    address: 0,
                    kind: SymbolKind::External,
                    is_entry: false,
                    defined: false,
                });
                SymbolTableResult::Ok
            }
        }
    }

    /// Process one `.entry` operand: set the entry flag, inserting an
    /// undefined placeholder when the name is new.
    pub fn declare_entry(&mut self, name: &str) -> SymbolTableResult {
        if let Some(entry) = self.entry_mut(name) {
            entry.is_entry = true;
            return SymbolTableResult::Ok;
        }
        self.entries.push(SymbolEntry {
            name: name.to_string(),
            address: 0,
            kind: SymbolKind::Entry,
            is_entry: true,
            defined: false,
        });
        SymbolTableResult::Ok
    }

    /// Flip a symbol to defined without touching its address.
    pub fn mark_defined(&mut self, name: &str) -> SymbolTableResult {
        match self.entry_mut(name) {
            None => SymbolTableResult::NotFound,
            Some(entry) if entry.defined => SymbolTableResult::Duplicate,
            Some(entry) => {
                entry.defined = true;
                SymbolTableResult::Ok
            }
        }
    }

    /// Rewrite the address of an already-defined symbol.
    pub fn update_address(&mut self, name: &str, address: u16) -> SymbolTableResult {
        match self.entry_mut(name) {
            None => SymbolTableResult::NotFound,
            Some(entry) if !entry.defined => SymbolTableResult::NotDefined,
            Some(entry) => {
                entry.address = address;
                SymbolTableResult::Ok
            }
        }
    }

    /// Remove a symbol.
    pub fn remove(&mut self, name: &str) -> SymbolTableResult {
        match self.entries.iter().position(|entry| entry.name == name) {
            None => SymbolTableResult::NotFound,
            Some(idx) => {
                self.entries.remove(idx);
                SymbolTableResult::Ok
            }
        }
    }

    /// Shift every defined data symbol up by the final instruction
    /// counter, placing data directly above the code segment.
    pub fn relocate_data(&mut self, ic_final: u16) {
        for entry in &mut self.entries {
            if entry.kind == SymbolKind::Data && entry.defined {
                entry.address = entry.address.wrapping_add(ic_final);
            }
        }
    }

    /// Symbols in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &SymbolEntry> {
        self.entries.iter()
    }

    /// Names flagged `.entry` that never received a definition.
    pub fn undefined_entries(&self) -> impl Iterator<Item = &SymbolEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.is_entry && !entry.defined)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// How a resolved symbol is encoded into an operand word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Relocatable(u16),
    External,
}

impl SymbolTable {
    /// Resolve a direct or matrix-base reference for encoding.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<Resolution> {
        let entry = self.entry(name)?;
        if entry.kind == SymbolKind::External {
            return Some(Resolution::External);
        }
        Some(Resolution::Relocatable(entry.address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn define_then_lookup() {
        let mut table = SymbolTable::new();
        assert_eq!(table.define("MAIN", 100, SymbolKind::Code), SymbolTableResult::Ok);
        assert_eq!(table.lookup("MAIN"), Some(100));
        assert_eq!(table.lookup("OTHER"), None);
        assert!(table.entry("MAIN").unwrap().defined);
    }

    #[test]
    fn duplicate_definition_is_rejected() {
        let mut table = SymbolTable::new();
        assert_eq!(table.define("X", 100, SymbolKind::Code), SymbolTableResult::Ok);
        assert_eq!(
            table.define("X", 105, SymbolKind::Code),
            SymbolTableResult::Duplicate
        );
        assert_eq!(table.lookup("X"), Some(100));
    }

    #[test]
    fn entry_placeholder_upgrades_on_definition() {
        let mut table = SymbolTable::new();
        assert_eq!(table.declare_entry("START"), SymbolTableResult::Ok);
        let placeholder = table.entry("START").unwrap();
        assert_eq!(placeholder.kind, SymbolKind::Entry);
        assert!(placeholder.is_entry);
        assert!(!placeholder.defined);

        assert_eq!(table.define("START", 102, SymbolKind::Code), SymbolTableResult::Ok);
        let defined = table.entry("START").unwrap();
        assert_eq!(defined.kind, SymbolKind::Code);
        assert!(defined.is_entry);
        assert!(defined.defined);
        assert_eq!(defined.address, 102);
    }

    #[test]
    fn data_symbol_keeps_kind_when_marked_entry() {
        let mut table = SymbolTable::new();
        assert_eq!(table.define("N", 4, SymbolKind::Data), SymbolTableResult::Ok);
        assert_eq!(table.declare_entry("N"), SymbolTableResult::Ok);
        let entry = table.entry("N").unwrap();
        assert_eq!(entry.kind, SymbolKind::Data);
        assert!(entry.is_entry);
    }

    #[test]
    fn extern_rules() {
        let mut table = SymbolTable::new();
        assert_eq!(table.declare_extern("X"), SymbolTableResult::Ok);
        let entry = table.entry("X").unwrap();
        assert_eq!(entry.kind, SymbolKind::External);
        assert_eq!(entry.address, 0);
        assert!(!entry.defined);

        // Re-extern is silently idempotent.
        assert_eq!(table.declare_extern("X"), SymbolTableResult::Ok);

        // Externing a defined name is an error.
        assert_eq!(table.define("Y", 100, SymbolKind::Code), SymbolTableResult::Ok);
        assert_eq!(table.declare_extern("Y"), SymbolTableResult::Duplicate);

        // Defining an external is an error.
        assert_eq!(
            table.define("X", 110, SymbolKind::Code),
            SymbolTableResult::ExternalConflict
        );
    }

    #[test]
    fn extern_leaves_entry_placeholder_untouched() {
        let mut table = SymbolTable::new();
        assert_eq!(table.declare_entry("E"), SymbolTableResult::Ok);
        assert_eq!(table.declare_extern("E"), SymbolTableResult::Ok);
        assert_eq!(table.entry("E").unwrap().kind, SymbolKind::Entry);
    }

    #[test]
    fn relocates_only_defined_data() {
        let mut table = SymbolTable::new();
        assert_eq!(table.define("D", 3, SymbolKind::Data), SymbolTableResult::Ok);
        assert_eq!(table.define("C", 100, SymbolKind::Code), SymbolTableResult::Ok);
        assert_eq!(table.declare_extern("X"), SymbolTableResult::Ok);
        table.relocate_data(107);
        assert_eq!(table.lookup("D"), Some(110));
        assert_eq!(table.lookup("C"), Some(100));
        assert_eq!(table.lookup("X"), Some(0));
    }

    #[test]
    fn insert_mark_update_remove() {
        let mut table = SymbolTable::new();
        assert_eq!(table.insert("A", 7, SymbolKind::Code), SymbolTableResult::Ok);
        assert_eq!(table.insert("A", 7, SymbolKind::Code), SymbolTableResult::Duplicate);
        assert_eq!(
            table.update_address("A", 9),
            SymbolTableResult::NotDefined
        );
        assert_eq!(table.mark_defined("A"), SymbolTableResult::Ok);
        assert_eq!(table.mark_defined("A"), SymbolTableResult::Duplicate);
        assert_eq!(table.update_address("A", 9), SymbolTableResult::Ok);
        assert_eq!(table.lookup("A"), Some(9));
        assert_eq!(table.mark_defined("B"), SymbolTableResult::NotFound);
        assert_eq!(table.remove("A"), SymbolTableResult::Ok);
        assert_eq!(table.remove("A"), SymbolTableResult::NotFound);
        assert!(table.is_empty());
    }

    #[test]
    fn undefined_entries_are_swept() {
        let mut table = SymbolTable::new();
        assert_eq!(table.declare_entry("DONE"), SymbolTableResult::Ok);
        assert_eq!(table.declare_entry("MISSING"), SymbolTableResult::Ok);
        assert_eq!(table.define("DONE", 101, SymbolKind::Code), SymbolTableResult::Ok);
        let missing: Vec<&str> = table
            .undefined_entries()
            .map(|entry| entry.name.as_str())
            .collect();
        assert_eq!(missing, vec!["MISSING"]);
    }

    #[test]
    fn resolves_for_encoding() {
        let mut table = SymbolTable::new();
        assert_eq!(table.define("L", 105, SymbolKind::Code), SymbolTableResult::Ok);
        assert_eq!(table.declare_extern("X"), SymbolTableResult::Ok);
        assert_eq!(table.resolve("L"), Some(Resolution::Relocatable(105)));
        assert_eq!(table.resolve("X"), Some(Resolution::External));
        assert_eq!(table.resolve("NOPE"), None);
    }
}
