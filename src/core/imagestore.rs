// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! The memory image and the object/entries/externals writers.

use std::io::{self, Write};

use crate::core::base4::{address_letters, code_letters, strip_leading};
use crate::core::symbol_table::SymbolTable;

/// First instruction address.
pub const INITIAL_IC: u16 = 100;

/// The two-bit A,R,E field attached to every emitted word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Are {
    Absolute = 0,
    External = 1,
    Relocatable = 2,
}

impl Are {
    pub fn bits(self) -> u16 {
        self as u16
    }
}

/// One encoded 10-bit word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachineWord {
    pub word: u16,
    pub are: Are,
}

/// A use site of an external symbol, recorded in encounter order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalRef {
    pub name: String,
    pub address: u16,
}

/// Two ordered word sequences: instructions from address 100, data from
/// the final instruction counter.
#[derive(Debug)]
pub struct ImageStore {
    code: Vec<MachineWord>,
    data: Vec<MachineWord>,
    ic_final: u16,
    dc_final: u16,
}

impl ImageStore {
    pub fn new(ic_final: u16, dc_final: u16) -> Self {
        debug_assert!(ic_final >= INITIAL_IC);
        Self {
            code: Vec::with_capacity(usize::from(ic_final - INITIAL_IC)),
            data: Vec::with_capacity(usize::from(dc_final)),
            ic_final,
            dc_final,
        }
    }

    pub fn push_code(&mut self, word: MachineWord) {
        self.code.push(word);
    }

    pub fn push_data(&mut self, word: MachineWord) {
        self.data.push(word);
    }

    pub fn code_words(&self) -> &[MachineWord] {
        &self.code
    }

    pub fn data_words(&self) -> &[MachineWord] {
        &self.data
    }

    /// Address the next code word will occupy.
    pub fn next_code_address(&self) -> u16 {
        INITIAL_IC + self.code.len() as u16
    }

    pub fn ic_final(&self) -> u16 {
        self.ic_final
    }

    pub fn dc_final(&self) -> u16 {
        self.dc_final
    }

    /// Write the `.ob` image: a header with the two segment sizes, then
    /// one "address code" line per word, instructions first.
    pub fn write_object<W: Write>(&self, mut out: W) -> io::Result<()> {
        debug_assert_eq!(self.code.len(), usize::from(self.ic_final - INITIAL_IC));
        debug_assert_eq!(self.data.len(), usize::from(self.dc_final));

        let code_count = address_letters(self.ic_final - INITIAL_IC);
        let data_count = address_letters(self.dc_final);
        writeln!(
            out,
            "{} {}",
            strip_leading(&code_count),
            strip_leading(&data_count)
        )?;

        for (idx, word) in self.code.iter().enumerate() {
            let address = INITIAL_IC + idx as u16;
            writeln!(out, "{} {}", address_letters(address), code_letters(word.word))?;
        }
        for (idx, word) in self.data.iter().enumerate() {
            let address = self.ic_final + idx as u16;
            writeln!(out, "{} {}", address_letters(address), code_letters(word.word))?;
        }
        Ok(())
    }
}

/// True when the symbol table has anything for the entries file.
pub fn has_defined_entries(symbols: &SymbolTable) -> bool {
    symbols.iter().any(|entry| entry.is_entry && entry.defined)
}

/// Write the `.ent` file: every defined entry symbol, table order.
pub fn write_entries<W: Write>(symbols: &SymbolTable, mut out: W) -> io::Result<()> {
    for entry in symbols.iter() {
        if entry.is_entry && entry.defined {
            writeln!(out, "{} {}", entry.name, address_letters(entry.address))?;
        }
    }
    Ok(())
}

/// Write the `.ext` file: every external use site, encounter order.
pub fn write_externals<W: Write>(refs: &[ExternalRef], mut out: W) -> io::Result<()> {
    for reference in refs {
        writeln!(out, "{} {}", reference.name, address_letters(reference.address))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::symbol_table::SymbolKind;

    fn render<F: FnOnce(&mut Vec<u8>) -> io::Result<()>>(write: F) -> String {
        let mut out = Vec::new();
        write(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn object_header_counts_are_stripped() {
        let mut image = ImageStore::new(102, 1);
        image.push_code(MachineWord { word: 60, are: Are::Absolute });
        image.push_code(MachineWord { word: 72, are: Are::Absolute });
        image.push_data(MachineWord { word: 5, are: Are::Absolute });
        let text = render(|out| image.write_object(out));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "c b");
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn object_addresses_run_code_then_data() {
        let mut image = ImageStore::new(101, 2);
        image.push_code(MachineWord { word: 960, are: Are::Absolute });
        image.push_data(MachineWord { word: 1, are: Are::Absolute });
        image.push_data(MachineWord { word: 1023, are: Are::Absolute });
        let text = render(|out| image.write_object(out));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[1], "bcba ddaaa");
        assert_eq!(lines[2], "bcbb aaaab");
        assert_eq!(lines[3], "bcbc ddddd");
    }

    #[test]
    fn empty_segments_still_write_a_header() {
        let image = ImageStore::new(100, 0);
        let text = render(|out| image.write_object(out));
        assert_eq!(text, "a a\n");
    }

    #[test]
    fn entries_list_defined_entry_symbols_in_order() {
        let mut symbols = SymbolTable::new();
        let _ = symbols.define("LOOP", 101, SymbolKind::Code);
        let _ = symbols.declare_entry("LOOP");
        let _ = symbols.define("N", 107, SymbolKind::Data);
        let _ = symbols.declare_entry("N");
        let _ = symbols.declare_entry("GHOST");
        assert!(has_defined_entries(&symbols));
        let text = render(|out| write_entries(&symbols, out));
        assert_eq!(text, "LOOP bcbb\nN bccd\n");
    }

    #[test]
    fn externals_keep_encounter_order() {
        let refs = vec![
            ExternalRef { name: "X".to_string(), address: 101 },
            ExternalRef { name: "Y".to_string(), address: 104 },
            ExternalRef { name: "X".to_string(), address: 106 },
        ];
        let text = render(|out| write_externals(&refs, out));
        assert_eq!(text, "X bcbb\nY bcca\nX bccc\n");
    }
}
