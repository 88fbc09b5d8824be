// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! The assembler: macro expansion, first pass, second pass, outputs.
//!
//! Every input file is processed independently: expand macros and write
//! the `.am` stream, size and collect symbols in pass one, encode in
//! pass two, then emit `.ob` plus the optional `.ent`/`.ext` files. Any
//! error abandons the file's outputs but never the run.

pub mod cli;
pub mod encode;

use std::fs;
use std::path::Path;

use clap::Parser;

use crate::core::error::{
    AsmError, AsmErrorKind, AsmRunError, AsmRunReport, Diagnostic, PassCounts, Severity,
};
use crate::core::imagestore::{self, ExternalRef, ImageStore, INITIAL_IC};
use crate::core::lexical::{
    self, DIRECTIVE_DATA, DIRECTIVE_ENTRY, DIRECTIVE_EXTERN, DIRECTIVE_MAT, DIRECTIVE_STRING,
};
use crate::core::macro_processor::MacroProcessor;
use crate::core::parser::{parse_line, ParsedLine};
use crate::core::symbol_table::{SymbolKind, SymbolTable, SymbolTableResult};

use cli::Cli;

pub use cli::VERSION;

/// Rendered output files of one successful assembly.
pub struct AsmOutputs {
    pub object: String,
    pub entries: Option<String>,
    pub externals: Option<String>,
}

/// Result of assembling one source text.
pub struct SourceResult {
    pub diagnostics: Vec<Diagnostic>,
    /// The macro-expanded stream; empty when expansion itself failed.
    pub expanded: Vec<String>,
    /// `None` when any error was recorded.
    pub outputs: Option<AsmOutputs>,
}

/// Run the assembler over the command-line inputs. Every file gets a
/// report; one file's failure does not stop the next.
pub fn run() -> Result<Vec<AsmRunReport>, AsmRunError> {
    let cli = Cli::parse();
    cli::validate_cli(&cli)?;

    let mut reports = Vec::new();
    for path in &cli.infiles {
        reports.push(run_one(path));
    }
    Ok(reports)
}

/// Assemble one file from disk, writing `.am` and the output files next
/// to it.
pub fn run_one(path: &Path) -> AsmRunReport {
    let source_name = path.to_string_lossy().to_string();

    let base = match cli::input_base_from_path(path) {
        Ok(base) => base,
        Err(err) => return failure_report(source_name, err),
    };

    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(_) => {
            return failure_report(
                source_name.clone(),
                AsmError::new(AsmErrorKind::Io, "Cannot open input file", Some(&source_name)),
            )
        }
    };

    let mut result = assemble_source(&source);

    let expansion_failed = result
        .diagnostics
        .iter()
        .any(|diag| diag.error().kind() == AsmErrorKind::Macro);
    if !expansion_failed {
        let am_path = format!("{base}.am");
        if let Err(err) = write_lines(&am_path, &result.expanded) {
            result.diagnostics.push(Diagnostic::new(0, Severity::Error, err));
            result.outputs = None;
        }
    }

    if let Some(outputs) = &result.outputs {
        if let Err(err) = write_outputs(&base, outputs) {
            result.diagnostics.push(Diagnostic::new(0, Severity::Error, err));
        }
    }

    let context_lines = if expansion_failed {
        source.lines().map(str::to_string).collect()
    } else {
        result.expanded
    };
    let diagnostics = result
        .diagnostics
        .into_iter()
        .map(|diag| diag.with_file(Some(source_name.clone())))
        .collect();
    AsmRunReport::new(source_name, diagnostics, context_lines)
}

fn failure_report(source_name: String, err: AsmError) -> AsmRunReport {
    let diag = Diagnostic::new(0, Severity::Error, err).with_file(Some(source_name.clone()));
    AsmRunReport::new(source_name, vec![diag], Vec::new())
}

fn write_lines(path: &str, lines: &[String]) -> Result<(), AsmError> {
    let mut text = lines.join("\n");
    text.push('\n');
    fs::write(path, text)
        .map_err(|_| AsmError::new(AsmErrorKind::Io, "Cannot create output file", Some(path)))
}

fn write_outputs(base: &str, outputs: &AsmOutputs) -> Result<(), AsmError> {
    let write = |path: String, text: &str| {
        fs::write(&path, text).map_err(|_| {
            AsmError::new(AsmErrorKind::Io, "Cannot create output file", Some(&path))
        })
    };
    write(format!("{base}.ob"), &outputs.object)?;
    if let Some(entries) = &outputs.entries {
        write(format!("{base}.ent"), entries)?;
    }
    if let Some(externals) = &outputs.externals {
        write(format!("{base}.ext"), externals)?;
    }
    Ok(())
}

/// Assemble a source text completely in memory: macro expansion, both
/// passes, and output rendering.
pub fn assemble_source(source: &str) -> SourceResult {
    let raw: Vec<String> = source.lines().map(str::to_string).collect();

    let mut macro_processor = MacroProcessor::new();
    let expanded = match macro_processor.expand(&raw) {
        Ok(expanded) => expanded,
        Err(err) => {
            let diag = Diagnostic::new(
                err.line().unwrap_or(raw.len() as u32),
                Severity::Error,
                AsmError::new(AsmErrorKind::Macro, err.message(), None),
            );
            return SourceResult {
                diagnostics: vec![diag],
                expanded: Vec::new(),
                outputs: None,
            };
        }
    };

    let mut assembler = Assembler::new();
    let pass1 = assembler.pass1(&expanded);
    if pass1.errors > 0 {
        return SourceResult {
            diagnostics: assembler.take_diagnostics(),
            expanded,
            outputs: None,
        };
    }

    let pass2 = assembler.pass2(&expanded);
    if pass2.errors > 0 {
        return SourceResult {
            diagnostics: assembler.take_diagnostics(),
            expanded,
            outputs: None,
        };
    }

    let outputs = assembler.render_outputs();
    SourceResult {
        diagnostics: assembler.take_diagnostics(),
        expanded,
        outputs: Some(outputs),
    }
}

/// Per-file assembler state.
struct Assembler {
    symbols: SymbolTable,
    image: ImageStore,
    ext_refs: Vec<ExternalRef>,
    diagnostics: Vec<Diagnostic>,
    ic_final: u16,
    dc_final: u16,
}

impl Assembler {
    fn new() -> Self {
        Self {
            symbols: SymbolTable::new(),
            image: ImageStore::new(INITIAL_IC, 0),
            ext_refs: Vec::new(),
            diagnostics: Vec::new(),
            ic_final: INITIAL_IC,
            dc_final: 0,
        }
    }

    fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    fn error(&mut self, line_num: u32, column: Option<usize>, err: AsmError) {
        self.diagnostics
            .push(Diagnostic::new(line_num, Severity::Error, err).with_column(column));
    }

    /// First pass: build the symbol table and compute the layout.
    /// Malformed lines record diagnostics and skip their effect; the
    /// pass always walks the whole stream.
    fn pass1(&mut self, lines: &[String]) -> PassCounts {
        let mut ic: u16 = INITIAL_IC;
        let mut dc: u16 = 0;
        let mut counts = PassCounts::new();

        for (idx, line) in lines.iter().enumerate() {
            let line_num = idx as u32 + 1;
            counts.lines += 1;
            match parse_line(line, line_num) {
                Err(err) => {
                    let column = err.column;
                    self.error(line_num, column, AsmError::new(err.kind, &err.message, None));
                    counts.errors += 1;
                }
                Ok(None) => {}
                Ok(Some(parsed)) => {
                    if let Err(err) = self.size_line(&parsed, &mut ic, &mut dc) {
                        self.error(line_num, None, err);
                        counts.errors += 1;
                    }
                }
            }
        }

        if counts.errors == 0 {
            self.symbols.relocate_data(ic);
        }

        let end_line = lines.len() as u32 + 1;
        let undefined: Vec<String> = self
            .symbols
            .undefined_entries()
            .filter(|entry| entry.kind != SymbolKind::External)
            .map(|entry| entry.name.clone())
            .collect();
        for name in undefined {
            self.error(
                end_line,
                None,
                AsmError::new(AsmErrorKind::Naming, "Entry label never defined", Some(&name)),
            );
            counts.errors += 1;
        }

        self.ic_final = ic;
        self.dc_final = dc;
        counts
    }

    /// Apply one parsed line's layout effect: define its label and
    /// advance IC or DC.
    fn size_line(&mut self, parsed: &ParsedLine, ic: &mut u16, dc: &mut u16) -> Result<(), AsmError> {
        match parsed.command.as_deref() {
            None => Err(AsmError::new(
                AsmErrorKind::Structural,
                "Label without a command",
                None,
            )),
            Some(DIRECTIVE_DATA) => {
                for operand in &parsed.operands {
                    if !lexical::is_signed_number(operand) {
                        return Err(AsmError::new(
                            AsmErrorKind::Lexical,
                            "Invalid numeric operand",
                            Some(operand),
                        ));
                    }
                }
                self.define_label(parsed, *dc, SymbolKind::Data)?;
                *dc = dc.saturating_add(parsed.operand_count() as u16);
                Ok(())
            }
            Some(DIRECTIVE_STRING) => {
                let operand = match parsed.operands.as_slice() {
                    [operand] if lexical::is_valid_string_operand(operand) => operand,
                    _ => {
                        return Err(AsmError::new(
                            AsmErrorKind::Structural,
                            "'.string' expects one quoted operand",
                            None,
                        ))
                    }
                };
                let content_len = (operand.len() - 2) as u16;
                self.define_label(parsed, *dc, SymbolKind::Data)?;
                *dc = dc.saturating_add(content_len + 1);
                Ok(())
            }
            Some(DIRECTIVE_MAT) => {
                let Some(dims) = parsed.operands.first() else {
                    return Err(AsmError::new(
                        AsmErrorKind::Structural,
                        "'.mat' requires a dimension specification",
                        None,
                    ));
                };
                let Some((rows, cols)) = lexical::parse_matrix_dimensions(dims) else {
                    return Err(AsmError::new(
                        AsmErrorKind::Structural,
                        "Invalid matrix dimensions",
                        Some(dims),
                    ));
                };
                for operand in &parsed.operands[1..] {
                    if !lexical::is_signed_number(operand) {
                        return Err(AsmError::new(
                            AsmErrorKind::Lexical,
                            "Invalid numeric operand",
                            Some(operand),
                        ));
                    }
                }
                let total = rows * cols;
                let provided = parsed.operand_count() - 1;
                if provided != 0 && provided != total {
                    return Err(AsmError::new(
                        AsmErrorKind::Structural,
                        &format!("Matrix expects 0 or {total} values, got {provided}"),
                        None,
                    ));
                }
                self.define_label(parsed, *dc, SymbolKind::Data)?;
                *dc = dc.saturating_add(total as u16);
                Ok(())
            }
            Some(DIRECTIVE_EXTERN) => {
                // A label on the line is ignored.
                for operand in &parsed.operands {
                    if !lexical::is_valid_label(operand) {
                        return Err(AsmError::new(
                            AsmErrorKind::Lexical,
                            "Invalid label",
                            Some(operand),
                        ));
                    }
                    if self.symbols.declare_extern(operand) == SymbolTableResult::Duplicate {
                        return Err(AsmError::new(
                            AsmErrorKind::Naming,
                            "Defined label redeclared '.extern'",
                            Some(operand),
                        ));
                    }
                }
                Ok(())
            }
            Some(DIRECTIVE_ENTRY) => {
                for operand in &parsed.operands {
                    if !lexical::is_valid_label(operand) {
                        return Err(AsmError::new(
                            AsmErrorKind::Lexical,
                            "Invalid label",
                            Some(operand),
                        ));
                    }
                    let _ = self.symbols.declare_entry(operand);
                }
                Ok(())
            }
            Some(_) => {
                let analysis = encode::analyze_instruction(parsed)?;
                self.define_label(parsed, *ic, SymbolKind::Code)?;
                *ic = ic.saturating_add(analysis.length);
                Ok(())
            }
        }
    }

    fn define_label(
        &mut self,
        parsed: &ParsedLine,
        address: u16,
        kind: SymbolKind,
    ) -> Result<(), AsmError> {
        let Some(label) = parsed.label.as_deref() else {
            return Ok(());
        };
        match self.symbols.define(label, address, kind) {
            SymbolTableResult::Ok => Ok(()),
            SymbolTableResult::ExternalConflict => Err(AsmError::new(
                AsmErrorKind::Naming,
                "Label declared '.extern' cannot be defined",
                Some(label),
            )),
            _ => Err(AsmError::new(
                AsmErrorKind::Naming,
                "Label already defined",
                Some(label),
            )),
        }
    }

    /// Second pass: encode instructions, then data, into the image.
    /// Reference errors abort immediately; the file produces no output
    /// either way.
    fn pass2(&mut self, lines: &[String]) -> PassCounts {
        self.image = ImageStore::new(self.ic_final, self.dc_final);
        self.ext_refs.clear();
        let mut counts = PassCounts::new();
        let mut current_ic: u16 = INITIAL_IC;

        // Instruction phase. Lines that fail to parse were already
        // reported in pass one.
        for (idx, line) in lines.iter().enumerate() {
            let line_num = idx as u32 + 1;
            counts.lines += 1;
            let Ok(Some(parsed)) = parse_line(line, line_num) else {
                continue;
            };
            if parsed.command.is_none() || parsed.is_directive() {
                continue;
            }
            match encode::encode_instruction(&parsed, &self.symbols, current_ic, &mut self.ext_refs)
            {
                Ok(words) => {
                    current_ic += words.len() as u16;
                    for word in words {
                        self.image.push_code(word);
                    }
                }
                Err(err) => {
                    let aborts = err.aborts_pass();
                    self.error(line_num, None, err);
                    counts.errors += 1;
                    if aborts {
                        return counts;
                    }
                }
            }
        }

        // Data phase, in source order.
        for (idx, line) in lines.iter().enumerate() {
            let line_num = idx as u32 + 1;
            let Ok(Some(parsed)) = parse_line(line, line_num) else {
                continue;
            };
            match parsed.command.as_deref() {
                Some(DIRECTIVE_DATA) | Some(DIRECTIVE_STRING) | Some(DIRECTIVE_MAT) => {
                    for word in encode::encode_data_line(&parsed) {
                        self.image.push_data(word);
                    }
                }
                _ => {}
            }
        }

        counts
    }

    /// Render the three output files from the finished image.
    fn render_outputs(&mut self) -> AsmOutputs {
        let mut object = Vec::new();
        self.image
            .write_object(&mut object)
            .expect("writing to a Vec cannot fail");
        let object = String::from_utf8(object).expect("object output is ascii");

        let entries = imagestore::has_defined_entries(&self.symbols).then(|| {
            let mut out = Vec::new();
            imagestore::write_entries(&self.symbols, &mut out)
                .expect("writing to a Vec cannot fail");
            String::from_utf8(out).expect("entries output is ascii")
        });

        let externals = (!self.ext_refs.is_empty()).then(|| {
            let mut out = Vec::new();
            imagestore::write_externals(&self.ext_refs, &mut out)
                .expect("writing to a Vec cannot fail");
            String::from_utf8(out).expect("externals output is ascii")
        });

        AsmOutputs {
            object,
            entries,
            externals,
        }
    }
}
