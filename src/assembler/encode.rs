// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Instruction analysis and machine-word encoding.
//!
//! `analyze_instruction` is shared by both passes: the first pass uses it
//! to validate and size, the second to drive encoding. Word layout:
//! bits 9..6 opcode, 5..4 source mode, 3..2 destination mode, 1..0 ARE.

use crate::core::error::{AsmError, AsmErrorKind};
use crate::core::imagestore::{Are, ExternalRef, MachineWord};
use crate::core::instructions::{self, InstructionSpec};
use crate::core::lexical::{self, AddressingMode};
use crate::core::parser::ParsedLine;
use crate::core::symbol_table::{Resolution, SymbolTable};

const OPCODE_SHIFT: u16 = 6;
const SRC_MODE_SHIFT: u16 = 4;
const DST_MODE_SHIFT: u16 = 2;
const PAYLOAD_SHIFT: u16 = 2;
const PACKED_HIGH_SHIFT: u16 = 6;

/// Validated shape of one instruction line.
pub struct InstructionAnalysis {
    pub spec: &'static InstructionSpec,
    pub source_mode: Option<AddressingMode>,
    pub dest_mode: Option<AddressingMode>,
    pub length: u16,
}

/// Validate an instruction line against the catalogue and compute its
/// word length.
pub fn analyze_instruction(line: &ParsedLine) -> Result<InstructionAnalysis, AsmError> {
    let Some(command) = line.command.as_deref() else {
        return Err(AsmError::new(
            AsmErrorKind::Structural,
            "Label without a command",
            None,
        ));
    };
    let Some(spec) = instructions::lookup(command) else {
        return Err(AsmError::new(
            AsmErrorKind::Structural,
            "Unknown opcode",
            Some(command),
        ));
    };

    if line.operand_count() != spec.operand_count {
        return Err(AsmError::new(
            AsmErrorKind::Structural,
            &format!(
                "'{}' expects {} operand(s), got {}",
                spec.name,
                spec.operand_count,
                line.operand_count()
            ),
            None,
        ));
    }

    let mut source_mode = None;
    let mut dest_mode = None;

    if spec.operand_count >= 1 {
        let dest = &line.operands[spec.operand_count - 1];
        let mode = classify(dest)?;
        if mode.mask() & spec.dest_modes == 0 {
            return Err(AsmError::new(
                AsmErrorKind::Structural,
                "Illegal destination addressing mode for",
                Some(spec.name),
            ));
        }
        dest_mode = Some(mode);
    }
    if spec.operand_count == 2 {
        let source = &line.operands[0];
        let mode = classify(source)?;
        if mode.mask() & spec.source_modes == 0 {
            return Err(AsmError::new(
                AsmErrorKind::Structural,
                "Illegal source addressing mode for",
                Some(spec.name),
            ));
        }
        source_mode = Some(mode);
    }

    Ok(InstructionAnalysis {
        spec,
        source_mode,
        dest_mode,
        length: instruction_length(source_mode, dest_mode),
    })
}

fn classify(operand: &str) -> Result<AddressingMode, AsmError> {
    lexical::operand_mode(operand).ok_or_else(|| {
        AsmError::new(AsmErrorKind::Lexical, "Invalid operand", Some(operand))
    })
}

/// Word length of one instruction (§4.7 of the format):
/// matrix operands take two words, register pairs share one.
fn instruction_length(source: Option<AddressingMode>, dest: Option<AddressingMode>) -> u16 {
    match (source, dest) {
        (None, None) => 1,
        (None, Some(dst)) => 1 + operand_words(dst),
        (Some(AddressingMode::Register), Some(AddressingMode::Register)) => 2,
        (Some(src), Some(dst)) => 1 + operand_words(src) + operand_words(dst),
        (Some(_), None) => unreachable!("source without destination"),
    }
}

fn operand_words(mode: AddressingMode) -> u16 {
    if mode == AddressingMode::MatrixAccess {
        2
    } else {
        1
    }
}

/// Assemble the header word from its fields.
pub fn instruction_word(opcode: u16, src_ordinal: u16, dst_ordinal: u16, are: Are) -> u16 {
    (opcode & 0xf) << OPCODE_SHIFT
        | (src_ordinal & 0x3) << SRC_MODE_SHIFT
        | (dst_ordinal & 0x3) << DST_MODE_SHIFT
        | are.bits()
}

/// Encode one instruction line into machine words, appending any
/// external use sites to `ext_refs`.
pub fn encode_instruction(
    line: &ParsedLine,
    symbols: &SymbolTable,
    current_ic: u16,
    ext_refs: &mut Vec<ExternalRef>,
) -> Result<Vec<MachineWord>, AsmError> {
    let analysis = analyze_instruction(line)?;
    let spec = analysis.spec;

    let mut words = Vec::with_capacity(usize::from(analysis.length));
    words.push(MachineWord {
        word: instruction_word(
            spec.opcode.code(),
            analysis.source_mode.map_or(0, AddressingMode::ordinal),
            analysis.dest_mode.map_or(0, AddressingMode::ordinal),
            Are::Absolute,
        ),
        are: Are::Absolute,
    });

    match (analysis.source_mode, analysis.dest_mode) {
        (None, None) => {}
        (None, Some(dst)) => {
            encode_operand(
                &line.operands[0],
                dst,
                symbols,
                current_ic,
                &mut words,
                ext_refs,
            )?;
        }
        (Some(AddressingMode::Register), Some(AddressingMode::Register)) => {
            let src_reg = lexical::register_number(&line.operands[0]).unwrap_or(0);
            let dst_reg = lexical::register_number(&line.operands[1]).unwrap_or(0);
            words.push(MachineWord {
                word: src_reg << PACKED_HIGH_SHIFT | dst_reg << PAYLOAD_SHIFT,
                are: Are::Absolute,
            });
        }
        (Some(src), Some(dst)) => {
            encode_operand(
                &line.operands[0],
                src,
                symbols,
                current_ic,
                &mut words,
                ext_refs,
            )?;
            encode_operand(
                &line.operands[1],
                dst,
                symbols,
                current_ic,
                &mut words,
                ext_refs,
            )?;
        }
        (Some(_), None) => unreachable!("source without destination"),
    }

    debug_assert_eq!(words.len() as u16, analysis.length);
    Ok(words)
}

/// Encode one operand, pushing one word (two for matrix access).
fn encode_operand(
    operand: &str,
    mode: AddressingMode,
    symbols: &SymbolTable,
    current_ic: u16,
    words: &mut Vec<MachineWord>,
    ext_refs: &mut Vec<ExternalRef>,
) -> Result<(), AsmError> {
    match mode {
        AddressingMode::Immediate => {
            let value = lexical::parse_signed_wrapping(&operand[1..]);
            words.push(MachineWord {
                word: ((value & 0xff) as u16) << PAYLOAD_SHIFT | Are::Absolute.bits(),
                are: Are::Absolute,
            });
        }
        AddressingMode::Direct => {
            let word = resolve_label_word(operand, symbols, current_ic + words.len() as u16, ext_refs)?;
            words.push(word);
        }
        AddressingMode::Register => {
            let reg = lexical::register_number(operand).unwrap_or(0);
            words.push(MachineWord {
                word: reg << PAYLOAD_SHIFT | Are::Absolute.bits(),
                are: Are::Absolute,
            });
        }
        AddressingMode::MatrixAccess => {
            let access = lexical::parse_matrix_access(operand).ok_or_else(|| {
                AsmError::new(AsmErrorKind::Lexical, "Invalid operand", Some(operand))
            })?;
            let base = resolve_label_word(
                &access.label,
                symbols,
                current_ic + words.len() as u16,
                ext_refs,
            )?;
            words.push(base);
            words.push(MachineWord {
                word: access.row_reg << PACKED_HIGH_SHIFT | access.col_reg << PAYLOAD_SHIFT,
                are: Are::Absolute,
            });
        }
    }
    Ok(())
}

fn resolve_label_word(
    name: &str,
    symbols: &SymbolTable,
    address: u16,
    ext_refs: &mut Vec<ExternalRef>,
) -> Result<MachineWord, AsmError> {
    match symbols.resolve(name) {
        None => Err(AsmError::new(
            AsmErrorKind::Reference,
            "Undefined label",
            Some(name),
        )),
        Some(Resolution::External) => {
            ext_refs.push(ExternalRef {
                name: name.to_string(),
                address,
            });
            Ok(MachineWord {
                word: Are::External.bits(),
                are: Are::External,
            })
        }
        Some(Resolution::Relocatable(target)) => Ok(MachineWord {
            word: target << PAYLOAD_SHIFT | Are::Relocatable.bits(),
            are: Are::Relocatable,
        }),
    }
}

/// Encode the words of one data directive line. The line shape was
/// validated during the first pass.
pub fn encode_data_line(line: &ParsedLine) -> Vec<MachineWord> {
    let mut words = Vec::new();
    match line.command.as_deref() {
        Some(lexical::DIRECTIVE_DATA) => {
            for operand in &line.operands {
                push_data_value(&mut words, lexical::parse_signed_wrapping(operand));
            }
        }
        Some(lexical::DIRECTIVE_STRING) => {
            let content = line
                .operands
                .first()
                .map(|op| string_content(op))
                .unwrap_or_default();
            for byte in content.bytes() {
                words.push(MachineWord {
                    word: u16::from(byte),
                    are: Are::Absolute,
                });
            }
            words.push(MachineWord {
                word: 0,
                are: Are::Absolute,
            });
        }
        Some(lexical::DIRECTIVE_MAT) => {
            let (rows, cols) = line
                .operands
                .first()
                .and_then(|op| lexical::parse_matrix_dimensions(op))
                .unwrap_or((0, 0));
            for idx in 0..rows * cols {
                let value = line
                    .operands
                    .get(idx + 1)
                    .map(|op| lexical::parse_signed_wrapping(op))
                    .unwrap_or(0);
                push_data_value(&mut words, value);
            }
        }
        _ => {}
    }
    words
}

fn push_data_value(words: &mut Vec<MachineWord>, value: i32) {
    words.push(MachineWord {
        word: (value & 0x3ff) as u16,
        are: Are::Absolute,
    });
}

fn string_content(operand: &str) -> String {
    operand
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or("")
        .to_string()
}
