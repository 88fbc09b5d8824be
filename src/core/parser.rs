// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Physical-line parser.
//!
//! Splits one source line into an optional label, a command token, and
//! raw operand strings. Operand meaning (modes, values) is resolved by
//! later stages; the parser only enforces line shape.

use crate::core::error::AsmErrorKind;
use crate::core::instructions;
use crate::core::lexical::{self, MAX_LINE_LENGTH};
use crate::core::text_utils::{is_space, Cursor};

/// One parsed source line. Blank and comment lines never produce one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine {
    pub label: Option<String>,
    pub command: Option<String>,
    pub operands: Vec<String>,
}

impl ParsedLine {
    pub fn operand_count(&self) -> usize {
        self.operands.len()
    }

    /// True when the command is one of the five dot-directives.
    pub fn is_directive(&self) -> bool {
        self.command
            .as_deref()
            .is_some_and(|cmd| cmd.starts_with('.'))
    }
}

/// Parser failure with location within the line.
#[derive(Debug, Clone)]
pub struct ParseError {
    pub kind: AsmErrorKind,
    pub message: String,
    pub line: u32,
    pub column: Option<usize>,
}

impl ParseError {
    fn new(
        kind: AsmErrorKind,
        message: impl Into<String>,
        line: u32,
        column: Option<usize>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            line,
            column,
        }
    }
}

/// Parse one physical line. `Ok(None)` for blank and comment lines.
pub fn parse_line(line: &str, line_num: u32) -> Result<Option<ParsedLine>, ParseError> {
    let line = line.strip_suffix('\r').unwrap_or(line);

    if line.len() > MAX_LINE_LENGTH {
        return Err(ParseError::new(
            AsmErrorKind::Lexical,
            format!("Line exceeds maximum length of {MAX_LINE_LENGTH} characters"),
            line_num,
            None,
        ));
    }
    if let Some(pos) = line
        .bytes()
        .position(|c| (c < 0x20 && c != b'\t') || c == 0x7f)
    {
        return Err(ParseError::new(
            AsmErrorKind::Lexical,
            "Line contains non-printable characters",
            line_num,
            Some(pos + 1),
        ));
    }

    let indent = line.len() - line.trim_start_matches([' ', '\t']).len();
    let trimmed = &line[indent..];
    match trimmed.bytes().next() {
        None | Some(b';') => return Ok(None),
        _ => {}
    }

    // A label is present when a ':' occurs before any whitespace.
    let token_end = trimmed
        .find(|c: char| c == ' ' || c == '\t' || c == ':')
        .unwrap_or(trimmed.len());
    let (label, base) = if trimmed[token_end..].starts_with(':') {
        let name = &trimmed[..token_end];
        if !lexical::is_valid_label(name) {
            let reserved = instructions::is_opcode(name) || lexical::register_number(name).is_some();
            let kind = if reserved {
                AsmErrorKind::Naming
            } else {
                AsmErrorKind::Lexical
            };
            return Err(ParseError::new(
                kind,
                format!("Invalid label '{name}'"),
                line_num,
                Some(indent + 1),
            ));
        }
        (Some(name.to_string()), indent + token_end + 1)
    } else {
        (None, indent)
    };

    let mut cursor = Cursor::new(&line[base..]);
    cursor.skip_ws();
    if cursor.at_end() {
        return Ok(Some(ParsedLine {
            label,
            command: None,
            operands: Vec::new(),
        }));
    }

    let command_col = base + cursor.pos() + 1;
    let command = cursor.take_token();
    if !instructions::is_opcode(&command) && !lexical::is_directive(&command) {
        return Err(ParseError::new(
            AsmErrorKind::Structural,
            format!("Unknown opcode or directive '{command}'"),
            line_num,
            Some(command_col),
        ));
    }

    let operands = take_operands(&mut cursor, base, line_num)?;

    Ok(Some(ParsedLine {
        label,
        command: Some(command),
        operands,
    }))
}

fn take_operands(
    cursor: &mut Cursor<'_>,
    base: usize,
    line_num: u32,
) -> Result<Vec<String>, ParseError> {
    let mut operands = Vec::new();
    loop {
        cursor.skip_ws();
        if cursor.at_end() {
            break;
        }

        let start = cursor.pos();
        let operand = if cursor.peek() == Some(b'"') {
            cursor.next();
            let mut text = String::from("\"");
            text.push_str(&cursor.take_while(|c| c != b'"'));
            if cursor.peek() == Some(b'"') {
                cursor.next();
                text.push('"');
            }
            text
        } else {
            cursor.take_while(|c| !is_space(c) && c != b',')
        };

        if operand.is_empty() {
            return Err(ParseError::new(
                AsmErrorKind::Lexical,
                "Expected operand before ','",
                line_num,
                Some(base + start + 1),
            ));
        }
        operands.push(operand);

        cursor.skip_ws();
        if cursor.peek() == Some(b',') {
            let comma_col = base + cursor.pos() + 1;
            cursor.next();
            cursor.skip_ws();
            match cursor.peek() {
                None => {
                    return Err(ParseError::new(
                        AsmErrorKind::Lexical,
                        "Trailing comma at end of line",
                        line_num,
                        Some(comma_col),
                    ))
                }
                Some(b',') => {
                    return Err(ParseError::new(
                        AsmErrorKind::Lexical,
                        "Consecutive commas in operand list",
                        line_num,
                        Some(base + cursor.pos() + 1),
                    ))
                }
                _ => {}
            }
        }
    }
    Ok(operands)
}
