// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Macro preprocessor implementing `mcro`/`mcroend` expansion.
//!
//! Two passes over the raw source: the first collects definitions, the
//! second emits the expanded stream with definition lines stripped and
//! call lines replaced by their bodies. Bodies are inserted verbatim and
//! never re-scanned; nested and parameterised macros are unsupported.

use std::collections::HashMap;

use crate::core::lexical::{self, MAX_NAME_LENGTH};
use crate::core::text_utils::first_token;

/// Upper bound on the stored bytes of one macro body. Lines past the cap
/// are dropped.
pub const MAX_MACRO_BODY: usize = 1000;

const MCRO_KEYWORD: &str = "mcro";
const MCROEND_KEYWORD: &str = "mcroend";

#[derive(Debug, Clone)]
pub struct MacroError {
    message: String,
    line: Option<u32>,
}

impl MacroError {
    fn new(message: impl Into<String>, line: Option<u32>) -> Self {
        Self {
            message: message.into(),
            line,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn line(&self) -> Option<u32> {
        self.line
    }
}

#[derive(Debug, Clone, Default)]
struct MacroDef {
    body: Vec<String>,
    bytes: usize,
}

#[derive(Debug, Default)]
pub struct MacroProcessor {
    macros: HashMap<String, MacroDef>,
}

impl MacroProcessor {
    pub fn new() -> Self {
        Self {
            macros: HashMap::new(),
        }
    }

    /// Number of collected definitions.
    pub fn macro_count(&self) -> usize {
        self.macros.len()
    }

    /// Expand a whole source. Returns the expanded stream or the first
    /// definition error.
    pub fn expand(&mut self, lines: &[String]) -> Result<Vec<String>, MacroError> {
        self.collect_definitions(lines)?;
        Ok(self.emit_expanded(lines))
    }

    fn collect_definitions(&mut self, lines: &[String]) -> Result<(), MacroError> {
        let mut current: Option<(String, MacroDef)> = None;

        for (idx, line) in lines.iter().enumerate() {
            let line_num = idx as u32 + 1;

            if let Some(name) = macro_start_name(line) {
                self.validate_name(name, line_num)?;
                if current.is_some() {
                    return Err(MacroError::new(
                        "Macro definition inside macro definition",
                        Some(line_num),
                    ));
                }
                current = Some((name.to_string(), MacroDef::default()));
                continue;
            }

            if is_macro_end(line) {
                if let Some((name, def)) = current.take() {
                    self.macros.insert(name, def);
                }
                // A stray mcroend outside a definition flows through to
                // the assembler and fails there as an unknown command.
                continue;
            }

            if let Some((_, def)) = current.as_mut() {
                let cost = line.len() + 1;
                if def.bytes + cost <= MAX_MACRO_BODY {
                    def.body.push(line.clone());
                    def.bytes += cost;
                }
            }
        }

        if let Some((name, _)) = current {
            return Err(MacroError::new(
                format!("Missing mcroend for macro '{name}'"),
                None,
            ));
        }
        Ok(())
    }

    fn emit_expanded(&self, lines: &[String]) -> Vec<String> {
        let mut out = Vec::new();
        let mut in_definition = false;

        for line in lines {
            if macro_start_name(line).is_some() {
                in_definition = true;
                continue;
            }
            if is_macro_end(line) {
                in_definition = false;
                continue;
            }
            if in_definition {
                continue;
            }
            if let Some(def) = self.macros.get(first_token(line)) {
                out.extend(def.body.iter().cloned());
                continue;
            }
            out.push(line.clone());
        }
        out
    }

    fn validate_name(&self, name: &str, line_num: u32) -> Result<(), MacroError> {
        if name.is_empty() {
            return Err(MacroError::new("Missing macro name", Some(line_num)));
        }
        if name.len() > MAX_NAME_LENGTH {
            return Err(MacroError::new(
                format!("Macro name exceeds {MAX_NAME_LENGTH} characters: {name}"),
                Some(line_num),
            ));
        }
        if !lexical::is_valid_macro_name(name) {
            return Err(MacroError::new(
                format!("Invalid macro name '{name}'"),
                Some(line_num),
            ));
        }
        if self.macros.contains_key(name) {
            return Err(MacroError::new(
                format!("Macro '{name}' already defined"),
                Some(line_num),
            ));
        }
        Ok(())
    }
}

/// The macro name when `line` opens a definition: the keyword as first
/// token, followed by exactly one space before the name.
fn macro_start_name(line: &str) -> Option<&str> {
    let trimmed = line.trim_start_matches([' ', '\t']);
    let rest = trimmed.strip_prefix(MCRO_KEYWORD)?;
    if !rest.starts_with(' ') {
        return None;
    }
    // Text after the name is ignored.
    Some(first_token(rest))
}

fn is_macro_end(line: &str) -> bool {
    line.trim() == MCROEND_KEYWORD
}
