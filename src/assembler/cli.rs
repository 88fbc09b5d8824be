// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Command-line interface parsing and argument validation.

use std::path::{Path, PathBuf};

use clap::Parser;

use crate::core::error::{AsmError, AsmErrorKind, AsmRunError};

pub const VERSION: &str = "1.0";

const LONG_ABOUT: &str = "Assembler for a 10-bit word machine with base-4 letter object output.

Each input must end with .as. For every source the assembler writes the
macro-expanded .am stream and, when the file assembles cleanly, the .ob
object image plus .ent/.ext symbol files when they have content. Output
files are created next to their input.";

#[derive(Parser, Debug)]
#[command(
    name = "quadasm",
    version = VERSION,
    about = "Two-pass assembler with mcro/mcroend macro expansion",
    long_about = LONG_ABOUT
)]
pub struct Cli {
    #[arg(
        value_name = "FILE",
        required = true,
        help = "Assembly source files (must end with .as)"
    )]
    pub infiles: Vec<PathBuf>,
}

/// Validate run-level arguments. Per-file problems (bad suffix, missing
/// file) are reported per file instead.
pub fn validate_cli(cli: &Cli) -> Result<(), AsmRunError> {
    if cli.infiles.is_empty() {
        return Err(AsmRunError::new(AsmError::new(
            AsmErrorKind::Cli,
            "No input files specified",
            None,
        )));
    }
    Ok(())
}

/// Check the `.as` suffix and return the path with the suffix removed,
/// which is the base every output file name is built from.
pub fn input_base_from_path(path: &Path) -> Result<String, AsmError> {
    let name = path.to_string_lossy();
    match name.strip_suffix(".as") {
        Some(base) if !base.is_empty() && !base.ends_with(std::path::MAIN_SEPARATOR) => {
            Ok(base.to_string())
        }
        _ => Err(AsmError::new(
            AsmErrorKind::Cli,
            "Input file must end with .as",
            Some(&name),
        )),
    }
}
