// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// CLI entrypoint for quadasm.

fn main() {
    match quadasm::assembler::run() {
        Ok(reports) => {
            let mut failed = 0usize;
            for report in &reports {
                for diag in report.diagnostics() {
                    eprintln!("{}", diag.format_with_context(Some(report.source_lines())));
                }
                if report.succeeded() {
                    println!("Assembled '{}'", report.source_name());
                } else {
                    failed += 1;
                    println!("Failed '{}'", report.source_name());
                }
            }
            println!(
                "{} file(s) processed, {} succeeded, {} failed",
                reports.len(),
                reports.len() - failed,
                failed
            );
            if failed > 0 {
                std::process::exit(1);
            }
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    }
}
