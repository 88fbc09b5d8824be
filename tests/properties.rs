//! Property-based tests using proptest.
//!
//! These cover the assembler's structural laws across generated inputs,
//! complementing the targeted unit and end-to-end tests.

use proptest::prelude::*;

use quadasm::assembler::assemble_source;
use quadasm::base4::{address_letters, code_letters, strip_leading};
use quadasm::macro_processor::MacroProcessor;

// ── Base-4 letters ──────────────────────────────────────────────────────

/// Test-only decoder for the letter encoding.
fn decode_letters(text: &str) -> u32 {
    text.bytes().fold(0, |acc, c| {
        assert!((b'a'..=b'd').contains(&c), "bad digit {c}");
        acc * 4 + u32::from(c - b'a')
    })
}

proptest! {
    #[test]
    fn code_letters_round_trip(word in 0u16..1024) {
        let encoded = code_letters(word);
        prop_assert_eq!(encoded.len(), 5);
        prop_assert_eq!(decode_letters(&encoded), u32::from(word));
    }

    #[test]
    fn address_letters_round_trip(addr in 0u16..256) {
        // Four letters cover the machine's 256-cell address space.
        let encoded = address_letters(addr);
        prop_assert_eq!(encoded.len(), 4);
        prop_assert_eq!(decode_letters(&encoded), u32::from(addr));
    }

    #[test]
    fn stripping_preserves_the_value(value in 0u16..256) {
        let full = address_letters(value);
        let stripped = strip_leading(&full);
        prop_assert!(!stripped.is_empty());
        prop_assert_eq!(decode_letters(stripped), u32::from(value));
    }
}

// ── Macro expansion ─────────────────────────────────────────────────────

fn arb_macro_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9]{2,8}".prop_filter("reserved", |name| {
        quadasm::lexical::is_valid_macro_name(name)
    })
}

fn arb_body_line() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec![
        "inc r1",
        "dec r2",
        "prn #7",
        "\tmov r3, r4",
        "; body comment",
        "rts",
    ])
}

prop_compose! {
    fn arb_macro_source()(
        name in arb_macro_name(),
        body in prop::collection::vec(arb_body_line(), 1..5),
        calls in 1usize..4,
    ) -> Vec<String> {
        let mut lines = vec![format!("mcro {name}")];
        lines.extend(body.iter().map(|l| l.to_string()));
        lines.push("mcroend".to_string());
        for _ in 0..calls {
            lines.push(name.clone());
        }
        lines.push("stop".to_string());
        lines
    }
}

proptest! {
    #[test]
    fn expansion_is_idempotent(source in arb_macro_source()) {
        let once = MacroProcessor::new().expand(&source).expect("first expansion");
        let twice = MacroProcessor::new().expand(&once).expect("second expansion");
        prop_assert_eq!(&once, &twice);
        // No definition bracketing survives expansion.
        prop_assert!(once.iter().all(|line| {
            let head = line.trim();
            !head.starts_with("mcro ") && head != "mcroend"
        }), "no macro definition bracketing should survive expansion");
    }
}

// ── Object shape ────────────────────────────────────────────────────────

fn arb_code_line() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec![
        "mov r1, r2",
        "mov #3, DAT",
        "cmp DAT, #-2",
        "add r7, DAT",
        "sub DAT, r0",
        "lea DAT, r6",
        "not r5",
        "clr DAT",
        "inc MTX[r1][r2]",
        "dec r4",
        "jmp FIN",
        "bne FIN",
        "red r2",
        "prn #-128",
        "jsr FIN",
        "rts",
        "mov MTX[r3][r4], r1",
    ])
}

prop_compose! {
    fn arb_program()(
        code in prop::collection::vec(arb_code_line(), 0..12),
        data in prop::collection::vec(-1024i32..1024, 1..6),
    ) -> String {
        let data_text = data
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        let mut lines: Vec<String> = code.iter().map(|l| l.to_string()).collect();
        lines.push("FIN: stop".to_string());
        lines.push(format!("DAT: .data {data_text}"));
        lines.push("MTX: .mat [2][2]".to_string());
        lines.push(String::new());
        lines.join("\n")
    }
}

proptest! {
    #[test]
    fn object_body_matches_header_counts(program in arb_program()) {
        let result = assemble_source(&program);
        prop_assert!(result.diagnostics.is_empty());
        let outputs = result.outputs.expect("outputs");
        let mut lines = outputs.object.lines();

        let header = lines.next().expect("header");
        let mut parts = header.split_whitespace();
        let code_count = decode_letters(parts.next().expect("code count"));
        let data_count = decode_letters(parts.next().expect("data count"));

        let body: Vec<&str> = lines.collect();
        prop_assert_eq!(body.len() as u32, code_count + data_count);
        prop_assert!(code_count >= 1); // FIN: stop is always present
        prop_assert!(data_count >= 5); // .data values plus the 2x2 matrix

        // Addresses are consecutive from 100 and every code word is five
        // letters.
        for (idx, line) in body.iter().enumerate() {
            let mut parts = line.split_whitespace();
            let address = decode_letters(parts.next().expect("address"));
            let word = parts.next().expect("word");
            prop_assert_eq!(address, 100 + idx as u32);
            prop_assert_eq!(word.len(), 5);
        }
    }
}
