// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Shared text utilities for line scanning.

/// Check if a byte is inline whitespace (space or tab).
#[inline]
pub fn is_space(c: u8) -> bool {
    c == b' ' || c == b'\t'
}

/// Check if a byte ends a physical line (newline or carriage return).
#[inline]
pub fn is_line_end(c: u8) -> bool {
    c == b'\n' || c == b'\r'
}

/// Check if a byte may start a label or macro name.
#[inline]
pub fn is_name_start(c: u8) -> bool {
    c.is_ascii_alphabetic()
}

/// Check if a byte may continue a label (letters and digits only).
#[inline]
pub fn is_label_char(c: u8) -> bool {
    c.is_ascii_alphanumeric()
}

/// A simple cursor for scanning text byte-by-byte.
pub struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    /// Create a new cursor at the start of the input.
    pub fn new(input: &'a str) -> Self {
        Self {
            bytes: input.as_bytes(),
            pos: 0,
        }
    }

    /// Get the current position.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Skip spaces and tabs.
    pub fn skip_ws(&mut self) {
        while self.peek().is_some_and(is_space) {
            self.pos += 1;
        }
    }

    /// Peek at the current byte without advancing.
    pub fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    /// Consume and return the current byte.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    /// True once every byte has been consumed.
    pub fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    /// Consume bytes while `pred` holds and return them as a string.
    pub fn take_while<F: Fn(u8) -> bool>(&mut self, pred: F) -> String {
        let start = self.pos;
        while self.peek().is_some_and(&pred) {
            self.pos += 1;
        }
        String::from_utf8_lossy(&self.bytes[start..self.pos]).to_string()
    }

    /// Consume a whitespace-delimited token, empty at end of input.
    pub fn take_token(&mut self) -> String {
        self.take_while(|c| !is_space(c) && !is_line_end(c))
    }
}

/// First whitespace-delimited token of a line, with leading blanks skipped.
pub fn first_token(line: &str) -> &str {
    let trimmed = line.trim_start_matches([' ', '\t']);
    let end = trimmed
        .find(|c: char| c == ' ' || c == '\t' || c == '\n' || c == '\r')
        .unwrap_or(trimmed.len());
    &trimmed[..end]
}
