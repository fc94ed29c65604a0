//-
// Copyright (c) 2024, Jason Lingle
//
// This file is part of Memoryhole.
//
// Memoryhole is free software: you can redistribute it and/or modify it under
// the terms of the  GNU General Public License as published  by the Free
// Software Foundation, either version 3 of  the License, or (at your option)
// any later version.
//
// Memoryhole is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY;  without even the  implied warranty of  MERCHANTABILITY or
// FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General Public License for
// more details.
//
// You should have received a copy of the GNU General Public License along with
// Memoryhole. If not, see <http://www.gnu.org/licenses/>.

//! Tolerant scanning of MIME entities held in memory.
//!
//! Nothing here fails. Junk header lines are skipped, a missing close
//! delimiter ends the last part at the end of the body, and UNIX line endings
//! are accepted anywhere DOS ones are. Callers decide what the pieces mean.

use memchr::memchr;

use super::header;

/// Multipart bodies nested deeper than this are treated as opaque content.
pub(super) const MAX_RECURSION: u32 = 20;
/// Once this many parts have been found in a message, further multipart
/// bodies are treated as opaque content.
pub(super) const MAX_PARTS: u32 = 1000;

/// Iterates over the lines of a byte string, each with its line ending.
///
/// The final line may lack a line ending.
#[derive(Clone, Debug)]
pub(super) struct Lines<'a> {
    rest: &'a [u8],
}

impl<'a> Lines<'a> {
    pub(super) fn new(data: &'a [u8]) -> Self {
        Lines { rest: data }
    }
}

impl<'a> Iterator for Lines<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<&'a [u8]> {
        if self.rest.is_empty() {
            return None;
        }

        let end = memchr(b'\n', self.rest).map_or(self.rest.len(), |lf| lf + 1);
        let (line, rest) = self.rest.split_at(end);
        self.rest = rest;
        Some(line)
    }
}

fn is_blank(line: &[u8]) -> bool {
    b"\r\n" == line || b"\n" == line
}

fn is_continuation(line: &[u8]) -> bool {
    line.starts_with(b" ") || line.starts_with(b"\t")
}

/// A MIME entity split at the end of its header block.
#[derive(Clone, Debug, Default)]
pub(super) struct Entity<'a> {
    /// Each intelligible header as its name and raw value. The value still
    /// contains any folding and the final line ending.
    pub(super) headers: Vec<(&'a str, &'a [u8])>,
    /// Everything after the blank line terminating the headers. Empty if
    /// there is no such line.
    pub(super) body: &'a [u8],
    /// The boundary of the first valid `Content-Type` header, if it names a
    /// multipart type.
    pub(super) boundary: Option<String>,
    seen_content_type: bool,
}

impl<'a> Entity<'a> {
    fn push_field(&mut self, field: &'a [u8]) {
        let (name, value) = match header::split_header_line(field) {
            Some(split) => split,
            None => return,
        };

        self.headers.push((name, value));

        // Extra Content-Type headers are ignored
        if self.seen_content_type
            || !"Content-Type".eq_ignore_ascii_case(name)
        {
            return;
        }

        if let Some(ct) = header::parse_content_type(value) {
            self.seen_content_type = true;
            if ct.is_type("multipart") {
                self.boundary = ct
                    .parm("boundary")
                    .map(|b| String::from_utf8_lossy(b).into_owned());
            }
        }
    }
}

/// Splits `data` into headers and body.
pub(super) fn split_entity(data: &[u8]) -> Entity<'_> {
    let mut entity = Entity::default();
    let mut field_start: Option<usize> = None;
    let mut pos = 0;

    for line in Lines::new(data) {
        if is_blank(line) {
            if let Some(start) = field_start {
                entity.push_field(&data[start..pos]);
            }
            entity.body = &data[pos + line.len()..];
            return entity;
        }

        if !is_continuation(line) || field_start.is_none() {
            if let Some(start) = field_start {
                entity.push_field(&data[start..pos]);
            }
            field_start = Some(pos);
        }

        pos += line.len();
    }

    if let Some(start) = field_start {
        entity.push_field(&data[start..pos]);
    }
    entity
}

/// Splits a multipart body at `boundary` and returns the content of each
/// part, without the line ending that precedes the next delimiter.
///
/// A delimiter line may start the body or follow any line ending. The
/// preamble and epilogue are discarded. A body with no delimiter at all has
/// no parts.
pub(super) fn split_multipart<'a>(
    body: &'a [u8],
    boundary: &[u8],
) -> Vec<&'a [u8]> {
    let mut parts = Vec::new();
    let mut part_start: Option<usize> = None;
    let mut pos = 0;

    for line in Lines::new(body) {
        let after_dashes = line
            .strip_prefix(b"--")
            .and_then(|rest| rest.strip_prefix(boundary));

        if let Some(after) = after_dashes {
            if let Some(start) = part_start {
                let before = &body[start..pos];
                let before = before
                    .strip_suffix(b"\r\n")
                    .or_else(|| before.strip_suffix(b"\n"))
                    .unwrap_or(before);
                parts.push(before);
            }

            if after.starts_with(b"--") {
                return parts;
            }

            part_start = Some(pos + line.len());
        }

        pos += line.len();
    }

    if let Some(start) = part_start {
        parts.push(&body[start..]);
    }

    parts
}
