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

//! An owned MIME part tree, as consumed and produced by the protect and
//! unwrap operations.
//!
//! Parts parsed from the wire remember their exact source bytes until they
//! (or anything under them) are modified, so that serialising an untouched
//! part reproduces precisely what a signer saw.

use std::io::{self, Write};

use super::content_encoding::{
    base64_encode_wrapped, ContentTransferEncoding,
};
use super::grovel::{self, MAX_PARTS, MAX_RECURSION};
use super::header;
use super::model::ContentType;
use crate::support::error::Error;

/// A single header field.
///
/// Values are stored unfolded, without surrounding whitespace.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Header {
    name: String,
    value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Header {
            name: name.into(),
            value: value.into(),
        }
    }

    fn unfold(name: &str, raw_value: &[u8]) -> Self {
        let value = String::from_utf8_lossy(raw_value)
            .replace("\r\n", "")
            .replace('\n', "");
        Header::new(name, value.trim())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Whether this header is called `name`, ignoring case.
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// Whether this is one of the `Content-*` headers describing the part
    /// rather than the message.
    pub fn is_content_header(&self) -> bool {
        self.name.len() >= 8
            && self.name.as_bytes()[..8].eq_ignore_ascii_case(b"content-")
    }
}

#[derive(Clone, Debug)]
pub enum Body {
    Leaf(Vec<u8>),
    Multipart { boundary: String, parts: Vec<Part> },
}

#[derive(Clone, Debug)]
pub struct Part {
    headers: Vec<Header>,
    body: Body,
    /// The exact bytes this part was parsed from, if it has not been modified
    /// since.
    raw: Option<Vec<u8>>,
}

impl Part {
    pub fn new(headers: Vec<Header>, body: Body) -> Self {
        Part {
            headers,
            body,
            raw: None,
        }
    }

    /// Creates a leaf part with the given headers and content.
    pub fn leaf(headers: Vec<Header>, content: Vec<u8>) -> Self {
        Part::new(headers, Body::Leaf(content))
    }

    /// Creates a multipart part.
    ///
    /// `content_type` is the full `Content-Type` value apart from the
    /// boundary, which is appended. It is added after `headers`.
    pub fn multipart(
        mut headers: Vec<Header>,
        content_type: &str,
        boundary: String,
        parts: Vec<Part>,
    ) -> Self {
        headers.push(Header::new(
            "Content-Type",
            header::append_parm(content_type, "boundary", &boundary),
        ));
        Part::new(headers, Body::Multipart { boundary, parts })
    }

    /// Parses a complete message or MIME entity.
    pub fn parse(data: &[u8]) -> Result<Self, Error> {
        let mut part_budget = MAX_PARTS;
        Ok(Part::parse_entity(data, 0, &mut part_budget))
    }

    fn parse_entity(data: &[u8], depth: u32, part_budget: &mut u32) -> Self {
        let entity = grovel::split_entity(data);
        let headers = entity
            .headers
            .iter()
            .map(|&(name, value)| Header::unfold(name, value))
            .collect();

        let pieces = match entity.boundary {
            Some(ref boundary) if depth < MAX_RECURSION => {
                grovel::split_multipart(entity.body, boundary.as_bytes())
            },
            _ => Vec::new(),
        };

        let body = match entity.boundary {
            Some(boundary)
                if !pieces.is_empty() && pieces.len() as u32 <= *part_budget =>
            {
                *part_budget -= pieces.len() as u32;
                let parts = pieces
                    .into_iter()
                    .map(|piece| {
                        Part::parse_entity(piece, depth + 1, part_budget)
                    })
                    .collect();
                Body::Multipart { boundary, parts }
            },
            _ => Body::Leaf(entity.body.to_vec()),
        };

        Part {
            headers,
            body,
            raw: Some(data.to_vec()),
        }
    }

    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    /// Returns the value of the first header called `name`.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().find(|h| h.is(name)).map(Header::value)
    }

    /// Returns the values of all headers called `name`, in order.
    pub fn header_all<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |h| h.is(name))
            .map(Header::value)
    }

    /// Sets the value of header `name`.
    ///
    /// The first existing header of that name is rewritten in place and any
    /// others are removed. If there is none, the header is appended.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.raw = None;
        let value = value.into();

        match self.headers.iter().position(|h| h.is(name)) {
            None => self.headers.push(Header::new(name, value)),
            Some(ix) => {
                self.headers[ix].value = value;
                let mut seen = 0;
                self.headers.retain(|h| {
                    if h.is(name) {
                        seen += 1;
                        1 == seen
                    } else {
                        true
                    }
                });
            },
        }
    }

    /// Appends a header, leaving any of the same name in place.
    pub fn add_header(&mut self, name: &str, value: impl Into<String>) {
        self.raw = None;
        self.headers.push(Header::new(name, value));
    }

    /// Removes every header called `name`.
    pub fn remove_header(&mut self, name: &str) {
        self.raw = None;
        self.headers.retain(|h| !h.is(name));
    }

    /// Replaces the complete header list.
    pub fn set_headers(&mut self, headers: Vec<Header>) {
        self.raw = None;
        self.headers = headers;
    }

    pub fn content_type(&self) -> Option<ContentType<'_>> {
        self.header("Content-Type")
            .and_then(|ct| header::parse_content_type(ct.as_bytes()))
    }

    /// The lower-cased `type/subtype` of this part, defaulting to
    /// `text/plain`.
    pub fn mime_type(&self) -> String {
        self.content_type()
            .map(|ct| ct.essence())
            .unwrap_or_else(|| "text/plain".to_owned())
    }

    /// Returns the named `Content-Type` parameter.
    pub fn param(&self, name: &str) -> Option<String> {
        self.content_type()
            .and_then(|ct| {
                ct.parm(name)
                    .map(|v| String::from_utf8_lossy(v).into_owned())
            })
    }

    /// Whether this part is marked as carrying protected headers.
    pub fn has_protected_headers(&self) -> bool {
        self.param("protected-headers")
            .map_or(false, |v| v.eq_ignore_ascii_case("v1"))
    }

    pub fn is_multipart(&self) -> bool {
        matches!(self.body, Body::Multipart { .. })
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn set_body(&mut self, body: Body) {
        self.raw = None;
        self.body = body;
    }

    pub fn into_parts(self) -> (Vec<Header>, Body) {
        (self.headers, self.body)
    }

    /// The children of a multipart part; empty for leaves.
    pub fn children(&self) -> &[Part] {
        match self.body {
            Body::Leaf(_) => &[],
            Body::Multipart { ref parts, .. } => parts,
        }
    }

    /// Mutable access to the children of a multipart part.
    ///
    /// This counts as modifying this part.
    pub fn children_mut(&mut self) -> &mut [Part] {
        self.raw = None;
        match self.body {
            Body::Leaf(_) => &mut [],
            Body::Multipart { ref mut parts, .. } => parts,
        }
    }

    /// The content of this part with its transfer encoding removed.
    ///
    /// For multipart parts, this is the serialised multipart body.
    pub fn decoded_body(&self) -> Vec<u8> {
        match self.body {
            Body::Leaf(ref content) => self
                .transfer_encoding()
                .decode(content)
                .into_owned(),
            Body::Multipart { .. } => {
                let mut out = Vec::new();
                self.write_body_into(&mut out);
                out
            },
        }
    }

    fn transfer_encoding(&self) -> ContentTransferEncoding {
        self.header("Content-Transfer-Encoding")
            .and_then(|v| ContentTransferEncoding::parse(v.as_bytes()))
            .unwrap_or_default()
    }

    /// Re-encodes every leaf under this part as base64.
    ///
    /// Leaves already in base64 are left alone.
    pub fn encode_leaves_base64(&mut self) {
        if self.is_multipart() {
            for child in self.children_mut() {
                child.encode_leaves_base64();
            }
            return;
        }

        if ContentTransferEncoding::Base64 == self.transfer_encoding() {
            return;
        }

        let encoded = base64_encode_wrapped(&self.decoded_body());
        self.set_header("Content-Transfer-Encoding", "base64");
        self.set_body(Body::Leaf(encoded));
    }

    pub fn write_to(&self, mut w: impl Write) -> io::Result<()> {
        w.write_all(&self.to_bytes())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write_into(&mut out);
        out
    }

    /// The serialised form with every line ending made CRLF and a CRLF at
    /// the end, as signatures are computed over.
    pub fn to_canonical_bytes(&self) -> Vec<u8> {
        let raw = self.to_bytes();
        let mut out = Vec::with_capacity(raw.len() + raw.len() / 32 + 2);
        let mut prev = 0u8;
        for &b in &raw {
            if b'\n' == b && b'\r' != prev {
                out.push(b'\r');
            }
            out.push(b);
            prev = b;
        }

        if !out.ends_with(b"\r\n") {
            out.extend_from_slice(b"\r\n");
        }
        out
    }

    fn write_into(&self, out: &mut Vec<u8>) {
        if let Some(ref raw) = self.raw {
            out.extend_from_slice(raw);
            return;
        }

        for header in &self.headers {
            out.extend_from_slice(header.name.as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(header.value.as_bytes());
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(b"\r\n");
        self.write_body_into(out);
    }

    fn write_body_into(&self, out: &mut Vec<u8>) {
        match self.body {
            Body::Leaf(ref content) => out.extend_from_slice(content),
            Body::Multipart {
                ref boundary,
                ref parts,
            } => {
                for part in parts {
                    out.extend_from_slice(b"--");
                    out.extend_from_slice(boundary.as_bytes());
                    out.extend_from_slice(b"\r\n");
                    part.write_into(out);
                    out.extend_from_slice(b"\r\n");
                }
                out.extend_from_slice(b"--");
                out.extend_from_slice(boundary.as_bytes());
                out.extend_from_slice(b"--\r\n");
            },
        }
    }
}
