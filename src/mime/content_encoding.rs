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

use std::borrow::Cow;
use std::str;

/// The transfer encodings of RFC 2045 § 6.1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ContentTransferEncoding {
    #[default]
    SevenBit,
    EightBit,
    Binary,
    Base64,
    QuotedPrintable,
}

impl ContentTransferEncoding {
    /// Parses the value of a `Content-Transfer-Encoding` header.
    ///
    /// Unknown mechanisms give `None`.
    pub fn parse(value: &[u8]) -> Option<Self> {
        let value = str::from_utf8(value).ok()?.trim();
        // Some agents put a comment after the mechanism
        let value = value
            .split(|c: char| c.is_whitespace() || '(' == c)
            .next()
            .unwrap_or("");

        if value.eq_ignore_ascii_case("7bit") {
            Some(ContentTransferEncoding::SevenBit)
        } else if value.eq_ignore_ascii_case("8bit") {
            Some(ContentTransferEncoding::EightBit)
        } else if value.eq_ignore_ascii_case("binary") {
            Some(ContentTransferEncoding::Binary)
        } else if value.eq_ignore_ascii_case("base64") {
            Some(ContentTransferEncoding::Base64)
        } else if value.eq_ignore_ascii_case("quoted-printable") {
            Some(ContentTransferEncoding::QuotedPrintable)
        } else {
            None
        }
    }

    /// Removes this transfer encoding from `data`.
    ///
    /// Decoding never fails. Garbage is skipped or passed through, whichever
    /// loses less.
    pub fn decode<'a>(self, data: &'a [u8]) -> Cow<'a, [u8]> {
        match self {
            ContentTransferEncoding::SevenBit
            | ContentTransferEncoding::EightBit
            | ContentTransferEncoding::Binary => Cow::Borrowed(data),
            ContentTransferEncoding::Base64 => {
                Cow::Owned(base64_decode_lenient(data))
            },
            ContentTransferEncoding::QuotedPrintable => qp_decode(data),
        }
    }
}

/// Decodes base64 content, ignoring line breaks and any other bytes that
/// aren't part of the alphabet.
///
/// Each 4-character quantum is decoded on its own, so padding in the middle
/// (e.g. from concatenated encodings) only ends that quantum. Quanta which
/// don't decode are skipped, as is a trailing partial quantum.
pub fn base64_decode_lenient(data: &[u8]) -> Vec<u8> {
    let filtered = data
        .iter()
        .copied()
        .filter(|&b| b.is_ascii_alphanumeric() || b"+/=".contains(&b))
        .collect::<Vec<u8>>();

    let mut out = Vec::with_capacity(filtered.len() / 4 * 3);
    let mut buf = [0u8; 8];
    for quantum in filtered.chunks_exact(4) {
        if let Ok(n) =
            base64::decode_config_slice(quantum, base64::STANDARD, &mut buf)
        {
            out.extend_from_slice(&buf[..n]);
        }
    }
    out
}

/// Encodes `data` as base64 wrapped at 76 columns with DOS line endings, as
/// RFC 2045 wants for message bodies. The result always ends with a line
/// ending unless `data` is empty.
pub fn base64_encode_wrapped(data: &[u8]) -> Vec<u8> {
    let encoded = base64::encode_config(data, base64::STANDARD);
    let mut out = Vec::with_capacity(encoded.len() + encoded.len() / 38 + 2);
    for line in encoded.as_bytes().chunks(76) {
        out.extend_from_slice(line);
        out.extend_from_slice(b"\r\n");
    }
    out
}

/// Decodes quoted-printable encoding, as described by RFC 2045.
///
/// Soft line breaks are discarded, with either DOS or UNIX line endings.
/// Invalid escapes, including one truncated by the end of input, are passed
/// through verbatim. 8-bit bytes are passed through untouched.
pub fn qp_decode(s: &[u8]) -> Cow<'_, [u8]> {
    if memchr::memchr(b'=', s).is_none() {
        return Cow::Borrowed(s);
    }

    let mut out = Vec::with_capacity(s.len());
    let mut rest = s;
    while let Some(eq) = memchr::memchr(b'=', rest) {
        out.extend_from_slice(&rest[..eq]);
        let escape = &rest[eq + 1..];

        if escape.starts_with(b"\r\n") {
            rest = &escape[2..];
        } else if escape.starts_with(b"\n") {
            rest = &escape[1..];
        } else if let Some(byte) = escape
            .get(..2)
            .and_then(|hex| str::from_utf8(hex).ok())
            .and_then(|hex| u8::from_str_radix(hex, 16).ok())
        {
            out.push(byte);
            rest = &escape[2..];
        } else {
            out.push(b'=');
            rest = escape;
        }
    }
    out.extend_from_slice(rest);

    Cow::Owned(out)
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn parse_transfer_encodings() {
        assert_eq!(
            Some(ContentTransferEncoding::Base64),
            ContentTransferEncoding::parse(b" BASE64\r\n")
        );
        assert_eq!(
            Some(ContentTransferEncoding::QuotedPrintable),
            ContentTransferEncoding::parse(b"quoted-printable (yes)")
        );
        assert_eq!(
            Some(ContentTransferEncoding::SevenBit),
            ContentTransferEncoding::parse(b"7bit")
        );
        assert_eq!(None, ContentTransferEncoding::parse(b"x-uuencode"));
    }

    #[test]
    fn test_qp_decode() {
        fn assert_qp(expected: &[u8], input: &[u8]) {
            assert_eq!(expected, &qp_decode(input)[..]);
        }

        assert_qp(b"hello world", b"hello world");
        assert_qp(b"\xabfoo", b"=ABfoo");
        assert_qp(b"foo\xab\xcd", b"foo=AB=CD");
        assert_qp(b"foo", b"foo=\n");
        assert_qp(b"foobar", b"foo=\r\nbar");
        assert_qp(b"foo=()bar", b"foo=()bar");
        assert_qp(b"foo=\xabbar", b"foo==ABbar");
        assert_qp(b"foo=", b"foo=");
        assert_qp(b"foo=A", b"foo=A");
    }

    #[test]
    fn test_base64() {
        let encoded = base64_encode_wrapped(&[b'x'; 100]);
        let text = str::from_utf8(&encoded).unwrap();
        let lines = text.split("\r\n").collect::<Vec<_>>();
        assert_eq!(3, lines.len());
        assert_eq!(76, lines[0].len());
        assert_eq!("", lines[2]);

        assert_eq!(vec![b'x'; 100], base64_decode_lenient(&encoded));
        assert_eq!(b"hello".to_vec(), base64_decode_lenient(b"aGVs\nbG8=\n"));
        assert!(base64_encode_wrapped(b"").is_empty());
    }

    #[test]
    fn base64_padding_mid_stream() {
        assert_eq!(
            b"AABC".to_vec(),
            base64_decode_lenient(b"QQ==\r\nQUJD\r\n")
        );
        assert_eq!(b"AB".to_vec(), base64_decode_lenient(b"QQ==Qg=="));
        // Undecodable quanta are dropped, not zero-filled
        assert_eq!(b"ABC".to_vec(), base64_decode_lenient(b"=AAA QUJD"));
    }

    proptest! {
        #[test]
        fn qp_decode_never_fails(
            s in prop::collection::vec(prop::num::u8::ANY, 0..40)
        ) {
            qp_decode(&s);
        }

        #[test]
        fn base64_wrapping_is_transparent(
            s in prop::collection::vec(prop::num::u8::ANY, 0..300)
        ) {
            prop_assert_eq!(&s, &base64_decode_lenient(
                &base64_encode_wrapped(&s)));
        }
    }
}
