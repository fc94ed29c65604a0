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

/// A plain, unprotected message with the usual protected headers and a
/// `User-Agent` that no policy covers.
pub static DUMMY: &[u8] = include_bytes!("dummy.eml");

/// `DUMMY` without a `Subject`, so nothing needs to be force-displayed.
pub static DUMMY_NO_SUBJECT: &[u8] = include_bytes!("dummy_no_subject.eml");

/// `DUMMY` with `Cc` and `Bcc` recipients.
pub static DUMMY_BCC: &[u8] = include_bytes!("dummy_bcc.eml");

/// A well-formed `multipart/encrypted` message whose "ciphertext" is
/// `body text`.
pub static ENCRYPTED: &[u8] = include_bytes!("encrypted.eml");

/// `multipart/encrypted` messages which violate RFC 3156 § 4.
pub static ENCRYPTED_MALFORMED: &[&[u8]] = &[
    include_bytes!("encrypted_one_part.eml"),
    include_bytes!("encrypted_three_parts.eml"),
    include_bytes!("encrypted_swapped.eml"),
];

/// A `multipart/signed` message over a `text/plain` part containing
/// `body text`, with the signature `this is a signature`.
pub static SIGNED: &[u8] = include_bytes!("signed.eml");

/// `multipart/signed` messages without exactly two parts.
pub static SIGNED_MALFORMED: &[&[u8]] = &[
    include_bytes!("signed_one_part.eml"),
    include_bytes!("signed_three_parts.eml"),
];
