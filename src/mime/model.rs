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

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddrSpec<'a> {
    pub local: Vec<Cow<'a, [u8]>>,
    pub domain: Vec<Cow<'a, [u8]>>,
}

impl AddrSpec<'_> {
    /// Renders the address in the bare `local@domain` form OpenPGP tooling
    /// expects for recipient lookup.
    ///
    /// Non-UTF-8 content is replaced lossily.
    pub fn to_bare_string(&self) -> String {
        fn join(parts: &[Cow<'_, [u8]>]) -> String {
            parts
                .iter()
                .map(|p| String::from_utf8_lossy(p))
                .collect::<Vec<_>>()
                .join(".")
        }

        format!("{}@{}", join(&self.local), join(&self.domain))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MailboxSpec<'a> {
    pub addr: AddrSpec<'a>,
    pub name: Vec<Cow<'a, [u8]>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupSpec<'a> {
    pub name: Vec<Cow<'a, [u8]>>,
    pub boxes: Vec<MailboxSpec<'a>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Address<'a> {
    Mailbox(MailboxSpec<'a>),
    Group(GroupSpec<'a>),
}

impl<'a> Address<'a> {
    /// Returns every mailbox this address denotes, expanding groups.
    pub fn mailboxes(&self) -> Vec<&MailboxSpec<'a>> {
        match *self {
            Address::Mailbox(ref mailbox) => vec![mailbox],
            Address::Group(ref group) => group.boxes.iter().collect(),
        }
    }
}

/// A parsed `Content-Type` header value (RFC 2045 § 5.1).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentType<'a> {
    pub typ: Cow<'a, [u8]>,
    pub subtype: Cow<'a, [u8]>,
    pub parms: Vec<(Cow<'a, [u8]>, Cow<'a, [u8]>)>,
}

impl ContentType<'_> {
    pub fn is_type(&self, typ: &str) -> bool {
        self.typ.eq_ignore_ascii_case(typ.as_bytes())
    }

    pub fn is_subtype(&self, subtype: &str) -> bool {
        self.subtype.eq_ignore_ascii_case(subtype.as_bytes())
    }

    /// Returns the value of the first parameter called `name`, compared case
    /// insensitively.
    pub fn parm(&self, name: &str) -> Option<&[u8]> {
        self.parms
            .iter()
            .find(|&&(ref k, _)| k.eq_ignore_ascii_case(name.as_bytes()))
            .map(|&(_, ref v)| &v[..])
    }

    /// The lower-cased `type/subtype` string.
    pub fn essence(&self) -> String {
        format!(
            "{}/{}",
            String::from_utf8_lossy(&self.typ),
            String::from_utf8_lossy(&self.subtype),
        )
        .to_ascii_lowercase()
    }
}
