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

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, warn};

use super::protection::{Fingerprint, ProtectionLevel};
use crate::mime::part::Part;
use crate::support::error::Error;

/// Records that a protected header's value differs from what the outside of
/// the message claimed, or that it was only present inside an encrypted
/// part.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeaderReplacement {
    /// Whether the protected value was meant to be shown to the recipient.
    pub force_display: bool,
    /// The outer value that was replaced, if there was one.
    pub orig_value: Option<String>,
}

/// The result of unwrapping a message.
///
/// `message()` is the received message with every layer of encryption
/// removed and its headers replaced by their protected values. The rest of
/// the accessors describe what protection was found and where.
#[derive(Clone, Debug)]
pub struct MemoryHoleMessage {
    message: Part,
    signed: BTreeSet<Fingerprint>,
    encrypted: BTreeSet<Fingerprint>,
    body_part: Option<(Part, ProtectionLevel)>,
    replacements: BTreeMap<String, Option<HeaderReplacement>>,
    invalid_signatures: u32,
}

impl MemoryHoleMessage {
    pub(crate) fn new(message: Part) -> Self {
        MemoryHoleMessage {
            message,
            signed: BTreeSet::new(),
            encrypted: BTreeSet::new(),
            body_part: None,
            replacements: BTreeMap::new(),
            invalid_signatures: 0,
        }
    }

    /// Every key which validly signed some layer of the message.
    pub fn signed(&self) -> &BTreeSet<Fingerprint> {
        &self.signed
    }

    /// Every key which decrypted some layer of the message.
    pub fn encrypted(&self) -> &BTreeSet<Fingerprint> {
        &self.encrypted
    }

    /// The part holding the authoritative content of the message.
    pub fn body_part(&self) -> Option<&Part> {
        self.body_part.as_ref().map(|&(ref part, _)| part)
    }

    /// The protection the body part was found under.
    pub fn body_protection(&self) -> Option<&ProtectionLevel> {
        self.body_part.as_ref().map(|&(_, ref level)| level)
    }

    /// The keys which signed the protected headers, i.e., the body part.
    pub fn headers_signed(&self) -> Option<&BTreeSet<Fingerprint>> {
        self.body_protection().map(ProtectionLevel::signed_by)
    }

    /// The keys the protected headers were encrypted to.
    pub fn headers_encrypted(&self) -> Option<&BTreeSet<Fingerprint>> {
        self.body_protection().map(ProtectionLevel::encrypted_by)
    }

    /// Whether `name` was taken from the protected part of the message.
    pub fn is_header_signed(&self, name: &str) -> bool {
        self.replacements.contains_key(&name.to_ascii_lowercase())
    }

    /// The replacement record for `name`, if the outer value was overridden
    /// or the header was only present under encryption.
    pub fn header_replacement(&self, name: &str) -> Option<&HeaderReplacement> {
        self.replacements
            .get(&name.to_ascii_lowercase())
            .and_then(Option::as_ref)
    }

    /// Every protected header (lower-cased) with its replacement record.
    pub fn header_replacements(
        &self,
    ) -> &BTreeMap<String, Option<HeaderReplacement>> {
        &self.replacements
    }

    /// The number of detached signatures which did not verify.
    pub fn invalid_signatures(&self) -> u32 {
        self.invalid_signatures
    }

    pub fn message(&self) -> &Part {
        &self.message
    }

    pub fn into_message(self) -> Part {
        self.message
    }

    pub(crate) fn add_signed(&mut self, fingerprint: Fingerprint) {
        self.signed.insert(fingerprint);
    }

    pub(crate) fn add_encrypted(&mut self, fingerprint: Fingerprint) {
        self.encrypted.insert(fingerprint);
    }

    pub(crate) fn set_body_part(
        &mut self,
        part: Part,
        level: ProtectionLevel,
    ) {
        self.body_part = Some((part, level));
    }

    pub(crate) fn record_invalid_signature(&mut self) {
        self.invalid_signatures += 1;
    }

    /// Merges the protected header `name: value` into the outer message.
    ///
    /// Only the first value registered for each name has any effect. If the
    /// outer message disagrees with `value`, the outer value is overwritten
    /// and kept in a `HeaderReplacement`. A header missing from the outside
    /// is added, and only gets a `HeaderReplacement` when it was protected by
    /// encryption.
    ///
    /// Fails if no body part has been established.
    pub fn add_protected_header(
        &mut self,
        name: &str,
        value: &str,
        force_display: bool,
    ) -> Result<(), Error> {
        let encrypted = match self.body_part {
            Some((_, ref level)) => !level.encrypted_by().is_empty(),
            None => {
                return Err(Error::malformed(
                    "couldn't find a body in the message",
                ))
            },
        };

        let key = name.to_ascii_lowercase();
        if self.replacements.contains_key(&key) {
            return Ok(());
        }

        let replacement = match self.message.header(name).map(str::to_owned) {
            Some(outer) => {
                self.message.set_header(name, value);
                if outer.contains(value) {
                    None
                } else {
                    if encrypted {
                        debug!("Protected header {} replaces outer value", name);
                    } else {
                        warn!(
                            "Outer header {} does not match its signed value",
                            name
                        );
                    }

                    Some(HeaderReplacement {
                        force_display,
                        orig_value: Some(outer),
                    })
                }
            },
            None => {
                self.message.add_header(name, value);
                if encrypted {
                    Some(HeaderReplacement {
                        force_display,
                        orig_value: None,
                    })
                } else {
                    None
                }
            },
        };

        self.replacements.insert(key, replacement);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mime::part::Header;

    fn message() -> MemoryHoleMessage {
        MemoryHoleMessage::new(Part::leaf(
            vec![
                Header::new("From", "me@domain.com"),
                Header::new("Subject", "encrypted email"),
                Header::new("Date", "Mon, 1 Jan 2024 00:00:00 +0000"),
            ],
            b"body".to_vec(),
        ))
    }

    fn with_body(encrypted: bool) -> MemoryHoleMessage {
        let mut msg = message();
        let level = ProtectionLevel::default().with_signer("S".into());
        let level = if encrypted {
            level.with_encryptor("E".into())
        } else {
            level
        };
        let body = msg.message().clone();
        msg.set_body_part(body, level);
        msg
    }

    #[test]
    fn requires_body_part() {
        let mut msg = message();
        assert_matches!(
            Err(Error::MalformedMessage(..)),
            msg.add_protected_header("Subject", "x", false)
        );
        assert!(!msg.is_header_signed("subject"));
    }

    #[test]
    fn tampered_header_is_replaced() {
        let mut msg = with_body(true);
        msg.add_protected_header("SUBJECT", "some subject", true)
            .unwrap();

        assert_eq!(Some("some subject"), msg.message().header("Subject"));
        assert!(msg.is_header_signed("subject"));
        assert_eq!(
            Some(&HeaderReplacement {
                force_display: true,
                orig_value: Some("encrypted email".to_owned()),
            }),
            msg.header_replacement("Subject")
        );
    }

    #[test]
    fn tampering_is_recorded_without_encryption() {
        let mut msg = with_body(false);
        msg.add_protected_header("From", "mallory@evil.com", false)
            .unwrap();

        assert_eq!(Some("mallory@evil.com"), msg.message().header("From"));
        assert_eq!(
            Some(&HeaderReplacement {
                force_display: false,
                orig_value: Some("me@domain.com".to_owned()),
            }),
            msg.header_replacement("from")
        );
    }

    #[test]
    fn matching_header_has_no_replacement() {
        let mut msg = with_body(true);
        msg.add_protected_header("Date", "1 Jan 2024", false).unwrap();

        assert!(msg.is_header_signed("date"));
        assert_eq!(None, msg.header_replacement("date"));
        assert_eq!(Some(&None), msg.header_replacements().get("date"));
        assert_eq!(Some("1 Jan 2024"), msg.message().header("Date"));
    }

    #[test]
    fn first_registration_wins() {
        let mut msg = with_body(true);
        msg.add_protected_header("Subject", "some subject", true)
            .unwrap();
        msg.add_protected_header("subject", "other subject", false)
            .unwrap();

        assert_eq!(Some("some subject"), msg.message().header("Subject"));
        assert!(msg.header_replacement("subject").unwrap().force_display);
    }

    #[test]
    fn absent_header_is_added() {
        let mut msg = with_body(true);
        msg.add_protected_header("To", "you@other.com", false).unwrap();
        assert_eq!(Some("you@other.com"), msg.message().header("To"));
        assert_eq!(
            Some(&HeaderReplacement {
                force_display: false,
                orig_value: None,
            }),
            msg.header_replacement("to")
        );

        let mut msg = with_body(false);
        msg.add_protected_header("To", "you@other.com", false).unwrap();
        assert_eq!(Some("you@other.com"), msg.message().header("To"));
        assert!(msg.is_header_signed("to"));
        assert_eq!(None, msg.header_replacement("to"));
    }
}
