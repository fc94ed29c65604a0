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

//! Walks a received message, removing encryption, checking signatures and
//! restoring protected headers.
//!
//! The walk keeps a single candidate for the "body part", the part whose
//! content and headers are authoritative. Whenever a part is found under at
//! least as much protection as the current candidate, it takes over. A
//! `text/rfc822-headers` part is only trusted for force-displayed headers if
//! it was found under exactly the same keys as the current candidate.

use std::collections::BTreeSet;

use log::{debug, info, warn};

use super::message::MemoryHoleMessage;
use super::protection::{Fingerprint, ProtectionLevel};
use crate::crypt::OpenPgp;
use crate::mime::header;
use crate::mime::part::{Header, Part};
use crate::support::config::{InvalidSignaturePolicy, UnwrapConfig};
use crate::support::error::Error;

/// Unwraps `message` with the default configuration.
pub fn unwrap(
    message: &Part,
    openpgp: &mut dyn OpenPgp,
) -> Result<MemoryHoleMessage, Error> {
    unwrap_with_config(message, openpgp, &UnwrapConfig::default())
}

/// Decrypts and verifies every layer of `message`, then merges the protected
/// headers of the body part into the outer headers.
///
/// Any OpenPGP failure aborts the whole operation; nothing is ever
/// downgraded to plaintext.
pub fn unwrap_with_config(
    message: &Part,
    openpgp: &mut dyn OpenPgp,
    config: &UnwrapConfig,
) -> Result<MemoryHoleMessage, Error> {
    let mut root = message.clone();
    let mut walker = Walker {
        openpgp,
        config,
        signed: BTreeSet::new(),
        encrypted: BTreeSet::new(),
        body: Candidate {
            level: ProtectionLevel::default(),
            part: root.clone(),
            ticket: 0,
        },
        next_ticket: 0,
        force_display: None,
        invalid_signatures: 0,
    };

    walker.descend(&mut root, &ProtectionLevel::default(), 0)?;
    walker.settle(Some(0), &root);

    let Walker {
        signed,
        encrypted,
        body,
        force_display,
        invalid_signatures,
        ..
    } = walker;

    let mime_headers = if body.part.has_protected_headers() {
        body.part
            .headers()
            .iter()
            .filter(|h| !h.is_content_header() && !h.is("MIME-Version"))
            .cloned()
            .collect::<Vec<_>>()
    } else {
        vec![]
    };

    let mut result = MemoryHoleMessage::new(root);
    signed.into_iter().for_each(|fp| result.add_signed(fp));
    encrypted.into_iter().for_each(|fp| result.add_encrypted(fp));
    for _ in 0..invalid_signatures {
        result.record_invalid_signature();
    }
    result.set_body_part(body.part, body.level);

    if let Some(block) = force_display.filter(Part::has_protected_headers) {
        for (name, value) in header::split_header_block(&block.decoded_body())
        {
            result.add_protected_header(&name, &value, true)?;
        }
    }

    for h in mime_headers {
        result.add_protected_header(h.name(), h.value(), false)?;
    }

    Ok(result)
}

/// How the walker treats a part.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Layer {
    Encrypted,
    Signed,
    HeaderBlock,
    Multipart,
    Leaf,
}

impl Layer {
    fn of(part: &Part) -> Self {
        match part.mime_type().as_str() {
            "multipart/encrypted" => Layer::Encrypted,
            "multipart/signed" => Layer::Signed,
            "text/rfc822-headers" => Layer::HeaderBlock,
            _ if part.is_multipart() => Layer::Multipart,
            _ => Layer::Leaf,
        }
    }
}

struct Candidate {
    level: ProtectionLevel,
    part: Part,
    /// Identifies which offer produced this candidate, so that only the walk
    /// of that same part refreshes it.
    ticket: u32,
}

struct Walker<'a> {
    openpgp: &'a mut dyn OpenPgp,
    config: &'a UnwrapConfig,
    signed: BTreeSet<Fingerprint>,
    encrypted: BTreeSet<Fingerprint>,
    body: Candidate,
    next_ticket: u32,
    force_display: Option<Part>,
    invalid_signatures: u32,
}

impl Walker<'_> {
    fn descend(
        &mut self,
        node: &mut Part,
        level: &ProtectionLevel,
        depth: u32,
    ) -> Result<(), Error> {
        if depth > self.config.max_depth {
            return Err(Error::malformed(format!(
                "MIME parts nested more than {} deep",
                self.config.max_depth
            )));
        }

        let layer = Layer::of(node);
        debug!(
            "Depth {}: {:?} at protection level {}",
            depth,
            layer,
            level.score()
        );

        match layer {
            Layer::Encrypted => self.decrypt(node, level, depth),
            Layer::Signed => self.verify(node, level, depth),
            Layer::HeaderBlock => {
                if self.force_display.is_none()
                    && level.same_provenance(&self.body.level)
                {
                    debug!("Found force-displayed header block");
                    self.force_display = Some(node.clone());
                }
                Ok(())
            },
            Layer::Multipart => {
                for child in node.children_mut() {
                    self.descend(child, level, depth + 1)?;
                }
                Ok(())
            },
            Layer::Leaf => Ok(()),
        }
    }

    fn decrypt(
        &mut self,
        node: &mut Part,
        level: &ProtectionLevel,
        depth: u32,
    ) -> Result<(), Error> {
        let ciphertext = match node.children() {
            [version, payload]
                if "application/pgp-encrypted" == version.mime_type()
                    && "application/octet-stream" == payload.mime_type() =>
            {
                payload.decoded_body()
            },
            [_, _] => {
                return Err(Error::malformed(
                    "multipart/encrypted parts have the wrong types",
                ))
            },
            children => {
                return Err(Error::malformed(format!(
                    "multipart/encrypted has {} parts instead of 2",
                    children.len()
                )))
            },
        };

        let decrypted = self.openpgp.decrypt(&ciphertext)?;
        info!("Decrypted part with key {}", decrypted.encrypted_to);

        let mut inner_level =
            level.with_encryptor(decrypted.encrypted_to.clone());
        self.encrypted.insert(decrypted.encrypted_to);
        if let Some(signer) = decrypted.signed_by {
            info!("Encrypted part signed by {}", signer);
            inner_level = inner_level.with_signer(signer.clone());
            self.signed.insert(signer);
        }

        let mut inner = Part::parse(&decrypted.plaintext)?;
        let ticket = self.offer(&inner_level, &inner);
        self.descend(&mut inner, &inner_level, depth + 1)?;
        self.settle(ticket, &inner);

        let (inner_headers, inner_body) = inner.into_parts();
        let mut headers = node
            .headers()
            .iter()
            .filter(|h| !h.is_content_header())
            .cloned()
            .collect::<Vec<_>>();
        headers.extend(
            inner_headers
                .into_iter()
                .filter(Header::is_content_header),
        );
        node.set_headers(headers);
        node.set_body(inner_body);

        Ok(())
    }

    fn verify(
        &mut self,
        node: &mut Part,
        level: &ProtectionLevel,
        depth: u32,
    ) -> Result<(), Error> {
        let (signed, signature) = match node.children_mut() {
            [signed, signature] => (signed, signature),
            children => {
                return Err(Error::malformed(format!(
                    "multipart/signed has {} parts instead of 2",
                    children.len()
                )))
            },
        };

        let verification = self.openpgp.verify(
            &signed.to_canonical_bytes(),
            &signature.decoded_body(),
        )?;

        let signed_level = if verification.valid {
            match verification.signer {
                Some(signer) => {
                    info!("Valid signature by {}", signer);
                    self.signed.insert(signer.clone());
                    level.with_signer(signer)
                },
                None => {
                    warn!("Valid signature by unidentified key");
                    level.clone()
                },
            }
        } else {
            match self.config.invalid_signature {
                InvalidSignaturePolicy::Reject => {
                    return Err(Error::InvalidSignature)
                },
                InvalidSignaturePolicy::Flag => {
                    warn!("Ignoring invalid signature");
                    self.invalid_signatures += 1;
                    level.clone()
                },
            }
        };

        let ticket = self.offer(&signed_level, signed);
        self.descend(signed, &signed_level, depth + 1)?;
        self.settle(ticket, signed);
        Ok(())
    }

    /// Makes `part` the body candidate if `level` supersedes the current
    /// one, returning the ticket to `settle` it with.
    fn offer(&mut self, level: &ProtectionLevel, part: &Part) -> Option<u32> {
        if !level.supersedes(&self.body.level) {
            return None;
        }

        self.next_ticket += 1;
        debug!(
            "New body part candidate at protection level {}",
            level.score()
        );
        self.body = Candidate {
            level: level.clone(),
            part: part.clone(),
            ticket: self.next_ticket,
        };
        self.force_display = None;
        Some(self.next_ticket)
    }

    /// Refreshes the body candidate with the walked form of `part`, if it
    /// is still the candidate that `ticket` was issued for.
    fn settle(&mut self, ticket: Option<u32>, part: &Part) {
        if Some(self.body.ticket) == ticket {
            self.body.part = part.clone();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypt::openpgp::StubOpenPgp;
    use crate::mime::part::Body;
    use crate::support::error::Operation;
    use crate::test_data::*;

    const ENCFP: &str = "EEEEEEEEEEEEEEEEEEEEEEEEEEEEEEEEEEEEEEEE";
    const SIGNFP: &str = "1111111111111111111111111111111111111111";
    const DECRYPTED: &[u8] =
        b"Content-Type: text/plain\r\n\r\nthis is decrypted";

    /// `OpenPgp` giving fixed answers and recording what it was asked.
    #[derive(Default)]
    struct Scripted {
        invalid: bool,
        calls: Vec<Operation>,
        data: Vec<u8>,
        signature: Vec<u8>,
    }

    impl OpenPgp for Scripted {
        fn encrypt(
            &mut self,
            _: &[u8],
            _: &[String],
        ) -> Result<Vec<u8>, Error> {
            unreachable!()
        }

        fn sign(&mut self, _: &[u8]) -> Result<Vec<u8>, Error> {
            unreachable!()
        }

        fn decrypt(
            &mut self,
            ciphertext: &[u8],
        ) -> Result<crate::crypt::Decrypted, Error> {
            self.calls.push(Operation::Decrypt);
            self.data = ciphertext.to_vec();
            Ok(crate::crypt::Decrypted {
                plaintext: DECRYPTED.to_vec(),
                encrypted_to: ENCFP.into(),
                signed_by: Some(SIGNFP.into()),
            })
        }

        fn verify(
            &mut self,
            data: &[u8],
            signature: &[u8],
        ) -> Result<crate::crypt::Verification, Error> {
            self.calls.push(Operation::Verify);
            self.data = data.to_vec();
            self.signature = signature.to_vec();
            Ok(crate::crypt::Verification {
                valid: !self.invalid,
                signer: Some(SIGNFP.into()),
            })
        }
    }

    fn fingerprints(fps: &[&str]) -> BTreeSet<Fingerprint> {
        fps.iter().map(|&fp| fp.into()).collect()
    }

    #[test]
    fn decrypt() {
        crate::init_test_log();

        let mut openpgp = Scripted::default();
        let unwrapped =
            unwrap(&Part::parse(ENCRYPTED).unwrap(), &mut openpgp).unwrap();

        assert_eq!(
            b"this is decrypted".to_vec(),
            unwrapped.body_part().unwrap().decoded_body()
        );
        assert_eq!(&fingerprints(&[ENCFP]), unwrapped.encrypted());
        assert_eq!(&fingerprints(&[SIGNFP]), unwrapped.signed());
        assert_eq!(b"body text".to_vec(), openpgp.data);
        assert_eq!(3, unwrapped.body_protection().unwrap().score());

        // The decrypted content replaces the encrypted structure
        let message = unwrapped.message();
        assert_eq!("text/plain", message.mime_type());
        assert!(!message.is_multipart());
        assert_eq!(Some("some subject"), message.header("Subject"));
        assert_eq!(
            b"this is decrypted".to_vec(),
            message.decoded_body()
        );
    }

    #[test]
    fn verify() {
        crate::init_test_log();

        let mut openpgp = Scripted::default();
        let unwrapped =
            unwrap(&Part::parse(SIGNED).unwrap(), &mut openpgp).unwrap();

        assert_eq!(
            b"body text".to_vec(),
            unwrapped.body_part().unwrap().decoded_body()
        );
        assert!(unwrapped.encrypted().is_empty());
        assert_eq!(&fingerprints(&[SIGNFP]), unwrapped.signed());
        assert_eq!(
            b"body text\r\n".to_vec(),
            Part::parse(&openpgp.data).unwrap().decoded_body()
        );
        assert_eq!(b"this is a signature".to_vec(), openpgp.signature);
        assert_eq!(0, unwrapped.invalid_signatures());
        // No protected-headers marker, so nothing to merge
        assert!(!unwrapped.is_header_signed("subject"));
    }

    #[test]
    fn malformed_encrypted_messages_are_rejected_before_decryption() {
        for &message in ENCRYPTED_MALFORMED {
            let mut openpgp = Scripted::default();
            assert_matches!(
                Err(Error::MalformedMessage(..)),
                unwrap(&Part::parse(message).unwrap(), &mut openpgp)
            );
            assert!(openpgp.calls.is_empty());
        }
    }

    #[test]
    fn malformed_signed_messages_are_rejected_before_verification() {
        for &message in SIGNED_MALFORMED {
            let mut openpgp = Scripted::default();
            assert_matches!(
                Err(Error::MalformedMessage(..)),
                unwrap(&Part::parse(message).unwrap(), &mut openpgp)
            );
            assert!(openpgp.calls.is_empty());
        }
    }

    #[test]
    fn decryption_failure_is_fatal() {
        // The fixture's payload is not something the stub can decrypt
        let mut openpgp = StubOpenPgp::default();
        assert_matches!(
            Err(Error::OpenPgp {
                operation: Operation::Decrypt,
                ..
            }),
            unwrap(&Part::parse(ENCRYPTED).unwrap(), &mut openpgp)
        );
        assert_eq!(vec![Operation::Decrypt], openpgp.calls);
    }

    #[test]
    fn invalid_signature_is_flagged() {
        let mut openpgp = Scripted {
            invalid: true,
            ..Scripted::default()
        };
        let unwrapped =
            unwrap(&Part::parse(SIGNED).unwrap(), &mut openpgp).unwrap();

        assert!(unwrapped.signed().is_empty());
        assert_eq!(1, unwrapped.invalid_signatures());
        assert_eq!(
            b"body text".to_vec(),
            unwrapped.body_part().unwrap().decoded_body()
        );
        assert_eq!(0, unwrapped.body_protection().unwrap().score());
    }

    #[test]
    fn invalid_signature_can_be_rejected() {
        let mut openpgp = Scripted {
            invalid: true,
            ..Scripted::default()
        };
        let config = UnwrapConfig {
            invalid_signature: InvalidSignaturePolicy::Reject,
            ..UnwrapConfig::default()
        };
        assert_matches!(
            Err(Error::InvalidSignature),
            unwrap_with_config(
                &Part::parse(SIGNED).unwrap(),
                &mut openpgp,
                &config
            )
        );
    }

    #[test]
    fn depth_is_limited() {
        let mut part = Part::leaf(vec![], b"deep".to_vec());
        for _ in 0..5 {
            part = Part::multipart(
                vec![],
                "multipart/mixed",
                "b".to_owned(),
                vec![part],
            );
        }

        let config = UnwrapConfig {
            max_depth: 4,
            ..UnwrapConfig::default()
        };
        assert_matches!(
            Err(Error::MalformedMessage(..)),
            unwrap_with_config(&part, &mut Scripted::default(), &config)
        );

        let config = UnwrapConfig {
            max_depth: 5,
            ..UnwrapConfig::default()
        };
        assert!(
            unwrap_with_config(&part, &mut Scripted::default(), &config)
                .is_ok()
        );
    }

    #[test]
    fn unprotected_message_is_its_own_body() {
        let unwrapped =
            unwrap(&Part::parse(DUMMY).unwrap(), &mut Scripted::default())
                .unwrap();

        assert!(unwrapped.signed().is_empty());
        assert!(unwrapped.encrypted().is_empty());
        assert_eq!(0, unwrapped.body_protection().unwrap().score());
        assert!(unwrapped.header_replacements().is_empty());
        assert_eq!(DUMMY.to_vec(), unwrapped.message().to_bytes());
    }

    #[test]
    fn layer_dispatch() {
        fn layer(content_type: &str, multipart: bool) -> Layer {
            let headers = vec![Header::new("Content-Type", content_type)];
            let part = if multipart {
                Part::new(
                    headers,
                    Body::Multipart {
                        boundary: "b".to_owned(),
                        parts: vec![Part::leaf(vec![], vec![])],
                    },
                )
            } else {
                Part::leaf(headers, vec![])
            };
            Layer::of(&part)
        }

        assert_eq!(Layer::Encrypted, layer("Multipart/Encrypted", true));
        assert_eq!(Layer::Encrypted, layer("multipart/encrypted", false));
        assert_eq!(Layer::Signed, layer("multipart/signed", true));
        assert_eq!(Layer::HeaderBlock, layer("text/rfc822-headers", false));
        assert_eq!(Layer::Multipart, layer("multipart/mixed", true));
        assert_eq!(Layer::Leaf, layer("multipart/mixed", false));
        assert_eq!(Layer::Leaf, layer("text/plain", false));
    }
}
